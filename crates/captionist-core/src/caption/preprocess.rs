//! Image preprocessing for the caption vision encoder.
//!
//! ViT-style encoders expect:
//! - Input size: `image_size × image_size` pixels (bilinear resize)
//! - Normalization: `(pixel/255 - mean[c]) / std[c]` per RGB channel
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Resize and normalization parameters for one caption model.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Preprocess an image for the caption encoder.
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> Array4<f32> {
    let resized = image.resize_exact(
        options.image_size,
        options.image_size,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    let size = options.image_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));

    // Write through the raw slices; the tensor was just allocated in standard layout.
    let raw = rgb.as_raw();
    if let Some(tensor_data) = tensor.as_slice_mut() {
        for (i, pixel) in raw.chunks_exact(3).enumerate() {
            let y = i / size;
            let x = i % size;
            for (c, &val) in pixel.iter().enumerate() {
                let idx = c * size * size + y * size + x;
                tensor_data[idx] = (val as f32 / 255.0 - options.mean[c]) / options.std[c];
            }
        }
    }

    tensor
}
