//! ONNX vision encoder-decoder captioning.
//!
//! Loads an encoder/decoder pair exported in the Hugging Face
//! `VisionEncoderDecoder` layout (ViT-GPT2, DistilViT, ...) and generates a
//! caption with greedy decoding.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::{DynValue, Value};

use super::preprocess::{preprocess, PreprocessOptions};
use super::CaptionModel;
use crate::config::CaptionConfig;
use crate::error::PipelineError;
use crate::math::argmax;
use crate::pipeline::DecodedImage;

pub(crate) const ENCODER_FILENAME: &str = "encoder_model.onnx";
pub(crate) const DECODER_FILENAME: &str = "decoder_model.onnx";
pub(crate) const TOKENIZER_FILENAME: &str = "tokenizer.json";

fn model_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Model {
        message: message.into(),
    }
}

fn caption_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Caption {
        message: message.into(),
    }
}

fn load_session(path: &Path) -> Result<Session, PipelineError> {
    Session::builder()
        .map_err(|e| model_error(format!("Failed to create ONNX session builder: {e}")))?
        .commit_from_file(path)
        .map_err(|e| model_error(format!("Failed to load ONNX model {:?}: {e}", path)))
}

/// Encoder + decoder ONNX sessions and the tokenizer that decodes their output.
///
/// Sessions sit behind `Mutex` because `Session::run` requires `&mut self`;
/// this also serializes inference so one caption runs at a time.
pub struct EncoderDecoderSession {
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    /// Name of the encoder's pixel input (detected from model metadata).
    encoder_input: String,
    decoder_wants_encoder_mask: bool,
    decoder_wants_attention_mask: bool,
}

impl EncoderDecoderSession {
    /// Load the encoder, decoder and tokenizer from a model directory.
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let encoder_path = model_dir.join(ENCODER_FILENAME);
        let decoder_path = model_dir.join(DECODER_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        for path in [&encoder_path, &decoder_path, &tokenizer_path] {
            if !path.exists() {
                return Err(model_error(format!(
                    "Caption model file not found at {:?}. Run `captionist models download` first.",
                    path
                )));
            }
        }

        let encoder = load_session(&encoder_path)?;
        let decoder = load_session(&decoder_path)?;
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_error(format!("Failed to load tokenizer: {e}")))?;

        let encoder_input = encoder
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        let decoder_input_names: Vec<String> = decoder
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let has_input = |name: &str| decoder_input_names.iter().any(|n| n == name);
        let decoder_wants_encoder_mask = has_input("encoder_attention_mask");
        let decoder_wants_attention_mask = has_input("attention_mask");

        tracing::debug!(
            "Loaded caption encoder (input: {:?}) and decoder (inputs: {:?})",
            encoder_input,
            decoder_input_names
        );

        Ok(Self {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            tokenizer,
            encoder_input,
            decoder_wants_encoder_mask,
            decoder_wants_attention_mask,
        })
    }

    /// Encode pixels and greedily decode up to `max_tokens` tokens.
    ///
    /// Returns the detokenized caption with special tokens removed.
    pub fn generate(
        &self,
        pixel_values: &Array4<f32>,
        decoder_start_token_id: i64,
        eos_token_id: i64,
        max_tokens: usize,
    ) -> Result<String, PipelineError> {
        let (hidden_shape, hidden) = self.encode(pixel_values)?;

        let mut decoder = self
            .decoder
            .lock()
            .map_err(|e| caption_error(format!("Decoder lock poisoned: {e}")))?;

        let encoder_seq_len = hidden_shape.get(1).copied().unwrap_or(0);

        let token_ids = greedy_decode(decoder_start_token_id, eos_token_id, max_tokens, |ids| {
            let seq_len = ids.len() as i64;
            let mut inputs: Vec<(&str, DynValue)> = Vec::with_capacity(4);

            inputs.push((
                "input_ids",
                Value::from_array((vec![1, seq_len], ids.to_vec()))
                    .map_err(|e| caption_error(format!("Failed to create input_ids: {e}")))?
                    .into_dyn(),
            ));
            if self.decoder_wants_attention_mask {
                inputs.push((
                    "attention_mask",
                    Value::from_array((vec![1, seq_len], vec![1i64; ids.len()]))
                        .map_err(|e| caption_error(format!("Failed to create mask: {e}")))?
                        .into_dyn(),
                ));
            }
            inputs.push((
                "encoder_hidden_states",
                Value::from_array((hidden_shape.clone(), hidden.clone()))
                    .map_err(|e| caption_error(format!("Failed to create hidden states: {e}")))?
                    .into_dyn(),
            ));
            if self.decoder_wants_encoder_mask {
                inputs.push((
                    "encoder_attention_mask",
                    Value::from_array((
                        vec![1, encoder_seq_len],
                        vec![1i64; encoder_seq_len as usize],
                    ))
                    .map_err(|e| caption_error(format!("Failed to create encoder mask: {e}")))?
                    .into_dyn(),
                ));
            }

            let outputs = decoder
                .run(inputs)
                .map_err(|e| caption_error(format!("Decoder inference failed: {e}")))?;

            let logits = outputs
                .iter()
                .find(|(name, _)| *name == "logits")
                .ok_or_else(|| caption_error("Decoder did not produce logits"))?;

            let (shape, data) = logits
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| caption_error(format!("Failed to extract logits: {e}")))?;

            last_position_logits(shape, data)
        })?;

        let ids: Vec<u32> = token_ids.iter().map(|&id| id as u32).collect();
        let text = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| caption_error(format!("Failed to decode tokens: {e}")))?;

        Ok(text.trim().to_string())
    }

    /// Run the vision encoder; returns `(shape, last_hidden_state)`.
    fn encode(&self, pixel_values: &Array4<f32>) -> Result<(Vec<i64>, Vec<f32>), PipelineError> {
        let shape: Vec<i64> = pixel_values.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = pixel_values.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| caption_error(format!("Failed to create pixel tensor: {e}")))?;

        let mut encoder = self
            .encoder
            .lock()
            .map_err(|e| caption_error(format!("Encoder lock poisoned: {e}")))?;

        let outputs = encoder
            .run(ort::inputs![self.encoder_input.as_str() => input_value])
            .map_err(|e| caption_error(format!("Encoder inference failed: {e}")))?;

        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .ok_or_else(|| caption_error("Encoder did not produce last_hidden_state"))?;

        let (shape, data) = hidden
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| caption_error(format!("Failed to extract hidden states: {e}")))?;

        if shape.len() != 3 {
            return Err(caption_error(format!(
                "Unexpected last_hidden_state shape: {:?}",
                shape
            )));
        }

        Ok((shape.to_vec(), data.to_vec()))
    }
}

/// Slice the logits for the final sequence position out of a `[1, seq, vocab]` tensor.
fn last_position_logits(shape: &[i64], data: &[f32]) -> Result<Vec<f32>, PipelineError> {
    if shape.len() != 3 || shape[1] == 0 {
        return Err(caption_error(format!("Unexpected logits shape: {:?}", shape)));
    }
    let seq_len = shape[1] as usize;
    let vocab = shape[2] as usize;
    let start = (seq_len - 1) * vocab;
    data.get(start..start + vocab)
        .map(|s| s.to_vec())
        .ok_or_else(|| caption_error("Logits buffer shorter than its shape"))
}

/// Greedy decoding loop.
///
/// Starts from `start`, appends the arg-max token from `next_logits` until
/// `eos` is produced or `max_tokens` tokens have been generated. Returns the
/// generated tokens without the start token and without `eos`.
pub(crate) fn greedy_decode<F>(
    start: i64,
    eos: i64,
    max_tokens: usize,
    mut next_logits: F,
) -> Result<Vec<i64>, PipelineError>
where
    F: FnMut(&[i64]) -> Result<Vec<f32>, PipelineError>,
{
    let mut ids = vec![start];
    for _ in 0..max_tokens {
        let logits = next_logits(&ids)?;
        let next = argmax(&logits).ok_or_else(|| caption_error("Decoder produced empty logits"))?;
        let next = next as i64;
        if next == eos {
            break;
        }
        ids.push(next);
    }
    Ok(ids.split_off(1))
}

/// Caption model backed by a local ONNX encoder-decoder.
pub struct OnnxCaptioner {
    session: Arc<EncoderDecoderSession>,
    preprocess: PreprocessOptions,
    decoder_start_token_id: i64,
    eos_token_id: i64,
    name: String,
}

impl OnnxCaptioner {
    /// Load the caption model named in `config` from `model_dir`.
    ///
    /// Expects `{model_dir}/{config.model}/{encoder_model,decoder_model}.onnx`
    /// plus `tokenizer.json`.
    pub fn load(config: &CaptionConfig, model_dir: &Path) -> Result<Self, PipelineError> {
        let dir = model_dir.join(&config.model);
        tracing::info!("Loading caption model from {:?}", dir);
        let session = EncoderDecoderSession::load(&dir)?;
        tracing::info!("Caption model loaded successfully");

        Ok(Self {
            session: Arc::new(session),
            preprocess: PreprocessOptions {
                image_size: config.image_size,
                mean: config.image_mean,
                std: config.image_std,
            },
            decoder_start_token_id: config.decoder_start_token_id,
            eos_token_id: config.eos_token_id,
            name: config.model.clone(),
        })
    }

    /// Check whether all caption model files exist on disk.
    pub fn model_exists(config: &CaptionConfig, model_dir: &Path) -> bool {
        let dir = model_dir.join(&config.model);
        [ENCODER_FILENAME, DECODER_FILENAME, TOKENIZER_FILENAME]
            .iter()
            .all(|f| dir.join(f).exists())
    }
}

#[async_trait]
impl CaptionModel for OnnxCaptioner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn caption(&self, image: &DecodedImage, max_tokens: u32) -> Result<String, PipelineError> {
        // Preprocess on the caller so only the tensor crosses into the blocking pool.
        let tensor = preprocess(&image.image, &self.preprocess);
        let session = self.session.clone();
        let start = self.decoder_start_token_id;
        let eos = self.eos_token_id;

        tokio::task::spawn_blocking(move || {
            session.generate(&tensor, start, eos, max_tokens as usize)
        })
        .await
        .map_err(|e| caption_error(format!("Caption task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Logits that pick `token` out of a vocabulary of `vocab` entries.
    fn one_hot(token: usize, vocab: usize) -> Vec<f32> {
        let mut v = vec![0.0; vocab];
        v[token] = 1.0;
        v
    }

    #[test]
    fn test_greedy_decode_stops_at_eos() {
        let script = [5usize, 7, 9, 2];
        let ids = greedy_decode(0, 2, 20, |ids| Ok(one_hot(script[ids.len() - 1], 10))).unwrap();
        assert_eq!(ids, vec![5, 7, 9]);
    }

    #[test]
    fn test_greedy_decode_respects_max_tokens() {
        let mut calls = 0;
        let ids = greedy_decode(0, 2, 4, |_| {
            calls += 1;
            Ok(one_hot(3, 10))
        })
        .unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_greedy_decode_feeds_growing_prefix() {
        let mut seen = Vec::new();
        greedy_decode(50256, 50256, 3, |ids| {
            seen.push(ids.to_vec());
            Ok(one_hot(ids.len(), 8))
        })
        .unwrap();
        assert_eq!(seen[0], vec![50256]);
        assert_eq!(seen[1], vec![50256, 1]);
        assert_eq!(seen[2], vec![50256, 1, 2]);
    }

    #[test]
    fn test_greedy_decode_immediate_eos_is_empty() {
        let ids = greedy_decode(0, 1, 10, |_| Ok(one_hot(1, 4))).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_greedy_decode_propagates_step_error() {
        let err = greedy_decode(0, 1, 10, |_| Err(caption_error("boom"))).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_last_position_logits() {
        // [1, 2, 3]: second position is [3, 4, 5]
        let data = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let last = last_position_logits(&[1, 2, 3], &data).unwrap();
        assert_eq!(last, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_last_position_logits_rejects_bad_shape() {
        assert!(last_position_logits(&[1, 3], &[0.0; 3]).is_err());
        assert!(last_position_logits(&[1, 2, 4], &[0.0; 3]).is_err());
    }

    #[test]
    fn test_load_missing_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = EncoderDecoderSession::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("models download"));
    }

    #[test]
    fn test_model_exists_false_for_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!OnnxCaptioner::model_exists(
            &CaptionConfig::default(),
            dir.path()
        ));
    }
}
