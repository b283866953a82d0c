//! Image processing pipeline components.
//!
//! - **validate**: size and magic-byte checks before decoding
//! - **hash**: BLAKE3 content hashes
//! - **decode**: format detection and RGB decoding with a timeout
//! - **processor**: the [`CaptionPipeline`] orchestrating caption, hashtags and rephrase
//! - **session**: the cached per-user [`CaptionSession`]

pub mod decode;
pub mod hash;
pub mod processor;
pub mod session;
pub mod validate;

pub use decode::{DecodedImage, ImageDecoder};
pub use hash::Hasher;
pub use processor::CaptionPipeline;
pub use session::CaptionSession;
pub use validate::Validator;
