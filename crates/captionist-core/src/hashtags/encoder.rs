//! ONNX sentence encoder (MiniLM and other BERT-style exports).
//!
//! Loads `model.onnx` and `tokenizer.json`, pads a batch to its longest
//! sequence, and mean-pools `last_hidden_state` over the tokenizer's
//! attention mask.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{DynValue, Value};

use super::keybert::TextEmbedder;
use crate::error::PipelineError;
use crate::math::l2_normalize_in_place;

pub(crate) const MODEL_FILENAME: &str = "model.onnx";
pub(crate) const TOKENIZER_FILENAME: &str = "tokenizer.json";

fn hashtag_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Hashtag {
        message: message.into(),
    }
}

/// Sentence encoder wrapper.
pub struct OnnxSentenceEncoder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    max_length: usize,
    wants_token_type_ids: bool,
}

impl OnnxSentenceEncoder {
    /// Load the encoder from `model_dir`.
    pub fn load(model_dir: &Path, max_length: usize) -> Result<Self, PipelineError> {
        let model_path = model_dir.join(MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(PipelineError::Model {
                    message: format!(
                        "Sentence encoder file not found at {:?}. Run `captionist models download` first.",
                        path
                    ),
                });
            }
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load sentence encoder: {e}"),
            })?;

        let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;
        // Exports often pin fixed-length padding; the batch is padded here instead.
        tokenizer.with_padding(None);

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let wants_token_type_ids = input_names.iter().any(|n| n == "token_type_ids");

        tracing::debug!("Loaded sentence encoder (inputs: {:?})", input_names);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_length,
            wants_token_type_ids,
        })
    }

    /// Check whether the encoder files exist.
    pub fn model_exists(model_dir: &Path) -> bool {
        model_dir.join(MODEL_FILENAME).exists() && model_dir.join(TOKENIZER_FILENAME).exists()
    }
}

impl TextEmbedder for OnnxSentenceEncoder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| hashtag_error(format!("Tokenization failed: {e}")))?;

        let rows: Vec<TokenRow<'_>> = encodings
            .iter()
            .map(|e| TokenRow {
                ids: e.get_ids(),
                type_ids: e.get_type_ids(),
                mask: e.get_attention_mask(),
            })
            .collect();
        let BatchInputs {
            batch_size,
            seq_len,
            input_ids,
            attention_mask,
            token_type_ids,
        } = build_batch(&rows, self.max_length);

        let shape = vec![batch_size as i64, seq_len as i64];
        let tensor = |name: &str, data: Vec<i64>| -> Result<DynValue, PipelineError> {
            Value::from_array((shape.clone(), data))
                .map(|v| v.into_dyn())
                .map_err(|e| hashtag_error(format!("Failed to create {name}: {e}")))
        };

        let mut inputs: Vec<(&str, DynValue)> = vec![
            ("input_ids", tensor("input_ids", input_ids)?),
            ("attention_mask", tensor("attention_mask", attention_mask.clone())?),
        ];
        if self.wants_token_type_ids {
            inputs.push(("token_type_ids", tensor("token_type_ids", token_type_ids)?));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|e| hashtag_error(format!("Sentence encoder lock poisoned: {e}")))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| hashtag_error(format!("Sentence encoder inference failed: {e}")))?;

        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .ok_or_else(|| hashtag_error("Sentence encoder did not produce last_hidden_state"))?;

        let (out_shape, data) = hidden
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| hashtag_error(format!("Failed to extract last_hidden_state: {e}")))?;

        mean_pool(out_shape, data, &attention_mask)
    }
}

/// One tokenized text as produced by the tokenizer.
struct TokenRow<'a> {
    ids: &'a [u32],
    type_ids: &'a [u32],
    mask: &'a [u32],
}

/// Row-major `[batch, seq]` input tensors.
#[derive(Debug)]
struct BatchInputs {
    batch_size: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

/// Lay out a batch padded to its longest real sequence, capped at `max_length`.
///
/// The mask is copied from the tokenizer, so padding the tokenizer added
/// itself stays masked out. Positions past a row's end are zero.
fn build_batch(rows: &[TokenRow<'_>], max_length: usize) -> BatchInputs {
    let real_len = |row: &TokenRow<'_>| {
        row.mask
            .iter()
            .rposition(|&m| m != 0)
            .map_or(0, |last| last + 1)
    };
    let seq_len = rows
        .iter()
        .map(|row| real_len(row).min(max_length))
        .max()
        .unwrap_or(0)
        .max(1);

    let batch_size = rows.len();
    let mut input_ids = vec![0i64; batch_size * seq_len];
    let mut attention_mask = vec![0i64; batch_size * seq_len];
    let mut token_type_ids = vec![0i64; batch_size * seq_len];

    for (i, row) in rows.iter().enumerate() {
        let offset = i * seq_len;
        for (j, ((&id, &mask), &type_id)) in row
            .ids
            .iter()
            .zip(row.mask)
            .zip(row.type_ids)
            .take(seq_len)
            .enumerate()
        {
            input_ids[offset + j] = id as i64;
            attention_mask[offset + j] = mask as i64;
            token_type_ids[offset + j] = type_id as i64;
        }
    }

    BatchInputs {
        batch_size,
        seq_len,
        input_ids,
        attention_mask,
        token_type_ids,
    }
}

/// Attention-masked mean over the sequence axis of `[batch, seq, dim]`,
/// followed by L2 normalization of each row.
fn mean_pool(shape: &[i64], data: &[f32], mask: &[i64]) -> Result<Vec<Vec<f32>>, PipelineError> {
    if shape.len() != 3 {
        return Err(hashtag_error(format!(
            "Unexpected last_hidden_state shape: {:?}",
            shape
        )));
    }
    let (batch, seq, dim) = (shape[0] as usize, shape[1] as usize, shape[2] as usize);
    if data.len() < batch * seq * dim || mask.len() < batch * seq {
        return Err(hashtag_error("Hidden state buffer shorter than its shape"));
    }

    let mut pooled = Vec::with_capacity(batch);
    for b in 0..batch {
        let mut sum = vec![0.0f32; dim];
        let mut count = 0.0f32;
        for s in 0..seq {
            if mask[b * seq + s] == 0 {
                continue;
            }
            count += 1.0;
            let row = &data[(b * seq + s) * dim..(b * seq + s + 1) * dim];
            for (acc, v) in sum.iter_mut().zip(row) {
                *acc += v;
            }
        }
        let count = count.max(1e-9);
        for v in sum.iter_mut() {
            *v /= count;
        }
        l2_normalize_in_place(&mut sum);
        pooled.push(sum);
    }
    Ok(pooled)
}
