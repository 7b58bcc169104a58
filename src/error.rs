use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("Invalid input size. Expected size: {expected}, got: {got}")]
  InvalidInputSize { expected: usize, got: usize },

  #[error("unknown layer type: {0}")]
  UnknownLayer(String),

  #[error("unknown activation: {0}")]
  UnknownActivation(String),

  #[error("invalid params for {layer}: {reason}")]
  InvalidParams { layer: String, reason: String },

  #[error("tensor {0} is not available")]
  MissingTensor(usize),

  #[error("shape mismatch: {0}")]
  ShapeMismatch(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("msgpack decode error: {0}")]
  Msgpack(#[from] rmp_serde::decode::Error),

  #[error("msgpack encode error: {0}")]
  MsgpackEncode(#[from] rmp_serde::encode::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl ModelError {
  pub fn invalid_params(layer: &str, reason: impl Into<String>) -> Self {
    ModelError::InvalidParams {
      layer: layer.to_string(),
      reason: reason.into(),
    }
  }
}
