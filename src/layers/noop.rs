use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::gadget::{GadgetType, Scalar},
};

use super::layer::{GadgetConsumer, Layer, LayerConfig};

/// Identity at inference time (`Noop`, `Dropout`). An optional first param
/// selects which input to pass through.
pub struct NoopLayer {}

impl<T: Scalar> Layer<T> for NoopLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    let ret_idx = layer_config.layer_params.first().copied().unwrap_or(0);
    match usize::try_from(ret_idx).ok().and_then(|idx| tensors.get(idx)) {
      Some(tensor) => Ok(vec![(*tensor).clone()]),
      None => Err(ModelError::invalid_params(
        "Noop",
        format!("cannot return input {} of {}", ret_idx, tensors.len()),
      )),
    }
  }
}

impl GadgetConsumer for NoopLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![]
  }
}
