use ndarray::ArrayD;

use crate::{
  error::Result,
  gadgets::gadget::{GadgetType, Scalar},
};

use super::layer::{expect_tensors, GadgetConsumer, Layer, LayerConfig};

pub struct ActivationLayer {}

impl<T: Scalar> Layer<T> for ActivationLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    expect_tensors("Activation", tensors, 1)?;
    let mut out = tensors[0].to_owned();
    match out.as_slice_mut() {
      Some(data) => layer_config.activation.apply_inplace(data),
      None => out.mapv_inplace(|x| layer_config.activation.apply(x)),
    }
    Ok(vec![out])
  }
}

impl GadgetConsumer for ActivationLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::Activation]
  }
}
