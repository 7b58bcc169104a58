use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    gadget::{GadgetType, Scalar},
    normalization::{batch_norm, layer_norm},
  },
};

use super::layer::{expect_tensors, flat, to_array, GadgetConsumer, Layer, LayerConfig};

/// Number of features the parameters cover; the input must be a whole number
/// of feature groups, laid out feature-fastest.
fn feature_groups<T>(layer: &str, input: &ArrayD<T>, features: usize) -> Result<usize> {
  if features == 0 || input.len() % features != 0 {
    return Err(ModelError::ShapeMismatch(format!(
      "{} has {} parameters but input shape is {:?}",
      layer,
      features,
      input.shape()
    )));
  }
  Ok(input.len() / features)
}

fn check_params<T>(layer: &str, tensors: &[&ArrayD<T>], features: usize) -> Result<()> {
  for (i, t) in tensors.iter().enumerate().skip(1) {
    if t.len() != features {
      return Err(ModelError::ShapeMismatch(format!(
        "{} parameter {} has {} elements, expected {}",
        layer,
        i,
        t.len(),
        features
      )));
    }
  }
  Ok(())
}

pub struct BatchNormLayer {}

impl<T: Scalar> Layer<T> for BatchNormLayer {
  // tensors: input, gamma, beta, mean, variance
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    const NAME: &str = "BatchNormalization";
    expect_tensors(NAME, tensors, 5)?;
    let features = tensors[1].len();
    check_params(NAME, &tensors[..5], features)?;
    feature_groups(NAME, tensors[0], features)?;

    let input = flat(tensors[0]);
    let (gamma, beta) = (flat(tensors[1]), flat(tensors[2]));
    let (mean, variance) = (flat(tensors[3]), flat(tensors[4]));
    let epsilon = T::from_f64(layer_config.epsilon);

    let mut outp = vec![T::zero(); input.len()];
    // For spatial inputs every pixel is one group of channels.
    for (inp, out) in input.chunks(features).zip(outp.chunks_mut(features)) {
      batch_norm(inp, &gamma, &beta, &mean, &variance, epsilon, out);
    }
    Ok(vec![to_array(tensors[0].shape().to_vec(), outp)?])
  }
}

impl GadgetConsumer for BatchNormLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::BatchNorm]
  }
}

pub struct LayerNormLayer {}

impl<T: Scalar> Layer<T> for LayerNormLayer {
  // tensors: input, gamma, beta. Statistics are taken over the last axis.
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    const NAME: &str = "LayerNormalization";
    expect_tensors(NAME, tensors, 3)?;
    let features = tensors[1].len();
    check_params(NAME, &tensors[..3], features)?;
    if tensors[0].shape().last() != Some(&features) {
      return Err(ModelError::ShapeMismatch(format!(
        "{} has {} parameters but the last axis of {:?} differs",
        NAME,
        features,
        tensors[0].shape()
      )));
    }
    feature_groups(NAME, tensors[0], features)?;

    let input = flat(tensors[0]);
    let (gamma, beta) = (flat(tensors[1]), flat(tensors[2]));
    let epsilon = T::from_f64(layer_config.epsilon);

    let mut outp = vec![T::zero(); input.len()];
    for (inp, out) in input.chunks(features).zip(outp.chunks_mut(features)) {
      layer_norm(inp, &gamma, &beta, epsilon, out);
    }
    Ok(vec![to_array(tensors[0].shape().to_vec(), outp)?])
  }
}

impl GadgetConsumer for LayerNormLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::LayerNorm]
  }
}
