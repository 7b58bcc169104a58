use std::borrow::Cow;

use ndarray::{Array, ArrayD, IxDyn};

use crate::{
  error::{ModelError, Result},
  gadgets::{
    activation::Activation,
    gadget::{GadgetType, Scalar, SpatialShape},
  },
};

#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum LayerType {
  Activation,
  AvgPool2D,
  BatchNormalization,
  Conv2D,
  Flatten,
  FullyConnected,
  GlobalAvgPool2D,
  GlobalMaxPool2D,
  LayerNormalization,
  MaxPool2D,
  #[default]
  Noop,
  Reshape,
}

#[derive(Clone, Debug, Default)]
pub struct LayerConfig {
  pub layer_type: LayerType,
  pub layer_params: Vec<i64>, // This is turned into layer specific configurations at runtime
  pub activation: Activation,
  pub epsilon: f64,
  pub out_shapes: Vec<Vec<usize>>,
}

// The caller must be aware of the order of the tensors: the layer input comes
// first, followed by the layer's parameter tensors.
pub trait Layer<T: Scalar> {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>>;
}

pub trait GadgetConsumer {
  fn used_gadgets(&self, layer_params: &[i64]) -> Vec<GadgetType>;
}

pub trait LayerOp<T: Scalar>: Layer<T> + GadgetConsumer {}

impl<T: Scalar, L: Layer<T> + GadgetConsumer> LayerOp<T> for L {}

/// Contiguous row-major view of `tensor`, copying only if it is not already.
pub fn flat<T: Clone>(tensor: &ArrayD<T>) -> Cow<'_, [T]> {
  match tensor.as_slice() {
    Some(slice) => Cow::Borrowed(slice),
    None => Cow::Owned(tensor.iter().cloned().collect()),
  }
}

pub fn expect_tensors<T>(layer: &str, tensors: &[&ArrayD<T>], count: usize) -> Result<()> {
  if tensors.len() < count {
    return Err(ModelError::invalid_params(
      layer,
      format!("expected {} tensors, got {}", count, tensors.len()),
    ));
  }
  Ok(())
}

pub fn spatial_shape<T>(layer: &str, tensor: &ArrayD<T>) -> Result<SpatialShape> {
  SpatialShape::from_dims(tensor.shape()).ok_or_else(|| {
    ModelError::ShapeMismatch(format!(
      "{} expects an [H, W, C] input, got {:?}",
      layer,
      tensor.shape()
    ))
  })
}

/// `[H_k, W_k, C_in, X]` dimensions of a convolution kernel.
pub fn kernel_dims<T>(layer: &str, tensor: &ArrayD<T>) -> Result<[usize; 4]> {
  match tensor.shape() {
    &[kh, kw, cin, x] => Ok([kh, kw, cin, x]),
    other => Err(ModelError::ShapeMismatch(format!(
      "{} expects a rank-4 kernel, got {:?}",
      layer, other
    ))),
  }
}

pub fn expect_len<T>(layer: &str, what: &str, tensor: &ArrayD<T>, len: usize) -> Result<()> {
  if tensor.len() != len {
    return Err(ModelError::ShapeMismatch(format!(
      "{} {} has {} elements, expected {}",
      layer,
      what,
      tensor.len(),
      len
    )));
  }
  Ok(())
}

pub fn param_usize(layer: &str, params: &[i64], idx: usize) -> Result<usize> {
  match params.get(idx) {
    Some(&v) if v > 0 => Ok(v as usize),
    Some(&v) => Err(ModelError::invalid_params(
      layer,
      format!("param {} must be positive, got {}", idx, v),
    )),
    None => Err(ModelError::invalid_params(
      layer,
      format!("missing param {} (have {:?})", idx, params),
    )),
  }
}

pub fn to_array<T>(shape: Vec<usize>, data: Vec<T>) -> Result<ArrayD<T>> {
  Array::from_shape_vec(IxDyn(&shape), data)
    .map_err(|e| ModelError::ShapeMismatch(format!("{:?}: {}", shape, e)))
}

#[cfg(test)]
mod tests {
  use ndarray::ShapeBuilder;

  use super::*;

  #[test]
  fn flat_copies_non_standard_layout() {
    let standard = to_array(vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
    assert!(matches!(flat(&standard), Cow::Borrowed(_)));

    let fortran = Array::from_shape_vec(IxDyn(&[2, 2]).f(), vec![1.0f32, 3.0, 2.0, 4.0]).unwrap();
    let view = flat(&fortran);
    assert!(matches!(view, Cow::Owned(_)));
    assert_eq!(&*view, &[1.0, 2.0, 3.0, 4.0]);
  }

  #[test]
  fn params_must_be_positive() {
    assert_eq!(param_usize("MaxPool2D", &[2, 3], 1).unwrap(), 3);
    assert!(param_usize("MaxPool2D", &[2, 0], 1).is_err());
    assert!(param_usize("MaxPool2D", &[2], 3).is_err());
  }

  #[test]
  fn kernel_dims_require_rank_four() {
    let kernel = to_array(vec![3, 3, 2, 4], vec![0.0f64; 72]).unwrap();
    assert_eq!(kernel_dims("Conv2D", &kernel).unwrap(), [3, 3, 2, 4]);
    let bias = to_array(vec![4], vec![0.0f64; 4]).unwrap();
    assert!(kernel_dims("Conv2D", &bias).is_err());
  }
}
