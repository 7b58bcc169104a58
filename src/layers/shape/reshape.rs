use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::gadget::{GadgetType, Scalar},
  layers::layer::{expect_tensors, flat, to_array, GadgetConsumer, Layer, LayerConfig},
};

pub struct ReshapeLayer {}

impl<T: Scalar> Layer<T> for ReshapeLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    expect_tensors("Reshape", tensors, 1)?;
    let inp = tensors[0];
    let shape = layer_config
      .out_shapes
      .first()
      .cloned()
      .ok_or_else(|| ModelError::invalid_params("Reshape", "missing output shape"))?;

    log::trace!("Reshape: {:?} -> {:?}", inp.shape(), shape);
    Ok(vec![to_array(shape, flat(inp).into_owned())?])
  }
}

impl GadgetConsumer for ReshapeLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![]
  }
}

pub struct FlattenLayer {}

impl<T: Scalar> Layer<T> for FlattenLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], _layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    expect_tensors("Flatten", tensors, 1)?;
    let inp = tensors[0];
    Ok(vec![to_array(vec![inp.len()], flat(inp).into_owned())?])
  }
}

impl GadgetConsumer for FlattenLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reshape_keeps_row_major_order() {
    let inp = to_array(vec![2, 3], (0..6).map(|v| v as f32).collect()).unwrap();
    let layer_config = LayerConfig {
      out_shapes: vec![vec![3, 1, 2]],
      ..LayerConfig::default()
    };
    let out = ReshapeLayer {}.forward(&[&inp], &layer_config).unwrap();
    assert_eq!(out[0].shape(), &[3, 1, 2]);
    assert_eq!(out[0][[2, 0, 1]], 5.0);

    let bad = LayerConfig {
      out_shapes: vec![vec![4, 2]],
      ..LayerConfig::default()
    };
    assert!(matches!(
      ReshapeLayer {}.forward(&[&inp], &bad),
      Err(ModelError::ShapeMismatch(_))
    ));
  }

  #[test]
  fn flatten_to_one_axis() {
    let inp = to_array(vec![2, 2, 2], vec![1.0f64; 8]).unwrap();
    let out = FlattenLayer {}.forward(&[&inp], &LayerConfig::default()).unwrap();
    assert_eq!(out[0].shape(), &[8]);
  }
}
