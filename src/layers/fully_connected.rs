use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    dot_prod::dense_activated,
    gadget::{GadgetType, Scalar},
  },
};

use super::layer::{expect_len, expect_tensors, flat, to_array, GadgetConsumer, Layer, LayerConfig};

const NAME: &str = "FullyConnected";

pub struct FullyConnectedLayer {}

impl<T: Scalar> Layer<T> for FullyConnectedLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    expect_tensors(NAME, tensors, 3)?;
    let input = tensors[0];
    let weight = tensors[1];

    // Any input rank is accepted and read as a flat feature vector.
    let (input_size, output_size) = match weight.shape() {
      &[n, m] => (n, m),
      other => {
        return Err(ModelError::ShapeMismatch(format!(
          "{} expects [input_size, output_size] weights, got {:?}",
          NAME, other
        )))
      }
    };
    expect_len(NAME, "input", input, input_size)?;
    expect_len(NAME, "bias", tensors[2], output_size)?;

    let mut outp = vec![T::zero(); output_size];
    dense_activated(
      &flat(input),
      &flat(weight),
      &flat(tensors[2]),
      layer_config.activation,
      &mut outp,
    );
    Ok(vec![to_array(vec![output_size], outp)?])
  }
}

impl GadgetConsumer for FullyConnectedLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::DotProduct, GadgetType::Activation]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gadgets::activation::Activation;

  #[test]
  fn projects_flattened_input() {
    let inp = to_array(vec![1, 2], vec![4.0f32, 5.0]).unwrap();
    let weight = to_array(vec![2, 1], vec![2.0, 3.0]).unwrap();
    let bias = to_array(vec![1], vec![1.0]).unwrap();
    let out = FullyConnectedLayer {}
      .forward(&[&inp, &weight, &bias], &LayerConfig::default())
      .unwrap();
    assert_eq!(out[0].shape(), &[1]);
    assert_eq!(out[0][[0]], 24.0);
  }

  #[test]
  fn applies_layer_activation() {
    let inp = to_array(vec![2], vec![1.0f64, -1.0]).unwrap();
    let weight = to_array(vec![2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
    let bias = to_array(vec![2], vec![0.0, 0.0]).unwrap();
    let layer_config = LayerConfig {
      activation: Activation::Elu { alpha: 2.0 },
      ..LayerConfig::default()
    };
    let out = FullyConnectedLayer {}
      .forward(&[&inp, &weight, &bias], &layer_config)
      .unwrap();
    assert_eq!(out[0][[0]], 1.0);
    assert!((out[0][[1]] - 2.0 * ((-1.0f64).exp() - 1.0)).abs() < 1e-15);
  }

  #[test]
  fn rejects_mismatched_input() {
    let inp = to_array(vec![3], vec![1.0f32; 3]).unwrap();
    let weight = to_array(vec![2, 2], vec![1.0; 4]).unwrap();
    let bias = to_array(vec![2], vec![0.0; 2]).unwrap();
    assert!(matches!(
      FullyConnectedLayer {}.forward(&[&inp, &weight, &bias], &LayerConfig::default()),
      Err(ModelError::ShapeMismatch(_))
    ));
  }
}
