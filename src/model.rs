use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
};

use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    activation::Activation,
    gadget::{GadgetType, Scalar},
  },
  layers::{
    dag::{DAGLayer, DAGLayerConfig},
    layer::{flat, to_array, LayerConfig, LayerType},
  },
  utils::loader::{load_config, ModelMsgpack},
};

const DEFAULT_EPSILON: f64 = 1e-3;

/// Per-element min-max scaling. A single pair applies to every element.
#[derive(Clone, Debug, PartialEq)]
pub struct MinMaxScaling<T> {
  pub norms: Vec<T>,
  pub mins: Vec<T>,
}

impl<T: Scalar> MinMaxScaling<T> {
  fn from_pair(what: &str, norms: Option<&Vec<f64>>, mins: Option<&Vec<f64>>) -> Result<Option<Self>> {
    match (norms, mins) {
      (Some(norms), Some(mins)) => {
        if norms.len() != mins.len() || norms.is_empty() {
          return Err(ModelError::invalid_params(
            "Model",
            format!("{} has {} norms and {} mins", what, norms.len(), mins.len()),
          ));
        }
        Ok(Some(Self {
          norms: norms.iter().map(|&x| T::from_f64(x)).collect(),
          mins: mins.iter().map(|&x| T::from_f64(x)).collect(),
        }))
      }
      (None, None) => Ok(None),
      _ => {
        log::warn!("{} scaling needs both norms and mins, ignoring it", what);
        Ok(None)
      }
    }
  }

  fn check_len(&self, what: &str, len: usize) -> Result<()> {
    if self.norms.len() != 1 && self.norms.len() != len {
      return Err(ModelError::ShapeMismatch(format!(
        "{} scaling has {} entries for {} values",
        what,
        self.norms.len(),
        len
      )));
    }
    Ok(())
  }

  fn pair(&self, i: usize) -> (T, T) {
    let i = if self.norms.len() == 1 { 0 } else { i };
    (self.norms[i], self.mins[i])
  }

  /// `(x - min) / norm`
  pub fn normalize(&self, data: &mut [T]) {
    for (i, x) in data.iter_mut().enumerate() {
      let (norm, min) = self.pair(i);
      *x = (*x - min) / norm;
    }
  }

  /// `y * norm + min`
  pub fn denormalize(&self, data: &mut [T]) {
    for (i, y) in data.iter_mut().enumerate() {
      let (norm, min) = self.pair(i);
      *y = *y * norm + min;
    }
  }
}

pub struct Model<T: Scalar> {
  pub used_gadgets: BTreeSet<GadgetType>,
  pub tensors: BTreeMap<usize, ArrayD<T>>,
  pub inp_idx: usize,
  pub inp_shape: Vec<usize>,
  pub input_scaling: Option<MinMaxScaling<T>>,
  pub output_scaling: Option<MinMaxScaling<T>>,
  dag: DAGLayer<T>,
}

fn to_usize(what: &str, x: i64) -> Result<usize> {
  usize::try_from(x).map_err(|_| ModelError::invalid_params("Model", format!("negative {}: {}", what, x)))
}

fn to_usizes(what: &str, xs: &[i64]) -> Result<Vec<usize>> {
  xs.iter().map(|&x| to_usize(what, x)).collect()
}

pub fn match_layer(name: &str) -> Result<LayerType> {
  Ok(match name {
    "Activation" => LayerType::Activation,
    "AveragePool2D" | "AvgPool2D" | "AveragePooling2D" => LayerType::AvgPool2D,
    "BatchNormalization" => LayerType::BatchNormalization,
    "Conv2D" => LayerType::Conv2D,
    "Dense" | "FullyConnected" => LayerType::FullyConnected,
    "Flatten" => LayerType::Flatten,
    "GlobalAveragePool2D" | "GlobalAveragePooling2D" => LayerType::GlobalAvgPool2D,
    "GlobalMaxPool2D" | "GlobalMaxPooling2D" => LayerType::GlobalMaxPool2D,
    "LayerNormalization" => LayerType::LayerNormalization,
    "MaxPool2D" | "MaxPooling2D" => LayerType::MaxPool2D,
    "Noop" | "Dropout" | "InputLayer" => LayerType::Noop,
    "Reshape" => LayerType::Reshape,
    _ => return Err(ModelError::UnknownLayer(name.to_string())),
  })
}

impl<T: Scalar> Model<T> {
  pub fn generate_from_file<P: AsRef<Path>>(config_file: P) -> Result<Self> {
    let config = load_config(config_file)?;
    Self::generate_from_msgpack(config)
  }

  pub fn generate_from_msgpack(config: ModelMsgpack) -> Result<Self> {
    let mut tensors = BTreeMap::new();
    for tensor in config.tensors {
      let idx = to_usize("tensor index", tensor.idx)?;
      let shape = to_usizes("tensor dimension", &tensor.shape)?;
      let data = tensor.data.iter().map(|&x| T::from_f64(x)).collect::<Vec<_>>();
      if tensors.insert(idx, to_array(shape, data)?).is_some() {
        log::warn!("tensor {} is defined twice, keeping the last one", idx);
      }
    }

    let mut ops = vec![];
    let mut inp_idxes = vec![];
    let mut out_idxes = vec![];
    for layer in config.layers.iter() {
      let layer_type = match_layer(&layer.layer_type)?;

      let activation = match &layer.activation {
        Some(name) => Activation::from_name(name, layer.alpha)?,
        None => Activation::Linear,
      };
      if layer.epsilon.is_some()
        && !matches!(
          layer_type,
          LayerType::BatchNormalization | LayerType::LayerNormalization
        )
      {
        log::warn!("{} layer ignores epsilon", layer.layer_type);
      }
      ops.push(LayerConfig {
        layer_type,
        layer_params: layer.params.clone(),
        activation,
        epsilon: layer.epsilon.unwrap_or(DEFAULT_EPSILON),
        out_shapes: layer
          .out_shapes
          .iter()
          .map(|shape| to_usizes("output dimension", shape))
          .collect::<Result<Vec<_>>>()?,
      });
      inp_idxes.push(to_usizes("input index", &layer.inp_idxes)?);
      out_idxes.push(to_usizes("output index", &layer.out_idxes)?);
    }

    let dag_config = DAGLayerConfig {
      ops,
      inp_idxes,
      out_idxes,
      final_out_idxes: to_usizes("output index", &config.out_idxes)?,
    };

    let inp_shape = to_usizes("input dimension", &config.inp_shape)?;
    let input_scaling = MinMaxScaling::from_pair(
      "input",
      config.input_norms.as_ref(),
      config.input_mins.as_ref(),
    )?;
    if let Some(scaling) = &input_scaling {
      scaling.check_len("input", inp_shape.iter().product())?;
    }
    let output_scaling = MinMaxScaling::from_pair(
      "output",
      config.output_norms.as_ref(),
      config.output_mins.as_ref(),
    )?;

    let dag = DAGLayer::construct(dag_config)?;
    let used_gadgets = dag.used_gadgets();
    log::info!(
      "model with {} layers, {} parameter tensors, kernels {:?}",
      dag.config().ops.len(),
      tensors.len(),
      used_gadgets
    );

    Ok(Model {
      used_gadgets,
      tensors,
      inp_idx: to_usize("input index", config.inp_idx)?,
      inp_shape,
      input_scaling,
      output_scaling,
      dag,
    })
  }

  pub fn input_size(&self) -> usize {
    self.inp_shape.iter().product()
  }

  pub fn dag_config(&self) -> &DAGLayerConfig {
    self.dag.config()
  }

  /// Runs the model on a flat input and returns every output tensor.
  pub fn forward_tensors(&self, input: &[T]) -> Result<Vec<ArrayD<T>>> {
    let expected = self.input_size();
    if input.len() != expected {
      return Err(ModelError::InvalidInputSize {
        expected,
        got: input.len(),
      });
    }

    let mut data = input.to_vec();
    if let Some(scaling) = &self.input_scaling {
      scaling.normalize(&mut data);
    }
    let inp = to_array(self.inp_shape.clone(), data)?;
    let mut outputs = self.dag.forward(&self.tensors, vec![(self.inp_idx, inp)])?;

    if let (Some(scaling), Some(first)) = (&self.output_scaling, outputs.first_mut()) {
      scaling.check_len("output", first.len())?;
      let mut data = flat(first).into_owned();
      scaling.denormalize(&mut data);
      *first = to_array(first.shape().to_vec(), data)?;
    }
    Ok(outputs)
  }

  /// Runs the model and returns its first output flattened.
  pub fn forward(&self, input: &[T]) -> Result<Vec<T>> {
    let outputs = self.forward_tensors(input)?;
    match outputs.first() {
      Some(out) => Ok(flat(out).into_owned()),
      None => Ok(vec![]),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::loader::{LayerMsgpack, TensorMsgpack};

  fn dense_model() -> ModelMsgpack {
    ModelMsgpack {
      inp_idx: 0,
      inp_shape: vec![2],
      out_idxes: vec![3],
      tensors: vec![
        TensorMsgpack {
          idx: 1,
          shape: vec![2, 1],
          data: vec![2.0, 3.0],
        },
        TensorMsgpack {
          idx: 2,
          shape: vec![1],
          data: vec![1.0],
        },
      ],
      layers: vec![LayerMsgpack {
        layer_type: "Dense".to_string(),
        params: vec![],
        activation: Some("relu".to_string()),
        alpha: None,
        epsilon: None,
        inp_idxes: vec![0, 1, 2],
        out_idxes: vec![3],
        out_shapes: vec![vec![1]],
      }],
      input_norms: None,
      input_mins: None,
      output_norms: None,
      output_mins: None,
    }
  }

  #[test]
  fn dense_forward_and_gadgets() {
    let model = Model::<f32>::generate_from_msgpack(dense_model()).unwrap();
    assert_eq!(model.forward(&[4.0, 5.0]).unwrap(), vec![24.0]);
    assert_eq!(model.forward(&[-4.0, -5.0]).unwrap(), vec![0.0]);
    assert!(model.used_gadgets.contains(&GadgetType::DotProduct));
  }

  #[test]
  fn rejects_wrong_input_size() {
    let model = Model::<f64>::generate_from_msgpack(dense_model()).unwrap();
    match model.forward(&[1.0, 2.0, 3.0]) {
      Err(ModelError::InvalidInputSize { expected, got }) => {
        assert_eq!((expected, got), (2, 3));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn applies_min_max_scaling() {
    let mut config = dense_model();
    config.input_norms = Some(vec![2.0, 0.5]);
    config.input_mins = Some(vec![1.0, 1.0]);
    config.output_norms = Some(vec![10.0]);
    config.output_mins = Some(vec![-1.0]);
    let model = Model::<f64>::generate_from_msgpack(config).unwrap();
    // (5-1)/2 = 2, (2-1)/0.5 = 2, 2*2 + 2*3 + 1 = 11, 11*10 - 1
    assert_eq!(model.forward(&[5.0, 2.0]).unwrap(), vec![109.0]);
  }

  #[test]
  fn unknown_names_are_rejected() {
    let mut config = dense_model();
    config.layers[0].layer_type = "Attention".to_string();
    assert!(matches!(
      Model::<f32>::generate_from_msgpack(config),
      Err(ModelError::UnknownLayer(_))
    ));

    let mut config = dense_model();
    config.layers[0].activation = Some("gelu".to_string());
    assert!(matches!(
      Model::<f32>::generate_from_msgpack(config),
      Err(ModelError::UnknownActivation(_))
    ));
  }

  #[test]
  fn activation_without_alpha_uses_default() {
    let mut config = dense_model();
    config.out_idxes = vec![4];
    config.layers.push(LayerMsgpack {
      layer_type: "Activation".to_string(),
      params: vec![],
      activation: Some("elu".to_string()),
      alpha: None,
      epsilon: None,
      inp_idxes: vec![0],
      out_idxes: vec![4],
      out_shapes: vec![],
    });
    let model = Model::<f64>::generate_from_msgpack(config.clone()).unwrap();
    let out = model.forward(&[-1.0, 2.0]).unwrap();
    assert!((out[0] - ((-1.0f64).exp() - 1.0)).abs() < 1e-15);
    assert_eq!(out[1], 2.0);

    config.layers[1].activation = Some("leakyRelu".to_string());
    let model = Model::<f64>::generate_from_msgpack(config).unwrap();
    assert_eq!(model.forward(&[-1.0, 2.0]).unwrap(), vec![-0.01, 2.0]);
  }

  #[test]
  fn mismatched_scaling_is_rejected() {
    let mut config = dense_model();
    config.input_norms = Some(vec![1.0, 1.0, 1.0]);
    config.input_mins = Some(vec![0.0, 0.0, 0.0]);
    assert!(Model::<f32>::generate_from_msgpack(config).is_err());
  }
}
