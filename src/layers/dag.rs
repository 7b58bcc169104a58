use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    gadget::{GadgetType, Scalar},
    pool::PoolKind,
  },
  layers::{
    activation::ActivationLayer,
    conv2d::Conv2DLayer,
    fully_connected::FullyConnectedLayer,
    layer::{GadgetConsumer, Layer, LayerOp, LayerType},
    noop::NoopLayer,
    normalization::{BatchNormLayer, LayerNormLayer},
    pool_2d::{GlobalPool2DLayer, Pool2DLayer},
    shape::reshape::{FlattenLayer, ReshapeLayer},
  },
};

use super::layer::LayerConfig;

#[derive(Clone, Debug, Default)]
pub struct DAGLayerConfig {
  pub ops: Vec<LayerConfig>,
  pub inp_idxes: Vec<Vec<usize>>,
  pub out_idxes: Vec<Vec<usize>>,
  pub final_out_idxes: Vec<usize>,
}

pub fn layer_for<T: Scalar>(layer_type: LayerType) -> Box<dyn LayerOp<T>> {
  match layer_type {
    LayerType::Activation => Box::new(ActivationLayer {}),
    LayerType::AvgPool2D => Box::new(Pool2DLayer {
      kind: PoolKind::Average,
    }),
    LayerType::BatchNormalization => Box::new(BatchNormLayer {}),
    LayerType::Conv2D => Box::new(Conv2DLayer {}),
    LayerType::Flatten => Box::new(FlattenLayer {}),
    LayerType::FullyConnected => Box::new(FullyConnectedLayer {}),
    LayerType::GlobalAvgPool2D => Box::new(GlobalPool2DLayer {
      kind: PoolKind::Average,
    }),
    LayerType::GlobalMaxPool2D => Box::new(GlobalPool2DLayer { kind: PoolKind::Max }),
    LayerType::LayerNormalization => Box::new(LayerNormLayer {}),
    LayerType::MaxPool2D => Box::new(Pool2DLayer { kind: PoolKind::Max }),
    LayerType::Noop => Box::new(NoopLayer {}),
    LayerType::Reshape => Box::new(ReshapeLayer {}),
  }
}

pub struct DAGLayer<T: Scalar> {
  dag_config: DAGLayerConfig,
  layers: Vec<Box<dyn LayerOp<T>>>,
}

impl<T: Scalar> DAGLayer<T> {
  /// Every op needs one list of input and one list of output indices.
  pub fn construct(dag_config: DAGLayerConfig) -> Result<Self> {
    let num_ops = dag_config.ops.len();
    if dag_config.inp_idxes.len() != num_ops || dag_config.out_idxes.len() != num_ops {
      return Err(ModelError::invalid_params(
        "DAG",
        format!(
          "{} ops but {} input and {} output index lists",
          num_ops,
          dag_config.inp_idxes.len(),
          dag_config.out_idxes.len()
        ),
      ));
    }
    let layers = dag_config
      .ops
      .iter()
      .map(|op| layer_for(op.layer_type))
      .collect();
    Ok(Self { dag_config, layers })
  }

  /// Kernel families needed by the ops, given their params.
  pub fn used_gadgets(&self) -> BTreeSet<GadgetType> {
    self
      .layers
      .iter()
      .zip(self.dag_config.ops.iter())
      .flat_map(|(layer, op)| layer.used_gadgets(&op.layer_params))
      .collect()
  }

  pub fn config(&self) -> &DAGLayerConfig {
    &self.dag_config
  }

  // Layers run in order. Each reads its inputs from tensors produced so far or
  // from `params`; a produced tensor shadows a parameter with the same index.
  pub fn forward(
    &self,
    params: &BTreeMap<usize, ArrayD<T>>,
    inputs: Vec<(usize, ArrayD<T>)>,
  ) -> Result<Vec<ArrayD<T>>> {
    let mut tensor_map: HashMap<usize, ArrayD<T>> = inputs.into_iter().collect();

    for (layer_idx, (layer, layer_config)) in self.layers.iter().zip(self.dag_config.ops.iter()).enumerate() {
      let (inp_idxes, out_idxes) = match (
        self.dag_config.inp_idxes.get(layer_idx),
        self.dag_config.out_idxes.get(layer_idx),
      ) {
        (Some(inp), Some(out)) => (inp, out),
        _ => return Err(ModelError::invalid_params("DAG", format!("no indices for op {}", layer_idx))),
      };
      log::debug!(
        "Processing layer {}, type: {:?}, inp_idxes: {:?}, out_idxes: {:?}, layer_params: {:?}",
        layer_idx,
        layer_config.layer_type,
        inp_idxes,
        out_idxes,
        layer_config.layer_params
      );

      let out = {
        let vec_inps = inp_idxes
          .iter()
          .map(|idx| {
            tensor_map
              .get(idx)
              .or_else(|| params.get(idx))
              .ok_or(ModelError::MissingTensor(*idx))
          })
          .collect::<Result<Vec<_>>>()?;
        layer.forward(&vec_inps, layer_config)?
      };

      if out.len() < out_idxes.len() {
        return Err(ModelError::ShapeMismatch(format!(
          "layer {} ({:?}) produced {} outputs, {} expected",
          layer_idx,
          layer_config.layer_type,
          out.len(),
          out_idxes.len()
        )));
      }
      for (tensor_idx, tensor) in out_idxes.iter().zip(out.into_iter()) {
        log::debug!("Out {} shape: {:?}", tensor_idx, tensor.shape());
        tensor_map.insert(*tensor_idx, tensor);
      }
    }

    self
      .dag_config
      .final_out_idxes
      .iter()
      .map(|idx| match tensor_map.remove(idx) {
        Some(tensor) => Ok(tensor),
        None => params.get(idx).cloned().ok_or(ModelError::MissingTensor(*idx)),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{gadgets::activation::Activation, layers::layer::to_array};

  fn op(layer_type: LayerType, activation: Activation) -> LayerConfig {
    LayerConfig {
      layer_type,
      activation,
      ..LayerConfig::default()
    }
  }

  #[test]
  fn chains_layers_through_the_tensor_map() {
    // 0: input [2], 1: weights [2, 2], 2: bias [2]
    let mut params = BTreeMap::new();
    params.insert(1, to_array(vec![2, 2], vec![1.0f64, -1.0, 1.0, -1.0]).unwrap());
    params.insert(2, to_array(vec![2], vec![0.0, 0.0]).unwrap());

    let dag = DAGLayer::construct(DAGLayerConfig {
      ops: vec![
        op(LayerType::FullyConnected, Activation::Linear),
        op(LayerType::Activation, Activation::Relu),
      ],
      inp_idxes: vec![vec![0, 1, 2], vec![3]],
      out_idxes: vec![vec![3], vec![4]],
      final_out_idxes: vec![4, 3],
    })
    .unwrap();
    let inp = to_array(vec![2], vec![2.0, 3.0]).unwrap();
    let out = dag.forward(&params, vec![(0, inp)]).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].iter().cloned().collect::<Vec<_>>(), vec![5.0, 0.0]);
    assert_eq!(out[1].iter().cloned().collect::<Vec<_>>(), vec![5.0, -5.0]);
  }

  #[test]
  fn missing_input_is_reported() {
    let dag = DAGLayer::<f32>::construct(DAGLayerConfig {
      ops: vec![op(LayerType::Activation, Activation::Relu)],
      inp_idxes: vec![vec![7]],
      out_idxes: vec![vec![8]],
      final_out_idxes: vec![8],
    })
    .unwrap();
    let inp = to_array(vec![1], vec![1.0f32]).unwrap();
    assert!(matches!(
      dag.forward(&BTreeMap::new(), vec![(0, inp)]),
      Err(ModelError::MissingTensor(7))
    ));
  }

  #[test]
  fn index_lists_must_cover_every_op() {
    let dag = DAGLayer::<f32>::construct(DAGLayerConfig {
      ops: vec![
        op(LayerType::Activation, Activation::Relu),
        op(LayerType::Flatten, Activation::Linear),
      ],
      inp_idxes: vec![vec![0]],
      out_idxes: vec![vec![1], vec![2]],
      final_out_idxes: vec![2],
    });
    assert!(matches!(dag, Err(ModelError::InvalidParams { .. })));
  }

  #[test]
  fn reports_gadgets_from_op_params() {
    let conv = LayerConfig {
      layer_type: LayerType::Conv2D,
      layer_params: vec![1, 0, 1, 1],
      ..LayerConfig::default()
    };
    let dag = DAGLayer::<f32>::construct(DAGLayerConfig {
      ops: vec![conv, op(LayerType::MaxPool2D, Activation::Linear)],
      inp_idxes: vec![vec![0, 1], vec![2]],
      out_idxes: vec![vec![2], vec![3]],
      final_out_idxes: vec![3],
    })
    .unwrap();
    let expected: BTreeSet<_> = [GadgetType::Activation, GadgetType::DepthwiseConv2D, GadgetType::Pool]
      .into_iter()
      .collect();
    assert_eq!(dag.used_gadgets(), expected);
  }
}
