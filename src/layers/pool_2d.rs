use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    gadget::{GadgetType, Scalar},
    pool::{global_pool_2d, pool_2d, pool_out_shape, PoolKind},
  },
};

use super::layer::{
  expect_tensors, flat, param_usize, spatial_shape, to_array, GadgetConsumer, Layer, LayerConfig,
};

pub struct Pool2DLayer {
  pub kind: PoolKind,
}

impl Pool2DLayer {
  fn name(&self) -> &'static str {
    match self.kind {
      PoolKind::Max => "MaxPool2D",
      PoolKind::Average => "AvgPool2D",
    }
  }
}

impl<T: Scalar> Layer<T> for Pool2DLayer {
  // layer_params: [pool_h, pool_w, stride_h, stride_w]
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    let name = self.name();
    expect_tensors(name, tensors, 1)?;
    let inp = tensors[0];
    let in_shape = spatial_shape(name, inp)?;

    let params = &layer_config.layer_params;
    let pool = (param_usize(name, params, 0)?, param_usize(name, params, 1)?);
    let stride = (param_usize(name, params, 2)?, param_usize(name, params, 3)?);
    if pool.0 > in_shape.h || pool.1 > in_shape.w {
      return Err(ModelError::ShapeMismatch(format!(
        "{} window {:?} exceeds input {:?}",
        name, pool, in_shape
      )));
    }

    let out = pool_out_shape(in_shape, pool, stride);
    let mut outp = vec![T::zero(); out.len()];
    pool_2d(self.kind, &flat(inp), in_shape, pool, stride, &mut outp);
    Ok(vec![to_array(out.dims(), outp)?])
  }
}

impl GadgetConsumer for Pool2DLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::Pool]
  }
}

pub struct GlobalPool2DLayer {
  pub kind: PoolKind,
}

impl<T: Scalar> Layer<T> for GlobalPool2DLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], _layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    let name = match self.kind {
      PoolKind::Max => "GlobalMaxPool2D",
      PoolKind::Average => "GlobalAvgPool2D",
    };
    expect_tensors(name, tensors, 1)?;
    let inp = tensors[0];
    let in_shape = spatial_shape(name, inp)?;

    let mut outp = vec![T::zero(); in_shape.c];
    global_pool_2d(self.kind, &flat(inp), in_shape, &mut outp);
    Ok(vec![to_array(vec![in_shape.c], outp)?])
  }
}

impl GadgetConsumer for GlobalPool2DLayer {
  fn used_gadgets(&self, _layer_params: &[i64]) -> Vec<GadgetType> {
    vec![GadgetType::Pool]
  }
}
