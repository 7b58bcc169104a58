use std::fmt::Debug;

use num_traits::Float;
use serde_derive::{Deserialize, Serialize};

/// Floating-point element type accepted by every kernel.
pub trait Scalar: Float + Debug + Default + Send + Sync + 'static {
  fn from_f64(x: f64) -> Self;
  fn to_f64(self) -> f64;
}

impl Scalar for f32 {
  fn from_f64(x: f64) -> Self {
    x as f32
  }

  fn to_f64(self) -> f64 {
    self as f64
  }
}

impl Scalar for f64 {
  fn from_f64(x: f64) -> Self {
    x
  }

  fn to_f64(self) -> f64 {
    self
  }
}

/// Kernel families, used to report which kernels a model needs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum GadgetType {
  Activation,
  BatchNorm,
  Conv2D,
  DepthwiseConv2D,
  DotProduct,
  LayerNorm,
  Pool,
}

/// Logical `[H, W, C]` shape of a flat spatial tensor, channel fastest.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpatialShape {
  pub h: usize,
  pub w: usize,
  pub c: usize,
}

impl SpatialShape {
  pub fn new(h: usize, w: usize, c: usize) -> Self {
    Self { h, w, c }
  }

  pub fn len(&self) -> usize {
    self.h * self.w * self.c
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  #[inline(always)]
  pub fn index(&self, h: usize, w: usize, c: usize) -> usize {
    (h * self.w + w) * self.c + c
  }

  /// Reads the shape from an `[H, W, C]` dimension list.
  pub fn from_dims(dims: &[usize]) -> Option<Self> {
    match dims {
      [h, w, c] => Some(Self::new(*h, *w, *c)),
      _ => None,
    }
  }

  pub fn dims(&self) -> Vec<usize> {
    vec![self.h, self.w, self.c]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn index_is_channel_fastest() {
    let shape = SpatialShape::new(2, 3, 4);
    assert_eq!(shape.len(), 24);
    assert_eq!(shape.index(0, 0, 1), 1);
    assert_eq!(shape.index(0, 1, 0), 4);
    assert_eq!(shape.index(1, 0, 0), 12);
    assert_eq!(shape.index(1, 2, 3), 23);
  }

  #[test]
  fn from_dims_requires_rank_three() {
    assert_eq!(SpatialShape::from_dims(&[4, 4, 2]), Some(SpatialShape::new(4, 4, 2)));
    assert_eq!(SpatialShape::from_dims(&[16]), None);
    assert_eq!(SpatialShape::from_dims(&[1, 4, 4, 2]), None);
  }
}
