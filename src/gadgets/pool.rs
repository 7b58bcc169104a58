use super::{
  correlate::{out_hw, PaddingEnum},
  gadget::{Scalar, SpatialShape},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolKind {
  Max,
  Average,
}

/// Output shape of a VALID pooling window over `in_shape`.
pub fn pool_out_shape(in_shape: SpatialShape, pool: (usize, usize), stride: (usize, usize)) -> SpatialShape {
  let (h, w) = out_hw(in_shape.h, in_shape.w, stride, pool, PaddingEnum::Valid);
  SpatialShape::new(h, w, in_shape.c)
}

/// Slides a `pool` window with `stride` over `input` and reduces each channel.
///
/// Averages always divide by `pool.0 * pool.1`.
pub fn pool_2d<T: Scalar>(
  kind: PoolKind,
  input: &[T],
  in_shape: SpatialShape,
  pool: (usize, usize),
  stride: (usize, usize),
  output: &mut [T],
) {
  let out = pool_out_shape(in_shape, pool, stride);
  debug_assert_eq!(input.len(), in_shape.len());
  debug_assert_eq!(output.len(), out.len());

  let divisor = T::from_f64((pool.0 * pool.1) as f64);
  for oh in 0..out.h {
    for ow in 0..out.w {
      for c in 0..out.c {
        let mut acc = match kind {
          PoolKind::Max => T::neg_infinity(),
          PoolKind::Average => T::zero(),
        };
        for ph in 0..pool.0 {
          for pw in 0..pool.1 {
            let x = input[in_shape.index(oh * stride.0 + ph, ow * stride.1 + pw, c)];
            match kind {
              PoolKind::Max => {
                if x > acc {
                  acc = x;
                }
              }
              PoolKind::Average => acc = acc + x,
            }
          }
        }
        output[out.index(oh, ow, c)] = match kind {
          PoolKind::Max => acc,
          PoolKind::Average => acc / divisor,
        };
      }
    }
  }
}

pub fn max_pool_2d<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  pool: (usize, usize),
  stride: (usize, usize),
  output: &mut [T],
) {
  pool_2d(PoolKind::Max, input, in_shape, pool, stride, output)
}

pub fn avg_pool_2d<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  pool: (usize, usize),
  stride: (usize, usize),
  output: &mut [T],
) {
  pool_2d(PoolKind::Average, input, in_shape, pool, stride, output)
}

/// Reduces the full spatial extent to one value per channel.
pub fn global_pool_2d<T: Scalar>(kind: PoolKind, input: &[T], in_shape: SpatialShape, output: &mut [T]) {
  debug_assert_eq!(output.len(), in_shape.c);
  pool_2d(kind, input, in_shape, (in_shape.h, in_shape.w), (1, 1), output)
}

pub fn global_max_pool_2d<T: Scalar>(input: &[T], in_shape: SpatialShape, output: &mut [T]) {
  global_pool_2d(PoolKind::Max, input, in_shape, output)
}

pub fn global_avg_pool_2d<T: Scalar>(input: &[T], in_shape: SpatialShape, output: &mut [T]) {
  global_pool_2d(PoolKind::Average, input, in_shape, output)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ramp(shape: SpatialShape) -> Vec<f32> {
    (0..shape.len()).map(|i| i as f32).collect()
  }

  #[test]
  fn max_pool_picks_window_max() {
    let shape = SpatialShape::new(4, 4, 1);
    let mut out = [0.0f32; 4];
    max_pool_2d(&ramp(shape), shape, (2, 2), (2, 2), &mut out);
    assert_eq!(out, [5.0, 7.0, 13.0, 15.0]);
  }

  #[test]
  fn max_pool_handles_all_negative_windows() {
    let shape = SpatialShape::new(2, 2, 1);
    let mut out = [0.0f64; 1];
    max_pool_2d(&[-4.0, -3.0, -9.0, -7.5], shape, (2, 2), (2, 2), &mut out);
    assert_eq!(out, [-3.0]);
  }

  #[test]
  fn avg_pool_divides_by_window_area() {
    let shape = SpatialShape::new(4, 4, 1);
    let mut out = [0.0f32; 4];
    avg_pool_2d(&ramp(shape), shape, (2, 2), (2, 2), &mut out);
    assert_eq!(out, [2.5, 4.5, 10.5, 12.5]);
  }

  #[test]
  fn overlapping_windows_per_channel() {
    let shape = SpatialShape::new(3, 3, 2);
    let input = ramp(shape);
    let out_shape = pool_out_shape(shape, (2, 2), (1, 1));
    assert_eq!(out_shape, SpatialShape::new(2, 2, 2));
    let mut out = vec![0.0f32; out_shape.len()];
    max_pool_2d(&input, shape, (2, 2), (1, 1), &mut out);
    assert_eq!(out, vec![8.0, 9.0, 10.0, 11.0, 14.0, 15.0, 16.0, 17.0]);
  }

  #[test]
  fn strided_window_drops_remainder() {
    let shape = SpatialShape::new(5, 5, 1);
    assert_eq!(pool_out_shape(shape, (2, 2), (2, 2)), SpatialShape::new(2, 2, 1));
  }

  #[test]
  fn constant_input_max_equals_average() {
    let shape = SpatialShape::new(3, 4, 3);
    let input = vec![1.25f32; shape.len()];
    let mut max = [0.0f32; 3];
    let mut avg = [0.0f32; 3];
    max_pool_2d(&input, shape, (3, 4), (1, 1), &mut max);
    avg_pool_2d(&input, shape, (3, 4), (1, 1), &mut avg);
    assert_eq!(max, [1.25; 3]);
    assert_eq!(max, avg);
  }

  #[test]
  fn global_pools_reduce_per_channel() {
    let shape = SpatialShape::new(2, 2, 2);
    let input = [1.0f64, -1.0, 3.0, -2.0, 5.0, -3.0, 7.0, -4.0];
    let mut max = [0.0f64; 2];
    let mut avg = [0.0f64; 2];
    global_max_pool_2d(&input, shape, &mut max);
    global_avg_pool_2d(&input, shape, &mut avg);
    assert_eq!(max, [7.0, -1.0]);
    assert_eq!(avg, [4.0, -2.5]);
  }

  #[test]
  fn global_equals_full_window() {
    let shape = SpatialShape::new(3, 5, 4);
    let input: Vec<f32> = (0..shape.len()).map(|i| ((i * 7) % 11) as f32 * 0.3).collect();
    let mut global = [0.0f32; 4];
    let mut windowed = [0.0f32; 4];
    global_avg_pool_2d(&input, shape, &mut global);
    avg_pool_2d(&input, shape, (3, 5), (3, 5), &mut windowed);
    assert_eq!(global, windowed);
  }
}
