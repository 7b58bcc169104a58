use super::gadget::Scalar;

/// Layer normalization over the whole of `inputs`.
///
/// Mean and population variance are taken from the input itself in two
/// passes before any output is written.
pub fn layer_norm<T: Scalar>(inputs: &[T], gamma: &[T], beta: &[T], epsilon: T, outputs: &mut [T]) {
  let size = inputs.len();
  debug_assert_eq!(gamma.len(), size);
  debug_assert_eq!(beta.len(), size);
  debug_assert_eq!(outputs.len(), size);

  let n = T::from_f64(size as f64);
  let mut mean = T::zero();
  for &x in inputs.iter() {
    mean = mean + x;
  }
  mean = mean / n;

  let mut variance = T::zero();
  for &x in inputs.iter() {
    variance = variance + (x - mean) * (x - mean);
  }
  variance = variance / n;

  let denom = (variance + epsilon).sqrt();
  for i in 0..size {
    outputs[i] = gamma[i] * ((inputs[i] - mean) / denom) + beta[i];
  }
}

/// Batch normalization with precomputed per-feature statistics.
pub fn batch_norm<T: Scalar>(
  inputs: &[T],
  gamma: &[T],
  beta: &[T],
  mean: &[T],
  variance: &[T],
  epsilon: T,
  outputs: &mut [T],
) {
  let size = inputs.len();
  debug_assert_eq!(gamma.len(), size);
  debug_assert_eq!(beta.len(), size);
  debug_assert_eq!(mean.len(), size);
  debug_assert_eq!(variance.len(), size);
  debug_assert_eq!(outputs.len(), size);

  for i in 0..size {
    outputs[i] = gamma[i] * ((inputs[i] - mean[i]) / (variance[i] + epsilon).sqrt()) + beta[i];
  }
}
