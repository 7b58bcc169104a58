use super::{activation::Activation, gadget::Scalar};

/// Forward pass of one fully-connected layer, without activation.
///
/// `input_size` and `output_size` are read from `inputs.len()` and
/// `outputs.len()`. The weight for input feature `j` and output feature `i`
/// lives at `j * output_size + i`.
///
/// `outputs[i] = sum_j(inputs[j] * weights[j * output_size + i]) + biases[i]`,
/// accumulated left to right over `j` with the bias added last.
pub fn dense<T: Scalar>(inputs: &[T], weights: &[T], biases: &[T], outputs: &mut [T]) {
  let input_size = inputs.len();
  let output_size = outputs.len();
  debug_assert_eq!(weights.len(), input_size * output_size);
  debug_assert_eq!(biases.len(), output_size);

  for (i, out) in outputs.iter_mut().enumerate() {
    let mut sum = T::zero();
    for (j, &x) in inputs.iter().enumerate() {
      sum = sum + x * weights[j * output_size + i];
    }
    *out = sum + biases[i];
  }
}

/// [`dense`] followed by a single activation pass over the outputs.
pub fn dense_activated<T: Scalar>(
  inputs: &[T],
  weights: &[T],
  biases: &[T],
  activation: Activation,
  outputs: &mut [T],
) {
  dense(inputs, weights, biases, outputs);
  activation.apply_inplace(outputs);
}
