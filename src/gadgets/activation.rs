use crate::error::{ModelError, Result};

use super::gadget::Scalar;

const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;
pub const DEFAULT_ELU_ALPHA: f64 = 1.0;
pub const DEFAULT_LEAKY_RELU_ALPHA: f64 = 0.01;

/// Pointwise activation, selected once per layer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Activation {
  #[default]
  Linear,
  Relu,
  Sigmoid,
  Silu,
  Tanh,
  Elu { alpha: f64 },
  LeakyRelu { alpha: f64 },
  Selu,
}

impl Activation {
  /// Resolves an activation by the names the model generator emits.
  ///
  /// `alpha` is only stored by the variants that read it (ELU, LeakyReLU);
  /// when omitted those fall back to 1.0 and 0.01 respectively.
  pub fn from_name(name: &str, alpha: Option<f64>) -> Result<Self> {
    let activation = match name {
      "linear" | "none" => Activation::Linear,
      // Softmax is emitted as a linear pass.
      "softmax" => Activation::Linear,
      "relu" => Activation::Relu,
      "sigmoid" => Activation::Sigmoid,
      "silu" | "swish" => Activation::Silu,
      "tanh" | "tanhCustom" => Activation::Tanh,
      "elu" => Activation::Elu {
        alpha: alpha.unwrap_or(DEFAULT_ELU_ALPHA),
      },
      "leakyRelu" | "leaky_relu" => Activation::LeakyRelu {
        alpha: alpha.unwrap_or(DEFAULT_LEAKY_RELU_ALPHA),
      },
      "selu" => Activation::Selu,
      _ => return Err(ModelError::UnknownActivation(name.to_string())),
    };
    Ok(activation)
  }

  pub fn alpha(&self) -> f64 {
    match self {
      Activation::Elu { alpha } | Activation::LeakyRelu { alpha } => *alpha,
      Activation::Selu => SELU_ALPHA,
      _ => 0.0,
    }
  }

  pub fn apply<T: Scalar>(&self, x: T) -> T {
    match *self {
      Activation::Linear => linear(x),
      Activation::Relu => relu(x),
      Activation::Sigmoid => sigmoid(x),
      Activation::Silu => silu(x),
      Activation::Tanh => tanh(x),
      Activation::Elu { alpha } => elu(x, T::from_f64(alpha)),
      Activation::LeakyRelu { alpha } => leaky_relu(x, T::from_f64(alpha)),
      Activation::Selu => selu(x),
    }
  }

  pub fn apply_slice<T: Scalar>(&self, input: &[T], output: &mut [T]) {
    debug_assert_eq!(input.len(), output.len());
    match *self {
      Activation::Linear => output.copy_from_slice(input),
      Activation::Relu => map(input, output, relu),
      Activation::Sigmoid => map(input, output, sigmoid),
      Activation::Silu => map(input, output, silu),
      Activation::Tanh => map(input, output, tanh),
      Activation::Elu { alpha } => {
        let alpha = T::from_f64(alpha);
        map(input, output, |x| elu(x, alpha))
      }
      Activation::LeakyRelu { alpha } => {
        let alpha = T::from_f64(alpha);
        map(input, output, |x| leaky_relu(x, alpha))
      }
      Activation::Selu => map(input, output, selu),
    }
  }

  pub fn apply_inplace<T: Scalar>(&self, data: &mut [T]) {
    if *self == Activation::Linear {
      return;
    }
    let activation = *self;
    for x in data.iter_mut() {
      *x = activation.apply(*x);
    }
  }
}

#[inline(always)]
fn map<T: Scalar>(input: &[T], output: &mut [T], f: impl Fn(T) -> T) {
  for (o, &x) in output.iter_mut().zip(input.iter()) {
    *o = f(x);
  }
}

#[inline(always)]
pub fn linear<T: Scalar>(x: T) -> T {
  x
}

#[inline(always)]
pub fn relu<T: Scalar>(x: T) -> T {
  if x > T::zero() {
    x
  } else {
    T::zero()
  }
}

#[inline(always)]
pub fn sigmoid<T: Scalar>(x: T) -> T {
  T::one() / (T::one() + (-x).exp())
}

/// `x * sigmoid(x)`, both factors taken from the raw input.
#[inline(always)]
pub fn silu<T: Scalar>(x: T) -> T {
  x * sigmoid(x)
}

#[inline(always)]
pub fn tanh<T: Scalar>(x: T) -> T {
  x.tanh()
}

#[inline(always)]
pub fn elu<T: Scalar>(x: T, alpha: T) -> T {
  if x > T::zero() {
    x
  } else {
    alpha * (x.exp() - T::one())
  }
}

#[inline(always)]
pub fn leaky_relu<T: Scalar>(x: T, alpha: T) -> T {
  if x > T::zero() {
    x
  } else {
    alpha * x
  }
}

#[inline(always)]
pub fn selu<T: Scalar>(x: T) -> T {
  T::from_f64(SELU_SCALE) * elu(x, T::from_f64(SELU_ALPHA))
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [Activation; 8] = [
    Activation::Linear,
    Activation::Relu,
    Activation::Sigmoid,
    Activation::Silu,
    Activation::Tanh,
    Activation::Elu { alpha: 1.0 },
    Activation::LeakyRelu { alpha: 0.1 },
    Activation::Selu,
  ];

  #[test]
  fn scalar_formulas() {
    assert_eq!(relu(-2.0f64), 0.0);
    assert_eq!(relu(3.5f64), 3.5);
    assert_eq!(sigmoid(0.0f64), 0.5);
    assert!((silu(2.0f64) - 2.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-15);
    assert!((tanh(0.5f64) - 0.5f64.tanh()).abs() < 1e-15);
    assert!((elu(-1.0f64, 2.0) - 2.0 * ((-1.0f64).exp() - 1.0)).abs() < 1e-15);
    assert_eq!(elu(1.5f64, 2.0), 1.5);
    assert_eq!(leaky_relu(-2.0f64, 0.1), -0.2);
    assert!((selu(1.0f64) - SELU_SCALE).abs() < 1e-15);
  }

  #[test]
  fn relu_at_zero_is_zero() {
    assert_eq!(relu(0.0f32), 0.0);
    assert_eq!(elu(0.0f32, 1.0), 0.0);
  }

  #[test]
  fn apply_is_deterministic() {
    let inputs = [-3.0f32, -0.25, 0.0, 0.75, 4.0];
    for activation in ALL.iter() {
      for &x in inputs.iter() {
        let a = activation.apply(x);
        let b = activation.apply(x);
        assert_eq!(a.to_bits(), b.to_bits(), "{:?} at {}", activation, x);
      }
    }
  }

  #[test]
  fn slice_matches_scalar() {
    let input = [-2.0f64, -0.5, 0.0, 0.5, 2.0];
    for activation in ALL.iter() {
      let mut out = [0.0f64; 5];
      activation.apply_slice(&input, &mut out);
      let mut inplace = input;
      activation.apply_inplace(&mut inplace);
      for i in 0..input.len() {
        assert_eq!(out[i], activation.apply(input[i]));
        assert_eq!(inplace[i], out[i]);
      }
    }
  }

  #[test]
  fn resolves_generator_names() {
    assert_eq!(Activation::from_name("swish", None).unwrap(), Activation::Silu);
    assert_eq!(Activation::from_name("tanhCustom", None).unwrap(), Activation::Tanh);
    assert_eq!(Activation::from_name("softmax", None).unwrap(), Activation::Linear);
    assert_eq!(
      Activation::from_name("elu", Some(0.3)).unwrap(),
      Activation::Elu { alpha: 0.3 }
    );
    assert_eq!(Activation::from_name("elu", Some(0.3)).unwrap().alpha(), 0.3);
    assert_eq!(Activation::from_name("relu", Some(5.0)).unwrap().alpha(), 0.0);
    assert!(matches!(
      Activation::from_name("gelu", None),
      Err(ModelError::UnknownActivation(_))
    ));
  }

  #[test]
  fn missing_alpha_uses_variant_default() {
    assert_eq!(
      Activation::from_name("elu", None).unwrap(),
      Activation::Elu { alpha: 1.0 }
    );
    assert_eq!(
      Activation::from_name("leakyRelu", None).unwrap(),
      Activation::LeakyRelu { alpha: 0.01 }
    );
    assert_eq!(Activation::from_name("selu", None).unwrap().alpha(), SELU_ALPHA);
  }
}
