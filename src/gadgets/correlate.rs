//! Spatial cross-correlation over `[H, W, C]` tensors.
//!
//! Every convolution variant funnels into [`correlate`]: SAME padding is
//! handled by materializing a zero-padded copy of the input and correlating
//! it with VALID semantics, and depthwise/plain differ only in how output
//! channels map onto input channels ([`ChannelGrouping`]).
//!
//! Kernel tensors are `[H_k, W_k, C_in, C_out]` (plain) or
//! `[H_k, W_k, C_in, depth_multiplier]` (depthwise), last axis fastest.

#![allow(clippy::too_many_arguments)]

use serde_derive::{Deserialize, Serialize};

use super::gadget::{Scalar, SpatialShape};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum PaddingEnum {
  Same,
  #[default]
  Valid,
}

/// How output channels draw from input channels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelGrouping {
  /// Every output channel reduces over all input channels.
  Full { out_channels: usize },
  /// Output channel `cin * multiplier + m` sees only input channel `cin`.
  Depthwise { multiplier: usize },
}

impl ChannelGrouping {
  pub fn out_channels(&self, in_channels: usize) -> usize {
    match *self {
      ChannelGrouping::Full { out_channels } => out_channels,
      ChannelGrouping::Depthwise { multiplier } => in_channels * multiplier,
    }
  }
}

/// Padding added before each axis for SAME correlation.
///
/// Total padding is split by truncating division and the same amount is used
/// on both sides, so even kernels can end up one row/column short.
pub fn same_padding(in_size: usize, stride: usize, kernel: usize) -> usize {
  ((in_size - 1) * stride + kernel - in_size) / 2
}

pub fn out_hw(
  h: usize,
  w: usize,
  stride: (usize, usize),
  kernel: (usize, usize),
  padding: PaddingEnum,
) -> (usize, usize) {
  match padding {
    PaddingEnum::Valid => ((h - kernel.0) / stride.0 + 1, (w - kernel.1) / stride.1 + 1),
    PaddingEnum::Same => {
      let pad_h = same_padding(h, stride.0, kernel.0);
      let pad_w = same_padding(w, stride.1, kernel.1);
      (
        (h + 2 * pad_h - kernel.0) / stride.0 + 1,
        (w + 2 * pad_w - kernel.1) / stride.1 + 1,
      )
    }
  }
}

/// Output shape of a correlation over `in_shape`.
pub fn out_shape(
  in_shape: SpatialShape,
  kernel: (usize, usize),
  stride: (usize, usize),
  padding: PaddingEnum,
  grouping: ChannelGrouping,
) -> SpatialShape {
  let (h, w) = out_hw(in_shape.h, in_shape.w, stride, kernel, padding);
  SpatialShape::new(h, w, grouping.out_channels(in_shape.c))
}

/// Zero-padded copy of `input` with `pad` rows/columns on every side.
pub fn pad_input<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  pad: (usize, usize),
) -> (Vec<T>, SpatialShape) {
  debug_assert_eq!(input.len(), in_shape.len());
  let padded_shape = SpatialShape::new(in_shape.h + 2 * pad.0, in_shape.w + 2 * pad.1, in_shape.c);
  let mut padded = vec![T::zero(); padded_shape.len()];
  let row = in_shape.w * in_shape.c;
  for h in 0..in_shape.h {
    let src = in_shape.index(h, 0, 0);
    let dst = padded_shape.index(h + pad.0, pad.1, 0);
    padded[dst..dst + row].copy_from_slice(&input[src..src + row]);
  }
  (padded, padded_shape)
}

/// VALID cross-correlation; SAME callers pass an already padded input.
///
/// For each output position the kernel rows, then kernel columns, then (for
/// [`ChannelGrouping::Full`]) input channels are accumulated in order, and
/// the bias, if any, is added last.
pub fn correlate<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  stride: (usize, usize),
  grouping: ChannelGrouping,
  bias: Option<&[T]>,
  output: &mut [T],
) {
  let (kh, kw) = kernel_hw;
  let out = out_shape(in_shape, kernel_hw, stride, PaddingEnum::Valid, grouping);
  debug_assert_eq!(input.len(), in_shape.len());
  let taps_per_position = match grouping {
    ChannelGrouping::Full { out_channels } => in_shape.c * out_channels,
    ChannelGrouping::Depthwise { .. } => out.c,
  };
  debug_assert_eq!(kernel.len(), kh * kw * taps_per_position);
  debug_assert_eq!(output.len(), out.len());
  if let Some(bias) = bias {
    debug_assert_eq!(bias.len(), out.c);
  }

  for oh in 0..out.h {
    for ow in 0..out.w {
      let top = oh * stride.0;
      let left = ow * stride.1;
      for oc in 0..out.c {
        let mut sum = T::zero();
        match grouping {
          ChannelGrouping::Full { out_channels } => {
            for ky in 0..kh {
              for kx in 0..kw {
                let pixel = in_shape.index(top + ky, left + kx, 0);
                let taps = (ky * kw + kx) * in_shape.c;
                for cin in 0..in_shape.c {
                  sum = sum + input[pixel + cin] * kernel[(taps + cin) * out_channels + oc];
                }
              }
            }
          }
          ChannelGrouping::Depthwise { multiplier } => {
            let cin = oc / multiplier;
            for ky in 0..kh {
              for kx in 0..kw {
                let pixel = in_shape.index(top + ky, left + kx, cin);
                sum = sum + input[pixel] * kernel[(ky * kw + kx) * out.c + oc];
              }
            }
          }
        }
        output[out.index(oh, ow, oc)] = match bias {
          Some(bias) => sum + bias[oc],
          None => sum,
        };
      }
    }
  }
}

/// [`correlate`] with the padding policy applied first.
pub fn correlate_padded<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  stride: (usize, usize),
  padding: PaddingEnum,
  grouping: ChannelGrouping,
  bias: Option<&[T]>,
  output: &mut [T],
) {
  match padding {
    PaddingEnum::Valid => correlate(input, in_shape, kernel, kernel_hw, stride, grouping, bias, output),
    PaddingEnum::Same => {
      let pad = (
        same_padding(in_shape.h, stride.0, kernel_hw.0),
        same_padding(in_shape.w, stride.1, kernel_hw.1),
      );
      let (padded, padded_shape) = pad_input(input, in_shape, pad);
      correlate(&padded, padded_shape, kernel, kernel_hw, stride, grouping, bias, output)
    }
  }
}

/// Plain 2D convolution with VALID padding.
pub fn conv2d_valid<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  out_channels: usize,
  stride: (usize, usize),
  bias: &[T],
  output: &mut [T],
) {
  let grouping = ChannelGrouping::Full { out_channels };
  correlate(input, in_shape, kernel, kernel_hw, stride, grouping, Some(bias), output)
}

/// Plain 2D convolution with SAME padding.
pub fn conv2d_same<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  out_channels: usize,
  stride: (usize, usize),
  bias: &[T],
  output: &mut [T],
) {
  let grouping = ChannelGrouping::Full { out_channels };
  correlate_padded(input, in_shape, kernel, kernel_hw, stride, PaddingEnum::Same, grouping, Some(bias), output)
}

pub fn depthwise_conv2d_valid<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  multiplier: usize,
  stride: (usize, usize),
  bias: Option<&[T]>,
  output: &mut [T],
) {
  let grouping = ChannelGrouping::Depthwise { multiplier };
  correlate(input, in_shape, kernel, kernel_hw, stride, grouping, bias, output)
}

pub fn depthwise_conv2d_same<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  kernel_hw: (usize, usize),
  multiplier: usize,
  stride: (usize, usize),
  bias: Option<&[T]>,
  output: &mut [T],
) {
  let grouping = ChannelGrouping::Depthwise { multiplier };
  correlate_padded(input, in_shape, kernel, kernel_hw, stride, PaddingEnum::Same, grouping, bias, output)
}

/// 1x1 convolution mixing channels at every pixel. `kernel` is `[C_in, C_out]`.
pub fn pointwise_conv2d<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  kernel: &[T],
  out_channels: usize,
  bias: &[T],
  output: &mut [T],
) {
  conv2d_valid(input, in_shape, kernel, (1, 1), out_channels, (1, 1), bias, output)
}

/// Depthwise (no bias) into a transient buffer, then pointwise with `bias`.
pub fn separable_conv2d<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  depthwise_kernel: &[T],
  kernel_hw: (usize, usize),
  multiplier: usize,
  pointwise_kernel: &[T],
  out_channels: usize,
  stride: (usize, usize),
  padding: PaddingEnum,
  bias: &[T],
  output: &mut [T],
) {
  let grouping = ChannelGrouping::Depthwise { multiplier };
  let dw_shape = out_shape(in_shape, kernel_hw, stride, padding, grouping);
  let mut depthwise = vec![T::zero(); dw_shape.len()];
  correlate_padded(input, in_shape, depthwise_kernel, kernel_hw, stride, padding, grouping, None, &mut depthwise);
  pointwise_conv2d(&depthwise, dw_shape, pointwise_kernel, out_channels, bias, output)
}

pub fn separable_conv2d_valid<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  depthwise_kernel: &[T],
  kernel_hw: (usize, usize),
  multiplier: usize,
  pointwise_kernel: &[T],
  out_channels: usize,
  stride: (usize, usize),
  bias: &[T],
  output: &mut [T],
) {
  separable_conv2d(
    input,
    in_shape,
    depthwise_kernel,
    kernel_hw,
    multiplier,
    pointwise_kernel,
    out_channels,
    stride,
    PaddingEnum::Valid,
    bias,
    output,
  )
}

pub fn separable_conv2d_same<T: Scalar>(
  input: &[T],
  in_shape: SpatialShape,
  depthwise_kernel: &[T],
  kernel_hw: (usize, usize),
  multiplier: usize,
  pointwise_kernel: &[T],
  out_channels: usize,
  stride: (usize, usize),
  bias: &[T],
  output: &mut [T],
) {
  separable_conv2d(
    input,
    in_shape,
    depthwise_kernel,
    kernel_hw,
    multiplier,
    pointwise_kernel,
    out_channels,
    stride,
    PaddingEnum::Same,
    bias,
    output,
  )
}
