use ndarray::ArrayD;

use crate::{
  error::{ModelError, Result},
  gadgets::{
    correlate::{correlate_padded, out_shape, separable_conv2d, ChannelGrouping, PaddingEnum},
    gadget::{GadgetType, Scalar, SpatialShape},
  },
};

use super::layer::{
  expect_len, expect_tensors, flat, kernel_dims, param_usize, spatial_shape, to_array,
  GadgetConsumer, Layer, LayerConfig,
};

const NAME: &str = "Conv2D";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConvLayerEnum {
  #[default]
  Conv2D,
  DepthwiseConv2D,
  SeparableConv2D,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Conv2DConfig {
  pub conv_type: ConvLayerEnum,
  pub padding: PaddingEnum,
  pub stride: (usize, usize),
}

pub struct Conv2DLayer {}

impl Conv2DLayer {
  /// `[conv_type, padding, stride_h, stride_w]`
  pub fn param_vec_to_config(layer_params: &[i64]) -> Result<Conv2DConfig> {
    let conv_type = match layer_params.first().copied() {
      Some(0) => ConvLayerEnum::Conv2D,
      Some(1) => ConvLayerEnum::DepthwiseConv2D,
      Some(2) => ConvLayerEnum::SeparableConv2D,
      other => return Err(ModelError::invalid_params(NAME, format!("invalid conv type {:?}", other))),
    };
    let padding = match layer_params.get(1).copied() {
      Some(0) => PaddingEnum::Same,
      Some(1) => PaddingEnum::Valid,
      other => return Err(ModelError::invalid_params(NAME, format!("invalid padding {:?}", other))),
    };
    let stride = (param_usize(NAME, layer_params, 2)?, param_usize(NAME, layer_params, 3)?);
    Ok(Conv2DConfig {
      conv_type,
      padding,
      stride,
    })
  }
}

impl<T: Scalar> Layer<T> for Conv2DLayer {
  fn forward(&self, tensors: &[&ArrayD<T>], layer_config: &LayerConfig) -> Result<Vec<ArrayD<T>>> {
    let conv_config = Self::param_vec_to_config(&layer_config.layer_params)?;
    expect_tensors(NAME, tensors, 2)?;

    let inp = tensors[0];
    let in_shape = spatial_shape(NAME, inp)?;
    let [kh, kw, cin, x] = kernel_dims(NAME, tensors[1])?;
    if cin != in_shape.c {
      return Err(ModelError::ShapeMismatch(format!(
        "{} kernel expects {} input channels, input has {}",
        NAME, cin, in_shape.c
      )));
    }
    if kh > in_shape.h || kw > in_shape.w {
      return Err(ModelError::ShapeMismatch(format!(
        "{} kernel {}x{} exceeds input {:?}",
        NAME, kh, kw, in_shape
      )));
    }
    let input = flat(inp);
    let kernel = flat(tensors[1]);

    let (out, mut outp) = match conv_config.conv_type {
      ConvLayerEnum::Conv2D => {
        expect_tensors(NAME, tensors, 3)?;
        expect_len(NAME, "bias", tensors[2], x)?;
        let grouping = ChannelGrouping::Full { out_channels: x };
        let out = out_shape(in_shape, (kh, kw), conv_config.stride, conv_config.padding, grouping);
        let mut outp = vec![T::zero(); out.len()];
        let bias = flat(tensors[2]);
        correlate_padded(
          &input,
          in_shape,
          &kernel,
          (kh, kw),
          conv_config.stride,
          conv_config.padding,
          grouping,
          Some(&bias[..]),
          &mut outp,
        );
        (out, outp)
      }
      ConvLayerEnum::DepthwiseConv2D => {
        let grouping = ChannelGrouping::Depthwise { multiplier: x };
        let out = out_shape(in_shape, (kh, kw), conv_config.stride, conv_config.padding, grouping);
        let bias = match tensors.get(2) {
          Some(bias) => {
            expect_len(NAME, "bias", bias, out.c)?;
            Some(flat(bias))
          }
          None => None,
        };
        let mut outp = vec![T::zero(); out.len()];
        correlate_padded(
          &input,
          in_shape,
          &kernel,
          (kh, kw),
          conv_config.stride,
          conv_config.padding,
          grouping,
          bias.as_deref(),
          &mut outp,
        );
        (out, outp)
      }
      ConvLayerEnum::SeparableConv2D => {
        expect_tensors(NAME, tensors, 4)?;
        let [ph, pw, pcin, out_channels] = kernel_dims(NAME, tensors[2])?;
        if ph != 1 || pw != 1 || pcin != cin * x {
          return Err(ModelError::ShapeMismatch(format!(
            "{} pointwise kernel must be [1, 1, {}, C_out], got {:?}",
            NAME,
            cin * x,
            tensors[2].shape()
          )));
        }
        expect_len(NAME, "bias", tensors[3], out_channels)?;
        let dw = out_shape(
          in_shape,
          (kh, kw),
          conv_config.stride,
          conv_config.padding,
          ChannelGrouping::Depthwise { multiplier: x },
        );
        let out = SpatialShape::new(dw.h, dw.w, out_channels);
        let mut outp = vec![T::zero(); out.len()];
        separable_conv2d(
          &input,
          in_shape,
          &kernel,
          (kh, kw),
          x,
          &flat(tensors[2]),
          out_channels,
          conv_config.stride,
          conv_config.padding,
          &flat(tensors[3]),
          &mut outp,
        );
        (out, outp)
      }
    };

    layer_config.activation.apply_inplace(&mut outp);
    Ok(vec![to_array(out.dims(), outp)?])
  }
}

impl GadgetConsumer for Conv2DLayer {
  fn used_gadgets(&self, layer_params: &[i64]) -> Vec<GadgetType> {
    match layer_params.first().copied() {
      Some(1) => vec![GadgetType::DepthwiseConv2D, GadgetType::Activation],
      Some(2) => vec![
        GadgetType::DepthwiseConv2D,
        GadgetType::Conv2D,
        GadgetType::Activation,
      ],
      _ => vec![GadgetType::Conv2D, GadgetType::Activation],
    }
  }
}
