use std::{
  fs::File,
  io::{BufReader, BufWriter, Write},
  path::Path,
};

use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorMsgpack {
  pub idx: i64,
  pub shape: Vec<i64>,
  pub data: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerMsgpack {
  pub layer_type: String,
  #[serde(default)]
  pub params: Vec<i64>,
  pub activation: Option<String>,
  pub alpha: Option<f64>,
  pub epsilon: Option<f64>,
  pub inp_idxes: Vec<i64>,
  pub out_idxes: Vec<i64>,
  #[serde(default)]
  pub out_shapes: Vec<Vec<i64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMsgpack {
  pub inp_idx: i64,
  pub inp_shape: Vec<i64>,
  pub out_idxes: Vec<i64>,
  pub tensors: Vec<TensorMsgpack>,
  pub layers: Vec<LayerMsgpack>,
  // min-max scaling, applied only when both halves of a pair are present
  pub input_norms: Option<Vec<f64>>,
  pub input_mins: Option<Vec<f64>>,
  pub output_norms: Option<Vec<f64>>,
  pub output_mins: Option<Vec<f64>>,
}

fn is_json(path: &Path) -> bool {
  path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

fn read_msgpack<D: DeserializeOwned>(path: &Path) -> Result<D> {
  let file = File::open(path)?;
  let mut reader = BufReader::new(file);
  Ok(rmp_serde::from_read(&mut reader)?)
}

fn read_json<D: DeserializeOwned>(path: &Path) -> Result<D> {
  let file = File::open(path)?;
  Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn read_any<D: DeserializeOwned>(path: &Path) -> Result<D> {
  if is_json(path) {
    read_json(path)
  } else {
    read_msgpack(path)
  }
}

pub fn load_config_msgpack<P: AsRef<Path>>(config_path: P) -> Result<ModelMsgpack> {
  read_msgpack(config_path.as_ref())
}

pub fn load_config_json<P: AsRef<Path>>(config_path: P) -> Result<ModelMsgpack> {
  read_json(config_path.as_ref())
}

/// Loads a model description, picking the format from the file extension.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<ModelMsgpack> {
  let config_path = config_path.as_ref();
  let config: ModelMsgpack = read_any(config_path)?;
  log::info!(
    "loaded {}: {} tensors, {} layers",
    config_path.display(),
    config.tensors.len(),
    config.layers.len()
  );
  Ok(config)
}

/// Loads a flat input vector (JSON array or msgpack array of floats).
pub fn load_input<P: AsRef<Path>>(inp_path: P) -> Result<Vec<f64>> {
  read_any(inp_path.as_ref())
}

/// Writes `value` as named msgpack, or as JSON if the path ends in `.json`.
pub fn save<P: AsRef<Path>, S: serde::Serialize>(path: P, value: &S) -> Result<()> {
  let path = path.as_ref();
  let mut buf = BufWriter::new(File::create(path)?);
  if is_json(path) {
    serde_json::to_writer(&mut buf, value)?;
  } else {
    rmp_serde::encode::write_named(&mut buf, value)?;
  }
  buf.flush()?;
  Ok(())
}
