use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  time::{Duration, Instant},
};

use serde_json::json;

use crate::{
  error::{ModelError, Result},
  gadgets::gadget::Scalar,
  model::Model,
  utils::loader::save,
};

pub const OUT_FNAME: &str = "out.msgpack";

#[derive(Clone, Debug, PartialEq)]
pub struct TimingReport {
  pub iterations: usize,
  pub total: Duration,
  pub output: Vec<f64>,
}

impl TimingReport {
  pub fn average(&self) -> Duration {
    if self.iterations == 0 {
      return Duration::ZERO;
    }
    match u32::try_from(self.iterations) {
      Ok(n) => self.total / n,
      Err(_) => self.total.div_f64(self.iterations as f64),
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    json!({
      "Framework": "fixed_nn",
      "Iterations": self.iterations,
      "TotalMs": self.total.as_secs_f64() * 1000.,
      "AverageMs": self.average().as_secs_f64() * 1000.,
      "OutputSize": self.output.len(),
    })
  }
}

/// Runs `iterations` forward passes and reports the wall time and the last output.
pub fn run_timed<T: Scalar>(model: &Model<T>, input: &[T], iterations: usize) -> Result<TimingReport> {
  if iterations == 0 {
    return Err(ModelError::invalid_params("time_model", "iterations must be positive"));
  }
  let mut output = vec![];
  let start = Instant::now();
  for _ in 0..iterations {
    output = model.forward(input)?;
  }
  let total = start.elapsed();

  Ok(TimingReport {
    iterations,
    total,
    output: output.into_iter().map(|x| x.to_f64()).collect(),
  })
}

/// Times the model, writes the final output to `out_dir/out.msgpack` and the
/// JSON summary to `outp_json`.
pub fn time_model<T: Scalar, P: AsRef<Path>, Q: AsRef<Path>>(
  model: &Model<T>,
  input: &[T],
  iterations: usize,
  out_dir: P,
  outp_json: Q,
) -> Result<TimingReport> {
  log::info!("running {} iterations", iterations);
  let report = run_timed(model, input, iterations)?;
  log::info!(
    "total time: {:?}, average: {:?}",
    report.total,
    report.average()
  );
  for (idx, x) in report.output.iter().enumerate() {
    log::debug!("final out [{}] x: {}", idx, x);
  }

  save(out_dir.as_ref().join(OUT_FNAME), &report.output)?;

  log::info!("writing results");
  let json_string = serde_json::to_string(&report.to_json())?;
  let mut file = BufWriter::new(File::create(outp_json)?);
  file.write_all(json_string.as_bytes())?;
  file.flush()?;

  Ok(report)
}
