use std::process;

use clap::{App, Arg};
use fixed_nn::{
  model::Model,
  utils::{loader::load_input, timing::time_model},
};

use jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
  env_logger::init();

  let matches = App::new("time_model")
    .about("Runs a model repeatedly and reports inference time")
    .arg(Arg::with_name("config").help("model description (.json or msgpack)").required(true).index(1))
    .arg(Arg::with_name("input").help("flat input vector (.json or msgpack)").required(true).index(2))
    .arg(
      Arg::with_name("iterations")
        .long("iterations")
        .short("n")
        .takes_value(true)
        .default_value("1"),
    )
    .arg(
      Arg::with_name("output")
        .long("output")
        .short("o")
        .takes_value(true)
        .default_value("results.json"),
    )
    .get_matches();

  // required args and defaults are always present
  let config_fname = matches.value_of("config").unwrap_or_default();
  let inp_fname = matches.value_of("input").unwrap_or_default();
  let outp_json = matches.value_of("output").unwrap_or("results.json");
  let iterations = match matches.value_of("iterations").unwrap_or("1").parse::<usize>() {
    Ok(n) => n,
    Err(e) => {
      eprintln!("invalid --iterations: {}", e);
      process::exit(2);
    }
  };

  let run = || -> fixed_nn::Result<()> {
    let model = Model::<f32>::generate_from_file(config_fname)?;
    let input = load_input(inp_fname)?.into_iter().map(|x| x as f32).collect::<Vec<_>>();
    time_model(&model, &input, iterations, ".", outp_json)?;
    Ok(())
  };
  if let Err(e) = run() {
    log::error!("{}", e);
    eprintln!("error: {}", e);
    process::exit(1);
  }
}
