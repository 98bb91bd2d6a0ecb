//! `predict-spread '{"lat": .., "lng": .., "brightness": ..}'`
//!
//! Prints one JSON forecast to stdout. Models are read from `$IGNIS_MODEL_DIR`,
//! falling back to the working directory.

use anyhow::Result;
use clap::Parser;
use forecast_cli::{init_tracing, predict_json};
use ignis_core::config::ForecastConfig;

/// Wildfire spread forecast for a single fire
#[derive(Parser, Debug)]
#[command(name = "predict-spread")]
#[command(about = "Forecast wildfire spread around a point", long_about = None)]
struct Args {
    /// Request object, e.g. '{"lat": 38.5, "lng": -121.5, "brightness": 380}'
    request: String,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = ForecastConfig::default().with_env_overrides();
    println!("{}", predict_json(&args.request, &config)?);
    Ok(())
}
