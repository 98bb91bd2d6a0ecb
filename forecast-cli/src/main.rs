use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use forecast_cli::{
    extract, init_tracing, inspect, load_config, predict_json, train_classifier, train_regressor,
};
use ignis_core::config::PipelineConfig;
use std::path::PathBuf;

/// Wildfire spread pipeline: extract features, train models, forecast spread
#[derive(Parser, Debug)]
#[command(name = "ignis")]
#[command(about = "Wildfire spread prediction pipeline", long_about = None)]
struct Cli {
    /// JSON config file (defaults apply to anything it omits)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List keys, kinds and lengths of the first record in a shard
    Inspect {
        /// TFRecord shard
        shard: PathBuf,
    },

    /// Build the train and test datasets from TFRecord shards
    Extract {
        /// Directory holding the shards
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory the datasets are written to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Training sample cap
        #[arg(long)]
        max_train: Option<usize>,

        /// Test sample cap
        #[arg(long)]
        max_test: Option<usize>,
    },

    /// Fit and evaluate the spread classifier
    TrainClassifier(TrainArgs),

    /// Fit and evaluate the spread-ratio regressor
    TrainRegressor(TrainArgs),

    /// Forecast spread for a JSON request such as '{"lat": 38.5, "lng": -121.5}'
    Predict {
        /// Request object with lat, lng and optional brightness
        request: String,

        /// Directory holding the trained models
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Directory holding the extracted datasets
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Directory the model is written to
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Number of boosting stages
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Shrinkage applied to every tree
    #[arg(long)]
    learning_rate: Option<f64>,
}

impl TrainArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.dataset_dir {
            config.data.output_dir.clone_from(dir);
        }
        if let Some(dir) = &self.model_dir {
            config.forecast.model_dir.clone_from(dir);
        }
        if let Some(n) = self.n_estimators {
            config.gbm.n_estimators = n;
        }
        if let Some(d) = self.max_depth {
            config.gbm.max_depth = d;
        }
        if let Some(lr) = self.learning_rate {
            config.gbm.learning_rate = lr;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    config.forecast = config.forecast.with_env_overrides();

    match cli.command {
        Command::Inspect { shard } => print!("{}", inspect(&shard)?),
        Command::Extract {
            data_dir,
            output_dir,
            max_train,
            max_test,
        } => {
            if let Some(dir) = data_dir {
                config.data.data_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.data.output_dir = dir;
            }
            if let Some(n) = max_train {
                config.data.max_train_samples = n;
            }
            if let Some(n) = max_test {
                config.data.max_test_samples = n;
            }
            config.validate()?;
            let (train, test) = extract(&config.data)?;
            println!("Train:\n{}\n\nTest:\n{}", train.stats(), test.stats());
        }
        Command::TrainClassifier(args) => {
            args.apply(&mut config);
            config.validate()?;
            let path = config.forecast.classifier_path();
            print!("{}", train_classifier(&config.data, config.gbm, &path)?);
        }
        Command::TrainRegressor(args) => {
            args.apply(&mut config);
            config.validate()?;
            let path = config.forecast.regressor_path();
            print!("{}", train_regressor(&config.data, config.gbm, &path)?);
        }
        Command::Predict { request, model_dir } => {
            if let Some(dir) = model_dir {
                config.forecast.model_dir = dir;
            }
            println!("{}", predict_json(&request, &config.forecast)?);
        }
    }
    Ok(())
}
