//! Command-line surface: argument types and parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::features::{
    AIR_TEMPERATURE, FieldValue, PROCESS_TEMPERATURE, ROTATIONAL_SPEED, RawRecord, TOOL_WEAR,
    TORQUE, TYPE,
};
use crate::models::ClassifierKind;

/// Predict equipment failure from machine sensor readings
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "maint-predict")]
#[command(version)]
#[command(about = "Classify sensor readings as SAFE or FAILURE with pre-trained models")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (overrides MAINT_PREDICT_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the model artifacts
    #[arg(long, global = true, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Classify a single sensor reading
    Predict(PredictArgs),

    /// Classify every row of a CSV, JSON or Parquet file
    Batch(BatchArgs),

    /// Show which model artifacts loaded
    Models,

    /// Print the accepted range of every input field
    Ranges,
}

/// Output format for a single prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the predict command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PredictArgs {
    /// Air temperature in kelvin
    #[arg(long, allow_hyphen_values = true)]
    pub air_temperature_k: f64,

    /// Process temperature in kelvin
    #[arg(long, allow_hyphen_values = true)]
    pub process_temperature_k: f64,

    /// Spindle speed in rpm
    #[arg(long, allow_hyphen_values = true)]
    pub rotational_speed_rpm: f64,

    /// Torque in newton-metres
    #[arg(long, allow_hyphen_values = true)]
    pub torque_nm: f64,

    /// Accumulated tool wear in minutes
    #[arg(long, allow_hyphen_values = true)]
    pub tool_wear_min: f64,

    /// Equipment type code (L, M or H); used by type-aware models
    #[arg(long = "type", value_name = "CODE")]
    pub equipment_type: Option<String>,

    /// Classifier to run
    #[arg(short, long, value_enum, default_value_t = ClassifierKind::DecisionTree)]
    pub model: ClassifierKind,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl PredictArgs {
    /// The flags as an unvalidated field map.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw: RawRecord = [
            (AIR_TEMPERATURE, self.air_temperature_k),
            (PROCESS_TEMPERATURE, self.process_temperature_k),
            (ROTATIONAL_SPEED, self.rotational_speed_rpm),
            (TORQUE, self.torque_nm),
            (TOOL_WEAR, self.tool_wear_min),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Number(v)))
        .collect();
        if let Some(t) = &self.equipment_type {
            raw.insert(TYPE.to_string(), FieldValue::Text(t.clone()));
        }
        raw
    }
}

/// Arguments for the batch command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct BatchArgs {
    /// Input table (.csv, .json, .parquet)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write the annotated CSV here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Classifier to run
    #[arg(short, long, value_enum, default_value_t = ClassifierKind::DecisionTree)]
    pub model: ClassifierKind,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Default log level implied by the verbosity flags.
pub fn log_level(cli: &Cli) -> log::LevelFilter {
    if cli.quiet {
        log::LevelFilter::Error
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READING: [&str; 10] = [
        "--air-temperature-k",
        "298.1",
        "--process-temperature-k",
        "308.6",
        "--rotational-speed-rpm",
        "1551",
        "--torque-nm",
        "42.8",
        "--tool-wear-min",
        "0",
    ];

    fn predict_cli(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut args = vec!["maint-predict", "predict"];
        args.extend(READING);
        args.extend(extra);
        parse_args(args)
    }

    #[test]
    fn test_parse_predict_defaults() {
        let cli = predict_cli(&[]).unwrap();
        match cli.command {
            Command::Predict(args) => {
                assert_eq!(args.rotational_speed_rpm, 1551.0);
                assert_eq!(args.model, ClassifierKind::DecisionTree);
                assert_eq!(args.format, OutputFormat::Text);
                assert!(args.equipment_type.is_none());
            }
            _ => panic!("Expected Predict command"),
        }
    }

    #[test]
    fn test_parse_predict_with_model_and_type() {
        let cli = predict_cli(&["--model", "knn", "--type", "M", "--format", "json"]).unwrap();
        match cli.command {
            Command::Predict(args) => {
                assert_eq!(args.model, ClassifierKind::Knn);
                assert_eq!(args.format, OutputFormat::Json);
                let raw = args.to_raw();
                assert_eq!(raw.len(), 6);
                assert_eq!(raw[TYPE], FieldValue::Text("M".into()));
                assert_eq!(raw[TORQUE], FieldValue::Number(42.8));
            }
            _ => panic!("Expected Predict command"),
        }
    }

    #[test]
    fn test_parse_predict_missing_field_fails() {
        let result = parse_args(["maint-predict", "predict", "--torque-nm", "40"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_predict_unknown_model_fails() {
        assert!(predict_cli(&["--model", "forest"]).is_err());
    }

    #[test]
    fn test_parse_negative_reading() {
        let mut args = vec!["maint-predict", "predict"];
        args.extend(READING);
        args[11] = "-5";
        let cli = parse_args(args).unwrap();
        match cli.command {
            Command::Predict(args) => assert_eq!(args.tool_wear_min, -5.0),
            _ => panic!("Expected Predict command"),
        }
    }

    #[test]
    fn test_parse_batch_with_globals() {
        let cli = parse_args([
            "maint-predict",
            "batch",
            "readings.parquet",
            "--output",
            "out.csv",
            "--model",
            "svm",
            "--model-dir",
            "/srv/models",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.model_dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(log_level(&cli), log::LevelFilter::Debug);
        match cli.command {
            Command::Batch(args) => {
                assert_eq!(args.input, PathBuf::from("readings.parquet"));
                assert_eq!(args.output, Some(PathBuf::from("out.csv")));
                assert_eq!(args.model, ClassifierKind::Svm);
            }
            _ => panic!("Expected Batch command"),
        }
    }

    #[test]
    fn test_parse_models_and_ranges() {
        let cli = parse_args(["maint-predict", "--config", "maint.toml", "models"]).unwrap();
        assert_eq!(cli.command, Command::Models);
        assert_eq!(cli.config, Some(PathBuf::from("maint.toml")));

        let cli = parse_args(["maint-predict", "ranges", "-q"]).unwrap();
        assert_eq!(cli.command, Command::Ranges);
        assert_eq!(log_level(&cli), log::LevelFilter::Error);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(parse_args(["maint-predict", "models", "-v", "-q"]).is_err());
    }
}
