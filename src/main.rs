use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use maint_predict::cli::{BatchArgs, Cli, Command, OutputFormat, PredictArgs, log_level};
use maint_predict::config::AppConfig;
use maint_predict::data::{loader, writer};
use maint_predict::models::ModelStore;
use maint_predict::{pipeline, report};

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log_level(&cli))
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.model_dir {
        config.models.dir = dir;
    }

    if cli.command == Command::Ranges {
        print!("{}", report::ranges_text(&config.ranges));
        return Ok(());
    }

    let store = ModelStore::load(&config.models, config.feature_set);
    match cli.command {
        Command::Predict(args) => predict(&store, &config, &args),
        Command::Batch(args) => batch(&store, &config, &args),
        Command::Models => {
            print!("{}", report::status_text(&store.status()));
            Ok(())
        }
        Command::Ranges => Ok(()),
    }
}

fn predict(store: &ModelStore, config: &AppConfig, args: &PredictArgs) -> Result<()> {
    let result = pipeline::predict_record(store, &config.ranges, &args.to_raw(), args.model)?;
    match args.format {
        OutputFormat::Text => print!("{}", report::prediction_text(args.model, &result)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report::prediction_json(args.model, &result))?
        ),
    }
    Ok(())
}

fn batch(store: &ModelStore, config: &AppConfig, args: &BatchArgs) -> Result<()> {
    let table = loader::load_table(&args.input)
        .with_context(|| format!("failed loading {}", args.input.display()))?;
    log::info!("Loaded {} rows from {}", table.len(), args.input.display());

    let annotated = pipeline::predict_table(store, &config.ranges, &table, args.model)?;

    match &args.output {
        Some(path) => {
            writer::write_csv_file(&annotated, path)?;
            log::info!("Wrote {} rows to {}", annotated.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            writer::write_csv(&annotated, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
