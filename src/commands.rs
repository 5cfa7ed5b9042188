use anyhow::Result;

use crate::cli::{PrepareArgs, ServeArgs, TrainArgs};
use crate::model::trainer::{run_train, TrainOptions};
use crate::pipeline::{run_prepare, PreparePaths};
use crate::types::{LabelPolicy, PipelineConfig};

pub fn prepare(cli: &crate::cli::Cli, args: &PrepareArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!(
            "[prepare] weather={} incidents={} landcover={} -> {}",
            args.weather.display(),
            args.incidents.display(),
            args.landcover.display(),
            args.output.display()
        );
    }

    let cfg = PipelineConfig {
        center: (args.center_lat, args.center_lon),
        max_weather_distance: args.max_distance,
        trailing_days: (args.trailing_days > 0).then_some(args.trailing_days),
        align: args.align,
    };
    let paths = PreparePaths {
        weather: &args.weather,
        incidents: &args.incidents,
        landcover: &args.landcover,
        output: &args.output,
    };

    let rows = run_prepare(&paths, &cfg, args.force)?;
    println!("Wrote {} feature rows to {}", rows, args.output.display());
    Ok(())
}

pub fn train(cli: &crate::cli::Cli, args: &TrainArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!("[train] features={} -> {}", args.features.display(), args.output.display());
    }

    let policy = if args.heat_types.is_empty() {
        LabelPolicy::default()
    } else {
        LabelPolicy::custom(args.heat_types.clone())
    };
    let opts = TrainOptions {
        holdout_days: args.holdout_days,
        stratified_fraction: args.stratified_split,
        smote_k: args.smote_k,
        seed: args.seed,
        cv_folds: args.cv_folds,
        center: (args.center_lat, args.center_lon),
        ..TrainOptions::default()
    };

    let report = run_train(&args.features, &args.output, &policy, &opts, args.force)?;
    println!(
        "Trained {} (holdout ap={:.3}, threshold={:.3}) -> {}",
        report.chosen,
        report.gbdt_ap.max(report.logistic_ap),
        report.threshold,
        args.output.display()
    );
    Ok(())
}

pub fn serve(cli: &crate::cli::Cli, args: &ServeArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!("[serve] model={} on {}:{}", args.model.display(), args.host, args.port);
    }
    crate::serve::run(args.model.clone(), &args.host, args.port)
}
