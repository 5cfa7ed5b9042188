use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::types::AlignMode;

/// Heat-hazard risk CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "heathazard", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join weather, incidents, and landcover into a feature table
    Prepare(PrepareArgs),

    /// Train classifiers on a feature table and persist the winner
    Train(TrainArgs),

    /// Serve predictions from a trained bundle over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Weather CSV file, or a directory of station CSVs
    #[arg(value_hint = ValueHint::AnyPath)]
    pub weather: PathBuf,

    /// Incident reports (.csv or .json)
    #[arg(value_hint = ValueHint::FilePath)]
    pub incidents: PathBuf,

    /// Land-cover polygons (GeoJSON FeatureCollection)
    #[arg(value_hint = ValueHint::FilePath)]
    pub landcover: PathBuf,

    /// Output feature table (CSV)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Temporal alignment for rolling weather context
    #[arg(long, value_enum, default_value = "day")]
    pub align: AlignMode,

    /// Reject nearest-weather matches farther than this (planar degrees)
    #[arg(long)]
    pub max_distance: Option<f64>,

    /// Keep only the trailing N days of weather history (0 keeps everything)
    #[arg(long, default_value_t = 365)]
    pub trailing_days: i64,

    /// City-center latitude for dist_center
    #[arg(long, default_value_t = 12.9716)]
    pub center_lat: f64,

    /// City-center longitude for dist_center
    #[arg(long, default_value_t = 77.5946)]
    pub center_lon: f64,

    /// Overwrite if the file exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Prepared feature table (CSV)
    #[arg(value_hint = ValueHint::FilePath)]
    pub features: PathBuf,

    /// Output model bundle (JSON)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Incident types labeled positive (defaults to the broad heat set)
    #[arg(long, value_delimiter = ',')]
    pub heat_types: Vec<String>,

    /// Days of trailing history held out for evaluation
    #[arg(long, default_value_t = 90)]
    pub holdout_days: i64,

    /// Hold out this fraction of each class at random instead of the
    /// temporal split (e.g. 0.2)
    #[arg(long, value_name = "FRACTION", conflicts_with = "holdout_days")]
    pub stratified_split: Option<f64>,

    /// Seed for oversampling and fold assignment
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Neighbors considered when synthesizing minority rows
    #[arg(long, default_value_t = 3)]
    pub smote_k: usize,

    /// Stratified cross-validation folds
    #[arg(long, default_value_t = 5)]
    pub cv_folds: usize,

    /// City-center latitude baked into the bundle for dist_center; must match
    /// the value the feature table was prepared with
    #[arg(long, default_value_t = 12.9716)]
    pub center_lat: f64,

    /// City-center longitude baked into the bundle for dist_center
    #[arg(long, default_value_t = 77.5946)]
    pub center_lon: f64,

    /// Overwrite if the file exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Trained model bundle (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn argument_schema_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn heat_types_split_on_commas() {
        let cli = Cli::parse_from([
            "heathazard",
            "train",
            "features.csv",
            "-o",
            "model.json",
            "--heat-types",
            "heat_stroke,dehydration",
        ]);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.heat_types, vec!["heat_stroke", "dehydration"]);
                assert_eq!(args.holdout_days, 90);
                // Defaults match the prepare-side center.
                assert_eq!((args.center_lat, args.center_lon), (12.9716, 77.5946));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
