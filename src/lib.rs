#![doc = "Heat-hazard risk prediction: spatial-temporal feature pipeline, classifier training, HTTP serving"]

pub mod cli;
pub mod commands;
pub mod common;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod serve;
pub mod types;

#[doc(inline)]
pub use model::bundle::{ModelBundle, Observation, Prediction, RiskLevel};

#[doc(inline)]
pub use types::{LabelPolicy, PipelineConfig};
