pub mod balance;
pub mod bundle;
pub mod dataset;
pub mod ensemble;
pub mod logistic;
pub mod metrics;
pub mod scaler;
pub mod threshold;
pub mod trainer;
