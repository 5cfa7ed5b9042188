pub mod export;
pub mod incidents;
pub mod landcover;
pub mod weather;
