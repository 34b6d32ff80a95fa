//! Engine configuration from TOML files and environment

mod file_config;
mod loader;

pub use file_config::{EngineSection, FileConfig, SimulationSection, WeightsSection};
pub use loader::ConfigLoader;
