//! CLI commands for Arbor.
//!
//! - **simulate**: step a repeat decorator over a scripted child
//! - **config**: show the effective configuration

pub mod config_cmd;
pub mod simulate;

pub use config_cmd::ConfigCommand;
pub use simulate::SimulateCommand;
