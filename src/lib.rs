pub mod archive;
pub mod boundary;
pub mod build;
pub mod ci;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod ledger;
pub mod pipeline;
pub mod resolver;
pub mod telemetry;
pub mod ui;

pub use error::{RelgateError, Result};
