pub mod bids;
pub mod config;
pub mod convert;
pub mod description;
pub mod edf;
pub mod error;
pub mod metadata;
pub mod participants;
pub mod pipeline;
pub mod sidecar;
pub mod tsv;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{run, RunSummary};
