pub mod config;
pub mod error;
pub mod filter;
pub mod staging;
pub mod source;
pub mod pipeline;
pub mod kb;
pub mod agent;

pub use config::Config;
pub use error::{KbforgeError, Result};
pub use filter::{FileFilter, SupportedType};
pub use pipeline::{IngestionOutcome, IngestionPipeline, IngestionReport, OutcomeStatus};
pub use staging::StagingArea;
