pub mod config;
pub mod executor;
pub mod harvest;
pub mod logging;
pub mod model;
pub mod traits;
pub mod vcs;

// Re-export common types for convenience
pub use config::{ConfigError, RunConfig};
pub use executor::*;
pub use harvest::{ProvenancePipeline, RunReport, TagFallback};
pub use model::*;
pub use traits::*;
pub use vcs::GitCli;
