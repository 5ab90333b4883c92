//! Harvest module - recipe discovery and provenance resolution pipeline.
//!
//! This module provides the stages of a provenance run:
//! - **Traits**: [`RecipeFormat`] describing a recipe syntax
//! - **Manifest**: build manifest parsing via [`read_manifest`]
//! - **Locator**: package to recipe mapping via [`locate_recipes`]
//! - **Extract**: URI / revision / branch extraction via [`RecipeExtractor`]
//! - **Resolver**: tag lookup via [`ProvenanceResolver`]
//! - **Pipeline**: async driver via [`pipeline::ProvenancePipeline`]

pub mod extract;
pub mod formats;
pub mod locator;
pub mod manifest;
pub mod pipeline;
pub mod qualifier;
pub mod resolver;
pub mod traits;

// Re-export commonly used types
pub use traits::{ExtractionError, ManifestError, RecipeFormat};

pub use extract::{normalize_uri, RecipeExtractor};
pub use formats::BitBake;
pub use locator::{locate_recipes, LocateOutcome, MatchRule, RecipeHit};
pub use manifest::{parse_manifest, read_manifest, MalformedLine, ParsedManifest};
pub use pipeline::{
    write_results, FailedPackage, PipelineError, ProvenancePipeline, RunReport, RunStats,
};
pub use qualifier::version_qualifier;
pub use resolver::{CloneWorkspace, ProvenanceResolver, TagFallback};
