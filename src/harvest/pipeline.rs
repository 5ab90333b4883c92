//! Provenance pipeline driver.
//!
//! This module provides the [`ProvenancePipeline`] coordinator that runs the
//! stages (Manifest → Locator → Extractor → Resolver) with:
//! - Bounded per-package concurrency via [`ProvenanceExecutor`]
//! - Per-package failure isolation: no package can abort the run
//! - Structured logging via `tracing`, one `package` span per package

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::executor::ProvenanceExecutor;
use crate::harvest::extract::RecipeExtractor;
use crate::harvest::formats::BitBake;
use crate::harvest::locator::{locate_recipes, LocateOutcome};
use crate::harvest::manifest::{read_manifest, ParsedManifest};
use crate::harvest::qualifier::version_qualifier;
use crate::harvest::resolver::ProvenanceResolver;
use crate::harvest::traits::{ManifestError, RecipeFormat};
use crate::model::{IncompletePackage, ProvenanceRecord, ResultSet};
use crate::traits::VcsBackend;

// ============================================================================
// Pipeline Types
// ============================================================================

/// What happened to one located package.
#[derive(Debug)]
enum PackageOutcome {
    Resolved(ProvenanceRecord),
    Incomplete(IncompletePackage),
    Failed(String),
}

/// A package whose processing failed outright (unreadable recipe, panic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPackage {
    pub package: String,
    pub reason: String,
}

/// Statistics about a run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Total time spent on the entire run (milliseconds)
    pub total_duration_ms: u64,

    /// Time spent walking the recipe tree (milliseconds)
    pub locate_duration_ms: u64,

    /// Time spent extracting and resolving packages (milliseconds)
    pub resolve_duration_ms: u64,

    /// Accepted manifest entries
    pub manifest_entries: usize,

    /// Skipped manifest lines
    pub malformed_lines: usize,

    /// Packages with a located recipe
    pub recipes_found: usize,
}

/// Complete result of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: ResultSet,

    /// Manifest packages without a recipe (manifest order, duplicates kept)
    pub not_found: Vec<String>,

    /// Located packages missing a URI, revision or branch
    pub incomplete: Vec<IncompletePackage>,

    pub failed: Vec<FailedPackage>,

    pub stats: RunStats,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that abort a run. Per-package problems never end up here.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Manifest could not be read
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Recipe tree walk did not complete
    #[error("Recipe search failed: {0}")]
    LocateFailed(String),

    /// Result file could not be written
    #[error("Failed to write results to '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Results could not be serialized
    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Provenance pipeline over one recipe format and one VCS backend.
///
/// # Example
///
/// ```ignore
/// use recipe_provenance::{GitCli, ProvenancePipeline, RunConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RunConfig::new("pn-buildlist", "layers");
///     let pipeline = ProvenancePipeline::from_config(&config, Arc::new(GitCli::new()));
///
///     let report = pipeline.run(&config.manifest_path, &config.layers_path).await?;
///     println!("Resolved {} packages", report.results.len());
///     Ok(())
/// }
/// ```
pub struct ProvenancePipeline<V: VcsBackend + 'static> {
    format: Arc<dyn RecipeFormat>,
    extractor: Arc<RecipeExtractor>,
    resolver: Arc<ProvenanceResolver<V>>,
    executor: ProvenanceExecutor,
}

impl<V: VcsBackend + 'static> ProvenancePipeline<V> {
    /// Creates a BitBake pipeline around an already configured resolver.
    pub fn new(resolver: ProvenanceResolver<V>, jobs: usize) -> Self {
        Self::with_format(Arc::new(BitBake), resolver, jobs)
    }

    pub fn with_format(
        format: Arc<dyn RecipeFormat>,
        resolver: ProvenanceResolver<V>,
        jobs: usize,
    ) -> Self {
        Self {
            extractor: Arc::new(RecipeExtractor::new(Arc::clone(&format))),
            format,
            resolver: Arc::new(resolver),
            executor: ProvenanceExecutor::new(jobs),
        }
    }

    pub fn from_config(config: &RunConfig, backend: Arc<V>) -> Self {
        let resolver = ProvenanceResolver::new(backend)
            .with_timeout(config.clone_timeout)
            .with_fallback(config.tag_fallback)
            .with_keep_workdirs(config.keep_workdirs);
        Self::new(resolver, config.jobs)
    }

    /// Runs manifest parsing, recipe location and per-package resolution.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for run-level problems (unreadable
    /// manifest, aborted tree walk). Package-level failures are reported in
    /// [`RunReport`].
    pub async fn run(&self, manifest_path: &Path, layers_path: &Path) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut report = RunReport::default();
        info!(
            format = self.format.name(),
            manifest = %manifest_path.display(),
            layers = %layers_path.display(),
            "Starting provenance run"
        );

        // ====================================================================
        // Stage 1: Manifest
        // ====================================================================

        let manifest = read_manifest(manifest_path)?;
        report.stats.manifest_entries = manifest.entries.len();
        report.stats.malformed_lines = manifest.malformed.len();
        info!(
            entries = manifest.entries.len(),
            malformed = manifest.malformed.len(),
            "Manifest read"
        );

        // ====================================================================
        // Stage 2: Locate recipes
        // ====================================================================

        let locate_start = Instant::now();
        let located = self.locate(layers_path, &manifest).await?;
        report.stats.locate_duration_ms = locate_start.elapsed().as_millis() as u64;
        report.stats.recipes_found = located.index.len();
        info!(
            found = located.index.len(),
            missing = located.not_found.len(),
            duration_ms = report.stats.locate_duration_ms,
            "Recipe search completed"
        );
        for package in &located.not_found {
            warn!(package = %package, "No recipe found");
        }

        // ====================================================================
        // Stage 3: Extract and resolve, one job per package
        // ====================================================================

        let resolve_start = Instant::now();
        let jobs: Vec<_> = located
            .found()
            .map(|(package, path)| {
                let group = manifest.group_of(package).unwrap_or_default().to_string();
                (
                    package.to_string(),
                    self.package_job(package.to_string(), group, path.to_path_buf()),
                )
            })
            .collect();

        for (package, outcome) in self.executor.run_all(jobs).await {
            match outcome {
                Ok(PackageOutcome::Resolved(record)) => {
                    report.results.insert(package, record);
                }
                Ok(PackageOutcome::Incomplete(incomplete)) => report.incomplete.push(incomplete),
                Ok(PackageOutcome::Failed(reason)) => {
                    report.failed.push(FailedPackage { package, reason })
                }
                Err(e) => report.failed.push(FailedPackage {
                    package,
                    reason: e.to_string(),
                }),
            }
        }

        report.not_found = located.not_found;
        report.stats.resolve_duration_ms = resolve_start.elapsed().as_millis() as u64;
        report.stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            resolved = report.results.len(),
            incomplete = report.incomplete.len(),
            failed = report.failed.len(),
            not_found = report.not_found.len(),
            duration_ms = report.stats.total_duration_ms,
            "Run completed"
        );

        Ok(report)
    }

    async fn locate(
        &self,
        layers_path: &Path,
        manifest: &ParsedManifest,
    ) -> Result<LocateOutcome, PipelineError> {
        let root = layers_path.to_path_buf();
        let packages = manifest.packages.clone();
        let format = Arc::clone(&self.format);

        tokio::task::spawn_blocking(move || locate_recipes(&root, &packages, format.as_ref()))
            .await
            .map_err(|e| PipelineError::LocateFailed(e.to_string()))
    }

    /// Builds the future that extracts and resolves one package.
    fn package_job(
        &self,
        package: String,
        group: String,
        path: PathBuf,
    ) -> impl std::future::Future<Output = PackageOutcome> + Send + 'static {
        let extractor = Arc::clone(&self.extractor);
        let resolver = Arc::clone(&self.resolver);

        async move {
            let qualifier = version_qualifier(&group);
            info!(group = %group, qualifier = ?qualifier, recipe = %path.display(), "Processing recipe");

            let recipe = path.clone();
            let extracted = tokio::task::spawn_blocking(move || {
                extractor.extract(&recipe, qualifier.as_deref())
            })
            .await;

            let decl = match extracted {
                Ok(Ok(decl)) => decl,
                Ok(Err(e)) => {
                    warn!(error = %e, "Extraction failed");
                    return PackageOutcome::Failed(e.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "Extraction task failed");
                    return PackageOutcome::Failed(format!("Extraction task failed: {}", e));
                }
            };

            let (uri, revision, branch) = match (
                decl.uri.clone(),
                decl.revision.clone(),
                decl.branch.clone(),
            ) {
                (Some(uri), Some(revision), Some(branch)) => (uri, revision, branch),
                _ => {
                    warn!(
                        missing = ?decl.missing(),
                        uri = ?decl.uri,
                        revision = ?decl.revision,
                        branch = ?decl.branch,
                        "Incomplete source info"
                    );
                    return PackageOutcome::Incomplete(IncompletePackage {
                        package,
                        recipe_path: path,
                        declarations: decl,
                    });
                }
            };

            let tag = resolver.resolve_tag(&uri, &branch, &revision).await;
            info!(tag = ?tag, "Package resolved");

            PackageOutcome::Resolved(ProvenanceRecord {
                group,
                recipe_path: path,
                uri,
                revision,
                branch,
                tag,
            })
        }
    }
}

/// Writes the result set as pretty-printed JSON.
pub fn write_results(path: &Path, results: &ResultSet) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json).map_err(|source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::resolver::tests::MockVcs;
    use crate::harvest::resolver::TagFallback;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        manifest: PathBuf,
        layers: PathBuf,
        workspaces: PathBuf,
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture(manifest: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let layers = dir.path().join("layers");
        let workspaces = dir.path().join("work");
        fs::create_dir_all(&workspaces).unwrap();
        let manifest_path = dir.path().join("pn-buildlist");
        write(&manifest_path, manifest);

        write(
            &layers.join("meta-acme/recipes-core/foo-pkg/foo-pkg_git.bb"),
            "SRC_URI = \"git://github.com/acme/foo-pkg.git;branch=${SRCBRANCH}\"\n\
             SRCREV = \"abcdef1234567890\"\n\
             SRCBRANCH = \"main\"\n",
        );
        write(
            &layers.join("meta-acme/recipes-geo/geodata/common.bb"),
            "SRC_URI = \"gitsm://git@github.com/acme/geodata.git;protocol=ssh\"\n\
             SRCBRANCH = \"release\"\n",
        );
        write(
            &layers.join("meta-acme/recipes-geo/geodata/common_2.0.inc"),
            "SRCREV = \"0123456789abcdef\"\n",
        );
        write(
            &layers.join("meta-acme/recipes-core/norev/norev.bb"),
            "SRC_URI = \"git://github.com/acme/norev.git\"\nSRCBRANCH = \"main\"\n",
        );

        Fixture {
            _dir: dir,
            manifest: manifest_path,
            layers,
            workspaces,
        }
    }

    fn pipeline(vcs: MockVcs, fx: &Fixture) -> ProvenancePipeline<MockVcs> {
        let resolver = ProvenanceResolver::new(Arc::new(vcs)).with_workspace_parent(&fx.workspaces);
        ProvenancePipeline::new(resolver, 2)
    }

    const MANIFEST: &str = "\
mc:rcrip2-0:foo-pkg
mc:rcrip2-0:geodata
mc:rcrip2-0:norev
mc:rcrip2-0:ghost
mc:broken
mc:rcrip2-0:foo-pkg
";

    #[tokio::test]
    async fn test_run_resolves_complete_packages() {
        let fx = fixture(MANIFEST);
        let report = pipeline(MockVcs::default(), &fx)
            .run(&fx.manifest, &fx.layers)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        let foo = &report.results["foo-pkg"];
        assert_eq!(foo.group, "rcrip2-0");
        assert_eq!(foo.uri, "git@github.com:acme/foo-pkg.git");
        assert_eq!(foo.revision, "abcdef1234567890");
        assert_eq!(foo.branch, "main");
        assert_eq!(foo.tag.as_deref(), Some("v1.2.0-3-gabcdef1"));

        let geo = &report.results["geodata"];
        assert_eq!(geo.uri, "git@github.com:acme/geodata.git");
        assert_eq!(geo.revision, "0123456789abcdef");
        assert_eq!(geo.branch, "release");
    }

    #[tokio::test]
    async fn test_run_reports_incomplete_and_missing() {
        let fx = fixture(MANIFEST);
        let report = pipeline(MockVcs::default(), &fx)
            .run(&fx.manifest, &fx.layers)
            .await
            .unwrap();

        assert!(!report.results.contains_key("norev"));
        assert_eq!(report.incomplete.len(), 1);
        assert_eq!(report.incomplete[0].package, "norev");
        assert_eq!(report.incomplete[0].declarations.missing(), vec!["revision"]);

        assert_eq!(report.not_found, vec!["ghost"]);
        assert_eq!(report.stats.malformed_lines, 1);
        assert_eq!(report.stats.manifest_entries, 5);
        assert_eq!(report.stats.recipes_found, 3);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_remote_uses_fallback_label() {
        let fx = fixture(MANIFEST);
        let vcs = MockVcs {
            fail_clone: true,
            ..Default::default()
        };
        let report = pipeline(vcs, &fx).run(&fx.manifest, &fx.layers).await.unwrap();

        assert_eq!(report.results["foo-pkg"].tag.as_deref(), Some("rev-abcdef12"));
        assert_eq!(report.results["geodata"].tag.as_deref(), Some("rev-01234567"));
        assert_eq!(fs::read_dir(&fx.workspaces).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_remote_with_absent_policy() {
        let fx = fixture(MANIFEST);
        let vcs = MockVcs {
            fail_clone: true,
            ..Default::default()
        };
        let resolver = ProvenanceResolver::new(Arc::new(vcs))
            .with_workspace_parent(&fx.workspaces)
            .with_fallback(TagFallback::Absent);
        let report = ProvenancePipeline::new(resolver, 1)
            .run(&fx.manifest, &fx.layers)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(report.results.values().all(|r| r.tag.is_none()));
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_run_error() {
        let fx = fixture(MANIFEST);
        let err = pipeline(MockVcs::default(), &fx)
            .run(&fx.layers.join("missing"), &fx.layers)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Manifest(_)));
    }

    #[tokio::test]
    async fn test_write_results() {
        let fx = fixture(MANIFEST);
        let report = pipeline(MockVcs::default(), &fx)
            .run(&fx.manifest, &fx.layers)
            .await
            .unwrap();

        let out = fx.workspaces.join("final_output.json");
        write_results(&out, &report.results).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["foo-pkg"]["machine"], "rcrip2-0");
        assert_eq!(json["foo-pkg"]["src_rev"], "abcdef1234567890");
        assert_eq!(json["geodata"]["src_branch"], "release");
        assert!(json.get("norev").is_none());
    }
}
