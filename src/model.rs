use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// One accepted manifest line: `mc:<group>:<package>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub group: String, // e.g. "rcrip2-0"
    pub package: String,
}

/// Package name → recipe file believed to define it.
pub type RecipeIndex = HashMap<String, PathBuf>;

/// Source declarations pulled out of a recipe. Each field resolves independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declarations {
    pub uri: Option<String>,
    pub revision: Option<String>,
    pub branch: Option<String>,
}

impl Declarations {
    pub fn is_complete(&self) -> bool {
        self.uri.is_some() && self.revision.is_some() && self.branch.is_some()
    }

    /// True once both revision and branch are known; the URI has no fallback search.
    pub fn has_revision_and_branch(&self) -> bool {
        self.revision.is_some() && self.branch.is_some()
    }

    /// Names of the fields that are still unresolved.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.uri.is_none() {
            missing.push("uri");
        }
        if self.revision.is_none() {
            missing.push("revision");
        }
        if self.branch.is_none() {
            missing.push("branch");
        }
        missing
    }
}

/// Final per-package output unit.
///
/// Serialized field names follow the established `final_output.json` layout
/// so downstream consumers keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(rename = "machine")]
    pub group: String,
    pub recipe_path: PathBuf,
    #[serde(rename = "src_uri")]
    pub uri: String,
    #[serde(rename = "src_rev")]
    pub revision: String,
    #[serde(rename = "src_branch")]
    pub branch: String,
    pub tag: Option<String>,
}

/// Package name → record, written once at the end of a run.
pub type ResultSet = BTreeMap<String, ProvenanceRecord>;

/// A located package whose declarations could not all be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompletePackage {
    pub package: String,
    pub recipe_path: PathBuf,
    pub declarations: Declarations,
}
