//! BitBake recipes (`.bb`) and include files (`.inc`).

use crate::harvest::traits::RecipeFormat;

const EXTENSIONS: &[&str] = &["bb", "inc"];
const VCS_SUFFIXES: &[&str] = &["_git", "_svn", "_hg", "-git", "-svn", "-hg"];
const VCS_INDICATORS: &[&str] = &["git", "github"];

#[derive(Debug, Clone, Copy, Default)]
pub struct BitBake;

impl RecipeFormat for BitBake {
    fn name(&self) -> &str {
        "bitbake"
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn vcs_suffixes(&self) -> &[&'static str] {
        VCS_SUFFIXES
    }

    fn generic_token(&self) -> &str {
        "common"
    }

    fn uri_marker(&self) -> &str {
        "SRC_URI"
    }

    fn revision_marker(&self) -> &str {
        "SRCREV"
    }

    fn branch_marker(&self) -> &str {
        "SRCBRANCH"
    }

    fn vcs_indicators(&self) -> &[&'static str] {
        VCS_INDICATORS
    }
}
