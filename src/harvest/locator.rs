//! Recipe locator.
//!
//! Walks a layer tree and maps package names to recipe files. Every recipe
//! file goes through the match rules in order until one names a package:
//!
//! 1. exact name
//! 2. name with a VCS suffix stripped
//! 3. the directory-generic file name, resolved through the directory path
//! 4. `<package>-` / `<package>_` prefix
//! 5. directory-name prefix of the package
//!
//! The first file to resolve a package keeps it. A later file never replaces
//! it, even through a higher-ranked rule.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::harvest::traits::RecipeFormat;
use crate::model::RecipeIndex;

/// Rule that attributed a recipe file to a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    SuffixStripped,
    Generic,
    PrefixSeparator,
    DirectoryPrefix,
}

/// A recorded (package, file) pair, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeHit {
    pub package: String,
    pub path: PathBuf,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, Default)]
pub struct LocateOutcome {
    pub index: RecipeIndex,

    /// Packages without a recipe, in manifest order (duplicates kept).
    pub not_found: Vec<String>,

    /// Every hit that made it into `index`, in traversal order.
    pub hits: Vec<RecipeHit>,
}

impl LocateOutcome {
    /// Indexed packages in the order their recipes were found.
    pub fn found(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.hits
            .iter()
            .map(|hit| (hit.package.as_str(), hit.path.as_path()))
    }
}

pub fn locate_recipes(
    root: &Path,
    packages: &[String],
    format: &dyn RecipeFormat,
) -> LocateOutcome {
    let known: HashSet<&str> = packages.iter().map(String::as_str).collect();
    let mut outcome = LocateOutcome::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        // files of a directory before its subdirectories, each by name
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !format.can_handle(entry.path()) {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            continue;
        };

        let matched = match_file(
            root,
            entry.path(),
            file_name,
            packages,
            &known,
            &outcome.index,
            format,
        );
        let Some((package, rule)) = matched else {
            continue;
        };

        if outcome.index.contains_key(&package) {
            debug!(
                package = %package,
                path = %entry.path().display(),
                "Recipe shadowed by an earlier match"
            );
            continue;
        }

        info!(
            package = %package,
            rule = ?rule,
            path = %entry.path().display(),
            "Recipe found"
        );
        outcome
            .index
            .insert(package.clone(), entry.path().to_path_buf());
        outcome.hits.push(RecipeHit {
            package,
            path: entry.path().to_path_buf(),
            rule,
        });
    }

    outcome.not_found = packages
        .iter()
        .filter(|pkg| !outcome.index.contains_key(pkg.as_str()))
        .cloned()
        .collect();

    outcome
}

fn match_file(
    root: &Path,
    path: &Path,
    file_name: &str,
    packages: &[String],
    known: &HashSet<&str>,
    index: &RecipeIndex,
    format: &dyn RecipeFormat,
) -> Option<(String, MatchRule)> {
    let original = format.recipe_stem(file_name);
    let stripped = format.strip_vcs_suffix(original);
    let name = stripped.unwrap_or(original);
    let dir = path.parent().unwrap_or(root);

    if known.contains(original) {
        return Some((original.to_string(), MatchRule::Exact));
    }

    if let Some(stripped) = stripped {
        if known.contains(stripped) {
            return Some((stripped.to_string(), MatchRule::SuffixStripped));
        }
    }

    if name == format.generic_token() {
        if let Some(pkg) = generic_owner(root, dir, packages) {
            return Some((pkg.to_string(), MatchRule::Generic));
        }
    }

    let unresolved = move || {
        packages
            .iter()
            .filter(move |pkg| !index.contains_key(pkg.as_str()))
    };

    if let Some(pkg) = unresolved().find(|pkg| {
        [name, original].iter().any(|candidate| {
            candidate.starts_with(&format!("{}-", pkg))
                || candidate.starts_with(&format!("{}_", pkg))
        })
    }) {
        return Some((pkg.clone(), MatchRule::PrefixSeparator));
    }

    let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if dir_name.len() > 3 {
        if let Some(pkg) = unresolved().find(|pkg| {
            pkg.starts_with(dir_name)
                && (original.contains(pkg.as_str()) || file_name.contains(pkg.as_str()))
        }) {
            return Some((pkg.clone(), MatchRule::DirectoryPrefix));
        }
    }

    None
}

/// The single package whose name occurs in the directory path below `root`.
///
/// When that path names no package at all (e.g. `root` is the package
/// directory itself), the name of `root` is searched instead.
fn generic_owner<'a>(root: &Path, dir: &Path, packages: &'a [String]) -> Option<&'a str> {
    let relative = dir.strip_prefix(root).unwrap_or(dir).to_string_lossy();

    match unique_owner(&relative, packages) {
        Owner::None => {
            let root_name = root.file_name()?.to_string_lossy();
            match unique_owner(&root_name, packages) {
                Owner::Unique(pkg) => Some(pkg),
                _ => None,
            }
        }
        Owner::Unique(pkg) => Some(pkg),
        Owner::Ambiguous => None,
    }
}

enum Owner<'a> {
    None,
    Unique(&'a str),
    Ambiguous,
}

fn unique_owner<'a>(haystack: &str, packages: &'a [String]) -> Owner<'a> {
    let mut owners: Vec<&str> = packages
        .iter()
        .map(String::as_str)
        .filter(|pkg| !pkg.is_empty() && haystack.contains(pkg))
        .collect();
    owners.sort_unstable();
    owners.dedup();

    match owners.as_slice() {
        [] => Owner::None,
        [only] => Owner::Unique(*only),
        many => {
            debug!(
                directory = %haystack,
                candidates = ?many,
                "Generic recipe owner is ambiguous"
            );
            Owner::Ambiguous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::formats::BitBake;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        path
    }

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "meta-acme/recipes/foo/foo.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["foo"]), &BitBake);
        assert_eq!(outcome.index.get("foo"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::Exact);
        assert!(outcome.not_found.is_empty());
    }

    #[test]
    fn test_suffix_stripped_match() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "recipes/foo-pkg_git.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["foo-pkg"]), &BitBake);
        assert_eq!(outcome.index.get("foo-pkg"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::SuffixStripped);
    }

    #[test]
    fn test_generic_file_resolves_through_directory() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "layers/geodata/common.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["geodata", "other"]), &BitBake);
        assert_eq!(outcome.index.get("geodata"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::Generic);
        assert_eq!(outcome.not_found, vec!["other"]);
    }

    #[test]
    fn test_generic_file_at_root_uses_root_name() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("geodata");
        let path = touch(&root, "common.bb");

        let outcome = locate_recipes(&root, &pkgs(&["geodata"]), &BitBake);
        assert_eq!(outcome.index.get("geodata"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::Generic);
    }

    #[test]
    fn test_generic_file_ambiguous_owner_is_unresolved() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "geo/geodata/common.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["geo", "geodata"]), &BitBake);
        assert!(outcome.index.is_empty());
    }

    #[test]
    fn test_prefix_separator_match() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "recipes/vdm-client-test.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["vdm-client"]), &BitBake);
        assert_eq!(outcome.index.get("vdm-client"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::PrefixSeparator);
    }

    #[test]
    fn test_directory_prefix_match() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "layers/geodata/geodatatypes1.0.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["geodatatypes"]), &BitBake);
        assert_eq!(outcome.index.get("geodatatypes"), Some(&path));
        assert_eq!(outcome.hits[0].rule, MatchRule::DirectoryPrefix);
    }

    #[test]
    fn test_short_directory_name_is_ignored() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "geo/geox1.0.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["geox"]), &BitBake);
        assert!(outcome.index.is_empty());
        assert_eq!(outcome.not_found, vec!["geox"]);
    }

    #[test]
    fn test_first_visited_file_wins_over_higher_rule() {
        let dir = TempDir::new().unwrap();
        // "a/" is visited before "b/"; the prefix match comes first
        let first = touch(dir.path(), "a/foo-extra.bb");
        touch(dir.path(), "b/foo.bb");

        let outcome = locate_recipes(dir.path(), &pkgs(&["foo"]), &BitBake);
        assert_eq!(outcome.index.get("foo"), Some(&first));
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].rule, MatchRule::PrefixSeparator);
    }

    #[test]
    fn test_files_visited_before_subdirectories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "recipes/aaa/foo.bb");
        let top = touch(dir.path(), "recipes/foo.inc");

        let outcome = locate_recipes(dir.path(), &pkgs(&["foo"]), &BitBake);
        assert_eq!(outcome.index.get("foo"), Some(&top));
    }

    #[test]
    fn test_non_recipe_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "recipes/foo.bbappend");
        touch(dir.path(), "recipes/foo.txt");

        let outcome = locate_recipes(dir.path(), &pkgs(&["foo", "foo"]), &BitBake);
        assert!(outcome.index.is_empty());
        assert_eq!(outcome.not_found, vec!["foo", "foo"]);
    }
}
