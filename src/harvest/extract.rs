//! Declaration extractor.
//!
//! Pulls the source URI, revision and branch out of a recipe. Every lookup is
//! an ordered chain of [`Pattern`]s where the first match wins. Missing revision
//! or branch values are then searched for in sibling files:
//!
//! 1. the recipe itself (the only place a URI is taken from)
//! 2. version-qualified siblings such as `foo_2.0.bb` or `common_2.0.inc`
//! 3. any other recipe in the same directory whose name starts with the base name

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::harvest::traits::{ExtractionError, RecipeFormat};
use crate::model::Declarations;

/// Hosts rewritten to `git@<host>:<owner>/<repo>.git`.
pub const KNOWN_SSH_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Assignment operators accepted after a revision or branch marker.
const ASSIGN_OP: &str = r"(?:\?\?=|\?=|:=|\+=|\.=|=\+|=\.|=)";

static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\s*\n\s*").expect("valid regex"));

static URI_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern::new("gitsm://git@", r#"gitsm://git@([^;"'\s]+)"#),
        Pattern::new("gitsm://", r#"gitsm://([^;"'\s]+)"#),
        Pattern::new("https://git@", r#"https://git@([^;"'\s]+)"#),
        Pattern::new("https://*.git", r#"https://([^;"'\s]+)\.git"#),
        Pattern::new("git://", r#"git://([^;"'\s]+)"#),
        Pattern::new("https://", r#"https://([^;"'\s]+)"#),
        Pattern::new("git@", r#"git@([^;"'\s]+)"#),
        Pattern::new("quoted github", r#""([^";\s]*github\.com[^";\s]*)"#),
        Pattern::new("github flexible", r#"([^"\s]+github\.com[^"\s;]+)"#),
        Pattern::new("any .git", r#"([^"\s;]+\.git)"#),
    ]
});

/// A named regular expression whose first capture group is the value.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: &'static str,
    regex: Regex,
}

impl Pattern {
    fn new(name: &'static str, regex: &str) -> Self {
        Self {
            name,
            regex: Regex::new(regex).expect("valid regex"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capture(&self, line: &str) -> Option<String> {
        self.regex
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Tries `patterns` in order and returns the first captured value.
pub fn first_match(patterns: &[Pattern], line: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        let value = pattern.capture(line);
        match &value {
            Some(v) => debug!(pattern = pattern.name(), value = %v, "Pattern matched"),
            None => debug!(pattern = pattern.name(), "No match for pattern"),
        }
        value
    })
}

/// URI chain, in precedence order.
pub fn uri_patterns() -> &'static [Pattern] {
    &URI_PATTERNS
}

/// Strips a trailing `.git` and rewrites known public hosts into SSH form.
pub fn normalize_uri(raw: &str) -> String {
    let trimmed = raw.strip_suffix(".git").unwrap_or(raw);

    for host in KNOWN_SSH_HOSTS {
        if let Some(pos) = trimmed.find(host) {
            let rest = &trimmed[pos + host.len()..];
            let repo = rest.strip_prefix('/').or_else(|| rest.strip_prefix(':'));
            if let Some(repo) = repo.filter(|r| !r.is_empty()) {
                return format!("git@{}:{}.git", host, repo);
            }
        }
    }

    trimmed.to_string()
}

/// Joins backslash-continued lines and returns trimmed logical lines.
pub fn logical_lines(content: &str) -> Vec<String> {
    LINE_CONTINUATION
        .replace_all(content, " ")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

/// Extracts [`Declarations`] from recipe files of one format.
pub struct RecipeExtractor {
    format: Arc<dyn RecipeFormat>,
    revision_patterns: Vec<Pattern>,
    branch_patterns: Vec<Pattern>,
}

impl RecipeExtractor {
    pub fn new(format: Arc<dyn RecipeFormat>) -> Self {
        let rev = regex::escape(format.revision_marker());
        let branch = regex::escape(format.branch_marker());

        let revision_patterns = vec![
            Pattern::new("quoted", &format!(r#"\b{rev}\s*{ASSIGN_OP}\s*"([^"]+)""#)),
            Pattern::new("single-quoted", &format!(r#"\b{rev}\s*{ASSIGN_OP}\s*'([^']+)'"#)),
            Pattern::new("hex", &format!(r#"\b{rev}\s*{ASSIGN_OP}\s*([a-f0-9]{{6,}})"#)),
            Pattern::new("bare", &format!(r#"\b{rev}\s*{ASSIGN_OP}\s*([^\s;]+)"#)),
        ];
        let branch_patterns = vec![
            Pattern::new("quoted", &format!(r#"\b{branch}\s*{ASSIGN_OP}\s*"([^"]+)""#)),
            Pattern::new("single-quoted", &format!(r#"\b{branch}\s*{ASSIGN_OP}\s*'([^']+)'"#)),
            Pattern::new("bare", &format!(r#"\b{branch}\s*{ASSIGN_OP}\s*([^\s;]+)"#)),
        ];

        Self {
            format,
            revision_patterns,
            branch_patterns,
        }
    }

    /// Extracts declarations for the recipe at `path`.
    ///
    /// `qualifier` (e.g. `"2.0"`) enables the version-qualified sibling search.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] only when the recipe itself cannot be read.
    pub fn extract(
        &self,
        path: &Path,
        qualifier: Option<&str>,
    ) -> Result<Declarations, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let mut decl = Declarations::default();
        self.scan(&content, &mut decl, true);
        info!(
            recipe = %path.display(),
            uri = ?decl.uri,
            revision = ?decl.revision,
            branch = ?decl.branch,
            "Parsed recipe"
        );

        if decl.has_revision_and_branch() {
            return Ok(decl);
        }

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let base = self.format.recipe_stem(file_name);
        let mut visited: HashSet<PathBuf> = HashSet::from([path.to_path_buf()]);

        if let Some(qualifier) = qualifier {
            debug!(base, qualifier, "Searching version-qualified siblings");
            for candidate in self.qualified_siblings(base, qualifier) {
                let sibling = dir.join(&candidate);
                if !sibling.is_file() {
                    debug!(file = %sibling.display(), "Sibling does not exist");
                    continue;
                }
                self.scan_sibling(&sibling, &mut decl);
                visited.insert(sibling);
                if decl.has_revision_and_branch() {
                    return Ok(decl);
                }
            }
        }

        debug!(base, directory = %dir.display(), "Searching directory for related recipes");
        for sibling in self.related_recipes(dir, base) {
            if visited.contains(&sibling) {
                continue;
            }
            self.scan_sibling(&sibling, &mut decl);
            if decl.has_revision_and_branch() {
                break;
            }
        }

        Ok(decl)
    }

    /// Candidate sibling file names, in lookup order.
    fn qualified_siblings(&self, base: &str, qualifier: &str) -> Vec<String> {
        let generic = self.format.generic_token();
        vec![
            format!("{base}_{qualifier}.bb"),
            format!("{base}-{qualifier}.bb"),
            format!("{base}.{qualifier}.bb"),
            format!("{generic}_{qualifier}.inc"),
            format!("{generic}_{qualifier}.bb"),
            format!("{base}_{qualifier}.inc"),
        ]
    }

    /// Recipe files in `dir` whose name starts with `base`, sorted by name.
    fn related_recipes(&self, dir: &Path, base: &str) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "Failed to list recipe directory");
                return Vec::new();
            }
        };

        let mut related: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.format.can_handle(path))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(base))
            })
            .collect();
        related.sort();
        related
    }

    fn scan_sibling(&self, path: &Path, decl: &mut Declarations) {
        match std::fs::read(path) {
            Ok(bytes) => {
                debug!(file = %path.display(), "Scanning sibling");
                let before = decl.clone();
                self.scan(&String::from_utf8_lossy(&bytes), decl, false);
                if *decl != before {
                    info!(
                        file = %path.display(),
                        revision = ?decl.revision,
                        branch = ?decl.branch,
                        "Filled declarations from sibling"
                    );
                }
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Failed to read sibling recipe"),
        }
    }

    /// Fills unresolved fields from `content`; resolved fields are never overwritten.
    fn scan(&self, content: &str, decl: &mut Declarations, with_uri: bool) {
        let format = self.format.as_ref();

        for (idx, line) in logical_lines(content).iter().enumerate() {
            let is_uri_line = line.contains(format.uri_marker())
                && format
                    .vcs_indicators()
                    .iter()
                    .any(|indicator| line.contains(indicator));

            if with_uri && is_uri_line {
                if decl.uri.is_none() {
                    debug!(line = idx + 1, content = %line, "Processing URI line");
                    match first_match(uri_patterns(), line) {
                        Some(raw) => decl.uri = Some(normalize_uri(&raw)),
                        None => warn!(line = idx + 1, content = %line, "No URI pattern matched"),
                    }
                }
            } else if line.contains(format.revision_marker()) {
                if decl.revision.is_none() {
                    debug!(line = idx + 1, content = %line, "Processing revision line");
                    decl.revision = first_match(&self.revision_patterns, line);
                }
            } else if line.contains(format.branch_marker()) && decl.branch.is_none() {
                debug!(line = idx + 1, content = %line, "Processing branch line");
                decl.branch = first_match(&self.branch_patterns, line);
            }

            let done = if with_uri {
                decl.is_complete()
            } else {
                decl.has_revision_and_branch()
            };
            if done {
                break;
            }
        }
    }
}
