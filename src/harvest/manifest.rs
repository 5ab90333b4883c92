//! Build-manifest reader.
//!
//! A manifest line is accepted only when it has the form `mc:<group>:<package>`
//! with a non-empty group and package.
//! Everything else is skipped with a warning; nothing here halts a run.

use std::path::Path;
use tracing::{info, warn};

use crate::harvest::traits::ManifestError;
use crate::model::ManifestEntry;

/// Literal first field of a machine-scoped package entry.
pub const ENTRY_PREFIX: &str = "mc";

/// A manifest line that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based
    pub line_number: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    /// Accepted entries in file order.
    pub entries: Vec<ManifestEntry>,

    /// Package names in file order, duplicates kept.
    pub packages: Vec<String>,

    pub malformed: Vec<MalformedLine>,
}

impl ParsedManifest {
    /// Group of the first entry naming `package`.
    pub fn group_of(&self, package: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.package == package)
            .map(|entry| entry.group.as_str())
    }
}

/// Reads and parses the manifest at `path`.
pub fn read_manifest(path: &Path) -> Result<ParsedManifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_manifest(&text))
}

pub fn parse_manifest(text: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        match parse_line(line) {
            Some(entry) => {
                info!(group = %entry.group, package = %entry.package, "Parsed manifest entry");
                parsed.packages.push(entry.package.clone());
                parsed.entries.push(entry);
            }
            None => {
                warn!(line = idx + 1, content = %line, "Malformed manifest line skipped");
                parsed.malformed.push(MalformedLine {
                    line_number: idx + 1,
                    content: line.to_string(),
                });
            }
        }
    }

    parsed
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let fields: Vec<&str> = line.split(':').collect();
    match fields.as_slice() {
        [prefix, group, package]
            if *prefix == ENTRY_PREFIX && !group.is_empty() && !package.is_empty() =>
        {
            Some(ManifestEntry {
                group: group.to_string(),
                package: package.to_string(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_entry() {
        let parsed = parse_manifest("mc:rcrip2-0:foo-pkg\n");
        assert_eq!(
            parsed.entries,
            vec![ManifestEntry {
                group: "rcrip2-0".to_string(),
                package: "foo-pkg".to_string(),
            }]
        );
        assert_eq!(parsed.packages, vec!["foo-pkg"]);
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn test_two_field_line_is_malformed() {
        let parsed = parse_manifest("mc:onlytwofields\n");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.malformed.len(), 1);
        assert_eq!(parsed.malformed[0].line_number, 1);
        assert_eq!(parsed.malformed[0].content, "mc:onlytwofields");
    }

    #[test]
    fn test_empty_fields_are_malformed() {
        let parsed = parse_manifest("mc:rcrip2-0:\nmc::foo\nmc:rcrip2-0:foo\n");
        assert_eq!(parsed.packages, vec!["foo"]);
        assert_eq!(parsed.malformed.len(), 2);
        assert_eq!(parsed.malformed[0].line_number, 1);
        assert_eq!(parsed.malformed[1].line_number, 2);
    }

    #[test]
    fn test_entry_count_matches_accepted_lines() {
        let text = "\
mc:rcrip2-0:alpha
# comment
mc:rcrip2-0:beta:extra
other:rcrip2-0:gamma
mc:rcrip3-1:alpha

  mc:rcrip3-1:delta
";
        let parsed = parse_manifest(text);
        assert_eq!(parsed.entries.len(), 3);
        assert_eq!(parsed.malformed.len(), 4);
        assert_eq!(parsed.entries.len() + parsed.malformed.len(), text.lines().count());
        // duplicates and order preserved
        assert_eq!(parsed.packages, vec!["alpha", "alpha", "delta"]);
    }

    #[test]
    fn test_group_of_uses_first_entry() {
        let parsed = parse_manifest("mc:rcrip2-0:alpha\nmc:rcrip3-1:alpha\n");
        assert_eq!(parsed.group_of("alpha"), Some("rcrip2-0"));
        assert_eq!(parsed.group_of("missing"), None);
    }

    #[test]
    fn test_read_manifest_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_manifest(&dir.path().join("pn-buildlist")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
