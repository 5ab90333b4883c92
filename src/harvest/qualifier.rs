//! Version qualifier derived from a manifest group string.

use regex::Regex;
use std::sync::LazyLock;

static DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)").expect("valid regex"));

/// Looser `X<sep>Y` forms, joined as `X.Y`.
static SEPARATED: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d+)-(\d+)").expect("valid regex"),
        Regex::new(r"(\d+)_(\d+)").expect("valid regex"),
    ]
});

/// `"2.0"` from `"rcrip2.0"`, `"rcrip2-0"` or `"rcrip2_0"`; first pattern wins.
pub fn version_qualifier(group: &str) -> Option<String> {
    if let Some(caps) = DOTTED.captures(group) {
        return Some(caps[1].to_string());
    }

    SEPARATED.iter().find_map(|re| {
        re.captures(group)
            .map(|caps| format!("{}.{}", &caps[1], &caps[2]))
    })
}
