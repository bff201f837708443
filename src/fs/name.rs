//! Filename sanitisation, slugs, deduplication, and the identifier
//! pattern.
//!
//! Everything here is pure; listing and lookup share these functions so a
//! name produced by `readdir` always resolves back to the same record.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::User;

/// Issue identifier shape: 1-5 uppercase ASCII letters, `-`, digits.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}-[0-9]+$").expect("identifier pattern"));

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// Slug-style directory name: lowercase, spaces to dashes, everything
/// outside `[a-z0-9-]` stripped.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Slugify with the fallback chain: name, then backend slug, then id.
pub fn slug_or(name: &str, slug: Option<&str>, id: &str) -> String {
    let slugged = slugify(name);
    if !slugged.is_empty() {
        return slugged;
    }
    match slug {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => id.to_string(),
    }
}

/// Name-style directory name: case preserved, spaces and slashes to
/// dashes (cycles, labels, milestones).
pub fn name_style(name: &str) -> String {
    let replaced: String =
        name.chars().map(|c| if c == ' ' || c == '/' { '-' } else { c }).collect();
    sanitize_component(&replaced)
}

/// Make an arbitrary string safe as a single path component: path
/// separators and NULs replaced, leading/trailing whitespace and dots
/// trimmed, empty result becomes `untitled`.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String =
        name.chars().map(|c| if c == '/' || c == '\0' { '-' } else { c }).collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Insert ` (N)` before the last extension dot; append when there is no
/// extension.
fn decorate(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => format!("{base} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// Make every entry in a listing unique, preserving order. The second
/// and later occurrences of a name become `name (2)`, `name (3)`, ...
/// with the extension preserved. Pure and idempotent: a list that is
/// already unique maps to itself.
pub fn dedup_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name = name.as_ref();
        let mut candidate = name.to_string();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = decorate(name, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Recover which listing index a (possibly deduplicated) name refers to.
pub fn dedup_index<I, S>(names: I, wanted: &str) -> Option<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dedup_names(names).iter().position(|n| n == wanted)
}

/// Scoped-search query decoding: `+` is a space, byte for byte.
pub fn decode_query(encoded: &str) -> String {
    encoded.chars().map(|c| if c == '+' { ' ' } else { c }).collect()
}

/// The short handle a user appears under in `users/` and `by/assignee/`.
pub fn user_handle(user: &User) -> String {
    let base = if user.display_name.is_empty() { &user.name } else { &user.display_name };
    name_style(base)
}

/// Restore a title from a record filename: strip `.md`, dashes back to
/// spaces.
pub fn title_from_filename(filename: &str) -> String {
    let base = filename.strip_suffix(".md").unwrap_or(filename);
    base.replace('-', " ")
}

/// Relative symlink target from a directory `depth` components below the
/// mount root to the canonical issue directory.
pub fn issue_link_target(depth: usize, team_key: &str, identifier: &str) -> String {
    let mut target = "../".repeat(depth);
    target.push_str(&format!("teams/{team_key}/issues/{identifier}"));
    target
}

/// Relative symlink target to a project directory.
pub fn project_link_target(depth: usize, team_key: &str, slug: &str) -> String {
    let mut target = "../".repeat(depth);
    target.push_str(&format!("teams/{team_key}/projects/{slug}"));
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identifier_pattern_bounds() {
        assert!(is_identifier("ENG-42"));
        assert!(is_identifier("A-1"));
        assert!(is_identifier("ABCDE-123456"));
        assert!(!is_identifier("ABCDEF-1"));
        assert!(!is_identifier("eng-42"));
        assert!(!is_identifier("ENG-"));
        assert!(!is_identifier("ENG42"));
        assert!(!is_identifier("ENG-42x"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn slugify_strips_and_lowers() {
        assert_eq!(slugify("Refactor Storage"), "refactor-storage");
        assert_eq!(slugify("Q1 / Planning!"), "q1--planning");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn slug_fallback_chain() {
        assert_eq!(slug_or("Storage", Some("storage-9f3"), "uuid-1"), "storage");
        assert_eq!(slug_or("???", Some("storage-9f3"), "uuid-1"), "storage-9f3");
        assert_eq!(slug_or("???", None, "uuid-1"), "uuid-1");
    }

    #[test]
    fn name_style_keeps_case() {
        assert_eq!(name_style("Sprint 12"), "Sprint-12");
        assert_eq!(name_style("infra/ops"), "infra-ops");
    }

    #[test]
    fn sanitize_handles_hostile_names() {
        assert_eq!(sanitize_component("a/b"), "a-b");
        assert_eq!(sanitize_component("  spaced  "), "spaced");
        assert_eq!(sanitize_component("..hidden."), "hidden");
        assert_eq!(sanitize_component("..."), "untitled");
        assert_eq!(sanitize_component(""), "untitled");
    }

    #[test]
    fn dedup_inserts_counter_before_extension() {
        let names = ["image.png", "image.png", "image.png", "notes"];
        assert_eq!(
            dedup_names(names),
            vec!["image.png", "image (2).png", "image (3).png", "notes"]
        );
    }

    #[test]
    fn dedup_without_extension_appends() {
        assert_eq!(dedup_names(["a", "a"]), vec!["a", "a (2)"]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let names = vec!["x.png".to_string(), "x.png".to_string(), "y".to_string()];
        let once = dedup_names(&names);
        let twice = dedup_names(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn dedup_index_recovers_record() {
        let names = ["image.png", "image.png", "other.txt"];
        assert_eq!(dedup_index(names, "image (2).png"), Some(1));
        assert_eq!(dedup_index(names, "other.txt"), Some(2));
        assert_eq!(dedup_index(names, "missing"), None);
    }

    #[test]
    fn query_decoding() {
        assert_eq!(decode_query("a+b+c"), "a b c");
        assert_eq!(decode_query(""), "");
        assert_eq!(decode_query("a++b"), "a  b");
        assert_eq!(decode_query("plain"), "plain");
    }

    #[test]
    fn link_targets_traverse_to_teams() {
        assert_eq!(
            issue_link_target(5, "ENG", "ENG-1"),
            "../../../../../teams/ENG/issues/ENG-1"
        );
        assert_eq!(issue_link_target(2, "OPS", "OPS-9"), "../../teams/OPS/issues/OPS-9");
    }

    #[test]
    fn titles_restore_spaces() {
        assert_eq!(title_from_filename("release-notes.md"), "release notes");
        assert_eq!(title_from_filename("plain"), "plain");
    }
}
