//! Rendering a [`ContractDiff`] for people and machines.

use std::fmt::Write as _;
use std::str::FromStr;

use apidrift_core::contract::{Change, ContractDiff};
use thiserror::Error;

/// Unknown output format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown format {0:?} (expected json, markdown, or text)")]
pub struct FormatError(pub String);

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// The diff verbatim, as pretty JSON.
    Json,
    /// A titled Markdown report.
    #[default]
    Markdown,
    /// The Markdown structure without markup.
    Text,
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(FormatError(s.to_string())),
        }
    }
}

impl Format {
    /// Pick the format from a flag, then config, then the global `--json`
    /// switch, falling back to Markdown.
    pub fn resolve(flag: Option<&str>, config: Option<&str>, json: bool) -> Result<Self, FormatError> {
        match flag.or(config) {
            Some(name) => name.parse(),
            None if json => Ok(Self::Json),
            None => Ok(Self::default()),
        }
    }
}

/// Render `diff` in `format`.
pub fn render(diff: &ContractDiff, format: Format) -> serde_json::Result<String> {
    match format {
        Format::Json => serde_json::to_string_pretty(diff),
        Format::Markdown => Ok(markdown(diff)),
        Format::Text => Ok(text(diff)),
    }
}

fn markdown(diff: &ContractDiff) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# API changes in `{}`", diff.package_name);
    let _ = writeln!(out);
    let _ = writeln!(out, "**{}** → **{}**", version(&diff.old_version), version(&diff.new_version));
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let s = &diff.summary;
    let _ = writeln!(out, "- Breaking changes: {}", s.total_breaking_changes);
    let _ = writeln!(out, "- Additions: {}", s.total_additions);
    let _ = writeln!(out, "- Modifications: {}", s.total_modifications);

    if !diff.breaking_changes.is_empty() {
        let _ = writeln!(out, "\n## Breaking Changes\n");
        for change in &diff.breaking_changes {
            let _ = writeln!(out, "### `{}` ({})\n", change.item, change.change_type);
            let _ = writeln!(out, "{}\n", change.description);
            if let Some(old) = &change.old_value {
                let _ = writeln!(out, "Old:\n\n```go\n{old}\n```\n");
            }
            if let Some(new) = &change.new_value {
                let _ = writeln!(out, "New:\n\n```go\n{new}\n```\n");
            }
        }
    }
    bullet_section(&mut out, "## Additions", &diff.added_items, "- ");
    bullet_section(&mut out, "## Modifications", &diff.modified_items, "- ");
    out
}

fn text(diff: &ContractDiff) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "API changes in {}", diff.package_name);
    let _ = writeln!(out, "{} -> {}", version(&diff.old_version), version(&diff.new_version));
    let _ = writeln!(out);
    let s = &diff.summary;
    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "  Breaking changes: {}", s.total_breaking_changes);
    let _ = writeln!(out, "  Additions: {}", s.total_additions);
    let _ = writeln!(out, "  Modifications: {}", s.total_modifications);

    if !diff.breaking_changes.is_empty() {
        let _ = writeln!(out, "\nBreaking Changes\n");
        for change in &diff.breaking_changes {
            let _ = writeln!(out, "  {} ({}): {}", change.item, change.change_type, change.description);
            if let Some(old) = &change.old_value {
                let _ = writeln!(out, "    old: {old}");
            }
            if let Some(new) = &change.new_value {
                let _ = writeln!(out, "    new: {new}");
            }
        }
    }
    bullet_section(&mut out, "Additions", &diff.added_items, "  ");
    bullet_section(&mut out, "Modifications", &diff.modified_items, "  ");
    out
}

fn bullet_section(out: &mut String, title: &str, changes: &[Change], indent: &str) {
    if changes.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}\n");
    for change in changes {
        let _ = writeln!(out, "{indent}{} ({}): {}", change.item, change.change_type, change.description);
    }
}

fn version(v: &str) -> &str {
    if v.is_empty() { "(unversioned)" } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apidrift_core::contract::{ChangeType, DiffSummary};

    fn sample() -> ContractDiff {
        ContractDiff {
            package_name: "client".into(),
            old_version: "v1.0.0".into(),
            new_version: "v2.0.0".into(),
            breaking_changes: vec![Change {
                change_type: ChangeType::ChangedFunctionSignature,
                item: "Connect".into(),
                description: "signature of function Connect changed".into(),
                old_value: Some("func Connect(string) error".into()),
                new_value: Some("func Connect(string, int) error".into()),
            }],
            added_items: vec![Change {
                change_type: ChangeType::Function,
                item: "Dial".into(),
                description: "function Dial was added".into(),
                old_value: None,
                new_value: Some("func Dial() error".into()),
            }],
            modified_items: Vec::new(),
            summary: DiffSummary {
                total_breaking_changes: 1,
                total_additions: 1,
                total_modifications: 0,
                has_breaking_changes: true,
            },
        }
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<Format>(), Ok(Format::Json));
        assert_eq!("md".parse::<Format>(), Ok(Format::Markdown));
        assert_eq!("text".parse::<Format>(), Ok(Format::Text));
        let err = "yaml".parse::<Format>().unwrap_err();
        assert_eq!(err.to_string(), r#"unknown format "yaml" (expected json, markdown, or text)"#);
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn flag_beats_config_beats_json_switch() {
        assert_eq!(Format::resolve(Some("text"), Some("json"), true), Ok(Format::Text));
        assert_eq!(Format::resolve(None, Some("json"), false), Ok(Format::Json));
        assert_eq!(Format::resolve(None, None, true), Ok(Format::Json));
        assert_eq!(Format::resolve(None, None, false), Ok(Format::Markdown));
        assert!(Format::resolve(Some("html"), None, false).is_err());
    }

    #[test]
    fn markdown_has_every_section() {
        let md = render(&sample(), Format::Markdown).unwrap();
        assert!(md.starts_with("# API changes in `client`"));
        assert!(md.contains("**v1.0.0** → **v2.0.0**"));
        assert!(md.contains("- Breaking changes: 1"));
        assert!(md.contains("## Breaking Changes"));
        assert!(md.contains("```go\nfunc Connect(string) error\n```"));
        assert!(md.contains("```go\nfunc Connect(string, int) error\n```"));
        assert!(md.contains("## Additions"));
        assert!(md.contains("- Dial (function): function Dial was added"));
        assert!(!md.contains("## Modifications"));
    }

    #[test]
    fn text_is_unformatted() {
        let txt = render(&sample(), Format::Text).unwrap();
        assert!(!txt.contains('#'));
        assert!(!txt.contains("```"));
        assert!(txt.contains("v1.0.0 -> v2.0.0"));
        assert!(txt.contains("old: func Connect(string) error"));
    }

    #[test]
    fn json_is_the_diff_verbatim() {
        let diff = sample();
        let json = render(&diff, Format::Json).unwrap();
        let back: ContractDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diff);
    }
}
