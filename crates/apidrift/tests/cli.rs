//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

const SHAPES_V1: &str = r#"package shapes

// Shape is anything with an area.
type Shape interface {
	Area() float64
}

// Circle is a round shape.
type Circle struct {
	Radius float64 `json:"radius"`
}

// Area implements Shape.
func (c Circle) Area() float64 { return 3.14 * c.Radius * c.Radius }

// New returns a circle.
func New(r float64) Circle { return Circle{Radius: r} }

const Version = "1.0"
"#;

const SHAPES_V2: &str = r#"package shapes

// Shape is anything with an area.
type Shape interface {
	Area() float64
	Perimeter() float64
}

// Circle is a round shape.
type Circle struct {
	Radius float64 `json:"radius"`
}

// Area implements Shape.
func (c Circle) Area() float64 { return 3.14 * c.Radius * c.Radius }

// Perimeter implements Shape.
func (c Circle) Perimeter() float64 { return 2 * 3.14 * c.Radius }

const Version = "2.0"
"#;

fn write_package(dir: &Path, source: &str) {
    fs::write(dir.join("go.mod"), "module example.com/shapes\n\ngo 1.21\n").unwrap();
    fs::write(dir.join("shapes.go"), source).unwrap();
}

/// Extract `source` into `<tmp>/<name>.json` and return its path.
fn extract_to(tmp: &TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let pkg = tmp.path().join(name);
    fs::create_dir_all(&pkg).unwrap();
    write_package(&pkg, source);
    let out = tmp.path().join(format!("{name}.json"));
    cmd()
        .args(["-C", pkg.to_str().unwrap(), "extract", "--version", name, "-o"])
        .arg(&out)
        .assert()
        .success();
    out
}

fn git_available() -> bool {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_logging_environment() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("APIDRIFT_LOG_PATH"));
}

#[test]
fn unknown_subcommand_fails() {
    cmd()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// =============================================================================
// Info Command
// =============================================================================

#[test]
fn info_json_outputs_valid_json() {
    let output = cmd().args(["info", "--json"]).assert().success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("info --json should output valid JSON");

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["config"]["strategy"], "resolved");
    assert!(json["environment"]["git_installed"].is_boolean());
}

#[test]
fn global_flags_accepted() {
    cmd().args(["-q", "info"]).assert().success();
    cmd().args(["-vv", "info"]).assert().success();
    cmd().args(["--color", "never", "info"]).assert().success();
}

// =============================================================================
// Extract Command
// =============================================================================

#[test]
fn extract_prints_contract_json() {
    let tmp = TempDir::new().unwrap();
    write_package(tmp.path(), SHAPES_V1);

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "extract"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();

    assert_eq!(json["package_name"], "shapes");
    assert_eq!(json["module_path"], "example.com/shapes");
    assert_eq!(json["interfaces"][0]["name"], "Shape");
    assert_eq!(json["types"][0]["name"], "Circle");
    assert_eq!(json["functions"][0]["name"], "New");
}

#[test]
fn extract_syntax_only_works_without_go_mod() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("shapes.go"), SHAPES_V1).unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "extract", "--syntax-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Circle\""));
}

#[test]
fn extract_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "extract", "no/such/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to extract"));
}

// =============================================================================
// Compare Command
// =============================================================================

#[test]
fn compare_reports_breaking_changes_and_fails() {
    let tmp = TempDir::new().unwrap();
    let old = extract_to(&tmp, "v1", SHAPES_V1);
    let new = extract_to(&tmp, "v2", SHAPES_V2);

    cmd()
        .arg("compare")
        .args([&old, &new])
        .assert()
        .failure()
        .stdout(predicate::str::contains("# API changes in `shapes`"))
        .stdout(predicate::str::contains("Perimeter"))
        .stderr(predicate::str::contains("breaking change(s) detected"));
}

#[test]
fn compare_allow_breaking_succeeds_with_json() {
    let tmp = TempDir::new().unwrap();
    let old = extract_to(&tmp, "v1", SHAPES_V1);
    let new = extract_to(&tmp, "v2", SHAPES_V2);

    let output = cmd()
        .args(["--json", "compare", "--allow-breaking"])
        .args([&old, &new])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();

    assert_eq!(json["old_version"], "v1");
    assert_eq!(json["new_version"], "v2");
    assert_eq!(json["summary"]["has_breaking_changes"], true);
    let kinds = |key: &str| -> Vec<String> {
        json[key]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["type"].as_str().map(str::to_string))
            .collect()
    };
    assert_eq!(kinds("breaking_changes"), vec!["removed_function"]);
    assert!(kinds("added_items").contains(&"method".to_string()));
    assert!(kinds("modified_items").contains(&"constant_value".to_string()));
}

#[test]
fn compare_identical_contracts_is_clean() {
    let tmp = TempDir::new().unwrap();
    let old = extract_to(&tmp, "v1", SHAPES_V1);

    cmd()
        .args(["compare", "--format", "text"])
        .args([&old, &old])
        .assert()
        .success()
        .stdout(predicate::str::contains("Breaking changes: 0"));
}

#[test]
fn compare_rejects_unknown_format() {
    let tmp = TempDir::new().unwrap();
    let old = extract_to(&tmp, "v1", SHAPES_V1);

    cmd()
        .args(["compare", "--format", "yaml"])
        .args([&old, &old])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yaml"));
}

#[test]
fn compare_missing_file_fails() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "compare", "a.json", "b.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load old contract"));
}

// =============================================================================
// Tags & Diff Commands
// =============================================================================

#[test]
fn tags_and_diff_against_release() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path();
    git(repo, &["init", "--initial-branch=main"]);
    write_package(repo, SHAPES_V1);
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", "v1"]);
    git(repo, &["tag", "v1.0.0"]);
    git(repo, &["tag", "nightly"]);
    fs::write(repo.join("shapes.go"), SHAPES_V2).unwrap();

    let output = cmd()
        .args(["-C", repo.to_str().unwrap(), "--json", "tags"])
        .assert()
        .success();
    let tags: Vec<String> = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(tags, vec!["v1.0.0".to_string()]);

    cmd()
        .args(["-C", repo.to_str().unwrap(), "diff", "--format", "text"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("v1.0.0"))
        .stdout(predicate::str::contains("Perimeter"))
        .stderr(predicate::str::contains("breaking change(s) detected"));
}

#[test]
fn diff_outside_repository_fails() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "diff", "--from", "v1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open repository"));
}
