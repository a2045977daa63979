//! `go.mod` discovery and import-path mapping.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{ExtractError, ExtractResult};

/// The Go module enclosing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    /// Module path from the `module` directive.
    pub path: String,
    /// Directory holding `go.mod`.
    pub dir: Utf8PathBuf,
}

impl GoModule {
    /// Find the nearest `go.mod` at or above `start`.
    ///
    /// A `go.mod` without a `module` directive is treated as absent.
    pub fn find(start: &Utf8Path) -> ExtractResult<Option<Self>> {
        let mut current = Some(start);
        while let Some(dir) = current {
            let manifest = dir.join("go.mod");
            if manifest.is_file() {
                let text = std::fs::read_to_string(&manifest).map_err(|source| ExtractError::Io {
                    path: manifest.clone(),
                    source,
                })?;
                let module = parse_module_path(&text).map(|path| Self {
                    path,
                    dir: dir.to_path_buf(),
                });
                debug!(%manifest, module = ?module.as_ref().map(|m| &m.path), "found go.mod");
                return Ok(module);
            }
            current = dir.parent();
        }
        Ok(None)
    }

    /// Import path of the package in `dir`, if `dir` is inside the module.
    pub fn import_path(&self, dir: &Utf8Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.dir).ok()?;
        let segments: Vec<&str> = rel.components().map(|c| c.as_str()).collect();
        if segments.is_empty() {
            Some(self.path.clone())
        } else {
            Some(format!("{}/{}", self.path, segments.join("/")))
        }
    }

    /// Directory for `import`, if the import path belongs to this module.
    pub fn resolve(&self, import: &str) -> Option<Utf8PathBuf> {
        if import == self.path {
            return Some(self.dir.clone());
        }
        let rest = import.strip_prefix(&self.path)?.strip_prefix('/')?;
        Some(rest.split('/').fold(self.dir.clone(), |dir, seg| dir.join(seg)))
    }
}

/// Extract the module path from `go.mod` contents.
pub(crate) fn parse_module_path(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) && !rest.starts_with('"') {
            return None;
        }
        let path = rest.trim().trim_matches('"').trim();
        (!path.is_empty()).then(|| path.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::package;

    #[test]
    fn parses_module_directive() {
        assert_eq!(
            parse_module_path("// comment\nmodule example.com/demo // trailing\n\ngo 1.22\n"),
            Some("example.com/demo".into())
        );
        assert_eq!(
            parse_module_path("module \"example.com/quoted\"\n"),
            Some("example.com/quoted".into())
        );
        assert_eq!(parse_module_path("go 1.22\n"), None);
        assert_eq!(parse_module_path("modules foo\n"), None);
    }

    #[test]
    fn finds_enclosing_module() {
        let (_tmp, root) = package(&[
            ("go.mod", "module example.com/demo\n"),
            ("pkg/store/store.go", "package store\n"),
        ]);
        let module = GoModule::find(&root.join("pkg/store"))
            .expect("read")
            .expect("module found");
        assert_eq!(module.dir, root);
        assert_eq!(
            module.import_path(&root.join("pkg/store")).as_deref(),
            Some("example.com/demo/pkg/store")
        );
        assert_eq!(module.import_path(&root).as_deref(), Some("example.com/demo"));
    }

    #[test]
    fn resolves_import_paths() {
        let module = GoModule {
            path: "example.com/demo".into(),
            dir: Utf8PathBuf::from("/src/demo"),
        };
        assert_eq!(
            module.resolve("example.com/demo/api/v1"),
            Some(Utf8PathBuf::from("/src/demo/api/v1"))
        );
        assert_eq!(module.resolve("example.com/demo"), Some(Utf8PathBuf::from("/src/demo")));
        assert_eq!(module.resolve("example.com/demolition"), None);
        assert_eq!(module.resolve("github.com/other"), None);
    }
}
