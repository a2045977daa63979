//! Go source parsing.
//!
//! Wraps tree-sitter's Go grammar and lowers each file into owned
//! declarations ([`decl::Decl`]) so that the extractors never hold on to a
//! syntax tree. Syntax errors are reported with 1-based positions.

pub mod decl;
pub mod doc;
pub mod expr;
pub mod types;

use std::fmt;

use tracing::trace;
use tree_sitter::{LanguageError, Node, Parser};

use decl::{Decl, Lowerer, children};

/// One parsed `.go` file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// File name relative to the package directory.
    pub name: String,
    /// Name from the `package` clause.
    pub package: String,
    /// Whether the file has an `import . "pkg"`.
    pub dot_import: bool,
    /// Top-level declarations in source order.
    pub decls: Vec<Decl>,
}

/// A syntax error in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// File name relative to the package directory.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

/// A reusable Go parser.
pub struct GoParser {
    parser: Parser,
}

impl fmt::Debug for GoParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoParser").finish_non_exhaustive()
    }
}

impl GoParser {
    /// Create a parser loaded with the Go grammar.
    pub fn new() -> Result<Self, LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    /// Parse `source`, reporting every syntax error found.
    pub fn parse(&mut self, name: &str, source: &str) -> Result<ParsedFile, Vec<SyntaxError>> {
        let Some(tree) = self.parser.parse(source, None) else {
            return Err(vec![SyntaxError {
                file: name.to_string(),
                line: 1,
                column: 1,
                message: "parser produced no syntax tree".into(),
            }]);
        };
        let root = tree.root_node();
        let src = source.as_bytes();

        if root.has_error() {
            let mut errors = Vec::new();
            collect_errors(root, src, name, &mut errors);
            errors.sort_by_key(|e| (e.line, e.column));
            return Err(errors);
        }

        let Some(package) = package_name(root, src) else {
            return Err(vec![SyntaxError {
                file: name.to_string(),
                line: 1,
                column: 1,
                message: "expected 'package' clause".into(),
            }]);
        };

        let decls = Lowerer::new(src, name).decls(root);
        trace!(file = name, decls = decls.len(), "parsed");

        Ok(ParsedFile {
            name: name.to_string(),
            package,
            dot_import: has_dot_import(root),
            decls,
        })
    }
}

fn package_name(root: Node<'_>, src: &[u8]) -> Option<String> {
    let clause = children(root)
        .into_iter()
        .find(|n| n.kind() == "package_clause")?;
    let ident = children(clause).into_iter().next()?;
    ident.utf8_text(src).ok().map(str::to_string)
}

fn has_dot_import(root: Node<'_>) -> bool {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "source_file" | "import_declaration" | "import_spec_list" => {
                stack.extend(children(node));
            }
            "import_spec" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|n| n.kind() == "dot")
                {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn collect_errors(node: Node<'_>, src: &[u8], file: &str, out: &mut Vec<SyntaxError>) {
    if node.is_error() || node.is_missing() {
        let start = node.start_position();
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            let text = node.utf8_text(src).unwrap_or_default();
            let snippet: String = text.lines().next().unwrap_or_default().chars().take(40).collect();
            format!("syntax error near `{}`", snippet.trim())
        };
        out.push(SyntaxError {
            file: file.to_string(),
            line: start.row + 1,
            column: start.column + 1,
            message,
        });
        return;
    }
    let mut cursor = node.walk();
    let kids: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in kids {
        if child.has_error() {
            collect_errors(child, src, file, out);
        }
    }
}
