//! Build constraints: which files of a directory belong to the package for
//! one GOOS/GOARCH.
//!
//! Files are selected the way `go build` selects them. A `_GOOS`,
//! `_GOARCH` or `_GOOS_GOARCH` file name suffix must match the target, and
//! the `//go:build` expression (or the legacy `// +build` lines) in the file
//! header must hold. Both sides of a comparison have to use the same target,
//! otherwise platform-specific declarations show up as changes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating systems known to the Go toolchain.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Architectures known to the Go toolchain.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Error for a GOOS or GOARCH the toolchain does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} {value:?}")]
pub struct UnknownTarget {
    what: &'static str,
    value: String,
}

/// The platform files are selected for.
///
/// Defaults to the host. In configuration it is the `[extract.target]`
/// table with optional `goos` and `goarch` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "RawTarget")]
pub struct BuildTarget {
    goos: &'static str,
    goarch: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    goos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    goarch: Option<String>,
}

impl TryFrom<RawTarget> for BuildTarget {
    type Error = UnknownTarget;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        let host = Self::host();
        Self::new(
            raw.goos.as_deref().unwrap_or(host.goos),
            raw.goarch.as_deref().unwrap_or(host.goarch),
        )
    }
}

// Equivalent to `#[serde(try_from = "RawTarget")]`, written out because the
// derive would infer a `'de: 'static` borrow from the `&'static str` fields.
impl<'de> Deserialize<'de> for BuildTarget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTarget::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl From<BuildTarget> for RawTarget {
    fn from(target: BuildTarget) -> Self {
        Self {
            goos: Some(target.goos.to_string()),
            goarch: Some(target.goarch.to_string()),
        }
    }
}

impl Default for BuildTarget {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.goos, self.goarch)
    }
}

impl BuildTarget {
    /// A target from Go's names, e.g. `("linux", "amd64")`.
    pub fn new(goos: &str, goarch: &str) -> Result<Self, UnknownTarget> {
        let goos = KNOWN_OS
            .iter()
            .copied()
            .find(|os| *os == goos)
            .ok_or_else(|| UnknownTarget {
                what: "GOOS",
                value: goos.to_string(),
            })?;
        let goarch = KNOWN_ARCH
            .iter()
            .copied()
            .find(|arch| *arch == goarch)
            .ok_or_else(|| UnknownTarget {
                what: "GOARCH",
                value: goarch.to_string(),
            })?;
        Ok(Self { goos, goarch })
    }

    /// The platform this process runs on, in Go's names.
    pub fn host() -> Self {
        let goos = match std::env::consts::OS {
            "macos" => "darwin",
            os => KNOWN_OS.iter().copied().find(|k| *k == os).unwrap_or("linux"),
        };
        let goarch = match std::env::consts::ARCH {
            "x86" => "386",
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "loongarch64" => "loong64",
            "powerpc" => "ppc",
            "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
            "powerpc64" => "ppc64",
            "wasm32" => "wasm",
            arch => KNOWN_ARCH.iter().copied().find(|k| *k == arch).unwrap_or("amd64"),
        };
        Self { goos, goarch }
    }

    /// Target operating system.
    pub const fn goos(&self) -> &'static str {
        self.goos
    }

    /// Target architecture.
    pub const fn goarch(&self) -> &'static str {
        self.goarch
    }

    /// Whether build tag `tag` is satisfied.
    fn satisfies(&self, tag: &str) -> bool {
        tag == self.goos
            || tag == self.goarch
            || tag == "gc"
            || (tag == "unix" && UNIX_OS.contains(&self.goos))
            || (tag == "linux" && self.goos == "android")
            || (tag == "solaris" && self.goos == "illumos")
            || (tag == "darwin" && self.goos == "ios")
            || tag
                .strip_prefix("go1.")
                .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Whether a `name_GOOS_GOARCH.go`-style file name matches this target.
    /// The part before the first `_` never counts, so `linux.go` is
    /// unconstrained.
    pub fn matches_file_name(&self, name: &str) -> bool {
        let stem = name.strip_suffix(".go").unwrap_or(name);
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let Some((_, rest)) = stem.split_once('_') else {
            return true;
        };
        let parts: Vec<&str> = rest.split('_').collect();
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.satisfies(parts[n - 2]) && self.satisfies(parts[n - 1]);
        }
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
            return self.satisfies(last);
        }
        true
    }

    /// Whether the build constraints in the header of `source` hold.
    ///
    /// A `//go:build` line wins over `// +build` lines. A malformed
    /// expression excludes the file, as the toolchain would refuse it.
    pub fn matches_source(&self, source: &str) -> bool {
        let mut plus_lines = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix("//") else {
                break;
            };
            if let Some(expr) = comment.strip_prefix("go:build") {
                return Constraint::parse(expr)
                    .is_some_and(|c| c.eval(&|tag: &str| self.satisfies(tag)));
            }
            if let Some(expr) = comment.trim_start().strip_prefix("+build") {
                plus_lines.push(expr);
            }
        }
        plus_lines
            .into_iter()
            .all(|line| plus_build(line, &|tag: &str| self.satisfies(tag)))
    }
}

/// Legacy `// +build` line: space-separated options are OR-ed, the
/// comma-separated terms of an option are AND-ed.
fn plus_build(line: &str, satisfied: &dyn Fn(&str) -> bool) -> bool {
    line.split_whitespace().any(|option| {
        option.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !satisfied(tag),
            None => satisfied(term),
        })
    })
}

/// A parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    fn parse(text: &str) -> Option<Self> {
        let tokens = tokenize(text)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.or()?;
        (parser.pos == parser.tokens.len()).then_some(expr)
    }

    fn eval(&self, satisfied: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Tag(tag) => satisfied(tag),
            Self::Not(inner) => !inner.eval(satisfied),
            Self::And(a, b) => a.eval(satisfied) && b.eval(satisfied),
            Self::Or(a, b) => a.eval(satisfied) || b.eval(satisfied),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '!' => tokens.push(Token::Not),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '&' if chars.next_if_eq(&'&').is_some() => tokens.push(Token::And),
            '|' if chars.next_if_eq(&'|').is_some() => tokens.push(Token::Or),
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::from(c);
                while let Some(next) = chars.next_if(|n| n.is_alphanumeric() || *n == '_' || *n == '.') {
                    tag.push(next);
                }
                tokens.push(Token::Tag(tag));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn eat(&mut self, token: &Token) -> bool {
        let hit = self.tokens.get(self.pos) == Some(token);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn or(&mut self) -> Option<Constraint> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            left = Constraint::Or(Box::new(left), Box::new(self.and()?));
        }
        Some(left)
    }

    fn and(&mut self) -> Option<Constraint> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            left = Constraint::And(Box::new(left), Box::new(self.unary()?));
        }
        Some(left)
    }

    fn unary(&mut self) -> Option<Constraint> {
        if self.eat(&Token::Not) {
            return Some(Constraint::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Open) {
            let inner = self.or()?;
            return self.eat(&Token::Close).then_some(inner);
        }
        match self.tokens.get(self.pos)? {
            Token::Tag(tag) => {
                let tag = tag.clone();
                self.pos += 1;
                Some(Constraint::Tag(tag))
            }
            _ => None,
        }
    }
}
