//! Contract data model.
//!
//! A [`Contract`] is a snapshot of one Go package's API surface. It is built
//! once by an extractor, sorted, and never mutated afterwards. Contracts are
//! persisted as indented JSON (see [`store`]) so that two snapshots taken at
//! different points in history can be compared by the [`diff`](crate::diff)
//! module, which produces a [`ContractDiff`].

mod change;
pub mod store;

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use change::{Change, ChangeType, ContractDiff, DiffSummary};
pub use store::{ContractIoError, ContractIoResult};

/// Anything that lives in a name-keyed collection.
pub trait Named {
    /// The key this entity is sorted and matched by.
    fn name(&self) -> &str;
}

/// Structured snapshot of a package's public API surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Go package name from the `package` clause.
    pub package_name: String,
    /// Import path of the package (empty when no `go.mod` was found).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module_path: String,
    /// Caller-supplied version label (a git ref, a release number, ...).
    #[serde(default)]
    pub version: String,
    /// Extraction time. Varies between runs; never semantically compared.
    pub timestamp: DateTime<Utc>,
    /// Interface types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceContract>,
    /// Non-interface named types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeContract>,
    /// Package-level functions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionContract>,
    /// Package-level variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableContract>,
    /// Package-level constants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<ConstantContract>,
}

impl Contract {
    /// Create an empty contract for `package_name`, stamped with the current time.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            module_path: String::new(),
            version: String::new(),
            timestamp: Utc::now(),
            interfaces: Vec::new(),
            types: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Sort every collection, and every method and field list, by name.
    ///
    /// Extractors call this before returning. Sorting is stable, so applying
    /// it to an already sorted contract is a no-op.
    pub fn sort(&mut self) {
        sort_by_name(&mut self.interfaces);
        sort_by_name(&mut self.types);
        sort_by_name(&mut self.functions);
        sort_by_name(&mut self.variables);
        sort_by_name(&mut self.constants);

        for iface in &mut self.interfaces {
            sort_by_name(&mut iface.methods);
            iface.embeds.sort();
        }
        for ty in &mut self.types {
            sort_by_name(&mut ty.methods);
            sort_by_name(&mut ty.fields);
        }
    }

    /// Whether `self` and `other` describe the same API, ignoring the
    /// extraction timestamp and version label.
    pub fn same_surface(&self, other: &Self) -> bool {
        self.package_name == other.package_name
            && self.module_path == other.module_path
            && self.interfaces == other.interfaces
            && self.types == other.types
            && self.functions == other.functions
            && self.variables == other.variables
            && self.constants == other.constants
    }

    /// Total number of top-level entities.
    pub fn len(&self) -> usize {
        self.interfaces.len()
            + self.types.len()
            + self.functions.len()
            + self.variables.len()
            + self.constants.len()
    }

    /// Whether the contract exposes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_by_name<T: Named>(items: &mut [T]) {
    items.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Source location of a declaration, relative to the package directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// File name relative to the package directory.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An interface type and its method set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceContract {
    /// Type name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Methods, sorted by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodContract>,
    /// Embedded interfaces and type-set terms that were not flattened into
    /// `methods` (for example `io.Reader`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<String>,
    /// Declaration position.
    pub position: Position,
}

impl InterfaceContract {
    /// Canonical rendering, e.g. `type Writer interface{Write([]byte) error}`.
    pub fn signature(&self) -> String {
        let mut elems: Vec<String> = self.embeds.clone();
        elems.extend(self.methods.iter().map(MethodContract::interface_form));
        format!("type {} interface{{{}}}", self.name, elems.join("; "))
    }
}

/// Representation class of a non-interface named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// `type T struct{...}`.
    Struct,
    /// A predeclared primitive such as `int` or `string`.
    Basic,
    /// Any other representation: slices, maps, functions, foreign types...
    Alias,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Struct => write!(f, "struct"),
            Self::Basic => write!(f, "basic"),
            Self::Alias => write!(f, "alias"),
        }
    }
}

/// A non-interface named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeContract {
    /// Type name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Representation class.
    pub kind: TypeKind,
    /// Generic type parameters in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<Parameter>,
    /// Struct fields, sorted by name. Empty unless `kind` is `struct`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldContract>,
    /// Primitive name (basic) or canonical target rendering (alias).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub underlying: String,
    /// Methods declared on the type, sorted by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodContract>,
    /// Declaration position.
    pub position: Position,
}

impl TypeContract {
    /// Canonical rendering, e.g. `type Config struct{Name string}`.
    pub fn signature(&self) -> String {
        let mut out = format!("type {}", self.name);
        if !self.type_params.is_empty() {
            out.push_str(&render_type_params(&self.type_params));
        }
        match self.kind {
            TypeKind::Struct => {
                let fields: Vec<String> = self.fields.iter().map(FieldContract::signature).collect();
                let _ = write!(out, " struct{{{}}}", fields.join("; "));
            }
            TypeKind::Basic | TypeKind::Alias => {
                let _ = write!(out, " {}", self.underlying);
            }
        }
        out
    }
}

/// Receiver binding of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Receiver variable name, if one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Receiver base type (without the pointer star).
    #[serde(rename = "type")]
    pub ty: String,
    /// Whether the method is declared on `*T`.
    pub pointer: bool,
}

/// A parameter or result slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Declared name. Renaming is never a compatibility concern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Canonical type text.
    #[serde(rename = "type")]
    pub ty: String,
}

impl Parameter {
    /// Unnamed parameter of type `ty`.
    pub fn unnamed(ty: impl Into<String>) -> Self {
        Self {
            name: None,
            ty: ty.into(),
        }
    }

    /// Named parameter.
    pub fn named(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ty: ty.into(),
        }
    }
}

/// A method on an interface or a named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodContract {
    /// Method name.
    pub name: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Receiver binding; `None` for interface methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Receiver>,
    /// Parameters in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Results in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Parameter>,
    /// Declaration position.
    pub position: Position,
}

impl MethodContract {
    /// Canonical signature.
    ///
    /// `func (*Config) Validate(string) error` for a method on a type,
    /// `func Write([]byte) (int, error)` for an interface method. Parameter
    /// and receiver names never appear.
    pub fn signature(&self) -> String {
        match &self.receiver {
            Some(recv) => format!(
                "func ({}{}) {}",
                if recv.pointer { "*" } else { "" },
                recv.ty,
                self.interface_form()
            ),
            None => format!("func {}", self.interface_form()),
        }
    }

    fn interface_form(&self) -> String {
        format!(
            "{}({}){}",
            self.name,
            render_types(&self.parameters),
            render_results(&self.results)
        )
    }
}

/// A package-level function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionContract {
    /// Function name.
    pub name: String,
    /// Declaring package.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Always `None` for functions; kept so functions and methods share a shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Receiver>,
    /// Generic type parameters (`type` holds the constraint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<Parameter>,
    /// Parameters in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Results in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Parameter>,
    /// Declaration position.
    pub position: Position,
}

impl FunctionContract {
    /// Canonical signature, e.g. `func Connect(string, int) error`.
    pub fn signature(&self) -> String {
        format!(
            "func {}{}({}){}",
            self.name,
            render_type_params(&self.type_params),
            render_types(&self.parameters),
            render_results(&self.results)
        )
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldContract {
    /// Field name; for embedded fields, the embedded type's name.
    pub name: String,
    /// Canonical type text.
    #[serde(rename = "type")]
    pub ty: String,
    /// Raw struct tag, including its quotes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Whether the field is embedded (anonymous).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embedded: bool,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Declaration position.
    pub position: Position,
}

impl FieldContract {
    /// Canonical rendering: `Name Type "tag"` or just `Type` when embedded.
    pub fn signature(&self) -> String {
        let mut out = if self.embedded {
            self.ty.clone()
        } else {
            format!("{} {}", self.name, self.ty)
        };
        if !self.tag.is_empty() {
            out.push(' ');
            out.push_str(&self.tag);
        }
        out
    }
}

/// A package-level variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableContract {
    /// Variable name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Canonical type text; empty when it could not be determined.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub ty: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Declaration position.
    pub position: Position,
}

impl VariableContract {
    /// Canonical rendering, e.g. `var ErrClosed error`.
    pub fn signature(&self) -> String {
        if self.ty.is_empty() {
            format!("var {}", self.name)
        } else {
            format!("var {} {}", self.name, self.ty)
        }
    }
}

/// A package-level constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantContract {
    /// Constant name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Canonical type text (`untyped int` and friends for untyped constants).
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub ty: String,
    /// Constant value as text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Doc comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
    /// Declaration position.
    pub position: Position,
}

impl ConstantContract {
    /// Canonical rendering, e.g. `const MaxRetries int = 3`.
    pub fn signature(&self) -> String {
        let mut out = format!("const {}", self.name);
        if !self.ty.is_empty() {
            out.push(' ');
            out.push_str(&self.ty);
        }
        if !self.value.is_empty() {
            out.push_str(" = ");
            out.push_str(&self.value);
        }
        out
    }
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named!(
    InterfaceContract,
    TypeContract,
    MethodContract,
    FunctionContract,
    FieldContract,
    VariableContract,
    ConstantContract,
);

impl Named for String {
    fn name(&self) -> &str {
        self
    }
}

fn render_types(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|p| p.ty.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_results(results: &[Parameter]) -> String {
    match results {
        [] => String::new(),
        [single] => format!(" {}", single.ty),
        many => format!(" ({})", render_types(many)),
    }
}

pub(crate) fn render_type_params(params: &[Parameter]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = params
        .iter()
        .map(|p| match &p.name {
            Some(name) => format!("{name} {}", p.ty),
            None => p.ty.clone(),
        })
        .collect();
    format!("[{}]", inner.join(", "))
}
