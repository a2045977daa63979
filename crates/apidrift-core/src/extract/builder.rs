//! Contract assembly shared by both extraction strategies.
//!
//! The builder walks parsed declarations and decides what is part of the
//! public surface. Anything that needs knowledge beyond a single declaration
//! is delegated to a [`Resolve`] implementation: the syntax-only strategy
//! answers from the declaration text alone, the resolved strategy consults
//! the whole package.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::ExtractOptions;
use crate::contract::{
    Contract, ConstantContract, FieldContract, FunctionContract, InterfaceContract, MethodContract,
    Named, Parameter, Receiver, TypeContract, TypeKind, VariableContract,
};
use crate::syntax::ParsedFile;
use crate::syntax::decl::{ConstSpec, Decl, FuncDecl, TypeDecl, VarSpec};
use crate::syntax::expr::Expr;
use crate::syntax::types::{
    FieldSpec, InterfaceSpec, MethodSpec, Param, TypeExpr, is_basic, is_exported,
};

/// Underlying representation of a declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shape {
    /// Interface body (possibly with embedded interfaces flattened).
    Interface(InterfaceSpec),
    /// Struct fields.
    Struct(Vec<FieldSpec>),
    /// Predeclared primitive.
    Basic(String),
    /// Anything else, rendered canonically.
    Alias(String),
}

/// Answers the questions the builder cannot answer from one declaration.
pub(crate) trait Resolve {
    /// Underlying representation of `decl`.
    fn shape(&self, decl: &TypeDecl) -> Shape;

    /// Type and value text of the `index`-th name of a constant spec.
    fn constant(&self, spec: &ConstSpec, index: usize) -> (String, String);

    /// Type text of the `index`-th name of a variable spec.
    fn variable(&self, spec: &VarSpec, index: usize) -> String;
}

/// Resolution from syntax alone.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Syntactic;

impl Resolve for Syntactic {
    fn shape(&self, decl: &TypeDecl) -> Shape {
        match &decl.ty {
            TypeExpr::Interface(spec) => Shape::Interface(spec.clone()),
            TypeExpr::Struct(fields) => Shape::Struct(fields.clone()),
            ty => match ty.local_name() {
                Some(name) if is_basic(name) => Shape::Basic(name.to_string()),
                _ => Shape::Alias(ty.to_string()),
            },
        }
    }

    fn constant(&self, spec: &ConstSpec, index: usize) -> (String, String) {
        let ty = spec.ty.as_ref().map(ToString::to_string).unwrap_or_default();
        let value = spec
            .values
            .get(index)
            .map(|v| v.text.clone())
            .unwrap_or_default();
        (ty, value)
    }

    fn variable(&self, spec: &VarSpec, index: usize) -> String {
        if let Some(ty) = &spec.ty {
            return ty.to_string();
        }
        spec.values
            .get(index)
            .and_then(|v| literal_type(&v.expr))
            .unwrap_or_default()
    }
}

/// Drop every entry whose name was already seen, keeping the first in file
/// order. Only a package that would not compile gets here with duplicates.
fn keep_first<T: Named>(items: &mut Vec<T>, kind: &str) {
    let mut seen = HashSet::new();
    items.retain(|item| {
        let fresh = seen.insert(item.name().to_string());
        if !fresh {
            warn!(kind, name = item.name(), "duplicate declaration dropped");
        }
        fresh
    });
}

/// Type of an initializer that can be read off its syntax.
pub(crate) fn literal_type(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Int(_) | Expr::Iota => Some("int".into()),
        Expr::Float => Some("float64".into()),
        Expr::Imaginary => Some("complex128".into()),
        Expr::Rune => Some("rune".into()),
        Expr::Str => Some("string".into()),
        Expr::Bool(_) => Some("bool".into()),
        Expr::Composite(ty) | Expr::Conversion { ty, .. } => Some(ty.to_string()),
        Expr::Unary { op, operand } if op == "&" => match operand.as_ref() {
            Expr::Composite(ty) => Some(format!("*{ty}")),
            _ => None,
        },
        Expr::Unary { operand, .. } => literal_type(operand),
        Expr::Call { func, args } if args.len() == 1 => match func.as_ref() {
            Expr::Ident(name) if is_basic(name) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Builds a [`Contract`] from parsed files.
pub(crate) struct ContractBuilder<'a> {
    options: &'a ExtractOptions,
    resolver: &'a dyn Resolve,
}

impl<'a> ContractBuilder<'a> {
    pub(crate) fn new(options: &'a ExtractOptions, resolver: &'a dyn Resolve) -> Self {
        Self { options, resolver }
    }

    fn visible(&self, name: &str) -> bool {
        name != "_" && (self.options.include_private || is_exported(name))
    }

    /// Assemble and sort the contract for package `package`.
    pub(crate) fn build(&self, package: &str, files: &[ParsedFile]) -> Contract {
        let mut contract = Contract::new(package);
        let mut methods: Vec<&FuncDecl> = Vec::new();

        for decl in files.iter().flat_map(|f| &f.decls) {
            match decl {
                Decl::Type(ty) if self.visible(&ty.name) => self.add_type(&mut contract, package, ty),
                Decl::Func(func) if func.receiver.is_some() => methods.push(func),
                Decl::Func(func) if func.name != "init" && self.visible(&func.name) => {
                    contract.functions.push(function_contract(package, func));
                }
                Decl::Var(spec) => self.add_variables(&mut contract, package, spec),
                Decl::Const(spec) => self.add_constants(&mut contract, package, spec),
                _ => {}
            }
        }

        keep_first(&mut contract.interfaces, "interface");
        keep_first(&mut contract.types, "type");
        keep_first(&mut contract.functions, "function");
        keep_first(&mut contract.variables, "variable");
        keep_first(&mut contract.constants, "constant");

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, ty) in contract.types.iter().enumerate() {
            index.insert(ty.name.clone(), i);
        }
        let mut attached = 0;
        for func in methods {
            let Some(recv) = &func.receiver else { continue };
            if !self.visible(&func.name) {
                continue;
            }
            let Some(&slot) = recv.ty.base_name().and_then(|name| index.get(name)) else {
                continue;
            };
            if contract.types[slot].methods.iter().any(|m| m.name == func.name) {
                warn!(method = %func.name, owner = %contract.types[slot].name, "duplicate method dropped");
                continue;
            }
            contract.types[slot].methods.push(MethodContract {
                name: func.name.clone(),
                doc_comment: func.doc.clone(),
                receiver: Some(Receiver {
                    name: recv.name.clone(),
                    ty: recv.ty.to_string(),
                    pointer: recv.pointer,
                }),
                parameters: parameters(&func.sig.params),
                results: parameters(&func.sig.results),
                position: func.pos.clone(),
            });
            attached += 1;
        }

        contract.sort();
        debug!(
            package,
            interfaces = contract.interfaces.len(),
            types = contract.types.len(),
            functions = contract.functions.len(),
            variables = contract.variables.len(),
            constants = contract.constants.len(),
            methods = attached,
            "built contract"
        );
        contract
    }

    fn add_type(&self, contract: &mut Contract, package: &str, decl: &TypeDecl) {
        let (kind, fields, underlying) = match self.resolver.shape(decl) {
            Shape::Interface(spec) => {
                contract.interfaces.push(InterfaceContract {
                    name: decl.name.clone(),
                    package: package.to_string(),
                    doc_comment: decl.doc.clone(),
                    methods: spec
                        .methods
                        .iter()
                        .filter(|m| self.visible(&m.name))
                        .map(interface_method)
                        .collect(),
                    embeds: spec.embeds.iter().map(ToString::to_string).collect(),
                    position: decl.pos.clone(),
                });
                return;
            }
            Shape::Struct(fields) => (
                TypeKind::Struct,
                fields
                    .iter()
                    .filter(|f| self.visible(&f.name))
                    .map(field_contract)
                    .collect(),
                String::new(),
            ),
            Shape::Basic(name) => (TypeKind::Basic, Vec::new(), name),
            Shape::Alias(text) => (TypeKind::Alias, Vec::new(), text),
        };
        contract.types.push(TypeContract {
            name: decl.name.clone(),
            package: package.to_string(),
            doc_comment: decl.doc.clone(),
            kind,
            type_params: parameters(&decl.type_params),
            fields,
            underlying,
            methods: Vec::new(),
            position: decl.pos.clone(),
        });
    }

    fn add_variables(&self, contract: &mut Contract, package: &str, spec: &VarSpec) {
        for (i, ident) in spec.names.iter().enumerate() {
            if !self.visible(&ident.name) {
                continue;
            }
            contract.variables.push(VariableContract {
                name: ident.name.clone(),
                package: package.to_string(),
                ty: self.resolver.variable(spec, i),
                doc_comment: spec.doc.clone(),
                position: ident.pos.clone(),
            });
        }
    }

    fn add_constants(&self, contract: &mut Contract, package: &str, spec: &ConstSpec) {
        for (i, ident) in spec.names.iter().enumerate() {
            if !self.visible(&ident.name) {
                continue;
            }
            let (ty, value) = self.resolver.constant(spec, i);
            contract.constants.push(ConstantContract {
                name: ident.name.clone(),
                package: package.to_string(),
                ty,
                value,
                doc_comment: spec.doc.clone(),
                position: ident.pos.clone(),
            });
        }
    }
}

fn parameters(params: &[Param]) -> Vec<Parameter> {
    params
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            ty: p.ty.to_string(),
        })
        .collect()
}

fn function_contract(package: &str, func: &FuncDecl) -> FunctionContract {
    FunctionContract {
        name: func.name.clone(),
        package: package.to_string(),
        doc_comment: func.doc.clone(),
        receiver: None,
        type_params: parameters(&func.type_params),
        parameters: parameters(&func.sig.params),
        results: parameters(&func.sig.results),
        position: func.pos.clone(),
    }
}

fn interface_method(method: &MethodSpec) -> MethodContract {
    MethodContract {
        name: method.name.clone(),
        doc_comment: method.doc.clone(),
        receiver: None,
        parameters: parameters(&method.sig.params),
        results: parameters(&method.sig.results),
        position: method.pos.clone(),
    }
}

fn field_contract(field: &FieldSpec) -> FieldContract {
    FieldContract {
        name: field.name.clone(),
        ty: field.ty.to_string(),
        tag: field.tag.clone(),
        embedded: field.embedded,
        doc_comment: field.doc.clone(),
        position: field.pos.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::GoParser;

    fn build(options: ExtractOptions, source: &str) -> Contract {
        let file = GoParser::new()
            .expect("grammar")
            .parse("api.go", source)
            .expect("parse");
        let package = file.package.clone();
        ContractBuilder::new(&options, &Syntactic).build(&package, &[file])
    }

    const SOURCE: &str = r#"package demo

// Writer writes.
type Writer interface {
	// Write writes data.
	Write(data string) error
	flush()
}

// Config holds settings.
type Config struct {
	Name  string `json:"name"`
	debug bool
}

// Validate checks c.
func (c *Config) Validate() error { return nil }

func (c Config) helper() {}

type hidden struct{}

func (hidden) Exported() {}

type Level int

type Handler func(string) error

func init() {}

// Connect dials.
func Connect(host string) error { return nil }

var ErrClosed, errInternal = errors.New("closed"), errors.New("x")

const (
	MaxRetries = 3
	Name string = "demo"
)
"#;

    #[test]
    fn builds_public_surface() {
        let c = build(ExtractOptions::default(), SOURCE);
        assert_eq!(c.package_name, "demo");

        let writer = &c.interfaces[0];
        assert_eq!(writer.doc_comment, "Writer writes.");
        assert_eq!(writer.methods.len(), 1);
        assert_eq!(writer.methods[0].signature(), "func Write(string) error");
        assert_eq!(writer.methods[0].doc_comment, "Write writes data.");

        let names: Vec<&str> = c.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Config", "Handler", "Level"]);

        let config = &c.types[0];
        assert_eq!(config.kind, TypeKind::Struct);
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.fields[0].tag, "`json:\"name\"`");
        assert_eq!(config.methods.len(), 1);
        assert_eq!(config.methods[0].signature(), "func (*Config) Validate() error");

        assert_eq!(c.types[1].kind, TypeKind::Alias);
        assert_eq!(c.types[1].underlying, "func(string) error");
        assert_eq!(c.types[2].kind, TypeKind::Basic);
        assert_eq!(c.types[2].underlying, "int");

        let funcs: Vec<&str> = c.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(funcs, ["Connect"]);
        assert_eq!(c.variables.len(), 1);
        assert_eq!(c.constants.len(), 2);
    }

    #[test]
    fn duplicate_names_keep_the_first_declaration() {
        let mut parser = GoParser::new().expect("grammar");
        let a = parser
            .parse("a.go", "package demo\ntype T struct{}\nfunc (T) M() int { return 0 }\nfunc Open() int { return 0 }\n")
            .expect("parse a");
        let b = parser
            .parse("b.go", "package demo\ntype T int\nfunc (T) M() string { return \"\" }\nfunc Open() string { return \"\" }\n")
            .expect("parse b");
        let c = ContractBuilder::new(&ExtractOptions::default(), &Syntactic).build("demo", &[a, b]);

        let funcs: Vec<&str> = c.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(funcs, ["Open"]);
        assert_eq!(c.functions[0].results[0].ty, "int");
        assert_eq!(c.types.len(), 1);
        assert_eq!(c.types[0].kind, TypeKind::Struct);
        assert_eq!(c.types[0].methods.len(), 1);
        assert_eq!(c.types[0].methods[0].results[0].ty, "int");
    }

    #[test]
    fn syntactic_constants_keep_source_text() {
        let c = build(ExtractOptions::default(), SOURCE);
        let name = c.constants.iter().find(|k| k.name == "Name").expect("Name");
        assert_eq!(name.ty, "string");
        assert_eq!(name.value, "\"demo\"");
        let retries = c.constants.iter().find(|k| k.name == "MaxRetries").expect("MaxRetries");
        assert_eq!(retries.ty, "");
        assert_eq!(retries.value, "3");
    }

    #[test]
    fn include_private_keeps_everything_but_init() {
        let opts = ExtractOptions {
            include_private: true,
            ..ExtractOptions::default()
        };
        let c = build(opts, SOURCE);
        assert_eq!(c.interfaces[0].methods.len(), 2);
        let hidden = c.types.iter().find(|t| t.name == "hidden").expect("hidden type");
        assert_eq!(hidden.methods.len(), 1);
        let config = c.types.iter().find(|t| t.name == "Config").expect("Config");
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.methods.len(), 2);
        assert!(c.functions.iter().all(|f| f.name != "init"));
        assert_eq!(c.variables.len(), 2);
    }

    #[test]
    fn literal_types() {
        assert_eq!(literal_type(&Expr::Str).as_deref(), Some("string"));
        let addr = Expr::Unary {
            op: "&".into(),
            operand: Box::new(Expr::Composite(TypeExpr::local("Config"))),
        };
        assert_eq!(literal_type(&addr).as_deref(), Some("*Config"));
        assert_eq!(literal_type(&Expr::Ident("x".into())), None);
    }
}
