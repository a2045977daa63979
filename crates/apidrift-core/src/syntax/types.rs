//! Canonical Go type model.
//!
//! [`TypeExpr`] is the owned, tree-independent form of a Go type expression.
//! Its `Display` output is the canonical text used everywhere a type is
//! compared or shown: whitespace is normalized, parameter names are dropped,
//! and composite types always render the same way regardless of how the
//! source spelled them.

use std::fmt;

use crate::contract::Position;

/// Predeclared identifiers that name primitive types.
pub const BASIC_TYPES: &[&str] = &[
    "bool",
    "string",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "byte",
    "rune",
];

/// Predeclared non-primitive type names.
pub const PREDECLARED_TYPES: &[&str] = &["error", "any", "comparable"];

/// Whether `name` is exported (starts with an upper-case letter).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Whether `name` is a predeclared primitive type.
pub fn is_basic(name: &str) -> bool {
    BASIC_TYPES.contains(&name)
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

/// A Go type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `Name`, `pkg.Name`, or an instantiation `Name[A, B]`.
    Named {
        /// Package qualifier, if any.
        package: Option<String>,
        /// Type name.
        name: String,
        /// Type arguments of a generic instantiation.
        args: Vec<TypeExpr>,
    },
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `[N]T`; `len` is `...` for implicit-length arrays.
    Array {
        /// Length expression text.
        len: String,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `map[K]V`
    Map {
        /// Key type.
        key: Box<TypeExpr>,
        /// Value type.
        value: Box<TypeExpr>,
    },
    /// `chan T`, `chan<- T`, `<-chan T`
    Chan {
        /// Direction.
        dir: ChanDir,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `func(A) R`
    Func(Signature),
    /// `...T` (only as the last parameter).
    Variadic(Box<TypeExpr>),
    /// Inline `struct{...}`.
    Struct(Vec<FieldSpec>),
    /// Inline `interface{...}`.
    Interface(InterfaceSpec),
    /// Type-set union `A | B`.
    Union(Vec<TypeExpr>),
    /// Underlying-type term `~T`.
    Tilde(Box<TypeExpr>),
    /// Anything the model does not understand, as normalized source text.
    Raw(String),
}

impl TypeExpr {
    /// Unqualified, non-generic named type.
    pub fn local(name: impl Into<String>) -> Self {
        Self::Named {
            package: None,
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// The name when this is an unqualified, non-instantiated named type.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Named {
                package: None,
                name,
                args,
            } if args.is_empty() => Some(name),
            _ => None,
        }
    }

    /// The base name of a named type, looking through one pointer and any
    /// package qualifier or type arguments. Used for embedded field names and
    /// method receivers.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            Self::Pointer(inner) => inner.base_name(),
            _ => None,
        }
    }

    /// Visit this expression and every nested type expression.
    pub fn walk(&self, visit: &mut impl FnMut(&Self)) {
        visit(self);
        match self {
            Self::Named { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            Self::Pointer(inner)
            | Self::Slice(inner)
            | Self::Variadic(inner)
            | Self::Tilde(inner) => inner.walk(visit),
            Self::Array { elem, .. } | Self::Chan { elem, .. } => elem.walk(visit),
            Self::Map { key, value } => {
                key.walk(visit);
                value.walk(visit);
            }
            Self::Func(sig) => sig.walk(visit),
            Self::Struct(fields) => fields.iter().for_each(|f| f.ty.walk(visit)),
            Self::Interface(iface) => {
                iface.embeds.iter().for_each(|e| e.walk(visit));
                iface.methods.iter().for_each(|m| m.sig.walk(visit));
            }
            Self::Union(terms) => terms.iter().for_each(|t| t.walk(visit)),
            Self::Raw(_) => {}
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named {
                package,
                name,
                args,
            } => {
                if let Some(pkg) = package {
                    write!(f, "{pkg}.")?;
                }
                f.write_str(name)?;
                if !args.is_empty() {
                    write!(f, "[{}]", join(args, ", "))?;
                }
                Ok(())
            }
            Self::Pointer(inner) => write!(f, "*{inner}"),
            Self::Slice(inner) => write!(f, "[]{inner}"),
            Self::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Self::Map { key, value } => write!(f, "map[{key}]{value}"),
            Self::Chan { dir, elem } => match dir {
                ChanDir::Recv => write!(f, "<-chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Both => match elem.as_ref() {
                    // `chan <-chan T` would parse as `chan<- chan T`
                    Self::Chan {
                        dir: ChanDir::Recv, ..
                    } => write!(f, "chan ({elem})"),
                    _ => write!(f, "chan {elem}"),
                },
            },
            Self::Func(sig) => write!(f, "func{sig}"),
            Self::Variadic(inner) => write!(f, "...{inner}"),
            Self::Struct(fields) => {
                let rendered: Vec<String> = fields.iter().map(FieldSpec::canonical).collect();
                write!(f, "struct{{{}}}", rendered.join("; "))
            }
            Self::Interface(iface) => write!(f, "{iface}"),
            Self::Union(terms) => f.write_str(&join(terms, " | ")),
            Self::Tilde(inner) => write!(f, "~{inner}"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// A parameter or result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Declared name, if any.
    pub name: Option<String>,
    /// Declared type.
    pub ty: TypeExpr,
}

/// Parameter and result lists of a function, method, or function type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Parameters.
    pub params: Vec<Param>,
    /// Results.
    pub results: Vec<Param>,
}

impl Signature {
    fn walk(&self, visit: &mut impl FnMut(&TypeExpr)) {
        for p in self.params.iter().chain(&self.results) {
            p.ty.walk(visit);
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&TypeExpr> = self.params.iter().map(|p| &p.ty).collect();
        write!(f, "({})", join(&params, ", "))?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {}", single.ty),
            many => {
                let results: Vec<&TypeExpr> = many.iter().map(|p| &p.ty).collect();
                write!(f, " ({})", join(&results, ", "))
            }
        }
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name (the type's base name when embedded).
    pub name: String,
    /// Field type.
    pub ty: TypeExpr,
    /// Raw tag literal, quotes included.
    pub tag: String,
    /// Anonymous field.
    pub embedded: bool,
    /// Doc comment.
    pub doc: String,
    /// Position of the field name (or type, when embedded).
    pub pos: Position,
}

impl FieldSpec {
    fn canonical(&self) -> String {
        let mut out = if self.embedded {
            self.ty.to_string()
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

/// An interface method element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    /// Method name.
    pub name: String,
    /// Signature.
    pub sig: Signature,
    /// Doc comment.
    pub doc: String,
    /// Position of the method name.
    pub pos: Position,
}

/// Body of an interface type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// Explicit methods.
    pub methods: Vec<MethodSpec>,
    /// Embedded interfaces and type-set terms.
    pub embeds: Vec<TypeExpr>,
}

impl fmt::Display for InterfaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut elems: Vec<String> = self.embeds.iter().map(ToString::to_string).collect();
        elems.extend(
            self.methods
                .iter()
                .map(|m| format!("{}{}", m.name, m.sig)),
        );
        write!(f, "interface{{{}}}", elems.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(pkg: Option<&str>, name: &str) -> TypeExpr {
        TypeExpr::Named {
            package: pkg.map(str::to_string),
            name: name.into(),
            args: Vec::new(),
        }
    }

    #[test]
    fn renders_composites() {
        let map = TypeExpr::Map {
            key: Box::new(TypeExpr::local("string")),
            value: Box::new(TypeExpr::Slice(Box::new(TypeExpr::Pointer(Box::new(named(
                Some("http"),
                "Request",
            )))))),
        };
        assert_eq!(map.to_string(), "map[string][]*http.Request");

        let arr = TypeExpr::Array {
            len: "4".into(),
            elem: Box::new(TypeExpr::local("byte")),
        };
        assert_eq!(arr.to_string(), "[4]byte");
    }

    #[test]
    fn renders_channel_directions() {
        let elem = || Box::new(TypeExpr::local("int"));
        let both = TypeExpr::Chan {
            dir: ChanDir::Both,
            elem: elem(),
        };
        let send = TypeExpr::Chan {
            dir: ChanDir::Send,
            elem: elem(),
        };
        let recv = TypeExpr::Chan {
            dir: ChanDir::Recv,
            elem: elem(),
        };
        assert_eq!(both.to_string(), "chan int");
        assert_eq!(send.to_string(), "chan<- int");
        assert_eq!(recv.to_string(), "<-chan int");

        let nested = TypeExpr::Chan {
            dir: ChanDir::Both,
            elem: Box::new(recv),
        };
        assert_eq!(nested.to_string(), "chan (<-chan int)");
    }

    #[test]
    fn renders_func_types_without_names() {
        let sig = Signature {
            params: vec![
                Param {
                    name: Some("format".into()),
                    ty: TypeExpr::local("string"),
                },
                Param {
                    name: Some("args".into()),
                    ty: TypeExpr::Variadic(Box::new(TypeExpr::local("any"))),
                },
            ],
            results: vec![
                Param {
                    name: Some("n".into()),
                    ty: TypeExpr::local("int"),
                },
                Param {
                    name: Some("err".into()),
                    ty: TypeExpr::local("error"),
                },
            ],
        };
        assert_eq!(
            TypeExpr::Func(sig).to_string(),
            "func(string, ...any) (int, error)"
        );
    }

    #[test]
    fn renders_generic_instantiation() {
        let ty = TypeExpr::Named {
            package: None,
            name: "Pair".into(),
            args: vec![TypeExpr::local("string"), TypeExpr::local("int")],
        };
        assert_eq!(ty.to_string(), "Pair[string, int]");
        assert_eq!(ty.base_name(), Some("Pair"));
        assert_eq!(ty.local_name(), None);
    }

    #[test]
    fn exported_names() {
        assert!(is_exported("Config"));
        assert!(is_exported("Élan"));
        assert!(!is_exported("config"));
        assert!(!is_exported("_Hidden"));
        assert!(!is_exported(""));
    }
}
