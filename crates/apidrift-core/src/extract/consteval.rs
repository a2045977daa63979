//! Constant expression evaluation.
//!
//! Integer and boolean constant expressions are folded to a value; every
//! other constant keeps its source text. Types follow Go's rules for
//! untyped constants: the result of mixing untyped kinds takes the "larger"
//! kind, and any typed operand makes the result typed.

use crate::syntax::expr::Expr;
use crate::syntax::types::is_basic;

/// Kind of an untyped constant, ordered by Go's promotion rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Untyped {
    Bool,
    Str,
    Int,
    Rune,
    Float,
    Complex,
}

impl Untyped {
    /// The type an untyped constant of this kind defaults to.
    pub(crate) const fn default_type(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Str => "string",
            Self::Int => "int",
            Self::Rune => "rune",
            Self::Float => "float64",
            Self::Complex => "complex128",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Bool => "untyped bool",
            Self::Str => "untyped string",
            Self::Int => "untyped int",
            Self::Rune => "untyped rune",
            Self::Float => "untyped float",
            Self::Complex => "untyped complex",
        }
    }

    const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Rune | Self::Float | Self::Complex)
    }
}

/// Type of a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConstType {
    /// Explicitly or transitively typed.
    Typed(String),
    /// Untyped constant of the given kind.
    Untyped(Untyped),
    /// Could not be determined.
    Unknown,
}

impl ConstType {
    /// Text used in the contract (`untyped int`, `Level`, or empty).
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Typed(name) => name.clone(),
            Self::Untyped(kind) => kind.label().to_string(),
            Self::Unknown => String::new(),
        }
    }

    /// Type a variable initialized with this constant gets.
    pub(crate) fn default_type(&self) -> String {
        match self {
            Self::Typed(name) => name.clone(),
            Self::Untyped(kind) => kind.default_type().to_string(),
            Self::Unknown => String::new(),
        }
    }
}

/// A folded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Value {
    Int(i128),
    Bool(bool),
}

impl Value {
    pub(crate) fn render(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// Result of evaluating a constant expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Evaluated {
    pub ty: ConstType,
    pub value: Option<Value>,
}

impl Evaluated {
    pub(crate) const fn unknown() -> Self {
        Self {
            ty: ConstType::Unknown,
            value: None,
        }
    }

    const fn untyped(kind: Untyped, value: Option<Value>) -> Self {
        Self {
            ty: ConstType::Untyped(kind),
            value,
        }
    }
}

/// Names visible to a constant expression.
pub(crate) trait ConstEnv {
    /// Evaluate the package-level constant `name`. `depth` grows with each
    /// nested lookup so that cyclic definitions terminate.
    fn constant(&self, name: &str, depth: usize) -> Option<Evaluated>;

    /// Whether `name` is a type declared in the package.
    fn is_type(&self, name: &str) -> bool;
}

/// Lookups deeper than this give up.
pub(crate) const MAX_DEPTH: usize = 64;

/// Evaluate `expr` with `iota` bound to `iota`.
pub(crate) fn eval(expr: &Expr, iota: i128, env: &dyn ConstEnv, depth: usize) -> Evaluated {
    if depth > MAX_DEPTH {
        return Evaluated::unknown();
    }
    match expr {
        Expr::Int(n) => Evaluated::untyped(Untyped::Int, Some(Value::Int(*n))),
        Expr::Float => Evaluated::untyped(Untyped::Float, None),
        Expr::Imaginary => Evaluated::untyped(Untyped::Complex, None),
        Expr::Rune => Evaluated::untyped(Untyped::Rune, None),
        Expr::Str => Evaluated::untyped(Untyped::Str, None),
        Expr::Bool(b) => Evaluated::untyped(Untyped::Bool, Some(Value::Bool(*b))),
        Expr::Iota => Evaluated::untyped(Untyped::Int, Some(Value::Int(iota))),
        Expr::Ident(name) => env
            .constant(name, depth + 1)
            .unwrap_or_else(Evaluated::unknown),
        Expr::Unary { op, operand } => unary(op, eval(operand, iota, env, depth + 1)),
        Expr::Binary { op, left, right } => binary(
            op,
            eval(left, iota, env, depth + 1),
            eval(right, iota, env, depth + 1),
        ),
        Expr::Call { func, args } => match (func.as_ref(), args.as_slice()) {
            (Expr::Ident(name), [arg]) if is_basic(name) || env.is_type(name) => {
                convert(name.clone(), eval(arg, iota, env, depth + 1))
            }
            (Expr::Selector { package, name }, [arg]) => {
                convert(format!("{package}.{name}"), eval(arg, iota, env, depth + 1))
            }
            _ => Evaluated::unknown(),
        },
        Expr::Conversion { ty, operand } => {
            convert(ty.to_string(), eval(operand, iota, env, depth + 1))
        }
        Expr::Selector { .. } | Expr::Composite(_) | Expr::Other => Evaluated::unknown(),
    }
}

fn convert(ty: String, inner: Evaluated) -> Evaluated {
    Evaluated {
        ty: ConstType::Typed(ty),
        value: inner.value,
    }
}

fn unary(op: &str, operand: Evaluated) -> Evaluated {
    let value = match (op, operand.value) {
        ("-", Some(Value::Int(n))) => n.checked_neg().map(Value::Int),
        ("+", v @ Some(Value::Int(_))) => v,
        ("^", Some(Value::Int(n))) => Some(Value::Int(!n)),
        ("!", Some(Value::Bool(b))) => Some(Value::Bool(!b)),
        _ => None,
    };
    Evaluated {
        ty: operand.ty,
        value,
    }
}

fn binary(op: &str, left: Evaluated, right: Evaluated) -> Evaluated {
    if matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
        let value = match (left.value, right.value) {
            (Some(Value::Int(a)), Some(Value::Int(b))) => Some(Value::Bool(compare(op, a, b))),
            _ => None,
        };
        return Evaluated::untyped(Untyped::Bool, value);
    }

    let ty = if matches!(op, "<<" | ">>") {
        left.ty.clone()
    } else {
        combine(&left.ty, &right.ty)
    };

    let value = match (left.value, right.value) {
        (Some(Value::Int(a)), Some(Value::Int(b))) => int_op(op, a, b).map(Value::Int),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => match op {
            "&&" => Some(Value::Bool(a && b)),
            "||" => Some(Value::Bool(a || b)),
            _ => None,
        },
        _ => None,
    };
    Evaluated { ty, value }
}

fn compare(op: &str, a: i128, b: i128) -> bool {
    match op {
        "==" => a == b,
        "!=" => a != b,
        "<" => a < b,
        "<=" => a <= b,
        ">" => a > b,
        _ => a >= b,
    }
}

fn int_op(op: &str, a: i128, b: i128) -> Option<i128> {
    match op {
        "+" => a.checked_add(b),
        "-" => a.checked_sub(b),
        "*" => a.checked_mul(b),
        "/" => a.checked_div(b),
        "%" => a.checked_rem(b),
        "&" => Some(a & b),
        "|" => Some(a | b),
        "^" => Some(a ^ b),
        "&^" => Some(a & !b),
        "<<" => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).filter(|r| r >> b == a),
        ">>" => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
        _ => None,
    }
}

fn combine(left: &ConstType, right: &ConstType) -> ConstType {
    match (left, right) {
        (ConstType::Typed(t), _) | (_, ConstType::Typed(t)) => ConstType::Typed(t.clone()),
        (ConstType::Untyped(a), ConstType::Untyped(b)) => {
            if a.is_numeric() && b.is_numeric() {
                ConstType::Untyped((*a).max(*b))
            } else if a == b {
                ConstType::Untyped(*a)
            } else {
                ConstType::Unknown
            }
        }
        _ => ConstType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::syntax::types::TypeExpr;

    #[derive(Default)]
    struct Env {
        consts: HashMap<&'static str, Expr>,
        types: Vec<&'static str>,
    }

    impl ConstEnv for Env {
        fn constant(&self, name: &str, depth: usize) -> Option<Evaluated> {
            self.consts.get(name).map(|e| eval(e, 0, self, depth))
        }

        fn is_type(&self, name: &str) -> bool {
            self.types.contains(&name)
        }
    }

    fn bin(op: &str, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn folds_iota_arithmetic() {
        let env = Env::default();
        // 1 << (10 * (iota + 1))
        let expr = bin(
            "<<",
            Expr::Int(1),
            bin("*", Expr::Int(10), bin("+", Expr::Iota, Expr::Int(1))),
        );
        let kb = eval(&expr, 0, &env, 0);
        assert_eq!(kb.value, Some(Value::Int(1024)));
        assert_eq!(kb.ty, ConstType::Untyped(Untyped::Int));
        assert_eq!(eval(&expr, 1, &env, 0).value, Some(Value::Int(1024 * 1024)));
    }

    #[test]
    fn conversions_make_constants_typed() {
        let env = Env {
            types: vec!["Level"],
            ..Env::default()
        };
        let call = Expr::Call {
            func: Box::new(Expr::Ident("Level".into())),
            args: vec![Expr::Int(2)],
        };
        let got = eval(&call, 0, &env, 0);
        assert_eq!(got.ty, ConstType::Typed("Level".into()));
        assert_eq!(got.value.map(Value::render).as_deref(), Some("2"));

        let conv = Expr::Conversion {
            ty: TypeExpr::local("uint8"),
            operand: Box::new(Expr::Int(7)),
        };
        assert_eq!(eval(&conv, 0, &env, 0).ty.label(), "uint8");
    }

    #[test]
    fn references_resolve_through_env() {
        let mut env = Env::default();
        env.consts.insert("Base", Expr::Int(10));
        let expr = bin("*", Expr::Ident("Base".into()), Expr::Int(3));
        assert_eq!(eval(&expr, 0, &env, 0).value, Some(Value::Int(30)));
    }

    #[test]
    fn cyclic_references_terminate() {
        let mut env = Env::default();
        env.consts.insert("A", Expr::Ident("B".into()));
        env.consts.insert("B", Expr::Ident("A".into()));
        let got = eval(&Expr::Ident("A".into()), 0, &env, 0);
        assert_eq!(got.value, None);
    }

    #[test]
    fn untyped_kinds_promote() {
        let env = Env::default();
        let mixed = bin("*", Expr::Int(2), Expr::Float);
        assert_eq!(eval(&mixed, 0, &env, 0).ty.label(), "untyped float");
        let cmp = bin("<", Expr::Int(1), Expr::Int(2));
        let got = eval(&cmp, 0, &env, 0);
        assert_eq!(got.ty.label(), "untyped bool");
        assert_eq!(got.value, Some(Value::Bool(true)));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let env = Env::default();
        let expr = bin("/", Expr::Int(1), Expr::Int(0));
        assert_eq!(eval(&expr, 0, &env, 0).value, None);
    }

    #[test]
    fn default_types() {
        assert_eq!(ConstType::Untyped(Untyped::Float).default_type(), "float64");
        assert_eq!(ConstType::Typed("Level".into()).default_type(), "Level");
        assert_eq!(ConstType::Unknown.label(), "");
    }
}
