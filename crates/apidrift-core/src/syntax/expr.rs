//! Initializer expressions of `const` and `var` specs.
//!
//! Only the shapes needed to evaluate integer constants and to infer the
//! type of simple initializers are modelled; everything else is `Other`.

use super::types::TypeExpr;

/// An initializer expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal, already decoded.
    Int(i128),
    /// Floating-point literal.
    Float,
    /// Imaginary literal.
    Imaginary,
    /// String literal (interpreted or raw).
    Str,
    /// Rune literal.
    Rune,
    /// `true` / `false`.
    Bool(bool),
    /// `iota`.
    Iota,
    /// Unqualified identifier.
    Ident(String),
    /// `pkg.Name`.
    Selector {
        /// Qualifier.
        package: String,
        /// Selected name.
        name: String,
    },
    /// Unary operator application.
    Unary {
        /// Operator token.
        op: String,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operator application.
    Binary {
        /// Operator token.
        op: String,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `f(args)`: a call or a conversion; only resolution can tell.
    Call {
        /// Callee.
        func: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `T(x)` where `T` is syntactically a type (`[]byte(s)`, `*T(p)`).
    Conversion {
        /// Target type.
        ty: TypeExpr,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `T{...}`.
    Composite(TypeExpr),
    /// Anything else.
    Other,
}

/// An initializer with its normalized source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExpr {
    /// Source text with whitespace runs collapsed.
    pub text: String,
    /// Structured form.
    pub expr: Expr,
}

/// Decode a Go integer literal (`42`, `0x2A`, `0o52`, `052`, `0b101010`,
/// with optional `_` separators).
pub fn parse_int(literal: &str) -> Option<i128> {
    let digits: String = literal.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i128::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_integer_bases() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x2A"), Some(42));
        assert_eq!(parse_int("0o52"), Some(42));
        assert_eq!(parse_int("052"), Some(42));
        assert_eq!(parse_int("0b10_1010"), Some(42));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("1.5"), None);
    }
}
