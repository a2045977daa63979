//! Top-level declarations and their lowering from tree-sitter nodes.

use tree_sitter::Node;

use super::doc;
use super::expr::{Expr, ValueExpr, parse_int};
use super::types::{ChanDir, FieldSpec, InterfaceSpec, MethodSpec, Param, Signature, TypeExpr};
use crate::contract::Position;

/// An identifier with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// Identifier text.
    pub name: String,
    /// Where it appears.
    pub pos: Position,
}

/// `type Name[...] T` or `type Name = T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// Declared name.
    pub name: String,
    /// `type A = B` form.
    pub alias: bool,
    /// Generic type parameters.
    pub type_params: Vec<Param>,
    /// Right-hand side.
    pub ty: TypeExpr,
    /// Doc comment.
    pub doc: String,
    /// Position of the name.
    pub pos: Position,
}

/// Receiver of a method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverDecl {
    /// Receiver variable name.
    pub name: Option<String>,
    /// Receiver type with the pointer stripped.
    pub ty: TypeExpr,
    /// `*T` receiver.
    pub pointer: bool,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    /// Declared name.
    pub name: String,
    /// Present for methods.
    pub receiver: Option<ReceiverDecl>,
    /// Generic type parameters (functions only).
    pub type_params: Vec<Param>,
    /// Parameters and results.
    pub sig: Signature,
    /// Doc comment.
    pub doc: String,
    /// Position of the name.
    pub pos: Position,
}

/// One `var` spec: `var a, b T = x, y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSpec {
    /// Declared names.
    pub names: Vec<Ident>,
    /// Declared type, if written.
    pub ty: Option<TypeExpr>,
    /// Initializers, if written.
    pub values: Vec<ValueExpr>,
    /// Doc comment (the spec's own, else the enclosing declaration's).
    pub doc: String,
}

/// One `const` spec. Implicitly repeated specs in a group already carry the
/// type and initializers of the last explicit spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstSpec {
    /// Declared names.
    pub names: Vec<Ident>,
    /// Declared type, if written (or inherited).
    pub ty: Option<TypeExpr>,
    /// Initializers (written or inherited).
    pub values: Vec<ValueExpr>,
    /// Index of the spec within its group.
    pub iota: i128,
    /// Whether the initializers were inherited from an earlier spec.
    pub implicit: bool,
    /// Doc comment (the spec's own, else the enclosing declaration's).
    pub doc: String,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    /// Type declaration.
    Type(TypeDecl),
    /// Function or method.
    Func(FuncDecl),
    /// Variable spec.
    Var(VarSpec),
    /// Constant spec.
    Const(ConstSpec),
}

/// Converts tree-sitter nodes of one file into owned declarations.
pub(super) struct Lowerer<'a> {
    src: &'a [u8],
    file: &'a str,
}

impl<'a> Lowerer<'a> {
    pub(super) const fn new(src: &'a [u8], file: &'a str) -> Self {
        Self { src, file }
    }

    pub(super) fn decls(&self, root: Node<'_>) -> Vec<Decl> {
        let mut out = Vec::new();
        for node in children(root) {
            match node.kind() {
                "function_declaration" | "method_declaration" => {
                    if let Some(func) = self.func(node) {
                        out.push(Decl::Func(func));
                    }
                }
                "type_declaration" => {
                    let outer = doc::leading(node, self.src);
                    for spec in children(node) {
                        if matches!(spec.kind(), "type_spec" | "type_alias")
                            && let Some(decl) = self.type_spec(spec, &outer)
                        {
                            out.push(Decl::Type(decl));
                        }
                    }
                }
                "var_declaration" => {
                    let outer = doc::leading(node, self.src);
                    self.var_specs(node, &outer, &mut out);
                }
                "const_declaration" => {
                    let outer = doc::leading(node, self.src);
                    self.const_group(node, &outer, &mut out);
                }
                _ => {}
            }
        }
        out
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.src).unwrap_or_default()
    }

    fn normalized(&self, node: Node<'_>) -> String {
        self.text(node).split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn pos(&self, node: Node<'_>) -> Position {
        let start = node.start_position();
        Position {
            file: self.file.to_string(),
            line: start.row + 1,
            column: start.column + 1,
        }
    }

    fn func(&self, node: Node<'_>) -> Option<FuncDecl> {
        let name = node.child_by_field_name("name")?;
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|list| self.receiver(list));
        Some(FuncDecl {
            name: self.text(name).to_string(),
            receiver,
            type_params: self.type_params(node),
            sig: self.signature(node),
            doc: doc::leading(node, self.src),
            pos: self.pos(name),
        })
    }

    fn receiver(&self, list: Node<'_>) -> Option<ReceiverDecl> {
        let decl = children(list).into_iter().next()?;
        let name = decl
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let ty_node = decl.child_by_field_name("type")?;
        let (ty, pointer) = match self.lower_type(ty_node) {
            TypeExpr::Pointer(inner) => (*inner, true),
            other => (other, false),
        };
        Some(ReceiverDecl { name, ty, pointer })
    }

    fn type_spec(&self, spec: Node<'_>, outer_doc: &str) -> Option<TypeDecl> {
        let name = spec.child_by_field_name("name")?;
        let ty = spec.child_by_field_name("type")?;
        let own = doc::leading(spec, self.src);
        Some(TypeDecl {
            name: self.text(name).to_string(),
            alias: spec.kind() == "type_alias",
            type_params: self.type_params(spec),
            ty: self.lower_type(ty),
            doc: if own.is_empty() { outer_doc.to_string() } else { own },
            pos: self.pos(name),
        })
    }

    fn var_specs(&self, node: Node<'_>, outer_doc: &str, out: &mut Vec<Decl>) {
        for child in children(node) {
            match child.kind() {
                "var_spec" => {
                    let own = doc::attached(child, self.src);
                    out.push(Decl::Var(VarSpec {
                        names: self.idents(child),
                        ty: child
                            .child_by_field_name("type")
                            .map(|t| self.lower_type(t)),
                        values: self.values(child),
                        doc: if own.is_empty() { outer_doc.to_string() } else { own },
                    }));
                }
                // grouped `var ( ... )` in newer grammars
                "var_spec_list" => self.var_specs(child, outer_doc, out),
                _ => {}
            }
        }
    }

    fn const_group(&self, node: Node<'_>, outer_doc: &str, out: &mut Vec<Decl>) {
        let mut last_ty: Option<TypeExpr> = None;
        let mut last_values: Vec<ValueExpr> = Vec::new();
        let mut iota = 0;

        for spec in children(node) {
            if spec.kind() != "const_spec" {
                continue;
            }
            let values = self.values(spec);
            let implicit = values.is_empty();
            let (ty, values) = if implicit {
                (last_ty.clone(), last_values.clone())
            } else {
                let ty = spec.child_by_field_name("type").map(|t| self.lower_type(t));
                last_ty.clone_from(&ty);
                last_values.clone_from(&values);
                (ty, values)
            };
            let own = doc::attached(spec, self.src);
            out.push(Decl::Const(ConstSpec {
                names: self.idents(spec),
                ty,
                values,
                iota,
                implicit,
                doc: if own.is_empty() { outer_doc.to_string() } else { own },
            }));
            iota += 1;
        }
    }

    fn idents(&self, spec: Node<'_>) -> Vec<Ident> {
        field_children(spec, "name")
            .into_iter()
            .map(|n| Ident {
                name: self.text(n).to_string(),
                pos: self.pos(n),
            })
            .collect()
    }

    fn values(&self, spec: Node<'_>) -> Vec<ValueExpr> {
        spec.child_by_field_name("value")
            .map(|list| {
                children(list)
                    .into_iter()
                    .map(|v| self.value(v))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn value(&self, node: Node<'_>) -> ValueExpr {
        let text = if matches!(node.kind(), "raw_string_literal" | "interpreted_string_literal") {
            self.text(node).to_string()
        } else {
            self.normalized(node)
        };
        ValueExpr {
            text,
            expr: self.lower_expr(node),
        }
    }

    fn lower_expr(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "int_literal" => parse_int(self.text(node)).map_or(Expr::Other, Expr::Int),
            "float_literal" => Expr::Float,
            "imaginary_literal" => Expr::Imaginary,
            "rune_literal" => Expr::Rune,
            "interpreted_string_literal" | "raw_string_literal" => Expr::Str,
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "iota" => Expr::Iota,
            "identifier" => match self.text(node) {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "iota" => Expr::Iota,
                name => Expr::Ident(name.to_string()),
            },
            "selector_expression" => {
                match (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("field"),
                ) {
                    (Some(operand), Some(field)) if operand.kind() == "identifier" => {
                        Expr::Selector {
                            package: self.text(operand).to_string(),
                            name: self.text(field).to_string(),
                        }
                    }
                    _ => Expr::Other,
                }
            }
            "parenthesized_expression" => children(node)
                .into_iter()
                .next()
                .map_or(Expr::Other, |inner| self.lower_expr(inner)),
            "unary_expression" => match (
                node.child_by_field_name("operator"),
                node.child_by_field_name("operand"),
            ) {
                (Some(op), Some(operand)) => Expr::Unary {
                    op: self.text(op).to_string(),
                    operand: Box::new(self.lower_expr(operand)),
                },
                _ => Expr::Other,
            },
            "binary_expression" => match (
                node.child_by_field_name("left"),
                node.child_by_field_name("operator"),
                node.child_by_field_name("right"),
            ) {
                (Some(left), Some(op), Some(right)) => Expr::Binary {
                    op: self.text(op).to_string(),
                    left: Box::new(self.lower_expr(left)),
                    right: Box::new(self.lower_expr(right)),
                },
                _ => Expr::Other,
            },
            "call_expression" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return Expr::Other;
                };
                let args = node
                    .child_by_field_name("arguments")
                    .map(|list| {
                        children(list)
                            .into_iter()
                            .map(|a| self.lower_expr(a))
                            .collect()
                    })
                    .unwrap_or_default();
                Expr::Call {
                    func: Box::new(self.lower_expr(func)),
                    args,
                }
            }
            "type_conversion_expression" => match (
                node.child_by_field_name("type"),
                node.child_by_field_name("operand"),
            ) {
                (Some(ty), Some(operand)) => Expr::Conversion {
                    ty: self.lower_type(ty),
                    operand: Box::new(self.lower_expr(operand)),
                },
                _ => Expr::Other,
            },
            "composite_literal" => node
                .child_by_field_name("type")
                .map_or(Expr::Other, |ty| Expr::Composite(self.lower_type(ty))),
            _ => Expr::Other,
        }
    }

    fn type_params(&self, node: Node<'_>) -> Vec<Param> {
        let Some(list) = node.child_by_field_name("type_parameters") else {
            return Vec::new();
        };
        let mut params = Vec::new();
        for decl in children(list) {
            let constraint = decl
                .child_by_field_name("type")
                .map_or_else(|| TypeExpr::local("any"), |c| self.lower_type_elem(c));
            for name in field_children(decl, "name") {
                params.push(Param {
                    name: Some(self.text(name).to_string()),
                    ty: constraint.clone(),
                });
            }
        }
        params
    }

    fn signature(&self, node: Node<'_>) -> Signature {
        let params = node
            .child_by_field_name("parameters")
            .map(|list| self.params(list))
            .unwrap_or_default();
        let results = match node.child_by_field_name("result") {
            Some(list) if list.kind() == "parameter_list" => self.params(list),
            Some(ty) => vec![Param {
                name: None,
                ty: self.lower_type(ty),
            }],
            None => Vec::new(),
        };
        Signature { params, results }
    }

    fn params(&self, list: Node<'_>) -> Vec<Param> {
        let mut out = Vec::new();
        for decl in children(list) {
            let Some(ty_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let mut ty = self.lower_type(ty_node);
            if decl.kind() == "variadic_parameter_declaration" {
                ty = TypeExpr::Variadic(Box::new(ty));
            }
            let names = field_children(decl, "name");
            if names.is_empty() {
                out.push(Param { name: None, ty });
            } else {
                for name in names {
                    out.push(Param {
                        name: Some(self.text(name).to_string()),
                        ty: ty.clone(),
                    });
                }
            }
        }
        out
    }

    /// Lower a type expression node.
    pub(super) fn lower_type(&self, node: Node<'_>) -> TypeExpr {
        match node.kind() {
            "type_identifier" | "identifier" | "field_identifier" => {
                TypeExpr::local(self.text(node))
            }
            "qualified_type" => match (
                node.child_by_field_name("package"),
                node.child_by_field_name("name"),
            ) {
                (Some(pkg), Some(name)) => TypeExpr::Named {
                    package: Some(self.text(pkg).to_string()),
                    name: self.text(name).to_string(),
                    args: Vec::new(),
                },
                _ => TypeExpr::Raw(self.normalized(node)),
            },
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|t| self.lower_type(t));
                let args: Vec<TypeExpr> = node
                    .child_by_field_name("type_arguments")
                    .map(|list| {
                        children(list)
                            .into_iter()
                            .map(|a| self.lower_type_elem(a))
                            .collect()
                    })
                    .unwrap_or_default();
                match base {
                    Some(TypeExpr::Named { package, name, .. }) => TypeExpr::Named {
                        package,
                        name,
                        args,
                    },
                    _ => TypeExpr::Raw(self.normalized(node)),
                }
            }
            "pointer_type" => self.wrap(node, |t| TypeExpr::Pointer(Box::new(t))),
            "parenthesized_type" => self.wrap(node, |t| t),
            "negated_type" => self.wrap(node, |t| TypeExpr::Tilde(Box::new(t))),
            "slice_type" => self.element(node, "element", |t| TypeExpr::Slice(Box::new(t))),
            "array_type" => {
                let len = node
                    .child_by_field_name("length")
                    .map(|l| self.normalized(l))
                    .unwrap_or_default();
                self.element(node, "element", |t| TypeExpr::Array {
                    len,
                    elem: Box::new(t),
                })
            }
            "implicit_length_array_type" => self.element(node, "element", |t| TypeExpr::Array {
                len: "...".into(),
                elem: Box::new(t),
            }),
            "map_type" => match (
                node.child_by_field_name("key"),
                node.child_by_field_name("value"),
            ) {
                (Some(k), Some(v)) => TypeExpr::Map {
                    key: Box::new(self.lower_type(k)),
                    value: Box::new(self.lower_type(v)),
                },
                _ => TypeExpr::Raw(self.normalized(node)),
            },
            "channel_type" => {
                let dir = channel_dir(node);
                self.element(node, "value", |t| TypeExpr::Chan {
                    dir,
                    elem: Box::new(t),
                })
            }
            "function_type" => TypeExpr::Func(self.signature(node)),
            "struct_type" => TypeExpr::Struct(self.struct_fields(node)),
            "interface_type" => TypeExpr::Interface(self.interface(node)),
            "type_elem" | "type_constraint" | "constraint_elem" => self.lower_type_elem(node),
            _ => TypeExpr::Raw(self.normalized(node)),
        }
    }

    fn lower_type_elem(&self, node: Node<'_>) -> TypeExpr {
        if !matches!(node.kind(), "type_elem" | "type_constraint" | "constraint_elem") {
            return self.lower_type(node);
        }
        let mut terms: Vec<TypeExpr> = children(node)
            .into_iter()
            .map(|t| self.lower_type(t))
            .collect();
        match terms.len() {
            0 => TypeExpr::Raw(self.normalized(node)),
            1 => terms.remove(0),
            _ => TypeExpr::Union(terms),
        }
    }

    fn wrap(&self, node: Node<'_>, f: impl FnOnce(TypeExpr) -> TypeExpr) -> TypeExpr {
        children(node)
            .into_iter()
            .next()
            .map_or_else(|| TypeExpr::Raw(self.normalized(node)), |inner| f(self.lower_type(inner)))
    }

    fn element(
        &self,
        node: Node<'_>,
        field: &str,
        f: impl FnOnce(TypeExpr) -> TypeExpr,
    ) -> TypeExpr {
        node.child_by_field_name(field)
            .map_or_else(|| TypeExpr::Raw(self.normalized(node)), |elem| f(self.lower_type(elem)))
    }

    fn struct_fields(&self, node: Node<'_>) -> Vec<FieldSpec> {
        let Some(list) = children(node)
            .into_iter()
            .find(|c| c.kind() == "field_declaration_list")
        else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        for decl in children(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let Some(ty_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let mut ty = self.lower_type(ty_node);
            let tag = decl
                .child_by_field_name("tag")
                .map(|t| self.text(t).to_string())
                .unwrap_or_default();
            let doc = doc::attached(decl, self.src);
            let names = field_children(decl, "name");

            if names.is_empty() {
                if has_token(decl, "*") {
                    ty = TypeExpr::Pointer(Box::new(ty));
                }
                let name = ty.base_name().unwrap_or_default().to_string();
                fields.push(FieldSpec {
                    name,
                    ty,
                    tag,
                    embedded: true,
                    doc,
                    pos: self.pos(ty_node),
                });
            } else {
                for name in names {
                    fields.push(FieldSpec {
                        name: self.text(name).to_string(),
                        ty: ty.clone(),
                        tag: tag.clone(),
                        embedded: false,
                        doc: doc.clone(),
                        pos: self.pos(name),
                    });
                }
            }
        }
        fields
    }

    fn interface(&self, node: Node<'_>) -> InterfaceSpec {
        let mut spec = InterfaceSpec::default();
        for elem in children(node) {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = elem.child_by_field_name("name") else {
                        continue;
                    };
                    spec.methods.push(MethodSpec {
                        name: self.text(name).to_string(),
                        sig: self.signature(elem),
                        doc: doc::attached(elem, self.src),
                        pos: self.pos(name),
                    });
                }
                _ => spec.embeds.push(self.lower_type_elem(elem)),
            }
        }
        spec
    }
}

/// Named children, comments excluded.
pub(super) fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

fn channel_dir(node: Node<'_>) -> ChanDir {
    let mut cursor = node.walk();
    let tokens: Vec<&str> = node
        .children(&mut cursor)
        .filter(|c| !c.is_named())
        .map(|c| c.kind())
        .collect();
    match tokens.as_slice() {
        ["<-", "chan", ..] => ChanDir::Recv,
        ["chan", "<-", ..] => ChanDir::Send,
        _ => ChanDir::Both,
    }
}
