//! Package-wide name resolution for the resolved strategy.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::builder::{Resolve, Shape, literal_type};
use super::consteval::{self, ConstEnv, ConstType, Evaluated, MAX_DEPTH};
use crate::contract::Position;
use crate::syntax::ParsedFile;
use crate::syntax::decl::{ConstSpec, Decl, FuncDecl, TypeDecl, VarSpec};
use crate::syntax::expr::Expr;
use crate::syntax::types::{
    InterfaceSpec, MethodSpec, Param, Signature, TypeExpr, PREDECLARED_TYPES, is_basic,
};

/// Every package-level declaration, indexed by name.
pub(crate) struct PackageScope<'a> {
    types: HashMap<&'a str, &'a TypeDecl>,
    funcs: HashMap<&'a str, &'a FuncDecl>,
    consts: HashMap<&'a str, (&'a ConstSpec, usize)>,
    vars: HashMap<&'a str, (&'a VarSpec, usize)>,
    /// Constants evaluated so far; `None` while an evaluation is in progress.
    evaluated: RefCell<HashMap<&'a str, Option<Evaluated>>>,
    files: &'a [ParsedFile],
}

impl<'a> PackageScope<'a> {
    pub(crate) fn new(files: &'a [ParsedFile]) -> Self {
        let mut scope = Self {
            types: HashMap::new(),
            funcs: HashMap::new(),
            consts: HashMap::new(),
            vars: HashMap::new(),
            evaluated: RefCell::new(HashMap::new()),
            files,
        };
        for decl in files.iter().flat_map(|f| &f.decls) {
            match decl {
                Decl::Type(ty) => {
                    scope.types.entry(&ty.name).or_insert(ty);
                }
                Decl::Func(func) if func.receiver.is_none() => {
                    scope.funcs.entry(&func.name).or_insert(func);
                }
                Decl::Func(_) => {}
                Decl::Var(spec) => {
                    for (i, ident) in spec.names.iter().enumerate() {
                        scope.vars.entry(&ident.name).or_insert((spec, i));
                    }
                }
                Decl::Const(spec) => {
                    for (i, ident) in spec.names.iter().enumerate() {
                        scope.consts.entry(&ident.name).or_insert((spec, i));
                    }
                }
            }
        }
        scope
    }

    /// Every problem that would stop the package from compiling as far as
    /// declarations are concerned, as `file:line:col: message` strings.
    pub(crate) fn check(&self) -> Vec<String> {
        let mut problems: Vec<(Position, String)> = Vec::new();
        self.check_redeclarations(&mut problems);
        self.check_methods(&mut problems);
        self.check_type_references(&mut problems);
        problems.sort_by(|a, b| {
            (&a.0.file, a.0.line, a.0.column).cmp(&(&b.0.file, b.0.line, b.0.column))
        });
        problems
            .into_iter()
            .map(|(pos, message)| format!("{pos}: {message}"))
            .collect()
    }

    fn check_redeclarations(&self, problems: &mut Vec<(Position, String)>) {
        let mut seen: HashMap<&str, &Position> = HashMap::new();
        let mut declare = |name: &'a str, pos: &'a Position, problems: &mut Vec<(Position, String)>| {
            if name == "_" {
                return;
            }
            if let Some(first) = seen.get(name) {
                problems.push((
                    pos.clone(),
                    format!("{name} redeclared in this block (other declaration at {first})"),
                ));
            } else {
                seen.insert(name, pos);
            }
        };

        for decl in self.files.iter().flat_map(|f| &f.decls) {
            match decl {
                Decl::Type(ty) => declare(ty.name.as_str(), &ty.pos, problems),
                Decl::Func(func) if func.receiver.is_none() && func.name != "init" => {
                    declare(func.name.as_str(), &func.pos, problems);
                }
                Decl::Func(_) => {}
                Decl::Var(VarSpec { names, .. }) | Decl::Const(ConstSpec { names, .. }) => {
                    for ident in names {
                        declare(ident.name.as_str(), &ident.pos, problems);
                    }
                }
            }
        }
    }

    fn check_methods(&self, problems: &mut Vec<(Position, String)>) {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for decl in self.files.iter().flat_map(|f| &f.decls) {
            let Decl::Func(func) = decl else { continue };
            let Some(recv) = &func.receiver else { continue };
            let Some(base) = recv.ty.base_name() else {
                problems.push((func.pos.clone(), format!("invalid receiver type {}", recv.ty)));
                continue;
            };
            let is_pkg_type = matches!(&recv.ty, TypeExpr::Named { package: None, .. });
            match self.types.get(base) {
                Some(ty) if is_pkg_type => {
                    if matches!(ty.ty, TypeExpr::Interface(_) | TypeExpr::Pointer(_)) {
                        problems.push((
                            func.pos.clone(),
                            format!("invalid receiver type {base} (pointer or interface type)"),
                        ));
                    }
                }
                _ => {
                    problems.push((func.pos.clone(), format!("undefined: {}", recv.ty)));
                    continue;
                }
            }
            if func.name != "_" && !seen.insert((base, &func.name)) {
                problems.push((
                    func.pos.clone(),
                    format!("method {base}.{} already declared", func.name),
                ));
            }
            if let Some(ty) = self.types.get(base)
                && let TypeExpr::Struct(fields) = &ty.ty
                && fields.iter().any(|f| f.name == func.name)
            {
                problems.push((
                    func.pos.clone(),
                    format!("field and method with the same name {}", func.name),
                ));
            }
        }
    }

    fn check_type_references(&self, problems: &mut Vec<(Position, String)>) {
        for file in self.files {
            if file.dot_import {
                continue;
            }
            for decl in &file.decls {
                match decl {
                    Decl::Type(ty) => {
                        let params = param_names(&ty.type_params);
                        self.check_params(&ty.type_params, &params, &ty.pos, problems);
                        self.check_type(&ty.ty, &params, &ty.pos, problems);
                    }
                    Decl::Func(func) => {
                        let mut params = param_names(&func.type_params);
                        if let Some(recv) = &func.receiver
                            && let TypeExpr::Named { args, .. } = &recv.ty
                        {
                            params.extend(args.iter().filter_map(|a| a.local_name().map(str::to_string)));
                        }
                        self.check_params(&func.type_params, &params, &func.pos, problems);
                        self.check_signature(&func.sig, &params, &func.pos, problems);
                    }
                    Decl::Var(VarSpec { names, ty, .. }) | Decl::Const(ConstSpec { names, ty, .. }) => {
                        if let (Some(ty), Some(first)) = (ty, names.first()) {
                            self.check_type(ty, &HashSet::new(), &first.pos, problems);
                        }
                    }
                }
            }
        }
    }

    fn check_params(
        &self,
        type_params: &[Param],
        scope: &HashSet<String>,
        pos: &Position,
        problems: &mut Vec<(Position, String)>,
    ) {
        for p in type_params {
            self.check_type(&p.ty, scope, pos, problems);
        }
    }

    fn check_signature(
        &self,
        sig: &Signature,
        scope: &HashSet<String>,
        pos: &Position,
        problems: &mut Vec<(Position, String)>,
    ) {
        for p in sig.params.iter().chain(&sig.results) {
            self.check_type(&p.ty, scope, pos, problems);
        }
    }

    fn check_type(
        &self,
        ty: &TypeExpr,
        scope: &HashSet<String>,
        pos: &Position,
        problems: &mut Vec<(Position, String)>,
    ) {
        let mut reported: Vec<String> = Vec::new();
        ty.walk(&mut |t| {
            if let TypeExpr::Named {
                package: None,
                name,
                ..
            } = t
                && !self.is_type_name(name)
                && !scope.contains(name)
                && !reported.contains(name)
            {
                reported.push(name.clone());
            }
        });
        for name in reported {
            problems.push((pos.clone(), format!("undefined: {name}")));
        }
    }

    fn is_type_name(&self, name: &str) -> bool {
        is_basic(name) || PREDECLARED_TYPES.contains(&name) || self.types.contains_key(name)
    }

    /// Follow named types declared in this package to a non-named type.
    /// `None` when the chain is cyclic or leaves the package.
    fn underlying<'s>(&'s self, ty: &'s TypeExpr, seen: &mut Vec<String>) -> Option<&'s TypeExpr> {
        let mut current = ty;
        loop {
            let Some(name) = current.local_name() else {
                return Some(current);
            };
            if is_basic(name) || PREDECLARED_TYPES.contains(&name) {
                return Some(current);
            }
            let decl = self.types.get(name)?;
            if seen.iter().any(|s| *s == decl.name) {
                return None;
            }
            seen.push(decl.name.clone());
            current = &decl.ty;
        }
    }

    fn flatten(&self, spec: &InterfaceSpec, seen: &[String]) -> InterfaceSpec {
        let mut out = InterfaceSpec {
            methods: spec.methods.clone(),
            embeds: Vec::new(),
        };
        for embed in &spec.embeds {
            let flattened = match embed.local_name() {
                Some("error") => Some(error_interface(out.methods.first().map(|m| &m.pos))),
                Some("any") => Some(InterfaceSpec::default()),
                Some(name) => self.types.get(name).and_then(|decl| {
                    // each branch gets its own trail so diamonds still flatten
                    let mut branch = seen.to_vec();
                    match self.underlying(&decl.ty, &mut branch) {
                        Some(TypeExpr::Interface(inner)) => Some(self.flatten(inner, &branch)),
                        _ => None,
                    }
                }),
                None => None,
            };
            match flattened {
                Some(inner) => {
                    for method in inner.methods {
                        if !out.methods.iter().any(|m| m.name == method.name) {
                            out.methods.push(method);
                        }
                    }
                    for nested in inner.embeds {
                        if !out.embeds.contains(&nested) {
                            out.embeds.push(nested);
                        }
                    }
                }
                None => out.embeds.push(embed.clone()),
            }
        }
        out
    }

    fn var_type(&self, spec: &VarSpec, index: usize, depth: usize) -> String {
        if let Some(ty) = &spec.ty {
            return ty.to_string();
        }
        if depth > MAX_DEPTH {
            return String::new();
        }
        // a, b := f()
        if spec.values.len() == 1
            && spec.names.len() > 1
            && let Expr::Call { func, .. } = &spec.values[0].expr
        {
            return self
                .call_results(func)
                .and_then(|results| results.get(index).map(|p| p.ty.to_string()))
                .unwrap_or_default();
        }
        spec.values
            .get(index)
            .map(|v| self.expr_type(&v.expr, depth + 1))
            .unwrap_or_default()
    }

    fn call_results(&self, func: &Expr) -> Option<&'a [Param]> {
        match func {
            Expr::Ident(name) => self.funcs.get(name.as_str()).map(|f| f.sig.results.as_slice()),
            _ => None,
        }
    }

    fn expr_type(&self, expr: &Expr, depth: usize) -> String {
        let evaluated = consteval::eval(expr, 0, self, 0);
        if evaluated.ty != ConstType::Unknown {
            return evaluated.ty.default_type();
        }
        match expr {
            Expr::Ident(name) => self
                .vars
                .get(name.as_str())
                .map(|(spec, i)| self.var_type(spec, *i, depth + 1))
                .unwrap_or_default(),
            Expr::Call { func, args } => {
                if let Expr::Ident(name) = func.as_ref()
                    && args.len() == 1
                    && self.types.contains_key(name.as_str())
                {
                    return name.clone();
                }
                match self.call_results(func) {
                    Some([single]) => single.ty.to_string(),
                    _ => String::new(),
                }
            }
            Expr::Binary { op, left, right } => {
                if matches!(op.as_str(), "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||") {
                    return "bool".into();
                }
                let left = self.expr_type(left, depth + 1);
                if left.is_empty() {
                    self.expr_type(right, depth + 1)
                } else {
                    left
                }
            }
            Expr::Unary { op, operand } if op == "&" => {
                let inner = self.expr_type(operand, depth + 1);
                if inner.is_empty() { inner } else { format!("*{inner}") }
            }
            Expr::Unary { op, .. } if op == "<-" => String::new(),
            Expr::Unary { operand, .. } => self.expr_type(operand, depth + 1),
            other => literal_type(other).unwrap_or_default(),
        }
    }
}

fn param_names(params: &[Param]) -> HashSet<String> {
    params.iter().filter_map(|p| p.name.clone()).collect()
}

fn error_interface(pos: Option<&Position>) -> InterfaceSpec {
    InterfaceSpec {
        methods: vec![MethodSpec {
            name: "Error".into(),
            sig: Signature {
                params: Vec::new(),
                results: vec![Param {
                    name: None,
                    ty: TypeExpr::local("string"),
                }],
            },
            doc: String::new(),
            pos: pos.cloned().unwrap_or_default(),
        }],
        embeds: Vec::new(),
    }
}

impl Resolve for PackageScope<'_> {
    fn shape(&self, decl: &TypeDecl) -> Shape {
        let mut seen = vec![decl.name.clone()];
        let target = match decl.ty.local_name() {
            Some(name) if self.types.contains_key(name) => self.underlying(&decl.ty, &mut seen),
            _ => Some(&decl.ty),
        };
        let Some(target) = target else {
            return Shape::Alias(decl.ty.to_string());
        };
        match target {
            TypeExpr::Interface(spec) => Shape::Interface(self.flatten(spec, &seen)),
            TypeExpr::Struct(fields) => Shape::Struct(fields.clone()),
            ty => match ty.local_name() {
                Some(name) if is_basic(name) => Shape::Basic(name.to_string()),
                Some("error") => Shape::Interface(error_interface(Some(&decl.pos))),
                Some("any") => Shape::Interface(InterfaceSpec::default()),
                _ => Shape::Alias(ty.to_string()),
            },
        }
    }

    fn constant(&self, spec: &ConstSpec, index: usize) -> (String, String) {
        let Some(value) = spec.values.get(index) else {
            return (
                spec.ty.as_ref().map(ToString::to_string).unwrap_or_default(),
                String::new(),
            );
        };
        let evaluated = consteval::eval(&value.expr, spec.iota, self, 0);
        let ty = match &spec.ty {
            Some(ty) => ty.to_string(),
            None => evaluated.ty.label(),
        };
        let value = evaluated
            .value
            .map_or_else(|| value.text.clone(), consteval::Value::render);
        (ty, value)
    }

    fn variable(&self, spec: &VarSpec, index: usize) -> String {
        self.var_type(spec, index, 0)
    }
}

impl ConstEnv for PackageScope<'_> {
    /// Each constant is evaluated once per scope. A reference back to a
    /// constant still being evaluated is a cycle and yields an unknown value,
    /// so every constant gets a fresh depth budget.
    fn constant(&self, name: &str, _depth: usize) -> Option<Evaluated> {
        let (&key, &(spec, index)) = self.consts.get_key_value(name)?;
        if let Some(memo) = self.evaluated.borrow().get(key) {
            return Some(memo.clone().unwrap_or_else(Evaluated::unknown));
        }
        let value = spec.values.get(index)?;
        self.evaluated.borrow_mut().insert(key, None);
        let mut evaluated = consteval::eval(&value.expr, spec.iota, self, 0);
        if let Some(ty) = &spec.ty {
            evaluated.ty = ConstType::Typed(ty.to_string());
        }
        self.evaluated.borrow_mut().insert(key, Some(evaluated.clone()));
        Some(evaluated)
    }

    fn is_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

/// Package names declared across `files`, with the files declaring each.
pub(crate) fn package_names(files: &[ParsedFile]) -> BTreeMap<&str, Vec<&str>> {
    let mut names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for file in files {
        names.entry(&file.package).or_default().push(&file.name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::GoParser;

    fn parse(files: &[(&str, &str)]) -> Vec<ParsedFile> {
        let mut parser = GoParser::new().expect("grammar");
        files
            .iter()
            .map(|(name, src)| parser.parse(name, src).expect("parse"))
            .collect()
    }

    fn type_decl<'a>(files: &'a [ParsedFile], name: &str) -> &'a TypeDecl {
        files
            .iter()
            .flat_map(|f| &f.decls)
            .find_map(|d| match d {
                Decl::Type(t) if t.name == name => Some(t),
                _ => None,
            })
            .expect("type declared")
    }

    #[test]
    fn follows_named_chains_to_structs() {
        let files = parse(&[(
            "a.go",
            "package demo\ntype A struct{ X int }\ntype B A\ntype C B\ntype L []A\n",
        )]);
        let scope = PackageScope::new(&files);
        let Shape::Struct(fields) = scope.shape(type_decl(&files, "C")) else {
            panic!("C should be a struct");
        };
        assert_eq!(fields[0].name, "X");
        assert_eq!(scope.shape(type_decl(&files, "L")), Shape::Alias("[]A".into()));
    }

    #[test]
    fn named_basic_chain_is_basic() {
        let files = parse(&[("a.go", "package demo\ntype Level int\ntype Severity Level\n")]);
        let scope = PackageScope::new(&files);
        assert_eq!(
            scope.shape(type_decl(&files, "Severity")),
            Shape::Basic("int".into())
        );
    }

    #[test]
    fn flattens_local_embedded_interfaces() {
        let files = parse(&[(
            "a.go",
            "package demo\ntype Reader interface{ Read() error }\ntype Closer interface{ Close() error }\ntype RC interface {\n\tReader\n\tCloser\n\tio.Writer\n\terror\n}\n",
        )]);
        let scope = PackageScope::new(&files);
        let Shape::Interface(spec) = scope.shape(type_decl(&files, "RC")) else {
            panic!("RC should be an interface");
        };
        let names: Vec<&str> = spec.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Read", "Close", "Error"]);
        assert_eq!(spec.embeds.len(), 1);
        assert_eq!(spec.embeds[0].to_string(), "io.Writer");
    }

    #[test]
    fn resolves_iota_groups() {
        let files = parse(&[(
            "a.go",
            "package demo\ntype Size int64\nconst (\n\t_ = iota\n\tKB Size = 1 << (10 * iota)\n\tMB\n)\nconst Greeting = \"hi\"\nconst Double = MB * 2\n",
        )]);
        let scope = PackageScope::new(&files);
        let consts: Vec<(&ConstSpec, usize)> = files[0]
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Const(c) => Some((c, 0)),
                _ => None,
            })
            .collect();
        assert_eq!(Resolve::constant(&scope, consts[1].0, 0), ("Size".into(), "1024".into()));
        assert_eq!(Resolve::constant(&scope, consts[2].0, 0), ("Size".into(), "1048576".into()));
        assert_eq!(
            Resolve::constant(&scope, consts[3].0, 0),
            ("untyped string".into(), "\"hi\"".into())
        );
        assert_eq!(Resolve::constant(&scope, consts[4].0, 0), ("Size".into(), "2097152".into()));
    }

    #[test]
    fn long_constant_chains_are_evaluated_once() {
        let mut source = String::from("package demo\nconst K0 = 1\n");
        for i in 1..=48 {
            source.push_str(&format!("const K{i} = K{prev} + K{prev}\n", prev = i - 1));
        }
        let files = parse(&[("a.go", source.as_str())]);
        let scope = PackageScope::new(&files);
        let (spec, i) = scope.consts["K48"];
        assert_eq!(
            Resolve::constant(&scope, spec, i),
            ("untyped int".into(), (1_i128 << 48).to_string())
        );
        assert_eq!(scope.evaluated.borrow().len(), 48);
    }

    #[test]
    fn cyclic_constants_keep_source_text() {
        let files = parse(&[("a.go", "package demo\nconst A = B + 1\nconst B = A\n")]);
        let scope = PackageScope::new(&files);
        let (spec, i) = scope.consts["A"];
        assert_eq!(Resolve::constant(&scope, spec, i).1, "B + 1");
    }

    #[test]
    fn infers_variable_types() {
        let files = parse(&[(
            "a.go",
            "package demo\ntype Config struct{}\nfunc New() *Config { return nil }\nfunc Pair() (int, error) { return 0, nil }\nconst Limit = 10\nvar (\n\tDefault = New()\n\tCount = Limit\n\tRatio = 1.5\n\tPtr = &Config{}\n\tN, Err = Pair()\n\tAlias = Default\n)\n",
        )]);
        let scope = PackageScope::new(&files);
        let var = |name: &str| {
            let (spec, i) = scope.vars[name];
            Resolve::variable(&scope, spec, i)
        };
        assert_eq!(var("Default"), "*Config");
        assert_eq!(var("Count"), "int");
        assert_eq!(var("Ratio"), "float64");
        assert_eq!(var("Ptr"), "*Config");
        assert_eq!(var("N"), "int");
        assert_eq!(var("Err"), "error");
        assert_eq!(var("Alias"), "*Config");
    }

    #[test]
    fn reports_declaration_problems() {
        let files = parse(&[
            ("a.go", "package demo\ntype T struct{ Name string }\nfunc F() {}\n"),
            (
                "b.go",
                "package demo\nfunc F() {}\nfunc (m *Missing) M() {}\nfunc (t T) Name() string { return \"\" }\nvar X Unknown\n",
            ),
        ]);
        let problems = PackageScope::new(&files).check();
        assert_eq!(problems.len(), 4, "{problems:#?}");
        assert!(problems[0].starts_with("b.go:2:6: F redeclared"));
        assert!(problems.iter().any(|p| p.contains("undefined: Missing")));
        assert!(problems.iter().any(|p| p.contains("field and method with the same name Name")));
        assert!(problems.iter().any(|p| p.contains("undefined: Unknown")));
    }

    #[test]
    fn dot_imports_suspend_reference_checks() {
        let files = parse(&[("a.go", "package demo\nimport . \"strings\"\nvar B Builder\n")]);
        assert!(PackageScope::new(&files).check().is_empty());
    }

    #[test]
    fn generic_parameters_are_in_scope() {
        let files = parse(&[(
            "a.go",
            "package demo\ntype Box[T any] struct{ V T }\nfunc (b *Box[T]) Get() T { return b.V }\nfunc Map[K comparable, V any](m map[K]V) []V { return nil }\n",
        )]);
        assert!(PackageScope::new(&files).check().is_empty());
    }
}
