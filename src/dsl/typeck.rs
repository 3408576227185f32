use super::ast::*;
use super::error::CompileError;
use super::scope::{ArrayTable, Scope};
use super::span::Span;
use super::symbol::SymbolTable;
use super::types::{PrimitiveType, StackType, Type};

/// Check a script whose signature is already in `symbols`, annotating the
/// tree with types, locals, array slots and case keys. Every recoverable
/// problem is returned; running out of array slots stops the script.
pub fn check_script(script: &mut Script, symbols: &SymbolTable<'_>, array_capacity: usize) -> Vec<CompileError> {
    let mut checker = TypeChecker {
        symbols,
        arrays: ArrayTable::new(array_capacity),
        errors: Vec::new(),
        next_local: 0,
        returns: script.returns.flatten(),
        loop_depth: 0,
    };
    if let Err(fatal) = checker.script(script) {
        checker.errors.push(fatal);
    }
    checker.errors
}

struct TypeChecker<'a, 'p> {
    symbols: &'a SymbolTable<'p>,
    arrays: ArrayTable,
    errors: Vec<CompileError>,
    next_local: u32,
    returns: Vec<PrimitiveType>,
    loop_depth: usize,
}

fn type_list(types: &[PrimitiveType]) -> String {
    let names: Vec<String> = types.iter().map(ToString::to_string).collect();
    names.join(", ")
}

fn types_match(expected: &[PrimitiveType], actual: &[PrimitiveType]) -> bool {
    expected.len() == actual.len() && expected.iter().zip(actual).all(|(e, a)| e.implicit_equals(*a))
}

impl TypeChecker<'_, '_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(CompileError::semantic(message, span));
    }

    /// Report a mismatch unless either side is already unresolved.
    fn expect(&mut self, expected: &Type, actual: &Type, span: Span) -> bool {
        if expected.is_undefined() || actual.is_undefined() {
            return false;
        }
        if !expected.implicit_equals(actual) {
            self.error(format!("Type mismatch: cannot convert from {actual} to {expected}"), span);
            return false;
        }
        true
    }

    fn new_local(&mut self, name: &str, ty: PrimitiveType) -> Local {
        let id = self.next_local;
        self.next_local += 1;
        Local {
            id,
            name: name.to_string(),
            ty,
        }
    }

    // ── Declarations ─────────────────────────────────────────────

    fn script(&mut self, script: &mut Script) -> Result<(), CompileError> {
        let mut seen: Vec<&str> = Vec::new();
        for annotation in &script.annotations {
            if seen.contains(&annotation.name.text.as_str()) {
                self.error(format!("Duplicate annotation: {}", annotation.name.text), annotation.span);
            } else {
                seen.push(&annotation.name.text);
            }
        }

        let mut scope = Scope::new();
        for param in &mut script.params {
            let local = self.new_local(&param.name.text, param.ty);
            if !scope.declare(local.clone()) {
                self.error(format!("Duplicate local variable {}", param.name.text), param.name.span);
            }
            param.local = Some(local);
        }
        self.statements(&mut script.body.statements, &mut scope)
    }

    // ── Statements ───────────────────────────────────────────────

    fn statements(&mut self, statements: &mut [Stmt], scope: &mut Scope<'_>) -> Result<(), CompileError> {
        for stmt in statements {
            self.statement(stmt, scope)?;
        }
        Ok(())
    }

    /// A statement in a scope of its own (branch and loop bodies).
    fn nested(&mut self, stmt: &mut Stmt, scope: &Scope<'_>) -> Result<(), CompileError> {
        let mut inner = scope.child();
        self.statement(stmt, &mut inner)
    }

    fn statement(&mut self, stmt: &mut Stmt, scope: &mut Scope<'_>) -> Result<(), CompileError> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Block(block) => {
                let mut inner = scope.child();
                self.statements(&mut block.statements, &mut inner)?;
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.condition(condition, scope);
                self.nested(then_branch, scope)?;
                if let Some(else_branch) = else_branch {
                    self.nested(else_branch, scope)?;
                }
            }
            StmtKind::While { condition, body } => {
                self.condition(condition, scope);
                self.loop_depth += 1;
                let result = self.nested(body, scope);
                self.loop_depth -= 1;
                result?;
            }
            StmtKind::Continue => self.loop_control("continue", span),
            StmtKind::Break => self.loop_control("break", span),
            StmtKind::Return(values) => {
                let expected = self.returns.clone();
                if let Some(actual) = self.expression_list(values, scope, &expected) {
                    if !types_match(&expected, &actual) {
                        self.error(
                            format!(
                                "Type mismatch: cannot convert from {} to {}",
                                Type::from_flat(actual),
                                Type::from_flat(expected)
                            ),
                            span,
                        );
                    }
                }
            }
            StmtKind::Declare { ty, name, init, local } => {
                if !ty.is_declarable() {
                    self.error(format!("Illegal type: {ty}"), span);
                }
                if let Some(init) = init {
                    let actual = self.expression(init, scope, Some(*ty));
                    self.expect(&Type::from(*ty), &actual, init.span);
                }
                let declared = self.new_local(&name.text, *ty);
                if !scope.declare(declared.clone()) {
                    self.error(format!("Duplicate local variable {}", name.text), name.span);
                }
                *local = Some(declared);
            }
            StmtKind::DeclareArray { ty, name, size, array } => {
                if !ty.is_arrayable() {
                    self.error(format!("Illegal array type: {ty}"), span);
                }
                let actual = self.expression(size, scope, Some(PrimitiveType::Int));
                self.expect(&Type::from(PrimitiveType::Int), &actual, size.span);
                match self.arrays.define(&name.text, *ty, name.span)? {
                    Some(slot) => *array = Some(slot),
                    None => self.error(format!("Duplicate array {}", name.text), name.span),
                }
            }
            StmtKind::Assign { targets, values } => {
                if targets.len() > 1 && targets.iter().any(|t| matches!(t.kind, ExprKind::ArrayElement { .. })) {
                    self.error("Array elements must be assigned on their own", span);
                }
                let mut expected = Vec::with_capacity(targets.len());
                let mut resolved = true;
                for target in targets.iter_mut() {
                    match self.expression(target, scope, None).primitive() {
                        Some(ty) if ty != PrimitiveType::Undefined => expected.push(ty),
                        _ => resolved = false,
                    }
                }
                let actual = self.expression_list(values, scope, &expected);
                if let (true, Some(actual)) = (resolved, actual) {
                    if !types_match(&expected, &actual) {
                        self.error(
                            format!(
                                "Type mismatch: cannot convert from {} to {}",
                                Type::from_flat(actual),
                                Type::from_flat(expected)
                            ),
                            span,
                        );
                    }
                }
            }
            StmtKind::Switch(switch) => self.switch(switch, scope)?,
            StmtKind::Expr(expr) => {
                self.expression(expr, scope, None);
            }
        }
        Ok(())
    }

    fn loop_control(&mut self, keyword: &str, span: Span) {
        if self.loop_depth == 0 {
            self.error(format!("{keyword} cannot be used outside of a loop"), span);
        }
    }

    fn condition(&mut self, expr: &mut Expr, scope: &Scope<'_>) {
        let actual = self.expression(expr, scope, Some(PrimitiveType::Boolean));
        self.expect(&Type::from(PrimitiveType::Boolean), &actual, expr.span);
    }

    fn switch(&mut self, switch: &mut Switch, scope: &Scope<'_>) -> Result<(), CompileError> {
        let ty = switch.ty;
        if ty.stack_type() != Some(StackType::Int) {
            self.error(format!("Illegal switch type: {ty}"), switch.condition.span);
        }
        let actual = self.expression(&mut switch.condition, scope, Some(ty));
        self.expect(&Type::from(ty), &actual, switch.condition.span);

        let mut seen: Vec<i32> = Vec::new();
        for case in &mut switch.cases {
            case.key_values.clear();
            for key in &mut case.keys {
                let actual = self.expression(key, scope, Some(ty));
                if !self.expect(&Type::from(ty), &actual, key.span) {
                    continue;
                }
                match self.constant_value(key) {
                    Some(value) if seen.contains(&value) => self.error("Duplicate case", key.span),
                    Some(value) => {
                        seen.push(value);
                        case.key_values.push(value);
                    }
                    None => self.error("Case keys must be known at compile-time", key.span),
                }
            }
            let mut inner = scope.child();
            self.statements(&mut case.body.statements, &mut inner)?;
        }
        if let Some(default) = &mut switch.default {
            let mut inner = scope.child();
            self.statements(&mut default.body.statements, &mut inner)?;
        }
        Ok(())
    }

    /// The integer a checked expression denotes at compile time, if any.
    fn constant_value(&self, expr: &Expr) -> Option<i32> {
        match &expr.kind {
            ExprKind::Int(v) | ExprKind::Coordgrid(v) => Some(*v),
            ExprKind::Bool(b) => Some(i32::from(*b)),
            ExprKind::Null => Some(-1),
            ExprKind::Constant { name } => self.symbols.lookup_constant(&name.text)?.value.as_int(),
            ExprKind::Dynamic { config, .. } => *config,
            _ => None,
        }
    }

    // ── Expressions ──────────────────────────────────────────────

    /// Check `values`, hinting each with the matching entry of `hints` when
    /// the counts line up. `None` if any value failed to resolve.
    fn expression_list(
        &mut self,
        values: &mut [Expr],
        scope: &Scope<'_>,
        hints: &[PrimitiveType],
    ) -> Option<Vec<PrimitiveType>> {
        let aligned = values.len() == hints.len();
        let mut types = Vec::new();
        let mut resolved = true;
        for (index, value) in values.iter_mut().enumerate() {
            let hint = if aligned { hints.get(index).copied() } else { None };
            let ty = self.expression(value, scope, hint);
            if ty.is_undefined() {
                resolved = false;
            }
            types.extend(ty.flatten());
        }
        resolved.then_some(types)
    }

    fn expression(&mut self, expr: &mut Expr, scope: &Scope<'_>, hint: Option<PrimitiveType>) -> Type {
        let ty = self.expression_kind(&mut expr.kind, expr.span, scope, hint);
        expr.ty = ty.clone();
        ty
    }

    #[allow(clippy::too_many_lines)]
    fn expression_kind(
        &mut self,
        kind: &mut ExprKind,
        span: Span,
        scope: &Scope<'_>,
        hint: Option<PrimitiveType>,
    ) -> Type {
        let symbols = self.symbols;
        match kind {
            ExprKind::Int(_) => PrimitiveType::Int.into(),
            ExprKind::Long(_) => PrimitiveType::Long.into(),
            ExprKind::Str(_) => PrimitiveType::String.into(),
            ExprKind::Bool(_) => PrimitiveType::Boolean.into(),
            ExprKind::Coordgrid(_) => PrimitiveType::Coordgrid.into(),
            ExprKind::Null => match hint.filter(|t| t.is_declarable()) {
                Some(ty) => ty.into(),
                None => {
                    self.error("Cannot infer the type of null", span);
                    Type::UNDEFINED
                }
            },
            ExprKind::Local { name, local } => match scope.lookup(&name.text) {
                Some(found) => {
                    *local = Some(found.clone());
                    found.ty.into()
                }
                None => {
                    self.error(format!("{} cannot be resolved to a variable", name.text), name.span);
                    Type::UNDEFINED
                }
            },
            ExprKind::ArrayElement { name, index, array } => {
                let actual = self.expression(index, scope, Some(PrimitiveType::Int));
                self.expect(&Type::from(PrimitiveType::Int), &actual, index.span);
                match self.arrays.lookup(&name.text) {
                    Some((slot, ty)) => {
                        *array = Some(slot);
                        ty.into()
                    }
                    None => {
                        self.error(format!("{} cannot be resolved to a variable", name.text), name.span);
                        Type::UNDEFINED
                    }
                }
            }
            ExprKind::Global { name } => match symbols.lookup_global(&name.text) {
                Some(info) => info.ty.into(),
                None => {
                    self.error(format!("{} cannot be resolved to a variable", name.text), name.span);
                    Type::UNDEFINED
                }
            },
            ExprKind::Constant { name } => match symbols.lookup_constant(&name.text) {
                Some(info) if info.ty.is_declarable() => info.ty.into(),
                Some(info) => {
                    self.error(format!("Illegal type: {}", info.ty), name.span);
                    Type::UNDEFINED
                }
                None => {
                    self.error(format!("{} cannot be resolved to a constant", name.text), name.span);
                    Type::UNDEFINED
                }
            },
            ExprKind::Dynamic { name, config } => {
                let by_config = symbols.lookup_config(&name.text);
                if let (Some(info), Some(expected)) = (by_config, hint) {
                    if info.ty == expected {
                        *config = Some(info.id);
                        return expected.into();
                    }
                }
                if let Some(command) = symbols.lookup_command(&name.text).filter(|c| c.args.is_empty()) {
                    return command.returns.clone();
                }
                match by_config {
                    Some(info) => {
                        *config = Some(info.id);
                        info.ty.into()
                    }
                    None => {
                        self.error(format!("{} cannot be resolved to a symbol", name.text), name.span);
                        Type::UNDEFINED
                    }
                }
            }
            ExprKind::Command {
                name,
                args,
                alternative,
            } => {
                let Some(info) = symbols.lookup_command(&name.text) else {
                    self.expression_list(args, scope, &[]);
                    self.error(format!("{} cannot be resolved to a symbol", name.text), name.span);
                    return Type::UNDEFINED;
                };
                if *alternative && !info.alternative {
                    self.error(format!("The command {} has no alternative form", name.text), name.span);
                }
                if let Some(actual) = self.expression_list(args, scope, &info.args) {
                    if !types_match(&info.args, &actual) {
                        self.error(
                            format!(
                                "The command {}({}) is not applicable for the arguments ({})",
                                name.text,
                                type_list(&info.args),
                                type_list(&actual)
                            ),
                            span,
                        );
                    }
                }
                info.returns.clone()
            }
            ExprKind::Call { trigger, name, args } => {
                let Some(info) = symbols.lookup_script(trigger, &name.text) else {
                    self.expression_list(args, scope, &[]);
                    self.error(
                        format!("Could not resolve {trigger} script with the name '{}'", name.text),
                        name.span,
                    );
                    return Type::UNDEFINED;
                };
                if let Some(actual) = self.expression_list(args, scope, &info.params) {
                    if !types_match(&info.params, &actual) {
                        self.error(
                            format!(
                                "The script [{trigger},{}]({}) is not applicable for the arguments ({})",
                                name.text,
                                type_list(&info.params),
                                type_list(&actual)
                            ),
                            span,
                        );
                    }
                }
                info.returns.clone()
            }
            ExprKind::Hook(None) => PrimitiveType::Hook.into(),
            ExprKind::Hook(Some(hook)) => {
                let Some(info) = symbols.lookup_script("clientscript", &hook.name.text) else {
                    self.expression_list(&mut hook.args, scope, &[]);
                    self.error(
                        format!("Could not resolve clientscript script with the name '{}'", hook.name.text),
                        hook.name.span,
                    );
                    return Type::UNDEFINED;
                };
                if let Some(actual) = self.expression_list(&mut hook.args, scope, &info.params) {
                    if !types_match(&info.params, &actual) {
                        self.error(
                            format!(
                                "The script [clientscript,{}]({}) is not applicable for the arguments ({})",
                                hook.name.text,
                                type_list(&info.params),
                                type_list(&actual)
                            ),
                            span,
                        );
                    }
                }
                PrimitiveType::Hook.into()
            }
            ExprKind::Concat(parts) => {
                let string = Type::from(PrimitiveType::String);
                for part in parts {
                    let actual = self.expression(part, scope, Some(PrimitiveType::String));
                    self.expect(&string, &actual, part.span);
                }
                string
            }
            ExprKind::Calc(inner) => {
                let int = Type::from(PrimitiveType::Int);
                let actual = self.expression(inner, scope, Some(PrimitiveType::Int));
                self.expect(&int, &actual, inner.span);
                int
            }
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, scope),
            ExprKind::Error => Type::UNDEFINED,
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &mut Expr, rhs: &mut Expr, scope: &Scope<'_>) -> Type {
        let boolean = Type::from(PrimitiveType::Boolean);
        if op.is_arithmetic() || op.is_logical() {
            let operand = if op.is_arithmetic() { PrimitiveType::Int } else { PrimitiveType::Boolean };
            let expected = Type::from(operand);
            for side in [lhs, rhs] {
                let actual = self.expression(side, scope, Some(operand));
                self.expect(&expected, &actual, side.span);
            }
            return expected;
        }

        let left = self.expression(lhs, scope, None);
        let right = self.expression(rhs, scope, left.primitive());
        let (Some(l), Some(r)) = (left.primitive(), right.primitive()) else {
            if !left.is_undefined() && !right.is_undefined() {
                self.undefined_operator(op, &left, &right, lhs.span.merge(rhs.span));
            }
            return boolean;
        };
        if l == PrimitiveType::Undefined || r == PrimitiveType::Undefined {
            return boolean;
        }
        let comparable = if op.is_relational() {
            (l.implicit_equals(PrimitiveType::Int) && r.implicit_equals(PrimitiveType::Int))
                || (l == PrimitiveType::Long && r == PrimitiveType::Long)
        } else {
            l.implicit_equals(r) && matches!(l.stack_type(), Some(StackType::Int | StackType::Long))
        };
        if !comparable {
            self.undefined_operator(op, &left, &right, lhs.span.merge(rhs.span));
        }
        boolean
    }

    fn undefined_operator(&mut self, op: BinaryOp, left: &Type, right: &Type, span: Span) {
        self.error(
            format!(
                "The operator {} is undefined for the argument type(s) {left}, {right}",
                op.symbol()
            ),
            span,
        );
    }
}
