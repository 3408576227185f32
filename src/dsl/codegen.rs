use super::ast::{self, BinaryOp, Expr, ExprKind, Script, Stmt, StmtKind};
use super::env::CompilerEnvironment;
use super::error::CompileError;
use super::ir::*;
use super::span::Span;
use super::symbol::SymbolTable;
use super::types::{PrimitiveType, StackType, Value};
use crate::settings::GlobalDomain;

/// Translate a checked script into blocks, locals and switch tables.
pub fn generate_script(
    script: &Script,
    symbols: &SymbolTable<'_>,
    env: &CompilerEnvironment,
) -> Result<BinaryScript, CompileError> {
    let mut generator = CodeGenerator {
        symbols,
        env,
        labels: LabelGenerator::default(),
        blocks: BlockList::default(),
        switch_tables: Vec::new(),
        locals: LocalMap::default(),
        loops: Vec::new(),
    };
    generator.script(script)?;
    Ok(BinaryScript {
        name: script.full_name(),
        blocks: generator.blocks,
        switch_tables: generator.switch_tables,
        locals: generator.locals,
    })
}

struct CodeGenerator<'a, 'p> {
    symbols: &'a SymbolTable<'p>,
    env: &'a CompilerEnvironment,
    labels: LabelGenerator,
    blocks: BlockList,
    switch_tables: Vec<SwitchTable>,
    locals: LocalMap,
    /// `(continue target, break target)` of each enclosing loop.
    loops: Vec<(Label, Label)>,
}

fn stack_of(ty: PrimitiveType, span: Span) -> Result<StackType, CompileError> {
    ty.stack_type()
        .ok_or_else(|| CompileError::internal(format!("Type {ty} has no stack"), span))
}

fn resolved_local(local: Option<&ast::Local>, span: Span) -> Result<&ast::Local, CompileError> {
    local.ok_or_else(|| CompileError::internal("Local variable was not resolved", span))
}

impl CodeGenerator<'_, '_> {
    // ── Blocks ───────────────────────────────────────────────────

    /// Start a new block; following instructions go into it.
    fn bind(&mut self, label: Label) {
        self.blocks.push(Block::new(label));
    }

    fn ends_flow(&self) -> bool {
        self.blocks.blocks.last().is_some_and(Block::ends_flow)
    }

    fn emit_instruction(&mut self, instruction: Instruction) {
        // code after an unconditional transfer starts a block of its own
        if self.blocks.is_empty() || self.ends_flow() {
            let label = self.labels.generate("unreachable");
            self.bind(label);
        }
        if let Some(block) = self.blocks.blocks.last_mut() {
            block.instructions.push(instruction);
        }
    }

    fn emit(&mut self, opcode: CoreOpcode, operand: Operand) {
        self.emit_instruction(Instruction::new(opcode, operand));
    }

    fn branch(&mut self, opcode: CoreOpcode, target: &Label) {
        self.emit(opcode, Operand::Label(target.clone()));
    }

    fn push_int(&mut self, value: i32) {
        self.emit(CoreOpcode::PushIntConstant, Operand::Int(value));
    }

    fn push_bool(&mut self, value: bool) {
        self.emit(CoreOpcode::PushIntConstant, Operand::Bool(value));
    }

    fn push_value(&mut self, value: &Value) {
        match value {
            Value::Int(v) => self.push_int(*v),
            Value::Bool(b) => self.push_bool(*b),
            Value::Long(v) => self.emit(CoreOpcode::PushLongConstant, Operand::Long(*v)),
            Value::String(s) => self.emit(CoreOpcode::PushStringConstant, Operand::Str(s.clone())),
            Value::Type(t) => self.push_int(u32::from(t.code()) as i32),
        }
    }

    // ── Scripts ──────────────────────────────────────────────────

    fn script(&mut self, script: &Script) -> Result<(), CompileError> {
        let entry = self.labels.generate("entry");
        self.bind(entry);
        for param in &script.params {
            let local = resolved_local(param.local.as_ref(), param.span)?;
            self.locals.register_param(stack_of(local.ty, param.span)?, local.clone());
        }
        for stmt in &script.body.statements {
            self.statement(stmt)?;
        }
        if !self.ends_flow() {
            for ty in script.returns.flatten() {
                let value = ty
                    .default_value()
                    .ok_or_else(|| CompileError::internal(format!("Type {ty} has no default value"), script.span))?;
                self.push_value(&value);
            }
            self.emit(CoreOpcode::Return, Operand::Int(0));
        }
        Ok(())
    }

    // ── Statements ───────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    fn statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Block(block) => {
                for inner in &block.statements {
                    self.statement(inner)?;
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let if_true = self.labels.generate("if_true");
                let if_else = else_branch.as_ref().map(|_| self.labels.generate("if_else"));
                let if_end = self.labels.generate("if_end");
                self.condition(condition, &if_true, if_else.as_ref().unwrap_or(&if_end))?;
                self.bind(if_true);
                self.statement(then_branch)?;
                if let (Some(if_else), Some(else_branch)) = (if_else, else_branch) {
                    if !self.ends_flow() {
                        self.branch(CoreOpcode::Branch, &if_end);
                    }
                    self.bind(if_else);
                    self.statement(else_branch)?;
                }
                self.bind(if_end);
            }
            StmtKind::While { condition, body } => {
                let start = self.labels.generate("while_start");
                let body_label = self.labels.generate("while_body");
                let end = self.labels.generate("while_end");
                self.bind(start.clone());
                self.condition(condition, &body_label, &end)?;
                self.bind(body_label);
                self.loops.push((start.clone(), end.clone()));
                let result = self.statement(body);
                self.loops.pop();
                result?;
                if !self.ends_flow() {
                    self.branch(CoreOpcode::Branch, &start);
                }
                self.bind(end);
            }
            StmtKind::Continue | StmtKind::Break => {
                let (start, end) = self
                    .loops
                    .last()
                    .cloned()
                    .ok_or_else(|| CompileError::internal("Loop control outside of a loop", stmt.span))?;
                let target = if matches!(stmt.kind, StmtKind::Continue) { start } else { end };
                self.branch(CoreOpcode::Branch, &target);
            }
            StmtKind::Return(values) => {
                for value in values {
                    self.expression(value)?;
                }
                self.emit(CoreOpcode::Return, Operand::Int(0));
            }
            StmtKind::Declare { ty, init, local, .. } => {
                let local = resolved_local(local.as_ref(), stmt.span)?;
                let stack = stack_of(*ty, stmt.span)?;
                match init {
                    Some(init) => self.expression(init)?,
                    None => {
                        let value = ty
                            .default_value()
                            .ok_or_else(|| CompileError::internal(format!("Type {ty} has no default value"), stmt.span))?;
                        self.push_value(&value);
                    }
                }
                self.locals.register_variable(stack, local.clone());
                self.emit(CoreOpcode::pop_local(stack), Operand::Local(local.clone()));
            }
            StmtKind::DeclareArray { ty, size, array, .. } => {
                let slot = array.ok_or_else(|| CompileError::internal("Array slot was not assigned", stmt.span))?;
                self.expression(size)?;
                let code = i32::try_from(u32::from(ty.code()))
                    .map_err(|_| CompileError::internal(format!("Type {ty} cannot be stored in an array"), stmt.span))?;
                self.emit(CoreOpcode::DefineArray, Operand::Int((i32::from(slot) << 16) | code));
            }
            StmtKind::Assign { targets, values } => {
                if let [target @ Expr {
                    kind: ExprKind::ArrayElement { index, array, .. },
                    ..
                }] = targets.as_slice()
                {
                    let slot = array.ok_or_else(|| CompileError::internal("Array slot was not assigned", target.span))?;
                    self.expression(index)?;
                    for value in values {
                        self.expression(value)?;
                    }
                    self.emit(CoreOpcode::PopArrayInt, Operand::Int(i32::from(slot)));
                    return Ok(());
                }
                for value in values {
                    self.expression(value)?;
                }
                for target in targets.iter().rev() {
                    self.store(target)?;
                }
            }
            StmtKind::Switch(switch) => self.switch(switch)?,
            StmtKind::Expr(expr) => {
                self.expression(expr)?;
                for ty in expr.ty.flatten().into_iter().rev() {
                    self.emit(CoreOpcode::discard(stack_of(ty, expr.span)?), Operand::Int(0));
                }
            }
        }
        Ok(())
    }

    /// Pop the top of the stack into an assignment target.
    fn store(&mut self, target: &Expr) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Local { local, .. } => {
                let local = resolved_local(local.as_ref(), target.span)?;
                let stack = stack_of(local.ty, target.span)?;
                self.emit(CoreOpcode::pop_local(stack), Operand::Local(local.clone()));
            }
            ExprKind::Global { name } => {
                let info = self
                    .symbols
                    .lookup_global(&name.text)
                    .cloned()
                    .ok_or_else(|| CompileError::internal(format!("Unknown global {}", name.text), target.span))?;
                let opcode = match info.domain {
                    GlobalDomain::Player => CoreOpcode::PopVarp,
                    GlobalDomain::PlayerBit => CoreOpcode::PopVarpBit,
                    GlobalDomain::ClientInt => CoreOpcode::PopVarcInt,
                    GlobalDomain::ClientString => CoreOpcode::PopVarcString,
                };
                self.emit(opcode, Operand::Int(info.id));
            }
            _ => return Err(CompileError::internal("Expression is not assignable", target.span)),
        }
        Ok(())
    }

    fn switch(&mut self, switch: &ast::Switch) -> Result<(), CompileError> {
        self.expression(&switch.condition)?;
        let index = self.switch_tables.len();
        self.switch_tables.push(SwitchTable::default());
        self.emit(CoreOpcode::Switch, Operand::Switch(index));

        let end = self.labels.generate("switch_end");
        let default = switch.default.as_ref().map(|_| self.labels.generate("switch_default"));
        self.branch(CoreOpcode::Branch, default.as_ref().unwrap_or(&end));

        let mut table = SwitchTable::default();
        for case in &switch.cases {
            let label = self.labels.generate("switch_case");
            table.cases.push(SwitchCase {
                keys: case.key_values.clone(),
                label: label.clone(),
            });
            self.bind(label);
            for stmt in &case.body.statements {
                self.statement(stmt)?;
            }
            if !self.ends_flow() {
                self.branch(CoreOpcode::Branch, &end);
            }
        }
        if let (Some(label), Some(case)) = (default, &switch.default) {
            table.cases.push(SwitchCase {
                keys: Vec::new(),
                label: label.clone(),
            });
            self.bind(label);
            for stmt in &case.body.statements {
                self.statement(stmt)?;
            }
        }
        self.bind(end);
        if let Some(slot) = self.switch_tables.get_mut(index) {
            *slot = table;
        }
        Ok(())
    }

    // ── Conditions ───────────────────────────────────────────────

    /// Branch to `if_true` or `if_false` depending on `expr`.
    fn condition(&mut self, expr: &Expr, if_true: &Label, if_false: &Label) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                let next = self.labels.generate("or_else");
                self.condition(lhs, if_true, &next)?;
                self.bind(next);
                self.condition(rhs, if_true, if_false)
            }
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let next = self.labels.generate("and_next");
                self.condition(lhs, &next, if_false)?;
                self.bind(next);
                self.condition(rhs, if_true, if_false)
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_relational() || op.is_equality() => {
                self.expression(lhs)?;
                self.expression(rhs)?;
                let long = lhs.ty.primitive() == Some(PrimitiveType::Long);
                self.branch(comparison_branch(*op, long), if_true);
                self.branch(CoreOpcode::Branch, if_false);
                Ok(())
            }
            _ => {
                self.expression(expr)?;
                self.branch(CoreOpcode::BranchIfTrue, if_true);
                self.branch(CoreOpcode::Branch, if_false);
                Ok(())
            }
        }
    }

    // ── Expressions ──────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    fn expression(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Int(v) | ExprKind::Coordgrid(v) => self.push_int(*v),
            ExprKind::Bool(b) => self.push_bool(*b),
            ExprKind::Long(v) => self.emit(CoreOpcode::PushLongConstant, Operand::Long(*v)),
            ExprKind::Str(s) => self.emit(CoreOpcode::PushStringConstant, Operand::Str(s.clone())),
            ExprKind::Null => {
                let ty = expr
                    .ty
                    .primitive()
                    .ok_or_else(|| CompileError::internal("Untyped null", expr.span))?;
                match stack_of(ty, expr.span)? {
                    StackType::Int => self.push_int(-1),
                    StackType::String => self.emit(CoreOpcode::PushStringConstant, Operand::Str(String::new())),
                    StackType::Long => self.emit(CoreOpcode::PushLongConstant, Operand::Long(-1)),
                }
            }
            ExprKind::Local { local, .. } => {
                let local = resolved_local(local.as_ref(), expr.span)?;
                let stack = stack_of(local.ty, expr.span)?;
                self.emit(CoreOpcode::push_local(stack), Operand::Local(local.clone()));
            }
            ExprKind::ArrayElement { index, array, .. } => {
                let slot = array.ok_or_else(|| CompileError::internal("Array slot was not assigned", expr.span))?;
                self.expression(index)?;
                self.emit(CoreOpcode::PushArrayInt, Operand::Int(i32::from(slot)));
            }
            ExprKind::Global { name } => {
                let info = self
                    .symbols
                    .lookup_global(&name.text)
                    .cloned()
                    .ok_or_else(|| CompileError::internal(format!("Unknown global {}", name.text), expr.span))?;
                let opcode = match info.domain {
                    GlobalDomain::Player => CoreOpcode::PushVarp,
                    GlobalDomain::PlayerBit => CoreOpcode::PushVarpBit,
                    GlobalDomain::ClientInt => CoreOpcode::PushVarcInt,
                    GlobalDomain::ClientString => CoreOpcode::PushVarcString,
                };
                self.emit(opcode, Operand::Int(info.id));
            }
            ExprKind::Constant { name } => {
                let value = self
                    .symbols
                    .lookup_constant(&name.text)
                    .map(|info| info.value.clone())
                    .ok_or_else(|| CompileError::internal(format!("Unknown constant {}", name.text), expr.span))?;
                self.push_value(&value);
            }
            ExprKind::Dynamic { config: Some(id), .. } => self.push_int(*id),
            ExprKind::Dynamic { name, config: None } => self.command(name, &[], false, expr.span)?,
            ExprKind::Command {
                name,
                args,
                alternative,
            } => self.command(name, args, *alternative, expr.span)?,
            ExprKind::Call { trigger, name, args } => {
                let id = self.symbols.lookup_script(trigger, &name.text).map(|info| info.id).ok_or_else(|| {
                    CompileError::internal(format!("Unknown script [{trigger},{}]", name.text), expr.span)
                })?;
                let opcode = self
                    .env
                    .lookup(trigger)
                    .and_then(|t| t.call)
                    .ok_or_else(|| CompileError::internal(format!("Scripts of {trigger} cannot be called"), expr.span))?;
                for arg in args {
                    self.expression(arg)?;
                }
                self.emit(
                    opcode,
                    Operand::Script(ScriptRef {
                        trigger: trigger.clone(),
                        name: name.text.clone(),
                        id,
                    }),
                );
            }
            ExprKind::Hook(None) => self.emit(CoreOpcode::PushStringConstant, Operand::Str(String::new())),
            ExprKind::Hook(Some(hook)) => {
                let id = self
                    .symbols
                    .lookup_script("clientscript", &hook.name.text)
                    .map(|info| info.id)
                    .ok_or_else(|| CompileError::internal(format!("Unknown clientscript {}", hook.name.text), expr.span))?;
                self.push_int(id);
                let mut signature = String::new();
                for arg in &hook.args {
                    self.expression(arg)?;
                    signature.extend(arg.ty.flatten().into_iter().map(PrimitiveType::code));
                }
                self.emit(CoreOpcode::PushStringConstant, Operand::Str(signature));
            }
            ExprKind::Concat(parts) => {
                for part in parts {
                    self.expression(part)?;
                }
                let count = i32::try_from(parts.len())
                    .map_err(|_| CompileError::internal("Too many string parts", expr.span))?;
                self.emit(CoreOpcode::JoinString, Operand::Int(count));
            }
            ExprKind::Calc(inner) => self.expression(inner)?,
            ExprKind::Binary { op, lhs, rhs } if op.is_arithmetic() => {
                self.expression(lhs)?;
                self.expression(rhs)?;
                self.emit(arithmetic_opcode(*op), Operand::Int(0));
            }
            ExprKind::Binary { .. } => {
                // materialize the condition as 1 or 0
                let if_true = self.labels.generate("cond_true");
                let if_false = self.labels.generate("cond_false");
                let end = self.labels.generate("cond_end");
                self.condition(expr, &if_true, &if_false)?;
                self.bind(if_true);
                self.push_int(1);
                self.branch(CoreOpcode::Branch, &end);
                self.bind(if_false);
                self.push_int(0);
                self.bind(end);
            }
            ExprKind::Error => return Err(CompileError::internal("Error node reached code generation", expr.span)),
        }
        Ok(())
    }

    fn command(&mut self, name: &ast::Ident, args: &[Expr], alternative: bool, span: Span) -> Result<(), CompileError> {
        let opcode = self
            .symbols
            .lookup_command(&name.text)
            .map(|info| Opcode::Command {
                name: info.name.clone(),
                code: info.opcode,
            })
            .ok_or_else(|| CompileError::internal(format!("Unknown command {}", name.text), span))?;
        for arg in args {
            self.expression(arg)?;
        }
        self.emit_instruction(Instruction {
            opcode,
            operand: Operand::Int(i32::from(alternative)),
        });
        Ok(())
    }
}

fn arithmetic_opcode(op: BinaryOp) -> CoreOpcode {
    match op {
        BinaryOp::Sub => CoreOpcode::Sub,
        BinaryOp::Mul => CoreOpcode::Mul,
        BinaryOp::Div => CoreOpcode::Div,
        BinaryOp::Mod => CoreOpcode::Mod,
        _ => CoreOpcode::Add,
    }
}

fn comparison_branch(op: BinaryOp, long: bool) -> CoreOpcode {
    use CoreOpcode::*;
    match (op, long) {
        (BinaryOp::Equals, false) => BranchEquals,
        (BinaryOp::Equals, true) => LongBranchEquals,
        (BinaryOp::NotEquals, false) => BranchNot,
        (BinaryOp::NotEquals, true) => LongBranchNot,
        (BinaryOp::LessThan, false) => BranchLessThan,
        (BinaryOp::LessThan, true) => LongBranchLessThan,
        (BinaryOp::GreaterThan, false) => BranchGreaterThan,
        (BinaryOp::GreaterThan, true) => LongBranchGreaterThan,
        (BinaryOp::LessThanOrEqual, false) => BranchLessThanOrEquals,
        (BinaryOp::LessThanOrEqual, true) => LongBranchLessThanOrEquals,
        (_, false) => BranchGreaterThanOrEquals,
        (_, true) => LongBranchGreaterThanOrEquals,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::dsl::parser::parse_scripts;
    use crate::dsl::precheck::define_scripts;
    use crate::dsl::symbol::CommandInfo;
    use crate::dsl::tokenizer::LexicalTable;
    use crate::dsl::typeck::check_script;

    /// Parse, check and generate every script of `src`.
    pub(crate) fn compile_str(src: &str) -> Vec<BinaryScript> {
        let table = LexicalTable::scripts();
        let env = CompilerEnvironment::default();
        let mut symbols = SymbolTable::new();
        symbols.define_command(CommandInfo {
            name: "tostring".into(),
            opcode: 4106,
            args: vec![PrimitiveType::Int],
            returns: PrimitiveType::String.into(),
            alternative: false,
        });
        symbols.define_command(CommandInfo {
            name: "clock".into(),
            opcode: 3300,
            args: Vec::new(),
            returns: PrimitiveType::Int.into(),
            alternative: false,
        });
        let (mut file, errors) = parse_scripts(src, &table, &env, Some(&symbols));
        assert!(errors.is_empty(), "{errors:?}");
        let mut errors = Vec::new();
        define_scripts(&file, &env, &mut symbols, &mut errors);
        for script in &mut file.scripts {
            errors.extend(check_script(script, &symbols, 5));
        }
        assert!(errors.is_empty(), "{errors:?}");
        file.scripts
            .iter()
            .map(|s| generate_script(s, &symbols, &env).unwrap())
            .collect()
    }

    fn opcodes(script: &BinaryScript) -> Vec<String> {
        script.instructions().map(|i| i.opcode.to_string()).collect()
    }

    #[test]
    fn calc_with_parameter() {
        let scripts = compile_str("[proc,test](int $parameter)(int) return(calc(1 + $parameter * 5));");
        assert_eq!(
            opcodes(&scripts[0]),
            ["PUSH_INT_CONSTANT", "PUSH_INT_LOCAL", "PUSH_INT_CONSTANT", "MUL", "ADD", "RETURN"]
        );
        assert_eq!(scripts[0].locals.param_count(StackType::Int), 1);
        assert_eq!(scripts[0].name, "[proc,test]");
    }

    #[test]
    fn missing_return_gets_defaults() {
        let scripts = compile_str("[proc,a](int, string) def_int $x = 1;");
        let ops = opcodes(&scripts[0]);
        assert_eq!(
            ops,
            ["PUSH_INT_CONSTANT", "POP_INT_LOCAL", "PUSH_INT_CONSTANT", "PUSH_STRING_CONSTANT", "RETURN"]
        );
        assert_eq!(scripts[0].locals.local_count(StackType::Int), 1);
    }

    #[test]
    fn if_else_blocks() {
        let scripts = compile_str("[proc,a](int $v)(int) if ($v = 1) { return(1); } else { return(2); }");
        let names: Vec<&str> = scripts[0].blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert_eq!(names, ["entry", "if_true", "if_else", "if_end"]);
        let entry = &scripts[0].blocks.blocks[0];
        assert!(entry.instructions[2].is(CoreOpcode::BranchEquals));
        assert_eq!(entry.instructions[2].label().unwrap().name, "if_true");
        assert!(entry.ends_flow());
    }

    #[test]
    fn while_loop_branches_back() {
        let scripts = compile_str("[proc,a] def_int $i = 0; while ($i < 3) { $i = calc($i + 1); }");
        let script = &scripts[0];
        let body = script.blocks.blocks.iter().find(|b| b.label.name == "while_body").unwrap();
        assert_eq!(body.last().unwrap().label().unwrap().name, "while_start");
        assert!(script.blocks.blocks.last().unwrap().last().unwrap().is(CoreOpcode::Return));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let scripts = compile_str("[proc,a](int $x) if ($x > 1 & $x < 5 | $x = 9) { return; }");
        let names: Vec<&str> = scripts[0].blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert!(names.contains(&"and_next"));
        assert!(names.contains(&"or_else"));
    }

    #[test]
    fn switch_table() {
        let scripts = compile_str(
            "[proc,a](int $v)(int) switch_int ($v) { case 1, 2: return(10); case 3: return(30); case default: return(0); }",
        );
        let script = &scripts[0];
        assert_eq!(script.switch_tables.len(), 1);
        let table = &script.switch_tables[0];
        assert_eq!(table.cases[0].keys, vec![1, 2]);
        assert_eq!(table.entry_count(), 3);
        assert_eq!(table.default_case().unwrap().label.name, "switch_default");
        let entry = &script.blocks.blocks[0];
        assert!(entry.instructions[1].is(CoreOpcode::Switch));
        assert_eq!(entry.instructions[2].label().unwrap().name, "switch_default");
    }

    #[test]
    fn commands_and_discards() {
        let scripts = compile_str("[proc,a] tostring(clock);");
        let ops = opcodes(&scripts[0]);
        assert_eq!(ops, ["clock", "tostring", "POP_STRING_DISCARD", "RETURN"]);
    }

    #[test]
    fn boolean_value_materializes() {
        let scripts = compile_str("[proc,a](int $x)(boolean) return($x = 2);");
        let names: Vec<&str> = scripts[0].blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert_eq!(names, ["entry", "cond_true", "cond_false", "cond_end"]);
        let last = scripts[0].blocks.blocks.last().unwrap();
        assert!(last.last().unwrap().is(CoreOpcode::Return));
    }

    #[test]
    fn boolean_literals_keep_their_operand() {
        let scripts = compile_str("[proc,a](boolean) return(true);\n[proc,b](boolean) def_int $x = 1;");
        let first = scripts[0].instructions().next().unwrap();
        assert!(first.is(CoreOpcode::PushIntConstant));
        assert_eq!(first.operand, Operand::Bool(true));
        // default return value of a boolean script
        let defaults: Vec<&Operand> = scripts[1].instructions().map(|i| &i.operand).collect();
        assert!(defaults.contains(&&Operand::Bool(false)), "{defaults:?}");
    }

    #[test]
    fn labels_restart_for_each_script() {
        let scripts = compile_str("[proc,a](int $v) if ($v = 1) { return; }\n[proc,b](int $v) if ($v = 2) { return; }");
        for script in &scripts {
            let entry = &script.blocks.blocks[0].label;
            assert_eq!((entry.name.as_str(), entry.id), ("entry", 0));
        }
        let ids = |s: &BinaryScript| s.blocks.iter().map(|b| b.label.id).collect::<Vec<_>>();
        assert_eq!(ids(&scripts[0]), ids(&scripts[1]));
    }

    #[test]
    fn gosub_carries_script_ref() {
        let scripts = compile_str("[proc,a] ~b(1);\n[proc,b](int $v)");
        let call = scripts[0].instructions().find(|i| i.is(CoreOpcode::GosubWithParams)).unwrap();
        let Operand::Script(target) = &call.operand else { panic!() };
        assert_eq!((target.name.as_str(), target.id), ("b", 1));
    }

    #[test]
    fn code_after_return_is_separated() {
        let scripts = compile_str("[proc,a] return; def_int $x = 1;");
        let blocks = &scripts[0].blocks.blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].label.name, "unreachable");
        assert_eq!(blocks[0].instructions.len(), 1);
    }

    #[test]
    fn array_store_pushes_index_first() {
        let scripts = compile_str("[proc,a] def_int $arr(4); $arr(1) = 7;");
        let ops = opcodes(&scripts[0]);
        assert_eq!(
            ops,
            ["PUSH_INT_CONSTANT", "DEFINE_ARRAY", "PUSH_INT_CONSTANT", "PUSH_INT_CONSTANT", "POP_ARRAY_INT", "RETURN"]
        );
        let define = scripts[0].instructions().nth(1).unwrap();
        assert_eq!(define.operand, Operand::Int(i32::from(b'i')));
    }

    const DECLARABLE: [(&str, &str); 3] = [("int", "0"), ("string", "\"\""), ("long", "0L")];

    proptest::proptest! {
        #[test]
        fn local_slots_are_unique(
            params in proptest::collection::vec(0..3usize, 0..4),
            locals in proptest::collection::vec((0..3usize, proptest::bool::ANY), 0..10),
        ) {
            let header: Vec<String> = params
                .iter()
                .enumerate()
                .map(|(i, &t)| format!("{} $p{i}", DECLARABLE[t].0))
                .collect();
            let mut src = String::from("[proc,p]");
            if !header.is_empty() {
                src.push_str(&format!("({})", header.join(", ")));
            }
            for (i, &(t, nested)) in locals.iter().enumerate() {
                let (ty, value) = DECLARABLE[t];
                let decl = format!("def_{ty} $v{i} = {value};");
                if nested {
                    src.push_str(&format!("if (true) {{ {decl} }}"));
                } else {
                    src.push_str(&decl);
                }
            }
            let scripts = compile_str(&src);
            let map = &scripts[0].locals;
            for stack in StackType::ALL {
                let params = map.params(stack);
                let mut slots: Vec<usize> = params
                    .iter()
                    .chain(map.variables(stack))
                    .map(|l| map.slot(l).unwrap())
                    .collect();
                let count = slots.len();
                proptest::prop_assert_eq!(count, map.local_count(stack));
                for (i, local) in map.variables(stack).iter().enumerate() {
                    proptest::prop_assert_eq!(map.slot(local), Some(params.len() + i));
                }
                slots.sort_unstable();
                slots.dedup();
                proptest::prop_assert_eq!(slots.len(), count);
            }
        }
    }
}
