use super::ast::*;
use super::env::CompilerEnvironment;
use super::error::CompileError;
use super::lexer::Lexer;
use super::span::Span;
use super::symbol::SymbolTable;
use super::tokenizer::{literal_chars, Kind, LexicalTable, Token, Tokenizer};
use super::types::{PrimitiveType, Type};

pub type ParseResult<T> = Result<T, CompileError>;

/// Parse a script source file. Declarations that fail to parse are reported
/// and skipped; the rest of the file is still parsed.
pub fn parse_scripts(
    source: &str,
    table: &LexicalTable,
    env: &CompilerEnvironment,
    symbols: Option<&SymbolTable<'_>>,
) -> (ScriptFile, Vec<CompileError>) {
    let mut parser = ScriptParser::new(source, table, env, symbols);
    let file = parser.scripts();
    (file, parser.finish())
}

// ── Parser base ──────────────────────────────────────────────────

/// Token access, error collection and span accumulation shared by the
/// script and config parsers.
pub struct ParserBase<'t> {
    lexer: Lexer<'t>,
    ranges: Vec<Span>,
    errors: Vec<CompileError>,
}

impl<'t> ParserBase<'t> {
    pub fn new(lexer: Lexer<'t>) -> Self {
        Self {
            lexer,
            ranges: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn peek(&mut self) -> &Token {
        self.lexer.peek()
    }

    pub fn peek_kind(&mut self, n: usize) -> Kind {
        self.lexer.peek_kind(n)
    }

    pub fn at_eof(&mut self) -> bool {
        self.lexer.is_eof()
    }

    /// Take the next token whatever it is, recording its span.
    pub fn take(&mut self) -> Token {
        let token = self.lexer.take();
        if let Some(top) = self.ranges.last_mut() {
            *top = top.merge(token.span);
        }
        token
    }

    /// Take the next token, which must be `expected`.
    pub fn consume(&mut self, expected: Kind) -> ParseResult<Token> {
        let found = self.peek_kind(0);
        if found == expected {
            Ok(self.take())
        } else {
            let span = self.peek().span;
            Err(CompileError::syntax(format!("Expected {expected:?}, got {found:?}"), span))
        }
    }

    pub fn consume_if(&mut self, expected: Kind) -> bool {
        if self.peek_kind(0) == expected {
            self.take();
            true
        } else {
            false
        }
    }

    pub fn push_range(&mut self) {
        self.ranges.push(Span::empty());
    }

    /// Close the innermost range, folding it into the enclosing one.
    pub fn pop_range(&mut self) -> Span {
        let span = self.ranges.pop().unwrap_or_default();
        if let Some(top) = self.ranges.last_mut() {
            *top = top.merge(span);
        }
        span
    }

    pub fn report(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'t> {
        &mut self.lexer
    }

    /// Skip to the next token of one of `kinds` (or the end of input).
    pub fn skip_until(&mut self, kinds: &[Kind]) {
        while !self.at_eof() && !kinds.contains(&self.peek_kind(0)) {
            self.lexer.take();
        }
    }

    /// Parser and lexer errors, in source order.
    pub fn finish(mut self) -> Vec<CompileError> {
        let mut errors = self.lexer.take_errors();
        errors.append(&mut self.errors);
        errors.sort_by_key(|e| e.span.start);
        errors
    }
}

pub(crate) fn parse_int(text: &str) -> Option<i32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|v| v as i32),
        None => text.parse().ok(),
    }
}

pub(crate) fn parse_long(text: &str) -> Option<i64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(|v| v as i64),
        None => text.parse().ok(),
    }
}

/// Pack `level_x_y_tx_ty` into its 32-bit form.
pub(crate) fn parse_coordgrid(text: &str) -> Result<i32, String> {
    const COMPONENTS: [(&str, i32); 5] = [
        ("level", 3),
        ("square-x", 127),
        ("square-y", 255),
        ("tile-x", 63),
        ("tile-y", 63),
    ];
    let parts: Vec<&str> = text.split('_').collect();
    if parts.len() != COMPONENTS.len() {
        return Err("Expected 5 components for literal of type coordgrid".to_string());
    }
    let mut values = [0i32; 5];
    for (index, (part, (name, max))) in parts.iter().zip(COMPONENTS).enumerate() {
        let value: i32 = part
            .parse()
            .map_err(|_| format!("The literal {text} of type coordgrid is out of range"))?;
        if !(0..=max).contains(&value) {
            return Err(format!(
                "Expected the {name} component value to be between [0-{max}] inclusively"
            ));
        }
        values[index] = value;
    }
    Ok(values[0] << 28 | values[1] << 20 | values[2] << 14 | values[3] << 6 | values[4])
}

// ── Script parser ────────────────────────────────────────────────

pub struct ScriptParser<'t, 's> {
    base: ParserBase<'t>,
    /// Raw text, for re-lexing hook strings at their written positions.
    source: &'t str,
    table: &'t LexicalTable,
    env: &'s CompilerEnvironment,
    symbols: Option<&'s SymbolTable<'s>>,
    /// Depth of enclosing `calc(...)`; arithmetic is only parsed inside one.
    calc_depth: usize,
}

impl<'t, 's> ScriptParser<'t, 's> {
    pub fn new(
        source: &'t str,
        table: &'t LexicalTable,
        env: &'s CompilerEnvironment,
        symbols: Option<&'s SymbolTable<'s>>,
    ) -> Self {
        Self {
            base: ParserBase::new(Lexer::new(table, source)),
            source,
            table,
            env,
            symbols,
            calc_depth: 0,
        }
    }

    pub fn finish(self) -> Vec<CompileError> {
        self.base.finish()
    }

    fn ranged<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<(T, Span)> {
        self.base.push_range();
        let result = f(self);
        let span = self.base.pop_range();
        result.map(|value| (value, span))
    }

    fn peek_kind(&mut self, n: usize) -> Kind {
        self.base.peek_kind(n)
    }

    // ── Declarations ─────────────────────────────────────────────

    pub fn scripts(&mut self) -> ScriptFile {
        let mut file = ScriptFile::default();
        while !self.base.at_eof() {
            self.calc_depth = 0;
            match self.script() {
                Ok(script) => file.scripts.push(script),
                Err(e) => {
                    self.base.report(e);
                    self.base.skip_until(&[Kind::LBracket, Kind::Hash]);
                }
            }
        }
        file
    }

    pub fn script(&mut self) -> ParseResult<Script> {
        let ((annotations, trigger, name, params, returns, body), span) = self.ranged(|p| {
            let mut annotations = Vec::new();
            while p.peek_kind(0) == Kind::Hash {
                annotations.push(p.annotation()?);
            }
            p.base.consume(Kind::LBracket)?;
            let trigger = p.advanced_identifier()?;
            p.base.consume(Kind::Comma)?;
            let name = p.advanced_identifier()?;
            p.base.consume(Kind::RBracket)?;

            let mut params = Vec::new();
            let mut returns = Type::VOID;
            let mut has_returns = false;
            if p.base.consume_if(Kind::LParen) && !p.base.consume_if(Kind::RParen) {
                if p.is_parameter() {
                    params = p.parameters()?;
                } else {
                    returns = p.type_list()?;
                    has_returns = true;
                }
                p.base.consume(Kind::RParen)?;
            }
            if p.base.consume_if(Kind::LParen) && !p.base.consume_if(Kind::RParen) {
                if has_returns {
                    params = p.parameters()?;
                } else {
                    returns = p.type_list()?;
                }
                p.base.consume(Kind::RParen)?;
            }
            let body = p.unbraced_block()?;
            Ok((annotations, trigger, name, params, returns, body))
        })?;
        Ok(Script {
            annotations,
            trigger,
            name,
            params,
            returns,
            body,
            span,
        })
    }

    fn annotation(&mut self) -> ParseResult<Annotation> {
        let ((name, value), span) = self.ranged(|p| {
            p.base.consume(Kind::Hash)?;
            let name = p.identifier()?;
            p.base.consume(Kind::Colon)?;
            let token = p.base.consume(Kind::Integer)?;
            let value = parse_int(token.text()).ok_or_else(|| {
                CompileError::syntax(
                    format!("The literal {} of type int is out of range", token.text()),
                    token.span,
                )
            })?;
            Ok((name, value))
        })?;
        Ok(Annotation { name, value, span })
    }

    fn is_parameter(&mut self) -> bool {
        matches!(self.peek_kind(0), Kind::Type | Kind::ArrayType) && self.peek_kind(1) == Kind::Dollar
    }

    fn parameters(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            params.push(self.parameter()?);
            if !self.base.consume_if(Kind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parameter(&mut self) -> ParseResult<Param> {
        let ((ty, name), span) = self.ranged(|p| {
            if p.peek_kind(0) == Kind::ArrayType {
                let token = p.base.take();
                return Err(CompileError::syntax("Array parameters are not supported", token.span));
            }
            let ty = p.primitive_type()?;
            if !ty.is_declarable() {
                let span = p.base.lexer_mut().previous().map(|t| t.span).unwrap_or_default();
                return Err(CompileError::syntax(format!("Illegal type: {ty}"), span));
            }
            p.base.consume(Kind::Dollar)?;
            let name = p.identifier()?;
            Ok((ty, name))
        })?;
        Ok(Param {
            ty,
            name,
            span,
            local: None,
        })
    }

    fn primitive_type(&mut self) -> ParseResult<PrimitiveType> {
        let token = self.base.consume(Kind::Type)?;
        PrimitiveType::for_representation(token.text())
            .ok_or_else(|| CompileError::syntax(format!("Unknown type: {}", token.text()), token.span))
    }

    fn type_list(&mut self) -> ParseResult<Type> {
        let mut types = Vec::new();
        loop {
            types.push(self.primitive_type()?);
            if !self.base.consume_if(Kind::Comma) {
                break;
            }
        }
        Ok(Type::from_flat(types))
    }

    // ── Statements ───────────────────────────────────────────────

    fn is_statement(&mut self) -> bool {
        matches!(
            self.peek_kind(0),
            Kind::If
                | Kind::While
                | Kind::LBrace
                | Kind::Return
                | Kind::Define
                | Kind::Dollar
                | Kind::Mod
                | Kind::Switch
                | Kind::Continue
                | Kind::Break
        ) || self.is_expression()
    }

    fn statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while self.is_statement() {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn unbraced_block(&mut self) -> ParseResult<Block> {
        let (statements, span) = self.ranged(Self::statements)?;
        Ok(Block { statements, span })
    }

    pub fn statement(&mut self) -> ParseResult<Stmt> {
        let (kind, span) = self.ranged(|p| match p.peek_kind(0) {
            Kind::If => p.if_statement(),
            Kind::While => p.while_statement(),
            Kind::Continue | Kind::Break => {
                let token = p.base.take();
                p.base.consume(Kind::Semicolon)?;
                Ok(if token.kind == Kind::Continue {
                    StmtKind::Continue
                } else {
                    StmtKind::Break
                })
            }
            Kind::LBrace => {
                p.base.take();
                let (statements, span) = p.ranged(Self::statements)?;
                p.base.consume(Kind::RBrace)?;
                Ok(StmtKind::Block(Block { statements, span }))
            }
            Kind::Return => p.return_statement(),
            Kind::Define if p.peek_kind(3) == Kind::LParen => p.array_declaration(),
            Kind::Define => p.variable_declaration(),
            Kind::Dollar | Kind::Mod => p.assignment(),
            Kind::Switch => p.switch_statement(),
            _ if p.is_expression() => {
                let expr = p.expression()?;
                p.base.consume(Kind::Semicolon)?;
                Ok(StmtKind::Expr(expr))
            }
            _ => {
                let span = p.base.peek().span;
                Err(CompileError::syntax("Expecting a statement", span))
            }
        })?;
        Ok(Stmt { kind, span })
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        self.base.consume(Kind::If)?;
        let condition = self.par_expression()?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.base.consume_if(Kind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<StmtKind> {
        self.base.consume(Kind::While)?;
        let condition = self.par_expression()?;
        let body = Box::new(self.statement()?);
        Ok(StmtKind::While { condition, body })
    }

    fn return_statement(&mut self) -> ParseResult<StmtKind> {
        self.base.consume(Kind::Return)?;
        let mut values = Vec::new();
        if self.base.consume_if(Kind::LParen) {
            if self.is_expression() {
                values = self.expression_list()?;
            }
            self.base.consume(Kind::RParen)?;
        }
        self.base.consume(Kind::Semicolon)?;
        Ok(StmtKind::Return(values))
    }

    fn define_type(&mut self) -> ParseResult<PrimitiveType> {
        let token = self.base.consume(Kind::Define)?;
        token
            .text()
            .strip_prefix("def_")
            .and_then(PrimitiveType::for_representation)
            .ok_or_else(|| CompileError::syntax(format!("Unknown type: {}", token.text()), token.span))
    }

    fn variable_declaration(&mut self) -> ParseResult<StmtKind> {
        let ty = self.define_type()?;
        if !self.base.consume_if(Kind::Dollar) {
            let span = self.base.peek().span;
            return Err(CompileError::syntax("Expecting a local variable name", span));
        }
        let name = self.identifier()?;
        let init = if self.base.consume_if(Kind::Equals) && !self.base.consume_if(Kind::Null) {
            Some(self.expression()?)
        } else {
            None
        };
        self.base.consume(Kind::Semicolon)?;
        Ok(StmtKind::Declare {
            ty,
            name,
            init,
            local: None,
        })
    }

    fn array_declaration(&mut self) -> ParseResult<StmtKind> {
        let ty = self.define_type()?;
        if !self.base.consume_if(Kind::Dollar) {
            let span = self.base.peek().span;
            return Err(CompileError::syntax("Expecting an array name", span));
        }
        let name = self.identifier()?;
        let size = self.par_expression()?;
        self.base.consume(Kind::Semicolon)?;
        Ok(StmtKind::DeclareArray {
            ty,
            name,
            size,
            array: None,
        })
    }

    fn assignment(&mut self) -> ParseResult<StmtKind> {
        let mut targets = Vec::new();
        loop {
            targets.push(self.variable()?);
            if !self.base.consume_if(Kind::Comma) {
                break;
            }
        }
        self.base.consume(Kind::Equals)?;
        let values = self.expression_list()?;
        self.base.consume(Kind::Semicolon)?;
        Ok(StmtKind::Assign { targets, values })
    }

    /// An assignment target: `$local`, `$array(index)` or `%global`.
    fn variable(&mut self) -> ParseResult<Expr> {
        let (kind, span) = self.ranged(|p| {
            let token = p.base.take();
            match token.kind {
                Kind::Dollar => {
                    let name = p.identifier()?;
                    if p.base.consume_if(Kind::LParen) {
                        let index = Box::new(p.expression()?);
                        p.base.consume(Kind::RParen)?;
                        Ok(ExprKind::ArrayElement {
                            name,
                            index,
                            array: None,
                        })
                    } else {
                        Ok(ExprKind::Local { name, local: None })
                    }
                }
                Kind::Mod => {
                    let name = p.identifier()?;
                    if p.peek_kind(0) == Kind::LParen {
                        return Err(CompileError::syntax(
                            "Unrecognised scope for array variable expression",
                            token.span,
                        ));
                    }
                    Ok(ExprKind::Global { name })
                }
                _ => Err(CompileError::syntax("Expecting a variable", token.span)),
            }
        })?;
        Ok(Expr::new(kind, span))
    }

    fn switch_statement(&mut self) -> ParseResult<StmtKind> {
        let token = self.base.consume(Kind::Switch)?;
        let ty = token
            .text()
            .strip_prefix("switch_")
            .and_then(PrimitiveType::for_representation)
            .ok_or_else(|| CompileError::syntax(format!("Unknown type: {}", token.text()), token.span))?;
        let condition = self.par_expression()?;
        let mut cases = Vec::new();
        let mut default: Option<SwitchCase> = None;
        self.base.consume(Kind::LBrace)?;
        while !self.base.consume_if(Kind::RBrace) {
            let case = self.switch_case()?;
            if !case.keys.is_empty() {
                cases.push(case);
            } else if default.is_some() {
                self.base.report(CompileError::syntax(
                    "Switch statements can only have one default case defined",
                    case.span,
                ));
            } else {
                default = Some(case);
            }
        }
        Ok(StmtKind::Switch(Switch {
            ty,
            condition,
            cases,
            default,
        }))
    }

    fn switch_case(&mut self) -> ParseResult<SwitchCase> {
        let ((keys, body), span) = self.ranged(|p| {
            p.base.consume(Kind::Case)?;
            let keys = if p.base.consume_if(Kind::Default) {
                Vec::new()
            } else {
                p.expression_list()?
            };
            p.base.consume(Kind::Colon)?;
            let body = p.unbraced_block()?;
            Ok((keys, body))
        })?;
        Ok(SwitchCase {
            keys,
            body,
            span,
            key_values: Vec::new(),
        })
    }

    // ── Expressions ──────────────────────────────────────────────

    fn is_expression(&mut self) -> bool {
        matches!(
            self.peek_kind(0),
            Kind::Integer
                | Kind::Long
                | Kind::Coordgrid
                | Kind::String
                | Kind::ConcatBegin
                | Kind::Bool
                | Kind::Null
                | Kind::Identifier
                | Kind::Dollar
                | Kind::Mod
                | Kind::Caret
                | Kind::LParen
                | Kind::Dot
                | Kind::Calc
                | Kind::Error
        ) || self.is_call()
    }

    fn is_call(&mut self) -> bool {
        let kind = self.peek_kind(0);
        self.env.lookup_operator(kind).is_some()
    }

    fn expression_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut values = Vec::new();
        loop {
            values.push(self.expression()?);
            if !self.base.consume_if(Kind::Comma) {
                break;
            }
        }
        Ok(values)
    }

    fn par_expression(&mut self) -> ParseResult<Expr> {
        self.base.consume(Kind::LParen)?;
        let expr = self.expression()?;
        self.base.consume(Kind::RParen)?;
        Ok(expr)
    }

    pub fn expression(&mut self) -> ParseResult<Expr> {
        self.binary(0)
    }

    /// Operators of precedence level `level`, loosest first.
    fn level_op(&mut self, level: usize) -> Option<BinaryOp> {
        let op = match (level, self.peek_kind(0)) {
            (0, Kind::Or) => BinaryOp::Or,
            (1, Kind::And) => BinaryOp::And,
            (2, Kind::Equals) => BinaryOp::Equals,
            (2, Kind::NotEquals) => BinaryOp::NotEquals,
            (3, Kind::LessThan) => BinaryOp::LessThan,
            (3, Kind::GreaterThan) => BinaryOp::GreaterThan,
            (3, Kind::LessThanOrEqual) => BinaryOp::LessThanOrEqual,
            (3, Kind::GreaterThanOrEqual) => BinaryOp::GreaterThanOrEqual,
            (4, Kind::Plus) => BinaryOp::Add,
            (4, Kind::Minus) => BinaryOp::Sub,
            (5, Kind::Mul) => BinaryOp::Mul,
            (5, Kind::Div) => BinaryOp::Div,
            (5, Kind::Mod) => BinaryOp::Mod,
            _ => return None,
        };
        if op.is_arithmetic() && self.calc_depth == 0 {
            return None;
        }
        Some(op)
    }

    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.primary();
        }
        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = self.level_op(level) {
            self.base.take();
            let rhs = self.binary(level + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.peek_kind(0) == Kind::LParen {
            return self.par_expression();
        }
        let (kind, span) = self.ranged(|p| {
            let kind = p.peek_kind(0);
            match kind {
                Kind::Integer => {
                    let token = p.base.take();
                    Ok(match parse_int(token.text()) {
                        Some(value) => ExprKind::Int(value),
                        None => p.literal_error(&token, "int"),
                    })
                }
                Kind::Long => {
                    let token = p.base.take();
                    Ok(match parse_long(token.text()) {
                        Some(value) => ExprKind::Long(value),
                        None => p.literal_error(&token, "long"),
                    })
                }
                Kind::Coordgrid => {
                    let token = p.base.take();
                    Ok(match parse_coordgrid(token.text()) {
                        Ok(value) => ExprKind::Coordgrid(value),
                        Err(message) => {
                            p.base.report(CompileError::syntax(message, token.span));
                            ExprKind::Error
                        }
                    })
                }
                Kind::String => Ok(ExprKind::Str(p.base.take().text().to_string())),
                Kind::Bool => Ok(ExprKind::Bool(p.base.take().text() == "true")),
                Kind::Null => {
                    p.base.take();
                    Ok(ExprKind::Null)
                }
                Kind::ConcatBegin => {
                    p.base.take();
                    let mut parts = Vec::new();
                    while p.is_expression() {
                        parts.push(p.expression()?);
                    }
                    p.base.consume(Kind::ConcatEnd)?;
                    Ok(ExprKind::Concat(parts))
                }
                Kind::Dollar => {
                    p.base.take();
                    let name = p.identifier()?;
                    if p.base.consume_if(Kind::LParen) {
                        let index = Box::new(p.expression()?);
                        p.base.consume(Kind::RParen)?;
                        Ok(ExprKind::ArrayElement {
                            name,
                            index,
                            array: None,
                        })
                    } else {
                        Ok(ExprKind::Local { name, local: None })
                    }
                }
                Kind::Mod => {
                    p.base.take();
                    Ok(ExprKind::Global { name: p.identifier()? })
                }
                Kind::Caret => {
                    p.base.take();
                    Ok(ExprKind::Constant { name: p.identifier()? })
                }
                Kind::Calc => {
                    p.base.take();
                    p.base.consume(Kind::LParen)?;
                    p.calc_depth += 1;
                    let inner = p.expression();
                    p.calc_depth -= 1;
                    let inner = inner?;
                    p.base.consume(Kind::RParen)?;
                    Ok(ExprKind::Calc(Box::new(inner)))
                }
                Kind::Dot => p.command(),
                Kind::Error => {
                    // already reported by the tokenizer
                    p.base.take();
                    Ok(ExprKind::Error)
                }
                _ if p.is_advanced_identifier() => {
                    if p.peek_kind(1) == Kind::LParen {
                        p.command()
                    } else {
                        Ok(ExprKind::Dynamic {
                            name: p.advanced_identifier()?,
                            config: None,
                        })
                    }
                }
                _ if p.is_call() => p.call(),
                _ => {
                    let span = p.base.peek().span;
                    Err(CompileError::syntax("Expecting an expression", span))
                }
            }
        })?;
        Ok(Expr::new(kind, span))
    }

    fn literal_error(&mut self, token: &Token, ty: &str) -> ExprKind {
        self.base.report(CompileError::syntax(
            format!("The literal {} of type {ty} is out of range", token.text()),
            token.span,
        ));
        ExprKind::Error
    }

    fn call(&mut self) -> ParseResult<ExprKind> {
        let operator = self.base.take();
        let trigger = self
            .env
            .lookup_operator(operator.kind)
            .map(|t| t.name.clone())
            .ok_or_else(|| CompileError::syntax("Expecting a script call operator", operator.span))?;
        let name = self.advanced_identifier()?;
        let mut args = Vec::new();
        if self.base.consume_if(Kind::LParen) {
            if self.is_expression() {
                args = self.expression_list()?;
            }
            self.base.consume(Kind::RParen)?;
        }
        Ok(ExprKind::Call { trigger, name, args })
    }

    fn command(&mut self) -> ParseResult<ExprKind> {
        let alternative = self.base.consume_if(Kind::Dot);
        let name = self.advanced_identifier()?;
        let mut args = Vec::new();
        if self.base.consume_if(Kind::LParen) {
            if self.is_expression() {
                loop {
                    let arg = if self.is_hook_argument(&name.text, args.len()) {
                        self.hook()?
                    } else {
                        self.expression()?
                    };
                    args.push(arg);
                    if !self.base.consume_if(Kind::Comma) {
                        break;
                    }
                }
            }
            self.base.consume(Kind::RParen)?;
        }
        Ok(ExprKind::Command {
            name,
            args,
            alternative,
        })
    }

    fn is_hook_argument(&mut self, command: &str, index: usize) -> bool {
        let hook = self
            .symbols
            .and_then(|s| s.lookup_command(command))
            .is_some_and(|c| c.is_hook_arg(index));
        hook && matches!(self.peek_kind(0), Kind::String | Kind::Null)
    }

    /// A hook string, `"name(args)"`, lexed by a sub-lexer over its contents.
    fn hook(&mut self) -> ParseResult<Expr> {
        let (kind, span) = self.ranged(|p| {
            if p.base.consume_if(Kind::Null) {
                return Ok(ExprKind::Hook(None));
            }
            let token = p.base.consume(Kind::String)?;
            if token.text().is_empty() {
                return Ok(ExprKind::Hook(None));
            }
            let body = token.span.start + 1;
            let raw = p.source.get(body..token.span.end).unwrap_or_default();
            let raw = raw.strip_suffix('"').unwrap_or(raw);
            let tokenizer = Tokenizer::embedded(p.table, literal_chars(raw, body), body + raw.len());
            p.base.lexer_mut().push_lexer(tokenizer);
            let result = p.hook_body();
            p.base.lexer_mut().pop_lexer();
            result
        })?;
        Ok(Expr::new(kind, span))
    }

    fn hook_body(&mut self) -> ParseResult<ExprKind> {
        let name = self.identifier()?;
        let mut args = Vec::new();
        if self.base.consume_if(Kind::LParen) {
            if self.is_expression() {
                args = self.expression_list()?;
            }
            self.base.consume(Kind::RParen)?;
        }
        if !self.base.at_eof() {
            let span = self.base.peek().span;
            return Err(CompileError::syntax("Unexpected content after the hook arguments", span));
        }
        Ok(ExprKind::Hook(Some(Hook { name, args })))
    }

    // ── Names ────────────────────────────────────────────────────

    fn identifier(&mut self) -> ParseResult<Ident> {
        let token = self.base.consume(Kind::Identifier)?;
        Ok(Ident::new(token.text(), token.span))
    }

    fn is_advanced_identifier(&mut self) -> bool {
        matches!(
            self.peek_kind(0),
            Kind::If
                | Kind::Else
                | Kind::While
                | Kind::Return
                | Kind::Switch
                | Kind::Case
                | Kind::Default
                | Kind::Calc
                | Kind::Identifier
                | Kind::Bool
                | Kind::Integer
                | Kind::Long
                | Kind::Type
        )
    }

    /// A name that may also be spelled like a keyword, type or number.
    fn advanced_identifier(&mut self) -> ParseResult<Ident> {
        if !self.is_advanced_identifier() {
            let token = self.base.peek();
            let (kind, span) = (token.kind, token.span);
            return Err(CompileError::syntax(format!("Expected an identifier but got: {kind:?}"), span));
        }
        let token = self.base.take();
        Ok(Ident::new(token.text(), token.span))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::dsl::symbol::CommandInfo;

    fn parse_str(src: &str) -> (ScriptFile, Vec<CompileError>) {
        let table = LexicalTable::scripts();
        let env = CompilerEnvironment::default();
        parse_scripts(src, &table, &env, None)
    }

    fn parse_one(src: &str) -> Script {
        let (file, errors) = parse_str(src);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(file.scripts.len(), 1);
        file.scripts.into_iter().next().unwrap()
    }

    fn body_expr(script: &Script, index: usize) -> &Expr {
        match &script.body.statements[index].kind {
            StmtKind::Expr(e) => e,
            StmtKind::Return(values) => &values[0],
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn header_with_params_and_returns() {
        let script = parse_one("[proc,test](int $a, string $b)(int, boolean) return(1, true);");
        assert_eq!(script.trigger.text, "proc");
        assert_eq!(script.name.text, "test");
        assert_eq!(script.param_types(), vec![PrimitiveType::Int, PrimitiveType::String]);
        assert_eq!(script.returns, Type::Tuple(vec![PrimitiveType::Int, PrimitiveType::Boolean]));
        assert_eq!(script.full_name(), "[proc,test]");
    }

    #[test]
    fn header_with_returns_only() {
        let script = parse_one("[proc,x](int) return(0);");
        assert!(script.params.is_empty());
        assert_eq!(script.returns, Type::Primitive(PrimitiveType::Int));
    }

    #[test]
    fn keyword_names_are_allowed() {
        let script = parse_one("[proc,if] return;");
        assert_eq!(script.name.text, "if");
    }

    #[test]
    fn annotations_precede_header() {
        let script = parse_one("#version:2\n[clientscript,a]");
        assert_eq!(script.annotations.len(), 1);
        assert_eq!(script.annotations[0].name.text, "version");
        assert_eq!(script.annotations[0].value, 2);
    }

    #[test]
    fn calc_uses_precedence() {
        let script = parse_one("[proc,test](int $parameter)(int) return(calc(1 + $parameter * 5));");
        let ExprKind::Calc(inner) = &body_expr(&script, 0).kind else { panic!() };
        let ExprKind::Binary { op, lhs, rhs } = &inner.kind else { panic!() };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(lhs.kind, ExprKind::Int(1)));
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn arithmetic_outside_calc_is_rejected() {
        let (_, errors) = parse_str("[proc,a] return(1 + 2);");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn logical_binds_looser_than_comparison() {
        let script = parse_one("[proc,a] if ($x = 1 & $y > 2 | $z < 3) return;");
        let StmtKind::If { condition, .. } = &script.body.statements[0].kind else { panic!() };
        let ExprKind::Binary { op, lhs, .. } = &condition.kind else { panic!() };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn calls_use_trigger_operators() {
        let script = parse_one("[proc,my_proc](int $parameter) @my_label(0); ~other;");
        let ExprKind::Call { trigger, name, args } = &body_expr(&script, 0).kind else { panic!() };
        assert_eq!(trigger, "label");
        assert_eq!(name.text, "my_label");
        assert_eq!(args.len(), 1);
        let ExprKind::Call { trigger, args, .. } = &body_expr(&script, 1).kind else { panic!() };
        assert_eq!(trigger, "proc");
        assert!(args.is_empty());
    }

    #[test]
    fn declarations_and_arrays() {
        let script = parse_one("[proc,a] def_int $x = 3; def_obj $o = null; def_int $arr(10); $arr(1), $x = 4, 5;");
        let stmts = &script.body.statements;
        assert!(matches!(stmts[0].kind, StmtKind::Declare { init: Some(_), .. }));
        assert!(matches!(stmts[1].kind, StmtKind::Declare { init: None, ty: PrimitiveType::Obj, .. }));
        assert!(matches!(stmts[2].kind, StmtKind::DeclareArray { ty: PrimitiveType::Int, .. }));
        let StmtKind::Assign { targets, values } = &stmts[3].kind else { panic!() };
        assert!(matches!(targets[0].kind, ExprKind::ArrayElement { .. }));
        assert!(matches!(targets[1].kind, ExprKind::Local { .. }));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn switch_with_default() {
        let script = parse_one("[proc,a] switch_int ($x) { case 1, 2: return; case default: return; }");
        let StmtKind::Switch(switch) = &script.body.statements[0].kind else { panic!() };
        assert_eq!(switch.cases.len(), 1);
        assert_eq!(switch.cases[0].keys.len(), 2);
        assert!(switch.default.is_some());
    }

    #[test]
    fn duplicate_default_is_reported() {
        let (file, errors) =
            parse_str("[proc,a] switch_int ($x) { case default: return; case default: return; }");
        assert_eq!(file.scripts.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("one default"));
    }

    #[test]
    fn interpolated_string_is_concatenation() {
        let script = parse_one("[proc,a] return(\"abc<^x>def\");");
        let ExprKind::Concat(parts) = &body_expr(&script, 0).kind else { panic!() };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[1].kind, ExprKind::Constant { name } if name.text == "x"));
    }

    #[test]
    fn literals() {
        let script = parse_one("[proc,a] return(0x10, 5L, 0_50_50_0_0, -3, \"s\", false);");
        let StmtKind::Return(values) = &script.body.statements[0].kind else { panic!() };
        assert!(matches!(values[0].kind, ExprKind::Int(16)));
        assert!(matches!(values[1].kind, ExprKind::Long(5)));
        assert!(matches!(values[2].kind, ExprKind::Coordgrid(v) if v == (50 << 20 | 50 << 14)));
        assert!(matches!(values[3].kind, ExprKind::Int(-3)));
        assert!(matches!(values[5].kind, ExprKind::Bool(false)));
    }

    #[test]
    fn out_of_range_literals_recover() {
        let (file, errors) = parse_str("[proc,a] return(99999999999, 4_0_0_0_0);");
        assert_eq!(file.scripts.len(), 1);
        assert_eq!(errors.len(), 2);
        let StmtKind::Return(values) = &file.scripts[0].body.statements[0].kind else { panic!() };
        assert!(values.iter().all(Expr::is_error));
    }

    #[test]
    fn malformed_script_is_skipped() {
        let (file, errors) = parse_str("[proc,a] return;\n[proc,b] $x = ;\n[proc,c] return;");
        let names: Vec<&str> = file.scripts.iter().map(|s| s.name.text.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, crate::dsl::error::ErrorKind::Syntax);
    }

    #[test]
    fn spans_cover_children() {
        let src = "[proc,a] if (true) { return; }";
        let script = parse_one(src);
        assert_eq!(script.span, Span::new(0, src.len()));
        let stmt = &script.body.statements[0];
        assert_eq!(stmt.span, Span::new(9, src.len()));
        let StmtKind::If { condition, then_branch, .. } = &stmt.kind else { panic!() };
        assert!(stmt.span.contains(condition.span));
        assert!(stmt.span.contains(then_branch.span));
    }

    #[test]
    fn hook_argument_uses_sub_lexer() {
        let table = LexicalTable::scripts();
        let env = CompilerEnvironment::default();
        let mut symbols = SymbolTable::new();
        symbols.define_command(CommandInfo {
            name: "if_setonclick".into(),
            opcode: 1400,
            args: vec![PrimitiveType::Hook],
            returns: Type::VOID,
            alternative: false,
        });
        let src = "[proc,a] if_setonclick(\"click_handler(1, $x)\"); if_setonclick(null);";
        let (file, errors) = parse_scripts(src, &table, &env, Some(&symbols));
        assert!(errors.is_empty(), "{errors:?}");
        let script = &file.scripts[0];
        let ExprKind::Command { args, .. } = &body_expr(script, 0).kind else { panic!() };
        let ExprKind::Hook(Some(hook)) = &args[0].kind else { panic!() };
        assert_eq!(hook.name.text, "click_handler");
        assert_eq!(hook.args.len(), 2);
        // spans point into the original source
        assert_eq!(&src[hook.name.span.start..hook.name.span.end], "click_handler");
        let ExprKind::Command { args, .. } = &body_expr(script, 1).kind else { panic!() };
        assert!(matches!(args[0].kind, ExprKind::Hook(None)));
    }

    #[test]
    fn hook_spans_account_for_escapes() {
        let table = LexicalTable::scripts();
        let env = CompilerEnvironment::default();
        let mut symbols = SymbolTable::new();
        symbols.define_command(CommandInfo {
            name: "if_setonclick".into(),
            opcode: 1400,
            args: vec![PrimitiveType::Hook],
            returns: Type::VOID,
            alternative: false,
        });
        let src = r#"[proc,a] if_setonclick("click_handler(\"a\", $x)");"#;
        let (file, errors) = parse_scripts(src, &table, &env, Some(&symbols));
        assert!(errors.is_empty(), "{errors:?}");
        let ExprKind::Command { args, .. } = &body_expr(&file.scripts[0], 0).kind else { panic!() };
        let ExprKind::Hook(Some(hook)) = &args[0].kind else { panic!() };
        assert!(matches!(&hook.args[0].kind, ExprKind::Str(s) if s == "a"));
        assert_eq!(&src[hook.args[0].span.start..hook.args[0].span.end], r#"\"a\""#);
        assert_eq!(&src[hook.args[1].span.start..hook.args[1].span.end], "$x");

        let src = r#"[proc,a] if_setonclick("click\\handler(1)");"#;
        let (_, errors) = parse_scripts(src, &table, &env, Some(&symbols));
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|e| &src[e.span.start..e.span.start + 2] == r"\\"), "{errors:?}");
    }
}
