use std::collections::{HashMap, VecDeque};

use super::error::CompileError;
use super::span::Span;
use super::types::PrimitiveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    // Literals
    Identifier,
    Integer,
    Long,
    Coordgrid,
    String,
    Bool,
    ConcatBegin,
    ConcatEnd,

    // Keywords
    If,
    Else,
    While,
    Do,
    Return,
    Case,
    Default,
    Calc,
    Null,
    Continue,
    Break,
    Type,
    ArrayType,
    Define,
    Switch,

    // Separators
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Tilde,
    At,
    Dollar,
    Caret,
    Colon,
    Semicolon,
    Dot,
    Hash,

    // Operators
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    And,
    Or,

    // Special
    Comment,
    Error,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Kind,
    pub span: Span,
    /// `None` for error tokens.
    pub lexeme: Option<String>,
}

impl Token {
    pub fn new(kind: Kind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: Some(lexeme.into()),
        }
    }

    pub fn error(span: Span) -> Self {
        Self {
            kind: Kind::Error,
            span,
            lexeme: None,
        }
    }

    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or("")
    }
}

/// Keyword, separator and operator spellings for one language.
#[derive(Debug, Clone, Default)]
pub struct LexicalTable {
    keywords: HashMap<String, Kind>,
    separators: HashMap<char, Kind>,
    operators: HashMap<String, Kind>,
    operator_size: usize,
}

impl LexicalTable {
    pub fn register_keyword(&mut self, word: impl Into<String>, kind: Kind) {
        self.keywords.insert(word.into(), kind);
    }

    pub fn register_separator(&mut self, ch: char, kind: Kind) {
        self.separators.insert(ch, kind);
    }

    pub fn register_operator(&mut self, text: &str, kind: Kind) {
        self.operator_size = self.operator_size.max(text.chars().count());
        self.operators.insert(text.to_string(), kind);
    }

    pub fn keyword(&self, word: &str) -> Option<Kind> {
        self.keywords.get(word).copied()
    }

    pub fn separator(&self, ch: char) -> Option<Kind> {
        self.separators.get(&ch).copied()
    }

    pub fn operator(&self, text: &str) -> Option<Kind> {
        self.operators.get(text).copied()
    }

    fn is_operator_start(&self, ch: char) -> bool {
        self.operators.keys().any(|op| op.starts_with(ch))
    }

    /// Table for the script language.
    pub fn scripts() -> Self {
        let mut table = Self::default();
        for (word, kind) in [
            ("true", Kind::Bool),
            ("false", Kind::Bool),
            ("if", Kind::If),
            ("else", Kind::Else),
            ("while", Kind::While),
            ("do", Kind::Do),
            ("return", Kind::Return),
            ("case", Kind::Case),
            ("default", Kind::Default),
            ("calc", Kind::Calc),
            ("null", Kind::Null),
            ("continue", Kind::Continue),
            ("break", Kind::Break),
        ] {
            table.register_keyword(word, kind);
        }
        for ty in PrimitiveType::ALL {
            let Some(name) = ty.representation() else { continue };
            if ty.is_referencable() {
                table.register_keyword(name, Kind::Type);
            }
            if ty.is_declarable() {
                table.register_keyword(format!("def_{name}"), Kind::Define);
            }
            if ty.is_arrayable() {
                table.register_keyword(format!("{name}array"), Kind::ArrayType);
            }
            if ty.stack_type() == Some(super::types::StackType::Int) {
                table.register_keyword(format!("switch_{name}"), Kind::Switch);
            }
        }
        for (ch, kind) in [
            ('(', Kind::LParen),
            (')', Kind::RParen),
            ('[', Kind::LBracket),
            (']', Kind::RBracket),
            ('{', Kind::LBrace),
            ('}', Kind::RBrace),
            (',', Kind::Comma),
            ('~', Kind::Tilde),
            ('@', Kind::At),
            ('$', Kind::Dollar),
            ('^', Kind::Caret),
            (':', Kind::Colon),
            (';', Kind::Semicolon),
            ('.', Kind::Dot),
            ('#', Kind::Hash),
        ] {
            table.register_separator(ch, kind);
        }
        for (text, kind) in [
            ("=", Kind::Equals),
            ("!", Kind::NotEquals),
            ("<", Kind::LessThan),
            (">", Kind::GreaterThan),
            ("<=", Kind::LessThanOrEqual),
            (">=", Kind::GreaterThanOrEqual),
            ("+", Kind::Plus),
            ("-", Kind::Minus),
            ("*", Kind::Mul),
            ("/", Kind::Div),
            ("%", Kind::Mod),
            ("&", Kind::And),
            ("|", Kind::Or),
        ] {
            table.register_operator(text, kind);
        }
        table
    }

    /// Table for the configuration language.
    pub fn configs() -> Self {
        let mut table = Self::default();
        for word in ["yes", "no", "true", "false"] {
            table.register_keyword(word, Kind::Bool);
        }
        for ty in PrimitiveType::ALL {
            if let (true, Some(name)) = (ty.is_referencable(), ty.representation()) {
                table.register_keyword(name, Kind::Type);
            }
        }
        for (ch, kind) in [
            ('[', Kind::LBracket),
            (']', Kind::RBracket),
            (',', Kind::Comma),
            ('^', Kind::Caret),
            (':', Kind::Colon),
        ] {
            table.register_separator(ch, kind);
        }
        table.register_operator("=", Kind::Equals);
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    Identifier,
    StringLiteral,
    IStringLiteral,
    NumberLiteral,
    HexLiteral,
    CoordgridLiteral,
    LineComment,
    MultiComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKind {
    Regular,
    Interpolation,
}

#[derive(Debug)]
struct State {
    kind: StateKind,
    mode: Mode,
    builder: String,
    fallback: VecDeque<Token>,
    start: usize,
    lines: Vec<String>,
}

impl State {
    fn new(kind: StateKind, start: usize) -> Self {
        Self {
            kind,
            mode: Mode::None,
            builder: String::new(),
            fallback: VecDeque::new(),
            start,
            lines: Vec::new(),
        }
    }
}

/// Interpolations nested deeper than this are reported.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Character-level state machine. String interpolation saves the current
/// state on an explicit stack so nesting depth is not bounded by recursion.
pub struct Tokenizer<'t> {
    table: &'t LexicalTable,
    chars: Vec<(usize, char)>,
    len: usize,
    pos: usize,
    base: usize,
    state: State,
    stack: Vec<State>,
    max_depth: usize,
    last_kind: Kind,
    errors: Vec<CompileError>,
}

impl<'t> Tokenizer<'t> {
    pub fn new(table: &'t LexicalTable, source: &str) -> Self {
        Self::with_offset(table, source, 0)
    }

    /// A tokenizer whose spans are shifted by `base`, for text embedded in another token.
    pub fn with_offset(table: &'t LexicalTable, source: &str, base: usize) -> Self {
        let chars = source.char_indices().filter(|&(_, c)| c != '\r').collect();
        Self::from_chars(table, chars, source.len(), base)
    }

    /// A tokenizer over characters that already carry their source offsets,
    /// `end` being the offset just past the last one.
    pub fn embedded(table: &'t LexicalTable, chars: Vec<(usize, char)>, end: usize) -> Self {
        Self::from_chars(table, chars, end, 0)
    }

    fn from_chars(table: &'t LexicalTable, chars: Vec<(usize, char)>, len: usize, base: usize) -> Self {
        Self {
            table,
            chars,
            len,
            pos: 0,
            base,
            state: State::new(StateKind::Regular, 0),
            stack: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            last_kind: Kind::Eof,
            errors: Vec::new(),
        }
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    pub fn take_errors(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.errors)
    }

    /// Produce the next token. Never fails; problems are recorded and a
    /// best-effort token is still returned.
    pub fn parse(&mut self) -> Token {
        let token = self.parse_token();
        if token.kind != Kind::Comment {
            self.last_kind = token.kind;
        }
        token
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |&(i, _)| i)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).map(|&(_, c)| c)
    }

    fn span(&self) -> Span {
        Span::new(self.state.start, self.offset()).offset(self.base)
    }

    fn token(&mut self, kind: Kind, lexeme: impl Into<String>) -> Token {
        self.state.mode = Mode::None;
        Token::new(kind, self.span(), lexeme)
    }

    fn error(&mut self, message: impl Into<String>) {
        let span = self.span();
        self.errors.push(CompileError::lexical(message, span));
    }

    fn push_state(&mut self, kind: StateKind) {
        let start = self.state.start;
        let previous = std::mem::replace(&mut self.state, State::new(kind, start));
        self.stack.push(previous);
    }

    fn pop_state(&mut self) -> bool {
        match self.stack.pop() {
            Some(previous) => {
                self.state = previous;
                true
            }
            None => false,
        }
    }

    /// A sign starts a number only where an operand is expected.
    fn sign_starts_number(&self) -> bool {
        !matches!(
            self.last_kind,
            Kind::Identifier
                | Kind::Integer
                | Kind::Long
                | Kind::Coordgrid
                | Kind::String
                | Kind::ConcatEnd
                | Kind::Bool
                | Kind::RParen
        )
    }

    fn parse_token(&mut self) -> Token {
        if let Some(token) = self.state.fallback.pop_front() {
            return token;
        }

        loop {
            if self.state.mode == Mode::None {
                self.state.start = self.offset();
            }
            let current = self.current();
            let next = self.peek();

            match self.state.mode {
                Mode::None => {
                    let Some(ch) = current else {
                        if !self.stack.is_empty() {
                            self.error("Interpolated string is not properly closed");
                            self.stack.clear();
                        }
                        return self.token(Kind::Eof, "");
                    };
                    self.pos += 1;
                    if ch.is_whitespace() {
                        continue;
                    }
                    self.state.builder.clear();
                    if is_identifier_start(ch) {
                        self.state.builder.push(ch);
                        self.state.mode = Mode::Identifier;
                    } else if ch == '"' {
                        self.state.mode = Mode::StringLiteral;
                    } else if ch.is_ascii_digit()
                        || ((ch == '-' || ch == '+')
                            && next.is_some_and(|c| c.is_ascii_digit())
                            && self.sign_starts_number())
                    {
                        self.state.builder.push(ch);
                        self.state.mode = Mode::NumberLiteral;
                    } else if ch == '/' && next == Some('/') {
                        self.pos += 1;
                        self.state.mode = Mode::LineComment;
                    } else if ch == '/' && next == Some('*') {
                        self.pos += 1;
                        self.state.lines.clear();
                        self.state.mode = Mode::MultiComment;
                    } else if let Some(kind) = self.table.separator(ch) {
                        return self.token(kind, ch.to_string());
                    } else if self.state.kind == StateKind::Interpolation && ch == '>' {
                        self.pop_state();
                        self.state.mode = Mode::IStringLiteral;
                        self.state.start = self.offset();
                    } else if self.table.is_operator_start(ch) {
                        return self.operator(ch);
                    } else {
                        self.error(format!("Unexpected character: {ch}"));
                        self.state.mode = Mode::None;
                        return Token::error(self.span());
                    }
                }
                Mode::Identifier => match current {
                    Some(ch) if is_identifier_part(ch) => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                    _ => {
                        let word = std::mem::take(&mut self.state.builder);
                        let kind = self.table.keyword(&word).unwrap_or(Kind::Identifier);
                        return self.token(kind, word);
                    }
                },
                Mode::StringLiteral | Mode::IStringLiteral => {
                    if let Some(token) = self.string_char(current, next) {
                        return token;
                    }
                }
                Mode::NumberLiteral => match current {
                    Some(ch) if ch.is_ascii_digit() => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                    Some('x' | 'X') if self.state.builder == "0" => {
                        self.state.builder.push('x');
                        self.pos += 1;
                        self.state.mode = Mode::HexLiteral;
                    }
                    Some('_') if self.state.builder.chars().any(|c| c.is_ascii_digit()) => {
                        self.state.builder.push('_');
                        self.pos += 1;
                        self.state.mode = Mode::CoordgridLiteral;
                    }
                    Some('L' | 'l') => {
                        self.pos += 1;
                        let text = std::mem::take(&mut self.state.builder);
                        return self.token(Kind::Long, text);
                    }
                    _ => {
                        let text = std::mem::take(&mut self.state.builder);
                        return self.token(Kind::Integer, text);
                    }
                },
                Mode::HexLiteral => match current {
                    Some(ch) if ch.is_ascii_hexdigit() => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                    Some('L' | 'l') => {
                        self.pos += 1;
                        let text = std::mem::take(&mut self.state.builder);
                        return self.token(Kind::Long, text);
                    }
                    _ => {
                        let text = std::mem::take(&mut self.state.builder);
                        if text.len() <= 2 {
                            self.error("Hex literal must have at least one digit");
                        }
                        return self.token(Kind::Integer, text);
                    }
                },
                Mode::CoordgridLiteral => match current {
                    Some(ch) if ch.is_ascii_digit() || ch == '_' => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                    _ => {
                        let text = std::mem::take(&mut self.state.builder);
                        return self.token(Kind::Coordgrid, text);
                    }
                },
                Mode::LineComment => match current {
                    None | Some('\n') => {
                        let text = trim_comment(&self.state.builder, false).to_string();
                        return self.token(Kind::Comment, text);
                    }
                    Some(ch) => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                },
                Mode::MultiComment => match current {
                    None => {
                        self.error("Unexpected end of comment");
                        let text = self.state.lines.join("\n");
                        return self.token(Kind::Comment, text);
                    }
                    Some('\n') => {
                        self.pos += 1;
                        let line = trim_comment(&self.state.builder, true).to_string();
                        // an empty header line is dropped
                        if !self.state.lines.is_empty() || !line.is_empty() {
                            self.state.lines.push(line);
                        }
                        self.state.builder.clear();
                    }
                    Some('*') if next == Some('/') => {
                        self.pos += 2;
                        let text = self.state.lines.join("\n");
                        return self.token(Kind::Comment, text);
                    }
                    Some(ch) => {
                        self.state.builder.push(ch);
                        self.pos += 1;
                    }
                },
            }
        }
    }

    /// One step inside a string literal. Returns a token once one is complete.
    fn string_char(&mut self, current: Option<char>, next: Option<char>) -> Option<Token> {
        let interpolated = self.state.mode == Mode::IStringLiteral;
        match current {
            None | Some('\n') => {
                self.error("String literal is not properly closed by a double-quote");
                let text = std::mem::take(&mut self.state.builder);
                if interpolated {
                    let span = self.span();
                    self.state.fallback.push_back(Token::new(Kind::ConcatEnd, span, ""));
                }
                Some(self.token(Kind::String, text))
            }
            Some('\\') => {
                self.pos += 2;
                match next.and_then(unescape) {
                    Some(ch) => self.state.builder.push(ch),
                    None => self.error(
                        "Invalid escape sequence (valid ones are  \\b  \\t  \\n  \\f  \\\"  \\\\  \\<  \\>)",
                    ),
                }
                None
            }
            Some('"') => {
                self.pos += 1;
                let text = std::mem::take(&mut self.state.builder);
                if interpolated {
                    if text.is_empty() {
                        return Some(self.token(Kind::ConcatEnd, ""));
                    }
                    let span = self.span();
                    self.state.fallback.push_back(Token::new(Kind::ConcatEnd, span, ""));
                }
                Some(self.token(Kind::String, text))
            }
            Some('<') => {
                self.pos += 1;
                let text = std::mem::take(&mut self.state.builder);
                let span = self.span();
                // the enclosing string resumes as interpolated once the expression closes
                self.state.mode = Mode::IStringLiteral;
                if self.stack.len() >= self.max_depth {
                    self.error("String interpolation is nested too deeply");
                }
                self.push_state(StateKind::Interpolation);
                if interpolated {
                    Some(Token::new(Kind::String, span, text))
                } else {
                    self.state.fallback.push_back(Token::new(Kind::String, span, text));
                    Some(Token::new(Kind::ConcatBegin, span, ""))
                }
            }
            Some(ch) => {
                self.state.builder.push(ch);
                self.pos += 1;
                None
            }
        }
    }

    /// Longest-match operator lookup with rollback.
    fn operator(&mut self, first: char) -> Token {
        let mut text = String::from(first);
        let mut taken = 0;
        while text.chars().count() < self.table.operator_size {
            match self.current() {
                Some(ch) if ch != '\n' => {
                    text.push(ch);
                    self.pos += 1;
                    taken += 1;
                }
                _ => break,
            }
        }
        loop {
            if let Some(kind) = self.table.operator(&text) {
                return self.token(kind, text);
            }
            if taken == 0 {
                break;
            }
            text.pop();
            self.pos -= 1;
            taken -= 1;
        }
        self.error(format!("Unexpected character: {first}"));
        self.state.mode = Mode::None;
        Token::error(self.span())
    }
}

fn unescape(ch: char) -> Option<char> {
    Some(match ch {
        'b' => '\u{8}',
        't' => '\t',
        'n' => '\n',
        'f' => '\u{c}',
        '"' => '"',
        '\\' => '\\',
        '<' => '<',
        '>' => '>',
        _ => return None,
    })
}

/// The body of a string literal with escapes resolved, each character paired
/// with the offset it was written at (`base` plus its position in `raw`); an
/// escape takes the offset of its backslash. Invalid escapes are dropped.
pub fn literal_chars(raw: &str, base: usize) -> Vec<(usize, char)> {
    let mut chars = Vec::with_capacity(raw.len());
    let mut iter = raw.char_indices();
    while let Some((i, ch)) = iter.next() {
        let ch = match ch {
            '\r' => continue,
            '\\' => match iter.next().and_then(|(_, escaped)| unescape(escaped)) {
                Some(ch) => ch,
                None => continue,
            },
            ch => ch,
        };
        chars.push((base + i, ch));
    }
    chars
}

/// Strip surrounding whitespace and, for block comment lines, one leading `*`.
fn trim_comment(line: &str, trim_star: bool) -> &str {
    let trimmed = line.trim();
    if trim_star {
        if let Some(rest) = trimmed.strip_prefix('*') {
            return rest.trim();
        }
    }
    trimmed
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let table = LexicalTable::scripts();
        let mut tokenizer = Tokenizer::new(&table, src);
        let mut out = Vec::new();
        loop {
            let token = tokenizer.parse();
            if token.kind == Kind::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    fn kinds(src: &str) -> Vec<Kind> {
        tokens(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn plain_string() {
        let toks = tokens("\"Basic Sample\"");
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, Kind::String);
        assert_eq!(toks[0].text(), "Basic Sample");
    }

    #[test]
    fn escaped_string() {
        let toks = tokens("\"Escaped\\t\\\"Sample\"");
        assert_eq!(toks[0].text(), "Escaped\t\"Sample");
    }

    #[test]
    fn interpolation_splits_into_concatenation() {
        let toks = tokens("\"abc<^x>def\"");
        let shape: Vec<(Kind, &str)> = toks.iter().map(|t| (t.kind, t.text())).collect();
        assert_eq!(
            shape,
            vec![
                (Kind::ConcatBegin, ""),
                (Kind::String, "abc"),
                (Kind::Caret, "^"),
                (Kind::Identifier, "x"),
                (Kind::String, "def"),
                (Kind::ConcatEnd, ""),
            ]
        );
    }

    #[test]
    fn nested_interpolation() {
        use Kind::*;
        let src = "\"Literal <tostring(1)> another literal <tostring(2)> and <function(\"number is <tostring(6)>\")>\"";
        assert_eq!(
            kinds(src),
            vec![
                ConcatBegin, String, Identifier, LParen, Integer, RParen, String, Identifier, LParen,
                Integer, RParen, String, Identifier, LParen, ConcatBegin, String, Identifier, LParen,
                Integer, RParen, ConcatEnd, RParen, ConcatEnd,
            ]
        );
    }

    #[test]
    fn interpolated_segments_do_not_leak_text() {
        let toks = tokens("\"a<1>b<2>c\"");
        let strings: Vec<&str> = toks.iter().filter(|t| t.kind == Kind::String).map(Token::text).collect();
        assert_eq!(strings, vec!["a", "b", "c"]);
    }

    #[test]
    fn line_comment() {
        let toks = tokens("\"Test\"// I am a comment");
        assert_eq!(toks[1].kind, Kind::Comment);
        assert_eq!(toks[1].text(), "I am a comment");
    }

    #[test]
    fn block_comment_strips_decoration() {
        let src = "\t\t/*\r\n\t\t * Line with the star decoration.\r\n\t\t   Line without the star decoration.\r\n\t\t * \r\n\t\t */";
        let toks = tokens(src);
        assert_eq!(toks[0].kind, Kind::Comment);
        assert_eq!(
            toks[0].text(),
            "Line with the star decoration.\nLine without the star decoration.\n"
        );
    }

    #[test]
    fn number_then_identifier() {
        let toks = tokens("654321myIdentifier");
        assert_eq!(toks[0].kind, Kind::Integer);
        assert_eq!(toks[0].text(), "654321");
        assert_eq!(toks[1].kind, Kind::Identifier);
        assert_eq!(toks[1].text(), "myIdentifier");
    }

    #[test]
    fn numeric_sub_modes() {
        let toks = tokens("0x1F 12L 0_50_50_0_0 (-4)");
        assert_eq!((toks[0].kind, toks[0].text()), (Kind::Integer, "0x1F"));
        assert_eq!((toks[1].kind, toks[1].text()), (Kind::Long, "12"));
        assert_eq!((toks[2].kind, toks[2].text()), (Kind::Coordgrid, "0_50_50_0_0"));
        assert_eq!((toks[4].kind, toks[4].text()), (Kind::Integer, "-4"));
    }

    #[test]
    fn minus_after_operand_is_an_operator() {
        assert_eq!(kinds("$a-1"), vec![Kind::Dollar, Kind::Identifier, Kind::Minus, Kind::Integer]);
    }

    #[test]
    fn keywords_and_types() {
        assert_eq!(
            kinds("true def_int switch_obj intarray string"),
            vec![Kind::Bool, Kind::Define, Kind::Switch, Kind::ArrayType, Kind::Type]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("test = \"Hello\"; <= >= <"),
            vec![
                Kind::Identifier,
                Kind::Equals,
                Kind::String,
                Kind::Semicolon,
                Kind::LessThanOrEqual,
                Kind::GreaterThanOrEqual,
                Kind::LessThan,
            ]
        );
    }

    #[test]
    fn errors_are_collected_not_thrown() {
        let table = LexicalTable::scripts();
        let mut tokenizer = Tokenizer::new(&table, "\"bad\\q\" ` ok");
        let first = tokenizer.parse();
        assert_eq!((first.kind, first.text()), (Kind::String, "bad"));
        let second = tokenizer.parse();
        assert_eq!(second.kind, Kind::Error);
        assert_eq!(second.lexeme, None);
        assert_eq!(tokenizer.parse().kind, Kind::Identifier);
        assert_eq!(tokenizer.take_errors().len(), 2);
    }

    #[test]
    fn unterminated_string_is_reported() {
        let table = LexicalTable::scripts();
        let mut tokenizer = Tokenizer::new(&table, "\"open\nnext");
        assert_eq!(tokenizer.parse().kind, Kind::String);
        assert_eq!(tokenizer.take_errors().len(), 1);
    }

    #[test]
    fn spans_follow_source_order() {
        let toks = tokens("[proc,a]");
        for pair in toks.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start);
        }
        assert_eq!(toks[1].span, Span::new(1, 5));
    }
}
