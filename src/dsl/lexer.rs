use std::collections::VecDeque;

use super::error::CompileError;
use super::span::Span;
use super::tokenizer::{Kind, LexicalTable, Token, Tokenizer};

/// One token source: a tokenizer plus its lookahead backlog.
struct Source<'t> {
    tokenizer: Tokenizer<'t>,
    buffer: VecDeque<Token>,
    previous: Option<Token>,
}

impl<'t> Source<'t> {
    fn new(tokenizer: Tokenizer<'t>) -> Self {
        Self {
            tokenizer,
            buffer: VecDeque::new(),
            previous: None,
        }
    }
}

/// Buffers tokens on demand and hides comments from the parser. Sub-lexers can
/// be pushed to read an embedded region; the pushed one is the active source
/// until it is popped.
pub struct Lexer<'t> {
    active: Source<'t>,
    suspended: Vec<Source<'t>>,
    comments: Vec<Token>,
    errors: Vec<CompileError>,
}

impl<'t> Lexer<'t> {
    pub fn new(table: &'t LexicalTable, source: &str) -> Self {
        Self::from_tokenizer(Tokenizer::new(table, source))
    }

    pub fn from_tokenizer(tokenizer: Tokenizer<'t>) -> Self {
        Self {
            active: Source::new(tokenizer),
            suspended: Vec::new(),
            comments: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fill(&mut self, n: usize) {
        while self.active.buffer.len() <= n {
            let token = self.active.tokenizer.parse();
            if token.kind == Kind::Comment {
                self.comments.push(token);
                continue;
            }
            self.active.buffer.push_back(token);
        }
    }

    /// The token `n` positions ahead of the cursor. Past the end this is `Eof`,
    /// since the tokenizer keeps answering `Eof` once the input is exhausted.
    pub fn lookahead(&mut self, n: usize) -> &Token {
        self.fill(n);
        &self.active.buffer[n]
    }

    pub fn peek(&mut self) -> &Token {
        self.lookahead(0)
    }

    pub fn peek_kind(&mut self, n: usize) -> Kind {
        self.lookahead(n).kind
    }

    pub fn take(&mut self) -> Token {
        self.fill(0);
        let token = self
            .active
            .buffer
            .pop_front()
            .unwrap_or_else(|| Token::new(Kind::Eof, Span::empty(), ""));
        if token.kind == Kind::Eof {
            self.active.buffer.push_front(token.clone());
        } else {
            self.active.previous = Some(token.clone());
        }
        token
    }

    pub fn previous(&self) -> Option<&Token> {
        self.active.previous.as_ref()
    }

    pub fn is_eof(&mut self) -> bool {
        self.peek_kind(0) == Kind::Eof
    }

    /// Make `tokenizer` the active source until [`Lexer::pop_lexer`].
    pub fn push_lexer(&mut self, tokenizer: Tokenizer<'t>) {
        let previous = std::mem::replace(&mut self.active, Source::new(tokenizer));
        self.suspended.push(previous);
    }

    /// Restore the enclosing source. Returns `false` when no sub-lexer is active.
    pub fn pop_lexer(&mut self) -> bool {
        let Some(previous) = self.suspended.pop() else {
            return false;
        };
        let mut finished = std::mem::replace(&mut self.active, previous);
        self.errors.extend(finished.tokenizer.take_errors());
        true
    }

    pub fn depth(&self) -> usize {
        self.suspended.len()
    }

    pub fn comments(&self) -> &[Token] {
        &self.comments
    }

    /// Lexical errors recorded so far by every source.
    pub fn take_errors(&mut self) -> Vec<CompileError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(self.active.tokenizer.take_errors());
        for source in &mut self.suspended {
            errors.extend(source.tokenizer.take_errors());
        }
        errors.sort_by_key(|e| e.span.start);
        errors
    }
}
