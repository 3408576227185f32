use super::ast::*;
use crate::dsl::ast::Ident;
use crate::dsl::error::CompileError;
use crate::dsl::lexer::Lexer;
use crate::dsl::parser::{parse_coordgrid, parse_int, parse_long, ParseResult, ParserBase};
use crate::dsl::span::Span;
use crate::dsl::tokenizer::{Kind, LexicalTable, Token};
use crate::dsl::types::PrimitiveType;

/// Parse a config file: a sequence of `[name]` blocks.
pub fn parse_configs(source: &str, table: &LexicalTable) -> (ConfigFile, Vec<CompileError>) {
    let mut parser = ConfigParser::new(Lexer::new(table, source));
    let configs = parser.configs();
    (
        ConfigFile {
            configs,
            constants: Vec::new(),
        },
        parser.finish(),
    )
}

/// Parse a constant file: a sequence of `^name=value` declarations.
pub fn parse_constants(source: &str, table: &LexicalTable) -> (ConfigFile, Vec<CompileError>) {
    let mut parser = ConfigParser::new(Lexer::new(table, source));
    let constants = parser.constants();
    (
        ConfigFile {
            configs: Vec::new(),
            constants,
        },
        parser.finish(),
    )
}

pub struct ConfigParser<'t> {
    base: ParserBase<'t>,
}

impl<'t> ConfigParser<'t> {
    pub fn new(lexer: Lexer<'t>) -> Self {
        Self {
            base: ParserBase::new(lexer),
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

    // ── Declarations ─────────────────────────────────────────────

    pub fn configs(&mut self) -> Vec<Config> {
        let mut configs = Vec::new();
        while !self.base.at_eof() {
            match self.config() {
                Ok(config) => configs.push(config),
                Err(e) => {
                    self.base.report(e);
                    self.base.skip_until(&[Kind::LBracket]);
                }
            }
        }
        configs
    }

    pub fn config(&mut self) -> ParseResult<Config> {
        let ((name, properties), span) = self.ranged(|p| {
            p.base.consume(Kind::LBracket)?;
            let name = p.advanced_identifier()?;
            p.base.consume(Kind::RBracket)?;
            let mut properties = Vec::new();
            while p.is_advanced_identifier() {
                properties.push(p.property()?);
            }
            Ok((name, properties))
        })?;
        Ok(Config { name, properties, span })
    }

    pub fn property(&mut self) -> ParseResult<Property> {
        let ((key, values), span) = self.ranged(|p| {
            let key = p.advanced_identifier()?;
            p.base.consume(Kind::Equals)?;
            let mut values = vec![p.value()];
            while p.base.consume_if(Kind::Comma) {
                values.push(p.value());
            }
            Ok((key, values))
        })?;
        Ok(Property { key, values, span })
    }

    pub fn constants(&mut self) -> Vec<Constant> {
        let mut constants = Vec::new();
        while !self.base.at_eof() {
            match self.constant() {
                Ok(constant) => constants.push(constant),
                Err(e) => {
                    self.base.report(e);
                    // step past the offending caret so recovery always advances
                    self.base.consume_if(Kind::Caret);
                    self.base.skip_until(&[Kind::Caret]);
                }
            }
        }
        constants
    }

    pub fn constant(&mut self) -> ParseResult<Constant> {
        let ((name, value), span) = self.ranged(|p| {
            p.base.consume(Kind::Caret)?;
            let name = p.advanced_identifier()?;
            p.base.consume(Kind::Equals)?;
            Ok((name, p.value()))
        })?;
        Ok(Constant { name, value, span })
    }

    // ── Values ───────────────────────────────────────────────────

    /// A single property value. Never fails: anything unexpected is reported
    /// and becomes an error value so the value list keeps its length.
    pub fn value(&mut self) -> ConfigValue {
        self.base.push_range();
        let kind = match self.base.peek_kind(0) {
            Kind::String => ValueKind::Str(self.base.take().text().to_string()),
            Kind::Integer => {
                let token = self.base.take();
                match parse_int(token.text()) {
                    Some(value) => ValueKind::Int(value),
                    None => self.literal_error(&token, "int"),
                }
            }
            Kind::Long => {
                let token = self.base.take();
                match parse_long(token.text()) {
                    Some(value) => ValueKind::Long(value),
                    None => self.literal_error(&token, "long"),
                }
            }
            Kind::Bool => {
                let text = self.base.take().text().to_string();
                ValueKind::Bool(text == "yes" || text == "true")
            }
            Kind::Type => {
                let token = self.base.take();
                match PrimitiveType::for_representation(token.text()) {
                    Some(ty) => ValueKind::Type(ty),
                    None => self.literal_error(&token, "type"),
                }
            }
            Kind::Coordgrid => {
                let token = self.base.take();
                match parse_coordgrid(token.text()) {
                    Ok(value) => ValueKind::Coordgrid(value),
                    Err(message) => {
                        self.base.report(CompileError::syntax(message, token.span));
                        ValueKind::Error
                    }
                }
            }
            Kind::Caret if self.base.peek_kind(1) == Kind::Identifier => {
                self.base.take();
                let token = self.base.take();
                ValueKind::Constant(Ident::new(token.text(), token.span))
            }
            Kind::Identifier => {
                let token = self.base.take();
                ValueKind::Reference(Ident::new(token.text(), token.span))
            }
            Kind::Error => {
                self.base.take();
                ValueKind::Error
            }
            kind => {
                // the start of the next declaration is left for the caller
                let token = if matches!(kind, Kind::LBracket | Kind::Eof) {
                    self.base.peek().clone()
                } else {
                    self.base.take()
                };
                self.base
                    .report(CompileError::syntax("Expected a property value", token.span));
                ValueKind::Error
            }
        };
        let span = self.base.pop_range();
        ConfigValue::new(kind, span)
    }

    fn literal_error(&mut self, token: &Token, ty: &str) -> ValueKind {
        self.base.report(CompileError::syntax(
            format!("The literal {} of type {ty} is out of range", token.text()),
            token.span,
        ));
        ValueKind::Error
    }

    // ── Names ────────────────────────────────────────────────────

    fn is_advanced_identifier(&mut self) -> bool {
        matches!(self.base.peek_kind(0), Kind::Identifier | Kind::Type)
    }

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

    fn parse_str(src: &str) -> (ConfigFile, Vec<CompileError>) {
        parse_configs(src, &LexicalTable::configs())
    }

    #[test]
    fn config_with_properties() {
        let (file, errors) = parse_str("[my_param]\ntype=int\ndefault_int=-5\nautodisable=yes");
        assert!(errors.is_empty(), "{errors:?}");
        let config = &file.configs[0];
        assert_eq!(config.name.text, "my_param");
        assert_eq!(config.properties.len(), 3);
        assert_eq!(config.properties[0].values[0].kind, ValueKind::Type(PrimitiveType::Int));
        assert_eq!(config.properties[1].values[0].kind, ValueKind::Int(-5));
        assert_eq!(config.properties[2].values[0].kind, ValueKind::Bool(true));
    }

    #[test]
    fn several_configs_and_values() {
        let (file, errors) = parse_str("[a]\nlist=1,\"two\",0x10,^max,other\n[b]\npos=0_50_50_0_0");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(file.configs.len(), 2);
        let values = &file.configs[0].properties[0].values;
        assert_eq!(values.len(), 5);
        assert_eq!(values[1].kind, ValueKind::Str("two".into()));
        assert_eq!(values[2].kind, ValueKind::Int(16));
        assert!(matches!(&values[3].kind, ValueKind::Constant(n) if n.text == "max"));
        assert!(matches!(&values[4].kind, ValueKind::Reference(n) if n.text == "other"));
        assert_eq!(
            file.configs[1].properties[0].values[0].kind,
            ValueKind::Coordgrid(50 << 20 | 50 << 14)
        );
    }

    #[test]
    fn bad_value_keeps_position() {
        let (file, errors) = parse_str("[a]\nlist=1,=,3");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Expected a property value");
        let values = &file.configs[0].properties[0].values;
        assert_eq!(values.len(), 3);
        assert!(values[1].is_error());
        assert_eq!(values[2].kind, ValueKind::Int(3));
    }

    #[test]
    fn missing_value_does_not_swallow_next_config() {
        let (file, errors) = parse_str("[a]\nkey=\n[b]\nkey=1");
        assert_eq!(errors.len(), 1);
        assert_eq!(file.configs.len(), 2);
        assert_eq!(file.configs[1].name.text, "b");
    }

    #[test]
    fn malformed_header_is_skipped() {
        let (file, errors) = parse_str("[a\nkey=1\n[b]\nkey=2");
        assert_eq!(errors.len(), 1);
        assert_eq!(file.configs.len(), 1);
        assert_eq!(file.configs[0].name.text, "b");
    }

    #[test]
    fn constants() {
        let (file, errors) = parse_constants("^max=10\n^greeting=\"hi\"\n^big=5L", &LexicalTable::configs());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(file.constants.len(), 3);
        assert_eq!(file.constants[0].name.text, "max");
        assert_eq!(file.constants[2].value.kind, ValueKind::Long(5));
    }

    #[test]
    fn property_span_covers_values() {
        let src = "[a]\nkey=1,2";
        let (file, _) = parse_str(src);
        let property = &file.configs[0].properties[0];
        assert_eq!(&src[property.span.start..property.span.end], "key=1,2");
        assert_eq!(file.configs[0].span.start, 0);
        assert_eq!(file.configs[0].span.end, src.len());
    }
}
