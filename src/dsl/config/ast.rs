use serde::Serialize;

use crate::dsl::ast::Ident;
use crate::dsl::span::Span;
use crate::dsl::types::PrimitiveType;

/// Declarations parsed from one config or constant file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigFile {
    pub configs: Vec<Config>,
    pub constants: Vec<Constant>,
}

/// `[name]` followed by its properties.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub name: Ident,
    pub properties: Vec<Property>,
    pub span: Span,
}

impl Config {
    pub fn find_property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key.text == key)
    }
}

/// `key=value[,value...]`
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub key: Ident,
    pub values: Vec<ConfigValue>,
    pub span: Span,
}

/// `^name=value`
#[derive(Debug, Clone, Serialize)]
pub struct Constant {
    pub name: Ident,
    pub value: ConfigValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue {
    pub kind: ValueKind,
    pub span: Span,
}

impl ConfigValue {
    pub fn new(kind: ValueKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ValueKind::Error
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Str(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    Type(PrimitiveType),
    Coordgrid(i32),
    /// `^name`
    Constant(Ident),
    /// Bare name of another config.
    Reference(Ident),
    Error,
}
