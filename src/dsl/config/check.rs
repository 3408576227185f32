use indexmap::IndexMap;

use super::ast::*;
use super::binding::{BindingProperty, ConfigBinding, ConfigRule};
use crate::dsl::error::CompileError;
use crate::dsl::symbol::SymbolTable;
use crate::dsl::types::{PrimitiveType, Value};

// ── Pre-pass ─────────────────────────────────────────────────────

/// Define every constant of a constant file in `symbols`.
pub fn define_constants(file: &ConfigFile, symbols: &mut SymbolTable<'_>, errors: &mut Vec<CompileError>) {
    for constant in &file.constants {
        let Some((ty, value)) = literal_value(&constant.value) else {
            if !constant.value.is_error() {
                errors.push(CompileError::semantic(
                    "Constant values must be literals",
                    constant.value.span,
                ));
            }
            continue;
        };
        if !symbols.define_constant(&constant.name.text, ty, value) {
            errors.push(CompileError::semantic(
                format!("Duplicate constant: {}", constant.name.text),
                constant.name.span,
            ));
        }
    }
}

/// Define every config of a file in `symbols`, with the content type its
/// binding names.
pub fn define_configs(
    file: &ConfigFile,
    binding: &ConfigBinding,
    symbols: &mut SymbolTable<'_>,
    errors: &mut Vec<CompileError>,
) {
    for config in &file.configs {
        let content_type = binding
            .content_type
            .as_deref()
            .and_then(|key| config.find_property(key))
            .and_then(|property| property.values.first())
            .and_then(|value| match &value.kind {
                ValueKind::Type(ty) => Some(*ty),
                _ => None,
            });
        if symbols
            .define_config(&config.name.text, binding.group, content_type)
            .is_none()
        {
            errors.push(CompileError::semantic(
                format!("Duplicate configuration: {}", config.name.text),
                config.name.span,
            ));
        }
    }
}

fn literal_value(value: &ConfigValue) -> Option<(PrimitiveType, Value)> {
    Some(match &value.kind {
        ValueKind::Str(s) => (PrimitiveType::String, Value::String(s.clone())),
        ValueKind::Int(v) => (PrimitiveType::Int, Value::Int(*v)),
        ValueKind::Long(v) => (PrimitiveType::Long, Value::Long(*v)),
        ValueKind::Bool(b) => (PrimitiveType::Boolean, Value::Bool(*b)),
        ValueKind::Type(t) => (PrimitiveType::Type, Value::Type(*t)),
        ValueKind::Coordgrid(v) => (PrimitiveType::Coordgrid, Value::Int(*v)),
        ValueKind::Constant(_) | ValueKind::Reference(_) | ValueKind::Error => return None,
    })
}

// ── Main pass ────────────────────────────────────────────────────

/// Check the properties of every config in `file` against its binding.
pub fn check_configs(file: &ConfigFile, binding: &ConfigBinding, symbols: &SymbolTable<'_>) -> Vec<CompileError> {
    let mut checker = ConfigChecker {
        binding,
        symbols,
        errors: Vec::new(),
    };
    for config in &file.configs {
        checker.config(config);
    }
    checker.errors
}

struct ConfigChecker<'a, 'p> {
    binding: &'a ConfigBinding,
    symbols: &'a SymbolTable<'p>,
    errors: Vec<CompileError>,
}

impl ConfigChecker<'_, '_> {
    fn error(&mut self, message: impl Into<String>, span: crate::dsl::span::Span) {
        self.errors.push(CompileError::semantic(message, span));
    }

    fn config(&mut self, config: &Config) {
        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        for property in &config.properties {
            let key = property.key.text.as_str();
            let Some(bound) = self.binding.property(key) else {
                self.error(format!("Unknown property: {key}"), property.key.span);
                continue;
            };
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            if *count > 1 && !bound.allow_duplicates {
                self.error(format!("Duplicate property: {key}"), property.key.span);
                continue;
            }
            self.property(config, property, bound);
        }

        for bound in self.binding.properties() {
            if bound.required && !seen.contains_key(bound.name.as_str()) {
                self.error(format!("Missing required property: {}", bound.name), config.name.span);
            }
        }
    }

    fn property(&mut self, config: &Config, property: &Property, bound: &BindingProperty) {
        let expected = bound.components.len();
        let got = property.values.len();
        if expected != got {
            self.error(
                format!("Argument mismatch: expected {expected} argument(s) but got {got} argument(s)"),
                property.span,
            );
            return;
        }

        for (index, (value, component)) in property.values.iter().zip(&bound.components).enumerate() {
            let Some(ty) = self.value_type(value) else {
                continue;
            };
            if !ty.implicit_equals(*component) {
                self.error(
                    format!("Type mismatch: cannot convert from {ty} to {component}"),
                    value.span,
                );
                continue;
            }
            for rule in bound.rules_for(index) {
                self.rule(rule, value);
            }
        }

        if let Some(required) = &bound.requires {
            if config.find_property(required).is_none() {
                self.error(
                    format!("Property '{}' requires property '{required}'", property.key.text),
                    property.span,
                );
            }
        }
    }

    /// The type of a value, or `None` when it is an error or unresolved
    /// (already reported).
    fn value_type(&mut self, value: &ConfigValue) -> Option<PrimitiveType> {
        match &value.kind {
            ValueKind::Error => None,
            ValueKind::Constant(name) => match self.symbols.lookup_constant(&name.text) {
                Some(info) => Some(info.ty),
                None => {
                    self.error(format!("{} cannot be resolved to a constant", name.text), name.span);
                    None
                }
            },
            ValueKind::Reference(name) => match self.symbols.lookup_config(&name.text) {
                Some(info) => Some(info.ty),
                None => {
                    self.error(format!("{} cannot be resolved to a symbol", name.text), name.span);
                    None
                }
            },
            _ => literal_value(value).map(|(ty, _)| ty),
        }
    }

    fn resolve_int(&self, value: &ConfigValue) -> Option<i32> {
        match &value.kind {
            ValueKind::Int(v) => Some(*v),
            ValueKind::Constant(name) => self.symbols.lookup_constant(&name.text)?.value.as_int(),
            _ => None,
        }
    }

    fn rule(&mut self, rule: ConfigRule, value: &ConfigValue) {
        match rule {
            ConfigRule::Range { min, max } => {
                if let Some(v) = self.resolve_int(value) {
                    if v < min || v > max {
                        self.error(
                            format!("Value of this component must be in range [{min},{max}]"),
                            value.span,
                        );
                    }
                }
            }
            ConfigRule::Positive => {
                if self.resolve_int(value).is_some_and(|v| v < 1) {
                    self.error("Expected a positive value for this component", value.span);
                }
            }
            ConfigRule::EmitEmptyIfTrue | ConfigRule::EmitEmptyIfFalse => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::config::parser::{parse_configs, parse_constants};
    use crate::dsl::tokenizer::LexicalTable;
    use crate::settings::{BindingSettings, ComponentRule, CompilerSettings, PropertySettings, RuleSettings};

    fn param_binding() -> ConfigBinding {
        ConfigBinding::from_settings(CompilerSettings::default().binding("param").unwrap()).unwrap()
    }

    fn check_str(src: &str, binding: &ConfigBinding) -> Vec<CompileError> {
        let table = LexicalTable::configs();
        let (file, errors) = parse_configs(src, &table);
        assert!(errors.is_empty(), "{errors:?}");
        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        define_configs(&file, binding, &mut symbols, &mut errors);
        errors.extend(check_configs(&file, binding, &symbols));
        errors
    }

    #[test]
    fn valid_param() {
        let errors = check_str("[p]\ntype=int\ndefault_int=3\nautodisable=no", &param_binding());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn duplicate_required_property_reported_once() {
        let binding = param_binding();
        let errors = check_str("[p]\ntype=int\ntype=int", &binding);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].message.contains("Duplicate property"));

        assert!(check_str("[p]\ntype=int", &binding).is_empty());

        let errors = check_str("[p]\ntype=int\ntype=int\ntype=int", &binding);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn missing_unknown_and_mismatched() {
        let errors = check_str("[p]\ncolour=1\ndefault_int=\"x\"\ndefault_str=\"a\",\"b\"", &param_binding());
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "Unknown property: colour",
                "Type mismatch: cannot convert from string to int",
                "Argument mismatch: expected 1 argument(s) but got 2 argument(s)",
                "Missing required property: type",
            ]
        );
    }

    #[test]
    fn duplicate_configuration() {
        let errors = check_str("[p]\ntype=int\n[p]\ntype=string", &param_binding());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Duplicate configuration: p");
    }

    #[test]
    fn content_type_comes_from_binding_property() {
        let table = LexicalTable::configs();
        let (file, _) = parse_configs("[p]\ntype=obj", &table);
        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        define_configs(&file, &param_binding(), &mut symbols, &mut errors);
        let info = symbols.lookup_config("p").unwrap();
        assert_eq!(info.ty, PrimitiveType::Param);
        assert_eq!(info.content_type, Some(PrimitiveType::Obj));
    }

    #[test]
    fn rules_and_requires() {
        let component = |rule| ComponentRule { component: 0, rule };
        let binding = ConfigBinding::from_settings(&BindingSettings {
            group: "obj".into(),
            content_type: None,
            properties: vec![
                PropertySettings {
                    name: "cost".into(),
                    opcode: 1,
                    components: vec!["int".into()],
                    required: false,
                    allow_duplicates: false,
                    rules: vec![component(RuleSettings::Range { min: 0, max: 100 })],
                    requires: Some("stackable".into()),
                    repeat: None,
                },
                PropertySettings {
                    name: "stackable".into(),
                    opcode: 2,
                    components: vec!["int".into()],
                    required: false,
                    allow_duplicates: false,
                    rules: vec![component(RuleSettings::Positive)],
                    requires: None,
                    repeat: None,
                },
            ],
        })
        .unwrap();
        let messages = |src| -> Vec<String> { check_str(src, &binding).into_iter().map(|e| e.message).collect() };
        assert_eq!(
            messages("[a]\ncost=101"),
            [
                "Value of this component must be in range [0,100]",
                "Property 'cost' requires property 'stackable'",
            ]
        );
        assert_eq!(messages("[a]\ncost=5\nstackable=0"), ["Expected a positive value for this component"]);
        assert!(messages("[a]\ncost=5\nstackable=1").is_empty());
    }

    #[test]
    fn constants_and_references() {
        let table = LexicalTable::configs();
        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        let (constants, _) = parse_constants("^limit=7\n^limit=8\n^bad=other", &table);
        define_constants(&constants, &mut symbols, &mut errors);
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["Duplicate constant: limit", "Constant values must be literals"]);

        let binding = param_binding();
        let (file, _) = parse_configs("[p]\ntype=int\ndefault_int=^limit\n[q]\ntype=int\ndefault_int=^nope", &table);
        errors.clear();
        define_configs(&file, &binding, &mut symbols, &mut errors);
        let errors = check_configs(&file, &binding, &symbols);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "nope cannot be resolved to a constant");
    }
}
