use serde::Serialize;

use super::ast::*;
use super::binding::ConfigBinding;
use crate::dsl::error::CompileError;
use crate::dsl::symbol::SymbolTable;
use crate::dsl::types::{PrimitiveType, Value};

/// One encoded property: its opcode and typed values. `values` is empty for
/// emit-empty properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryProperty {
    pub opcode: u8,
    pub values: Vec<(PrimitiveType, Value)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryConfig {
    pub group: PrimitiveType,
    pub name: String,
    pub properties: Vec<BinaryProperty>,
}

impl BinaryConfig {
    /// Properties in declaration order, each `u8 opcode` + values, then a `0` terminator.
    pub fn encode(&self) -> Result<Vec<u8>, CompileError> {
        let mut out = Vec::new();
        for property in &self.properties {
            out.push(property.opcode);
            for (ty, value) in &property.values {
                ty.serializer()
                    .and_then(|serializer| serializer.write(value, &mut out))
                    .ok_or_else(|| {
                        CompileError::internal(
                            format!("Cannot encode {value} as {ty} in config '{}'", self.name),
                            crate::dsl::span::Span::empty(),
                        )
                    })?;
            }
        }
        out.push(0);
        Ok(out)
    }
}

/// Translate a checked config to its binary form.
pub fn generate_config(
    config: &Config,
    binding: &ConfigBinding,
    symbols: &SymbolTable<'_>,
) -> Result<BinaryConfig, CompileError> {
    let mut properties = Vec::with_capacity(config.properties.len());
    for property in &config.properties {
        let bound = binding.property(&property.key.text).ok_or_else(|| {
            CompileError::internal(format!("Unknown property: {}", property.key.text), property.key.span)
        })?;

        let mut values = Vec::with_capacity(property.values.len());
        for (value, ty) in property.values.iter().zip(&bound.components) {
            values.push((*ty, resolve_value(value, symbols)?));
        }

        if let (Some(when), [(_, Value::Bool(b))]) = (bound.emit_empty_when(), values.as_slice()) {
            if *b == when {
                values.clear();
            } else {
                continue;
            }
        }
        properties.push(BinaryProperty {
            opcode: bound.opcode,
            values,
        });
    }
    Ok(BinaryConfig {
        group: binding.group,
        name: config.name.text.clone(),
        properties,
    })
}

fn resolve_value(value: &ConfigValue, symbols: &SymbolTable<'_>) -> Result<Value, CompileError> {
    let unresolved = |name: &str| CompileError::internal(format!("{name} cannot be resolved"), value.span);
    Ok(match &value.kind {
        ValueKind::Str(s) => Value::String(s.clone()),
        ValueKind::Int(v) | ValueKind::Coordgrid(v) => Value::Int(*v),
        ValueKind::Long(v) => Value::Long(*v),
        ValueKind::Bool(b) => Value::Bool(*b),
        ValueKind::Type(t) => Value::Type(*t),
        ValueKind::Constant(name) => symbols
            .lookup_constant(&name.text)
            .map(|info| info.value.clone())
            .ok_or_else(|| unresolved(&name.text))?,
        ValueKind::Reference(name) => Value::Int(
            symbols
                .lookup_config(&name.text)
                .map(|info| info.id)
                .ok_or_else(|| unresolved(&name.text))?,
        ),
        ValueKind::Error => return Err(CompileError::internal("Error value reached code generation", value.span)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::config::check::{define_configs, define_constants};
    use crate::dsl::config::parser::{parse_configs, parse_constants};
    use crate::dsl::tokenizer::LexicalTable;
    use crate::settings::CompilerSettings;

    fn generate(src: &str) -> Vec<BinaryConfig> {
        let table = LexicalTable::configs();
        let binding = ConfigBinding::from_settings(CompilerSettings::default().binding("param").unwrap()).unwrap();
        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        let (constants, _) = parse_constants("^answer=42", &table);
        define_constants(&constants, &mut symbols, &mut errors);
        let (file, _) = parse_configs(src, &table);
        define_configs(&file, &binding, &mut symbols, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
        file.configs
            .iter()
            .map(|c| generate_config(c, &binding, &symbols).unwrap())
            .collect()
    }

    #[test]
    fn encodes_properties_in_order() {
        let configs = generate("[p]\ntype=int\ndefault_int=^answer\ndefault_str=\"hi\"");
        let bytes = configs[0].encode().unwrap();
        let mut expected = vec![1, b'i', 2, 0, 0, 0, 42, 5];
        expected.extend_from_slice(b"hi\0");
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn emit_empty_rules() {
        let configs = generate("[a]\ntype=int\nautodisable=no\n[b]\ntype=int\nautodisable=yes");
        assert_eq!(configs[0].encode().unwrap(), vec![1, b'i', 4, 0]);
        assert_eq!(configs[1].encode().unwrap(), vec![1, b'i', 0]);
    }

    #[test]
    fn empty_config_is_terminator_only() {
        let configs = generate("[a]");
        assert_eq!(configs[0].encode().unwrap(), vec![0]);
        assert_eq!(configs[0].group, PrimitiveType::Param);
    }
}
