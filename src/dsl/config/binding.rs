use indexmap::IndexMap;

use crate::dsl::types::PrimitiveType;
use crate::settings::{BindingSettings, PropertySettings, RuleSettings};

/// A validation or emission rule attached to one property component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRule {
    Range { min: i32, max: i32 },
    Positive,
    EmitEmptyIfTrue,
    EmitEmptyIfFalse,
}

impl From<&RuleSettings> for ConfigRule {
    fn from(rule: &RuleSettings) -> Self {
        match *rule {
            RuleSettings::Range { min, max } => ConfigRule::Range { min, max },
            RuleSettings::Positive => ConfigRule::Positive,
            RuleSettings::EmitEmptyIfTrue => ConfigRule::EmitEmptyIfTrue,
            RuleSettings::EmitEmptyIfFalse => ConfigRule::EmitEmptyIfFalse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingProperty {
    pub name: String,
    pub opcode: u8,
    pub components: Vec<PrimitiveType>,
    pub required: bool,
    pub allow_duplicates: bool,
    /// `(component index, rule)`
    pub rules: Vec<(usize, ConfigRule)>,
    pub requires: Option<String>,
}

impl BindingProperty {
    pub fn rules_for(&self, component: usize) -> impl Iterator<Item = ConfigRule> + '_ {
        self.rules
            .iter()
            .filter(move |(index, _)| *index == component)
            .map(|(_, rule)| *rule)
    }

    /// The boolean that makes an emit-empty property write its opcode.
    pub fn emit_empty_when(&self) -> Option<bool> {
        self.rules_for(0).find_map(|rule| match rule {
            ConfigRule::EmitEmptyIfTrue => Some(true),
            ConfigRule::EmitEmptyIfFalse => Some(false),
            _ => None,
        })
    }
}

/// The properties a config file kind accepts, resolved from its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBinding {
    pub group: PrimitiveType,
    pub content_type: Option<String>,
    properties: IndexMap<String, BindingProperty>,
}

impl ConfigBinding {
    pub fn from_settings(settings: &BindingSettings) -> Result<Self, String> {
        let group = PrimitiveType::for_name(&settings.group)
            .filter(|t| t.is_config_type())
            .ok_or_else(|| format!("'{}' is not a config type", settings.group))?;

        let mut properties = IndexMap::new();
        for property in &settings.properties {
            for resolved in resolve_property(property)? {
                if properties.contains_key(&resolved.name) {
                    return Err(format!("Property '{}' is bound twice", resolved.name));
                }
                properties.insert(resolved.name.clone(), resolved);
            }
        }

        for property in properties.values() {
            if let Some(required) = &property.requires {
                if !properties.contains_key(required) {
                    return Err(format!(
                        "Property '{}' requires unknown property '{required}'",
                        property.name
                    ));
                }
            }
        }
        if let Some(name) = &settings.content_type {
            let property = properties
                .get(name)
                .ok_or_else(|| format!("Content type property '{name}' is not bound"))?;
            if property.components != [PrimitiveType::Type] {
                return Err(format!("Content type property '{name}' must take a single type"));
            }
        }

        Ok(Self {
            group,
            content_type: settings.content_type.clone(),
            properties,
        })
    }

    pub fn property(&self, name: &str) -> Option<&BindingProperty> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &BindingProperty> {
        self.properties.values()
    }
}

fn resolve_property(settings: &PropertySettings) -> Result<Vec<BindingProperty>, String> {
    let mut components = Vec::with_capacity(settings.components.len());
    for name in &settings.components {
        let ty = PrimitiveType::for_name(name)
            .filter(|t| t.serializer().is_some())
            .ok_or_else(|| format!("Property '{}' has an unusable component type '{name}'", settings.name))?;
        components.push(ty);
    }
    if components.is_empty() {
        return Err(format!("Property '{}' has no components", settings.name));
    }

    let mut rules = Vec::with_capacity(settings.rules.len());
    for rule in &settings.rules {
        let component = components
            .get(rule.component)
            .ok_or_else(|| format!("Property '{}' has no component {}", settings.name, rule.component))?;
        let rule_kind = ConfigRule::from(&rule.rule);
        match rule_kind {
            ConfigRule::EmitEmptyIfTrue | ConfigRule::EmitEmptyIfFalse
                if components != [PrimitiveType::Boolean] =>
            {
                return Err(format!(
                    "Property '{}' can only emit empty with a single boolean component",
                    settings.name
                ));
            }
            ConfigRule::Range { .. } | ConfigRule::Positive
                if !component.implicit_equals(PrimitiveType::Int) =>
            {
                return Err(format!("Property '{}' has a numeric rule on a non-int component", settings.name));
            }
            _ => {}
        }
        rules.push((rule.component, rule_kind));
    }

    let make = |name: String| BindingProperty {
        name,
        opcode: settings.opcode,
        components: components.clone(),
        required: settings.required,
        allow_duplicates: settings.allow_duplicates,
        rules: rules.clone(),
        requires: settings.requires.clone(),
    };
    Ok(match settings.repeat {
        None => vec![make(settings.name.clone())],
        Some(count) => (1..=count).map(|n| make(format!("{}{n}", settings.name))).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::settings::{ComponentRule, CompilerSettings};

    fn property(name: &str, components: &[&str]) -> PropertySettings {
        PropertySettings {
            name: name.into(),
            opcode: 10,
            components: components.iter().map(|c| (*c).to_string()).collect(),
            required: false,
            allow_duplicates: false,
            rules: Vec::new(),
            requires: None,
            repeat: None,
        }
    }

    #[test]
    fn default_param_binding() {
        let settings = CompilerSettings::default();
        let binding = ConfigBinding::from_settings(settings.binding("param").unwrap()).unwrap();
        assert_eq!(binding.group, PrimitiveType::Param);
        assert!(binding.property("type").unwrap().required);
        assert_eq!(binding.property("autodisable").unwrap().emit_empty_when(), Some(false));
        assert_eq!(binding.property("default_str").unwrap().components, vec![PrimitiveType::String]);
    }

    #[test]
    fn repeat_expands_names() {
        let mut op = property("op", &["string"]);
        op.repeat = Some(3);
        let binding = ConfigBinding::from_settings(&BindingSettings {
            group: "obj".into(),
            content_type: None,
            properties: vec![op],
        })
        .unwrap();
        let names: Vec<&str> = binding.properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["op1", "op2", "op3"]);
        assert!(binding.properties().all(|p| p.opcode == 10));
    }

    #[test]
    fn rejects_bad_bindings() {
        let binding = |properties, group: &str| {
            ConfigBinding::from_settings(&BindingSettings {
                group: group.into(),
                content_type: None,
                properties,
            })
        };
        assert!(binding(vec![property("a", &["int"])], "int").is_err());
        assert!(binding(vec![property("a", &["nonsense"])], "obj").is_err());

        let mut emit = property("a", &["int"]);
        emit.rules.push(ComponentRule {
            component: 0,
            rule: RuleSettings::EmitEmptyIfTrue,
        });
        assert!(binding(vec![emit], "obj").is_err());

        let mut requires = property("a", &["int"]);
        requires.requires = Some("missing".into());
        assert!(binding(vec![requires], "obj").is_err());
    }
}
