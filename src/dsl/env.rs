use indexmap::IndexMap;

use super::ir::CoreOpcode;
use super::tokenizer::{Kind, LexicalTable};
use crate::settings::{CallKind, TriggerSettings};

/// The entry-point kind of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerType {
    pub name: String,
    /// Token that introduces a call to a script of this trigger.
    pub operator: Option<Kind>,
    pub call: Option<CoreOpcode>,
    pub allows_params: bool,
    pub allows_returns: bool,
}

/// Trigger types known to one compiler instance.
#[derive(Debug, Clone)]
pub struct CompilerEnvironment {
    triggers: IndexMap<String, TriggerType>,
}

impl Default for CompilerEnvironment {
    fn default() -> Self {
        let mut env = Self {
            triggers: IndexMap::new(),
        };
        env.register(TriggerType {
            name: "proc".into(),
            operator: Some(Kind::Tilde),
            call: Some(CoreOpcode::GosubWithParams),
            allows_params: true,
            allows_returns: true,
        });
        env.register(TriggerType {
            name: "label".into(),
            operator: Some(Kind::At),
            call: Some(CoreOpcode::JumpWithParams),
            allows_params: true,
            allows_returns: false,
        });
        env.register(TriggerType {
            name: "clientscript".into(),
            operator: None,
            call: None,
            allows_params: true,
            allows_returns: false,
        });
        env
    }
}

impl CompilerEnvironment {
    /// Built-in triggers plus the configured ones. Operators that are not
    /// separators of the script language are returned as errors.
    pub fn from_settings(triggers: &[TriggerSettings], table: &LexicalTable) -> Result<Self, String> {
        let mut env = Self::default();
        for trigger in triggers {
            let operator = match trigger.operator.as_deref() {
                None => None,
                Some(text) => {
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(ch), None) => Some(table.separator(ch).ok_or_else(|| {
                            format!("Trigger '{}' uses an unknown operator '{text}'", trigger.name)
                        })?),
                        _ => {
                            return Err(format!(
                                "Trigger '{}' operator must be a single character",
                                trigger.name
                            ))
                        }
                    }
                }
            };
            if let Some(kind) = operator {
                if env.lookup_operator(kind).is_some() {
                    return Err(format!("Trigger '{}' reuses an operator", trigger.name));
                }
            }
            env.register(TriggerType {
                name: trigger.name.clone(),
                operator,
                call: trigger.call.map(|c| match c {
                    CallKind::Gosub => CoreOpcode::GosubWithParams,
                    CallKind::Jump => CoreOpcode::JumpWithParams,
                }),
                allows_params: trigger.params,
                allows_returns: trigger.returns,
            });
        }
        Ok(env)
    }

    pub fn register(&mut self, trigger: TriggerType) {
        self.triggers.insert(trigger.name.clone(), trigger);
    }

    pub fn lookup(&self, name: &str) -> Option<&TriggerType> {
        self.triggers.get(name)
    }

    pub fn lookup_operator(&self, kind: Kind) -> Option<&TriggerType> {
        self.triggers.values().find(|t| t.operator == Some(kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_triggers() {
        let env = CompilerEnvironment::default();
        assert_eq!(env.lookup_operator(Kind::Tilde).unwrap().name, "proc");
        assert_eq!(env.lookup_operator(Kind::At).unwrap().call, Some(CoreOpcode::JumpWithParams));
        assert!(!env.lookup("label").unwrap().allows_returns);
        assert!(env.lookup("clientscript").unwrap().operator.is_none());
    }

    #[test]
    fn configured_trigger_operator() {
        let table = LexicalTable::scripts();
        let triggers = vec![TriggerSettings {
            name: "opnpc1".into(),
            operator: None,
            call: None,
            params: false,
            returns: false,
        }];
        let env = CompilerEnvironment::from_settings(&triggers, &table).unwrap();
        assert!(env.lookup("opnpc1").is_some());

        let clash = vec![TriggerSettings {
            name: "other".into(),
            operator: Some("~".into()),
            call: Some(CallKind::Gosub),
            params: true,
            returns: true,
        }];
        assert!(CompilerEnvironment::from_settings(&clash, &table).is_err());
    }
}
