use indexmap::IndexMap;
use serde::Serialize;

use super::types::{PrimitiveType, Type, Value};
use crate::settings::GlobalDomain;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantInfo {
    pub name: String,
    pub ty: PrimitiveType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub opcode: u16,
    pub args: Vec<PrimitiveType>,
    pub returns: Type,
    pub alternative: bool,
}

impl CommandInfo {
    /// Whether argument `index` takes a hook string.
    pub fn is_hook_arg(&self, index: usize) -> bool {
        self.args.get(index) == Some(&PrimitiveType::Hook)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptInfo {
    pub trigger: String,
    pub name: String,
    pub params: Vec<PrimitiveType>,
    pub returns: Type,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigInfo {
    pub name: String,
    pub ty: PrimitiveType,
    pub content_type: Option<PrimitiveType>,
    /// Sequential per config type.
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalInfo {
    pub name: String,
    pub domain: GlobalDomain,
    pub ty: PrimitiveType,
    pub id: i32,
}

pub fn script_key(trigger: &str, name: &str) -> String {
    format!("[{trigger},{name}]")
}

/// Symbols visible to a compilation. A sub-table borrows its parent; lookups
/// fall back along the chain and definitions only touch the innermost table.
#[derive(Debug, Default)]
pub struct SymbolTable<'p> {
    parent: Option<&'p SymbolTable<'p>>,
    constants: IndexMap<String, ConstantInfo>,
    commands: IndexMap<String, CommandInfo>,
    scripts: IndexMap<String, ScriptInfo>,
    configs: IndexMap<String, ConfigInfo>,
    globals: IndexMap<String, GlobalInfo>,
    next_script_id: i32,
    next_config_ids: IndexMap<PrimitiveType, i32>,
}

impl<'p> SymbolTable<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sub_table(&'p self) -> SymbolTable<'p> {
        SymbolTable {
            parent: Some(self),
            next_script_id: self.next_script_id,
            next_config_ids: self.next_config_ids.clone(),
            ..Self::default()
        }
    }

    // ── Constants ────────────────────────────────────────────────

    /// Returns `false` when the name is already taken anywhere in the chain.
    pub fn define_constant(&mut self, name: &str, ty: PrimitiveType, value: Value) -> bool {
        if self.lookup_constant(name).is_some() {
            return false;
        }
        self.constants.insert(
            name.to_string(),
            ConstantInfo {
                name: name.to_string(),
                ty,
                value,
            },
        );
        true
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&ConstantInfo> {
        self.constants
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup_constant(name)))
    }

    // ── Commands ─────────────────────────────────────────────────

    pub fn define_command(&mut self, info: CommandInfo) -> bool {
        if self.lookup_command(&info.name).is_some() {
            return false;
        }
        self.commands.insert(info.name.clone(), info);
        true
    }

    pub fn lookup_command(&self, name: &str) -> Option<&CommandInfo> {
        self.commands
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup_command(name)))
    }

    // ── Scripts ──────────────────────────────────────────────────

    /// Define a script and assign it the next id. `None` if already defined.
    pub fn define_script(
        &mut self,
        trigger: &str,
        name: &str,
        params: Vec<PrimitiveType>,
        returns: Type,
    ) -> Option<i32> {
        let key = script_key(trigger, name);
        if self.lookup_script(trigger, name).is_some() {
            return None;
        }
        let id = self.next_script_id;
        self.next_script_id += 1;
        self.scripts.insert(
            key,
            ScriptInfo {
                trigger: trigger.to_string(),
                name: name.to_string(),
                params,
                returns,
                id,
            },
        );
        Some(id)
    }

    /// Remove a script from this table, for recompiling it.
    pub fn undefine_script(&mut self, trigger: &str, name: &str) -> Option<ScriptInfo> {
        self.scripts.shift_remove(&script_key(trigger, name))
    }

    pub fn lookup_script(&self, trigger: &str, name: &str) -> Option<&ScriptInfo> {
        self.lookup_script_key(&script_key(trigger, name))
    }

    fn lookup_script_key(&self, key: &str) -> Option<&ScriptInfo> {
        self.scripts
            .get(key)
            .or_else(|| self.parent.and_then(|p| p.lookup_script_key(key)))
    }

    // ── Configs ──────────────────────────────────────────────────

    pub fn define_config(&mut self, name: &str, ty: PrimitiveType, content_type: Option<PrimitiveType>) -> Option<i32> {
        if self.lookup_config(name).is_some() {
            return None;
        }
        let next = self.next_config_ids.entry(ty).or_insert(0);
        let id = *next;
        *next += 1;
        self.configs.insert(
            name.to_string(),
            ConfigInfo {
                name: name.to_string(),
                ty,
                content_type,
                id,
            },
        );
        Some(id)
    }

    /// Set the content type once the config's properties are known.
    pub fn set_content_type(&mut self, name: &str, content_type: PrimitiveType) {
        if let Some(info) = self.configs.get_mut(name) {
            info.content_type = Some(content_type);
        }
    }

    pub fn lookup_config(&self, name: &str) -> Option<&ConfigInfo> {
        self.configs
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup_config(name)))
    }

    // ── Globals ──────────────────────────────────────────────────

    pub fn define_global(&mut self, info: GlobalInfo) -> bool {
        if self.lookup_global(&info.name).is_some() {
            return false;
        }
        self.globals.insert(info.name.clone(), info);
        true
    }

    pub fn lookup_global(&self, name: &str) -> Option<&GlobalInfo> {
        self.globals
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup_global(name)))
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len() + self.parent.map_or(0, SymbolTable::script_count)
    }
}
