use std::path::Path;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::project::{read_json, write_json, ProjectError};

pub const SETTINGS_VERSION: u32 = 1;

// ── Scripts ──────────────────────────────────────────────────────

/// How a script of a trigger type is invoked from another script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Returns to the caller (`GOSUB_WITH_PARAMS`).
    Gosub,
    /// Transfers control without returning (`JUMP_WITH_PARAMS`).
    Jump,
}

/// An additional trigger type on top of `proc`, `label` and `clientscript`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerSettings {
    pub name: String,
    /// Call operator character, e.g. `~`. Must be one of the language separators.
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub call: Option<CallKind>,
    #[serde(default)]
    pub params: bool,
    #[serde(default)]
    pub returns: bool,
}

/// A native command exposed to scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandSettings {
    pub name: String,
    pub opcode: u16,
    /// Argument type names; `hook` marks a hook parameter.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub returns: Vec<String>,
    /// Dot-call form (`.name(...)`), emitted with operand 1.
    #[serde(default)]
    pub alternative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GlobalDomain {
    Player,
    PlayerBit,
    ClientInt,
    ClientString,
}

/// A global (`%name`) variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GlobalSettings {
    pub name: String,
    pub domain: GlobalDomain,
    #[serde(rename = "type")]
    pub ty: String,
    pub id: i32,
}

// ── Configs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSettings {
    /// The component value must lie within `[min, max]`.
    Range { min: i32, max: i32 },
    /// The component value must be at least 1.
    Positive,
    /// Write the opcode alone when the boolean is true, nothing otherwise.
    EmitEmptyIfTrue,
    /// Write the opcode alone when the boolean is false, nothing otherwise.
    EmitEmptyIfFalse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentRule {
    #[serde(default)]
    pub component: usize,
    pub rule: RuleSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PropertySettings {
    pub name: String,
    pub opcode: u8,
    /// Component type names in order.
    pub components: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default)]
    pub rules: Vec<ComponentRule>,
    /// Another property that must be present when this one is.
    #[serde(default)]
    pub requires: Option<String>,
    /// Expand into `name1..nameN`, all sharing one opcode.
    #[serde(default)]
    pub repeat: Option<u32>,
}

/// Describes the properties of one config file kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BindingSettings {
    /// Type of the configs this binding declares, e.g. `obj`.
    pub group: String,
    /// Property whose type value is the config's content type.
    #[serde(default)]
    pub content_type: Option<String>,
    pub properties: Vec<PropertySettings>,
}

fn param_binding() -> BindingSettings {
    let property = |name: &str, opcode: u8, component: &str| PropertySettings {
        name: name.to_string(),
        opcode,
        components: vec![component.to_string()],
        required: false,
        allow_duplicates: false,
        rules: Vec::new(),
        requires: None,
        repeat: None,
    };
    let mut ty = property("type", 1, "type");
    ty.required = true;
    let mut autodisable = property("autodisable", 4, "boolean");
    autodisable.rules.push(ComponentRule {
        component: 0,
        rule: RuleSettings::EmitEmptyIfFalse,
    });
    BindingSettings {
        group: "param".to_string(),
        content_type: Some("type".to_string()),
        properties: vec![
            ty,
            property("default_int", 2, "int"),
            autodisable,
            property("default_str", 5, "string"),
        ],
    }
}

// ── Compiler settings ────────────────────────────────────────────

/// Everything the compiler needs to know about the target runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CompilerSettings {
    pub version: u32,
    /// Whether the runtime has a long stack. Long locals and operands are rejected otherwise.
    pub supports_long_primitive_type: bool,
    /// Arrays a single script may declare.
    pub array_capacity: usize,
    pub optimize: bool,
    pub max_optimizer_iterations: usize,
    pub script_extensions: Vec<String>,
    pub constant_extension: String,
    pub triggers: Vec<TriggerSettings>,
    pub commands: Vec<CommandSettings>,
    pub globals: Vec<GlobalSettings>,
    /// Config bindings keyed by file extension.
    pub configs: IndexMap<String, BindingSettings>,
    /// Overrides of the core opcode numbering, keyed by opcode name (`PUSH_INT_CONSTANT`).
    pub opcodes: IndexMap<String, u16>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        let mut configs = IndexMap::new();
        configs.insert("param".to_string(), param_binding());
        Self {
            version: SETTINGS_VERSION,
            supports_long_primitive_type: true,
            array_capacity: 5,
            optimize: true,
            max_optimizer_iterations: 64,
            script_extensions: vec!["rs2".to_string(), "cs2".to_string()],
            constant_extension: "constant".to_string(),
            triggers: Vec::new(),
            commands: Vec::new(),
            globals: Vec::new(),
            configs,
            opcodes: IndexMap::new(),
        }
    }
}

impl CompilerSettings {
    pub fn is_script_extension(&self, extension: &str) -> bool {
        self.script_extensions.iter().any(|e| e == extension)
    }

    pub fn binding(&self, extension: &str) -> Option<&BindingSettings> {
        self.configs.get(extension)
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<CompilerSettings, ProjectError> {
    if !path.exists() {
        return Ok(CompilerSettings::default());
    }
    let settings: CompilerSettings = read_json(path)?;
    if settings.version > SETTINGS_VERSION {
        return Err(ProjectError::InvalidProject(format!(
            "Settings version {} is newer than supported version {}",
            settings.version, SETTINGS_VERSION
        )));
    }
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &CompilerSettings) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_json(path, settings)
}

/// JSON schema of the settings file.
pub fn settings_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(CompilerSettings)
}
