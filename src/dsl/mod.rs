#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod span;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod types;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod tokenizer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod env;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod symbol;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod scope;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod precheck;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod typeck;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ir;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod codegen;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod optimize;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod writer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod config;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::error::AppError;
use crate::paths;
use crate::project::SourceFile;
use crate::settings::CompilerSettings;
use ast::{Script, ScriptFile};
use config::ast::{Config, ConfigFile};
use config::binding::ConfigBinding;
use config::codegen::BinaryConfig;
use env::CompilerEnvironment;
use error::CompileError;
use ir::{BinaryScript, InstructionMap};
use optimize::Optimizer;
use span::Span;
use symbol::{CommandInfo, GlobalInfo, SymbolTable};
use tokenizer::LexicalTable;
use types::{PrimitiveType, Type};

// ── Batch input / output ─────────────────────────────────────────

/// One batch of source files compiled against a shared symbol table.
#[derive(Debug, Clone)]
pub struct Input {
    pub files: Vec<SourceFile>,
    /// `false` checks the batch without generating code.
    pub run_codegen: bool,
}

impl Input {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            run_codegen: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledScript {
    pub syntax: Script,
    /// Optimized IR, when code generation ran.
    pub code: Option<BinaryScript>,
    pub bytecode: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledConfig {
    pub syntax: Config,
    pub binary: Option<BinaryConfig>,
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutput {
    pub location: PathBuf,
    pub name: String,
    pub extension: String,
    /// Decoded source text, for rendering error positions.
    #[serde(skip)]
    pub source: String,
    /// CRC-32 of the raw source bytes.
    pub crc: u32,
    pub scripts: Vec<CompiledScript>,
    pub configs: Vec<CompiledConfig>,
    pub errors: Vec<CompileError>,
}

impl FileOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Output {
    pub files: Vec<FileOutput>,
    /// Set when compilation stopped early; `files` holds what completed.
    pub cancelled: bool,
}

impl Output {
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.errors.len()).sum()
    }

    /// Every generated binary with its output file name.
    pub fn artifacts(&self) -> Vec<(String, &[u8])> {
        let mut artifacts = Vec::new();
        for file in &self.files {
            for script in &file.scripts {
                if let Some(bytes) = &script.bytecode {
                    let name = paths::script_output_name(&script.syntax.trigger.text, &script.syntax.name.text);
                    artifacts.push((name, bytes.as_slice()));
                }
            }
            for config in &file.configs {
                if let Some(bytes) = &config.bytes {
                    let name = paths::config_output_name(&file.extension, &config.syntax.name.text);
                    artifacts.push((name, bytes.as_slice()));
                }
            }
        }
        artifacts
    }
}

// ── Compiler ─────────────────────────────────────────────────────

enum Parsed {
    Scripts(ScriptFile),
    Configs(ConfigFile),
    Constants(ConfigFile),
    Unsupported,
}

struct Unit<'i> {
    file: &'i SourceFile,
    source: String,
    parsed: Parsed,
    errors: Vec<CompileError>,
}

fn resolve_type(name: &str, owner: &str) -> Result<PrimitiveType, AppError> {
    PrimitiveType::for_representation(name).ok_or_else(|| AppError::settings(format!("{owner}: unknown type '{name}'")))
}

/// A compiler for one target runtime. Building it validates the settings
/// once; every `compile` call then works on its own symbol sub-table, so a
/// compiler can be reused for any number of batches.
pub struct Compiler {
    settings: CompilerSettings,
    script_table: LexicalTable,
    config_table: LexicalTable,
    env: CompilerEnvironment,
    instructions: InstructionMap,
    symbols: SymbolTable<'static>,
    bindings: IndexMap<String, ConfigBinding>,
}

impl Compiler {
    pub fn new(settings: &CompilerSettings) -> Result<Self, AppError> {
        let script_table = LexicalTable::scripts();
        let config_table = LexicalTable::configs();
        let env = CompilerEnvironment::from_settings(&settings.triggers, &script_table).map_err(AppError::settings)?;

        let (instructions, unknown) = InstructionMap::with_overrides(&settings.opcodes);
        if !unknown.is_empty() {
            return Err(AppError::settings(format!("Unknown opcodes: {}", unknown.join(", "))));
        }

        let mut symbols = SymbolTable::new();
        for command in &settings.commands {
            let owner = format!("command {}", command.name);
            let args = command
                .args
                .iter()
                .map(|t| resolve_type(t, &owner))
                .collect::<Result<Vec<_>, _>>()?;
            let returns = command
                .returns
                .iter()
                .map(|t| resolve_type(t, &owner))
                .collect::<Result<Vec<_>, _>>()?;
            let defined = symbols.define_command(CommandInfo {
                name: command.name.clone(),
                opcode: command.opcode,
                args,
                returns: Type::from_flat(returns),
                alternative: command.alternative,
            });
            if !defined {
                return Err(AppError::settings(format!("Duplicate command: {}", command.name)));
            }
        }
        for global in &settings.globals {
            let ty = resolve_type(&global.ty, &format!("global {}", global.name))?;
            let defined = symbols.define_global(GlobalInfo {
                name: global.name.clone(),
                domain: global.domain,
                ty,
                id: global.id,
            });
            if !defined {
                return Err(AppError::settings(format!("Duplicate global: {}", global.name)));
            }
        }

        let mut bindings = IndexMap::new();
        for (extension, binding) in &settings.configs {
            let binding = ConfigBinding::from_settings(binding)
                .map_err(|message| AppError::settings(format!("config binding '{extension}': {message}")))?;
            bindings.insert(extension.clone(), binding);
        }

        debug!(
            commands = settings.commands.len(),
            globals = settings.globals.len(),
            bindings = bindings.len(),
            "compiler ready"
        );
        Ok(Self {
            settings: settings.clone(),
            script_table,
            config_table,
            env,
            instructions,
            symbols,
            bindings,
        })
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn script_table(&self) -> &LexicalTable {
        &self.script_table
    }

    /// Whether files with `extension` are compiled by this compiler.
    pub fn accepts(&self, extension: &str) -> bool {
        self.settings.is_script_extension(extension)
            || extension == self.settings.constant_extension
            || self.bindings.contains_key(extension)
    }

    pub fn compile(&self, input: &Input) -> Output {
        self.compile_with_cancel(input, &AtomicBool::new(false))
    }

    /// Compile a batch, checking `cancel` before each unit of every stage.
    pub fn compile_with_cancel(&self, input: &Input, cancel: &AtomicBool) -> Output {
        let _batch = info_span!("compile", files = input.files.len()).entered();
        let stop = || cancel.load(Ordering::Relaxed);
        let mut cancelled = false;

        let mut units = Vec::with_capacity(input.files.len());
        for file in &input.files {
            if stop() {
                cancelled = true;
                break;
            }
            units.push(self.parse(file));
        }

        let mut symbols = self.symbols.sub_table();
        if !cancelled {
            cancelled = self.define(&mut units, &mut symbols, &stop);
        }
        if !cancelled {
            cancelled = self.check(&mut units, &symbols, &stop);
        }

        let mut files = Vec::with_capacity(units.len());
        for unit in units {
            let generate = input.run_codegen && !cancelled && unit.errors.is_empty() && !stop();
            files.push(self.generate(unit, &symbols, generate));
        }
        if cancelled || stop() {
            warn!(completed = files.len(), "compilation cancelled");
        }
        let output = Output {
            files,
            cancelled: cancelled || stop(),
        };
        info!(errors = output.error_count(), "batch compiled");
        output
    }

    // ── Stages ───────────────────────────────────────────────────

    fn parse<'i>(&self, file: &'i SourceFile) -> Unit<'i> {
        let mut errors = Vec::new();
        let source = match String::from_utf8(file.content.clone()) {
            Ok(source) => source,
            Err(e) => {
                errors.push(CompileError::lexical("Source is not valid UTF-8", Span::new(0, 0)));
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        let extension = file.extension.as_str();
        let (parsed, parse_errors) = if self.settings.is_script_extension(extension) {
            let (scripts, errors) = parser::parse_scripts(&source, &self.script_table, &self.env, Some(&self.symbols));
            (Parsed::Scripts(scripts), errors)
        } else if extension == self.settings.constant_extension {
            let (constants, errors) = config::parser::parse_constants(&source, &self.config_table);
            (Parsed::Constants(constants), errors)
        } else if self.bindings.contains_key(extension) {
            let (configs, errors) = config::parser::parse_configs(&source, &self.config_table);
            (Parsed::Configs(configs), errors)
        } else {
            let error = CompileError::semantic(format!("Unsupported file extension: '{extension}'"), Span::empty());
            (Parsed::Unsupported, vec![error])
        };
        errors.extend(parse_errors);
        debug!(file = %file.location.display(), errors = errors.len(), "parsed");
        Unit {
            file,
            source,
            parsed,
            errors,
        }
    }

    /// Register every declaration before anything is resolved, so references
    /// work across files regardless of order.
    fn define(&self, units: &mut [Unit<'_>], symbols: &mut SymbolTable<'_>, stop: &dyn Fn() -> bool) -> bool {
        let mut count = 0;
        for unit in units.iter_mut() {
            if stop() {
                return true;
            }
            let before = unit.errors.len();
            match &unit.parsed {
                Parsed::Scripts(file) => precheck::define_scripts(file, &self.env, symbols, &mut unit.errors),
                Parsed::Constants(file) => config::check::define_constants(file, symbols, &mut unit.errors),
                Parsed::Configs(file) => {
                    if let Some(binding) = self.bindings.get(&unit.file.extension) {
                        config::check::define_configs(file, binding, symbols, &mut unit.errors);
                    }
                }
                Parsed::Unsupported => {}
            }
            count += unit.errors.len() - before;
        }
        debug!(errors = count, "declarations defined");
        false
    }

    fn check(&self, units: &mut [Unit<'_>], symbols: &SymbolTable<'_>, stop: &dyn Fn() -> bool) -> bool {
        let mut count = 0;
        for unit in units.iter_mut() {
            if stop() {
                return true;
            }
            let before = unit.errors.len();
            match &mut unit.parsed {
                Parsed::Scripts(file) => {
                    for script in &mut file.scripts {
                        unit.errors
                            .extend(typeck::check_script(script, symbols, self.settings.array_capacity));
                    }
                }
                Parsed::Configs(file) => {
                    if let Some(binding) = self.bindings.get(&unit.file.extension) {
                        unit.errors.extend(config::check::check_configs(file, binding, symbols));
                    }
                }
                Parsed::Constants(_) | Parsed::Unsupported => {}
            }
            count += unit.errors.len() - before;
        }
        debug!(errors = count, "checked");
        false
    }

    fn generate(&self, unit: Unit<'_>, symbols: &SymbolTable<'_>, run: bool) -> FileOutput {
        let Unit {
            file,
            source,
            parsed,
            mut errors,
        } = unit;
        let mut scripts = Vec::new();
        let mut configs = Vec::new();
        match parsed {
            Parsed::Scripts(parsed) => {
                for syntax in parsed.scripts {
                    let (code, bytecode) = if run {
                        match self.generate_script(&syntax, symbols) {
                            Ok((code, bytes)) => (Some(code), Some(bytes)),
                            Err(e) => {
                                errors.push(e);
                                (None, None)
                            }
                        }
                    } else {
                        (None, None)
                    };
                    scripts.push(CompiledScript { syntax, code, bytecode });
                }
            }
            Parsed::Configs(parsed) => {
                let binding = self.bindings.get(&file.extension);
                for syntax in parsed.configs {
                    let (binary, bytes) = match binding.filter(|_| run) {
                        Some(binding) => match config::codegen::generate_config(&syntax, binding, symbols)
                            .and_then(|binary| binary.encode().map(|bytes| (binary, bytes)))
                        {
                            Ok((binary, bytes)) => (Some(binary), Some(bytes)),
                            Err(e) => {
                                errors.push(e);
                                (None, None)
                            }
                        },
                        None => (None, None),
                    };
                    configs.push(CompiledConfig { syntax, binary, bytes });
                }
            }
            Parsed::Constants(_) | Parsed::Unsupported => {}
        }
        FileOutput {
            location: file.location.clone(),
            name: file.name.clone(),
            extension: file.extension.clone(),
            source,
            crc: crc32fast::hash(&file.content),
            scripts,
            configs,
            errors,
        }
    }

    fn generate_script(&self, script: &Script, symbols: &SymbolTable<'_>) -> Result<(BinaryScript, Vec<u8>), CompileError> {
        let mut code = codegen::generate_script(script, symbols, &self.env)?;
        if self.settings.optimize {
            Optimizer::new(self.settings.max_optimizer_iterations).run(&mut code);
        }
        let bytes = writer::write_script(&code, &self.instructions, self.settings.supports_long_primitive_type)
            .map_err(|e| CompileError::internal(format!("{}: {e}", code.name), script.name.span))?;
        debug!(script = %code.name, bytes = bytes.len(), "script generated");
        Ok((code, bytes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::settings::{CommandSettings, GlobalDomain, GlobalSettings};
    use ir::{CoreOpcode, Operand};

    fn settings() -> CompilerSettings {
        let mut settings = CompilerSettings::default();
        settings.commands.push(CommandSettings {
            name: "tostring".into(),
            opcode: 4106,
            args: vec!["int".into()],
            returns: vec!["string".into()],
            alternative: false,
        });
        settings.globals.push(GlobalSettings {
            name: "counter".into(),
            domain: GlobalDomain::Player,
            ty: "int".into(),
            id: 7,
        });
        settings
    }

    fn compile(files: &[(&str, &str)]) -> Output {
        let compiler = Compiler::new(&settings()).unwrap();
        let files = files
            .iter()
            .map(|(path, src)| SourceFile::new(*path, src.as_bytes()))
            .collect();
        compiler.compile(&Input::new(files))
    }

    fn listing(script: &CompiledScript) -> Vec<String> {
        script
            .code
            .as_ref()
            .unwrap()
            .instructions()
            .map(|i| format!("{} {}", i.opcode, i.operand))
            .collect()
    }

    #[test]
    fn calc_respects_precedence() {
        let output = compile(&[("a.rs2", "[proc,test](int $parameter)(int) return(calc(1 + $parameter * 5));")]);
        assert_eq!(output.error_count(), 0, "{:?}", output.files[0].errors);
        let script = &output.files[0].scripts[0];
        assert_eq!(
            listing(script),
            [
                "PUSH_INT_CONSTANT 1",
                "PUSH_INT_LOCAL $parameter",
                "PUSH_INT_CONSTANT 5",
                "MUL 0",
                "ADD 0",
                "RETURN 0"
            ]
        );
        assert!(script.bytecode.as_ref().unwrap().starts_with(b"[proc,test]\0"));
    }

    #[test]
    fn proc_and_label_reference_each_other() {
        let output = compile(&[(
            "calls.rs2",
            "[proc,my_proc](int $parameter) @my_label(0);\n[label,my_label](int $parameter) ~my_proc(0);",
        )]);
        assert_eq!(output.error_count(), 0, "{:?}", output.files[0].errors);
        let scripts = &output.files[0].scripts;
        let find = |index: usize, op: CoreOpcode| {
            let code = scripts[index].code.as_ref().unwrap();
            let instruction = code.instructions().find(|i| i.is(op)).unwrap().clone();
            let Operand::Script(target) = instruction.operand else {
                panic!("expected a script operand")
            };
            target
        };
        let jump = find(0, CoreOpcode::JumpWithParams);
        assert_eq!((jump.trigger.as_str(), jump.name.as_str(), jump.id), ("label", "my_label", 1));
        let gosub = find(1, CoreOpcode::GosubWithParams);
        assert_eq!((gosub.trigger.as_str(), gosub.name.as_str(), gosub.id), ("proc", "my_proc", 0));
    }

    #[test]
    fn duplicate_required_property() {
        let output = compile(&[("a.param", "[p]\ntype=int\ntype=int\n")]);
        let errors = &output.files[0].errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, error::ErrorKind::Semantic);
        assert!(errors[0].message.contains("Duplicate property"));
        assert!(output.files[0].configs[0].bytes.is_none());

        let output = compile(&[("a.param", "[p]\ntype=int\ndefault_int=5\n")]);
        assert_eq!(output.error_count(), 0, "{:?}", output.files[0].errors);
        let bytes = output.files[0].configs[0].bytes.as_ref().unwrap();
        assert_eq!(bytes, &[1, b'i', 2, 0, 0, 0, 5, 0]);
    }

    #[test]
    fn forward_references_across_files() {
        let output = compile(&[
            ("a.rs2", "[proc,first] def_int $v = ~second; %counter = $v;"),
            ("b.rs2", "[proc,second](int) return(^limit);"),
            ("limits.constant", "^limit=12"),
        ]);
        assert_eq!(output.error_count(), 0, "{:?}", output.files);
        let first = listing(&output.files[0].scripts[0]);
        assert!(first.contains(&"POP_VARP 7".to_string()), "{first:?}");
        let second = listing(&output.files[1].scripts[0]);
        assert_eq!(second[0], "PUSH_INT_CONSTANT 12");
        assert_eq!(output.artifacts().len(), 2);
    }

    #[test]
    fn errors_suppress_codegen_per_file() {
        let output = compile(&[
            ("bad.rs2", "[proc,bad] def_int $x = \"no\";"),
            ("good.rs2", "[proc,good] def_string $s = tostring(1);"),
        ]);
        assert_eq!(output.files[0].errors.len(), 1);
        assert!(output.files[0].scripts[0].code.is_none());
        assert!(output.files[1].scripts[0].bytecode.is_some());
        let rendered = output.files[0].errors[0].format_with_source(&output.files[0].source);
        assert!(rendered.starts_with("[semantic] line 1:"), "{rendered}");
    }

    #[test]
    fn check_only_and_crc() {
        let compiler = Compiler::new(&settings()).unwrap();
        let mut input = Input::new(vec![SourceFile::new("a.rs2", &b"[proc,a] return;"[..])]);
        input.run_codegen = false;
        let output = compiler.compile(&input);
        assert_eq!(output.error_count(), 0);
        assert!(output.files[0].scripts[0].code.is_none());
        assert_eq!(output.files[0].crc, crc32fast::hash(b"[proc,a] return;"));
        assert!(output.artifacts().is_empty());
    }

    #[test]
    fn cancellation_stops_before_units() {
        let compiler = Compiler::new(&settings()).unwrap();
        let input = Input::new(vec![SourceFile::new("a.rs2", &b"[proc,a]"[..])]);
        let output = compiler.compile_with_cancel(&input, &AtomicBool::new(true));
        assert!(output.cancelled);
        assert!(output.files.is_empty());
    }

    #[test]
    fn unsupported_extension_and_bad_settings() {
        let output = compile(&[("notes.txt", "hello")]);
        assert!(output.files[0].errors[0].message.contains("Unsupported file extension"));

        let mut bad = settings();
        bad.commands[0].args = vec!["nonsense".into()];
        assert!(matches!(Compiler::new(&bad), Err(AppError::Settings { .. })));

        let mut bad = settings();
        bad.opcodes.insert("NOT_AN_OPCODE".into(), 1);
        assert!(matches!(Compiler::new(&bad), Err(AppError::Settings { .. })));
    }

    #[test]
    fn long_stack_can_be_disabled() {
        let mut settings = settings();
        settings.supports_long_primitive_type = false;
        let compiler = Compiler::new(&settings).unwrap();
        let input = Input::new(vec![
            SourceFile::new("a.rs2", &b"[proc,a] def_long $l = 5L;"[..]),
            SourceFile::new("b.rs2", &b"[proc,b] def_int $i = 5;"[..]),
        ]);
        let output = compiler.compile(&input);
        assert_eq!(output.files[0].errors.len(), 1);
        assert_eq!(output.files[0].errors[0].kind, error::ErrorKind::Internal);
        assert!(output.files[1].errors.is_empty());
    }
}
