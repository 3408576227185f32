use super::ast::ScriptFile;
use super::env::CompilerEnvironment;
use super::error::CompileError;
use super::symbol::SymbolTable;

/// Register every script of `file` so calls across the batch resolve
/// regardless of declaration order.
pub fn define_scripts(
    file: &ScriptFile,
    env: &CompilerEnvironment,
    symbols: &mut SymbolTable<'_>,
    errors: &mut Vec<CompileError>,
) {
    for script in &file.scripts {
        let trigger_name = &script.trigger.text;
        let Some(trigger) = env.lookup(trigger_name) else {
            errors.push(CompileError::semantic(
                format!("{trigger_name} cannot be resolved to a trigger type"),
                script.trigger.span,
            ));
            continue;
        };
        if !trigger.allows_params && !script.params.is_empty() {
            errors.push(CompileError::semantic(
                format!("The trigger type '{trigger_name}' does not allow parameters"),
                script.name.span,
            ));
        }
        if !trigger.allows_returns && !script.returns.flatten().is_empty() {
            errors.push(CompileError::semantic(
                format!("The trigger type '{trigger_name}' does not allow return values"),
                script.name.span,
            ));
        }
        if symbols
            .define_script(trigger_name, &script.name.text, script.param_types(), script.returns.clone())
            .is_none()
        {
            errors.push(CompileError::semantic(
                format!("The script '{}' is already defined", script.full_name()),
                script.name.span,
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_scripts;
    use crate::dsl::tokenizer::LexicalTable;
    use crate::dsl::types::{PrimitiveType, Type};

    fn define(src: &str, symbols: &mut SymbolTable<'_>) -> Vec<CompileError> {
        let table = LexicalTable::scripts();
        let env = CompilerEnvironment::default();
        let (file, errors) = parse_scripts(src, &table, &env, None);
        assert!(errors.is_empty(), "{errors:?}");
        let mut errors = Vec::new();
        define_scripts(&file, &env, symbols, &mut errors);
        errors
    }

    #[test]
    fn registers_signatures() {
        let mut symbols = SymbolTable::new();
        let errors = define("[proc,a](int $x)(string) return(\"\");\n[label,b]", &mut symbols);
        assert!(errors.is_empty(), "{errors:?}");
        let info = symbols.lookup_script("proc", "a").unwrap();
        assert_eq!(info.params, vec![PrimitiveType::Int]);
        assert_eq!(info.returns, Type::Primitive(PrimitiveType::String));
        assert_eq!(symbols.lookup_script("label", "b").unwrap().id, 1);
    }

    #[test]
    fn duplicates_and_trigger_rules() {
        let mut symbols = SymbolTable::new();
        let errors = define("[proc,a]\n[proc,a]\n[label,l](int)\n[nothing,x]", &mut symbols);
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "The script '[proc,a]' is already defined",
                "The trigger type 'label' does not allow return values",
                "nothing cannot be resolved to a trigger type",
            ]
        );
        assert!(symbols.lookup_script("label", "l").is_some());
    }
}
