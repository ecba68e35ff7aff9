use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{Condition, Expression, LogicBlockExpr, Program, Statement};
use crate::error::CoreError;
use crate::parser::parse;
use crate::table::{
    AnnotationEntry, CompiledTable, CompiledValue, GLOBAL_ANNOTATIONS, LogicBlock, RangeCase,
};

/// Lex, parse and compile a single source file.
///
/// Any parser error fails the whole file with every diagnostic attached.
pub fn compile_source(source: &str) -> Result<CompiledTable, CoreError> {
    let program = parse(source).into_program()?;
    compile(&program)
}

/// Lower a parsed program into a compiled table.
pub fn compile(program: &Program) -> Result<CompiledTable, CoreError> {
    let mut table = CompiledTable::new();

    for stmt in &program.statements {
        if let Statement::Metadata(meta) = stmt {
            table.meta.insert(meta.key.clone(), meta.value.clone());
        }
    }

    let mut section: Option<&str> = None;
    let mut seen_terms = BTreeSet::new();
    for stmt in &program.statements {
        match stmt {
            Statement::Section(s) => section = Some(s.name.as_str()),
            Statement::Assign(assign) => {
                let key = match section {
                    Some(section) => format!("{section}.{}", assign.name),
                    None => assign.name.clone(),
                };
                let value = compile_expression(&key, &assign.value)?;
                table.insert(key, value, assign.line)?;
            }
            Statement::Term(term) => {
                if !seen_terms.insert(term.name.as_str()) {
                    return Err(CoreError::DuplicateTerm {
                        name: term.name.clone(),
                        line: term.line,
                    });
                }
            }
            Statement::Metadata(_) | Statement::Import(_) => {}
        }
    }

    table.terms = program
        .terms
        .iter()
        .map(|(name, term)| (name.clone(), term.value.clone()))
        .collect();
    table.imports = program.imports.clone();

    for ann in &program.annotations {
        let bucket = ann.target.as_deref().unwrap_or(GLOBAL_ANNOTATIONS);
        table
            .annotations
            .entry(bucket.to_string())
            .or_default()
            .push(AnnotationEntry {
                kind: ann.kind.clone(),
                value: ann.value.clone(),
            });
    }

    debug!(
        keys = table.len(),
        terms = table.terms.len(),
        annotations = program.annotations.len(),
        "compiled program"
    );
    Ok(table)
}

fn compile_expression(key: &str, expr: &Expression) -> Result<CompiledValue, CoreError> {
    match expr {
        // Placeholders stay in place; arguments are only known at lookup time.
        Expression::Str(text) => Ok(CompiledValue::Text(text.clone())),
        Expression::TermRef(name) => Ok(CompiledValue::Text(format!("{{-{name}}}"))),
        Expression::Block(block) => compile_block(key, block).map(CompiledValue::Block),
    }
}

fn compile_block(key: &str, block: &LogicBlockExpr) -> Result<LogicBlock, CoreError> {
    let mut compiled = LogicBlock {
        argument: block.argument.clone(),
        ..LogicBlock::default()
    };

    for case in &block.cases {
        match &case.condition {
            Condition::Range { start, end } => {
                if start > end {
                    return Err(CoreError::InvalidRange {
                        key: key.to_string(),
                        start: *start,
                        end: *end,
                        line: case.line,
                    });
                }
                compiled.ranges.push(RangeCase {
                    start: *start,
                    end: *end,
                    value: case.value.clone(),
                });
            }
            literal => {
                if let Some(condition) = literal.literal_key() {
                    compiled.cases.insert(condition, case.value.clone());
                }
            }
        }
    }

    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_strings_with_section_prefix() {
        let table = compile_source("@lang: pl\ntitle = \"Aplikacja\"\n[auth]\nlogin = \"Zaloguj\"\nlogout = \"Wyloguj\"\n")
            .expect("compile");
        assert_eq!(table.language(), Some("pl"));
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec!["auth.login", "auth.logout", "title"]
        );
        assert_eq!(
            table.get("auth.login"),
            Some(&CompiledValue::Text("Zaloguj".to_string()))
        );
    }

    #[test]
    fn metadata_is_collected_before_assignments() {
        let table = compile_source("a = \"x\"\n@lang: de\n").expect("compile");
        assert_eq!(table.language(), Some("de"));
        assert!(!table.contains_key("lang"));
    }

    #[test]
    fn placeholders_are_left_for_the_runtime() {
        let table = compile_source("hello = \"Hi {name}, welcome to {-brand}\"\n").expect("compile");
        assert_eq!(
            table.get("hello"),
            Some(&CompiledValue::Text("Hi {name}, welcome to {-brand}".to_string()))
        );
    }

    #[test]
    fn compiles_block_with_ordered_ranges() {
        let table = compile_source(
            "age(n) {\n [0] => \"newborn\"\n [13..19] => \"teen\"\n [1..12] => \"child\"\n [other] => \"adult\"\n}\n",
        )
        .expect("compile");
        let Some(CompiledValue::Block(block)) = table.get("age") else {
            panic!("expected block");
        };
        assert_eq!(block.argument, "n");
        assert_eq!(block.cases["0"], "newborn");
        assert_eq!(block.cases["other"], "adult");
        let starts: Vec<_> = block.ranges.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![13, 1]);
    }

    #[test]
    fn side_data_goes_to_reserved_fields() {
        let table = compile_source(
            "@import common\n-brand = \"Acme\"\n# AI_Context: Page title\ntitle = {-brand}\n# AI_Tone: loose\n",
        )
        .expect("compile");
        assert_eq!(table.terms["brand"], "Acme");
        assert_eq!(table.imports, vec!["common".to_string()]);
        assert_eq!(table.annotations["title"][0].kind, "Context");
        assert_eq!(table.annotations[GLOBAL_ANNOTATIONS][0].value, "loose");
        assert_eq!(
            table.get("title"),
            Some(&CompiledValue::Text("{-brand}".to_string()))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn inverted_range_is_a_compile_error() {
        let err = compile_source("x(n) {\n [5..2] => \"bad\"\n}\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidRange { start: 5, end: 2, line: 2, .. }
        ));
    }

    #[test]
    fn duplicate_keys_and_terms_are_rejected() {
        assert!(matches!(
            compile_source("a = \"1\"\na = \"2\"\n"),
            Err(CoreError::DuplicateKey { line: 2, .. })
        ));
        assert!(matches!(
            compile_source("-t = \"1\"\n-t = \"2\"\n"),
            Err(CoreError::DuplicateTerm { .. })
        ));
    }

    #[test]
    fn reserved_prefix_is_rejected() {
        assert!(matches!(
            compile_source("__meta = \"x\"\n"),
            Err(CoreError::ReservedKey { .. })
        ));
    }

    #[test]
    fn same_name_in_different_sections_is_fine() {
        let table = compile_source("[a]\ntitle = \"A\"\n[b]\ntitle = \"B\"\n").expect("compile");
        assert!(table.contains_key("a.title"));
        assert!(table.contains_key("b.title"));
    }

    #[test]
    fn syntax_errors_fail_with_all_diagnostics() {
        let err = compile_source("a \"x\"\nb \"y\"\n").unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
    }
}
