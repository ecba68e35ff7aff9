//! Annotation-driven validation of parsed programs.

use std::collections::HashMap;

use crate::ast::{Assignment, Expression, Program, Statement};
use crate::diagnostic::Diagnostic;

pub const MAX_LENGTH_EXCEEDED: &str = "L0001";
pub const INVALID_LIMIT: &str = "L0002";

/// Check every `AI_MaxLength: N` annotation against the key it is bound to.
///
/// Lengths count characters. In a logic block each case is checked.
pub fn validate(program: &Program) -> Vec<Diagnostic> {
    let assignments = qualified_assignments(program);
    let mut diagnostics = Vec::new();

    for ann in &program.annotations {
        if ann.kind != "MaxLength" {
            continue;
        }
        let Some(assign) = ann.target.as_deref().and_then(|key| assignments.get(key)) else {
            continue;
        };
        let Ok(limit) = ann.value.trim().parse::<usize>() else {
            diagnostics.push(
                Diagnostic::warning(
                    format!("AI_MaxLength value `{}` is not a length", ann.value),
                    ann.line,
                    1,
                )
                .with_code(INVALID_LIMIT),
            );
            continue;
        };

        let key = ann.target.as_deref().unwrap_or(&assign.name);
        for (text, line) in candidate_texts(assign) {
            let length = text.chars().count();
            if length > limit {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{key} exceeds max length of {limit} (got {length})"),
                        line,
                        assign.column,
                    )
                    .with_code(MAX_LENGTH_EXCEEDED),
                );
            }
        }
    }

    diagnostics
}

fn qualified_assignments(program: &Program) -> HashMap<String, &Assignment> {
    let mut section: Option<&str> = None;
    let mut out = HashMap::new();
    for stmt in &program.statements {
        match stmt {
            Statement::Section(s) => section = Some(s.name.as_str()),
            Statement::Assign(assign) => {
                let key = match section {
                    Some(section) => format!("{section}.{}", assign.name),
                    None => assign.name.clone(),
                };
                out.insert(key, assign);
            }
            _ => {}
        }
    }
    out
}

fn candidate_texts(assign: &Assignment) -> Vec<(&str, u32)> {
    match &assign.value {
        Expression::Str(text) => vec![(text.as_str(), assign.line)],
        Expression::Block(block) => block
            .cases
            .iter()
            .map(|case| (case.value.as_str(), case.line))
            .collect(),
        Expression::TermRef(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lint(source: &str) -> Vec<Diagnostic> {
        validate(&parse(source).into_program().expect("parse"))
    }

    #[test]
    fn flags_strings_over_the_limit() {
        let diags = lint("[auth]\n# AI_MaxLength: 5\nlogin = \"Zaloguj się\"\nshort = \"abcdefghij\"\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(MAX_LENGTH_EXCEEDED));
        assert_eq!(diags[0].line, 3);
        assert!(diags[0].message.contains("auth.login"));
        assert!(diags[0].message.contains("got 11"));
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert!(lint("# AI_MaxLength: 5\nx = \"żółty\"\n").is_empty());
    }

    #[test]
    fn checks_each_case_of_a_block() {
        let diags = lint("# AI_MaxLength: 4\nitems(n) {\n [one] => \"item\"\n [other] => \"items\"\n}\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 4);
    }

    #[test]
    fn bad_limit_is_a_warning() {
        let diags = lint("# AI_MaxLength: short\nx = \"abc\"\n");
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
        assert_eq!(diags[0].code, Some(INVALID_LIMIT));
    }

    #[test]
    fn other_annotations_are_ignored() {
        assert!(lint("# AI_Context: anything\nx = \"a very long string indeed\"\n").is_empty());
    }
}
