//! Canonical source printer.
//!
//! Header (metadata and imports) first, then terms, then sections and
//! assignments in source order. Annotations are re-emitted above the key
//! they belong to; ordinary comments are not preserved.

use std::fmt::Write;

use crate::ast::{Annotation, Assignment, Condition, Expression, Program, Statement};
use crate::lexer::{TokenKind, tokenize};

const INDENT: &str = "    ";

pub fn format_program(program: &Program) -> String {
    let mut out = String::new();

    for stmt in &program.statements {
        match stmt {
            Statement::Metadata(meta) => {
                let _ = writeln!(out, "@{}: {}", meta.key, metadata_value(&meta.value));
            }
            Statement::Import(import) => {
                let _ = writeln!(out, "@import {}", import.namespace);
            }
            _ => {}
        }
    }

    let mut wrote_terms = false;
    for stmt in &program.statements {
        if let Statement::Term(term) = stmt {
            if !wrote_terms && !out.is_empty() {
                out.push('\n');
            }
            wrote_terms = true;
            let _ = writeln!(out, "-{} = {}", term.name, quote(&term.value));
        }
    }

    let mut section: Option<&str> = None;
    let mut body_started = false;
    for stmt in &program.statements {
        match stmt {
            Statement::Section(s) => {
                if !out.is_empty() {
                    out.push('\n');
                }
                let _ = writeln!(out, "[{}]", s.name);
                section = Some(s.name.as_str());
                body_started = true;
            }
            Statement::Assign(assign) => {
                if !body_started && !out.is_empty() {
                    out.push('\n');
                }
                body_started = true;
                let key = match section {
                    Some(section) => format!("{section}.{}", assign.name),
                    None => assign.name.clone(),
                };
                for ann in program.annotations_for(&key) {
                    write_annotation(&mut out, ann);
                }
                write_assignment(&mut out, assign);
            }
            _ => {}
        }
    }

    let unbound: Vec<_> = program
        .annotations
        .iter()
        .filter(|ann| ann.target.is_none())
        .collect();
    if !unbound.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        for ann in unbound {
            write_annotation(&mut out, ann);
        }
    }

    out
}

fn write_assignment(out: &mut String, assign: &Assignment) {
    match &assign.value {
        Expression::Str(text) => {
            let _ = writeln!(out, "{} = {}", assign.name, quote(text));
        }
        Expression::TermRef(name) => {
            let _ = writeln!(out, "{} = {{-{name}}}", assign.name);
        }
        Expression::Block(block) => {
            let _ = writeln!(out, "{}({}) {{", assign.name, block.argument);
            for case in &block.cases {
                let condition = match &case.condition {
                    Condition::Keyword(word) => word.clone(),
                    Condition::Exact(n) => n.to_string(),
                    Condition::Range { start, end } => format!("{start}..{end}"),
                };
                let _ = writeln!(out, "{INDENT}[{condition}] => {}", quote(&case.value));
            }
            out.push_str("}\n");
        }
    }
}

fn write_annotation(out: &mut String, ann: &Annotation) {
    if ann.value.contains('\n') || ann.value.starts_with('{') {
        let _ = writeln!(out, "# AI_{}: {{", ann.kind);
        for line in ann.value.lines() {
            let _ = writeln!(out, "#   {line}");
        }
        out.push_str("# }\n");
    } else {
        let _ = writeln!(out, "# AI_{}: {}", ann.kind, ann.value);
    }
}

/// Strings with a newline or a double quote need the triple-quoted form.
fn quote(text: &str) -> String {
    if text.contains('\n') || text.contains('"') {
        format!("\"\"\"{text}\"\"\"")
    } else {
        format!("\"{text}\"")
    }
}

/// Metadata values stay bare when they lex back as one identifier or number.
fn metadata_value(value: &str) -> String {
    let tokens = tokenize(value);
    match tokens.as_slice() {
        [single, eof]
            if matches!(single.kind, TokenKind::Ident | TokenKind::Number)
                && single.literal == value
                && eof.is(TokenKind::Eof) =>
        {
            value.to_string()
        }
        _ => quote(value),
    }
}
