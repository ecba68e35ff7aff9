use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{Program, Statement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Compiled key → where it was defined. Metadata entries appear as `@key`.
pub type SourceMap = BTreeMap<String, SourceLocation>;

pub fn build_source_map(program: &Program, file: &str) -> SourceMap {
    let location = |line, column| SourceLocation {
        file: file.to_string(),
        line,
        column,
    };

    let mut map = SourceMap::new();
    let mut section: Option<&str> = None;
    for stmt in &program.statements {
        match stmt {
            Statement::Section(s) => section = Some(s.name.as_str()),
            Statement::Assign(assign) => {
                let key = match section {
                    Some(section) => format!("{section}.{}", assign.name),
                    None => assign.name.clone(),
                };
                map.insert(key, location(assign.line, assign.column));
            }
            Statement::Metadata(meta) => {
                map.insert(format!("@{}", meta.key), location(meta.line, meta.column));
            }
            Statement::Import(_) | Statement::Term(_) => {}
        }
    }
    map
}

/// Prefix every non-metadata key with `namespace`, matching a namespaced build.
pub fn namespaced(map: SourceMap, namespace: Option<&str>) -> SourceMap {
    match namespace {
        Some(ns) if !ns.is_empty() => map
            .into_iter()
            .map(|(key, loc)| {
                if key.starts_with('@') {
                    (key, loc)
                } else {
                    (format!("{ns}.{key}"), loc)
                }
            })
            .collect(),
        _ => map,
    }
}
