//! Multi-file build: discover sources, compile them in parallel, merge.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::compiler::compile_source;
use crate::error::CoreError;
use crate::table::CompiledTable;

pub const SOURCE_EXTENSION: &str = "mbel";

/// One source file queued for compilation.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Dotted prefix for every key of this unit, if any.
    pub namespace: Option<String>,
    pub source: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, namespace: Option<String>, source: impl Into<String>) -> Self {
        SourceUnit {
            path: path.into(),
            namespace,
            source: source.into(),
        }
    }

    /// Read `path` from disk.
    pub fn read(path: impl Into<PathBuf>, namespace: Option<String>) -> Result<Self, CoreError> {
        let path = path.into();
        let source = fs::read_to_string(&path).map_err(|e| CoreError::from(e).in_file(&path))?;
        Ok(SourceUnit {
            path,
            namespace,
            source,
        })
    }
}

#[derive(Debug)]
pub struct UnitFailure {
    pub path: PathBuf,
    pub error: CoreError,
}

#[derive(Debug, Default)]
pub struct BuildOutput {
    pub table: CompiledTable,
    pub failures: Vec<UnitFailure>,
}

impl BuildOutput {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compile every unit, merging the successful ones in input order.
///
/// A failing unit never prevents the others from merging. A key already
/// produced by an earlier unit fails the later one.
pub fn compile_units(units: &[SourceUnit]) -> BuildOutput {
    let compiled: Vec<Result<CompiledTable, CoreError>> = units
        .par_iter()
        .map(|unit| {
            debug!(path = %unit.path.display(), "compiling");
            compile_source(&unit.source)
        })
        .collect();

    let mut output = BuildOutput::default();
    for (unit, result) in units.iter().zip(compiled) {
        let merged = result.and_then(|table| {
            output
                .table
                .merge_namespaced(table, unit.namespace.as_deref())
        });
        if let Err(error) = merged {
            output.failures.push(UnitFailure {
                path: unit.path.clone(),
                error,
            });
        }
    }
    output
}

/// Expand `paths` into the sorted, de-duplicated list of `.mbel` files.
///
/// Directories are walked recursively; plain files are taken as given.
pub fn discover_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, CoreError> {
    let mut files = BTreeSet::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|e| CoreError::from(std::io::Error::from(e)).in_file(path))?;
                if entry.file_type().is_file() && has_source_extension(entry.path()) {
                    files.insert(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.insert(path.to_path_buf());
        } else {
            let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory");
            return Err(CoreError::from(missing).in_file(path));
        }
    }
    Ok(files.into_iter().collect())
}

pub fn has_source_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Dotted namespace of the directories between `base` and `file`.
///
/// `base/features/auth/login.mbel` gives `features.auth`; files directly
/// under `base` (or outside it) have no namespace.
pub fn derive_namespace(file: &Path, base: &Path) -> Option<String> {
    let dir = file.parent()?.strip_prefix(base).ok()?;
    let parts: Vec<_> = dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CompiledValue;

    #[test]
    fn namespace_from_relative_directories() {
        let base = Path::new("locales");
        assert_eq!(
            derive_namespace(Path::new("locales/features/auth/login.mbel"), base),
            Some("features.auth".to_string())
        );
        assert_eq!(derive_namespace(Path::new("locales/app.mbel"), base), None);
        assert_eq!(derive_namespace(Path::new("elsewhere/app.mbel"), base), None);
    }

    #[test]
    fn merges_in_input_order_with_namespaces() {
        let units = vec![
            SourceUnit::new("common.mbel", None, "title = \"App\"\n"),
            SourceUnit::new("auth/login.mbel", Some("auth".into()), "title = \"Login\"\n"),
        ];
        let output = compile_units(&units);
        assert!(output.is_ok());
        assert_eq!(
            output.table.get("auth.title"),
            Some(&CompiledValue::Text("Login".into()))
        );
        assert_eq!(output.table.len(), 2);
    }

    #[test]
    fn failing_units_do_not_block_others() {
        let units = vec![
            SourceUnit::new("a.mbel", None, "ok = \"fine\"\n"),
            SourceUnit::new("b.mbel", None, "broken \"x\"\n"),
            SourceUnit::new("c.mbel", None, "ok = \"again\"\n"),
            SourceUnit::new("d.mbel", None, "other = \"y\"\n"),
        ];
        let output = compile_units(&units);
        let failed: Vec<_> = output.failures.iter().map(|f| f.path.clone()).collect();
        assert_eq!(failed, vec![PathBuf::from("b.mbel"), PathBuf::from("c.mbel")]);
        assert!(matches!(output.failures[0].error, CoreError::Syntax(_)));
        assert!(matches!(output.failures[1].error, CoreError::DuplicateKey { .. }));
        assert_eq!(
            output.table.get("ok"),
            Some(&CompiledValue::Text("fine".into()))
        );
        assert!(output.table.contains_key("other"));
    }
}
