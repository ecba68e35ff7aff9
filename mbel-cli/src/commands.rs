use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mbel_core::ast::{Assignment, Expression, Metadata, Program, Statement};
use mbel_core::format::format_program;
use mbel_core::lexer::{TokenKind, tokenize};
use mbel_core::lint::validate;
use mbel_core::sourcemap::{SourceMap, build_source_map, namespaced};
use mbel_core::{
    BuildOutput, Diagnostic, FileRepository, Repository, SourceUnit, compile_units, derive_namespace,
    discover_files, parse,
};
use rayon::prelude::*;
use tracing::{info, warn};

// ---------------------------------------------------------------------
// lint
// ---------------------------------------------------------------------

struct LintReport {
    path: PathBuf,
    diagnostics: Vec<Diagnostic>,
    statements: usize,
    annotations: usize,
}

pub fn lint(paths: &[PathBuf]) -> Result<()> {
    let files = discover(paths)?;
    let reports: Vec<Result<LintReport>> = files
        .par_iter()
        .map(|path| {
            let source = read_source(path)?;
            let parsed = parse(&source);
            let mut diagnostics = parsed.diagnostics;
            if diagnostics.iter().all(|d| !d.is_error()) {
                diagnostics.extend(validate(&parsed.program));
            }
            Ok(LintReport {
                path: path.clone(),
                diagnostics,
                statements: parsed.program.statements.len(),
                annotations: parsed.program.annotations.len(),
            })
        })
        .collect();

    let mut failed = 0;
    for report in reports {
        let report = report?;
        for diag in &report.diagnostics {
            println!("{}:{}: {}", report.path.display(), diag.line, describe(diag));
        }
        if report.diagnostics.iter().any(Diagnostic::is_error) {
            failed += 1;
        } else {
            info!(
                path = %report.path.display(),
                statements = report.statements,
                annotations = report.annotations,
                "ok"
            );
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) failed lint", files.len());
    }
    eprintln!("{} file(s) ok", files.len());
    Ok(())
}

fn describe(diag: &Diagnostic) -> String {
    let level = if diag.is_error() { "error" } else { "warning" };
    match diag.code {
        Some(code) => format!("{level}[{code}]: {}", diag.message),
        None => format!("{level}: {}", diag.message),
    }
}

// ---------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------

pub struct CompileOptions {
    pub output: Option<PathBuf>,
    pub compact: bool,
    pub no_namespace: bool,
    pub source_map: Option<PathBuf>,
}

pub fn compile(paths: &[PathBuf], options: &CompileOptions) -> Result<()> {
    let units = load_units(paths, options.no_namespace)?;
    let output = compile_units(&units);
    report_failures(&output)?;

    let json = output.table.to_json(!options.compact)?;
    write_or_print(options.output.as_deref(), &json)?;

    if let Some(map_path) = &options.source_map {
        let map = source_map_for(&units);
        let json = serde_json::to_string_pretty(&map)?;
        write_output(map_path, &json)?;
    }

    info!(units = units.len(), keys = output.table.len(), "compiled");
    Ok(())
}

/// Read every discovered file, namespaced by its directory under the first
/// path when that path is a directory.
fn load_units(paths: &[PathBuf], no_namespace: bool) -> Result<Vec<SourceUnit>> {
    let files = discover(paths)?;
    let base = paths.first().filter(|p| p.is_dir());
    files
        .into_iter()
        .map(|file| {
            let namespace = match base {
                Some(base) if !no_namespace => derive_namespace(&file, base),
                _ => None,
            };
            SourceUnit::read(&file, namespace).with_context(|| format!("failed to read {}", file.display()))
        })
        .collect()
}

fn report_failures(output: &BuildOutput) -> Result<()> {
    if output.is_ok() {
        return Ok(());
    }
    for failure in &output.failures {
        eprintln!("{}: {}", failure.path.display(), failure.error);
        for diag in failure.error.diagnostics() {
            eprintln!("  {}:{}: {}", failure.path.display(), diag.line, describe(diag));
        }
    }
    bail!("{} file(s) failed to compile", output.failures.len());
}

fn source_map_for(units: &[SourceUnit]) -> SourceMap {
    let mut map = SourceMap::new();
    for unit in units {
        let program = parse(&unit.source).program;
        let file = unit.path.display().to_string();
        map.extend(namespaced(
            build_source_map(&program, &file),
            unit.namespace.as_deref(),
        ));
    }
    map
}

// ---------------------------------------------------------------------
// fmt
// ---------------------------------------------------------------------

pub fn fmt(paths: &[PathBuf], check: bool) -> Result<()> {
    let files = discover(paths)?;
    let mut changed = Vec::new();
    let mut broken = 0;

    for path in &files {
        let source = read_source(path)?;
        let parsed = parse(&source);
        if parsed.has_errors() {
            for diag in &parsed.diagnostics {
                eprintln!("{}:{}: {}", path.display(), diag.line, describe(diag));
            }
            broken += 1;
            continue;
        }

        let formatted = format_program(&parsed.program);
        if formatted == source {
            continue;
        }
        if check {
            println!("{}", path.display());
        } else {
            write_output(path, &formatted)?;
            info!(path = %path.display(), "formatted");
        }
        changed.push(path);
    }

    if broken > 0 {
        bail!("{broken} file(s) could not be parsed");
    }
    if check && !changed.is_empty() {
        bail!("{} file(s) would be reformatted", changed.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub files: usize,
    pub keys: usize,
    pub strings: usize,
    pub blocks: usize,
    pub annotations: usize,
    /// Section-qualified keys defined more than once, with their counts.
    pub duplicates: BTreeMap<String, usize>,
}

pub fn collect_stats(files: &[PathBuf]) -> Result<Stats> {
    let mut stats = Stats {
        files: files.len(),
        ..Stats::default()
    };
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for path in files {
        let source = read_source(path)?;
        let program = parse(&source).program;
        stats.annotations += program.annotations.len();

        let mut section: Option<&str> = None;
        for stmt in &program.statements {
            match stmt {
                Statement::Section(s) => section = Some(s.name.as_str()),
                Statement::Assign(assign) => {
                    stats.keys += 1;
                    match assign.value {
                        Expression::Block(_) => stats.blocks += 1,
                        Expression::Str(_) | Expression::TermRef(_) => stats.strings += 1,
                    }
                    let key = match section {
                        Some(section) => format!("{section}.{}", assign.name),
                        None => assign.name.clone(),
                    };
                    *seen.entry(key).or_default() += 1;
                }
                _ => {}
            }
        }
    }

    stats.duplicates = seen.into_iter().filter(|(_, count)| *count > 1).collect();
    Ok(stats)
}

pub fn stats(paths: &[PathBuf]) -> Result<()> {
    let files = discover(paths)?;
    let stats = collect_stats(&files)?;

    println!("Files:          {}", stats.files);
    println!("Total keys:     {}", stats.keys);
    println!("  Strings:      {}", stats.strings);
    println!("  Logic blocks: {}", stats.blocks);
    println!("AI annotations: {}", stats.annotations);
    if !stats.duplicates.is_empty() {
        println!();
        println!("Duplicate keys ({}):", stats.duplicates.len());
        for (key, count) in &stats.duplicates {
            println!("  - {key} ({count})");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------

pub fn diff(left: &Path, right: &Path) -> Result<()> {
    let left_keys = collect_keys(left)?;
    let right_keys = collect_keys(right)?;

    let missing: Vec<_> = left_keys.difference(&right_keys).collect();
    let extra: Vec<_> = right_keys.difference(&left_keys).collect();

    if missing.is_empty() && extra.is_empty() {
        println!("All keys match");
        return Ok(());
    }
    if !missing.is_empty() {
        println!("Missing in {} ({}):", right.display(), missing.len());
        for key in missing {
            println!("  - {key}");
        }
    }
    if !extra.is_empty() {
        println!("Extra in {} ({}):", right.display(), extra.len());
        for key in extra {
            println!("  + {key}");
        }
    }
    Ok(())
}

/// Compiled keys under `path`, namespaced the same way `compile` does.
fn collect_keys(path: &Path) -> Result<BTreeSet<String>> {
    let units = load_units(&[path.to_path_buf()], false)?;
    let output = compile_units(&units);
    for failure in &output.failures {
        warn!(path = %failure.path.display(), error = %failure.error, "skipping file");
    }
    Ok(output.table.keys().map(str::to_string).collect())
}

// ---------------------------------------------------------------------
// import
// ---------------------------------------------------------------------

/// Convert a JSON object of strings into MBEL source.
///
/// Nested objects flatten into dotted keys. Entries that are not strings,
/// whose keys are not valid identifiers, or whose text cannot be written
/// as a string literal are skipped with a warning.
pub fn json_to_source(json: &str, namespace: Option<&str>) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(json).context("input is not valid JSON")?;
    let serde_json::Value::Object(object) = value else {
        bail!("expected a JSON object at the top level");
    };

    let mut flat = BTreeMap::new();
    flatten_json("", &object, &mut flat);

    let mut program = Program::default();
    if let Some(namespace) = namespace {
        program.statements.push(Statement::Metadata(Metadata {
            key: "namespace".to_string(),
            value: namespace.to_string(),
            line: 1,
            column: 1,
        }));
    }
    for (key, text) in flat {
        if !is_identifier(&key) {
            warn!(%key, "skipping key that is not a valid identifier");
            continue;
        }
        if text.contains("\"\"\"") || (text.contains('"') && text.ends_with('"')) {
            warn!(%key, "skipping value that cannot be quoted");
            continue;
        }
        program.statements.push(Statement::Assign(Assignment {
            name: key,
            value: Expression::Str(text),
            line: 0,
            column: 0,
        }));
    }
    Ok(format_program(&program))
}

fn flatten_json(
    prefix: &str,
    object: &serde_json::Map<String, serde_json::Value>,
    out: &mut BTreeMap<String, String>,
) {
    for (key, value) in object {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            serde_json::Value::String(text) => {
                out.insert(key, text.clone());
            }
            serde_json::Value::Object(nested) => flatten_json(&key, nested, out),
            _ => warn!(%key, "skipping non-string value"),
        }
    }
}

fn is_identifier(key: &str) -> bool {
    matches!(
        tokenize(key).as_slice(),
        [token, eof] if token.is(TokenKind::Ident) && token.literal == key && eof.is(TokenKind::Eof)
    )
}

pub fn import(input: &Path, output: Option<&Path>, namespace: Option<&str>) -> Result<()> {
    let json = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let source = json_to_source(&json, namespace)?;
    write_or_print(output, &source)
}

// ---------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------

pub fn watch(dir: &Path, output: &Path, interval: Duration) -> Result<()> {
    let repository = FileRepository::new(dir);
    let options = CompileOptions {
        output: Some(output.to_path_buf()),
        compact: false,
        no_namespace: false,
        source_map: None,
    };
    let paths = [dir.to_path_buf()];

    eprintln!("watching {} (Ctrl+C to stop)", dir.display());
    let mut last = None;
    loop {
        let current = Some(repository.fingerprint());
        if current != last {
            last = current;
            match compile(&paths, &options) {
                Ok(()) => eprintln!("rebuilt {}", output.display()),
                Err(error) => eprintln!("build failed: {error:#}"),
            }
        }
        thread::sleep(interval);
    }
}

// ---------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------

fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let files = discover_files(paths)?;
    if files.is_empty() {
        bail!("no .mbel files found");
    }
    Ok(files)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_or_print(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => write_output(path, contents),
        None => {
            print!("{contents}");
            if !contents.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

