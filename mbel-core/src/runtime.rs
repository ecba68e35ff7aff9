//! String resolution over a compiled table.
//!
//! A [`Runtime`] is immutable once built and can be shared across
//! threads. Lookups never fail: a missing key yields the key itself,
//! a block with no matching case yields its `other` case or an empty
//! string, and unresolved placeholders are left in the output.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::plural::plural_category;
use crate::table::{CompiledTable, CompiledValue, LogicBlock};

/// A call-time value for matching and interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Integer used for exact, range and plural matching.
    ///
    /// Floats truncate toward zero; strings count only if they parse as a number.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Float(_) => None,
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(i64::from(value))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Named call-time variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars(BTreeMap<String, Value>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Vars(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The argument of a lookup: nothing, a single scalar, or a bag of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Args {
    #[default]
    None,
    Scalar(Value),
    Vars(Vars),
}

impl From<Vars> for Args {
    fn from(vars: Vars) -> Self {
        Args::Vars(vars)
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        Args::Scalar(value)
    }
}

macro_rules! args_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Args {
            fn from(value: $ty) -> Self {
                Args::Scalar(Value::from(value))
            }
        })*
    };
}

args_from_scalar!(&str, String, f32, f64, i8, i16, i32, i64, u8, u16, u32, usize);

#[derive(Debug, Clone)]
pub struct Runtime {
    table: Arc<CompiledTable>,
    language: String,
    escape_html: bool,
}

impl Runtime {
    /// Build a runtime; the plural language comes from `@lang`, defaulting to `en`.
    pub fn new(table: impl Into<Arc<CompiledTable>>, escape_html: bool) -> Self {
        let table = table.into();
        let language = table.language().unwrap_or("en").to_string();
        Runtime {
            table,
            language,
            escape_html,
        }
    }

    /// Override the language used for plural rules.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn escapes_html(&self) -> bool {
        self.escape_html
    }

    pub fn table(&self) -> &CompiledTable {
        &self.table
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    pub fn get(&self, key: &str) -> String {
        self.get_with(key, Args::None)
    }

    pub fn get_with(&self, key: &str, args: impl Into<Args>) -> String {
        let args = args.into();
        match self.table.get(key) {
            None => key.to_string(),
            Some(CompiledValue::Text(template)) => self.interpolate(template, &args),
            Some(CompiledValue::Block(block)) => {
                let template = resolve_with_lang(block, &args, &self.language);
                self.interpolate(template, &args)
            }
        }
    }

    /// Substitute `{-term}` references from the glossary, then `{name}`
    /// placeholders from `args`.
    pub fn interpolate(&self, template: &str, args: &Args) -> String {
        let with_terms = replace_braced(template, |inner| {
            let name = inner.strip_prefix('-')?;
            if !is_term_name(name) {
                return None;
            }
            self.table.terms.get(name).cloned()
        });

        if matches!(args, Args::None) {
            return with_terms;
        }

        replace_braced(&with_terms, |name| {
            if !is_placeholder_name(name) {
                return None;
            }
            let value = match args {
                Args::Vars(vars) => vars.get(name)?.to_string(),
                Args::Scalar(value) => value.to_string(),
                Args::None => return None,
            };
            Some(if self.escape_html {
                escape_html(&value)
            } else {
                value
            })
        })
    }
}

/// Pick the template of `block` that matches `args`.
///
/// Precedence, most specific first: keyword, exact integer, ranges in
/// source order, plural category of `lang`, `other`, empty.
///
/// Without a usable number (no args, a bag lacking the block's variable, a
/// string that is neither a keyword nor an integer) the numeric steps are
/// skipped and `other` is used. Such values are not read as `0`, so `[0]`,
/// `[zero]` and ranges covering 0 never match them.
pub fn resolve_with_lang<'b>(block: &'b LogicBlock, args: &Args, lang: &str) -> &'b str {
    let value = match args {
        Args::Vars(vars) if !block.argument.is_empty() => vars.get(&block.argument),
        Args::Scalar(value) => Some(value),
        Args::Vars(_) | Args::None => None,
    };

    if let Some(value) = value {
        if let Some(found) = match_value(block, value, lang) {
            return found;
        }
    }

    block.cases.get("other").map_or("", String::as_str)
}

fn match_value<'b>(block: &'b LogicBlock, value: &Value, lang: &str) -> Option<&'b str> {
    if let Value::Str(word) = value {
        if let Some(found) = block.cases.get(word) {
            return Some(found);
        }
    }

    let n = value.as_integer()?;
    if let Some(found) = block.cases.get(&n.to_string()) {
        return Some(found);
    }
    if let Some(range) = block.ranges.iter().find(|range| range.contains(n)) {
        return Some(&range.value);
    }
    block
        .cases
        .get(plural_category(lang, n).as_str())
        .map(String::as_str)
}

/// Replace every `{inner}` for which `lookup` returns a value; others stay verbatim.
fn replace_braced(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        // Restart from the innermost `{` so `{{name}` still substitutes.
        let close = after.find('}');
        let nested = after.find('{');
        match close {
            Some(close) if nested.is_none_or(|nested| close < nested) => {
                let inner = &after[..close];
                match lookup(inner) {
                    Some(replacement) => out.push_str(&replacement),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_term_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
