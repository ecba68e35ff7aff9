//! Where locale tables come from.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::build::{SourceUnit, compile_units, has_source_extension};
use crate::error::CoreError;
use crate::table::CompiledTable;

/// A source of compiled tables, keyed by locale.
pub trait Repository: Send + Sync {
    fn load_all(&self) -> Result<HashMap<String, CompiledTable>, CoreError>;

    /// Opaque value that changes whenever the underlying sources change.
    ///
    /// `None` means the repository cannot detect changes.
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}

/// Locale files under a root directory.
///
/// The first path component is the locale: `en.mbel`, `en/app.mbel` and
/// `en/auth/login.mbel` all belong to `en`. Directories below the locale
/// plus the file stem form the key namespace, so `en/auth/login.mbel`
/// contributes `auth.login.*` keys while `en.mbel` is unprefixed.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileRepository { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && has_source_extension(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }

    /// Locale and namespace for a file under the root.
    fn classify(&self, path: &Path) -> Option<(String, Option<String>)> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect();
        let file = parts.pop()?;
        let stem = Path::new(&file).file_stem()?.to_str()?.to_string();

        if parts.is_empty() {
            return Some((stem, None));
        }
        let locale = parts.remove(0);
        parts.push(stem);
        Some((locale, Some(parts.join("."))))
    }
}

impl Repository for FileRepository {
    fn load_all(&self) -> Result<HashMap<String, CompiledTable>, CoreError> {
        if !self.root.is_dir() {
            let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "locale root is not a directory");
            return Err(CoreError::from(missing).in_file(&self.root));
        }

        let mut by_locale: HashMap<String, Vec<SourceUnit>> = HashMap::new();
        for path in self.source_files() {
            let Some((locale, namespace)) = self.classify(&path) else {
                continue;
            };
            match SourceUnit::read(&path, namespace) {
                Ok(unit) => by_locale.entry(locale).or_default().push(unit),
                Err(error) => warn!(%error, "skipping unreadable locale file"),
            }
        }

        let mut tables = HashMap::with_capacity(by_locale.len());
        for (locale, units) in by_locale {
            let output = compile_units(&units);
            for failure in &output.failures {
                warn!(
                    path = %failure.path.display(),
                    error = %failure.error,
                    "skipping locale file"
                );
            }
            let mut table = output.table;
            table
                .meta
                .entry("lang".to_string())
                .or_insert_with(|| locale.clone());
            debug!(%locale, keys = table.len(), "loaded locale");
            tables.insert(locale, table);
        }
        Ok(tables)
    }

    fn fingerprint(&self) -> Option<u64> {
        let mut hasher = DefaultHasher::new();
        for path in self.source_files() {
            path.hash(&mut hasher);
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            modified.hash(&mut hasher);
        }
        Some(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_locale_and_namespace() {
        let repo = FileRepository::new("/locales");
        assert_eq!(
            repo.classify(Path::new("/locales/en.mbel")),
            Some(("en".to_string(), None))
        );
        assert_eq!(
            repo.classify(Path::new("/locales/pl/app.mbel")),
            Some(("pl".to_string(), Some("app".to_string())))
        );
        assert_eq!(
            repo.classify(Path::new("/locales/pl/auth/login.mbel")),
            Some(("pl".to_string(), Some("auth.login".to_string())))
        );
        assert_eq!(repo.classify(Path::new("/other/en.mbel")), None);
    }
}
