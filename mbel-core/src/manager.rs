//! Multi-locale lookup with fallback and hot reload.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::repository::Repository;
use crate::runtime::{Args, Runtime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Last locale tried before falling back to the key itself.
    pub default_locale: String,
    pub escape_html: bool,
    /// Poll period used by [`Manager::watch`]; `None` disables watching.
    pub watch_interval: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            default_locale: "en".to_string(),
            escape_html: false,
            watch_interval: None,
        }
    }
}

pub struct Manager {
    repository: Box<dyn Repository>,
    config: ManagerConfig,
    runtimes: RwLock<HashMap<String, Arc<Runtime>>>,
    fingerprint: Mutex<Option<u64>>,
}

impl Manager {
    /// Build a manager and load every locale once.
    pub fn new(repository: impl Repository + 'static, config: ManagerConfig) -> Result<Self, CoreError> {
        let manager = Manager {
            repository: Box::new(repository),
            config,
            runtimes: RwLock::new(HashMap::new()),
            fingerprint: Mutex::new(None),
        };
        manager.reload()?;
        Ok(manager)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Sorted list of loaded locales.
    pub fn locales(&self) -> Vec<String> {
        let mut locales: Vec<_> = self.runtimes.read().keys().cloned().collect();
        locales.sort();
        locales
    }

    pub fn runtime(&self, locale: &str) -> Option<Arc<Runtime>> {
        self.runtimes.read().get(locale).cloned()
    }

    /// Resolve `key` for `lang`.
    ///
    /// Tries `lang`, then its 2-letter prefix (`pl-PL` → `pl`), then the
    /// default locale. A key found nowhere is returned unchanged.
    pub fn get(&self, lang: &str, key: &str, args: impl Into<Args>) -> String {
        let args = args.into();
        for locale in self.fallback_chain(lang) {
            if let Some(runtime) = self.runtime(&locale) {
                if runtime.contains_key(key) {
                    return runtime.get_with(key, args);
                }
            }
        }
        key.to_string()
    }

    fn fallback_chain(&self, lang: &str) -> Vec<String> {
        let mut chain = vec![lang.to_string()];
        if let Some(prefix) = lang.get(..2) {
            if prefix.len() < lang.len() {
                chain.push(prefix.to_string());
            }
        }
        if !chain.contains(&self.config.default_locale) {
            chain.push(self.config.default_locale.clone());
        }
        chain
    }

    /// Load every locale again and swap the result in.
    ///
    /// On failure the previously loaded locales stay active.
    pub fn reload(&self) -> Result<(), CoreError> {
        let fingerprint = self.repository.fingerprint();
        let tables = self.repository.load_all()?;
        let runtimes: HashMap<_, _> = tables
            .into_iter()
            .map(|(locale, table)| {
                let runtime = Runtime::new(table, self.config.escape_html);
                (locale, Arc::new(runtime))
            })
            .collect();

        let count = runtimes.len();
        *self.runtimes.write() = runtimes;
        *self.fingerprint.lock() = fingerprint;
        info!(locales = count, "loaded translations");
        Ok(())
    }

    /// Reload if the repository reports a different fingerprint.
    pub fn reload_if_changed(&self) -> Result<bool, CoreError> {
        let Some(current) = self.repository.fingerprint() else {
            return Ok(false);
        };
        if *self.fingerprint.lock() == Some(current) {
            return Ok(false);
        }
        debug!("translation sources changed");
        self.reload()?;
        Ok(true)
    }

    /// Start polling the repository at the configured interval.
    ///
    /// Returns `None` when no `watch_interval` is configured. Polling stops
    /// when the returned handle is dropped or the manager goes away.
    pub fn watch(self: &Arc<Self>) -> Option<WatchHandle> {
        let interval = self.config.watch_interval?;
        Some(WatchHandle::spawn(Arc::downgrade(self), interval))
    }
}

/// Handle to a background polling thread.
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    fn spawn(manager: Weak<Manager>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                thread::sleep(interval);
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(error) = manager.reload_if_changed() {
                    warn!(%error, "reload failed; keeping previous translations");
                }
            }
        });
        WatchHandle {
            stop,
            thread: Some(thread),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("translation watcher panicked");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;
    use crate::table::CompiledTable;

    struct StaticRepository(Vec<(&'static str, &'static str)>);

    impl Repository for StaticRepository {
        fn load_all(&self) -> Result<HashMap<String, CompiledTable>, CoreError> {
            self.0
                .iter()
                .map(|(locale, source)| Ok((locale.to_string(), compile_source(source)?)))
                .collect()
        }
    }

    fn manager() -> Manager {
        let repo = StaticRepository(vec![
            ("en", "title = \"Home\"\nonly_en = \"English only\"\nitems(n) {\n [one] => \"1 item\"\n [other] => \"{n} items\"\n}\n"),
            ("pl", "title = \"Strona\"\nitems(n) {\n [one] => \"1 element\"\n [few] => \"{n} elementy\"\n [many] => \"{n} elementów\"\n}\n"),
            ("pl-PL", "regional = \"Regionalne\"\n"),
        ]);
        Manager::new(repo, ManagerConfig::default()).expect("manager")
    }

    #[test]
    fn falls_back_through_prefix_default_and_key() {
        let m = manager();
        assert_eq!(m.get("pl-PL", "regional", Args::None), "Regionalne");
        assert_eq!(m.get("pl-PL", "title", Args::None), "Strona");
        assert_eq!(m.get("pl-PL", "only_en", Args::None), "English only");
        assert_eq!(m.get("de", "title", Args::None), "Home");
        assert_eq!(m.get("de", "nope", Args::None), "nope");
    }

    #[test]
    fn plural_rules_follow_the_locale() {
        let m = manager();
        assert_eq!(m.get("pl", "items", 5), "5 elementów");
        assert_eq!(m.get("pl", "items", 3), "3 elementy");
        assert_eq!(m.get("en", "items", 5), "5 items");
    }

    #[test]
    fn lists_locales() {
        assert_eq!(manager().locales(), vec!["en", "pl", "pl-PL"]);
    }

    #[test]
    fn watch_requires_an_interval() {
        let m = Arc::new(manager());
        assert!(m.watch().is_none());
    }

    #[test]
    fn stopping_after_a_watcher_panic_returns() {
        let handle = WatchHandle {
            stop: Arc::new(AtomicBool::new(false)),
            thread: Some(thread::spawn(|| panic!("watcher failed"))),
        };
        handle.stop();

        let m = Arc::new(Manager {
            config: ManagerConfig {
                watch_interval: Some(Duration::from_millis(5)),
                ..ManagerConfig::default()
            },
            ..manager()
        });
        let handle = m.watch().expect("watch handle");
        thread::sleep(Duration::from_millis(20));
        drop(handle);
        assert_eq!(m.get("en", "title", Args::None), "Home");
    }

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_locale, "en");
        assert!(!config.escape_html);
        assert!(config.watch_interval.is_none());
    }
}
