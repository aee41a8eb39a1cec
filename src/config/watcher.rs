//! Configuration file watcher for hot reload of the redirect section.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original keep
//! triggering reloads. Only the `redirect` section is hot-reloadable; a file
//! whose `redirect` section equals the one last sent is dropped.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{AppConfig, RedirectConfig};

/// Watches the configuration file and sends validated configs whose
/// `redirect` section changed.
pub struct ConfigWatcher {
    path: PathBuf,
    filter: RedirectFilter,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, starting from the `redirect` section
    /// currently in service.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path, current: &RedirectConfig) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let watcher = Self {
            path: path.to_path_buf(),
            filter: RedirectFilter::new(current.clone()),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut filter,
            update_tx,
        } = self;

        let file_name = path.file_name().map(OsString::from).ok_or_else(|| {
            notify::Error::generic("config path has no file name")
        })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let config_path = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if !event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                        return;
                    }

                    match load_config(&config_path) {
                        Ok(config) if filter.accept(&config) => {
                            tracing::info!(
                                path = ?config_path,
                                instance = %config.redirect.name,
                                rewrites = config.redirect.rewrites.len(),
                                "Redirect configuration changed"
                            );
                            let _ = update_tx.send(config);
                        }
                        Ok(_) => {
                            tracing::debug!(path = ?config_path, "Redirect section unchanged, ignoring");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Remembers the last `redirect` section sent.
#[derive(Debug)]
struct RedirectFilter {
    applied: RedirectConfig,
}

impl RedirectFilter {
    fn new(applied: RedirectConfig) -> Self {
        Self { applied }
    }

    /// True when `config` carries a different `redirect` section.
    fn accept(&mut self, config: &AppConfig) -> bool {
        if config.redirect == self.applied {
            return false;
        }
        self.applied = config.redirect.clone();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientScope, RewriteConfig};

    const INITIAL: &str = r#"
[upstream]
url = "http://127.0.0.1:3000"

[redirect]
name = "edge"
"#;

    const WITH_RULE: &str = r#"
[upstream]
url = "http://127.0.0.1:3000"

[redirect]
name = "edge"

[[redirect.rewrites]]
regex = "^http://old\\.example/(.*)$"
replacement = "http://new.example/$1"
"#;

    fn with_rule() -> AppConfig {
        let mut config = AppConfig::default();
        config.redirect.rewrites = vec![RewriteConfig::new("a", "b")];
        config
    }

    #[test]
    fn test_filter_drops_unchanged_redirect_section() {
        let mut filter = RedirectFilter::new(RedirectConfig::default());

        let mut config = AppConfig::default();
        config.timeouts.request_secs = 5;

        assert!(!filter.accept(&config));
    }

    #[test]
    fn test_filter_accepts_each_change_once() {
        let mut filter = RedirectFilter::new(RedirectConfig::default());

        assert!(filter.accept(&with_rule()));
        assert!(!filter.accept(&with_rule()));

        let mut widened = with_rule();
        widened.redirect.scope = ClientScope::Any;
        assert!(filter.accept(&widened));

        assert!(filter.accept(&AppConfig::default()));
    }

    #[tokio::test]
    async fn test_rewritten_file_sends_validated_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redirect-ipv6.toml");
        std::fs::write(&path, INITIAL).unwrap();

        let current = load_config(&path).unwrap();
        let (watcher, mut updates) = ConfigWatcher::new(&path, &current.redirect);
        let _watcher = watcher.run().unwrap();

        // Save the way editors do: write aside, then rename over the file.
        let staged = dir.path().join("redirect-ipv6.toml.tmp");
        std::fs::write(&staged, WITH_RULE).unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let update = tokio::time::timeout(Duration::from_secs(10), updates.recv())
            .await
            .expect("no config update received")
            .unwrap();

        assert_eq!(update.redirect.name, "edge");
        assert_eq!(
            update.redirect.rewrites,
            vec![RewriteConfig::new(
                r"^http://old\.example/(.*)$",
                "http://new.example/$1"
            )]
        );
    }

    #[tokio::test]
    async fn test_invalid_file_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redirect-ipv6.toml");
        std::fs::write(&path, INITIAL).unwrap();

        let current = load_config(&path).unwrap();
        let (watcher, mut updates) = ConfigWatcher::new(&path, &current.redirect);
        let _watcher = watcher.run().unwrap();

        let staged = dir.path().join("redirect-ipv6.toml.tmp");
        std::fs::write(&staged, "[[redirect.rewrites]]\nregex = \"(\"\nreplacement = \"x\"\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let update = tokio::time::timeout(Duration::from_millis(1500), updates.recv()).await;
        assert!(update.is_err());
    }
}
