//! Process-wide runtime configuration.
//!
//! The configuration is read from the environment on first use and can be
//! replaced at any time with [`set`] or adjusted with [`update`]. Changes
//! apply to constructions and async invocations that start afterwards;
//! classes already validated by the registry are not checked again.
//!
//! | Variable               | Field                   | Default |
//! |------------------------|-------------------------|---------|
//! | `CLASSY_MAX_DEPTH`     | `max_inheritance_depth` | 9       |
//! | `CLASSY_RUNTIME_CHECKS`| `runtime_checks`        | on      |
//! | `CLASSY_THREADS`       | `threads`               | on      |
//!
//! # Thread Safety
//!
//! The configuration lives behind a `parking_lot::RwLock`; [`get`] returns a
//! copy so no lock is held while the runtime acts on it.

use classy_log::warn;
use parking_lot::RwLock;
use std::sync::OnceLock;

/// Default inheritance depth limit, and the limit enforced at compile time by
/// the `static-depth-check` feature.
pub const MAX_INHERITANCE_DEPTH: usize = 9;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of ancestors between a class and the root `Object`.
    pub max_inheritance_depth: usize,
    /// Validate depth and member names on first construction of a class.
    pub runtime_checks: bool,
    /// Run async methods on worker threads. When off, async invocations run
    /// synchronously on the caller's thread.
    pub threads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_inheritance_depth: MAX_INHERITANCE_DEPTH,
            runtime_checks: true,
            threads: cfg!(feature = "threads"),
        }
    }
}

impl Config {
    /// Builds a configuration from the `CLASSY_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed values are reported
    /// and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Example
    ///
    /// ```rust
    /// use classy::Config;
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "CLASSY_MAX_DEPTH" => Some("12".to_string()),
    ///     "CLASSY_THREADS" => Some("off".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.max_inheritance_depth, 12);
    /// assert!(!config.threads);
    /// assert!(config.runtime_checks);
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(raw) = lookup("CLASSY_MAX_DEPTH") {
            match raw.trim().parse() {
                Ok(depth) => config.max_inheritance_depth = depth,
                Err(_) => warn!("ignoring CLASSY_MAX_DEPTH={raw:?}: not a number"),
            }
        }
        if let Some(raw) = lookup("CLASSY_RUNTIME_CHECKS") {
            match parse_flag(&raw) {
                Some(flag) => config.runtime_checks = flag,
                None => warn!("ignoring CLASSY_RUNTIME_CHECKS={raw:?}: not a flag"),
            }
        }
        if let Some(raw) = lookup("CLASSY_THREADS") {
            match parse_flag(&raw) {
                Some(flag) => config.threads = flag && cfg!(feature = "threads"),
                None => warn!("ignoring CLASSY_THREADS={raw:?}: not a flag"),
            }
        }

        config
    }

    /// Sets the inheritance depth limit.
    #[must_use]
    pub const fn with_max_inheritance_depth(mut self, depth: usize) -> Self {
        self.max_inheritance_depth = depth;
        self
    }

    /// Turns first-construction validation on or off.
    #[must_use]
    pub const fn with_runtime_checks(mut self, enabled: bool) -> Self {
        self.runtime_checks = enabled;
        self
    }

    /// Turns worker threads for async methods on or off.
    #[must_use]
    pub const fn with_threads(mut self, enabled: bool) -> Self {
        self.threads = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

fn cell() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::from_env()))
}

/// Returns a copy of the current configuration.
#[must_use]
pub fn get() -> Config {
    *cell().read()
}

/// Replaces the current configuration.
pub fn set(config: Config) {
    *cell().write() = config;
}

/// Adjusts the current configuration in place.
///
/// ```rust
/// classy::config::update(|c| c.max_inheritance_depth = 16);
/// assert_eq!(classy::config::get().max_inheritance_depth, 16);
/// ```
pub fn update(f: impl FnOnce(&mut Config)) {
    f(&mut cell().write());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_inheritance_depth, 9);
        assert!(config.runtime_checks);
        assert_eq!(config.threads, cfg!(feature = "threads"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_from_lookup_ignores_malformed_values() {
        let config = Config::from_lookup(|key| match key {
            "CLASSY_MAX_DEPTH" => Some("deep".to_string()),
            "CLASSY_RUNTIME_CHECKS" => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(config.max_inheritance_depth, MAX_INHERITANCE_DEPTH);
        assert!(!config.runtime_checks);
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_max_inheritance_depth(3)
            .with_runtime_checks(false)
            .with_threads(false);
        assert_eq!(config.max_inheritance_depth, 3);
        assert!(!config.runtime_checks);
        assert!(!config.threads);
    }
}
