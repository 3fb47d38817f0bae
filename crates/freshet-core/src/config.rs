//! # Engine Configuration
//!
//! Process-wide configuration flags for the engine.
//!
//! The engine reads its configuration lazily through [`get`]. A host that
//! wants non-default behavior calls [`init`] once, before building any
//! streams or units; afterwards the configuration is frozen for the life of
//! the process.
//!
//! ## Flags
//!
//! | Flag | Default | Effect |
//! |------|---------|--------|
//! | `validate_subscriptions` | `true` (debug), `false` (release) | wrap every subscriber in a lifecycle validator |
//! | `check_invariants` | `true` (debug), `false` (release) | internal assertions (runaway, re-entrancy, double-queue) |
//! | `names_enabled` | `true` | streams and tasks record human-readable debug names |
//! | `purge_on_runaway` | `false` | empty the task queue when runaway tasks are detected |
//! | `max_rounds` | `100` | round budget of the task executor |
//! | `priority_count` | `3` | number of task priorities per queue |
//! | `initial_queue_capacity` | `16` | initial capacity of each priority buffer |

use std::sync::OnceLock;

/// Configuration for the engine.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Wrap every subscriber passed to `Stream::subscribe` in a validator
    /// that asserts lifecycle ordering.
    pub validate_subscriptions: bool,
    /// Enable internal invariant assertions.
    pub check_invariants: bool,
    /// Record human-readable debug names on streams and tasks.
    pub names_enabled: bool,
    /// Empty the task queue when runaway tasks are detected.
    pub purge_on_runaway: bool,
    /// Maximum number of executor rounds before runaway detection fires.
    pub max_rounds: u32,
    /// Number of task priorities supported by each processor unit.
    pub priority_count: usize,
    /// Initial capacity of the buffer backing each task priority.
    pub initial_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validate_subscriptions: cfg!(debug_assertions),
            check_invariants: cfg!(debug_assertions),
            names_enabled: true,
            purge_on_runaway: false,
            max_rounds: 100,
            priority_count: 3,
            initial_queue_capacity: 16,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Installs the process-wide configuration.
///
/// Returns `false` if the configuration was already frozen, either by an
/// earlier `init` call or by any engine code having read it.
pub fn init(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

/// Returns the process-wide configuration, freezing the default if no
/// [`init`] call has happened yet.
#[inline]
#[must_use]
pub fn get() -> Config {
    *CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_rounds, 100);
        assert_eq!(config.priority_count, 3);
        assert_eq!(config.initial_queue_capacity, 16);
        assert!(config.names_enabled);
        assert!(!config.purge_on_runaway);
    }

    #[test]
    fn test_get_freezes_default() {
        let first = get();
        // A second read observes the same frozen value.
        let second = get();
        assert_eq!(first.max_rounds, second.max_rounds);
        // init after a read reports the freeze.
        assert!(!init(Config::default()));
    }
}
