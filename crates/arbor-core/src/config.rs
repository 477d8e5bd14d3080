//! Browse configuration.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for directory browsing and population.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct BrowseConfig {
    /// Include hidden entries (starting with `.`) in listings.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Follow symbolic links when probing attributes.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Patterns to ignore (name, `prefix*` or `*suffix`).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Time budget after which a preloaded child list is evicted from
    /// the cache. `None` or zero means entries never expire.
    #[builder(default)]
    #[serde(default)]
    pub preload_ttl: Option<Duration>,

    /// How many directory entries to read between cooperative
    /// cancellation checks.
    #[builder(default = "64")]
    #[serde(default = "default_cancel_check_every")]
    pub cancel_check_every: usize,
}

fn default_true() -> bool {
    true
}

fn default_cancel_check_every() -> usize {
    64
}

impl BrowseConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.cancel_check_every {
            return Err("cancel_check_every must be at least 1".to_string());
        }
        Ok(())
    }
}

impl BrowseConfig {
    /// Create a new config builder.
    pub fn builder() -> BrowseConfigBuilder {
        BrowseConfigBuilder::default()
    }

    /// Create a config with defaults.
    pub fn new() -> Self {
        Self {
            include_hidden: true,
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            preload_ttl: None,
            cancel_check_every: 64,
        }
    }

    /// The effective preload time budget: zero durations collapse to
    /// "unbounded".
    pub fn effective_ttl(&self) -> Option<Duration> {
        match self.preload_ttl {
            Some(d) if !d.is_zero() => Some(d),
            _ => None,
        }
    }

    /// Check if an entry name matches an ignore pattern.
    pub fn should_ignore(&self, name: &str) -> bool {
        for pattern in &self.ignore_patterns {
            if name == pattern {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                if !prefix.is_empty() && name.starts_with(prefix) {
                    return true;
                }
            }
            if let Some(suffix) = pattern.strip_prefix('*') {
                if !suffix.is_empty() && name.ends_with(suffix) {
                    return true;
                }
            }
        }
        false
    }

    /// Check if a hidden entry should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self::new()
    }
}
