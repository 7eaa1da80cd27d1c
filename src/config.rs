//! Configuration Module
//!
//! Defines cache configuration, per-call overrides, and the environment loader
//! used by the demo binary.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time-to-live for entries (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 500;
/// Default memory budget (50 MiB)
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 50 * 1024 * 1024;

// == Eviction Policy ==
/// Rule used to pick a victim when the entry count bound is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used
    Lfu,
    /// First in, first out
    Fifo,
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "fifo" => Ok(Self::Fifo),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}

// == Oversize Policy ==
/// What to do with a single entry whose size alone exceeds the memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Free what can be freed and store the entry anyway
    #[default]
    Admit,
    /// Refuse the write and leave existing entries alone
    Reject,
}

// == Cache Config ==
/// Fully resolved cache configuration.
///
/// A `None` bound disables that bound. Disabling both `max_entries` and
/// `max_memory_bytes` leaves the cache unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live applied to entries written under this config
    pub ttl: Duration,
    /// Maximum number of live entries
    pub max_entries: Option<usize>,
    /// Maximum total estimated size of live entries
    pub max_memory_bytes: Option<u64>,
    /// Victim selection for the entry count bound
    pub eviction_policy: EvictionPolicy,
    /// Handling of entries larger than the whole memory budget
    pub oversize: OversizePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_memory_bytes: Some(DEFAULT_MAX_MEMORY_BYTES),
            eviction_policy: EvictionPolicy::Lru,
            oversize: OversizePolicy::Admit,
        }
    }
}

impl CacheConfig {
    // == Merge ==
    /// Overlays per-call options onto this configuration.
    pub fn merge(&self, options: &CacheOptions) -> CacheConfig {
        CacheConfig {
            ttl: options.ttl.unwrap_or(self.ttl),
            max_entries: options.max_entries.unwrap_or(self.max_entries),
            max_memory_bytes: options.max_memory_bytes.unwrap_or(self.max_memory_bytes),
            eviction_policy: options.eviction_policy.unwrap_or(self.eviction_policy),
            oversize: options.oversize.unwrap_or(self.oversize),
        }
    }

    /// Resolves optional per-call options against this configuration.
    pub fn resolve(&self, options: Option<&CacheOptions>) -> CacheConfig {
        match options {
            Some(options) => self.merge(options),
            None => self.clone(),
        }
    }
}

// == Cache Options ==
/// Per-call overrides. Unset fields fall back to the cache defaults.
///
/// ```
/// use std::time::Duration;
/// use memo_cache::{CacheOptions, EvictionPolicy};
///
/// let options = CacheOptions::new()
///     .ttl(Duration::from_secs(30))
///     .eviction_policy(EvictionPolicy::Lfu)
///     .max_memory_bytes(None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheOptions {
    ttl: Option<Duration>,
    max_entries: Option<Option<usize>>,
    max_memory_bytes: Option<Option<u64>>,
    eviction_policy: Option<EvictionPolicy>,
    oversize: Option<OversizePolicy>,
}

impl CacheOptions {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Overrides the entry bound; `None` disables it for this call.
    pub fn max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Overrides the memory bound; `None` disables it for this call.
    pub fn max_memory_bytes(mut self, max_memory_bytes: Option<u64>) -> Self {
        self.max_memory_bytes = Some(max_memory_bytes);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    pub fn oversize(mut self, policy: OversizePolicy) -> Self {
        self.oversize = Some(policy);
        self
    }
}

// == Runtime Config ==
/// Process configuration for the demo binary.
///
/// The library never reads the environment; only `main.rs` calls [`RuntimeConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Defaults handed to the cache at construction
    pub cache: CacheConfig,
    /// Interval between expiry sweeps
    pub sweep_interval: Duration,
}

impl RuntimeConfig {
    /// Creates a new RuntimeConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECS` - Default TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries, `0` disables the bound (default: 500)
    /// - `CACHE_MAX_MEMORY_BYTES` - Memory budget, `0` disables the bound (default: 50 MiB)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu` or `fifo` (default: lru)
    /// - `SWEEP_INTERVAL_SECS` - Expiry sweep frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();

        let ttl = env_parse::<u64>("CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);
        let max_entries = env_parse::<usize>("CACHE_MAX_ENTRIES")
            .map(|v| (v > 0).then_some(v))
            .unwrap_or(defaults.max_entries);
        let max_memory_bytes = env_parse::<u64>("CACHE_MAX_MEMORY_BYTES")
            .map(|v| (v > 0).then_some(v))
            .unwrap_or(defaults.max_memory_bytes);
        let eviction_policy =
            env_parse::<EvictionPolicy>("CACHE_EVICTION_POLICY").unwrap_or(defaults.eviction_policy);
        let sweep_interval = env_parse::<u64>("SWEEP_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(1));

        Self {
            cache: CacheConfig {
                ttl,
                max_entries,
                max_memory_bytes,
                eviction_policy,
                oversize: defaults.oversize,
            },
            sweep_interval,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
