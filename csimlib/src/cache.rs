use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use crate::config::{AddressFields, CacheConfig, RawCacheConfig};
use crate::error::ConfigurationError;
use crate::lru;

/// One cache slot. No data is stored, only what's needed to classify accesses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    /// Only meaningful when `valid`
    pub tag: u64,
    /// Accesses since this line was last used, 0 is most recently used
    pub recency: u64,
}

/// The classification of a single access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessOutcome {
    Hit,
    Miss,
    MissWithEviction,
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Hit => write!(f, "hit"),
            AccessOutcome::Miss => write!(f, "miss"),
            AccessOutcome::MissWithEviction => write!(f, "miss eviction"),
        }
    }
}

/// Running totals for a model. Can be serialised to the JSON output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Total number of accesses classified so far
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    fn record(&mut self, outcome: AccessOutcome) {
        match outcome {
            AccessOutcome::Hit => self.hits += 1,
            AccessOutcome::Miss => self.misses += 1,
            AccessOutcome::MissWithEviction => {
                self.misses += 1;
                self.evictions += 1;
            }
        }
    }
}

/// The cache-lab summary line
impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hits:{} misses:{} evictions:{}", self.hits, self.misses, self.evictions)
    }
}

/// A set-associative cache with LRU replacement
///
/// Lines live in one flat vector, set `i` being `lines[i * E..(i + 1) * E]`. Slot order within a
/// set only matters for choosing between free lines and for breaking recency ties.
///
/// The model is only ever changed through [`CacheModel::access`].
pub struct CacheModel {
    config: CacheConfig,
    lines: Vec<CacheLine>,
    stats: CacheStats,
}

impl CacheModel {
    /// Builds an empty model, every line invalid
    ///
    /// Fails with [`ConfigurationError::OutOfMemory`] rather than aborting if the lines can't be
    /// allocated
    pub fn new(config: CacheConfig) -> Result<Self, ConfigurationError> {
        debug!(
            sets = config.num_sets(),
            associativity = config.associativity(),
            block_size = config.block_size(),
            "Building cache model"
        );
        let num_lines = config.num_lines();
        let mut lines = Vec::new();
        lines
            .try_reserve_exact(num_lines)
            .map_err(|_| ConfigurationError::OutOfMemory { lines: num_lines })?;
        lines.resize(num_lines, CacheLine::default());
        Ok(Self {
            config,
            lines,
            stats: CacheStats::default(),
        })
    }

    /// Builds a model straight from `s`, `E` and `b`
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::cache::CacheModel;
    /// assert!(CacheModel::from_params(1, 1, 1).is_ok());
    /// assert!(CacheModel::from_params(1, 0, 1).is_err());
    /// ```
    pub fn from_params(s: i64, e: i64, b: i64) -> Result<Self, ConfigurationError> {
        Self::new(CacheConfig::try_from(RawCacheConfig::new(s, e, b))?)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn decompose(&self, address: u64) -> AddressFields {
        self.config.decompose(address)
    }

    /// The lines of one set, in slot order
    ///
    /// Panics if `set_index` is out of range
    pub fn set(&self, set_index: usize) -> &[CacheLine] {
        let e = self.config.associativity();
        &self.lines[set_index * e..(set_index + 1) * e]
    }

    /// Whether the block holding `address` is currently cached. Changes nothing
    pub fn probe(&self, address: u64) -> bool {
        let fields = self.decompose(address);
        self.set(fields.set_index).iter().any(|line| line.valid && line.tag == fields.tag)
    }

    /// Number of lines which have never been filled. Useful for analysing cache performance or
    /// debugging
    pub fn uninitialised_line_count(&self) -> usize {
        self.lines.iter().filter(|line| !line.valid).count()
    }

    /// Classifies an access to `address`, updating the counters, the set contents, and the
    /// recency of every valid line
    pub fn access(&mut self, address: u64) -> AccessOutcome {
        let AddressFields { tag, set_index, .. } = self.decompose(address);
        let set_lower_bound = set_index * self.config.associativity();
        let set_upper_bound = set_lower_bound + self.config.associativity();
        let set = &self.lines[set_lower_bound..set_upper_bound];

        let (slot, outcome) = if let Some(slot) = set.iter().position(|l| l.valid && l.tag == tag) {
            (slot, AccessOutcome::Hit)
        } else if let Some(slot) = set.iter().position(|l| !l.valid) {
            (slot, AccessOutcome::Miss)
        } else {
            // A full set always has a victim, E >= 1
            let slot = lru::select_victim(set).unwrap_or(0);
            trace!(set_index, evicted_tag = set[slot].tag, "Evicting");
            (slot, AccessOutcome::MissWithEviction)
        };

        let index = set_lower_bound + slot;
        let line = &mut self.lines[index];
        line.valid = true;
        line.tag = tag;
        lru::touch(&mut self.lines, index);
        self.stats.record(outcome);
        trace!(address, set_index, tag, slot, %outcome, "Access");
        outcome
    }
}
