use serde::{Deserialize, Serialize};
use crate::error::ConfigurationError;

/// Upper bound on `2^s * E`. At 24 bytes a line this is 1.5GiB of lines
pub const MAX_LINES: u64 = 1 << 26;

/// A possibly incomplete cache configuration, as found in a JSON config file or on the command
/// line. Values are kept signed so that non-positive input can be reported rather than wrapped.
///
/// Both the cache-lab short names and descriptive names are accepted:
///
/// ```
/// use csimlib::config::RawCacheConfig;
/// let raw: RawCacheConfig = serde_json::from_str(r#"{"s": 4, "associativity": 2}"#).unwrap();
/// assert_eq!(raw.s, Some(4));
/// assert_eq!(raw.e, Some(2));
/// assert_eq!(raw.b, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCacheConfig {
    #[serde(default, alias = "set_index_bits")]
    pub s: Option<i64>,
    #[serde(default, rename = "E", alias = "associativity")]
    pub e: Option<i64>,
    #[serde(default, alias = "block_bits")]
    pub b: Option<i64>,
}

impl RawCacheConfig {
    pub fn new(s: i64, e: i64, b: i64) -> Self {
        Self { s: Some(s), e: Some(e), b: Some(b) }
    }

    /// Layers `overrides` on top of this configuration, any value present in `overrides` wins
    pub fn merge(self, overrides: RawCacheConfig) -> Self {
        Self {
            s: overrides.s.or(self.s),
            e: overrides.e.or(self.e),
            b: overrides.b.or(self.b),
        }
    }
}

/// A validated cache configuration: `2^s` sets of `E` lines, with blocks of `2^b` bytes
///
/// Can only be obtained through [`CacheConfig::try_from`] (or deserialisation, which goes through
/// the same checks), so every instance satisfies `s >= 1`, `E >= 1`, `b >= 1` and `s + b <= 63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCacheConfig", into = "RawCacheConfig")]
pub struct CacheConfig {
    set_index_bits: u32,
    associativity: usize,
    block_bits: u32,
}

/// The three fields an address splits into for a given configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressFields {
    pub tag: u64,
    pub set_index: usize,
    pub block_offset: u64,
}

impl CacheConfig {
    /// Number of set index bits, `s`
    pub fn set_index_bits(&self) -> u32 {
        self.set_index_bits
    }

    /// Number of lines per set, `E`
    pub fn associativity(&self) -> usize {
        self.associativity
    }

    /// Number of block offset bits, `b`
    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }

    pub fn num_sets(&self) -> usize {
        1 << self.set_index_bits
    }

    pub fn num_lines(&self) -> usize {
        self.num_sets() * self.associativity
    }

    pub fn block_size(&self) -> u64 {
        1 << self.block_bits
    }

    /// Splits an address into tag, set index and block offset
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::config::{CacheConfig, RawCacheConfig};
    /// let config = CacheConfig::try_from(RawCacheConfig::new(4, 1, 4)).unwrap();
    /// let fields = config.decompose(0x1234);
    /// assert_eq!(fields.tag, 0x12);
    /// assert_eq!(fields.set_index, 0x3);
    /// assert_eq!(fields.block_offset, 0x4);
    /// ```
    pub fn decompose(&self, address: u64) -> AddressFields {
        let block_mask = (1u64 << self.block_bits) - 1;
        let set_mask = (1u64 << self.set_index_bits) - 1;
        AddressFields {
            tag: address >> (self.block_bits + self.set_index_bits),
            // Bounded by num_sets, which was checked to fit in a usize
            set_index: ((address >> self.block_bits) & set_mask) as usize,
            block_offset: address & block_mask,
        }
    }
}

fn require_positive(value: Option<i64>, param: &'static str) -> Result<i64, ConfigurationError> {
    match value {
        None => Err(ConfigurationError::Missing(param)),
        Some(v) if v <= 0 => Err(ConfigurationError::NonPositive { param, value: v }),
        Some(v) => Ok(v),
    }
}

impl TryFrom<RawCacheConfig> for CacheConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawCacheConfig) -> Result<Self, Self::Error> {
        let s = require_positive(raw.s, "s")?;
        let e = require_positive(raw.e, "E")?;
        let b = require_positive(raw.b, "b")?;
        if s.saturating_add(b) > 63 {
            return Err(ConfigurationError::TooManyAddressBits { s, b });
        }
        let sets = 1u64 << s;
        let associativity = e as u64;
        match sets.checked_mul(associativity) {
            Some(lines) if lines <= MAX_LINES && usize::try_from(lines).is_ok() => {}
            _ => return Err(ConfigurationError::TooManyLines { sets, associativity }),
        }
        Ok(Self {
            set_index_bits: s as u32,
            associativity: e as usize,
            block_bits: b as u32,
        })
    }
}

impl From<CacheConfig> for RawCacheConfig {
    fn from(value: CacheConfig) -> Self {
        RawCacheConfig::new(
            value.set_index_bits as i64,
            value.associativity as i64,
            value.block_bits as i64,
        )
    }
}
