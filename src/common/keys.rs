//! Variable keys
//!
//! Variables are identified by a plain `u64`. [`symbol`] packs a character into
//! the top byte and an index into the rest, so keys of the same family sort
//! together and `m*` keys sort before `x*` keys.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Variable identifier
pub type Key = u64;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = 64 - CHR_BITS;
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// Build a key from a character and an index, e.g. `symbol('x', 1)`
#[inline]
pub fn symbol(chr: char, index: u64) -> Key {
    ((chr as u64 & 0xff) << INDEX_BITS) | (index & INDEX_MASK)
}

/// Character part of a symbol key (`'\0'` for raw integer keys)
#[inline]
pub fn symbol_chr(key: Key) -> char {
    ((key >> INDEX_BITS) as u8) as char
}

/// Index part of a symbol key
#[inline]
pub fn symbol_index(key: Key) -> u64 {
    key & INDEX_MASK
}

/// Render a key as `x3` for symbol keys or as the raw integer otherwise
pub fn format_key(key: Key) -> String {
    let chr = symbol_chr(key);
    if chr.is_ascii_alphabetic() {
        format!("{}{}", chr, symbol_index(key))
    } else {
        key.to_string()
    }
}

/// A finite-domain variable: key plus number of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscreteKey {
    /// Variable identifier
    pub key: Key,
    /// Number of values the variable can take
    pub cardinality: usize,
}

impl DiscreteKey {
    /// Create a new discrete key
    pub fn new(key: Key, cardinality: usize) -> Self {
        Self { key, cardinality }
    }
}

/// Short list of discrete keys, usually one to four per conditional
pub type DiscreteKeys = SmallVec<[DiscreteKey; 4]>;

/// Sorted, de-duplicated union of two discrete key lists
pub fn merge_discrete_keys(a: &[DiscreteKey], b: &[DiscreteKey]) -> DiscreteKeys {
    let mut keys: DiscreteKeys = a.iter().chain(b.iter()).copied().collect();
    keys.sort_by_key(|dk| dk.key);
    keys.dedup_by_key(|dk| dk.key);
    keys
}
