//! Text and binary encodings
//!
//! Every public data type derives `serde`, so Bayes nets, Bayes trees, factor
//! graphs and results can be cached or exchanged between processes. JSON is
//! the human-readable encoding, bincode the compact one. Structural sharing
//! inside decision trees is not preserved on disk; decoded trees compare
//! equal to the originals leaf by leaf.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::HybridError;

/// Encode as compact JSON
///
/// # Arguments
/// * `value` - Any serializable type of this crate
///
/// # Returns
/// The JSON text, or [`HybridError::Serialization`]
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HybridError> {
    Ok(serde_json::to_string(value)?)
}

/// Encode as indented JSON
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, HybridError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Decode from JSON
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, HybridError> {
    Ok(serde_json::from_str(json)?)
}

/// Encode with bincode
pub fn to_binary<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HybridError> {
    Ok(bincode::serialize(value)?)
}

/// Decode from bincode
pub fn from_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HybridError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keys::{symbol, DiscreteKey};
    use crate::discrete::DiscreteConditional;

    fn conditional() -> DiscreteConditional {
        let m1 = DiscreteKey::new(symbol('m', 1), 2);
        let m2 = DiscreteKey::new(symbol('m', 2), 3);
        DiscreteConditional::from_signature(m2, &[m1], "1/2/1 3/1/0").unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let c = conditional();
        let json = to_json(&c).unwrap();
        let back: DiscreteConditional = from_json(&json).unwrap();
        assert!(back.equals(&c, 0.0));
        assert!(to_json_pretty(&c).unwrap().contains('\n'));
    }

    #[test]
    fn test_binary_round_trip() {
        let c = conditional();
        let bytes = to_binary(&c).unwrap();
        let back: DiscreteConditional = from_binary(&bytes).unwrap();
        assert!(back.equals(&c, 0.0));
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let bytes = to_binary(&conditional()).unwrap();
        let err = from_binary::<DiscreteConditional>(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, HybridError::Serialization { .. }));
        assert!(from_json::<DiscreteConditional>("{").is_err());
    }
}
