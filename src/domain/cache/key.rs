//! Cache key derivation
//!
//! Keys are `{namespace}:{digest}` where the digest is a truncated SHA-256 over the canonical
//! JSON form of the query parameters. Parameters live in a `BTreeMap`, so the canonical form
//! is independent of insertion order, and floats are rounded before they are stored so that
//! representation noise cannot fragment the cache.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Decimal places kept for floating point parameters
pub const KEY_DECIMAL_PLACES: i32 = 5;

/// Hex characters of the digest kept in the final key
pub const DIGEST_HEX_LENGTH: usize = 24;

/// Rounds a float to [`KEY_DECIMAL_PLACES`], folding negative zero into zero
pub fn round_param(value: f64) -> f64 {
    let scale = 10f64.powi(KEY_DECIMAL_PLACES);
    (value * scale).round() / scale + 0.0
}

/// Trait for generating cache keys from normalized parameters
pub trait CacheKeyGenerator: Send + Sync + Debug {
    /// Generates the opaque part of a key
    fn generate(&self, params: &CacheKeyParams) -> String;

    /// Generates a key with a namespace prefix
    fn generate_with_namespace(&self, namespace: &str, params: &CacheKeyParams) -> String {
        format!("{}:{}", namespace, self.generate(params))
    }
}

/// Normalized, order-independent query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheKeyParams {
    components: BTreeMap<String, Value>,
}

impl CacheKeyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a float, rounded to [`KEY_DECIMAL_PLACES`]
    pub fn with_float(mut self, key: impl Into<String>, value: f64) -> Self {
        self.components.insert(key.into(), Value::from(round_param(value)));
        self
    }

    /// Adds an integer
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.components.insert(key.into(), Value::from(value));
        self
    }

    /// Adds an optional string; `None` is kept as an explicit null
    pub fn with_text(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        let value = value.map(Value::from).unwrap_or(Value::Null);
        self.components.insert(key.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Canonical serialization: JSON object with lexicographically sorted keys
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.components).unwrap_or_else(|_| "{}".to_string())
    }
}

/// SHA-256 based key generator
#[derive(Debug, Clone)]
pub struct DigestKeyGenerator {
    digest_len: usize,
}

impl Default for DigestKeyGenerator {
    fn default() -> Self {
        Self {
            digest_len: DIGEST_HEX_LENGTH,
        }
    }
}

impl DigestKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `len` hex characters of the digest (at most 64)
    pub fn with_digest_len(mut self, len: usize) -> Self {
        self.digest_len = len.clamp(1, 64);
        self
    }
}

impl CacheKeyGenerator for DigestKeyGenerator {
    fn generate(&self, params: &CacheKeyParams) -> String {
        let digest = Sha256::digest(params.canonical_json().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(self.digest_len);
        hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nearby_params(lat: f64, lon: f64) -> CacheKeyParams {
        CacheKeyParams::new()
            .with_float("lat", lat)
            .with_float("lon", lon)
            .with_int("radius_m", 1000)
            .with_text("category", None)
            .with_int("limit", 50)
            .with_int("offset", 0)
    }

    #[test]
    fn test_round_param() {
        assert_eq!(round_param(29.760401), 29.7604);
        assert_eq!(round_param(-95.369849), -95.36985);
        assert!(round_param(-0.000001).is_sign_positive());
    }

    #[test]
    fn test_canonical_json_is_sorted() {
        let params = CacheKeyParams::new()
            .with_int("zebra", 1)
            .with_text("apple", Some("a"))
            .with_float("mango", 0.5);

        assert_eq!(
            params.canonical_json(),
            r#"{"apple":"a","mango":0.5,"zebra":1}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let generator = DigestKeyGenerator::new();

        let a = CacheKeyParams::new()
            .with_float("lat", 29.7604)
            .with_float("lon", -95.3698)
            .with_text("category", Some("cafe"));
        let b = CacheKeyParams::new()
            .with_text("category", Some("cafe"))
            .with_float("lon", -95.3698)
            .with_float("lat", 29.7604);

        assert_eq!(generator.generate(&a), generator.generate(&b));
    }

    #[test]
    fn test_float_jitter_does_not_change_key() {
        let generator = DigestKeyGenerator::new();

        let exact = generator.generate_with_namespace("nearby", &nearby_params(29.7604, -95.3698));
        let jittered = generator.generate_with_namespace(
            "nearby",
            &nearby_params(29.760400000000004, -95.36980000001),
        );

        assert_eq!(exact, jittered);
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let generator = DigestKeyGenerator::new();

        assert_eq!(
            generator.generate(&nearby_params(0.0, 0.0)),
            generator.generate(&nearby_params(-0.0, -0.000001))
        );
    }

    #[test]
    fn test_different_params_different_keys() {
        let generator = DigestKeyGenerator::new();

        let a = generator.generate(&nearby_params(29.7604, -95.3698));
        let b = generator.generate(&nearby_params(29.7605, -95.3698));
        let c = generator.generate(&nearby_params(29.7604, -95.3698).with_text("category", Some("cafe")));

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_null_differs_from_missing() {
        let generator = DigestKeyGenerator::new();

        let with_null = CacheKeyParams::new().with_text("category", None);
        let empty = CacheKeyParams::new();

        assert_ne!(generator.generate(&with_null), generator.generate(&empty));
    }

    #[test]
    fn test_key_format() {
        let generator = DigestKeyGenerator::new();
        let key = generator.generate_with_namespace("bbox", &nearby_params(1.0, 2.0));

        let (namespace, digest) = key.split_once(':').unwrap();
        assert_eq!(namespace, "bbox");
        assert_eq!(digest.len(), DIGEST_HEX_LENGTH);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_len() {
        let generator = DigestKeyGenerator::new().with_digest_len(40);
        assert_eq!(generator.generate(&CacheKeyParams::new()).len(), 40);
    }
}
