//! Configuration fingerprints for change detection.
//!
//! A fingerprint is a deterministic SHA-256 digest of an [`AttributeMap`].
//! The reconcile controller compares fingerprints to decide whether the
//! desired configuration changed since it was last applied.

use sha2::{Digest, Sha256};

use super::attributes::{AttrValue, AttributeMap};

/// Hasher for computing configuration fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fingerprinter;

impl Fingerprinter {
    /// Creates a new fingerprinter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of an attribute map.
    ///
    /// Absent values are ignored, so maps that are logically equal share a
    /// fingerprint.
    #[must_use]
    pub fn fingerprint(&self, attributes: &AttributeMap) -> String {
        let mut hasher = Sha256::new();
        Self::hash_map(&mut hasher, &attributes.normalized());
        hex::encode(hasher.finalize())
    }

    fn hash_map(hasher: &mut Sha256, map: &AttributeMap) {
        hasher.update(b"{");
        for (key, value) in map {
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key.as_bytes());
            Self::hash_value(hasher, value);
        }
        hasher.update(b"}");
    }

    fn hash_value(hasher: &mut Sha256, value: &AttrValue) {
        // Type tags keep "1", 1 and 1.0 apart.
        match value {
            AttrValue::Null => hasher.update(b"n"),
            AttrValue::Bool(b) => hasher.update(if *b { b"bt" } else { b"bf" }),
            AttrValue::Int(i) => {
                hasher.update(b"i");
                hasher.update(i.to_be_bytes());
            }
            AttrValue::Float(f) => {
                hasher.update(b"f");
                hasher.update(f.to_bits().to_be_bytes());
            }
            AttrValue::String(s) => {
                hasher.update(b"s");
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
            AttrValue::List(items) => {
                hasher.update(b"[");
                for item in items {
                    Self::hash_value(hasher, item);
                }
                hasher.update(b"]");
            }
            AttrValue::Block(block) => Self::hash_map(hasher, block),
        }
    }

    /// Computes a short fingerprint (first 8 characters) for display purposes.
    #[must_use]
    pub fn short(&self, fingerprint: &str) -> String {
        fingerprint.chars().take(8).collect()
    }

    /// Compares two fingerprints in constant time.
    #[must_use]
    pub fn matches(a: &str, b: &str) -> bool {
        if a.len() != b.len() {
            return false;
        }

        a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(size: i64) -> AttributeMap {
        AttributeMap::new()
            .with("name", "a")
            .with("size", size)
            .with("settings", AttributeMap::new().with("enabled", true))
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let fp = Fingerprinter::new();
        assert_eq!(fp.fingerprint(&desired(1)), fp.fingerprint(&desired(1)));
    }

    #[test]
    fn test_different_configs_different_fingerprint() {
        let fp = Fingerprinter::new();
        assert_ne!(fp.fingerprint(&desired(1)), fp.fingerprint(&desired(2)));
    }

    #[test]
    fn test_types_are_distinguished() {
        let fp = Fingerprinter::new();
        let as_int = AttributeMap::new().with("size", 1);
        let as_string = AttributeMap::new().with("size", "1");
        let as_float = AttributeMap::new().with("size", 1.0);
        assert_ne!(fp.fingerprint(&as_int), fp.fingerprint(&as_string));
        assert_ne!(fp.fingerprint(&as_int), fp.fingerprint(&as_float));
    }

    #[test]
    fn test_absent_values_ignored() {
        let fp = Fingerprinter::new();
        let with_null = desired(1).with("extra", AttrValue::Null);
        assert_eq!(fp.fingerprint(&with_null), fp.fingerprint(&desired(1)));
    }

    #[test]
    fn test_short_and_matches() {
        let fp = Fingerprinter::new();
        let full = fp.fingerprint(&desired(1));
        assert_eq!(fp.short(&full).len(), 8);
        assert!(Fingerprinter::matches(&full, &full));
        assert!(!Fingerprinter::matches(&full, &fp.fingerprint(&desired(2))));
        assert!(!Fingerprinter::matches("abc", "ab"));
    }
}
