//! Cache entry identity.

use std::fmt;

/// Identifies one cache entry: a region plus a key within it.
///
/// Keys of any displayable type are normalised to their string form, so
/// `42_u64` and `"42"` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub region: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(region: impl Into<String>, key: impl fmt::Display) -> Self {
        Self {
            region: region.into(),
            key: key.to_string(),
        }
    }

    /// Key of this entry in the durable store.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{prefix}{}:{}", self.region, self.key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_keys_are_equivalent() {
        assert_eq!(CacheKey::new("child", 42), CacheKey::new("child", "42"));
    }

    #[test]
    fn storage_key_includes_prefix_and_region() {
        let key = CacheKey::new("parent", 7);
        assert_eq!(key.storage_key("cache:"), "cache:parent:7");
        assert_eq!(key.to_string(), "parent:7");
    }
}
