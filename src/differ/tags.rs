//! Tag-set differ and tag policy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tags are string key/value pairs.
pub type Tags = BTreeMap<String, String>;

/// Which tags the engine manages, and which it adds by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPolicy {
    /// Key prefixes owned by the provider (`aws:`); never diffed.
    #[serde(default)]
    pub reserved_prefixes: Vec<String>,
    /// Keys managed outside the engine; never diffed.
    #[serde(default)]
    pub ignored_keys: BTreeSet<String>,
    /// Tags applied to every resource unless the resource overrides them.
    #[serde(default)]
    pub default_tags: Tags,
}

/// Result of a tag diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    /// Tags to set: new keys and keys whose value changed.
    pub to_create: Tags,
    /// Tags to remove: keys present before and absent now.
    pub to_remove: Tags,
}

impl TagPolicy {
    /// Policy that excludes the `aws:` prefix and nothing else.
    #[must_use]
    pub fn aws() -> Self {
        Self {
            reserved_prefixes: vec![String::from("aws:")],
            ..Self::default()
        }
    }

    /// Adds a default tag.
    #[must_use]
    pub fn with_default_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    /// Adds an ignored key.
    #[must_use]
    pub fn with_ignored_key(mut self, key: impl Into<String>) -> Self {
        self.ignored_keys.insert(key.into());
        self
    }

    /// Returns true if the engine must not touch this key.
    #[must_use]
    pub fn is_excluded(&self, key: &str) -> bool {
        self.ignored_keys.contains(key)
            || self
                .reserved_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Returns the managed subset of `tags`.
    #[must_use]
    pub fn managed(&self, tags: &Tags) -> Tags {
        tags.iter()
            .filter(|(k, _)| !self.is_excluded(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Overlays resource tags on the default tags.
    #[must_use]
    pub fn merge_defaults(&self, resource_tags: &Tags) -> Tags {
        let mut merged = self.default_tags.clone();
        merged.extend(resource_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Removes tags that only exist because of the defaults.
    ///
    /// A tag is stripped when its key is a default key and its value equals
    /// the default value.
    #[must_use]
    pub fn strip_defaults(&self, observed: &Tags) -> Tags {
        observed
            .iter()
            .filter(|(k, v)| self.default_tags.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Computes the tag operations that turn `old` into `new`.
    ///
    /// Excluded keys are dropped from both sides first.
    #[must_use]
    pub fn diff(&self, old: &Tags, new: &Tags) -> TagDiff {
        diff_tags(&self.managed(old), &self.managed(new))
    }
}

/// Computes the tag operations that turn `old` into `new`.
///
/// `to_create` holds every entry of `new` whose value differs from or is
/// absent in `old`; `to_remove` holds every entry of `old` whose key is
/// absent from `new`.
#[must_use]
pub fn diff_tags(old: &Tags, new: &Tags) -> TagDiff {
    let to_create = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let to_remove = old
        .iter()
        .filter(|(k, _)| !new.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    TagDiff { to_create, to_remove }
}

impl TagDiff {
    /// Returns true if nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_remove.is_empty()
    }

    /// Keys to remove, for untag APIs that take keys only.
    #[must_use]
    pub fn keys_to_remove(&self) -> Vec<&str> {
        self.to_remove.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Display for TagDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (k, v) in &self.to_create {
            writeln!(f, "+ {k} = {v}")?;
        }
        for (k, v) in &self.to_remove {
            writeln!(f, "- {k} = {v}")?;
        }
        Ok(())
    }
}
