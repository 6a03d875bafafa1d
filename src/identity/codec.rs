//! Composite identifier codec.
//!
//! Many remote resources are addressed by more than one key (a parent ID and
//! a child name, a table name plus hash and range keys...). The codec packs
//! those parts into one [`ResourceHandle`] and unpacks them again.
//!
//! Two encodings are supported:
//!
//! - **Delimited**: parts joined by a separator chosen per resource so that it
//!   never occurs in the parts' own character set (ARNs already contain `:`
//!   and `/`, so ARN-bearing handles use `,` or `|`).
//! - **Array literal**: `["a","b"]`, for parts that may legitimately contain
//!   the separator (JSON or base64 key values). Opt-in per codec; detected on
//!   decode by a leading `[`.

use tracing::trace;

use crate::error::{EngineError, Result};

use super::handle::ResourceHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PartNames {
    Static(&'static [&'static str]),
    Owned(Vec<String>),
}

impl PartNames {
    fn to_vec(&self) -> Vec<&str> {
        match self {
            Self::Static(names) => names.to_vec(),
            Self::Owned(names) => names.iter().map(String::as_str).collect(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Static(names) => names.len(),
            Self::Owned(names) => names.len(),
        }
    }
}

/// Encoder/decoder for composite resource handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierCodec {
    /// Separator placed between parts.
    separator: char,
    /// Names of the parts, in order, used in error messages.
    part_names: PartNames,
    /// Whether the `["a","b"]` form is accepted and produced.
    allow_array_literal: bool,
}

impl IdentifierCodec {
    /// Comma separator, safe for ARNs.
    pub const COMMA: char = ',';
    /// Pipe separator, safe for ARNs.
    pub const PIPE: char = '|';
    /// Colon separator, for parts that never contain ARNs.
    pub const COLON: char = ':';
    /// Underscore separator, for parts restricted to alphanumerics and dashes.
    pub const UNDERSCORE: char = '_';
    /// Slash separator, for parts that never contain paths.
    pub const SLASH: char = '/';

    /// Creates a codec for handles with the given part names.
    #[must_use]
    pub const fn new(separator: char, part_names: &'static [&'static str]) -> Self {
        Self {
            separator,
            part_names: PartNames::Static(part_names),
            allow_array_literal: false,
        }
    }

    /// Creates a codec from part names known only at runtime.
    #[must_use]
    pub fn with_part_names(separator: char, part_names: Vec<String>) -> Self {
        Self {
            separator,
            part_names: PartNames::Owned(part_names),
            allow_array_literal: false,
        }
    }

    /// Accepts and produces the array-literal form in addition to the delimited one.
    #[must_use]
    pub const fn with_array_literal(mut self) -> Self {
        self.allow_array_literal = true;
        self
    }

    /// Returns the separator.
    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    /// Returns the number of parts a handle carries.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.part_names.len()
    }

    /// Returns the part names, in order.
    #[must_use]
    pub fn part_names(&self) -> Vec<&str> {
        self.part_names.to_vec()
    }

    /// Describes the expected handle format, e.g. `REST-API-ID,STAGE-NAME`.
    #[must_use]
    pub fn expected_format(&self) -> String {
        let separator = self.separator.to_string();
        let names = self.part_names.to_vec();
        let delimited = names.join(separator.as_str());
        if self.allow_array_literal {
            let literal = names
                .iter()
                .map(|name| format!("\"{name}\""))
                .collect::<Vec<_>>()
                .join(",");
            format!("{delimited} or [{literal}]")
        } else {
            delimited
        }
    }

    /// Encodes parts into a handle.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHandle` if the part count is wrong, a part is empty,
    /// or a part contains the separator and the array-literal form is not
    /// allowed.
    pub fn encode<S: AsRef<str>>(&self, parts: &[S]) -> Result<ResourceHandle> {
        let parts: Vec<&str> = parts.iter().map(|p| p.as_ref()).collect();
        let shown = format!("{parts:?}");

        if parts.len() != self.part_count() {
            return Err(self.malformed(
                shown,
                format!("expected {} parts, got {}", self.part_count(), parts.len()),
            ));
        }

        if let Some(idx) = parts.iter().position(|p| p.is_empty()) {
            return Err(self.malformed(shown, format!("part {} is empty", idx + 1)));
        }

        let needs_literal = parts
            .iter()
            .any(|p| p.contains(self.separator) || p.starts_with('['));

        if needs_literal && self.allow_array_literal {
            let literal = serde_json::to_string(&parts)
                .map_err(|e| self.malformed(shown, format!("cannot encode array literal: {e}")))?;
            trace!("Encoded handle as array literal: {literal}");
            return Ok(ResourceHandle::from_raw(literal));
        }

        // A leading '[' is harmless when literals are not recognized.
        if let Some(idx) = parts.iter().position(|p| p.contains(self.separator)) {
            return Err(self.malformed(
                shown,
                format!("part {} contains separator {:?}", idx + 1, self.separator),
            ));
        }

        let separator = self.separator.to_string();
        Ok(ResourceHandle::from_raw(parts.join(separator.as_str())))
    }

    /// Decodes a handle into its parts.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHandle` if the handle has the wrong number of parts
    /// or any empty part.
    pub fn decode(&self, handle: &ResourceHandle) -> Result<Vec<String>> {
        self.decode_str(handle.as_str())
    }

    /// Decodes a raw handle string into its parts.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHandle` if the handle has the wrong number of parts
    /// or any empty part.
    pub fn decode_str(&self, raw: &str) -> Result<Vec<String>> {
        let parts: Vec<String> = if self.allow_array_literal && raw.starts_with('[') {
            serde_json::from_str(raw)
                .map_err(|e| self.malformed(raw, format!("invalid array literal: {e}")))?
        } else {
            raw.split(self.separator).map(String::from).collect()
        };

        if parts.len() != self.part_count() {
            return Err(self.malformed(
                raw,
                format!("expected {} parts, found {}", self.part_count(), parts.len()),
            ));
        }

        if let Some(idx) = parts.iter().position(String::is_empty) {
            return Err(self.malformed(raw, format!("part {} is empty", idx + 1)));
        }

        Ok(parts)
    }

    fn malformed(&self, handle: impl Into<String>, reason: impl Into<String>) -> EngineError {
        EngineError::malformed(handle, self.expected_format(), reason)
    }
}
