//! Structured resource names (ARNs).
//!
//! Some resources use their ARN as the handle. The resource segment carries a
//! type prefix (`domain/`, `table/`, ...) that is stripped to recover the
//! resource name.

use std::str::FromStr;

use crate::error::{EngineError, Result};

use super::handle::ResourceHandle;

const ARN_FORMAT: &str = "arn:PARTITION:SERVICE:REGION:ACCOUNT:RESOURCE";

/// A parsed structured resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    /// Partition, e.g. `aws` or `aws-cn`.
    pub partition: String,
    /// Service namespace, e.g. `es`.
    pub service: String,
    /// Region; empty for global services.
    pub region: String,
    /// Account ID; empty for some services.
    pub account_id: String,
    /// Resource segment, e.g. `domain/search-prod`. May itself contain `:` or `/`.
    pub resource: String,
}

impl Arn {
    /// Parses an ARN.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHandle` if the string is not a structured name.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = |reason: &str| EngineError::malformed(raw, ARN_FORMAT, reason);

        let mut sections = raw.splitn(6, ':');
        if sections.next() != Some("arn") {
            return Err(malformed("missing arn: prefix"));
        }

        let partition = sections.next().unwrap_or_default();
        let service = sections.next().unwrap_or_default();
        let region = sections.next();
        let account_id = sections.next();
        let resource = sections.next();

        let (Some(region), Some(account_id), Some(resource)) = (region, account_id, resource) else {
            return Err(malformed("expected 6 colon-separated sections"));
        };

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(malformed("partition, service and resource must not be empty"));
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Returns the resource name with a known type prefix stripped.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHandle` if the resource segment does not start with
    /// `prefix` or nothing remains after stripping it.
    pub fn resource_name(&self, prefix: &str) -> Result<String> {
        match self.resource.strip_prefix(prefix) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(EngineError::malformed(
                self.to_string(),
                format!("arn:PARTITION:{}:REGION:ACCOUNT:{prefix}NAME", self.service),
                format!("resource segment does not match prefix {prefix:?}"),
            )),
        }
    }
}

/// Decodes a handle that holds an ARN into the bare resource name.
///
/// `arn:aws:es:us-east-1:123456789012:domain/search-prod` with prefix
/// `domain/` decodes to `search-prod`.
///
/// # Errors
///
/// Returns `MalformedHandle` if the handle is not an ARN or the resource
/// segment does not carry the prefix.
pub fn decode_from_arn(handle: &ResourceHandle, prefix: &str) -> Result<String> {
    Arn::parse(handle.as_str())?.resource_name(prefix)
}

impl FromStr for Arn {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Arn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_and_display() {
        let raw = "arn:aws:es:us-east-1:123456789012:domain/search-prod";
        let arn = Arn::parse(raw).unwrap();
        assert_eq!(arn.service, "es");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.resource, "domain/search-prod");
        assert_eq!(arn.to_string(), raw);
    }

    #[test]
    fn test_resource_may_contain_colons() {
        let arn: Arn = "arn:aws:logs:eu-west-1:123:log-group:/app/api:*".parse().unwrap();
        assert_eq!(arn.resource, "log-group:/app/api:*");
    }

    #[test]
    fn test_global_service_has_empty_region() {
        let arn = Arn::parse("arn:aws:iam::123456789012:role/app").unwrap();
        assert!(arn.region.is_empty());
        assert_eq!(arn.resource_name("role/").unwrap(), "app");
    }

    #[test]
    fn test_decode_from_arn() {
        let handle = ResourceHandle::from_raw("arn:aws:es:us-east-1:123456789012:domain/search-prod");
        assert_eq!(decode_from_arn(&handle, "domain/").unwrap(), "search-prod");
    }

    #[test]
    fn test_decode_from_arn_rejects_plain_names() {
        for raw in ["search-prod", "arn:aws:es", "arn:aws:es:us-east-1:123:", "arn::es:r:a:domain/x"] {
            let err = decode_from_arn(&ResourceHandle::from_raw(raw), "domain/").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedHandle, "{raw}");
        }
    }

    #[test]
    fn test_decode_from_arn_rejects_wrong_prefix() {
        let handle = ResourceHandle::from_raw("arn:aws:es:us-east-1:123:collection/x");
        let err = decode_from_arn(&handle, "domain/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHandle);

        let handle = ResourceHandle::from_raw("arn:aws:es:us-east-1:123:domain/");
        assert!(decode_from_arn(&handle, "domain/").is_err());
    }
}
