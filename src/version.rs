// src/version.rs

//! Bundle version normalization
//!
//! The stub's version resource stores four unsigned 16-bit components.
//! Authored version strings are normalized here before any resource write:
//! missing trailing components become zero, negative components clamp to
//! zero, and a component past 65535 (or a fifth component) rejects the
//! whole version.

use crate::error::{Error, Result};
use std::fmt;

/// A version normalized to four u16 components
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionQuad {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl VersionQuad {
    /// Parse an authored dotted version string into a quad
    pub fn parse(authored: &str) -> Result<Self> {
        let invalid = |detail: &str| Error::InvalidVersion {
            authored: authored.to_string(),
            detail: detail.to_string(),
        };

        if authored.trim().is_empty() {
            return Err(invalid("empty version string"));
        }

        let parts: Vec<&str> = authored.trim().split('.').collect();
        if parts.len() > 4 {
            return Err(invalid("more than four components"));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            let value: i64 = part
                .parse()
                .map_err(|_| invalid(&format!("component '{}' is not a number", part)))?;
            // Upstream tools emit -1 for unset components; clamp rather than reject.
            let value = value.max(0);
            if value > u16::MAX as i64 {
                return Err(invalid(&format!("component {} exceeds 65535", value)));
            }
            components[i] = value as u16;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            build: components[2],
            revision: components[3],
        })
    }

    pub fn components(&self) -> [u16; 4] {
        [self.major, self.minor, self.build, self.revision]
    }
}

impl fmt::Display for VersionQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_quad_parses() {
        let v = VersionQuad::parse("1.2.3.4").unwrap();
        assert_eq!(v.components(), [1, 2, 3, 4]);
        assert_eq!(v.to_string(), "1.2.3.4");
    }

    #[test]
    fn missing_components_default_to_zero() {
        assert_eq!(VersionQuad::parse("1.2").unwrap().components(), [1, 2, 0, 0]);
        assert_eq!(VersionQuad::parse("7").unwrap().components(), [7, 0, 0, 0]);
    }

    #[test]
    fn negative_components_clamp_to_zero() {
        let v = VersionQuad::parse("1.-1.3").unwrap();
        assert_eq!(v.components(), [1, 0, 3, 0]);
    }

    #[test]
    fn component_overflow_is_rejected() {
        let err = VersionQuad::parse("1.2.65536").unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
        assert!(VersionQuad::parse("65535.65535.65535.65535").is_ok());
    }

    #[test]
    fn five_components_are_rejected() {
        assert!(VersionQuad::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(VersionQuad::parse("").is_err());
        assert!(VersionQuad::parse("1.two.3").is_err());
        assert!(VersionQuad::parse("v1.0").is_err());
    }
}
