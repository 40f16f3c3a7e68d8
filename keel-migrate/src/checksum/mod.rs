//! Versioned, normalizing checksums.
//!
//! A [`Checksum`] is always tagged with the [`ChecksumVersion`] of the algorithm that
//! produced it and renders as `<version>:<hex digest>`, for example `9:5e3f...`.
//! Digests from different versions are never compared with each other: a stored
//! checksum is verified by recomputing the content with the stored version.
//!
//! Two normalizers are live at the same time:
//!
//! - [`ChecksumVersion::V9`] (current) strips comments, collapses whitespace and
//!   removes one trailing delimiter, so cosmetic edits keep the same digest.
//! - [`ChecksumVersion::V8`] (legacy) is frozen and only exists so history rows
//!   written by older engines can still be verified.

mod legacy;
mod normalize;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MigrateResult, MigrationError};

/// Checksum algorithm generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChecksumVersion {
    /// Legacy algorithm.
    V8,
    /// Current algorithm.
    V9,
}

impl ChecksumVersion {
    /// Version written by default.
    pub const CURRENT: ChecksumVersion = ChecksumVersion::V9;
    /// Oldest version still verifiable.
    pub const LEGACY: ChecksumVersion = ChecksumVersion::V8;

    /// Numeric tag.
    pub fn number(&self) -> u8 {
        match self {
            Self::V8 => 8,
            Self::V9 => 9,
        }
    }

    /// Look up a version by its numeric tag.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            8 => Some(Self::V8),
            9 => Some(Self::V9),
            _ => None,
        }
    }

    /// Whether this is the current version.
    pub fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }
}

impl Default for ChecksumVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ChecksumVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl TryFrom<u8> for ChecksumVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("unknown checksum version {}", value))
    }
}

impl From<ChecksumVersion> for u8 {
    fn from(version: ChecksumVersion) -> Self {
        version.number()
    }
}

/// Options that shape how raw SQL is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Statement delimiter; `;` when unset.
    pub end_delimiter: Option<String>,
    /// Whether the SQL is split into statements before execution.
    pub split_statements: bool,
    /// Whether comments are stripped before execution.
    pub strip_comments: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            end_delimiter: None,
            split_statements: true,
            strip_comments: false,
        }
    }
}

impl NormalizeOptions {
    /// Effective delimiter.
    pub fn delimiter(&self) -> &str {
        self.end_delimiter.as_deref().unwrap_or(";")
    }
}

/// Normalize content the way `version` does before hashing.
pub fn normalize(content: &str, version: ChecksumVersion, options: &NormalizeOptions) -> String {
    match version {
        ChecksumVersion::V9 => normalize::normalize(content, options),
        ChecksumVersion::V8 => legacy::normalize(content, options),
    }
}

/// A version-tagged digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
    version: ChecksumVersion,
    digest: String,
}

impl Checksum {
    /// Checksum of text content with default normalization options.
    pub fn compute(content: &str, version: ChecksumVersion) -> Self {
        Self::compute_sql(content, version, &NormalizeOptions::default())
    }

    /// Checksum of SQL content with explicit normalization options.
    pub fn compute_sql(content: &str, version: ChecksumVersion, options: &NormalizeOptions) -> Self {
        Self::compute_raw(normalize(content, version, options).as_bytes(), version)
    }

    /// Checksum of bytes hashed as-is.
    pub fn compute_raw(bytes: &[u8], version: ChecksumVersion) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            version,
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Compose child checksums into a parent checksum.
    ///
    /// The input is every child in display form followed by `:`, so any changed,
    /// added, removed or reordered child changes the result.
    pub fn compose<'a>(children: impl IntoIterator<Item = &'a Checksum>, version: ChecksumVersion) -> Self {
        let mut joined = String::new();
        for child in children {
            joined.push_str(&child.to_string());
            joined.push(':');
        }
        Self::compute_raw(joined.as_bytes(), version)
    }

    /// Parse the `<version>:<digest>` form.
    pub fn parse(value: &str) -> MigrateResult<Self> {
        let invalid = || MigrationError::InvalidChecksum(value.to_string());

        let (version, digest) = value.trim().split_once(':').ok_or_else(invalid)?;
        let version = version
            .parse::<u8>()
            .ok()
            .and_then(ChecksumVersion::from_number)
            .ok_or_else(invalid)?;

        if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        Ok(Self {
            version,
            digest: digest.to_ascii_lowercase(),
        })
    }

    /// Algorithm version.
    pub fn version(&self) -> ChecksumVersion {
        self.version
    }

    /// Hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Compare a stored checksum against a freshly computed one.
    pub fn compare(&self, actual: &Checksum) -> ChecksumComparison {
        if self.version != actual.version {
            ChecksumComparison::VersionChanged {
                stored: self.version,
                current: actual.version,
            }
        } else if self.digest == actual.digest {
            ChecksumComparison::Match
        } else {
            ChecksumComparison::ContentChanged {
                stored: self.clone(),
                actual: actual.clone(),
            }
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.version, self.digest)
    }
}

impl FromStr for Checksum {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_string()
    }
}

/// Outcome of comparing a stored checksum with a computed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumComparison {
    /// Same version, same digest.
    Match,
    /// Produced by different algorithm versions; says nothing about content.
    VersionChanged {
        /// Version of the stored checksum.
        stored: ChecksumVersion,
        /// Version of the computed checksum.
        current: ChecksumVersion,
    },
    /// Same version, different digest: the content was edited.
    ContentChanged {
        /// Stored checksum.
        stored: Checksum,
        /// Recomputed checksum.
        actual: Checksum,
    },
}

impl ChecksumComparison {
    /// Whether the checksums are equal.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Whether this is real content drift.
    pub fn is_drift(&self) -> bool {
        matches!(self, Self::ContentChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V9: ChecksumVersion = ChecksumVersion::V9;
    const V8: ChecksumVersion = ChecksumVersion::V8;

    #[test]
    fn test_display_and_parse() {
        let checksum = Checksum::compute("CREATE TABLE t (id INT)", V9);
        let text = checksum.to_string();
        assert!(text.starts_with("9:"));
        assert_eq!(text.len(), 2 + 64);
        assert_eq!(Checksum::parse(&text).unwrap(), checksum);
    }

    #[test]
    fn test_parse_rejects_untagged_and_unknown() {
        assert!(Checksum::parse("abcdef").is_err());
        assert!(Checksum::parse("7:abcdef").is_err());
        assert!(Checksum::parse("9:").is_err());
        assert!(Checksum::parse("9:xyz").is_err());
        assert!(Checksum::parse("8:ABCDEF").is_ok());
    }

    #[test]
    fn test_cosmetic_edits_keep_checksum() {
        let base = Checksum::compute("CREATE TABLE t (id INT);", V9);
        let variants = [
            "CREATE TABLE t (id INT)",
            "-- create the table\nCREATE TABLE t (id INT);",
            "CREATE TABLE t\n\n    (id\tINT);\n",
            "CREATE TABLE t /* inline */ (id INT);",
            "CREATE TABLE t (id INT);\r\n",
            "\tCREATE   TABLE t (id INT) ;",
        ];
        for variant in variants {
            assert_eq!(Checksum::compute(variant, V9), base, "variant: {:?}", variant);
        }
    }

    #[test]
    fn test_whitespace_is_collapsed_not_removed() {
        let base = Checksum::compute("CREATE TABLE t (id INT);", V9);
        assert_eq!(Checksum::compute("CREATE TABLE t (id INT)", V9), base);
        assert_ne!(Checksum::compute("CREATE TABLE t ( id INT );", V9), base);
        assert_eq!(
            Checksum::compute("CREATE TABLE t (\n  id INT\n);", V9),
            Checksum::compute("CREATE TABLE t ( id INT );", V9)
        );
    }

    #[test]
    fn test_semantic_edits_change_checksum() {
        let base = Checksum::compute("CREATE TABLE t (id INT);", V9);
        assert_ne!(Checksum::compute("CREATE TABLE t (key INT);", V9), base);
        assert_ne!(Checksum::compute("CREATE TABLE u (id INT);", V9), base);
        assert_ne!(Checksum::compute("CREATE VIEW t (id INT);", V9), base);
    }

    #[test]
    fn test_legacy_differs_from_current() {
        let sql = "CREATE TABLE t (id INT);";
        let legacy = Checksum::compute(sql, V8);
        let current = Checksum::compute(sql, V9);
        assert_eq!(legacy.version(), V8);
        assert_ne!(legacy.digest(), current.digest());
        assert_eq!(
            legacy.compare(&current),
            ChecksumComparison::VersionChanged {
                stored: V8,
                current: V9
            }
        );
        assert!(legacy.compare(&Checksum::compute(sql, V8)).is_match());
    }

    #[test]
    fn test_content_changed_is_drift() {
        let stored = Checksum::compute("SELECT 1", V9);
        let actual = Checksum::compute("SELECT 2", V9);
        let comparison = stored.compare(&actual);
        assert!(comparison.is_drift());
        assert!(!stored.compare(&Checksum::compute("SELECT 1", V8)).is_drift());
    }

    #[test]
    fn test_compose_is_order_sensitive() {
        let a = Checksum::compute("a", V9);
        let b = Checksum::compute("b", V9);
        assert_eq!(Checksum::compose([&a, &b], V9), Checksum::compose([&a, &b], V9));
        assert_ne!(Checksum::compose([&a, &b], V9), Checksum::compose([&b, &a], V9));
        assert_ne!(Checksum::compose([&a], V9), Checksum::compose([&a, &b], V9));
    }

    #[test]
    fn test_serde_string_form() {
        let checksum = Checksum::compute("x", V9);
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(json, format!("\"{}\"", checksum));
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checksum);
        assert!(serde_json::from_str::<Checksum>("\"nope\"").is_err());
    }
}
