//! Cache keys

use std::fmt;

/// Identity of a cached header or directory
///
/// Directory keys include the archive's version tag, so directories read
/// from an older version of the archive are never returned for a newer
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Header of an archive
    Header {
        /// Source key
        source: String,
    },
    /// Directory at a byte range of an archive
    Directory {
        /// Source key
        source: String,
        /// Version tag the directory was read under
        etag: Option<String>,
        /// Byte offset
        offset: u64,
        /// Byte length
        length: u64,
    },
}

impl CacheKey {
    /// Key of the header of `source`
    pub fn header(source: &str) -> Self {
        Self::Header {
            source: source.to_string(),
        }
    }

    /// Key of a directory of `source`
    pub fn directory(source: &str, etag: Option<&str>, offset: u64, length: u64) -> Self {
        Self::Directory {
            source: source.to_string(),
            etag: etag.map(str::to_string),
            offset,
            length,
        }
    }

    /// Source key this entry belongs to
    pub fn source(&self) -> &str {
        match self {
            Self::Header { source } | Self::Directory { source, .. } => source,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header { source } => f.write_str(source),
            Self::Directory {
                source,
                etag,
                offset,
                length,
            } => write!(
                f,
                "{source}|{}|{offset}|{length}",
                etag.as_deref().unwrap_or_default()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::header("a.pmtiles").to_string(), "a.pmtiles");
        assert_eq!(
            CacheKey::directory("a.pmtiles", Some("v1"), 127, 25).to_string(),
            "a.pmtiles|v1|127|25"
        );
        assert_eq!(
            CacheKey::directory("a.pmtiles", None, 127, 25).to_string(),
            "a.pmtiles||127|25"
        );
    }

    #[test]
    fn test_etag_separates_versions() {
        let old = CacheKey::directory("a", Some("v1"), 0, 10);
        let new = CacheKey::directory("a", Some("v2"), 0, 10);
        assert_ne!(old, new);
        assert_eq!(old.source(), new.source());
        assert_ne!(CacheKey::header("a"), CacheKey::directory("a", None, 0, 0));
    }
}
