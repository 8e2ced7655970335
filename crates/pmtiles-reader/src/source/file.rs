//! Local file source

use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{RangeResponse, Source, cancellable, check_cancelled};
use crate::error::ReaderResult;

/// Archive stored on the local filesystem
///
/// Files carry no version tag, so expected etags are never contradicted.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read from the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_range(&self, offset: u64, length: u64) -> ReaderResult<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(length.min(1 << 20) as usize);
        file.take(length).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
impl Source for FileSource {
    fn key(&self) -> String {
        self.path.display().to_string()
    }

    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
        _expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse> {
        check_cancelled(cancel)?;
        trace!(path = %self.path.display(), offset, length, "reading file range");
        let data = cancellable(cancel, self.read_range(offset, length)).await??;
        Ok(RangeResponse::new(data))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello pmtiles").unwrap();
        let source = FileSource::new(file.path());

        let resp = source.get_bytes(6, 7, None, Some("ignored")).await.unwrap();
        assert_eq!(resp.data.as_ref(), b"pmtiles");
        assert!(resp.etag.is_none());

        let resp = source.get_bytes(10, 100, None, None).await.unwrap();
        assert_eq!(resp.data.as_ref(), b"les");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("absent.pmtiles"));
        let err = source.get_bytes(0, 10, None, None).await.unwrap_err();
        assert!(matches!(err, crate::ReaderError::Io(_)));
    }
}
