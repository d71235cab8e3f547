// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines upload data sources.

use std::ops::Range;
use std::path::{Path, PathBuf};

/// The content type used when the application does not provide one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Provides the bytes for an upload.
///
/// The upload session never mutates the payload. It queries the size and
/// content type once, and then requests consecutive slices, in increasing
/// offset order, as it sends each chunk.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// use google_cloud_storage_upload::upload_source::{BytesPayload, Payload};
/// let payload = BytesPayload::from("the quick brown fox jumps over the lazy dog")
///     .with_content_type("text/plain");
/// assert_eq!(payload.size(), 43);
/// assert_eq!(payload.content_type(), "text/plain");
/// let slice = payload.slice(4..9).await?;
/// assert_eq!(slice.as_ref(), b"quick");
/// # anyhow::Result::<()>::Ok(()) });
/// ```
pub trait Payload: Send + Sync + 'static {
    /// The error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The total size of the payload in bytes.
    fn size(&self) -> u64;

    /// The MIME type of the payload.
    fn content_type(&self) -> &str;

    /// Returns the bytes in `range`.
    ///
    /// The session only requests ranges within `0..size()`. Implementations
    /// must return exactly `range.end - range.start` bytes.
    fn slice(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = Result<bytes::Bytes, Self::Error>> + Send;
}

/// An in-memory payload.
///
/// Slicing a `BytesPayload` does not copy any data.
#[derive(Clone, Debug)]
pub struct BytesPayload {
    contents: bytes::Bytes,
    content_type: String,
}

impl BytesPayload {
    pub fn new<T: Into<bytes::Bytes>>(contents: T) -> Self {
        Self {
            contents: contents.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// Sets the content type.
    pub fn with_content_type<V: Into<String>>(mut self, v: V) -> Self {
        self.content_type = v.into();
        self
    }
}

impl Payload for BytesPayload {
    type Error = std::convert::Infallible;

    fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn slice(&self, range: Range<u64>) -> Result<bytes::Bytes, Self::Error> {
        let len = self.contents.len();
        let end = std::cmp::min(range.end as usize, len);
        let start = std::cmp::min(range.start as usize, end);
        Ok(self.contents.slice(start..end))
    }
}

impl From<bytes::Bytes> for BytesPayload {
    fn from(value: bytes::Bytes) -> Self {
        Self::new(value)
    }
}

impl From<&'static str> for BytesPayload {
    fn from(value: &'static str) -> Self {
        Self::new(bytes::Bytes::from_static(value.as_bytes()))
    }
}

impl From<&'static [u8]> for BytesPayload {
    fn from(value: &'static [u8]) -> Self {
        Self::new(bytes::Bytes::from_static(value))
    }
}

impl From<String> for BytesPayload {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for BytesPayload {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

/// A payload backed by a local file.
///
/// The file size is captured when the payload is opened. Each slice opens the
/// file and reads the requested range, so only one chunk is held in memory at
/// a time.
#[derive(Clone, Debug)]
pub struct FilePayload {
    path: PathBuf,
    size: u64,
    content_type: String,
}

impl FilePayload {
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Self {
            path,
            size,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        })
    }

    /// Sets the content type.
    pub fn with_content_type<V: Into<String>>(mut self, v: V) -> Self {
        self.content_type = v.into();
        self
    }
}

impl Payload for FilePayload {
    type Error = std::io::Error;

    fn size(&self) -> u64 {
        self.size
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn slice(&self, range: Range<u64>) -> Result<bytes::Bytes, Self::Error> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};
        let len = range.end.saturating_sub(range.start) as usize;
        let mut file = tokio::fs::File::open(&self.path).await?;
        let _ = file.seek(std::io::SeekFrom::Start(range.start)).await?;
        let mut buffer = vec![0_u8; len];
        file.read_exact(&mut buffer).await?;
        Ok(bytes::Bytes::from_owner(buffer))
    }
}
