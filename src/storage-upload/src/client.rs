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

use crate::Error;
use crate::builder::UploadObject;
use crate::config::UploadConfig;
use crate::model::ObjectTarget;
use crate::transport::{HttpTransport, RequestIssuer};
use crate::upload_source::Payload;
use std::sync::Arc;
use std::time::Duration;

/// Implements a client to upload objects to Cloud Storage.
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::client::Storage;
/// # async fn sample() -> anyhow::Result<()> {
/// use google_cloud_storage_upload::upload_source::BytesPayload;
/// let client = Storage::builder().build()?;
/// let object = client
///     .upload_object("projects/_/buckets/my-bucket", "my-object", BytesPayload::from("hello world"))
///     .send()
///     .await?;
/// println!("uploaded {object:?}");
/// # Ok(()) }
/// ```
///
/// # Configuration
///
/// To configure `Storage` use the `with_*` methods in the type returned
/// by [builder()][Storage::builder]. The default configuration should
/// work for most applications. Common configuration changes include
///
/// * [with_endpoint()]: by default this client uses the global default
///   upload endpoint (`https://storage.googleapis.com/upload/storage/v1`).
/// * [with_chunk_granularity()]: the chunk size used for resumable uploads
///   when the service does not dictate one.
///
/// # Pooling and Cloning
///
/// `Storage` holds a connection pool internally, it is advised to
/// create one and then reuse it. You do not need to wrap `Storage` in
/// an [Rc](std::rc::Rc) or [Arc] to reuse it, because it already uses an `Arc`
/// internally.
///
/// [with_endpoint()]: ClientBuilder::with_endpoint
/// [with_chunk_granularity()]: ClientBuilder::with_chunk_granularity
#[derive(Debug)]
pub struct Storage<T = HttpTransport> {
    inner: Arc<StorageInner<T>>,
}

#[derive(Debug)]
pub(crate) struct StorageInner<T> {
    pub transport: Arc<T>,
    pub config: UploadConfig,
}

impl<T> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Storage {
    /// Returns a builder for [Storage].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_upload::client::Storage;
    /// # fn sample() -> anyhow::Result<()> {
    /// let client = Storage::builder().build()?;
    /// # Ok(()) }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T> Storage<T>
where
    T: RequestIssuer,
{
    /// Upload an object.
    ///
    /// Returns a request builder. Use [send()][UploadObject::send] to start
    /// an [UploadSession][crate::upload_session::UploadSession] and wait for
    /// the result, or [start()][UploadObject::start] to observe the progress.
    ///
    /// # Parameters
    /// * `bucket` - the bucket name containing the object. In
    ///   `projects/_/buckets/{bucket_id}` format, or just the bucket id.
    /// * `object` - the object name.
    /// * `payload` - the object data.
    pub fn upload_object<B, O, P>(&self, bucket: B, object: O, payload: P) -> UploadObject<T, P>
    where
        B: Into<String>,
        O: Into<String>,
        P: Payload,
    {
        UploadObject::new(
            self.inner.transport.clone(),
            self.inner.config.clone(),
            ObjectTarget::new(bucket, object),
            payload,
        )
    }

    /// The configuration used for new upload sessions.
    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }
}

/// A builder for [Storage].
///
/// ```
/// # use google_cloud_storage_upload::client::Storage;
/// # fn sample() -> anyhow::Result<()> {
/// let client = Storage::builder()
///     .with_endpoint("https://storage.googleapis.com/upload/storage/v1")
///     .build()?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    pub(crate) config: UploadConfig,
    pub(crate) timeout: Option<Duration>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: UploadConfig::new(),
            timeout: None,
        }
    }

    /// Creates a new client using the default `reqwest`-based transport.
    pub fn build(self) -> crate::Result<Storage> {
        let transport = HttpTransport::new(self.timeout)?;
        self.build_with_transport(transport)
    }

    /// Creates a new client sending all requests through `transport`.
    ///
    /// Use this to add authentication, retries or custom instrumentation to
    /// the requests.
    pub fn build_with_transport<T: RequestIssuer>(self, transport: T) -> crate::Result<Storage<T>> {
        tracing::info!("builder={self:?}");
        if self.config.chunk_granularity == 0 {
            return Err(Error::binding("the chunk granularity must be greater than zero"));
        }
        let inner = StorageInner {
            transport: Arc::new(transport),
            config: self.config,
        };
        Ok(Storage {
            inner: Arc::new(inner),
        })
    }

    /// Sets the endpoint.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_upload::client::Storage;
    /// # fn sample() -> anyhow::Result<()> {
    /// let client = Storage::builder()
    ///     .with_endpoint("https://private.googleapis.com/upload/storage/v1")
    ///     .build()?;
    /// # Ok(()) }
    /// ```
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.config.endpoint = v.into();
        self
    }

    /// Sets the chunk size for resumable uploads, used when the service does
    /// not return a chunk granularity.
    ///
    /// Must be greater than zero. The service requires all chunks, except the
    /// last one, to be a multiple of 256 KiB.
    pub fn with_chunk_granularity<V: Into<u64>>(mut self, v: V) -> Self {
        self.config.chunk_granularity = v.into();
        self
    }

    /// Sets the payload size threshold to switch from single-shot to resumable uploads.
    ///
    /// The library selects resumable uploads when the payload is equal to or
    /// larger than this option, unless the application sets a strategy with
    /// [UploadObject::with_strategy].
    pub fn with_resumable_upload_threshold<V: Into<u64>>(mut self, v: V) -> Self {
        self.config.resumable_upload_threshold = v.into();
        self
    }

    /// Sets a timeout for each request sent by the default transport.
    ///
    /// Ignored by [build_with_transport()][ClientBuilder::build_with_transport].
    pub fn with_timeout(mut self, v: Duration) -> Self {
        self.timeout = Some(v);
        self
    }
}

/// The set of characters that are percent encoded.
///
/// This set is defined at https://cloud.google.com/storage/docs/request-endpoints#encoding:
///
/// Encode the following characters when they appear in either the object name
/// or query string of a request URL:
///     !, #, $, &, ', (, ), *, +, ,, /, :, ;, =, ?, @, [, ], and space characters.
const ENCODED_CHARS: percent_encoding::AsciiSet = percent_encoding::CONTROLS
    .add(b'!')
    .add(b'#')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b' ');

/// Percent encode a string.
pub(crate) fn enc(value: &str) -> String {
    percent_encoding::utf8_percent_encode(value, &ENCODED_CHARS).to_string()
}
