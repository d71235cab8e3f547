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

use crate::config::UploadConfig;
use crate::model::{Metadata, Object, ObjectTarget};
use crate::transport::RequestIssuer;
use crate::upload_session::{Strategy, UploadSession};
use crate::upload_source::Payload;
use std::sync::Arc;

/// A request builder for uploads.
///
/// Created by [Storage::upload_object][crate::client::Storage::upload_object].
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::client::Storage;
/// # async fn sample(client: &Storage) -> anyhow::Result<()> {
/// use google_cloud_storage_upload::upload_session::Strategy;
/// use google_cloud_storage_upload::upload_source::BytesPayload;
/// let payload = BytesPayload::from("hello world").with_content_type("text/plain");
/// let session = client
///     .upload_object("projects/_/buckets/my-bucket", "my-object", payload)
///     .with_metadata([("cacheControl", "no-cache")])
///     .with_strategy(Strategy::Resumable)
///     .start();
/// let mut progress = session.progress();
/// while let Some(p) = progress.next().await.transpose()? {
///     println!("{} of {} bytes", p.offset, p.total);
/// }
/// let object = session.await?;
/// println!("uploaded {object:?}");
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct UploadObject<T, P> {
    transport: Arc<T>,
    config: UploadConfig,
    target: ObjectTarget,
    payload: P,
    metadata: Metadata,
    strategy: Option<Strategy>,
}

impl<T, P> UploadObject<T, P>
where
    T: RequestIssuer,
    P: Payload,
{
    pub(crate) fn new(
        transport: Arc<T>,
        config: UploadConfig,
        target: ObjectTarget,
        payload: P,
    ) -> Self {
        Self {
            transport,
            config,
            target,
            payload,
            metadata: Metadata::new(),
            strategy: None,
        }
    }

    /// Sets the metadata attached to the object, replacing any previous
    /// values.
    pub fn with_metadata<I, K, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Selects the upload strategy.
    ///
    /// By default the strategy depends on the payload size, see
    /// [ClientBuilder::with_resumable_upload_threshold][crate::client::ClientBuilder::with_resumable_upload_threshold].
    pub fn with_strategy(mut self, v: Strategy) -> Self {
        self.strategy = Some(v);
        self
    }

    /// Starts the upload in the background and returns its session.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(self) -> UploadSession {
        let strategy = self.strategy.unwrap_or_else(|| self.default_strategy());
        UploadSession::start(
            self.transport,
            self.config,
            self.target,
            self.payload,
            self.metadata,
            strategy,
        )
    }

    /// Starts the upload and waits for the result.
    pub async fn send(self) -> crate::Result<Object> {
        self.start().await
    }

    fn default_strategy(&self) -> Strategy {
        self.config.strategy_for(self.payload.size())
    }
}
