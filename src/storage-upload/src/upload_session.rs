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

//! Upload sessions.
//!
//! An [UploadSession] owns the lifecycle of one upload. It is created with a
//! target, a payload, metadata and a [Strategy], and immediately starts a
//! background task that drives the upload:
//!
//! * [Strategy::SingleShot] sends the full payload in one request.
//! * [Strategy::Resumable] starts a resumable upload session, learns the chunk
//!   granularity from the service, and then sends the payload in chunks, in
//!   order, the last chunk finalizes the upload.
//!
//! The background task is the only writer of the session state. It publishes
//! each completed step, and eventually the outcome, through a
//! [watch][tokio::sync::watch] channel. Applications observe the state using
//! a [ProgressCursor] and/or a [Completion].

use crate::config::UploadConfig;
use crate::model::{Metadata, Object, ObjectTarget};
use crate::transport::RequestIssuer;
use crate::upload_source::Payload;
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::watch;

mod completion;
mod progress;
mod resumable;
mod single_shot;

pub use completion::Completion;
pub use progress::{Progress, ProgressCursor};

/// The upload protocol used by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Upload the full payload in a single request.
    SingleShot,
    /// Upload the payload in chunks, using a resumable upload session.
    Resumable,
}

/// A running upload.
///
/// The upload starts when the session is created and continues in the
/// background, even if the session is dropped. Await the session (or a
/// [Completion]) to get the result, and use [progress()][Self::progress]
/// to observe each step.
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::client::Storage;
/// # async fn sample(client: &Storage) -> anyhow::Result<()> {
/// use google_cloud_storage_upload::upload_source::BytesPayload;
/// let session = client
///     .upload_object("my-bucket", "my-object", BytesPayload::from("hello world"))
///     .start();
/// let object = session.await?;
/// println!("uploaded {object:?}");
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct UploadSession {
    state: watch::Receiver<Snapshot>,
}

impl UploadSession {
    /// Creates a session and starts the upload in the background.
    ///
    /// Must be called within a tokio runtime. Most applications use
    /// [Storage::upload_object][crate::client::Storage::upload_object]
    /// instead.
    pub fn start<T, P>(
        transport: Arc<T>,
        config: UploadConfig,
        target: ObjectTarget,
        payload: P,
        metadata: Metadata,
        strategy: Strategy,
    ) -> Self
    where
        T: RequestIssuer,
        P: Payload,
    {
        let (tx, rx) = watch::channel(Snapshot::default());
        let driver = Driver {
            transport,
            config,
            target,
            payload,
            metadata,
            publisher: Publisher::new(tx),
        };
        let _ = tokio::spawn(driver.run(strategy));
        Self { state: rx }
    }

    /// Returns a cursor over the progress of this upload.
    pub fn progress(&self) -> ProgressCursor {
        ProgressCursor::new(self.state.clone())
    }

    /// Returns a handle to wait for the result of this upload.
    pub fn completion(&self) -> Completion {
        Completion::new(self.state.clone())
    }

    /// The most recently completed step, if any.
    pub fn last_progress(&self) -> Option<Progress> {
        self.state.borrow().step.map(|s| s.progress)
    }
}

impl std::future::IntoFuture for UploadSession {
    type Output = Result<Object>;
    type IntoFuture = BoxFuture<'static, Result<Object>>;

    fn into_future(self) -> Self::IntoFuture {
        self.completion().into_future()
    }
}

/// The state published by the background task.
#[derive(Clone, Debug, Default)]
struct Snapshot {
    step: Option<Step>,
    outcome: Outcome,
}

impl Snapshot {
    fn is_settled(&self) -> bool {
        !matches!(self.outcome, Outcome::Pending)
    }
}

/// A completed step, `seq` starts at 1 and increases with each step.
#[derive(Clone, Copy, Debug)]
struct Step {
    seq: u64,
    progress: Progress,
}

#[derive(Clone, Debug, Default)]
enum Outcome {
    #[default]
    Pending,
    Fulfilled(Object),
    Rejected(Error),
}

impl Outcome {
    fn settled(&self) -> Option<Result<Object>> {
        match self {
            Self::Pending => None,
            Self::Fulfilled(o) => Some(Ok(o.clone())),
            Self::Rejected(e) => Some(Err(e.clone())),
        }
    }
}

/// Publishes steps and the outcome of a session.
///
/// The outcome transitions at most once, later attempts are ignored.
#[derive(Debug)]
struct Publisher {
    tx: watch::Sender<Snapshot>,
    seq: u64,
}

impl Publisher {
    fn new(tx: watch::Sender<Snapshot>) -> Self {
        Self { tx, seq: 0 }
    }

    fn next_step(&mut self, progress: Progress) -> Step {
        self.seq += 1;
        Step {
            seq: self.seq,
            progress,
        }
    }

    fn step(&mut self, progress: Progress) {
        let step = self.next_step(progress);
        self.tx.send_if_modified(|s| {
            if s.is_settled() {
                return false;
            }
            s.step = Some(step);
            true
        });
    }

    /// Publishes the final step and the object in a single update.
    fn fulfill(&mut self, progress: Progress, object: Object) {
        let step = self.next_step(progress);
        self.tx.send_if_modified(|s| {
            if s.is_settled() {
                return false;
            }
            s.step = Some(step);
            s.outcome = Outcome::Fulfilled(object);
            true
        });
    }

    fn reject(&mut self, error: Error) {
        self.tx.send_if_modified(|s| {
            if s.is_settled() {
                return false;
            }
            s.outcome = Outcome::Rejected(error);
            true
        });
    }
}

/// The background task for one session.
struct Driver<T, P> {
    transport: Arc<T>,
    config: UploadConfig,
    target: ObjectTarget,
    payload: P,
    metadata: Metadata,
    publisher: Publisher,
}

impl<T, P> Driver<T, P>
where
    T: RequestIssuer,
    P: Payload,
{
    async fn run(mut self, strategy: Strategy) {
        tracing::info!(
            "starting {strategy:?} upload for {:?}, size={}",
            self.target,
            self.payload.size()
        );
        let result = match self.target.validate() {
            Err(e) => Err(e),
            Ok(()) => match strategy {
                Strategy::Resumable => self.resumable().await,
                Strategy::SingleShot => self.single_shot().await,
            },
        };
        match result {
            Ok(()) => tracing::info!("upload for {:?} completed", self.target),
            Err(e) => {
                tracing::error!("upload for {:?} failed: {e:?}", self.target);
                self.publisher.reject(e);
            }
        }
    }

    fn bucket_id(&self) -> Result<&str> {
        self.target.bucket_id()
    }
}

// Header names for the resumable upload protocol.
const UPLOAD_PROTOCOL: http::HeaderName = http::HeaderName::from_static("x-goog-upload-protocol");
const UPLOAD_COMMAND: http::HeaderName = http::HeaderName::from_static("x-goog-upload-command");
const UPLOAD_OFFSET: http::HeaderName = http::HeaderName::from_static("x-goog-upload-offset");
const UPLOAD_CONTENT_LENGTH: http::HeaderName =
    http::HeaderName::from_static("x-goog-upload-header-content-length");
const UPLOAD_CONTENT_TYPE: http::HeaderName =
    http::HeaderName::from_static("x-goog-upload-header-content-type");
const UPLOAD_URL: &str = "x-goog-upload-url";
const UPLOAD_CHUNK_GRANULARITY: &str = "x-goog-upload-chunk-granularity";

fn status_error(response: &crate::transport::HttpResponse) -> crate::error::UploadError {
    crate::error::UploadError::UnexpectedStatus(response.status.as_u16())
}

#[cfg(test)]
mod resumable_tests;
