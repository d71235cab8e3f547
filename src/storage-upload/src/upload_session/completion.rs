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

use super::Snapshot;
use crate::error::UploadError;
use crate::model::Object;
use crate::{Error, Result};
use futures::future::BoxFuture;
use tokio::sync::watch;

/// Waits for the result of an [UploadSession][super::UploadSession].
///
/// A `Completion` resolves exactly once, to the uploaded object or to the
/// error that stopped the upload. Clones observe the same result, and can be
/// awaited from different tasks.
///
/// Use the [FutureExt][futures::FutureExt] combinators to attach handlers.
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::upload_session::UploadSession;
/// # async fn sample(session: UploadSession) {
/// use futures::FutureExt;
/// let completion = session.completion();
/// let name = completion
///     .clone()
///     .into_future()
///     .inspect(|r| println!("upload settled: {r:?}"))
///     .map(|r| r.map(|o| o.name))
///     .await;
/// assert_eq!(completion.peek().map(|r| r.is_ok()), Some(name.is_ok()));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Completion {
    state: watch::Receiver<Snapshot>,
}

impl Completion {
    pub(super) fn new(state: watch::Receiver<Snapshot>) -> Self {
        Self { state }
    }

    /// Returns the result if the upload is already settled.
    pub fn peek(&self) -> Option<Result<Object>> {
        self.state.borrow().outcome.settled()
    }

    /// Waits until the upload is settled.
    pub async fn wait(mut self) -> Result<Object> {
        let settled = match self.state.wait_for(Snapshot::is_settled).await {
            Ok(snapshot) => snapshot.outcome.settled(),
            Err(_) => None,
        };
        // The background task only stops without settling if it panics.
        settled.unwrap_or_else(|| Err(Error::upload(UploadError::Interrupted)))
    }
}

impl std::future::IntoFuture for Completion {
    type Output = Result<Object>;
    type IntoFuture = BoxFuture<'static, Result<Object>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
