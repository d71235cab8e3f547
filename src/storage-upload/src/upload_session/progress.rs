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

use super::{Outcome, Snapshot};
use crate::Result;
use futures::Stream;
use tokio::sync::watch;

/// The progress of an upload after one step.
///
/// Each step is the start of a resumable upload session, one chunk, or a
/// single-shot upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// The number of bytes acknowledged by the service.
    pub offset: u64,
    /// The total size of the payload.
    pub total: u64,
    /// True if this is the last step of the upload.
    pub done: bool,
}

impl Progress {
    pub(crate) fn new(offset: u64, total: u64, done: bool) -> Self {
        Self {
            offset,
            total,
            done,
        }
    }

    /// The fraction of the payload acknowledged by the service, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        match self.total {
            0 if self.done => 1.0,
            0 => 0.0,
            t => self.offset as f64 / t as f64,
        }
    }
}

/// Observes the steps of an [UploadSession][super::UploadSession].
///
/// The cursor does not trigger any work, it replays the steps completed by
/// the session's background task. Each call to [next()][Self::next] returns
/// the latest step not yet returned by this cursor, waiting for the step in
/// flight if needed. A cursor that falls behind skips to the latest step.
///
/// The sequence ends after the last step of the upload. If the upload fails
/// the cursor returns the error once, and then ends.
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::upload_session::UploadSession;
/// # async fn sample(session: UploadSession) -> anyhow::Result<()> {
/// let mut progress = session.progress();
/// while let Some(p) = progress.next().await.transpose()? {
///     println!("{:.1}%", 100.0 * p.fraction());
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct ProgressCursor {
    state: watch::Receiver<Snapshot>,
    last_seq: u64,
    finished: bool,
}

impl ProgressCursor {
    pub(super) fn new(state: watch::Receiver<Snapshot>) -> Self {
        Self {
            state,
            last_seq: 0,
            finished: false,
        }
    }

    /// Returns the next step, or `None` when the upload is complete.
    pub async fn next(&mut self) -> Option<Result<Progress>> {
        if self.finished {
            return None;
        }
        loop {
            {
                let snapshot = self.state.borrow_and_update();
                if let Some(step) = snapshot.step.filter(|s| s.seq > self.last_seq) {
                    self.last_seq = step.seq;
                    self.finished = step.progress.done;
                    return Some(Ok(step.progress));
                }
                match &snapshot.outcome {
                    Outcome::Pending => {}
                    Outcome::Fulfilled(_) => {
                        self.finished = true;
                        return None;
                    }
                    Outcome::Rejected(e) => {
                        self.finished = true;
                        return Some(Err(e.clone()));
                    }
                }
            }
            if self.state.changed().await.is_err() {
                // The background task stopped without settling the upload.
                self.finished = true;
                return None;
            }
        }
    }

    /// Converts the cursor into a [Stream].
    pub fn into_stream(self) -> impl Stream<Item = Result<Progress>> + Unpin {
        Box::pin(futures::stream::unfold(self, |mut cursor| async move {
            cursor.next().await.map(|item| (item, cursor))
        }))
    }
}
