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

use crate::upload_session::Strategy;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// The default endpoint for uploads.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1";

/// The chunk size used when the service does not dictate one.
///
/// Resumable upload chunks (except the last one) must be a multiple of 256 KiB.
pub const DEFAULT_CHUNK_GRANULARITY: u64 = 256 * KIB;

// There is some justification for this magic number at:
//     https://github.com/googleapis/google-cloud-cpp/issues/2657
const RESUMABLE_UPLOAD_THRESHOLD: u64 = 16 * MIB;

/// Configuration shared by all the upload sessions created from a client.
///
/// Each session receives its own copy when it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadConfig {
    /// The base URL, requests are sent to `{endpoint}/b/{bucket}/o...`.
    pub endpoint: String,
    /// The chunk granularity if the service does not return one.
    pub chunk_granularity: u64,
    /// Payloads at least this large use resumable uploads, unless the
    /// application picks a strategy explicitly.
    pub resumable_upload_threshold: u64,
}

impl UploadConfig {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chunk_granularity: DEFAULT_CHUNK_GRANULARITY,
            resumable_upload_threshold: RESUMABLE_UPLOAD_THRESHOLD,
        }
    }

    /// Picks the upload strategy for a payload of `size` bytes.
    pub fn strategy_for(&self, size: u64) -> Strategy {
        if size >= self.resumable_upload_threshold {
            Strategy::Resumable
        } else {
            Strategy::SingleShot
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new()
    }
}
