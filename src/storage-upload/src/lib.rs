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

//! Google Cloud Client Libraries for Rust - Storage Uploads
//!
//! This crate uploads objects to [Google Cloud Storage]. Most applications
//! will use [Storage][client::Storage] to create an
//! [UploadObject][builder::UploadObject] request, and then either wait for
//! the result or observe the upload while it runs.
//!
//! Small payloads are sent in a single request. Larger payloads use a
//! resumable upload session and are sent in chunks. The strategy can also be
//! selected explicitly, see [Strategy][upload_session::Strategy].
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases.
//!
//! [Google Cloud Storage]: https://cloud.google.com/storage

pub mod error;
pub use error::Error;
/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub mod client;
pub mod config;
pub mod model;
pub mod transport;
pub mod upload_session;
pub mod upload_source;

mod upload_object;

/// Request builders.
pub mod builder {
    pub use crate::client::ClientBuilder;
    pub use crate::upload_object::UploadObject;
}
