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

//! Errors returned by upload sessions.
//!
//! Every failure is terminal for the session that observes it. The session
//! stores the error and hands a clone to each observer, so [Error] is cheap to
//! clone and shares its source.

use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by all upload operations.
///
/// Applications can use the predicates to classify the error. The details,
/// if any, are available through [source][std::error::Error::source]. For
/// protocol violations detected by this crate the source is an
/// [UploadError].
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::error::{Error, UploadError};
/// fn handle(e: Error) {
///     if e.is_negotiation() {
///         println!("could not start the upload session: {e}");
///     } else if let Some(code) = e.http_status_code() {
///         println!("the service rejected the upload with {code}");
///     }
/// }
/// # handle(Error::upload(UploadError::UnexpectedStatus(503)));
/// ```
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<SharedError>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ErrorKind {
    Negotiation,
    Upload,
    Transport,
    Deserialization,
    Serialization,
    Binding,
}

impl Error {
    /// Starting the resumable upload session failed.
    pub fn negotiation<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Negotiation, source)
    }

    /// The service rejected an upload request, either a single-shot upload
    /// or one of the chunks in a resumable upload.
    pub fn upload<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Upload, source)
    }

    /// The request issuer could not complete a request.
    pub fn transport<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Transport, source)
    }

    /// The response from the service could not be decoded.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Deserialization, source)
    }

    /// The request could not be formatted, or the payload could not produce
    /// the requested data.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Serialization, source)
    }

    /// The request parameters are invalid, e.g. an empty object name.
    pub fn binding<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Binding, source)
    }

    fn new<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        Self {
            kind,
            source: Some(Arc::from(source.into())),
        }
    }

    pub fn is_negotiation(&self) -> bool {
        matches!(self.kind, ErrorKind::Negotiation)
    }

    pub fn is_upload(&self) -> bool {
        matches!(self.kind, ErrorKind::Upload)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport)
    }

    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    pub fn is_binding(&self) -> bool {
        matches!(self.kind, ErrorKind::Binding)
    }

    /// The protocol violation detected by this crate, if any.
    pub fn upload_error(&self) -> Option<&UploadError> {
        self.source.as_ref()?.downcast_ref::<UploadError>()
    }

    /// The HTTP status code, if the service rejected a request.
    pub fn http_status_code(&self) -> Option<u16> {
        match self.upload_error()? {
            UploadError::UnexpectedStatus(code) => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.kind {
            ErrorKind::Negotiation => "cannot start the resumable upload session",
            ErrorKind::Upload => "the upload request failed",
            ErrorKind::Transport => "the transport reports an error",
            ErrorKind::Deserialization => "cannot deserialize the response",
            ErrorKind::Serialization => "cannot serialize the request",
            ErrorKind::Binding => "invalid request parameters",
        };
        match &self.source {
            Some(e) => write!(f, "{prefix}: {e}"),
            None => write!(f, "{prefix}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A problem in the upload protocol.
///
/// These are returned as the [source][std::error::Error::source] of an
/// [Error].
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum UploadError {
    /// The service responded with a status code that is not a success.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The service accepted the start of a resumable upload, but did not
    /// return the URL for the upload session.
    #[error("missing session URL")]
    MissingSessionUrl,

    /// The service returned a chunk granularity that cannot make progress.
    #[error("invalid chunk granularity {0}, must be greater than zero")]
    InvalidGranularity(u64),

    /// The payload returned a slice with the wrong number of bytes.
    #[error("the payload returned {got} bytes for a slice of {want} bytes at offset {offset}")]
    ShortSlice { offset: u64, want: u64, got: u64 },

    /// The background task stopped before the upload was settled.
    #[error("the upload task stopped before the upload completed")]
    Interrupted,
}
