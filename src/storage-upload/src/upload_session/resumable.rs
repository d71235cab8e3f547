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

use super::{
    Driver, Progress, UPLOAD_CHUNK_GRANULARITY, UPLOAD_COMMAND, UPLOAD_CONTENT_LENGTH,
    UPLOAD_CONTENT_TYPE, UPLOAD_OFFSET, UPLOAD_PROTOCOL, UPLOAD_URL, status_error,
};
use crate::client::enc;
use crate::error::UploadError;
use crate::model::{Object, insert_body};
use crate::transport::{HttpRequest, HttpResponse, RequestIssuer};
use crate::upload_source::Payload;
use crate::{Error, Result};
use http::HeaderValue;

/// The result of starting a resumable upload.
///
/// Both values are fixed for the rest of the upload.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct ResumableSession {
    pub url: String,
    pub granularity: u64,
}

/// One chunk in a resumable upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Chunk {
    pub offset: u64,
    pub len: u64,
    pub is_final: bool,
}

impl Chunk {
    /// The chunk starting at `offset`, for a payload of `size` bytes.
    ///
    /// A chunk shorter than `granularity` is final. The chunk that reaches
    /// the end of the payload is also final, even if it is a full chunk, so
    /// an upload always ends with a `finalize` command.
    pub fn at(offset: u64, granularity: u64, size: u64) -> Self {
        let end = offset.saturating_add(granularity).min(size);
        let len = end.saturating_sub(offset);
        Self {
            offset,
            len,
            is_final: len < granularity || end == size,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    fn command(&self) -> HeaderValue {
        if self.is_final {
            HeaderValue::from_static("upload, finalize")
        } else {
            HeaderValue::from_static("upload")
        }
    }
}

impl<T, P> Driver<T, P>
where
    T: RequestIssuer,
    P: Payload,
{
    pub(super) async fn resumable(&mut self) -> Result<()> {
        let size = self.payload.size();
        let session = self.negotiate().await?;
        tracing::debug!("resumable upload session started: {session:?}");
        self.publisher.step(Progress::new(0, size, false));

        let mut offset = 0_u64;
        loop {
            let chunk = Chunk::at(offset, session.granularity, size);
            let request = self.chunk_request(&session, &chunk).await?;
            tracing::debug!("sending {chunk:?}");
            let response = self.transport.issue(request).await?;
            if !response.is_success() {
                return Err(Error::upload(status_error(&response)));
            }
            offset = chunk.end();
            let progress = Progress::new(offset, size, chunk.is_final);
            if chunk.is_final {
                let object = response.json::<Object>()?;
                self.publisher.fulfill(progress, object);
                return Ok(());
            }
            self.publisher.step(progress);
        }
    }

    async fn negotiate(&self) -> Result<ResumableSession> {
        let request = self.start_request()?;
        let response = self.transport.issue(request).await?;
        handle_start_response(&response, self.config.chunk_granularity)
    }

    fn start_request(&self) -> Result<HttpRequest> {
        let url = format!(
            "{}/b/{}/o?name={}&uploadType=resumable",
            self.config.base_url(),
            self.bucket_id()?,
            enc(self.target.name())
        );
        let content_type = self.payload.content_type();
        let body = insert_body(&self.target, content_type, &self.metadata);
        let body = serde_json::to_vec(&body).map_err(Error::ser)?;
        let request = HttpRequest::new(http::Method::POST, url)
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            )
            .with_header(UPLOAD_PROTOCOL, HeaderValue::from_static("resumable"))
            .with_header(UPLOAD_COMMAND, HeaderValue::from_static("start"))
            .with_header(UPLOAD_CONTENT_LENGTH, self.payload.size())
            .with_header(
                UPLOAD_CONTENT_TYPE,
                HeaderValue::from_str(content_type).map_err(Error::ser)?,
            )
            .with_body(body);
        Ok(request)
    }

    async fn chunk_request(
        &self,
        session: &ResumableSession,
        chunk: &Chunk,
    ) -> Result<HttpRequest> {
        let data = self
            .payload
            .slice(chunk.offset..chunk.end())
            .await
            .map_err(Error::ser)?;
        if data.len() as u64 != chunk.len {
            return Err(Error::ser(UploadError::ShortSlice {
                offset: chunk.offset,
                want: chunk.len,
                got: data.len() as u64,
            }));
        }
        let request = HttpRequest::new(http::Method::PUT, session.url.clone())
            .with_header(UPLOAD_OFFSET, chunk.offset)
            .with_header(UPLOAD_COMMAND, chunk.command())
            .with_body(data);
        Ok(request)
    }
}

fn handle_start_response(
    response: &HttpResponse,
    default_granularity: u64,
) -> Result<ResumableSession> {
    if !response.is_success() {
        return Err(Error::negotiation(status_error(response)));
    }
    let url = response
        .header(UPLOAD_URL)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::negotiation(UploadError::MissingSessionUrl))?;
    // The configured default may be zero too, e.g. an `UploadConfig` built
    // without the client builder.
    let granularity = parse_granularity(response).unwrap_or(default_granularity);
    if granularity == 0 {
        return Err(Error::negotiation(UploadError::InvalidGranularity(0)));
    }
    Ok(ResumableSession {
        url: url.to_string(),
        granularity,
    })
}

// A missing or malformed header is not an error, the caller uses the default.
fn parse_granularity(response: &HttpResponse) -> Option<u64> {
    response
        .header(UPLOAD_CHUNK_GRANULARITY)?
        .trim()
        .parse::<u64>()
        .ok()
}
