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

use super::{Driver, Progress, status_error};
use crate::client::enc;
use crate::error::UploadError;
use crate::model::{Metadata, Object};
use crate::transport::{HttpRequest, RequestIssuer};
use crate::upload_source::Payload;
use crate::{Error, Result};
use http::HeaderValue;

impl<T, P> Driver<T, P>
where
    T: RequestIssuer,
    P: Payload,
{
    pub(super) async fn single_shot(&mut self) -> Result<()> {
        let size = self.payload.size();
        let request = self.single_shot_request().await?;
        tracing::debug!("sending single-shot upload, size={size}");
        let response = self.transport.issue(request).await?;
        if !response.is_success() {
            return Err(Error::upload(status_error(&response)));
        }
        let object = response.json::<Object>()?;
        self.publisher.fulfill(Progress::new(size, size, true), object);
        Ok(())
    }

    async fn single_shot_request(&self) -> Result<HttpRequest> {
        let size = self.payload.size();
        let url = format!(
            "{}/b/{}/o/{}{}",
            self.config.base_url(),
            self.bucket_id()?,
            enc(self.target.name()),
            query_string(&self.metadata),
        );
        let body = self.payload.slice(0..size).await.map_err(Error::ser)?;
        if body.len() as u64 != size {
            return Err(Error::ser(UploadError::ShortSlice {
                offset: 0,
                want: size,
                got: body.len() as u64,
            }));
        }
        let content_type =
            HeaderValue::from_str(self.payload.content_type()).map_err(Error::ser)?;
        Ok(HttpRequest::new(http::Method::POST, url)
            .with_header(http::header::CONTENT_TYPE, content_type)
            .with_body(body))
    }
}

/// Formats the metadata as query parameters, including the leading `?`.
fn query_string(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    let params = metadata
        .iter()
        .map(|(k, v)| format!("{}={}", enc(k), enc(v)))
        .collect::<Vec<_>>();
    format!("?{}", params.join("&"))
}
