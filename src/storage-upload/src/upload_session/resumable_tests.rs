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

//! Unit tests for resumable uploads.
//!
//! A resumable upload starts a session with a `POST` request, the response
//! contains the session URL and (optionally) the chunk granularity. The
//! payload is then sent in chunks, in order, each one a `PUT` to the session
//! URL. The last chunk finalizes the upload, and its response contains the
//! object. Any failure is terminal: there are no retries.
//!
//! The tests use an `httptest` server when the wire format matters, and a
//! [RecordingIssuer] when it is easier to inspect the requests directly.

use super::{Progress, Strategy, UploadSession};
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::model::{Metadata, ObjectTarget};
use crate::transport::testing::{RecordingIssuer, SESSION_URL, fake_service};
use crate::transport::{HttpRequest, HttpResponse};
use crate::upload_source::{BytesPayload, Payload};
use crate::{Error, client::Storage};
use httptest::{Expectation, Server, matchers::*, responders::*};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use test_case::test_case;

type Result = anyhow::Result<()>;

const G: u64 = 262144;

fn response_body() -> Value {
    json!({
        "name": "test-object",
        "bucket": "test-bucket",
        "generation": "123456",
        "metadata": {
            "is-test-object": "true",
        }
    })
}

fn test_client(server: &Server) -> anyhow::Result<Storage> {
    let client = Storage::builder()
        .with_endpoint(format!("http://{}/upload/storage/v1", server.addr()))
        .build()?;
    Ok(client)
}

fn payload(size: usize) -> BytesPayload {
    BytesPayload::from((0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>())
}

fn start<P: Payload>(
    issuer: &Arc<RecordingIssuer>,
    config: UploadConfig,
    payload: P,
) -> UploadSession {
    UploadSession::start(
        issuer.clone(),
        config,
        ObjectTarget::new("test-bucket", "test-object"),
        payload,
        Metadata::new(),
        Strategy::Resumable,
    )
}

fn config(granularity: u64) -> UploadConfig {
    UploadConfig {
        chunk_granularity: granularity,
        ..UploadConfig::new()
    }
}

fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn command(request: &HttpRequest) -> Option<&str> {
    header(request, "x-goog-upload-command")
}

#[tokio::test]
async fn resumable_empty_success() -> Result {
    let server = Server::run();
    let session = server.url("/upload/session/test-only-001");
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/upload/storage/v1/b/test-bucket/o"),
            request::query(url_decoded(contains(("name", "test-object")))),
            request::query(url_decoded(contains(("uploadType", "resumable")))),
            request::headers(contains(("x-goog-upload-protocol", "resumable"))),
            request::headers(contains(("x-goog-upload-command", "start"))),
            request::headers(contains(("x-goog-upload-header-content-length", "0"))),
            request::headers(contains((
                "x-goog-upload-header-content-type",
                "application/octet-stream"
            ))),
            request::body(json_decoded(eq(json!({
                "name": "test-object",
                "contentType": "application/octet-stream",
            })))),
        ])
        .times(1)
        .respond_with(status_code(200).append_header("x-goog-upload-url", session.to_string())),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/upload/session/test-only-001"),
            request::headers(contains(("x-goog-upload-offset", "0"))),
            request::headers(contains(("x-goog-upload-command", "upload, finalize"))),
            request::body(""),
        ])
        .times(1)
        .respond_with(
            status_code(200)
                .append_header("content-type", "application/json")
                .body(response_body().to_string()),
        ),
    );

    let client = test_client(&server)?;
    let session = client
        .upload_object("projects/_/buckets/test-bucket", "test-object", BytesPayload::from(""))
        .with_strategy(Strategy::Resumable)
        .start();
    let object = session.completion().await?;
    assert_eq!(object.name, "test-object");
    assert_eq!(object.generation, 123456);
    assert_eq!(
        object.metadata.get("is-test-object").map(String::as_str),
        Some("true")
    );
    assert_eq!(session.last_progress(), Some(Progress::new(0, 0, true)));
    Ok(())
}

#[tokio::test]
async fn resumable_multiple_chunks() -> Result {
    let server = Server::run();
    let session = server.url("/upload/session/test-only-001");
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/upload/storage/v1/b/test-bucket/o"),
            request::headers(contains(("x-goog-upload-header-content-length", "500000"))),
            request::headers(contains(("x-goog-upload-header-content-type", "text/plain"))),
        ])
        .times(1)
        .respond_with(
            status_code(200)
                .append_header("x-goog-upload-url", session.to_string())
                .append_header("x-goog-upload-chunk-granularity", G.to_string()),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/upload/session/test-only-001"),
            request::headers(contains(("x-goog-upload-offset", "0"))),
            request::headers(contains(("x-goog-upload-command", "upload"))),
        ])
        .times(1)
        .respond_with(status_code(200)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/upload/session/test-only-001"),
            request::headers(contains(("x-goog-upload-offset", "262144"))),
            request::headers(contains(("x-goog-upload-command", "upload, finalize"))),
        ])
        .times(1)
        .respond_with(status_code(200).body(response_body().to_string())),
    );

    let client = test_client(&server)?;
    let object = client
        .upload_object(
            "test-bucket",
            "test-object",
            payload(500000).with_content_type("text/plain"),
        )
        .with_strategy(Strategy::Resumable)
        .send()
        .await?;
    assert_eq!(object.name, "test-object");
    Ok(())
}

#[tokio::test]
async fn resumable_chunk_contents() -> Result {
    let issuer = Arc::new(RecordingIssuer::new(fake_service(Some(G))));
    let data = payload(500000);
    let session = start(&issuer, UploadConfig::new(), data.clone());
    let object = session.completion().await?;
    assert_eq!(object.name, "test-object");
    assert_eq!(session.last_progress(), Some(Progress::new(500000, 500000, true)));

    let requests = issuer.requests();
    assert_eq!(requests.len(), 3, "{requests:?}");
    let (start, chunks) = (&requests[0], &requests[1..]);
    assert_eq!(start.method, http::Method::POST);
    assert_eq!(command(start), Some("start"));

    let got = chunks
        .iter()
        .map(|r| {
            (
                r.url.as_str(),
                header(r, "x-goog-upload-offset"),
                command(r),
                r.body.len(),
            )
        })
        .collect::<Vec<_>>();
    let want = vec![
        (SESSION_URL, Some("0"), Some("upload"), 262144),
        (SESSION_URL, Some("262144"), Some("upload, finalize"), 237856),
    ];
    assert_eq!(got, want);
    assert!(chunks.iter().all(|r| r.method == http::Method::PUT));
    assert_eq!(chunks[0].body, data.slice(0..262144).await?);
    assert_eq!(chunks[1].body, data.slice(262144..500000).await?);
    Ok(())
}

#[test_case(0, 1)]
#[test_case(1, 1)]
#[test_case(4, 1)]
#[test_case(5, 2)]
#[test_case(8, 2)]
#[test_case(10, 3)]
#[tokio::test]
async fn resumable_chunk_count(size: usize, want: usize) -> Result {
    let issuer = Arc::new(RecordingIssuer::new(fake_service(None)));
    let session = start(&issuer, config(4), payload(size));
    session.completion().await?;

    let chunks = issuer.requests().into_iter().skip(1).collect::<Vec<_>>();
    assert_eq!(chunks.len(), want, "{chunks:?}");
    let offsets = chunks
        .iter()
        .map(|r| header(r, "x-goog-upload-offset").map(str::to_string))
        .collect::<Vec<_>>();
    let want_offsets = (0..want)
        .map(|i| Some((4 * i).to_string()))
        .collect::<Vec<_>>();
    assert_eq!(offsets, want_offsets);
    let (last, rest) = chunks.split_last().expect("at least one chunk");
    assert_eq!(command(last), Some("upload, finalize"));
    assert!(rest.iter().all(|r| command(r) == Some("upload")), "{rest:?}");
    Ok(())
}

#[tokio::test]
async fn resumable_start_permanent_error() -> Result {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "POST",
            "/upload/storage/v1/b/test-bucket/o",
        ))
        .times(1)
        .respond_with(status_code(403).body("uh-oh")),
    );

    let client = test_client(&server)?;
    let session = client
        .upload_object("test-bucket", "test-object", payload(1000))
        .with_strategy(Strategy::Resumable)
        .start();
    let mut progress = session.progress();
    let err = session.await.unwrap_err();
    assert!(err.is_negotiation(), "{err:?}");
    assert_eq!(err.http_status_code(), Some(403));
    assert!(err.to_string().contains("unexpected status 403"), "{err}");

    let err = progress.next().await.transpose().unwrap_err();
    assert!(err.is_negotiation(), "{err:?}");
    assert!(progress.next().await.is_none());
    Ok(())
}

#[test_case(200)]
#[test_case(201)]
#[test_case(308)]
#[test_case(404)]
#[tokio::test]
async fn resumable_start_missing_url(status: u16) -> Result {
    let status = http::StatusCode::from_u16(status)?;
    let issuer = Arc::new(RecordingIssuer::new(move |_| Ok(HttpResponse::new(status))));
    let session = start(&issuer, UploadConfig::new(), payload(10));
    let err = session.completion().await.unwrap_err();
    assert!(err.is_negotiation(), "{err:?}");
    assert_eq!(issuer.requests().len(), 1);
    assert_eq!(session.last_progress(), None);
    Ok(())
}

#[tokio::test]
async fn resumable_start_missing_url_reason() -> Result {
    let issuer = Arc::new(RecordingIssuer::new(|_| Ok(HttpResponse::new(http::StatusCode::OK))));
    let err = start(&issuer, UploadConfig::new(), payload(10))
        .await
        .unwrap_err();
    assert_eq!(err.upload_error(), Some(&UploadError::MissingSessionUrl));
    assert!(err.to_string().contains("missing session URL"), "{err}");
    Ok(())
}

fn with_granularity_header(
    value: Option<&'static str>,
) -> impl Fn(&HttpRequest) -> crate::Result<HttpResponse> + Send + Sync + 'static {
    let inner = fake_service(None);
    move |request| {
        let mut response = inner(request)?;
        if let Some(v) = value.filter(|_| command(request) == Some("start")) {
            response.headers.insert(
                "x-goog-upload-chunk-granularity",
                http::HeaderValue::from_static(v),
            );
        }
        Ok(response)
    }
}

#[test_case(None, 3; "absent")]
#[test_case(Some("not-a-number"), 3; "not numeric")]
#[test_case(Some("2"), 5; "from service")]
#[test_case(Some("16"), 1; "larger than payload")]
#[tokio::test]
async fn resumable_granularity(value: Option<&'static str>, want: usize) -> Result {
    let issuer = Arc::new(RecordingIssuer::new(with_granularity_header(value)));
    start(&issuer, config(4), payload(10)).await?;
    assert_eq!(issuer.requests().len(), 1 + want);
    Ok(())
}

#[tokio::test]
async fn resumable_zero_granularity() -> Result {
    let issuer = Arc::new(RecordingIssuer::new(with_granularity_header(Some("0"))));
    let err = start(&issuer, config(4), payload(10)).await.unwrap_err();
    assert!(err.is_negotiation(), "{err:?}");
    assert_eq!(err.upload_error(), Some(&UploadError::InvalidGranularity(0)));
    assert_eq!(issuer.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn resumable_zero_default_granularity() -> Result {
    let issuer = Arc::new(RecordingIssuer::new(fake_service(None)));
    let session = start(&issuer, config(0), payload(10));
    let completion = session.completion().into_future();
    let err = tokio::time::timeout(std::time::Duration::from_secs(5), completion)
        .await?
        .unwrap_err();
    assert!(err.is_negotiation(), "{err:?}");
    assert_eq!(err.upload_error(), Some(&UploadError::InvalidGranularity(0)));
    // Only the session start, no chunks are sent.
    assert_eq!(issuer.requests().len(), 1);
    assert_eq!(session.last_progress(), None);
    Ok(())
}

#[tokio::test]
async fn resumable_chunk_permanent_error() -> Result {
    let inner = fake_service(None);
    let issuer = Arc::new(RecordingIssuer::new(move |request| {
        if header(request, "x-goog-upload-offset") == Some("4") {
            return Ok(HttpResponse::new(http::StatusCode::SERVICE_UNAVAILABLE));
        }
        inner(request)
    }));
    let session = start(&issuer, config(4), payload(10));
    let err = session.completion().await.unwrap_err();
    assert!(err.is_upload(), "{err:?}");
    assert_eq!(err.http_status_code(), Some(503));

    // No further chunks after the failure, and the offset did not advance.
    let requests = issuer.requests();
    assert_eq!(requests.len(), 3, "{requests:?}");
    assert_eq!(session.last_progress(), Some(Progress::new(4, 10, false)));
    Ok(())
}

#[tokio::test]
async fn resumable_chunk_transport_error() -> Result {
    let inner = fake_service(None);
    let issuer = Arc::new(RecordingIssuer::new(move |request| {
        if command(request) == Some("upload, finalize") {
            return Err(Error::transport("connection reset"));
        }
        inner(request)
    }));
    let err = start(&issuer, config(4), payload(10)).await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert!(err.to_string().contains("connection reset"), "{err}");
    Ok(())
}

#[tokio::test]
async fn resumable_bad_object() -> Result {
    let inner = fake_service(None);
    let issuer = Arc::new(RecordingIssuer::new(move |request| {
        let mut response = inner(request)?;
        if command(request) == Some("upload, finalize") {
            response.body = bytes::Bytes::from_static(b"not json");
        }
        Ok(response)
    }));
    let err = start(&issuer, config(4), payload(10)).await.unwrap_err();
    assert!(err.is_deserialization(), "{err:?}");
    Ok(())
}

/// A payload that returns fewer bytes than requested.
#[derive(Debug)]
pub(super) struct ShortPayload;

impl Payload for ShortPayload {
    type Error = std::convert::Infallible;

    fn size(&self) -> u64 {
        10
    }

    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    async fn slice(
        &self,
        _range: std::ops::Range<u64>,
    ) -> std::result::Result<bytes::Bytes, Self::Error> {
        Ok(bytes::Bytes::from_static(b"abc"))
    }
}

#[tokio::test]
async fn resumable_short_slice() -> Result {
    let issuer = Arc::new(RecordingIssuer::default());
    let err = start(&issuer, config(4), ShortPayload).await.unwrap_err();
    assert!(err.is_serialization(), "{err:?}");
    assert_eq!(
        err.upload_error(),
        Some(&UploadError::ShortSlice {
            offset: 0,
            want: 4,
            got: 3
        })
    );
    // Only the session start, the bad chunk is never sent.
    assert_eq!(issuer.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn resumable_invalid_target() -> Result {
    let issuer = Arc::new(RecordingIssuer::default());
    let session = UploadSession::start(
        issuer.clone(),
        UploadConfig::new(),
        ObjectTarget::new("", "test-object"),
        payload(10),
        Metadata::new(),
        Strategy::Resumable,
    );
    let err = session.await.unwrap_err();
    assert!(err.is_binding(), "{err:?}");
    assert!(issuer.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn resumable_metadata() -> Result {
    let issuer = Arc::new(RecordingIssuer::default());
    let metadata = Metadata::from([
        ("cacheControl".to_string(), "no-cache".to_string()),
        ("contentType".to_string(), "ignored".to_string()),
    ]);
    let session = UploadSession::start(
        issuer.clone(),
        UploadConfig::new(),
        ObjectTarget::new("test-bucket", "path/to/object"),
        payload(10).with_content_type("text/plain"),
        metadata,
        Strategy::Resumable,
    );
    session.await?;

    let requests = issuer.requests();
    let start = requests.first().expect("session start request");
    assert_eq!(
        start.url,
        format!(
            "{}/b/test-bucket/o?name=path%2Fto%2Fobject&uploadType=resumable",
            crate::config::DEFAULT_ENDPOINT
        )
    );
    assert_eq!(
        header(start, "content-type"),
        Some("application/json; charset=utf-8")
    );
    let body = serde_json::from_slice::<Value>(&start.body)?;
    assert_eq!(
        body,
        json!({
            "cacheControl": "no-cache",
            "contentType": "text/plain",
            "name": "path/to/object",
        })
    );
    Ok(())
}

#[tokio::test]
async fn resumable_progress() -> Result {
    let issuer = Arc::new(RecordingIssuer::default());
    let session = start(&issuer, config(4), payload(10));
    let mut progress = session.progress();
    let mut steps = Vec::new();
    while let Some(p) = progress.next().await.transpose()? {
        steps.push(p);
    }

    // A cursor may skip steps, but never goes backwards and always sees the
    // last step.
    let all = [
        Progress::new(0, 10, false),
        Progress::new(4, 10, false),
        Progress::new(8, 10, false),
        Progress::new(10, 10, true),
    ];
    assert!(steps.iter().all(|s| all.contains(s)), "{steps:?}");
    assert!(steps.windows(2).all(|w| w[0].offset <= w[1].offset), "{steps:?}");
    assert!(steps.iter().all(|s| s.offset <= s.total), "{steps:?}");
    assert_eq!(steps.last(), Some(&Progress::new(10, 10, true)));
    Ok(())
}

#[tokio::test]
async fn resumable_shared_outcome() -> Result {
    let issuer = Arc::new(RecordingIssuer::default());
    let session = start(&issuer, config(4), payload(10));
    let observers = (0..3)
        .map(|_| tokio::spawn(session.completion().into_future()))
        .collect::<Vec<_>>();
    let object = session.await?;
    for o in observers {
        assert_eq!(o.await??, object);
    }
    // Completing the upload is the only side effect, the observers do not
    // trigger any requests.
    assert_eq!(issuer.requests().len(), 4);
    Ok(())
}
