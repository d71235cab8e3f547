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

//! Types describing the destination and the result of an upload.

use crate::Error;
use std::collections::{BTreeMap, HashMap};

/// Custom key/value pairs attached to the uploaded object.
///
/// The session takes a snapshot of this map when it starts. Keys are kept in
/// order so requests are deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Identifies the destination of an upload.
///
/// The bucket may be given as a bare bucket id (`my-bucket`) or as a full
/// resource name (`projects/_/buckets/my-bucket`).
///
/// # Example
/// ```
/// # use google_cloud_storage_upload::model::ObjectTarget;
/// let target = ObjectTarget::new("projects/_/buckets/my-bucket", "path/to/object");
/// assert_eq!(target.bucket_id().unwrap(), "my-bucket");
/// assert_eq!(target.name(), "path/to/object");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTarget {
    bucket: String,
    name: String,
}

const BUCKET_PREFIX: &str = "projects/_/buckets/";

impl ObjectTarget {
    pub fn new<B, O>(bucket: B, name: O) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// The bucket, as provided by the application.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bucket id used in request paths.
    ///
    /// Fails with a binding error if the bucket id is empty.
    pub fn bucket_id(&self) -> crate::Result<&str> {
        let id = self
            .bucket
            .strip_prefix(BUCKET_PREFIX)
            .unwrap_or(&self.bucket);
        if id.is_empty() || id.contains('/') {
            return Err(Error::binding(format!(
                "malformed bucket name, expected `{BUCKET_PREFIX}{{bucket_id}}` or a bucket id: {}",
                self.bucket
            )));
        }
        Ok(id)
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        self.bucket_id()?;
        if self.name.is_empty() {
            return Err(Error::binding("the object name must not be empty"));
        }
        Ok(())
    }
}

/// The object created by a successful upload.
///
/// Decoded from the JSON representation returned by the service. Fields not
/// present in the response keep their default values.
///
/// See <https://cloud.google.com/storage/docs/json_api/v1/objects#resource>.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Object {
    pub id: String,
    pub name: String,
    pub bucket: String,
    // The JSON API encodes 64-bit integers as strings. Accept both forms.
    #[serde_as(as = "serde_with::PickFirst<(_, serde_with::DisplayFromStr)>")]
    pub generation: i64,
    #[serde_as(as = "serde_with::PickFirst<(_, serde_with::DisplayFromStr)>")]
    pub metageneration: i64,
    pub content_type: String,
    pub storage_class: String,
    #[serde_as(as = "serde_with::PickFirst<(_, serde_with::DisplayFromStr)>")]
    pub size: u64,
    pub etag: String,
    pub md5_hash: String,
    pub crc32c: String,
    pub time_created: Option<chrono::DateTime<chrono::Utc>>,
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
    pub metadata: HashMap<String, String>,
    pub media_link: String,
    pub self_link: String,
}

/// The JSON body to start a resumable upload.
///
/// The metadata fields are merged with the object name and content type. The
/// latter take precedence.
pub(crate) fn insert_body(
    target: &ObjectTarget,
    content_type: &str,
    metadata: &Metadata,
) -> serde_json::Value {
    let mut body = metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(v.as_str())))
        .collect::<serde_json::Map<_, _>>();
    body.insert("name".to_string(), target.name().into());
    body.insert("contentType".to_string(), content_type.into());
    serde_json::Value::Object(body)
}
