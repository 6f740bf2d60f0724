use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;

use crate::error::{KbforgeError, Result};
use crate::filter::FileFilter;
use crate::source::{DocumentRef, FetchedBlob, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// Static access keys for one bucket. Held for the duration of one batch,
/// never persisted.
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Connector over an object-storage bucket.
///
/// Listing enumerates every object (following continuation tokens) and
/// keeps keys with a supported suffix. Fetch downloads one object into the
/// staging area under the key's base name.
#[derive(Debug)]
pub struct ObjectStorageBucket {
    client: Client,
    bucket: String,
}

impl ObjectStorageBucket {
    /// Build a client from explicit credentials.
    ///
    /// Missing or blank credential material is rejected up front as `Auth`;
    /// keys the remote service rejects surface as `Auth` from `list`.
    pub async fn connect(
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<S3Credentials>,
    ) -> Result<Self> {
        let credentials = credentials.ok_or_else(|| {
            KbforgeError::Auth("object storage credentials are missing".to_string())
        })?;

        if credentials.access_key_id.trim().is_empty()
            || credentials.secret_access_key.trim().is_empty()
        {
            return Err(KbforgeError::Auth(
                "object storage credentials are blank".to_string(),
            ));
        }

        let provider = aws_sdk_s3::config::Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            None,
            None,
            "kbforge",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .credentials_provider(provider)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&sdk_config),
            bucket: bucket.into(),
        })
    }

    /// Map a remote failure during listing into the error taxonomy:
    /// credential rejections are `Auth`, everything else is `Listing`.
    fn classify_listing_error(message: String) -> KbforgeError {
        if is_auth_rejection(&message) {
            KbforgeError::Auth(message)
        } else {
            KbforgeError::Listing(message)
        }
    }
}

fn is_auth_rejection(message: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "InvalidAccessKeyId",
        "SignatureDoesNotMatch",
        "AccessDenied",
        "ExpiredToken",
    ];
    MARKERS.iter().any(|m| message.contains(m))
}

#[async_trait]
impl SourceConnector for ObjectStorageBucket {
    fn kind(&self) -> SourceKind {
        SourceKind::ObjectStorage
    }

    async fn list(&self) -> Result<Vec<DocumentRef>> {
        let mut refs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                Self::classify_listing_error(format!(
                    "listing bucket {}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let Some(doc_type) = FileFilter::by_name(key) else {
                    continue;
                };

                refs.push(DocumentRef {
                    source_kind: SourceKind::ObjectStorage,
                    identifier: key.to_string(),
                    display_name: key.to_string(),
                    media_type: doc_type.media_type().to_string(),
                });
            }

            continuation = response.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }

        log::info!(
            "Listed {} supported object(s) in bucket {}",
            refs.len(),
            self.bucket
        );
        Ok(refs)
    }

    async fn fetch(&self, doc: &DocumentRef, staging: &StagingArea) -> Result<FetchedBlob> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&doc.identifier)
            .send()
            .await
            .map_err(|e| {
                KbforgeError::Fetch(format!(
                    "{}: {}",
                    doc.identifier,
                    DisplayErrorContext(&e)
                ))
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| KbforgeError::Fetch(format!("{}: {}", doc.identifier, e)))?
            .into_bytes();

        // Keys may carry prefixes; staging flattens to the base name,
        // mirroring how the keys were filtered (by suffix).
        let local_path = staging.write(SourceKind::ObjectStorage, &doc.identifier, &bytes)?;

        Ok(FetchedBlob {
            doc: doc.clone(),
            local_path,
            size: bytes.len() as u64,
        })
    }
}
