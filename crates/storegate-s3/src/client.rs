//! S3 client for one storage backend
//!
//! Requests are presigned with `rusty-s3` (path style, SigV4) and sent over
//! the shared `reqwest` pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use rusty_s3::actions::ListObjectsV2;
use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use serde::Deserialize;
use storegate_core::{
    BackendNode, GatewayError, GatewayResult, ObjectStore, ObjectStream, PartialListing,
    RequestContext,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, S3Error};

/// Region that needs no `LocationConstraint` on bucket creation
const DEFAULT_REGION: &str = "us-east-1";

/// Validity of presigned request URLs
const SIGNATURE_TTL: Duration = Duration::from_secs(300);

/// S3 `<Error>` document
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Path-style S3 client bound to one [`BackendNode`]
///
/// The bucket is checked before the first write of each client. A write
/// answered with `NoSuchBucket` recreates the bucket and is retried once.
pub struct S3Client {
    http: Client,
    node: BackendNode,
    bucket: Bucket,
    credentials: Credentials,
    bucket_ready: AtomicBool,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("node_index", &self.node.node_index)
            .field("endpoint", &self.bucket.base_url().as_str())
            .field("bucket", &self.bucket.name())
            .finish()
    }
}

impl S3Client {
    /// Create a client for `node`, reusing `http`'s connection pool
    pub fn new(
        http: Client,
        node: BackendNode,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(&node.endpoint())?;
        let bucket = Bucket::new(endpoint, UrlStyle::Path, bucket.into(), region.into())
            .map_err(|e| S3Error::InvalidBucket(e.to_string()))?;
        let credentials = Credentials::new(node.access_key.clone(), node.secret_key.clone());

        Ok(Self {
            http,
            node,
            bucket,
            credentials,
            bucket_ready: AtomicBool::new(false),
        })
    }

    pub fn bucket(&self) -> &str {
        self.bucket.name()
    }

    /// Base URL of the bucket, `http://{address}:{port}/{bucket}/`
    pub fn bucket_url(&self) -> &Url {
        self.bucket.base_url()
    }

    async fn service_error(response: Response) -> S3Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let error: ErrorBody = quick_xml::de::from_str(&body).unwrap_or_default();
        S3Error::service(status, error.code, error.message)
    }

    fn backend_error(&self, operation: &str, cause: S3Error) -> GatewayError {
        GatewayError::backend(self.node.node_index, operation, cause)
    }

    /// Make sure the bucket exists before this client's first write
    async fn ensure_bucket(&self, ctx: &RequestContext) -> GatewayResult<()> {
        if self.bucket_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        ctx.run(async {
            self.create_bucket_if_missing()
                .await
                .map_err(|e| self.backend_error("ensure bucket", e))
        })
        .await?;

        self.bucket_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn create_bucket_if_missing(&self) -> Result<()> {
        let url = self.bucket.head_bucket(Some(&self.credentials)).sign(SIGNATURE_TTL);
        let head = self.http.head(url).send().await?;
        if head.status().is_success() {
            return Ok(());
        }
        if head.status() != StatusCode::NOT_FOUND {
            return Err(Self::service_error(head).await);
        }

        info!(
            node_index = self.node.node_index,
            bucket = %self.bucket.name(),
            "Creating bucket"
        );

        let url = self.bucket.create_bucket(&self.credentials).sign(SIGNATURE_TTL);
        let mut request = self.http.put(url);
        if self.bucket.region() != DEFAULT_REGION {
            request = request.body(format!(
                "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                self.bucket.region()
            ));
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        // Lost a creation race with another writer
        let err = Self::service_error(response).await;
        match err.code() {
            Some("BucketAlreadyOwnedByYou") | Some("BucketAlreadyExists") => Ok(()),
            _ => Err(err),
        }
    }

    /// One PUT of the object body
    async fn put_once(&self, object_id: &str, body: Bytes) -> Result<()> {
        let url = self
            .bucket
            .put_object(Some(&self.credentials), object_id)
            .sign(SIGNATURE_TTL);
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::service_error(response).await)
        }
    }

    /// One ListObjectsV2 page, `None` if the bucket does not exist
    async fn list_page(&self, token: Option<&str>) -> Result<Option<(Vec<String>, Option<String>)>> {
        let mut action = self.bucket.list_objects_v2(Some(&self.credentials));
        if let Some(token) = token {
            action.with_continuation_token(token);
        }
        let response = self.http.get(action.sign(SIGNATURE_TTL)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }

        let body = response.text().await?;
        let page = ListObjectsV2::parse_response(body.as_str())
            .map_err(|e| S3Error::ParseError(e.to_string()))?;
        let keys = page.contents.into_iter().map(|object| object.key).collect();
        Ok(Some((keys, page.next_continuation_token)))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn node(&self) -> &BackendNode {
        &self.node
    }

    #[instrument(skip(self, ctx, body), fields(node_index = self.node.node_index, size = body.len()))]
    async fn put(&self, ctx: &RequestContext, object_id: &str, body: Bytes) -> GatewayResult<()> {
        self.ensure_bucket(ctx).await?;

        let first = ctx
            .run(async { Ok(self.put_once(object_id, body.clone()).await) })
            .await?;
        let result = match first {
            Err(err) if err.code() == Some("NoSuchBucket") => {
                warn!(bucket = %self.bucket.name(), "Bucket disappeared, recreating");
                self.bucket_ready.store(false, Ordering::Release);
                self.ensure_bucket(ctx).await?;
                ctx.run(async { Ok(self.put_once(object_id, body).await) })
                    .await?
            }
            other => other,
        };

        result.map_err(|e| self.backend_error("put object", e))?;
        debug!("Stored object");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(node_index = self.node.node_index))]
    async fn get(&self, ctx: &RequestContext, object_id: &str) -> GatewayResult<ObjectStream> {
        let response = ctx
            .run(async {
                let url = self
                    .bucket
                    .get_object(Some(&self.credentials), object_id)
                    .sign(SIGNATURE_TTL);
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| self.backend_error("get object", e.into()))?;

                if response.status().is_success() {
                    return Ok(response);
                }
                let err = Self::service_error(response).await;
                if err.is_not_found() {
                    Err(GatewayError::not_found(object_id, self.node.node_index))
                } else {
                    Err(self.backend_error("get object", err))
                }
            })
            .await?;

        if let Some(len) = response.content_length() {
            debug!(size = len, "Streaming object");
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed())
    }

    #[instrument(skip(self, ctx), fields(node_index = self.node.node_index))]
    async fn list_all(&self, ctx: &RequestContext) -> std::result::Result<Vec<String>, PartialListing> {
        let mut collected = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = ctx
                .run(async {
                    self.list_page(token.as_deref())
                        .await
                        .map_err(|e| self.backend_error("list objects", e))
                })
                .await;

            let (keys, next) = match page {
                Ok(Some(page)) => page,
                Ok(None) => {
                    debug!(bucket = %self.bucket.name(), "Bucket does not exist, nothing to list");
                    break;
                }
                Err(e) => return Err(PartialListing::new(collected, e)),
            };

            collected.extend(keys);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(objects = collected.len(), "Listed objects");
        Ok(collected)
    }
}
