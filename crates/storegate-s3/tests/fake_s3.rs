//! S3 client against an in-process fake S3 server
//!
//! The fake checks that every request is presigned for the backend's access
//! key and records the method and path it was sent to.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use futures::StreamExt;
use parking_lot::Mutex;
use storegate_core::{BackendNode, GatewayError, ObjectStore, RequestContext, StoreConnector};
use storegate_s3::{S3Connector, S3Options};
use tokio::net::TcpListener;

const ACCESS_KEY: &str = "ring";
const SECRET_KEY: &str = "treepotato";
const BUCKET: &str = "spacelift-storage";

struct FakeS3 {
    buckets: Mutex<HashMap<String, BTreeMap<String, Bytes>>>,
    requests: Mutex<Vec<String>>,
    page_size: usize,
    /// HEAD reports the bucket missing but PUT finds it already created
    race_on_create: AtomicBool,
    fail_puts: AtomicBool,
    /// Delay for every listing page after the first
    slow_pages: Option<Duration>,
}

impl FakeS3 {
    fn new(page_size: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            page_size,
            race_on_create: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            slow_pages: None,
        }
    }

    fn with_objects(self, bucket: &str, keys: &[&str]) -> Self {
        let objects = keys
            .iter()
            .map(|k| (k.to_string(), Bytes::from(format!("body of {}", k))))
            .collect();
        self.buckets.lock().insert(bucket.to_string(), objects);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }

    fn count_exact(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| *r == request).count()
    }
}

fn s3_error(status: StatusCode, code: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><Message>{}</Message></Error>",
        code, code
    );
    (status, body).into_response()
}

/// Record the request and check its presigned credential scope
fn verify(state: &FakeS3, method: &Method, uri: &OriginalUri) -> Result<(), Response> {
    let path = uri.0.path();
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    state.requests.lock().push(format!("{} {}", method, path));

    let query: HashMap<String, String> = uri
        .0
        .query()
        .map(query_pairs)
        .unwrap_or_default();

    if !query.contains_key("X-Amz-Signature") {
        return Err(s3_error(StatusCode::FORBIDDEN, "AccessDenied"));
    }
    let credential = query.get("X-Amz-Credential").cloned().unwrap_or_default();
    if !credential.starts_with(&format!("{}/", ACCESS_KEY))
        || !credential.ends_with("/us-east-1/s3/aws4_request")
    {
        return Err(s3_error(StatusCode::FORBIDDEN, "InvalidAccessKeyId"));
    }
    Ok(())
}

fn query_pairs(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

async fn head_bucket(
    State(state): State<Arc<FakeS3>>,
    Path(bucket): Path<String>,
    method: Method,
    uri: OriginalUri,
) -> Response {
    if let Err(resp) = verify(&state, &method, &uri) {
        return resp;
    }
    let exists = state.buckets.lock().contains_key(&bucket);
    if exists && !state.race_on_create.load(Ordering::SeqCst) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn create_bucket(
    State(state): State<Arc<FakeS3>>,
    Path(bucket): Path<String>,
    method: Method,
    uri: OriginalUri,
    body: Bytes,
) -> Response {
    if let Err(resp) = verify(&state, &method, &uri) {
        return resp;
    }
    let mut buckets = state.buckets.lock();
    if buckets.contains_key(&bucket) {
        return s3_error(StatusCode::CONFLICT, "BucketAlreadyOwnedByYou");
    }
    buckets.insert(bucket, BTreeMap::new());
    StatusCode::OK.into_response()
}

async fn list_objects(
    State(state): State<Arc<FakeS3>>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: OriginalUri,
) -> Response {
    if let Err(resp) = verify(&state, &method, &uri) {
        return resp;
    }
    assert_eq!(params.get("list-type").map(String::as_str), Some("2"));

    // Tokens deliberately need escaping: "page/+=N"
    let start: usize = match params.get("continuation-token") {
        Some(token) => {
            if let Some(delay) = state.slow_pages {
                tokio::time::sleep(delay).await;
            }
            token.trim_start_matches("page/+=").parse().unwrap()
        }
        None => 0,
    };

    let keys: Vec<String> = match state.buckets.lock().get(&bucket) {
        Some(objects) => objects.keys().cloned().collect(),
        None => return s3_error(StatusCode::NOT_FOUND, "NoSuchBucket"),
    };

    let end = (start + state.page_size).min(keys.len());
    let truncated = end < keys.len();
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
    );
    xml.push_str(&format!("<Name>{}</Name><KeyCount>{}</KeyCount>", bucket, end - start));
    xml.push_str(&format!("<IsTruncated>{}</IsTruncated>", truncated));
    for key in &keys[start..end] {
        xml.push_str(&format!("<Contents><Key>{}</Key></Contents>", key));
    }
    if truncated {
        xml.push_str(&format!(
            "<NextContinuationToken>page/+={}</NextContinuationToken>",
            end
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml.into_response()
}

async fn put_object(
    State(state): State<Arc<FakeS3>>,
    Path((bucket, key)): Path<(String, String)>,
    method: Method,
    uri: OriginalUri,
    body: Bytes,
) -> Response {
    if let Err(resp) = verify(&state, &method, &uri) {
        return resp;
    }
    if state.fail_puts.load(Ordering::SeqCst) {
        return s3_error(StatusCode::INTERNAL_SERVER_ERROR, "InternalError");
    }
    match state.buckets.lock().get_mut(&bucket) {
        Some(objects) => {
            objects.insert(key, body);
            StatusCode::OK.into_response()
        }
        None => s3_error(StatusCode::NOT_FOUND, "NoSuchBucket"),
    }
}

async fn get_object(
    State(state): State<Arc<FakeS3>>,
    Path((bucket, key)): Path<(String, String)>,
    method: Method,
    uri: OriginalUri,
) -> Response {
    if let Err(resp) = verify(&state, &method, &uri) {
        return resp;
    }
    let buckets = state.buckets.lock();
    match buckets.get(&bucket) {
        None => s3_error(StatusCode::NOT_FOUND, "NoSuchBucket"),
        Some(objects) => match objects.get(&key) {
            Some(body) => body.clone().into_response(),
            None => s3_error(StatusCode::NOT_FOUND, "NoSuchKey"),
        },
    }
}

async fn start(state: FakeS3) -> (Arc<FakeS3>, SocketAddr) {
    let state = Arc::new(state);
    let app = Router::new()
        .route(
            "/{bucket}",
            get(list_objects).put(create_bucket).head(head_bucket),
        )
        .route(
            "/{bucket}/",
            get(list_objects).put(create_bucket).head(head_bucket),
        )
        .route("/{bucket}/{key}", put(put_object).get(get_object))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (state, addr)
}

fn node_at(addr: SocketAddr, access_key: &str) -> BackendNode {
    BackendNode {
        node_index: 1,
        address: addr.ip().to_string(),
        port: addr.port(),
        access_key: access_key.to_string(),
        secret_key: SECRET_KEY.to_string(),
        container_id: "c1".to_string(),
        hostname: None,
    }
}

fn store(connector: &S3Connector, addr: SocketAddr) -> Arc<dyn ObjectStore> {
    connector.connect(&node_at(addr, ACCESS_KEY)).unwrap()
}

async fn read_all(store: &dyn ObjectStore, id: &str) -> Result<Vec<u8>, GatewayError> {
    let mut stream = store.get(&RequestContext::background(), id).await?;
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    Ok(out)
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let (fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = store(&connector, addr);
    let ctx = RequestContext::background();

    store
        .put(&ctx, "abc_123", Bytes::from_static(b"hello world"))
        .await
        .unwrap();
    assert_eq!(read_all(store.as_ref(), "abc_123").await.unwrap(), b"hello world");

    assert_eq!(
        fake.requests()[..3],
        [
            "HEAD /spacelift-storage".to_string(),
            "PUT /spacelift-storage".to_string(),
            "PUT /spacelift-storage/abc_123".to_string(),
        ]
    );
}

#[tokio::test]
async fn bucket_is_checked_once_per_client() {
    let (fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = store(&connector, addr);
    let ctx = RequestContext::background();

    for id in ["a", "b", "c"] {
        store.put(&ctx, id, Bytes::from_static(b"x")).await.unwrap();
    }
    assert_eq!(fake.count("HEAD "), 1);
    assert_eq!(fake.count("PUT /spacelift-storage/"), 3);
}

#[tokio::test]
async fn every_client_checks_the_bucket() {
    let (fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    for id in ["a", "b", "c"] {
        // Fresh client each time, as the orchestrator does per request
        store(&connector, addr)
            .put(&RequestContext::background(), id, Bytes::from_static(b"x"))
            .await
            .unwrap();
    }
    assert_eq!(fake.count("HEAD "), 3);
    assert_eq!(fake.count_exact("PUT /spacelift-storage"), 1);
    assert_eq!(fake.count("PUT /spacelift-storage/"), 3);
}

#[tokio::test]
async fn bucket_recreated_after_it_disappears() {
    let (fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let ctx = RequestContext::background();

    let first = store(&connector, addr);
    first.put(&ctx, "a", Bytes::from_static(b"1")).await.unwrap();

    // Backend wiped behind the client's back
    fake.buckets.lock().clear();
    first.put(&ctx, "b", Bytes::from_static(b"2")).await.unwrap();
    assert_eq!(read_all(first.as_ref(), "b").await.unwrap(), b"2");

    fake.buckets.lock().clear();
    for id in ["c", "d"] {
        store(&connector, addr)
            .put(&ctx, id, Bytes::from_static(b"3"))
            .await
            .unwrap();
    }

    let stored: Vec<String> = fake.buckets.lock()[BUCKET].keys().cloned().collect();
    assert_eq!(stored, vec!["c".to_string(), "d".to_string()]);
    assert_eq!(fake.count_exact("PUT /spacelift-storage"), 3);
}

#[tokio::test]
async fn overwrite_keeps_last_body() {
    let (_fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = store(&connector, addr);
    let ctx = RequestContext::background();

    store.put(&ctx, "k", Bytes::from_static(b"first")).await.unwrap();
    store.put(&ctx, "k", Bytes::from_static(b"second")).await.unwrap();
    assert_eq!(read_all(store.as_ref(), "k").await.unwrap(), b"second");
}

#[tokio::test]
async fn empty_body_is_stored() {
    let (_fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = store(&connector, addr);

    store
        .put(&RequestContext::background(), "empty", Bytes::new())
        .await
        .unwrap();
    assert!(read_all(store.as_ref(), "empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let (_fake, addr) = start(FakeS3::new(1000).with_objects(BUCKET, &["x"])).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    match read_all(store(&connector, addr).as_ref(), "nope").await {
        Err(GatewayError::ObjectNotFound { object_id, node_index }) => {
            assert_eq!(object_id, "nope");
            assert_eq!(node_index, 1);
        }
        other => panic!("expected not found, got {:?}", other.map(|b| b.len())),
    }
}

#[tokio::test]
async fn missing_bucket_reads_as_not_found_and_lists_empty() {
    let (_fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = store(&connector, addr);

    let err = read_all(store.as_ref(), "x").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(store
        .list_all(&RequestContext::background())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn lost_bucket_creation_race_is_success() {
    let fake = FakeS3::new(1000).with_objects(BUCKET, &[]);
    fake.race_on_create.store(true, Ordering::SeqCst);
    let (fake, addr) = start(fake).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    store(&connector, addr)
        .put(&RequestContext::background(), "id", Bytes::from_static(b"v"))
        .await
        .unwrap();
    assert_eq!(fake.count("PUT /spacelift-storage/id"), 1);
}

#[tokio::test]
async fn failed_put_is_reported() {
    let fake = FakeS3::new(1000).with_objects(BUCKET, &[]);
    fake.fail_puts.store(true, Ordering::SeqCst);
    let (_fake, addr) = start(fake).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    let err = store(&connector, addr)
        .put(&RequestContext::background(), "id", Bytes::from_static(b"v"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::BackendOperationFailed { node_index: 1, .. }
    ));
    assert!(err.to_string().contains("InternalError"));
}

#[tokio::test]
async fn wrong_credentials_fail_the_request() {
    let (_fake, addr) = start(FakeS3::new(1000)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();
    let store = connector.connect(&node_at(addr, "intruder")).unwrap();

    let err = store
        .put(&RequestContext::background(), "id", Bytes::from_static(b"v"))
        .await
        .unwrap_err();
    // HEAD answers carry no body, so only the status survives
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains("ensure bucket: S3 error 403"));
}

#[tokio::test]
async fn listing_follows_continuation_tokens() {
    let keys = ["a1", "a2", "b1", "b2", "c1"];
    let (fake, addr) = start(FakeS3::new(2).with_objects(BUCKET, &keys)).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    let listed = store(&connector, addr)
        .list_all(&RequestContext::background())
        .await
        .unwrap();
    assert_eq!(listed, keys.iter().map(|k| k.to_string()).collect::<Vec<_>>());
    assert_eq!(fake.count("GET /spacelift-storage"), 3);
}

#[tokio::test]
async fn cancelled_listing_returns_what_was_collected() {
    let mut fake = FakeS3::new(2).with_objects(BUCKET, &["a", "b", "c", "d"]);
    fake.slow_pages = Some(Duration::from_secs(5));
    let (_fake, addr) = start(fake).await;
    let connector = S3Connector::new(S3Options::default()).unwrap();

    let ctx = RequestContext::with_timeout(Duration::from_millis(300));
    let partial = store(&connector, addr).list_all(&ctx).await.unwrap_err();

    assert_eq!(partial.collected, vec!["a".to_string(), "b".to_string()]);
    assert!(matches!(partial.error, GatewayError::Cancelled(_)));
}
