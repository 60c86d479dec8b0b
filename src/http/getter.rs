// Shared HTTP getter.
// Orchestrates cache lookup, the network call, decoding, caching, and typed errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, instrument, warn};

use crate::cache::{FileCache, ResponseCache};
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::events::{EventSink, HTTP_REQUEST_EVENT, RequestEvent, Timer, TracingSink};

use super::classify::{AuthFailure, DEFAULT_PARTNER_HOST, classify, extract_ray_id, is_partner_host};
use super::payload::Payload;
use super::request::{GetRequest, PostRequest, Representation};
use super::transport::{Method, ReqwestTransport, Transport, TransportRequest, TransportResponse};

/// Single entry point for outbound GET/POST requests.
///
/// Construct one at startup and share it; it owns the connection pool.
pub struct HttpGetter {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn ResponseCache>,
    events: Arc<dyn EventSink>,
    partner_host: String,
    in_flight: InFlight,
}

impl HttpGetter {
    /// Build the production getter: reqwest transport, on-disk cache, tracing events.
    pub async fn new(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout(), &config.user_agent)?;
        let cache = FileCache::new(config.cache_dir()?);

        if config.clear_transient_on_start {
            let removed = cache.clear_transient().await?;
            debug!(removed, "cleared transient cache on start");
        }

        Ok(Self::with_parts(Arc::new(transport), Arc::new(cache), Arc::new(TracingSink))
            .partner_host(&config.partner_host))
    }

    /// Assemble a getter from its collaborators.
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn ResponseCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            cache,
            events,
            partner_host: DEFAULT_PARTNER_HOST.to_string(),
            in_flight: InFlight::default(),
        }
    }

    /// Host whose 403s are escalated to the developer.
    pub fn partner_host(mut self, host: impl Into<String>) -> Self {
        self.partner_host = host.into();
        self
    }

    /// GET `request.url`, serving from cache when asked to.
    #[instrument(skip(self, request), fields(url = %request.url, representation = %request.representation))]
    pub async fn get(&self, request: &GetRequest) -> Result<Payload> {
        let cache = request.uses_cache();
        if request.representation == Representation::Filename && !cache {
            return Err(FetchError::FilenameWithoutCache(request.url.clone()));
        }

        if !cache {
            return self.fetch(request, false).await;
        }

        if let Some(payload) = self.load_cached(request).await {
            return Ok(payload);
        }

        // Hold the per-URL lock across fetch and store so a concurrent
        // caller for the same URL is served from the cache afterwards.
        let _guard = self.in_flight.acquire(&request.url).await;
        if let Some(payload) = self.load_cached(request).await {
            return Ok(payload);
        }

        self.fetch(request, true).await
    }

    /// POST a JSON body to `request.url`. Never cached.
    #[instrument(skip(self, request), fields(url = %request.url, representation = %request.representation))]
    pub async fn post(&self, request: &PostRequest) -> Result<Payload> {
        if request.representation == Representation::Filename {
            return Err(FetchError::FilenameWithoutCache(request.url.clone()));
        }

        let response = self
            .send(TransportRequest {
                method: Method::Post,
                url: request.url.clone(),
                headers: request.headers.clone(),
                body: Some(request.body.clone()),
            })
            .await?;

        if response.is_ok() {
            return Payload::decode(&response.bytes().await?, request.representation);
        }

        Err(classify(&request.url, response.status, &request.errors))
    }

    async fn load_cached(&self, request: &GetRequest) -> Option<Payload> {
        if !self.cache.exists(&request.url).await {
            return None;
        }

        match self.cache.load(&request.url, request.representation).await {
            Ok(payload) => {
                debug!("served from cache");
                Some(payload)
            }
            Err(e) => {
                warn!(error = %e, "cached entry unreadable, refetching");
                None
            }
        }
    }

    async fn fetch(&self, request: &GetRequest, cache: bool) -> Result<Payload> {
        let response = self
            .send(TransportRequest {
                method: Method::Get,
                url: request.url.clone(),
                headers: request.headers.clone().unwrap_or_default(),
                body: None,
            })
            .await?;

        if !response.is_ok() {
            let status = response.status;
            let body = response.error_body(&request.url).await;
            return Err(self.get_failure(request, status, &body));
        }

        let body = response.bytes().await?;

        if cache {
            let stored = self
                .cache
                .store(
                    &request.url,
                    request.representation,
                    &body,
                    request.cache_permanent,
                )
                .await;

            match stored {
                Ok(()) if request.representation == Representation::Filename => {
                    return self.cache.load(&request.url, Representation::Filename).await;
                }
                Ok(()) => {}
                Err(e) if request.representation == Representation::Filename => return Err(e),
                Err(e) => warn!(error = %e, "failed to cache response"),
            }
        }

        Payload::decode(&body, request.representation)
    }

    fn get_failure(&self, request: &GetRequest, status: u16, body: &[u8]) -> FetchError {
        if status == 403 {
            let ray_id = extract_ray_id(body);
            if let Some(id) = &ray_id {
                error!(url = %request.url, ray_id = %id, "http 403 cloudflare error");
            }

            if is_partner_host(&request.url, &self.partner_host) {
                return AuthFailure::new(&request.url, ray_id, body).into_error();
            }
        }

        classify(&request.url, status, &request.errors)
    }

    /// Send through the transport, recording one event per network call.
    ///
    /// The event is recorded once the status line arrives, or once the call
    /// fails; requests rejected before reaching the network record nothing.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        request.header_map()?;

        let url = request.url.clone();
        let method = request.method;
        let timer = Timer::start();

        let result = self.transport.send(request).await;

        self.events.record(
            HTTP_REQUEST_EVENT,
            &RequestEvent {
                url,
                status: result.as_ref().ok().map(|r| r.status),
                time: timer.millis(),
                method: method.as_str(),
            },
        );

        result
    }
}

/// Per-URL locks for cached GETs currently being fetched.
#[derive(Default)]
struct InFlight {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    async fn acquire(&self, url: &str) -> InFlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(url.to_string()).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;

        InFlightGuard {
            owner: self,
            url: url.to_string(),
            lock,
            guard: Some(guard),
        }
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlight,
    url: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Map plus this guard: nobody else is waiting on the URL.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::http::ErrorOverrides;
    use crate::http::transport::ResponseBody;

    const PLAYER_URL: &str = "https://api.example.com/players/123";
    const PLAYER_BODY: &str = r#"{"rank_tier": 55, "leaderboard_rank": null}"#;

    /// Canned responses by URL, counting every call.
    #[derive(Default)]
    struct MockTransport {
        responses: HashMap<String, (u16, Vec<u8>)>,
        calls: AtomicUsize,
        last: Mutex<Option<TransportRequest>>,
        delay: Option<Duration>,
        /// Fail every call as if the connection dropped.
        unreachable: bool,
        /// Status line arrives but the body cannot be read.
        broken_body: bool,
    }

    /// A body whose connection resets mid-read.
    struct BrokenBody;

    #[async_trait]
    impl ResponseBody for BrokenBody {
        async fn read(self: Box<Self>) -> Result<Vec<u8>> {
            Err(FetchError::Other("connection reset".to_string()))
        }
    }

    impl MockTransport {
        fn respond(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), (status, body.as_bytes().to_vec()));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.unreachable {
                return Err(FetchError::Other("connection refused".to_string()));
            }
            let (status, body) = self
                .responses
                .get(&request.url)
                .cloned()
                .unwrap_or((404, Vec::new()));
            *self.last.lock().unwrap() = Some(request);
            if self.broken_body {
                return Ok(TransportResponse::new(status, BrokenBody));
            }
            Ok(TransportResponse::new(status, body))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<RequestEvent>>,
    }

    impl EventSink for RecordingSink {
        fn record(&self, _event: &str, fields: &RequestEvent) {
            self.events.lock().unwrap().push(fields.clone());
        }
    }

    fn getter(
        transport: &Arc<MockTransport>,
        dir: &TempDir,
    ) -> (HttpGetter, Arc<FileCache>, Arc<RecordingSink>) {
        let cache = Arc::new(FileCache::new(dir.path()));
        let sink = Arc::new(RecordingSink::default());
        let getter = HttpGetter::with_parts(transport.clone(), cache.clone(), sink.clone());
        (getter, cache, sink)
    }

    #[tokio::test]
    async fn test_cached_get_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY));
        let (getter, cache, sink) = getter(&transport, &temp_dir);
        let request = GetRequest::new(PLAYER_URL).cache(true);

        let first = getter.get(&request).await.unwrap().into_json().unwrap();
        assert_eq!(transport.calls(), 1);
        assert!(cache.exists(PLAYER_URL).await);
        assert_eq!(first, json!({"rank_tier": 55, "leaderboard_rank": null}));

        let second = getter.get(&request).await.unwrap().into_json().unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(second, first);

        // One event per network call, none for the cache hit.
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, Some(200));
        assert_eq!(events[0].method, "GET");
    }

    #[tokio::test]
    async fn test_uncached_get_always_fetches() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY));
        let (getter, cache, _) = getter(&transport, &temp_dir);
        let request = GetRequest::new(PLAYER_URL).representation(Representation::Text);

        let text = getter.get(&request).await.unwrap().into_text().unwrap();
        assert_eq!(text, PLAYER_BODY);
        getter.get(&request).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert!(!cache.exists(PLAYER_URL).await);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 404, ""));
        let (getter, cache, sink) = getter(&transport, &temp_dir);

        let err = getter
            .get(&GetRequest::new(PLAYER_URL).cache(true))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NotFound { ref url, .. } if url == PLAYER_URL));
        assert!(!cache.exists(PLAYER_URL).await);
        assert_eq!(sink.events.lock().unwrap()[0].status, Some(404));
    }

    #[tokio::test]
    async fn test_override_message() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 500, "oops"));
        let (getter, _, _) = getter(&transport, &temp_dir);

        let request = GetRequest::new(PLAYER_URL)
            .errors(ErrorOverrides::new().status(500, "OpenDota is having a bad day"));
        let err = getter.get(&request).await.unwrap_err();

        match err {
            FetchError::Http {
                message, status, ..
            } => {
                assert_eq!(message, "OpenDota is having a bad day");
                assert_eq!(status, 500);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partner_403_notifies_developer() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://api.stratz.com/graphql";
        let body = r#"<html>Cloudflare Ray ID: <strong class="font-semibold">7f00ba11</strong></html>"#;
        let transport = Arc::new(MockTransport::default().respond(url, 403, body));
        let (getter, _, _) = getter(&transport, &temp_dir);

        let err = getter.get(&GetRequest::new(url)).await.unwrap_err();
        match err {
            FetchError::DeveloperNotif {
                user_message,
                developer_message,
            } => {
                assert!(!user_message.is_empty());
                assert_ne!(user_message, developer_message);
                assert!(developer_message.contains("7f00ba11"));
                assert!(developer_message.contains(url));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_host_403_is_generic() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 403, "Forbidden"));
        let (getter, _, _) = getter(&transport, &temp_dir);

        let err = getter.get(&GetRequest::new(PLAYER_URL)).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 403, .. }));
        assert_eq!(err.to_string(), "Http request failed with a 403 error");
    }

    #[tokio::test]
    async fn test_filename_requires_cache() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY));
        let (getter, _, _) = getter(&transport, &temp_dir);

        let request = GetRequest::new(PLAYER_URL).representation(Representation::Filename);
        let err = getter.get(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::FilenameWithoutCache(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_filename_returns_cached_path() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://cdn.example.com/heroes/axe.png";
        let transport = Arc::new(MockTransport::default().respond(url, 200, "png-bytes"));
        let (getter, _, _) = getter(&transport, &temp_dir);

        let request = GetRequest::new(url)
            .representation(Representation::Filename)
            .cache_permanent(true);
        let path = getter.get(&request).await.unwrap().into_path().unwrap();

        assert!(path.starts_with(temp_dir.path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "png-bytes");
    }

    #[tokio::test]
    async fn test_permanent_entry_survives_new_getter() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY));
        {
            let (getter, _, _) = getter(&transport, &temp_dir);
            getter
                .get(&GetRequest::new(PLAYER_URL).cache_permanent(true))
                .await
                .unwrap();
        }

        let fresh = Arc::new(MockTransport::default().respond(PLAYER_URL, 500, ""));
        let (getter, _, _) = getter(&fresh, &temp_dir);
        let value = getter
            .get(&GetRequest::new(PLAYER_URL).cache(true))
            .await
            .unwrap()
            .into_json()
            .unwrap();

        assert_eq!(value["rank_tier"], 55);
        assert_eq!(fresh.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_cached_gets_fetch_once() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport {
            delay: Some(Duration::from_millis(50)),
            ..MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY)
        });
        let (getter, _, _) = getter(&transport, &temp_dir);
        let request = GetRequest::new(PLAYER_URL).cache(true);

        let (a, b) = tokio::join!(getter.get(&request), getter.get(&request));
        assert_eq!(a.unwrap().into_json().unwrap(), b.unwrap().into_json().unwrap());
        assert_eq!(transport.calls(), 1);
        assert!(getter.in_flight.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://api.example.com/graphql";
        let transport = Arc::new(MockTransport::default().respond(url, 200, r#"{"data": {}}"#));
        let (getter, cache, sink) = getter(&transport, &temp_dir);

        let request = PostRequest::new(url)
            .header("Authorization", "Bearer token")
            .body(json!({"query": "{ player { id } }"}));
        let value = getter.post(&request).await.unwrap().into_json().unwrap();
        assert_eq!(value, json!({"data": {}}));

        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.body, Some(json!({"query": "{ player { id } }"})));
        assert_eq!(sent.headers["Authorization"], "Bearer token");

        assert!(!cache.exists(url).await);
        assert_eq!(sink.events.lock().unwrap()[0].method, "POST");
    }

    #[tokio::test]
    async fn test_post_failure_is_classified() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://api.stratz.com/graphql";
        let transport = Arc::new(MockTransport::default().respond(url, 403, ""));
        let (getter, _, _) = getter(&transport, &temp_dir);

        // No partner escalation on POST.
        let err = getter.post(&PostRequest::new(url)).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_filename_hit_with_missing_body_refetches() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://cdn.example.com/a.png";
        let transport = Arc::new(MockTransport::default().respond(url, 200, "png-bytes"));
        let (getter, _, _) = getter(&transport, &temp_dir);
        let request = GetRequest::new(url)
            .representation(Representation::Filename)
            .cache(true);

        let path = getter.get(&request).await.unwrap().into_path().unwrap();
        std::fs::remove_file(&path).unwrap();

        let path = getter.get(&request).await.unwrap().into_path().unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "png-bytes");
    }

    #[tokio::test]
    async fn test_transport_failure_records_event() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport {
            unreachable: true,
            ..MockTransport::default()
        });
        let (getter, _, sink) = getter(&transport, &temp_dir);

        let err = getter.get(&GetRequest::new(PLAYER_URL)).await.unwrap_err();
        assert!(matches!(err, FetchError::Other(_)));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, None);
        assert_eq!(events[0].method, "GET");
        assert_eq!(events[0].url, PLAYER_URL);
    }

    #[tokio::test]
    async fn test_invalid_header_never_reaches_network() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY));
        let (getter, _, sink) = getter(&transport, &temp_dir);

        let request = GetRequest::new(PLAYER_URL).header("bad header", "x");
        assert!(getter.get(&request).await.is_err());

        let request = PostRequest::new(PLAYER_URL).header("X-Token", "line\nbreak");
        assert!(getter.post(&request).await.is_err());

        assert_eq!(transport.calls(), 0);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_body_keeps_status_in_event() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport {
            broken_body: true,
            ..MockTransport::default().respond(PLAYER_URL, 200, PLAYER_BODY)
        });
        let (getter, cache, sink) = getter(&transport, &temp_dir);

        let err = getter
            .get(&GetRequest::new(PLAYER_URL).cache(true))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Other(_)));
        assert!(!cache.exists(PLAYER_URL).await);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, Some(200));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_still_classified() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://api.stratz.com/graphql";
        let transport = Arc::new(MockTransport {
            broken_body: true,
            ..MockTransport::default().respond(url, 403, "")
        });
        let (getter, _, _) = getter(&transport, &temp_dir);

        let err = getter.get(&GetRequest::new(url)).await.unwrap_err();
        match err {
            FetchError::DeveloperNotif {
                developer_message, ..
            } => assert!(developer_message.contains("token probably expired")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
