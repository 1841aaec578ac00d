//! W3C trace-context propagation over HTTP headers
//!
//! The propagator is an explicit value handed to whoever needs it. Inbound
//! handlers call [`TracePropagation::set_parent_from_headers`]; outbound HTTP
//! clients carry [`TraceContextMiddleware`], which injects the current span.

use std::sync::Arc;

use http::{Extensions, HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use reqwest_middleware::{Middleware, Next};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// W3C Trace Context header name
pub const TRACEPARENT: &str = "traceparent";

struct HeadersExtractor<'a>(&'a HeaderMap);

impl Extractor for HeadersExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

struct HeadersInjector<'a>(&'a mut HeaderMap);

impl Injector for HeadersInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(val)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, val);
        }
    }
}

/// Extracts and injects trace context with one shared propagator
#[derive(Clone)]
pub struct TracePropagation {
    propagator: Arc<dyn TextMapPropagator + Send + Sync>,
}

impl Default for TracePropagation {
    fn default() -> Self {
        Self::w3c()
    }
}

impl std::fmt::Debug for TracePropagation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracePropagation").finish_non_exhaustive()
    }
}

impl TracePropagation {
    /// `traceparent`/`tracestate` propagation
    #[must_use]
    pub fn w3c() -> Self {
        Self {
            propagator: Arc::new(TraceContextPropagator::new()),
        }
    }

    /// Make the remote context found in `headers` the parent of `span`.
    ///
    /// Must be called before the span is first entered.
    pub fn set_parent_from_headers(&self, span: &Span, headers: &HeaderMap) {
        let parent = self.propagator.extract(&HeadersExtractor(headers));
        let _ = span.set_parent(parent);
    }

    /// Write the context of `span` into `headers`
    pub fn inject(&self, span: &Span, headers: &mut HeaderMap) {
        let cx = span.context();
        self.propagator
            .inject_context(&cx, &mut HeadersInjector(headers));
    }
}

/// Trace id carried by a `traceparent` header (`00-{trace_id}-{span_id}-{flags}`)
#[must_use]
pub fn trace_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let traceparent = headers.get(TRACEPARENT)?.to_str().ok()?;
    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() == 4 && parts[0] == "00" {
        Some(parts[1].to_string())
    } else {
        None
    }
}

/// Client middleware injecting the current span into every outbound request
#[derive(Debug, Clone)]
pub struct TraceContextMiddleware {
    propagation: TracePropagation,
}

impl TraceContextMiddleware {
    #[must_use]
    pub fn new(propagation: TracePropagation) -> Self {
        Self { propagation }
    }
}

#[async_trait::async_trait]
impl Middleware for TraceContextMiddleware {
    async fn handle(
        &self,
        mut req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.propagation
            .inject(&Span::current(), req.headers_mut());
        next.run(req, extensions).await
    }
}
