//! HTTP server middleware
//!
//! A `tower` layer timing every request passing through an `axum` router or
//! any other `tower` HTTP service. Requests under the skipped path prefixes
//! (`/swagger` and `/metrics` by default) still run inside the
//! `http_request` span but emit no measurement.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use futures::future::BoxFuture;
use meterline_core::{EmitContext, Metrics, OperationRecorder, OperationStart};
use meterline_domain::KeyValue;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::observability::Tracer;

/// Metric basename for HTTP requests
pub const HTTP_METRIC: &str = "http";

/// Path prefixes excluded from measurement by default
pub const DEFAULT_SKIPPED_PREFIXES: [&str; 2] = ["/swagger", "/metrics"];

/// Span name every request runs under
pub const HTTP_SPAN: &str = "http_request";

/// Layer producing [`HttpMetrics`] services
#[derive(Debug, Clone)]
pub struct HttpMetricsLayer {
    recorder: OperationRecorder,
    tracer: Option<Tracer>,
    skipped_prefixes: Arc<[String]>,
}

impl HttpMetricsLayer {
    /// Layer emitting to `metrics`, skipping the default prefixes
    pub fn new(metrics: Metrics) -> Self {
        Self {
            recorder: OperationRecorder::new(metrics, HTTP_METRIC),
            tracer: None,
            skipped_prefixes: DEFAULT_SKIPPED_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    /// Open request spans through `tracer`
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Replace the skipped path prefixes
    #[must_use]
    pub fn skip_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.skipped_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether requests to `path` are measured
    pub fn is_measured(&self, path: &str) -> bool {
        !self.skipped_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn span(&self) -> tracing::Span {
        match &self.tracer {
            Some(tracer) => tracer.start(HTTP_SPAN),
            None => tracing::info_span!("http_request"),
        }
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetrics { inner, layer: self.clone() }
    }
}

/// Service timing requests to `S`
#[derive(Debug, Clone)]
pub struct HttpMetrics<S> {
    inner: S,
    layer: HttpMetricsLayer,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpMetrics<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let start = OperationStart::now();
        let path = request.uri().path().to_owned();
        let method = request.method().as_str().to_owned();
        let measured = self.layer.is_measured(&path);

        let span = self.layer.span();
        let future = {
            let _entered = span.enter();
            self.inner.call(request)
        };
        let recorder = self.layer.recorder.clone();

        Box::pin(
            async move {
                let result = future.await;
                if measured {
                    record_request(&recorder, start, path, method, &result);
                }
                result
            }
            .instrument(span),
        )
    }
}

fn record_request<B, E>(
    recorder: &OperationRecorder,
    start: OperationStart,
    path: String,
    method: String,
    result: &Result<Response<B>, E>,
) {
    let mut attrs = vec![KeyValue::new("path", path), KeyValue::new("method", method)];
    match result {
        Ok(response) => {
            let status = response.status();
            attrs.push(KeyValue::new("status_code", status.as_u16()));
            attrs.push(KeyValue::new("success", status.as_u16() < 400));
        }
        // No response was produced, so there is no status to report
        Err(_) => attrs.push(KeyValue::new("success", false)),
    }
    recorder.record(&EmitContext::background(), start, &attrs);
}
