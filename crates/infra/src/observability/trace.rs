//! Span helper
//!
//! [`Tracer`] opens `tracing` spans that carry the process identity, so an
//! OpenTelemetry-aware subscriber can export them with the right resource
//! attributes.

use std::sync::Arc;

use meterline_domain::ProcessIdentity;
use tracing::Span;

/// Opens identity-tagged spans
#[derive(Debug, Clone)]
pub struct Tracer {
    identity: Arc<ProcessIdentity>,
}

impl Tracer {
    /// Tracer for `identity`
    pub fn new(identity: Arc<ProcessIdentity>) -> Self {
        Self { identity }
    }

    /// Identity attached to every span
    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// Open a span named `name`
    ///
    /// The span is returned unentered; use `enter` or `Instrument` on it.
    pub fn start(&self, name: &str) -> Span {
        tracing::info_span!(
            "meterline.span",
            otel.name = %name,
            service.name = %self.identity.service_name,
            env = %self.identity.environment,
        )
    }
}
