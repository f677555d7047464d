//! Attribute enrichment
//!
//! Appends the process identity dimensions to a caller's attribute list.
//! Caller-supplied values for a reserved key always win; the identity value
//! is only added when the key is absent. Appended keys follow a fixed order:
//! `env`, `version`, `host`, `service.name`.

use std::sync::Arc;

use meterline_domain::attributes::{ENV_KEY, HOST_KEY, SERVICE_NAME_KEY, VERSION_KEY};
use meterline_domain::{KeyValue, ProcessIdentity};

/// Enricher bound to the process identity
#[derive(Debug, Clone)]
pub struct AttributeEnricher {
    identity: Arc<ProcessIdentity>,
}

impl AttributeEnricher {
    /// Create an enricher for `identity`
    pub fn new(identity: Arc<ProcessIdentity>) -> Self {
        Self { identity }
    }

    /// Identity this enricher appends
    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// Return `attrs` followed by any missing identity dimensions
    pub fn enrich(&self, attrs: &[KeyValue]) -> Vec<KeyValue> {
        enrich(attrs, &self.identity)
    }
}

/// Return a new list: `attrs` plus each reserved key it does not already carry
///
/// The input is never modified. Applying the function twice yields the same
/// list as applying it once.
pub fn enrich(attrs: &[KeyValue], identity: &ProcessIdentity) -> Vec<KeyValue> {
    let reserved = [
        (ENV_KEY, identity.environment.as_str()),
        (VERSION_KEY, identity.version.as_str()),
        (HOST_KEY, identity.host_name.as_str()),
        (SERVICE_NAME_KEY, identity.service_name.as_str()),
    ];

    let mut enriched = Vec::with_capacity(attrs.len() + reserved.len());
    enriched.extend_from_slice(attrs);
    for (key, value) in reserved {
        if !attrs.iter().any(|kv| kv.key == key) {
            enriched.push(KeyValue::new(key, value));
        }
    }
    enriched
}
