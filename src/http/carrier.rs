//! Header-map carrier for trace context propagation.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector};

/// Adapts a request's [`HeaderMap`] to OpenTelemetry's carrier traits.
///
/// `set` appends and never replaces, so a forwarded request may carry several
/// occurrences of the same header. `get` answers with the last occurrence,
/// which is the one this hop injected. Values that are not valid UTF-8 are
/// invisible to extraction.
#[derive(Debug)]
pub struct HeaderCarrier<'a>(pub &'a mut HeaderMap);

impl<'a> HeaderCarrier<'a> {
    pub fn new(headers: &'a mut HeaderMap) -> Self {
        Self(headers)
    }
}

impl Injector for HeaderCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                self.0.append(name, value);
            }
            _ => tracing::debug!(key, "Dropping unrepresentable carrier header"),
        }
    }
}

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get_all(key)
            .iter()
            .rev()
            .find_map(|value| std::str::from_utf8(value.as_bytes()).ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}
