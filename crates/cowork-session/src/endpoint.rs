// ABOUTME: Relay websocket URL construction for a named action.
// ABOUTME: Validates required options, rewrites the scheme, and appends the broker path and query.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::SessionError;
use crate::options::Options;

/// Action used to open the session's websocket.
pub const CONNECT_ACTION: &str = "connect";

/// Broker path inserted after the relay namespace host.
const BROKER_SEGMENT: &str = ".net:443/$hc/";

/// Characters left alone in a query value, matching form encoding.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn query_escape(value: &str) -> String {
    // A literal "%20" in the input is itself escaped to "%2520", so this only
    // touches encoded spaces.
    utf8_percent_encode(value, QUERY_VALUE)
        .to_string()
        .replace("%20", "+")
}

impl Options {
    /// Check the fields needed before any network action.
    pub fn validate(&self) -> Result<(), SessionError> {
        let required = [
            ("client_name", &self.client_name),
            ("session_id", &self.session_id),
            ("relay_sas", &self.relay_sas),
            ("relay_endpoint", &self.relay_endpoint),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(SessionError::Validation { field });
            }
        }
        Ok(())
    }

    /// Websocket URL for `action` on the relay.
    ///
    /// `http:` endpoints become `ws:`; otherwise every `sb:` becomes `wss:`.
    /// The first `.net/` gains the broker path, and the action and encoded
    /// SAS are appended as `sb-hc-action` and `sb-hc-token`, in that order.
    pub fn uri(&self, action: &str) -> Result<String, SessionError> {
        self.validate()?;

        let sas = query_escape(&self.relay_sas);

        let uri = match self.relay_endpoint.strip_prefix("http:") {
            Some(rest) => format!("ws:{}", rest),
            None => self.relay_endpoint.replace("sb:", "wss:"),
        };
        let uri = uri.replacen(".net/", BROKER_SEGMENT, 1);

        Ok(format!(
            "{}?sb-hc-action={}&sb-hc-token={}",
            uri, action, sas
        ))
    }
}
