//! The response descriptor returned by `Session::send`.
//!
//! A `Response` is populated once at the end of a successful transfer and is
//! plain data from then on. The only derived state is the parsed JSON body,
//! which is memoized on first successful `json()` call. Assigning `body`
//! directly after that leaves the memo stale; `set_body` replaces the body
//! and drops the memo.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::cookies::Cookies;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::types::Url;

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u32,
    /// Reason phrase from the final status line; empty for HTTP/2.
    pub reason: String,
    /// Effective URL after any redirects.
    pub url: Url,
    /// The final response is a 3xx carrying a `Location` header.
    pub is_redirect: bool,
    pub headers: Headers,
    /// Empty when the body was streamed to a file or a write hook. Use
    /// `set_body` to replace it once `json()` has been called.
    pub body: Vec<u8>,
    /// URL actually requested, query string included.
    pub request_url: Url,
    /// Headers actually sent: session defaults followed by request headers.
    pub request_headers: Headers,
    pub cookies: Cookies,
    pub elapsed: Duration,
    /// URLs reached by following redirects.
    pub history: Vec<Url>,
    pub(crate) json: OnceLock<serde_json::Value>,
}

impl Response {
    /// An otherwise empty response with the given status.
    pub fn with_status(status: u32) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Status in [200, 400). Redirect statuses count as ok here, unlike
    /// `is_success`.
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn raise_for_status(&self) -> Result<()> {
        if self.ok() {
            return Ok(());
        }
        Err(Error::Http {
            status: self.status,
            reason: self.reason.clone(),
        })
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect_status(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Replace the body and forget any parsed JSON.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.json = OnceLock::new();
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Parse the body as JSON. The parsed value is cached after the first
    /// success; failures are not cached.
    pub fn json(&self) -> Result<&serde_json::Value> {
        if let Some(value) = self.json.get() {
            return Ok(value);
        }
        let value: serde_json::Value = serde_json::from_slice(&self.body)?;
        Ok(self.json.get_or_init(|| value))
    }

    /// Deserialize the body into `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("Content-Length")?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_treats_redirects_as_success() {
        assert!(Response::with_status(200).ok());
        assert!(Response::with_status(399).ok());
        assert!(!Response::with_status(400).ok());
        assert!(!Response::with_status(100).ok());
        assert!(!Response::with_status(302).is_success());
    }

    #[test]
    fn raise_for_status_matches_ok() {
        for status in [100, 199, 200, 204, 301, 399, 400, 404, 500, 599] {
            let response = Response::with_status(status);
            assert_eq!(response.raise_for_status().is_ok(), response.ok(), "status {status}");
        }
    }

    #[test]
    fn raise_for_status_reports_status_and_reason() {
        let mut response = Response::with_status(503);
        response.reason = "Service Unavailable".to_string();
        let err = response.raise_for_status().unwrap_err();
        assert!(matches!(err, Error::Http { status: 503, ref reason } if reason == "Service Unavailable"));
    }

    #[test]
    fn classification_ranges() {
        assert!(Response::with_status(101).is_informational());
        assert!(Response::with_status(301).is_redirect_status());
        assert!(Response::with_status(404).is_client_error());
        assert!(Response::with_status(502).is_server_error());
        assert!(!Response::with_status(600).is_server_error());
    }

    #[test]
    fn json_is_parsed_and_memoized() {
        let mut response = Response::with_status(200);
        response.body = br#"{"args":{"q":"rust"}}"#.to_vec();
        let first = response.json().unwrap() as *const serde_json::Value;
        let second = response.json().unwrap() as *const serde_json::Value;
        assert_eq!(first, second);
        assert_eq!(response.json().unwrap()["args"]["q"], "rust");
    }

    #[test]
    fn set_body_invalidates_parsed_json() {
        let mut response = Response::with_status(200);
        response.set_body(r#"{"v":1}"#);
        assert_eq!(response.json().unwrap()["v"], 1);

        response.set_body(r#"{"v":2}"#);
        assert_eq!(response.json().unwrap()["v"], 2);

        response.set_body("not json");
        assert!(response.json().is_err());
    }

    #[test]
    fn json_on_malformed_body_is_parse_error() {
        let mut response = Response::with_status(200);
        response.body = b"not json".to_vec();
        assert!(matches!(response.json(), Err(Error::Parse { .. })));
    }

    #[test]
    fn text_and_header_accessors() {
        let mut response = Response::with_status(200);
        response.body = b"hello".to_vec();
        response.headers.add("content-type", "text/plain").unwrap();
        response.headers.add("Content-Length", "5").unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.content_length(), Some(5));
    }
}
