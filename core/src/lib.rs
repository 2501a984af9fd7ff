//! Blocking HTTP client built on libcurl.
//!
//! # Overview
//! Requests are described as plain data (`Request` plus small value types
//! such as `Params`, `Auth` and `Redirects`) and executed by a `Session`,
//! which owns one reusable libcurl easy handle. The result is a `Response`
//! carrying status, headers, body, cookies and timing.
//!
//! # Design
//! - `Session` serializes transfers on its handle; use a `SessionPool` for
//!   concurrent callers or `Session::send_async` from async code.
//! - Every failure surfaces as one `Error` variant; a non-2xx status is not
//!   a failure until `Response::raise_for_status` is called.
//! - The free functions in `client` build a throwaway session per call.
//!
//! ```no_run
//! use curlx_core::{Params, RequestOptions};
//!
//! let params: Params = [("q", "rust")].into_iter().collect();
//! let response = curlx_core::get("https://example.com/search", RequestOptions::new().params(params))?;
//! println!("{} {}", response.status, response.text());
//! # Ok::<(), curlx_core::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod headers;
pub mod http;
pub mod pool;
pub mod response;
pub mod session;
pub mod types;

pub use client::{delete, get, head, options, patch, post, put, request, RequestOptions};
pub use config::SessionConfig;
pub use cookies::Cookies;
pub use error::{Error, Result};
pub use headers::Headers;
pub use http::{Method, ReadCallback, Request, WriteCallback};
pub use pool::{PooledSession, SessionPool};
pub use response::Response;
pub use session::Session;
pub use types::{Auth, AuthType, Body, Files, Params, Proxy, Redirects, Timeout, Url, Verify};
