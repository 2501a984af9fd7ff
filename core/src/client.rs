//! One-call request helpers.
//!
//! # Design
//! `RequestOptions` is the set of facets a caller may attach to a request,
//! each optional and independent of the others. The per-verb functions here
//! spin up a throwaway `Session`, so they are convenient for one-off calls;
//! anything issuing more than a handful of requests should hold a `Session`
//! and call its verb methods instead to reuse connections.

use std::path::PathBuf;

use serde::Serialize;

use crate::cookies::Cookies;
use crate::error::Result;
use crate::headers::Headers;
use crate::http::{Method, Request};
use crate::response::Response;
use crate::session::Session;
use crate::types::{Auth, Body, Files, Params, Proxy, Redirects, Timeout, Url, Verify};

/// Optional request facets; unset ones keep the `Request` defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Option<Headers>,
    pub body: Option<Body>,
    pub auth: Option<Auth>,
    pub proxy: Option<Proxy>,
    pub cookies: Option<Cookies>,
    pub timeout: Option<Timeout>,
    pub redirects: Option<Redirects>,
    pub verify: Option<Verify>,
    pub params: Option<Params>,
    pub files: Option<Files>,
    pub output_file: Option<PathBuf>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and mark it `application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::json(value)?);
        let mut headers = self.headers.take().unwrap_or_default();
        headers.remove("Content-Type");
        headers.add("Content-Type", "application/json")?;
        self.headers = Some(headers);
        Ok(self)
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn cookies(mut self, cookies: Cookies) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn redirects(mut self, redirects: Redirects) -> Self {
        self.redirects = Some(redirects);
        self
    }

    pub fn verify(mut self, verify: impl Into<Verify>) -> Self {
        self.verify = Some(verify.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn files(mut self, files: Files) -> Self {
        self.files = Some(files);
        self
    }

    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Copy every set facet onto `request`.
    pub fn apply(self, mut request: Request) -> Request {
        if let Some(headers) = self.headers {
            request = request.with_headers(headers);
        }
        if let Some(body) = self.body {
            request = request.with_body(body);
        }
        if let Some(auth) = self.auth {
            request = request.with_auth(auth);
        }
        if let Some(proxy) = self.proxy {
            request = request.with_proxy(proxy);
        }
        if let Some(cookies) = self.cookies {
            request = request.with_cookies(cookies);
        }
        if let Some(timeout) = self.timeout {
            request = request.with_timeout(timeout);
        }
        if let Some(redirects) = self.redirects {
            request = request.with_redirects(redirects);
        }
        if let Some(verify) = self.verify {
            request = request.with_verify(verify);
        }
        if let Some(params) = self.params {
            request = request.with_params(params);
        }
        if let Some(files) = self.files {
            request = request.with_files(files);
        }
        if let Some(path) = self.output_file {
            request = request.with_output_file(path);
        }
        request
    }
}

/// Send `method` to `url` on a fresh session.
pub fn request(method: Method, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    Session::new()?.request(method, url, options)
}

pub fn get(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Get, url, options)
}

pub fn post(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Post, url, options)
}

pub fn put(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Put, url, options)
}

pub fn delete(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Delete, url, options)
}

pub fn patch(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Patch, url, options)
}

pub fn head(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Head, url, options)
}

pub fn options(url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
    request(Method::Options, url, options)
}
