//! Request execution over a single libcurl easy handle.
//!
//! # Design
//! A `Session` owns exactly one `curl::easy::Easy` behind a mutex. Every call
//! to `send` takes the lock for the whole transfer, resets the handle, and
//! reapplies the standing options from `SessionConfig` before mapping the
//! request onto it, so no option set for one request leaks into the next.
//! Connections, the DNS cache and the cookie store survive `Easy::reset`,
//! which is what makes reusing one handle worthwhile.
//!
//! Per-call state (header list, multipart form, output file, body buffer) is
//! owned by `Inner::perform`'s stack frame and dropped on every exit path.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use curl::easy::{Auth as CurlAuth, Easy, Form, List};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::RequestOptions;
use crate::config::SessionConfig;
use crate::cookies::{parse_set_cookie, Cookies};
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::http::{Method, Request, WriteCallback};
use crate::response::Response;
use crate::types::{AuthType, Url};

const KEEPALIVE_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// A reusable client bound to one transport handle.
///
/// `Session` is `Send + Sync`; concurrent `send` calls on the same session
/// run one after another.
pub struct Session {
    inner: Mutex<Inner>,
    request_count: AtomicU64,
    total_response_micros: AtomicU64,
}

struct Inner {
    easy: Easy,
    config: SessionConfig,
    default_headers: Headers,
    default_cookies: Cookies,
    cookie_jar: Option<PathBuf>,
}

impl Session {
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let cookie_jar = config.cookie_jar.clone();
        let mut inner = Inner {
            easy: Easy::new(),
            config,
            default_headers: Headers::new(),
            default_cookies: Cookies::new(),
            cookie_jar: None,
        };
        inner.apply_standing_options()?;

        let session = Self {
            inner: Mutex::new(inner),
            request_count: AtomicU64::new(0),
            total_response_micros: AtomicU64::new(0),
        };
        if let Some(jar) = cookie_jar {
            session.set_cookie_jar(jar)?;
        }
        Ok(session)
    }

    /// Execute `request` and block until the transfer completes.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let started = Instant::now();
        let result = validate(request).and_then(|target| self.lock().perform(request, &target));
        self.record(started.elapsed());

        if let Err(err) = &result {
            warn!(method = %request.method(), url = %request.url(), %err, "request failed");
        }
        result
    }

    /// Run `send` on tokio's blocking pool. Must be called from within a
    /// tokio runtime. The transfer cannot be cancelled once started.
    pub fn send_async(self: &Arc<Self>, request: Request) -> JoinHandle<Result<Response>> {
        let session = Arc::clone(self);
        tokio::task::spawn_blocking(move || session.send(&request))
    }

    pub fn request(&self, method: Method, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        let request = options.apply(Request::new(method, url));
        self.send(&request)
    }

    pub fn get(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Get, url, options)
    }

    pub fn post(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Post, url, options)
    }

    pub fn put(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Put, url, options)
    }

    pub fn delete(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Delete, url, options)
    }

    pub fn patch(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Patch, url, options)
    }

    pub fn head(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Head, url, options)
    }

    pub fn options(&self, url: impl Into<Url>, options: RequestOptions) -> Result<Response> {
        self.request(Method::Options, url, options)
    }

    /// Headers sent ahead of every request's own headers.
    pub fn set_default_headers(&self, headers: Headers) {
        self.lock().default_headers = headers;
    }

    pub fn default_headers(&self) -> Headers {
        self.lock().default_headers.clone()
    }

    /// Cookies sent with every request; a request's own cookie of the same
    /// name wins.
    pub fn set_default_cookies(&self, cookies: Cookies) {
        self.lock().default_cookies = cookies;
    }

    pub fn default_cookies(&self) -> Cookies {
        self.lock().default_cookies.clone()
    }

    /// Load cookies from `path` now and write the cookie store back to it
    /// when the session is dropped. A missing file is not an error.
    pub fn set_cookie_jar(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let mut inner = self.lock();
        inner.easy.cookie_file(&path)?;
        inner.easy.cookie_list("RELOAD")?;
        debug!(jar = %path.display(), "cookie jar loaded");
        inner.cookie_jar = Some(path);
        Ok(())
    }

    pub fn cookie_jar(&self) -> Option<PathBuf> {
        self.lock().cookie_jar.clone()
    }

    pub fn set_connection_timeout(&self, secs: f64) {
        self.lock().config.connect_timeout = secs.max(0.0);
    }

    pub fn set_transfer_timeout(&self, secs: f64) {
        self.lock().config.transfer_timeout = secs.max(0.0);
    }

    pub fn set_max_connections_per_host(&self, max: u32) {
        self.lock().config.max_connections = max;
    }

    pub fn set_keep_alive(&self, enable: bool) {
        self.lock().config.keep_alive = enable;
    }

    pub fn set_compression(&self, enable: bool) {
        self.lock().config.compression = enable;
    }

    pub fn config(&self) -> SessionConfig {
        self.lock().config.clone()
    }

    /// False once a transfer hook panicked while holding the handle. The
    /// handle is still reset before the next transfer.
    pub fn is_valid(&self) -> bool {
        !self.inner.is_poisoned()
    }

    /// Clear all per-call options from the handle. Defaults and statistics
    /// are kept.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.easy.reset();
        inner.apply_standing_options()
    }

    /// Number of `send` calls so far, failed ones included.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean wall-clock time per `send` call in seconds, 0.0 before the first.
    pub fn average_response_time(&self) -> f64 {
        let count = self.request_count();
        if count == 0 {
            return 0.0;
        }
        let total = self.total_response_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        total / count as f64
    }

    fn record(&self, elapsed: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    // A poisoned lock only means a hook panicked mid-transfer; `perform`
    // resets the handle first, so the state is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(jar) = inner.cookie_jar.clone() else {
            return;
        };
        let flushed = inner
            .easy
            .cookie_jar(&jar)
            .and_then(|()| inner.easy.cookie_list("FLUSH"));
        match flushed {
            Ok(()) => debug!(jar = %jar.display(), "cookie jar written"),
            Err(err) => warn!(jar = %jar.display(), %err, "failed to write cookie jar"),
        }
    }
}

enum Sink {
    File(File),
    Hook(WriteCallback),
    Memory,
}

/// Response header lines of the transfer. A status line starts a new hop,
/// so only the final response's headers survive; cookies from every hop are
/// kept.
#[derive(Default)]
struct HeaderCapture {
    reason: String,
    headers: Headers,
    cookies: Cookies,
}

impl HeaderCapture {
    fn push(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return;
        }

        if line.starts_with("HTTP/") {
            self.headers.clear();
            self.reason = line.splitn(3, ' ').nth(2).unwrap_or_default().trim().to_string();
            return;
        }

        // Cookies are taken before validation so an oversized header line
        // still updates the cookie view.
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("Set-Cookie") {
                if let Some((name, value)) = parse_set_cookie(value) {
                    self.cookies.add(name, value);
                }
            }
        }
        if let Err(err) = self.headers.add_line(line) {
            debug!(%err, len = line.len(), "dropping response header");
        }
    }
}

impl Inner {
    fn apply_standing_options(&mut self) -> Result<()> {
        let config = &self.config;
        let easy = &mut self.easy;

        easy.ssl_verify_peer(config.verify_tls)?;
        easy.ssl_verify_host(config.verify_tls)?;
        easy.max_redirections(config.max_redirects)?;
        easy.buffer_size(config.buffer_size)?;

        if let Some(timeout) = config.connect_timeout() {
            easy.connect_timeout(timeout)?;
        }
        if let Some(timeout) = config.transfer_timeout() {
            easy.timeout(timeout)?;
        }
        easy.tcp_keepalive(config.keep_alive)?;
        if config.keep_alive {
            easy.tcp_keepidle(KEEPALIVE_PROBE_INTERVAL)?;
            easy.tcp_keepintvl(KEEPALIVE_PROBE_INTERVAL)?;
        }
        easy.max_connects(config.max_connections)?;
        if let Some(timeout) = config.dns_cache_timeout() {
            easy.dns_cache_timeout(timeout)?;
        }
        if config.compression {
            // Empty string: every encoding libcurl was built with.
            easy.accept_encoding("")?;
        }
        if let Some(agent) = &config.user_agent {
            easy.useragent(agent)?;
        }
        // Enables the in-memory cookie engine without reading a file.
        easy.cookie_file("")?;
        Ok(())
    }

    fn perform(&mut self, request: &Request, target: &url::Url) -> Result<Response> {
        self.easy.reset();
        self.apply_standing_options()?;

        let url = target.as_str().to_string();
        let method = request.method();
        debug!(%method, %url, "sending request");

        self.easy.url(&url)?;
        self.easy.custom_request(method.as_str())?;

        if !request.files().is_empty() {
            let mut form = Form::new();
            for (field, path) in request.files().iter() {
                form.part(field).file(path).add()?;
            }
            for (name, value) in request.params().iter() {
                form.part(name).contents(value.as_bytes()).add()?;
            }
            self.easy.httppost(form)?;
        } else if !request.body().is_empty() {
            self.easy.post_fields_copy(request.body().as_bytes())?;
        } else if request.read_callback().is_some() {
            self.easy.upload(true)?;
        }

        if method == Method::Head {
            self.easy.nobody(true)?;
        }
        let mut sink = match (request.output_file(), request.write_callback()) {
            (Some(path), _) => Sink::File(open_output(path)?),
            (None, Some(hook)) => Sink::Hook(Arc::clone(hook)),
            (None, None) => Sink::Memory,
        };

        let mut sent_headers = self.default_headers.clone();
        sent_headers.extend_from(request.headers())?;
        let mut list = List::new();
        for entry in sent_headers.iter() {
            list.append(entry)?;
        }
        self.easy.http_headers(list)?;

        let mut cookies = self.default_cookies.clone();
        cookies.merge(request.cookies());
        if !cookies.is_empty() {
            let host = target
                .host_str()
                .ok_or_else(|| Error::request(format!("url has no host: {url}")))?;
            let mut pairs: Vec<_> = cookies.all().iter().collect();
            pairs.sort();
            for (name, value) in pairs {
                self.easy.cookie_list(&cookie_store_line(host, name, value)?)?;
            }
        }

        let auth = request.auth();
        if auth.kind() != AuthType::None {
            self.easy.username(auth.username())?;
            self.easy.password(auth.password())?;
            let mut scheme = CurlAuth::new();
            if auth.kind() == AuthType::Digest {
                scheme.digest(true);
            } else {
                scheme.basic(true);
            }
            self.easy.http_auth(&scheme)?;
        }

        let redirects = request.redirects();
        if redirects.allow() {
            self.easy.follow_location(true)?;
            self.easy
                .max_redirections(redirects.max_redirects().min(self.config.max_redirects))?;
        } else {
            self.easy.follow_location(false)?;
        }

        if !request.verify().enabled() {
            self.easy.ssl_verify_peer(false)?;
            self.easy.ssl_verify_host(false)?;
        }
        if !request.proxy().is_empty() {
            self.easy.proxy(request.proxy().as_str())?;
        }
        if !request.timeout().is_zero() {
            self.easy.timeout(request.timeout().duration())?;
        }

        let limit = self.config.max_body_size;
        let mut body = Vec::new();
        let mut overflow = false;
        let mut sink_error = None;
        let mut capture = HeaderCapture::default();

        let outcome = {
            let mut transfer = self.easy.transfer();
            transfer.write_function(|data| {
                let written = match &mut sink {
                    Sink::File(file) => match file.write_all(data) {
                        Ok(()) => data.len(),
                        Err(err) => {
                            sink_error = Some(err);
                            0
                        }
                    },
                    Sink::Hook(hook) => hook(data),
                    Sink::Memory if body.len() + data.len() > limit => {
                        overflow = true;
                        0
                    }
                    Sink::Memory => {
                        body.extend_from_slice(data);
                        data.len()
                    }
                };
                Ok(written)
            })?;
            transfer.header_function(|line| {
                capture.push(line);
                true
            })?;
            if let Some(read) = request.read_callback() {
                transfer.read_function(|buf| Ok(read(buf)))?;
            }
            transfer.perform()
        };

        if let Err(err) = outcome {
            if let Some(io) = sink_error {
                return Err(Error::request(format!("failed to write output file: {io}")));
            }
            return Err(Error::from_curl(&err, overflow.then_some(limit)));
        }

        let status = self.easy.response_code()?;
        let elapsed = self.easy.total_time()?;
        let final_url = self.easy.effective_url()?.map(str::to_string).unwrap_or_else(|| url.clone());
        let mut history = Vec::new();
        if self.easy.redirect_count()? > 0 {
            history.push(Url::from(final_url.clone()));
        }

        debug!(%method, %url, status, elapsed_ms = elapsed.as_millis() as u64, "request finished");

        let HeaderCapture {
            reason,
            headers,
            cookies: received,
        } = capture;
        let is_redirect = (300..400).contains(&status) && headers.has("Location");

        Ok(Response {
            status,
            reason,
            url: Url::from(final_url),
            is_redirect,
            headers,
            body,
            request_url: Url::from(url),
            request_headers: sent_headers,
            cookies: received,
            elapsed,
            history,
            ..Response::default()
        })
    }
}

/// Local preconditions checked before the handle is touched. Returns the
/// URL handed to libcurl.
fn validate(request: &Request) -> Result<url::Url> {
    if request.url().is_empty() {
        return Err(Error::request("url is empty"));
    }
    let target = resolve_url(&request.effective_url())?;
    if let Some(path) = request.output_file() {
        check_writable_parent(path)?;
    }
    for (field, path) in request.files().iter() {
        if !path.is_file() {
            return Err(Error::request(format!(
                "upload file for field {field:?} not found: {}",
                path.display()
            )));
        }
    }
    Ok(target)
}

/// Parse `raw`, defaulting a missing scheme to `http`. Every scheme other
/// than http and https is rejected, so libcurl never guesses a protocol.
fn resolve_url(raw: &str) -> Result<url::Url> {
    let parsed = match url::Url::parse(raw) {
        Ok(parsed) if is_host_and_port(&parsed) => url::Url::parse(&format!("http://{raw}")),
        Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(&format!("http://{raw}")),
        other => other,
    }
    .map_err(|err| Error::request(format!("invalid url {raw:?}: {err}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Error::request(format!("unsupported protocol: {scheme}"))),
    }
}

/// `localhost:8080/x` parses as scheme `localhost` with an opaque path; a
/// path starting with a digit is a port, so the whole thing is a host.
fn is_host_and_port(parsed: &url::Url) -> bool {
    parsed.cannot_be_a_base() && parsed.path().starts_with(|c: char| c.is_ascii_digit())
}

/// A host-only session cookie for `host` on path `/`, in the cookie-file
/// format libcurl accepts for `CURLOPT_COOKIELIST`. Replaces a stored cookie
/// with the same name, host and path.
fn cookie_store_line(host: &str, name: &str, value: &str) -> Result<String> {
    let delimited = |s: &str| s.contains(['\t', '\r', '\n', ';']);
    if name.is_empty() || delimited(name) || delimited(value) {
        return Err(Error::validation(format!("cookie {name:?} cannot be stored")));
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok(format!("{host}\tFALSE\t/\tFALSE\t0\t{name}\t{value}"))
}

fn check_writable_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };
    let writable = std::fs::metadata(parent)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false);
    if !writable {
        return Err(Error::request(format!(
            "output directory is not writable: {}",
            parent.display()
        )));
    }
    Ok(())
}

fn open_output(path: &Path) -> Result<File> {
    File::create(path)
        .map_err(|err| Error::request(format!("failed to open output file {}: {err}", path.display())))
}
