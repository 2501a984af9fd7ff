//! End-to-end transfers against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background tokio
//! runtime, then drives real libcurl transfers through `Session`. The server
//! echoes what it received, so assertions check both what was sent and how
//! the response was mapped back.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use curlx_core::{
    Auth, Cookies, Error, Files, Headers, Method, Params, Redirects, Request, RequestOptions, Session,
    SessionConfig, SessionPool, Timeout,
};
use mock_server::{Echo, Upload};

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn echo_of(response: &curlx_core::Response) -> Echo {
    response.json_as().unwrap()
}

// --- request shaping ---

#[test]
fn params_are_encoded_and_echoed() {
    let base = start_server();
    let session = Session::new().unwrap();
    let params: Params = [("q", "a b"), ("lang", "en")].into_iter().collect();

    let response = session
        .get(format!("{base}/anything"), RequestOptions::new().params(params))
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.request_url.as_str().ends_with("/anything?lang=en&q=a%20b"));
    let echo = echo_of(&response);
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.args["q"], "a b");
    assert_eq!(echo.args["lang"], "en");
}

#[test]
fn default_headers_precede_request_headers() {
    let base = start_server();
    let session = Session::new().unwrap();
    session.set_default_headers(Headers::from_pairs([("X-Client", "test")]).unwrap());

    let headers = Headers::from_pairs([("Accept", "text/plain")]).unwrap();
    let response = session
        .get(format!("{base}/anything"), RequestOptions::new().headers(headers))
        .unwrap();

    assert_eq!(response.request_headers.all(), ["X-Client: test", "Accept: text/plain"]);
    let echo = echo_of(&response);
    assert_eq!(echo.headers["x-client"], "test");
    assert_eq!(echo.headers["accept"], "text/plain");
}

#[test]
fn every_method_reaches_the_server() {
    let base = start_server();
    let session = Session::new().unwrap();

    for method in Method::ALL.into_iter().filter(|m| *m != Method::Head) {
        let response = session
            .request(method, format!("{base}/anything"), RequestOptions::new())
            .unwrap();
        assert_eq!(echo_of(&response).method, method.as_str(), "{method}");
    }
}

#[test]
fn json_body_is_posted_with_content_type() {
    let base = start_server();
    let options = RequestOptions::new()
        .json(&serde_json::json!({ "title": "Buy milk", "completed": false }))
        .unwrap();

    let response = curlx_core::post(format!("{base}/anything"), options).unwrap();

    let echo = echo_of(&response);
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.headers["content-type"], "application/json");
    let json = echo.json.unwrap();
    assert_eq!(json["title"], "Buy milk");
    assert_eq!(json["completed"], false);
}

#[test]
fn read_callback_streams_request_body() {
    let base = start_server();
    let session = Session::new().unwrap();
    let sent = Arc::new(AtomicBool::new(false));

    let request = Request::new(Method::Put, format!("{base}/anything")).with_read_callback({
        let sent = Arc::clone(&sent);
        move |buf| {
            if sent.swap(true, Ordering::SeqCst) {
                return 0;
            }
            let payload = b"streamed body";
            buf[..payload.len()].copy_from_slice(payload);
            payload.len()
        }
    });
    let response = session.send(&request).unwrap();

    let echo = echo_of(&response);
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.data, "streamed body");
}

// --- cookies ---

#[test]
fn set_cookie_is_captured_and_replayed() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(format!("{base}/cookies/set?session=abc123"), RequestOptions::new())
        .unwrap();
    assert_eq!(response.cookies.get("session"), Some("abc123"));

    let response = session.get(format!("{base}/cookies"), RequestOptions::new()).unwrap();
    let sent: std::collections::BTreeMap<String, String> = response.json_as().unwrap();
    assert_eq!(sent.get("session").map(String::as_str), Some("abc123"));
}

#[test]
fn default_and_request_cookies_are_merged() {
    let base = start_server();
    let session = Session::new().unwrap();
    session.set_default_cookies([("lang", "en"), ("theme", "light")].into_iter().collect());

    let cookies: Cookies = [("theme", "dark")].into_iter().collect();
    let response = session
        .get(format!("{base}/anything"), RequestOptions::new().cookies(cookies))
        .unwrap();

    let echo = echo_of(&response);
    assert_eq!(echo.cookies["lang"], "en");
    assert_eq!(echo.cookies["theme"], "dark");
}

#[test]
fn request_cookie_replaces_stored_cookie() {
    let base = start_server();
    let session = Session::new().unwrap();
    session
        .get(format!("{base}/cookies/set?session=old"), RequestOptions::new())
        .unwrap();

    let cookies: Cookies = [("session", "new")].into_iter().collect();
    let response = session
        .get(format!("{base}/anything"), RequestOptions::new().cookies(cookies))
        .unwrap();
    assert_eq!(echo_of(&response).headers["cookie"], "session=new");

    let response = session.get(format!("{base}/anything"), RequestOptions::new()).unwrap();
    assert_eq!(echo_of(&response).headers["cookie"], "session=new");
}

#[test]
fn cookie_jar_survives_sessions() {
    let base = start_server();
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("cookies.txt");

    {
        let session = Session::new().unwrap();
        session.set_cookie_jar(&jar).unwrap();
        session
            .get(format!("{base}/cookies/set?session=abc123"), RequestOptions::new())
            .unwrap();
    }
    let saved = std::fs::read_to_string(&jar).unwrap();
    assert!(saved.contains("abc123"));

    let config = SessionConfig {
        cookie_jar: Some(jar.clone()),
        ..SessionConfig::default()
    };
    let session = Session::with_config(config).unwrap();
    assert_eq!(session.cookie_jar().as_deref(), Some(jar.as_path()));
    let response = session.get(format!("{base}/cookies"), RequestOptions::new()).unwrap();
    let sent: std::collections::BTreeMap<String, String> = response.json_as().unwrap();
    assert_eq!(sent.get("session").map(String::as_str), Some("abc123"));
}

// --- redirects ---

#[test]
fn redirect_is_returned_when_not_followed() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(
            format!("{base}/redirect/1"),
            RequestOptions::new().redirects(Redirects::new(false)),
        )
        .unwrap();

    assert_eq!(response.status, 302);
    assert!(response.is_redirect);
    assert_eq!(response.headers.get("location"), Some("/anything"));
    assert!(response.history.is_empty());
    assert!(response.ok());
    assert!(!response.is_success());
}

#[test]
fn redirects_are_followed_by_default() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session.get(format!("{base}/redirect/3"), RequestOptions::new()).unwrap();

    assert_eq!(response.status, 200);
    assert!(!response.is_redirect);
    assert_eq!(response.url.as_str(), format!("{base}/anything"));
    assert_eq!(response.history.len(), 1);
    assert_eq!(echo_of(&response).path, "/anything");
}

#[test]
fn redirect_limit_is_enforced() {
    let base = start_server();
    let session = Session::new().unwrap();

    let err = session
        .get(
            format!("{base}/redirect/5"),
            RequestOptions::new().redirects(Redirects::with_max(true, 2)),
        )
        .unwrap_err();

    assert!(matches!(err, Error::TooManyRedirects(_)), "{err:?}");
}

// --- failures ---

#[test]
fn slow_response_times_out() {
    let base = start_server();
    let session = Session::new().unwrap();

    let err = session
        .get(
            format!("{base}/delay/2000"),
            RequestOptions::new().timeout(Timeout::from_millis(200)),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "{err:?}");
    assert!(err.is_transport());
    assert_eq!(session.request_count(), 1);
}

#[test]
fn refused_connection_is_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = curlx_core::get(format!("http://127.0.0.1:{port}/"), RequestOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err:?}");
}

#[test]
fn error_status_is_data_until_raised() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session.get(format!("{base}/status/404"), RequestOptions::new()).unwrap();
    assert_eq!(response.status, 404);
    assert!(response.is_client_error());
    assert!(matches!(response.raise_for_status(), Err(Error::Http { status: 404, .. })));

    let response = session.delete(format!("{base}/status/503"), RequestOptions::new()).unwrap();
    assert!(response.is_server_error());
    assert_eq!(response.reason, "Service Unavailable");
}

#[test]
fn oversized_body_is_rejected() {
    let base = start_server();
    let config = SessionConfig {
        max_body_size: 1024,
        ..SessionConfig::default()
    };
    let session = Session::with_config(config).unwrap();

    let err = session.get(format!("{base}/bytes/4096"), RequestOptions::new()).unwrap_err();
    assert!(matches!(err, Error::BodyTooLarge { limit: 1024 }), "{err:?}");

    let response = session.get(format!("{base}/bytes/512"), RequestOptions::new()).unwrap();
    assert_eq!(response.body.len(), 512);
}

// --- sinks ---

#[test]
fn output_file_receives_body() {
    let base = start_server();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("download.bin");
    let session = Session::new().unwrap();

    let response = session
        .get(format!("{base}/bytes/4096"), RequestOptions::new().output_file(&path))
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), 4096);
    assert_eq!(written[300], (300 % 256) as u8);
}

#[test]
fn write_callback_receives_body() {
    let base = start_server();
    let session = Session::new().unwrap();
    let collected = Arc::new(Mutex::new(Vec::new()));

    let request = Request::new(Method::Get, format!("{base}/bytes/1000")).with_write_callback({
        let collected = Arc::clone(&collected);
        move |chunk| {
            collected.lock().unwrap().extend_from_slice(chunk);
            chunk.len()
        }
    });
    let response = session.send(&request).unwrap();

    assert!(response.body.is_empty());
    assert_eq!(collected.lock().unwrap().len(), 1000);
}

#[test]
fn head_returns_headers_only() {
    let base = start_server();
    let response = curlx_core::head(format!("{base}/anything"), RequestOptions::new()).unwrap();

    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
    assert_eq!(response.content_type(), Some("application/json"));
}

#[test]
fn files_are_uploaded_as_multipart() {
    let base = start_server();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"file contents").unwrap();

    let files: Files = [("doc", file.path())].into_iter().collect();
    let params: Params = [("kind", "report")].into_iter().collect();
    let response = curlx_core::post(
        format!("{base}/upload"),
        RequestOptions::new().files(files).params(params).body("ignored"),
    )
    .unwrap();

    assert_eq!(response.status, 200);
    let upload: Upload = response.json_as().unwrap();
    assert_eq!(upload.files["doc"], "file contents");
    assert_eq!(upload.form["kind"], "report");
}

// --- auth ---

#[test]
fn basic_auth_is_sent() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(
            format!("{base}/basic-auth/user/passwd"),
            RequestOptions::new().auth(Auth::basic("user", "passwd")),
        )
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["authenticated"], true);

    let response = session
        .get(
            format!("{base}/basic-auth/user/passwd"),
            RequestOptions::new().auth(Auth::from_user_pass("user:wrong")),
        )
        .unwrap();
    assert_eq!(response.status, 401);
}

#[test]
fn digest_auth_is_negotiated() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(
            format!("{base}/digest-auth/user/passwd"),
            RequestOptions::new().auth(Auth::digest("user", "passwd")),
        )
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["user"], "user");

    let response = session
        .get(
            format!("{base}/digest-auth/user/passwd"),
            RequestOptions::new().auth(Auth::digest("user", "wrong")),
        )
        .unwrap();
    assert_eq!(response.status, 401);
}

// --- transport options ---

#[test]
fn proxy_receives_absolute_form_request() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(
            "http://origin.invalid/anything?via=proxy",
            RequestOptions::new().proxy(base.as_str()),
        )
        .unwrap();

    assert_eq!(response.status, 200);
    let echo = echo_of(&response);
    assert_eq!(echo.path, "/anything");
    assert_eq!(echo.args["via"], "proxy");
    assert_eq!(echo.headers["host"], "origin.invalid");
}

#[test]
fn disabled_verification_does_not_affect_plain_http() {
    let base = start_server();
    let session = Session::new().unwrap();

    let response = session
        .get(format!("{base}/anything"), RequestOptions::new().verify(false))
        .unwrap();
    assert_eq!(response.status, 200);

    let response = session.get(format!("{base}/anything"), RequestOptions::new()).unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn merged_headers_over_capacity_are_rejected() {
    let base = start_server();
    let session = Session::new().unwrap();
    let defaults = Headers::from_pairs((0..600).map(|i| (format!("X-Default-{i}"), "1"))).unwrap();
    session.set_default_headers(defaults);

    let own = Headers::from_pairs((0..600).map(|i| (format!("X-Own-{i}"), "1"))).unwrap();
    let err = session
        .get(format!("{base}/anything"), RequestOptions::new().headers(own))
        .unwrap_err();
    assert!(matches!(err, Error::Capacity { max: 1000 }), "{err:?}");
}

// --- statistics, async and pooling ---

#[test]
fn statistics_count_every_call() {
    let base = start_server();
    let session = Session::new().unwrap();

    for _ in 0..3 {
        session.get(format!("{base}/anything"), RequestOptions::new()).unwrap();
    }
    let _ = session.get("", RequestOptions::new());

    assert_eq!(session.request_count(), 4);
    assert!(session.average_response_time() > 0.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn send_async_runs_on_blocking_pool() {
    let base = start_server();
    let session = Arc::new(Session::new().unwrap());

    let first = session.send_async(Request::new(Method::Get, format!("{base}/delay/50")));
    let second = session.send_async(Request::new(Method::Post, format!("{base}/anything")).with_body("x"));

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.status, 200);
    assert_eq!(echo_of(&second).data, "x");
    assert_eq!(session.request_count(), 2);
}

#[test]
fn pool_shares_sessions_across_threads() {
    let base = start_server();
    let pool = Arc::new(SessionPool::new(2));

    let workers: Vec<_> = (0..6)
        .map(|i| {
            let pool = Arc::clone(&pool);
            let url = format!("{base}/anything?worker={i}");
            thread::spawn(move || {
                let session = pool.checkout().unwrap();
                let response = session.get(url, RequestOptions::new()).unwrap();
                assert_eq!(echo_of(&response).args["worker"], i.to_string());
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(pool.size() <= 2);
    assert_eq!(pool.available(), pool.size());
}
