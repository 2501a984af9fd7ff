use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;

/// Upper bound for `/bytes/{n}`.
pub const MAX_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound for `/delay/{ms}`.
pub const MAX_DELAY_MS: u64 = 10_000;

const DIGEST_REALM: &str = "mock";
const DIGEST_NONCE: &str = "6d6f636b2d6e6f6e6365";
const DIGEST_OPAQUE: &str = "6d6f636b2d6f7061717565";

/// What the server saw of a request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub args: BTreeMap<String, String>,
    /// Lowercased names; repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub data: String,
    pub json: Option<Value>,
}

/// Parts of a multipart upload, split by whether the part carried a filename.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Upload {
    pub files: BTreeMap<String, String>,
    pub form: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RedirectTo {
    url: String,
    status_code: Option<u16>,
}

pub fn app() -> Router {
    Router::new()
        .route("/anything", any(anything))
        .route("/anything/{*rest}", any(anything))
        .route("/delay/{ms}", any(delay))
        .route("/status/{code}", any(status))
        .route("/redirect/{n}", get(redirect))
        .route("/redirect-to", any(redirect_to))
        .route("/cookies", get(cookies))
        .route("/cookies/set", get(set_cookies))
        .route("/bytes/{n}", get(fixed_bytes))
        .route("/basic-auth/{user}/{pass}", get(basic_auth))
        .route("/digest-auth/{user}/{pass}", get(digest_auth))
        .route("/upload", post(upload))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn anything(
    method: Method,
    uri: Uri,
    Query(args): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    Json(echo(&method, &uri, args, &headers, &body))
}

async fn delay(
    Path(ms): Path<u64>,
    method: Method,
    uri: Uri,
    Query(args): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    tokio::time::sleep(Duration::from_millis(ms.min(MAX_DELAY_MS))).await;
    Json(echo(&method, &uri, args, &headers, &body))
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_redirection() => (status, [(header::LOCATION, "/anything")]).into_response(),
        Ok(status) => status.into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code").into_response(),
    }
}

async fn redirect(Path(n): Path<u32>) -> impl IntoResponse {
    let location = if n <= 1 {
        "/anything".to_string()
    } else {
        format!("/redirect/{}", n - 1)
    };
    debug!(n, %location, "redirecting");
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

async fn redirect_to(Query(target): Query<RedirectTo>) -> impl IntoResponse {
    let status = target
        .status_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);
    (status, [(header::LOCATION, target.url)])
}

async fn cookies(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(parse_cookie_header(&headers))
}

async fn set_cookies(Query(cookies): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    let set = cookies
        .iter()
        .map(|(name, value)| (header::SET_COOKIE, format!("{name}={value}; Path=/")))
        .collect::<Vec<_>>();
    (AppendHeaders(set), Json(cookies))
}

async fn fixed_bytes(Path(n): Path<usize>) -> impl IntoResponse {
    let body: Vec<u8> = (0..n.min(MAX_BYTES)).map(|i| (i % 256) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], body)
}

async fn basic_auth(Path((user, pass)): Path<(String, String)>, headers: HeaderMap) -> Response {
    let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));
    let presented = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        return Json(json!({ "authenticated": true, "user": user })).into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"mock\"")],
    )
        .into_response()
}

/// RFC 2617 digest with `qop=auth` and MD5, fixed nonce.
async fn digest_auth(
    Path((user, pass)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let params = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Digest "))
        .map(parse_digest_params)
        .unwrap_or_default();

    if params.get("username") == Some(&user) && digest_response_matches(&params, method.as_str(), &pass) {
        return Json(json!({ "authenticated": true, "user": user })).into_response();
    }
    debug!(%user, "digest challenge");
    let challenge = format!(
        "Digest realm=\"{DIGEST_REALM}\", qop=\"auth\", nonce=\"{DIGEST_NONCE}\", opaque=\"{DIGEST_OPAQUE}\", algorithm=MD5"
    );
    (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, challenge)]).into_response()
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn digest_response_matches(params: &BTreeMap<String, String>, method: &str, pass: &str) -> bool {
    let field = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();
    if field("nonce") != DIGEST_NONCE || field("realm") != DIGEST_REALM {
        return false;
    }
    let ha1 = md5_hex(&format!("{}:{DIGEST_REALM}:{pass}", field("username")));
    let ha2 = md5_hex(&format!("{method}:{}", field("uri")));
    let expected = match field("qop") {
        "" => md5_hex(&format!("{ha1}:{DIGEST_NONCE}:{ha2}")),
        qop => md5_hex(&format!(
            "{ha1}:{DIGEST_NONCE}:{}:{}:{qop}:{ha2}",
            field("nc"),
            field("cnonce")
        )),
    };
    field("response") == expected
}

/// Split `k=v, k="v, w"` pairs, honoring quotes.
fn parse_digest_params(raw: &str) -> BTreeMap<String, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in raw.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

async fn upload(mut multipart: Multipart) -> Result<Json<Upload>, StatusCode> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let text = String::from_utf8_lossy(&data).into_owned();
        if is_file {
            upload.files.insert(name, text);
        } else {
            upload.form.insert(name, text);
        }
    }
    Ok(Json(upload))
}

fn echo(method: &Method, uri: &Uri, args: BTreeMap<String, String>, headers: &HeaderMap, body: &[u8]) -> Echo {
    let mut echoed = BTreeMap::<String, String>::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or_default();
        echoed
            .entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    Echo {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        args,
        headers: echoed,
        cookies: parse_cookie_header(headers),
        data: String::from_utf8_lossy(body).into_owned(),
        json: serde_json::from_slice(body).ok(),
    }
}

fn parse_cookie_header(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
