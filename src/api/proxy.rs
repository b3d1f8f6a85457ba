//! Reverse proxy to the supervised backend under `/proxy`

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Request};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use super::state::AppState;
use super::types::ApiError;
use crate::domain::ProvisionError;

pub const PROXY_PREFIX: &str = "/proxy";

/// Where proxied requests go, plus the client that carries them
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    base_url: String,
    client: reqwest::Client,
}

impl ProxyTarget {
    /// Redirects from the backend are relayed to the caller, not followed
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProvisionError::internal(format!("Failed to build proxy client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Backend URL for a gateway path: the `/proxy` prefix is removed and the
    /// query string kept as is.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let rest = path.strip_prefix(PROXY_PREFIX).unwrap_or(path);
        let rest = if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        };

        match query {
            Some(query) => format!("{}{}?{}", self.base_url, rest, query),
            None => format!("{}{}", self.base_url, rest),
        }
    }
}

pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let target_url = state
        .proxy
        .target_url(request.uri().path(), request.uri().query());

    debug!(method = %request.method(), target = %target_url, "Proxying request");

    match forward_request(&state.proxy.client, request, &target_url).await {
        Ok(response) => response,
        Err(e) => {
            error!(target = %target_url, error = %e, "Proxy error");
            ApiError::bad_gateway(format!("Backend unreachable: {}", e))
                .with_code("proxy_error")
                .into_response()
        }
    }
}

async fn forward_request(
    client: &reqwest::Client,
    request: Request<Body>,
    target_url: &str,
) -> Result<Response, anyhow::Error> {
    let (parts, body) = request.into_parts();
    let has_body = parts.headers.contains_key(header::CONTENT_LENGTH)
        || parts.headers.contains_key(header::TRANSFER_ENCODING);

    let mut proxy_req = client
        .request(parts.method, target_url)
        .headers(forwardable_headers(&parts.headers, true));

    if has_body {
        proxy_req = proxy_req.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let response = proxy_req.send().await?;

    let mut builder = Response::builder().status(response.status());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(forwardable_headers(response.headers(), false));
    }

    Ok(builder.body(Body::from_stream(response.bytes_stream()))?)
}

/// Copy of `headers` without hop-by-hop headers (and without `Host` on the
/// way to the backend, so the client sets its own).
fn forwardable_headers(headers: &HeaderMap, outbound: bool) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if is_hop_by_hop(name) || (outbound && name == header::HOST) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }

    forwarded
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
