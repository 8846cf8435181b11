//! Shared plumbing for the generated Google API hubs (Calendar, Gmail, Drive, Tasks).

use hyper::client::HttpConnector;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use serde::Serialize;
use serde_json::Value;

use super::error_message;
use crate::error::WorkspaceError;

pub type Connector = HttpsConnector<HttpConnector>;
pub type HttpsClient = hyper::Client<Connector, hyper::Body>;

/// Connection pool handed to every hub. Cloning shares the pool.
pub fn new_https_client() -> HttpsClient {
    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    hyper::Client::builder().build::<_, hyper::Body>(https)
}

/// Map a hub failure onto [`WorkspaceError::Upstream`], keeping Google's own
/// message when the error body carries one. All hub crates share this error type.
pub(crate) fn hub_error(err: google_calendar3::Error) -> WorkspaceError {
    use google_calendar3::Error;
    let message = match err {
        Error::BadRequest(body) => {
            error_message(&body).unwrap_or_else(|| format!("bad request: {}", body))
        }
        Error::Failure(resp) => format!("HTTP {}", resp.status()),
        other => other.to_string(),
    };
    WorkspaceError::Upstream(message)
}

/// Serialize a hub response, dropping unset fields.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, WorkspaceError> {
    Ok(prune_nulls(serde_json::to_value(value)?))
}

fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

/// Read a media response (Drive download or export) to the end.
pub(crate) async fn body_bytes(resp: hyper::Response<hyper::Body>) -> Result<Vec<u8>, WorkspaceError> {
    let bytes = hyper::body::to_bytes(resp.into_body())
        .await
        .map_err(|e| WorkspaceError::Upstream(format!("failed to read response body: {}", e)))?;
    Ok(bytes.to_vec())
}
