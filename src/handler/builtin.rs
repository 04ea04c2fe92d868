// Built-in services module
// In-memory `conf` store and an `echo` endpoint, registered at startup

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::table::{handler_fn, HandlerTable, MatchedRoute};
use crate::http::{
    build_400_response, build_404_response, build_500_response, error_response, json_response,
};
use crate::logger;
use crate::portal::buffer::BoxError;
use crate::portal::{HandlerDescriptor, PortalBody, RegistryBuildError};

type ConfStore = Arc<Mutex<BTreeMap<String, Value>>>;

/// Request body accepted by the `conf` service.
///
/// Envelope fields such as `command` are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfRequest {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

/// Handler table served by the binary
pub fn default_handlers() -> Result<HandlerTable, RegistryBuildError> {
    let mut table = HandlerTable::new();

    let store: ConfStore = Arc::default();
    table.register(
        HandlerDescriptor::new("conf", "/service/conf")
            .post("list")
            .post("get")
            .post("set"),
        handler_fn(move |req| {
            let store = Arc::clone(&store);
            async move { handle_conf(&req, &store) }
        }),
    )?;

    table.register(
        HandlerDescriptor::new("echo", "/echo").post("/"),
        handler_fn(handle_echo),
    )?;

    Ok(table)
}

fn handle_conf(req: &Request<PortalBody>, store: &ConfStore) -> Response<Full<Bytes>> {
    let Some(matched) = req.extensions().get::<MatchedRoute>() else {
        logger::log_error("conf service called without a matched route");
        return build_500_response("missing route information");
    };
    let Some(raw) = req.body().buffered() else {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "conf requests must be JSON, not uploads",
        );
    };

    let body: ConfRequest = if raw.is_empty() {
        ConfRequest::default()
    } else {
        match serde_json::from_reader(raw.reader()) {
            Ok(body) => body,
            Err(e) => return build_400_response(&format!("Invalid conf request: {e}")),
        }
    };

    let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
    let operation = matched.route.rsplit('/').next().unwrap_or_default();
    match operation {
        "list" => json_response(StatusCode::OK, &json!({ "entries": &*store })),
        "get" => {
            let Some(key) = body.key else {
                return build_400_response("'key' is required");
            };
            match store.get(&key) {
                Some(value) => json_response(StatusCode::OK, &json!({ "key": key, "value": value })),
                None => build_404_response(&format!("no conf entry '{key}'")),
            }
        }
        "set" => {
            let (Some(key), Some(value)) = (body.key, body.value) else {
                return build_400_response("'key' and 'value' are required");
            };
            let previous = store.insert(key.clone(), value.clone());
            json_response(
                StatusCode::OK,
                &json!({ "key": key, "value": value, "previous": previous }),
            )
        }
        other => build_404_response(&format!("unknown conf operation '{other}'")),
    }
}

/// Reflect the request back: matched route, command and body.
///
/// Uploads are not echoed; only their size is reported.
async fn handle_echo(req: Request<PortalBody>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let matched = parts.extensions.get::<MatchedRoute>();

    let reflected = match body.buffered() {
        Some(buffered) => serde_json::from_reader::<_, Value>(buffered.reader()).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(buffered.as_bytes()).into_owned())
        }),
        None => match count_bytes(body.into_stream()).await {
            Ok(total) => json!({ "upload_bytes": total }),
            Err(e) => return build_400_response(&format!("failed to read upload: {e}")),
        },
    };

    json_response(
        StatusCode::OK,
        &json!({
            "route": matched.map(|m| m.route.as_str()),
            "command": matched.and_then(|m| m.command.as_deref()),
            "body": reflected,
        }),
    )
}

/// Drain a stream frame by frame, keeping only the byte count
async fn count_bytes(mut stream: UnsyncBoxBody<Bytes, BoxError>) -> Result<usize, BoxError> {
    let mut total = 0;
    while let Some(frame) = stream.frame().await {
        if let Ok(data) = frame?.into_data() {
            total += data.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::{AmbiguityPolicy, BufferedBody, CommandRegistry};

    async fn call(table: &HandlerTable, route: &str, body: &str) -> (StatusCode, Value) {
        call_with(table, route, PortalBody::Buffered(BufferedBody::new(body.to_string()))).await
    }

    async fn call_with(table: &HandlerTable, route: &str, body: PortalBody) -> (StatusCode, Value) {
        let (matched, handler) = table
            .route_direct(&hyper::Method::POST, route)
            .unwrap();
        let mut req = Request::builder()
            .method("POST")
            .uri(route)
            .body(body)
            .unwrap();
        req.extensions_mut().insert(matched);
        let response = handler.call(req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_default_handlers_build_a_registry() {
        let table = default_handlers().unwrap();
        let registry = CommandRegistry::from_source(&table, AmbiguityPolicy::Reject).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.resolve("set").unwrap().handler, "conf");
        assert_eq!(registry.resolve("echo").unwrap().handler, "echo");
    }

    #[tokio::test]
    async fn test_conf_set_get_list() {
        let table = default_handlers().unwrap();

        let (status, json) = call(&table, "/service/conf/set", r#"{"command":"set","key":"mode","value":"fast"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["previous"], Value::Null);

        let (status, json) = call(&table, "/service/conf/get", r#"{"key":"mode"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], "fast");

        let (status, json) = call(&table, "/service/conf/list", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["entries"]["mode"], "fast");
    }

    #[tokio::test]
    async fn test_conf_errors() {
        let table = default_handlers().unwrap();

        let (status, _) = call(&table, "/service/conf/get", r#"{"key":"absent"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&table, "/service/conf/set", r#"{"key":"k"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&table, "/service/conf/get", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_echo_reflects_body() {
        let table = default_handlers().unwrap();
        let (status, json) = call(&table, "/echo", r#"{"command":"echo","msg":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["route"], "/echo");
        assert_eq!(json["body"]["msg"], "hi");

        let (_, json) = call(&table, "/echo", "plain text").await;
        assert_eq!(json["body"], "plain text");
    }

    #[tokio::test]
    async fn test_uploads() {
        let table = default_handlers().unwrap();
        let upload = || PortalBody::streaming(Full::new(Bytes::from(vec![b'x'; 4096])));

        let (status, json) = call_with(&table, "/echo", upload()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["body"]["upload_bytes"], 4096);

        let (status, _) = call_with(&table, "/service/conf/set", upload()).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
