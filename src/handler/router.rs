//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Requests to the shared entry path
//! are buffered and dispatched by command; everything else, and every
//! request the dispatcher declines, goes through normal path routing against
//! the handler table. Multipart uploads are never buffered: they reach the
//! handler as the original stream, without the body size cap.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::table::MatchedRoute;
use crate::config::{AppState, HealthConfig};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::portal::buffer::{is_multipart, read_limited};
use crate::portal::normalize::is_entry_path;
use crate::portal::{BodyReadError, BufferedBody, Captured, Decline, PortalBody};

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::from_request(&req, peer_addr);

    let response = route_request(req, &state, &mut entry).await;

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route_request<B>(
    req: Request<B>,
    state: &AppState,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let portal = &state.config.portal;

    // 1. Health probes
    if let Some(resp) = check_health(req.method(), &path, &state.config.health) {
        return resp;
    }

    // 2. Registry listing
    if portal.expose_commands
        && req.method() == Method::GET
        && path.eq_ignore_ascii_case(&portal.commands_path())
    {
        return list_commands(state).await;
    }

    // 3. Declared body size (uploads are not capped)
    if !is_multipart(&req) {
        if let Some(resp) = check_body_size(&req, state.buffer.max_body_size()) {
            return resp;
        }
    }

    // 4. Shared entry path
    if is_entry_path(&path, state.dispatcher.entry_path()) {
        if req.method() != Method::POST {
            logger::log_warning(&format!(
                "Method not allowed on entry path: {}",
                req.method()
            ));
            return http::build_405_response("POST");
        }
        return match state.buffer.capture(req).await {
            Ok(Captured::Buffered(req)) => dispatch_command(req, state, entry).await,
            Ok(Captured::Passthrough(req)) => route_direct(req, state, entry).await,
            Err(err) => {
                logger::log_body_rejected(&path, &err);
                body_error_response(&err)
            }
        };
    }

    // 5. Normal routing
    route_direct(req, state, entry).await
}

/// Resolve the command carried by a buffered entry-path request and invoke
/// its handler
async fn dispatch_command(
    mut req: Request<BufferedBody>,
    state: &AppState,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>> {
    let resolved = match state.dispatcher.dispatch(&req).await {
        Ok(resolved) => resolved,
        Err(decline) => {
            logger::log_dispatch_declined(&decline);
            return match decline {
                Decline::Malformed(err) => http::build_400_response(&err.to_string()),
                Decline::NoMatch { command } => {
                    let miss = format!("no handler route matches command '{command}'");
                    entry.command = Some(command);
                    route_buffered(req, state, entry, &miss).await
                }
                Decline::NotEntryPath => {
                    let miss = format!("no route for {}", req.uri().path());
                    route_buffered(req, state, entry, &miss).await
                }
            };
        }
    };

    logger::log_dispatch_resolved(&resolved);
    entry.command = Some(resolved.command.clone());
    entry.handler = Some(resolved.handler.clone());

    let Some(handler) = state.handlers.get(&resolved.handler) else {
        logger::log_error(&format!(
            "Registry resolved '{}' to unregistered handler '{}'",
            resolved.command, resolved.handler
        ));
        return http::build_500_response("resolved handler is not registered");
    };

    req.extensions_mut().insert(MatchedRoute {
        handler: resolved.handler,
        route: resolved.route,
        command: Some(resolved.command),
    });
    handler.call(req.map(PortalBody::Buffered)).await
}

/// Normal routing for a request whose body has not been read yet.
///
/// Multipart bodies are handed over as the original stream; anything else is
/// collected under the body size limit first.
async fn route_direct<B>(
    req: Request<B>,
    state: &AppState,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let Some((matched, handler)) = state.handlers.route_direct(req.method(), &path) else {
        return no_route(state, &path, &format!("no route for {path}"));
    };

    let upload = is_multipart(&req);
    let (parts, body) = req.into_parts();
    let body = if upload {
        PortalBody::streaming(body)
    } else {
        match read_limited(body, state.buffer.max_body_size()).await {
            Ok(bytes) => PortalBody::Buffered(BufferedBody::new(bytes)),
            Err(err) => {
                logger::log_body_rejected(&path, &err);
                return body_error_response(&err);
            }
        }
    };

    let mut req = Request::from_parts(parts, body);
    entry.handler = Some(matched.handler.clone());
    req.extensions_mut().insert(matched);
    handler.call(req).await
}

/// Normal routing for an already buffered request
async fn route_buffered(
    mut req: Request<BufferedBody>,
    state: &AppState,
    entry: &mut AccessLogEntry,
    miss: &str,
) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let Some((matched, handler)) = state.handlers.route_direct(req.method(), &path) else {
        return no_route(state, &path, miss);
    };

    entry.handler = Some(matched.handler.clone());
    req.extensions_mut().insert(matched);
    handler.call(req.map(PortalBody::Buffered)).await
}

/// 405 when the path exists under another method, 404 otherwise
fn no_route(state: &AppState, path: &str, message: &str) -> Response<Full<Bytes>> {
    let allowed = state.handlers.allowed_methods(path);
    if allowed.is_empty() {
        return http::build_404_response(message);
    }
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    http::build_405_response(&allow)
}

fn body_error_response(err: &BodyReadError) -> Response<Full<Bytes>> {
    match err {
        BodyReadError::TooLarge { limit } => http::build_413_response(*limit),
        BodyReadError::Stream(_) => http::build_400_response("failed to read request body"),
    }
}

/// Liveness/readiness probes
fn check_health(
    method: &Method,
    path: &str,
    health: &HealthConfig,
) -> Option<Response<Full<Bytes>>> {
    if !health.enabled || (method != Method::GET && method != Method::HEAD) {
        return None;
    }
    // the registry is built before the listener opens, so ready == live
    if path == health.liveness_path || path == health.readiness_path {
        return Some(http::build_health_response("ok"));
    }
    None
}

/// Serve the current command registry as JSON
async fn list_commands(state: &AppState) -> Response<Full<Bytes>> {
    let registry = state.dispatcher.snapshot().await;
    http::json_response(
        hyper::StatusCode::OK,
        &serde_json::json!({
            "entry_path": state.dispatcher.entry_path(),
            "command_field": state.config.portal.command_field,
            "commands": registry.entries(),
        }),
    )
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: usize) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    let limit = u64::try_from(max_body_size).unwrap_or(u64::MAX);
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > limit => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(max_body_size))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
