//! Handler registration table
//!
//! The server's own endpoint registry: handlers are registered explicitly, in
//! a fixed order, with the routes they serve. The command registry is derived
//! from this table; normal path routing reads it directly.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::portal::normalize::normalize;
use crate::portal::{HandlerDescriptor, HandlerSource, PortalBody, RegistryBuildError};

pub type HandlerResponse = Response<Full<Bytes>>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResponse> + Send>>;

/// An invocable endpoint
///
/// Uploads reach the handler as [`PortalBody::Streaming`]; everything else
/// is buffered.
pub trait CommandHandler: Send + Sync {
    fn call(&self, req: Request<PortalBody>) -> HandlerFuture;
}

/// Route that selected the handler, stored in the request extensions before
/// the handler is called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    pub handler: String,
    pub route: String,
    /// Set when the request came through the shared entry path
    pub command: Option<String>,
}

/// Adapter returned by [`handler_fn`]
pub struct HandlerFn<F>(F);

impl<F, Fut> CommandHandler for HandlerFn<F>
where
    F: Fn(Request<PortalBody>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResponse> + Send + 'static,
{
    fn call(&self, req: Request<PortalBody>) -> HandlerFuture {
        Box::pin((self.0)(req))
    }
}

/// Wrap an async closure as a [`CommandHandler`]
pub const fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<PortalBody>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResponse> + Send + 'static,
{
    HandlerFn(f)
}

struct Registered {
    descriptor: HandlerDescriptor,
    handler: Arc<dyn CommandHandler>,
}

#[derive(Default)]
pub struct HandlerTable {
    handlers: Vec<Registered>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Ids are unique.
    pub fn register<H>(
        &mut self,
        descriptor: HandlerDescriptor,
        handler: H,
    ) -> Result<(), RegistryBuildError>
    where
        H: CommandHandler + 'static,
    {
        if self.handlers.iter().any(|r| r.descriptor.id == descriptor.id) {
            return Err(RegistryBuildError::DuplicateHandler { id: descriptor.id });
        }
        self.handlers.push(Registered {
            descriptor,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .iter()
            .find(|r| r.descriptor.id == id)
            .map(|r| Arc::clone(&r.handler))
    }

    /// Normal routing: the handler whose declared route for `method` equals
    /// `path` (ASCII case-insensitive, trailing slash ignored)
    pub fn route_direct(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(MatchedRoute, Arc<dyn CommandHandler>)> {
        let path = normalize(path, "");
        self.handlers.iter().find_map(|r| {
            r.descriptor
                .keys_for(method)
                .find(|key| key.eq_ignore_ascii_case(&path))
                .map(|route| {
                    let matched = MatchedRoute {
                        handler: r.descriptor.id.clone(),
                        route,
                        command: None,
                    };
                    (matched, Arc::clone(&r.handler))
                })
        })
    }

    /// Methods declared for `path` by any handler, in declaration order
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let path = normalize(path, "");
        let mut methods: Vec<Method> = Vec::new();
        for r in &self.handlers {
            for decl in &r.descriptor.routes {
                let key = normalize(&r.descriptor.base_path, &decl.path);
                if key.eq_ignore_ascii_case(&path) && !methods.contains(&decl.method) {
                    methods.push(decl.method.clone());
                }
            }
        }
        methods
    }

}

impl HandlerSource for HandlerTable {
    fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.handlers.iter().map(|r| r.descriptor.clone()).collect()
    }
}
