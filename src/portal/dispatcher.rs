//! Command dispatcher
//!
//! Per request: `Received -> Gated -> Extracted -> Resolved | declined`.
//! The dispatcher only decides; invoking the handler is the caller's job.

use hyper::Request;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::buffer::BufferedBody;
use super::envelope::CommandEnvelope;
use super::error::{Decline, RegistryBuildError};
use super::normalize::is_entry_path;
use super::registry::{AmbiguityPolicy, CommandRegistry, HandlerSource};

/// Successful dispatch decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub command: String,
    pub route: String,
    pub handler: String,
}

pub struct Dispatcher {
    entry_path: String,
    command_field: String,
    policy: AmbiguityPolicy,
    registry: RwLock<Arc<CommandRegistry>>,
}

impl Dispatcher {
    /// Build the registry from `source` up front.
    ///
    /// A build failure is returned to the caller; there is no dispatcher
    /// (and so no routable entry path) without a registry.
    pub fn new<S>(
        entry_path: impl Into<String>,
        command_field: impl Into<String>,
        policy: AmbiguityPolicy,
        source: &S,
    ) -> Result<Self, RegistryBuildError>
    where
        S: HandlerSource + ?Sized,
    {
        let registry = CommandRegistry::from_source(source, policy)?;
        Ok(Self {
            entry_path: entry_path.into(),
            command_field: command_field.into(),
            policy,
            registry: RwLock::new(Arc::new(registry)),
        })
    }

    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    /// Current registry snapshot
    pub async fn snapshot(&self) -> Arc<CommandRegistry> {
        Arc::clone(&*self.registry.read().await)
    }

    /// Rebuild from `source` and swap the new snapshot in.
    ///
    /// The new registry is built before the write lock is taken; on failure
    /// the current snapshot stays in place.
    pub async fn rebuild<S>(&self, source: &S) -> Result<usize, RegistryBuildError>
    where
        S: HandlerSource + ?Sized,
    {
        let registry = CommandRegistry::from_source(source, self.policy)?;
        let count = registry.len();
        *self.registry.write().await = Arc::new(registry);
        Ok(count)
    }

    /// Decide which handler should process a buffered request
    pub async fn dispatch(&self, req: &Request<BufferedBody>) -> Result<Resolved, Decline> {
        if !is_entry_path(req.uri().path(), &self.entry_path) {
            return Err(Decline::NotEntryPath);
        }

        let envelope = CommandEnvelope::from_body(req.body(), &self.command_field)?;

        let registry = self.snapshot().await;
        registry.resolve(&envelope.command).map_or_else(
            || {
                Err(Decline::NoMatch {
                    command: envelope.command.clone(),
                })
            },
            |entry| {
                Ok(Resolved {
                    command: envelope.command.clone(),
                    route: entry.route.clone(),
                    handler: entry.handler.clone(),
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::error::MalformedCommandError;
    use crate::portal::registry::HandlerDescriptor;

    fn descriptors() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::new("conf", "/service/conf")
                .post("list")
                .post("get"),
            HandlerDescriptor::new("users", "/service/users")
                .post("create")
                .post("delete"),
            HandlerDescriptor::new("echo", "/echo").post("/"),
        ]
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new("/portal", "command", AmbiguityPolicy::Reject, descriptors().as_slice())
            .unwrap()
    }

    fn portal(path: &str, body: &str) -> Request<BufferedBody> {
        Request::builder()
            .method("POST")
            .uri(path)
            .body(BufferedBody::new(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_suffix_command_resolves() {
        let resolved = dispatcher()
            .dispatch(&portal("/portal", r#"{"command":"list"}"#))
            .await
            .unwrap();
        assert_eq!(resolved.handler, "conf");
        assert_eq!(resolved.route, "/service/conf/list");
        assert_eq!(resolved.command, "list");
    }

    #[tokio::test]
    async fn test_full_command_resolves() {
        let resolved = dispatcher()
            .dispatch(&portal("/portal", r#"{"command":"Service/Conf/List","x":1}"#))
            .await
            .unwrap();
        assert_eq!(resolved.handler, "conf");
    }

    #[tokio::test]
    async fn test_dispatch_leaves_body_readable() {
        let req = portal("/portal", r#"{"command":"echo","msg":"hi"}"#);
        let d = dispatcher();
        assert_eq!(d.dispatch(&req).await.unwrap().handler, "echo");
        assert_eq!(d.dispatch(&req).await.unwrap().handler, "echo");
        assert_eq!(req.body().as_bytes(), br#"{"command":"echo","msg":"hi"}"#);
    }

    #[tokio::test]
    async fn test_padded_command_is_not_trimmed() {
        let err = dispatcher()
            .dispatch(&portal("/portal", r#"{"command":" list "}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Decline::NoMatch { ref command } if command == " list "));
    }

    #[tokio::test]
    async fn test_entry_path_case_insensitive() {
        let resolved = dispatcher()
            .dispatch(&portal("/Portal/", r#"{"command":"list"}"#))
            .await
            .unwrap();
        assert_eq!(resolved.handler, "conf");
    }

    #[tokio::test]
    async fn test_unknown_command_declines() {
        let err = dispatcher()
            .dispatch(&portal("/portal", r#"{"command":"unknown-op"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Decline::NoMatch { ref command } if command == "unknown-op"));
    }

    #[tokio::test]
    async fn test_malformed_body_declines() {
        let err = dispatcher()
            .dispatch(&portal("/portal", r#"{"command":"#))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Decline::Malformed(MalformedCommandError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_other_path_declines() {
        let err = dispatcher()
            .dispatch(&portal("/service/conf/list", r#"{"command":"list"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Decline::NotEntryPath));
    }

    #[test]
    fn test_build_failure_is_fatal() {
        let mut clashing = descriptors();
        clashing.push(HandlerDescriptor::new("legacy", "/old/conf").post("list"));
        let result = Dispatcher::new(
            "/portal",
            "command",
            AmbiguityPolicy::Reject,
            clashing.as_slice(),
        );
        assert!(matches!(
            result,
            Err(RegistryBuildError::AmbiguousCommand { .. })
        ));
    }

    #[tokio::test]
    async fn test_rebuild_swaps_snapshot() {
        let d = dispatcher();
        let before = d.snapshot().await;

        let mut more = descriptors();
        more.push(HandlerDescriptor::new("audit", "/service/audit").post("query"));
        assert_eq!(d.rebuild(more.as_slice()).await.unwrap(), 6);

        let resolved = d
            .dispatch(&portal("/portal", r#"{"command":"query"}"#))
            .await
            .unwrap();
        assert_eq!(resolved.handler, "audit");
        // readers holding the old snapshot keep a complete registry
        assert_eq!(before.len(), 5);
        assert!(before.resolve("query").is_none());
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_current_snapshot() {
        let d = dispatcher();
        let mut clashing = descriptors();
        clashing.push(HandlerDescriptor::new("dup", "/service/conf").post("list"));
        assert!(d.rebuild(clashing.as_slice()).await.is_err());
        assert_eq!(d.snapshot().await.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_is_independent() {
        let d = Arc::new(dispatcher());
        let cases = [
            ("list", "conf"),
            ("conf/get", "conf"),
            ("create", "users"),
            ("service/users/delete", "users"),
            ("echo", "echo"),
        ];

        let mut tasks = Vec::new();
        for i in 0..200 {
            let worker = Arc::clone(&d);
            let (command, handler) = cases[i % cases.len()];
            tasks.push(tokio::spawn(async move {
                let req = portal("/portal", &format!(r#"{{"command":"{command}","n":{i}}}"#));
                let resolved = worker.dispatch(&req).await.unwrap();
                assert_eq!(resolved.handler, handler);
                assert_eq!(resolved.command, command);
            }));
            if i % 50 == 0 {
                let rebuilder = Arc::clone(&d);
                tasks.push(tokio::spawn(async move {
                    rebuilder.rebuild(descriptors().as_slice()).await.unwrap();
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
