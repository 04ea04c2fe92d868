//! Command registry
//!
//! Maps command strings onto the POST routes declared by registered handlers.
//! A command matches a route when, compared case-insensitively, it equals the
//! normalized route or the route ends with `"/" + command`. The registry is
//! built once from a snapshot of handler descriptors and never mutated.

use hyper::Method;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::error::RegistryBuildError;
use super::normalize::{normalize, segment_suffixes, validate_key};

/// One route declared by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecl {
    pub method: Method,
    pub path: String,
}

/// Read-only description of a registered handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub id: String,
    pub base_path: String,
    pub routes: Vec<RouteDecl>,
}

impl HandlerDescriptor {
    pub fn new(id: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_path: base_path.into(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn route(mut self, method: Method, path: impl Into<String>) -> Self {
        self.routes.push(RouteDecl {
            method,
            path: path.into(),
        });
        self
    }

    #[must_use]
    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    /// Normalized keys of every route declared for `method`
    pub fn keys_for<'a>(&'a self, method: &'a Method) -> impl Iterator<Item = String> + 'a {
        self.routes
            .iter()
            .filter(move |r| r.method == *method)
            .map(move |r| normalize(&self.base_path, &r.path))
    }
}

/// Anything that can enumerate the handlers currently registered, in a
/// stable order
pub trait HandlerSource {
    fn descriptors(&self) -> Vec<HandlerDescriptor>;
}

impl HandlerSource for [HandlerDescriptor] {
    fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.to_vec()
    }
}

/// What to do when one command could reach more than one route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Fail the build
    #[default]
    Reject,
    /// Earliest route in registration order wins
    FirstMatch,
}

/// A routable (normalized route, handler) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub route: String,
    pub handler: String,
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<RegistryEntry>,
    /// ASCII-lowercased route or segment suffix -> earliest entry it reaches
    lookup: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Build from descriptors in the given order (handler order, then
    /// route declaration order). Only POST routes are routable.
    pub fn build(
        descriptors: &[HandlerDescriptor],
        policy: AmbiguityPolicy,
    ) -> Result<Self, RegistryBuildError> {
        let mut registry = Self::default();

        for descriptor in descriptors {
            for route in descriptor.keys_for(&Method::POST) {
                validate_key(&route).map_err(|reason| RegistryBuildError::InvalidRoute {
                    handler: descriptor.id.clone(),
                    route: route.clone(),
                    reason,
                })?;
                registry.insert(route, &descriptor.id, policy)?;
            }
        }

        Ok(registry)
    }

    pub fn from_source<S>(source: &S, policy: AmbiguityPolicy) -> Result<Self, RegistryBuildError>
    where
        S: HandlerSource + ?Sized,
    {
        Self::build(&source.descriptors(), policy)
    }

    fn insert(
        &mut self,
        route: String,
        handler: &str,
        policy: AmbiguityPolicy,
    ) -> Result<(), RegistryBuildError> {
        let lowered = route.to_ascii_lowercase();
        let idx = self.entries.len();

        // full keys start with '/' and suffixes never do, so they cannot collide
        if let Some(&existing) = self.lookup.get(&lowered) {
            return Err(RegistryBuildError::DuplicateRoute {
                route,
                first: self.entries[existing].handler.clone(),
                second: handler.to_string(),
            });
        }

        for suffix in segment_suffixes(&lowered) {
            match self.lookup.entry(suffix.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(idx);
                }
                Entry::Occupied(slot) => {
                    if policy == AmbiguityPolicy::Reject {
                        return Err(RegistryBuildError::AmbiguousCommand {
                            command: suffix.to_string(),
                            first: self.entries[*slot.get()].route.clone(),
                            second: route,
                        });
                    }
                }
            }
        }

        self.lookup.insert(lowered, idx);
        self.entries.push(RegistryEntry {
            route,
            handler: handler.to_string(),
        });
        Ok(())
    }

    /// Earliest entry whose route matches `command`
    pub fn resolve(&self, command: &str) -> Option<&RegistryEntry> {
        self.lookup
            .get(&command.to_ascii_lowercase())
            .and_then(|&idx| self.entries.get(idx))
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
