//! Shared entry path multiplexing
//!
//! Every multiplexed operation arrives as `POST {entry_path}` with a JSON
//! envelope naming a command. [`RequestBuffer`] captures the body so it can be
//! read repeatedly, and [`Dispatcher`] resolves the command to one of the
//! handlers registered with the server.

pub mod buffer;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod normalize;
pub mod registry;

pub use buffer::{BufferedBody, Captured, PortalBody, RequestBuffer};
pub use dispatcher::{Dispatcher, Resolved};
pub use error::{BodyReadError, Decline, RegistryBuildError};
pub use registry::{AmbiguityPolicy, CommandRegistry, HandlerDescriptor, HandlerSource};
