//! Request handler module
//!
//! Handler registration, the request pipeline, and the built-in services.

pub mod builtin;
pub mod router;
pub mod table;

// Re-export main entry point
pub use router::handle_request;
pub use table::HandlerTable;
