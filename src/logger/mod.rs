//! Logger module
//!
//! Provides logging utilities for the portal server including:
//! - Server lifecycle and registry logging
//! - Access logging with multiple formats
//! - Dispatch decisions (debug level)
//! - Error and warning logging, optionally to files

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::portal::{BodyReadError, CommandRegistry, Decline, RegistryBuildError, Resolved};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    DEBUG_ENABLED.store(config.logging.is_debug(), Ordering::Relaxed);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Reopen log files in place (log rotation)
pub fn reopen(config: &Config) -> std::io::Result<()> {
    writer::get().map_or(Ok(()), |w| {
        w.reopen(
            config.logging.access_log_file.as_deref(),
            config.logging.error_log_file.as_deref(),
        )
    })
}

fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Portal server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "Entry path: POST {} (command field '{}')",
        config.portal.entry_path, config.portal.command_field
    ));
    write_info(&format!("Max body size: {} bytes", config.portal.max_body_size));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_registry(registry: &CommandRegistry) {
    if registry.is_empty() {
        log_warning("[REGISTRY] No command routes registered; every portal request will fall through");
        return;
    }
    write_info(&format!(
        "[REGISTRY] {} routable command route(s)",
        registry.len()
    ));
    for entry in registry.entries() {
        write_info(&format!("[REGISTRY]   {} -> {}", entry.route, entry.handler));
    }
}

pub fn log_registry_failed(err: &RegistryBuildError) {
    log_error(&format!("[REGISTRY] {err}"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_debug(message: &str) {
    if DEBUG_ENABLED.load(Ordering::Relaxed) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_dispatch_resolved(resolved: &Resolved) {
    log_debug(&format!(
        "[DISPATCH] '{}' -> {} ({})",
        resolved.command, resolved.handler, resolved.route
    ));
}

pub fn log_dispatch_declined(decline: &Decline) {
    log_debug(&format!("[DISPATCH] declined: {decline}"));
}

pub fn log_body_rejected(path: &str, err: &BodyReadError) {
    log_warning(&format!("Rejected request to {path}: {err}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    match writer::get() {
        Some(w) => w.write_access(&entry.format(format)),
        None => println!("{}", entry.format(format)),
    }
}

pub fn log_shutdown_requested(active: usize) {
    write_info(&format!(
        "\n[SHUTDOWN] Stopped accepting connections, {active} still active"
    ));
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        write_info("[SHUTDOWN] All connections closed");
    } else {
        log_warning(&format!(
            "[SHUTDOWN] Grace period elapsed with {remaining} connection(s) still open"
        ));
    }
}
