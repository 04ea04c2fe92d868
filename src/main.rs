use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod portal;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config path without extension; `config` picks up config.toml
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    // The registry is built before the listener opens; a failed build is fatal
    let handlers = handler::builtin::default_handlers()?;
    let state = match config::AppState::new(cfg, handlers) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            logger::log_registry_failed(&e);
            return Err(e.into());
        }
    };
    let registry = state.dispatcher.snapshot().await;
    logger::log_registry(&registry);

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    server::signal::start_signal_handler(Arc::clone(&state));

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            Arc::new(AtomicUsize::new(0)),
        ))
        .await;

    Ok(())
}
