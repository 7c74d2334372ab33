//! Hosting server
//!
//! Binds the listener, installs signal handlers and runs the accept loop

pub mod connection;
pub mod listener;
pub mod signal;

// Rust does not allow `loop` as a module name (keyword), so use server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::sync::Arc;
use tokio::sync::Notify;

pub use listener::bind_listener;
pub use server_loop::start_server_loop;

use crate::config::{AppState, Config};
use crate::logger;

/// Run the image server until SIGINT/SIGTERM
pub async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.get_socket_addr()?;
    let state = Arc::new(AppState::new(config)?);
    let listener = bind_listener(addr)?;

    logger::log_server_start(&listener.local_addr()?, config, &state.images_dir);
    if !state.images_dir.is_dir() {
        logger::log_warning(&format!(
            "Images directory {} does not exist; every lookup will return 404",
            state.images_dir.display()
        ));
    }

    let shutdown = Arc::new(Notify::new());
    signal::start_signal_handler(Arc::clone(&shutdown));

    start_server_loop(listener, state, shutdown).await;
    logger::log_info("Server stopped");
    Ok(())
}
