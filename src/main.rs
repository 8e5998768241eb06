use std::sync::Arc;
use tracing::{error, info};

use crate::backend::HttpBackend;
use crate::config::{AppConfig, CONFIG_FILE};
use crate::frames::FrameStore;
use crate::session::{spawn_session_reaper, PlaybackSessions};
use crate::web::ConsoleState;

mod backend;
mod camera_form;
mod config;
mod frames;
mod player;
mod scheduler;
mod session;
mod telemetry;
mod web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    eprintln!("🚀 Starting Camwatch Console...");

    // Initialize telemetry
    telemetry::init_telemetry();

    // Load configuration
    let config = AppConfig::load_or_init(CONFIG_FILE)?;
    info!("⚙️ Configuration loaded: {:?}", config);

    eprintln!("🔧 Connecting backend client...");
    let backend = HttpBackend::new(&config.backend_url, config.request_timeout())?;
    info!("🔗 Camera server at {}", config.backend_url);

    let frames = FrameStore::new(&config.frames_dir);
    info!("🖼️ Serving event frames from {}", frames.root().display());

    let sessions = PlaybackSessions::new();
    let idle = config.session_idle_timeout();
    let _reaper = spawn_session_reaper(sessions.clone(), idle);
    info!("🧹 Idle playback sessions close after {:?}", idle);

    let state = ConsoleState {
        sessions,
        frames,
        backend: Arc::new(backend),
        config,
    };

    eprintln!("🔧 Starting console server...");
    let server = tokio::spawn(async move {
        if let Err(e) = web::start_console_server(state).await {
            error!("Console server failed: {}", e);
        }
    });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("❌ Console server task failed: {:?}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown requested");
        }
    }

    eprintln!("🛑 Console shutdown complete");
    info!("🛑 Console shutdown complete");
    Ok(())
}
