use tracing::info;
use tracing_subscriber::EnvFilter;

/// Console log filter used when `RUST_LOG` is not set. Request logging from
/// the HTTP trace layer stays at debug so page polling does not flood `info`.
const DEFAULT_FILTER: &str = "info,camwatch_console=debug,tower_http=info";

pub fn init_telemetry() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let directives = filter.to_string();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();

    info!("📊 Console logging ready (filter: {})", directives);
}
