use tracing_subscriber::EnvFilter;

use crater_relay::build_app;

fn arg<T: std::str::FromStr>(prefix: &str) -> Option<T> {
    std::env::args()
        .skip(1)
        .find_map(|a| a.strip_prefix(prefix).map(String::from))
        .and_then(|v| v.parse::<T>().ok())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = arg::<u16>("--port=").unwrap_or(8080);
    let max_rooms = arg::<usize>("--max-rooms=").unwrap_or(100);

    let (app, _state) = build_app(max_rooms);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };

    tracing::info!("Crater relay listening on {addr} (max rooms: {max_rooms})");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Relay server error");
        std::process::exit(1);
    }
}
