use tokio::net::TcpListener;

use chatrelay::config::Config;
use chatrelay::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let state = AppState::from_config(&config);
    let app = chatrelay::routes::router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .expect("failed to bind");

    let actual = listener.local_addr().expect("failed to get local address");
    eprintln!("  \x1b[32m→ listening on {actual}\x1b[0m");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mchatrelay\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mredirect\x1b[0m     {}", config.oauth.redirect_url);
    eprintln!("  \x1b[2mscopes\x1b[0m       {}", config.oauth.scopes.join(" "));
    eprintln!("  \x1b[2mchat\x1b[0m         {}", config.chat_url);

    if !config.cookie.secure {
        eprintln!();
        eprintln!("  \x1b[33m! session cookies are not marked Secure\x1b[0m");
    }

    eprintln!();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
