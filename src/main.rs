use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use std::thread;
use std::time::Duration;

mod config;
mod credential_store;
mod error;
mod message_log;
mod routes;
mod session;

use config::Config;
use credential_store::CredentialStore;
use message_log::MessageLog;
use routes::{load_templates, AppState};
use session::SessionManager;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            ::std::process::exit(1);
        }
    };

    let tera = match load_templates(&config.templates_dir) {
        Ok(t) => t,
        Err(e) => {
            error!("Parsing error: {}", e);
            ::std::process::exit(1);
        }
    };

    let credentials = match CredentialStore::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Could not open {}: {}", config.database_path.display(), e);
            ::std::process::exit(1);
        }
    };

    let app_data = web::Data::new(AppState {
        tera,
        messages: MessageLog::new(),
        sessions: SessionManager::new(config.session_ttl),
        credentials,
        static_dir: config.static_dir.clone(),
    });

    // Session GC thread
    let app_data_clone = app_data.clone();
    thread::spawn(move || loop {
        let dropped = app_data_clone.sessions.purge_expired();
        if dropped > 0 {
            info!("Dropping {} expired sessions", dropped);
        }
        thread::sleep(SESSION_SWEEP_INTERVAL);
    });

    let address = config.address();
    info!("Binding to {address}");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_data.clone())
            .configure(routes::configure)
    })
    .bind(&address)?
    .disable_signals()
    .run();

    info!("Server is running on port {}", config.port);

    use futures::executor::block_on;
    let handle = server.handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down");
        block_on(handle.stop(true));
    }) {
        warn!("Could not set up Ctrl+C handler: {}", e);
    }

    server.await
}
