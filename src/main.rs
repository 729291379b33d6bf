use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use dotenv::dotenv;
use mapchat_server::auth::handlers::{register, verify, resend, login, logout, me};
use mapchat_server::chat::handlers::{send, history as chat_history, clear_history};
use mapchat_server::ledger::handlers::{balance, history as credit_history, grant, list_users};
use mapchat_server::{health_check, AppError, AppState, Settings};
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> mapchat_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    // Initialize application state
    let state = AppState::new(config.clone())?;
    info!("Store snapshot at {}", state.store.snapshot_path().display());
    let state = web::Data::new(state);

    // Periodic maintenance: drop elapsed rate-limit windows and expired
    // verification codes
    let maintenance_state = state.clone();
    tokio::spawn(async move {
        loop {
            maintenance_state.rate_limiter.cleanup().await;
            let purged = maintenance_state.store.purge_expired_otps().await;
            if purged > 0 {
                info!("Purged {} expired verification codes", purged);
            }

            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    let workers = config.server.workers as usize;
    let environment = config.environment.clone();

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if environment == "production" {
            // Restrictive CORS for production use
            Cors::default()
                .allowed_origin("https://mapchat.app")
                .allowed_methods(vec!["GET", "POST", "DELETE"])
                .allowed_headers(vec!["Authorization", "Content-Type"])
                .supports_credentials()
                .max_age(3600)
        } else {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/verify", web::post().to(verify))
            .route("/auth/resend", web::post().to(resend))
            .route("/auth/login", web::post().to(login))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/me", web::get().to(me))
            .route("/credits", web::get().to(balance))
            .route("/credits/history", web::get().to(credit_history))
            .route("/admin/credits/grant", web::post().to(grant))
            .route("/admin/users", web::get().to(list_users))
            .route("/chat", web::post().to(send))
            .route("/chat/history", web::get().to(chat_history))
            .route("/chat/history", web::delete().to(clear_history))
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
