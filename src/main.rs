use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::info;

use aurasense_backend::config::Settings;
use aurasense_backend::handlers::AppState;
use aurasense_backend::logger::setup_logger;
use aurasense_backend::{build_analyzer, cors, routes};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load settings")?;
    setup_logger(&settings.logger.level);

    let analyzer = build_analyzer(&settings.model).context("Failed to initialize emotion analyzer")?;
    let state = web::Data::new(AppState {
        analyzer,
        max_upload_bytes: settings.server.max_upload_bytes,
    });

    info!("Server running at {}", settings.server);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((settings.server.host.as_str(), settings.server.port))
        .with_context(|| format!("Failed to bind {}", settings.server))?
        .run()
        .await
        .context("Server terminated unexpectedly")
}
