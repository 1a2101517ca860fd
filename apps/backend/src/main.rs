use actix_web::{web, App, HttpServer};
use dealuxe_backend::health;
use dealuxe_backend::state::AppState;
use dealuxe_backend::telemetry;
use dealuxe_backend::ws::session as ws_session;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let host = std::env::var("DEALUXE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("DEALUXE_PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            eprintln!("DEALUXE_PORT must be a valid port number");
            std::process::exit(1);
        });

    tracing::info!(host = %host, port, "starting dealuxe backend");

    let data = web::Data::new(AppState::from_env());

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/ws", web::get().to(ws_session::upgrade))
            .configure(health::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
