#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use netpulse_service::database::{DatabaseImpl, Store};
use tracing::info;

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_PATH: &str = "network_monitor.db";

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let addr: SocketAddr = env::var("NETPULSE_BIND")
        .unwrap_or_else(|_| DEFAULT_BIND.to_string())
        .parse()?;
    let database_path =
        env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

    info!("Opening database {}", database_path);
    let store: Arc<dyn Store> = Arc::new(DatabaseImpl::open(&database_path).await?);

    run_server(addr, store).await
}

async fn run_server(addr: SocketAddr, store: Arc<dyn Store>) -> Result<(), AppError> {
    let store = web::Data::from(store);

    info!("Status API listening on {}", addr);
    HttpServer::new(move || App::new().app_data(store.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
