mod config;
mod db;
mod services;
mod sheets;

use crate::config::AppConfig;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::load().map_err(std::io::Error::other)?;
    {
        let conn = db::open(&config.database_path).map_err(std::io::Error::other)?;
        db::migrate(&conn).map_err(std::io::Error::other)?;
    }
    info!("Catalog ready at {}", config.database_path.display());

    let bind_addr = config.bind_addr;
    let json_limit = config.json_limit_bytes;
    let config = web::Data::new(config);

    info!("Server running at http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(services::json_config(json_limit))
            .app_data(config.clone())
            .service(services::configure_routes())
    })
    .bind(bind_addr)?
    .run()
    .await
}
