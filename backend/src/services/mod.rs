//! HTTP API of the reporting service.
//!
//! Every endpoint lives under `/api/v1`. Each sub-module registers its own
//! routes on the shared scope and keeps its handler (`process`) next to the
//! store or provider logic it drives.

pub mod access;
pub mod reference;
pub mod reports;
pub mod sql;

use actix_web::web::{self, scope};
use actix_web::{error, HttpResponse, Scope};
use log::warn;
use serde_json::json;

const API_PATH: &str = "/api/v1";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .configure(reference::configure_routes)
        .configure(access::configure_routes)
        .configure(reports::configure_routes)
        .configure(sql::configure_routes)
}

/// JSON extractor limits. Unparseable bodies become `400 {"error": "Invalid request body"}`.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(|err, _req| {
        warn!("Rejected request body: {}", err);
        let response = error_body(actix_web::http::StatusCode::BAD_REQUEST, "Invalid request body");
        error::InternalError::from_response(err, response).into()
    })
}

/// `{"error": message}` with the given status.
pub(crate) fn error_body(status: actix_web::http::StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": message.into() }))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::AppConfig;
    use crate::db;
    use std::collections::HashMap;
    use std::path::Path;

    /// Default configuration pointed at a migrated catalog inside `dir`.
    pub fn config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::from_kv(&HashMap::new()).unwrap();
        config.database_path = dir.join("catalog.sqlite");
        config.databases_dir = dir.join("databases");
        config.sheets.client_secret_path = dir.join("credentials.json");
        config.sheets.token_path = dir.join("token.json");
        std::fs::create_dir_all(&config.databases_dir).unwrap();
        let conn = db::open(&config.database_path).unwrap();
        db::migrate(&conn).unwrap();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::App;

    #[actix_web::test]
    async fn malformed_body_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(json_config(1024))
                .app_data(web::Data::new(testing::config(dir.path())))
                .service(configure_routes()),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/check-edit-permission")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid request body");
    }
}
