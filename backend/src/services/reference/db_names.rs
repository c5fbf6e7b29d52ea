use crate::config::AppConfig;
use crate::db;
use crate::services::error_body;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use common::responses::DbNamesResponse;
use log::error;
use rusqlite::Connection;

pub(crate) async fn process(config: web::Data<AppConfig>) -> impl Responder {
    let result = tokio::task::spawn_blocking(move || -> rusqlite::Result<_> {
        let conn = db::open(&config.database_path)?;
        get_db_names(&conn)
    })
    .await;

    match result {
        Ok(Ok(db_name)) => HttpResponse::Ok().json(DbNamesResponse {
            count: db_name.len(),
            db_name,
        }),
        Ok(Err(e)) => {
            error!("Listing database names failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("Task join error: {}", e)),
    }
}

pub fn get_db_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT database_name FROM source_databases ORDER BY database_name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::catalog;
    use actix_web::test as actix_test;
    use actix_web::App;

    #[test]
    fn lists_registered_databases() {
        let conn = catalog();
        conn.execute_batch(
            "INSERT INTO source_databases (database_name) VALUES ('sales'), ('analytics');",
        )
        .unwrap();
        assert_eq!(get_db_names(&conn).unwrap(), vec!["analytics", "sales"]);
    }

    #[actix_web::test]
    async fn empty_catalog_returns_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::services::testing::config(dir.path());

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .service(crate::services::configure_routes()),
        )
        .await;
        let req = actix_test::TestRequest::get().uri("/api/v1/dbnames").to_request();
        let resp: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["count"], 0);
        assert_eq!(resp["db_name"], serde_json::json!([]));
    }
}
