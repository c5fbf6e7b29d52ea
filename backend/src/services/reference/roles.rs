use crate::config::AppConfig;
use crate::db;
use crate::services::error_body;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use common::model::role::RoleMeta;
use common::responses::RolesResponse;
use log::error;
use rusqlite::Connection;

pub(crate) async fn process(config: web::Data<AppConfig>) -> impl Responder {
    let result = tokio::task::spawn_blocking(move || -> rusqlite::Result<_> {
        let conn = db::open(&config.database_path)?;
        get_roles(&conn)
    })
    .await;

    match result {
        Ok(Ok(roles)) => HttpResponse::Ok().json(RolesResponse { roles }),
        Ok(Err(e)) => {
            error!("Listing roles failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("Task join error: {}", e)),
    }
}

pub fn get_roles(conn: &Connection) -> rusqlite::Result<Vec<RoleMeta>> {
    let mut stmt = conn.prepare("SELECT id, name FROM role ORDER BY name")?;
    let roles = stmt
        .query_map([], |row| {
            Ok(RoleMeta {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roles)
}
