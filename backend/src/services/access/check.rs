use crate::config::AppConfig;
use crate::db;
use crate::services::error_body;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use common::requests::AccessCheckRequest;
use log::{error, info};
use rusqlite::{params, Connection};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("malformed columns_permissions for role {role_id}: {source}")]
    MalformedPermissions {
        role_id: String,
        #[source]
        source: serde_json::Error,
    },
}

const PERMISSIONS_FOR_PRINCIPAL: &str = r#"
    SELECT sp.role_id, sp.columns_permissions
    FROM "user" u
    JOIN role r ON u.role_id = r.id
    JOIN spreadsheetpermissions sp ON sp.role_id = r.id
    JOIN spreadsheet s ON s.id = sp.spreadsheet_id
    WHERE u.email = ?1
      AND s.id = ?2
"#;

pub(crate) async fn process(
    config: web::Data<AppConfig>,
    payload: web::Json<AccessCheckRequest>,
) -> impl Responder {
    let req = payload.into_inner();
    if req.email.trim().is_empty() || req.sheet_id.trim().is_empty() || req.column_name.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Invalid request body");
    }

    let result = tokio::task::spawn_blocking(move || -> Result<bool, AccessError> {
        let conn = db::open(&config.database_path)?;
        check_access(&conn, &req.email, &req.sheet_id, &req.column_name)
    })
    .await;

    match result {
        Ok(Ok(true)) => HttpResponse::Ok().json(json!({ "message": "Access granted" })),
        Ok(Ok(false)) => HttpResponse::Forbidden().json(json!({ "message": "Access denied" })),
        Ok(Err(e)) => {
            error!("Access check failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("Task join error: {}", e)),
    }
}

/// Whether `email` may write `column_name` on report `report_id`.
///
/// The principal is resolved to its role through the store; any permission row
/// of that role on the report listing the column grants access. Missing user,
/// role, report or grant all answer `false`.
pub fn check_access(
    conn: &Connection,
    email: &str,
    report_id: &str,
    column_name: &str,
) -> Result<bool, AccessError> {
    let mut stmt = conn.prepare(PERMISSIONS_FOR_PRINCIPAL)?;
    let mut rows = stmt.query(params![email, report_id])?;

    while let Some(row) = rows.next()? {
        let role_id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let columns: Vec<String> = serde_json::from_str(&raw)
            .map_err(|source| AccessError::MalformedPermissions { role_id, source })?;
        if columns.iter().any(|c| c == column_name) {
            return Ok(true);
        }
    }

    info!("Denied edit of '{}' on {} for {}", column_name, report_id, email);
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{add_report, add_role, add_user, catalog};
    use actix_web::test as actix_test;
    use actix_web::App;

    fn grant(conn: &Connection, report_id: &str, role_id: &str, columns: &str) {
        conn.execute(
            "INSERT INTO spreadsheetpermissions (id, spreadsheet_id, role_id, columns_permissions) \
             VALUES (?1, ?2, ?3, ?4)",
            params![uuid::Uuid::new_v4().to_string(), report_id, role_id, columns],
        )
        .unwrap();
    }

    fn seeded() -> Connection {
        let conn = catalog();
        add_role(&conn, "role-A", "Analyst");
        add_role(&conn, "role-B", "Reviewer");
        add_report(&conn, "sheet-1", "Sales");
        grant(&conn, "sheet-1", "role-A", r#"["revenue"]"#);
        add_user(&conn, "ana@example.com", Some("role-A"));
        conn
    }

    #[test]
    fn grants_listed_column() {
        let conn = seeded();
        assert!(check_access(&conn, "ana@example.com", "sheet-1", "revenue").unwrap());
    }

    #[test]
    fn principal_without_role_is_denied() {
        let conn = seeded();
        add_user(&conn, "norole@example.com", None);
        assert!(!check_access(&conn, "norole@example.com", "sheet-1", "revenue").unwrap());
        assert!(!check_access(&conn, "ghost@example.com", "sheet-1", "revenue").unwrap());
    }

    #[test]
    fn role_without_permission_record_is_denied() {
        let conn = seeded();
        add_user(&conn, "rita@example.com", Some("role-B"));
        assert!(!check_access(&conn, "rita@example.com", "sheet-1", "revenue").unwrap());
    }

    #[test]
    fn column_outside_record_is_denied() {
        let conn = seeded();
        assert!(!check_access(&conn, "ana@example.com", "sheet-1", "notes").unwrap());
        assert!(!check_access(&conn, "ana@example.com", "sheet-2", "revenue").unwrap());
    }

    #[test]
    fn any_duplicate_record_can_grant() {
        let conn = seeded();
        grant(&conn, "sheet-1", "role-A", r#"["notes"]"#);
        assert!(check_access(&conn, "ana@example.com", "sheet-1", "notes").unwrap());
        assert!(check_access(&conn, "ana@example.com", "sheet-1", "revenue").unwrap());
    }

    #[test]
    fn malformed_stored_permissions_are_an_error() {
        let conn = catalog();
        add_role(&conn, "role-A", "Analyst");
        add_report(&conn, "sheet-1", "Sales");
        grant(&conn, "sheet-1", "role-A", "revenue,notes");
        add_user(&conn, "ana@example.com", Some("role-A"));

        let err = check_access(&conn, "ana@example.com", "sheet-1", "revenue").unwrap_err();
        assert!(matches!(err, AccessError::MalformedPermissions { .. }));
    }

    async fn post(config: AppConfig, body: serde_json::Value) -> StatusCode {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .service(crate::services::configure_routes()),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/check-edit-permission")
            .set_json(body)
            .to_request();
        actix_test::call_service(&app, req).await.status()
    }

    #[actix_web::test]
    async fn http_status_follows_decision() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::services::testing::config(dir.path());
        {
            let conn = db::open(&config.database_path).unwrap();
            add_role(&conn, "role-A", "Analyst");
            add_report(&conn, "sheet-1", "Sales");
            grant(&conn, "sheet-1", "role-A", r#"["revenue"]"#);
            add_user(&conn, "ana@example.com", Some("role-A"));
        }

        let granted = json!({"email": "ana@example.com", "sheet_id": "sheet-1", "column_name": "revenue"});
        let denied = json!({"email": "ana@example.com", "sheet_id": "sheet-1", "column_name": "notes"});
        let blank = json!({"email": "", "sheet_id": "sheet-1", "column_name": "notes"});

        assert_eq!(post(config.clone(), granted).await, StatusCode::OK);
        assert_eq!(post(config.clone(), denied).await, StatusCode::FORBIDDEN);
        assert_eq!(post(config, blank).await, StatusCode::BAD_REQUEST);
    }
}
