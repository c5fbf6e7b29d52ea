//! Read-only reference data used by the report builder UI.
//!
//! - `GET /api/v1/dbnames`: source databases a report query can target.
//! - `GET /api/v1/roles`: roles that can be granted column write access.

mod db_names;
mod roles;

use actix_web::web::{self, get};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/dbnames", get().to(db_names::process))
        .route("/roles", get().to(roles::process));
}
