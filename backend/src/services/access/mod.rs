//! Column edit checks.
//!
//! `POST /api/v1/check-edit-permission` is called by the edit guard bound to
//! every report spreadsheet. A missing grant is a normal `403`, never an error.

mod check;

use actix_web::web::{self, post};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/check-edit-permission", post().to(check::process));
}
