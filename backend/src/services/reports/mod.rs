//! Report creation.
//!
//! `POST /api/v1/create-report` runs the caller's query, provisions a
//! spreadsheet for the result and records which roles may edit which columns.
//! The per-step logic lives in the sibling modules; [`provision`] sequences it.

mod create;
mod data;
mod permissions;
mod provision;
mod reconcile;
mod schema;
mod stages;

use actix_web::web::{self, post};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/create-report", post().to(create::process));
}
