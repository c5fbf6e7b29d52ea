pub(crate) mod validate;

use actix_web::web::{self, post};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/validate-sql-query", post().to(validate::process));
}
