#[macro_use]
extern crate lazy_static;

use actix_web::web::ServiceConfig;
use sqlx::SqlitePool;
use tera::Tera;

pub mod db;
pub mod errors;
pub mod routes;
pub mod rules;
pub mod structs;
pub mod utils;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    /// Quantity at or below which an item counts as low stock. Read once
    /// from configuration at startup; handlers never consult globals.
    pub low_stock_threshold: i64,
}

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = match Tera::new("templates/**/*") {
            Ok(t) => t,
            Err(e) => {
                log::error!("Parsing error(s): {}", e);
                ::std::process::exit(1);
            }
        };
        tera.autoescape_on(vec![".html", ".sql"]);
        tera
    };
}

/// Route table shared by the server binary and the black-box tests.
pub fn config_app(cfg: &mut ServiceConfig) {
    cfg.service(routes::index_handler)
        .service(routes::signup_handler)
        .service(routes::signup_form_handler)
        .service(routes::login_handler)
        .service(routes::login_form_handler)
        .service(routes::logout_handler)
        .service(routes::dashboard_handler)
        .service(routes::search_item_handler)
        .service(routes::update_item_handler)
        .service(routes::update_item_form_handler)
        .service(routes::add_item_handler)
        .service(routes::add_item_form_handler)
        .service(routes::edit_item_handler)
        .service(routes::edit_item_form_handler)
        .service(routes::delete_item_handler)
        .service(routes::delete_item_form_handler)
        .service(routes::favicon_handler);
}
