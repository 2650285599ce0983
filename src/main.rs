mod auth;
mod config;
mod db;
mod entity;
mod error;
mod flash;
mod forms;
mod response;
mod routes;
mod slug;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use log::info;
use response::form_error_handler;
use routes::{resource, user};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    let db = connect_db(&config).await;
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::FormConfig::default().error_handler(form_error_handler))
            .wrap(middleware::Logger::default())
            .configure(resource::root_config)
            .service(web::scope("/resource").configure(resource::config))
            .service(web::scope("/account").configure(user::config))
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
