use actix::Actor;
use actix_web::{web, App, HttpServer};
use log::info;

mod accounts;
mod config;
mod game;
mod models;
mod routes;
mod server;
mod websocket;

use crate::accounts::{AccountStore, BanList};
use crate::config::ServerConfig;
use crate::server::GameServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env();
    let banned_logins = BanList::load(&config.banned_logins_path());
    let banned_ips = BanList::load(&config.banned_ips_path());
    let accounts = AccountStore::load(config.accounts_path(), banned_logins, config.default_rank)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    info!("Starting chess server at http://{}", config.bind_addr);

    let bind_addr = config.bind_addr.clone();
    let server = GameServer::new(config, accounts, banned_ips).start();

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server.clone()))
            .configure(routes::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
