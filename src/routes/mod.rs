use actix_web::{web, HttpResponse, Responder};

/// Liveness page; the real protocol lives on `/ws`.
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Chess server is running. Connect a client to /ws.")
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(crate::websocket::ws_index)))
        .service(web::resource("/").route(web::get().to(index)));
}
