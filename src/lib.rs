use crate::signup::WaitlistService;
use actix_web::{dev::Server, web, App, HttpServer};
use crate::telemetry::WaitlistRootSpanBuilder;
use tracing_actix_web::TracingLogger;

pub mod configuration;
pub mod domain;
pub mod geolocation;
pub mod routes;
pub mod signup;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod utils;

pub fn run(
    listener: std::net::TcpListener,
    service: WaitlistService,
) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::<WaitlistRootSpanBuilder>::new())
            .route("/healthz", web::get().to(routes::ping))
            .route("/waitlist", web::post().to(routes::join))
            .route("/waitlist/count", web::get().to(routes::count))
            .app_data(service.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
