use actix_web::HttpResponse;

/// Liveness only; does not touch the store or the geolocation provider.
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().finish()
}
