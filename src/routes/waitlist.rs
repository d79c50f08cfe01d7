use std::net::{IpAddr, SocketAddr};

use actix_web::{http::header, http::StatusCode, web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::domain::LocationSummary;
use crate::signup::{ClientContext, JoinErrorKind, WaitlistService};

#[derive(serde::Deserialize)]
pub struct JoinFormBody {
    email: String,
}

#[derive(Serialize)]
pub struct JoinResponse {
    success: bool,
    message: String,
    count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JoinErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<LocationSummary>,
}

#[derive(Serialize)]
pub struct CountResponse {
    count: u64,
    fallback: bool,
}

#[tracing::instrument(name = "Handling a waitlist signup", skip(request, body, service))]
pub async fn join(
    request: HttpRequest,
    body: web::Form<JoinFormBody>,
    service: web::Data<WaitlistService>,
) -> HttpResponse {
    let join_request = service.request(body.into_inner().email, client_context(&request));

    match service.join(join_request).await {
        Ok(joined) => HttpResponse::Ok().json(JoinResponse {
            success: true,
            message: joined.message(),
            count: joined.waitlist_count,
            error: None,
            location: joined.location,
        }),
        Err(e) => {
            let kind = e.kind();
            match kind {
                JoinErrorKind::StoreUnavailable | JoinErrorKind::NetworkError => {
                    tracing::error!("Failed to add waitlist entry: {:?}", e)
                }
                _ => tracing::info!(error = %kind, "Waitlist signup rejected"),
            }

            HttpResponse::build(status_for(kind)).json(JoinResponse {
                success: false,
                message: e.user_message().to_string(),
                count: service.reported_count(),
                error: Some(kind),
                location: None,
            })
        }
    }
}

#[tracing::instrument(name = "Reporting the waitlist count", skip(service))]
pub async fn count(service: web::Data<WaitlistService>) -> HttpResponse {
    let count = service.waitlist_count().await;

    HttpResponse::Ok().json(CountResponse {
        count: count.count,
        fallback: count.is_fallback,
    })
}

fn status_for(kind: JoinErrorKind) -> StatusCode {
    match kind {
        JoinErrorKind::InvalidEmail => StatusCode::BAD_REQUEST,
        JoinErrorKind::DuplicateEmail | JoinErrorKind::SubmissionInProgress => StatusCode::CONFLICT,
        JoinErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        JoinErrorKind::NetworkError => StatusCode::BAD_GATEWAY,
    }
}

fn client_context(request: &HttpRequest) -> ClientContext {
    let ip = request
        .connection_info()
        .realip_remote_addr()
        .and_then(parse_ip);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    ClientContext { ip, user_agent }
}

/// Accepts a bare address, `ip:port` or a bracketed IPv6 address.
fn parse_ip(addr: &str) -> Option<IpAddr> {
    let addr = addr.trim();
    addr.parse::<IpAddr>()
        .or_else(|_| addr.parse::<SocketAddr>().map(|socket| socket.ip()))
        .or_else(|_| addr.trim_start_matches('[').trim_end_matches(']').parse())
        .ok()
}
