use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{info, warn};
use uuid::Uuid;

const RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("Cache-Control", "no-store"),
];

/// Per-request tracing context, cached on the request by [`RequestLogger`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Device the request concerns, when the URL names one.
    pub device_id: Option<String>,
}

impl RequestContext {
    pub fn for_request(request: &Request<'_>) -> Self {
        RequestContext {
            request_id: Uuid::new_v4().to_string(),
            device_id: device_id_from_uri(request),
        }
    }

    pub fn current<'r>(request: &'r Request<'_>) -> Option<&'r RequestContext> {
        request.local_cache(|| None::<RequestContext>).as_ref()
    }

    pub fn device_label(&self) -> &str {
        self.device_id.as_deref().unwrap_or("-")
    }
}

/// `deviceId` query parameter, or the path segment after `result`.
fn device_id_from_uri(request: &Request<'_>) -> Option<String> {
    if let Some(Ok(id)) = request.query_value::<&str>("deviceId")
        && !id.is_empty()
    {
        return Some(id.to_string());
    }

    device_id_from_path(request.uri().path().segments())
}

fn device_id_from_path<'a>(mut segments: impl Iterator<Item = &'a str>) -> Option<String> {
    segments.by_ref().find(|segment| *segment == "result")?;
    segments.next().filter(|id| !id.is_empty()).map(str::to_string)
}

/// Tags every request with an id and logs it together with the device it concerns.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let context = RequestContext::for_request(request);

        info!(
            request_id = %context.request_id,
            device_id = %context.device_label(),
            method = %request.method(),
            uri = %request.uri(),
            "incoming request"
        );

        request.local_cache(|| Some(context));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (request_id, device_id) = match RequestContext::current(request) {
            Some(context) => (context.request_id.clone(), context.device_label().to_string()),
            None => ("unknown".to_string(), "-".to_string()),
        };
        let status = response.status();

        response.set_header(Header::new("X-Request-Id", request_id.clone()));
        for (name, value) in RESPONSE_HEADERS {
            response.set_header(Header::new(name, value));
        }

        if status.class().is_client_error() || status.class().is_server_error() {
            warn!(
                request_id = %request_id,
                device_id = %device_id,
                method = %request.method(),
                uri = %request.uri(),
                status = status.code,
                "request completed with error"
            );
        } else {
            info!(
                request_id = %request_id,
                device_id = %device_id,
                method = %request.method(),
                uri = %request.uri(),
                status = status.code,
                "request completed"
            );
        }
    }
}

/// Caller details stored on a newly created session.
///
/// The address is the first `X-Forwarded-For` hop when the service sits behind
/// a proxy, otherwise the peer address.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

fn first_forwarded_hop(header: &str) -> Option<String> {
    header.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()).map(str::to_string)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientInfo {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let headers = req.headers();
        let ip = headers
            .get_one("X-Forwarded-For")
            .and_then(first_forwarded_hop)
            .or_else(|| req.client_ip().map(|ip| ip.to_string()));

        Outcome::Success(ClientInfo {
            ip,
            user_agent: headers.get_one("User-Agent").map(str::to_string),
        })
    }
}

impl<'a> OpenApiFromRequest<'a> for ClientInfo {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use rocket::{get, routes};

    #[get("/whoami")]
    fn whoami(client: ClientInfo) -> String {
        format!("{}|{}", client.ip.unwrap_or_default(), client.user_agent.unwrap_or_default())
    }

    async fn client() -> Client {
        let rocket = rocket::build().attach(RequestLogger).mount("/api", routes![whoami]);
        Client::tracked(rocket).await.expect("valid rocket instance")
    }

    #[test]
    fn device_id_follows_result_segment() {
        assert_eq!(device_id_from_path("api/result/dev-1".split('/')).as_deref(), Some("dev-1"));
        assert_eq!(device_id_from_path("api/result/".split('/')), None);
        assert_eq!(device_id_from_path("api/questions".split('/')), None);
    }

    #[rocket::async_test]
    async fn context_reads_device_from_query_or_path() {
        let client = client().await;

        let request = client.get("/api/questions?deviceId=dev-7");
        assert_eq!(RequestContext::for_request(request.inner()).device_id.as_deref(), Some("dev-7"));

        let request = client.get("/api/result/dev-8");
        assert_eq!(RequestContext::for_request(request.inner()).device_id.as_deref(), Some("dev-8"));

        let request = client.get("/api/donors");
        let context = RequestContext::for_request(request.inner());
        assert_eq!(context.device_label(), "-");
        assert!(Uuid::parse_str(&context.request_id).is_ok());
    }

    #[rocket::async_test]
    async fn responses_carry_request_id_and_security_headers() {
        let client = client().await;

        let first = client.get("/api/whoami").dispatch().await;
        assert_eq!(first.status(), Status::Ok);
        let first_id = first.headers().get_one("X-Request-Id").map(str::to_string).expect("request id header");
        assert!(Uuid::parse_str(&first_id).is_ok());
        assert_eq!(first.headers().get_one("X-Frame-Options"), Some("DENY"));
        assert_eq!(first.headers().get_one("Cache-Control"), Some("no-store"));

        let second = client.get("/api/whoami").dispatch().await;
        assert_ne!(second.headers().get_one("X-Request-Id"), Some(first_id.as_str()));
    }

    #[rocket::async_test]
    async fn client_info_prefers_forwarded_address() {
        let client = client().await;

        let response = client
            .get("/api/whoami")
            .header(Header::new("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .header(Header::new("User-Agent", "quiz-app/1.0"))
            .dispatch()
            .await;
        assert_eq!(response.into_string().await.as_deref(), Some("203.0.113.7|quiz-app/1.0"));
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        assert_eq!(first_forwarded_hop(" 198.51.100.2 ").as_deref(), Some("198.51.100.2"));
        assert_eq!(first_forwarded_hop(""), None);
        assert_eq!(first_forwarded_hop(" , 10.0.0.1"), None);
    }
}
