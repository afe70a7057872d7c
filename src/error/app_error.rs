use crate::middleware::RequestContext;
use crate::service::sheets::SheetsError;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("call /api/start first")]
    SessionNotStarted,
    #[error("no session")]
    SessionNotFound,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: SheetsError,
    },
    #[error("Question pool {0} is empty")]
    EmptyPool(&'static str),
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn upstream(message: impl Into<String>, source: SheetsError) -> Self {
        Self::Upstream {
            message: message.into(),
            source,
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Db { .. } => Status::InternalServerError,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::SessionNotStarted => Status::BadRequest,
            AppError::SessionNotFound => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Upstream { .. } => Status::InternalServerError,
            AppError::EmptyPool(_) => Status::InternalServerError,
        }
    }
}

/// Body shape shared by handler errors and catchers.
pub fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let context = RequestContext::current(req);
        let request_id = context.map(|c| c.request_id.as_str()).unwrap_or("unknown");
        let device_id = context.map(RequestContext::device_label).unwrap_or("-");

        let status = Status::from(&self);
        if status.class().is_server_error() {
            error!(
                error = ?self,
                request_id = %request_id,
                device_id = %device_id,
                method = %method,
                uri = %uri,
                "request failed"
            );
        } else {
            tracing::warn!(
                error = %self,
                request_id = %request_id,
                device_id = %device_id,
                method = %method,
                uri = %uri,
                "request rejected"
            );
        }

        let body = error_body(&self.to_string());

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        responses.responses.insert(
            "400".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Bad Request".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "500".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Internal Server Error".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::db("Database error", e),
        }
    }
}
