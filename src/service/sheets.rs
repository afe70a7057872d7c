use crate::config::SheetsConfig;
use crate::models::question::{Donor, QuestionPools};
use crate::service::question_source::{QuestionSource, donors_from_rows, questions_from_rows};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// Refresh slightly early so a token never expires mid-request.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP request to Google failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid service account private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to sign service account assertion: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("Google API responded with {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize, Default)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Google Sheets client authenticated as a service account.
pub struct SheetsClient {
    config: SheetsConfig,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn signed_assertion(&self) -> Result<String, SheetsError> {
        let key = EncodingKey::from_rsa_pem(self.config.private_key_pem().as_bytes()).map_err(SheetsError::InvalidKey)?;
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.config.service_account_email,
            scope: READONLY_SCOPE,
            aud: &self.config.token_url,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(SheetsError::Signing)
    }

    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref()
            && Instant::now() < current.refresh_at
        {
            return Ok(current.value.clone());
        }

        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response: TokenResponse = check_status(response).await?.json().await?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!(expires_in = response.expires_in, "obtained Google access token");

        let value = response.access_token;
        *token = Some(AccessToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(value)
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.spreadsheet_id),
            suffix
        )
    }

    async fn batch_get(&self, ranges: &[&str]) -> Result<Vec<Vec<Vec<String>>>, SheetsError> {
        let token = self.access_token().await?;
        let query: Vec<(&str, &str)> = ranges.iter().map(|range| ("ranges", *range)).collect();

        let response = self
            .http
            .get(self.values_url("values:batchGet"))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        let body: BatchGetResponse = check_status(response).await?.json().await?;

        let mut value_ranges = body.value_ranges.into_iter();
        Ok(ranges
            .iter()
            .map(|_| value_ranges.next().unwrap_or_default().values)
            .collect())
    }

    async fn get(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let token = self.access_token().await?;
        let url = self.values_url(&format!("values/{}", urlencoding::encode(range)));

        let response = self.http.get(url).bearer_auth(token).send().await?;
        let body: ValueRange = check_status(response).await?.json().await?;

        Ok(body.values)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %body, "Google API request failed");
    Err(SheetsError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait::async_trait]
impl QuestionSource for SheetsClient {
    async fn load_pools(&self) -> Result<QuestionPools, SheetsError> {
        let ranges = [self.config.pool_a_range.as_str(), self.config.pool_b_range.as_str()];
        let mut rows = self.batch_get(&ranges).await?.into_iter();

        let a = questions_from_rows(&rows.next().unwrap_or_default());
        let b = questions_from_rows(&rows.next().unwrap_or_default());
        debug!(pool_a = a.len(), pool_b = b.len(), "loaded question pools");

        Ok(QuestionPools { a, b })
    }

    async fn load_donors(&self) -> Result<Vec<Donor>, SheetsError> {
        let rows = self.get(&self.config.donor_range).await?;
        let donors = donors_from_rows(&rows);
        debug!(donors = donors.len(), "loaded donor rows");

        Ok(donors)
    }
}
