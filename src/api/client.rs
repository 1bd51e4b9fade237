//! HTTP client for the lead backend.
//!
//! Response bodies share the envelope `{ "data": { ... } }`. Error bodies
//! may carry `{ "message": "..." }`, which is surfaced verbatim; otherwise a
//! per-endpoint fallback message is used.

use crate::config::ApiConfig;
use crate::models::{Event, LeadStatus, LoginUser, Plantilla};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const UNEXPECTED_SHAPE: &str = "La API devolvió una estructura inesperada";

/// Errors raised while talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("{0}")]
    Fetch(String),

    /// The backend answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    /// The body parsed but did not contain the expected collection.
    #[error("{0}")]
    UnexpectedShape(String),

    /// The body was not valid JSON for the expected type.
    #[error("Respuesta no válida: {0}")]
    Decode(#[from] serde_json::Error),

    /// Login rejected.
    #[error("{0}")]
    Auth(String),

    /// The HTTP client could not be constructed.
    #[error("No se pudo crear el cliente HTTP: {0}")]
    Client(#[source] reqwest::Error),
}

/// Read access to lead events.
///
/// This is the seam between data-fetching views and the backend, so the
/// refresh logic can be driven by an in-memory source in tests.
pub trait LeadSource {
    fn fetch_events(
        &self,
        status: LeadStatus,
    ) -> impl Future<Output = Result<Vec<Event>, ApiError>> + Send;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct EventsData {
    #[serde(default)]
    events: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ReportsData {
    #[serde(default)]
    reports: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    icodcli: &'a str,
    status: &'a str,
    asunto: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the lead backend REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl ApiClient {
    /// Create a client from API settings.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /get-events?status=...`
    pub async fn get_events(&self, status: LeadStatus) -> Result<Vec<Event>, ApiError> {
        debug!("Fetching {} events", status);
        let request = self
            .http
            .get(self.url("/get-events"))
            .query(&[("status", status.as_str())]);

        let body = self
            .send(request, "Error al obtener los eventos")
            .await?;
        let events = parse_events_body(&body)?;
        info!("Fetched {} {} events", events.len(), status);
        Ok(events)
    }

    /// `GET /get-event-by-codcli?icodcli=...&asunto=...`
    pub async fn get_events_by_codcli(
        &self,
        icodcli: &str,
        asunto: &str,
    ) -> Result<Vec<Event>, ApiError> {
        let request = self
            .http
            .get(self.url("/get-event-by-codcli"))
            .query(&[("icodcli", icodcli), ("asunto", asunto)]);

        let body = self
            .send(request, "Error al obtener el evento por codcli")
            .await?;
        parse_events_body(&body)
    }

    /// `POST /update` with `{ icodcli, status, asunto }`.
    pub async fn update_event(
        &self,
        icodcli: &str,
        status: LeadStatus,
        asunto: &str,
    ) -> Result<(), ApiError> {
        let payload = UpdateRequest {
            icodcli,
            status: status.as_str(),
            asunto,
        };
        let request = self.http.post(self.url("/update")).json(&payload);

        self.send(request, "Error al actualizar el evento").await?;
        info!("Marked {} / {} as {}", icodcli, asunto, status);
        Ok(())
    }

    /// `GET /reports?page=...&limit=...`
    pub async fn get_templates(&self, page: u32, limit: u32) -> Result<Vec<Plantilla>, ApiError> {
        let request = self
            .http
            .get(self.url("/reports"))
            .query(&[("page", page), ("limit", limit)]);

        let body = self
            .send(request, "Error al obtener las plantillas")
            .await?;
        parse_templates_body(&body)
    }

    /// `POST /login`. Only 200 and 201 count as success.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginUser, ApiError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if status != 200 && status != 201 {
            warn!("Login rejected with HTTP {}", status);
            return Err(ApiError::Auth(error_message(
                &body,
                "La contraseña o el nombre de usuario son incorrectos",
            )));
        }

        parse_login_body(&body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            warn!("Backend returned HTTP {}", status);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body, fallback),
            });
        }

        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Fetch(format!(
                "La petición superó el tiempo de espera de {}s",
                self.timeout_seconds
            ))
        } else if e.is_connect() {
            ApiError::Fetch(format!("No se pudo conectar con {}", self.base_url))
        } else {
            ApiError::Fetch(format!("Error de red: {}", e))
        }
    }
}

impl LeadSource for ApiClient {
    fn fetch_events(
        &self,
        status: LeadStatus,
    ) -> impl Future<Output = Result<Vec<Event>, ApiError>> + Send {
        self.get_events(status)
    }
}

/// Parse a `{ data: { events: [...] } }` body.
pub fn parse_events_body(body: &str) -> Result<Vec<Event>, ApiError> {
    let envelope: Envelope<EventsData> = serde_json::from_str(body)?;
    match envelope.data.and_then(|d| d.events) {
        Some(serde_json::Value::Array(items)) => Ok(decode_records(items, "event")),
        _ => Err(ApiError::UnexpectedShape(UNEXPECTED_SHAPE.to_string())),
    }
}

/// Parse a `{ data: { reports: [...] } }` body.
pub fn parse_templates_body(body: &str) -> Result<Vec<Plantilla>, ApiError> {
    let envelope: Envelope<ReportsData> = serde_json::from_str(body)?;
    match envelope.data.and_then(|d| d.reports) {
        Some(serde_json::Value::Array(items)) => Ok(decode_records(items, "template")),
        _ => Err(ApiError::UnexpectedShape(UNEXPECTED_SHAPE.to_string())),
    }
}

/// Decode each record on its own; records that are not objects are skipped.
fn decode_records<T: DeserializeOwned>(items: Vec<serde_json::Value>, kind: &str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed {} #{}: {}", kind, i, e);
                None
            }
        })
        .collect()
}

/// Parse a `{ data: { email, role } }` login body.
pub fn parse_login_body(body: &str) -> Result<LoginUser, ApiError> {
    let envelope: Envelope<LoginUser> = serde_json::from_str(body)?;
    envelope
        .data
        .ok_or_else(|| ApiError::UnexpectedShape(UNEXPECTED_SHAPE.to_string()))
}

/// The backend's `message` field, or `fallback`.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Fetch every status a view needs, concurrently, concatenated in order.
pub async fn fetch_statuses<S: LeadSource>(
    source: &S,
    statuses: &[LeadStatus],
) -> Result<Vec<Event>, ApiError> {
    let batches =
        futures::future::try_join_all(statuses.iter().map(|s| source.fetch_events(*s))).await?;
    Ok(batches.into_iter().flatten().collect())
}
