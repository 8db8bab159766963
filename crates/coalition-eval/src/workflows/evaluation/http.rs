use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::backend::{BackendError, EvaluationBackend};
use super::domain::{
    AssociateGroup, DateRange, EvaluationRecord, EvaluationSubmission, SubjectId,
};
use super::metrics::{MetricsPayload, MetricsSnapshot};
use crate::config::BackendConfig;

/// [`EvaluationBackend`] over the coalition REST API.
#[derive(Debug, Clone)]
pub struct HttpEvaluationBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEvaluationBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| BackendError::Transport(format!("invalid api token: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EvaluationBackend for HttpEvaluationBackend {
    async fn performance_metrics(
        &self,
        subject: SubjectId,
        range: DateRange,
    ) -> Result<MetricsSnapshot, BackendError> {
        let url = self.url(&format!("/api/evaluations/performance-metrics/{subject}"));
        debug!(%subject, start = %range.start, end = %range.end, "requesting performance metrics");
        let response = self
            .client
            .get(url)
            .query(&range.query_pairs())
            .send()
            .await
            .map_err(transport)?;

        let payload: MetricsPayload = decode(response).await?;
        Ok(payload.into_snapshot())
    }

    async fn submit_evaluation(
        &self,
        submission: &EvaluationSubmission,
    ) -> Result<EvaluationRecord, BackendError> {
        let response = self
            .client
            .post(self.url("/api/evaluations"))
            .json(submission)
            .send()
            .await
            .map_err(transport)?;

        let envelope: Envelope<EvaluationRecord> = decode(response).await?;
        Ok(envelope.into_inner())
    }

    async fn associate_groups(&self) -> Result<Vec<AssociateGroup>, BackendError> {
        let response = self
            .client
            .get(self.url("/api/associate-groups"))
            .send()
            .await
            .map_err(transport)?;

        let envelope: Envelope<Vec<AssociateGroup>> = decode(response).await?;
        Ok(envelope.into_inner())
    }

    async fn associate_group(&self, id: u64) -> Result<AssociateGroup, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("/api/associate-groups/{id}")))
            .send()
            .await
            .map_err(transport)?;

        let envelope: Envelope<AssociateGroup> = decode(response).await?;
        Ok(envelope.into_inner())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValidationBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: ValidationErrors,
}

/// Field errors arrive either as a flat list or keyed by field name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValidationErrors {
    List(Vec<String>),
    Fields(std::collections::BTreeMap<String, Vec<String>>),
}

impl Default for ValidationErrors {
    fn default() -> Self {
        ValidationErrors::List(Vec::new())
    }
}

impl ValidationErrors {
    fn flatten(self) -> Vec<String> {
        match self {
            ValidationErrors::List(errors) => errors,
            ValidationErrors::Fields(fields) => fields.into_values().flatten().collect(),
        }
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()));
    }

    let body = response.bytes().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &[u8]) -> BackendError {
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => {
            let parsed: ValidationBody = serde_json::from_slice(body).unwrap_or_default();
            BackendError::Validation {
                message: parsed
                    .message
                    .unwrap_or_else(|| "validation failed".to_string()),
                errors: parsed.errors.flatten(),
            }
        }
        StatusCode::NOT_FOUND => BackendError::NotFound,
        other => {
            warn!(status = other.as_u16(), "backend request failed");
            BackendError::Status {
                status: other.as_u16(),
            }
        }
    }
}
