use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    error::{PlanError, Result},
    plan::RawPlan,
    store::DocumentStore,
};

/// Client for the remote document service.
pub struct HttpDocumentStore {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PlanError::Config(format!("invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PlanError::Config(format!("{} cannot be used as a base URL", base_url)));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Build an endpoint URL, percent-encoding every segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PlanError::Config(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, e: reqwest::Error) -> PlanError {
        if e.is_timeout() {
            PlanError::Timeout(self.timeout)
        } else {
            PlanError::Http(e)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!("{} -> {}", what, status);

        if status == StatusCode::NOT_FOUND {
            return Err(PlanError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlanError::Api {
                status: status.as_u16(),
                message: error_detail(&body),
            });
        }
        Ok(response)
    }

    async fn send_for_plan(&self, request: reqwest::RequestBuilder, what: &str) -> Result<RawPlan> {
        let response = self.send(request, what).await?;
        response
            .json::<RawPlan>()
            .await
            .map_err(|e| self.transport_error(e))
    }
}

/// FastAPI-style services put the reason in a `detail` field.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").map(|d| match d {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn upload_pdf(&self, file_name: &str, bytes: Vec<u8>) -> Result<RawPlan> {
        info!("Uploading {} ({} bytes)", file_name, bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload", "pdf"])?;
        self.send_for_plan(self.client.post(url).multipart(form), file_name).await
    }

    async fn upload_plan(&self, plan: &RawPlan) -> Result<RawPlan> {
        let url = self.endpoint(&["upload", "json"])?;
        let what = plan.doc_id.clone().unwrap_or_else(|| "plan".to_string());
        self.send_for_plan(self.client.post(url).json(plan), &what).await
    }

    async fn fetch(&self, doc_id: &str) -> Result<RawPlan> {
        let url = self.endpoint(&["documents", doc_id])?;
        self.send_for_plan(self.client.get(url), doc_id).await
    }

    async fn fetch_by_name(&self, name: &str) -> Result<RawPlan> {
        let url = self.endpoint(&["documents", "by-name", name])?;
        self.send_for_plan(self.client.get(url), name).await
    }

    async fn rename(&self, doc_id: &str, name: &str) -> Result<()> {
        let url = self.endpoint(&["documents", doc_id, "name"])?;
        self.send(self.client.post(url).query(&[("name", name)]), doc_id)
            .await?;
        Ok(())
    }

    async fn set_course_status(&self, doc_id: &str, code: &str, passed: bool) -> Result<()> {
        let url = self.endpoint(&["documents", doc_id, "courses", code, "status"])?;
        let passed = if passed { "true" } else { "false" };
        self.send(self.client.post(url).query(&[("passed", passed)]), doc_id)
            .await?;
        Ok(())
    }
}
