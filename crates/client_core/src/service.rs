use std::marker::PhantomData;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Record, RecordId, Role},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{Patch, RoleAssignment},
};
use url::Url;

/// Uniform CRUD surface every entity screen talks to.
#[async_trait]
pub trait RecordService: Send + Sync {
    type Record: Record;

    async fn list(&self) -> Result<Vec<Self::Record>>;
    async fn create(&self, input: serde_json::Value) -> Result<Self::Record>;
    async fn update(&self, id: &RecordId, patch: Patch) -> Result<Self::Record>;
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Only role-bearing kinds override this.
    async fn assign_role(&self, id: &RecordId, role: Role) -> Result<()> {
        Err(anyhow!(
            "{} do not support role assignment (record {id}, role {role})",
            <Self::Record as Record>::KIND
        ))
    }
}

/// [`RecordService`] backed by the `/api/{kind}` HTTP routes.
pub struct HttpRecordService<R> {
    http: Client,
    base_url: Url,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> HttpRecordService<R> {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("server url '{server_url}' cannot carry a path"));
        }
        Ok(Self {
            http,
            base_url,
            _record: PhantomData,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("api")
                .push(R::KIND.as_str())
                .extend(segments);
        }
        url
    }
}

#[async_trait]
impl<R: Record> RecordService for HttpRecordService<R> {
    type Record = R;

    async fn list(&self) -> Result<Vec<R>> {
        let response = self.http.get(self.endpoint(&[])).send().await?;
        decode(response).await
    }

    async fn create(&self, input: serde_json::Value) -> Result<R> {
        let response = self
            .http
            .post(self.endpoint(&[]))
            .json(&input)
            .send()
            .await?;
        decode(response).await
    }

    async fn update(&self, id: &RecordId, patch: Patch) -> Result<R> {
        let response = self
            .http
            .patch(self.endpoint(&[id.as_str()]))
            .json(&patch)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&[id.as_str()]))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn assign_role(&self, id: &RecordId, role: Role) -> Result<()> {
        if !R::KIND.supports_roles() {
            return Err(anyhow!("{} do not support role assignment", R::KIND));
        }
        let response = self
            .http
            .put(self.endpoint(&[id.as_str(), "role"]))
            .json(&RoleAssignment { role })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    Ok(response.json().await?)
}

/// Turns non-2xx responses into [`ApiException`], using the server's error
/// envelope when it sent one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let exception = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => ApiException::from(api_error),
        Err(_) if body.trim().is_empty() => ApiException::new(code_for_status(status), status.to_string()),
        Err(_) => ApiException::new(code_for_status(status), body),
    };
    Err(exception.into())
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
