//! The backend client seam.
//!
//! [`BackendApi`] is the wizard's only view of the booking backend. Two
//! implementations ship: [`HttpBackend`] for a remote REST backend (the
//! opaque init-data token rides along as a header on every call, its
//! validity is the backend's concern), and `LocalBackend` in `local.rs`
//! which serves the same surface straight from the sqlite store when the
//! bot and the backend are one process.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::backend::types::{
    CleaningRecord, RescheduleRequest, ScheduleRequest, ScheduleResponse, StatusResponse, Tariff, TariffId,
    UserProfile,
};
use crate::core::{AppError, AppResult};

/// Header carrying the opaque Telegram WebApp init data token.
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn list_tariffs(&self) -> AppResult<Vec<Tariff>>;
    async fn get_tariff(&self, id: TariffId) -> AppResult<Tariff>;
    async fn list_cleanings(&self) -> AppResult<Vec<CleaningRecord>>;
    async fn schedule(&self, req: &ScheduleRequest) -> AppResult<CleaningRecord>;
    async fn cancel(&self, id: &str) -> AppResult<()>;
    async fn reschedule(&self, id: &str, req: &RescheduleRequest) -> AppResult<CleaningRecord>;
    async fn current_user(&self) -> AppResult<UserProfile>;
}

/// REST client for a remote booking backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    init_data: String,
}

impl HttpBackend {
    /// `base_url` without a trailing slash, e.g. `https://api.example.com`.
    pub fn new(base_url: impl Into<String>, init_data: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            init_data: init_data.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let resp = self
            .client
            .get(self.url(path))
            .header(INIT_DATA_HEADER, &self.init_data)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let resp = self
            .client
            .post(self.url(path))
            .header(INIT_DATA_HEADER, &self.init_data)
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> AppResult<T> {
        let status = resp.status();
        if !status.is_success() {
            // Surface the backend's error message when it sent one
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(msg) = body.get("error").and_then(|v| v.as_str()) {
                    return Err(match status {
                        StatusCode::BAD_REQUEST => AppError::Validation(msg.to_string()),
                        _ => AppError::Backend(msg.to_string()),
                    });
                }
            }
            return Err(AppError::HttpStatus(status));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn list_tariffs(&self) -> AppResult<Vec<Tariff>> {
        self.get_json("/api/tariffs").await
    }

    async fn get_tariff(&self, id: TariffId) -> AppResult<Tariff> {
        self.get_json(&format!("/api/tariffs/{}", id.as_str())).await
    }

    async fn list_cleanings(&self) -> AppResult<Vec<CleaningRecord>> {
        self.get_json("/api/cleanings").await
    }

    async fn schedule(&self, req: &ScheduleRequest) -> AppResult<CleaningRecord> {
        let resp: ScheduleResponse = self.post_json("/api/cleanings/schedule", req).await?;
        if !resp.success {
            return Err(AppError::Backend("schedule request was not accepted".to_string()));
        }
        Ok(resp.cleaning)
    }

    async fn cancel(&self, id: &str) -> AppResult<()> {
        let resp: StatusResponse = self
            .post_json(&format!("/api/cleanings/{}/cancel", id), &serde_json::json!({}))
            .await?;
        if !resp.success {
            return Err(AppError::Backend("cancel request was not accepted".to_string()));
        }
        Ok(())
    }

    async fn reschedule(&self, id: &str, req: &RescheduleRequest) -> AppResult<CleaningRecord> {
        let resp: ScheduleResponse = self
            .post_json(&format!("/api/cleanings/{}/reschedule", id), req)
            .await?;
        if !resp.success {
            return Err(AppError::Backend("reschedule request was not accepted".to_string()));
        }
        Ok(resp.cleaning)
    }

    async fn current_user(&self) -> AppResult<UserProfile> {
        self.get_json("/api/user/me").await
    }
}
