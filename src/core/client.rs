use crate::core::api_error;
use crate::domain::model::{
    Appointment, AppointmentFilter, Credentials, Host, MessageResponse, NewAppointmentWithCitizen,
    NewOffice, Office, Slot, TokenResponse, UserProfile,
};
use crate::domain::ports::BookingApi;
use crate::utils::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// 以 reqwest 實作的預約 API 客戶端
#[derive(Debug, Clone)]
pub struct HttpBookingApi {
    base_url: String,
    client: Client,
    access_token: Option<String>,
    timeout: Duration,
}

impl HttpBookingApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            access_token: None,
            timeout,
        }
    }

    /// 之後每個請求都會帶上 `Authorization: Bearer <token>`
    pub fn with_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("📡 {} {}", method, url);
        let request = self.client.request(method, url).timeout(self.timeout);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("⚠️ {} answered {}", url, status);
            return Err(api_error::classify(status.as_u16(), &body));
        }

        tracing::debug!("📡 {} answered {} ({} bytes)", url, status, body.len());
        serde_json::from_str(&body).map_err(|e| BookingError::Decode {
            message: format!("{} from {}", e, url),
        })
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn list_offices(&self) -> Result<Vec<Office>> {
        self.send(self.request(reqwest::Method::GET, "offices")).await
    }

    async fn create_office(&self, office: &NewOffice) -> Result<Office> {
        self.send(self.request(reqwest::Method::POST, "offices").json(office))
            .await
    }

    async fn set_office_active(&self, office_id: i64, is_active: bool) -> Result<Office> {
        let body = serde_json::json!({ "is_active": is_active });
        self.send(
            self.request(reqwest::Method::PATCH, &format!("offices/{}", office_id))
                .json(&body),
        )
        .await
    }

    async fn list_office_hosts(&self, office_id: i64) -> Result<Vec<Host>> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("offices/{}/hosts", office_id),
        ))
        .await
    }

    async fn list_slots(&self, office_id: i64, target_date: NaiveDate) -> Result<Vec<Slot>> {
        let date = target_date.format("%Y-%m-%d").to_string();
        self.send(
            self.request(
                reqwest::Method::GET,
                &format!("availability/hosts/{}/slots", office_id),
            )
            .query(&[("target_date", date)]),
        )
        .await
    }

    async fn create_appointment_with_citizen(
        &self,
        request: &NewAppointmentWithCitizen,
    ) -> Result<MessageResponse> {
        self.send(
            self.request(reqwest::Method::POST, "appointments/with-citizen")
                .json(request),
        )
        .await
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        self.send(
            self.request(reqwest::Method::GET, "appointments")
                .query(&filter.query_pairs()),
        )
        .await
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let request = self
            .client
            .post(self.url("auth/login"))
            .timeout(self.timeout)
            .form(&form);
        tracing::debug!("📡 POST {} as {}", self.url("auth/login"), credentials.username);
        self.send(request).await
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile> {
        let request = self
            .client
            .get(self.url("users/me"))
            .timeout(self.timeout)
            .bearer_auth(access_token);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let api = HttpBookingApi::new("http://localhost:8000/api/", Duration::from_secs(5));
        assert_eq!(api.base_url(), "http://localhost:8000/api");
        assert_eq!(api.url("/offices"), "http://localhost:8000/api/offices");
        assert_eq!(api.url("offices/3/hosts"), "http://localhost:8000/api/offices/3/hosts");
    }
}
