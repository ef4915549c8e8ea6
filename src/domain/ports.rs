use crate::domain::model::{
    Appointment, AppointmentFilter, Credentials, Host, MessageResponse, NewAppointmentWithCitizen,
    NewOffice, Office, Slot, TokenResponse, UserProfile,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// 預約後端 API
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_offices(&self) -> Result<Vec<Office>>;
    async fn create_office(&self, office: &NewOffice) -> Result<Office>;
    async fn set_office_active(&self, office_id: i64, is_active: bool) -> Result<Office>;
    async fn list_office_hosts(&self, office_id: i64) -> Result<Vec<Host>>;
    async fn list_slots(&self, office_id: i64, target_date: NaiveDate) -> Result<Vec<Slot>>;
    async fn create_appointment_with_citizen(
        &self,
        request: &NewAppointmentWithCitizen,
    ) -> Result<MessageResponse>;
    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>>;
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse>;
    /// 以指定 token 取得使用者資料（登入流程中 token 尚未存入 session）
    async fn current_user(&self, access_token: &str) -> Result<UserProfile>;
}

/// 保存封裝後的 session token
pub trait SessionStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
    fn save(&self, sealed: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
