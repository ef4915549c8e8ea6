use crate::core::availability::{check_target_date, find_slot, selectable_slots, validate_target_date};
use crate::core::cache::{QueryCache, QueryKey};
use crate::core::submission::SubmissionGuard;
use crate::domain::model::{
    parse_time, Appointment, AppointmentDetails, AppointmentFilter, AppointmentStatus, Citizen,
    Host, NewAppointmentWithCitizen, NewOffice, Office, Slot,
};
use crate::domain::ports::BookingApi;
use crate::utils::error::{BookingError, ConflictKind, FieldError, Result};
use crate::utils::validation::{check_email, check_max_len, check_non_empty, check_phone};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;

/// 提供「現在時間」，測試時可替換
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct BookingRules {
    pub horizon_days: i64,
    pub max_purpose_len: usize,
    pub default_status: AppointmentStatus,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            horizon_days: 60,
            max_purpose_len: 500,
            default_status: AppointmentStatus::Pending,
        }
    }
}

/// 預約表單（使用者輸入，尚未驗證）
#[derive(Debug, Clone)]
pub struct BookingForm {
    pub office_id: i64,
    pub host_id: i64,
    pub appointment_date: NaiveDate,
    pub slot_start: String,
    pub purpose: String,
    pub citizen: Citizen,
    pub status: Option<AppointmentStatus>,
}

impl BookingForm {
    /// 以解析後的時間組成鍵，`09:00` 與 `09:00:00` 視為同一筆預約
    fn submission_key(&self, slot_start: NaiveTime) -> String {
        let phone: String = self
            .citizen
            .phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        format!(
            "{}/{}/{}/{}/{}",
            self.office_id,
            self.host_id,
            self.appointment_date,
            slot_start.format("%H:%M:%S"),
            phone
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub message: String,
    pub office: Office,
    pub host: Host,
    pub slot: Slot,
    pub citizen: Citizen,
    pub status: AppointmentStatus,
}

/// 預約流程：取得辦公室／接待人員／時段、檢查表單、送出並與伺服器狀態對齊
pub struct BookingWorkflow<A: BookingApi + ?Sized> {
    api: Arc<A>,
    cache: QueryCache,
    guard: SubmissionGuard,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl<A: BookingApi + ?Sized> Clone for BookingWorkflow<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: self.cache.clone(),
            guard: self.guard.clone(),
            clock: Arc::clone(&self.clock),
            rules: self.rules.clone(),
        }
    }
}

impl<A: BookingApi + ?Sized> BookingWorkflow<A> {
    pub fn new(api: Arc<A>, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            guard: SubmissionGuard::new(),
            clock: Arc::new(SystemClock),
            rules: BookingRules::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rules(mut self, rules: BookingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// 辦公室列表，預設只列出啟用中的
    pub async fn offices(&self, include_inactive: bool) -> Result<Vec<Office>> {
        let api = Arc::clone(&self.api);
        let mut offices: Vec<Office> = self
            .cache
            .get_or_fetch(QueryKey::Offices, || async move { api.list_offices().await })
            .await?;

        if !include_inactive {
            offices.retain(|office| office.is_active);
        }
        offices.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(offices)
    }

    /// 接待人員列表，主要負責人排在前面
    pub async fn hosts(&self, office_id: i64) -> Result<Vec<Host>> {
        let api = Arc::clone(&self.api);
        let mut hosts: Vec<Host> = self
            .cache
            .get_or_fetch(QueryKey::Hosts(office_id), || async move {
                api.list_office_hosts(office_id).await
            })
            .await?;

        hosts.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(hosts)
    }

    pub async fn available_slots(&self, office_id: i64, date: NaiveDate) -> Result<Vec<Slot>> {
        let now = self.clock.now();
        validate_target_date(date, now.date(), self.rules.horizon_days)?;

        let slots = self.raw_slots(office_id, date).await?;
        let selectable = selectable_slots(&slots, date, now);
        tracing::info!(
            "🗓️ office {} on {}: {} of {} slots selectable",
            office_id,
            date,
            selectable.len(),
            slots.len()
        );
        Ok(selectable)
    }

    async fn raw_slots(&self, office_id: i64, date: NaiveDate) -> Result<Vec<Slot>> {
        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(QueryKey::Slots(office_id, date), || async move {
                api.list_slots(office_id, date).await
            })
            .await
    }

    pub async fn appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>> {
        let api = Arc::clone(&self.api);
        let query = filter.clone();
        let mut appointments: Vec<Appointment> = self
            .cache
            .get_or_fetch(QueryKey::Appointments(filter), || async move {
                api.list_appointments(&query).await
            })
            .await?;

        appointments.sort_by(|a, b| {
            (a.appointment_date, a.time_slotted).cmp(&(b.appointment_date, b.time_slotted))
        });
        Ok(appointments)
    }

    pub async fn create_office(&self, office: NewOffice) -> Result<Office> {
        let mut errors = Vec::new();
        collect(&mut errors, check_non_empty("name", &office.name));
        collect(&mut errors, check_max_len("name", &office.name, MAX_NAME_LEN));
        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }

        let created = self.api.create_office(&office).await?;
        self.cache.invalidate(&QueryKey::Offices).await;
        tracing::info!("🏢 office {} created ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn set_office_active(&self, office_id: i64, is_active: bool) -> Result<Office> {
        let office = self.api.set_office_active(office_id, is_active).await?;
        self.cache.invalidate(&QueryKey::Offices).await;
        tracing::info!(
            "🏢 office {} is now {}",
            office.id,
            if office.is_active { "active" } else { "inactive" }
        );
        Ok(office)
    }

    /// 送出預約
    ///
    /// 先在本地檢查全部欄位，再取得送出許可（相同預約同時只能送出一次），
    /// 接著確認辦公室、接待人員與時段仍然可用，最後送到伺服器。
    /// 伺服器回報時段已被預約時會清掉該日的時段快取，下一次讀取即與伺服器一致。
    pub async fn book(&self, form: BookingForm) -> Result<BookingReceipt> {
        let slot_start = self.validate_form(&form)?;

        let Some(_ticket) = self.guard.try_acquire(form.submission_key(slot_start)) else {
            return Err(BookingError::DuplicateSubmission);
        };

        let office = self.bookable_office(form.office_id).await?;
        let host = self.office_host(form.office_id, form.host_id).await?;
        let slots = self
            .available_slots(form.office_id, form.appointment_date)
            .await?;
        let slot = find_slot(&slots, &form.slot_start)
            .map_err(|e| BookingError::Validation(vec![e]))?
            .clone();

        let status = form.status.unwrap_or(self.rules.default_status);
        let citizen = Citizen {
            firstname: form.citizen.firstname.trim().to_string(),
            lastname: form.citizen.lastname.trim().to_string(),
            email: form.citizen.email.trim().to_string(),
            phone: form.citizen.phone.trim().to_string(),
        };
        let request = NewAppointmentWithCitizen {
            citizen: citizen.clone(),
            appointment: AppointmentDetails {
                host_id: host.user_id,
                office_id: office.id,
                purpose: form.purpose.trim().to_string(),
                appointment_date: form.appointment_date,
                time_slotted: slot.slot_start,
                status,
            },
        };

        tracing::info!(
            "📝 booking {} with host {} at office {} on {}",
            slot.label(),
            host.user_id,
            office.id,
            form.appointment_date
        );

        match self.api.create_appointment_with_citizen(&request).await {
            Ok(response) => {
                self.cache
                    .invalidate_slots(form.office_id, form.appointment_date)
                    .await;
                self.cache.invalidate_appointments();
                tracing::info!("✅ {}", response.message);
                Ok(BookingReceipt {
                    message: response.message,
                    office,
                    host,
                    slot,
                    citizen,
                    status,
                })
            }
            Err(BookingError::Conflict(ConflictKind::SlotTaken)) => {
                tracing::warn!(
                    "⚠️ slot {} on {} was taken before we could book it",
                    slot.label(),
                    form.appointment_date
                );
                self.cache
                    .invalidate_slots(form.office_id, form.appointment_date)
                    .await;
                Err(BookingError::Conflict(ConflictKind::SlotTaken))
            }
            Err(e) => {
                tracing::warn!("⚠️ booking rejected: {}", e);
                Err(e)
            }
        }
    }

    fn validate_form(&self, form: &BookingForm) -> Result<NaiveTime> {
        let mut errors = Vec::new();
        let citizen = &form.citizen;

        collect(&mut errors, check_non_empty("firstname", &citizen.firstname));
        collect(&mut errors, check_max_len("firstname", &citizen.firstname, MAX_NAME_LEN));
        collect(&mut errors, check_non_empty("lastname", &citizen.lastname));
        collect(&mut errors, check_max_len("lastname", &citizen.lastname, MAX_NAME_LEN));
        collect(&mut errors, check_email("email", &citizen.email));
        collect(&mut errors, check_phone("phone", &citizen.phone));
        collect(&mut errors, check_non_empty("purpose", &form.purpose));
        collect(
            &mut errors,
            check_max_len("purpose", &form.purpose, self.rules.max_purpose_len),
        );
        let slot_start = match check_non_empty("time_slotted", &form.slot_start) {
            Ok(()) => match parse_time(&form.slot_start) {
                Ok(time) => Some(time),
                Err(message) => {
                    errors.push(FieldError::new("time_slotted", message));
                    None
                }
            },
            Err(e) => {
                errors.push(e);
                None
            }
        };
        collect(
            &mut errors,
            check_target_date(form.appointment_date, self.today(), self.rules.horizon_days),
        );

        match slot_start {
            Some(time) if errors.is_empty() => Ok(time),
            _ => Err(BookingError::Validation(errors)),
        }
    }

    async fn bookable_office(&self, office_id: i64) -> Result<Office> {
        let office = self
            .offices(true)
            .await?
            .into_iter()
            .find(|office| office.id == office_id)
            .ok_or_else(|| BookingError::validation("office_id", "Unknown office"))?;

        if !office.is_active {
            return Err(BookingError::validation(
                "office_id",
                "This office is not accepting appointments",
            ));
        }
        Ok(office)
    }

    async fn office_host(&self, office_id: i64, host_id: i64) -> Result<Host> {
        self.hosts(office_id)
            .await?
            .into_iter()
            .find(|host| host.user_id == host_id)
            .ok_or_else(|| {
                BookingError::validation("host_id", "This host is not assigned to the office")
            })
    }
}

fn collect(errors: &mut Vec<FieldError>, check: std::result::Result<(), FieldError>) {
    if let Err(e) = check {
        errors.push(e);
    }
}
