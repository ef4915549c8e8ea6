use crate::app::render::{render_list, render_profile, render_receipt};
use crate::config::cli::FileSessionStore;
use crate::config::{BookArgs, Command, OutputFormat, Settings};
use crate::core::booking::{BookingForm, BookingWorkflow};
use crate::core::cache::QueryCache;
use crate::core::client::HttpBookingApi;
use crate::core::session::{Session, SessionManager};
use crate::domain::model::{AppointmentFilter, Citizen, Credentials, NewOffice};
use crate::utils::error::{BookingError, Result};
use chrono::Utc;
use std::io::Write;
use std::sync::Arc;

/// 執行單一 CLI 指令
pub struct CommandRunner<W: Write> {
    settings: Settings,
    format: OutputFormat,
    out: W,
}

impl<W: Write> CommandRunner<W> {
    pub fn new(settings: Settings, format: OutputFormat, out: W) -> Self {
        Self {
            settings,
            format,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn anonymous_api(&self) -> HttpBookingApi {
        HttpBookingApi::new(&self.settings.api_url, self.settings.timeout)
    }

    fn sessions(&self) -> Result<SessionManager<FileSessionStore>> {
        let store = FileSessionStore::new(self.settings.session_path.clone());
        Ok(SessionManager::new(store, self.settings.sealer()?).with_ttl(self.settings.session_ttl))
    }

    async fn session(&self) -> Result<Session> {
        self.sessions()?.require(Utc::now()).await
    }

    fn workflow(&self, session: &Session) -> BookingWorkflow<HttpBookingApi> {
        let api = self.anonymous_api().with_token(session.bearer());
        BookingWorkflow::new(Arc::new(api), QueryCache::new(self.settings.cache_ttl))
            .with_rules(self.settings.rules.clone())
    }

    /// 未指定辦公室時使用登入者所屬的辦公室
    fn office_or_default(office: Option<i64>, session: &Session) -> Result<i64> {
        office
            .or(session.profile.office_id)
            .ok_or_else(|| BookingError::validation("office_id", "Pass --office, your account has no office"))
    }

    /// 管理員未指定辦公室時列出所有辦公室的預約
    fn appointments_office(office: Option<i64>, session: &Session) -> Option<i64> {
        if office.is_some() || session.profile.is_admin() {
            office
        } else {
            session.profile.office_id
        }
    }

    fn require_admin(session: &Session) -> Result<()> {
        if session.profile.is_admin() {
            Ok(())
        } else {
            tracing::warn!("⛔ user {} is not an admin", session.profile.user_id);
            Err(BookingError::Unauthorized)
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username, password } => {
                let credentials = Credentials { username, password };
                let session = self
                    .sessions()?
                    .login(&self.anonymous_api(), &credentials, Utc::now())
                    .await?;
                render_profile(&session.profile, self.format, &mut self.out)?;
            }
            Command::Logout => {
                self.sessions()?.logout().await?;
                writeln!(self.out, "Logged out")?;
            }
            Command::Whoami => {
                let session = self.session().await?;
                render_profile(&session.profile, self.format, &mut self.out)?;
            }
            Command::Offices { all } => {
                let session = self.session().await?;
                let offices = self.workflow(&session).offices(all).await?;
                render_list(&offices, self.format, &mut self.out)?;
            }
            Command::OfficeCreate {
                name,
                description,
                location,
                inactive,
            } => {
                let session = self.session().await?;
                Self::require_admin(&session)?;
                let office = self
                    .workflow(&session)
                    .create_office(NewOffice {
                        name,
                        description,
                        location,
                        is_active: !inactive,
                    })
                    .await?;
                render_list(&[office], self.format, &mut self.out)?;
            }
            Command::OfficeActivate { office_id } => {
                self.toggle_office(office_id, true).await?;
            }
            Command::OfficeDeactivate { office_id } => {
                self.toggle_office(office_id, false).await?;
            }
            Command::Hosts { office } => {
                let session = self.session().await?;
                let office_id = Self::office_or_default(office, &session)?;
                let hosts = self.workflow(&session).hosts(office_id).await?;
                render_list(&hosts, self.format, &mut self.out)?;
            }
            Command::Slots { office, date } => {
                let session = self.session().await?;
                let office_id = Self::office_or_default(office, &session)?;
                let workflow = self.workflow(&session);
                let date = date.unwrap_or_else(|| workflow.today());
                let slots = workflow.available_slots(office_id, date).await?;
                render_list(&slots, self.format, &mut self.out)?;
            }
            Command::Book(args) => {
                let session = self.session().await?;
                let form = Self::booking_form(args, &session)?;
                let receipt = self.workflow(&session).book(form).await?;
                render_receipt(&receipt, self.format, &mut self.out)?;
            }
            Command::Appointments {
                office,
                date,
                status,
            } => {
                let session = self.session().await?;
                let filter = AppointmentFilter {
                    office_id: Self::appointments_office(office, &session),
                    appointment_date: date,
                    status,
                };
                let appointments = self.workflow(&session).appointments(filter).await?;
                render_list(&appointments, self.format, &mut self.out)?;
            }
        }
        Ok(())
    }

    async fn toggle_office(&mut self, office_id: i64, is_active: bool) -> Result<()> {
        let session = self.session().await?;
        Self::require_admin(&session)?;
        let office = self
            .workflow(&session)
            .set_office_active(office_id, is_active)
            .await?;
        render_list(&[office], self.format, &mut self.out)
    }

    fn booking_form(args: BookArgs, session: &Session) -> Result<BookingForm> {
        Ok(BookingForm {
            office_id: Self::office_or_default(args.office, session)?,
            host_id: args.host,
            appointment_date: args.date,
            slot_start: args.slot,
            purpose: args.purpose,
            citizen: Citizen {
                firstname: args.firstname,
                lastname: args.lastname,
                email: args.email,
                phone: args.phone,
            },
            status: args.status,
        })
    }
}
