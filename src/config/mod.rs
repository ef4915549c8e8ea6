pub mod cli;
pub mod toml_config;

use crate::core::booking::BookingRules;
use crate::core::session::SessionSealer;
use crate::domain::model::AppointmentStatus;
use crate::utils::error::Result;
use crate::utils::validation::{validate_range, validate_required_field, validate_url, Validate};
use std::path::PathBuf;
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 8 * 60;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "appointment-desk")]
#[command(about = "Book and track citizen appointments against the booking API")]
pub struct CliConfig {
    #[arg(long, global = true, env = "APPOINTMENT_DESK_API_URL")]
    pub api_url: Option<String>,

    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "APPOINTMENT_DESK_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[arg(long, global = true, hide_env_values = true, env = "APPOINTMENT_DESK_SESSION_SECRET")]
    pub session_secret: Option<String>,

    #[arg(long, global = true, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_url: self.api_url.clone(),
            session_path: self.session_file.clone(),
            session_secret: self.session_secret.clone(),
            timeout_seconds: self.timeout,
            json_logs: self.json_logs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in and store the session locally
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "APPOINTMENT_DESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List offices
    Offices {
        #[arg(long, help = "Include inactive offices")]
        all: bool,
    },
    /// Create an office (admin)
    OfficeCreate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Mark an office as accepting appointments (admin)
    OfficeActivate { office_id: i64 },
    /// Stop an office from accepting appointments (admin)
    OfficeDeactivate { office_id: i64 },
    /// List the hosts of an office
    Hosts {
        #[arg(long, help = "Defaults to the office of the logged-in user")]
        office: Option<i64>,
    },
    /// List the selectable slots of an office for a date
    Slots {
        #[arg(long)]
        office: Option<i64>,
        #[arg(long, help = "YYYY-MM-DD, defaults to today")]
        date: Option<NaiveDate>,
    },
    /// Book an appointment for a citizen
    Book(BookArgs),
    /// List appointments
    Appointments {
        #[arg(long)]
        office: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        status: Option<AppointmentStatus>,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct BookArgs {
    #[arg(long)]
    pub office: Option<i64>,
    #[arg(long)]
    pub host: i64,
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long, help = "Slot start time, HH:MM")]
    pub slot: String,
    #[arg(long)]
    pub purpose: String,
    #[arg(long)]
    pub firstname: String,
    #[arg(long)]
    pub lastname: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub status: Option<AppointmentStatus>,
}

/// 命令列／環境變數提供的覆寫值
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub session_path: Option<PathBuf>,
    pub session_secret: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub json_logs: bool,
}

/// 合併後的最終設定：命令列 > 環境變數 > TOML > 預設值
#[derive(Clone)]
pub struct Settings {
    pub api_url: String,
    pub timeout: Duration,
    pub session_path: PathBuf,
    pub session_secret: Option<String>,
    pub session_ttl: chrono::Duration,
    pub cache_ttl: Duration,
    pub rules: BookingRules,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Settings {
    pub fn resolve(overrides: &Overrides, file: &TomlConfig) -> Result<Self> {
        file.validate()?;

        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| file.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_seconds = overrides
            .timeout_seconds
            .or(file.api.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let session_path = overrides
            .session_path
            .clone()
            .or_else(|| file.session.path.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_session_path);

        let defaults = BookingRules::default();
        let rules = BookingRules {
            horizon_days: file.booking.horizon_days.unwrap_or(defaults.horizon_days),
            max_purpose_len: file
                .booking
                .max_purpose_length
                .unwrap_or(defaults.max_purpose_len),
            default_status: file
                .booking
                .default_status
                .unwrap_or(AppointmentStatus::Pending),
        };

        let settings = Self {
            api_url,
            timeout: Duration::from_secs(timeout_seconds),
            session_path,
            session_secret: overrides
                .session_secret
                .clone()
                .or_else(|| file.session.secret.clone()),
            session_ttl: chrono::Duration::minutes(
                file.session.ttl_minutes.unwrap_or(DEFAULT_SESSION_TTL_MINUTES),
            ),
            cache_ttl: Duration::from_secs(
                file.cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
            ),
            rules,
            log_level: file.logging.level.clone(),
            json_logs: overrides.json_logs || file.logging.json.unwrap_or(false),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 需要 session 的指令才會要求 secret
    pub fn sealer(&self) -> Result<SessionSealer> {
        let secret = validate_required_field("session.secret", &self.session_secret)?;
        SessionSealer::new(secret)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_url)?;
        validate_range("timeout", self.timeout.as_secs(), 1, 300)?;
        Ok(())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("session_path", &self.session_path)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .field("session_ttl", &self.session_ttl)
            .field("cache_ttl", &self.cache_ttl)
            .field("rules", &self.rules)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

fn default_session_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".appointment-desk").join("session"),
        None => PathBuf::from(".appointment-desk-session"),
    }
}
