use thiserror::Error;

/// 表單欄位層級的錯誤訊息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 伺服器唯一性衝突的種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    DuplicatePhone,
    DuplicateEmail,
    SlotTaken,
    Other { constraint: String },
}

impl ConflictKind {
    /// 衝突對應的表單欄位
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConflictKind::DuplicatePhone => Some("phone"),
            ConflictKind::DuplicateEmail => Some("email"),
            ConflictKind::SlotTaken => Some("time_slotted"),
            ConflictKind::Other { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ConflictKind::DuplicatePhone => {
                "This phone number is already registered to another citizen".to_string()
            }
            ConflictKind::DuplicateEmail => {
                "This email address is already registered to another citizen".to_string()
            }
            ConflictKind::SlotTaken => {
                "The selected time slot has just been booked, please pick another one".to_string()
            }
            ConflictKind::Other { constraint } => {
                format!("A record with the same value already exists ({})", constraint)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unique constraint violated: {}", .0.message())]
    Conflict(ConflictKind),

    #[error("Request rejected by server: {}", format_fields(.fields))]
    Rejected { fields: Vec<FieldError> },

    #[error("Not authenticated or session expired")]
    Unauthorized,

    #[error("Invalid booking input: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("An identical booking is already being submitted")]
    DuplicateSubmission,

    #[error("Could not decode server response: {message}")]
    Decode { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Server,
    Conflict,
    Validation,
    Auth,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BookingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BookingError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BookingError::Network(_) => ErrorCategory::Network,
            BookingError::Status { .. } | BookingError::Decode { .. } => ErrorCategory::Server,
            BookingError::Conflict(_) | BookingError::DuplicateSubmission => {
                ErrorCategory::Conflict
            }
            BookingError::Rejected { .. } | BookingError::Validation(_) => {
                ErrorCategory::Validation
            }
            BookingError::Unauthorized | BookingError::Session { .. } => ErrorCategory::Auth,
            BookingError::ConfigValidationError { .. }
            | BookingError::MissingConfigError { .. }
            | BookingError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            BookingError::IoError(_)
            | BookingError::SerializationError(_)
            | BookingError::CsvError(_) => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Conflict => ErrorSeverity::Medium,
            ErrorCategory::Network | ErrorCategory::Server | ErrorCategory::Auth => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Conflict => 2,
            ErrorCategory::Configuration => 3,
            ErrorCategory::Auth => 4,
            _ => 1,
        }
    }

    /// 錯誤所屬的表單欄位（若有）
    pub fn field(&self) -> Option<&str> {
        match self {
            BookingError::Conflict(kind) => kind.field(),
            BookingError::Validation(fields) | BookingError::Rejected { fields } => {
                fields.first().map(|f| f.field.as_str())
            }
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            BookingError::Conflict(kind) => kind
                .field()
                .map(|field| vec![FieldError::new(field, kind.message())])
                .unwrap_or_default(),
            BookingError::Validation(fields) | BookingError::Rejected { fields } => fields.clone(),
            _ => Vec::new(),
        }
    }

    /// 給使用者看的訊息；無法辨識的錯誤一律降級為通用提示
    pub fn user_friendly_message(&self) -> String {
        match self {
            BookingError::Conflict(kind) => kind.message(),
            BookingError::Validation(fields) | BookingError::Rejected { fields } => {
                format_fields(fields)
            }
            BookingError::Unauthorized => "Please log in again to continue".to_string(),
            BookingError::DuplicateSubmission => {
                "This booking is already being submitted, please wait".to_string()
            }
            BookingError::Session { message } => format!("Session problem: {}", message),
            BookingError::ConfigValidationError { .. }
            | BookingError::MissingConfigError { .. }
            | BookingError::InvalidConfigValueError { .. } => self.to_string(),
            _ => "Something went wrong, please try again".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BookingError::Network(_) => "Check that the booking API is reachable and the URL is correct",
            BookingError::Status { .. } | BookingError::Decode { .. } => {
                "The booking API rejected the request; try again or contact an administrator"
            }
            BookingError::Conflict(ConflictKind::SlotTaken) => {
                "Run `slots` again to see the currently free time slots"
            }
            BookingError::Conflict(_) => "Correct the highlighted field and submit again",
            BookingError::Rejected { .. } | BookingError::Validation(_) => {
                "Correct the listed fields and submit again"
            }
            BookingError::DuplicateSubmission => "Wait for the pending submission to finish",
            BookingError::Unauthorized | BookingError::Session { .. } => {
                "Run `login` to start a new session"
            }
            BookingError::ConfigValidationError { .. }
            | BookingError::MissingConfigError { .. }
            | BookingError::InvalidConfigValueError { .. } => {
                "Check the configuration file, environment variables and command line flags"
            }
            BookingError::IoError(_)
            | BookingError::SerializationError(_)
            | BookingError::CsvError(_) => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_field() {
        let err = BookingError::Conflict(ConflictKind::DuplicatePhone);
        assert_eq!(err.field(), Some("phone"));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.exit_code(), 2);
        assert!(err.user_friendly_message().contains("phone number"));
    }

    #[test]
    fn test_unknown_failures_degrade_to_generic_message() {
        let err = BookingError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Something went wrong, please try again");
        assert_eq!(err.field(), None);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_validation_collects_all_fields() {
        let err = BookingError::Validation(vec![
            FieldError::new("email", "Invalid email"),
            FieldError::new("phone", "Invalid phone"),
        ]);
        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(err.field(), Some("email"));
        assert!(err.to_string().contains("phone: Invalid phone"));
    }

    #[test]
    fn test_other_conflict_has_no_field() {
        let err = BookingError::Conflict(ConflictKind::Other {
            constraint: "offices_name_key".to_string(),
        });
        assert!(err.field_errors().is_empty());
        assert!(err.user_friendly_message().contains("offices_name_key"));
    }
}
