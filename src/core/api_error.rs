use crate::utils::error::{BookingError, ConflictKind, FieldError};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const UNIQUE_VIOLATION: &str = "UniqueViolationError";
const MAX_RAW_BODY: usize = 200;

/// 唯一性約束名稱對照表（完全比對）
const CONSTRAINTS: &[(&str, ConflictKind)] = &[
    ("citizen_info_phone_key", ConflictKind::DuplicatePhone),
    ("citizen_info_email_key", ConflictKind::DuplicateEmail),
    ("appointments_host_slot_key", ConflictKind::SlotTaken),
    ("appointment_slot_key", ConflictKind::SlotTaken),
    ("uq_appointment_slot", ConflictKind::SlotTaken),
];

static QUOTED_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([A-Za-z0-9_]+)""#).expect("valid constraint regex"));

static CONSTRAINT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z0-9_]+_(?:key|pkey|unique))\b").expect("valid constraint regex")
});

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<Detail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Items(Vec<ValidationItem>),
    Structured(StructuredDetail),
    Message(String),
}

#[derive(Debug, Deserialize)]
struct StructuredDetail {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    constraint: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidationItem {
    #[serde(default)]
    loc: Vec<serde_json::Value>,
    msg: String,
}

/// 將非 2xx 回應轉成 BookingError
pub fn classify(status: u16, body: &str) -> BookingError {
    if status == 401 || status == 403 {
        return BookingError::Unauthorized;
    }

    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.detail);

    match detail {
        Some(Detail::Structured(detail)) => classify_structured(status, detail, body),
        Some(Detail::Items(items)) if status == 422 && !items.is_empty() => {
            BookingError::Rejected {
                fields: items.into_iter().map(field_error_from_item).collect(),
            }
        }
        Some(Detail::Message(message)) => BookingError::Status { status, message },
        _ => BookingError::Status {
            status,
            message: truncate(body),
        },
    }
}

fn classify_structured(status: u16, detail: StructuredDetail, body: &str) -> BookingError {
    let is_unique = detail.error_type.as_deref() == Some(UNIQUE_VIOLATION);
    if is_unique && (status == 409 || status == 422) {
        return BookingError::Conflict(conflict_kind(&detail));
    }

    let message = detail
        .message
        .or(detail.error)
        .unwrap_or_else(|| truncate(body));
    BookingError::Status { status, message }
}

fn conflict_kind(detail: &StructuredDetail) -> ConflictKind {
    if let Some(kind) = detail.field.as_deref().and_then(kind_for_field) {
        return kind;
    }

    let constraint = detail
        .constraint
        .clone()
        .or_else(|| detail.error.as_deref().and_then(extract_constraint));

    match constraint {
        Some(name) => kind_for_constraint(&name),
        None => ConflictKind::Other {
            constraint: "unknown".to_string(),
        },
    }
}

fn kind_for_field(field: &str) -> Option<ConflictKind> {
    match field {
        "phone" => Some(ConflictKind::DuplicatePhone),
        "email" => Some(ConflictKind::DuplicateEmail),
        "time_slotted" | "slot" => Some(ConflictKind::SlotTaken),
        _ => None,
    }
}

pub fn kind_for_constraint(name: &str) -> ConflictKind {
    CONSTRAINTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| kind.clone())
        .unwrap_or_else(|| ConflictKind::Other {
            constraint: name.to_string(),
        })
}

/// 從資料庫錯誤訊息中取出約束名稱：優先取引號內的識別字
pub fn extract_constraint(message: &str) -> Option<String> {
    QUOTED_IDENT
        .captures(message)
        .or_else(|| CONSTRAINT_TOKEN.captures(message))
        .map(|caps| caps[1].to_string())
}

fn field_error_from_item(item: ValidationItem) -> FieldError {
    // loc 例如 ["body", "citizen", "email"]
    let field = item
        .loc
        .iter()
        .rev()
        .find_map(|part| part.as_str().filter(|s| *s != "body").map(str::to_string))
        .unwrap_or_else(|| "request".to_string());
    FieldError::new(field, item.msg)
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_RAW_BODY).collect()
}
