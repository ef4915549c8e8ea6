use crate::domain::model::{parse_time, Slot};
use crate::utils::error::{BookingError, FieldError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// 從伺服器回傳的時段推導出可選的時段
///
/// 只保留 `date` 當天、未被預約、且（若為今天）尚未開始的時段。
/// 同一開始時間出現多次時，只要其中一筆已被預約就視為不可選。
/// 結果依開始時間排序。
pub fn selectable_slots(slots: &[Slot], date: NaiveDate, now: NaiveDateTime) -> Vec<Slot> {
    let mut by_start: BTreeMap<NaiveTime, Slot> = BTreeMap::new();
    let mut booked_starts = Vec::new();

    for slot in slots.iter().filter(|s| s.date == date) {
        if slot.slot_end <= slot.slot_start {
            tracing::debug!("Skipping malformed slot {}", slot.label());
            continue;
        }
        if slot.is_booked {
            booked_starts.push(slot.slot_start);
            continue;
        }
        by_start.entry(slot.slot_start).or_insert_with(|| slot.clone());
    }

    for start in booked_starts {
        by_start.remove(&start);
    }

    by_start
        .into_values()
        .filter(|slot| date > now.date() || (date == now.date() && slot.slot_start > now.time()))
        .collect()
}

/// 檢查目標日期：不可早於今天，也不可超過可預約範圍
pub fn validate_target_date(date: NaiveDate, today: NaiveDate, horizon_days: i64) -> Result<()> {
    check_target_date(date, today, horizon_days)
        .map_err(|field_error| BookingError::Validation(vec![field_error]))
}

pub(crate) fn check_target_date(
    date: NaiveDate,
    today: NaiveDate,
    horizon_days: i64,
) -> std::result::Result<(), FieldError> {
    if date < today {
        return Err(FieldError::new(
            "appointment_date",
            "Appointments cannot be booked in the past",
        ));
    }

    let last_day = today + Duration::days(horizon_days);
    if date > last_day {
        return Err(FieldError::new(
            "appointment_date",
            format!(
                "Appointments can only be booked up to {} days ahead (until {})",
                horizon_days, last_day
            ),
        ));
    }

    Ok(())
}

/// 依使用者輸入的開始時間（HH:MM）找出可選時段
pub fn find_slot<'a>(slots: &'a [Slot], start: &str) -> std::result::Result<&'a Slot, FieldError> {
    let wanted = parse_time(start).map_err(|e| FieldError::new("time_slotted", e))?;
    slots
        .iter()
        .find(|slot| slot.slot_start == wanted)
        .ok_or_else(|| {
            FieldError::new(
                "time_slotted",
                format!(
                    "{} is not an available slot for this date",
                    wanted.format("%H:%M")
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(date: NaiveDate, start: (u32, u32), end: (u32, u32), booked: bool) -> Slot {
        Slot {
            date,
            slot_start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            slot_end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            is_booked: booked,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_booked_slots_are_not_selectable() {
        let slots = vec![
            slot(day(20), (9, 0), (9, 30), false),
            slot(day(20), (9, 30), (10, 0), true),
            slot(day(20), (10, 0), (10, 30), false),
        ];

        let result = selectable_slots(&slots, day(20), at(18, 8, 0));
        let labels: Vec<String> = result.iter().map(Slot::label).collect();
        assert_eq!(labels, vec!["09:00 - 09:30", "10:00 - 10:30"]);
    }

    #[test]
    fn test_past_slots_today_are_dropped() {
        let slots = vec![
            slot(day(18), (9, 0), (9, 30), false),
            slot(day(18), (11, 0), (11, 30), false),
        ];

        let result = selectable_slots(&slots, day(18), at(18, 10, 15));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].label(), "11:00 - 11:30");
    }

    #[test]
    fn test_duplicates_other_dates_and_malformed_slots() {
        let slots = vec![
            slot(day(20), (14, 0), (14, 30), false),
            slot(day(20), (9, 0), (9, 30), false),
            slot(day(20), (9, 0), (9, 30), false),
            slot(day(20), (13, 0), (13, 30), false),
            slot(day(20), (13, 0), (13, 30), true),
            slot(day(21), (8, 0), (8, 30), false),
            slot(day(20), (16, 0), (15, 30), false),
        ];

        let result = selectable_slots(&slots, day(20), at(18, 8, 0));
        let labels: Vec<String> = result.iter().map(Slot::label).collect();
        assert_eq!(labels, vec!["09:00 - 09:30", "14:00 - 14:30"]);
    }

    #[test]
    fn test_target_date_bounds() {
        assert!(validate_target_date(day(18), day(18), 30).is_ok());
        assert!(validate_target_date(day(17), day(18), 30).is_err());
        assert!(validate_target_date(day(28), day(18), 10).is_ok());
        assert!(validate_target_date(day(29), day(18), 10).is_err());
    }

    #[test]
    fn test_find_slot() {
        let slots = vec![slot(day(20), (9, 0), (9, 30), false)];
        assert!(find_slot(&slots, "09:00").is_ok());
        assert!(find_slot(&slots, "09:00:00").is_ok());
        assert_eq!(find_slot(&slots, "10:00").unwrap_err().field, "time_slotted");
        assert!(find_slot(&slots, "nine").is_err());
    }
}
