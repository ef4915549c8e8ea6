use crate::config::OutputFormat;
use crate::core::booking::BookingReceipt;
use crate::domain::model::{Appointment, Host, Office, Slot, UserProfile};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;

/// 可輸出成表格／CSV 的資料列
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

impl Tabular for Office {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "location", "active", "description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.location.clone().unwrap_or_default(),
            yes_no(self.is_active),
            self.description.clone().unwrap_or_default(),
        ]
    }
}

impl Tabular for Host {
    fn headers() -> &'static [&'static str] {
        &["user_id", "name", "email", "primary"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.display_name(),
            self.email.clone(),
            yes_no(self.is_primary),
        ]
    }
}

impl Tabular for Slot {
    fn headers() -> &'static [&'static str] {
        &["date", "start", "end"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.date.to_string(),
            self.slot_start.format("%H:%M").to_string(),
            self.slot_end.format("%H:%M").to_string(),
        ]
    }
}

impl Tabular for Appointment {
    fn headers() -> &'static [&'static str] {
        &["id", "date", "time", "office", "host", "status", "citizen", "purpose"]
    }

    fn row(&self) -> Vec<String> {
        let citizen = self
            .citizen
            .as_ref()
            .map(|c| format!("{} {}", c.firstname, c.lastname))
            .unwrap_or_default();
        vec![
            self.id.to_string(),
            self.appointment_date.to_string(),
            self.time_slotted.format("%H:%M").to_string(),
            self.office_id.to_string(),
            self.host_id.to_string(),
            self.status.to_string(),
            citizen,
            self.purpose.clone(),
        ]
    }
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

pub fn render_list<T, W>(items: &[T], format: OutputFormat, out: &mut W) -> Result<()>
where
    T: Tabular + Serialize,
    W: Write,
{
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, items)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(T::headers())?;
            for item in items {
                writer.write_record(item.row())?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = items.iter().map(Tabular::row).collect();
            write_table(T::headers(), &rows, out)?;
        }
    }
    Ok(())
}

fn write_table<W: Write>(headers: &[&str], rows: &[Vec<String>], out: &mut W) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "(no results)")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(headers.iter().map(|h| h.to_uppercase()).collect()))?;
    for row in rows {
        writeln!(out, "{}", line(row.clone()))?;
    }
    Ok(())
}

pub fn render_receipt<W: Write>(
    receipt: &BookingReceipt,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, receipt)?;
            writeln!(out)?;
        }
        OutputFormat::Csv | OutputFormat::Table => {
            writeln!(out, "✅ {}", receipt.message)?;
            writeln!(
                out,
                "   {} {} with {} at {} on {} ({}), status {}",
                receipt.citizen.firstname,
                receipt.citizen.lastname,
                receipt.host.display_name(),
                receipt.office.name,
                receipt.slot.date,
                receipt.slot.label(),
                receipt.status
            )?;
        }
    }
    Ok(())
}

pub fn render_profile<W: Write>(
    profile: &UserProfile,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, profile)?;
            writeln!(out)?;
        }
        OutputFormat::Csv | OutputFormat::Table => {
            let name = [profile.first_name.as_deref(), profile.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let roles = profile
                .roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "user:   {} ({})", profile.email, profile.user_id)?;
            if !name.is_empty() {
                writeln!(out, "name:   {}", name)?;
            }
            writeln!(out, "roles:  {}", roles)?;
            if let Some(office_id) = profile.office_id {
                writeln!(out, "office: {}", office_id)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slots() -> Vec<Slot> {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        vec![
            Slot {
                date,
                slot_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                slot_end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                is_booked: false,
            },
            Slot {
                date,
                slot_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                slot_end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                is_booked: false,
            },
        ]
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        render_list(&slots(), format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_table_output() {
        let table = render(OutputFormat::Table);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "DATE        START  END");
        assert_eq!(lines[1], "2026-10-20  09:00  09:30");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_output() {
        let csv = render(OutputFormat::Csv);
        assert_eq!(csv, "date,start,end\n2026-10-20,09:00,09:30\n2026-10-20,09:30,10:00\n");
    }

    #[test]
    fn test_json_output_keeps_wire_fields() {
        let json: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(json[0]["slot_start"], "09:00:00");
        assert_eq!(json[1]["is_booked"], false);
    }

    #[test]
    fn test_empty_table() {
        let mut out = Vec::new();
        render_list::<Office, _>(&[], OutputFormat::Table, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(no results)\n");
    }
}
