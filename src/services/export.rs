//! Legacy CSV export.
//!
//! Fields are quoted only when they contain a comma, and embedded quotes or
//! line breaks are written as-is. Downstream spreadsheets were built against
//! this output, so it is not RFC 4180.

use crate::models::{attendee::Attendee, vehicle::Vehicle};

pub trait CsvRecord {
    fn headers() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

impl CsvRecord for Vehicle {
    fn headers() -> &'static [&'static str] {
        &["ID", "Vehicle No", "Model", "Capacity", "Driver"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.vehicle_no.clone(),
            self.model.clone().unwrap_or_default(),
            self.capacity.map(|c| c.to_string()).unwrap_or_default(),
            self.driver_name.clone().unwrap_or_default(),
        ]
    }
}

impl CsvRecord for Attendee {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Phone", "Group", "Pickup Point"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.phone.clone().unwrap_or_default(),
            self.group_name.clone().unwrap_or_default(),
            self.pickup_point.clone().unwrap_or_default(),
        ]
    }
}

fn field(value: &str) -> String {
    if value.contains(',') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn row<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| field(value.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn to_csv<R: CsvRecord>(records: &[R]) -> String {
    let mut out = row(R::headers());
    out.push('\n');
    for record in records {
        out.push_str(&row(record.fields().as_slice()));
        out.push('\n');
    }
    out
}
