use crate::models::{Coordinates, ListingRecord};
use std::collections::HashSet;

/// Identity key of a place: both axes rounded to six decimals.
///
/// Exact midpoints between two sixth-decimal steps round away from zero, so
/// `55.0078125` keys as `55.007813`, the same as `55.0078130`.
pub fn coordinate_key(coordinates: &Coordinates) -> String {
    format!("{},{}", fixed6(coordinates.lat), fixed6(coordinates.lon))
}

fn fixed6(value: f64) -> String {
    // An f64 sits exactly halfway between two 1e-6 steps only when it is an
    // odd multiple of 1/128
    let scaled = value * 128.0;
    if scaled.is_finite() && scaled.fract() == 0.0 && scaled.abs() < 1e15 {
        let m = scaled as i128;
        if m % 2 != 0 {
            let micros = (m * 15_625 + m.signum()) / 2;
            let sign = if micros < 0 { "-" } else { "" };
            let micros = micros.unsigned_abs();
            return format!("{}{}.{:06}", sign, micros / 1_000_000, micros % 1_000_000);
        }
    }
    // No "-0.000000" for negative zero
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.6}", value)
}

/// Accept `record` unless it lacks coordinates or its key was already seen.
/// Accepted keys are recorded in `seen`.
pub fn admit(record: &ListingRecord, seen: &mut HashSet<String>) -> bool {
    match &record.coordinates {
        Some(coordinates) => seen.insert(coordinate_key(coordinates)),
        None => false,
    }
}

/// Records gathered for the region currently being collected
#[derive(Debug, Default)]
pub struct CollectionState {
    accumulated: Vec<ListingRecord>,
    seen: HashSet<String>,
    request_count: usize,
    sealed: bool,
}

/// Counts from feeding one batch of parsed records into the state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmitReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub without_coordinates: usize,
}

impl CollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.accumulated.len()
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn record_request(&mut self) -> usize {
        self.request_count += 1;
        self.request_count
    }

    /// Append every record that passes the coordinate filter, in order
    pub fn extend(&mut self, records: impl IntoIterator<Item = ListingRecord>) -> AdmitReport {
        let mut report = AdmitReport::default();
        if self.sealed {
            return report;
        }
        for record in records {
            if record.coordinates.is_none() {
                report.without_coordinates += 1;
            } else if admit(&record, &mut self.seen) {
                self.accumulated.push(record);
                report.accepted += 1;
            } else {
                report.duplicates += 1;
            }
        }
        report
    }

    /// Stop accepting records and hand back what was gathered
    pub fn seal(&mut self) -> Vec<ListingRecord> {
        self.sealed = true;
        std::mem::take(&mut self.accumulated)
    }
}
