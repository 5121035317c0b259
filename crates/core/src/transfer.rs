//! Continuity-of-care transfer workflow.
//!
//! Moving a patient between providers appends a paired "Transfer out" /
//! "Transfer in" record to the medical history (out first, both stamped
//! with the same instant) and embeds a short summary of recent encounters
//! in the outgoing note, so the receiving provider can reconstruct recent
//! context without pulling the full history. The persistence, locking and
//! re-assessment around these pure steps live in [`crate::service`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::patient::{MedicalHistoryEntry, Patient};

/// Number of most-recent encounters embedded in the outgoing note.
pub const SUMMARY_ENTRY_LIMIT: usize = 5;

/// Sentinel summary for patients with no recorded encounters.
pub const NO_PRIOR_HISTORY: &str = "No prior history";

pub const TRANSFER_OUT_LABEL: &str = "Transfer out";
pub const TRANSFER_IN_LABEL: &str = "Transfer in";

/// Renders the most recent history entries, newest first, as
/// `hospital | diagnosis | YYYY-MM-DD` joined with `"; "`.
pub(crate) fn summarise_recent_history(history: &[MedicalHistoryEntry]) -> String {
    if history.is_empty() {
        return NO_PRIOR_HISTORY.to_string();
    }

    history
        .iter()
        .rev()
        .take(SUMMARY_ENTRY_LIMIT)
        .map(|entry| {
            format!(
                "{} | {} | {}",
                entry.hospital,
                entry.diagnosis,
                entry.date.format("%Y-%m-%d")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies a transfer to the record: paired history entries (out before
/// in), then the active-provider pointer. Returns the previous hospital
/// for the audit trail.
///
/// The caller has already validated `new_hospital` and holds the
/// per-patient lock.
pub(crate) fn apply_transfer(
    patient: &mut Patient,
    new_hospital: &str,
    reason: Option<&str>,
    receiving_doctor: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let previous_hospital = patient.current_hospital.clone();
    let reason = reason.unwrap_or("Not specified");
    let doctor = receiving_doctor.unwrap_or("").to_string();
    let summary = summarise_recent_history(&patient.medical_history);

    patient.medical_history.push(MedicalHistoryEntry {
        hospital: previous_hospital.clone(),
        diagnosis: patient.disease.clone(),
        treatment: TRANSFER_OUT_LABEL.to_string(),
        doctor: doctor.clone(),
        date: now,
        notes: format!("Transfer to {new_hospital}. Reason: {reason}. Summary: {summary}"),
    });
    patient.medical_history.push(MedicalHistoryEntry {
        hospital: new_hospital.to_string(),
        diagnosis: patient.disease.clone(),
        treatment: TRANSFER_IN_LABEL.to_string(),
        doctor,
        date: now,
        notes: format!("Transferred from {previous_hospital}. Reason: {reason}"),
    });

    patient.current_hospital = new_hospital.to_string();
    patient.updated_at = now;

    previous_hospital
}

/// One row of the cross-provider history projection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub hospital: String,
    pub diagnosis: String,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub doctor: String,
}

/// Read-only projection of the continuity-of-care record: entries with a
/// named hospital, newest first. Entries sharing a timestamp (the transfer
/// pairs) surface in reverse push order, so a transfer-in precedes its
/// transfer-out.
pub fn history_projection(patient: &Patient) -> Vec<HistoryEntryView> {
    let mut entries: Vec<HistoryEntryView> = patient
        .medical_history
        .iter()
        .rev()
        .filter(|entry| !entry.hospital.is_empty())
        .map(|entry| HistoryEntryView {
            hospital: entry.hospital.clone(),
            diagnosis: entry.diagnosis.clone(),
            date: entry.date,
            notes: entry.notes.clone(),
            doctor: entry.doctor.clone(),
        })
        .collect();
    // Stable sort over the reversed sequence keeps same-instant pairs in
    // reverse push order.
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
}
