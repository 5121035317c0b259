//! The canonical patient record.
//!
//! A [`Patient`] owns three append-only collections (medical history,
//! appointments, risk assessments) plus cached copies of the most recent
//! risk verdict. Entries are pushed, never edited or removed; the cached
//! `latest_*` fields must always mirror the tail of `risk_assessments`
//! and are written only by the assessment orchestrator in
//! [`crate::service`].

use carenet_types::{FinancialScore, TreatmentStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::risk::Verdict;

/// Risk classification bands derived from the assessed probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = crate::CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(RiskLevel::Low),
            "Medium" => Ok(RiskLevel::Medium),
            "High" => Ok(RiskLevel::High),
            other => Err(crate::CareError::InvalidInput(format!(
                "unknown risk level: {other}"
            ))),
        }
    }
}

/// One encounter in the continuity-of-care record.
///
/// Cross-provider encounters and transfer events share this shape; transfer
/// entries carry the fixed treatments "Transfer out" / "Transfer in".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryEntry {
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub doctor: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Missed,
    Cancelled,
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
}

/// One completed risk computation, appended by the orchestrator.
///
/// This sequence is the full audit trail of every assessment ever run for
/// the patient. Entries are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentRecord {
    pub assessed_at: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub risk_probability: u8,
    pub primary_reasons: Vec<String>,
    pub recommendation: String,
}

/// Input for patient registration. Unset numeric fields fall back to the
/// same defaults the intake form applies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub treatment_stage: TreatmentStage,
    #[serde(default)]
    pub financial_score: FinancialScore,
    #[serde(default)]
    pub enrolled_schemes: Vec<String>,
    #[serde(default)]
    pub current_hospital: String,
    #[serde(default)]
    pub follow_up_calls_received: u32,
    #[serde(default)]
    pub missed_appointments: u32,
    #[serde(default)]
    pub days_since_last_visit: u32,
    #[serde(default)]
    pub hospital_delay_days: u32,
    #[serde(default)]
    pub aadhaar_last4: Option<String>,
    #[serde(default)]
    pub aadhaar_verified: bool,
    /// Optional first diagnosis; recorded as an "Initial registration"
    /// history entry at the registering hospital.
    #[serde(default)]
    pub initial_diagnosis: Option<String>,
}

/// Request body for appending an appointment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

/// The patient record root entity.
///
/// `id` is the storage-internal identifier (32 lowercase hex characters,
/// also the sharded directory name on disk); `patient_id` is the stable
/// human-readable identifier handed to care staff. Both are immutable
/// after registration and either may be used for lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub treatment_stage: TreatmentStage,
    #[serde(default)]
    pub financial_score: FinancialScore,
    #[serde(default)]
    pub scheme_enrolled: bool,
    #[serde(default)]
    pub enrolled_schemes: Vec<String>,
    #[serde(default)]
    pub current_hospital: String,
    #[serde(default)]
    pub follow_up_calls_received: u32,
    #[serde(default)]
    pub missed_appointments: u32,
    #[serde(default)]
    pub days_since_last_visit: u32,
    #[serde(default)]
    pub hospital_delay_days: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub aadhaar_last4: Option<String>,
    #[serde(default)]
    pub aadhaar_verified: bool,
    #[serde(default)]
    pub medical_history: Vec<MedicalHistoryEntry>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub risk_assessments: Vec<RiskAssessmentRecord>,
    /// Cached copy of the last assessment's level; `None` before the first
    /// assessment. Written only by the orchestrator.
    #[serde(default)]
    pub latest_risk_level: Option<RiskLevel>,
    /// Cached copy of the last assessment's probability; `None` before the
    /// first assessment. Written only by the orchestrator.
    #[serde(default)]
    pub latest_risk_probability: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped by the store on every save.
    #[serde(default)]
    pub version: u64,
}

impl Patient {
    /// Builds a fresh record from registration input.
    ///
    /// Assigns both identifiers and, when an initial diagnosis is given,
    /// appends the first history entry at the registering hospital. The
    /// first risk assessment is the caller's responsibility.
    pub fn register(new: NewPatient, now: DateTime<Utc>) -> Self {
        let raw_uuid = Uuid::new_v4().simple().to_string();
        let patient_id = format!("PT-{}", &raw_uuid[0..8]);

        let mut enrolled_schemes = Vec::new();
        for scheme in new.enrolled_schemes {
            if !enrolled_schemes.contains(&scheme) {
                enrolled_schemes.push(scheme);
            }
        }
        let scheme_enrolled = !enrolled_schemes.is_empty();

        let mut patient = Self {
            id: raw_uuid,
            patient_id,
            name: new.name,
            age: new.age,
            gender: new.gender,
            phone: new.phone,
            disease: new.disease,
            treatment_stage: new.treatment_stage,
            financial_score: new.financial_score,
            scheme_enrolled,
            enrolled_schemes,
            current_hospital: new.current_hospital,
            follow_up_calls_received: new.follow_up_calls_received,
            missed_appointments: new.missed_appointments,
            days_since_last_visit: new.days_since_last_visit,
            hospital_delay_days: new.hospital_delay_days,
            is_active: true,
            aadhaar_last4: new.aadhaar_last4,
            aadhaar_verified: new.aadhaar_verified,
            medical_history: Vec::new(),
            appointments: Vec::new(),
            risk_assessments: Vec::new(),
            latest_risk_level: None,
            latest_risk_probability: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        if let Some(diagnosis) = new.initial_diagnosis {
            patient.medical_history.push(MedicalHistoryEntry {
                hospital: patient.current_hospital.clone(),
                diagnosis,
                treatment: String::new(),
                doctor: String::new(),
                date: now,
                notes: "Initial registration".to_string(),
            });
        }

        patient
    }

    /// Appends a verdict to the assessment history and refreshes the
    /// cached fields in the same step.
    ///
    /// Restricted to the crate so the orchestrator stays the only write
    /// path for `risk_assessments` and `latest_*`.
    pub(crate) fn apply_verdict(&mut self, verdict: Verdict, assessed_at: DateTime<Utc>) {
        self.latest_risk_level = Some(verdict.level);
        self.latest_risk_probability = Some(verdict.probability);
        self.risk_assessments.push(RiskAssessmentRecord {
            assessed_at,
            risk_level: verdict.level,
            risk_probability: verdict.probability,
            primary_reasons: verdict.reasons,
            recommendation: verdict.recommendation,
        });
        self.updated_at = assessed_at;
    }

    /// Adds a scheme to the enrolled set if absent. Returns whether the
    /// set changed; `scheme_enrolled` is kept in sync either way.
    pub(crate) fn enroll_scheme(&mut self, scheme_name: &str) -> bool {
        let added = if self.enrolled_schemes.iter().any(|s| s == scheme_name) {
            false
        } else {
            self.enrolled_schemes.push(scheme_name.to_string());
            true
        };
        self.scheme_enrolled = !self.enrolled_schemes.is_empty();
        added
    }
}
