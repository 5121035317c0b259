//! Typed partial updates.
//!
//! [`PatientUpdate`] replaces string-keyed field patching with an explicit
//! request type whose fields are all optional; anything outside this fixed
//! set is rejected at deserialization time. `scheme_enrolled` is absent on
//! purpose: it is derived from `enrolled_schemes` and cannot be set
//! directly.

use carenet_types::{FinancialScore, TreatmentStage};
use serde::Deserialize;

use crate::patient::Patient;

/// The allow-listed mutable attributes of a patient record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub disease: Option<String>,
    pub treatment_stage: Option<TreatmentStage>,
    pub financial_score: Option<FinancialScore>,
    pub enrolled_schemes: Option<Vec<String>>,
    pub current_hospital: Option<String>,
    pub follow_up_calls_received: Option<u32>,
    pub missed_appointments: Option<u32>,
    pub days_since_last_visit: Option<u32>,
    pub hospital_delay_days: Option<u32>,
    pub aadhaar_last4: Option<String>,
    pub aadhaar_verified: Option<bool>,
}

impl PatientUpdate {
    /// True when no field is set; such an update is still a valid
    /// orchestrator round-trip (it re-runs the assessment).
    pub fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.phone.is_none()
            && self.disease.is_none()
            && self.treatment_stage.is_none()
            && self.financial_score.is_none()
            && self.enrolled_schemes.is_none()
            && self.current_hospital.is_none()
            && self.follow_up_calls_received.is_none()
            && self.missed_appointments.is_none()
            && self.days_since_last_visit.is_none()
            && self.hospital_delay_days.is_none()
            && self.aadhaar_last4.is_none()
            && self.aadhaar_verified.is_none()
    }

    /// Copies every set field onto the record.
    ///
    /// A replaced `enrolled_schemes` list is de-duplicated and
    /// `scheme_enrolled` re-derived from the result.
    pub(crate) fn apply(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if let Some(age) = self.age {
            patient.age = age;
        }
        if let Some(gender) = self.gender {
            patient.gender = gender;
        }
        if let Some(phone) = self.phone {
            patient.phone = phone;
        }
        if let Some(disease) = self.disease {
            patient.disease = disease;
        }
        if let Some(stage) = self.treatment_stage {
            patient.treatment_stage = stage;
        }
        if let Some(score) = self.financial_score {
            patient.financial_score = score;
        }
        if let Some(schemes) = self.enrolled_schemes {
            let mut deduped: Vec<String> = Vec::with_capacity(schemes.len());
            for scheme in schemes {
                if !deduped.contains(&scheme) {
                    deduped.push(scheme);
                }
            }
            patient.scheme_enrolled = !deduped.is_empty();
            patient.enrolled_schemes = deduped;
        }
        if let Some(hospital) = self.current_hospital {
            patient.current_hospital = hospital;
        }
        if let Some(calls) = self.follow_up_calls_received {
            patient.follow_up_calls_received = calls;
        }
        if let Some(missed) = self.missed_appointments {
            patient.missed_appointments = missed;
        }
        if let Some(days) = self.days_since_last_visit {
            patient.days_since_last_visit = days;
        }
        if let Some(delay) = self.hospital_delay_days {
            patient.hospital_delay_days = delay;
        }
        if let Some(last4) = self.aadhaar_last4 {
            patient.aadhaar_last4 = Some(last4);
        }
        if let Some(verified) = self.aadhaar_verified {
            patient.aadhaar_verified = verified;
        }
    }
}
