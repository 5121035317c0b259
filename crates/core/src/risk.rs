//! Deterministic risk assessment.
//!
//! [`assess`] is a pure function from a patient's current attributes to a
//! [`Verdict`]. It performs no I/O, has no error path, and returns an
//! identical verdict for identical inputs; this is what makes the
//! assessment history auditable. All weights, caps and band thresholds
//! live in [`RiskPolicy`], resolved once at startup and never mutated.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::patient::{Patient, RiskLevel};
use crate::{CareError, CareResult};

/// The outcome of one risk computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub level: RiskLevel,
    /// 0–100, discretised into `level` by the policy's band thresholds.
    pub probability: u8,
    /// Factors that crossed their individual significance thresholds,
    /// in fixed evaluation order.
    pub reasons: Vec<String>,
    /// Short actionable guidance keyed off the dominant factor and level.
    pub recommendation: String,
}

/// Weights, caps and thresholds for the risk engine.
///
/// These are policy values, not derived at runtime. Defaults are compiled
/// in; deployments may override them with a YAML file (see
/// [`RiskPolicy::from_yaml_str`]). No component mutates the policy after
/// startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskPolicy {
    /// Probability at or above which a patient is Medium risk.
    pub medium_threshold: u8,
    /// Probability at or above which a patient is High risk.
    pub high_threshold: u8,
    /// Points per unit of financial vulnerability (10 - financial score).
    pub financial_weight: f64,
    /// Points per missed appointment, up to `missed_appointments_cap`.
    pub missed_appointment_weight: f64,
    pub missed_appointments_cap: f64,
    /// Days since last visit are divided by this before capping.
    pub days_since_visit_divisor: f64,
    pub days_since_visit_cap: f64,
    /// Flat penalty when no follow-up calls have been made.
    pub no_follow_up_penalty: f64,
    /// Points per day of hospital-side processing delay, capped.
    pub hospital_delay_weight: f64,
    pub hospital_delay_cap: f64,
    /// Flat relief applied once the patient is enrolled in any aid scheme.
    pub scheme_enrollment_relief: f64,
    /// Multiplier growth per treatment stage beyond the first.
    pub stage_multiplier_step: f64,
    /// Per-disease multipliers; unlisted diseases multiply by 1.0.
    pub disease_multipliers: BTreeMap<String, f64>,
    /// Significance thresholds that decide which factors are reported.
    pub financial_reason_max: u8,
    pub missed_reason_min: u32,
    pub days_reason_min: u32,
    pub delay_reason_min: u32,
    pub stage_reason_min: u8,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        let mut disease_multipliers = BTreeMap::new();
        disease_multipliers.insert("TB".to_string(), 1.15);
        disease_multipliers.insert("Cancer".to_string(), 1.25);
        disease_multipliers.insert("Heart Disease".to_string(), 1.2);
        disease_multipliers.insert("Kidney Disease".to_string(), 1.2);
        disease_multipliers.insert("Diabetes".to_string(), 1.1);
        disease_multipliers.insert("Maternal Care".to_string(), 1.1);

        Self {
            medium_threshold: 40,
            high_threshold: 70,
            financial_weight: 3.5,
            missed_appointment_weight: 6.0,
            missed_appointments_cap: 25.0,
            days_since_visit_divisor: 3.0,
            days_since_visit_cap: 20.0,
            no_follow_up_penalty: 5.0,
            hospital_delay_weight: 1.5,
            hospital_delay_cap: 15.0,
            scheme_enrollment_relief: 5.0,
            stage_multiplier_step: 0.08,
            disease_multipliers,
            financial_reason_max: 3,
            missed_reason_min: 3,
            days_reason_min: 30,
            delay_reason_min: 7,
            stage_reason_min: 3,
        }
    }
}

impl RiskPolicy {
    /// Parses a policy override from YAML. Fields absent from the document
    /// keep their compiled-in defaults.
    pub fn from_yaml_str(yaml: &str) -> CareResult<Self> {
        let policy: RiskPolicy =
            serde_yaml::from_str(yaml).map_err(CareError::YamlDeserialization)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Rejects band thresholds that cannot be discretised sensibly.
    pub fn validate(&self) -> CareResult<()> {
        if self.medium_threshold >= self.high_threshold {
            return Err(CareError::InvalidInput(
                "risk policy mediumThreshold must be below highThreshold".into(),
            ));
        }
        if self.high_threshold > 100 {
            return Err(CareError::InvalidInput(
                "risk policy highThreshold must be at most 100".into(),
            ));
        }
        Ok(())
    }

    /// Discretises a probability into its risk band.
    pub fn level_for(&self, probability: u8) -> RiskLevel {
        if probability >= self.high_threshold {
            RiskLevel::High
        } else if probability >= self.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// The contributing factors tracked for dominance and explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Factor {
    Financial,
    MissedAppointments,
    Inactivity,
    FollowUp,
    HospitalDelay,
}

/// Computes a risk verdict from the patient's current attributes.
///
/// Missing or default field values contribute zero rather than failing:
/// a freshly registered patient with no engagement signals scores low.
pub fn assess(patient: &Patient, policy: &RiskPolicy) -> Verdict {
    let financial_gap = f64::from(10 - patient.financial_score.get().min(10));
    let financial = financial_gap * policy.financial_weight;
    let missed = (f64::from(patient.missed_appointments) * policy.missed_appointment_weight)
        .min(policy.missed_appointments_cap);
    let inactivity = (f64::from(patient.days_since_last_visit) / policy.days_since_visit_divisor)
        .min(policy.days_since_visit_cap);
    let follow_up = if patient.follow_up_calls_received == 0 {
        policy.no_follow_up_penalty
    } else {
        0.0
    };
    let delay = (f64::from(patient.hospital_delay_days) * policy.hospital_delay_weight)
        .min(policy.hospital_delay_cap);

    let mut subtotal = financial + missed + inactivity + follow_up + delay;
    if patient.scheme_enrolled {
        subtotal -= policy.scheme_enrollment_relief;
    }

    let disease_multiplier = policy
        .disease_multipliers
        .get(&patient.disease)
        .copied()
        .unwrap_or(1.0);
    let stage_multiplier =
        1.0 + policy.stage_multiplier_step * f64::from(patient.treatment_stage.get() - 1);

    let probability = (subtotal * disease_multiplier * stage_multiplier)
        .round()
        .clamp(0.0, 100.0) as u8;
    let level = policy.level_for(probability);

    let mut reasons = Vec::new();
    if patient.financial_score.get() <= policy.financial_reason_max {
        reasons.push(format!(
            "Financial score {} indicates economic vulnerability",
            patient.financial_score.get()
        ));
    }
    if patient.missed_appointments >= policy.missed_reason_min {
        reasons.push(format!(
            "{} missed appointments",
            patient.missed_appointments
        ));
    }
    if patient.days_since_last_visit >= policy.days_reason_min {
        reasons.push(format!(
            "{} days since last visit",
            patient.days_since_last_visit
        ));
    }
    if patient.follow_up_calls_received == 0 {
        reasons.push("No follow-up calls received".to_string());
    }
    if patient.hospital_delay_days >= policy.delay_reason_min {
        reasons.push(format!(
            "Hospital processing delay of {} days",
            patient.hospital_delay_days
        ));
    }
    if patient.treatment_stage.get() >= policy.stage_reason_min {
        reasons.push(format!(
            "Advanced treatment stage ({} of 4)",
            patient.treatment_stage.get()
        ));
    }
    if disease_multiplier > 1.0 && !patient.disease.is_empty() {
        reasons.push(format!("High-risk condition: {}", patient.disease));
    }

    let contributions = [
        (Factor::Financial, financial),
        (Factor::MissedAppointments, missed),
        (Factor::Inactivity, inactivity),
        (Factor::FollowUp, follow_up),
        (Factor::HospitalDelay, delay),
    ];
    // Ties resolve to the earlier factor, keeping the verdict deterministic.
    let dominant = contributions
        .iter()
        .fold(contributions[0], |best, &candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0;

    let recommendation = recommendation_for(dominant, level);

    Verdict {
        level,
        probability,
        reasons,
        recommendation,
    }
}

fn recommendation_for(dominant: Factor, level: RiskLevel) -> String {
    let text = match (level, dominant) {
        (RiskLevel::Low, _) => "Continue routine monitoring and scheduled check-ups",
        (RiskLevel::Medium, Factor::Financial) => {
            "Review aid-scheme eligibility and discuss enrollment options"
        }
        (RiskLevel::Medium, Factor::MissedAppointments) => {
            "Schedule an outreach call to reschedule missed appointments"
        }
        (RiskLevel::Medium, Factor::Inactivity) => {
            "Book a follow-up visit; the patient has not been seen recently"
        }
        (RiskLevel::Medium, Factor::FollowUp) => {
            "Begin regular follow-up calls within the next two weeks"
        }
        (RiskLevel::Medium, Factor::HospitalDelay) => {
            "Check pending hospital processes and chase outstanding reports"
        }
        (RiskLevel::High, Factor::Financial) => {
            "Fast-track financial aid enrollment and assign a social worker"
        }
        (RiskLevel::High, Factor::MissedAppointments) => {
            "Immediate outreach call and appointment rescheduling"
        }
        (RiskLevel::High, Factor::Inactivity) => {
            "Urgent home visit or tele-consultation; re-engage the patient"
        }
        (RiskLevel::High, Factor::FollowUp) => {
            "Start follow-up calls today and confirm the next appointment"
        }
        (RiskLevel::High, Factor::HospitalDelay) => {
            "Escalate the processing delay to the facility coordinator"
        }
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{NewPatient, Patient};
    use carenet_types::{FinancialScore, TreatmentStage};
    use chrono::Utc;

    fn patient_with(f: impl FnOnce(&mut Patient)) -> Patient {
        let mut patient = Patient::register(
            NewPatient {
                name: "Test Patient".to_string(),
                current_hospital: "Hosp-A".to_string(),
                ..NewPatient::default()
            },
            Utc::now(),
        );
        f(&mut patient);
        patient
    }

    #[test]
    fn identical_attributes_yield_identical_verdicts() {
        let policy = RiskPolicy::default();
        let patient = patient_with(|p| {
            p.financial_score = FinancialScore::new(2).unwrap();
            p.missed_appointments = 4;
            p.days_since_last_visit = 60;
            p.disease = "TB".to_string();
        });

        let first = assess(&patient, &policy);
        for _ in 0..10 {
            assert_eq!(assess(&patient, &policy), first);
        }
    }

    #[test]
    fn disengaged_poor_patient_is_high_risk() {
        // Spec scenario: missed=5, 90 days inactive, financial score 1.
        let policy = RiskPolicy::default();
        let patient = patient_with(|p| {
            p.financial_score = FinancialScore::new(1).unwrap();
            p.missed_appointments = 5;
            p.days_since_last_visit = 90;
        });

        let verdict = assess(&patient, &policy);
        assert_eq!(verdict.level, RiskLevel::High);
        assert!(verdict.probability >= 70);
        assert!(!verdict.reasons.is_empty());
        assert!(verdict
            .reasons
            .iter()
            .any(|r| r.contains("5 missed appointments")));
        assert!(verdict
            .reasons
            .iter()
            .any(|r| r.contains("90 days since last visit")));
    }

    #[test]
    fn engaged_stable_patient_is_low_risk() {
        let policy = RiskPolicy::default();
        let patient = patient_with(|p| {
            p.financial_score = FinancialScore::new(8).unwrap();
            p.follow_up_calls_received = 3;
            p.days_since_last_visit = 10;
        });

        let verdict = assess(&patient, &policy);
        assert_eq!(verdict.level, RiskLevel::Low);
        assert!(verdict.probability < 40);
    }

    #[test]
    fn default_record_does_not_panic_and_scores_low() {
        let policy = RiskPolicy::default();
        let patient = patient_with(|_| {});
        let verdict = assess(&patient, &policy);
        assert_eq!(verdict.level, RiskLevel::Low);
    }

    #[test]
    fn band_boundaries_follow_policy_thresholds() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.level_for(0), RiskLevel::Low);
        assert_eq!(policy.level_for(39), RiskLevel::Low);
        assert_eq!(policy.level_for(40), RiskLevel::Medium);
        assert_eq!(policy.level_for(69), RiskLevel::Medium);
        assert_eq!(policy.level_for(70), RiskLevel::High);
        assert_eq!(policy.level_for(100), RiskLevel::High);
    }

    #[test]
    fn scheme_enrollment_lowers_probability() {
        let policy = RiskPolicy::default();
        let unenrolled = patient_with(|p| {
            p.financial_score = FinancialScore::new(2).unwrap();
            p.missed_appointments = 3;
        });
        let enrolled = patient_with(|p| {
            p.financial_score = FinancialScore::new(2).unwrap();
            p.missed_appointments = 3;
            p.enroll_scheme("State health card");
        });

        let without = assess(&unenrolled, &policy);
        let with = assess(&enrolled, &policy);
        assert!(with.probability < without.probability);
    }

    #[test]
    fn advanced_stage_raises_probability() {
        let policy = RiskPolicy::default();
        let early = patient_with(|p| {
            p.financial_score = FinancialScore::new(2).unwrap();
            p.missed_appointments = 3;
        });
        let late = patient_with(|p| {
            p.financial_score = FinancialScore::new(2).unwrap();
            p.missed_appointments = 3;
            p.treatment_stage = TreatmentStage::new(4).unwrap();
        });

        assert!(assess(&late, &policy).probability > assess(&early, &policy).probability);
        assert!(assess(&late, &policy)
            .reasons
            .iter()
            .any(|r| r.contains("stage (4 of 4)")));
    }

    #[test]
    fn recommendation_tracks_dominant_factor() {
        let policy = RiskPolicy::default();
        let patient = patient_with(|p| {
            p.financial_score = FinancialScore::new(0).unwrap();
            p.days_since_last_visit = 30;
            p.follow_up_calls_received = 2;
        });
        let verdict = assess(&patient, &policy);
        assert_eq!(verdict.level, RiskLevel::Medium);
        assert!(verdict.recommendation.contains("aid"));
    }

    #[test]
    fn policy_yaml_overrides_merge_with_defaults() {
        let policy = RiskPolicy::from_yaml_str("highThreshold: 80\n").unwrap();
        assert_eq!(policy.high_threshold, 80);
        assert_eq!(policy.medium_threshold, 40);
    }

    #[test]
    fn policy_rejects_inverted_thresholds() {
        let err = RiskPolicy::from_yaml_str("mediumThreshold: 90\nhighThreshold: 50\n");
        assert!(matches!(err, Err(crate::CareError::InvalidInput(_))));
    }
}
