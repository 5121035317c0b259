//! Aid-scheme recommendation.
//!
//! A fixed catalogue of government aid programmes is evaluated rule by
//! rule against a patient's attributes and latest cached risk verdict.
//! Rules fire independently and results keep catalogue order; they are
//! never re-ranked by relevance. The catalogue is immutable configuration
//! loaded once at startup.

use serde::{Deserialize, Serialize};

use crate::patient::{Patient, RiskLevel};

/// A single programme in the aid catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    pub name: String,
    pub benefit: String,
    pub eligibility: String,
    pub application_link: String,
}

/// One matched programme, annotated for the requesting patient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeRecommendation {
    pub name: String,
    pub benefit: String,
    pub eligibility: String,
    pub application_link: String,
    /// True on every match iff the patient's latest risk level is High.
    pub urgent: bool,
    /// True iff the patient is already enrolled in this scheme.
    pub enrolled: bool,
}

/// The eligibility predicates, one per catalogue entry, applied in
/// catalogue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemeRule {
    /// financial score below 4
    UniversalCover,
    /// disease is TB
    TbNutrition,
    /// age above 60
    ElderCare,
    /// disease is Maternal Care
    MaternalCare,
    /// financial score below 6 and disease is Diabetes
    GovernmentEmployee,
    /// financial score below 6 (catch-all)
    StateCard,
}

impl SchemeRule {
    fn matches(&self, patient: &Patient) -> bool {
        let financial = patient.financial_score.get();
        match self {
            SchemeRule::UniversalCover => financial < 4,
            SchemeRule::TbNutrition => patient.disease == "TB",
            SchemeRule::ElderCare => patient.age > 60,
            SchemeRule::MaternalCare => patient.disease == "Maternal Care",
            SchemeRule::GovernmentEmployee => financial < 6 && patient.disease == "Diabetes",
            SchemeRule::StateCard => financial < 6,
        }
    }
}

/// The immutable programme catalogue with its paired eligibility rules.
#[derive(Debug, Clone)]
pub struct SchemeCatalogue {
    entries: Vec<(SchemeRule, Scheme)>,
}

impl Default for SchemeCatalogue {
    fn default() -> Self {
        fn scheme(name: &str, benefit: &str, eligibility: &str, link: &str) -> Scheme {
            Scheme {
                name: name.to_string(),
                benefit: benefit.to_string(),
                eligibility: eligibility.to_string(),
                application_link: link.to_string(),
            }
        }

        Self {
            entries: vec![
                (
                    SchemeRule::UniversalCover,
                    scheme(
                        "Ayushman Bharat PM-JAY",
                        "Health cover of ₹5 lakh per family per year for secondary and tertiary care.",
                        "Families in bottom 40% as per SECC; no age or size cap.",
                        "https://www.pmjay.gov.in/",
                    ),
                ),
                (
                    SchemeRule::TbNutrition,
                    scheme(
                        "Nikshay Poshan Yojana (₹500/month)",
                        "₹500 per month nutritional support for TB patients during treatment.",
                        "All notified TB patients.",
                        "https://tbcindia.gov.in/",
                    ),
                ),
                (
                    SchemeRule::ElderCare,
                    scheme(
                        "Rashtriya Vayoshri Yojana",
                        "Assisted living devices for senior citizens (hearing aids, wheelchairs, etc.).",
                        "Senior citizens from BPL families, 60+ years.",
                        "https://www.elderly.gov.in/",
                    ),
                ),
                (
                    SchemeRule::MaternalCare,
                    scheme(
                        "Janani Suraksha Yojana",
                        "Cash assistance for institutional delivery and maternal care.",
                        "Pregnant women from BPL/SC/ST families.",
                        "https://nhm.gov.in/index1.php?lang=1&level=1&sublinkid=819&lid=221",
                    ),
                ),
                (
                    SchemeRule::GovernmentEmployee,
                    scheme(
                        "CGHS scheme",
                        "Central government health scheme for comprehensive medical care.",
                        "Central govt employees/pensioners; certain conditions for others.",
                        "https://cghs.gov.in/",
                    ),
                ),
                (
                    SchemeRule::StateCard,
                    scheme(
                        "State health card",
                        "State-specific health insurance and subsidized care.",
                        "Varies by state; typically low-income families.",
                        "https://www.india.gov.in/",
                    ),
                ),
            ],
        }
    }
}

impl SchemeCatalogue {
    /// Evaluates every rule against the patient and returns the matched
    /// programmes in catalogue order.
    ///
    /// Pure and stateless: urgency comes from the patient's cached
    /// `latest_risk_level`, not a fresh assessment, so a stale cache is
    /// visible here by design (the orchestrator keeps it fresh).
    pub fn recommend(&self, patient: &Patient) -> Vec<SchemeRecommendation> {
        let urgent = patient.latest_risk_level == Some(RiskLevel::High);

        self.entries
            .iter()
            .filter(|(rule, _)| rule.matches(patient))
            .map(|(_, scheme)| SchemeRecommendation {
                name: scheme.name.clone(),
                benefit: scheme.benefit.clone(),
                eligibility: scheme.eligibility.clone(),
                application_link: scheme.application_link.clone(),
                urgent,
                enrolled: patient.enrolled_schemes.iter().any(|s| s == &scheme.name),
            })
            .collect()
    }
}
