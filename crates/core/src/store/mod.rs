//! Patient record storage.
//!
//! The engine talks to storage through the [`PatientStore`] trait:
//! - [`MemoryStore`] backs tests and single-process development,
//! - [`JsonFileStore`] persists records as sharded JSON documents on disk.
//!
//! Both drivers enforce an optimistic version check on `save`: a stale
//! `version` fails with [`CareError::Conflict`], and the caller must retry
//! the whole operation from a fresh load.

mod fs;
mod memory;

pub use fs::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::CareResult;
use crate::patient::{Patient, RiskLevel};

/// Filter for active-patient listings. All criteria are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub risk_level: Option<RiskLevel>,
    /// Exact match on the clinical category.
    pub disease: Option<String>,
    /// Case-insensitive substring match on the active provider.
    pub hospital: Option<String>,
}

impl PatientFilter {
    pub(crate) fn matches(&self, patient: &Patient) -> bool {
        if !patient.is_active {
            return false;
        }
        if let Some(level) = self.risk_level {
            if patient.latest_risk_level != Some(level) {
                return false;
            }
        }
        if let Some(disease) = &self.disease {
            if &patient.disease != disease {
                return false;
            }
        }
        if let Some(hospital) = &self.hospital {
            if !patient
                .current_hospital
                .to_lowercase()
                .contains(&hospital.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Storage driver boundary for patient records.
pub trait PatientStore: Send + Sync {
    /// Fetches by storage-internal id; `Ok(None)` when absent.
    fn load(&self, storage_id: &str) -> CareResult<Option<Patient>>;

    /// Fetches by the stable human-readable `patient_id`.
    fn find_by_patient_id(&self, patient_id: &str) -> CareResult<Option<Patient>>;

    /// Persists a brand-new record. Fails `Conflict` if the id exists.
    fn insert(&self, patient: &Patient) -> CareResult<Patient>;

    /// Persists an existing record if `patient.version` still matches the
    /// stored one; bumps the version and returns the stored copy. Fails
    /// `Conflict` on mismatch and `NotFound` if the record vanished.
    fn save(&self, patient: &Patient) -> CareResult<Patient>;

    /// All active records matching the filter, in storage order.
    fn find_active(&self, filter: &PatientFilter) -> CareResult<Vec<Patient>>;
}

/// Whether an identifier has the shape of a storage-internal id
/// (a UUID, hyphenated or not) rather than a stable `patient_id`.
pub fn looks_like_storage_id(id: &str) -> bool {
    let compact: String = id.chars().filter(|c| *c != '-').collect();
    compact.len() == 32 && compact.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolves either identifier form to a record behind one interface.
///
/// Storage-id shaped inputs go to [`PatientStore::load`] (hyphens
/// stripped, lowercased); everything else is treated as a stable
/// `patient_id`.
pub fn resolve(store: &dyn PatientStore, id: &str) -> CareResult<Option<Patient>> {
    if looks_like_storage_id(id) {
        let compact: String = id
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_lowercase();
        store.load(&compact)
    } else {
        store.find_by_patient_id(id)
    }
}
