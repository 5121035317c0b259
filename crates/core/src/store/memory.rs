//! In-memory storage driver.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CareError, CareResult};
use crate::patient::Patient;
use crate::store::{PatientFilter, PatientStore};

/// Hash-map backed store keyed by storage id, guarded by a `RwLock`.
///
/// Versioning behaves exactly like the file-backed driver so tests
/// exercise the same conflict paths the production store has.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Patient>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatientStore for MemoryStore {
    fn load(&self, storage_id: &str) -> CareResult<Option<Patient>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(storage_id).cloned())
    }

    fn find_by_patient_id(&self, patient_id: &str) -> CareResult<Option<Patient>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .find(|p| p.patient_id == patient_id)
            .cloned())
    }

    fn insert(&self, patient: &Patient) -> CareResult<Patient> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&patient.id) {
            return Err(CareError::Conflict(patient.id.clone()));
        }
        let mut stored = patient.clone();
        stored.version = 1;
        records.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn save(&self, patient: &Patient) -> CareResult<Patient> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let current = records
            .get(&patient.id)
            .ok_or_else(|| CareError::NotFound(patient.id.clone()))?;
        if current.version != patient.version {
            return Err(CareError::Conflict(patient.id.clone()));
        }
        let mut stored = patient.clone();
        stored.version += 1;
        records.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn find_active(&self, filter: &PatientFilter) -> CareResult<Vec<Patient>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }
}
