//! File-backed storage driver.
//!
//! Records live at `<data_dir>/<s1>/<s2>/<32hex-id>/patient.json`, where
//! `s1`/`s2` are the first four hex characters of the storage id. Writes
//! go through a temporary file in the record directory followed by a
//! rename, and `save` re-reads the stored document to enforce the
//! optimistic version check.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{CareError, CareResult};
use crate::patient::Patient;
use crate::store::{PatientFilter, PatientStore};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and if needed creates) the store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> CareResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(CareError::StorageDirCreation)?;
        Ok(Self { data_dir })
    }

    fn record_dir(&self, storage_id: &str) -> PathBuf {
        let s1 = &storage_id[0..2];
        let s2 = &storage_id[2..4];
        self.data_dir.join(s1).join(s2).join(storage_id)
    }

    fn record_path(&self, storage_id: &str) -> PathBuf {
        self.record_dir(storage_id).join("patient.json")
    }

    fn read_record(&self, path: &Path) -> CareResult<Option<Patient>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CareError::FileRead(e)),
        };
        let patient = serde_json::from_str(&contents).map_err(CareError::Deserialization)?;
        Ok(Some(patient))
    }

    fn write_record(&self, patient: &Patient) -> CareResult<()> {
        let dir = self.record_dir(&patient.id);
        let json = serde_json::to_string_pretty(patient).map_err(CareError::Serialization)?;

        // Write to a sibling temp file first so a crash mid-write never
        // leaves a truncated patient.json behind.
        let tmp = dir.join("patient.json.tmp");
        fs::write(&tmp, json).map_err(CareError::FileWrite)?;
        fs::rename(&tmp, self.record_path(&patient.id)).map_err(CareError::FileWrite)?;
        Ok(())
    }

    /// Visits every record directory under the shard tree.
    fn for_each_record(&self, mut visit: impl FnMut(Patient)) -> CareResult<()> {
        let s1_iter = match fs::read_dir(&self.data_dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CareError::FileRead(e)),
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }
            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                let id_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_entry in id_iter.flatten() {
                    let record_path = id_entry.path().join("patient.json");
                    if !record_path.is_file() {
                        continue;
                    }
                    match self.read_record(&record_path) {
                        Ok(Some(patient)) => visit(patient),
                        Ok(None) => {}
                        Err(_) => {
                            tracing::warn!(
                                "skipping unparsable patient record: {}",
                                record_path.display()
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl PatientStore for JsonFileStore {
    fn load(&self, storage_id: &str) -> CareResult<Option<Patient>> {
        if storage_id.len() < 4 {
            return Ok(None);
        }
        self.read_record(&self.record_path(storage_id))
    }

    fn find_by_patient_id(&self, patient_id: &str) -> CareResult<Option<Patient>> {
        let mut found = None;
        self.for_each_record(|patient| {
            if found.is_none() && patient.patient_id == patient_id {
                found = Some(patient);
            }
        })?;
        Ok(found)
    }

    fn insert(&self, patient: &Patient) -> CareResult<Patient> {
        let dir = self.record_dir(&patient.id);
        if dir.exists() {
            return Err(CareError::Conflict(patient.id.clone()));
        }
        fs::create_dir_all(&dir).map_err(CareError::PatientDirCreation)?;

        let mut stored = patient.clone();
        stored.version = 1;
        self.write_record(&stored)?;
        Ok(stored)
    }

    fn save(&self, patient: &Patient) -> CareResult<Patient> {
        let current = self
            .load(&patient.id)?
            .ok_or_else(|| CareError::NotFound(patient.id.clone()))?;
        if current.version != patient.version {
            return Err(CareError::Conflict(patient.id.clone()));
        }

        let mut stored = patient.clone();
        stored.version += 1;
        self.write_record(&stored)?;
        Ok(stored)
    }

    fn find_active(&self, filter: &PatientFilter) -> CareResult<Vec<Patient>> {
        let mut patients = Vec::new();
        self.for_each_record(|patient| {
            if filter.matches(&patient) {
                patients.push(patient);
            }
        })?;
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::NewPatient;
    use chrono::Utc;

    fn sample_patient(name: &str) -> Patient {
        Patient::register(
            NewPatient {
                name: name.to_string(),
                disease: "TB".to_string(),
                current_hospital: "Hosp-A".to_string(),
                ..NewPatient::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn records_land_in_sharded_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let patient = sample_patient("Ravi Kumar");
        store.insert(&patient).unwrap();

        let expected = dir
            .path()
            .join(&patient.id[0..2])
            .join(&patient.id[2..4])
            .join(&patient.id)
            .join("patient.json");
        assert!(expected.is_file());
    }

    #[test]
    fn insert_load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let patient = sample_patient("Ravi Kumar");
        let stored = store.insert(&patient).unwrap();
        assert_eq!(stored.version, 1);

        let mut loaded = store.load(&patient.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Ravi Kumar");

        loaded.missed_appointments = 2;
        let saved = store.save(&loaded).unwrap();
        assert_eq!(saved.version, 2);

        let reloaded = store.load(&patient.id).unwrap().unwrap();
        assert_eq!(reloaded.missed_appointments, 2);
    }

    #[test]
    fn stale_version_conflicts_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let stored = store.insert(&sample_patient("Ravi Kumar")).unwrap();

        let mut fresh = stored.clone();
        fresh.days_since_last_visit = 10;
        store.save(&fresh).unwrap();

        let mut stale = stored;
        stale.days_since_last_visit = 99;
        assert!(matches!(store.save(&stale), Err(CareError::Conflict(_))));
    }

    #[test]
    fn find_by_patient_id_scans_the_shard_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let a = store.insert(&sample_patient("Asha Verma")).unwrap();
        store.insert(&sample_patient("Ravi Kumar")).unwrap();

        let found = store.find_by_patient_id(&a.patient_id).unwrap().unwrap();
        assert_eq!(found.name, "Asha Verma");
        assert!(store.find_by_patient_id("PT-00000000").unwrap().is_none());
    }

    #[test]
    fn find_active_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.insert(&sample_patient("Asha Verma")).unwrap();

        let mut inactive = sample_patient("Gone Patient");
        inactive.is_active = false;
        store.insert(&inactive).unwrap();

        let all = store.find_active(&PatientFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Asha Verma");

        let tb = store
            .find_active(&PatientFilter {
                disease: Some("TB".to_string()),
                ..PatientFilter::default()
            })
            .unwrap();
        assert_eq!(tb.len(), 1);
    }

    #[test]
    fn unknown_id_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store
            .load("00000000000000000000000000000000")
            .unwrap()
            .is_none());
        assert!(store.load("x").unwrap().is_none());
    }
}
