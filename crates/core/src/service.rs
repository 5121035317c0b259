//! The patient service facade.
//!
//! Every operation that touches a record goes through here, and every
//! mutating operation ends with a re-assessment: load, mutate, persist,
//! assess, append the verdict, persist again — all under a per-patient
//! lock so concurrent requests against the same record are serialized.
//! The service is the only writer of `risk_assessments` and the cached
//! `latest_*` fields.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::audit::{Actor, AuditEvent, AuditEventType, AuditSink, AuditStatus};
use crate::config::CoreConfig;
use crate::error::{CareError, CareResult};
use crate::patient::{Appointment, AppointmentRequest, NewPatient, Patient};
use crate::risk;
use crate::schemes::SchemeRecommendation;
use crate::store::{self, PatientFilter, PatientStore};
use crate::transfer::{self, HistoryEntryView};
use crate::update::PatientUpdate;
use carenet_types::NonEmptyText;

pub struct PatientService {
    store: Arc<dyn PatientStore>,
    audit: Arc<dyn AuditSink>,
    config: CoreConfig,
    /// Per-patient mutexes keyed by storage id. Entries are created on
    /// first use and kept for the process lifetime; the set of patients a
    /// single process touches is bounded.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PatientService {
    pub fn new(store: Arc<dyn PatientStore>, audit: Arc<dyn AuditSink>, config: CoreConfig) -> Self {
        Self {
            store,
            audit,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, storage_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(storage_id.to_string())
            .or_default()
            .clone()
    }

    /// Resolves either identifier form; absent records are `NotFound`.
    fn resolve_any(&self, id: &str) -> CareResult<Patient> {
        store::resolve(self.store.as_ref(), id)?
            .ok_or_else(|| CareError::NotFound(id.to_string()))
    }

    /// As [`Self::resolve_any`], but deactivated records are `NotFound`
    /// too. Mutating operations use this.
    fn resolve_active(&self, id: &str) -> CareResult<Patient> {
        let patient = self.resolve_any(id)?;
        if !patient.is_active {
            return Err(CareError::NotFound(id.to_string()));
        }
        Ok(patient)
    }

    /// Reloads by storage id under an already-held lock.
    fn load_active_locked(&self, storage_id: &str) -> CareResult<Patient> {
        let patient = self
            .store
            .load(storage_id)?
            .ok_or_else(|| CareError::NotFound(storage_id.to_string()))?;
        if !patient.is_active {
            return Err(CareError::NotFound(storage_id.to_string()));
        }
        Ok(patient)
    }

    /// The assessment orchestrator. Caller must hold the patient's lock.
    ///
    /// Loads the current persisted attributes, computes the verdict,
    /// appends it to the assessment history together with the cache
    /// refresh, and persists both as one save.
    fn reassess_locked(&self, storage_id: &str) -> CareResult<Patient> {
        let mut patient = self
            .store
            .load(storage_id)?
            .ok_or_else(|| CareError::NotFound(storage_id.to_string()))?;
        if !patient.is_active && !self.config.reassess_inactive() {
            return Err(CareError::NotFound(storage_id.to_string()));
        }

        let verdict = risk::assess(&patient, self.config.risk_policy());
        tracing::info!(
            "assessed patient {}: {} ({}%)",
            patient.patient_id,
            verdict.level.as_str(),
            verdict.probability
        );
        patient.apply_verdict(verdict, Utc::now());
        self.store.save(&patient)
    }

    fn emit_audit(
        &self,
        event_type: AuditEventType,
        actor: &Actor,
        description: String,
        patient: &Patient,
    ) {
        self.audit.record(&AuditEvent {
            event_type,
            actor_username: actor.username.clone(),
            actor_role: actor.role.clone(),
            description,
            patient_id: patient.patient_id.clone(),
            patient_name: patient.name.clone(),
            status: AuditStatus::Success,
        });
    }

    /// Registers a patient and runs the first assessment immediately.
    pub fn register(&self, new: NewPatient, actor: &Actor) -> CareResult<Patient> {
        NonEmptyText::new(&new.name)
            .map_err(|_| CareError::InvalidInput("name is required".into()))?;

        let patient = Patient::register(new, Utc::now());
        let stored = self.store.insert(&patient)?;

        let lock = self.lock_for(&stored.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let assessed = self.reassess_locked(&stored.id)?;

        self.emit_audit(
            AuditEventType::PatientCreated,
            actor,
            format!(
                "New patient {} ({}) added",
                assessed.name, assessed.patient_id
            ),
            &assessed,
        );
        Ok(assessed)
    }

    /// Direct lookup by either identifier. Deactivated records remain
    /// retrievable here for audit purposes; they are only excluded from
    /// listings and from mutation.
    pub fn get(&self, id: &str) -> CareResult<Patient> {
        self.resolve_any(id)
    }

    /// Active patients matching the filter, most probable risk first.
    pub fn list(&self, filter: &PatientFilter) -> CareResult<Vec<Patient>> {
        let mut patients = self.store.find_active(filter)?;
        patients.sort_by(|a, b| {
            b.latest_risk_probability
                .unwrap_or(0)
                .cmp(&a.latest_risk_probability.unwrap_or(0))
        });
        Ok(patients)
    }

    /// Active patients currently classified High, most probable first.
    pub fn high_risk(&self) -> CareResult<Vec<Patient>> {
        self.list(&PatientFilter {
            risk_level: Some(crate::patient::RiskLevel::High),
            ..PatientFilter::default()
        })
    }

    /// Applies a typed partial update, then re-assesses.
    pub fn update(&self, id: &str, update: PatientUpdate) -> CareResult<Patient> {
        let existing = self.resolve_active(id)?;
        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut patient = self.load_active_locked(&existing.id)?;
        update.apply(&mut patient);
        patient.updated_at = Utc::now();
        self.store.save(&patient)?;

        self.reassess_locked(&existing.id)
    }

    /// Soft-deactivates the record. History is kept; the patient simply
    /// stops appearing in listings and rejecting mutation.
    pub fn deactivate(&self, id: &str) -> CareResult<Patient> {
        let existing = self.resolve_any(id)?;
        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut patient = self
            .store
            .load(&existing.id)?
            .ok_or_else(|| CareError::NotFound(id.to_string()))?;
        patient.is_active = false;
        patient.updated_at = Utc::now();
        self.store.save(&patient)
    }

    /// Appends an appointment, then re-assesses (appointment activity is
    /// an engagement signal).
    pub fn add_appointment(&self, id: &str, request: AppointmentRequest) -> CareResult<Patient> {
        let existing = self.resolve_active(id)?;
        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now();
        let mut patient = self.load_active_locked(&existing.id)?;
        patient.appointments.push(Appointment {
            date: request.date.unwrap_or(now),
            appointment_type: request
                .appointment_type
                .unwrap_or_else(|| "checkup".to_string()),
            status: request.status.unwrap_or_default(),
            notes: request.notes.unwrap_or_default(),
        });
        patient.updated_at = now;
        self.store.save(&patient)?;

        self.reassess_locked(&existing.id)
    }

    /// Explicit re-assessment of the current persisted attributes.
    pub fn reassess(&self, id: &str, actor: &Actor) -> CareResult<Patient> {
        let existing = if self.config.reassess_inactive() {
            self.resolve_any(id)?
        } else {
            self.resolve_active(id)?
        };
        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let assessed = self.reassess_locked(&existing.id)?;
        let description = match (assessed.latest_risk_level, assessed.latest_risk_probability) {
            (Some(level), Some(probability)) => format!(
                "Risk assessed for {}: {} ({}%)",
                assessed.name,
                level.as_str(),
                probability
            ),
            _ => format!("Risk assessed for {}", assessed.name),
        };
        self.emit_audit(AuditEventType::RiskAssessed, actor, description, &assessed);
        Ok(assessed)
    }

    /// Transfers the patient to another provider: paired history entries,
    /// provider pointer update, persist, re-assess, audit.
    pub fn transfer(
        &self,
        id: &str,
        new_hospital: &str,
        reason: Option<&str>,
        receiving_doctor: Option<&str>,
        actor: &Actor,
    ) -> CareResult<Patient> {
        let existing = self.resolve_active(id)?;
        let new_hospital = new_hospital.trim();
        if new_hospital.is_empty() {
            return Err(CareError::InvalidInput("newHospital is required".into()));
        }

        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut patient = self.load_active_locked(&existing.id)?;
        let previous_hospital =
            transfer::apply_transfer(&mut patient, new_hospital, reason, receiving_doctor, Utc::now());
        self.store.save(&patient)?;

        let updated = self.reassess_locked(&existing.id)?;
        self.emit_audit(
            AuditEventType::RecordTransferred,
            actor,
            format!(
                "Records transferred for {} from {} to {}",
                updated.name, previous_hospital, new_hospital
            ),
            &updated,
        );
        Ok(updated)
    }

    /// Read-only continuity-of-care projection, newest first.
    pub fn history(&self, id: &str) -> CareResult<Vec<HistoryEntryView>> {
        let patient = self.resolve_active(id)?;
        Ok(transfer::history_projection(&patient))
    }

    /// Aid-scheme recommendations from the patient's attributes and
    /// latest cached verdict.
    pub fn recommend(&self, id: &str) -> CareResult<Vec<SchemeRecommendation>> {
        let patient = self.resolve_active(id)?;
        Ok(self.config.catalogue().recommend(&patient))
    }

    /// Enrolls the patient in an aid scheme. Idempotent on the scheme set;
    /// always re-assesses, since enrollment feeds the engine's weighting.
    pub fn enroll(&self, id: &str, scheme_name: &str) -> CareResult<Patient> {
        let existing = self.resolve_active(id)?;
        let scheme_name = scheme_name.trim();
        if scheme_name.is_empty() {
            return Err(CareError::InvalidInput("schemeName is required".into()));
        }

        let lock = self.lock_for(&existing.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut patient = self.load_active_locked(&existing.id)?;
        patient.enroll_scheme(scheme_name);
        patient.updated_at = Utc::now();
        self.store.save(&patient)?;

        self.reassess_locked(&existing.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditSink;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn service() -> (PatientService, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let service = PatientService::new(
            Arc::new(MemoryStore::new()),
            sink.clone(),
            CoreConfig::default(),
        );
        (service, sink)
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            disease: "TB".to_string(),
            current_hospital: "Hosp-A".to_string(),
            ..NewPatient::default()
        }
    }

    #[test]
    fn register_runs_first_assessment_and_audits() {
        let (service, sink) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        assert_eq!(patient.risk_assessments.len(), 1);
        assert_eq!(
            patient.latest_risk_level,
            Some(patient.risk_assessments[0].risk_level)
        );
        assert_eq!(
            patient.latest_risk_probability,
            Some(patient.risk_assessments[0].risk_probability)
        );

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::PatientCreated);
        assert_eq!(events[0].patient_id, patient.patient_id);
    }

    #[test]
    fn register_requires_a_name() {
        let (service, _) = service();
        let err = service.register(NewPatient::default(), &Actor::system());
        assert!(matches!(err, Err(CareError::InvalidInput(_))));
    }

    #[test]
    fn assessments_are_append_only_and_cache_stays_coherent() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Asha Verma"), &Actor::system())
            .unwrap();
        let first_assessment = patient.risk_assessments[0].clone();

        let mut updated = patient;
        for missed in 1..=4u32 {
            let update = PatientUpdate {
                missed_appointments: Some(missed),
                ..PatientUpdate::default()
            };
            updated = service.update(&updated.patient_id, update).unwrap();

            // One assessment per orchestrator invocation, appended.
            assert_eq!(updated.risk_assessments.len(), 1 + missed as usize);
            let last = updated.risk_assessments.last().unwrap();
            assert_eq!(updated.latest_risk_level, Some(last.risk_level));
            assert_eq!(updated.latest_risk_probability, Some(last.risk_probability));
        }

        // The first entry never changed.
        assert_eq!(
            updated.risk_assessments[0].risk_probability,
            first_assessment.risk_probability
        );
        assert_eq!(
            updated.risk_assessments[0].assessed_at,
            first_assessment.assessed_at
        );
    }

    #[test]
    fn worsening_attributes_raise_the_cached_level() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let update = PatientUpdate {
            financial_score: Some(carenet_types::FinancialScore::new(1).unwrap()),
            missed_appointments: Some(5),
            days_since_last_visit: Some(90),
            ..PatientUpdate::default()
        };
        let updated = service.update(&patient.patient_id, update).unwrap();
        assert_eq!(
            updated.latest_risk_level,
            Some(crate::patient::RiskLevel::High)
        );
        assert!(updated.latest_risk_probability.unwrap() >= 70);
    }

    #[test]
    fn transfer_appends_exactly_one_pair_and_audits() {
        let (service, sink) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let updated = service
            .transfer(
                &patient.patient_id,
                "Hosp-B",
                Some("Specialist care"),
                Some("Dr. Rao"),
                &Actor::system(),
            )
            .unwrap();

        assert_eq!(updated.current_hospital, "Hosp-B");
        assert_eq!(updated.medical_history.len(), 2);
        assert_eq!(updated.medical_history[0].treatment, "Transfer out");
        assert_eq!(updated.medical_history[1].treatment, "Transfer in");
        // Transfer re-assesses.
        assert_eq!(updated.risk_assessments.len(), 2);

        let events = sink.events.lock().unwrap();
        let transfer_event = events
            .iter()
            .find(|e| e.event_type == AuditEventType::RecordTransferred)
            .unwrap();
        assert!(transfer_event
            .description
            .contains("from Hosp-A to Hosp-B"));
    }

    #[test]
    fn transfer_to_empty_hospital_leaves_record_unchanged() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let err = service.transfer(&patient.patient_id, "   ", None, None, &Actor::system());
        assert!(matches!(err, Err(CareError::InvalidInput(_))));

        let reloaded = service.get(&patient.patient_id).unwrap();
        assert!(reloaded.medical_history.is_empty());
        assert_eq!(reloaded.risk_assessments.len(), 1);
        assert_eq!(reloaded.current_hospital, "Hosp-A");
    }

    #[test]
    fn history_after_three_transfers_is_six_entries_newest_first() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        for hospital in ["Hosp-B", "Hosp-C", "Hosp-D"] {
            service
                .transfer(&patient.patient_id, hospital, None, None, &Actor::system())
                .unwrap();
        }

        let history = service.history(&patient.patient_id).unwrap();
        assert_eq!(history.len(), 6);
        // Most recent transfer-in first.
        assert_eq!(history[0].hospital, "Hosp-D");
        for window in history.windows(2) {
            assert!(window[0].date >= window[1].date);
        }
    }

    #[test]
    fn enrollment_is_idempotent_but_always_reassesses() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let once = service
            .enroll(&patient.patient_id, "Ayushman Bharat PM-JAY")
            .unwrap();
        let twice = service
            .enroll(&patient.patient_id, "Ayushman Bharat PM-JAY")
            .unwrap();

        assert_eq!(
            twice
                .enrolled_schemes
                .iter()
                .filter(|s| s.as_str() == "Ayushman Bharat PM-JAY")
                .count(),
            1
        );
        assert!(twice.scheme_enrolled);
        assert_eq!(once.risk_assessments.len(), 2);
        assert_eq!(twice.risk_assessments.len(), 3);
    }

    #[test]
    fn enroll_rejects_empty_scheme_name() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();
        let err = service.enroll(&patient.patient_id, "  ");
        assert!(matches!(err, Err(CareError::InvalidInput(_))));
    }

    #[test]
    fn recommendations_carry_urgency_from_the_cached_verdict() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let update = PatientUpdate {
            financial_score: Some(carenet_types::FinancialScore::new(1).unwrap()),
            missed_appointments: Some(5),
            days_since_last_visit: Some(90),
            ..PatientUpdate::default()
        };
        service.update(&patient.patient_id, update).unwrap();

        let recommendations = service.recommend(&patient.patient_id).unwrap();
        assert!(!recommendations.is_empty());
        assert!(recommendations.iter().all(|r| r.urgent));
    }

    #[test]
    fn lookup_works_with_both_identifier_forms() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        assert_eq!(service.get(&patient.id).unwrap().patient_id, patient.patient_id);
        assert_eq!(service.get(&patient.patient_id).unwrap().id, patient.id);
        assert!(matches!(
            service.get("PT-nobody00"),
            Err(CareError::NotFound(_))
        ));
    }

    #[test]
    fn deactivated_patients_leave_listings_but_stay_retrievable() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        service.deactivate(&patient.patient_id).unwrap();

        let listed = service.list(&PatientFilter::default()).unwrap();
        assert!(listed.is_empty());

        let fetched = service.get(&patient.patient_id).unwrap();
        assert!(!fetched.is_active);
        assert_eq!(fetched.risk_assessments.len(), 1);

        // Mutation against a deactivated record is NotFound.
        let err = service.update(&patient.patient_id, PatientUpdate::default());
        assert!(matches!(err, Err(CareError::NotFound(_))));
    }

    #[test]
    fn listing_sorts_by_cached_probability_descending() {
        let (service, _) = service();
        let low = service
            .register(
                NewPatient {
                    financial_score: carenet_types::FinancialScore::new(9).unwrap(),
                    follow_up_calls_received: 2,
                    ..new_patient("Calm Patient")
                },
                &Actor::system(),
            )
            .unwrap();
        let high = service
            .register(
                NewPatient {
                    financial_score: carenet_types::FinancialScore::new(1).unwrap(),
                    missed_appointments: 5,
                    days_since_last_visit: 90,
                    ..new_patient("Worrying Patient")
                },
                &Actor::system(),
            )
            .unwrap();

        let listed = service.list(&PatientFilter::default()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].patient_id, high.patient_id);
        assert_eq!(listed[1].patient_id, low.patient_id);

        let high_only = service.high_risk().unwrap();
        assert_eq!(high_only.len(), 1);
        assert_eq!(high_only[0].patient_id, high.patient_id);
    }

    #[test]
    fn appointments_append_with_defaults_and_reassess() {
        let (service, _) = service();
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let updated = service
            .add_appointment(&patient.patient_id, AppointmentRequest::default())
            .unwrap();
        assert_eq!(updated.appointments.len(), 1);
        assert_eq!(updated.appointments[0].appointment_type, "checkup");
        assert_eq!(
            updated.appointments[0].status,
            crate::patient::AppointmentStatus::Scheduled
        );
        assert_eq!(updated.risk_assessments.len(), 2);
    }

    #[test]
    fn concurrent_updates_serialize_per_patient() {
        let sink = Arc::new(NullAuditSink);
        let service = Arc::new(PatientService::new(
            Arc::new(MemoryStore::new()),
            sink,
            CoreConfig::default(),
        ));
        let patient = service
            .register(new_patient("Ravi Kumar"), &Actor::system())
            .unwrap();

        let mut handles = Vec::new();
        for missed in 0..8u32 {
            let service = service.clone();
            let id = patient.patient_id.clone();
            handles.push(std::thread::spawn(move || {
                let update = PatientUpdate {
                    missed_appointments: Some(missed),
                    ..PatientUpdate::default()
                };
                service.update(&id, update).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let final_state = service.get(&patient.patient_id).unwrap();
        // Registration plus one per update; nothing lost to races.
        assert_eq!(final_state.risk_assessments.len(), 9);
        let last = final_state.risk_assessments.last().unwrap();
        assert_eq!(final_state.latest_risk_level, Some(last.risk_level));
        assert_eq!(
            final_state.latest_risk_probability,
            Some(last.risk_probability)
        );
    }
}
