//! # CareNet Core
//!
//! Risk assessment and continuity-of-care engine for chronically ill
//! patients tracked across multiple care providers.
//!
//! The crate is organised around one rule: every mutation to a patient's
//! clinical or administrative attributes ends with a deterministic
//! re-assessment whose verdict is appended to an immutable history.
//!
//! - [`patient`] — the record and its append-only collections
//! - [`risk`] — pure attribute → verdict computation ([`risk::assess`])
//! - [`service`] — the orchestrating facade and single write path
//! - [`transfer`] — cross-provider transfer workflow and history projection
//! - [`schemes`] — aid-programme recommendation rules
//! - [`store`] — storage drivers (in-memory and sharded JSON files)
//! - [`audit`] — fire-and-forget audit event emission
//!
//! **No API concerns**: HTTP routing, authentication and document
//! rendering live outside this crate and consume its read-only
//! projections.

pub mod audit;
pub mod config;
pub mod error;
pub mod patient;
pub mod risk;
pub mod schemes;
pub mod service;
pub mod store;
pub mod transfer;
pub mod update;

pub use audit::{Actor, AuditEvent, AuditSink, NullAuditSink, TracingAuditSink};
pub use config::CoreConfig;
pub use error::{CareError, CareResult};
pub use patient::{NewPatient, Patient, RiskLevel};
pub use risk::{RiskPolicy, Verdict};
pub use schemes::{SchemeCatalogue, SchemeRecommendation};
pub use service::PatientService;
pub use store::{JsonFileStore, MemoryStore, PatientFilter, PatientStore};
pub use update::PatientUpdate;
