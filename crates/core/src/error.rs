#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("patient not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("concurrent write detected for patient {0}, retry the operation")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(std::io::Error),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create patient directory: {0}")]
    PatientDirCreation(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read patient file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize patient: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to deserialize risk policy YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

impl CareError {
    /// True for errors a caller may safely retry from a fresh load.
    ///
    /// `Conflict` requires re-running the whole operation, not just the
    /// failed persist: the verdict computed before the conflict may be
    /// stale. `StorageUnavailable` is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CareError::Conflict(_) | CareError::StorageUnavailable(_)
        )
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;
