//! Error types for casslock
//!
//! `CassLockError` is the single error surfaced by the lock and the host
//! registry. Store transport failures are folded into `StoreUnavailable`;
//! an acquisition timeout is only an error on the auto-lock path, `lock()`
//! itself reports it as `Ok(false)`.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum CassLockError {
    /// Host not registered, lock table missing, or invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("lock \"{resource}\" could not be obtained within the timeout (host: {host_name}, pid: {pid})")]
    AcquisitionTimeout {
        resource: String,
        host_name: String,
        pid: u32,
    },

    #[error("lock table store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("ticket numbers reached the maximum of {}", u32::MAX)]
    TicketOverflow,

    #[error("no host identifier left for \"{host_name}\"")]
    HostIdExhausted { host_name: String },

    #[error("caused: {0}")]
    IllegalArgument(String),
}

impl CassLockError {
    /// Whether the error comes from a precondition that retrying cannot fix
    pub fn is_configuration(&self) -> bool {
        matches!(self, CassLockError::Configuration(_))
    }
}

/// Result alias used throughout casslock
pub type Result<T> = std::result::Result<T, CassLockError>;
