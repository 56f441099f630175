//! Error types for calls made against the remote channel service.
//!
//! Nothing inside the sampler or the scheduler can fail; every error in this
//! crate originates in a [`RemoteService`] implementation and is only ever
//! reported, never propagated out of a worker.
//!
//! ## Error Cases
//! - `Transport`: The request could not be sent or no response arrived.
//! - `UnexpectedStatus`: The service answered with a non-success status.
//! - `Decode`: The response body could not be read or parsed.
//!
//! [`RemoteService`]: crate::RemoteService

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for remote channel service calls.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Connection, timeout or other send failure.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The service responded, but not with a success status.
    #[error("Unexpected status {status}: {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// The response body was unreadable or did not match the expected shape.
    #[error("Decode error: {context}")]
    Decode { context: String },
}
