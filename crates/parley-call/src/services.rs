//! Seams between the coordinator and the outside world.

use crate::error::ClientError;
use async_trait::async_trait;
use parley_types::{AvailabilityStatus, TranscriptRole};
use parley_voice::CallParams;

/// Asks whether the voice backend can take calls right now.
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    /// Never fails: problems are reported as `available: false` with a reason.
    async fn check(&self) -> AvailabilityStatus;
}

/// Mints credentials for a new call.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self) -> Result<CallParams, ClientError>;
}

/// Persists transcript entries for the current user.
#[async_trait]
pub trait TranscriptLogger: Send + Sync {
    async fn append(&self, role: TranscriptRole, message: &str) -> Result<(), ClientError>;
}
