mod model_unavailable_queue;
mod pool;
mod state;
mod unavailable_queue;

pub use pool::{AcquireError, CredentialPool};
pub use state::{CredentialId, CredentialState, UnavailableReason};
