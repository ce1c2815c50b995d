//! Transaction management.
//!
//! One transaction is one unit of work. Every relationship mutation runs its
//! read-modify-renumber sequence inside the backend's atomic boundary.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction trait that all backends must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    /// Reject writes through a read-only transaction.
    fn ensure_writable(&self) -> Result<()> {
        match self.mode() {
            TxMode::ReadWrite => Ok(()),
            TxMode::ReadOnly => Err(Error::TxError(format!(
                "transaction {} is read-only",
                self.id()
            ))),
        }
    }
}
