//! Authorization capability consumed by the registries.
//!
//! Policy lives with the caller; this crate only asks whether the current
//! actor is an administrator. Relationship creation and traversal are not
//! gated here.

use crate::{Error, Result};

/// "Is the current actor an administrator?"
pub trait Authorizer: Send + Sync {
    fn is_admin(&self) -> bool;
}

/// Fixed-capability actor, for embedding and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    admin: bool,
}

impl Actor {
    pub fn admin() -> Self {
        Self { admin: true }
    }

    pub fn anonymous() -> Self {
        Self { admin: false }
    }
}

impl Authorizer for Actor {
    fn is_admin(&self) -> bool {
        self.admin
    }
}

/// Fail with `Unauthorized` unless `actor` is an administrator.
pub fn require_admin(actor: &dyn Authorizer, action: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!("only administrators can {action}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&Actor::admin(), "create entity types").is_ok());
        let err = require_admin(&Actor::anonymous(), "create entity types").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
