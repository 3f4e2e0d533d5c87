/// Answers one question for admin-only operations: is the caller an
/// authenticated admin? Implemented by verified session claims in the API.
pub trait AuthGate: Send + Sync {
    fn is_admin(&self) -> bool;

    fn subject(&self) -> Option<&str> {
        None
    }
}

/// Gate for callers with no session at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unauthenticated;

impl AuthGate for Unauthenticated {
    fn is_admin(&self) -> bool {
        false
    }
}

/// Fails with `CoreError::Unauthorized` unless the gate admits an admin.
pub fn require_admin(gate: &dyn AuthGate) -> crate::CoreResult<()> {
    if gate.is_admin() {
        Ok(())
    } else {
        tracing::warn!("Rejected admin operation without an admin session");
        Err(crate::CoreError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Admin;

    impl AuthGate for Admin {
        fn is_admin(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&Admin).is_ok());
        assert!(matches!(
            require_admin(&Unauthenticated),
            Err(crate::CoreError::Unauthorized)
        ));
    }
}
