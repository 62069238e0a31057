use std::fmt;

/// Authenticated user within an active tenant. Every remote call carries it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub tenant_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Same user in the same tenant; the token may have been refreshed.
    pub fn same_scope(&self, other: &Session) -> bool {
        self.user_id == other.user_id && self.tenant_id == other.tenant_id
    }
}

// Keeps the bearer token out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let session = Session::new("u1", "t1", "secret-token");

        let debug = format!("{:?}", session);

        assert!(debug.contains("u1"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_same_scope_ignores_token() {
        let a = Session::new("u1", "t1", "old");
        let b = Session::new("u1", "t1", "new");
        let c = Session::new("u1", "t2", "old");

        assert!(a.same_scope(&b));
        assert!(!a.same_scope(&c));
    }
}
