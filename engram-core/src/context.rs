//! Per-request security context.
//!
//! Immutable for the lifetime of a request; every storage call that
//! touches tenant-scoped rows consults it. Cross-tenant access is a hard
//! `Forbidden`, never an empty result.

use serde::{Deserialize, Serialize};

use crate::errors::{EngramError, EngramResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Acting tenant. `None` means anonymous.
    pub user_id: Option<String>,
    /// Admin callers bypass tenant scoping.
    pub admin: bool,
    /// Correlates log rows for one request.
    pub request_id: String,
}

impl SecurityContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            admin: false,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn admin() -> Self {
        Self {
            user_id: None,
            admin: true,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            admin: false,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// The tenant filter queries must apply, or `None` for admin callers.
    pub fn scope(&self) -> Option<&str> {
        if self.admin {
            None
        } else {
            self.user_id.as_deref()
        }
    }

    /// Check that a row owned by `owner` is visible to this caller.
    ///
    /// Admin sees everything. Anonymous rows are visible to everyone;
    /// owned rows only to their owner.
    pub fn ensure_can_read(&self, owner: Option<&str>) -> EngramResult<()> {
        if self.admin {
            return Ok(());
        }
        match owner {
            None => Ok(()),
            Some(o) => {
                if self.user_id.as_deref() == Some(o) {
                    Ok(())
                } else {
                    Err(EngramError::forbidden("row belongs to another tenant"))
                }
            }
        }
    }

    /// Refuse an explicit user argument that does not match the acting
    /// tenant. Admin callers may act for anyone.
    pub fn ensure_acting_for(&self, requested: Option<&str>) -> EngramResult<()> {
        if self.admin {
            return Ok(());
        }
        match requested {
            None => Ok(()),
            Some(r) => {
                if self.user_id.as_deref() == Some(r) {
                    Ok(())
                } else {
                    Err(EngramError::forbidden(
                        "explicit user does not match the acting tenant",
                    ))
                }
            }
        }
    }

    /// Check that this caller may write a row owned by `owner`.
    /// Anonymous rows are writable only by admin.
    pub fn ensure_can_write(&self, owner: Option<&str>) -> EngramResult<()> {
        if self.admin {
            return Ok(());
        }
        match owner {
            None => Err(EngramError::forbidden(
                "anonymous rows require admin scope to modify",
            )),
            Some(o) => {
                if self.user_id.as_deref() == Some(o) {
                    Ok(())
                } else {
                    Err(EngramError::forbidden("row belongs to another tenant"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_reads_own_rows() {
        let ctx = SecurityContext::for_user("alice");
        assert!(ctx.ensure_can_read(Some("alice")).is_ok());
        assert!(ctx.ensure_can_read(None).is_ok());
    }

    #[test]
    fn cross_tenant_read_is_forbidden() {
        let ctx = SecurityContext::for_user("alice");
        let err = ctx.ensure_can_read(Some("bob")).unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn admin_bypasses_scoping() {
        let ctx = SecurityContext::admin();
        assert!(ctx.ensure_can_read(Some("bob")).is_ok());
        assert!(ctx.ensure_can_write(None).is_ok());
        assert_eq!(ctx.scope(), None);
    }

    #[test]
    fn anonymous_rows_need_admin_to_write() {
        let ctx = SecurityContext::for_user("alice");
        assert!(ctx.ensure_can_write(None).is_err());
    }
}
