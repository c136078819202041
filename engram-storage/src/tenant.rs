//! Tenant-scoped SQL building.
//!
//! Every query over a tenant-scoped table appends the predicate this
//! module produces. Admin callers see everything; a tenant sees its own
//! rows plus anonymous ones; an anonymous caller sees only anonymous
//! rows, and under `strict_tenant` is refused outright.

use engram_core::context::SecurityContext;
use engram_core::errors::{EngramError, EngramResult};

use crate::sql::SqlValue;

/// The tenant predicate for one query: SQL fragment (starting with
/// ` AND`, or empty) plus its bind values.
#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

/// Build the read filter for `column` under the caller's scope.
pub fn read_filter(
    ctx: &SecurityContext,
    strict_tenant: bool,
    column: &str,
) -> EngramResult<TenantFilter> {
    if ctx.admin {
        return Ok(TenantFilter::default());
    }
    match &ctx.user_id {
        Some(user) => Ok(TenantFilter {
            clause: format!(" AND ({column} = ? OR {column} IS NULL)"),
            params: vec![SqlValue::Text(user.clone())],
        }),
        None if strict_tenant => Err(EngramError::bad_request(
            "tenant-less read rejected (strict_tenant)",
        )),
        None => Ok(TenantFilter {
            clause: format!(" AND {column} IS NULL"),
            params: Vec::new(),
        }),
    }
}

/// Build the write filter: like reads, but anonymous rows are not
/// writable by tenants.
pub fn write_filter(ctx: &SecurityContext, column: &str) -> TenantFilter {
    if ctx.admin {
        return TenantFilter::default();
    }
    match &ctx.user_id {
        Some(user) => TenantFilter {
            clause: format!(" AND {column} = ?"),
            params: vec![SqlValue::Text(user.clone())],
        },
        None => TenantFilter {
            clause: format!(" AND {column} IS NULL"),
            params: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_no_filter() {
        let f = read_filter(&SecurityContext::admin(), true, "user_id").unwrap();
        assert!(f.clause.is_empty());
        assert!(f.params.is_empty());
    }

    #[test]
    fn tenant_sees_own_and_anonymous() {
        let f = read_filter(&SecurityContext::for_user("alice"), false, "user_id").unwrap();
        assert!(f.clause.contains("user_id = ?"));
        assert!(f.clause.contains("IS NULL"));
        assert_eq!(f.params.len(), 1);
    }

    #[test]
    fn strict_rejects_anonymous_reads() {
        let err = read_filter(&SecurityContext::anonymous(), true, "user_id").unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn lax_anonymous_sees_only_anonymous() {
        let f = read_filter(&SecurityContext::anonymous(), false, "user_id").unwrap();
        assert_eq!(f.clause, " AND user_id IS NULL");
    }

    #[test]
    fn tenant_writes_never_reach_anonymous_rows() {
        let f = write_filter(&SecurityContext::for_user("alice"), "user_id");
        assert_eq!(f.clause, " AND user_id = ?");
    }
}
