//! Table-level and row-level authorization. Both are stateless and lead every chain.

use crate::error::AppError;
use crate::middleware::{
    DatabaseRequestInterceptor, Operation, Phase, RequestContext, GROUPS_COLUMN, OWNER_COLUMN, PERMISSION_COLUMN,
};
use crate::permission::{Access, Permission};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default)]
pub struct TableAccessPermissionChecker;

#[async_trait]
impl DatabaseRequestInterceptor for TableAccessPermissionChecker {
    fn name(&self) -> &'static str {
        "table_access_permission_checker"
    }

    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        if ctx.actor.is_admin || ctx.phase == Phase::After {
            return Ok(rows);
        }
        let access = ctx.operation.required_access();
        let permission = Permission(ctx.table.permission);
        if !permission.allows(ctx.actor.table_class(), access) {
            return Err(AppError::Forbidden(format!(
                "{:?} not allowed on {}",
                access, ctx.table.table_name
            )));
        }
        Ok(rows)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectAccessPermissionChecker;

impl ObjectAccessPermissionChecker {
    fn row_allows(ctx: &RequestContext<'_>, row: &Value, access: Access) -> bool {
        let permission = row
            .get(PERMISSION_COLUMN)
            .and_then(Value::as_i64)
            .map(Permission)
            .unwrap_or(Permission(ctx.table.default_permission));
        let owner = row.get(OWNER_COLUMN).and_then(Value::as_str);
        let groups: Vec<String> = row
            .get(GROUPS_COLUMN)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();
        permission.allows(ctx.actor.object_class(owner, &groups), access)
    }
}

#[async_trait]
impl DatabaseRequestInterceptor for ObjectAccessPermissionChecker {
    fn name(&self) -> &'static str {
        "object_access_permission_checker"
    }

    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        if ctx.actor.is_admin {
            return Ok(rows);
        }
        match (ctx.phase, ctx.operation) {
            (Phase::Before, op) => {
                if let Some(existing) = ctx.existing {
                    if !Self::row_allows(ctx, existing, op.required_access()) {
                        return Err(AppError::Forbidden(format!(
                            "{:?} not allowed on this {} row",
                            op.required_access(),
                            ctx.table.table_name
                        )));
                    }
                }
                Ok(rows)
            }
            (Phase::After, Operation::FindAll) => {
                let before = rows.len();
                let visible: Vec<Value> = rows
                    .into_iter()
                    .filter(|row| Self::row_allows(ctx, row, Access::Read))
                    .collect();
                if visible.len() < before {
                    tracing::debug!(table = %ctx.table.table_name, hidden = before - visible.len(), "filtered unreadable rows");
                }
                Ok(visible)
            }
            (Phase::After, Operation::FindOne) => {
                if rows.iter().any(|row| !Self::row_allows(ctx, row, Access::Read)) {
                    return Err(AppError::Forbidden(format!(
                        "Read not allowed on this {} row",
                        ctx.table.table_name
                    )));
                }
                Ok(rows)
            }
            (Phase::After, _) => Ok(rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableInfo;
    use crate::permission::{Actor, Class};
    use serde_json::json;

    fn table(permission: Permission, default_permission: Permission) -> TableInfo {
        TableInfo {
            table_name: "widgets".into(),
            permission: permission.0,
            default_permission: default_permission.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn table_checker_denies_guest_without_bit() {
        let t = table(Permission::NONE.with(Class::Owner, Access::Create), Permission::NONE);
        let guest = Actor::guest();
        let ctx = RequestContext::new(&t, &guest, Operation::Create, Phase::Before);
        let err = TableAccessPermissionChecker.intercept(&ctx, vec![]).await.unwrap_err();
        assert!(err.is_denial());

        let user = Actor::user("u1");
        let ctx = RequestContext::new(&t, &user, Operation::Create, Phase::Before);
        assert!(TableAccessPermissionChecker.intercept(&ctx, vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn admin_bypasses_both_checkers() {
        let t = table(Permission::NONE, Permission::NONE);
        let admin = Actor::system();
        let row = json!({ "reference_id": "r1" });
        let ctx = RequestContext::new(&t, &admin, Operation::Delete, Phase::Before).with_existing(Some(&row));
        assert!(TableAccessPermissionChecker.intercept(&ctx, vec![]).await.is_ok());
        assert!(ObjectAccessPermissionChecker.intercept(&ctx, vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn object_checker_uses_row_permission_and_owner() {
        let t = table(Permission::ALL, Permission::NONE);
        let row = json!({
            "reference_id": "r1",
            "user_account_id": "u1",
            "permission": Permission::NONE.with(Class::Owner, Access::Update).0,
        });
        let owner = Actor::user("u1");
        let ctx = RequestContext::new(&t, &owner, Operation::Update, Phase::Before).with_existing(Some(&row));
        assert!(ObjectAccessPermissionChecker.intercept(&ctx, vec![json!({})]).await.is_ok());

        let stranger = Actor::user("u2");
        let ctx = RequestContext::new(&t, &stranger, Operation::Update, Phase::Before).with_existing(Some(&row));
        let err = ObjectAccessPermissionChecker.intercept(&ctx, vec![json!({})]).await.unwrap_err();
        assert!(err.is_denial());
    }

    #[tokio::test]
    async fn find_all_filters_instead_of_denying() {
        let t = table(Permission::ALL, Permission::NONE);
        let readable = Permission::NONE.with(Class::Guest, Access::Read).0;
        let rows = vec![
            json!({ "reference_id": "a", "permission": readable }),
            json!({ "reference_id": "b" }),
        ];
        let guest = Actor::guest();
        let ctx = RequestContext::new(&t, &guest, Operation::FindAll, Phase::After);
        let out = ObjectAccessPermissionChecker.intercept(&ctx, rows).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["reference_id"], "a");
    }

    #[tokio::test]
    async fn find_one_denies_unreadable_row() {
        let t = table(Permission::ALL, Permission::NONE);
        let guest = Actor::guest();
        let ctx = RequestContext::new(&t, &guest, Operation::FindOne, Phase::After);
        let err = ObjectAccessPermissionChecker
            .intercept(&ctx, vec![json!({ "reference_id": "a" })])
            .await
            .unwrap_err();
        assert!(err.is_denial());
    }

    #[tokio::test]
    async fn group_members_use_group_bits() {
        let t = table(Permission::ALL, Permission::NONE.with(Class::Group, Access::Delete));
        let row = json!({ "user_account_id": "u1", "usergroup_ids": ["g1"] });
        let mut member = Actor::user("u2");
        member.group_ids = vec!["g1".into()];
        let ctx = RequestContext::new(&t, &member, Operation::Delete, Phase::Before).with_existing(Some(&row));
        assert!(ObjectAccessPermissionChecker.intercept(&ctx, vec![]).await.is_ok());
    }
}
