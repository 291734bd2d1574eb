//! Catalog naming rules: which world rows are exposed as ordinary CRUD resources.

use crate::util::in_array_index;

/// System tables never exposed through the generic resource handler.
pub const RESERVED_TABLES: [&str; 5] = ["world", "world_column", "action", "user", "usergroup"];

/// Infix marking junction tables of many-to-many relations (e.g. `widgets_has_tags`).
pub const JUNCTION_MARKER: &str = "_has_";

/// Suffix marking audit shadow tables.
pub const AUDIT_SUFFIX: &str = "_audit";

/// WHERE clause matching `is_exposed_table_name`, for the catalog query.
/// Underscores are escaped so LIKE does not treat them as single-character wildcards.
pub fn exposed_tables_predicate() -> String {
    let reserved = RESERVED_TABLES
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "table_name NOT LIKE '%{}%' AND table_name NOT LIKE '%{}' AND table_name NOT IN ({})",
        escape_like(JUNCTION_MARKER),
        escape_like(AUDIT_SUFFIX),
        reserved
    )
}

fn escape_like(pattern: &str) -> String {
    pattern.replace('_', "\\_")
}

pub fn is_exposed_table_name(name: &str) -> bool {
    !name.contains(JUNCTION_MARKER)
        && !name.ends_with(AUDIT_SUFFIX)
        && in_array_index(&name, &RESERVED_TABLES).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_tables_are_exposed() {
        assert!(is_exposed_table_name("widgets"));
        assert!(is_exposed_table_name("user_account"));
        assert!(is_exposed_table_name("purchases"));
    }

    #[test]
    fn system_junction_and_audit_tables_are_not() {
        for name in RESERVED_TABLES {
            assert!(!is_exposed_table_name(name), "{name}");
        }
        assert!(!is_exposed_table_name("widgets_has_tags"));
        assert!(!is_exposed_table_name("widgets_audit"));
    }

    #[test]
    fn predicate_lists_every_reserved_name() {
        let sql = exposed_tables_predicate();
        assert!(sql.contains(r"NOT LIKE '%\_has\_%'"));
        assert!(sql.contains(r"NOT LIKE '%\_audit'"));
        assert!(sql.contains("'world', 'world_column', 'action', 'user', 'usergroup'"));
    }
}
