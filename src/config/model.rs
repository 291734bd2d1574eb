//! Generic resource model: the API-facing shape of one table.

use crate::config::{ColumnInfo, TableRelation};
use crate::util::in_array_index;

#[derive(Clone, Debug)]
pub struct ResourceModel {
    pub name: String,
    /// Columns exposed through the API (include_in_api), in catalog order.
    pub columns: Vec<ColumnInfo>,
    pub default_permission: i64,
    pub relations: Vec<TableRelation>,
}

impl ResourceModel {
    pub fn new(
        name: &str,
        columns: &[ColumnInfo],
        default_permission: i64,
        relations: &[TableRelation],
    ) -> Self {
        ResourceModel {
            name: name.to_string(),
            columns: columns.iter().filter(|c| c.include_in_api).cloned().collect(),
            default_permission,
            relations: relations.to_vec(),
        }
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Names of related tables, to be resolved through the registry.
    pub fn related_tables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for name in self.relations.iter().filter_map(|r| r.counterpart(&self.name)) {
            if in_array_index(&name, &out).is_none() {
                out.push(name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationKind;

    #[test]
    fn hides_columns_not_in_api() {
        let columns = vec![
            ColumnInfo {
                name: "title".into(),
                include_in_api: true,
                ..Default::default()
            },
            ColumnInfo {
                name: "password".into(),
                include_in_api: false,
                ..Default::default()
            },
        ];
        let model = ResourceModel::new("widgets", &columns, 0, &[]);
        assert_eq!(model.attribute_names().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn related_tables_resolve_from_both_directions() {
        let relations = vec![
            TableRelation {
                subject: "widgets".into(),
                relation: RelationKind::BelongsTo,
                object: "user_account".into(),
                subject_name: String::new(),
                object_name: String::new(),
            },
            TableRelation {
                subject: "orders".into(),
                relation: RelationKind::HasMany,
                object: "widgets".into(),
                subject_name: String::new(),
                object_name: String::new(),
            },
        ];
        let model = ResourceModel::new("widgets", &[], 0, &relations);
        assert_eq!(model.related_tables(), vec!["user_account", "orders"]);
    }
}
