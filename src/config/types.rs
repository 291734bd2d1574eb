//! Table descriptor types matching the world catalog's JSON schema blob (PascalCase keys).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ForeignKeyData {
    /// "self" for a table in this database, otherwise an external data source name.
    pub data_source: String,
    pub namespace: String,
    pub key_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ColumnInfo {
    /// API attribute name.
    pub name: String,
    /// Physical column name in the table.
    pub column_name: String,
    pub column_description: String,
    /// Semantic type (e.g. "label", "email", "measurement").
    pub column_type: String,
    /// SQL type (e.g. "varchar(100)", "int(11)").
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub is_indexed: bool,
    pub is_unique: bool,
    pub is_nullable: bool,
    pub is_foreign_key: bool,
    pub include_in_api: bool,
    pub foreign_key_data: ForeignKeyData,
    pub default_value: String,
}

impl ColumnInfo {
    /// Physical name, falling back to the attribute name when the blob omits it.
    pub fn physical_name(&self) -> &str {
        if self.column_name.is_empty() {
            &self.name
        } else {
            &self.column_name
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyAndBelongsToMany,
}

/// Relation between two tables, by name. Resolved through the registry when used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableRelation {
    pub subject: String,
    pub relation: RelationKind,
    pub object: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub object_name: String,
}

impl TableRelation {
    /// Name of the table on the other side of the relation, seen from `table`.
    pub fn counterpart(&self, table: &str) -> Option<&str> {
        if self.subject == table {
            Some(&self.object)
        } else if self.object == table {
            Some(&self.subject)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// One exposed resource: structure from the schema blob, access flags from the catalog row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TableInfo {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<TableRelation>,
    pub permission: i64,
    pub default_permission: i64,
    pub is_top_level: bool,
    pub is_hidden: bool,
    pub is_state_tracking_enabled: bool,
    pub default_order: String,
    /// Per-column rules applied by the data validation interceptor, keyed by attribute name.
    pub validations: HashMap<String, ValidationRule>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name || c.column_name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Where an exchange pushes committed rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeTarget {
    /// Another table registered in this process.
    Table { name: String },
    /// JSON POST of the created row to an external endpoint.
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

/// Row of the data_exchange table: propagate creates on `source_table` to `target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeContract {
    pub name: String,
    pub source_table: String,
    pub target: ExchangeTarget,
    /// Attribute renames applied before pushing (source -> target). Unlisted attributes pass through.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pascal_case_blob_with_defaults() {
        let blob = r#"{
            "TableName": "widgets",
            "Columns": [{ "Name": "title", "ColumnName": "title", "DataType": "varchar(100)", "IsNullable": true }],
            "Relations": [{ "Subject": "widgets", "Relation": "belongs_to", "Object": "user_account" }]
        }"#;
        let t: TableInfo = serde_json::from_str(blob).unwrap();
        assert_eq!(t.table_name, "widgets");
        assert_eq!(t.columns.len(), 1);
        assert!(t.columns[0].is_nullable);
        assert!(!t.columns[0].is_unique);
        assert_eq!(t.relations[0].relation, RelationKind::BelongsTo);
        assert_eq!(t.default_order, "");
        assert!(t.validations.is_empty());
    }

    #[test]
    fn relation_counterpart_from_either_side() {
        let rel = TableRelation {
            subject: "widgets".into(),
            relation: RelationKind::HasManyAndBelongsToMany,
            object: "tags".into(),
            subject_name: String::new(),
            object_name: String::new(),
        };
        assert_eq!(rel.counterpart("widgets"), Some("tags"));
        assert_eq!(rel.counterpart("tags"), Some("widgets"));
        assert_eq!(rel.counterpart("orders"), None);
    }

    #[test]
    fn physical_name_falls_back_to_attribute_name() {
        let col = ColumnInfo {
            name: "title".into(),
            ..Default::default()
        };
        assert_eq!(col.physical_name(), "title");
    }

    #[test]
    fn exchange_contract_target_is_tagged() {
        let c: ExchangeContract = serde_json::from_value(serde_json::json!({
            "name": "mirror",
            "source_table": "widgets",
            "target": { "type": "webhook", "url": "https://hooks.example.com/widgets" }
        }))
        .unwrap();
        assert!(matches!(c.target, ExchangeTarget::Webhook { ref url, .. } if url.ends_with("/widgets")));
        assert!(c.attributes.is_empty());
    }
}
