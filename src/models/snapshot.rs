use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One exported row, columns in table order.
pub type Row = IndexMap<String, Value>;

/// Domain entities that can be promoted from development to production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Properties,
    Blog,
    News,
    MarketReports,
    EmailTemplates,
    Users,
}

/// A table and the columns read from it; `None` means every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Option<&'static [&'static str]>,
}

// No password hashes, reset tokens or sessions ever leave development. A
// reload of production users therefore leaves those columns at their defaults.
const USER_COLUMNS: &[&str] = &["id", "email", "name", "role", "created_at", "updated_at"];

impl EntityKind {
    /// Export and reload order. Users are referenced by blog posts and
    /// properties, so their rows are inserted first.
    pub const EXPORT_ORDER: [EntityKind; 6] = [
        EntityKind::Users,
        EntityKind::Properties,
        EntityKind::Blog,
        EntityKind::News,
        EntityKind::MarketReports,
        EntityKind::EmailTemplates,
    ];

    pub fn tables(self) -> &'static [TableSpec] {
        match self {
            EntityKind::Properties => &[TableSpec {
                name: "properties",
                columns: None,
            }],
            EntityKind::Blog => &[TableSpec {
                name: "blog_posts",
                columns: None,
            }],
            EntityKind::News => &[TableSpec {
                name: "news_articles",
                columns: None,
            }],
            EntityKind::MarketReports => &[TableSpec {
                name: "market_reports",
                columns: None,
            }],
            EntityKind::EmailTemplates => &[
                TableSpec {
                    name: "email_templates",
                    columns: None,
                },
                TableSpec {
                    name: "email_campaigns",
                    columns: None,
                },
            ],
            EntityKind::Users => &[TableSpec {
                name: "users",
                columns: Some(USER_COLUMNS),
            }],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Properties => "properties",
            EntityKind::Blog => "blog posts",
            EntityKind::News => "news articles",
            EntityKind::MarketReports => "market reports",
            EntityKind::EmailTemplates => "email templates and campaigns",
            EntityKind::Users => "users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub entity: EntityKind,
    pub rows: Vec<Row>,
}

/// Full-table snapshot of the development data selected for promotion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    tables: IndexMap<String, TableSnapshot>,
    total_records: usize,
}

impl ExportSnapshot {
    pub fn push(&mut self, table: &str, entity: EntityKind, rows: Vec<Row>) {
        self.total_records += rows.len();
        self.tables
            .insert(table.to_string(), TableSnapshot { entity, rows });
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSnapshot)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// `properties: 3, blog_posts: 0`
    pub fn summary(&self) -> String {
        self.tables
            .iter()
            .map(|(name, table)| format!("{}: {}", name, table.rows.len()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(id));
        row
    }

    #[test]
    fn test_snapshot_counts_and_keeps_order() {
        let mut snapshot = ExportSnapshot::default();
        snapshot.push("properties", EntityKind::Properties, vec![row(1), row(2)]);
        snapshot.push("blog_posts", EntityKind::Blog, vec![]);
        snapshot.push("email_templates", EntityKind::EmailTemplates, vec![row(7)]);

        assert_eq!(snapshot.total_records(), 3);
        assert_eq!(
            snapshot.summary(),
            "properties: 2, blog_posts: 0, email_templates: 1"
        );
        let names: Vec<&str> = snapshot.tables().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["properties", "blog_posts", "email_templates"]);
    }

    #[test]
    fn test_users_never_select_password_columns() {
        let users = EntityKind::Users.tables();
        let columns = users[0].columns.unwrap();
        assert!(!columns.iter().any(|c| c.contains("password")));
        assert!(columns.contains(&"email"));
    }

    #[test]
    fn test_email_entity_covers_templates_and_campaigns() {
        let names: Vec<&str> = EntityKind::EmailTemplates
            .tables()
            .iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["email_templates", "email_campaigns"]);
    }
}
