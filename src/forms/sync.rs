use crate::models::EntityKind;
use serde::{Deserialize, Serialize};

/// What a database sync or full deployment should promote.
///
/// Missing JSON keys fall back to the defaults below; users are opt-in and a
/// backup is taken unless explicitly disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    pub include_properties: bool,
    pub include_blog: bool,
    pub include_news: bool,
    pub include_market_reports: bool,
    pub include_email_templates: bool,
    pub include_users: bool,
    pub include_files: bool,
    pub backup_first: bool,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            include_properties: true,
            include_blog: true,
            include_news: true,
            include_market_reports: true,
            include_email_templates: true,
            include_users: false,
            include_files: true,
            backup_first: true,
            dry_run: false,
        }
    }
}

impl SyncOptions {
    pub fn includes(&self, entity: EntityKind) -> bool {
        match entity {
            EntityKind::Properties => self.include_properties,
            EntityKind::Blog => self.include_blog,
            EntityKind::News => self.include_news,
            EntityKind::MarketReports => self.include_market_reports,
            EntityKind::EmailTemplates => self.include_email_templates,
            EntityKind::Users => self.include_users,
        }
    }

    /// Entities to export, in export order.
    pub fn selected_entities(&self) -> Vec<EntityKind> {
        EntityKind::EXPORT_ORDER
            .iter()
            .copied()
            .filter(|entity| self.includes(*entity))
            .collect()
    }

    /// Only the given entities, everything else at its default.
    pub fn only(entities: &[EntityKind]) -> Self {
        let mut options = Self {
            include_properties: false,
            include_blog: false,
            include_news: false,
            include_market_reports: false,
            include_email_templates: false,
            include_users: false,
            ..Self::default()
        };
        for entity in entities {
            match entity {
                EntityKind::Properties => options.include_properties = true,
                EntityKind::Blog => options.include_blog = true,
                EntityKind::News => options.include_news = true,
                EntityKind::MarketReports => options.include_market_reports = true,
                EntityKind::EmailTemplates => options.include_email_templates = true,
                EntityKind::Users => options.include_users = true,
            }
        }
        options
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSyncOptions {
    pub include_uploads: bool,
    pub dry_run: bool,
}
