//! Collaborator interfaces and in-memory implementations
//!
//! Content storage, settings persistence, attribute schemas and CSS
//! compilation live outside the generator. The traits here are the seams;
//! the `Memory*` types back the CLI and the tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{QueryError, Result};
use crate::types::{BlockSettings, ContentRecord, CssVariant, RecordId, RecordKind, SettingsPatch};

/// Read-only access to content records
pub trait ContentStore {
    fn record(&self, id: RecordId) -> Option<ContentRecord>;

    fn record_ids(&self, kind: RecordKind) -> Vec<RecordId>;

    /// Field text, empty when the record or field is absent
    fn field(&self, id: RecordId, key: &str) -> String {
        self.record(id)
            .map(|record| record.field(key).to_string())
            .unwrap_or_default()
    }
}

/// Block settings persistence with partial-update saves
pub trait SettingsRepository {
    fn get(&self, block_id: RecordId) -> Result<Option<BlockSettings>>;

    /// Keys the patch leaves out keep their stored values
    fn save(&mut self, block_id: RecordId, patch: &SettingsPatch) -> Result<()>;

    fn delete(&mut self, block_id: RecordId) -> Result<()>;

    fn block_ids(&self) -> Result<Vec<RecordId>>;

    /// Structured membership query: blocks whose local selections include
    /// `partial_id`. Engines without a JSON membership operator return
    /// `QueryError::UnsupportedOperator`.
    fn blocks_selecting_partial(
        &self,
        partial_id: RecordId,
    ) -> std::result::Result<Vec<RecordId>, QueryError>;

    fn all_settings(&self) -> Result<Vec<(RecordId, BlockSettings)>>;
}

/// Produces the manifest `attributes` object for a record
pub trait AttributeSchemaMapper {
    fn schema_for(&self, record: &ContentRecord) -> Option<Value>;
}

/// Access to compiled stylesheets
pub trait CssCompiler {
    fn compiled_css_for(&self, record_id: RecordId, variant: CssVariant) -> Option<Vec<u8>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryContentStore {
    records: BTreeMap<RecordId, ContentRecord>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ContentRecord) {
        self.records.insert(record.id, record);
    }

    pub fn remove(&mut self, id: RecordId) -> Option<ContentRecord> {
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContentStore for MemoryContentStore {
    fn record(&self, id: RecordId) -> Option<ContentRecord> {
        self.records.get(&id).cloned()
    }

    fn record_ids(&self, kind: RecordKind) -> Vec<RecordId> {
        self.records
            .values()
            .filter(|record| record.kind == kind)
            .map(|record| record.id)
            .collect()
    }
}

/// A stored settings row. List-valued columns hold raw JSON text, as a
/// relational backend would.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub category: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub inner_blocks: bool,
    pub allowed_blocks: Option<String>,
    pub template: Option<String>,
    pub selected_partials: Option<String>,
    pub editor_selected_partials: Option<String>,
    pub module_script: bool,
    pub supports: Option<String>,
}

impl SettingsRow {
    pub fn from_settings(settings: &BlockSettings) -> Self {
        Self {
            category: settings.category.clone(),
            icon: settings.icon.clone(),
            description: settings.description.clone(),
            inner_blocks: settings.inner_blocks,
            allowed_blocks: serde_json::to_string(&settings.allowed_blocks).ok(),
            template: serde_json::to_string(&settings.template).ok(),
            selected_partials: serde_json::to_string(&settings.selected_partials).ok(),
            editor_selected_partials: serde_json::to_string(&settings.editor_selected_partials).ok(),
            module_script: settings.module_script,
            supports: settings
                .supports
                .as_ref()
                .and_then(|supports| serde_json::to_string(supports).ok()),
        }
    }

    /// Materialize typed settings. Absent or invalid list JSON reads as an
    /// empty list.
    pub fn to_settings(&self) -> BlockSettings {
        BlockSettings {
            category: self.category.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
            inner_blocks: self.inner_blocks,
            allowed_blocks: parse_json_list::<String>(self.allowed_blocks.as_deref()),
            template: parse_json_list::<Value>(self.template.as_deref()),
            selected_partials: parse_id_list(self.selected_partials.as_deref()),
            editor_selected_partials: parse_id_list(self.editor_selected_partials.as_deref()),
            module_script: self.module_script,
            supports: self
                .supports
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
        }
    }
}

fn parse_json_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Vec<T> {
    raw.and_then(|raw| serde_json::from_str::<Vec<T>>(raw).ok())
        .unwrap_or_default()
}

/// Partial id lists may hold numbers or numeric strings
pub fn parse_id_list(raw: Option<&str>) -> Vec<RecordId> {
    let values: Vec<Value> = parse_json_list(raw);
    let mut ids = Vec::new();
    for value in values {
        let id = match &value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<RecordId>().ok(),
            _ => None,
        };
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// In-memory settings table with an optional partial membership index
#[derive(Debug, Clone)]
pub struct MemorySettingsRepository {
    rows: BTreeMap<RecordId, SettingsRow>,
    partial_index: BTreeMap<RecordId, BTreeSet<RecordId>>,
    supports_membership_query: bool,
}

impl Default for MemorySettingsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySettingsRepository {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            partial_index: BTreeMap::new(),
            supports_membership_query: true,
        }
    }

    /// A repository whose engine lacks the JSON membership operator
    pub fn without_membership_query() -> Self {
        Self {
            supports_membership_query: false,
            ..Self::new()
        }
    }

    pub fn supports_membership_query(&self) -> bool {
        self.supports_membership_query
    }

    /// Store a row exactly as given, bypassing typed serialization
    pub fn insert_raw_row(&mut self, block_id: RecordId, row: SettingsRow) {
        self.rows.insert(block_id, row);
        self.reindex_block(block_id);
    }

    fn reindex_block(&mut self, block_id: RecordId) {
        for blocks in self.partial_index.values_mut() {
            blocks.remove(&block_id);
        }
        if let Some(row) = self.rows.get(&block_id) {
            for partial_id in row.to_settings().local_partials() {
                self.partial_index.entry(partial_id).or_default().insert(block_id);
            }
        }
        self.partial_index.retain(|_, blocks| !blocks.is_empty());
    }
}

impl SettingsRepository for MemorySettingsRepository {
    fn get(&self, block_id: RecordId) -> Result<Option<BlockSettings>> {
        Ok(self.rows.get(&block_id).map(SettingsRow::to_settings))
    }

    fn save(&mut self, block_id: RecordId, patch: &SettingsPatch) -> Result<()> {
        let mut settings = self.get(block_id)?.unwrap_or_default();
        patch.apply_to(&mut settings);
        self.rows.insert(block_id, SettingsRow::from_settings(&settings));
        self.reindex_block(block_id);
        log::debug!("Saved settings for block {}", block_id);
        Ok(())
    }

    fn delete(&mut self, block_id: RecordId) -> Result<()> {
        self.rows.remove(&block_id);
        self.reindex_block(block_id);
        Ok(())
    }

    fn block_ids(&self) -> Result<Vec<RecordId>> {
        Ok(self.rows.keys().copied().collect())
    }

    fn blocks_selecting_partial(
        &self,
        partial_id: RecordId,
    ) -> std::result::Result<Vec<RecordId>, QueryError> {
        if !self.supports_membership_query {
            return Err(QueryError::UnsupportedOperator("JSON_CONTAINS".to_string()));
        }
        Ok(self
            .partial_index
            .get(&partial_id)
            .map(|blocks| blocks.iter().copied().collect())
            .unwrap_or_default())
    }

    fn all_settings(&self) -> Result<Vec<(RecordId, BlockSettings)>> {
        Ok(self
            .rows
            .iter()
            .map(|(id, row)| (*id, row.to_settings()))
            .collect())
    }
}

/// Compiled CSS supplied up front, keyed by record and variant
#[derive(Debug, Default, Clone)]
pub struct PrecompiledCss {
    sheets: HashMap<(RecordId, CssVariant), Vec<u8>>,
}

impl PrecompiledCss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record_id: RecordId, variant: CssVariant, css: impl Into<Vec<u8>>) {
        self.sheets.insert((record_id, variant), css.into());
    }
}

impl CssCompiler for PrecompiledCss {
    fn compiled_css_for(&self, record_id: RecordId, variant: CssVariant) -> Option<Vec<u8>> {
        self.sheets
            .get(&(record_id, variant))
            .filter(|css| !css.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_partial_json_normalizes_to_empty() {
        let mut repo = MemorySettingsRepository::new();
        repo.insert_raw_row(
            1,
            SettingsRow {
                selected_partials: Some("{not json".to_string()),
                editor_selected_partials: None,
                ..Default::default()
            },
        );
        repo.insert_raw_row(
            2,
            SettingsRow {
                selected_partials: Some("null".to_string()),
                editor_selected_partials: Some("\"7\"".to_string()),
                ..Default::default()
            },
        );

        for id in [1, 2] {
            let settings = repo.get(id).unwrap().unwrap();
            assert!(settings.selected_partials.is_empty());
            assert!(settings.editor_selected_partials.is_empty());
        }
    }

    #[test]
    fn test_id_list_accepts_numeric_strings() {
        assert_eq!(parse_id_list(Some(r#"[3, "5", "x", 3, -1]"#)), vec![3, 5]);
        assert!(parse_id_list(None).is_empty());
    }

    #[test]
    fn test_partial_save_preserves_fields() {
        let mut repo = MemorySettingsRepository::new();
        repo.save(
            10,
            &SettingsPatch {
                category: Some("text".to_string()),
                selected_partials: Some(vec![2, 3]),
                ..Default::default()
            },
        )
        .unwrap();
        repo.save(
            10,
            &SettingsPatch {
                icon: Some("heart".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let settings = repo.get(10).unwrap().unwrap();
        assert_eq!(settings.category.as_deref(), Some("text"));
        assert_eq!(settings.icon.as_deref(), Some("heart"));
        assert_eq!(settings.selected_partials, vec![2, 3]);
    }

    #[test]
    fn test_membership_query_and_index_maintenance() {
        let mut repo = MemorySettingsRepository::new();
        repo.save(1, &SettingsPatch { selected_partials: Some(vec![9]), ..Default::default() }).unwrap();
        repo.save(2, &SettingsPatch { editor_selected_partials: Some(vec![9]), ..Default::default() }).unwrap();
        assert_eq!(repo.blocks_selecting_partial(9).unwrap(), vec![1, 2]);

        repo.save(1, &SettingsPatch { selected_partials: Some(vec![]), ..Default::default() }).unwrap();
        repo.delete(2).unwrap();
        assert!(repo.blocks_selecting_partial(9).unwrap().is_empty());
    }

    #[test]
    fn test_engine_without_membership_operator() {
        let repo = MemorySettingsRepository::without_membership_query();
        assert!(matches!(
            repo.blocks_selecting_partial(1),
            Err(QueryError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_precompiled_css_ignores_empty_sheets() {
        let mut css = PrecompiledCss::new();
        css.insert(1, CssVariant::Style, "a{}");
        css.insert(1, CssVariant::Editor, "");
        assert_eq!(css.compiled_css_for(1, CssVariant::Style), Some(b"a{}".to_vec()));
        assert_eq!(css.compiled_css_for(1, CssVariant::Editor), None);
        assert_eq!(css.compiled_css_for(2, CssVariant::Style), None);
    }
}
