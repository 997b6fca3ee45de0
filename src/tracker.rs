//! Partial dependency tracking
//!
//! Keeps the derived partial -> blocks relation so that a partial save can
//! be answered with the set of blocks whose styles must be rebuilt. Global
//! partials reach every block in the content store and are never looked up
//! in the relation.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{QueryError, Result};
use crate::store::{ContentStore, SettingsRepository};
use crate::types::{BlockSettings, PartialScope, PartialUsage, RecordId, RecordKind};

#[derive(Debug, Default, Clone)]
pub struct PartialTracker {
    /// partial -> blocks selecting it locally
    relation: BTreeMap<RecordId, BTreeSet<RecordId>>,
    /// block -> local selections in saved order
    selections: BTreeMap<RecordId, Vec<RecordId>>,
    scopes: BTreeMap<RecordId, PartialScope>,
    blocks: BTreeSet<RecordId>,
}

/// Blocks whose local selections include `partial_id`.
///
/// Uses the repository's membership query; when the storage engine lacks
/// the operator, scans every settings row instead. Both paths return the
/// same sorted list.
pub fn blocks_selecting_partial(
    repository: &dyn SettingsRepository,
    partial_id: RecordId,
) -> Result<Vec<RecordId>> {
    match repository.blocks_selecting_partial(partial_id) {
        Ok(mut blocks) => {
            blocks.sort_unstable();
            blocks.dedup();
            Ok(blocks)
        }
        Err(QueryError::UnsupportedOperator(operator)) => {
            log::debug!(
                "Membership query unsupported ({}); scanning settings for partial {}",
                operator,
                partial_id
            );
            let mut blocks: Vec<RecordId> = repository
                .all_settings()?
                .into_iter()
                .filter(|(_, settings)| settings.selects_partial(partial_id))
                .map(|(block_id, _)| block_id)
                .collect();
            blocks.sort_unstable();
            Ok(blocks)
        }
        Err(other) => Err(other.into()),
    }
}

impl PartialTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute everything from storage
    pub fn rebuild(
        &mut self,
        store: &dyn ContentStore,
        repository: &dyn SettingsRepository,
        scopes: impl IntoIterator<Item = PartialScope>,
    ) -> Result<()> {
        self.relation.clear();
        self.selections.clear();
        self.blocks = store.record_ids(RecordKind::Block).into_iter().collect();
        self.scopes = scopes
            .into_iter()
            .map(|scope| (scope.partial_id, scope))
            .collect();

        for (block_id, settings) in repository.all_settings()? {
            self.block_settings_saved(block_id, &settings);
        }

        log::debug!(
            "Tracker rebuilt: {} blocks, {} partials, {} relation rows",
            self.blocks.len(),
            self.scopes.len(),
            self.relation.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(())
    }

    /// Replace the relation rows of one block after its settings were saved
    pub fn block_settings_saved(&mut self, block_id: RecordId, settings: &BlockSettings) {
        self.blocks.insert(block_id);
        self.remove_block_rows(block_id);

        let selection = settings.local_partials();
        for partial_id in &selection {
            self.relation.entry(*partial_id).or_default().insert(block_id);
        }
        self.selections.insert(block_id, selection);
    }

    /// Record a partial's global flag or order change. When the partial is
    /// local, its relation rows are refreshed from storage.
    pub fn partial_scope_changed(
        &mut self,
        repository: &dyn SettingsRepository,
        scope: PartialScope,
    ) -> Result<()> {
        let previous = self.scopes.insert(scope.partial_id, scope);
        if let Some(previous) = previous {
            if previous.global != scope.global {
                log::info!(
                    "Partial {} is now {}",
                    scope.partial_id,
                    if scope.global { "global" } else { "local" }
                );
            }
        }

        if !scope.global {
            let blocks = blocks_selecting_partial(repository, scope.partial_id)?;
            self.relation.remove(&scope.partial_id);
            for block_id in &blocks {
                self.blocks.insert(*block_id);
                self.relation.entry(scope.partial_id).or_default().insert(*block_id);
            }
        }
        Ok(())
    }

    pub fn block_deleted(&mut self, block_id: RecordId) {
        self.blocks.remove(&block_id);
        self.remove_block_rows(block_id);
        self.selections.remove(&block_id);
    }

    pub fn partial_deleted(&mut self, partial_id: RecordId) {
        self.scopes.remove(&partial_id);
        self.relation.remove(&partial_id);
        for selection in self.selections.values_mut() {
            selection.retain(|id| *id != partial_id);
        }
    }

    pub fn is_global(&self, partial_id: RecordId) -> bool {
        self.scopes
            .get(&partial_id)
            .map(|scope| scope.global)
            .unwrap_or(false)
    }

    /// Blocks to regenerate after `partial_id` changed. A global partial
    /// reaches every block record in the store, including blocks that have
    /// never saved settings.
    pub fn affected_blocks(
        &self,
        store: &dyn ContentStore,
        partial_id: RecordId,
    ) -> BTreeSet<RecordId> {
        if self.is_global(partial_id) {
            return store.record_ids(RecordKind::Block).into_iter().collect();
        }
        self.relation.get(&partial_id).cloned().unwrap_or_default()
    }

    /// Global partials in stylesheet order: ascending `order`, then id
    pub fn global_partials(&self) -> Vec<RecordId> {
        let mut globals: Vec<&PartialScope> =
            self.scopes.values().filter(|scope| scope.global).collect();
        globals.sort_by_key(|scope| (scope.order, scope.partial_id));
        globals.into_iter().map(|scope| scope.partial_id).collect()
    }

    /// Partials fed to the compiler for a block: globals first, then the
    /// block's own selections in saved order
    pub fn style_inputs_for(&self, block_id: RecordId) -> Vec<RecordId> {
        let mut inputs = self.global_partials();
        if let Some(selection) = self.selections.get(&block_id) {
            for partial_id in selection {
                if !inputs.contains(partial_id) {
                    inputs.push(*partial_id);
                }
            }
        }
        inputs
    }

    /// The derived usage rows of one block
    pub fn usage_for(&self, block_id: RecordId) -> Vec<PartialUsage> {
        if !self.blocks.contains(&block_id) {
            return Vec::new();
        }
        self.style_inputs_for(block_id)
            .into_iter()
            .map(|partial_id| PartialUsage { block_id, partial_id })
            .collect()
    }

    fn remove_block_rows(&mut self, block_id: RecordId) {
        for blocks in self.relation.values_mut() {
            blocks.remove(&block_id);
        }
        self.relation.retain(|_, blocks| !blocks.is_empty());
    }
}
