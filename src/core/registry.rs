/// Block registry — insertion-ordered storage with kind and location indices.
///
/// Holds no selection policy. Reads take `&self`; every mutation takes
/// `&mut self`, so writers are serialized by whoever owns the registry.

use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::ontology::OntologyRegistry;
use crate::schema::block::{ActionBlock, BlockError, BlockKind, BlockRecord};
use crate::schema::concept::ConceptId;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: Vec<ActionBlock>,
    slots: FxHashMap<String, usize>,
    by_kind: FxHashMap<BlockKind, Vec<usize>>,
    by_location: FxHashMap<ConceptId, Vec<usize>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block, replacing any block with the same id in place.
    pub fn add(&mut self, block: ActionBlock) -> Result<(), BlockError> {
        block.validate()?;
        match self.slots.get(&block.id).copied() {
            Some(slot) => {
                self.unindex(slot);
                self.blocks[slot] = block;
                self.index(slot);
            }
            None => {
                let slot = self.blocks.len();
                self.slots.insert(block.id.clone(), slot);
                self.blocks.push(block);
                self.index(slot);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ActionBlock> {
        self.slots.get(id).map(|&slot| &self.blocks[slot])
    }

    /// Remove a block. Returns false if the id was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        self.blocks.remove(slot);
        self.rebuild_indices();
        true
    }

    pub fn by_kind(&self, kind: BlockKind) -> Vec<&ActionBlock> {
        self.resolve(self.by_kind.get(&kind))
    }

    pub fn by_location(&self, location: &ConceptId) -> Vec<&ActionBlock> {
        self.resolve(self.by_location.get(location))
    }

    /// Every block in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &ActionBlock> {
        self.blocks.iter()
    }

    pub fn count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Convert and add each record independently. A record that fails to
    /// convert is logged and skipped. Returns the number of blocks added.
    pub fn load_from_source<I>(&mut self, records: I, ontology: &OntologyRegistry) -> usize
    where
        I: IntoIterator<Item = BlockRecord>,
    {
        let mut loaded = 0;
        let mut skipped = 0;
        for (position, record) in records.into_iter().enumerate() {
            let outcome = ActionBlock::from_record(record, ontology).and_then(|b| self.add(b));
            match outcome {
                Ok(()) => loaded += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(position, error = %e, "Skipping malformed block record");
                }
            }
        }
        debug!(loaded, skipped, total = self.count(), "Block batch loaded");
        loaded
    }

    /// Parse a RON list of block records and load them.
    pub fn load_from_ron(
        &mut self,
        input: &str,
        ontology: &OntologyRegistry,
    ) -> Result<usize, RegistryError> {
        let records: Vec<BlockRecord> = ron::from_str(input)?;
        Ok(self.load_from_source(records, ontology))
    }

    pub fn load_from_ron_file(
        &mut self,
        path: &Path,
        ontology: &OntologyRegistry,
    ) -> Result<usize, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_ron(&contents, ontology)
    }

    fn resolve(&self, slots: Option<&Vec<usize>>) -> Vec<&ActionBlock> {
        slots
            .map(|slots| slots.iter().map(|&slot| &self.blocks[slot]).collect())
            .unwrap_or_default()
    }

    fn index(&mut self, slot: usize) {
        let block = &self.blocks[slot];
        insert_sorted(self.by_kind.entry(block.kind()).or_default(), slot);
        if let Some(location) = &block.tags.location {
            insert_sorted(self.by_location.entry(location.clone()).or_default(), slot);
        }
    }

    fn unindex(&mut self, slot: usize) {
        let block = &self.blocks[slot];
        if let Some(slots) = self.by_kind.get_mut(&block.kind()) {
            slots.retain(|&s| s != slot);
        }
        if let Some(location) = &block.tags.location {
            if let Some(slots) = self.by_location.get_mut(location) {
                slots.retain(|&s| s != slot);
                if slots.is_empty() {
                    self.by_location.remove(location);
                }
            }
        }
    }

    fn rebuild_indices(&mut self) {
        self.slots.clear();
        self.by_kind.clear();
        self.by_location.clear();
        for slot in 0..self.blocks.len() {
            self.slots.insert(self.blocks[slot].id.clone(), slot);
            self.index(slot);
        }
    }
}

/// Keep index lists in registry order so retrieval is deterministic.
fn insert_sorted(slots: &mut Vec<usize>, slot: usize) {
    if let Err(position) = slots.binary_search(&slot) {
        slots.insert(position, slot);
    }
}
