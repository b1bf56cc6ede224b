/// Selection output shapes consumed by downstream generation and render
/// queues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::block::{ActionBlock, BlockKind, ImageRole, ReferenceImage};

/// A candidate with its composite score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredBlock<'a> {
    pub block: &'a ActionBlock,
    pub score: f64,
}

/// A concrete asset returned by an image resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub crop: Option<CropRect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A reference image slot and, once resolved, its asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub block_id: String,
    pub role: ImageRole,
    pub reference: ReferenceImage,
    pub asset: Option<AssetRecord>,
}

/// Render-queue descriptor for one chosen block. Carries no media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSegment {
    pub index: usize,
    pub block_id: String,
    pub kind: BlockKind,
    pub start_offset: f64,
    pub duration: f64,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// The outcome of a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub blocks: Vec<ActionBlock>,
    pub total_duration: f64,
    pub resolved_images: Vec<ResolvedImage>,
    /// Aggregate score in [0, 1].
    pub score: f64,
    /// Why the result is empty or shorter than requested.
    pub fallback_reason: Option<String>,
    pub prompts: Vec<String>,
    pub segments: Vec<RenderSegment>,
}

impl SelectionResult {
    /// An empty result carrying an explanation.
    pub fn empty(reason: impl Into<String>) -> SelectionResult {
        SelectionResult {
            fallback_reason: Some(reason.into()),
            ..SelectionResult::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_ids(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }
}

/// Outcome of a single filter for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub name: String,
    pub passed: bool,
}

/// Contribution of a single scorer for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComponent {
    pub name: String,
    pub weight: f64,
    pub score: f64,
}

/// Full pass/fail and scoring breakdown for one block in one context.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionExplanation {
    pub block_id: String,
    pub filters: Vec<FilterOutcome>,
    pub passed: bool,
    pub components: Vec<ScoreComponent>,
    pub score: f64,
}

impl SelectionExplanation {
    /// Names of the filters that rejected the block.
    pub fn failed_filters(&self) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|f| !f.passed)
            .map(|f| f.name.as_str())
            .collect()
    }
}
