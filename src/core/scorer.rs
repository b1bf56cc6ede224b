/// Soft scorers — weighted [0, 1] preferences that rank blocks which
/// survived filtering.
///
/// Every scorer degrades to partial credit on missing metadata instead of
/// zeroing out, so sparsely tagged blocks stay selectable.

use crate::core::ontology::{OntologyRegistry, ScoringConfig};
use crate::core::registry::BlockRegistry;
use crate::schema::block::ActionBlock;
use crate::schema::concept::ConceptId;
use crate::schema::context::SelectionContext;
use crate::schema::result::ScoreComponent;

/// Credit for a block with no pose when a pose was requested.
pub const UNCERTAIN_POSE_CREDIT: f64 = 0.5;
/// Lowest credit for an intimacy mismatch beyond one ordinal.
pub const INTIMACY_FLOOR: f64 = 0.2;
/// Credit when the previous block's end pose matches the candidate's start.
pub const POSE_CONTINUITY_CREDIT: f64 = 0.7;
/// Credit for a candidate with no link to the previous block.
pub const CHAIN_FLOOR: f64 = 0.1;

pub trait BlockScorer: Send + Sync {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    /// Score in [0, 1].
    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64;
}

/// Weighted average of scorers.
///
/// Only scorers that were actually evaluated contribute their weight;
/// zero-weight scorers and non-finite scores are skipped.
#[derive(Default)]
pub struct CompositeScorer<'a> {
    scorers: Vec<Box<dyn BlockScorer + 'a>>,
}

impl<'a> CompositeScorer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard scorer set, weighted from the ontology's scoring config.
    /// Chain compatibility gets registry access for pose continuity.
    pub fn standard(ontology: &'a OntologyRegistry, registry: &'a BlockRegistry) -> Self {
        let config = ontology.scoring();
        let w = &config.weights;
        Self::new()
            .with(ChainCompatibilityScorer::new(w.chain_compatibility).with_registry(registry))
            .with(LocationScorer::new(config))
            .with(PoseScorer::new(ontology))
            .with(IntimacyScorer::new(ontology))
            .with(MoodScorer::new(config))
            .with(BranchIntentScorer::new(config))
    }

    pub fn with(mut self, scorer: impl BlockScorer + 'a) -> Self {
        self.push(Box::new(scorer));
        self
    }

    pub fn push(&mut self, scorer: Box<dyn BlockScorer + 'a>) {
        self.scorers.push(scorer);
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }

    /// Per-scorer contributions, in scorer order.
    pub fn breakdown(&self, block: &ActionBlock, context: &SelectionContext) -> Vec<ScoreComponent> {
        self.scorers
            .iter()
            .map(|s| ScoreComponent {
                name: s.name().to_string(),
                weight: s.weight(),
                score: s.score(block, context),
            })
            .collect()
    }

    /// Weighted average of already computed components. An empty set
    /// scores 1.0.
    pub fn combine(components: &[ScoreComponent]) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for c in components {
            if c.weight <= 0.0 || !c.weight.is_finite() || !c.score.is_finite() {
                continue;
            }
            weighted += c.weight * c.score.clamp(0.0, 1.0);
            total_weight += c.weight;
        }
        if total_weight == 0.0 {
            return 1.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }
}

impl BlockScorer for CompositeScorer<'_> {
    fn name(&self) -> &str {
        "composite"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        Self::combine(&self.breakdown(block, context))
    }
}

/// Exact match / generic partial credit / no match, shared by the flat
/// concept scorers.
fn tiered_match(wanted: Option<&ConceptId>, actual: Option<&ConceptId>, generic: f64) -> f64 {
    match (wanted, actual) {
        (None, _) => 1.0,
        (Some(_), None) => generic,
        (Some(wanted), Some(actual)) if wanted == actual => 1.0,
        _ => 0.0,
    }
}

pub struct LocationScorer {
    weight: f64,
    generic_credit: f64,
}

impl LocationScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weight: config.weights.location_match,
            generic_credit: config.partial_credit.generic_block,
        }
    }
}

impl BlockScorer for LocationScorer {
    fn name(&self) -> &str {
        "location"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        tiered_match(
            context.location.as_ref(),
            block.tags.location.as_ref(),
            self.generic_credit,
        )
    }
}

pub struct MoodScorer {
    weight: f64,
    generic_credit: f64,
}

impl MoodScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weight: config.weights.mood_match,
            generic_credit: config.partial_credit.generic_block,
        }
    }
}

impl BlockScorer for MoodScorer {
    fn name(&self) -> &str {
        "mood"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        tiered_match(
            context.mood.as_ref(),
            block.tags.mood.as_ref(),
            self.generic_credit,
        )
    }
}

pub struct BranchIntentScorer {
    weight: f64,
    generic_credit: f64,
}

impl BranchIntentScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weight: config.weights.branch_intent,
            generic_credit: config.partial_credit.generic_block,
        }
    }
}

impl BlockScorer for BranchIntentScorer {
    fn name(&self) -> &str {
        "branch_intent"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        tiered_match(
            context.branch_intent.as_ref(),
            block.tags.branch.as_ref(),
            self.generic_credit,
        )
    }
}

/// Scores the block's opening pose against the requested pose using the
/// ontology's hierarchy.
pub struct PoseScorer<'a> {
    ontology: &'a OntologyRegistry,
    weight: f64,
}

impl<'a> PoseScorer<'a> {
    pub fn new(ontology: &'a OntologyRegistry) -> Self {
        Self {
            ontology,
            weight: ontology.scoring().weights.pose_match,
        }
    }
}

impl BlockScorer for PoseScorer<'_> {
    fn name(&self) -> &str {
        "pose"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        let Some(wanted) = &context.pose else {
            return 1.0;
        };
        let Some(actual) = block.effective_start_pose() else {
            return UNCERTAIN_POSE_CREDIT;
        };
        if wanted == actual {
            return 1.0;
        }
        // A pose outside the vocabulary is as good as no pose at all.
        if self.ontology.get_pose(actual).is_none() {
            return UNCERTAIN_POSE_CREDIT;
        }
        self.ontology.pose_similarity(wanted, actual)
    }
}

pub struct IntimacyScorer<'a> {
    ontology: &'a OntologyRegistry,
    weight: f64,
    adjacent_credit: f64,
    generic_credit: f64,
}

impl<'a> IntimacyScorer<'a> {
    pub fn new(ontology: &'a OntologyRegistry) -> Self {
        let config = ontology.scoring();
        Self {
            ontology,
            weight: config.weights.intimacy_match,
            adjacent_credit: config.partial_credit.adjacent_intimacy,
            generic_credit: config.partial_credit.generic_block,
        }
    }
}

impl BlockScorer for IntimacyScorer<'_> {
    fn name(&self) -> &str {
        "intimacy"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        let Some(wanted) = &context.intimacy else {
            return 1.0;
        };
        let Some(actual) = &block.tags.intimacy else {
            return self.generic_credit;
        };
        if wanted == actual {
            return 1.0;
        }
        match self.ontology.intimacy_distance(wanted, actual) {
            Some(0) => 1.0,
            Some(1) => self.adjacent_credit,
            Some(_) => INTIMACY_FLOOR,
            None => self.generic_credit,
        }
    }
}

/// Continuity with the previous block in a chain.
pub struct ChainCompatibilityScorer<'a> {
    weight: f64,
    registry: Option<&'a BlockRegistry>,
}

impl<'a> ChainCompatibilityScorer<'a> {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            registry: None,
        }
    }

    /// Allow looking up the previous block for its hints and end pose.
    pub fn with_registry(mut self, registry: &'a BlockRegistry) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl BlockScorer for ChainCompatibilityScorer<'_> {
    fn name(&self) -> &str {
        "chain_compatibility"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, block: &ActionBlock, context: &SelectionContext) -> f64 {
        let Some(prev_id) = context.previous_block_id.as_deref() else {
            return 1.0;
        };
        if block.allows_prev(prev_id) {
            return 1.0;
        }
        let Some(previous) = self.registry.and_then(|r| r.get(prev_id)) else {
            return CHAIN_FLOOR;
        };
        if previous.allows_next(&block.id) {
            return 1.0;
        }
        match (previous.effective_end_pose(), block.effective_start_pose()) {
            (Some(end), Some(start)) if end == start => POSE_CONTINUITY_CREDIT,
            _ => CHAIN_FLOOR,
        }
    }
}
