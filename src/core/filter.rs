/// Hard filters — pass/fail predicates a block must satisfy before it is
/// scored at all.

use crate::core::ontology::OntologyRegistry;
use crate::schema::block::ActionBlock;
use crate::schema::concept::{ConceptId, Namespace};
use crate::schema::context::SelectionContext;
use crate::schema::result::FilterOutcome;

/// A non-negotiable requirement on a block.
pub trait BlockFilter: Send + Sync {
    fn name(&self) -> &str;
    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool;
}

/// Ordered filters combined by logical AND, short-circuiting on the first
/// rejection.
#[derive(Default)]
pub struct CompositeFilter<'a> {
    filters: Vec<Box<dyn BlockFilter + 'a>>,
}

impl<'a> CompositeFilter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard filter set in its standard order.
    pub fn standard(ontology: &'a OntologyRegistry) -> Self {
        Self::new()
            .with(WorldFilter)
            .with(ContentRatingFilter::new(ontology))
            .with(RequiredTagsFilter)
            .with(ExcludeTagsFilter)
            .with(LocationFilter::default())
            .with(BranchIntentFilter)
            .with(IntimacyLevelFilter::new(ontology))
    }

    pub fn with(mut self, filter: impl BlockFilter + 'a) -> Self {
        self.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn BlockFilter + 'a>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter without short-circuiting.
    pub fn evaluate_all(&self, block: &ActionBlock, context: &SelectionContext) -> Vec<FilterOutcome> {
        self.filters
            .iter()
            .map(|f| FilterOutcome {
                name: f.name().to_string(),
                passed: f.filter(block, context),
            })
            .collect()
    }
}

impl BlockFilter for CompositeFilter<'_> {
    fn name(&self) -> &str {
        "composite"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        self.filters.iter().all(|f| f.filter(block, context))
    }
}

/// Blocks scoped to a world only appear in that world.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldFilter;

impl BlockFilter for WorldFilter {
    fn name(&self) -> &str {
        "world"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        match &block.world_override {
            Some(world) => context.world_id.as_deref() == Some(world.as_str()),
            None => true,
        }
    }
}

/// Rejects blocks rated above the context's ceiling.
pub struct ContentRatingFilter<'a> {
    ontology: &'a OntologyRegistry,
    default_ceiling: ConceptId,
}

impl<'a> ContentRatingFilter<'a> {
    /// Uses `rating:intimate` when the context sets no ceiling.
    pub fn new(ontology: &'a OntologyRegistry) -> Self {
        Self::with_default_ceiling(ontology, ConceptId::new(Namespace::Rating, "intimate"))
    }

    pub fn with_default_ceiling(ontology: &'a OntologyRegistry, ceiling: ConceptId) -> Self {
        Self {
            ontology,
            default_ceiling: ceiling,
        }
    }
}

impl BlockFilter for ContentRatingFilter<'_> {
    fn name(&self) -> &str {
        "content_rating"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        let Some(rating) = &block.tags.rating else {
            return true;
        };
        let ceiling = context.rating_ceiling.as_ref().unwrap_or(&self.default_ceiling);
        self.ontology.rating_allowed(rating, ceiling)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredTagsFilter;

impl BlockFilter for RequiredTagsFilter {
    fn name(&self) -> &str {
        "required_tags"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        context
            .required_tags
            .iter()
            .all(|tag| block.tags.has_custom(tag))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeTagsFilter;

impl BlockFilter for ExcludeTagsFilter {
    fn name(&self) -> &str {
        "exclude_tags"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        !context
            .excluded_tags
            .iter()
            .any(|tag| block.tags.has_custom(tag))
    }
}

/// Exact location match. Untagged blocks pass unless `strict`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationFilter {
    pub strict: bool,
}

impl BlockFilter for LocationFilter {
    fn name(&self) -> &str {
        "location"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        match (&context.location, &block.tags.location) {
            (None, _) => true,
            (Some(_), None) => !self.strict,
            (Some(wanted), Some(actual)) => wanted == actual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BranchIntentFilter;

impl BlockFilter for BranchIntentFilter {
    fn name(&self) -> &str {
        "branch_intent"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        match (&context.branch_intent, &block.tags.branch) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(_)) if wanted.slug() == "maintain" => true,
            (Some(wanted), Some(actual)) => wanted == actual,
        }
    }
}

/// Rejects blocks whose intimacy level is more than `tolerance` ordinals
/// from the requested one. Levels missing from the vocabulary pass.
pub struct IntimacyLevelFilter<'a> {
    ontology: &'a OntologyRegistry,
    pub tolerance: u32,
}

impl<'a> IntimacyLevelFilter<'a> {
    pub fn new(ontology: &'a OntologyRegistry) -> Self {
        Self::with_tolerance(ontology, 1)
    }

    pub fn with_tolerance(ontology: &'a OntologyRegistry, tolerance: u32) -> Self {
        Self { ontology, tolerance }
    }
}

impl BlockFilter for IntimacyLevelFilter<'_> {
    fn name(&self) -> &str {
        "intimacy_level"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        let (Some(wanted), Some(actual)) = (&context.intimacy, &block.tags.intimacy) else {
            return true;
        };
        self.ontology
            .intimacy_distance(wanted, actual)
            .map_or(true, |distance| distance <= self.tolerance)
    }
}

/// Keeps poses gated behind an intimacy level out of contexts that have
/// not reached it. Not part of the standard set.
pub struct PoseIntimacyGateFilter<'a> {
    ontology: &'a OntologyRegistry,
}

impl<'a> PoseIntimacyGateFilter<'a> {
    pub fn new(ontology: &'a OntologyRegistry) -> Self {
        Self { ontology }
    }
}

impl BlockFilter for PoseIntimacyGateFilter<'_> {
    fn name(&self) -> &str {
        "pose_intimacy_gate"
    }

    fn filter(&self, block: &ActionBlock, context: &SelectionContext) -> bool {
        let Some(wanted) = &context.intimacy else {
            return true;
        };
        let gate = block
            .effective_start_pose()
            .and_then(|pose| self.ontology.get_pose(pose))
            .and_then(|pose| pose.min_intimacy.as_ref());
        match (gate, self.ontology.intimacy_rank(wanted)) {
            (Some(gate), Some(rank)) => self
                .ontology
                .intimacy_rank(gate)
                .map_or(true, |required| rank >= required),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::block::{BlockShape, ReferenceImage};

    fn ontology() -> OntologyRegistry {
        OntologyRegistry::builtin().unwrap()
    }

    fn block(id: &str) -> ActionBlock {
        ActionBlock::new(
            id,
            BlockShape::SingleState {
                reference_image: ReferenceImage::Asset {
                    asset_id: "img".to_string(),
                },
                start_pose: None,
                end_pose: None,
            },
            5.0,
        )
        .unwrap()
    }

    fn concept(ontology: &OntologyRegistry, ns: Namespace, raw: &str) -> Option<ConceptId> {
        Some(ontology.canonicalize_in(ns, raw))
    }

    #[test]
    fn world_filter() {
        let mut b = block("a");
        let mut ctx = SelectionContext::default();
        assert!(WorldFilter.filter(&b, &ctx));

        b.world_override = Some("world_a".to_string());
        assert!(!WorldFilter.filter(&b, &ctx));
        ctx.world_id = Some("world_b".to_string());
        assert!(!WorldFilter.filter(&b, &ctx));
        ctx.world_id = Some("world_a".to_string());
        assert!(WorldFilter.filter(&b, &ctx));
    }

    #[test]
    fn content_rating_filter() {
        let ont = ontology();
        let filter = ContentRatingFilter::new(&ont);
        let mut b = block("a");
        let mut ctx = SelectionContext::default();
        assert!(filter.filter(&b, &ctx), "untagged blocks pass");

        b.tags.rating = concept(&ont, Namespace::Rating, "explicit");
        assert!(!filter.filter(&b, &ctx), "default ceiling is intimate");

        b.tags.rating = concept(&ont, Namespace::Rating, "intimate");
        assert!(filter.filter(&b, &ctx));

        ctx.rating_ceiling = concept(&ont, Namespace::Rating, "general");
        assert!(!filter.filter(&b, &ctx));

        b.tags.rating = concept(&ont, Namespace::Rating, "unrated_mystery");
        ctx.rating_ceiling = concept(&ont, Namespace::Rating, "explicit");
        assert!(!filter.filter(&b, &ctx), "unknown ratings fail closed");
    }

    #[test]
    fn tag_filters() {
        let mut b = block("a");
        b.tags.custom = vec!["golden_hour".to_string(), "rain".to_string()];
        let mut ctx = SelectionContext::default();
        assert!(RequiredTagsFilter.filter(&b, &ctx));
        assert!(ExcludeTagsFilter.filter(&b, &ctx));

        ctx.required_tags = vec!["golden_hour".to_string()];
        assert!(RequiredTagsFilter.filter(&b, &ctx));
        ctx.required_tags.push("snow".to_string());
        assert!(!RequiredTagsFilter.filter(&b, &ctx));

        ctx.excluded_tags = vec!["rain".to_string()];
        assert!(!ExcludeTagsFilter.filter(&b, &ctx));
    }

    #[test]
    fn location_filter_strictness() {
        let ont = ontology();
        let mut b = block("a");
        let mut ctx = SelectionContext::default();
        assert!(LocationFilter::default().filter(&b, &ctx));

        ctx.location = concept(&ont, Namespace::Location, "cafe");
        assert!(LocationFilter::default().filter(&b, &ctx));
        assert!(!LocationFilter { strict: true }.filter(&b, &ctx));

        b.tags.location = concept(&ont, Namespace::Location, "beach");
        assert!(!LocationFilter::default().filter(&b, &ctx));
        b.tags.location = concept(&ont, Namespace::Location, "coffee shop");
        assert!(LocationFilter { strict: true }.filter(&b, &ctx));
    }

    #[test]
    fn branch_intent_maintain_always_passes() {
        let ont = ontology();
        let mut b = block("a");
        b.tags.branch = concept(&ont, Namespace::Branch, "escalate");
        let mut ctx = SelectionContext::default();
        assert!(BranchIntentFilter.filter(&b, &ctx));

        ctx.branch_intent = concept(&ont, Namespace::Branch, "maintain");
        assert!(BranchIntentFilter.filter(&b, &ctx));
        ctx.branch_intent = concept(&ont, Namespace::Branch, "deescalate");
        assert!(!BranchIntentFilter.filter(&b, &ctx));
        ctx.branch_intent = concept(&ont, Namespace::Branch, "escalate");
        assert!(BranchIntentFilter.filter(&b, &ctx));
    }

    #[test]
    fn intimacy_filter_tolerance() {
        let ont = ontology();
        let filter = IntimacyLevelFilter::new(&ont);
        let mut b = block("a");
        let mut ctx = SelectionContext::default();
        ctx.intimacy = concept(&ont, Namespace::Intimacy, "light_flirt");
        assert!(filter.filter(&b, &ctx));

        b.tags.intimacy = concept(&ont, Namespace::Intimacy, "deep_flirt");
        assert!(filter.filter(&b, &ctx));
        b.tags.intimacy = concept(&ont, Namespace::Intimacy, "intimate");
        assert!(!filter.filter(&b, &ctx));
        assert!(IntimacyLevelFilter::with_tolerance(&ont, 2).filter(&b, &ctx));
    }

    #[test]
    fn pose_gate_filter() {
        let ont = ontology();
        let filter = PoseIntimacyGateFilter::new(&ont);
        let mut b = block("a");
        b.tags.pose = concept(&ont, Namespace::Pose, "kiss");
        let mut ctx = SelectionContext::default();
        assert!(filter.filter(&b, &ctx));

        ctx.intimacy = concept(&ont, Namespace::Intimacy, "deep_flirt");
        assert!(!filter.filter(&b, &ctx));
        ctx.intimacy = concept(&ont, Namespace::Intimacy, "intimate");
        assert!(filter.filter(&b, &ctx));
    }

    #[test]
    fn composite_equals_and_of_parts() {
        let ont = ontology();
        let composite = CompositeFilter::standard(&ont);
        assert_eq!(composite.len(), 7);

        let mut b = block("a");
        b.tags.location = concept(&ont, Namespace::Location, "cafe");
        b.tags.rating = concept(&ont, Namespace::Rating, "explicit");
        b.world_override = Some("w".to_string());

        let contexts = [
            SelectionContext::default(),
            SelectionContext {
                world_id: Some("w".to_string()),
                rating_ceiling: concept(&ont, Namespace::Rating, "explicit"),
                ..SelectionContext::default()
            },
            SelectionContext {
                world_id: Some("w".to_string()),
                rating_ceiling: concept(&ont, Namespace::Rating, "explicit"),
                location: concept(&ont, Namespace::Location, "beach"),
                ..SelectionContext::default()
            },
        ];
        let expected = [false, true, false];
        for (ctx, expected) in contexts.iter().zip(expected) {
            let outcomes = composite.evaluate_all(&b, ctx);
            let and = outcomes.iter().all(|o| o.passed);
            assert_eq!(composite.filter(&b, ctx), and);
            assert_eq!(and, expected);
        }
    }
}
