/// Block selector — retrieval, filtering, scoring and greedy chaining over a
/// registry snapshot.
///
/// The selector borrows the ontology and registry and never mutates either;
/// identical inputs always produce identical outputs.

use std::collections::BTreeMap;
use tracing::debug;

use crate::core::filter::{BlockFilter, CompositeFilter};
use crate::core::ontology::OntologyRegistry;
use crate::core::registry::BlockRegistry;
use crate::core::render::{ImageResolver, PromptRenderer, VerbatimRenderer};
use crate::core::scorer::{BlockScorer, CompositeScorer};
use crate::schema::block::{ActionBlock, BlockKind};
use crate::schema::concept::ConceptId;
use crate::schema::context::SelectionContext;
use crate::schema::result::{
    RenderSegment, ResolvedImage, ScoredBlock, SelectionExplanation, SelectionResult,
};

/// Candidates considered per chain step.
pub const CHAIN_LOOKAHEAD: usize = 3;

pub struct BlockSelector<'a> {
    ontology: &'a OntologyRegistry,
    registry: &'a BlockRegistry,
    filters: CompositeFilter<'a>,
    scorers: CompositeScorer<'a>,
    renderer: Box<dyn PromptRenderer + 'a>,
    resolver: Option<Box<dyn ImageResolver + 'a>>,
}

pub struct SelectorBuilder<'a> {
    ontology: &'a OntologyRegistry,
    registry: &'a BlockRegistry,
    filters: Option<CompositeFilter<'a>>,
    scorers: Option<CompositeScorer<'a>>,
    renderer: Option<Box<dyn PromptRenderer + 'a>>,
    resolver: Option<Box<dyn ImageResolver + 'a>>,
}

impl<'a> BlockSelector<'a> {
    /// A selector with the standard filters and scorers.
    pub fn new(ontology: &'a OntologyRegistry, registry: &'a BlockRegistry) -> Self {
        Self::builder(ontology, registry).build()
    }

    pub fn builder(ontology: &'a OntologyRegistry, registry: &'a BlockRegistry) -> SelectorBuilder<'a> {
        SelectorBuilder {
            ontology,
            registry,
            filters: None,
            scorers: None,
            renderer: None,
            resolver: None,
        }
    }

    pub fn ontology(&self) -> &'a OntologyRegistry {
        self.ontology
    }

    pub fn registry(&self) -> &'a BlockRegistry {
        self.registry
    }

    /// Rank every block in the registry for `context`.
    pub fn select(
        &self,
        context: &SelectionContext,
        limit: usize,
        min_score: f64,
    ) -> Vec<ScoredBlock<'a>> {
        self.rank(self.registry.all(), context, limit, min_score)
    }

    pub fn select_by_kind(
        &self,
        context: &SelectionContext,
        kind: BlockKind,
        limit: usize,
    ) -> Vec<ScoredBlock<'a>> {
        self.rank(self.registry.by_kind(kind), context, limit, 0.0)
    }

    pub fn select_transitions(&self, context: &SelectionContext, limit: usize) -> Vec<ScoredBlock<'a>> {
        self.select_by_kind(context, BlockKind::Transition, limit)
    }

    /// Rank only the blocks tagged with `location`.
    pub fn select_for_location(
        &self,
        context: &SelectionContext,
        location: &ConceptId,
        limit: usize,
    ) -> Vec<ScoredBlock<'a>> {
        self.rank(self.registry.by_location(location), context, limit, 0.0)
    }

    /// The single best block for `context`, assembled.
    pub fn select_one(&self, context: &SelectionContext) -> SelectionResult {
        let Some(best) = self.select(context, 1, 0.0).into_iter().next() else {
            return SelectionResult::empty("no block passed the filters");
        };
        let mut result = SelectionResult {
            blocks: vec![best.block.clone()],
            total_duration: best.block.duration,
            score: best.score,
            ..SelectionResult::default()
        };
        self.assemble(&mut result, context);
        result
    }

    /// Chain towards the context's own `target_duration`.
    pub fn select_chain_to_target(
        &self,
        context: &SelectionContext,
        max_blocks: usize,
    ) -> SelectionResult {
        match context.target_duration {
            Some(target) => self.select_chain(context, target, max_blocks),
            None => SelectionResult::empty("context has no target duration"),
        }
    }

    /// Greedily build a chain of blocks towards `target_duration` seconds.
    /// The explicit target takes precedence over `context.target_duration`.
    ///
    /// Each step ranks at most [`CHAIN_LOOKAHEAD`] candidates against a
    /// context continued from the previous choice and takes the best. The
    /// chain stops once the target is reached, after `max_blocks` blocks,
    /// or when a step has no candidates. The chain score re-scores every
    /// chosen block against the context it was chosen in and averages.
    pub fn select_chain(
        &self,
        context: &SelectionContext,
        target_duration: f64,
        max_blocks: usize,
    ) -> SelectionResult {
        if target_duration.is_nan() || target_duration <= 0.0 {
            return SelectionResult::empty("target duration must be positive");
        }
        if max_blocks == 0 {
            return SelectionResult::empty("max_blocks is zero");
        }

        let mut result = SelectionResult::default();
        let mut step_context = context.clone();
        let mut step_contexts = Vec::new();

        while result.blocks.len() < max_blocks && result.total_duration < target_duration {
            let Some(best) = self
                .select(&step_context, CHAIN_LOOKAHEAD, 0.0)
                .into_iter()
                .next()
            else {
                result.fallback_reason = Some(format!(
                    "no candidates after {} block(s); {:.1}s of {:.1}s filled",
                    result.blocks.len(),
                    result.total_duration,
                    target_duration
                ));
                break;
            };
            result.total_duration += best.block.duration;
            let next = step_context.continued_from(&best.block.id, best.block.effective_end_pose());
            step_contexts.push(std::mem::replace(&mut step_context, next));
            result.blocks.push(best.block.clone());
        }

        if result.fallback_reason.is_none() && result.total_duration < target_duration {
            result.fallback_reason = Some(format!(
                "stopped at {} block(s); {:.1}s of {:.1}s filled",
                result.blocks.len(),
                result.total_duration,
                target_duration
            ));
        }

        if !result.blocks.is_empty() {
            let total: f64 = result
                .blocks
                .iter()
                .zip(&step_contexts)
                .map(|(block, step)| self.scorers.score(block, step))
                .sum();
            result.score = total / result.blocks.len() as f64;
        }
        debug!(
            blocks = result.blocks.len(),
            duration = result.total_duration,
            target = target_duration,
            score = result.score,
            "Chain finished"
        );

        self.assemble(&mut result, context);
        result
    }

    /// Every filter's verdict and every scorer's contribution for one block.
    pub fn explain_selection(&self, block: &ActionBlock, context: &SelectionContext) -> SelectionExplanation {
        let filters = self.filters.evaluate_all(block, context);
        let passed = filters.iter().all(|f| f.passed);
        let components = self.scorers.breakdown(block, context);
        let score = CompositeScorer::combine(&components);
        SelectionExplanation {
            block_id: block.id.clone(),
            filters,
            passed,
            components,
            score,
        }
    }

    /// Fill the prompts, render segments and reference images of `result`
    /// from its blocks. Existing output in those fields is replaced.
    pub fn assemble(&self, result: &mut SelectionResult, context: &SelectionContext) {
        result.prompts.clear();
        result.segments.clear();
        result.resolved_images.clear();

        let mut offset = 0.0;
        for (index, block) in result.blocks.iter().enumerate() {
            let variables = prompt_variables(block, context);
            result
                .prompts
                .push(self.renderer.render(&block.prompt_template, &variables));

            result.segments.push(RenderSegment {
                index,
                block_id: block.id.clone(),
                kind: block.kind(),
                start_offset: offset,
                duration: block.duration,
                tags: segment_tags(block),
                metadata: segment_metadata(block),
            });
            offset += block.duration;

            for (role, reference) in block.reference_images() {
                let asset = self
                    .resolver
                    .as_ref()
                    .and_then(|r| r.resolve(reference, &context.actor_ids));
                result.resolved_images.push(ResolvedImage {
                    block_id: block.id.clone(),
                    role,
                    reference: reference.clone(),
                    asset,
                });
            }
        }
    }

    fn rank<I>(
        &self,
        candidates: I,
        context: &SelectionContext,
        limit: usize,
        min_score: f64,
    ) -> Vec<ScoredBlock<'a>>
    where
        I: IntoIterator<Item = &'a ActionBlock>,
    {
        let mut considered = 0usize;
        let mut scored: Vec<ScoredBlock<'a>> = candidates
            .into_iter()
            .inspect(|_| considered += 1)
            .filter(|block| self.filters.filter(block, context))
            .map(|block| ScoredBlock {
                block,
                score: self.scorers.score(block, context),
            })
            .collect();

        if scored.is_empty() {
            debug!(
                considered,
                previous = context.previous_block_id.as_deref(),
                "No blocks passed the filters"
            );
            return scored;
        }

        // Stable, so ties keep registry order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.retain(|s| s.score >= min_score);
        scored.truncate(limit);
        scored
    }
}

impl<'a> SelectorBuilder<'a> {
    pub fn filters(mut self, filters: CompositeFilter<'a>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn scorers(mut self, scorers: CompositeScorer<'a>) -> Self {
        self.scorers = Some(scorers);
        self
    }

    pub fn renderer(mut self, renderer: impl PromptRenderer + 'a) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn resolver(mut self, resolver: impl ImageResolver + 'a) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn build(self) -> BlockSelector<'a> {
        let ontology = self.ontology;
        let registry = self.registry;
        BlockSelector {
            ontology,
            registry,
            filters: self
                .filters
                .unwrap_or_else(|| CompositeFilter::standard(ontology)),
            scorers: self
                .scorers
                .unwrap_or_else(|| CompositeScorer::standard(ontology, registry)),
            renderer: self.renderer.unwrap_or_else(|| Box::new(VerbatimRenderer)),
            resolver: self.resolver,
        }
    }
}

/// Template variables for one block. Block tags win over the context.
fn prompt_variables(block: &ActionBlock, context: &SelectionContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("block_id".to_string(), block.id.clone());
    vars.insert("kind".to_string(), block.kind().to_string());
    vars.insert("duration".to_string(), format!("{}", block.duration));

    let concepts = [
        ("location", block.tags.location.as_ref().or(context.location.as_ref())),
        ("pose", block.effective_start_pose().or(context.pose.as_ref())),
        ("end_pose", block.effective_end_pose()),
        ("mood", block.tags.mood.as_ref().or(context.mood.as_ref())),
        ("intimacy", block.tags.intimacy.as_ref().or(context.intimacy.as_ref())),
        ("branch", block.tags.branch.as_ref().or(context.branch_intent.as_ref())),
    ];
    for (name, concept) in concepts {
        if let Some(concept) = concept {
            vars.insert(name.to_string(), concept.slug().to_string());
        }
    }

    if !context.actor_ids.is_empty() {
        vars.insert("actors".to_string(), context.actor_ids.join(", "));
        for (i, actor) in context.actor_ids.iter().enumerate() {
            vars.insert(format!("actor_{}", i + 1), actor.clone());
        }
    }
    vars
}

fn segment_tags(block: &ActionBlock) -> Vec<String> {
    let tags = &block.tags;
    let mut out: Vec<String> = [
        &tags.location,
        &tags.pose,
        &tags.intimacy,
        &tags.mood,
        &tags.branch,
        &tags.rating,
    ]
    .into_iter()
    .flatten()
    .map(|c| c.to_string())
    .collect();
    out.extend(tags.custom.iter().cloned());
    out
}

fn segment_metadata(block: &ActionBlock) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    if !block.negative_prompt.is_empty() {
        meta.insert("negative_prompt".to_string(), block.negative_prompt.clone());
    }
    if let Some(world) = &block.world_override {
        meta.insert("world".to_string(), world.clone());
    }
    if let Some(intensity) = block.tags.intensity {
        meta.insert("intensity".to_string(), intensity.to_string());
    }
    if let Some(camera) = &block.camera {
        let fields = [
            ("camera_movement", &camera.movement),
            ("camera_framing", &camera.framing),
            ("camera_angle", &camera.angle),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                meta.insert(key.to_string(), value.clone());
            }
        }
    }
    if let Some(c) = &block.consistency {
        let flags = [
            ("maintain_pose", c.maintain_pose),
            ("preserve_lighting", c.preserve_lighting),
            ("preserve_clothing", c.preserve_clothing),
            ("preserve_background", c.preserve_background),
        ];
        for (key, value) in flags {
            if value {
                meta.insert(key.to_string(), "true".to_string());
            }
        }
    }
    if let Some(p) = &block.intensity_progression {
        meta.insert("intensity_start".to_string(), p.start.to_string());
        if let Some(peak) = p.peak {
            meta.insert("intensity_peak".to_string(), peak.to_string());
        }
        meta.insert("intensity_end".to_string(), p.end.to_string());
    }
    meta
}
