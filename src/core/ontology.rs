/// Ontology registry — canonical vocabulary, pack merging, and similarity queries.
///
/// A registry is assembled from one core pack plus any number of extension
/// packs. Merging is strict: conflicting ids, aliases, ordinals or scoring
/// sections refuse to load instead of being silently dropped.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::concept::{normalize_slug, ConceptId, Namespace};

/// Bundled core vocabulary.
const BUILTIN_CORE: &str = include_str!("../../vocab/core.ron");

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no core ontology pack was provided")]
    MissingCore,
    #[error("invalid concept id '{raw}' in {namespace} section of pack '{pack}'")]
    InvalidConcept {
        namespace: Namespace,
        raw: String,
        pack: String,
    },
    #[error("duplicate concept '{id}' in pack '{pack}'")]
    DuplicateConcept { id: ConceptId, pack: String },
    #[error("alias '{alias}' in {namespace} claimed by both '{existing}' and '{incoming}'")]
    AliasConflict {
        namespace: Namespace,
        alias: String,
        existing: ConceptId,
        incoming: ConceptId,
    },
    #[error("{namespace} level {level} assigned to both '{existing}' and '{incoming}'")]
    OverlappingRange {
        namespace: Namespace,
        level: i32,
        existing: ConceptId,
        incoming: ConceptId,
    },
    #[error("pose '{pose}' names unknown parent '{parent}'")]
    UnknownParent { pose: ConceptId, parent: String },
    #[error("pose '{pose}' references unknown concept '{reference}'")]
    UnknownConcept { pose: ConceptId, reference: String },
    #[error("pose hierarchy contains a cycle through '{0}'")]
    PoseCycle(ConceptId),
    #[error("scoring configuration defined by both '{first}' and '{second}'")]
    DuplicateScoring { first: String, second: String },
    #[error("invalid scoring configuration: {0}")]
    InvalidScoring(String),
}

// ---------------------------------------------------------------------------
// Pack documents
// ---------------------------------------------------------------------------

/// A declarative vocabulary document, as authored in RON.
///
/// Ids may be written with or without their namespace prefix; they are
/// namespaced by the section they appear in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyPack {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub poses: Vec<PoseEntry>,
    #[serde(default)]
    pub moods: Vec<ConceptEntry>,
    #[serde(default)]
    pub locations: Vec<ConceptEntry>,
    #[serde(default)]
    pub branch_intents: Vec<ConceptEntry>,
    #[serde(default)]
    pub intimacy_levels: Vec<LevelEntry>,
    #[serde(default)]
    pub content_ratings: Vec<LevelEntry>,
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub min_intimacy: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptEntry {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelEntry {
    pub id: String,
    pub level: i32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl OntologyPack {
    /// Load a pack from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<OntologyPack, OntologyError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a pack from a RON string.
    pub fn parse_ron(input: &str) -> Result<OntologyPack, OntologyError> {
        Ok(ron::from_str(input)?)
    }
}

// ---------------------------------------------------------------------------
// Scoring configuration
// ---------------------------------------------------------------------------

/// Relative weights of the standard scorers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub chain_compatibility: f64,
    pub location_match: f64,
    pub pose_match: f64,
    pub intimacy_match: f64,
    pub mood_match: f64,
    pub branch_intent: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            chain_compatibility: 0.30,
            location_match: 0.20,
            pose_match: 0.15,
            intimacy_match: 0.15,
            mood_match: 0.10,
            branch_intent: 0.10,
        }
    }
}

/// Partial-credit constants awarded for near misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialCredit {
    /// Block carries no tag for the requested dimension.
    pub generic_block: f64,
    /// One pose is an ancestor of the other.
    pub parent_pose: f64,
    /// Poses share a category.
    pub same_category: f64,
    /// Intimacy levels one ordinal apart.
    pub adjacent_intimacy: f64,
}

impl Default for PartialCredit {
    fn default() -> Self {
        Self {
            generic_block: 0.6,
            parent_pose: 0.8,
            same_category: 0.6,
            adjacent_intimacy: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub partial_credit: PartialCredit,
}

impl ScoringConfig {
    /// Reject weights that are negative, non-finite or all zero, and
    /// partial credit outside [0, 1].
    pub fn validate(&self) -> Result<(), OntologyError> {
        let w = &self.weights;
        let weights = [
            ("chain_compatibility", w.chain_compatibility),
            ("location_match", w.location_match),
            ("pose_match", w.pose_match),
            ("intimacy_match", w.intimacy_match),
            ("mood_match", w.mood_match),
            ("branch_intent", w.branch_intent),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(OntologyError::InvalidScoring(format!(
                    "weight '{}' must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if weights.iter().all(|(_, value)| *value == 0.0) {
            return Err(OntologyError::InvalidScoring(
                "at least one weight must be positive".to_string(),
            ));
        }

        let p = &self.partial_credit;
        let credits = [
            ("generic_block", p.generic_block),
            ("parent_pose", p.parent_pose),
            ("same_category", p.same_category),
            ("adjacent_intimacy", p.adjacent_intimacy),
        ];
        for (name, value) in credits {
            if !(0.0..=1.0).contains(&value) {
                return Err(OntologyError::InvalidScoring(format!(
                    "partial credit '{}' must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loaded definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDefinition {
    pub id: ConceptId,
    pub label: String,
    pub category: String,
    pub aliases: Vec<String>,
    pub parent: Option<ConceptId>,
    pub min_intimacy: Option<ConceptId>,
    pub tags: Vec<String>,
}

/// A flat concept with no structure beyond its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDefinition {
    pub id: ConceptId,
    pub aliases: Vec<String>,
}

pub type MoodDefinition = ConceptDefinition;
pub type LocationDefinition = ConceptDefinition;
pub type BranchIntentDefinition = ConceptDefinition;

/// A concept ranked on an ordinal scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub id: ConceptId,
    pub level: i32,
}

pub type IntimacyLevel = LevelDefinition;
pub type ContentRatingLevel = LevelDefinition;

/// Name and version of a merged pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackInfo {
    pub name: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The loaded, validated vocabulary. Built once and passed by reference
/// to everything that needs canonical concepts.
#[derive(Debug, Clone, Default)]
pub struct OntologyRegistry {
    packs: Vec<PackInfo>,
    known: FxHashMap<Namespace, FxHashSet<ConceptId>>,
    aliases: FxHashMap<(Namespace, String), ConceptId>,
    pose_order: Vec<ConceptId>,
    poses: FxHashMap<ConceptId, PoseDefinition>,
    concepts: FxHashMap<ConceptId, ConceptDefinition>,
    intimacy: FxHashMap<ConceptId, LevelDefinition>,
    ratings: FxHashMap<ConceptId, LevelDefinition>,
    scoring: ScoringConfig,
}

impl OntologyRegistry {
    pub fn builder() -> OntologyBuilder {
        OntologyBuilder::default()
    }

    /// Load and merge a core pack with extension packs.
    pub fn load(
        core: OntologyPack,
        extensions: Vec<OntologyPack>,
    ) -> Result<OntologyRegistry, OntologyError> {
        let mut merger = Merger::default();
        merger.merge(core)?;
        for pack in extensions {
            merger.merge(pack)?;
        }
        merger.finish()
    }

    /// The bundled core vocabulary with no extensions.
    pub fn builtin() -> Result<OntologyRegistry, OntologyError> {
        Self::load(OntologyPack::parse_ron(BUILTIN_CORE)?, Vec::new())
    }

    /// Canonicalize a raw tag.
    ///
    /// Prefixed input keeps its namespace and is resolved through that
    /// namespace's aliases. Unprefixed input is looked up across every
    /// namespace in [`Namespace::ALL`] order; if nothing matches it becomes
    /// a `custom:` concept.
    pub fn canonicalize(&self, raw: &str) -> ConceptId {
        if let Some(id) = ConceptId::parse(raw) {
            return self.resolve_alias(id.namespace(), id.slug()).unwrap_or(id);
        }
        let slug = normalize_slug(raw);
        for namespace in Namespace::ALL {
            if let Some(id) = self.resolve_alias(namespace, &slug) {
                return id;
            }
        }
        ConceptId::new(Namespace::Custom, &slug)
    }

    /// Canonicalize a raw tag known to belong to `namespace`. Unknown
    /// values become `namespace:slug` rather than failing.
    pub fn canonicalize_in(&self, namespace: Namespace, raw: &str) -> ConceptId {
        if let Some(id) = ConceptId::parse(raw) {
            if id.namespace() != namespace {
                return self.canonicalize(raw);
            }
            return self.resolve_alias(namespace, id.slug()).unwrap_or(id);
        }
        let slug = normalize_slug(raw);
        self.resolve_alias(namespace, &slug)
            .unwrap_or_else(|| ConceptId::new(namespace, &slug))
    }

    fn resolve_alias(&self, namespace: Namespace, slug: &str) -> Option<ConceptId> {
        self.aliases.get(&(namespace, slug.to_string())).cloned()
    }

    /// Returns true if `id` (prefixed or bare) names a loaded concept in
    /// `namespace`.
    pub fn is_known(&self, namespace: Namespace, id: &str) -> bool {
        let canonical = self.canonicalize_in(namespace, id);
        canonical.namespace() == namespace && self.contains(&canonical)
    }

    /// Returns true if the canonical id is part of the loaded vocabulary.
    pub fn contains(&self, id: &ConceptId) -> bool {
        self.known
            .get(&id.namespace())
            .is_some_and(|set| set.contains(id))
    }

    pub fn get_pose(&self, id: &ConceptId) -> Option<&PoseDefinition> {
        self.poses.get(id)
    }

    /// Poses in load order.
    pub fn poses(&self) -> impl Iterator<Item = &PoseDefinition> {
        self.pose_order.iter().filter_map(|id| self.poses.get(id))
    }

    pub fn get_concept(&self, id: &ConceptId) -> Option<&ConceptDefinition> {
        self.concepts.get(id)
    }

    /// Parent chain of a pose, nearest first. The chain is acyclic because
    /// cycles are rejected at load time.
    pub fn pose_ancestors(&self, id: &ConceptId) -> Vec<&ConceptId> {
        let mut ancestors = Vec::new();
        let mut current = self.poses.get(id);
        while let Some(pose) = current {
            match pose.parent.as_ref() {
                Some(parent) if !ancestors.contains(&parent) && parent != id => {
                    ancestors.push(parent);
                    current = self.poses.get(parent);
                }
                _ => break,
            }
        }
        ancestors
    }

    /// Similarity of two poses in [0, 1].
    ///
    /// 1.0 when identical, `parent_pose` credit when one is an ancestor of
    /// the other, `same_category` credit when both share a category,
    /// otherwise 0.
    pub fn pose_similarity(&self, a: &ConceptId, b: &ConceptId) -> f64 {
        if a == b {
            return 1.0;
        }
        let (Some(pose_a), Some(pose_b)) = (self.poses.get(a), self.poses.get(b)) else {
            return 0.0;
        };
        let credit = &self.scoring.partial_credit;
        if self.pose_ancestors(a).contains(&b) || self.pose_ancestors(b).contains(&a) {
            return credit.parent_pose;
        }
        if !pose_a.category.is_empty() && pose_a.category == pose_b.category {
            return credit.same_category;
        }
        0.0
    }

    pub fn intimacy_rank(&self, id: &ConceptId) -> Option<i32> {
        self.intimacy.get(id).map(|level| level.level)
    }

    pub fn rating_rank(&self, id: &ConceptId) -> Option<i32> {
        self.ratings.get(id).map(|level| level.level)
    }

    /// Absolute ordinal distance between two intimacy levels, or `None`
    /// if either is not in the vocabulary.
    pub fn intimacy_distance(&self, a: &ConceptId, b: &ConceptId) -> Option<u32> {
        Some(self.intimacy_rank(a)?.abs_diff(self.intimacy_rank(b)?))
    }

    /// Whether a candidate rating is within the ceiling. Unknown
    /// candidates are refused; an unknown ceiling admits nothing but
    /// itself.
    pub fn rating_allowed(&self, candidate: &ConceptId, ceiling: &ConceptId) -> bool {
        match (self.rating_rank(candidate), self.rating_rank(ceiling)) {
            (Some(candidate), Some(ceiling)) => candidate <= ceiling,
            _ => candidate == ceiling,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn packs(&self) -> &[PackInfo] {
        &self.packs
    }

    /// Number of loaded concepts in a namespace.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.known.get(&namespace).map_or(0, |set| set.len())
    }

    pub fn is_empty(&self) -> bool {
        self.known.values().all(|set| set.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Accumulates packs into a registry, deferring cross-pack references
/// (pose parents, intimacy gates) until every pack is in.
#[derive(Default)]
struct Merger {
    registry: OntologyRegistry,
    pending_links: Vec<(ConceptId, Option<String>, Option<String>)>,
    intimacy_levels: FxHashMap<i32, ConceptId>,
    rating_levels: FxHashMap<i32, ConceptId>,
    scoring_source: Option<String>,
}

impl Merger {
    fn merge(&mut self, pack: OntologyPack) -> Result<(), OntologyError> {
        let name = pack.name.clone();
        debug!(pack = %name, version = %pack.version, "Merging ontology pack");

        for entry in pack.poses {
            let id = concept_id(Namespace::Pose, &entry.id, &name)?;
            self.register(Namespace::Pose, &id, &entry.aliases, &name)?;
            let label = if entry.label.is_empty() {
                id.slug().to_string()
            } else {
                entry.label
            };
            self.pending_links
                .push((id.clone(), entry.parent, entry.min_intimacy));
            self.registry.pose_order.push(id.clone());
            self.registry.poses.insert(
                id.clone(),
                PoseDefinition {
                    id,
                    label,
                    category: normalize_slug(&entry.category),
                    aliases: entry.aliases,
                    parent: None,
                    min_intimacy: None,
                    tags: entry.tags.iter().map(|t| normalize_slug(t)).collect(),
                },
            );
        }

        for (namespace, entries) in [
            (Namespace::Mood, pack.moods),
            (Namespace::Location, pack.locations),
            (Namespace::Branch, pack.branch_intents),
        ] {
            for entry in entries {
                let id = concept_id(namespace, &entry.id, &name)?;
                self.register(namespace, &id, &entry.aliases, &name)?;
                self.registry.concepts.insert(
                    id.clone(),
                    ConceptDefinition {
                        id,
                        aliases: entry.aliases,
                    },
                );
            }
        }

        for entry in pack.intimacy_levels {
            let id = concept_id(Namespace::Intimacy, &entry.id, &name)?;
            self.register(Namespace::Intimacy, &id, &entry.aliases, &name)?;
            claim_level(&mut self.intimacy_levels, Namespace::Intimacy, entry.level, &id)?;
            self.registry.intimacy.insert(
                id.clone(),
                LevelDefinition {
                    id,
                    level: entry.level,
                },
            );
        }

        for entry in pack.content_ratings {
            let id = concept_id(Namespace::Rating, &entry.id, &name)?;
            self.register(Namespace::Rating, &id, &entry.aliases, &name)?;
            claim_level(&mut self.rating_levels, Namespace::Rating, entry.level, &id)?;
            self.registry.ratings.insert(
                id.clone(),
                LevelDefinition {
                    id,
                    level: entry.level,
                },
            );
        }

        if let Some(scoring) = pack.scoring {
            if let Some(first) = self.scoring_source.take() {
                return Err(OntologyError::DuplicateScoring {
                    first,
                    second: name,
                });
            }
            self.scoring_source = Some(name.clone());
            self.registry.scoring = scoring;
        }

        self.registry.packs.push(PackInfo {
            name,
            version: pack.version,
        });
        Ok(())
    }

    fn register(
        &mut self,
        namespace: Namespace,
        id: &ConceptId,
        aliases: &[String],
        pack: &str,
    ) -> Result<(), OntologyError> {
        let known = self.registry.known.entry(namespace).or_default();
        if !known.insert(id.clone()) {
            return Err(OntologyError::DuplicateConcept {
                id: id.clone(),
                pack: pack.to_string(),
            });
        }

        let slugs = std::iter::once(id.slug().to_string())
            .chain(aliases.iter().map(|alias| normalize_slug(alias)))
            .filter(|slug| !slug.is_empty());
        for slug in slugs {
            match self.registry.aliases.get(&(namespace, slug.clone())) {
                Some(existing) if existing != id => {
                    return Err(OntologyError::AliasConflict {
                        namespace,
                        alias: slug,
                        existing: existing.clone(),
                        incoming: id.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.registry.aliases.insert((namespace, slug), id.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<OntologyRegistry, OntologyError> {
        for (pose, parent, gate) in std::mem::take(&mut self.pending_links) {
            let parent = match parent {
                Some(raw) => Some(self.resolve_existing(Namespace::Pose, &raw).ok_or_else(
                    || OntologyError::UnknownParent {
                        pose: pose.clone(),
                        parent: raw.clone(),
                    },
                )?),
                None => None,
            };
            let gate = match gate {
                Some(raw) => Some(
                    self.resolve_existing(Namespace::Intimacy, &raw)
                        .ok_or_else(|| OntologyError::UnknownConcept {
                            pose: pose.clone(),
                            reference: raw.clone(),
                        })?,
                ),
                None => None,
            };
            if let Some(def) = self.registry.poses.get_mut(&pose) {
                def.parent = parent;
                def.min_intimacy = gate;
            }
        }

        check_pose_cycles(&self.registry)?;
        self.registry.scoring.validate()?;

        info!(
            packs = self.registry.packs.len(),
            poses = self.registry.len(Namespace::Pose),
            moods = self.registry.len(Namespace::Mood),
            locations = self.registry.len(Namespace::Location),
            intimacy_levels = self.registry.len(Namespace::Intimacy),
            content_ratings = self.registry.len(Namespace::Rating),
            branch_intents = self.registry.len(Namespace::Branch),
            "Ontology loaded"
        );
        Ok(self.registry)
    }

    fn resolve_existing(&self, namespace: Namespace, raw: &str) -> Option<ConceptId> {
        let id = self.registry.canonicalize_in(namespace, raw);
        self.registry.contains(&id).then_some(id)
    }
}

fn concept_id(namespace: Namespace, raw: &str, pack: &str) -> Result<ConceptId, OntologyError> {
    let invalid = || OntologyError::InvalidConcept {
        namespace,
        raw: raw.to_string(),
        pack: pack.to_string(),
    };
    if raw.contains(':') {
        return ConceptId::parse(raw)
            .filter(|id| id.namespace() == namespace)
            .ok_or_else(invalid);
    }
    if normalize_slug(raw).is_empty() {
        return Err(invalid());
    }
    Ok(ConceptId::new(namespace, raw))
}

fn claim_level(
    taken: &mut FxHashMap<i32, ConceptId>,
    namespace: Namespace,
    level: i32,
    id: &ConceptId,
) -> Result<(), OntologyError> {
    if let Some(existing) = taken.get(&level) {
        return Err(OntologyError::OverlappingRange {
            namespace,
            level,
            existing: existing.clone(),
            incoming: id.clone(),
        });
    }
    taken.insert(level, id.clone());
    Ok(())
}

/// Walk every pose's parent chain; revisiting a pose within one walk
/// means the forest has a cycle.
fn check_pose_cycles(registry: &OntologyRegistry) -> Result<(), OntologyError> {
    let mut cleared: FxHashSet<&ConceptId> = FxHashSet::default();
    for start in &registry.pose_order {
        let mut path: FxHashSet<&ConceptId> = FxHashSet::default();
        let mut current = Some(start);
        while let Some(id) = current {
            if cleared.contains(id) {
                break;
            }
            if !path.insert(id) {
                return Err(OntologyError::PoseCycle(id.clone()));
            }
            current = registry.poses.get(id).and_then(|p| p.parent.as_ref());
        }
        cleared.extend(path);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for an [`OntologyRegistry`] from packs, RON strings, or files.
#[derive(Debug, Default)]
pub struct OntologyBuilder {
    core: Option<OntologyPack>,
    core_ron: Option<String>,
    extensions: Vec<OntologyPack>,
    extension_rons: Vec<String>,
    extension_dirs: Vec<PathBuf>,
    builtin_core: bool,
}

impl OntologyBuilder {
    pub fn core(mut self, pack: OntologyPack) -> Self {
        self.core = Some(pack);
        self
    }

    pub fn core_ron(mut self, input: &str) -> Self {
        self.core_ron = Some(input.to_string());
        self
    }

    /// Use the bundled core vocabulary.
    pub fn builtin_core(mut self) -> Self {
        self.builtin_core = true;
        self
    }

    pub fn extension(mut self, pack: OntologyPack) -> Self {
        self.extensions.push(pack);
        self
    }

    pub fn extension_ron(mut self, input: &str) -> Self {
        self.extension_rons.push(input.to_string());
        self
    }

    /// Load every `.ron` file in a directory as an extension pack.
    pub fn extensions_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.extension_dirs.push(path.into());
        self
    }

    pub fn build(self) -> Result<OntologyRegistry, OntologyError> {
        let core = match (self.core, self.core_ron) {
            (Some(pack), _) => pack,
            (None, Some(input)) => OntologyPack::parse_ron(&input)?,
            (None, None) if self.builtin_core => OntologyPack::parse_ron(BUILTIN_CORE)?,
            (None, None) => return Err(OntologyError::MissingCore),
        };

        let mut extensions = self.extensions;
        for input in &self.extension_rons {
            extensions.push(OntologyPack::parse_ron(input)?);
        }
        for dir in &self.extension_dirs {
            load_ron_files_from_dir::<_, OntologyError>(dir, |path| {
                extensions.push(OntologyPack::load_from_ron(path)?);
                Ok(())
            })?;
        }

        OntologyRegistry::load(core, extensions)
    }
}

/// Load all .ron files from a directory in file-name order, calling
/// `loader` for each.
pub(crate) fn load_ron_files_from_dir<F, E>(dir: &Path, mut loader: F) -> Result<(), E>
where
    F: FnMut(&Path) -> Result<(), E>,
    E: From<std::io::Error>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        loader(&path)?;
    }
    Ok(())
}
