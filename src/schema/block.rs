/// Action blocks — the tagged single-state / transition variant and its
/// canonicalizing constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::ontology::OntologyRegistry;
use crate::schema::concept::{normalize_slug, ConceptId, Namespace};

/// Allowed duration range in seconds for single-state blocks.
pub const SINGLE_STATE_DURATION: (f64, f64) = (1.0, 30.0);
/// Allowed duration range in seconds for transition blocks.
pub const TRANSITION_DURATION: (f64, f64) = (2.0, 60.0);
/// Maximum number of intermediate waypoints in a transition.
pub const MAX_WAYPOINTS: usize = 5;
/// Intensity scale bounds, inclusive.
pub const INTENSITY_RANGE: (u8, u8) = (1, 10);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    #[error("block record has no id")]
    MissingId,
    #[error("block '{id}': unknown kind '{kind}' (expected single_state or transition)")]
    UnknownKind { id: String, kind: String },
    #[error("block '{id}': missing required field '{field}'")]
    MissingField { id: String, field: &'static str },
    #[error("block '{id}': field '{field}' is not allowed on a {kind} block")]
    ForbiddenField {
        id: String,
        field: &'static str,
        kind: BlockKind,
    },
    #[error("block '{id}': duration {duration}s outside {min}..={max}s for {kind}")]
    DurationOutOfRange {
        id: String,
        kind: BlockKind,
        duration: f64,
        min: f64,
        max: f64,
    },
    #[error("block '{id}': {count} waypoints exceeds the maximum of 5")]
    TooManyWaypoints { id: String, count: usize },
    #[error("block '{id}': intensity {value} outside 1..=10")]
    IntensityOutOfRange { id: String, value: u8 },
    #[error("block '{id}': invalid reference image: {reason}")]
    InvalidReference { id: String, reason: String },
}

/// Discriminant of an [`ActionBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    SingleState,
    Transition,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleState => "single_state",
            Self::Transition => "transition",
        }
    }

    pub fn parse(raw: &str) -> Option<BlockKind> {
        match normalize_slug(raw).as_str() {
            "single_state" => Some(Self::SingleState),
            "transition" => Some(Self::Transition),
            _ => None,
        }
    }

    /// Inclusive duration bounds for this kind.
    pub fn duration_bounds(&self) -> (f64, f64) {
        match self {
            Self::SingleState => SINGLE_STATE_DURATION,
            Self::Transition => TRANSITION_DURATION,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a reference image comes from. Resolution into a concrete asset is
/// left to an [`crate::core::render::ImageResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReferenceImage {
    /// A specific asset by id.
    Asset { asset_id: String },
    /// An external URL.
    Url { url: String },
    /// Best match for an actor and/or a set of tags.
    Query {
        actor: Option<String>,
        tags: Vec<String>,
    },
}

/// Which slot of a block a reference image fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageRole {
    Primary,
    From,
    To,
    Via(usize),
}

/// One end (or waypoint) of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEndpoint {
    pub reference_image: ReferenceImage,
    pub pose: Option<ConceptId>,
}

/// Kind-specific payload. Single-state blocks cannot carry endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockShape {
    SingleState {
        reference_image: ReferenceImage,
        start_pose: Option<ConceptId>,
        end_pose: Option<ConceptId>,
    },
    Transition {
        from: TransitionEndpoint,
        to: TransitionEndpoint,
        via: Vec<TransitionEndpoint>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTags {
    pub location: Option<ConceptId>,
    pub pose: Option<ConceptId>,
    pub intimacy: Option<ConceptId>,
    pub mood: Option<ConceptId>,
    pub branch: Option<ConceptId>,
    pub rating: Option<ConceptId>,
    pub intensity: Option<u8>,
    pub custom: Vec<String>,
}

impl BlockTags {
    pub fn has_custom(&self, tag: &str) -> bool {
        self.custom.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    #[serde(default)]
    pub movement: Option<String>,
    #[serde(default)]
    pub framing: Option<String>,
    #[serde(default)]
    pub angle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySpec {
    #[serde(default)]
    pub maintain_pose: bool,
    #[serde(default)]
    pub preserve_lighting: bool,
    #[serde(default)]
    pub preserve_clothing: bool,
    #[serde(default)]
    pub preserve_background: bool,
}

/// How intensity evolves across a block, on the 1..=10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityProgression {
    pub start: u8,
    #[serde(default)]
    pub peak: Option<u8>,
    pub end: u8,
}

/// A reusable, tagged unit of generation direction.
///
/// Concept-bearing fields always hold canonical [`ConceptId`]s; build from
/// raw data with [`ActionBlock::from_record`]. Deserialized blocks are
/// validated before they are returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredBlock")]
pub struct ActionBlock {
    pub id: String,
    pub shape: BlockShape,
    pub tags: BlockTags,
    pub prompt_template: String,
    pub negative_prompt: String,
    pub duration: f64,
    pub compatible_next: Vec<String>,
    pub compatible_prev: Vec<String>,
    pub camera: Option<CameraSpec>,
    pub consistency: Option<ConsistencySpec>,
    pub intensity_progression: Option<IntensityProgression>,
    pub world_override: Option<String>,
}

/// Serialized form of an [`ActionBlock`], checked on the way in.
#[derive(Deserialize)]
struct StoredBlock {
    id: String,
    shape: BlockShape,
    tags: BlockTags,
    prompt_template: String,
    negative_prompt: String,
    duration: f64,
    compatible_next: Vec<String>,
    compatible_prev: Vec<String>,
    camera: Option<CameraSpec>,
    consistency: Option<ConsistencySpec>,
    intensity_progression: Option<IntensityProgression>,
    world_override: Option<String>,
}

impl TryFrom<StoredBlock> for ActionBlock {
    type Error = BlockError;

    fn try_from(stored: StoredBlock) -> Result<Self, Self::Error> {
        let block = ActionBlock {
            id: stored.id,
            shape: stored.shape,
            tags: stored.tags,
            prompt_template: stored.prompt_template,
            negative_prompt: stored.negative_prompt,
            duration: stored.duration,
            compatible_next: stored.compatible_next,
            compatible_prev: stored.compatible_prev,
            camera: stored.camera,
            consistency: stored.consistency,
            intensity_progression: stored.intensity_progression,
            world_override: stored.world_override,
        };
        block.validate()?;
        Ok(block)
    }
}

impl ActionBlock {
    /// Create a validated block with empty tags and metadata.
    pub fn new(id: &str, shape: BlockShape, duration: f64) -> Result<ActionBlock, BlockError> {
        let block = ActionBlock {
            id: id.to_string(),
            shape,
            tags: BlockTags::default(),
            prompt_template: String::new(),
            negative_prompt: String::new(),
            duration,
            compatible_next: Vec::new(),
            compatible_prev: Vec::new(),
            camera: None,
            consistency: None,
            intensity_progression: None,
            world_override: None,
        };
        block.validate()?;
        Ok(block)
    }

    /// Build a block from a raw record, canonicalizing every concept field.
    pub fn from_record(
        record: BlockRecord,
        ontology: &OntologyRegistry,
    ) -> Result<ActionBlock, BlockError> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(BlockError::MissingId);
        }
        let kind = BlockKind::parse(&record.kind).ok_or_else(|| BlockError::UnknownKind {
            id: id.clone(),
            kind: record.kind.clone(),
        })?;
        let pose = |raw: Option<String>| raw.map(|r| ontology.canonicalize_in(Namespace::Pose, &r));

        let shape = match kind {
            BlockKind::SingleState => {
                let forbidden = [
                    ("from", record.from.is_some()),
                    ("to", record.to.is_some()),
                    ("via", record.via.is_some()),
                ];
                if let Some(&(field, _)) = forbidden.iter().find(|(_, present)| *present) {
                    return Err(BlockError::ForbiddenField {
                        id,
                        field,
                        kind,
                    });
                }
                let image = record.reference_image.ok_or_else(|| BlockError::MissingField {
                    id: id.clone(),
                    field: "reference_image",
                })?;
                BlockShape::SingleState {
                    reference_image: image.into_reference(&id)?,
                    start_pose: pose(record.start_pose),
                    end_pose: pose(record.end_pose),
                }
            }
            BlockKind::Transition => {
                let forbidden = [
                    ("reference_image", record.reference_image.is_some()),
                    ("start_pose", record.start_pose.is_some()),
                    ("end_pose", record.end_pose.is_some()),
                ];
                if let Some(&(field, _)) = forbidden.iter().find(|(_, present)| *present) {
                    return Err(BlockError::ForbiddenField {
                        id,
                        field,
                        kind,
                    });
                }
                let from = record.from.ok_or_else(|| BlockError::MissingField {
                    id: id.clone(),
                    field: "from",
                })?;
                let to = record.to.ok_or_else(|| BlockError::MissingField {
                    id: id.clone(),
                    field: "to",
                })?;
                let endpoint = |e: EndpointRecord| -> Result<TransitionEndpoint, BlockError> {
                    Ok(TransitionEndpoint {
                        reference_image: e.reference_image.into_reference(&id)?,
                        pose: pose(e.pose),
                    })
                };
                BlockShape::Transition {
                    from: endpoint(from)?,
                    to: endpoint(to)?,
                    via: record
                        .via
                        .unwrap_or_default()
                        .into_iter()
                        .map(endpoint)
                        .collect::<Result<_, _>>()?,
                }
            }
        };

        let duration = record.duration.ok_or_else(|| BlockError::MissingField {
            id: id.clone(),
            field: "duration",
        })?;

        let raw = record.tags;
        let mut custom: Vec<String> = Vec::new();
        for tag in raw.custom.iter().map(|t| normalize_slug(t)) {
            if !tag.is_empty() && !custom.contains(&tag) {
                custom.push(tag);
            }
        }
        let tags = BlockTags {
            location: raw
                .location
                .map(|r| ontology.canonicalize_in(Namespace::Location, &r)),
            pose: pose(raw.pose),
            intimacy: raw
                .intimacy
                .map(|r| ontology.canonicalize_in(Namespace::Intimacy, &r)),
            mood: raw.mood.map(|r| ontology.canonicalize_in(Namespace::Mood, &r)),
            branch: raw
                .branch
                .map(|r| ontology.canonicalize_in(Namespace::Branch, &r)),
            rating: raw
                .rating
                .map(|r| ontology.canonicalize_in(Namespace::Rating, &r)),
            intensity: raw.intensity,
            custom,
        };

        let block = ActionBlock {
            id,
            shape,
            tags,
            prompt_template: record.prompt_template,
            negative_prompt: record.negative_prompt,
            duration,
            compatible_next: record.compatible_next,
            compatible_prev: record.compatible_prev,
            camera: record.camera,
            consistency: record.consistency,
            intensity_progression: record.intensity_progression,
            world_override: record
                .world_override
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty()),
        };
        block.validate()?;
        Ok(block)
    }

    /// Re-check the structural invariants. Called on construction and by
    /// the registry for blocks assembled in code.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.id.trim().is_empty() {
            return Err(BlockError::MissingId);
        }
        let kind = self.kind();
        let (min, max) = kind.duration_bounds();
        if !self.duration.is_finite() || self.duration < min || self.duration > max {
            return Err(BlockError::DurationOutOfRange {
                id: self.id.clone(),
                kind,
                duration: self.duration,
                min,
                max,
            });
        }
        if let BlockShape::Transition { via, .. } = &self.shape {
            if via.len() > MAX_WAYPOINTS {
                return Err(BlockError::TooManyWaypoints {
                    id: self.id.clone(),
                    count: via.len(),
                });
            }
        }

        let progression = self.intensity_progression.iter().flat_map(|p| {
            [Some(p.start), p.peak, Some(p.end)]
                .into_iter()
                .flatten()
        });
        for value in self.tags.intensity.into_iter().chain(progression) {
            if !(INTENSITY_RANGE.0..=INTENSITY_RANGE.1).contains(&value) {
                return Err(BlockError::IntensityOutOfRange {
                    id: self.id.clone(),
                    value,
                });
            }
        }

        for (_, image) in self.reference_images() {
            check_reference(&self.id, image)?;
        }
        Ok(())
    }

    pub fn kind(&self) -> BlockKind {
        match self.shape {
            BlockShape::SingleState { .. } => BlockKind::SingleState,
            BlockShape::Transition { .. } => BlockKind::Transition,
        }
    }

    /// Pose the block opens on, falling back to the tag pose.
    pub fn effective_start_pose(&self) -> Option<&ConceptId> {
        let explicit = match &self.shape {
            BlockShape::SingleState { start_pose, .. } => start_pose.as_ref(),
            BlockShape::Transition { from, .. } => from.pose.as_ref(),
        };
        explicit.or(self.tags.pose.as_ref())
    }

    /// Pose the block closes on: the explicit end, then the start, then
    /// the tag pose.
    pub fn effective_end_pose(&self) -> Option<&ConceptId> {
        let explicit = match &self.shape {
            BlockShape::SingleState { end_pose, .. } => end_pose.as_ref(),
            BlockShape::Transition { to, .. } => to.pose.as_ref(),
        };
        explicit.or_else(|| self.effective_start_pose())
    }

    /// Every reference image in playback order.
    pub fn reference_images(&self) -> Vec<(ImageRole, &ReferenceImage)> {
        match &self.shape {
            BlockShape::SingleState {
                reference_image, ..
            } => vec![(ImageRole::Primary, reference_image)],
            BlockShape::Transition { from, to, via } => {
                let mut images = vec![(ImageRole::From, &from.reference_image)];
                images.extend(
                    via.iter()
                        .enumerate()
                        .map(|(i, v)| (ImageRole::Via(i), &v.reference_image)),
                );
                images.push((ImageRole::To, &to.reference_image));
                images
            }
        }
    }

    /// Whether the block declares an explicit link to `next_id`.
    pub fn allows_next(&self, next_id: &str) -> bool {
        self.compatible_next.iter().any(|id| id == next_id)
    }

    pub fn allows_prev(&self, prev_id: &str) -> bool {
        self.compatible_prev.iter().any(|id| id == prev_id)
    }
}

fn check_reference(id: &str, image: &ReferenceImage) -> Result<(), BlockError> {
    let reason = match image {
        ReferenceImage::Asset { asset_id } if asset_id.trim().is_empty() => "empty asset id",
        ReferenceImage::Url { url } if url.trim().is_empty() => "empty url",
        ReferenceImage::Query { actor, tags } if actor.is_none() && tags.is_empty() => {
            "query needs an actor or at least one tag"
        }
        _ => return Ok(()),
    };
    Err(BlockError::InvalidReference {
        id: id.to_string(),
        reason: reason.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// A block as authored in a batch document. Every field is optional here so
/// that one bad record is reported on its own rather than failing the
/// whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRecord {
    pub id: String,
    pub kind: String,
    pub reference_image: Option<ReferenceRecord>,
    pub start_pose: Option<String>,
    pub end_pose: Option<String>,
    pub from: Option<EndpointRecord>,
    pub to: Option<EndpointRecord>,
    pub via: Option<Vec<EndpointRecord>>,
    pub tags: TagRecord,
    pub prompt_template: String,
    pub negative_prompt: String,
    pub duration: Option<f64>,
    pub compatible_next: Vec<String>,
    pub compatible_prev: Vec<String>,
    pub camera: Option<CameraSpec>,
    pub consistency: Option<ConsistencySpec>,
    pub intensity_progression: Option<IntensityProgression>,
    pub world_override: Option<String>,
}

/// Reference image as authored: exactly one of `asset_id`, `url`, or an
/// actor/tag query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceRecord {
    pub asset_id: Option<String>,
    pub url: Option<String>,
    pub actor: Option<String>,
    pub tags: Vec<String>,
}

impl ReferenceRecord {
    fn into_reference(self, id: &str) -> Result<ReferenceImage, BlockError> {
        let is_query = self.actor.is_some() || !self.tags.is_empty();
        let image = match (self.asset_id, self.url, is_query) {
            (Some(asset_id), None, false) => ReferenceImage::Asset { asset_id },
            (None, Some(url), false) => ReferenceImage::Url { url },
            (None, None, true) => ReferenceImage::Query {
                actor: self.actor,
                tags: self.tags,
            },
            (None, None, false) => {
                return Err(BlockError::InvalidReference {
                    id: id.to_string(),
                    reason: "no asset_id, url, actor or tags given".to_string(),
                })
            }
            _ => {
                return Err(BlockError::InvalidReference {
                    id: id.to_string(),
                    reason: "asset_id, url and query are mutually exclusive".to_string(),
                })
            }
        };
        check_reference(id, &image)?;
        Ok(image)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointRecord {
    pub reference_image: ReferenceRecord,
    pub pose: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecord {
    pub location: Option<String>,
    pub pose: Option<String>,
    pub intimacy: Option<String>,
    pub mood: Option<String>,
    pub branch: Option<String>,
    pub rating: Option<String>,
    pub intensity: Option<u8>,
    pub custom: Vec<String>,
}
