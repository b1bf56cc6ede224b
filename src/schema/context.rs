/// Selection context — what the caller wants the next block(s) to satisfy.

use crate::core::ontology::OntologyRegistry;
use crate::schema::concept::{normalize_slug, ConceptId, Namespace};

/// Runtime narrative state a selection is made against.
///
/// Concept fields hold canonical ids; build contexts from raw strings with
/// [`SelectionContext::builder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionContext {
    pub location: Option<ConceptId>,
    pub pose: Option<ConceptId>,
    pub intimacy: Option<ConceptId>,
    pub mood: Option<ConceptId>,
    pub branch_intent: Option<ConceptId>,
    pub actor_ids: Vec<String>,
    pub previous_block_id: Option<String>,
    pub required_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    /// Used by `select_chain_to_target`; an explicit chain target wins.
    pub target_duration: Option<f64>,
    pub rating_ceiling: Option<ConceptId>,
    pub world_id: Option<String>,
}

impl SelectionContext {
    pub fn builder(ontology: &OntologyRegistry) -> SelectionContextBuilder<'_> {
        SelectionContextBuilder {
            ontology,
            context: SelectionContext::default(),
        }
    }

    /// The context for the step after `block_id`, which ended on `end_pose`.
    pub fn continued_from(&self, block_id: &str, end_pose: Option<&ConceptId>) -> SelectionContext {
        let mut next = self.clone();
        next.previous_block_id = Some(block_id.to_string());
        if let Some(pose) = end_pose {
            next.pose = Some(pose.clone());
        }
        next
    }
}

/// Builds a [`SelectionContext`], canonicalizing raw tags on the way in.
pub struct SelectionContextBuilder<'a> {
    ontology: &'a OntologyRegistry,
    context: SelectionContext,
}

impl<'a> SelectionContextBuilder<'a> {
    pub fn location(mut self, raw: &str) -> Self {
        self.context.location = Some(self.ontology.canonicalize_in(Namespace::Location, raw));
        self
    }

    pub fn pose(mut self, raw: &str) -> Self {
        self.context.pose = Some(self.ontology.canonicalize_in(Namespace::Pose, raw));
        self
    }

    pub fn intimacy(mut self, raw: &str) -> Self {
        self.context.intimacy = Some(self.ontology.canonicalize_in(Namespace::Intimacy, raw));
        self
    }

    pub fn mood(mut self, raw: &str) -> Self {
        self.context.mood = Some(self.ontology.canonicalize_in(Namespace::Mood, raw));
        self
    }

    pub fn branch_intent(mut self, raw: &str) -> Self {
        self.context.branch_intent = Some(self.ontology.canonicalize_in(Namespace::Branch, raw));
        self
    }

    pub fn rating_ceiling(mut self, raw: &str) -> Self {
        self.context.rating_ceiling = Some(self.ontology.canonicalize_in(Namespace::Rating, raw));
        self
    }

    pub fn actor(mut self, actor_id: &str) -> Self {
        self.context.actor_ids.push(actor_id.to_string());
        self
    }

    pub fn previous_block(mut self, block_id: &str) -> Self {
        self.context.previous_block_id = Some(block_id.to_string());
        self
    }

    pub fn require_tag(mut self, tag: &str) -> Self {
        self.context.required_tags.push(normalize_slug(tag));
        self
    }

    pub fn exclude_tag(mut self, tag: &str) -> Self {
        self.context.excluded_tags.push(normalize_slug(tag));
        self
    }

    pub fn target_duration(mut self, seconds: f64) -> Self {
        self.context.target_duration = Some(seconds);
        self
    }

    pub fn world(mut self, world_id: &str) -> Self {
        self.context.world_id = Some(world_id.to_string());
        self
    }

    pub fn build(self) -> SelectionContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_canonicalizes() {
        let ontology = OntologyRegistry::builtin().unwrap();
        let ctx = SelectionContext::builder(&ontology)
            .location("Park Bench")
            .intimacy("light flirt")
            .rating_ceiling("sfw")
            .require_tag("Golden Hour")
            .actor("mia")
            .build();
        assert_eq!(ctx.location.unwrap().as_str(), "location:bench_park");
        assert_eq!(ctx.intimacy.unwrap().as_str(), "intimacy:light_flirt");
        assert_eq!(ctx.rating_ceiling.unwrap().as_str(), "rating:general");
        assert_eq!(ctx.required_tags, vec!["golden_hour".to_string()]);
        assert_eq!(ctx.actor_ids, vec!["mia".to_string()]);
    }

    #[test]
    fn continued_from_keeps_pose_when_block_has_none() {
        let ontology = OntologyRegistry::builtin().unwrap();
        let ctx = SelectionContext::builder(&ontology).pose("sitting").build();
        let next = ctx.continued_from("a", None);
        assert_eq!(next.previous_block_id.as_deref(), Some("a"));
        assert_eq!(next.pose, ctx.pose);

        let standing = ontology.canonicalize("standing");
        let next = ctx.continued_from("b", Some(&standing));
        assert_eq!(next.pose, Some(standing));
    }
}
