use serde::{Deserialize, Serialize};
use std::fmt;

/// Vocabulary namespaces known to the ontology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Namespace {
    Pose,
    Mood,
    Location,
    Intimacy,
    Rating,
    Branch,
    /// Fallback for free tags that matched nothing in the vocabulary.
    Custom,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Self::Pose,
        Self::Mood,
        Self::Location,
        Self::Intimacy,
        Self::Rating,
        Self::Branch,
        Self::Custom,
    ];

    /// Returns the prefix used in concept ids (e.g., "pose").
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Pose => "pose",
            Self::Mood => "mood",
            Self::Location => "location",
            Self::Intimacy => "intimacy",
            Self::Rating => "rating",
            Self::Branch => "branch",
            Self::Custom => "custom",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Namespace> {
        Self::ALL.into_iter().find(|ns| ns.prefix() == prefix)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A canonical `namespace:slug` identifier.
///
/// Construction always yields a namespaced id; raw tags go through
/// [`crate::core::ontology::OntologyRegistry::canonicalize`] first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConceptId(String);

impl ConceptId {
    /// Build an id from a namespace and a raw slug. The slug is normalized;
    /// an empty slug becomes `unknown`.
    pub fn new(namespace: Namespace, slug: &str) -> ConceptId {
        let mut slug = normalize_slug(slug);
        if slug.is_empty() {
            slug.push_str("unknown");
        }
        ConceptId(format!("{}:{}", namespace.prefix(), slug))
    }

    /// Parse an already-namespaced string such as `"mood:playful"`.
    ///
    /// Returns `None` when the prefix is missing or not a known namespace,
    /// or when the slug is empty.
    pub fn parse(input: &str) -> Option<ConceptId> {
        let (prefix, slug) = input.trim().split_once(':')?;
        let namespace = Namespace::from_prefix(&prefix.trim().to_lowercase())?;
        let slug = normalize_slug(slug);
        if slug.is_empty() {
            return None;
        }
        Some(ConceptId(format!("{}:{}", namespace.prefix(), slug)))
    }

    pub fn namespace(&self) -> Namespace {
        self.0
            .split_once(':')
            .and_then(|(prefix, _)| Namespace::from_prefix(prefix))
            .unwrap_or(Namespace::Custom)
    }

    pub fn slug(&self) -> &str {
        self.0.split_once(':').map(|(_, slug)| slug).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConceptId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ConceptId::parse(&value).ok_or_else(|| format!("not a namespaced concept id: '{}'", value))
    }
}

impl From<ConceptId> for String {
    fn from(id: ConceptId) -> String {
        id.0
    }
}

/// Normalize a raw tag fragment: trim, lowercase, and collapse runs of
/// whitespace, hyphens, underscores or colons into a single underscore.
pub fn normalize_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || matches!(ch, '-' | '_' | ':') {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_slug() {
        let id = ConceptId::new(Namespace::Pose, "  Sitting  Neutral ");
        assert_eq!(id.as_str(), "pose:sitting_neutral");
        assert_eq!(id.namespace(), Namespace::Pose);
        assert_eq!(id.slug(), "sitting_neutral");
    }

    #[test]
    fn parse_requires_known_prefix() {
        assert_eq!(
            ConceptId::parse("Mood:Playful").map(|c| c.to_string()),
            Some("mood:playful".to_string())
        );
        assert!(ConceptId::parse("playful").is_none());
        assert!(ConceptId::parse("weather:rain").is_none());
        assert!(ConceptId::parse("mood:").is_none());
    }

    #[test]
    fn empty_slug_becomes_unknown() {
        assert_eq!(ConceptId::new(Namespace::Custom, "  ").as_str(), "custom:unknown");
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_slug("deep - flirt"), "deep_flirt");
        assert_eq!(normalize_slug("__bench__park__"), "bench_park");
        assert_eq!(normalize_slug("ALREADY_ok"), "already_ok");
        assert_eq!(normalize_slug("weather:rain"), "weather_rain");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Light Flirt", "a--b", " x ", "pose_1"] {
            let once = normalize_slug(raw);
            assert_eq!(normalize_slug(&once), once);
        }
    }

    #[test]
    fn serde_rejects_unprefixed() {
        let ok: Result<ConceptId, _> = ron::from_str("\"location:bench_park\"");
        assert!(ok.is_ok());
        let bad: Result<ConceptId, _> = ron::from_str("\"bench_park\"");
        assert!(bad.is_err());
    }
}
