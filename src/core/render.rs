/// Collaborator interfaces for turning chosen blocks into prompts and
/// resolved reference images.

use std::collections::BTreeMap;

use crate::schema::block::ReferenceImage;
use crate::schema::result::AssetRecord;

/// Substitutes variables into a prompt template.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, template: &str, variables: &BTreeMap<String, String>) -> String;
}

impl<F> PromptRenderer for F
where
    F: Fn(&str, &BTreeMap<String, String>) -> String + Send + Sync,
{
    fn render(&self, template: &str, variables: &BTreeMap<String, String>) -> String {
        self(template, variables)
    }
}

/// Returns templates untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimRenderer;

impl PromptRenderer for VerbatimRenderer {
    fn render(&self, template: &str, _variables: &BTreeMap<String, String>) -> String {
        template.to_string()
    }
}

/// Looks up a concrete asset for a reference descriptor.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, reference: &ReferenceImage, actor_ids: &[String]) -> Option<AssetRecord>;
}

impl<F> ImageResolver for F
where
    F: Fn(&ReferenceImage, &[String]) -> Option<AssetRecord> + Send + Sync,
{
    fn resolve(&self, reference: &ReferenceImage, actor_ids: &[String]) -> Option<AssetRecord> {
        self(reference, actor_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_leaves_template() {
        let vars = BTreeMap::from([("location".to_string(), "cafe".to_string())]);
        assert_eq!(VerbatimRenderer.render("at {location}", &vars), "at {location}");
    }

    #[test]
    fn closures_are_renderers() {
        let renderer = |template: &str, vars: &BTreeMap<String, String>| {
            vars.iter().fold(template.to_string(), |acc, (k, v)| {
                acc.replace(&format!("{{{}}}", k), v)
            })
        };
        let vars = BTreeMap::from([("location".to_string(), "cafe".to_string())]);
        assert_eq!(PromptRenderer::render(&renderer, "at {location}", &vars), "at cafe");
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |reference: &ReferenceImage, _actors: &[String]| match reference {
            ReferenceImage::Asset { asset_id } => Some(AssetRecord {
                asset_id: asset_id.clone(),
                url: None,
                thumbnail_url: None,
                crop: None,
            }),
            _ => None,
        };
        let found = ImageResolver::resolve(
            &resolver,
            &ReferenceImage::Asset {
                asset_id: "img_1".to_string(),
            },
            &[],
        );
        assert_eq!(found.map(|a| a.asset_id), Some("img_1".to_string()));
    }
}
