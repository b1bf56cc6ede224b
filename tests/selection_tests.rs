/// Selection integration tests — fixture batches through the full
/// filter/score/chain/assemble pipeline.

use action_block_engine::core::filter::{BlockFilter, CompositeFilter, PoseIntimacyGateFilter};
use action_block_engine::core::ontology::OntologyRegistry;
use action_block_engine::core::registry::BlockRegistry;
use action_block_engine::core::selector::BlockSelector;
use action_block_engine::schema::block::{BlockKind, ImageRole, ReferenceImage};
use action_block_engine::schema::context::SelectionContext;
use action_block_engine::schema::result::AssetRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::Path;

fn ontology() -> OntologyRegistry {
    OntologyRegistry::builtin().unwrap()
}

fn fixture_registry(ontology: &OntologyRegistry) -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    let loaded = registry
        .load_from_ron_file(Path::new("tests/fixtures/blocks.ron"), ontology)
        .unwrap();
    assert_eq!(loaded, 7);
    registry
}

fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    vars.iter().fold(template.to_string(), |acc, (k, v)| {
        acc.replace(&format!("{{{}}}", k), v)
    })
}

fn park_date(ontology: &OntologyRegistry) -> SelectionContext {
    SelectionContext::builder(ontology)
        .location("park")
        .intimacy("light_flirt")
        .actor("mina")
        .build()
}

#[test]
fn fixture_batch_skips_only_the_malformed_record() {
    let ont = ontology();
    let registry = fixture_registry(&ont);

    assert!(registry.get("broken_transition").is_none());
    let transitions: Vec<&str> = registry
        .by_kind(BlockKind::Transition)
        .iter()
        .map(|b| b.id.as_str())
        .collect();
    assert_eq!(transitions, vec!["bench_stand_up"]);

    let idle = registry.get("bench_sit_idle").unwrap();
    assert_eq!(idle.tags.location.as_ref().unwrap().as_str(), "location:bench_park");
    assert_eq!(idle.tags.rating.as_ref().unwrap().as_str(), "rating:general");
    assert_eq!(idle.tags.custom, vec!["golden_hour".to_string()]);
    assert!(matches!(
        idle.reference_images()[0].1,
        ReferenceImage::Query { actor: Some(_), .. }
    ));
}

#[test]
fn park_date_chain_follows_compatibility_links() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::builder(&ont, &registry)
        .renderer(substitute)
        .build();

    let result = selector.select_chain(&park_date(&ont), 15.0, 5);

    assert_eq!(
        result.block_ids(),
        vec!["bench_sit_idle", "bench_lean_in", "bench_stand_up"]
    );
    assert_eq!(result.total_duration, 15.0);
    assert_eq!(result.score, 1.0);
    assert!(result.fallback_reason.is_none());

    assert_eq!(
        result.prompts[0],
        "mina sits on the bench_park bench, glancing over"
    );
    assert_eq!(result.prompts[2], "mina stands up from the bench");

    let offsets: Vec<f64> = result.segments.iter().map(|s| s.start_offset).collect();
    assert_eq!(offsets, vec![0.0, 6.0, 11.0]);
    assert_eq!(result.segments[2].kind, BlockKind::Transition);
}

#[test]
fn chain_segments_carry_block_metadata() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);
    let result = selector.select_chain(&park_date(&ont), 15.0, 5);

    let first = &result.segments[0];
    assert_eq!(
        first.tags,
        vec![
            "location:bench_park",
            "intimacy:light_flirt",
            "mood:playful",
            "rating:general",
            "golden_hour",
        ]
    );
    assert_eq!(first.metadata["camera_movement"], "slow push");
    assert_eq!(first.metadata["camera_framing"], "medium");
    assert_eq!(first.metadata["maintain_pose"], "true");
    assert_eq!(first.metadata["negative_prompt"], "blurry, extra limbs");
    assert_eq!(first.metadata["intensity"], "3");
    assert!(!first.metadata.contains_key("preserve_clothing"));

    let second = &result.segments[1];
    assert_eq!(second.metadata["intensity_start"], "3");
    assert_eq!(second.metadata["intensity_peak"], "5");
    assert_eq!(second.metadata["intensity_end"], "4");
}

#[test]
fn resolver_sees_every_reference_image_in_playback_order() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let resolver = |reference: &ReferenceImage, actors: &[String]| match reference {
        ReferenceImage::Asset { asset_id } => Some(AssetRecord {
            asset_id: asset_id.clone(),
            url: None,
            thumbnail_url: None,
            crop: None,
        }),
        ReferenceImage::Query { .. } => actors.first().map(|actor| AssetRecord {
            asset_id: format!("{}_portrait", actor),
            url: None,
            thumbnail_url: None,
            crop: None,
        }),
        ReferenceImage::Url { .. } => None,
    };
    let selector = BlockSelector::builder(&ont, &registry)
        .resolver(resolver)
        .build();

    let result = selector.select_chain(&park_date(&ont), 15.0, 5);
    let roles: Vec<(&str, ImageRole)> = result
        .resolved_images
        .iter()
        .map(|r| (r.block_id.as_str(), r.role))
        .collect();
    assert_eq!(
        roles,
        vec![
            ("bench_sit_idle", ImageRole::Primary),
            ("bench_lean_in", ImageRole::Primary),
            ("bench_stand_up", ImageRole::From),
            ("bench_stand_up", ImageRole::Via(0)),
            ("bench_stand_up", ImageRole::To),
        ]
    );
    let assets: Vec<Option<&str>> = result
        .resolved_images
        .iter()
        .map(|r| r.asset.as_ref().map(|a| a.asset_id.as_str()))
        .collect();
    assert_eq!(
        assets,
        vec![
            Some("mina_portrait"),
            Some("img_bench_lean"),
            Some("img_bench_close"),
            None,
            Some("img_bench_stand"),
        ]
    );
}

#[test]
fn general_ceiling_keeps_only_general_and_untagged_blocks() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);
    let ctx = SelectionContext::builder(&ont).rating_ceiling("general").build();

    let mut ids: Vec<String> = selector
        .select(&ctx, 20, 0.0)
        .iter()
        .map(|s| s.block.id.clone())
        .collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "bench_lean_in",
            "bench_sit_idle",
            "bench_stand_up",
            "cafe_chat",
            "generic_idle",
        ]
    );
}

#[test]
fn world_scoped_block_needs_its_world() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);

    let outside = SelectionContext::builder(&ont)
        .location("beach")
        .rating_ceiling("explicit")
        .build();
    assert!(selector
        .select(&outside, 20, 0.0)
        .iter()
        .all(|s| s.block.id != "beach_explicit"));

    let inside = SelectionContext::builder(&ont)
        .location("beach")
        .intimacy("very_intimate")
        .rating_ceiling("nsfw")
        .world("after_dark")
        .build();
    let best = selector.select_one(&inside);
    assert_eq!(best.block_ids(), vec!["beach_explicit"]);
    assert_eq!(best.score, 1.0);
}

#[test]
fn explanation_names_the_rejecting_filter() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);

    let kiss = registry.get("bench_kiss").unwrap();
    let explanation = selector.explain_selection(kiss, &park_date(&ont));
    assert!(!explanation.passed);
    assert_eq!(explanation.failed_filters(), vec!["intimacy_level"]);
    assert_eq!(explanation.components.len(), 6);
    assert!((0.0..=1.0).contains(&explanation.score));
}

#[test]
fn pose_gate_filter_can_be_injected() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let ctx = SelectionContext::builder(&ont)
        .location("bench_park")
        .intimacy("deep_flirt")
        .build();

    let plain = BlockSelector::new(&ont, &registry);
    assert!(plain
        .select(&ctx, 20, 0.0)
        .iter()
        .any(|s| s.block.id == "bench_kiss"));

    let gated = BlockSelector::builder(&ont, &registry)
        .filters(CompositeFilter::standard(&ont).with(PoseIntimacyGateFilter::new(&ont)))
        .build();
    assert!(gated
        .select(&ctx, 20, 0.0)
        .iter()
        .all(|s| s.block.id != "bench_kiss"));
}

#[test]
fn required_and_excluded_tags_narrow_the_pool() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);

    let required = SelectionContext::builder(&ont).require_tag("Golden Hour").build();
    let ids: Vec<&str> = selector
        .select(&required, 20, 0.0)
        .iter()
        .map(|s| s.block.id.as_str())
        .collect();
    assert_eq!(ids, vec!["bench_sit_idle"]);

    let excluded = SelectionContext::builder(&ont).exclude_tag("golden-hour").build();
    assert!(selector
        .select(&excluded, 20, 0.0)
        .iter()
        .all(|s| s.block.id != "bench_sit_idle"));
}

#[test]
fn removing_a_link_reroutes_the_chain() {
    let ont = ontology();
    let mut registry = fixture_registry(&ont);
    assert!(registry.remove("bench_lean_in"));

    let selector = BlockSelector::new(&ont, &registry);
    let result = selector.select_chain(&park_date(&ont), 15.0, 5);
    assert_eq!(result.blocks[0].id, "bench_sit_idle");
    assert!(!result.block_ids().contains(&"bench_lean_in"));
    let sum: f64 = result.blocks.iter().map(|b| b.duration).sum();
    assert_eq!(result.total_duration, sum);
}

#[test]
fn randomized_contexts_keep_invariants() {
    let ont = ontology();
    let registry = fixture_registry(&ont);
    let selector = BlockSelector::new(&ont, &registry);
    let filters = CompositeFilter::standard(&ont);

    let locations = ["park", "cafe", "beach", "rooftop"];
    let levels = ["none", "light_flirt", "deep_flirt", "intimate", "very_intimate"];
    let ratings = ["general", "suggestive", "intimate", "explicit"];
    let poses = ["sitting", "standing", "kiss", "walking"];
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..200 {
        let mut builder = SelectionContext::builder(&ont)
            .location(locations[rng.gen_range(0..locations.len())])
            .intimacy(levels[rng.gen_range(0..levels.len())])
            .rating_ceiling(ratings[rng.gen_range(0..ratings.len())]);
        if rng.gen_bool(0.5) {
            builder = builder.pose(poses[rng.gen_range(0..poses.len())]);
        }
        if rng.gen_bool(0.3) {
            builder = builder.previous_block("bench_sit_idle");
        }
        let ctx = builder.build();

        for block in registry.all() {
            let outcomes = filters.evaluate_all(block, &ctx);
            assert_eq!(filters.filter(block, &ctx), outcomes.iter().all(|o| o.passed));
            let explanation = selector.explain_selection(block, &ctx);
            assert!((0.0..=1.0).contains(&explanation.score));
            for component in &explanation.components {
                assert!((0.0..=1.0).contains(&component.score), "{}", component.name);
            }
        }

        let ranked = selector.select(&ctx, 20, 0.0);
        let again = selector.select(&ctx, 20, 0.0);
        let ids: Vec<&str> = ranked.iter().map(|s| s.block.id.as_str()).collect();
        let ids_again: Vec<&str> = again.iter().map(|s| s.block.id.as_str()).collect();
        assert_eq!(ids, ids_again);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

        let max_blocks = rng.gen_range(1..8);
        let target = rng.gen_range(1.0..60.0);
        let chain = selector.select_chain(&ctx, target, max_blocks);
        assert!(chain.blocks.len() <= max_blocks);
        let sum: f64 = chain.blocks.iter().map(|b| b.duration).sum();
        assert_eq!(chain.total_duration, sum);
        assert!((0.0..=1.0).contains(&chain.score));
        assert_eq!(chain.segments.len(), chain.blocks.len());
        if chain.total_duration < target {
            assert!(chain.fallback_reason.is_some());
        }
    }
}
