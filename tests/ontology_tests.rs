/// Ontology integration tests — loading packs from disk and merging them.

use action_block_engine::core::ontology::{OntologyError, OntologyPack, OntologyRegistry};
use action_block_engine::schema::concept::{ConceptId, Namespace};
use std::path::Path;

fn id(raw: &str) -> ConceptId {
    ConceptId::parse(raw).unwrap()
}

#[test]
fn bundled_core_matches_file_on_disk() {
    let from_file = OntologyRegistry::builder()
        .core(OntologyPack::load_from_ron(Path::new("vocab/core.ron")).unwrap())
        .build()
        .unwrap();
    let builtin = OntologyRegistry::builtin().unwrap();

    for ns in Namespace::ALL {
        assert_eq!(from_file.len(ns), builtin.len(ns), "namespace {}", ns);
    }
    assert_eq!(from_file.scoring(), builtin.scoring());
    assert_eq!(builtin.packs()[0].name, "core");
}

#[test]
fn extension_directory_loads_in_name_order() {
    let ontology = OntologyRegistry::builder()
        .builtin_core()
        .extensions_dir("tests/fixtures/packs")
        .build()
        .unwrap();

    let names: Vec<&str> = ontology.packs().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["core", "beach", "night"]);

    assert!(ontology.is_known(Namespace::Location, "boardwalk"));
    assert!(ontology.is_known(Namespace::Location, "location:night_club"));
    assert!(ontology.is_known(Namespace::Branch, "linger"));
    assert_eq!(ontology.canonicalize("promenade"), id("location:boardwalk"));
    assert_eq!(ontology.canonicalize("club"), id("location:night_club"));
    assert_eq!(ontology.canonicalize("nostalgic"), id("mood:wistful"));
}

#[test]
fn extension_poses_join_the_core_hierarchy() {
    let ontology = OntologyRegistry::builder()
        .builtin_core()
        .extensions_dir("tests/fixtures/packs")
        .build()
        .unwrap();

    let sand = id("pose:sitting_sand");
    let sitting = id("pose:sitting_neutral");
    let close = id("pose:sitting_close");

    assert_eq!(ontology.pose_ancestors(&sand), vec![&sitting]);
    assert_eq!(ontology.pose_similarity(&sand, &sitting), 0.8);
    assert_eq!(ontology.pose_similarity(&sand, &close), 0.6);

    let wading = ontology.get_pose(&id("pose:wading")).unwrap();
    assert_eq!(wading.parent, Some(id("pose:walking")));
    assert_eq!(ontology.canonicalize_in(Namespace::Pose, "sand sit"), sand);
}

#[test]
fn conflicting_alias_in_extension_refuses_to_load() {
    let result = OntologyRegistry::builder()
        .builtin_core()
        .extensions_dir("tests/fixtures/conflicting")
        .build();

    match result {
        Err(OntologyError::AliasConflict {
            namespace,
            alias,
            existing,
            incoming,
        }) => {
            assert_eq!(namespace, Namespace::Location);
            assert_eq!(alias, "park");
            assert_eq!(existing, id("location:bench_park"));
            assert_eq!(incoming, id("location:plaza"));
        }
        other => panic!("expected alias conflict, got {:?}", other),
    }
}

#[test]
fn missing_extension_directory_is_an_io_error() {
    let result = OntologyRegistry::builder()
        .builtin_core()
        .extensions_dir("tests/fixtures/no_such_dir")
        .build();
    assert!(matches!(result, Err(OntologyError::Io(_))));
}

#[test]
fn malformed_pack_is_a_ron_error() {
    let result = OntologyRegistry::builder()
        .builtin_core()
        .extension_ron("(name: \"broken\", locations: [(id: )])")
        .build();
    assert!(matches!(result, Err(OntologyError::Ron(_))));
}

#[test]
fn rating_ceiling_semantics() {
    let ontology = OntologyRegistry::builtin().unwrap();
    let general = id("rating:general");
    let intimate = id("rating:intimate");
    let explicit = id("rating:explicit");
    let unknown = id("rating:mystery");

    assert!(ontology.rating_allowed(&general, &intimate));
    assert!(ontology.rating_allowed(&intimate, &intimate));
    assert!(!ontology.rating_allowed(&explicit, &intimate));
    assert!(!ontology.rating_allowed(&unknown, &explicit));
    assert!(ontology.rating_allowed(&unknown, &unknown));
    assert!(!ontology.rating_allowed(&general, &unknown));
}

#[test]
fn every_core_pose_gate_is_a_known_intimacy_level() {
    let ontology = OntologyRegistry::builtin().unwrap();
    for pose in ontology.poses() {
        if let Some(gate) = &pose.min_intimacy {
            assert!(
                ontology.intimacy_rank(gate).is_some(),
                "pose {} gates on unknown level {}",
                pose.id,
                gate
            );
        }
    }
}
