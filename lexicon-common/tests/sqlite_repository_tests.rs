//! End-to-end tests of the engine over the SQLite repository

use std::sync::Arc;
use std::time::Duration;

use lexicon_common::db::SqliteRepository;
use lexicon_common::repository::{AbAssignment, EntitySettings};
use lexicon_common::transform::get_path;
use lexicon_common::value::term_map_from_json;
use lexicon_common::{EntityRef, EntityType, OverrideBehavior, TermValue, TerminologyEngine, TerminologyRecord};
use serde_json::json;
use tempfile::TempDir;

const MAIN_UNIT: &str = "journeyTerms.mainUnit.singular";

async fn setup() -> (TempDir, Arc<SqliteRepository>, TerminologyEngine) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(
        SqliteRepository::open(&dir.path().join("lexicon.db"))
            .await
            .unwrap(),
    );

    repo.upsert_partner("P1", Some("Acme Partners")).await.unwrap();
    repo.upsert_organization("O1", Some("P1")).await.unwrap();
    repo.upsert_company("C1", Some("O1")).await.unwrap();
    repo.upsert_company("C2", Some("O1")).await.unwrap();
    repo.upsert_team("T1", Some("C1")).await.unwrap();
    repo.upsert_user("U1", Some("T1"), Some("C1")).await.unwrap();

    let engine = TerminologyEngine::with_ttl(repo.clone(), Duration::from_secs(300));
    (dir, repo, engine)
}

fn text(value: Option<TermValue>) -> Option<String> {
    value.and_then(|v| v.as_str().map(str::to_string))
}

#[tokio::test]
async fn test_seeded_defaults_resolve() {
    let (_dir, _repo, engine) = setup().await;
    let resolved = engine.resolve_terminology(EntityType::User, "U1", None, false).await;
    assert_eq!(
        get_path(&resolved, MAIN_UNIT),
        Some(&TermValue::from("journey"))
    );
}

#[tokio::test]
async fn test_cascade_over_sqlite() {
    let (_dir, _repo, engine) = setup().await;

    assert!(
        engine
            .save_terminology(EntityType::Partner, "P1", &[TerminologyRecord::new(MAIN_UNIT, "adventure")])
            .await
    );
    assert!(
        engine
            .save_terminology(EntityType::Company, "C1", &[TerminologyRecord::new(MAIN_UNIT, "quest")])
            .await
    );

    assert_eq!(
        text(engine.get_term(EntityType::User, "U1", MAIN_UNIT).await),
        Some("quest".to_string())
    );
    assert_eq!(
        text(engine.get_term(EntityType::Company, "C2", MAIN_UNIT).await),
        Some("adventure".to_string())
    );
}

#[tokio::test]
async fn test_merge_behavior_persists() {
    let (_dir, _repo, engine) = setup().await;

    let nested = term_map_from_json(json!({"plural": "missions"})).unwrap();
    assert!(
        engine
            .save_terminology(
                EntityType::Team,
                "T1",
                &[TerminologyRecord::new("journeyTerms.mainUnit", nested).with_behavior(OverrideBehavior::Merge)],
            )
            .await
    );

    let resolved = engine.resolve_terminology(EntityType::Team, "T1", None, false).await;
    assert_eq!(
        get_path(&resolved, "journeyTerms.mainUnit"),
        Some(&TermValue::Object(
            term_map_from_json(json!({"singular": "journey", "plural": "missions"})).unwrap()
        ))
    );
}

#[tokio::test]
async fn test_template_and_category_delete() {
    let (_dir, _repo, engine) = setup().await;

    assert!(
        engine
            .save_terminology(EntityType::Team, "T1", &[TerminologyRecord::new("roleTerms.facilitator.singular", "guide")])
            .await
    );
    assert!(
        engine
            .apply_predefined_terminology(EntityType::Team, "T1", "project-management")
            .await
    );

    let resolved = engine.resolve_terminology(EntityType::Team, "T1", None, false).await;
    assert_eq!(get_path(&resolved, MAIN_UNIT), Some(&TermValue::from("project")));
    assert_eq!(
        get_path(&resolved, "roleTerms.facilitator.singular"),
        Some(&TermValue::from("coach"))
    );

    assert!(
        engine
            .delete_terminology_for_category(EntityType::Team, "T1", "journeyTerms")
            .await
    );
    let resolved = engine.resolve_terminology(EntityType::Team, "T1", None, false).await;
    assert_eq!(get_path(&resolved, MAIN_UNIT), Some(&TermValue::from("journey")));
    assert_eq!(
        get_path(&resolved, "stepTerms.mainUnit.singular"),
        Some(&TermValue::from("task"))
    );
}

#[tokio::test]
async fn test_settings_and_ab_variants() {
    let (_dir, repo, engine) = setup().await;

    assert!(
        engine
            .save_terminology(EntityType::Company, "C1", &[TerminologyRecord::new(MAIN_UNIT, "quest")])
            .await
    );

    let c1 = EntityRef::new(EntityType::Company, "C1");
    repo.set_settings(&c1, EntitySettings { enabled: false }).await.unwrap();
    assert_eq!(
        text(engine.get_term(EntityType::Company, "C1", MAIN_UNIT).await),
        Some("journey".to_string())
    );

    let c2 = EntityRef::new(EntityType::Company, "C2");
    repo.put_ab_variant(
        "vocab",
        "b",
        &term_map_from_json(json!({"journeyTerms": {"mainUnit": {"singular": "expedition"}}})).unwrap(),
    )
    .await
    .unwrap();
    repo.set_ab_assignment(
        &c2,
        &AbAssignment {
            test_id: "vocab".to_string(),
            variant: "b".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        text(engine.get_term(EntityType::Company, "C2", MAIN_UNIT).await),
        Some("expedition".to_string())
    );
}

#[tokio::test]
async fn test_edited_defaults_survive_reopen() {
    let (dir, _repo, engine) = setup().await;
    assert!(
        engine
            .save_terminology(EntityType::System, "default", &[TerminologyRecord::new("toolTerms.library", "Workshop")])
            .await
    );

    let reopened = Arc::new(
        SqliteRepository::open(&dir.path().join("lexicon.db"))
            .await
            .unwrap(),
    );
    let engine = TerminologyEngine::with_ttl(reopened, Duration::from_secs(300));
    let resolved = engine.resolve_terminology(EntityType::System, "default", None, false).await;
    assert_eq!(
        get_path(&resolved, "toolTerms.library"),
        Some(&TermValue::from("Workshop"))
    );
}
