use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use twentyq_core::catalog::{ENTITIES_FILE, KnowledgeBase, LEARNED_FILE};
use twentyq_core::game::{GameConfig, GameEngine, GameState, Question};
use twentyq_core::implication::ImplicationEngine;

fn seed_catalog(dir: &Path) {
    let demo = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data");
    for file in ["entities.json", "attributes.json"] {
        fs::copy(demo.join(file), dir.join(file)).expect("copy demo data");
    }
}

fn platypus(question: &Question) -> f64 {
    match question.attribute.as_str() {
        "is_animal" | "is_mammal" | "can_swim" | "lives_in_water" | "is_wild" => 1.0,
        "is_small" => 0.5,
        _ => 0.0,
    }
}

#[test]
fn unknown_answer_is_learned_and_persisted_with_exact_attributes() {
    let dir = tempdir().expect("temp dir");
    seed_catalog(dir.path());
    let base_before = fs::read(dir.path().join(ENTITIES_FILE)).expect("base readable");

    let mut engine = GameEngine::new(
        KnowledgeBase::open(dir.path()),
        ImplicationEngine::default(),
        GameConfig::default(),
    );
    let mut answerer = platypus;
    engine.play(&mut answerer).expect("guess made");

    let state = engine.process_guess_result(false, Some("a platypus"));
    assert_eq!(state, GameState::LearningNew);
    let session: Vec<(String, f64)> = engine.answers().to_vec();
    assert!(!session.is_empty());

    let id = engine
        .learn_new_entity("a platypus", None, None)
        .expect("entity learned");
    assert_eq!(id, "platypus");
    assert_eq!(engine.state(), GameState::GameOver);

    assert!(dir.path().join(LEARNED_FILE).exists());
    assert_eq!(
        fs::read(dir.path().join(ENTITIES_FILE)).expect("base readable"),
        base_before,
        "base catalog must never be rewritten"
    );

    let reloaded = KnowledgeBase::try_open(dir.path()).expect("reload");
    let learned = reloaded.entity("platypus").expect("persisted");
    assert_eq!(learned.attributes.len(), session.len());
    for (attribute, answer) in &session {
        assert_eq!(learned.attributes.get(attribute), Some(answer));
    }
    assert_eq!(learned.times_played, 1);
    assert_eq!(reloaded.stats().total_entities, engine.stats().total_entities);
}

#[test]
fn distinguishing_question_survives_a_reload() {
    let dir = tempdir().expect("temp dir");
    seed_catalog(dir.path());
    let mut engine = GameEngine::new(
        KnowledgeBase::open(dir.path()),
        ImplicationEngine::default(),
        GameConfig::default(),
    );
    let mut answerer = platypus;
    engine.play(&mut answerer).expect("guess made");
    engine.process_guess_result(false, None);

    let id = engine
        .learn_new_entity("Platypus", Some("Does it lay eggs?"), Some(1.0))
        .expect("entity learned");

    let reloaded = KnowledgeBase::try_open(dir.path()).expect("reload");
    let attribute = reloaded.attribute("lay_eggs").expect("minted attribute persisted");
    assert_eq!(attribute.category, "learned");
    assert_eq!(
        reloaded.entity(&id).and_then(|e| e.attributes.get("lay_eggs").copied()),
        Some(1.0)
    );
}

#[test]
fn correct_guess_persists_play_counters_only_for_the_guessed_entity() {
    let dir = tempdir().expect("temp dir");
    seed_catalog(dir.path());
    let mut engine = GameEngine::new(
        KnowledgeBase::open(dir.path()),
        ImplicationEngine::default(),
        GameConfig::default(),
    );
    let target = engine.catalog().entity("cat").cloned().expect("cat");
    let mut answerer = twentyq_core::game::EntityAnswerer::new(&target, engine.implications());
    let guess = engine.play(&mut answerer).expect("guess made");
    engine.process_guess_result(true, None);

    let reloaded = KnowledgeBase::try_open(dir.path()).expect("reload");
    let stats = reloaded.stats();
    assert_eq!(stats.entities_with_play_data, 1);
    assert_eq!(stats.total_games_played, 1);
    assert_eq!(stats.total_correct_guesses, 1);
    assert_eq!(
        reloaded.learning_stats(&guess.entity_id).map(|s| s.times_played),
        Some(1)
    );
}

#[test]
fn failed_save_keeps_previous_snapshot_and_in_memory_state() {
    let dir = tempdir().expect("temp dir");
    seed_catalog(dir.path());
    fs::write(dir.path().join(LEARNED_FILE), r#"{"entities": []}"#).expect("seed learned");
    // A directory squatting on the temp path makes the atomic write fail.
    fs::create_dir(dir.path().join("learned.json.tmp")).expect("squat temp path");

    let mut engine = GameEngine::new(
        KnowledgeBase::open(dir.path()),
        ImplicationEngine::default(),
        GameConfig::default(),
    );
    engine.start();
    engine.guess().expect("guess made");
    assert_eq!(engine.process_guess_result(true, None), GameState::GameOver);

    assert_eq!(engine.stats().total_games_played, 1);
    assert_eq!(
        fs::read_to_string(dir.path().join(LEARNED_FILE)).expect("learned readable"),
        r#"{"entities": []}"#
    );
}
