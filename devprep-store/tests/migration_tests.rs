/// Integration tests for the migration runner
///
/// Source and target are in-memory stores, so commit and listing failures
/// can be injected.

mod common;

use common::{question, quiz, seed_topic, topic};
use devprep_shared::config::MigrationConfig;
use devprep_store::backends::{
    Backend, Collection, DocumentBackend, DocumentStore, MemoryStore,
};
use devprep_store::migration::{EntityKind, MigrationRunner};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn runner(source: &Arc<MemoryStore>, target: &Arc<MemoryStore>) -> MigrationRunner {
    MigrationRunner::new(source.clone(), target.clone(), MigrationConfig::default())
}

fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
    (
        Arc::new(MemoryStore::named("postgres")),
        Arc::new(MemoryStore::named("redis")),
    )
}

#[tokio::test]
async fn test_existing_topic_is_skipped() {
    let (source, target) = stores();
    seed_topic(&source, "flutter-basics", "Flutter Basics");
    seed_topic(&source, "dart-basics", "Dart Basics");
    seed_topic(&source, "widgets", "Widgets");
    seed_topic(&target, "widgets", "Widgets");

    let summary = runner(&source, &target).run().await;

    let topics = &summary.details.topics;
    assert_eq!(topics.attempted, 3);
    assert_eq!(topics.migrated, 2);
    assert_eq!(topics.skipped, 1);
    assert!(topics.errors.is_empty());
    assert!(summary.success);
    assert_eq!(target.count(Collection::Topics), 3);
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    let (source, target) = stores();
    seed_topic(&source, "flutter-basics", "Flutter Basics");
    source.insert(Collection::Definitions, "d1", json!({"term": "Widget", "definition": "A UI building block"}));

    let first = runner(&source, &target).run().await;
    assert_eq!(first.details.total_migrated(), 2);

    let second = runner(&source, &target).run().await;
    assert_eq!(second.details.total_migrated(), 0);
    assert_eq!(second.details.topics.skipped, 1);
    assert_eq!(second.details.definitions.skipped, 1);
    assert_eq!(target.count(Collection::Topics), 1);
}

#[tokio::test]
async fn test_duplicate_keys_in_source_migrate_once() {
    let (source, target) = stores();
    seed_topic(&source, "state", "State");
    seed_topic(&source, "state", "State (copy)");

    let summary = runner(&source, &target).run().await;

    assert_eq!(summary.details.topics.migrated, 1);
    assert_eq!(summary.details.topics.skipped, 1);
    assert_eq!(target.count(Collection::Topics), 1);
}

#[tokio::test]
async fn test_duplicate_of_failed_commit_is_not_skipped() {
    let (source, target) = stores();
    seed_topic(&source, "state", "State");
    seed_topic(&source, "state", "State (copy)");
    target.fail_commits(true);

    let summary = runner(&source, &target).run().await;

    let topics = &summary.details.topics;
    assert_eq!(topics.attempted, 2);
    assert_eq!(topics.migrated, 0);
    assert_eq!(topics.skipped, 0);
    assert_eq!(topics.errors.len(), 2);
    assert_eq!(target.count(Collection::Topics), 0);
}

#[tokio::test]
async fn test_quiz_questions_follow_their_quiz() {
    let (source, target) = stores();
    let quiz_id = Uuid::new_v4();
    source.insert(
        Collection::Quizzes,
        quiz_id.to_string(),
        quiz(quiz_id, "widget-basics", "Widget Basics"),
    );

    for position in 1..=5 {
        let options = if position == 3 {
            "{a: 'unterminated"
        } else {
            r#"{"a": "Stateless", "b": "Stateful"}"#
        };
        let q = question(quiz_id, position, options);
        source.insert(
            Collection::QuizQuestions,
            q["id"].as_str().unwrap().to_string(),
            q,
        );
    }

    let summary = runner(&source, &target).run().await;

    assert!(summary.success, "{:?}", summary.details);
    assert_eq!(summary.details.quizzes.migrated, 1);
    assert_eq!(summary.details.quiz_questions.attempted, 5);
    assert_eq!(summary.details.quiz_questions.migrated, 5);

    let migrated = target.documents(Collection::QuizQuestions);
    assert_eq!(migrated.len(), 5);
    for q in &migrated {
        assert_eq!(q["quiz_id"], quiz_id.to_string());
    }

    let broken = migrated
        .iter()
        .find(|q| q["position"] == 3)
        .unwrap();
    assert_eq!(broken["options"], json!({}));

    // Quiz and questions went out in one commit
    assert_eq!(target.commits(), 1);

    // Target serves the quiz through the typed operations
    let backend = DocumentBackend::new(target.clone());
    let quiz = backend.get_quiz_by_slug("widget-basics").await.unwrap().unwrap();
    assert_eq!(quiz.questions.len(), 5);
    assert!(quiz.questions[2].options.is_empty());
    assert_eq!(quiz.questions[0].options["b"], "Stateful");
}

#[tokio::test]
async fn test_invalid_question_is_reported_and_dropped() {
    let (source, target) = stores();
    let quiz_id = Uuid::new_v4();
    source.insert(Collection::Quizzes, quiz_id.to_string(), quiz(quiz_id, "layouts", "Layouts"));

    let good = question(quiz_id, 1, "{}");
    source.insert(Collection::QuizQuestions, "q1", good);
    source.insert(
        Collection::QuizQuestions,
        "q2",
        json!({"quiz_id": quiz_id.to_string(), "position": 2}),
    );

    let summary = runner(&source, &target).run().await;

    assert!(!summary.success);
    assert_eq!(summary.details.quizzes.migrated, 1);
    assert_eq!(summary.details.quiz_questions.migrated, 1);
    assert_eq!(summary.details.quiz_questions.errors.len(), 1);
    assert!(summary.details.quiz_questions.errors[0].contains("question"));
}

#[tokio::test]
async fn test_commit_failure_reports_each_record() {
    let (source, target) = stores();
    seed_topic(&source, "a", "A");
    seed_topic(&source, "b", "B");
    target.fail_commits(true);

    let summary = runner(&source, &target).run().await;

    assert!(!summary.success);
    assert_eq!(summary.details.topics.attempted, 2);
    assert_eq!(summary.details.topics.migrated, 0);
    assert_eq!(summary.details.topics.errors.len(), 2);
    assert!(summary.details.topics.errors[0].contains("batch commit failed"));
}

#[tokio::test]
async fn test_list_failure_is_a_top_level_error() {
    let (source, target) = stores();
    source.fail_list(Collection::Projects);
    seed_topic(&source, "a", "A");

    let summary = runner(&source, &target).run().await;

    assert!(!summary.success);
    assert_eq!(summary.details.errors.len(), 1);
    assert!(summary.details.errors[0].contains("projects"));
    assert_eq!(summary.details.projects.attempted, 0);

    // Other entities still ran
    assert_eq!(summary.details.topics.migrated, 1);
}

#[tokio::test]
async fn test_missing_natural_key_is_a_record_error() {
    let (source, target) = stores();
    source.insert(Collection::Definitions, "d1", json!({"definition": "No term"}));

    let summary = runner(&source, &target).run().await;

    assert_eq!(summary.details.definitions.attempted, 1);
    assert_eq!(summary.details.definitions.errors.len(), 1);
    assert!(summary.details.definitions.errors[0].contains("missing term"));
}

#[tokio::test]
async fn test_batches_respect_batch_size() {
    let (source, target) = stores();
    for i in 0..7 {
        seed_topic(&source, &format!("topic-{}", i), &format!("Topic {}", i));
    }

    let runner = MigrationRunner::new(
        source.clone(),
        target.clone(),
        MigrationConfig::with_batch_size(3),
    );
    let summary = runner.run_selected(&[EntityKind::Topics]).await;

    assert_eq!(summary.details.topics.migrated, 7);
    assert_eq!(target.commits(), 3);
}

#[tokio::test]
async fn test_run_selected_only_touches_requested_entities() {
    let (source, target) = stores();
    seed_topic(&source, "a", "A");
    source.insert(Collection::Definitions, "d1", json!({"term": "Widget"}));

    let summary = runner(&source, &target)
        .run_selected(&[EntityKind::Definitions])
        .await;

    assert_eq!(summary.details.definitions.migrated, 1);
    assert_eq!(summary.details.topics.attempted, 0);
    assert_eq!(target.count(Collection::Topics), 0);
}

#[tokio::test]
async fn test_requesting_quiz_questions_runs_quizzes() {
    let (source, target) = stores();
    let quiz_id = Uuid::new_v4();
    source.insert(Collection::Quizzes, quiz_id.to_string(), quiz(quiz_id, "layouts", "Layouts"));
    source.insert(Collection::QuizQuestions, "q1", question(quiz_id, 1, "{}"));
    source.insert(Collection::QuizQuestions, "q2", question(quiz_id, 2, "{}"));
    seed_topic(&source, "a", "A");

    let kind: EntityKind = "quiz_questions".parse().unwrap();
    let summary = runner(&source, &target).run_selected(&[kind]).await;

    assert!(summary.success, "{:?}", summary.details);
    assert_eq!(summary.details.quizzes.migrated, 1);
    assert_eq!(summary.details.quiz_questions.migrated, 2);
    assert_eq!(summary.details.topics.attempted, 0);
    assert_eq!(target.count(Collection::QuizQuestions), 2);
}

#[tokio::test]
async fn test_migrated_topic_is_readable_from_target() {
    let (source, target) = stores();
    source.insert(Collection::Topics, "legacy-1", {
        let mut t = topic("null-safety", "Null Safety");
        t["id"] = json!("legacy-1");
        t["level"] = json!("Advanced");
        t["estimated_time"] = json!("20");
        t
    });

    let summary = runner(&source, &target).run().await;
    assert!(summary.success);

    let backend = DocumentBackend::new(target.clone());
    let topic = backend.get_topic_by_slug("null-safety").await.unwrap().unwrap();
    assert_eq!(topic.estimated_time, 20);
    assert_eq!(topic.level.to_string(), "senior");

    // Non-UUID source ids are replaced
    let stored = target
        .find_one(Collection::Topics, "slug", "null-safety")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored["id"], "legacy-1");
}
