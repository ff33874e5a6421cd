use std::sync::Arc;

use placement_core::model::{
    AnswerKey, LanguageLevel, MediaRef, QuestionCategory, QuestionDraft, UserDraft,
};
use placement_core::time::fixed_now;
use services::{
    Clock, PlacementService, QuestionView, StatsService, StatsServiceError, SubmitOutcome,
    TestStatus,
};
use storage::repository::{InMemoryRepository, QuestionRepository};

async fn seed(
    repo: &InMemoryRepository,
    level: LanguageLevel,
    category: QuestionCategory,
    topic: &str,
    options: &[&str],
    answer_key: AnswerKey,
    media: Option<MediaRef>,
) {
    let draft = QuestionDraft {
        level,
        category,
        topic: topic.to_string(),
        title: format!("{topic} at {level}"),
        options: options.iter().map(|o| (*o).to_string()).collect(),
        answer_key,
        media,
    };
    repo.insert_question(&draft.validate(fixed_now()).unwrap())
        .await
        .unwrap();
}

/// The submission plan: three of four right at A1.1 (75%, a pass), then one
/// of three at A1.2 (33%, a fail), so the walk reverses and settles on A1.1.
fn submission(question: &QuestionView) -> &'static str {
    match question.topic.as_str() {
        "tenses" => "0,2",
        "articles" => "1",
        "food" => "milk",
        "dialogues" => "0",
        "pronouns" => "2",
        "travel" => "2",
        "short-texts" => "0",
        other => panic!("unexpected topic {other}"),
    }
}

#[tokio::test]
async fn full_walk_settles_and_reports() {
    let repo = InMemoryRepository::new();
    let now = fixed_now();

    // A1.1: four groups with one question each, so sampling is deterministic.
    seed(
        &repo,
        LanguageLevel::A1_1,
        QuestionCategory::Grammar,
        "tenses",
        &["past", "present", "future"],
        AnswerKey::select_multiple(&[0, 2]).unwrap(),
        None,
    )
    .await;
    seed(
        &repo,
        LanguageLevel::A1_1,
        QuestionCategory::Grammar,
        "articles",
        &["a", "an", "the"],
        AnswerKey::select_one(1),
        None,
    )
    .await;
    seed(
        &repo,
        LanguageLevel::A1_1,
        QuestionCategory::Vocabulary,
        "food",
        &[],
        AnswerKey::fill_the_blank(vec!["water".to_string(), "juice".to_string()]).unwrap(),
        None,
    )
    .await;
    seed(
        &repo,
        LanguageLevel::A1_1,
        QuestionCategory::Listening,
        "dialogues",
        &["greeting", "farewell"],
        AnswerKey::select_one(0),
        Some(MediaRef::from_path("audio/a1-1-dialogues.mp3").unwrap()),
    )
    .await;

    // A1.2: three groups.
    seed(
        &repo,
        LanguageLevel::A1_2,
        QuestionCategory::Grammar,
        "pronouns",
        &["he", "she", "they"],
        AnswerKey::select_one(2),
        None,
    )
    .await;
    seed(
        &repo,
        LanguageLevel::A1_2,
        QuestionCategory::Vocabulary,
        "travel",
        &["ticket", "luggage"],
        AnswerKey::select_one(0),
        None,
    )
    .await;
    seed(
        &repo,
        LanguageLevel::A1_2,
        QuestionCategory::Reading,
        "short-texts",
        &["station", "airport"],
        AnswerKey::select_one(1),
        Some(MediaRef::from_path("texts/a1-2-short-texts.txt").unwrap()),
    )
    .await;

    let placement = PlacementService::new(
        Clock::fixed(now),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let stats = StatsService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));

    let started = placement
        .start_test(UserDraft {
            email: "taker@example.com".to_string(),
            full_name: "Test Taker".to_string(),
            start_level: LanguageLevel::A1_1,
        })
        .await
        .unwrap();
    assert_eq!(started.question.step_number, 1);
    assert_eq!(started.cursor.batch_end(), Some(4));

    // nothing is revealed while the walk runs
    let err = stats.summarized(started.user.public_id).await.unwrap_err();
    assert!(matches!(err, StatsServiceError::InProgress));

    let mut cursor = started.cursor;
    let mut question = started.question;
    let mut served_levels = vec![question.level];
    let (public_id, detected_level) = loop {
        match placement
            .submit_answer(&cursor, submission(&question))
            .await
            .unwrap()
        {
            SubmitOutcome::NextQuestion {
                cursor: next_cursor,
                question: next_question,
            } => {
                served_levels.push(next_question.level);
                cursor = next_cursor;
                question = next_question;
            }
            SubmitOutcome::Finished {
                public_id,
                detected_level,
            } => break (public_id, detected_level),
        }
    };

    assert_eq!(public_id, started.user.public_id);
    assert_eq!(detected_level, LanguageLevel::A1_1);
    assert_eq!(cursor.current_step(), 7);
    let at = |level| served_levels.iter().filter(|l| **l == level).count();
    assert_eq!(at(LanguageLevel::A1_1), 4);
    assert_eq!(at(LanguageLevel::A1_2), 3);

    assert_eq!(
        placement.status(Some(&cursor)).await.unwrap(),
        TestStatus::Finished {
            public_id,
            detected_level,
        }
    );

    let summary = stats.summarized(public_id).await.unwrap();
    assert_eq!(summary.detected_level, LanguageLevel::A1_1);
    assert_eq!(summary.total_questions, 7);
    assert_eq!(summary.total_correct, 4);
    assert_eq!(summary.per_topic.len(), 7);
    let food = summary.per_topic.iter().find(|t| t.topic == "food").unwrap();
    assert_eq!((food.total, food.correct), (1, 0));

    let report = stats.detailed(public_id).await.unwrap();
    assert_eq!(report.len(), 7);
    let steps: Vec<u32> = report.iter().map(|r| r.step_number).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, 7]);
    let food_row = report.iter().find(|r| r.title.starts_with("food")).unwrap();
    assert_eq!(food_row.correct_answer, "water, juice");
    assert_eq!(food_row.given_answer, "milk");
    assert!(!food_row.is_correct);
}
