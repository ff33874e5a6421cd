use placement_core::model::{
    AnswerKey, AnswerType, LanguageLevel, MediaKind, MediaRef, ProgressStep, QuestionCategory,
    QuestionDraft, QuestionId, UserDraft, ValidatedQuestion, ValidatedUser,
};
use placement_core::time::fixed_now;
use storage::repository::{
    ProgressRepository, QuestionRepository, Storage, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;
use uuid::Uuid;

fn grammar(level: LanguageLevel, topic: &str, title: &str) -> ValidatedQuestion {
    QuestionDraft {
        level,
        category: QuestionCategory::Grammar,
        topic: topic.to_string(),
        title: title.to_string(),
        options: vec!["a".to_string(), "an".to_string(), "the".to_string()],
        answer_key: AnswerKey::select_one(1),
        media: None,
    }
    .validate(fixed_now())
    .unwrap()
}

fn listening(level: LanguageLevel, topic: &str) -> ValidatedQuestion {
    QuestionDraft {
        level,
        category: QuestionCategory::Listening,
        topic: topic.to_string(),
        title: "Where does the dialogue take place?".to_string(),
        options: vec!["at a station".to_string(), "in a cafe".to_string()],
        answer_key: AnswerKey::select_one(0),
        media: Some(MediaRef::from_path("listening/dialogue-1.mp3").unwrap()),
    }
    .validate(fixed_now())
    .unwrap()
}

fn fill_blank(level: LanguageLevel, topic: &str) -> ValidatedQuestion {
    QuestionDraft {
        level,
        category: QuestionCategory::Vocabulary,
        topic: topic.to_string(),
        title: "My favourite ___ is green.".to_string(),
        options: Vec::new(),
        answer_key: AnswerKey::fill_the_blank(vec![
            "colour".to_string(),
            "color".to_string(),
        ])
        .unwrap(),
        media: None,
    }
    .validate(fixed_now())
    .unwrap()
}

fn registration() -> ValidatedUser {
    UserDraft {
        email: "kim@example.com".to_string(),
        full_name: "Kim Park".to_string(),
        start_level: LanguageLevel::A1_1,
    }
    .validate(Uuid::new_v4(), fixed_now())
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_questions_including_media_and_keys() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_questions?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let choice = repo
        .insert_question(&grammar(LanguageLevel::A1_1, "articles", "Q1"))
        .await
        .unwrap();
    let fetched = repo.get_question(choice.id).await.unwrap();
    assert_eq!(fetched, choice);
    assert!(fetched.answer_key.matches("1"));
    assert!(!fetched.answer_key.matches("0"));

    let audio = repo
        .insert_question(&listening(LanguageLevel::A1_1, "dialogues"))
        .await
        .unwrap();
    let fetched = repo.get_question(audio.id).await.unwrap();
    let media = fetched.media.clone().expect("media survives the round trip");
    assert_eq!(media.kind(), MediaKind::Audio);
    assert_eq!(media.path(), "listening/dialogue-1.mp3");

    let blank = repo
        .insert_question(&fill_blank(LanguageLevel::A1_1, "colours"))
        .await
        .unwrap();
    let fetched = repo.get_question(blank.id).await.unwrap();
    assert_eq!(fetched.answer_key.answer_type(), AnswerType::FillTheBlank);
    assert!(fetched.answer_key.matches("Colour"));
    assert!(!fetched.answer_key.matches("green"));

    let missing = repo.get_question(QuestionId::new(999)).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));
}

#[tokio::test]
async fn sqlite_counts_and_samples_groups_in_order() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_groups?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let level = LanguageLevel::A2_1;
    let first = repo
        .insert_question(&grammar(level, "articles", "Q1"))
        .await
        .unwrap();
    let second = repo
        .insert_question(&grammar(level, "articles", "Q2"))
        .await
        .unwrap();
    repo.insert_question(&grammar(level, "tenses", "Q3"))
        .await
        .unwrap();
    repo.insert_question(&listening(level, "dialogues"))
        .await
        .unwrap();
    // a different level must not show up in the counts
    repo.insert_question(&grammar(LanguageLevel::A2_2, "articles", "Q4"))
        .await
        .unwrap();

    let counts = repo.counts_by_group(level).await.unwrap();
    let summary: Vec<(QuestionCategory, &str, u32)> = counts
        .iter()
        .map(|c| (c.key.category, c.key.topic.as_str(), c.question_count))
        .collect();
    assert_eq!(
        summary,
        vec![
            (QuestionCategory::Grammar, "articles", 2),
            (QuestionCategory::Grammar, "tenses", 1),
            (QuestionCategory::Listening, "dialogues", 1),
        ]
    );

    let key = first.group_key();
    assert_eq!(repo.nth_in_group(&key, 0).await.unwrap(), Some(first));
    assert_eq!(repo.nth_in_group(&key, 1).await.unwrap(), Some(second));
    assert_eq!(repo.nth_in_group(&key, 2).await.unwrap(), None);

    assert!(
        repo.counts_by_group(LanguageLevel::B2_2)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn sqlite_append_steps_rolls_back_on_conflict() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_append?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = repo.create_user(&registration()).await.unwrap();
    let question = repo
        .insert_question(&grammar(LanguageLevel::A1_1, "articles", "Q1"))
        .await
        .unwrap();

    let now = fixed_now();
    repo.append_steps(&[
        ProgressStep::new(user.id, 1, question.id, now),
        ProgressStep::new(user.id, 2, question.id, now),
    ])
    .await
    .unwrap();

    let err = repo
        .append_steps(&[
            ProgressStep::new(user.id, 3, question.id, now),
            ProgressStep::new(user.id, 2, question.id, now),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // the non-conflicting step of the failed batch must be gone too
    let missing = repo.step_with_question(user.id, 3).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));

    assert_eq!(repo.unanswered_count(user.id).await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_record_answer_keeps_the_first_submission() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_answers?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = repo.create_user(&registration()).await.unwrap();
    let question = repo
        .insert_question(&grammar(LanguageLevel::A1_1, "articles", "Q1"))
        .await
        .unwrap();
    let now = fixed_now();
    repo.append_steps(&[ProgressStep::new(user.id, 1, question.id, now)])
        .await
        .unwrap();

    repo.record_answer(user.id, 1, "1", true, now).await.unwrap();
    assert_eq!(repo.unanswered_count(user.id).await.unwrap(), 0);

    let err = repo
        .record_answer(user.id, 1, "0", false, now)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let kept = repo.step_with_question(user.id, 1).await.unwrap();
    assert_eq!(kept.step.given_answer.as_deref(), Some("1"));
    assert_eq!(kept.step.is_correct, Some(true));
    assert_eq!(kept.question, question);

    let err = repo
        .record_answer(user.id, 9, "1", true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_level_outcomes_follow_the_walk_order() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_outcomes?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = repo.create_user(&registration()).await.unwrap();
    let higher = repo
        .insert_question(&grammar(LanguageLevel::A1_2, "articles", "Q1"))
        .await
        .unwrap();
    let lower = repo
        .insert_question(&grammar(LanguageLevel::A1_1, "articles", "Q2"))
        .await
        .unwrap();

    let now = fixed_now();
    repo.append_steps(&[
        ProgressStep::new(user.id, 1, higher.id, now),
        ProgressStep::new(user.id, 2, higher.id, now),
        ProgressStep::new(user.id, 3, lower.id, now),
    ])
    .await
    .unwrap();
    repo.record_answer(user.id, 1, "1", true, now).await.unwrap();
    repo.record_answer(user.id, 2, "0", false, now).await.unwrap();
    repo.record_answer(user.id, 3, "1", true, now).await.unwrap();

    let outcomes = repo.level_outcomes(user.id).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].level, LanguageLevel::A1_2);
    assert_eq!(outcomes[0].first_step_number, 1);
    assert_eq!(outcomes[0].total, 2);
    assert_eq!(outcomes[0].correct, 1);
    assert_eq!(outcomes[1].level, LanguageLevel::A1_1);
    assert_eq!(outcomes[1].first_step_number, 3);
    assert_eq!(outcomes[1].correct, 1);

    let topics = repo.topic_outcomes(user.id).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].topic, "articles");
    assert_eq!(topics[0].total, 3);
    assert_eq!(topics[0].correct, 2);

    let answered = repo.answered_steps(user.id).await.unwrap();
    let steps: Vec<u32> = answered.iter().map(|s| s.step.step_number).collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[tokio::test]
async fn sqlite_storage_aggregate_finds_users_by_public_id() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("connect");

    let registration = registration();
    let created = storage.users.create_user(&registration).await.unwrap();
    assert_eq!(
        storage.users.get_user(created.id).await.unwrap(),
        created
    );

    let found = storage
        .users
        .find_by_public_id(created.public_id)
        .await
        .unwrap();
    assert_eq!(found, Some(created));

    let missing = storage
        .users
        .find_by_public_id(Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(missing, None);

    // the public token is unique per registration
    let err = storage.users.create_user(&registration).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}
