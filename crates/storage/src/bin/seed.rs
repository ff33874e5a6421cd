use std::fmt;

use chrono::{DateTime, Utc};
use placement_core::model::{
    AnswerKey, LanguageLevel, MediaRef, QuestionCategory, QuestionDraft,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    levels: u8,
    per_group: u16,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLevels { raw: String },
    InvalidPerGroup { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLevels { raw } => {
                write!(f, "invalid --levels value (expected 1..=9): {raw}")
            }
            ArgsError::InvalidPerGroup { raw } => {
                write!(f, "invalid --per-group value: {raw}")
            }
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PLACEMENT_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut levels = std::env::var("PLACEMENT_LEVELS")
            .ok()
            .and_then(|value| value.parse::<u8>().ok())
            .unwrap_or(3);
        let mut per_group = std::env::var("PLACEMENT_PER_GROUP")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(2);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--levels" => {
                    let value = require_value(&mut args, "--levels")?;
                    levels = value
                        .parse::<u8>()
                        .ok()
                        .filter(|n| (1..=9).contains(n))
                        .ok_or(ArgsError::InvalidLevels { raw: value.clone() })?;
                }
                "--per-group" => {
                    let value = require_value(&mut args, "--per-group")?;
                    per_group = value
                        .parse::<u16>()
                        .ok()
                        .filter(|n| *n >= 1)
                        .ok_or(ArgsError::InvalidPerGroup { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            levels,
            per_group,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --levels <n>              Testable levels to seed, from A1.1 up (default: 3)");
    eprintln!("  --per-group <n>           Questions per sampling group (default: 2)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  PLACEMENT_DB_URL, PLACEMENT_LEVELS, PLACEMENT_PER_GROUP");
}

/// Sample drafts covering every category and answer type at one level, with
/// `per_group` interchangeable questions in each sampling group.
fn level_drafts(level: LanguageLevel, per_group: u16) -> Result<Vec<QuestionDraft>, Box<dyn std::error::Error>> {
    let name = level.name();
    let mut drafts = Vec::new();

    for copy in 0..per_group {
        let n = copy + 1;

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Grammar,
            topic: "articles".into(),
            title: format!("Choose the missing article ({name} #{n})"),
            options: vec!["a".into(), "an".into(), "the".into()],
            answer_key: AnswerKey::select_one(copy % 3),
            media: None,
        });

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Grammar,
            topic: "tenses".into(),
            title: format!("Mark every past form ({name} #{n})"),
            options: vec!["go".into(), "goes".into(), "went".into(), "gone".into()],
            answer_key: AnswerKey::select_multiple(&[2, 3])?,
            media: None,
        });

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Vocabulary,
            topic: "travel".into(),
            title: format!("Pick the word for a travel document ({name} #{n})"),
            options: vec!["ticket".into(), "luggage".into(), "platform".into()],
            answer_key: AnswerKey::select_one(0),
            media: None,
        });

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Vocabulary,
            topic: "food".into(),
            title: format!("I would like a glass of ___, please. ({name} #{n})"),
            options: Vec::new(),
            answer_key: AnswerKey::fill_the_blank(vec!["water".into(), "juice".into()])?,
            media: None,
        });

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Reading,
            topic: "short-texts".into(),
            title: format!("What is the text about? ({name} #{n})"),
            options: vec!["a holiday".into(), "a job search".into()],
            answer_key: AnswerKey::select_one(copy % 2),
            media: Some(MediaRef::from_path(format!(
                "reading/{name}-short-text-{n}.txt"
            ))?),
        });

        drafts.push(QuestionDraft {
            level,
            category: QuestionCategory::Listening,
            topic: "dialogues".into(),
            title: format!("Where does the dialogue take place? ({name} #{n})"),
            options: vec!["at a station".into(), "in a cafe".into()],
            answer_key: AnswerKey::select_one((copy + 1) % 2),
            media: Some(MediaRef::from_path(format!(
                "listening/{name}-dialogue-{n}.mp3"
            ))?),
        });
    }

    Ok(drafts)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut inserted = 0u32;
    for level in LanguageLevel::testable().take(usize::from(args.levels)) {
        for draft in level_drafts(level, args.per_group)? {
            let validated = draft.validate(now)?;
            storage.questions.insert_question(&validated).await?;
            inserted += 1;
        }
    }

    println!(
        "Seeded {} questions across {} levels into {}",
        inserted, args.levels, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
