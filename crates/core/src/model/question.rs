use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::level::LanguageLevel;

//
// ─── CATEGORY & ANSWER TYPE ────────────────────────────────────────────────────
//

/// Skill area a question probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Grammar,
    Vocabulary,
    Reading,
    Listening,
}

impl QuestionCategory {
    /// Stable name used in storage and wire payloads.
    #[must_use]
    pub fn storage_name(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Vocabulary => "vocabulary",
            Self::Reading => "reading",
            Self::Listening => "listening",
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_name())
    }
}

impl FromStr for QuestionCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grammar" => Ok(Self::Grammar),
            "vocabulary" => Ok(Self::Vocabulary),
            "reading" => Ok(Self::Reading),
            "listening" => Ok(Self::Listening),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

/// How a question expects its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    SelectOne,
    SelectMultiple,
    FillTheBlank,
}

impl AnswerType {
    /// Stable name used in storage and wire payloads.
    #[must_use]
    pub fn storage_name(&self) -> &'static str {
        match self {
            Self::SelectOne => "select_one",
            Self::SelectMultiple => "select_multiple",
            Self::FillTheBlank => "fill_the_blank",
        }
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_name())
    }
}

impl FromStr for AnswerType {
    type Err = ParseAnswerTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select_one" => Ok(Self::SelectOne),
            "select_multiple" => Ok(Self::SelectMultiple),
            "fill_the_blank" => Ok(Self::FillTheBlank),
            other => Err(ParseAnswerTypeError(other.to_string())),
        }
    }
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Canonical correct answer of a question, in the same encoding submitted
/// answers arrive in.
///
/// - `SelectOne` holds a single option index rendered as text, e.g. `"2"`.
/// - `SelectMultiple` holds comma-joined ascending indices, e.g. `"1,3"`.
///   A submission in any other order or spacing does not match.
/// - `FillTheBlank` holds one or more accepted strings; a submission matches
///   if it equals any of them ignoring letter case (Unicode-aware). Nothing
///   is trimmed on either side.
///
/// # Examples
///
/// ```
/// use placement_core::model::AnswerKey;
///
/// let key = AnswerKey::select_multiple(&[1, 3])?;
/// assert!(key.matches("1,3"));
/// assert!(!key.matches("3,1"));
///
/// let blank = AnswerKey::fill_the_blank(vec!["awesome".to_string()])?;
/// assert!(blank.matches("Awesome"));
/// assert!(!blank.matches(" awesome"));
/// # Ok::<(), placement_core::model::AnswerKeyError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    SelectOne(String),
    SelectMultiple(String),
    FillTheBlank(Vec<String>),
}

impl AnswerKey {
    /// Builds a single-choice key from an option index.
    #[must_use]
    pub fn select_one(index: u16) -> Self {
        Self::SelectOne(index.to_string())
    }

    /// Builds a multiple-choice key from option indices.
    ///
    /// # Errors
    ///
    /// - `NoIndices` if `indices` is empty
    /// - `NotAscending` if indices are unordered or repeat
    pub fn select_multiple(indices: &[u16]) -> Result<Self, AnswerKeyError> {
        if indices.is_empty() {
            return Err(AnswerKeyError::NoIndices);
        }
        if !indices.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(AnswerKeyError::NotAscending {
                provided: indices.to_vec(),
            });
        }
        let joined = indices
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(Self::SelectMultiple(joined))
    }

    /// Builds a fill-the-blank key from its accepted answers.
    ///
    /// # Errors
    ///
    /// - `NoAcceptedAnswers` if `accepted` is empty
    /// - `BlankAcceptedAnswer` if any accepted answer is blank
    pub fn fill_the_blank(accepted: Vec<String>) -> Result<Self, AnswerKeyError> {
        if accepted.is_empty() {
            return Err(AnswerKeyError::NoAcceptedAnswers);
        }
        if accepted.iter().any(|answer| answer.trim().is_empty()) {
            return Err(AnswerKeyError::BlankAcceptedAnswer);
        }
        Ok(Self::FillTheBlank(accepted))
    }

    /// Parses a stored single-choice key such as `"2"`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedChoice` if `raw` is not an option index.
    pub fn parse_select_one(raw: &str) -> Result<Self, AnswerKeyError> {
        raw.parse::<u16>()
            .map(Self::select_one)
            .map_err(|_| AnswerKeyError::MalformedChoice {
                provided: raw.to_string(),
            })
    }

    /// Parses a stored multiple-choice key such as `"1,3"`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedChoice` if any part is not an index, and the
    /// `select_multiple` errors for empty or unordered index lists.
    pub fn parse_select_multiple(raw: &str) -> Result<Self, AnswerKeyError> {
        let indices = raw
            .split(',')
            .map(|part| {
                part.parse::<u16>()
                    .map_err(|_| AnswerKeyError::MalformedChoice {
                        provided: raw.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::select_multiple(&indices)
    }

    /// Returns the answer type this key belongs to.
    #[must_use]
    pub fn answer_type(&self) -> AnswerType {
        match self {
            Self::SelectOne(_) => AnswerType::SelectOne,
            Self::SelectMultiple(_) => AnswerType::SelectMultiple,
            Self::FillTheBlank(_) => AnswerType::FillTheBlank,
        }
    }

    /// Grades a submitted answer against this key.
    #[must_use]
    pub fn matches(&self, given: &str) -> bool {
        match self {
            Self::SelectOne(expected) | Self::SelectMultiple(expected) => given == expected,
            Self::FillTheBlank(accepted) => {
                let given = given.to_lowercase();
                accepted.iter().any(|answer| answer.to_lowercase() == given)
            }
        }
    }

    /// Stored text for choice keys; `None` for fill-the-blank.
    #[must_use]
    pub fn choice_text(&self) -> Option<&str> {
        match self {
            Self::SelectOne(raw) | Self::SelectMultiple(raw) => Some(raw),
            Self::FillTheBlank(_) => None,
        }
    }

    /// Accepted answers for fill-the-blank keys; `None` for choice keys.
    #[must_use]
    pub fn accepted_answers(&self) -> Option<&[String]> {
        match self {
            Self::FillTheBlank(accepted) => Some(accepted),
            _ => None,
        }
    }

    /// Human-readable rendering used in detailed results.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::SelectOne(raw) | Self::SelectMultiple(raw) => raw.clone(),
            Self::FillTheBlank(accepted) => accepted.join(", "),
        }
    }

    fn choice_indices(&self) -> Result<Vec<u16>, AnswerKeyError> {
        match self {
            Self::SelectOne(raw) => raw
                .parse::<u16>()
                .map(|index| vec![index])
                .map_err(|_| AnswerKeyError::MalformedChoice {
                    provided: raw.clone(),
                }),
            Self::SelectMultiple(raw) => raw
                .split(',')
                .map(|part| {
                    part.parse::<u16>()
                        .map_err(|_| AnswerKeyError::MalformedChoice {
                            provided: raw.clone(),
                        })
                })
                .collect(),
            Self::FillTheBlank(_) => Ok(Vec::new()),
        }
    }
}

//
// ─── MEDIA ─────────────────────────────────────────────────────────────────────
//

/// What a media attachment contains, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Audio,
}

/// A media file attached to a question, stored as a relative path.
///
/// The kind is classified from the extension when the reference is built:
/// `.txt` is a reading passage, `.mp3` an audio clip. Anything else is
/// rejected rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    path: String,
    kind: MediaKind,
}

impl MediaRef {
    /// Classifies a media file by its extension.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedExtension` for anything that is not
    /// a `.txt` or `.mp3` file (extension match is case-insensitive).
    pub fn from_path(path: impl Into<String>) -> Result<Self, MediaError> {
        let path = path.into();
        let extension = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let kind = match extension.as_deref() {
            Some("txt") => MediaKind::Text,
            Some("mp3") => MediaKind::Audio,
            _ => return Err(MediaError::UnsupportedExtension { path }),
        };

        Ok(Self { path, kind })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question input from seeding or an authoring surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub level: LanguageLevel,
    pub category: QuestionCategory,
    pub topic: String,
    pub title: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub media: Option<MediaRef>,
}

impl QuestionDraft {
    /// Checks the draft and produces a validated question.
    ///
    /// Titles and topics are trimmed; choice keys must point at existing
    /// options; fill-the-blank questions carry no options; reading and
    /// listening questions must carry media of the matching kind, the other
    /// categories none at all.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionValidationError` a rule trips over.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedQuestion, QuestionValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(QuestionValidationError::TitleEmpty);
        }
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(QuestionValidationError::TopicEmpty);
        }

        if !self.level.is_testable() {
            return Err(QuestionValidationError::LevelNotTestable { level: self.level });
        }

        for (index, option) in self.options.iter().enumerate() {
            if option.trim().is_empty() {
                return Err(QuestionValidationError::OptionEmpty { index });
            }
        }

        match self.answer_key.answer_type() {
            AnswerType::SelectOne | AnswerType::SelectMultiple => {
                if self.options.len() < 2 {
                    return Err(QuestionValidationError::NotEnoughOptions {
                        provided: self.options.len(),
                    });
                }
                let indices = self
                    .answer_key
                    .choice_indices()
                    .map_err(QuestionValidationError::Key)?;
                for index in indices {
                    if usize::from(index) >= self.options.len() {
                        return Err(QuestionValidationError::ChoiceOutOfRange {
                            index,
                            options: self.options.len(),
                        });
                    }
                }
            }
            AnswerType::FillTheBlank => {
                if !self.options.is_empty() {
                    return Err(QuestionValidationError::OptionsNotAllowed);
                }
            }
        }

        match (self.category, &self.media) {
            (QuestionCategory::Reading, Some(media)) if media.kind() == MediaKind::Text => {}
            (QuestionCategory::Listening, Some(media)) if media.kind() == MediaKind::Audio => {}
            (category @ (QuestionCategory::Reading | QuestionCategory::Listening), Some(media)) => {
                return Err(QuestionValidationError::MediaKindMismatch {
                    category,
                    kind: media.kind(),
                });
            }
            (category @ (QuestionCategory::Reading | QuestionCategory::Listening), None) => {
                return Err(QuestionValidationError::MediaMissing { category });
            }
            (category @ (QuestionCategory::Grammar | QuestionCategory::Vocabulary), Some(_)) => {
                return Err(QuestionValidationError::MediaNotAllowed { category });
            }
            (QuestionCategory::Grammar | QuestionCategory::Vocabulary, None) => {}
        }

        Ok(ValidatedQuestion {
            level: self.level,
            category: self.category,
            topic: topic.to_string(),
            title: title.to_string(),
            options: self.options,
            answer_key: self.answer_key,
            media: self.media,
            created_at: now,
        })
    }
}

/// A question that passed validation but has no identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub level: LanguageLevel,
    pub category: QuestionCategory,
    pub topic: String,
    pub title: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub media: Option<MediaRef>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            level: self.level,
            category: self.category,
            topic: self.topic,
            title: self.title,
            options: self.options,
            answer_key: self.answer_key,
            media: self.media,
            created_at: self.created_at,
        }
    }
}

/// A catalog question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub level: LanguageLevel,
    pub category: QuestionCategory,
    pub topic: String,
    pub title: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub media: Option<MediaRef>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Rebuilds a question from stored fields, re-running draft validation.
    ///
    /// # Errors
    ///
    /// Returns `QuestionValidationError` when the stored row no longer
    /// satisfies the draft rules.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuestionId,
        level: LanguageLevel,
        category: QuestionCategory,
        topic: String,
        title: String,
        options: Vec<String>,
        answer_key: AnswerKey,
        media: Option<MediaRef>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionValidationError> {
        let draft = QuestionDraft {
            level,
            category,
            topic,
            title,
            options,
            answer_key,
            media,
        };
        Ok(draft.validate(created_at)?.assign_id(id))
    }

    /// Returns the sampling group this question belongs to.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            level: self.level,
            category: self.category,
            answer_type: self.answer_key.answer_type(),
            topic: self.topic.clone(),
        }
    }
}

/// The unit a question batch samples from: one question is drawn per
/// distinct `(level, category, answer type, topic)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub level: LanguageLevel,
    pub category: QuestionCategory,
    pub answer_type: AnswerType,
    pub topic: String,
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Error type for parsing a category from its storage name
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown question category: {0:?}")]
pub struct ParseCategoryError(String);

/// Error type for parsing an answer type from its storage name
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown answer type: {0:?}")]
pub struct ParseAnswerTypeError(String);

/// A correct-answer encoding could not be built or read back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerKeyError {
    #[error("a choice answer needs at least one option index")]
    NoIndices,
    #[error("choice indices must be strictly ascending, got {provided:?}")]
    NotAscending { provided: Vec<u16> },
    #[error("fill-the-blank needs at least one accepted answer")]
    NoAcceptedAnswers,
    #[error("accepted answers must not be blank")]
    BlankAcceptedAnswer,
    #[error("malformed choice answer: {provided:?}")]
    MalformedChoice { provided: String },
}

/// A media path the catalog refuses to classify.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("cannot classify media file {path:?}; expected a .txt or .mp3 extension")]
    UnsupportedExtension { path: String },
}

/// Reasons a question draft fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestionValidationError {
    #[error("question title must not be empty")]
    TitleEmpty,
    #[error("question topic must not be empty")]
    TopicEmpty,
    #[error("questions cannot be filed under {level}")]
    LevelNotTestable { level: LanguageLevel },
    #[error("option {index} must not be empty")]
    OptionEmpty { index: usize },
    #[error("choice questions need at least two options, got {provided}")]
    NotEnoughOptions { provided: usize },
    #[error("fill-the-blank questions carry no options")]
    OptionsNotAllowed,
    #[error("answer index {index} is outside the {options} options")]
    ChoiceOutOfRange { index: u16, options: usize },
    #[error("{category} questions require a media file")]
    MediaMissing { category: QuestionCategory },
    #[error("{category} questions do not carry media")]
    MediaNotAllowed { category: QuestionCategory },
    #[error("{category} questions cannot use {kind:?} media")]
    MediaKindMismatch {
        category: QuestionCategory,
        kind: MediaKind,
    },
    #[error("invalid answer key: {0}")]
    Key(#[source] AnswerKeyError),
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
