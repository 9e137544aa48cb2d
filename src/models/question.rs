// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::{Validate, ValidationErrors};

use crate::models::record::{Content, Record, Scope, Stored, Value};

pub(crate) fn default_points() -> f64 {
    1.0
}

/// The seven question variants. Immutable once a question is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Matching,
    ImageMatching,
    Keywords,
    FillGap,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 7] = [
        QuestionKind::SingleChoice,
        QuestionKind::MultipleChoice,
        QuestionKind::TrueFalse,
        QuestionKind::Matching,
        QuestionKind::ImageMatching,
        QuestionKind::Keywords,
        QuestionKind::FillGap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::Matching => "matching",
            QuestionKind::ImageMatching => "image_matching",
            QuestionKind::Keywords => "keywords",
            QuestionKind::FillGap => "fill_gap",
        }
    }

    /// Choice variants carry client-supplied option ids and are reconciled
    /// row by row; the rest are replaced wholesale.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice | QuestionKind::TrueFalse
        )
    }

    /// The answer-key scope rows of this kind live in.
    pub fn answer_scope(self) -> Scope {
        match self {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice | QuestionKind::TrueFalse => {
                Scope::QuestionOptions
            }
            QuestionKind::Matching | QuestionKind::ImageMatching => Scope::QuestionPairs,
            QuestionKind::Keywords => Scope::QuestionKeywords,
            QuestionKind::FillGap => Scope::QuestionGaps,
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown question kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for QuestionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Answer key of a question, one variant per question kind.
///
/// Generic over the row type of each collection so the same shape serves
/// persisted keys (`StoredAnswerKey`) and incoming definitions
/// (`AnswerKeyDef`). Serialized with the kind under `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(bound(deserialize = "O: Deserialize<'de>, P: Deserialize<'de>, K: Deserialize<'de>, G: Deserialize<'de>"))]
pub enum AnswerKey<O, P, K, G> {
    SingleChoice {
        #[serde(default)]
        options: Vec<O>,
    },
    MultipleChoice {
        #[serde(default)]
        options: Vec<O>,
    },
    TrueFalse {
        #[serde(default)]
        options: Vec<O>,
    },
    Matching {
        #[serde(default)]
        matching_pairs: Vec<P>,
    },
    ImageMatching {
        #[serde(default)]
        matching_pairs: Vec<P>,
    },
    Keywords {
        #[serde(default)]
        keywords: Vec<K>,
    },
    FillGap {
        #[serde(default)]
        gaps: Vec<G>,
    },
}

pub type StoredAnswerKey = AnswerKey<ChoiceOption, MatchingPair, KeywordAnswer, GapAnswer>;
pub type AnswerKeyDef = AnswerKey<OptionDef, PairFields, KeywordFields, GapFields>;

impl<O, P, K, G> AnswerKey<O, P, K, G> {
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerKey::SingleChoice { .. } => QuestionKind::SingleChoice,
            AnswerKey::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            AnswerKey::TrueFalse { .. } => QuestionKind::TrueFalse,
            AnswerKey::Matching { .. } => QuestionKind::Matching,
            AnswerKey::ImageMatching { .. } => QuestionKind::ImageMatching,
            AnswerKey::Keywords { .. } => QuestionKind::Keywords,
            AnswerKey::FillGap { .. } => QuestionKind::FillGap,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnswerKey::SingleChoice { options }
            | AnswerKey::MultipleChoice { options }
            | AnswerKey::TrueFalse { options } => options.len(),
            AnswerKey::Matching { matching_pairs } | AnswerKey::ImageMatching { matching_pairs } => {
                matching_pairs.len()
            }
            AnswerKey::Keywords { keywords } => keywords.len(),
            AnswerKey::FillGap { gaps } => gaps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scalar fields shared by stored questions and incoming definitions.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct QuestionFields {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points: f64,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub quiz_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    /// Stored as text; parsed into `QuestionKind` when the answer key is
    /// attached.
    pub kind: String,
    #[sqlx(flatten)]
    pub fields: QuestionFields,
}

/// A question with its full answer key, as returned by the API and walked
/// by the cloner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionDetail {
    pub id: i64,
    pub quiz_id: i64,
    pub order: i64,
    #[serde(flatten)]
    pub fields: QuestionFields,
    #[serde(flatten)]
    pub answer_key: StoredAnswerKey,
}

impl QuestionDetail {
    pub fn kind(&self) -> QuestionKind {
        self.answer_key.kind()
    }
}

/// Content of a question row, kind included.
pub struct QuestionInsert<'a> {
    pub kind: QuestionKind,
    pub fields: &'a QuestionFields,
}

impl Validate for QuestionInsert<'_> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.fields.validate()
    }
}

impl Record for QuestionInsert<'_> {
    const SCOPE: Scope = Scope::QuizQuestions;
    const COLUMNS: &'static [&'static str] = &["kind", "text", "points", "explanation", "image_url"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.kind.as_str().to_string()),
            Value::Text(self.fields.text.clone()),
            Value::Real(self.fields.points),
            Value::OptText(self.fields.explanation.clone()),
            Value::OptText(self.fields.image_url.clone()),
        ]
    }
}

/// One entry of the full question list sent on create/update.
///
/// `id` is present for questions the client received from a previous read.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDef {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: QuestionFields,
    #[serde(flatten)]
    pub answer_key: AnswerKeyDef,
}

impl QuestionDef {
    pub fn kind(&self) -> QuestionKind {
        self.answer_key.kind()
    }
}

// ---- choice options ----

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct OptionFields {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

impl OptionFields {
    pub fn new(text: &str, is_correct: bool) -> Self {
        Self {
            text: text.to_string(),
            is_correct,
            image_url: None,
        }
    }
}

impl Record for OptionFields {
    const SCOPE: Scope = Scope::QuestionOptions;
    const COLUMNS: &'static [&'static str] = &["text", "is_correct", "image_url"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.text.clone()),
            Value::Bool(self.is_correct),
            Value::OptText(self.image_url.clone()),
        ]
    }
}

/// Represents the 'question_options' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ChoiceOption {
    pub id: i64,
    pub question_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: OptionFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionDef {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: OptionFields,
}

// ---- matching pairs ----

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct PairFields {
    #[validate(length(min = 1, max = 100))]
    pub pair_key: String,
    #[validate(length(max = 2000))]
    pub prompt_text: Option<String>,
    #[validate(length(max = 500))]
    pub prompt_image_url: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub answer_text: String,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points: f64,
}

impl Record for PairFields {
    const SCOPE: Scope = Scope::QuestionPairs;
    const COLUMNS: &'static [&'static str] =
        &["pair_key", "prompt_text", "prompt_image_url", "answer_text", "points"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.pair_key.clone()),
            Value::OptText(self.prompt_text.clone()),
            Value::OptText(self.prompt_image_url.clone()),
            Value::Text(self.answer_text.clone()),
            Value::Real(self.points),
        ]
    }
}

/// Represents the 'matching_pairs' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct MatchingPair {
    pub id: i64,
    pub question_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: PairFields,
}

// ---- keywords ----

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct KeywordFields {
    #[validate(length(min = 1, max = 200))]
    pub keyword: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points_per_keyword: f64,
}

impl Record for KeywordFields {
    const SCOPE: Scope = Scope::QuestionKeywords;
    const COLUMNS: &'static [&'static str] = &["keyword", "case_sensitive", "points_per_keyword"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.keyword.clone()),
            Value::Bool(self.case_sensitive),
            Value::Real(self.points_per_keyword),
        ]
    }
}

/// Represents the 'keyword_answers' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct KeywordAnswer {
    pub id: i64,
    pub question_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: KeywordFields,
}

// ---- fill-in-the-gap ----

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct GapFields {
    #[validate(length(min = 1, max = 100))]
    pub gap_identifier: String,
    #[validate(length(min = 1, max = 500))]
    pub correct_text: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points: f64,
}

impl Record for GapFields {
    const SCOPE: Scope = Scope::QuestionGaps;
    const COLUMNS: &'static [&'static str] =
        &["gap_identifier", "correct_text", "case_sensitive", "points"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.gap_identifier.clone()),
            Value::Text(self.correct_text.clone()),
            Value::Bool(self.case_sensitive),
            Value::Real(self.points),
        ]
    }
}

/// Represents the 'gap_answers' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct GapAnswer {
    pub id: i64,
    pub question_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: GapFields,
}

macro_rules! stored_answer_row {
    ($row:ty, $fields:ty) => {
        impl Stored for $row {
            type Fields = $fields;

            fn id(&self) -> i64 {
                self.id
            }

            fn parent_id(&self) -> i64 {
                self.question_id
            }

            fn order(&self) -> i64 {
                self.order
            }

            fn fields(&self) -> &$fields {
                &self.fields
            }
        }

        impl Content<$fields> for $row {
            fn content(&self) -> &$fields {
                &self.fields
            }
        }
    };
}

stored_answer_row!(ChoiceOption, OptionFields);
stored_answer_row!(MatchingPair, PairFields);
stored_answer_row!(KeywordAnswer, KeywordFields);
stored_answer_row!(GapAnswer, GapFields);

impl Content<OptionFields> for OptionDef {
    fn content(&self) -> &OptionFields {
        &self.fields
    }
}

impl Content<PairFields> for PairFields {
    fn content(&self) -> &PairFields {
        self
    }
}

impl Content<KeywordFields> for KeywordFields {
    fn content(&self) -> &KeywordFields {
        self
    }
}

impl Content<GapFields> for GapFields {
    fn content(&self) -> &GapFields {
        self
    }
}
