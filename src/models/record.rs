// src/models/record.rs

use sqlx::{Sqlite, query::Query, sqlite::SqliteArguments};
use validator::Validate;

/// A sibling scope: rows of one table sharing a parent and one
/// `sort_order` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    SectionQuizzes,
    SectionLessons,
    SectionAssignments,
    QuizQuestions,
    QuestionOptions,
    QuestionPairs,
    QuestionKeywords,
    QuestionGaps,
    LessonResources,
    AssignmentCriteria,
}

impl Scope {
    pub const ANSWER_KEYS: [Scope; 4] = [
        Scope::QuestionOptions,
        Scope::QuestionPairs,
        Scope::QuestionKeywords,
        Scope::QuestionGaps,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Scope::SectionQuizzes => "quizzes",
            Scope::SectionLessons => "lessons",
            Scope::SectionAssignments => "assignments",
            Scope::QuizQuestions => "questions",
            Scope::QuestionOptions => "question_options",
            Scope::QuestionPairs => "matching_pairs",
            Scope::QuestionKeywords => "keyword_answers",
            Scope::QuestionGaps => "gap_answers",
            Scope::LessonResources => "lesson_resources",
            Scope::AssignmentCriteria => "assignment_criteria",
        }
    }

    pub fn parent_column(self) -> &'static str {
        match self {
            Scope::SectionQuizzes | Scope::SectionLessons | Scope::SectionAssignments => {
                "section_id"
            }
            Scope::QuizQuestions => "quiz_id",
            Scope::QuestionOptions
            | Scope::QuestionPairs
            | Scope::QuestionKeywords
            | Scope::QuestionGaps => "question_id",
            Scope::LessonResources => "lesson_id",
            Scope::AssignmentCriteria => "assignment_id",
        }
    }

    /// Human-readable name of a row in this scope, used in error messages.
    pub fn entity(self) -> &'static str {
        match self {
            Scope::SectionQuizzes => "quiz",
            Scope::SectionLessons => "lesson",
            Scope::SectionAssignments => "assignment",
            Scope::QuizQuestions => "question",
            Scope::QuestionOptions => "option",
            Scope::QuestionPairs => "matching pair",
            Scope::QuestionKeywords => "keyword",
            Scope::QuestionGaps => "gap answer",
            Scope::LessonResources => "lesson resource",
            Scope::AssignmentCriteria => "assignment criterion",
        }
    }

    pub fn parent_entity(self) -> &'static str {
        match self {
            Scope::SectionQuizzes | Scope::SectionLessons | Scope::SectionAssignments => "section",
            Scope::QuizQuestions => "quiz",
            Scope::QuestionOptions
            | Scope::QuestionPairs
            | Scope::QuestionKeywords
            | Scope::QuestionGaps => "question",
            Scope::LessonResources => "lesson",
            Scope::AssignmentCriteria => "assignment",
        }
    }
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(Option<i64>),
    Real(f64),
    Bool(bool),
    Text(String),
    OptText(Option<String>),
}

impl Value {
    pub fn bind_to<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            Value::Int(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Bool(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::OptText(v) => query.bind(v),
        }
    }
}

/// The scalar content of a row: everything except id, parent and order.
///
/// `COLUMNS` and `values()` must line up one to one.
pub trait Record: Validate + Send + Sync {
    const SCOPE: Scope;
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;
}

/// A persisted row whose content is a `Record`.
pub trait Stored: Send + Sync {
    type Fields: Record + PartialEq;

    fn id(&self) -> i64;
    fn parent_id(&self) -> i64;
    fn order(&self) -> i64;
    fn fields(&self) -> &Self::Fields;
}

/// Anything carrying the content of a row, persisted or incoming.
pub trait Content<F> {
    fn content(&self) -> &F;
}
