// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::record::{Content, Record, Scope, Stored, Value};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct LessonFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100000))]
    pub content: String,
}

impl Record for LessonFields {
    const SCOPE: Scope = Scope::SectionLessons;
    const COLUMNS: &'static [&'static str] = &["title", "content"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Text(self.content.clone()),
        ]
    }
}

/// Represents the 'lessons' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub section_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: LessonFields,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct ResourceFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub url: String,
}

impl Record for ResourceFields {
    const SCOPE: Scope = Scope::LessonResources;
    const COLUMNS: &'static [&'static str] = &["title", "url"];

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.title.clone()), Value::Text(self.url.clone())]
    }
}

/// Represents the 'lesson_resources' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct LessonResource {
    pub id: i64,
    pub lesson_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: ResourceFields,
}

impl Stored for LessonResource {
    type Fields = ResourceFields;

    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> i64 {
        self.lesson_id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn fields(&self) -> &ResourceFields {
        &self.fields
    }
}

impl Content<ResourceFields> for LessonResource {
    fn content(&self) -> &ResourceFields {
        &self.fields
    }
}

/// A lesson with its resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonTree {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub resources: Vec<LessonResource>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct AssignmentFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub instructions: String,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub max_points: f64,
}

impl Record for AssignmentFields {
    const SCOPE: Scope = Scope::SectionAssignments;
    const COLUMNS: &'static [&'static str] = &["title", "instructions", "max_points"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Text(self.instructions.clone()),
            Value::Real(self.max_points),
        ]
    }
}

/// Represents the 'assignments' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub section_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: AssignmentFields,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct CriterionFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points: f64,
}

impl Record for CriterionFields {
    const SCOPE: Scope = Scope::AssignmentCriteria;
    const COLUMNS: &'static [&'static str] = &["title", "description", "points"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Text(self.description.clone()),
            Value::Real(self.points),
        ]
    }
}

/// Represents the 'assignment_criteria' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AssignmentCriterion {
    pub id: i64,
    pub assignment_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: CriterionFields,
}

impl Stored for AssignmentCriterion {
    type Fields = CriterionFields;

    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> i64 {
        self.assignment_id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn fields(&self) -> &CriterionFields {
        &self.fields
    }
}

impl Content<CriterionFields> for AssignmentCriterion {
    fn content(&self) -> &CriterionFields {
        &self.fields
    }
}

/// An assignment with its grading criteria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentTree {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub criteria: Vec<AssignmentCriterion>,
}
