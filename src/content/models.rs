use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub duration_minutes: i32,
    pub difficulty: String,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CourseCreate {
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub duration_minutes: Option<i32>,
    pub difficulty: Option<String>,
    pub image_url: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub synopsis: Option<String>,
    pub content: Option<String>,
    pub pages: i32,
    pub price: i32,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BookCreate {
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub synopsis: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub pages: i32,
    #[serde(default)]
    pub price: i32,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub synopsis: Option<String>,
    pub content: Option<String>,
    pub pages: Option<i32>,
    pub price: Option<i32>,
    pub image_url: Option<String>,
    pub is_published: Option<bool>,
}

/// Quiz row. A quiz belongs to exactly one parent, course or book; the
/// schema enforces the either/or.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: i64,
    pub course_id: Option<i64>,
    pub book_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    pub explanation: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizAnswer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// Quiz with its owned question/answer tree, as served to clients.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionDetail>,
}

#[derive(Debug, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct QuizCreate {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionCreate {
    pub prompt: String,
    pub explanation: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub answers: Vec<AnswerCreate>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerCreate {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub position: i32,
}

/// Quiz metadata update; when `questions` is present the whole question
/// tree is replaced.
#[derive(Debug, Deserialize)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_published: Option<bool>,
    pub questions: Option<Vec<QuestionCreate>>,
}

fn default_true() -> bool {
    true
}

fn default_difficulty() -> String {
    "easy".to_string()
}
