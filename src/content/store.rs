use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

use crate::content::models::{
    Book, BookCreate, BookUpdate, Course, CourseCreate, CourseUpdate, QuestionCreate,
    QuestionDetail, Quiz, QuizAnswer, QuizCreate, QuizDetail, QuizQuestion, QuizUpdate,
};
use crate::error::AppError;

const COURSE_COLUMNS: &str = "id, slug, title, summary, content, duration_minutes, difficulty, \
     image_url, is_published, created_at, updated_at";
const BOOK_COLUMNS: &str = "id, slug, title, author, synopsis, content, pages, price, \
     image_url, is_published, created_at, updated_at";
const QUIZ_COLUMNS: &str =
    "id, course_id, book_id, title, description, is_published, created_at, updated_at";

pub struct ContentStore {
    pool: Arc<PgPool>,
}

impl ContentStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    // ---- courses ----

    pub async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {} FROM courses WHERE is_published ORDER BY id",
            COURSE_COLUMNS
        ))
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(courses)
    }

    pub async fn get_course(&self, id: i64) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::NotFound("course"))
    }

    pub async fn create_course(&self, new: &CourseCreate) -> Result<Course, AppError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (slug, title, summary, content, duration_minutes, difficulty, image_url, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.summary)
        .bind(&new.content)
        .bind(new.duration_minutes)
        .bind(&new.difficulty)
        .bind(&new.image_url)
        .bind(new.is_published)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(course)
    }

    pub async fn update_course(&self, id: i64, patch: &CourseUpdate) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
            SET title = COALESCE($2, title),
                summary = COALESCE($3, summary),
                content = COALESCE($4, content),
                duration_minutes = COALESCE($5, duration_minutes),
                difficulty = COALESCE($6, difficulty),
                image_url = COALESCE($7, image_url),
                is_published = COALESCE($8, is_published),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.summary)
        .bind(&patch.content)
        .bind(patch.duration_minutes)
        .bind(&patch.difficulty)
        .bind(&patch.image_url)
        .bind(patch.is_published)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::NotFound("course"))
    }

    /// Deleting a course cascades to its quizzes, questions and answers
    /// through the foreign keys.
    pub async fn delete_course(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("course"));
        }
        Ok(())
    }

    // ---- books ----

    pub async fn list_books(&self) -> Result<Vec<Book>, AppError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE is_published ORDER BY id",
            BOOK_COLUMNS
        ))
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(books)
    }

    pub async fn get_book(&self, id: i64) -> Result<Book, AppError> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::NotFound("book"))
    }

    pub async fn create_book(&self, new: &BookCreate) -> Result<Book, AppError> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (slug, title, author, synopsis, content, pages, price, image_url, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.synopsis)
        .bind(&new.content)
        .bind(new.pages)
        .bind(new.price)
        .bind(&new.image_url)
        .bind(new.is_published)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(book)
    }

    pub async fn update_book(&self, id: i64, patch: &BookUpdate) -> Result<Book, AppError> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                author = COALESCE($3, author),
                synopsis = COALESCE($4, synopsis),
                content = COALESCE($5, content),
                pages = COALESCE($6, pages),
                price = COALESCE($7, price),
                image_url = COALESCE($8, image_url),
                is_published = COALESCE($9, is_published),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.author)
        .bind(&patch.synopsis)
        .bind(&patch.content)
        .bind(patch.pages)
        .bind(patch.price)
        .bind(&patch.image_url)
        .bind(patch.is_published)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::NotFound("book"))
    }

    pub async fn delete_book(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("book"));
        }
        Ok(())
    }

    // ---- quizzes ----

    pub async fn list_course_quizzes(&self, course_id: i64) -> Result<Vec<Quiz>, AppError> {
        // 404 for the parent, not an empty list, when the course is gone.
        self.get_course(course_id).await?;
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {} FROM quizzes WHERE course_id = $1 AND is_published ORDER BY id",
            QUIZ_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(quizzes)
    }

    pub async fn get_quiz(&self, id: i64) -> Result<QuizDetail, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::NotFound("quiz"))?;

        let questions = sqlx::query_as::<_, QuizQuestion>(
            "SELECT id, quiz_id, prompt, explanation, position FROM quiz_questions \
             WHERE quiz_id = $1 ORDER BY position, id",
        )
        .bind(id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut detail = Vec::with_capacity(questions.len());
        for question in questions {
            let answers = sqlx::query_as::<_, QuizAnswer>(
                "SELECT id, question_id, text, is_correct, position FROM quiz_answers \
                 WHERE question_id = $1 ORDER BY position, id",
            )
            .bind(question.id)
            .fetch_all(self.pool.as_ref())
            .await?;
            detail.push(QuestionDetail { question, answers });
        }

        Ok(QuizDetail {
            quiz,
            questions: detail,
        })
    }

    pub async fn create_course_quiz(
        &self,
        course_id: i64,
        new: &QuizCreate,
    ) -> Result<QuizDetail, AppError> {
        self.get_course(course_id).await?;
        self.create_quiz(Some(course_id), None, new).await
    }

    pub async fn create_book_quiz(
        &self,
        book_id: i64,
        new: &QuizCreate,
    ) -> Result<QuizDetail, AppError> {
        self.get_book(book_id).await?;
        self.create_quiz(None, Some(book_id), new).await
    }

    async fn create_quiz(
        &self,
        course_id: Option<i64>,
        book_id: Option<i64>,
        new: &QuizCreate,
    ) -> Result<QuizDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes (course_id, book_id, title, description, is_published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(course_id)
        .bind(book_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.is_published)
        .fetch_one(&mut *tx)
        .await?;

        insert_questions(&mut tx, quiz.id, &new.questions).await?;
        tx.commit().await?;

        self.get_quiz(quiz.id).await
    }

    pub async fn update_quiz(&self, id: i64, patch: &QuizUpdate) -> Result<QuizDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            UPDATE quizzes
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                is_published = COALESCE($4, is_published),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.is_published)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("quiz"))?;

        if let Some(questions) = &patch.questions {
            // Whole-tree replacement; answers go with their questions.
            sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_questions(&mut tx, updated.id, questions).await?;
        }

        tx.commit().await?;
        self.get_quiz(id).await
    }

    pub async fn delete_quiz(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("quiz"));
        }
        Ok(())
    }
}

async fn insert_questions(
    tx: &mut Transaction<'_, Postgres>,
    quiz_id: i64,
    questions: &[QuestionCreate],
) -> Result<(), AppError> {
    for question in questions {
        let (question_id,): (i64,) = sqlx::query_as(
            "INSERT INTO quiz_questions (quiz_id, prompt, explanation, position) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(quiz_id)
        .bind(&question.prompt)
        .bind(&question.explanation)
        .bind(question.position)
        .fetch_one(&mut **tx)
        .await?;

        for answer in &question.answers {
            sqlx::query(
                "INSERT INTO quiz_answers (question_id, text, is_correct, position) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(question_id)
            .bind(&answer.text)
            .bind(answer.is_correct)
            .bind(answer.position)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}
