use actix_web::{web, HttpResponse};
use tracing::info;

use crate::content::models::{
    BookCreate, BookUpdate, CourseCreate, CourseUpdate, QuizCreate, QuizUpdate,
};
use crate::error::AppError;
use crate::telegram::TelegramAuthData;
use crate::AppState;

// ---- public reads ----

pub async fn list_courses(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.list_courses().await?))
}

pub async fn get_course(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.get_course(path.into_inner()).await?))
}

pub async fn list_course_quizzes(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.list_course_quizzes(path.into_inner()).await?))
}

pub async fn list_books(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.list_books().await?))
}

pub async fn get_book(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.get_book(path.into_inner()).await?))
}

pub async fn get_quiz(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.content.get_quiz(path.into_inner()).await?))
}

// ---- admin mutations ----

pub async fn create_course(
    auth: TelegramAuthData,
    payload: web::Json<CourseCreate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let course = state.content.create_course(&payload).await?;
    info!(event = "course_created", course_id = course.id);
    Ok(HttpResponse::Created().json(course))
}

pub async fn update_course(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    payload: web::Json<CourseUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let course = state
        .content
        .update_course(path.into_inner(), &payload)
        .await?;
    Ok(HttpResponse::Ok().json(course))
}

pub async fn delete_course(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let id = path.into_inner();
    state.content.delete_course(id).await?;
    info!(event = "course_deleted", course_id = id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn create_book(
    auth: TelegramAuthData,
    payload: web::Json<BookCreate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let book = state.content.create_book(&payload).await?;
    info!(event = "book_created", book_id = book.id);
    Ok(HttpResponse::Created().json(book))
}

pub async fn update_book(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    payload: web::Json<BookUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let book = state.content.update_book(path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(book))
}

pub async fn delete_book(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let id = path.into_inner();
    state.content.delete_book(id).await?;
    info!(event = "book_deleted", book_id = id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn create_course_quiz(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    payload: web::Json<QuizCreate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let quiz = state
        .content
        .create_course_quiz(path.into_inner(), &payload)
        .await?;
    Ok(HttpResponse::Created().json(quiz))
}

pub async fn create_book_quiz(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    payload: web::Json<QuizCreate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let quiz = state
        .content
        .create_book_quiz(path.into_inner(), &payload)
        .await?;
    Ok(HttpResponse::Created().json(quiz))
}

pub async fn update_quiz(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    payload: web::Json<QuizUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let quiz = state.content.update_quiz(path.into_inner(), &payload).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

pub async fn delete_quiz(
    auth: TelegramAuthData,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.users.require_admin(&auth).await?;
    let id = path.into_inner();
    state.content.delete_quiz(id).await?;
    info!(event = "quiz_deleted", quiz_id = id);
    Ok(HttpResponse::NoContent().finish())
}
