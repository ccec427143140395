use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use quadrant_server::middleware::{
    BodyLimit, GlobalRateLimit, ScopedRateLimit, TelegramAuth, INIT_DATA_HEADER,
};
use quadrant_server::{auth, content, users, AppError, AppState, Settings};
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Rate-limit windows are one minute across all scopes; the per-scope
/// budgets come from config.
const WINDOW_SECONDS: u64 = 60;

#[actix_web::main]
async fn main() -> quadrant_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    // Load configuration; a placeholder or undersized signing secret
    // aborts startup here.
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!(
        "Starting server at {}:{}",
        config.server.host, config.server.port
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Reclaim rate-limit counters whose windows have lapsed.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        loop {
            sweep_state.counter_store.sweep().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    let shutdown_state = state.clone();

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if config.cors.enabled {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Content-Type", INIT_DATA_HEADER])
                .supports_credentials()
                .max_age(3600);
            for origin in state.config.allowed_origins() {
                cors = cors.allowed_origin(&origin);
            }
            cors
        } else {
            Cors::default()
        };

        let auth_scope = web::scope("/auth")
            .wrap(ScopedRateLimit::new(
                "auth",
                state.limiter.clone(),
                state.identity.clone(),
                config.limits.auth_per_minute,
                WINDOW_SECONDS,
            ))
            .route("/telegram/miniapp", web::post().to(auth::handlers::login))
            .route("/refresh", web::post().to(auth::handlers::refresh));

        // Header-authenticated routes: the scope middleware verifies the
        // init-data header, the usage route adds its user-keyed limiter.
        let users_scope = web::scope("/users")
            .wrap(TelegramAuth::new(state.verifier.clone()))
            .route("/me", web::get().to(users::handlers::get_me))
            .service(
                web::resource("/me/usage")
                    .wrap(
                        ScopedRateLimit::new(
                            "usage",
                            state.limiter.clone(),
                            state.identity.clone(),
                            config.limits.usage_per_minute,
                            WINDOW_SECONDS,
                        )
                        .user_aware(),
                    )
                    .route(web::post().to(users::handlers::report_usage)),
            );

        let content_admin = web::scope("/admin")
            .wrap(
                ScopedRateLimit::new(
                    "admin",
                    state.limiter.clone(),
                    state.identity.clone(),
                    config.limits.admin_per_minute,
                    WINDOW_SECONDS,
                )
                .user_aware(),
            )
            .wrap(TelegramAuth::new(state.verifier.clone()))
            .route("/courses", web::post().to(content::handlers::create_course))
            .route("/courses/{id}", web::put().to(content::handlers::update_course))
            .route("/courses/{id}", web::delete().to(content::handlers::delete_course))
            .route(
                "/courses/{id}/quizzes",
                web::post().to(content::handlers::create_course_quiz),
            )
            .route("/books", web::post().to(content::handlers::create_book))
            .route("/books/{id}", web::put().to(content::handlers::update_book))
            .route("/books/{id}", web::delete().to(content::handlers::delete_book))
            .route(
                "/books/{id}/quizzes",
                web::post().to(content::handlers::create_book_quiz),
            )
            .route("/quizzes/{id}", web::put().to(content::handlers::update_quiz))
            .route("/quizzes/{id}", web::delete().to(content::handlers::delete_quiz));

        let content_scope = web::scope("/content")
            .service(content_admin)
            .route("/courses", web::get().to(content::handlers::list_courses))
            .route("/courses/{id}", web::get().to(content::handlers::get_course))
            .route(
                "/courses/{id}/quizzes",
                web::get().to(content::handlers::list_course_quizzes),
            )
            .route("/books", web::get().to(content::handlers::list_books))
            .route("/books/{id}", web::get().to(content::handlers::get_book))
            .route("/quizzes/{id}", web::get().to(content::handlers::get_quiz));

        let api = web::scope(config.server.api_prefix.trim_end_matches('/'))
            .route("/health/live", web::get().to(quadrant_server::health_check))
            .route("/health/ready", web::get().to(quadrant_server::health_ready))
            .service(auth_scope)
            .service(users_scope)
            .service(content_scope);

        // Guard middlewares run outermost-first: CORS, then the global
        // rate cap, then the body-size cap, then routing.
        App::new()
            .app_data(state.clone())
            .wrap(BodyLimit::new(config.limits.max_body_bytes))
            .wrap(GlobalRateLimit::new(
                state.limiter.clone(),
                state.identity.clone(),
                config.limits.global_per_minute,
                WINDOW_SECONDS,
            ))
            .wrap(cors)
            .route("/healthz", web::get().to(quadrant_server::health_check))
            .service(api)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    info!("Server stopped, releasing shared resources");
    shutdown_state.shutdown().await?;

    Ok(())
}
