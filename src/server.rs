use actix_web::cookie::{Cookie, SameSite};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware::Logger, web};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::{Event, run_cycle};
use crate::page;
use crate::service::QaService;
use crate::session::SessionStore;

const SESSION_COOKIE: &str = "qa_session";

pub struct AppState {
    pub service: Arc<QaService>,
    pub sessions: SessionStore,
}

#[derive(Deserialize)]
pub struct KeyForm {
    #[serde(default)]
    api_key: String,
}

#[derive(Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    question: String,
}

fn session_id(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

async fn respond(state: &AppState, req: &HttpRequest, event: Event) -> HttpResponse {
    let (id, mut session) = state.sessions.load(session_id(req));
    let view = run_cycle(&state.service, &mut session, event).await;
    state.sessions.save(id, session);

    let cookie = Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish();

    HttpResponse::Ok()
        .cookie(cookie)
        .content_type("text/html; charset=utf-8")
        .body(page::render(&view))
}

pub async fn index(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    respond(&state, &req, Event::Load).await
}

pub async fn submit_key(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<KeyForm>,
) -> HttpResponse {
    let form = form.into_inner();
    respond(&state, &req, Event::SetKey(form.api_key)).await
}

pub async fn submit_question(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<QuestionForm>,
) -> HttpResponse {
    let form = form.into_inner();
    respond(&state, &req, Event::Ask(form.question)).await
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "filing-qa"
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/key", web::post().to(submit_key))
        .route("/ask", web::post().to(submit_question))
        .route("/health", web::get().to(health));
}

pub async fn run(service: Arc<QaService>, host: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(AppState {
        service,
        sessions: SessionStore::new(),
    });

    tracing::info!("🚀 Serving Q&A page on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
