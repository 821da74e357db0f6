//! HTTP surface: maps browser requests onto sessions.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::render;
use crate::session::Session;
use crate::store::SessionStore;

pub const COOKIE_NAME: &str = "session";

const EXPIRED_COOKIE: &str = "session=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT";

const INPUT_PAGE: &str = "/send_input";
const LANDING_PAGE: &str = "/";

#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub templates: Arc<PathBuf>,
}

impl AppState {
    pub fn new(store: SessionStore, templates: PathBuf) -> Self {
        Self {
            store,
            templates: Arc::new(templates),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/index", get(index).fallback(not_found))
        .route("/chat", get(chat).fallback(not_found))
        .route("/send_input", get(send_input).fallback(not_found))
        .route("/send", post(send).fallback(not_found))
        .route("/disconnect", get(disconnect).post(disconnect).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

/// Session token carried by the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("session="))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .last()
        .map(str::to_string)
}

fn session_cookie(session: &Session) -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("{COOKIE_NAME}={}; Path=/", session.token()),
    )]
}

fn resolve(state: &AppState, headers: &HeaderMap) -> Arc<Session> {
    state.store.resolve(session_token(headers).as_deref())
}

async fn static_page(
    state: &AppState,
    headers: &HeaderMap,
    name: &str,
) -> Result<Response, GatewayError> {
    let path = state.templates.join(name);
    let page = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| GatewayError::TemplateMissing(path.display().to_string()))?;

    let session = resolve(state, headers);

    Ok((session_cookie(&session), Html(page)).into_response())
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    static_page(&state, &headers, "index.html").await
}

async fn send_input(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    static_page(&state, &headers, "send_input.html").await
}

async fn chat(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = resolve(&state, &headers);
    session.touch();

    tracing::trace!(
        session = %session.short_token(),
        lines = session.line_count(),
        connected = session.is_connected(),
        "chat view"
    );

    let page = render::chat_page(&session.recent(render::VIEW_LINES));

    (session_cookie(&session), Html(page)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct SendForm {
    #[serde(default)]
    msg: String,
}

async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<SendForm>, FormRejection>,
) -> Response {
    let session = resolve(&state, &headers);

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(
                session = %session.short_token(),
                error = %rejection,
                "unreadable send form"
            );
            SendForm::default()
        }
    };

    let msg = form.msg.trim();

    if !msg.is_empty() {
        if let Some(connection) = session.connection() {
            if let Err(err) = connection.send_line(msg).await {
                tracing::warn!(session = %session.short_token(), error = %err, "send failed");
            }
        }
    }

    (session_cookie(&session), Redirect::to(INPUT_PAGE)).into_response()
}

async fn disconnect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session) = session_token(&headers).and_then(|token| state.store.remove(&token)) {
        session.close().await;
    }

    (
        [(header::SET_COOKIE, HeaderValue::from_static(EXPIRED_COOKIE))],
        Redirect::to(LANDING_PAGE),
    )
        .into_response()
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound
}
