//! HTML panel handlers

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use owpanel_core::SubmittedForm;
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

/// Full page wrapping the panel fragment
#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    panel: &'a str,
}

fn page(panel: &str) -> Response {
    match (PageTemplate { panel }).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

/// `GET /` - open the panel and load new devices from the hub
pub async fn open(State(state): State<Arc<AppState>>) -> Response {
    let panel = state.open_panel().await;
    page(&panel)
}

/// `GET /panel` - current panel fragment
pub async fn fragment(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.view.html())
}

/// `POST /register` - register the rows with the selected types
pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let panel = state.register(SubmittedForm::from_fields(fields)).await;
    page(&panel)
}
