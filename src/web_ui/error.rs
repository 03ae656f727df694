use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use log::error;
use crate::error::JournalError;
use crate::web_ui::Layout;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("request path not found")]
    NotFound,

    #[error("session store failed: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Journal(JournalError),
}

impl From<JournalError> for WebError {
    fn from(value: JournalError) -> Self {
        match value {
            JournalError::NotFound => WebError::NotFound,
            other => WebError::Journal(other),
        }
    }
}

#[derive(Template)]
#[template(path = "404.html")]
struct NotFoundTemplate {
    layout: Layout,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    layout: Layout,
}

fn render(status: StatusCode, template: impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => (status, format!("Failed to render template. Error: {}", err)).into_response(),
    }
}

pub fn not_found() -> Response {
    render(StatusCode::NOT_FOUND, NotFoundTemplate { layout: Layout::default() })
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => not_found(),
            Self::Session(ref e) => {
                error!("Session error: {:?}", e);
                render(StatusCode::INTERNAL_SERVER_ERROR, ErrorTemplate { layout: Layout::default() })
            }
            Self::Journal(ref e) => {
                error!("Journal error: {:?}", e);
                render(StatusCode::INTERNAL_SERVER_ERROR, ErrorTemplate { layout: Layout::default() })
            }
        }
    }
}
