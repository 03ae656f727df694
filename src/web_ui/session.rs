//! Session-backed login state and flash messages.

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use crate::entities::UserId;
use crate::guard::Identity;
use crate::journal::Journal;
use crate::storage::FileStorage;
use crate::web_ui::error::WebError;

pub const SESSION_USER_ID_KEY: &str = "user_id";
const FLASHES_KEY: &str = "_flashes";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashLevel {
    Info,
    Success,
    Error,
}

impl FlashLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Info => "flash-info",
            FlashLevel::Success => "flash-success",
            FlashLevel::Error => "flash-error",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

pub async fn flash(session: &Session, level: FlashLevel, message: impl Into<String>) -> Result<(), WebError> {
    let mut flashes: Vec<Flash> = session.get(FLASHES_KEY).await?.unwrap_or_default();
    flashes.push(Flash { level, message: message.into() });
    session.insert(FLASHES_KEY, flashes).await?;
    Ok(())
}

/// Drains queued messages; each one is shown exactly once.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, WebError> {
    Ok(session.remove::<Vec<Flash>>(FLASHES_KEY).await?.unwrap_or_default())
}

pub async fn login(session: &Session, identity: &Identity) -> Result<(), WebError> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_ID_KEY, identity.user_id).await?;
    Ok(())
}

/// Forgets the user but keeps the session, so the goodbye flash survives.
pub async fn logout(session: &Session) -> Result<(), WebError> {
    session.remove::<UserId>(SESSION_USER_ID_KEY).await?;
    session.cycle_id().await?;
    Ok(())
}

/// Only same-site paths are accepted as a post-login target.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => next,
        _ => "/",
    }
}

/// The logged-in user, if any.
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
    where
        S: Send + Sync,
        Journal<FileStorage>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await
            .map_err(|x| x.into_response())?;
        let user_id = session.get::<UserId>(SESSION_USER_ID_KEY).await
            .map_err(|x| WebError::from(x).into_response())?;
        let identity = match user_id {
            Some(user_id) => Journal::<FileStorage>::from_ref(state).load_identity(&user_id).await,
            None => None,
        };
        Ok(MaybeUser(identity))
    }
}

/// The logged-in user. Anonymous requests are sent to the login page.
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
    where
        S: Send + Sync,
        Journal<FileStorage>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(identity)) => Ok(CurrentUser(identity)),
            MaybeUser(None) => {
                let next = parts.uri.path_and_query().map(|x| x.as_str()).unwrap_or("/");
                let location = format!("/login?next={}", urlencoding::encode(next));
                Err(Redirect::to(&location).into_response())
            }
        }
    }
}
