mod error;
mod session;

use std::hash::Hasher;
use std::sync::Arc;
use askama::Template;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use axum_macros::FromRef;
use log::info;
use serde::Deserialize;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use crate::config::Config;
use crate::entities::{Entry, InsertResult};
use crate::error::JournalError;
use crate::forms::{EntryForm, FieldErrors, LoginForm, RegisterForm, BAD_CREDENTIALS, USERNAME_TAKEN};
use crate::guard::Identity;
use crate::journal::Journal;
use crate::storage::FileStorage;
use crate::tags::{normalize_tag, TagList};
pub use crate::web_ui::error::WebError;
use crate::web_ui::session::*;

const STYLE_CSS: &[u8] = include_bytes!("assets/style.css");

pub async fn serve(config: Config, journal: Journal<FileStorage>) -> anyhow::Result<()> {
    if let Some(seed) = &config.seed {
        match journal.ensure_user(&seed.username, &seed.password).await? {
            InsertResult::New(_) => info!("seed user {} created", seed.username),
            InsertResult::Existing(_) => info!("seed user {} already exists", seed.username),
        }
    }

    info!("initializing router...");
    let addr = config.server.addr();
    let app_state = AppState { config: Arc::new(config), journal };
    let router = app(app_state, MemoryStore::default());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", &addr);
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn app(app_state: AppState, session_store: MemoryStore) -> Router {
    let session_config = &app_state.config.session;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(session_config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(i64::from(session_config.idle_minutes))));

    Router::new()
        // styles
        .route("/static/style.css", get(get_style))

        // pages
        .route("/", get(index))
        .route("/tags/:tag", get(tagged))
        .route("/detail/:entry_id", get(detail))
        .route("/delete/:entry_id", get(delete))
        .route("/edit/:entry_id", get(edit_page).post(edit))
        .route("/new", get(new_page).post(new))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout_submit))
        .fallback(fallback)

        .with_state(app_state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub journal: Journal<FileStorage>,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
    where
        T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template. Error: {}", err),
            ).into_response(),
        }
    }
}

/// Data every page's header needs.
#[derive(Debug, Default)]
pub struct Layout {
    pub username: Option<String>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    async fn new(session: &Session, identity: Option<&Identity>) -> Result<Self, WebError> {
        Ok(Self {
            username: identity.map(|x| x.username.clone()),
            flashes: take_flashes(session).await?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TagView {
    pub name: String,
    pub url: String,
    pub bg_color: String,
    pub fg_color: String,
}

impl From<&str> for TagView {
    fn from(tag: &str) -> Self {
        let bg_color = get_bg_color(tag);
        let fg_color = get_fg_color(&bg_color).to_string();
        Self {
            name: tag.to_string(),
            url: format!("/tags/{}", urlencoding::encode(tag)),
            bg_color,
            fg_color,
        }
    }
}

fn tag_views(tags: &TagList) -> Vec<TagView> {
    tags.iter().map(TagView::from).collect()
}

#[derive(Debug, Clone)]
pub struct EntryView {
    pub entry_id: String,
    pub title: String,
    pub date: String,
    pub time_spent: String,
    pub learning: String,
    pub resources: String,
    pub tags: Vec<TagView>,
    pub detail_url: String,
    pub edit_url: String,
    pub delete_url: String,
}

impl From<Entry> for EntryView {
    fn from(entry: Entry) -> Self {
        let encoded_id = urlencoding::encode(&entry.entry_id).into_owned();
        Self {
            tags: tag_views(&entry.tags),
            date: entry.date.format("%B %d, %Y").to_string(),
            detail_url: format!("/detail/{}", encoded_id),
            edit_url: format!("/edit/{}", encoded_id),
            delete_url: format!("/delete/{}", encoded_id),
            entry_id: entry.entry_id,
            title: entry.title,
            time_spent: entry.time_spent,
            learning: entry.learning,
            resources: entry.resources,
        }
    }
}

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeTemplate {
    layout: Layout,
}

#[derive(Template)]
#[template(path = "journal.html")]
struct JournalTemplate {
    layout: Layout,
    heading: Option<String>,
    entries: Vec<EntryView>,
    tags: Vec<TagView>,
}

async fn index(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
) -> Result<Response, WebError> {
    let layout = Layout::new(&session, user.as_ref()).await?;
    let Some(identity) = user else {
        return Ok(HtmlTemplate(WelcomeTemplate { layout }).into_response());
    };
    let overview = journal.overview(&identity).await?;
    Ok(HtmlTemplate(JournalTemplate {
        layout,
        heading: None,
        entries: overview.entries.into_iter().map(EntryView::from).collect(),
        tags: tag_views(&overview.tags),
    }).into_response())
}

async fn tagged(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Path(tag): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let tag = normalize_tag(&tag);
    let entries = journal.entries_tagged(&identity, &tag).await;
    Ok(HtmlTemplate(JournalTemplate {
        layout: Layout::new(&session, Some(&identity)).await?,
        tags: vec![TagView::from(tag.as_str())],
        heading: Some(tag),
        entries: entries.into_iter().map(EntryView::from).collect(),
    }))
}

#[derive(Template)]
#[template(path = "detail.html")]
struct DetailTemplate {
    layout: Layout,
    entry: EntryView,
}

async fn detail(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Path(entry_id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let entry = journal.entry(&identity, &entry_id).await?;
    Ok(HtmlTemplate(DetailTemplate {
        layout: Layout::new(&session, Some(&identity)).await?,
        entry: entry.into(),
    }))
}

async fn delete(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Path(entry_id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let entry = journal.delete_entry(&identity, &entry_id).await?;
    flash(&session, FlashLevel::Success, format!("Journal Entry \"{}\" deleted.", entry.title)).await?;
    Ok(Redirect::to("/"))
}

#[derive(Template)]
#[template(path = "entry_form.html")]
struct EntryFormTemplate {
    layout: Layout,
    heading: String,
    action: String,
    form: EntryForm,
    errors: FieldErrors,
}

impl EntryFormTemplate {
    async fn new_entry(session: &Session, identity: &Identity, form: EntryForm, errors: FieldErrors) -> Result<Self, WebError> {
        Ok(Self {
            layout: Layout::new(session, Some(identity)).await?,
            heading: "New Entry".to_string(),
            action: "/new".to_string(),
            form,
            errors,
        })
    }

    async fn edit_entry(session: &Session, identity: &Identity, entry_id: &str, form: EntryForm, errors: FieldErrors) -> Result<Self, WebError> {
        Ok(Self {
            layout: Layout::new(session, Some(identity)).await?,
            heading: format!("Edit {}", entry_id),
            action: format!("/edit/{}", urlencoding::encode(entry_id)),
            form,
            errors,
        })
    }
}

async fn new_page(
    CurrentUser(identity): CurrentUser,
    session: Session,
) -> Result<impl IntoResponse, WebError> {
    let form = EntryForm {
        date: chrono::Local::now().date_naive().format(crate::forms::DATE_FORMAT).to_string(),
        ..Default::default()
    };
    Ok(HtmlTemplate(EntryFormTemplate::new_entry(&session, &identity, form, FieldErrors::default()).await?))
}

async fn new(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Form(form): Form<EntryForm>,
) -> Result<Response, WebError> {
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            let page = EntryFormTemplate::new_entry(&session, &identity, form, errors).await?;
            return Ok(HtmlTemplate(page).into_response());
        }
    };
    journal.create_entry(&identity, draft).await?;
    flash(&session, FlashLevel::Success, "Journal Entry added! Thanks!").await?;
    Ok(Redirect::to("/").into_response())
}

async fn edit_page(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Path(entry_id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let entry = journal.entry(&identity, &entry_id).await?;
    let form = EntryForm::from_entry(&entry);
    Ok(HtmlTemplate(EntryFormTemplate::edit_entry(&session, &identity, &entry_id, form, FieldErrors::default()).await?))
}

async fn edit(
    CurrentUser(identity): CurrentUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Path(entry_id): Path<String>,
    Form(form): Form<EntryForm>,
) -> Result<Response, WebError> {
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            journal.entry(&identity, &entry_id).await?;
            let page = EntryFormTemplate::edit_entry(&session, &identity, &entry_id, form, errors).await?;
            return Ok(HtmlTemplate(page).into_response());
        }
    };
    journal.edit_entry(&identity, &entry_id, draft).await?;
    flash(&session, FlashLevel::Success, "Journal Entry updated!").await?;
    Ok(Redirect::to("/").into_response())
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    layout: Layout,
    username: String,
    errors: FieldErrors,
}

async fn register_page(
    MaybeUser(user): MaybeUser,
    session: Session,
) -> Result<impl IntoResponse, WebError> {
    Ok(HtmlTemplate(RegisterTemplate {
        layout: Layout::new(&session, user.as_ref()).await?,
        username: String::new(),
        errors: FieldErrors::default(),
    }))
}

async fn register(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let username_taken = journal.username_exists(&form.username).await;
    let result = match form.validate(username_taken) {
        Ok(()) => journal.register(&form.username, &form.password).await.map_err(|e| match e {
            JournalError::UsernameTaken => {
                let mut errors = FieldErrors::default();
                errors.add("username", USERNAME_TAKEN);
                Ok(errors)
            }
            other => Err(other),
        }),
        Err(errors) => Err(Ok(errors)),
    };

    match result {
        Ok(identity) => {
            login(&session, &identity).await?;
            flash(&session, FlashLevel::Success, "yay, you registered").await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(Ok(errors)) => Ok(HtmlTemplate(RegisterTemplate {
            layout: Layout::new(&session, user.as_ref()).await?,
            username: form.username,
            errors,
        }).into_response()),
        Err(Err(e)) => Err(e.into()),
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    layout: Layout,
    username: String,
    next: String,
    errors: FieldErrors,
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

async fn login_page(
    MaybeUser(user): MaybeUser,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<impl IntoResponse, WebError> {
    Ok(HtmlTemplate(LoginTemplate {
        layout: Layout::new(&session, user.as_ref()).await?,
        username: String::new(),
        next: safe_next(query.next.as_deref()).to_string(),
        errors: FieldErrors::default(),
    }))
}

async fn login_submit(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(journal): State<Journal<FileStorage>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let next = safe_next(form.next.as_deref()).to_string();
    let errors = match form.validate() {
        Ok(()) => match journal.authenticate(&form.username, &form.password).await? {
            Some(identity) => {
                login(&session, &identity).await?;
                info!("{} logged in", identity.username);
                flash(&session, FlashLevel::Success, "you've been logged in!").await?;
                return Ok(Redirect::to(&next).into_response());
            }
            None => {
                flash(&session, FlashLevel::Error, BAD_CREDENTIALS).await?;
                FieldErrors::default()
            }
        },
        Err(errors) => errors,
    };
    Ok(HtmlTemplate(LoginTemplate {
        layout: Layout::new(&session, user.as_ref()).await?,
        username: form.username,
        next,
        errors,
    }).into_response())
}

async fn logout_submit(
    CurrentUser(identity): CurrentUser,
    session: Session,
) -> Result<impl IntoResponse, WebError> {
    logout(&session).await?;
    info!("{} logged out", identity.username);
    flash(&session, FlashLevel::Success, "you have been logged out. bye!").await?;
    Ok(Redirect::to("/"))
}

async fn fallback() -> Response {
    error::not_found()
}

async fn get_style() -> impl IntoResponse {
    let mut response = Response::new(Body::from(STYLE_CSS));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/css"));
    response
}

fn get_bg_color(text: &str) -> String {
    const MAX_VALUE: u64 = 0xFFFFFF;
    let mut hasher = twox_hash::XxHash64::default();
    hasher.write(text.as_bytes());
    let color = hasher.finish() % MAX_VALUE;
    format!("#{:06x}", color)
}

fn get_fg_color(bg_color: &str) -> &'static str {
    let rgb = u32::from_str_radix(bg_color.trim_start_matches('#'), 16).unwrap_or(0);
    let (r, g, b) = ((rgb >> 16) & 0xFF, (rgb >> 8) & 0xFF, rgb & 0xFF);
    let yiq = (r * 299 + g * 587 + b * 114) / 1000;
    if yiq >= 128 { "black" } else { "white" }
}
