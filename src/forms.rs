//! Submitted form bodies and their validation rules.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use crate::entities::{Entry, EntryDraft};
use crate::tags::TagList;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const REQUIRED: &str = "This field is required.";
const INVALID_DATE: &str = "Not a valid date value.";
const INVALID_USERNAME: &str = "Username should be one word, letters, numbers, and underscores only.";
const PASSWORD_TOO_SHORT: &str = "Field must be at least 2 characters long.";
const PASSWORDS_DIFFER: &str = "Passwords must match";
pub const USERNAME_TAKEN: &str = "User with that name already exists.";
pub const BAD_CREDENTIALS: &str = "Your username or password doesn't match!";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// Validation messages keyed by form field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    errors: HashMap<Cow<'static, str>, Vec<Cow<'static, str>>>,
}

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) {
        self.errors
            .entry(field.into())
            .or_insert_with(Vec::new)
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<String> {
        self.errors.get(field)
            .map(|x| x.iter().map(|m| m.to_string()).collect())
            .unwrap_or_default()
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    }
}

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.trim().is_empty() {
        return Err(REQUIRED);
    }
    if !USERNAME_RE.is_match(username) {
        return Err(INVALID_USERNAME);
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EntryForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time_spent: String,
    #[serde(default)]
    pub learning: String,
    #[serde(default)]
    pub resources: String,
}

impl EntryForm {
    /// Prefills the edit form. Tags come back in their `"#a #b "` form.
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            title: entry.title.clone(),
            tags: entry.tags.to_string(),
            date: entry.date.format(DATE_FORMAT).to_string(),
            time_spent: entry.time_spent.clone(),
            learning: entry.learning.clone(),
            resources: entry.resources.clone(),
        }
    }

    pub fn validate(&self) -> Result<EntryDraft, FieldErrors> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "title", &self.title);
        require(&mut errors, "time_spent", &self.time_spent);
        require(&mut errors, "learning", &self.learning);
        require(&mut errors, "resources", &self.resources);

        let date = if self.date.trim().is_empty() {
            errors.add("date", REQUIRED);
            None
        } else {
            let parsed = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok();
            if parsed.is_none() {
                errors.add("date", INVALID_DATE);
            }
            parsed
        };

        match date {
            Some(date) if errors.is_empty() => Ok(EntryDraft {
                title: self.title.trim().to_string(),
                tags: TagList::parse(&self.tags),
                date,
                time_spent: self.time_spent.clone(),
                learning: self.learning.clone(),
                resources: self.resources.clone(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    pub fn validate(&self, username_taken: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        match validate_username(&self.username) {
            Err(message) => errors.add("username", message),
            Ok(()) if username_taken => errors.add("username", USERNAME_TAKEN),
            Ok(()) => {}
        }

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else {
            if self.password.chars().count() < 2 {
                errors.add("password", PASSWORD_TOO_SHORT);
            }
            if self.password != self.password2 {
                errors.add("password", PASSWORDS_DIFFER);
            }
        }
        require(&mut errors, "password2", &self.password2);
        errors.into_result(())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if let Err(message) = validate_username(&self.username) {
            errors.add("username", message);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_form() -> EntryForm {
        EntryForm {
            title: "  Day 1 ".to_string(),
            tags: "#rust learning #rust #async".to_string(),
            date: "2024-03-15".to_string(),
            time_spent: "2 hours".to_string(),
            learning: "borrowck".to_string(),
            resources: "the book".to_string(),
        }
    }

    fn register_form(username: &str, password: &str, password2: &str) -> RegisterForm {
        RegisterForm { username: username.to_string(), password: password.to_string(), password2: password2.to_string() }
    }

    #[test]
    fn test_valid_entry_form() {
        let draft = entry_form().validate().unwrap();
        assert_eq!(draft.title, "Day 1");
        assert_eq!(draft.tags.to_string(), "#rust #async ");
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_entry_form_without_tags_is_valid() {
        let form = EntryForm { tags: "".to_string(), ..entry_form() };
        assert!(form.validate().unwrap().tags.is_empty());
    }

    #[test]
    fn test_entry_form_required_fields() {
        let errors = EntryForm::default().validate().unwrap_err();
        for field in ["title", "date", "time_spent", "learning", "resources"] {
            assert_eq!(errors.for_field(field), vec![REQUIRED.to_string()], "{}", field);
        }
        assert!(errors.for_field("tags").is_empty());
    }

    #[test]
    fn test_entry_form_blank_title() {
        let form = EntryForm { title: "   ".to_string(), ..entry_form() };
        assert_eq!(form.validate().unwrap_err().for_field("title"), vec![REQUIRED.to_string()]);
    }

    #[test]
    fn test_entry_form_bad_date() {
        let form = EntryForm { date: "15/03/2024".to_string(), ..entry_form() };
        assert_eq!(form.validate().unwrap_err().for_field("date"), vec![INVALID_DATE.to_string()]);
    }

    #[test]
    fn test_register_form_rules() {
        assert!(register_form("josh", "123", "123").validate(false).is_ok());

        let errors = register_form("two words", "1", "2").validate(false).unwrap_err();
        assert_eq!(errors.for_field("username"), vec![INVALID_USERNAME.to_string()]);
        assert_eq!(errors.for_field("password"), vec![PASSWORD_TOO_SHORT.to_string(), PASSWORDS_DIFFER.to_string()]);

        let errors = register_form("josh", "123", "123").validate(true).unwrap_err();
        assert_eq!(errors.for_field("username"), vec![USERNAME_TAKEN.to_string()]);

        let errors = register_form("", "", "").validate(false).unwrap_err();
        assert_eq!(errors.for_field("username"), vec![REQUIRED.to_string()]);
        assert_eq!(errors.for_field("password"), vec![REQUIRED.to_string()]);
        assert_eq!(errors.for_field("password2"), vec![REQUIRED.to_string()]);
    }

    #[test]
    fn test_login_form_rules() {
        let form = LoginForm { username: "josh".to_string(), password: "123".to_string(), next: None };
        assert!(form.validate().is_ok());
        let errors = LoginForm { username: "jo-sh".to_string(), ..Default::default() }.validate().unwrap_err();
        assert_eq!(errors.for_field("username"), vec![INVALID_USERNAME.to_string()]);
        assert_eq!(errors.for_field("password"), vec![REQUIRED.to_string()]);
    }

    #[test]
    fn test_edit_form_prefill() {
        let draft = entry_form().validate().unwrap();
        let entry = Entry::new(uuid::Uuid::new_v4(), "Day 1".to_string(), draft);
        let form = EntryForm::from_entry(&entry);
        assert_eq!(form.tags, "#rust #async ");
        assert_eq!(form.date, "2024-03-15");
        assert_eq!(form.validate().unwrap().tags, entry.tags);
    }
}
