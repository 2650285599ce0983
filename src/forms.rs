use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::db::query_count;
use crate::error::AppError;
use crate::slug::slugify;

pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Raw submission body for the create and edit forms.
#[derive(Clone, Debug, Deserialize)]
pub struct ResourceFormData {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// Form state echoed back to the presentation layer: current values plus
/// per-field error messages.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormContext {
    pub title: String,
    pub link: String,
    pub description: String,
    pub errors: FieldErrors,
}

impl FormContext {
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            link: String::new(),
            description: String::new(),
            errors: FieldErrors::new(),
        }
    }

    pub fn with_values(title: &str, link: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            link: link.to_string(),
            description: description.to_string(),
            errors: FieldErrors::new(),
        }
    }

    pub fn rejected(data: &ResourceFormData, errors: FieldErrors) -> Self {
        Self {
            title: data.title.clone(),
            link: data.link.clone(),
            description: data.description.clone(),
            errors,
        }
    }
}

/// Validated draft ready to be stamped with an owner and persisted.
pub struct ResourceDraft {
    pub title: String,
    pub slug: String,
    pub link: String,
    pub description: String,
}

pub enum Validation {
    Valid(ResourceDraft),
    Invalid(FieldErrors),
}

/// Field-level validation. `exclude_id` skips the record under edit in the
/// title uniqueness check. The check is advisory; the unique indexes close
/// the race between concurrent submissions.
pub async fn validate<C: ConnectionTrait>(
    db: &C,
    data: &ResourceFormData,
    exclude_id: Option<i32>,
) -> Result<Validation, AppError> {
    let mut errors = FieldErrors::new();

    let title = data.title.trim().to_string();
    let link = data.link.trim().to_string();
    let description = data.description.trim().to_string();

    if title.is_empty() {
        push_error(&mut errors, "title", "this field is required");
    } else if slugify(&title).is_empty() {
        push_error(&mut errors, "title", "title must contain a letter or digit");
    } else if title_taken(db, &title, exclude_id).await? {
        push_error(&mut errors, "title", "a resource with this title already exists");
    }

    if link.is_empty() {
        push_error(&mut errors, "link", "this field is required");
    } else if !is_valid_link(&link) {
        push_error(&mut errors, "link", "enter a valid URL");
    }

    if description.is_empty() {
        push_error(&mut errors, "description", "this field is required");
    }

    if !errors.is_empty() {
        return Ok(Validation::Invalid(errors));
    }

    let slug = slugify(&title);
    Ok(Validation::Valid(ResourceDraft {
        title,
        slug,
        link,
        description,
    }))
}

/// Map a storage-layer unique violation (a duplicate that raced past the
/// form check) back onto the offending field. The slug index traces back to
/// the title, since the slug is derived from it.
pub fn unique_violation_errors(err: &sea_orm::DbErr) -> Option<FieldErrors> {
    let msg = err.to_string();
    if !msg.contains("UNIQUE") && !msg.contains("Duplicate") {
        return None;
    }
    let mut errors = FieldErrors::new();
    if msg.contains(".link") {
        push_error(&mut errors, "link", "a resource with this link already exists");
    } else {
        push_error(&mut errors, "title", "a resource with this title already exists");
    }
    Some(errors)
}

fn push_error(errors: &mut FieldErrors, field: &'static str, msg: &str) {
    errors.entry(field).or_default().push(msg.to_string());
}

async fn title_taken<C: ConnectionTrait>(
    db: &C,
    title: &str,
    exclude_id: Option<i32>,
) -> Result<bool, AppError> {
    let count = match exclude_id {
        Some(id) => {
            query_count(
                db,
                "select count(1) as cnt from t_resource where title = ? collate nocase and id <> ?",
                vec![title.into(), id.into()],
            )
            .await?
        }
        None => {
            query_count(
                db,
                "select count(1) as cnt from t_resource where title = ? collate nocase",
                vec![title.into()],
            )
            .await?
        }
    };
    Ok(count > 0)
}

fn is_valid_link(link: &str) -> bool {
    match Url::parse(link) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https" | "ftp" | "ftps") && url.has_host()
        }
        Err(_) => false,
    }
}
