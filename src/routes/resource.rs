use actix_web::{http::header, web, HttpRequest, HttpResponse};
use chrono::{SecondsFormat, Utc};
use log::error;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::db::query_count;
use crate::entity::{resource, user};
use crate::error::AppError;
use crate::flash::{self, Notice};
use crate::forms::{self, FormContext, ResourceFormData, Validation};
use crate::response::ResponseDto;

const PAGE_SIZE: i64 = 6;

pub fn root_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    );
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{slug}/edit/")
            .route(web::get().to(edit_form))
            .route(web::post().to(edit_submit)),
    )
    .service(web::resource("/{slug}/delete/").route(web::post().to(remove)))
    .service(web::resource("/{slug}/approve/").route(web::post().to(approve)));
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDto {
    id: i32,
    title: String,
    slug: String,
    link: String,
    description: String,
    user_id: i32,
    owner: Option<String>,
    created: String,
    updated: String,
    approved: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListContext {
    resources: Vec<ResourceDto>,
    page: i64,
    total_pages: i64,
    has_previous: bool,
    has_next: bool,
    total_count: i64,
    contributor_count: i64,
    resource_form: FormContext,
    notice: Option<Notice>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditContext {
    resource: ResourceDto,
    resource_form: FormContext,
}

async fn list(
    db: web::Data<DatabaseConnection>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let notice = flash::take(&req);
    let context = list_context(
        db.get_ref(),
        query.page.unwrap_or(1),
        FormContext::empty(),
        notice,
    )
    .await?;

    let mut builder = HttpResponse::Ok();
    if context.notice.is_some() {
        builder.cookie(flash::removal_cookie());
    }
    Ok(builder.json(ResponseDto::success(Some(context))))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: web::Form<ResourceFormData>,
) -> Result<HttpResponse, AppError> {
    let auth = match auth.0 {
        Some(auth) => auth,
        None => {
            return Ok(see_other(Notice::error(
                "you must be logged in to submit a resource",
            )));
        }
    };

    let draft = match forms::validate(db.get_ref(), &payload, None).await? {
        Validation::Valid(draft) => draft,
        Validation::Invalid(errors) => return rerender_list(db.get_ref(), &payload, errors).await,
    };

    let now = Utc::now();
    let model = resource::ActiveModel {
        title: Set(draft.title),
        slug: Set(draft.slug),
        link: Set(draft.link),
        description: Set(draft.description),
        user_id: Set(auth.user_id),
        created: Set(now),
        updated: Set(now),
        approved: Set(false),
        ..Default::default()
    };

    match model.insert(db.get_ref()).await {
        Ok(_) => Ok(see_other(Notice::success(
            "resource submitted and awaiting approval",
        ))),
        Err(err) => match forms::unique_violation_errors(&err) {
            Some(errors) => rerender_list(db.get_ref(), &payload, errors).await,
            None => {
                error!("resource insert failed: {}", err);
                Err(AppError::system_exception())
            }
        },
    }
}

async fn edit_form(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let item = find_by_slug(db.get_ref(), &path).await?;
    if authorize_owner(&auth, &item).is_none() {
        return Ok(see_other(Notice::error(
            "you may only edit your own resources",
        )));
    }

    let form = FormContext::with_values(&item.title, &item.link, &item.description);
    let context = EditContext {
        resource: to_dto(db.get_ref(), item).await?,
        resource_form: form,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(context))))
}

async fn edit_submit(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
    payload: web::Form<ResourceFormData>,
) -> Result<HttpResponse, AppError> {
    let item = find_by_slug(db.get_ref(), &path).await?;
    let auth = match authorize_owner(&auth, &item) {
        Some(auth) => auth,
        None => {
            return Ok(see_other(Notice::error(
                "you may only edit your own resources",
            )));
        }
    };

    let draft = match forms::validate(db.get_ref(), &payload, Some(item.id)).await? {
        Validation::Valid(draft) => draft,
        Validation::Invalid(errors) => return rerender_edit(db.get_ref(), item, &payload, errors).await,
    };

    // ownership was verified above, so re-stamping the owner is a no-op;
    // created and approved are left untouched
    let active = resource::ActiveModel {
        id: Set(item.id),
        title: Set(draft.title),
        slug: Set(draft.slug),
        link: Set(draft.link),
        description: Set(draft.description),
        user_id: Set(auth.user_id),
        updated: Set(Utc::now()),
        ..Default::default()
    };

    match resource::Entity::update(active).exec(db.get_ref()).await {
        Ok(_) => Ok(see_other(Notice::success("resource updated"))),
        Err(err) => match forms::unique_violation_errors(&err) {
            Some(errors) => rerender_edit(db.get_ref(), item, &payload, errors).await,
            None => {
                error!("resource update failed: {}", err);
                Err(AppError::system_exception())
            }
        },
    }
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let item = find_by_slug(db.get_ref(), &path).await?;
    if authorize_owner(&auth, &item).is_none() {
        return Ok(see_other(Notice::error(
            "you may only delete your own resources",
        )));
    }

    resource::Entity::delete_by_id(item.id)
        .exec(db.get_ref())
        .await
        .map_err(|e| {
            error!("resource delete failed: {}", e);
            AppError::system_exception()
        })?;

    Ok(see_other(Notice::success("resource deleted")))
}

/// Administrative approval, the only code path that makes a resource
/// publicly visible.
async fn approve(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    if !auth.is_admin() {
        return Err(AppError::fail("administrator role required"));
    }

    let item = find_by_slug(db.get_ref(), &path).await?;
    let active = resource::ActiveModel {
        id: Set(item.id),
        approved: Set(true),
        updated: Set(Utc::now()),
        ..Default::default()
    };
    resource::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(|e| {
            error!("resource approve failed: {}", e);
            AppError::system_exception()
        })?;

    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

/// The single ownership predicate shared by edit and delete.
fn owns(item: &resource::Model, requester: &AuthUser) -> bool {
    item.user_id == requester.user_id
}

fn authorize_owner(auth: &OptionalAuthUser, item: &resource::Model) -> Option<AuthUser> {
    match &auth.0 {
        Some(requester) if owns(item, requester) => Some(requester.clone()),
        _ => None,
    }
}

fn see_other(notice: Notice) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(notice.into_cookie())
        .finish()
}

async fn find_by_slug(db: &DatabaseConnection, slug: &str) -> Result<resource::Model, AppError> {
    resource::Entity::find()
        .filter(resource::Column::Slug.eq(slug))
        .one(db)
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(AppError::not_found)
}

async fn rerender_list(
    db: &DatabaseConnection,
    payload: &ResourceFormData,
    errors: forms::FieldErrors,
) -> Result<HttpResponse, AppError> {
    let context = list_context(db, 1, FormContext::rejected(payload, errors), None).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(context))))
}

async fn rerender_edit(
    db: &DatabaseConnection,
    item: resource::Model,
    payload: &ResourceFormData,
    errors: forms::FieldErrors,
) -> Result<HttpResponse, AppError> {
    let context = EditContext {
        resource: to_dto(db, item).await?,
        resource_form: FormContext::rejected(payload, errors),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(context))))
}

async fn list_context(
    db: &DatabaseConnection,
    requested_page: i64,
    resource_form: FormContext,
    notice: Option<Notice>,
) -> Result<ListContext, AppError> {
    let total_count = query_count(
        db,
        "select count(1) as cnt from t_resource where approved = 1",
        vec![],
    )
    .await?;
    let contributor_count = query_count(
        db,
        "select count(distinct user_id) as cnt from t_resource where approved = 1",
        vec![],
    )
    .await?;

    let total_pages = if total_count == 0 {
        1
    } else {
        (total_count + PAGE_SIZE - 1) / PAGE_SIZE
    };
    // out-of-range requests clamp to the valid range instead of failing
    let page = requested_page.clamp(1, total_pages);

    let items = resource::Entity::find()
        .filter(resource::Column::Approved.eq(true))
        .order_by_desc(resource::Column::Created)
        .offset(((page - 1) * PAGE_SIZE) as u64)
        .limit(PAGE_SIZE as u64)
        .all(db)
        .await
        .map_err(|_| AppError::system_exception())?;

    let owners = owner_names(db, &items).await?;
    let resources = items
        .into_iter()
        .map(|item| {
            let owner = owners.get(&item.user_id).cloned();
            dto_with_owner(item, owner)
        })
        .collect();

    Ok(ListContext {
        resources,
        page,
        total_pages,
        has_previous: page > 1,
        has_next: page < total_pages,
        total_count,
        contributor_count,
        resource_form,
        notice,
    })
}

async fn owner_names(
    db: &DatabaseConnection,
    items: &[resource::Model],
) -> Result<HashMap<i32, String>, AppError> {
    let ids: Vec<i32> = items.iter().map(|r| r.user_id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
}

async fn to_dto(db: &DatabaseConnection, item: resource::Model) -> Result<ResourceDto, AppError> {
    let owner = user::Entity::find_by_id(item.user_id)
        .one(db)
        .await
        .map_err(|_| AppError::system_exception())?
        .map(|u| u.username);
    Ok(dto_with_owner(item, owner))
}

fn dto_with_owner(item: resource::Model, owner: Option<String>) -> ResourceDto {
    ResourceDto {
        id: item.id,
        title: item.title,
        slug: item.slug,
        link: item.link,
        description: item.description,
        user_id: item.user_id,
        owner,
        created: to_rfc3339(item.created),
        updated: to_rfc3339(item.updated),
        approved: item.approved,
    }
}

fn to_rfc3339(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
