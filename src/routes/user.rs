use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{SecondsFormat, Utc};
use log::error;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{issue_token, OptionalAuthUser};
use crate::config::AppConfig;
use crate::entity::user;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register/").route(web::post().to(register)))
        .service(web::resource("/login/").route(web::post().to(login)))
        .service(web::resource("/current/").route(web::post().to(current)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    username: String,
    user_id: i32,
    role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: i32,
    username: String,
    email: String,
    display_name: Option<String>,
    role: Option<String>,
    created: Option<String>,
    updated: Option<String>,
}

async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let username = payload.username.clone().unwrap_or_default().trim().to_string();
    let email = payload.email.clone().unwrap_or_default().trim().to_string();
    let password = payload.password.clone().unwrap_or_default();
    if username.is_empty() {
        return Err(AppError::param_error("username cannot be empty"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::param_error("a valid email is required"));
    }
    if password.trim().is_empty() {
        return Err(AppError::param_error("password cannot be empty"));
    }

    let password_hash = hash(password, 10).map_err(|_| AppError::system_exception())?;
    let now = Utc::now();
    let model = user::ActiveModel {
        username: Set(username.clone()),
        password_hash: Set(password_hash),
        email: Set(email),
        display_name: Set(Some(username.clone())),
        created: Set(Some(now)),
        updated: Set(Some(now)),
        ..Default::default()
    };

    let created = match model.insert(db.get_ref()).await {
        Ok(created) => created,
        Err(err) => {
            let msg = err.to_string();
            if msg.contains("UNIQUE") || msg.contains("Duplicate") {
                if msg.contains(".email") {
                    return Err(AppError::fail("email already registered"));
                }
                return Err(AppError::fail("username already taken"));
            }
            error!("user insert failed: {}", err);
            return Err(AppError::system_exception());
        }
    };

    // signing up logs the new user in
    let token = issue_token(&config, created.id)?;
    let response = LoginResponse {
        token,
        username,
        user_id: created.id,
        role: created.role,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let username = payload.username.clone().unwrap_or_default();
    let password = payload.password.clone().unwrap_or_default();
    if username.trim().is_empty() {
        return Err(AppError::param_error("username cannot be empty"));
    }
    if password.trim().is_empty() {
        return Err(AppError::param_error("password cannot be empty"));
    }

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(username.clone()))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("unknown user"))?;

    let ok = verify(password, &user.password_hash).map_err(|_| AppError::system_exception())?;
    if !ok {
        return Err(AppError::fail("wrong password"));
    }

    let token = issue_token(&config, user.id)?;
    let response = LoginResponse {
        token,
        username,
        user_id: user.id,
        role: user.role,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn current(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    let user = match auth.0 {
        Some(auth) => user::Entity::find_by_id(auth.user_id)
            .one(db.get_ref())
            .await
            .map_err(|e| {
                error!("current user lookup failed: {}", e);
                AppError::system_exception()
            })?,
        None => None,
    };

    let dto = user.map(to_user_dto);
    Ok(HttpResponse::Ok().json(ResponseDto::success(dto)))
}

fn to_user_dto(model: user::Model) -> UserDto {
    UserDto {
        id: model.id,
        username: model.username,
        email: model.email,
        display_name: model.display_name,
        role: model.role,
        created: model.created.map(to_rfc3339),
        updated: model.updated.map(to_rfc3339),
    }
}

fn to_rfc3339(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
