use actix_web::{error::UrlencodedError, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub data: Option<T>,
    pub code: i32,
    pub msg: String,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            code: 0,
            msg: "".to_string(),
        }
    }
}

pub fn form_error_handler(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        UrlencodedError::ContentType => AppError::param_error("invalid form payload"),
        UrlencodedError::Parse(_) => AppError::param_error("invalid form payload"),
        _ => AppError::param_error("invalid form payload"),
    };
    app_err.into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(ResponseDto::<()> {
        data: None,
        code: err.code(),
        msg: err.msg(),
    })
}
