use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// One-time user-visible notice carried across a redirect in a cookie.
/// The list view reads it and immediately expires the cookie, so a notice
/// is shown for exactly one request.
pub const NOTICE_COOKIE: &str = "notice";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn into_cookie(self) -> Cookie<'static> {
        let payload = serde_json::to_vec(&self).unwrap_or_default();
        let mut cookie = Cookie::new(NOTICE_COOKIE, URL_SAFE_NO_PAD.encode(payload));
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie
    }
}

pub fn take(req: &HttpRequest) -> Option<Notice> {
    let cookie = req.cookie(NOTICE_COOKIE)?;
    let bytes = URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(NOTICE_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn round_trips_through_cookie() {
        let cookie = Notice::success("resource submitted").into_cookie();
        let req = TestRequest::default()
            .cookie(cookie)
            .to_http_request();
        let notice = take(&req).expect("notice present");
        assert_eq!(notice.message, "resource submitted");
        assert!(matches!(notice.level, NoticeLevel::Success));
    }

    #[test]
    fn cookie_is_scoped_and_lax() {
        let cookie = Notice::error("nope").into_cookie();
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn absent_cookie_yields_none() {
        let req = TestRequest::default().to_http_request();
        assert!(take(&req).is_none());
    }

    #[test]
    fn garbage_cookie_yields_none() {
        let req = TestRequest::default()
            .cookie(Cookie::new(NOTICE_COOKIE, "not base64!"))
            .to_http_request();
        assert!(take(&req).is_none());
    }
}
