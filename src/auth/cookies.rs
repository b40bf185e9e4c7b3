use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

/// `Expires` attribute format (IMF-fixdate).
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub fn session_cookie(name: &str, token: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Expires={}",
        name,
        token,
        expires_at.format(COOKIE_DATE_FORMAT)
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        name
    )
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
