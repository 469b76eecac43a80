//! Cookies that cache the signed-in session for the browser.
//!
//! `cms_auth` and `cms_email` are readable markers for the UI. `cms_token`
//! and `cms_refresh` hold credentials and are `HttpOnly`. No cookie outlives
//! the access token it was written for.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use cms_common::Session;
use time::Duration;

pub const AUTH_FLAG: &str = "cms_auth";
pub const EMAIL: &str = "cms_email";
pub const TOKEN: &str = "cms_token";
pub const REFRESH: &str = "cms_refresh";

const ALL: [&str; 4] = [AUTH_FLAG, EMAIL, TOKEN, REFRESH];

fn base(name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .build()
}

/// Write the session cache.
///
/// Without `remember_me` every cookie lives for the browser session only.
/// With it, cookies persist until the access token expires.
pub fn store_session(jar: CookieJar, session: &Session, remember_me: bool) -> CookieJar {
    let max_age = remember_me.then(|| Duration::seconds(session.expires_in(Utc::now())));

    let mut cookies = vec![
        base(AUTH_FLAG, "true".into(), false),
        base(EMAIL, session.user.email.clone(), false),
        base(TOKEN, session.access_token.clone(), true),
    ];
    if let Some(refresh) = &session.refresh_token {
        cookies.push(base(REFRESH, refresh.clone(), true));
    }

    cookies.into_iter().fold(jar, |jar, mut cookie| {
        if let Some(age) = max_age {
            cookie.set_max_age(age);
        }
        jar.add(cookie)
    })
}

/// Remove every session cookie.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    ALL.into_iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build(name).path("/")))
}

pub fn access_token(jar: &CookieJar) -> Option<String> {
    jar.get(TOKEN).map(|c| c.value().to_string())
}

pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH).map(|c| c.value().to_string())
}
