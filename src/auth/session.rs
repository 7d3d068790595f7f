use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::jwt::JwtKeys;
use crate::{config::CookieConfig, error::AppError, users::repo_types::User};

fn session_cookie(cfg: &CookieConfig, token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((cfg.name.clone(), token))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Signs a token for `user` and stores it in the session cookie.
pub fn issue(
    jar: CookieJar,
    keys: &JwtKeys,
    cfg: &CookieConfig,
    user: &User,
) -> Result<(CookieJar, String), AppError> {
    let token = keys.sign(user)?;
    let jar = jar.add(session_cookie(cfg, token.clone(), keys.ttl_seconds()));
    Ok((jar, token))
}

/// Always emits an expiring cookie, whether or not the request carried one.
pub fn clear(jar: CookieJar, cfg: &CookieConfig) -> CookieJar {
    let mut cookie = session_cookie(cfg, String::new(), 0);
    cookie.make_removal();
    jar.add(cookie)
}
