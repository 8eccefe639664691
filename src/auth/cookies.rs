use axum::http::header;
use axum::http::request::Parts;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

// -- Cookie helpers --

fn token_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn access_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    token_cookie(ACCESS_COOKIE, token, max_age_secs, secure)
}

pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    token_cookie(REFRESH_COOKIE, token, max_age_secs, secure)
}

pub fn clear_access_cookie(secure: bool) -> String {
    token_cookie(ACCESS_COOKIE, "", 0, secure)
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    token_cookie(REFRESH_COOKIE, "", 0, secure)
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn cookies_are_http_only_and_not_secure_by_default() {
        let cookie = access_cookie("abc", 60, false);
        assert!(cookie.starts_with("accessToken=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn secure_flag_is_configurable() {
        let cookie = refresh_cookie("xyz", 86400, true);
        assert!(cookie.starts_with("refreshToken=xyz;"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn clearing_sets_zero_max_age() {
        assert!(clear_access_cookie(false).contains("Max-Age=0"));
        assert!(clear_refresh_cookie(false).starts_with("refreshToken=;"));
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; accessToken=a.b.c; refreshToken=d.e.f");
        assert_eq!(get_cookie_value(&parts, ACCESS_COOKIE), Some("a.b.c"));
        assert_eq!(get_cookie_value(&parts, REFRESH_COOKIE), Some("d.e.f"));
        assert_eq!(get_cookie_value(&parts, "missing"), None);
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let parts = parts_with_cookie("accessToken=; refreshToken=x");
        assert_eq!(get_cookie_value(&parts, ACCESS_COOKIE), None);
    }
}
