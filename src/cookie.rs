//! HTTP cookies: the `Set-Cookie` side and `Cookie` header parsing.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Error;

/// The `SameSite` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax    => "Lax",
            Self::None   => "None",
        })
    }
}

/// A cookie to be sent to the client.
///
/// ```rust
/// use actio::{Cookie, SameSite};
///
/// let c = Cookie::new("session", "abc123").unwrap()
///     .with_path("/")
///     .http_only(true)
///     .with_same_site(SameSite::Lax);
/// assert_eq!(c.to_header_value(), "session=abc123; Path=/; HttpOnly; SameSite=Lax");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    expires: Option<DateTime<Utc>>,
    max_age: Option<Duration>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    /// Fails with [`Error::InvalidCookie`] when the name is not an RFC 6265
    /// token or the value holds characters outside cookie-octet.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let value = value.into();
        if !is_cookie_name_valid(&name) {
            return Err(Error::InvalidCookie(format!("bad name `{name}`")));
        }
        if !is_cookie_value_valid(&value) {
            return Err(Error::InvalidCookie(format!("bad value for `{name}`")));
        }
        Ok(Self {
            name,
            value,
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Renders the `Set-Cookie` header value. `Path` and `Domain` values that
    /// would break the header are dropped.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);

        for (attr, value) in [("Path", &self.path), ("Domain", &self.domain)] {
            let Some(value) = value else { continue };
            if is_attribute_value_valid(value) {
                out.push_str(&format!("; {attr}={value}"));
            } else {
                tracing::warn!(cookie = %self.name, attr, "dropping invalid cookie attribute");
            }
        }
        if let Some(expires) = &self.expires {
            out.push_str(&format!("; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }
        if let Some(max_age) = &self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = &self.same_site {
            out.push_str(&format!("; SameSite={same_site}"));
        }
        out
    }
}

/// Splits a request `Cookie` header into name/value pairs. Malformed pairs
/// are skipped.
pub(crate) fn parse_cookie_header(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        let value = value.trim().trim_matches('"');
        is_cookie_name_valid(name.trim()).then(|| (name.trim().to_owned(), value.to_owned()))
    })
}

fn is_cookie_name_valid(name: &str) -> bool {
    const SEPARATORS: &[char] = &[
        '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '=', '{', '}', ' ', '\t',
    ];
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !SEPARATORS.contains(&c))
}

// cookie-octet: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
fn is_cookie_value_valid(value: &str) -> bool {
    value.bytes().all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

fn is_attribute_value_valid(value: &str) -> bool {
    !value.contains(';') && value.chars().all(|c| !c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_every_attribute() {
        let expires = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let c = Cookie::new("token", "xyz")
            .unwrap()
            .with_path("/app")
            .with_domain("example.com")
            .with_expires(expires)
            .with_max_age(Duration::from_secs(3600))
            .secure(true)
            .http_only(true)
            .with_same_site(SameSite::Strict);

        assert_eq!(
            c.to_header_value(),
            "token=xyz; Path=/app; Domain=example.com; Expires=Tue, 31 Dec 2024 23:59:59 GMT; \
             Max-Age=3600; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn rejects_bad_names_and_values() {
        assert!(Cookie::new("SID", "abcDEF123-_.:~").is_ok());
        assert!(Cookie::new("SID", "bad;value").is_err());
        assert!(Cookie::new("SID", "bad,value").is_err());
        assert!(Cookie::new("SID", "bad\nvalue").is_err());
        assert!(Cookie::new("bad name", "v").is_err());
        assert!(Cookie::new("", "v").is_err());
    }

    #[test]
    fn drops_header_breaking_attributes() {
        let c = Cookie::new("A", "B").unwrap().with_path("/ok").with_domain("bad\r\ndomain");
        let v = c.to_header_value();
        assert_eq!(v, "A=B; Path=/ok");
    }

    #[test]
    fn parses_request_header() {
        let pairs: Vec<_> = parse_cookie_header("a=1; b=\"two\"; junk; =x; c=").collect();
        assert_eq!(pairs, vec![
            ("a".to_owned(), "1".to_owned()),
            ("b".to_owned(), "two".to_owned()),
            ("c".to_owned(), String::new()),
        ]);
    }
}
