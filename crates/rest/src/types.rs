//! Wire types for the REST API.

use serde::Serialize;

/// Body of `PUT /API/Auth/Login`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub domain: &'a str,
}

/// Collections that accept uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Drivers,
    Scripts,
}

impl Collection {
    pub fn path(self) -> &'static str {
        match self {
            Self::Drivers => "Drivers",
            Self::Scripts => "Scripts",
        }
    }
}

/// Extracts the session token from a login response body.
///
/// The server answers with a JSON string; a bare token is accepted too.
pub(crate) fn parse_token(body: &str) -> String {
    serde_json::from_str::<String>(body).unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_from_json_string() {
        assert_eq!(parse_token("\"abc123==\""), "abc123==");
    }

    #[test]
    fn token_from_bare_body() {
        assert_eq!(parse_token("abc123\r\n"), "abc123");
    }

    #[test]
    fn login_request_shape() {
        let req = LoginRequest {
            username: "admin",
            password: "secret",
            domain: "Global",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["username"], "admin");
        assert_eq!(json["password"], "secret");
        assert_eq!(json["domain"], "Global");
    }
}
