//! REST-style endpoint specifiers such as `"POST /channels/{id}/messages"`.

use crate::WireError;
use std::fmt;
use std::str::FromStr;

/// HTTP methods used by the vendor REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Uppercase method token
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(WireError::Method(s.to_string())),
        }
    }
}

/// A method plus a literal path template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Request method
    pub method: Method,
    /// Path, placeholders such as `{id}` kept verbatim
    pub path: String,
}

impl Endpoint {
    /// Parse `"METHOD /path"`
    pub fn parse(specifier: &str) -> Result<Self, WireError> {
        let (method, path) = specifier
            .trim()
            .split_once(' ')
            .ok_or_else(|| WireError::Endpoint(specifier.to_string()))?;

        let method = method.parse()?;
        let path = path.trim();
        if !path.starts_with('/') || path.contains(char::is_whitespace) {
            return Err(WireError::Endpoint(specifier.to_string()));
        }

        Ok(Self {
            method,
            path: path.to_string(),
        })
    }
}

impl FromStr for Endpoint {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let endpoint = Endpoint::parse("GET /").unwrap();
        assert_eq!(endpoint.method, Method::Get);
        assert_eq!(endpoint.path, "/");
    }

    #[test]
    fn test_parse_template_preserved() {
        let endpoint: Endpoint = "POST /channels/{id}/messages".parse().unwrap();
        assert_eq!(endpoint.method, Method::Post);
        assert_eq!(endpoint.path, "/channels/{id}/messages");
        assert_eq!(endpoint.to_string(), "POST /channels/{id}/messages");
    }

    #[test]
    fn test_unknown_method_is_an_error() {
        assert!(matches!(Endpoint::parse("FETCH /users/@me"), Err(WireError::Method(m)) if m == "FETCH"));
        assert!(matches!(Endpoint::parse("get /"), Err(WireError::Method(_))));
    }

    #[test]
    fn test_malformed_specifiers() {
        assert!(matches!(Endpoint::parse("GET"), Err(WireError::Endpoint(_))));
        assert!(matches!(Endpoint::parse("GET users"), Err(WireError::Endpoint(_))));
        assert!(matches!(Endpoint::parse("GET /a b"), Err(WireError::Endpoint(_))));
    }
}
