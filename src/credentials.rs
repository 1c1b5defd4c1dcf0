use axum::http::{self, HeaderMap};
use std::fmt;

/// An API key passed through to a remote service. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn from_optional(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| Self::new(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn preview(&self) -> String {
        self.0.chars().take(6).collect::<String>() + "…"
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.preview())
    }
}

/// First non-empty value wins.
pub fn first_present(candidates: &[Option<&str>]) -> Option<Credential> {
    candidates
        .iter()
        .find_map(|candidate| Credential::from_optional(*candidate))
}

pub fn bearer_token(headers: &HeaderMap) -> Option<Credential> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && let Some(scheme) = raw.get(..6)
        && scheme.eq_ignore_ascii_case("bearer")
    {
        return Credential::new(&raw[6..]);
    }
    None
}
