use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_EMAIL_LENGTH: usize = 255;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("Invalid email pattern")
});

/// Syntax and length check only. Does not trim or normalize.
pub fn is_valid_email(s: &str) -> bool {
    s.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(s)
}

/// A syntactically valid address, trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaitlistEmail(String);

impl WaitlistEmail {
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();

        if is_valid_email(trimmed) {
            Ok(Self(trimmed.to_lowercase()))
        } else {
            Err(format!("{s} is not a valid email"))
        }
    }
}

impl AsRef<str> for WaitlistEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WaitlistEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
