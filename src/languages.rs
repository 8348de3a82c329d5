//! Supported languages and their UID-grammar codes.
//!
//! Grounded in `languages.py`'s `get_lang` helper: the UID grammar only
//! ever sees the lowercase two-letter code, but callers may hand in
//! mixed case or an alias, so parsing normalizes first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "de")]
    De,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(Language::En),
            "de" | "ger" | "deu" | "german" => Ok(Language::De),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_aliases_case_insensitively() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("German".parse::<Language>().unwrap(), Language::De);
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!("fr".parse::<Language>().is_err());
    }
}
