//! Localized text as used in entity names and setup screens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Text keyed by language code, e.g. `{"en": "Living room", "de": "Wohnzimmer"}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// English-only text.
    pub fn en(text: impl Into<String>) -> Self {
        Self::default().with("en", text)
    }

    #[must_use]
    pub fn with(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        let _ = self.0.insert(language.into(), text.into());
        self
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    /// Text of the alphabetically first language.
    pub fn first(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::en(text)
    }
}

impl From<String> for LocalizedText {
    fn from(text: String) -> Self {
        Self::en(text)
    }
}
