//! Localized phrases and their lookup by (path, locale).
//!
//! A [`Localization`] is used both ways: rendered at random for outbound prompts and tested
//! for exact equality against inbound messages when matching controller actions.

mod catalog;
mod value;

pub use catalog::CatalogLocalizer;
pub use value::Localization;

#[derive(Debug, thiserror::Error)]
pub enum LocalizationError {
    #[error("localization has no templates")]
    Empty,
    #[error("no localization for {path} in locale {locale}")]
    UnknownPath { path: String, locale: String },
    #[error("localization entry {0} must be a string or a list of strings")]
    InvalidEntry(String),
}

/// Source of localized phrases, keyed by dotted path and locale tag.
pub trait Localizer: Send + Sync {
    fn get_string(&self, path: &str, locale: &str) -> Result<Localization, LocalizationError>;
}
