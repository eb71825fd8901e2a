//! A localized phrase: one or more equivalent templates for the same message key.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

use super::LocalizationError;
use crate::message::IncomingMessage;

/// Immutable, non-empty set of interchangeable phrase templates.
///
/// Outbound text picks one template at random ([`render`](Self::render)); inbound matching
/// checks whether a message equals any of them ([`matches`](Self::matches)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localization {
    templates: Arc<[String]>,
}

impl Localization {
    pub fn new<I, S>(templates: I) -> Result<Self, LocalizationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates: Vec<String> = templates.into_iter().map(Into::into).collect();
        if templates.is_empty() {
            return Err(LocalizationError::Empty);
        }
        Ok(Self {
            templates: templates.into(),
        })
    }

    pub fn single(template: impl Into<String>) -> Self {
        Self {
            templates: vec![template.into()].into(),
        }
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Substitute `{0}`, `{1}`, ... in every template. Returns a new value; `self` is untouched.
    pub fn format(&self, args: &[&dyn fmt::Display]) -> Self {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Self {
            templates: self
                .templates
                .iter()
                .map(|t| substitute(t, &rendered))
                .collect::<Vec<_>>()
                .into(),
        }
    }

    /// Pick one template uniformly at random.
    pub fn render(&self) -> String {
        self.render_with(&mut rand::thread_rng())
    }

    pub fn render_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        // Non-empty by construction.
        self.templates
            .choose(rng)
            .cloned()
            .unwrap_or_default()
    }

    /// Exact equality against any template: no trimming, no case folding.
    pub fn matches(&self, message: &IncomingMessage) -> bool {
        self.matches_text(&message.text)
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.templates.iter().any(|t| t == text)
    }
}

/// Positional placeholder substitution. `{{`/`}}` are literal braces; unknown or malformed
/// placeholders are copied through verbatim.
fn substitute(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let inner = &tail[1..end];
                let index = Some(inner)
                    .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|s| s.parse::<usize>().ok());
                if let Some(arg) = index.and_then(|i| args.get(i)) {
                    out.push_str(arg);
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn loc(templates: &[&str]) -> Localization {
        Localization::new(templates.iter().copied()).unwrap()
    }

    #[test]
    fn empty_template_set_is_rejected() {
        let err = Localization::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, LocalizationError::Empty));
    }

    #[test]
    fn matches_any_template_exactly() {
        let l = loc(&["start", "begin"]);
        assert!(l.matches(&IncomingMessage::new("begin")));
        assert!(l.matches(&IncomingMessage::new("start")));
    }

    #[test]
    fn matching_ignores_nothing() {
        let l = loc(&["start", "begin"]);
        for text in ["Start", "START", " start", "start ", "star", "startx", ""] {
            assert!(!l.matches_text(text), "{:?} should not match", text);
        }
    }

    #[test]
    fn format_substitutes_positional_args() {
        let l = loc(&["buy {0} for {1}", "{1} coins for {0}?"]);
        let f = l.format(&[&"sword", &12]);
        assert_eq!(f.templates(), &["buy sword for 12", "12 coins for sword?"]);
    }

    #[test]
    fn format_is_pure() {
        let l = loc(&["hello {0}"]);
        let a = l.format(&[&"Ann"]);
        let b = l.format(&[&"Ann"]);
        assert_eq!(a, b);
        assert!(l.matches_text("hello {0}"));
        assert!(!l.matches_text("hello Ann"));
        assert!(a.matches_text("hello Ann"));
    }

    #[test]
    fn format_keeps_escapes_and_unknown_placeholders() {
        let l = loc(&["{{0}} is {0}, {2} and {x} stay, {"]);
        let f = l.format(&[&"zero"]);
        assert_eq!(f.templates(), &["{0} is zero, {2} and {x} stay, {"]);
    }

    #[test]
    fn format_requires_digit_only_index() {
        let l = loc(&["{+1} {1} { 1} {} {01}"]);
        let f = l.format(&[&"a", &"b"]);
        assert_eq!(f.templates(), &["{+1} b { 1} {} b"]);
    }

    #[test]
    fn render_reaches_every_template() {
        let l = loc(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(7);
        let seen: HashSet<String> = (0..200).map(|_| l.render_with(&mut rng)).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn render_single_template() {
        assert_eq!(Localization::single("only").render(), "only");
    }
}
