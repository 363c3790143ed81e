//! Request cookie jar.

use http::header::COOKIE;
use http::HeaderMap;

/// Name/value pairs from the client's `Cookie` headers, in arrival order.
///
/// The connection engine fills the jar before a handler sees the request.
/// Surrounding whitespace and double quotes are stripped from values.
///
/// ```rust
/// use fathom_core::Cookies;
///
/// let cookies = Cookies::parse("session=abc123; theme=\"dark\"");
/// assert_eq!(cookies.get("session"), Some("abc123"));
/// assert_eq!(cookies.get("theme"), Some("dark"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    /// An empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits one `Cookie` header value.
    ///
    /// Pieces without `=` or with an empty name are dropped. A repeated name
    /// keeps its first position and its last value.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut jar = Self::new();
        jar.add_header(header_value);
        jar
    }

    /// Collects every `Cookie` header. Values that are not visible ASCII are skipped.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .for_each(|value| jar.add_header(value));
        jar
    }

    fn add_header(&mut self, header_value: &str) {
        let pieces = header_value
            .split(';')
            .filter_map(|piece| piece.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
            .filter(|(name, _)| !name.is_empty());

        for (name, value) in pieces {
            match self.pairs.iter_mut().find(|(existing, _)| existing == name) {
                Some((_, slot)) => value.clone_into(slot),
                None => self.pairs.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    /// Value of cookie `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v.as_str()))
    }

    /// Whether cookie `name` was sent.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All cookies, first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no cookies were sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
