//! Named captures of the route pattern that matched a request.

use smallvec::SmallVec;

/// Captures from the matched route, in the order the pattern declares them.
///
/// Patterns rarely have more than a few groups, so the first few live inline.
///
/// ```rust
/// use fathom_core::Params;
///
/// let mut params = Params::new();
/// params.push("path", "css/site.css");
///
/// assert_eq!(params.get("path"), Some("css/site.css"));
/// assert!(!params.contains("id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    captures: SmallVec<[(Box<str>, String); 4]>,
}

impl Params {
    /// An empty set, as seen by routes without groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the text captured by group `name`.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.captures.push((name.into(), value.into()));
    }

    /// Text captured by group `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find_map(|(group, value)| (group == name).then_some(value))
    }

    /// Whether group `name` took part in the match.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Number of captured groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    /// `(group, text)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.captures
            .iter()
            .map(|(group, value)| (&**group, value.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(pairs: I) -> Self {
        let mut params = Self::new();
        for (group, value) in pairs {
            params.push(group, value);
        }
        params
    }
}
