//! Ordered, case-insensitive header list.
//!
//! Names compare case-insensitively. [`Headers::insert`] replaces an
//! earlier value in place, keeping the casing of the latest write; it is
//! what request builders use. [`Headers::append`] keeps repeated values,
//! as received headers need: they are folded into one `, `-joined value,
//! except `Set-Cookie`, whose values may themselves contain commas and are
//! kept apart.

use indexmap::map::Entry;
use indexmap::IndexMap;

/// Header names that describe the body rather than the exchange. They must
/// travel with the body; every other header travels on the envelope.
pub const CONTENT_HEADERS: [&str; 9] = [
    "Content-Type",
    "Content-Length",
    "Content-Encoding",
    "Content-Language",
    "Content-Location",
    "Content-MD5",
    "Content-Range",
    "Expires",
    "Last-Modified",
];

/// Whether `name` is one of [`CONTENT_HEADERS`], ignoring case.
pub fn is_content_header(name: &str) -> bool {
    CONTENT_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// The one header whose repeated values cannot be comma-joined.
const SET_COOKIE: &str = "set-cookie";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    // lowercased name -> (name as written, values); only Set-Cookie holds
    // more than one value
    entries: IndexMap<String, (String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries
            .insert(name.to_ascii_lowercase(), (name.to_string(), vec![value.to_string()]));
    }

    /// Add a value without dropping earlier ones for the same name.
    pub fn append(&mut self, name: &str, value: &str) {
        let is_cookie = name.eq_ignore_ascii_case(SET_COOKIE);
        match self.entries.entry(name.to_ascii_lowercase()) {
            Entry::Vacant(slot) => {
                slot.insert((name.to_string(), vec![value.to_string()]));
            }
            Entry::Occupied(mut slot) => {
                let values = &mut slot.get_mut().1;
                if is_cookie || values.is_empty() {
                    values.push(value.to_string());
                } else {
                    values[0].push_str(", ");
                    values[0].push_str(value);
                }
            }
        }
    }

    /// The value for `name`. For `Set-Cookie` this is the first cookie;
    /// see [`Headers::get_all`].
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|(_, values)| values.join(", "))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, value)` pairs in insertion order, one per kept value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .flat_map(|(name, values)| values.iter().map(move |value| (name.as_str(), value.as_str())))
    }

    /// Split into `(envelope, content)` lists by [`is_content_header`].
    pub fn split(&self) -> (Vec<(String, String)>, Vec<(String, String)>) {
        self.iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .partition(|(n, _)| !is_content_header(n))
    }
}

impl<N: AsRef<str>, V: AsRef<str>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value.as_ref());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("X-Trace-Id", "abc");
        assert_eq!(h.get("x-trace-id"), Some("abc"));
        assert!(h.contains("X-TRACE-ID"));
    }

    #[test]
    fn last_write_wins_in_place() {
        let mut h = Headers::new();
        h.insert("Accept", "text/plain");
        h.insert("X-One", "1");
        h.insert("accept", "application/json");
        let pairs: Vec<_> = h.iter().collect();
        assert_eq!(pairs, [("accept", "application/json"), ("X-One", "1")]);
    }

    #[test]
    fn content_header_set_is_case_insensitive() {
        assert!(is_content_header("content-type"));
        assert!(is_content_header("CONTENT-MD5"));
        assert!(is_content_header("expires"));
        assert!(is_content_header("Last-Modified"));
        assert!(!is_content_header("Authorization"));
        assert!(!is_content_header("Content-Disposition"));
    }

    #[test]
    fn split_by_placement() {
        let h: Headers = [
            ("Authorization", "Bearer t"),
            ("Content-Type", "text/plain"),
            ("Expires", "0"),
            ("Accept", "*/*"),
        ]
        .into_iter()
        .collect();
        let (envelope, content) = h.split();
        assert_eq!(
            envelope,
            [
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("Accept".to_string(), "*/*".to_string())
            ]
        );
        assert_eq!(
            content,
            [
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("Expires".to_string(), "0".to_string())
            ]
        );
    }

    #[test]
    fn append_folds_repeats_but_keeps_cookies_apart() {
        let mut h = Headers::new();
        h.append("Vary", "Accept");
        h.append("Set-Cookie", "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT");
        h.append("vary", "Origin");
        h.append("set-cookie", "b=2");
        assert_eq!(h.get("vary"), Some("Accept, Origin"));
        assert_eq!(
            h.get_all("Set-Cookie").collect::<Vec<_>>(),
            ["a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT", "b=2"]
        );
        assert_eq!(h.get("set-cookie"), Some("a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(h.len(), 2);
        assert_eq!(h.iter().count(), 3);
        assert_eq!(h.get_all("missing").count(), 0);
    }

    #[test]
    fn remove_keeps_order_of_rest() {
        let mut h: Headers = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
        assert_eq!(h.remove("b"), Some("2".to_string()));
        assert_eq!(h.iter().map(|(n, _)| n).collect::<Vec<_>>(), ["A", "C"]);
        assert_eq!(h.len(), 2);
    }
}
