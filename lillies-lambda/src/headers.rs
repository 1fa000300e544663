//! Ordered, case-insensitive header storage.
//!
//! Used for inbound event headers, captured application headers and the
//! reply envelope. Lookups ignore ASCII case; iteration keeps arrival order;
//! the original spelling of each name is preserved for output.
//!
//! Most requests carry fewer than a dozen headers, so they are kept inline in
//! a `SmallVec` and scanned linearly.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;

/// Number of headers stored inline.
pub const INLINE_HEADERS: usize = 12;

/// A header name-value pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as received
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    /// Check if name matches (case-insensitive)
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// An ordered header map with case-insensitive lookup.
///
/// ```rust
/// use lillies_lambda::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Content-Type", "application/json");
/// headers.insert("content-type", "text/html");
///
/// assert_eq!(headers.len(), 1);
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl HeaderMap {
    /// Create a new empty header map.
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    /// Create with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    /// Get the number of headers.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the first value for a name (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Insert a header, replacing every existing header with the same name.
    ///
    /// The replaced header keeps its position; the new spelling of the name
    /// wins. Returns the old value if one was replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();

        match self.inner.iter().position(|h| h.name_eq(&name)) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.inner[pos], Header { name, value });
                let mut idx = pos + 1;
                while idx < self.inner.len() {
                    if self.inner[idx].name_eq(&old.name) {
                        self.inner.remove(idx);
                    } else {
                        idx += 1;
                    }
                }
                Some(old.value)
            }
            None => {
                self.inner.push(Header { name, value });
                None
            }
        }
    }

    /// Append a header without replacing existing ones.
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Iterate over all headers in order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|h| (&h.name, &h.value)))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = HeaderMap::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for HeaderMap {
    type Item = (String, String);
    type IntoIter = std::iter::Map<
        smallvec::IntoIter<[Header; INLINE_HEADERS]>,
        fn(Header) -> (String, String),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner
            .into_iter()
            .map((|h: Header| (h.name, h.value)) as fn(Header) -> (String, String))
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for h in &self.inner {
            map.serialize_entry(&h.name, &h.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderMapVisitor;

        impl<'de> Visitor<'de> for HeaderMapVisitor {
            type Value = HeaderMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderMap, A::Error> {
                let mut headers = HeaderMap::with_capacity(access.size_hint().unwrap_or(0));
                // Keep the event's headers exactly as delivered; folding of
                // case-variant duplicates happens when the environment is built.
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.append(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_ignores_case() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", "abc");

        assert_eq!(headers.get("x-request-id"), Some("abc"));
        assert_eq!(headers.get("X-REQUEST-ID"), Some("abc"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut headers = HeaderMap::new();
        headers.append("content-type", "text/plain");
        headers.append("X-Other", "1");
        headers.append("Content-Type", "text/html");

        let old = headers.insert("Content-Type", "application/json");

        assert_eq!(old.as_deref(), Some("text/plain"));
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Content-Type", "application/json"), ("X-Other", "1")]
        );
    }

    #[test]
    fn test_serialize_keeps_order() {
        let headers: HeaderMap = vec![("B", "2"), ("A", "1")].into_iter().collect();
        let json = serde_json::to_string(&headers).unwrap();

        assert_eq!(json, r#"{"B":"2","A":"1"}"#);
    }

    #[test]
    fn test_deserialize_preserves_case_variants() {
        let headers: HeaderMap =
            serde_json::from_str(r#"{"Host":"a.example","host":"b.example"}"#).unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("HOST"), Some("a.example"));
    }

    #[test]
    fn test_deserialize_rejects_non_string_values() {
        let result = serde_json::from_str::<HeaderMap>(r#"{"Content-Length": 12}"#);
        assert!(result.is_err());
    }
}
