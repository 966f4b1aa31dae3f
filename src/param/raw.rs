//! Raw parameter text as it arrives from a request: an ordered multimap of
//! name to decoded text.
use std::borrow::Cow;

/// Ordered multimap of parameter name → text.
///
/// Keys may repeat (`tag=a&tag=b`). Header maps compare names without regard
/// to ASCII case.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawParams {
    entries: Vec<(String, String)>,
    fold_case: bool,
}

impl RawParams {
    pub fn new() -> Self { Self::default() }

    /// An empty header map: lookups ignore ASCII case.
    pub fn headers() -> Self {
        RawParams { entries: Vec::new(), fold_case: true }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = Self::new();
        for (k, v) in pairs {
            out.push(k, v);
        }
        out
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn extend(&mut self, other: RawParams) {
        self.entries.extend(other.entries);
    }

    fn matches(&self, key: &str, name: &str) -> bool {
        if self.fold_case { key.eq_ignore_ascii_case(name) } else { key == name }
    }

    /// First value under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| self.matches(k, name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value under `name`, in arrival order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| self.matches(k, name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Parse `a=1&b=x%20y&b=z`. A leading `?` is ignored, `+` is a space and
    /// a key without `=` has an empty value.
    pub fn parse_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut out = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            out.push(unescape(k), unescape(v));
        }
        out
    }

    /// Parse a `Cookie` header: `a=1; b=2`.
    pub fn parse_cookies(header: &str) -> Self {
        let mut out = Self::new();
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            out.push(k.trim(), v.trim());
        }
        out
    }

    /// Percent-encoded `k=v&k=v`, the inverse of [`Self::parse_query`].
    pub fn to_query_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn unescape(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        // not UTF-8 once decoded: keep the text as sent
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strings_decode_and_keep_repeats() {
        let q = RawParams::parse_query("?tag=a&tag=b+c&name=J%C3%BCrgen&flag");
        assert_eq!(q.get_all("tag"), vec!["a", "b c"]);
        assert_eq!(q.get("name"), Some("Jürgen"));
        assert_eq!(q.get("flag"), Some(""));
        assert_eq!(q.get("missing"), None);
    }

    #[test]
    fn rendering_inverts_parsing() {
        let q = RawParams::from_pairs([("q", "a b&c=d"), ("x", "1,2")]);
        assert_eq!(RawParams::parse_query(&q.to_query_string()), q);
    }

    #[test]
    fn headers_ignore_case() {
        let mut h = RawParams::headers();
        h.push("X-Request-Id", "7");
        assert_eq!(h.get("x-request-id"), Some("7"));
        assert!(!RawParams::from_pairs([("X-Request-Id", "7")]).contains("x-request-id"));
    }

    #[test]
    fn cookies_split_on_semicolons() {
        let c = RawParams::parse_cookies("session=abc; theme=dark");
        assert_eq!(c.get("theme"), Some("dark"));
        assert_eq!(c.len(), 2);
    }
}
