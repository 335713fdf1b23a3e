use std::{borrow::Cow, fmt, str::FromStr};

use crate::errors::PointerError;

/// A JSON Pointer, as defined by RFC 6901.
///
/// The pointer is kept as a list of unescaped reference tokens. Escaping
/// happens only when the pointer is rendered, so callers can push any
/// Kubernetes key (e.g. `kubernetes.io/hostname`) without caring about
/// the `~0` / `~1` encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// The pointer referencing the whole document
    pub fn root() -> Self {
        JsonPointer::default()
    }

    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        JsonPointer {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new pointer referencing the `token` child of this one.
    pub fn join(&self, token: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.push(token);
        child
    }

    /// Returns a new pointer referencing the `index`-th element of the
    /// array referenced by this one.
    pub fn index(&self, index: usize) -> Self {
        self.join(index.to_string())
    }

    /// Like `join`, but for a sequence of tokens
    pub fn extend<I, T>(&self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut child = self.clone();
        child.tokens.extend(tokens.into_iter().map(Into::into));
        child
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// Pointer made of the first `len` tokens
    pub fn prefix(&self, len: usize) -> JsonPointer {
        JsonPointer {
            tokens: self.tokens[..len.min(self.tokens.len())].to_vec(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Escape a reference token: `~` becomes `~0` and `/` becomes `~1`.
///
/// `~` must be handled first, otherwise the `~` introduced by the
/// encoding of `/` would be escaped again.
pub fn escape(token: &str) -> Cow<'_, str> {
    if !token.contains(['~', '/']) {
        return Cow::Borrowed(token);
    }
    Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
}

/// Reverse of [`escape`]. Any `~` not followed by `0` or `1` is an error.
pub fn unescape(token: &str) -> Result<Cow<'_, str>, PointerError> {
    if !token.contains('~') {
        return Ok(Cow::Borrowed(token));
    }

    let mut unescaped = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => unescaped.push('~'),
            Some('1') => unescaped.push('/'),
            _ => return Err(PointerError::InvalidEscape(token.to_string())),
        }
    }
    Ok(Cow::Owned(unescaped))
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape(token))?;
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(JsonPointer::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(s.to_string()));
        };

        let tokens = rest
            .split('/')
            .map(|token| unescape(token).map(Cow::into_owned))
            .collect::<Result<Vec<String>, PointerError>>()?;
        Ok(JsonPointer { tokens })
    }
}

impl TryFrom<String> for JsonPointer {
    type Error = PointerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JsonPointer> for String {
    fn from(pointer: JsonPointer) -> Self {
        pointer.to_string()
    }
}

impl serde::Serialize for JsonPointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for JsonPointer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::plain("spec", "spec")]
    #[case::slash("kubernetes.io/hostname", "kubernetes.io~1hostname")]
    #[case::tilde("a~b", "a~0b")]
    #[case::tilde_then_one("~1", "~01")]
    #[case::both("~/", "~0~1")]
    #[case::empty("", "")]
    fn escape_token(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(escape(token), expected);
        assert_eq!(unescape(expected).unwrap(), token);
    }

    #[rstest]
    #[case::dangling("a~")]
    #[case::unknown_escape("a~2b")]
    fn unescape_rejects_invalid_sequences(#[case] token: &str) {
        assert!(matches!(
            unescape(token),
            Err(PointerError::InvalidEscape(_))
        ));
    }

    #[test]
    fn display_escapes_every_token() {
        let pointer = JsonPointer::from_tokens(["metadata", "annotations"])
            .join("example.com/owner~team");

        assert_eq!(
            pointer.to_string(),
            "/metadata/annotations/example.com~1owner~0team"
        );
    }

    #[test]
    fn root_renders_as_empty_string() {
        assert_eq!(JsonPointer::root().to_string(), "");
        assert!(JsonPointer::root().is_root());
    }

    #[rstest]
    #[case("", vec![])]
    #[case("/spec", vec!["spec"])]
    #[case("/spec/containers/0", vec!["spec", "containers", "0"])]
    #[case("/a~1b/c~0d", vec!["a/b", "c~d"])]
    #[case("/", vec![""])]
    fn parse_pointer(#[case] raw: &str, #[case] tokens: Vec<&str>) {
        let pointer: JsonPointer = raw.parse().unwrap();
        assert_eq!(pointer.tokens(), tokens.as_slice());
        assert_eq!(pointer.to_string(), raw);
    }

    #[test]
    fn parse_requires_leading_slash() {
        assert!(matches!(
            "spec/containers".parse::<JsonPointer>(),
            Err(PointerError::MissingLeadingSlash(_))
        ));
    }

    #[test]
    fn pointer_resolves_like_serde_json() {
        let doc = json!({
            "metadata": {"labels": {"app.kubernetes.io/name": "nginx", "a~b": "tilde"}}
        });

        let slash = JsonPointer::from_tokens(["metadata", "labels", "app.kubernetes.io/name"]);
        let tilde = JsonPointer::from_tokens(["metadata", "labels", "a~b"]);

        assert_eq!(doc.pointer(&slash.to_string()), Some(&json!("nginx")));
        assert_eq!(doc.pointer(&tilde.to_string()), Some(&json!("tilde")));
    }

    #[test]
    fn navigation_helpers() {
        let containers = JsonPointer::from_tokens(["spec", "containers"]);
        let first = containers.index(0);

        assert_eq!(first.to_string(), "/spec/containers/0");
        assert_eq!(first.prefix(2), containers);
        assert_eq!(first.prefix(1).to_string(), "/spec");
        assert_eq!(first.prefix(9), first);
        assert_eq!(
            first.extend(["securityContext", "seLinuxOptions"]).to_string(),
            "/spec/containers/0/securityContext/seLinuxOptions"
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let pointer = JsonPointer::from_tokens(["spec", "a/b"]);
        let value = serde_json::to_value(&pointer).unwrap();
        assert_eq!(value, json!("/spec/a~1b"));

        let back: JsonPointer = serde_json::from_value(value).unwrap();
        assert_eq!(back, pointer);
    }
}
