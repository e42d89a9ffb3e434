use std::collections::HashMap;

use bytes::Bytes;

/// Out-of-band metadata attached to an [`Envelope`].
///
/// Header names are case-sensitive and a name may carry several values, in the order
/// they were appended. Iteration order across different names is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    values: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`, keeping any value already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Replace every value of `name` with a single one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), vec![value.into()]);
    }

    /// First value appended for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over every `(name, value)` pair, repeating the name for multi-valued headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// One unit of work pulled from the broker.
///
/// The body is opaque to the transport and cannot be changed once the envelope is built.
/// Envelopes are never persisted: they are created by the consumer loop and dropped after
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    key: String,
    body: Bytes,
    headers: Headers,
}

impl Envelope {
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>, headers: Headers) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            headers,
        }
    }

    /// Correlation key, empty when the record had none.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}
