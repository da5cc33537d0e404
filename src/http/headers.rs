//! Ordered multi-map merging.
//!
//! Both directions of the gateway fold repeated names into a map: request
//! headers into CGI variables (values joined with `;`) and backend headers
//! into the outbound response (values appended). The rule is the same in
//! both cases: the first value for a name is inserted, every later value is
//! appended after it, and the relative order of values is preserved.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// A map that can hold several values per name.
pub trait MultiMap {
    type Name;
    type Value;

    /// Insert the first value for `name`, or append to the existing ones.
    fn insert_or_append(&mut self, name: Self::Name, value: Self::Value);
}

impl MultiMap for HeaderMap {
    type Name = HeaderName;
    type Value = HeaderValue;

    fn insert_or_append(&mut self, name: HeaderName, value: HeaderValue) {
        self.append(name, value);
    }
}

/// Merge every `(name, value)` of `source` into `target`, in order.
pub fn merge<M, I>(target: &mut M, source: I)
where
    M: MultiMap,
    I: IntoIterator<Item = (M::Name, M::Value)>,
{
    for (name, value) in source {
        target.insert_or_append(name, value);
    }
}

/// Flatten a `HeaderMap` into `(name, value)` pairs, keeping the order of
/// repeated values.
pub fn entries(headers: HeaderMap) -> impl Iterator<Item = (HeaderName, HeaderValue)> {
    let mut current = None;
    headers.into_iter().filter_map(move |(name, value)| {
        if let Some(name) = name {
            current = Some(name);
        }
        current.clone().map(|name| (name, value))
    })
}
