//! Tolerant decoding for numeric fields.
//!
//! Decimal columns (coordinates, ids echoed from URLs) are rendered as JSON
//! strings by some producers and as JSON numbers by others. These helpers
//! accept either form.

use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

/// A value that arrived either as a JSON number or as text.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrText<T> {
    /// Native JSON number.
    Number(T),
    /// Number rendered as a string, e.g. `"40.75890000"`.
    Text(String),
}

/// Deserialize an `f64` from a number or a decimal string.
pub(crate) fn f64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrText::<f64>::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(D::Error::custom),
    }
}

/// Deserialize an optional `f64`; `null` and blank strings become `None`.
pub(crate) fn opt_f64_from_any<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrText<f64>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
    }
}
