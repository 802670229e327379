//! Lenient decoding helpers for controller JSON.
//!
//! 64-bit counters arrive either as JSON numbers or as decimal strings
//! depending on the controller's JSON mapping, and empty lists are
//! sometimes sent as `null`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

pub(crate) fn counter<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Option::<RawNumber>::deserialize(d)? {
        None => Ok(0),
        Some(RawNumber::Int(n)) => Ok(n),
        Some(RawNumber::Float(f)) if f >= 0.0 => Ok(f as u64),
        Some(RawNumber::Float(f)) => Err(D::Error::custom(format!("negative counter: {f}"))),
        Some(RawNumber::Text(s)) => s
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid counter {s:?}: {e}"))),
    }
}

pub(crate) fn rate<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Option::<RawNumber>::deserialize(d)? {
        None => Ok(0.0),
        Some(RawNumber::Int(n)) => Ok(n as f64),
        Some(RawNumber::Float(f)) => Ok(f),
        Some(RawNumber::Text(s)) => s
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid rate {s:?}: {e}"))),
    }
}

pub(crate) fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}
