//! Lenient field deserializers for backend payloads.
//!
//! The backend encodes almost everything as strings, but not reliably: numbers,
//! booleans and `null` show up in string fields, and `data`/`info` are sometimes
//! `null`. These helpers absorb those mismatches. Anything that is not a scalar
//! where a scalar is expected (an object or array) still fails, so real shape
//! violations surface as decode errors.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(v) => v,
            Scalar::Integer(v) => v.to_string(),
            Scalar::Unsigned(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Flag(v) => v.to_string(),
        }
    }
}

/// String field that also accepts numbers, booleans and `null` (as empty).
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(String::from)
        .unwrap_or_default())
}

/// List field where `null` means empty.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Nested object where `null` means the default value.
pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
