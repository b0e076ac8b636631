//! Body serialization for publishes.
//!
//! The default serializer turns any [`serde::Serialize`] value into a
//! JSON byte payload. Callers with bodies the default can't handle
//! pass their own closure to
//! [`AsyncManager::publish_with`](crate::AsyncManager::publish_with);
//! any `FnOnce(&T) -> Result<Vec<u8>>` works.

use serde::Serialize;

use crate::errors::{Error, Result};

/// Serialize a body to a JSON byte payload.
///
/// This is the serializer [`publish`](crate::AsyncManager::publish)
/// applies. Bodies the format can't represent (non-string map keys,
/// non-finite floats) surface as [`Error::Serialize`]
pub fn to_json<T>(body: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(body).map_err(Error::Serialize)
}
