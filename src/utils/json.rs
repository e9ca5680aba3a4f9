use serde::{Deserialize, Deserializer};

/// Lets `Option<Option<T>>` fields tell an omitted key (`None`) apart from an
/// explicit `null` (`Some(None)`). Pair with `#[serde(default)]`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
