pub mod attendee;
pub mod photo;
pub mod session;
pub mod ticket;
pub mod trip;
pub mod user;
pub mod vehicle;

/// The backend is inconsistent about whether ids are JSON strings or numbers.
pub(crate) mod id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(value) => value,
            RawId::Int(value) => value.to_string(),
            RawId::Float(value) => value.to_string(),
        })
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
            RawId::Text(value) => value,
            RawId::Int(value) => value.to_string(),
            RawId::Float(value) => value.to_string(),
        }))
    }
}
