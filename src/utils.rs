use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
}

impl SuccessBody {
    pub fn ok() -> SuccessBody {
        SuccessBody { success: true }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CountBody {
    pub count: u64,
}

pub fn bson_now(now: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_chrono(now)
}

/// (De)serializes a `NaiveTime` as a 24h `HH:MM` string.
pub mod hour_minute {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT)
            .map_err(|_| D::Error::custom(format!("'{}' is not a HH:MM time", s)))
    }
}
