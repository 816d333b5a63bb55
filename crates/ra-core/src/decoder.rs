//! Stream payload classification (raw line → [`Event`]).

use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use crate::domain::{Alert, Event, Occurrence};

/// Name carried by the first occurrence of a liveness ping.
pub const KEEP_ALIVE_SENTINEL: &str = "KEEP_ALIVE";

const DATA_PREFIX: &str = "data:";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "alertTypeId", default, deserialize_with = "lenient")]
    alert_type_id: Option<i64>,
    #[serde(default)]
    alerts: Option<Vec<WireOccurrence>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOccurrence {
    name: Option<String>,
    #[serde(rename = "englishName")]
    english_name: Option<String>,
    #[serde(rename = "areaNameHe")]
    area_name_he: Option<String>,
    #[serde(rename = "areaNameEn")]
    area_name_en: Option<String>,
    #[serde(rename = "timeStamp")]
    time_stamp: Option<String>,
    #[serde(rename = "taCityId", deserialize_with = "lenient")]
    ta_city_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    lon: Option<f64>,
    #[serde(rename = "countdownSec", deserialize_with = "lenient")]
    countdown_sec: Option<u32>,
}

/// Metadata we never render: a numeric string is parsed, anything else that
/// does not fit becomes `None` instead of failing the whole payload.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => serde_json::from_value(other).ok(),
    })
}

impl From<WireOccurrence> for Occurrence {
    fn from(w: WireOccurrence) -> Self {
        Self {
            name_local: w.name.unwrap_or_default(),
            name_foreign: w.english_name,
            district_local: w.area_name_he,
            district_foreign: w.area_name_en,
            timestamp: w.time_stamp.unwrap_or_default(),
            city_id: w.ta_city_id,
            lat: w.lat,
            lon: w.lon,
            countdown_secs: w.countdown_sec,
        }
    }
}

/// Strip the `data:` prefix (and whitespace around the payload).
pub fn strip_data_prefix(raw: &str) -> &str {
    let line = raw.trim();
    match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

/// Classify one raw stream line.
pub fn decode_line(raw: &str) -> Event {
    let payload = strip_data_prefix(raw);
    if payload.is_empty() {
        return Event::Empty;
    }

    let envelope: Envelope = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            return Event::Malformed {
                reason: e.to_string(),
            }
        }
    };

    let wire = envelope.alerts.unwrap_or_default();

    // Keep-alives share the alert envelope; check before building an Alert.
    let is_keep_alive = wire
        .first()
        .and_then(|o| o.name.as_deref())
        .is_some_and(|n| n == KEEP_ALIVE_SENTINEL);
    if is_keep_alive {
        return Event::KeepAlive;
    }

    let occurrences: Vec<Occurrence> = wire
        .into_iter()
        .map(Occurrence::from)
        .filter(Occurrence::has_name)
        .collect();
    if occurrences.is_empty() {
        return Event::Empty;
    }

    Event::Alert(Alert {
        alert_type_id: envelope.alert_type_id.unwrap_or_default(),
        occurrences,
    })
}
