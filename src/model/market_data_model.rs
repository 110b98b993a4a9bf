use crate::core::error::{BridgeError, Result};
use crate::model::constants::{TICK_FIELD_DELIMITER, TICK_TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// native instrument id -> external security id
pub type TopicMap = HashMap<String, String>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tick {
    pub native_topic: String,
    pub sec_id: String,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// Decodes one raw `instrument,YYYYMMDD HH:MM:SS,price` record.
///
/// The tick is keyed by the external id found in `topics`; a native id with no
/// mapping keeps itself as the key.
pub fn decode_tick(raw: &[u8], topics: &TopicMap) -> Result<Tick> {
    let text = std::str::from_utf8(raw)
        .map_err(|err| BridgeError::malformed_tick(&String::from_utf8_lossy(raw), err))?;
    let cols: Vec<&str> = text.split(TICK_FIELD_DELIMITER).collect();
    if cols.len() != 3 {
        return Err(BridgeError::malformed_tick(
            text,
            format!("expected 3 fields, got {}", cols.len()),
        ));
    }
    let native_topic = cols[0].trim();
    if native_topic.is_empty() {
        return Err(BridgeError::malformed_tick(text, "empty instrument id"));
    }
    let timestamp = NaiveDateTime::parse_from_str(cols[1].trim(), TICK_TIMESTAMP_FORMAT)
        .map_err(|err| BridgeError::malformed_tick(text, err))?;
    let price = cols[2]
        .trim()
        .parse::<f64>()
        .map_err(|err| BridgeError::malformed_tick(text, err))?;
    let sec_id = topics
        .get(native_topic)
        .cloned()
        .unwrap_or_else(|| native_topic.to_string());
    Ok(Tick {
        native_topic: native_topic.to_string(),
        sec_id,
        timestamp,
        price,
        fields: BTreeMap::new(),
    })
}

/// A batch of ticks delivered together, keyed by external security id.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TickBatch {
    pub ticks: Vec<Tick>,
}

impl TickBatch {
    pub fn new(ticks: Vec<Tick>) -> Self {
        TickBatch { ticks }
    }

    pub fn single(tick: Tick) -> Self {
        TickBatch { ticks: vec![tick] }
    }

    pub fn sec_ids(&self) -> impl Iterator<Item = &str> {
        self.ticks.iter().map(|tick| tick.sec_id.as_str())
    }

    pub fn get(&self, sec_id: &str) -> Option<&Tick> {
        self.ticks.iter().find(|tick| tick.sec_id == sec_id)
    }

    pub fn contains(&self, sec_id: &str) -> bool {
        self.get(sec_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
