//! Envelope - broker に送る 1 リクエスト分のデータ
//!
//! Wire format:
//! ```text
//! {"data": [{"topic": "t1", "payload": {...}}, {"topic": "t2", "payload": {...}}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::HeraldError;
use super::ids::MessageId;

/// One `{topic, payload}` record of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Value,
}

/// One payload fanned out to one or more topics, sent in a single request.
///
/// Built fresh per publish call. Only `data` is serialized; the id stays local.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(skip)]
    id: MessageId,
    data: Vec<TopicMessage>,
}

impl Envelope {
    /// Build an envelope: one record per topic, in input order, all carrying
    /// the same payload.
    ///
    /// A `null` payload is sent as `{}`. Any other non-object payload, an
    /// empty topic list or a blank topic name is rejected.
    pub fn build<I, S>(payload: Value, topics: I) -> Result<Self, HeraldError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let payload = normalize_payload(payload)?;

        let mut data = Vec::new();
        for (index, topic) in topics.into_iter().enumerate() {
            let topic = topic.into();
            if topic.trim().is_empty() {
                return Err(HeraldError::InvalidTopic { index });
            }
            data.push(TopicMessage {
                topic,
                payload: payload.clone(),
            });
        }

        if data.is_empty() {
            return Err(HeraldError::NoTopics);
        }

        Ok(Self {
            id: MessageId::generate(),
            data,
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn data(&self) -> &[TopicMessage] {
        &self.data
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|m| m.topic.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Merge the singular `topic` and the `topics` list into one ordered list:
/// the list first, then the singular topic.
pub fn combine_topics<S: AsRef<str>>(topic: Option<&str>, topics: &[S]) -> Vec<String> {
    topics
        .iter()
        .map(|t| t.as_ref().to_string())
        .chain(topic.map(str::to_string))
        .collect()
}

fn normalize_payload(payload: Value) -> Result<Value, HeraldError> {
    match payload {
        Value::Object(_) => Ok(payload),
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Bool(_) => Err(HeraldError::InvalidPayload { found: "boolean" }),
        Value::Number(_) => Err(HeraldError::InvalidPayload { found: "number" }),
        Value::String(_) => Err(HeraldError::InvalidPayload { found: "string" }),
        Value::Array(_) => Err(HeraldError::InvalidPayload { found: "array" }),
    }
}
