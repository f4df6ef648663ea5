//! Wire-level quiz data as produced by the backend.
//!
//! Questions are generated by a language model, so deserialization is lenient:
//! missing or `null` fields default to empty and an unusable `options` value is
//! kept as [`Options::Broken`] instead of failing the whole batch.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Opaque session identifier issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer choices keyed by short label ("A", "B", ...), in the order received.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Options {
    Valid(IndexMap<String, String>),
    /// Missing, empty, or not a label -> text mapping.
    #[default]
    Broken,
}

impl Options {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: IndexMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if map.is_empty() {
            Options::Broken
        } else {
            Options::Valid(map)
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Options::Broken)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        match self {
            Options::Valid(map) => map.get(label).map(String::as_str),
            Options::Broken => None,
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let map = match self {
            Options::Valid(map) => Some(map),
            Options::Broken => None,
        };
        map.into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        match self {
            Options::Valid(map) => map.len(),
            Options::Broken => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOptions {
    Map(IndexMap<String, Value>),
    Other(Value),
}

fn option_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawOptions::deserialize(deserializer)? {
            RawOptions::Map(map) => {
                Options::from_pairs(map.into_iter().map(|(k, v)| (k, option_text(v))))
            }
            RawOptions::Other(_) => Options::Broken,
        })
    }
}

impl Serialize for Options {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Options::Valid(map) => map.serialize(serializer),
            Options::Broken => serializer.serialize_none(),
        }
    }
}

/// One multiple-choice question. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question", default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default)]
    pub options: Options,
    #[serde(rename = "correct_answer", default, deserialize_with = "null_as_default")]
    pub correct_answer_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reference: String,
}

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        options: Options,
        correct_answer_label: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_answer_label: correct_answer_label.into(),
            reference: reference.into(),
        }
    }

    /// A question whose options cannot be answered; the user may skip it.
    pub fn is_broken(&self) -> bool {
        self.options.is_broken()
    }
}

/// Questions produced by one backend call. Empty means "no more questions".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBatch {
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<Question>,
}

/// `null` reads the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl QuestionBatch {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }
}

impl IntoIterator for QuestionBatch {
    type Item = Question;
    type IntoIter = std::vec::IntoIter<Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.into_iter()
    }
}

/// Successful response of the upload endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StartedQuiz {
    pub session_id: SessionId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quiz: QuestionBatch,
}
