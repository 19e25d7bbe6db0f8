use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{domain::Mode, error::ResponseDecodeError};

/// Fields the remote service sends beyond the ones a mode knows about.
pub type ExtraFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailResponsePayload {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub end_point: Option<String>,
    /// Recipient of the generated reply.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Generated reply body.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_analysis", skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentPayload {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub end_point: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, deserialize_with = "lenient_analysis", skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub end_point: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub query_response: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagResults {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBasePayload {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub end_point: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
    #[serde(default, deserialize_with = "lenient_rag", skip_serializing_if = "Option::is_none")]
    pub rag_results: Option<RagResults>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Decoded response, tagged with the mode that was active when it was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "payload", rename_all = "snake_case")]
pub enum ResponseResult {
    EmailResponse(EmailResponsePayload),
    SentimentAnalysis(SentimentPayload),
    GeneralQuery(QueryPayload),
    KnowledgeBaseQuery(KnowledgeBasePayload),
}

impl ResponseResult {
    /// Decodes a response body into the variant for `mode`. The body only has
    /// to be a JSON object; every known field is optional.
    ///
    /// A known field whose value has an unusable shape (say an object where
    /// text is expected) is moved into `extra` under its own key.
    pub fn decode(mode: Mode, value: Value) -> Result<Self, ResponseDecodeError> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(ResponseDecodeError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };
        let displaced = displace_unusable(&mut fields, known_fields(mode));
        let value = Value::Object(fields);

        let mut result = match mode {
            Mode::EmailResponse => Self::EmailResponse(serde_json::from_value(value)?),
            Mode::SentimentAnalysis => Self::SentimentAnalysis(serde_json::from_value(value)?),
            Mode::GeneralQuery => Self::GeneralQuery(serde_json::from_value(value)?),
            Mode::KnowledgeBaseQuery => Self::KnowledgeBaseQuery(serde_json::from_value(value)?),
        };
        result.extra_mut().extend(displaced);
        Ok(result)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::EmailResponse(_) => Mode::EmailResponse,
            Self::SentimentAnalysis(_) => Mode::SentimentAnalysis,
            Self::GeneralQuery(_) => Mode::GeneralQuery,
            Self::KnowledgeBaseQuery(_) => Mode::KnowledgeBaseQuery,
        }
    }

    pub fn end_point(&self) -> Option<&str> {
        match self {
            Self::EmailResponse(p) => p.end_point.as_deref(),
            Self::SentimentAnalysis(p) => p.end_point.as_deref(),
            Self::GeneralQuery(p) => p.end_point.as_deref(),
            Self::KnowledgeBaseQuery(p) => p.end_point.as_deref(),
        }
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            Self::EmailResponse(p) => p.analysis.as_ref(),
            Self::SentimentAnalysis(p) => p.analysis.as_ref(),
            Self::GeneralQuery(_) | Self::KnowledgeBaseQuery(_) => None,
        }
    }

    pub fn extra(&self) -> &ExtraFields {
        match self {
            Self::EmailResponse(p) => &p.extra,
            Self::SentimentAnalysis(p) => &p.extra,
            Self::GeneralQuery(p) => &p.extra,
            Self::KnowledgeBaseQuery(p) => &p.extra,
        }
    }
}

impl ResponseResult {
    fn extra_mut(&mut self) -> &mut ExtraFields {
        match self {
            Self::EmailResponse(p) => &mut p.extra,
            Self::SentimentAnalysis(p) => &mut p.extra,
            Self::GeneralQuery(p) => &mut p.extra,
            Self::KnowledgeBaseQuery(p) => &mut p.extra,
        }
    }
}

#[derive(Clone, Copy)]
enum FieldShape {
    Text,
    Object,
    ObjectOrString,
}

impl FieldShape {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, value) => !value.is_array() && !value.is_object(),
            (Self::Object, value) => value.is_object(),
            (Self::ObjectOrString, value) => value.is_object() || value.is_string(),
        }
    }
}

fn known_fields(mode: Mode) -> &'static [(&'static str, FieldShape)] {
    use FieldShape::{Object, ObjectOrString, Text};
    match mode {
        Mode::EmailResponse => &[
            ("end_point", Text),
            ("sender", Text),
            ("subject", Text),
            ("body", Text),
            ("analysis", Object),
        ],
        Mode::SentimentAnalysis => &[
            ("end_point", Text),
            ("sender", Text),
            ("sentiment", Text),
            ("explanation", Text),
            ("analysis", Object),
        ],
        Mode::GeneralQuery => &[
            ("end_point", Text),
            ("user_query", Text),
            ("query_response", Text),
        ],
        Mode::KnowledgeBaseQuery => &[
            ("end_point", Text),
            ("user_query", Text),
            ("rag_results", ObjectOrString),
        ],
    }
}

fn displace_unusable(
    fields: &mut Map<String, Value>,
    known: &[(&'static str, FieldShape)],
) -> ExtraFields {
    let mut displaced = ExtraFields::new();
    for (key, shape) in known {
        let unusable = fields.get(*key).is_some_and(|value| !shape.accepts(value));
        if unusable {
            if let Some(value) = fields.remove(*key) {
                displaced.insert((*key).to_string(), value);
            }
        }
    }
    displaced
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(items.into_iter().filter_map(scalar_text).collect()),
        Some(Value::String(single)) => Some(vec![single]),
        _ => None,
    };
    Ok(list)
}

fn lenient_analysis<'de, D>(deserializer: D) -> Result<Option<Analysis>, D::Error>
where
    D: Deserializer<'de>,
{
    let analysis = match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    };
    Ok(analysis)
}

fn lenient_rag<'de, D>(deserializer: D) -> Result<Option<RagResults>, D::Error>
where
    D: Deserializer<'de>,
{
    let rag = match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        Some(Value::String(answer)) => Some(RagResults {
            answer: Some(answer),
            extra: ExtraFields::new(),
        }),
        _ => None,
    };
    Ok(rag)
}
