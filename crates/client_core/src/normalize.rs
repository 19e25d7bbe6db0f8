//! Projection of decoded responses into fully-defaulted display records.

use serde::{Deserialize, Serialize};
use shared::protocol::{
    Analysis, EmailResponsePayload, ExtraFields, KnowledgeBasePayload, QueryPayload, RagResults,
    ResponseResult, SentimentPayload,
};

/// Prefix for top-level knowledge-base fields merged into `raw_extra`, which
/// otherwise holds what came inside `rag_results`.
pub const RESPONSE_EXTRA_PREFIX: &str = "response.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAnalysis {
    pub intent: String,
    pub sentiment: String,
    pub urgency: String,
    pub entities: Vec<String>,
    pub context: Vec<String>,
}

impl DisplayAnalysis {
    pub fn is_empty(&self) -> bool {
        self.intent.is_empty()
            && self.sentiment.is_empty()
            && self.urgency.is_empty()
            && self.entities.is_empty()
            && self.context.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisplayRecord {
    EmailResponse {
        recipient: String,
        subject: String,
        generated_body: String,
        analysis: DisplayAnalysis,
    },
    SentimentAnalysis {
        sender: String,
        sentiment_label: String,
        explanation: String,
        analysis: DisplayAnalysis,
    },
    GeneralQuery {
        query_text: String,
        answer_text: String,
    },
    KnowledgeBaseQuery {
        query_text: String,
        answer: String,
        raw_extra: ExtraFields,
    },
}

pub fn normalize(result: &ResponseResult) -> DisplayRecord {
    match result {
        ResponseResult::EmailResponse(payload) => DisplayRecord::EmailResponse {
            recipient: text(&payload.sender),
            subject: text(&payload.subject),
            generated_body: text(&payload.body),
            analysis: normalize_analysis(payload.analysis.as_ref()),
        },
        ResponseResult::SentimentAnalysis(payload) => DisplayRecord::SentimentAnalysis {
            sender: text(&payload.sender),
            sentiment_label: text(&payload.sentiment),
            explanation: text(&payload.explanation),
            analysis: normalize_analysis(payload.analysis.as_ref()),
        },
        ResponseResult::GeneralQuery(payload) => DisplayRecord::GeneralQuery {
            query_text: text(&payload.user_query),
            answer_text: text(&payload.query_response),
        },
        ResponseResult::KnowledgeBaseQuery(payload) => {
            let rag = payload.rag_results.as_ref();
            let mut raw_extra = rag.map(|rag| rag.extra.clone()).unwrap_or_default();
            raw_extra.extend(payload.extra.iter().map(|(key, value)| {
                (format!("{RESPONSE_EXTRA_PREFIX}{key}"), value.clone())
            }));
            DisplayRecord::KnowledgeBaseQuery {
                query_text: text(&payload.user_query),
                answer: rag.map(|rag| text(&rag.answer)).unwrap_or_default(),
                raw_extra,
            }
        }
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn normalize_analysis(analysis: Option<&Analysis>) -> DisplayAnalysis {
    let Some(analysis) = analysis else {
        return DisplayAnalysis::default();
    };
    DisplayAnalysis {
        intent: text(&analysis.intent),
        sentiment: text(&analysis.sentiment),
        urgency: text(&analysis.urgency),
        entities: analysis.entities.clone().unwrap_or_default(),
        context: analysis.context.clone().unwrap_or_default(),
    }
}

impl From<DisplayAnalysis> for Analysis {
    fn from(value: DisplayAnalysis) -> Self {
        Self {
            intent: Some(value.intent),
            sentiment: Some(value.sentiment),
            urgency: Some(value.urgency),
            entities: Some(value.entities),
            context: Some(value.context),
        }
    }
}

/// Lifts a display record back into a response so it can be re-normalized.
impl From<DisplayRecord> for ResponseResult {
    fn from(value: DisplayRecord) -> Self {
        match value {
            DisplayRecord::EmailResponse {
                recipient,
                subject,
                generated_body,
                analysis,
            } => Self::EmailResponse(EmailResponsePayload {
                sender: Some(recipient),
                subject: Some(subject),
                body: Some(generated_body),
                analysis: Some(analysis.into()),
                ..Default::default()
            }),
            DisplayRecord::SentimentAnalysis {
                sender,
                sentiment_label,
                explanation,
                analysis,
            } => Self::SentimentAnalysis(SentimentPayload {
                sender: Some(sender),
                sentiment: Some(sentiment_label),
                explanation: Some(explanation),
                analysis: Some(analysis.into()),
                ..Default::default()
            }),
            DisplayRecord::GeneralQuery {
                query_text,
                answer_text,
            } => Self::GeneralQuery(QueryPayload {
                user_query: Some(query_text),
                query_response: Some(answer_text),
                ..Default::default()
            }),
            DisplayRecord::KnowledgeBaseQuery {
                query_text,
                answer,
                raw_extra,
            } => Self::KnowledgeBaseQuery(KnowledgeBasePayload {
                user_query: Some(query_text),
                rag_results: Some(RagResults {
                    answer: Some(answer),
                    extra: raw_extra,
                }),
                ..Default::default()
            }),
        }
    }
}

impl DisplayRecord {
    /// Normalizing an already-normalized record returns it unchanged.
    pub fn normalize(self) -> DisplayRecord {
        normalize(&ResponseResult::from(self))
    }
}

#[cfg(test)]
#[path = "tests/normalize_tests.rs"]
mod tests;
