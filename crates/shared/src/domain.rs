use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    EmailResponse,
    SentimentAnalysis,
    GeneralQuery,
    KnowledgeBaseQuery,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::EmailResponse,
        Mode::SentimentAnalysis,
        Mode::GeneralQuery,
        Mode::KnowledgeBaseQuery,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Mode::EmailResponse => "email_response",
            Mode::SentimentAnalysis => "sentiment_analysis",
            Mode::GeneralQuery => "general_query",
            Mode::KnowledgeBaseQuery => "knowledge_base_query",
        }
    }

    /// Tag the remote service echoes back in `end_point`.
    pub fn end_point(self) -> &'static str {
        match self {
            Mode::EmailResponse => "home",
            Mode::SentimentAnalysis => "router",
            Mode::GeneralQuery => "query",
            Mode::KnowledgeBaseQuery => "customer_care_team",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.id() == raw)
            .ok_or_else(|| UnknownMode(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Sender,
    Subject,
    Body,
    UserQuery,
}

impl FieldName {
    pub const ALL: [FieldName; 4] = [
        FieldName::Sender,
        FieldName::Subject,
        FieldName::Body,
        FieldName::UserQuery,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            FieldName::Sender => "sender",
            FieldName::Subject => "subject",
            FieldName::Body => "body",
            FieldName::UserQuery => "user_query",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Draft values for every input field any mode can ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub user_query: String,
}

impl InputState {
    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::Sender => &self.sender,
            FieldName::Subject => &self.subject,
            FieldName::Body => &self.body,
            FieldName::UserQuery => &self.user_query,
        }
    }

    pub fn set(&mut self, field: FieldName, value: impl Into<String>) {
        let slot = match field {
            FieldName::Sender => &mut self.sender,
            FieldName::Subject => &mut self.subject,
            FieldName::Body => &mut self.body,
            FieldName::UserQuery => &mut self.user_query,
        };
        *slot = value.into();
    }

    /// Presence check only: whitespace-only counts as missing.
    pub fn is_present(&self, field: FieldName) -> bool {
        !self.get(field).trim().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        FieldName::ALL
            .into_iter()
            .all(|field| self.get(field).is_empty())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
