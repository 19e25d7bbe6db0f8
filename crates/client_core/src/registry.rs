//! Static catalog of the modes the dispatcher supports.

use std::collections::BTreeMap;

use serde_json::json;
use shared::{
    domain::{FieldName, Mode},
    protocol::{
        Analysis, EmailResponsePayload, ExtraFields, KnowledgeBasePayload, QueryPayload,
        RagResults, ResponseResult, SentimentPayload,
    },
};

use crate::error::DispatchError;

const EMAIL_FIELDS: &[FieldName] = &[FieldName::Sender, FieldName::Subject, FieldName::Body];
const QUERY_FIELDS: &[FieldName] = &[FieldName::UserQuery];

pub const RETURN_POLICY_ANSWER: &str = "Our return policy allows you to return most items within 30 days of delivery for a full refund. Please ensure the items are in their original condition and packaging. For more details, visit our Returns & Refunds page.";

const DEMO_SENDER: &str = "sarah.johnson@example.com";
const DEMO_SUBJECT: &str = "Order #12345 - Missing item in my delivery";
const DEMO_SENTIMENT: &str = "Neutral with slight frustration (94% confidence)";
const DEMO_EMAIL_BODY: &str = "Hi Sarah,

Thank you for reaching out about your incomplete order #12345. I'm sorry to hear that your Premium Wireless Headphones (SKU: WH-2000) were missing from your delivery.

I've verified your order in our system and can confirm that these headphones were indeed part of your purchase. I'll immediately arrange for the missing item to be shipped to you with expedited delivery at no extra cost.

You should receive a shipping confirmation email within the next 24 hours. As a token of our apology for this inconvenience, I've also added a 10% discount to your account for your next purchase.

Is there anything else you need help with regarding your order?

Best regards,
[Agent Name]
Customer Support Team";

#[derive(Debug, Clone, PartialEq)]
pub struct ModeDescriptor {
    pub mode: Mode,
    pub label: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [FieldName],
    pub target_path: &'static str,
    pub demo_response: ResponseResult,
}

impl ModeDescriptor {
    pub fn requires(&self, field: FieldName) -> bool {
        self.required_fields.contains(&field)
    }
}

#[derive(Debug, Clone)]
pub struct ModeRegistry {
    descriptors: BTreeMap<Mode, ModeDescriptor>,
}

impl ModeRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = ModeDescriptor>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.mode, descriptor))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(Mode::ALL.into_iter().map(builtin_descriptor))
    }

    pub fn describe(&self, mode: Mode) -> Result<&ModeDescriptor, DispatchError> {
        self.descriptors
            .get(&mode)
            .ok_or_else(|| DispatchError::UnknownMode(mode.id().to_string()))
    }

    pub fn describe_id(&self, id: &str) -> Result<&ModeDescriptor, DispatchError> {
        self.describe(id.parse::<Mode>()?)
    }

    pub fn demo_response(&self, mode: Mode) -> Result<&ResponseResult, DispatchError> {
        Ok(&self.describe(mode)?.demo_response)
    }

    pub fn covers_all_modes(&self) -> bool {
        Mode::ALL
            .iter()
            .all(|mode| self.descriptors.contains_key(mode))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeDescriptor> {
        self.descriptors.values()
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_descriptor(mode: Mode) -> ModeDescriptor {
    match mode {
        Mode::EmailResponse => ModeDescriptor {
            mode,
            label: "Email Response",
            description: "Generate AI-powered email responses with intelligent context understanding",
            required_fields: EMAIL_FIELDS,
            target_path: "/home",
            demo_response: ResponseResult::EmailResponse(EmailResponsePayload {
                end_point: Some(mode.end_point().to_string()),
                sender: Some(DEMO_SENDER.to_string()),
                subject: Some(DEMO_SUBJECT.to_string()),
                body: Some(DEMO_EMAIL_BODY.to_string()),
                analysis: Some(demo_analysis()),
                extra: ExtraFields::new(),
            }),
        },
        Mode::SentimentAnalysis => ModeDescriptor {
            mode,
            label: "Sentiment Analysis",
            description: "Analyze email sentiment, mood, and emotional context with AI precision",
            required_fields: EMAIL_FIELDS,
            target_path: "/router",
            demo_response: ResponseResult::SentimentAnalysis(SentimentPayload {
                end_point: Some(mode.end_point().to_string()),
                sender: Some(DEMO_SENDER.to_string()),
                sentiment: Some(DEMO_SENTIMENT.to_string()),
                explanation: Some(
                    "The customer is polite but expresses concern about a missing item, indicating slight frustration."
                        .to_string(),
                ),
                analysis: Some(demo_analysis()),
                extra: ExtraFields::new(),
            }),
        },
        Mode::GeneralQuery => ModeDescriptor {
            mode,
            label: "General Query",
            description: "Ask questions and get intelligent AI responses for any topic",
            required_fields: QUERY_FIELDS,
            target_path: "/query",
            demo_response: ResponseResult::GeneralQuery(QueryPayload {
                end_point: Some(mode.end_point().to_string()),
                user_query: Some("What is your return policy?".to_string()),
                query_response: Some(RETURN_POLICY_ANSWER.to_string()),
                extra: ExtraFields::new(),
            }),
        },
        Mode::KnowledgeBaseQuery => ModeDescriptor {
            mode,
            label: "Knowledge Base",
            description: "Answer customer care questions from the support knowledge base",
            required_fields: QUERY_FIELDS,
            target_path: "/customer_care_team",
            demo_response: ResponseResult::KnowledgeBaseQuery(KnowledgeBasePayload {
                end_point: Some(mode.end_point().to_string()),
                user_query: Some("How do I track my order?".to_string()),
                rag_results: Some(RagResults {
                    answer: Some(
                        "You can track your order from the Orders page of your account. Each shipment has a tracking link that becomes active within 24 hours of dispatch."
                            .to_string(),
                    ),
                    extra: ExtraFields::from([(
                        "sources".to_string(),
                        json!(["Shipping & Delivery FAQ", "Order Tracking Guide"]),
                    )]),
                }),
                extra: ExtraFields::new(),
            }),
        },
    }
}

fn demo_analysis() -> Analysis {
    Analysis {
        intent: Some("Report Missing Item (98% confidence)".to_string()),
        sentiment: Some(DEMO_SENTIMENT.to_string()),
        urgency: Some("Medium (96% confidence)".to_string()),
        entities: Some(vec![
            "Order #12345".to_string(),
            "Premium Wireless Headphones".to_string(),
            "SKU: WH-2000".to_string(),
        ]),
        context: Some(vec![
            "Order verified in system".to_string(),
            "Repeat customer, 5 previous orders".to_string(),
            "No previous issues reported".to_string(),
        ]),
    }
}
