//! Plain-text rendering of a resolution for the terminal.

use std::fmt::Write as _;

use client_core::{normalize, DisplayAnalysis, DisplayRecord, ModeRegistry, Resolution};

pub fn render_resolution(resolution: &Resolution) -> String {
    let mut out = String::new();
    let marker = if resolution.succeeded {
        "LIVE RESPONSE"
    } else {
        "DEMO FALLBACK (not from the remote service)"
    };
    let _ = writeln!(out, "== {marker} [{}] ==", resolution.mode);
    if let Some(notice) = &resolution.notice {
        let _ = writeln!(out, "! {}", notice.message);
    }
    out.push_str(&render_record(&normalize(&resolution.result)));
    out
}

pub fn render_record(record: &DisplayRecord) -> String {
    let mut out = String::new();
    match record {
        DisplayRecord::EmailResponse {
            recipient,
            subject,
            generated_body,
            analysis,
        } => {
            field(&mut out, "To", recipient);
            field(&mut out, "Subject", subject);
            block(&mut out, "Generated Response", generated_body);
            render_analysis(&mut out, analysis);
        }
        DisplayRecord::SentimentAnalysis {
            sender,
            sentiment_label,
            explanation,
            analysis,
        } => {
            field(&mut out, "From", sender);
            field(&mut out, "Detected Sentiment", sentiment_label);
            block(&mut out, "Analysis Explanation", explanation);
            render_analysis(&mut out, analysis);
        }
        DisplayRecord::GeneralQuery {
            query_text,
            answer_text,
        } => {
            field(&mut out, "Query", query_text);
            block(&mut out, "AI Response", answer_text);
        }
        DisplayRecord::KnowledgeBaseQuery {
            query_text,
            answer,
            raw_extra,
        } => {
            field(&mut out, "Query", query_text);
            block(&mut out, "Answer", answer);
            for (key, value) in raw_extra {
                let _ = writeln!(out, "{key}: {value}");
            }
        }
    }
    out
}

pub fn render_catalog(registry: &ModeRegistry) -> String {
    let mut out = String::new();
    for descriptor in registry.iter() {
        let fields = descriptor
            .required_fields
            .iter()
            .map(|field| field.wire_name())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{:<22} {:<21} [{fields}]\n    {}: {}",
            descriptor.mode.id(),
            descriptor.target_path,
            descriptor.label,
            descriptor.description
        );
    }
    out
}

fn field(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "{label}: {value}");
    }
}

fn block(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "{label}:\n{value}");
    }
}

fn render_analysis(out: &mut String, analysis: &DisplayAnalysis) {
    if analysis.is_empty() {
        return;
    }
    out.push_str("-- AI Analysis --\n");
    field(out, "Intent", &analysis.intent);
    field(out, "Sentiment", &analysis.sentiment);
    field(out, "Urgency", &analysis.urgency);
    list(out, "Entities Detected", &analysis.entities);
    list(out, "Customer Context", &analysis.context);
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{label}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_without_analysis_renders_core_fields_only() {
        let rendered = render_record(&DisplayRecord::SentimentAnalysis {
            sender: String::new(),
            sentiment_label: "Positive".to_string(),
            explanation: "Grateful tone".to_string(),
            analysis: DisplayAnalysis::default(),
        });
        assert_eq!(
            rendered,
            "Detected Sentiment: Positive\nAnalysis Explanation:\nGrateful tone\n"
        );
    }

    #[test]
    fn catalog_lists_every_mode() {
        let rendered = render_catalog(&ModeRegistry::builtin());
        for id in [
            "email_response",
            "sentiment_analysis",
            "general_query",
            "knowledge_base_query",
        ] {
            assert!(rendered.contains(id), "missing {id}");
        }
        assert!(rendered.contains("/customer_care_team"));
    }
}
