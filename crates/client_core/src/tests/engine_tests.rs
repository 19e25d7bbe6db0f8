use super::*;
use crate::registry::RETURN_POLICY_ANSWER;
use serde_json::json;
use shared::error::ErrorCode;

fn base_url() -> Url {
    Url::parse("http://assistant.test").expect("url")
}

fn engine() -> DispatchEngine {
    DispatchEngine::new(Arc::new(ModeRegistry::builtin()), &base_url()).expect("engine")
}

fn fill_email(engine: &mut DispatchEngine) {
    engine
        .edit_field(FieldName::Sender, "sarah.johnson@example.com")
        .expect("sender");
    engine
        .edit_field(FieldName::Subject, "Missing item")
        .expect("subject");
    engine
        .edit_field(FieldName::Body, "My headphones never arrived.")
        .expect("body");
}

#[test]
fn select_mode_always_resets_input_and_result() {
    let mut engine = engine();
    for mode in Mode::ALL {
        let fields = engine.descriptor().required_fields;
        for field in fields {
            engine.edit_field(*field, "draft").expect("edit");
        }
        assert!(!engine.input().is_empty());
        engine.select_mode(mode);
        assert_eq!(engine.mode(), mode);
        assert!(engine.input().is_empty());
        assert_eq!(engine.phase(), &Phase::Idle);
        assert!(engine.last_resolution().is_none());

        engine.select_mode(mode);
        assert!(engine.input().is_empty());
    }
}

#[test]
fn select_mode_clears_a_visible_resolution() {
    let mut engine = engine();
    engine.select_mode(Mode::GeneralQuery);
    engine
        .edit_field(FieldName::UserQuery, "Where is my order?")
        .expect("edit");
    let pending = engine.begin_submit().expect("submit");
    engine.resolve(&pending.token, Ok(json!({"query_response": "On its way"})));
    assert!(engine.last_resolution().is_some());

    engine.select_mode(Mode::SentimentAnalysis);
    assert!(engine.last_resolution().is_none());
}

#[test]
fn submit_with_missing_fields_is_rejected_without_state_change() {
    let mut engine = engine();
    engine.edit_field(FieldName::Sender, "a@b.c").expect("edit");
    engine.edit_field(FieldName::Subject, "   ").expect("edit");
    let before = engine.snapshot();

    let err = engine.begin_submit().expect_err("must reject");
    assert_eq!(
        err,
        DispatchError::Validation {
            mode: Mode::EmailResponse,
            missing: vec![FieldName::Subject, FieldName::Body],
        }
    );
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(err.missing_fields(), &[FieldName::Subject, FieldName::Body]);
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn fields_outside_the_active_mode_are_rejected() {
    let mut engine = engine();
    engine.select_mode(Mode::KnowledgeBaseQuery);
    let err = engine
        .edit_field(FieldName::Body, "not the query")
        .expect_err("body is not a query field");
    assert_eq!(
        err,
        DispatchError::FieldNotInMode {
            mode: Mode::KnowledgeBaseQuery,
            field: FieldName::Body,
        }
    );
    assert_eq!(err.code(), ErrorCode::Validation);
    assert!(engine.input().is_empty());
    assert_eq!(engine.missing_fields(), vec![FieldName::UserQuery]);

    engine.select_mode(Mode::EmailResponse);
    assert!(engine.edit_field(FieldName::UserQuery, "stale").is_err());
    assert_eq!(engine.input().user_query, "");
}

#[test]
fn envelope_carries_only_required_fields() {
    let mut engine = engine();
    fill_email(&mut engine);

    let pending = engine.begin_submit().expect("submit");
    assert_eq!(pending.envelope.mode, Mode::EmailResponse);
    assert_eq!(pending.envelope.target.as_str(), "http://assistant.test/home");
    assert_eq!(
        Value::Object(pending.envelope.body),
        json!({
            "sender": "sarah.johnson@example.com",
            "subject": "Missing item",
            "body": "My headphones never arrived."
        })
    );
    assert_eq!(engine.phase().kind(), PhaseKind::Submitting);
    assert_eq!(engine.snapshot().in_flight, Some(pending.token.request_id()));
}

#[test]
fn targets_keep_base_path_prefix() {
    let base = Url::parse("https://assistant.test/api/v1/").expect("url");
    let mut engine = DispatchEngine::with_mode(
        Arc::new(ModeRegistry::builtin()),
        &base,
        Mode::KnowledgeBaseQuery,
    )
    .expect("engine");
    engine.edit_field(FieldName::UserQuery, "hi").expect("edit");
    let pending = engine.begin_submit().expect("submit");
    assert_eq!(
        pending.envelope.target.as_str(),
        "https://assistant.test/api/v1/customer_care_team"
    );
}

#[test]
fn cannot_be_a_base_url_is_rejected() {
    let base = Url::parse("mailto:support@example.com").expect("url");
    let err = DispatchEngine::new(Arc::new(ModeRegistry::builtin()), &base)
        .err()
        .expect("must fail");
    assert!(matches!(err, DispatchError::InvalidBaseUrl(_)));
}

#[test]
fn incomplete_registry_is_rejected_up_front() {
    let registry = ModeRegistry::new(
        ModeRegistry::builtin()
            .iter()
            .filter(|d| d.mode != Mode::SentimentAnalysis)
            .cloned()
            .collect::<Vec<_>>(),
    );
    let err = DispatchEngine::new(Arc::new(registry), &base_url())
        .err()
        .expect("must fail");
    assert_eq!(
        err,
        DispatchError::UnknownMode("sentiment_analysis".to_string())
    );
}

#[test]
fn second_submit_while_in_flight_is_a_no_op() {
    let mut engine = engine();
    fill_email(&mut engine);
    let first = engine.begin_submit().expect("submit");
    let before = engine.snapshot();

    let err = engine.begin_submit().expect_err("in flight");
    assert_eq!(
        err,
        DispatchError::SubmissionInFlight {
            mode: Mode::EmailResponse
        }
    );
    assert_eq!(engine.snapshot(), before);
    assert_eq!(engine.snapshot().in_flight, Some(first.token.request_id()));
}

#[test]
fn edits_are_rejected_while_submitting() {
    let mut engine = engine();
    fill_email(&mut engine);
    engine.begin_submit().expect("submit");
    let err = engine
        .edit_field(FieldName::Body, "changed")
        .expect_err("busy");
    assert_eq!(
        err,
        DispatchError::EditWhileSubmitting {
            field: FieldName::Body
        }
    );
    assert_eq!(engine.input().body, "My headphones never arrived.");
}

#[test]
fn transport_failure_substitutes_registry_demo() {
    let mut engine = engine();
    engine.select_mode(Mode::GeneralQuery);
    engine
        .edit_field(FieldName::UserQuery, "What is your return policy?")
        .expect("edit");
    let pending = engine.begin_submit().expect("submit");

    let outcome = engine.resolve(
        &pending.token,
        Err(CallError::Transport("connection refused".to_string())),
    );
    let ResolveOutcome::Applied(resolution) = outcome else {
        panic!("expected applied resolution");
    };
    assert!(!resolution.succeeded);
    assert_eq!(resolution.mode, Mode::GeneralQuery);
    assert_eq!(
        &resolution.result,
        engine
            .registry()
            .demo_response(Mode::GeneralQuery)
            .expect("demo")
    );
    let ResponseResult::GeneralQuery(payload) = &resolution.result else {
        panic!("wrong variant");
    };
    assert_eq!(payload.query_response.as_deref(), Some(RETURN_POLICY_ANSWER));
    let notice = resolution.notice.as_ref().expect("fallback notice");
    assert_eq!(notice.code, ErrorCode::Transport);
    assert!(notice.message.contains("demo response"));
    assert_eq!(engine.phase(), &Phase::Resolved);
}

#[test]
fn decode_failure_also_falls_back() {
    let mut engine = engine();
    engine.select_mode(Mode::SentimentAnalysis);
    fill_email(&mut engine);
    let pending = engine.begin_submit().expect("submit");

    let ResolveOutcome::Applied(resolution) =
        engine.resolve(&pending.token, Ok(json!("plain text")))
    else {
        panic!("expected applied resolution");
    };
    assert!(!resolution.succeeded);
    assert_eq!(
        resolution.notice.as_ref().map(|n| n.code),
        Some(ErrorCode::Decode)
    );
    assert!(resolution.notice.as_ref().is_some_and(|n| n.code.is_remote_failure()));
    assert_eq!(resolution.result.mode(), Mode::SentimentAnalysis);
}

#[test]
fn success_passes_decoded_payload_through() {
    let mut engine = engine();
    engine.select_mode(Mode::SentimentAnalysis);
    fill_email(&mut engine);
    let pending = engine.begin_submit().expect("submit");

    let ResolveOutcome::Applied(resolution) = engine.resolve(
        &pending.token,
        Ok(json!({"end_point": "router", "sentiment": "Positive", "explanation": "Grateful tone", "model": "v2"})),
    ) else {
        panic!("expected applied resolution");
    };
    assert!(resolution.succeeded);
    assert!(resolution.notice.is_none());
    assert_eq!(resolution.result.extra().get("model"), Some(&json!("v2")));
    assert_eq!(engine.last_resolution(), Some(&resolution));
}

#[test]
fn resolution_after_mode_change_is_dropped() {
    let mut engine = engine();
    fill_email(&mut engine);
    let pending = engine.begin_submit().expect("submit");

    engine.select_mode(Mode::GeneralQuery);
    let outcome = engine.resolve(&pending.token, Ok(json!({"body": "late"})));
    assert_eq!(
        outcome,
        ResolveOutcome::Discarded {
            request_id: pending.token.request_id(),
            reason: DiscardReason::ModeChanged {
                submitted: Mode::EmailResponse,
                current: Mode::GeneralQuery,
            },
        }
    );
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.mode, Mode::GeneralQuery);
    assert_eq!(snapshot.phase, PhaseKind::Idle);
    assert!(snapshot.input.is_empty());
    assert!(snapshot.last_resolution.is_none());
}

#[test]
fn resolution_after_reselecting_same_mode_is_dropped() {
    let mut engine = engine();
    fill_email(&mut engine);
    let pending = engine.begin_submit().expect("submit");

    engine.select_mode(Mode::GeneralQuery);
    engine.select_mode(Mode::EmailResponse);
    let outcome = engine.resolve(&pending.token, Err(CallError::Status { status: 502 }));
    assert!(matches!(
        outcome,
        ResolveOutcome::Discarded {
            reason: DiscardReason::Superseded,
            ..
        }
    ));
    assert_eq!(engine.phase(), &Phase::Idle);
    assert!(engine.input().is_empty());
}

#[test]
fn stale_completion_leaves_newer_submission_in_flight() {
    let mut engine = engine();
    fill_email(&mut engine);
    let old = engine.begin_submit().expect("submit");

    engine.select_mode(Mode::SentimentAnalysis);
    engine.select_mode(Mode::EmailResponse);
    fill_email(&mut engine);
    let current = engine.begin_submit().expect("resubmit");
    assert_ne!(current.token.request_id(), old.token.request_id());

    let outcome = engine.resolve(&old.token, Ok(json!({"body": "late reply"})));
    assert_eq!(
        outcome,
        ResolveOutcome::Discarded {
            request_id: old.token.request_id(),
            reason: DiscardReason::Superseded,
        }
    );
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, PhaseKind::Submitting);
    assert_eq!(snapshot.in_flight, Some(current.token.request_id()));
    assert!(snapshot.last_resolution.is_none());

    let ResolveOutcome::Applied(resolution) =
        engine.resolve(&current.token, Ok(json!({"body": "fresh reply"})))
    else {
        panic!("expected applied resolution");
    };
    assert_eq!(resolution.request_id, current.token.request_id());
    assert!(resolution.succeeded);
}

#[test]
fn token_cannot_be_resolved_twice() {
    let mut engine = engine();
    engine.select_mode(Mode::GeneralQuery);
    engine.edit_field(FieldName::UserQuery, "hi").expect("edit");
    let pending = engine.begin_submit().expect("submit");
    assert!(matches!(
        engine.resolve(&pending.token, Ok(json!({"query_response": "hello"}))),
        ResolveOutcome::Applied(_)
    ));
    assert!(matches!(
        engine.resolve(&pending.token, Err(CallError::Status { status: 500 })),
        ResolveOutcome::Discarded {
            reason: DiscardReason::Superseded,
            ..
        }
    ));
    assert!(engine.last_resolution().expect("kept").succeeded);
}

#[test]
fn editing_after_resolution_keeps_result_until_next_submit() {
    let mut engine = engine();
    engine.select_mode(Mode::GeneralQuery);
    engine.edit_field(FieldName::UserQuery, "first").expect("edit");
    let first = engine.begin_submit().expect("submit");
    engine.resolve(&first.token, Ok(json!({"query_response": "one"})));

    engine.edit_field(FieldName::UserQuery, "second").expect("edit");
    assert_eq!(engine.phase(), &Phase::Idle);
    let visible = engine.last_resolution().expect("still visible");
    assert_eq!(visible.request_id, first.token.request_id());

    let second = engine.begin_submit().expect("resubmit");
    assert_eq!(
        engine.last_resolution().map(|r| r.request_id),
        Some(first.token.request_id())
    );
    engine.resolve(&second.token, Err(CallError::Timeout(std::time::Duration::from_secs(30))));
    let replaced = engine.last_resolution().expect("replaced");
    assert_eq!(replaced.request_id, second.token.request_id());
    assert!(!replaced.succeeded);
}

#[test]
fn dismissing_notice_keeps_demo_flagged() {
    let mut engine = engine();
    engine.select_mode(Mode::KnowledgeBaseQuery);
    engine
        .edit_field(FieldName::UserQuery, "How do I track my order?")
        .expect("edit");
    let pending = engine.begin_submit().expect("submit");
    engine.resolve(&pending.token, Err(CallError::Status { status: 404 }));

    assert!(engine.dismiss_notice());
    assert!(!engine.dismiss_notice());
    let resolution = engine.last_resolution().expect("resolution");
    assert!(resolution.notice.is_none());
    assert!(!resolution.succeeded);
    assert_eq!(resolution.result.mode(), Mode::KnowledgeBaseQuery);
}
