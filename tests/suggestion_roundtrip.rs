//! A message assembled purely from the engine's own suggestions must
//! tokenize cleanly and be structurally complete.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tac_engine::suggest::{
    FetchOutcome, ProviderConfig, ProviderRequest, Suggestion, SyncProvider,
};
use tokio_util::sync::CancellationToken;

fn apply(message: &mut String, suggestion: &Suggestion) {
    if suggestion.append_to_previous {
        message.push_str(&suggestion.text);
    } else {
        if !message.is_empty() {
            message.push(' ');
        }
        message.push_str(&suggestion.text);
    }
}

/// A suggestion the walk can insert verbatim.
fn insertable(suggestion: &Suggestion) -> bool {
    !suggestion.skip_to_next
        && !suggestion.auto_only
        && !suggestion.is_category
        && suggestion.provider.is_none()
        && !suggestion.text.is_empty()
}

#[tokio::test]
async fn first_suggestion_walk_builds_a_valid_metar() {
    let ctx = common::metar_context();
    let grammar = ctx.grammars().get("METAR", None).unwrap();

    let mut message = String::new();
    for _ in 0..16 {
        let suggestions = ctx.suggest_at_end(Some(&grammar), &message).await;
        let Some(next) = suggestions.iter().find(|s| insertable(s)) else {
            break;
        };
        apply(&mut message, next);
    }

    let report = ctx.validate_message("METAR", None, &message).unwrap();
    assert!(
        report.errors.is_empty(),
        "\"{message}\" has errors: {:?}",
        report.errors
    );
    assert!(
        report.missing_required.is_empty(),
        "\"{message}\" is incomplete: {:?}",
        report.missing_required
    );
}

#[tokio::test]
async fn datetime_suggestion_matches_the_token_pattern() {
    let ctx = common::metar_context();
    let grammar = ctx.grammars().get("METAR", None).unwrap();

    let suggestions = ctx
        .suggest_at_end(Some(&grammar), "METAR LFPG")
        .await;
    let dtg = &suggestions[0];
    assert_eq!(dtg.token_id.as_deref(), Some("day-hour-minute"));

    // The dynamic value must itself tokenize as the token it suggests
    let message = format!("METAR LFPG {}", dtg.text);
    let tokens = ctx.tokenize("METAR", None, &message).unwrap();
    assert!(tokens.iter().all(|t| !t.has_error()), "{message}: {tokens:?}");
}

#[tokio::test]
async fn cloud_qualifier_is_not_reoffered_once_appended() {
    let ctx = common::metar_context();
    let grammar = ctx.grammars().get("METAR", None).unwrap();

    let before = ctx
        .suggest_at_end(Some(&grammar), "METAR LFPG 271130Z 27010KT 9999 SCT040")
        .await;
    assert!(before.iter().any(|s| s.text == "CB" && s.append_to_previous));

    let after = ctx
        .suggest_at_end(Some(&grammar), "METAR LFPG 271130Z 27010KT 9999 SCT040CB")
        .await;
    assert!(!after.iter().any(|s| s.text == "CB"));
}

#[tokio::test]
async fn station_provider_resolves_and_caches_through_the_context() {
    let ctx = common::metar_context();
    let grammar = ctx.grammars().get("METAR", None).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    ctx.suggestions()
        .providers()
        .register_pattern(
            "sa.*.*.station",
            Arc::new(SyncProvider(move |_: &ProviderRequest| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(vec![
                    serde_json::from_str(r#"{"text": "LFBO", "description": "Toulouse-Blagnac"}"#)
                        .unwrap(),
                ])
            })),
            ProviderConfig {
                cache: Some(tac_engine::suggest::CachePolicy::Indefinite),
                ..Default::default()
            },
        )
        .unwrap();

    // The derivation step defers: the provider is tagged, not called
    let deferred = ctx.suggest_at_end(Some(&grammar), "METAR").await;
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].provider.as_deref(), Some("sa.*.*.station"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Triggering the fetch resolves, and a second trigger is served from
    // cache without another call
    for _ in 0..2 {
        let outcome = ctx
            .fetch_suggestions(
                "sa.*.*.station",
                Some(&grammar),
                ProviderRequest {
                    token_type: Some("station".to_string()),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await;
        let FetchOutcome::Resolved(items) = outcome else {
            panic!("expected resolved outcome");
        };
        assert_eq!(items[0].text, "LFBO");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
