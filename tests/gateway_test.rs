//! End-to-end tests for the request pipeline with mocked backend, cache and
//! run sink.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    CountingStore, EchoBackend, StubBackend, azure_provider, gateway, openai_provider,
    unconfigured,
};
use llmops_gateway::cache::NoopCacheStore;
use llmops_gateway::config::GatewayConfig;
use llmops_gateway::providers::selector::{AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_KEY, OPENAI_API_KEY};
use llmops_gateway::providers::{ProviderKind, select};
use llmops_gateway::telemetry::MemoryRunSink;
use llmops_gateway::{ChatGateway, ChatRequest, ErrorKind, GatewayError, Message, Role};

fn two_plus_two() -> ChatRequest {
    ChatRequest::new(vec![Message::user("2+2?")]).temperature(0.3)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_cold_cache_calls_backend() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::new();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), store.clone(), sink.clone());

    let response = gateway.handle(&two_plus_two()).await.unwrap();

    assert_eq!(response.content, "4");
    assert!(!response.cache_hit);
    assert_eq!(response.provider, ProviderKind::OpenAi);
    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(backend.calls(), 1);
    assert_eq!(store.sets(), 1);

    let runs = sink.runs();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].cache_hit);
    assert!(!runs[0].error);
    assert_eq!(runs[0].trace_id, response.trace_id);
    assert_eq!(runs[0].temperature, 0.3);
    assert_eq!(runs[0].usage.map(|u| u.total_tokens), Some(13));
    assert!(runs[0].timings.backend_ms.is_some());
    assert!(runs[0].timings.render_ms.is_some());
    assert!(runs[0].timings.total_ms.is_some());
}

#[tokio::test]
async fn scenario_b_warm_cache_skips_backend() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::new();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), store.clone(), sink.clone());

    let first = gateway.handle(&two_plus_two()).await.unwrap();
    let second = gateway.handle(&two_plus_two()).await.unwrap();

    assert_eq!(first.content, "4");
    assert_eq!(second.content, "4");
    assert!(second.cache_hit);
    assert_eq!(second.usage, first.usage);
    assert_eq!(backend.calls(), 1);
    assert_eq!(store.sets(), 1);

    let runs = sink.runs();
    assert_eq!(runs.len(), 2);
    assert!(runs[1].cache_hit);
    assert!(runs[1].timings.backend_ms.is_none());
    assert!(runs[1].timings.render_ms.is_none());
    assert_ne!(runs[0].trace_id, runs[1].trace_id);
}

#[tokio::test]
async fn scenario_c_no_provider_is_configuration_error() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::new();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(unconfigured(), backend.clone(), store.clone(), sink.clone());

    let err = gateway.handle(&two_plus_two()).await.unwrap_err();

    assert!(matches!(err, GatewayError::NoProvider(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!err.is_backend());
    assert_eq!(backend.calls(), 0);
    assert_eq!(store.sets(), 0);

    let runs = sink.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].error);
    assert_eq!(runs[0].error_kind, Some(ErrorKind::Configuration));
    assert!(runs[0].timings.backend_ms.is_none());
}

#[tokio::test]
async fn scenario_d_backend_failure_is_not_cached() {
    let backend = StubBackend::failing();
    let store = CountingStore::new();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), store.clone(), sink.clone());

    let err = gateway.handle(&two_plus_two()).await.unwrap_err();

    assert!(err.is_backend());
    assert!(!err.is_configuration());
    assert_eq!(backend.calls(), 1);
    assert_eq!(store.sets(), 0);

    let runs = sink.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].error);
    assert_eq!(runs[0].error_kind, Some(ErrorKind::Backend));
    assert!(
        runs[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("upstream exploded"))
    );

    // A later identical request is still a miss.
    let _ = gateway.handle(&two_plus_two()).await;
    assert_eq!(backend.calls(), 2);
}

// ============================================================================
// Provider selection
// ============================================================================

#[tokio::test]
async fn precedence_drives_the_pipeline() {
    let both = GatewayConfig::from_lookup(|key| match key {
        AZURE_OPENAI_KEY => Some("az".to_string()),
        AZURE_OPENAI_ENDPOINT => Some("https://example.openai.azure.com".to_string()),
        OPENAI_API_KEY => Some("sk".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(select(&both.providers).kind(), ProviderKind::Azure);

    let openai_only = GatewayConfig::from_lookup(|key| match key {
        OPENAI_API_KEY => Some("sk".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(select(&openai_only.providers).kind(), ProviderKind::OpenAi);

    let neither = GatewayConfig::from_lookup(|_| None).unwrap();
    let provider = select(&neither.providers);
    assert_eq!(provider.kind(), ProviderKind::None);

    let backend = StubBackend::replying("4");
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(provider, backend.clone(), Arc::new(NoopCacheStore), sink.clone());
    let err = gateway.handle(&two_plus_two()).await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(backend.calls(), 0);
    assert!(sink.runs()[0].error);
}

#[tokio::test]
async fn azure_target_reaches_backend() {
    let backend = StubBackend::replying("4");
    let gateway = gateway(
        azure_provider(),
        backend.clone(),
        CountingStore::new(),
        Arc::new(MemoryRunSink::new()),
    );

    let response = gateway.handle(&two_plus_two()).await.unwrap();
    assert_eq!(response.provider, ProviderKind::Azure);

    let sent = backend.last_request().unwrap();
    assert!(!sent.target.model_in_body);
    assert!(
        sent.target
            .url
            .contains("/openai/deployments/gpt-4o-mini/chat/completions?api-version=")
    );
}

// ============================================================================
// Cache behaviour
// ============================================================================

#[tokio::test]
async fn failing_cache_get_still_answers() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::failing_get();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), store.clone(), sink.clone());

    for _ in 0..3 {
        let response = gateway.handle(&two_plus_two()).await.unwrap();
        assert_eq!(response.content, "4");
        assert!(!response.cache_hit);
    }

    assert_eq!(backend.calls(), 3);
    assert_eq!(store.gets(), 3);
    assert!(sink.runs().iter().all(|r| !r.error && !r.cache_hit));
    assert!(!gateway.health().await.cache_ok);
}

#[tokio::test]
async fn failing_cache_set_still_answers() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::failing_set();
    let gateway = gateway(
        openai_provider(),
        backend.clone(),
        store.clone(),
        Arc::new(MemoryRunSink::new()),
    );

    assert_eq!(gateway.handle(&two_plus_two()).await.unwrap().content, "4");
    assert_eq!(gateway.handle(&two_plus_two()).await.unwrap().content, "4");
    assert_eq!(store.sets(), 2);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn department_does_not_split_the_cache() {
    let backend = StubBackend::replying("4");
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(
        openai_provider(),
        backend.clone(),
        CountingStore::new(),
        sink.clone(),
    );

    let finance = two_plus_two().metadata("department", "finance");
    let legal = two_plus_two().metadata("department", "legal");

    assert!(!gateway.handle(&finance).await.unwrap().cache_hit);
    assert!(gateway.handle(&legal).await.unwrap().cache_hit);
    assert_eq!(backend.calls(), 1);

    let runs = sink.runs();
    assert_eq!(runs[0].department, "finance");
    assert_eq!(runs[1].department, "legal");
}

#[tokio::test]
async fn sampling_change_is_a_miss() {
    let backend = StubBackend::replying("4");
    let gateway = gateway(
        openai_provider(),
        backend.clone(),
        CountingStore::new(),
        Arc::new(MemoryRunSink::new()),
    );

    gateway.handle(&two_plus_two()).await.unwrap();
    let hotter = gateway.handle(&two_plus_two().temperature(0.9)).await.unwrap();
    assert!(!hotter.cache_hit);
    let longer = gateway.handle(&two_plus_two().max_tokens(2048)).await.unwrap();
    assert!(!longer.cache_hit);
    let other_model = gateway.handle(&two_plus_two().model("gpt-4o")).await.unwrap();
    assert!(!other_model.cache_hit);
    assert_eq!(other_model.model, "gpt-4o");
    assert_eq!(backend.calls(), 4);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let backend = StubBackend::replying("4");
    let gateway = llmops_gateway::Gateway::builder()
        .provider(openai_provider())
        .backend(backend.clone())
        .cache_store(CountingStore::new())
        .cache_ttl(Duration::from_millis(50))
        .build()
        .unwrap();

    gateway.handle(&two_plus_two()).await.unwrap();
    assert!(gateway.handle(&two_plus_two()).await.unwrap().cache_hit);

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(!gateway.handle(&two_plus_two()).await.unwrap().cache_hit);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn disabled_cache_always_calls_backend() {
    let backend = StubBackend::replying("4");
    let gateway = llmops_gateway::Gateway::builder()
        .provider(openai_provider())
        .backend(backend.clone())
        .no_cache()
        .build()
        .unwrap();

    gateway.handle(&two_plus_two()).await.unwrap();
    gateway.handle(&two_plus_two()).await.unwrap();
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn azure_model_override_cannot_rewrite_the_url() {
    let backend = StubBackend::replying("4");
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(azure_provider(), backend.clone(), CountingStore::new(), sink.clone());

    let request = two_plus_two()
        .model("../../other/deployments/x/chat/completions?api-version=1999#");
    let err = gateway.handle(&request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(backend.calls(), 0);
    assert_eq!(sink.runs()[0].error_kind, Some(ErrorKind::InvalidRequest));

    gateway.handle(&two_plus_two().model("gpt-4.1")).await.unwrap();
    let sent = backend.last_request().unwrap();
    assert!(
        sent.target
            .url
            .contains("/openai/deployments/gpt-4.1/chat/completions?api-version=2024-02-15-preview")
    );
}

// ============================================================================
// Request shaping
// ============================================================================

#[tokio::test]
async fn empty_request_is_rejected_and_recorded() {
    let backend = StubBackend::replying("4");
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), CountingStore::new(), sink.clone());

    let err = gateway.handle(&ChatRequest::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(backend.calls(), 0);
    assert_eq!(sink.len(), 1);
    assert!(sink.runs()[0].error);
}

#[tokio::test]
async fn non_finite_temperature_is_rejected() {
    let backend = StubBackend::replying("4");
    let store = CountingStore::new();
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(openai_provider(), backend.clone(), store.clone(), sink.clone());

    for temperature in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let request = ChatRequest::new(vec![Message::user("2+2?")]).temperature(temperature);
        let err = gateway.handle(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
    assert_eq!(backend.calls(), 0);
    assert_eq!(store.gets(), 0);
    assert_eq!(sink.len(), 3);
}

#[tokio::test]
async fn backend_receives_rendered_prompt_and_defaults() {
    let backend = StubBackend::replying("ok");
    let gateway = gateway(
        openai_provider(),
        backend.clone(),
        CountingStore::new(),
        Arc::new(MemoryRunSink::new()),
    );

    let request = ChatRequest::new(vec![
        Message::system("be brief"),
        Message::user("What is the capital of France?"),
    ]);
    gateway.handle(&request).await.unwrap();

    let sent = backend.last_request().unwrap();
    assert_eq!(sent.temperature, 0.3);
    assert_eq!(sent.max_tokens, 512);
    assert_eq!(sent.messages.len(), 2);
    assert_eq!(sent.messages[0], Message::system("be brief"));
    assert_eq!(sent.messages[1].role, Role::User);
    assert!(
        sent.messages[1]
            .content
            .contains("Question: What is the capital of France?")
    );
    assert!(sent.target.model_in_body);
}

#[tokio::test]
async fn rendered_prompt_round_trips_through_echo() {
    let gateway = llmops_gateway::Gateway::builder()
        .provider(openai_provider())
        .backend(Arc::new(EchoBackend))
        .template(
            llmops_gateway::template::PromptTemplate::new("plain", "Q: {{ user_question }}")
                .unwrap(),
        )
        .build()
        .unwrap();

    let response = gateway.handle(&two_plus_two()).await.unwrap();
    assert_eq!(response.content, "Q: 2+2?");
}

// ============================================================================
// Run records
// ============================================================================

#[tokio::test]
async fn payloads_are_recorded_when_enabled() {
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = llmops_gateway::Gateway::builder()
        .provider(openai_provider())
        .backend(StubBackend::replying("4"))
        .cache_store(CountingStore::new())
        .template(
            llmops_gateway::template::PromptTemplate::new("plain", "Q: {{ user_question }}")
                .unwrap(),
        )
        .record_payloads(true)
        .environment("staging")
        .run_sink(sink.clone())
        .build()
        .unwrap();

    gateway.handle(&two_plus_two()).await.unwrap();
    gateway.handle(&two_plus_two()).await.unwrap();

    let runs = sink.runs();
    let miss = &runs[0];
    assert_eq!(miss.user_message.as_deref(), Some("2+2?"));
    assert_eq!(miss.rendered_prompt.as_deref(), Some("Q: 2+2?"));
    assert_eq!(miss.response_text.as_deref(), Some("4"));
    assert_eq!(miss.environment.as_deref(), Some("staging"));

    let hit = &runs[1];
    assert!(hit.cache_hit);
    assert_eq!(hit.user_message.as_deref(), Some("2+2?"));
    assert_eq!(hit.response_text.as_deref(), Some("4"));
    assert!(hit.rendered_prompt.is_none());
}

#[tokio::test]
async fn payloads_are_left_out_by_default() {
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = gateway(
        openai_provider(),
        StubBackend::replying("4"),
        CountingStore::new(),
        sink.clone(),
    );

    gateway.handle(&two_plus_two()).await.unwrap();

    let run = &sink.runs()[0];
    assert!(run.user_message.is_none());
    assert!(run.rendered_prompt.is_none());
    assert!(run.response_text.is_none());
    assert!(run.environment.is_none());
    assert_eq!(run.template.as_deref(), Some("assistant_v1"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_independent() {
    let backend = StubBackend::slow("4", Duration::from_millis(20));
    let sink = Arc::new(MemoryRunSink::new());
    let gateway = Arc::new(gateway(
        openai_provider(),
        backend.clone(),
        CountingStore::new(),
        sink.clone(),
    ));

    let mut handles = Vec::new();
    for i in 0..16 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            let request = ChatRequest::new(vec![Message::user(format!("question {i}"))]);
            gateway.handle(&request).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().content, "4");
    }

    assert_eq!(backend.calls(), 16);
    assert_eq!(sink.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_on_one_key_all_succeed() {
    let backend = StubBackend::slow("4", Duration::from_millis(20));
    let gateway: Arc<dyn ChatGateway> = Arc::new(gateway(
        openai_provider(),
        backend.clone(),
        CountingStore::new(),
        Arc::new(MemoryRunSink::new()),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway.handle(&two_plus_two()).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().content, "4");
    }

    // Misses are not coalesced; every racer may reach the backend.
    let calls = backend.calls();
    assert!((1..=8).contains(&calls));
    assert!(gateway.handle(&two_plus_two()).await.unwrap().cache_hit);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_provider_and_cache() {
    let gateway = gateway(
        azure_provider(),
        StubBackend::replying("4"),
        CountingStore::new(),
        Arc::new(MemoryRunSink::new()),
    );

    let health = gateway.health().await;
    assert_eq!(health.provider, ProviderKind::Azure);
    assert_eq!(health.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(health.cache_store, "counting");
    assert_eq!(health.run_sink.as_deref(), Some("memory"));
    assert!(health.is_healthy());
}
