//! End-to-end behaviour of an upload session against mock collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cirrus_core::mock::{MockConfirmationProvider, MockReply, MockUploadEngine};
use cirrus_core::{
    CompletionOutcome, CredentialsProvider, ErrorKind, ExpiryHook, FileId, KeyNameOutput,
    KeyNameStrategy, RawCredentials, SessionData, UploadResult,
};
use cirrus_upload::{S3UploadManager, S3UploadManagerBuilder, UploaderConfig};
use futures::FutureExt;
use jiff::{SignedDuration, Timestamp};
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

const ENDPOINT: &str = "mybucket.s3.amazonaws.com";
const SUCCESS_ENDPOINT: &str = "http://localhost:8080/s3/success";

struct Session {
    engine: MockUploadEngine,
    provider: MockConfirmationProvider,
    manager: S3UploadManager,
}

fn session(config: UploaderConfig) -> Session {
    session_with(config, MockUploadEngine::default(), |builder| builder)
}

fn session_with(
    config: UploaderConfig,
    engine: MockUploadEngine,
    customize: impl FnOnce(S3UploadManagerBuilder) -> S3UploadManagerBuilder,
) -> Session {
    let provider = MockConfirmationProvider::accepting();
    let builder = S3UploadManager::builder(
        config,
        Arc::new(engine.clone()),
        provider.clone().into_service(),
    );
    let manager = customize(builder).build().unwrap();

    Session {
        engine,
        provider,
        manager,
    }
}

fn confirming() -> UploaderConfig {
    UploaderConfig::new(ENDPOINT).with_success_endpoint(SUCCESS_ENDPOINT)
}

fn credentials(access_key: &str) -> RawCredentials {
    RawCredentials::new(access_key, "secret")
        .with_expiration(Timestamp::now() + SignedDuration::from_hours(1))
}

#[test]
fn test_secret_key_requires_access_key_and_expiration() {
    let Session { manager, .. } = session(UploaderConfig::new(ENDPOINT));

    let mut missing_access = credentials("AKIA");
    missing_access.access_key = None;
    let error = manager.set_credentials(&missing_access).unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidCredentials);
    assert_eq!(error.context.as_deref(), Some("accessKey"));

    let mut missing_expiration = credentials("AKIA");
    missing_expiration.expiration = None;
    let error = manager.set_credentials(&missing_expiration).unwrap_err();
    assert_eq!(error.context.as_deref(), Some("expiration"));

    manager.set_credentials(&credentials("AKIA")).unwrap();
    assert_eq!(manager.access_key().as_deref(), Some("AKIA"));
}

#[test]
fn test_empty_credentials_fall_back_to_access_key() {
    let config = UploaderConfig::new(ENDPOINT)
        .with_access_key("PLAIN")
        .with_credentials(RawCredentials::default());
    let Session { manager, .. } = session(config);

    assert!(manager.credentials_provider().get().is_none());
    assert_eq!(manager.access_key().as_deref(), Some("PLAIN"));

    let error = manager
        .set_credentials(&RawCredentials::default())
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidCredentials);
}

#[test]
fn test_invalid_initial_credentials_fail_build() {
    let mut raw = credentials("AKIA");
    raw.expiration = None;

    let result = S3UploadManager::builder(
        UploaderConfig::new(ENDPOINT).with_credentials(raw),
        Arc::new(MockUploadEngine::default()),
        MockConfirmationProvider::accepting().into_service(),
    )
    .build();

    assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_expired_credentials_are_refreshed_through_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let hook: ExpiryHook = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(async { Ok::<_, Option<String>>(credentials("FRESH")) }.boxed())
    });

    let config = UploaderConfig::new(ENDPOINT).with_credentials(credentials("STALE"));
    let Session { manager, .. } = session_with(config, MockUploadEngine::default(), |builder| {
        builder.on_credentials_expired(hook)
    });

    let provider = manager.transport_options().unwrap().signature.credentials_provider;
    provider.on_expired().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.get().unwrap().access_key(), "FRESH");
    assert_eq!(manager.access_key().as_deref(), Some("FRESH"));
}

#[tokio::test]
async fn test_refresh_without_hook_fails() {
    let Session { manager, .. } = session(UploaderConfig::new(ENDPOINT));

    let error = manager.credentials_provider().on_expired().await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::CredentialsRefresh);
    assert_eq!(
        error.message.as_deref(),
        Some("no onCredentialsExpired callback configured")
    );
}

#[tokio::test]
async fn test_key_name_strategies() {
    let Session {
        engine, manager, ..
    } = session(UploaderConfig::new(ENDPOINT));
    let id = engine.add_file("a.png");
    let uuid = engine.file(id).unwrap().uuid;
    assert_eq!(
        manager.resolve_key_name(id).await.unwrap(),
        format!("{uuid}.png")
    );

    let config = UploaderConfig::new(ENDPOINT).with_key_name(KeyNameStrategy::Filename);
    let Session {
        engine, manager, ..
    } = session(config);
    let id = engine.add_file("a.png");
    assert_eq!(manager.resolve_key_name(id).await.unwrap(), "a.png");
}

#[tokio::test]
async fn test_key_name_function_failures() {
    let strategy = KeyNameStrategy::function(|_| KeyNameOutput::Ready(None));
    let Session {
        engine, manager, ..
    } = session_with(UploaderConfig::new(ENDPOINT), MockUploadEngine::default(), |b| {
        b.key_name(strategy)
    });
    let id = engine.add_file("a.png");
    let error = manager.resolve_key_name(id).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::KeyResolution);

    let strategy = KeyNameStrategy::function(|_| {
        KeyNameOutput::deferred(async { Err::<String, _>(Some("denied".to_owned())) })
    });
    let Session {
        engine, manager, ..
    } = session_with(UploaderConfig::new(ENDPOINT), MockUploadEngine::default(), |b| {
        b.key_name(strategy)
    });
    let id = engine.add_file("a.png");
    let error = manager.resolve_key_name(id).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::KeyResolution);
    assert_eq!(error.message.as_deref(), Some("denied"));
}

#[tokio::test]
async fn test_key_name_function_result_used_verbatim() {
    let strategy = KeyNameStrategy::function(|id| {
        KeyNameOutput::deferred(async move {
            Ok::<_, Option<String>>(format!("uploads/{id}"))
        })
    });
    let Session {
        engine, manager, ..
    } = session_with(UploaderConfig::new(ENDPOINT), MockUploadEngine::default(), |b| {
        b.key_name(strategy)
    });
    let id = engine.add_file("a.png");

    assert_eq!(
        manager.resolve_key_name(id).await.unwrap(),
        format!("uploads/{id}")
    );
}

#[tokio::test]
async fn test_confirmation_success_merges_response() {
    let Session {
        engine,
        provider,
        manager,
    } = session(confirming());
    provider.push_reply(MockReply::respond(200, json!({"success": true, "extra": 1})));
    let id = engine.add_file("a.png");
    engine.set_third_party_id(id, "abc.png");

    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;

    assert_eq!(outcome, CompletionOutcome::Confirmed);
    let reported = engine.last_completion(id).unwrap();
    assert!(reported.is_success());
    assert_eq!(reported.get("extra"), Some(&json!(1)));
    assert!(!manager.has_pending_retry(id));
}

#[tokio::test]
async fn test_confirmation_failure_replays_on_manual_retry() {
    let Session {
        engine,
        provider,
        manager,
    } = session(confirming());
    provider.push_reply(MockReply::respond(
        500,
        json!({"success": false, "error": "db down"}),
    ));
    let id = engine.add_file("a.png");
    engine.set_third_party_id(id, "abc.png");

    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;
    assert_eq!(outcome, CompletionOutcome::Failed);
    assert!(manager.has_pending_retry(id));
    assert_eq!(engine.last_completion(id).unwrap().error(), Some("db down"));

    assert!(manager.retry(id));
    let replay = engine.manual_retries(id).pop().flatten().unwrap();
    assert_eq!(replay().await, CompletionOutcome::Confirmed);

    // Only confirmation requests were sent; nothing was re-uploaded.
    assert_eq!(provider.request_count(), 2);
    assert_eq!(provider.requests()[1].param("key"), Some("abc.png"));
    assert!(engine.last_completion(id).unwrap().is_success());
    assert!(!manager.has_pending_retry(id));
}

#[tokio::test]
async fn test_confirmation_failure_schedules_automatic_replay() {
    let engine = MockUploadEngine::default().with_auto_retries(1);
    let Session {
        engine,
        provider,
        manager,
    } = session_with(confirming(), engine, |builder| builder);
    provider.push_reply(MockReply::respond(503, json!({"error": "busy"})));
    let id = engine.add_file("a.png");

    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;

    assert_eq!(outcome, CompletionOutcome::RetryScheduled);
    assert!(engine.completions().is_empty());

    let replay = engine.last_auto_retry_replay(id).unwrap();
    assert_eq!(replay().await, CompletionOutcome::Confirmed);
    assert_eq!(engine.completions().len(), 1);
}

#[tokio::test]
async fn test_reset_signal_discards_replay() {
    let engine = MockUploadEngine::default().with_auto_retries(1);
    let Session {
        engine,
        provider,
        manager,
    } = session_with(confirming(), engine, |builder| builder);
    let id = engine.add_file("a.png");

    // A first failure leaves a replay behind.
    provider.push_reply(MockReply::respond(500, json!({"error": "busy"})));
    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;
    assert_eq!(outcome, CompletionOutcome::RetryScheduled);
    assert!(manager.has_pending_retry(id));

    // The server then orders a full re-upload and the retry budget is spent.
    provider.push_reply(MockReply::respond(
        200,
        json!({"success": false, "reset": true}),
    ));
    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;

    assert_eq!(outcome, CompletionOutcome::Failed);
    assert!(!manager.has_pending_retry(id));
    let reported = engine.last_completion(id).unwrap();
    assert!(!reported.is_success());
    assert!(reported.is_reset());
}

#[tokio::test]
async fn test_reset_signal_retries_without_replay() {
    let engine = MockUploadEngine::default().with_auto_retries(1);
    let Session {
        engine,
        provider,
        manager,
    } = session_with(confirming(), engine, |builder| builder);
    provider.push_reply(MockReply::respond(409, json!({"reset": true})));
    let id = engine.add_file("a.png");

    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;

    assert_eq!(outcome, CompletionOutcome::RetryScheduled);
    assert_eq!(engine.auto_retry_count(id), 1);
    assert!(engine.last_auto_retry_replay(id).is_none());
    assert!(!manager.has_pending_retry(id));
}

#[tokio::test]
async fn test_confirmation_params_merge_stored_params() {
    let config = confirming().with_success_params(
        json!({"folder": "inbox"}).as_object().cloned().unwrap(),
    );
    let Session {
        engine,
        provider,
        manager,
    } = session(config);
    let first = engine.add_file("a.png");
    let second = engine.add_file("b.png");
    manager.set_upload_success_params(
        json!({"folder": "archive"}).as_object().cloned().unwrap(),
        Some(second),
    );
    manager
        .set_endpoint("otherbucket.s3.amazonaws.com", Some(second))
        .unwrap();

    for id in [first, second] {
        manager
            .on_upload_complete(id, UploadResult::with_success(true))
            .await;
    }

    let requests = provider.requests();
    assert_eq!(requests[0].param("folder"), Some("inbox"));
    assert_eq!(requests[0].param("bucket"), Some("mybucket"));
    assert_eq!(requests[1].param("folder"), Some("archive"));
    assert_eq!(requests[1].param("bucket"), Some("otherbucket"));
    assert_eq!(requests[1].param("name"), Some("b.png"));
}

#[test]
fn test_canned_key_and_transport_fallback() {
    let Session {
        engine, manager, ..
    } = session(UploaderConfig::new(ENDPOINT));

    let session_entry = SessionData::new("old.png", Uuid::new_v4()).with_key("restored/old.png");
    let canned = manager.add_canned_file(&session_entry).unwrap();
    assert_eq!(manager.get_key(canned).as_deref(), Some("restored/old.png"));

    let uploaded = engine.add_file("new.png");
    assert!(manager.get_key(uploaded).is_none());
    engine.set_third_party_id(uploaded, "new-key.png");
    assert_eq!(manager.get_key(uploaded).as_deref(), Some("new-key.png"));

    let params = manager.delete_params(canned).unwrap();
    assert_eq!(params["key"], "restored/old.png");
    assert_eq!(params["bucket"], "mybucket");
}

#[test]
fn test_canned_file_without_key_creates_nothing() {
    let Session {
        engine, manager, ..
    } = session(UploaderConfig::new(ENDPOINT));

    let error = manager
        .add_canned_file(&SessionData::new("old.png", Uuid::new_v4()))
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::MissingSessionKey);
    assert!(engine.file(FileId::new(0)).is_none());

    // The next id the engine hands out is still the first one.
    assert_eq!(engine.add_file("a.png"), FileId::new(0));
}

#[tokio::test]
async fn test_removal_and_reset_drop_per_file_state() {
    let Session {
        engine,
        provider,
        manager,
    } = session(confirming());
    provider.push_reply(MockReply::respond(500, json!({"error": "busy"})));
    provider.push_reply(MockReply::respond(500, json!({"error": "busy"})));
    let first = engine.add_file("a.png");
    let second = engine.add_file("b.png");

    for id in [first, second] {
        manager
            .on_upload_complete(id, UploadResult::with_success(true))
            .await;
        manager.set_upload_success_params(
            json!({"custom": true}).as_object().cloned().unwrap(),
            Some(id),
        );
    }

    manager.on_file_removed(first);
    assert!(!manager.has_pending_retry(first));
    assert!(manager.upload_success_params(first).is_empty());
    assert!(manager.has_pending_retry(second));

    let canned = manager
        .add_canned_file(&SessionData::new("c.png", Uuid::new_v4()).with_key("c.png"))
        .unwrap();
    manager.reset();
    assert!(!manager.has_pending_retry(second));
    assert!(manager.upload_success_params(second).is_empty());
    assert!(manager.get_key(canned).is_none());
}

#[tokio::test]
async fn test_removal_during_replay_leaves_nothing_pending() {
    let engine = MockUploadEngine::default().with_auto_retries(2);
    let Session {
        engine,
        provider,
        manager,
    } = session_with(confirming(), engine, |builder| builder);
    let gate = Arc::new(Notify::new());
    provider.push_reply(MockReply::respond(500, json!({"error": "busy"})));
    provider.push_gated_reply(
        MockReply::respond(500, json!({"error": "still busy"})),
        Arc::clone(&gate),
    );
    let id = engine.add_file("a.png");

    let outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;
    assert_eq!(outcome, CompletionOutcome::RetryScheduled);

    let replay = engine.last_auto_retry_replay(id).unwrap();
    let in_flight = tokio::spawn(replay());
    while provider.request_count() < 2 {
        tokio::task::yield_now().await;
    }

    manager.on_file_removed(id);
    gate.notify_one();

    assert_eq!(in_flight.await.unwrap(), CompletionOutcome::Discarded);
    assert!(!manager.has_pending_retry(id));
    assert_eq!(engine.auto_retry_count(id), 1);
    assert!(engine.completions().is_empty());
}

#[test]
fn test_transport_options() {
    let mut config = UploaderConfig::new(ENDPOINT).with_access_key("PLAIN");
    config.object_properties.reduced_redundancy = true;
    config.signature.version = 4;
    config.signature.endpoint = Some("/s3/signature".to_owned());
    config.iframe_support.local_blank_page_path = Some("/blank.html".to_owned());
    config.validation.size_limit = 1024;
    let Session { manager, .. } = session(config);

    let options = manager.transport_options().unwrap();
    assert_eq!(options.endpoint.as_str(), "http://mybucket.s3.amazonaws.com/");
    assert_eq!(options.access_key.as_deref(), Some("PLAIN"));
    assert!(options.object_properties.reduced_redundancy);
    assert_eq!(options.object_properties.acl, "private");
    assert_eq!(options.signature.version, 4);
    assert_eq!(options.signature.endpoint.as_deref(), Some("/s3/signature"));
    assert_eq!(options.local_blank_page_path.as_deref(), Some("/blank.html"));
    assert_eq!(options.size_limit, 1024);
    assert!(options.signature.credentials_provider.get().is_none());
}

#[test]
fn test_invalid_config_fails_build() {
    let result = S3UploadManager::builder(
        UploaderConfig::default(),
        Arc::new(MockUploadEngine::default()),
        MockConfirmationProvider::accepting().into_service(),
    )
    .build();

    assert_eq!(result.unwrap_err().kind, ErrorKind::Configuration);
}
