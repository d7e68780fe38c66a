use crate::e2e::helpers;

use helpers::{items, CancelAfter, MockProvider, TestContext};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use voicebatch::controllers::batch::BatchController;
use voicebatch::domain::batch::{BatchError, BatchState, CancellationFlag, ExecutionMode, ProgressPhase};
use voicebatch::domain::config::ProviderConfig;
use voicebatch::domain::job::{JobItem, JobOptions};
use voicebatch::domain::tts::{ErrorClassification, ProviderError, ProviderId};
use voicebatch::error::AppError;

fn http_error(status: u16) -> ProviderError {
    ProviderError::Http {
        provider: ProviderId::OpenAi,
        status,
        code: None,
        message: format!("status {}", status),
        retry_after: None,
    }
}

#[tokio::test]
async fn it_should_complete_when_every_item_succeeds() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));

    let run = ctx
        .scheduler()
        .run(items(&["One.", "Two.", "Three."]), ctx.config())
        .await
        .unwrap();

    assert_eq!(run.state, BatchState::Completed);
    assert_eq!(run.succeeded(), 3);
    assert_eq!(run.results.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(matches!(run.mode, ExecutionMode::Sequential));

    for name in ["clip1_openai_alloy.mp3", "clip2_openai_alloy.mp3", "clip3_openai_alloy.mp3"] {
        let path = ctx.output_dir().join(name);
        assert!(path.exists(), "missing {}", path.display());
    }
    assert_eq!(run.result(0).unwrap().byte_size(), helpers::mock_audio_bytes().len() as u64);
}

#[tokio::test]
async fn it_should_report_partial_failure_without_aborting() {
    let ctx = TestContext::new(
        MockProvider::new(ProviderId::OpenAi).failing("Two.", vec![http_error(400)]),
    );

    let run = ctx
        .scheduler()
        .run(items(&["One.", "Two.", "Three."]), ctx.config())
        .await
        .unwrap();

    assert_eq!(run.state, BatchState::PartiallyFailed);
    assert_eq!(run.succeeded(), 2);
    assert_eq!(run.failed(), 1);

    let failed = run.result(1).unwrap();
    assert_eq!(failed.classification(), Some(ErrorClassification::InvalidInput));
    assert_eq!(failed.attempts(), 1);
    assert!(run.result(2).unwrap().is_success());

    let summary = run.summary();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].job_index, 1);
    assert_eq!(summary.failures[0].label, "#2 clip2");
}

#[tokio::test]
async fn it_should_retry_transient_failures() {
    let ctx = TestContext::new(
        MockProvider::new(ProviderId::OpenAi).failing("Flaky.", vec![http_error(503), http_error(502)]),
    );

    let run = ctx.scheduler().run(items(&["Flaky."]), ctx.config()).await.unwrap();

    assert_eq!(run.state, BatchState::Completed);
    assert_eq!(run.result(0).unwrap().attempts(), 3);
    assert_eq!(ctx.provider.calls(), 3);
}

#[tokio::test]
async fn it_should_not_retry_authentication_failures() {
    let ctx = TestContext::new(
        MockProvider::new(ProviderId::OpenAi).failing("Locked.", vec![http_error(401), http_error(401)]),
    );

    let run = ctx.scheduler().run(items(&["Locked."]), ctx.config()).await.unwrap();

    let result = run.result(0).unwrap();
    assert_eq!(result.classification(), Some(ErrorClassification::Authentication));
    assert_eq!(result.attempts(), 1);
    assert_eq!(ctx.provider.calls(), 1);
}

#[tokio::test]
async fn it_should_reject_blank_text_without_calling_provider() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let blank = vec![JobItem::new(0, "  \n ", "blank", JobOptions::default())];

    let run = ctx.scheduler().run(blank, ctx.config()).await.unwrap();

    let result = run.result(0).unwrap();
    assert_eq!(result.classification(), Some(ErrorClassification::InvalidInput));
    assert_eq!(result.attempts(), 0);
    assert_eq!(ctx.provider.calls(), 0);
    assert_eq!(run.state, BatchState::PartiallyFailed);
}

#[tokio::test]
async fn it_should_fill_but_never_exceed_the_concurrency_level() {
    let ctx = TestContext::new(
        MockProvider::new(ProviderId::OpenAi).with_latency(Duration::from_millis(20)),
    );
    let texts: Vec<String> = (0..50).map(|i| format!("Sentence number {}.", i)).collect();
    let batch: Vec<JobItem> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| JobItem::new(i, text.as_str(), &format!("line{}", i), JobOptions::default()))
        .collect();
    let config = ctx.config().with_option("max_concurrency", "5");

    let run = ctx.scheduler().run(batch, config).await.unwrap();

    assert_eq!(run.state, BatchState::Completed);
    assert_eq!(run.results.len(), 50);
    assert_eq!(run.concurrency_level, 5);
    assert!(matches!(run.mode, ExecutionMode::Parallel));
    assert_eq!(ctx.provider.max_in_flight(), 5);
    assert_eq!(ctx.provider.calls(), 50);
}

#[tokio::test]
async fn it_should_record_an_item_whose_worker_crashed() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi).panicking_on("Crash."));
    let mut texts: Vec<String> = (0..20).map(|i| format!("Line {}.", i)).collect();
    texts[7] = "Crash.".to_string();
    let batch: Vec<JobItem> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| JobItem::new(i, text.as_str(), &format!("line{}", i), JobOptions::default()))
        .collect();

    let run = ctx.scheduler().run(batch, ctx.config()).await.unwrap();

    assert!(matches!(run.mode, ExecutionMode::Parallel));
    assert_eq!(run.state, BatchState::PartiallyFailed);
    assert_eq!(run.results.len(), 20);
    assert_eq!(run.skipped(), 0);
    assert_eq!(run.succeeded(), 19);
    assert_eq!(run.result(7).unwrap().classification(), Some(ErrorClassification::Fatal));
}

#[tokio::test]
async fn it_should_emit_dispatch_and_finish_events() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));

    ctx.scheduler()
        .run(items(&["One.", "Two."]), ctx.config())
        .await
        .unwrap();

    let events = ctx.reporter.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].phase, ProgressPhase::Dispatched);
    assert_eq!(events[0].completed, 0);

    let finished = ctx.reporter.finished();
    assert_eq!(finished.len(), 2);
    let last = finished.last().unwrap();
    assert_eq!((last.completed, last.total, last.succeeded, last.failed), (2, 2, 2, 0));
}

#[tokio::test]
async fn it_should_stop_dispatching_after_cancellation() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let flag = CancellationFlag::new();
    let scheduler = ctx
        .scheduler()
        .with_cancellation(flag.clone())
        .with_reporter(Arc::new(CancelAfter { after: 2, flag }));

    let run = scheduler
        .run(items(&["a.", "b.", "c.", "d.", "e."]), ctx.config())
        .await
        .unwrap();

    assert_eq!(run.state, BatchState::Cancelled);
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.skipped(), 3);
    assert_eq!(ctx.provider.calls(), 2);
}

#[tokio::test]
async fn it_should_refuse_an_invalid_configuration() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let config = ProviderConfig::new(ProviderId::OpenAi, ctx.output_dir());

    let err = ctx.scheduler().run(items(&["One."]), config).await.unwrap_err();

    match err {
        BatchError::InvalidConfig(report) => {
            assert!(report.errors.iter().any(|e| e.contains("api_key")));
        }
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
    assert_eq!(ctx.provider.calls(), 0);
}

#[tokio::test]
async fn it_should_refuse_an_empty_batch() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));

    let err = ctx.scheduler().run(Vec::new(), ctx.config()).await.unwrap_err();

    assert!(matches!(err, BatchError::EmptyBatch));
}

#[tokio::test]
async fn it_should_fail_fast_for_a_vendor_without_adapter() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let config = ProviderConfig::new(ProviderId::Murf, ctx.output_dir()).with_credential("api_key", "murf-key");

    let err = ctx.scheduler().run(items(&["One."]), config).await.unwrap_err();

    assert!(matches!(
        err,
        BatchError::Provider(ProviderError::NotImplemented(ProviderId::Murf))
    ));
    assert_eq!(ctx.provider.calls(), 0);
}

#[tokio::test]
async fn it_should_keep_duplicate_file_names_apart() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let batch = vec![
        JobItem::new(0, "First.", "intro", JobOptions::default()),
        JobItem::new(1, "Second.", "intro", JobOptions::default()),
    ];

    let run = ctx.scheduler().run(batch, ctx.config()).await.unwrap();

    assert_eq!(run.succeeded(), 2);
    assert!(ctx.output_dir().join("intro_1_openai_alloy.mp3").exists());
    assert!(ctx.output_dir().join("intro_2_openai_alloy.mp3").exists());
}

#[tokio::test]
async fn it_should_use_the_job_voice_over_the_configured_one() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let mut options = JobOptions::default();
    options.insert("voice", "nova");
    let batch = vec![JobItem::new(0, "Hello.", "greeting", options)];

    ctx.scheduler().run(batch, ctx.config()).await.unwrap();

    assert!(ctx.output_dir().join("greeting_openai_nova.mp3").exists());
}

#[tokio::test]
async fn it_should_keep_deserialized_items_inside_the_output_dir() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let audio = ctx.output_dir().join("audio");
    std::fs::create_dir_all(&audio).unwrap();
    let mut config = ctx.config();
    config.output_dir = audio.clone();
    let item: JobItem = serde_json::from_value(serde_json::json!({
        "index": 0,
        "text": "Hello.",
        "file_stem": "../escaped",
        "options": {}
    }))
    .unwrap();

    let run = ctx.scheduler().run(vec![item], config).await.unwrap();

    assert_eq!(run.state, BatchState::Completed);
    assert!(audio.join("escaped_openai_alloy.mp3").exists());
    assert!(!ctx.output_dir().join("escaped_openai_alloy.mp3").exists());
}

#[tokio::test]
async fn it_should_write_long_multibyte_file_names() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let batch = vec![JobItem::new(0, "Hello.", &"語".repeat(150), JobOptions::default())];

    let run = ctx.scheduler().run(batch, ctx.config()).await.unwrap();

    let result = run.result(0).unwrap();
    assert!(result.is_success(), "{:?}", result.failure());
    let path = result.output_path().unwrap();
    assert!(path.exists());
    assert!(path.file_name().unwrap().len() < 255);
}

#[tokio::test]
async fn it_should_write_the_summary_and_report_io_failures() {
    let ctx = TestContext::new(MockProvider::new(ProviderId::OpenAi));
    let run = ctx.scheduler().run(items(&["One."]), ctx.config()).await.unwrap();
    let controller = BatchController::new(ctx.registry.clone(), helpers::fast_settings());

    let path = ctx.output_dir().join("summary.json");
    controller.write_summary(&run.summary(), &path).await.unwrap();
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["total"], 1);
    assert_eq!(written["succeeded"], 1);

    let missing = ctx.output_dir().join("missing").join("summary.json");
    let err = controller.write_summary(&run.summary(), &missing).await.unwrap_err();
    assert!(matches!(err, AppError::Io { .. }));
    assert_eq!(err.exit_code(), 74);
}
