use axum::Router;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use voicebatch::domain::batch::{
    BatchScheduler, CancellationFlag, ProgressEvent, ProgressPhase, ProgressReporter,
    SchedulerSettings,
};
use voicebatch::domain::config::ProviderConfig;
use voicebatch::domain::job::{JobItem, JobOptions};
use voicebatch::domain::tts::{ProviderId, RetryPolicy, VoiceSynthesisProvider};
use voicebatch::infrastructure::providers::ProviderRegistry;


pub use mock_provider::{mock_audio_bytes, MockProvider};

pub const OPENAI_TEST_KEY: &str = "sk-test-0123456789abcdefghij";

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn_mock_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Keeps every progress event for later inspection
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.phase == ProgressPhase::Finished)
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Cancels the run once `after` items have finished
pub struct CancelAfter {
    pub after: usize,
    pub flag: CancellationFlag,
}

impl ProgressReporter for CancelAfter {
    fn on_progress(&self, event: &ProgressEvent) {
        if event.phase == ProgressPhase::Finished && event.completed >= self.after {
            self.flag.cancel();
        }
    }
}

/// Output directory plus a scheduler wired to one mock provider
pub struct TestContext {
    pub output: TempDir,
    pub provider: Arc<MockProvider>,
    pub reporter: Arc<RecordingReporter>,
    pub registry: Arc<ProviderRegistry>,
}

impl TestContext {
    pub fn new(provider: MockProvider) -> Self {
        let provider = Arc::new(provider);
        let mut registry = ProviderRegistry::new();
        let shared = provider.clone();
        registry.register(provider.id(), move |_| {
            Ok(shared.clone() as Arc<dyn VoiceSynthesisProvider>)
        });

        Self {
            output: tempfile::tempdir().expect("Failed to create output dir"),
            provider,
            reporter: Arc::new(RecordingReporter::default()),
            registry: Arc::new(registry),
        }
    }

    pub fn output_dir(&self) -> &Path {
        self.output.path()
    }

    pub fn config(&self) -> ProviderConfig {
        ProviderConfig::new(ProviderId::OpenAi, self.output_dir())
            .with_credential("api_key", OPENAI_TEST_KEY)
            .with_voice("alloy")
    }

    pub fn scheduler(&self) -> BatchScheduler {
        BatchScheduler::new(self.registry.clone(), fast_settings())
            .with_reporter(self.reporter.clone())
    }
}

/// Millisecond delays and a fixed core count, so pool sizes match on any machine
pub fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        max_concurrency: 16,
        parallel_threshold: 10,
        sequential_delay: Duration::from_millis(100),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        available_cores: Some(16),
    }
}

pub fn items(texts: &[&str]) -> Vec<JobItem> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| JobItem::new(i, *text, &format!("clip{}", i + 1), JobOptions::default()))
        .collect()
}
