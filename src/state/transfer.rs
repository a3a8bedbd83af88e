/// Transfer manager: multipart upload with progress, then processing
///
/// One call to [`TransferManager::start`] sends the whole staged queue as a
/// single `POST /projects/{id}/ndvi-process` request and yields
/// [`TransferEvent`]s. The stream is driven by whoever polls it (the UI
/// runtime); nothing is spawned behind the caller's back.
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use tokio::time::{Interval, MissedTickBehavior, Sleep};
use tokio_util::io::ReaderStream;

use crate::api::models::ProcessingOutcome;
use crate::api::ApiClient;
use crate::config::ProgressMode;
use crate::error::{ProcessingError, TransferError, UploadError};
use crate::state::data::ProjectId;
use crate::state::intake::StagedFile;

/// Lifecycle phase of one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Idle,
    Uploading,
    Processing,
    Complete,
    Failed,
}

impl TransferPhase {
    /// Whether a transfer is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, TransferPhase::Uploading | TransferPhase::Processing)
    }

    /// Whether a new submission may start from this phase
    pub fn accepts_submit(&self) -> bool {
        matches!(self, TransferPhase::Idle | TransferPhase::Failed)
    }
}

/// What the transfer reports while it runs
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Upload percentage in [0, 100]
    Progress(f32),
    /// Every byte has been handed to the connection
    Uploaded,
    /// The server's result envelope
    Processed(Vec<ProcessingOutcome>),
    Failed(UploadError),
}

/// Bytes-sent as a percentage of the total, clamped to [0, 100]
pub fn percent_of(sent: u64, total: u64) -> f32 {
    if total == 0 {
        return 100.0;
    }
    ((sent as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Monotonic, bounded progress value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressMeter {
    percent: f32,
}

impl ProgressMeter {
    /// Accept a new reading; returns it only if it moved the meter forward
    pub fn advance(&mut self, reading: f32) -> Option<f32> {
        if !reading.is_finite() {
            return None;
        }
        let reading = reading.clamp(0.0, 100.0);
        if reading > self.percent {
            self.percent = reading;
            Some(reading)
        } else {
            None
        }
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn reset(&mut self) {
        self.percent = 0.0;
    }
}

/// Source of upload percentages
pub trait ProgressStrategy: Send {
    /// Called whenever more bytes were handed to the connection
    fn on_bytes(&mut self, sent: u64, total: u64) -> Option<f32>;

    /// Called on every timer tick, if [`Self::tick_interval`] is set
    fn on_tick(&mut self) -> Option<f32> {
        None
    }

    fn tick_interval(&self) -> Option<Duration> {
        None
    }
}

/// Percentages straight from byte counts
#[derive(Debug, Default)]
pub struct RealProgress;

impl ProgressStrategy for RealProgress {
    fn on_bytes(&mut self, sent: u64, total: u64) -> Option<f32> {
        Some(percent_of(sent, total))
    }
}

/// Timer-driven percentages for when byte progress is unavailable
///
/// Climbs by `step` every `interval` and stops at `ceiling`; the jump to
/// 100 only happens once the upload really finished.
#[derive(Debug)]
pub struct SimulatedProgress {
    step: f32,
    ceiling: f32,
    interval: Duration,
    current: f32,
}

impl SimulatedProgress {
    pub fn new(step: f32, ceiling: f32, interval: Duration) -> Self {
        Self {
            step,
            ceiling: ceiling.min(99.0),
            interval,
            current: 0.0,
        }
    }
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self::new(5.0, 95.0, Duration::from_millis(200))
    }
}

impl ProgressStrategy for SimulatedProgress {
    fn on_bytes(&mut self, _sent: u64, _total: u64) -> Option<f32> {
        None
    }

    fn on_tick(&mut self) -> Option<f32> {
        if self.current >= self.ceiling {
            return None;
        }
        self.current = (self.current + self.step).min(self.ceiling);
        Some(self.current)
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Builds a fresh strategy for every transfer
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn ProgressStrategy> + Send + Sync>;

/// Observable state of the single upload owned by one upload widget
#[derive(Debug, Clone, Default)]
pub struct TransferSession {
    phase: TransferPhase,
    progress: ProgressMeter,
    error: Option<UploadError>,
    outcomes: Vec<ProcessingOutcome>,
}

impl TransferSession {
    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn progress_percent(&self) -> f32 {
        self.progress.percent()
    }

    /// Present only in `failed`
    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(UploadError::user_message)
    }

    /// Results of the last successful transfer
    pub fn outcomes(&self) -> &[ProcessingOutcome] {
        &self.outcomes
    }

    /// `idle | failed → uploading`; false (no-op) from any other phase
    pub fn begin(&mut self) -> bool {
        if !self.phase.accepts_submit() {
            return false;
        }
        self.phase = TransferPhase::Uploading;
        self.progress.reset();
        self.error = None;
        self.outcomes.clear();
        true
    }

    /// Back to `idle`
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one event; returns true if the session changed
    pub fn apply(&mut self, event: TransferEvent) -> bool {
        match (self.phase, event) {
            (TransferPhase::Uploading, TransferEvent::Progress(p)) => self.progress.advance(p).is_some(),
            (TransferPhase::Uploading, TransferEvent::Uploaded) => {
                self.progress.advance(100.0);
                self.phase = TransferPhase::Processing;
                true
            }
            (TransferPhase::Uploading | TransferPhase::Processing, TransferEvent::Processed(outcomes)) => {
                self.progress.advance(100.0);
                self.outcomes = outcomes;
                self.phase = TransferPhase::Complete;
                true
            }
            (TransferPhase::Uploading | TransferPhase::Processing, TransferEvent::Failed(err)) => {
                self.error = Some(err);
                self.phase = TransferPhase::Failed;
                true
            }
            (phase, event) => {
                tracing::debug!("Ignoring {:?} in phase {:?}", event, phase);
                false
            }
        }
    }
}

/// Sends staged files to the processing endpoint
#[derive(Clone)]
pub struct TransferManager {
    client: ApiClient,
    processing_timeout: Duration,
    strategy: StrategyFactory,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("base_url", &self.client.base_url())
            .field("processing_timeout", &self.processing_timeout)
            .finish()
    }
}

impl TransferManager {
    /// Manager whose strategy follows the configured progress mode
    pub fn new(client: ApiClient, processing_timeout: Duration, mode: ProgressMode) -> Self {
        let strategy: StrategyFactory = match mode {
            ProgressMode::Real => Arc::new(|| Box::new(RealProgress) as Box<dyn ProgressStrategy>),
            ProgressMode::Simulated => {
                Arc::new(|| Box::new(SimulatedProgress::default()) as Box<dyn ProgressStrategy>)
            }
        };
        Self::with_strategy(client, processing_timeout, strategy)
    }

    pub fn with_strategy(
        client: ApiClient,
        processing_timeout: Duration,
        strategy: StrategyFactory,
    ) -> Self {
        Self {
            client,
            processing_timeout,
            strategy,
        }
    }

    /// Start one transfer; the returned stream ends after a terminal event
    pub fn start(
        &self,
        project: ProjectId,
        files: Vec<StagedFile>,
    ) -> impl Stream<Item = TransferEvent> + Send + 'static {
        let (tx, rx) = mpsc::unbounded();
        let client = self.client.clone();
        let timeout = self.processing_timeout;
        let strategy = (self.strategy)();

        let driver = async move {
            let terminal = run_transfer(client, project, files, timeout, strategy, &tx).await;
            let _ = tx.unbounded_send(terminal);
        };

        // The driver emits into the channel; merging it in keeps it polled.
        let driver = stream::once(driver).filter_map(|()| futures::future::ready(None::<TransferEvent>));
        stream::select(rx, driver)
    }
}

enum Finish {
    Response(reqwest::Result<reqwest::Response>),
    TimedOut,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn deadline_reached(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => pending::<()>().await,
    }
}

/// Runs the upload; intermediate events go to `tx`, the terminal one is returned
async fn run_transfer(
    client: ApiClient,
    project: ProjectId,
    files: Vec<StagedFile>,
    processing_timeout: Duration,
    mut strategy: Box<dyn ProgressStrategy>,
    tx: &mpsc::UnboundedSender<TransferEvent>,
) -> TransferEvent {
    let emit = |event: TransferEvent| {
        let _ = tx.unbounded_send(event);
    };

    if files.is_empty() {
        return TransferEvent::Failed(TransferError::EmptyQueue.into());
    }

    let (byte_tx, mut byte_rx) = tokio::sync::mpsc::unbounded_channel::<u64>();
    let mut form = Form::new();
    let mut total: u64 = 0;

    for file in &files {
        let read_error = |e: &dyn std::fmt::Display| {
            TransferEvent::Failed(
                TransferError::FileRead {
                    name: file.name.clone(),
                    reason: e.to_string(),
                }
                .into(),
            )
        };

        let handle = match tokio::fs::File::open(&file.path).await {
            Ok(handle) => handle,
            Err(e) => return read_error(&e),
        };
        let len = match handle.metadata().await {
            Ok(metadata) => metadata.len(),
            Err(e) => return read_error(&e),
        };
        total += len;

        let counter = byte_tx.clone();
        let body = ReaderStream::new(handle).inspect_ok(move |chunk| {
            let _ = counter.send(chunk.len() as u64);
        });
        let part = match Part::stream_with_length(reqwest::Body::wrap_stream(body), len)
            .file_name(file.name.clone())
            .mime_str(file.extension_class.mime())
        {
            Ok(part) => part,
            Err(e) => return read_error(&e),
        };
        form = form.part("files", part);
    }
    drop(byte_tx);

    tracing::info!(
        "📤 Uploading {} file(s), {} bytes, to project {}",
        files.len(),
        total,
        project
    );

    let url = client.url(&format!("/projects/{project}/ndvi-process"));
    let request = client.http().post(url).multipart(form).send();
    tokio::pin!(request);

    let mut meter = ProgressMeter::default();
    let mut sent: u64 = 0;
    let mut uploaded = false;
    let mut bytes_open = true;
    let mut deadline: Option<Pin<Box<Sleep>>> = None;
    let mut ticker = strategy.tick_interval().map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    let mark_uploaded = |meter: &mut ProgressMeter, uploaded: &mut bool| {
        if !*uploaded {
            *uploaded = true;
            if let Some(p) = meter.advance(100.0) {
                emit(TransferEvent::Progress(p));
            }
            emit(TransferEvent::Uploaded);
            tracing::info!("Upload to project {} complete, waiting for processing", project);
        }
    };

    let finish = loop {
        tokio::select! {
            biased;
            chunk = byte_rx.recv(), if bytes_open => match chunk {
                Some(n) => {
                    sent += n;
                    if let Some(p) = strategy.on_bytes(sent, total).and_then(|p| meter.advance(p)) {
                        tracing::debug!("Upload progress {:.1}%", p);
                        emit(TransferEvent::Progress(p));
                    }
                    if sent >= total && !uploaded {
                        mark_uploaded(&mut meter, &mut uploaded);
                        ticker = None;
                        deadline = Some(Box::pin(tokio::time::sleep(processing_timeout)));
                    }
                }
                None => bytes_open = false,
            },
            result = &mut request => break Finish::Response(result),
            _ = next_tick(&mut ticker), if !uploaded => {
                if let Some(p) = strategy.on_tick().and_then(|p| meter.advance(p)) {
                    emit(TransferEvent::Progress(p));
                }
            }
            _ = deadline_reached(&mut deadline) => break Finish::TimedOut,
        }
    };

    let response = match finish {
        Finish::TimedOut => {
            tracing::error!("Processing for project {} timed out", project);
            return TransferEvent::Failed(
                ProcessingError::TimedOut(processing_timeout.as_secs()).into(),
            );
        }
        Finish::Response(Err(e)) => {
            tracing::error!("Upload to project {} failed: {}", project, e);
            return TransferEvent::Failed(if uploaded {
                ProcessingError::Interrupted(e.to_string()).into()
            } else {
                TransferError::Network(e.to_string()).into()
            });
        }
        Finish::Response(Ok(response)) => response,
    };

    let status = response.status();
    if !status.is_success() {
        tracing::error!("Project {} upload answered {}", project, status);
        return TransferEvent::Failed(if uploaded {
            ProcessingError::Status(status.as_u16()).into()
        } else {
            TransferError::Status(status.as_u16()).into()
        });
    }

    // A 2xx means the server read the whole body.
    mark_uploaded(&mut meter, &mut uploaded);

    match tokio::time::timeout(processing_timeout, response.json::<Vec<ProcessingOutcome>>()).await {
        Ok(Ok(outcomes)) => {
            tracing::info!("✅ Processing finished: {} result(s)", outcomes.len());
            TransferEvent::Processed(outcomes)
        }
        Ok(Err(e)) => TransferEvent::Failed(ProcessingError::Malformed(e.to_string()).into()),
        Err(_) => TransferEvent::Failed(ProcessingError::TimedOut(processing_timeout.as_secs()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::intake::ExtensionClass;
    use crate::test_support::spawn_backend;
    use axum::{body::Bytes, extract::Path, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    fn staged(dir: &std::path::Path, name: &str, size: usize) -> StagedFile {
        let path = dir.join(name);
        std::fs::write(&path, vec![7u8; size]).unwrap();
        StagedFile {
            path,
            name: name.to_string(),
            byte_size: size as u64,
            extension_class: ExtensionClass::RasterTiff,
        }
    }

    fn manager(base: &str, mode: ProgressMode) -> TransferManager {
        let client = ApiClient::new(base, Duration::from_secs(5)).unwrap();
        TransferManager::new(client, Duration::from_secs(5), mode)
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(percent_of(0, 200), 0.0);
        assert_eq!(percent_of(50, 200), 25.0);
        assert_eq!(percent_of(300, 200), 100.0);
        assert_eq!(percent_of(0, 0), 100.0);
    }

    #[test]
    fn test_meter_is_monotonic_and_bounded() {
        let mut meter = ProgressMeter::default();
        let readings = [10.0, 5.0, f32::NAN, 40.0, 40.0, -3.0, 250.0, 99.0];
        let mut last = 0.0;
        for reading in readings {
            meter.advance(reading);
            assert!(meter.percent() >= last);
            assert!((0.0..=100.0).contains(&meter.percent()));
            last = meter.percent();
        }
        assert_eq!(meter.percent(), 100.0);
    }

    #[test]
    fn test_simulated_progress_stops_below_completion() {
        let mut sim = SimulatedProgress::new(30.0, 95.0, Duration::from_millis(1));
        let ticks: Vec<_> = std::iter::from_fn(|| sim.on_tick()).collect();
        assert_eq!(ticks, vec![30.0, 60.0, 90.0, 95.0]);
        assert_eq!(sim.on_bytes(10, 10), None);
    }

    #[test]
    fn test_session_ignores_events_outside_their_phase() {
        let mut session = TransferSession::default();
        assert!(!session.apply(TransferEvent::Progress(50.0)));
        assert_eq!(session.phase(), TransferPhase::Idle);

        assert!(session.begin());
        assert!(!session.begin());
        session.apply(TransferEvent::Progress(60.0));
        session.apply(TransferEvent::Progress(20.0));
        assert_eq!(session.progress_percent(), 60.0);

        session.apply(TransferEvent::Uploaded);
        assert_eq!(session.phase(), TransferPhase::Processing);
        assert!(!session.apply(TransferEvent::Progress(10.0)));
        assert_eq!(session.progress_percent(), 100.0);
    }

    #[tokio::test]
    async fn test_successful_transfer_event_order() {
        let router = Router::new().route(
            "/projects/:id/ndvi-process",
            post(|Path(id): Path<i64>, body: Bytes| async move {
                assert!(!body.is_empty());
                Json(json!([{ "id": id, "filename": "north.tif", "ndvi_min": -0.1,
                              "ndvi_max": 0.8, "ndvi_mean": 0.4, "timestamp": "2025-03-15T10:00:00" }]))
            }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(dir.path(), "north.tif", 200_000)];

        let events: Vec<_> = manager(&base, ProgressMode::Real).start(3, files).collect().await;

        let uploaded_at = events.iter().position(|e| *e == TransferEvent::Uploaded).unwrap();
        assert!(matches!(events.last(), Some(TransferEvent::Processed(o)) if o[0].id == 3));
        assert!(uploaded_at < events.len() - 1);

        let mut last = 0.0;
        for event in &events[..uploaded_at] {
            if let TransferEvent::Progress(p) = event {
                assert!(*p >= last && *p <= 100.0);
                last = *p;
            }
        }
        assert_eq!(last, 100.0);
    }

    #[tokio::test]
    async fn test_server_error_after_upload_is_processing_error() {
        let router = Router::new().route(
            "/projects/:id/ndvi-process",
            post(|_body: Bytes| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(dir.path(), "north.tif", 4096)];

        let events: Vec<_> = manager(&base, ProgressMode::Real).start(1, files).collect().await;

        assert!(events.contains(&TransferEvent::Uploaded));
        assert_eq!(
            events.last(),
            Some(&TransferEvent::Failed(ProcessingError::Status(500).into()))
        );
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_processing_error() {
        let router = Router::new().route(
            "/projects/:id/ndvi-process",
            post(|_body: Bytes| async { Json(json!({ "unexpected": true })) }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(dir.path(), "north.tif", 64)];

        let events: Vec<_> = manager(&base, ProgressMode::Simulated).start(1, files).collect().await;

        assert!(matches!(
            events.last(),
            Some(TransferEvent::Failed(UploadError::Processing(ProcessingError::Malformed(_))))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![staged(dir.path(), "north.tif", 64)];

        let events: Vec<_> = manager("http://127.0.0.1:9", ProgressMode::Real)
            .start(1, files)
            .collect()
            .await;

        assert!(matches!(
            events.last(),
            Some(TransferEvent::Failed(UploadError::Transfer(TransferError::Network(_))))
                | Some(TransferEvent::Failed(UploadError::Processing(ProcessingError::Interrupted(_))))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_sending() {
        let missing = StagedFile {
            path: std::path::PathBuf::from("/definitely/not/here.tif"),
            name: "here.tif".to_string(),
            byte_size: 10,
            extension_class: ExtensionClass::RasterTiff,
        };

        let events: Vec<_> = manager("http://127.0.0.1:9", ProgressMode::Real)
            .start(1, vec![missing])
            .collect()
            .await;

        assert!(matches!(
            events.as_slice(),
            [TransferEvent::Failed(UploadError::Transfer(TransferError::FileRead { .. }))]
        ));
    }
}
