//! End-to-end scenarios driven through a fake decoder and a scripted gateway.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use adforge_gemini::{CompletionError, CompletionGateway, CompletionRequest, CompletionResult, ContentPart};
use adforge_media::{MediaDecoder, MediaError, MediaResult};
use adforge_models::{AssetId, AssetStatus, CreativeBrief, FailureCategory};
use adforge_pipeline::{AdPipeline, PipelineConfig, RetryConfig};

/// Video bytes are the duration in seconds as ASCII text.
#[derive(Default)]
struct TextDecoder {
    extract_calls: AtomicUsize,
}

#[async_trait]
impl MediaDecoder for TextDecoder {
    async fn probe_duration(&self, video: &[u8]) -> MediaResult<f64> {
        std::str::from_utf8(video)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| MediaError::UnsupportedCodec("not a video".into()))
    }

    async fn extract_frames(
        &self,
        _video: &[u8],
        timestamps: &[f64],
        _scale_width: Option<u32>,
    ) -> MediaResult<Vec<Vec<u8>>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        Ok(timestamps.iter().map(|t| format!("{:.3}", t).into_bytes()).collect())
    }
}

type Responder = dyn Fn(&CompletionRequest) -> CompletionResult<Value> + Send + Sync;

/// Gateway that answers through a closure and records every request.
struct ScriptedGateway {
    respond: Box<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    fn new(respond: impl Fn(&CompletionRequest) -> CompletionResult<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests_for(&self, stage: Stage) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| Stage::of(r) == stage)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Value> {
        let response = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analysis,
    Blueprints,
    Ranking,
}

impl Stage {
    /// Tell the stages apart by the top-level key of the requested schema.
    fn of(request: &CompletionRequest) -> Stage {
        let properties = &request.response_schema["properties"];
        if properties.get("results").is_some() {
            Stage::Analysis
        } else if properties.get("blueprints").is_some() {
            Stage::Blueprints
        } else {
            Stage::Ranking
        }
    }
}

fn prompt_text(request: &CompletionRequest) -> String {
    request
        .parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text(t) => Some(t.as_str()),
            ContentPart::InlineMedia { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn analysis_entry(file_name: &str, rank: u32) -> Value {
    json!({
        "rank": rank,
        "fileName": file_name,
        "justification": format!("{} ranked {}", file_name, rank),
        "summary": format!("footage from {}", file_name),
        "sceneDescriptions": [{"timestamp": "00:02", "description": "product close-up"}],
        "keyObjects": ["bottle", "hands"],
        "emotionalTone": ["confident"],
        "audioAnalysis": {"hasVoiceover": true, "hasMusic": false, "summary": "narration"}
    })
}

fn blueprint(title: &str, sources: &[&str]) -> Value {
    json!({
        "variationTitle": title,
        "headline": "Stop scrolling",
        "body": "You deserve better mornings.",
        "cta": "Shop now",
        "editPlan": sources.iter().enumerate().map(|(i, s)| json!({
            "timestamp": format!("00:0{}", i * 3),
            "visual": "hero shot",
            "edit": "hard cut",
            "overlayText": "50% off",
            "sourceFile": s
        })).collect::<Vec<_>>()
    })
}

fn rankings(len: usize) -> Value {
    json!({
        "rankings": (0..len).map(|i| json!({
            "index": i,
            "roiScore": 50.0 + i as f64,
            "hookScore": 7.0,
            "ctaScore": 6.0,
            "reasons": ["clear offer"]
        })).collect::<Vec<_>>()
    })
}

fn config() -> PipelineConfig {
    PipelineConfig {
        frames_per_asset: 8,
        blueprint_count: 2,
        completion_retries: 0,
        ..Default::default()
    }
}

fn brief() -> CreativeBrief {
    let mut brief = CreativeBrief::new("Morning Ritual Coffee", "First bag free", "remote workers");
    brief.pain_points = vec!["afternoon crash".to_string()];
    brief
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new("analyze_batch")
        .with_max_retries(1)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_ranked_batch_produces_valid_and_audited_blueprints() {
    let gateway = ScriptedGateway::new(|request| match Stage::of(request) {
        Stage::Analysis => Ok(json!({"results": [
            analysis_entry("A.mp4", 2),
            analysis_entry("B.mp4", 1),
            analysis_entry("C.mp4", 3),
        ]})),
        Stage::Blueprints => Ok(json!({"blueprints": [
            blueprint("Morning hook", &["B.mp4", "A.mp4", "C.mp4"]),
            blueprint("Ghost footage", &["B.mp4", "D"]),
        ]})),
        Stage::Ranking => Ok(rankings(1)),
    });
    let decoder = Arc::new(TextDecoder::default());
    let pipeline = AdPipeline::new(config(), decoder, gateway.clone());

    for name in ["A.mp4", "B.mp4", "C.mp4"] {
        pipeline.upload(name, b"10".to_vec()).await.unwrap();
    }

    let run = pipeline.run(&brief()).await.unwrap();

    assert_eq!(run.primary, AssetId::from("B.mp4"));
    assert_eq!(run.b_roll, vec![AssetId::from("A.mp4"), AssetId::from("C.mp4")]);
    assert_eq!(run.batches.len(), 1);
    assert!(run.batches[0].rank_violation.is_none());

    assert_eq!(run.blueprints.valid.len(), 1);
    assert_eq!(run.blueprints.valid[0].variation_title, "Morning hook");
    assert_eq!(run.blueprints.invalid.len(), 1);
    assert_eq!(run.blueprints.invalid[0].unresolved[0].source_file, "D");
    assert_eq!(pipeline.generator().audit_log().len().await, 1);

    // Every edit plan entry of a valid blueprint names a known asset.
    let known = [AssetId::from("A.mp4"), AssetId::from("B.mp4"), AssetId::from("C.mp4")];
    for scene in &run.blueprints.valid[0].edit_plan {
        assert!(known.contains(&AssetId::from(scene.source_file.as_str())));
    }

    // One comparative call carrying k frames per asset.
    let analysis = gateway.requests_for(Stage::Analysis);
    assert_eq!(analysis.len(), 1);
    assert_eq!(analysis[0].media_part_count(), 24);

    // Only the valid blueprint is ranked.
    assert_eq!(gateway.requests_for(Stage::Ranking).len(), 1);
    assert_eq!(run.rankings.len(), 1);

    for asset in &run.assets {
        assert_eq!(asset.status, AssetStatus::Analyzed);
        assert_eq!(asset.frame_count, 8);
    }
}

#[tokio::test]
async fn test_throttled_batch_keeps_frames_for_retry() {
    let throttle = Arc::new(AtomicBool::new(true));
    let gate = Arc::clone(&throttle);
    let gateway = ScriptedGateway::new(move |_| {
        if gate.load(Ordering::SeqCst) {
            Err(CompletionError::Throttled {
                message: "quota exhausted".to_string(),
                retry_after: Some(Duration::from_secs(3)),
            })
        } else {
            Ok(json!({"results": [analysis_entry("a.mp4", 1), analysis_entry("b.mp4", 2)]}))
        }
    });
    let decoder = Arc::new(TextDecoder::default());
    let pipeline = AdPipeline::new(config(), decoder.clone(), gateway.clone());
    let tracker = pipeline.tracker();

    let a = pipeline.upload("a.mp4", b"10".to_vec()).await.unwrap();
    let b = pipeline.upload("b.mp4", b"12".to_vec()).await.unwrap();

    let report = pipeline.orchestrator().analyze_pending().await;
    assert!(report.analyzed.is_empty());
    assert_eq!(report.failed.len(), 2);

    for handle in [&a, &b] {
        let snapshot = tracker.get(handle).await.unwrap();
        assert_eq!(snapshot.status, AssetStatus::Error);
        let failure = snapshot.failure.clone().unwrap();
        assert_eq!(failure.category, FailureCategory::Throttled);
        assert_eq!(failure.retry_after, Some(Duration::from_secs(3)));
        assert_eq!(snapshot.frames.as_ref().unwrap().len(), 8);
        assert!(snapshot.thumbnail.is_some());
    }
    let decodes = decoder.extract_calls.load(Ordering::SeqCst);

    // Caller-driven retry: respawn and rerun without decoding again.
    throttle.store(false, Ordering::SeqCst);
    let mut retried = Vec::new();
    for failed in report.retryable() {
        retried.push(tracker.respawn(&failed.handle).await.unwrap());
    }
    let report = pipeline.orchestrator().analyze_batch(retried).await;

    assert_eq!(report.analyzed.len(), 2);
    assert_eq!(decoder.extract_calls.load(Ordering::SeqCst), decodes);
    assert_eq!(gateway.requests_for(Stage::Analysis).len(), 2);

    // The old handles are dead.
    assert!(tracker.get(&a).await.is_none());
    assert_eq!(
        tracker.snapshot(&a.id).await.unwrap().status,
        AssetStatus::Analyzed
    );
}

#[tokio::test]
async fn test_analyze_with_retry_recovers_from_transport_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let gateway = ScriptedGateway::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(CompletionError::transport("connection reset"))
        } else {
            Ok(json!({"results": [analysis_entry("a.mp4", 1)]}))
        }
    });
    let pipeline = AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway);
    let a = pipeline.upload("a.mp4", b"10".to_vec()).await.unwrap();

    let reports = pipeline
        .orchestrator()
        .analyze_with_retry(vec![a.clone()], &fast_retry())
        .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].failed[0].category(), FailureCategory::Transport);
    assert_eq!(reports[1].analyzed.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_result_leaves_sibling_untouched() {
    let gateway = ScriptedGateway::new(|_| Ok(json!({"results": [analysis_entry("y.mp4", 1)]})));
    let pipeline = AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway);
    let x = pipeline.upload("x.mp4", b"10".to_vec()).await.unwrap();
    let y = pipeline.upload("y.mp4", b"10".to_vec()).await.unwrap();

    let report = pipeline.orchestrator().analyze_pending().await;

    let x_state = pipeline.tracker().get(&x).await.unwrap();
    assert_eq!(x_state.status, AssetStatus::Error);
    assert_eq!(x_state.failure.unwrap().category, FailureCategory::MissingResult);

    let y_state = pipeline.tracker().get(&y).await.unwrap();
    assert_eq!(y_state.status, AssetStatus::Analyzed);
    assert_eq!(y_state.analysis.unwrap().rank, 1);
    assert_eq!(report.analyzed, vec![y]);
}

#[tokio::test]
async fn test_reset_discards_in_flight_results() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    struct BlockingGateway {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl CompletionGateway for BlockingGateway {
        async fn complete(&self, _request: CompletionRequest) -> CompletionResult<Value> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(json!({"results": [analysis_entry("clip.mp4", 1)]}))
        }
    }

    let gateway = Arc::new(BlockingGateway {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    });
    let pipeline = Arc::new(AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway));
    let old = pipeline.upload("clip.mp4", b"10".to_vec()).await.unwrap();

    let in_flight = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.orchestrator().analyze_pending().await })
    };

    entered.notified().await;
    pipeline.tracker().reset().await;
    let new = pipeline.upload("clip.mp4", b"10".to_vec()).await.unwrap();
    release.notify_one();

    let report = in_flight.await.unwrap();
    assert!(report.analyzed.is_empty());
    assert!(report.failed.is_empty());

    assert_eq!(old.id, new.id);
    assert_ne!(old.token, new.token);
    let snapshot = pipeline.tracker().snapshot(&new.id).await.unwrap();
    assert_eq!(snapshot.handle, new);
    assert_eq!(snapshot.status, AssetStatus::Pending);
    assert!(snapshot.analysis.is_none());
    assert!(snapshot.frames.is_none());
}

#[tokio::test]
async fn test_concurrent_batches_are_isolated() {
    let gateway = ScriptedGateway::new(|request| {
        let text = prompt_text(request);
        if text.contains("doomed-1.mp4") {
            Err(CompletionError::Rejected {
                status: 400,
                message: "invalid argument".to_string(),
            })
        } else {
            Ok(json!({"results": [
                analysis_entry("ok-1.mp4", 1),
                analysis_entry("ok-2.mp4", 2),
            ]}))
        }
    });
    let pipeline = AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway);

    let mut doomed = Vec::new();
    for name in ["doomed-1.mp4", "doomed-2.mp4"] {
        doomed.push(pipeline.upload(name, b"8".to_vec()).await.unwrap());
    }
    let mut healthy = Vec::new();
    for name in ["ok-1.mp4", "ok-2.mp4"] {
        healthy.push(pipeline.upload(name, b"8".to_vec()).await.unwrap());
    }

    let orchestrator = pipeline.orchestrator();
    let (failed, succeeded) = tokio::join!(
        orchestrator.analyze_batch(doomed.clone()),
        orchestrator.analyze_batch(healthy.clone()),
    );

    assert_eq!(failed.failed.len(), 2);
    assert!(failed
        .failed
        .iter()
        .all(|f| f.category() == FailureCategory::Rejected));
    assert_eq!(succeeded.analyzed.len(), 2);
    assert!(succeeded.failed.is_empty());

    for handle in &healthy {
        assert_eq!(
            pipeline.tracker().get(handle).await.unwrap().status,
            AssetStatus::Analyzed
        );
    }
}

#[tokio::test]
async fn test_undecodable_asset_never_reaches_gateway() {
    let gateway = ScriptedGateway::new(|_| Ok(json!({"results": [analysis_entry("good.mp4", 1)]})));
    let pipeline = AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway.clone());
    pipeline.upload("good.mp4", b"10".to_vec()).await.unwrap();
    let broken = pipeline.upload("broken.mov", b"garbage".to_vec()).await.unwrap();
    let empty = pipeline.upload("empty.mp4", b"0".to_vec()).await.unwrap();

    let report = pipeline.orchestrator().analyze_pending().await;

    assert_eq!(report.analyzed.len(), 1);
    for handle in [&broken, &empty] {
        let snapshot = pipeline.tracker().get(handle).await.unwrap();
        assert_eq!(snapshot.status, AssetStatus::Error);
        assert_eq!(snapshot.failure.unwrap().category, FailureCategory::Decode);
    }

    let analysis = gateway.requests_for(Stage::Analysis);
    let text = prompt_text(&analysis[0]);
    assert!(text.contains("good.mp4"));
    assert!(!text.contains("broken.mov"));
}

#[tokio::test]
async fn test_ambiguous_primary_stops_before_generation() {
    let gateway = ScriptedGateway::new(|_| {
        Ok(json!({"results": [analysis_entry("a.mp4", 1), analysis_entry("b.mp4", 1)]}))
    });
    let pipeline = AdPipeline::new(config(), Arc::new(TextDecoder::default()), gateway.clone());
    pipeline.upload("a.mp4", b"10".to_vec()).await.unwrap();
    pipeline.upload("b.mp4", b"10".to_vec()).await.unwrap();

    let err = pipeline.run(&brief()).await.unwrap_err();

    assert!(matches!(
        err,
        adforge_pipeline::PipelineError::Ranking(adforge_pipeline::RankingError::AmbiguousPrimary { .. })
    ));
    assert!(gateway.requests_for(Stage::Blueprints).is_empty());
}

/// Gateway that holds every call open for a while and records the peak
/// number of calls in flight at once.
struct SlowGateway {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl CompletionGateway for SlowGateway {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        // Answer for whichever asset the request labels.
        let entries: Vec<Value> = request
            .parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => t.strip_prefix("Asset \"")?.strip_suffix('"'),
                ContentPart::InlineMedia { .. } => None,
            })
            .enumerate()
            .map(|(i, id)| analysis_entry(id, i as u32 + 1))
            .collect();
        Ok(json!({ "results": entries }))
    }
}

#[tokio::test]
async fn test_outstanding_completions_stay_under_ceiling() {
    let gateway = Arc::new(SlowGateway {
        delay: Duration::from_millis(50),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let config = PipelineConfig {
        max_concurrent_completions: 2,
        ..config()
    };
    let pipeline = AdPipeline::new(config, Arc::new(TextDecoder::default()), gateway.clone());

    let mut handles = Vec::new();
    for i in 0..6 {
        handles.push(pipeline.upload(&format!("asset-{}.mp4", i), b"6".to_vec()).await.unwrap());
    }

    let orchestrator = pipeline.orchestrator();
    let reports = futures::future::join_all(
        handles
            .iter()
            .map(|h| orchestrator.analyze_batch(vec![h.clone()])),
    )
    .await;

    assert!(reports.iter().all(|r| r.analyzed.len() == 1));
    let peak = gateway.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight completions {} exceeds ceiling", peak);
    assert!(peak >= 1);
    assert_eq!(gateway.in_flight.load(Ordering::SeqCst), 0);
}
