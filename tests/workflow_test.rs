//! End-to-end orchestrator tests over fake collaborators.

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storyreel::analysis::{SceneDraft, ScriptAnalyzer};
use storyreel::backends::{
    AudioEngine, ImageBackend, ImageRequest, SpeechBackend, SynthesizedAudio,
};
use storyreel::config::Config;
use storyreel::error::{Error, Result};
use storyreel::models::{Project, ProjectStatus, Scene, TaskStage};
use storyreel::progress::ProgressHub;
use storyreel::store::{MemoryStore, Store};
use storyreel::workflow::{SceneRenderer, Workflow};

struct FakeAnalyzer {
    scene_count: usize,
    delay: Duration,
}

#[async_trait]
impl ScriptAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _script: &str) -> Result<Vec<SceneDraft>> {
        tokio::time::sleep(self.delay).await;
        if self.scene_count == 0 {
            return Err(Error::external("analysis", "no scenes in analysis response"));
        }
        Ok((0..self.scene_count)
            .map(|i| SceneDraft {
                narration: format!("Narration for scene {i}."),
                visual_prompt: format!("prompt-{i}"),
                negative_prompt: None,
                scene_type: None,
                duration: Some(3.0),
                effect: Some("zoom_in".to_string()),
            })
            .collect())
    }
}

/// Image backend that fails for prompts listed in `fail_prompts`.
struct FakeImages {
    fail_prompts: Vec<String>,
}

#[async_trait]
impl ImageBackend for FakeImages {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        if self.fail_prompts.iter().any(|p| request.prompt.contains(p.as_str())) {
            return Err(Error::external("image", "txt2img returned 500"));
        }
        Ok(b"fake-png".to_vec())
    }
}

/// Speech backend reporting a fixed measured duration per call.
struct FakeSpeech {
    duration: f64,
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<SynthesizedAudio> {
        Ok(SynthesizedAudio {
            bytes: b"fake-audio".to_vec(),
            duration: self.duration,
        })
    }
}

#[derive(Default)]
struct RendererLog {
    rendered: Vec<usize>,
    concatenated: Vec<usize>,
    subtitled: bool,
}

/// Renderer that fabricates clip files instead of invoking ffmpeg.
struct FakeRenderer {
    log: Arc<Mutex<RendererLog>>,
}

#[async_trait]
impl SceneRenderer for FakeRenderer {
    async fn render_scene(&self, scene: &Scene, segments_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(segments_dir).await?;
        let path = segments_dir.join(format!("segment_{:04}.mp4", scene.order));
        tokio::fs::write(&path, b"clip").await?;
        self.log.lock().rendered.push(scene.order);
        Ok(path)
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        if segments.is_empty() {
            return Err(Error::validation("no video segments to concatenate"));
        }
        tokio::fs::create_dir_all(output.parent().unwrap()).await?;
        tokio::fs::write(output, b"joined").await?;
        self.log.lock().concatenated.push(segments.len());
        Ok(output.to_path_buf())
    }

    async fn burn_subtitles(
        &self,
        _video: &Path,
        _scenes: &[Scene],
        output: &Path,
    ) -> Result<PathBuf> {
        tokio::fs::write(output, b"joined+subs").await?;
        self.log.lock().subtitled = true;
        Ok(output.to_path_buf())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    hub: Arc<ProgressHub>,
    workflow: Arc<Workflow>,
    log: Arc<Mutex<RendererLog>>,
    _tmp: tempfile::TempDir,
}

fn harness(analyzer: FakeAnalyzer, images: FakeImages, speech: FakeSpeech) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.projects_dir = tmp.path().join("projects");
    config.paths.output_dir = tmp.path().join("output");

    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(ProgressHub::new());
    let log = Arc::new(Mutex::new(RendererLog::default()));

    let workflow = Arc::new(Workflow::new(
        store.clone(),
        Arc::new(analyzer),
        Arc::new(images),
        Arc::new(speech),
        Arc::new(FakeRenderer { log: log.clone() }),
        hub.clone(),
        config,
    ));

    Harness {
        store,
        hub,
        workflow,
        log,
        _tmp: tmp,
    }
}

fn quick_analyzer(scene_count: usize) -> FakeAnalyzer {
    FakeAnalyzer {
        scene_count,
        delay: Duration::ZERO,
    }
}

async fn create_project(store: &MemoryStore) -> uuid::Uuid {
    let project = store
        .create_project(Project::new("demo", "Some narration script."))
        .await
        .unwrap();
    project.id
}

#[tokio::test]
async fn full_run_completes_project() {
    let h = harness(
        quick_analyzer(3),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.1 },
    );
    let project_id = create_project(&h.store).await;

    let output = h
        .workflow
        .execute(project_id, AudioEngine::Tts, true)
        .await
        .unwrap();
    assert!(output.to_string_lossy().ends_with("_final_subtitled.mp4"));

    let project = h.store.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Completed);
    assert_eq!(project.video_output_path, Some(output));

    let board = project.storyboard.unwrap();
    assert_eq!(board.scenes.len(), 3);
    assert!(board.scenes.iter().all(|s| s.image_path.is_some()));
    assert!(board.scenes.iter().all(|s| s.audio_path.is_some()));
    assert!(board.scenes.iter().all(|s| s.video_path.is_some()));

    let task = h.store.latest_task(project_id).await.unwrap().unwrap();
    assert_eq!(task.stage, TaskStage::Done);
    assert!((task.progress - 1.0).abs() < f64::EPSILON);
    assert!(task.error.is_none());
    assert_eq!(task.total_scenes, 3);

    let log = h.log.lock();
    assert_eq!(log.rendered.len(), 3);
    assert_eq!(log.concatenated, vec![3]);
    assert!(log.subtitled);
}

#[tokio::test]
async fn subtitles_can_be_disabled() {
    let h = harness(
        quick_analyzer(2),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.0 },
    );
    let project_id = create_project(&h.store).await;

    let output = h
        .workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();
    assert!(output.to_string_lossy().ends_with("_final.mp4"));
    assert!(!h.log.lock().subtitled);
}

#[tokio::test]
async fn single_image_failure_degrades_not_aborts() {
    let h = harness(
        quick_analyzer(5),
        FakeImages {
            fail_prompts: vec!["prompt-2".to_string()],
        },
        FakeSpeech { duration: 3.0 },
    );
    let project_id = create_project(&h.store).await;

    h.workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();

    let project = h.store.get_project(project_id).await.unwrap().unwrap();
    let board = project.storyboard.unwrap();

    // Exactly 4 of 5 scenes carry an image artifact; the failed scene was
    // skipped by the render stage, and the run still completed.
    assert_eq!(
        board.scenes.iter().filter(|s| s.image_path.is_some()).count(),
        4
    );
    assert!(board.scenes[2].image_path.is_none());
    assert!(board.scenes[2].video_path.is_none());
    assert_eq!(h.log.lock().concatenated, vec![4]);
    assert_eq!(project.status, ProjectStatus::Completed);
}

#[tokio::test]
async fn audio_duration_drift_is_reconciled() {
    // Planned 3.0s, measured 6.0s: outside the 10% band, adopted everywhere.
    let h = harness(
        quick_analyzer(3),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 6.0 },
    );
    let project_id = create_project(&h.store).await;

    h.workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();

    let board = h
        .store
        .get_project(project_id)
        .await
        .unwrap()
        .unwrap()
        .storyboard
        .unwrap();
    assert!(board.scenes.iter().all(|s| (s.duration - 6.0).abs() < 1e-9));
    assert!((board.total_duration - 18.0).abs() < 1e-9);
}

#[tokio::test]
async fn drift_within_band_keeps_plan() {
    let h = harness(
        quick_analyzer(2),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.2 },
    );
    let project_id = create_project(&h.store).await;

    h.workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();

    let board = h
        .store
        .get_project(project_id)
        .await
        .unwrap()
        .unwrap()
        .storyboard
        .unwrap();
    assert!(board.scenes.iter().all(|s| (s.duration - 3.0).abs() < 1e-9));
}

#[tokio::test]
async fn empty_analysis_fails_the_run() {
    let h = harness(
        quick_analyzer(0),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.0 },
    );
    let project_id = create_project(&h.store).await;

    let err = h
        .workflow
        .execute(project_id, AudioEngine::Tts, true)
        .await
        .unwrap_err();
    assert_matches!(err, Error::ExternalService { .. });

    let project = h.store.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Failed);
    assert!(project.error_message.is_some());

    let task = h.store.latest_task(project_id).await.unwrap().unwrap();
    assert!(task.error.is_some());
}

#[tokio::test]
async fn missing_project_is_a_validation_error() {
    let h = harness(
        quick_analyzer(1),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.0 },
    );

    let err = h
        .workflow
        .execute(uuid::Uuid::new_v4(), AudioEngine::Tts, true)
        .await
        .unwrap_err();
    assert_matches!(err, Error::Validation(_));
}

#[tokio::test]
async fn concurrent_run_is_rejected_by_lease() {
    let h = harness(
        FakeAnalyzer {
            scene_count: 2,
            delay: Duration::from_millis(300),
        },
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.0 },
    );
    let project_id = create_project(&h.store).await;

    let first = {
        let workflow = h.workflow.clone();
        tokio::spawn(async move { workflow.execute(project_id, AudioEngine::Tts, false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = h
        .workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap_err();
    assert_matches!(err, Error::RunActive { .. });

    // The original run is unaffected by the rejected one.
    first.await.unwrap().unwrap();

    // And once it finishes, the lease is released.
    h.workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn progress_is_monotone_and_staged() {
    let h = harness(
        quick_analyzer(4),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 3.0 },
    );
    let project_id = create_project(&h.store).await;

    let mut events = h.hub.subscribe(project_id);
    h.workflow
        .execute(project_id, AudioEngine::Tts, true)
        .await
        .unwrap();

    // Give the hub actor a beat to flush trailing publishes.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    assert!(!collected.is_empty());

    // Progress never decreases and stages never run backwards.
    for pair in collected.windows(2) {
        assert!(pair[1].progress >= pair[0].progress - 1e-9);
        assert!(pair[1].stage >= pair[0].stage);
    }

    assert_eq!(collected.last().unwrap().stage, TaskStage::Done);
    assert!((collected.last().unwrap().progress - 1.0).abs() < f64::EPSILON);

    // Per-unit callbacks from the fan-out stages showed up with scene counts.
    assert!(collected
        .iter()
        .any(|e| e.stage == TaskStage::Images && e.current_scene.is_some()));
    assert!(collected.iter().all(|e| e.total_scenes == 4 || e.total_scenes == 0));
}

#[tokio::test]
async fn regenerate_single_scene_audio_reconciles_duration() {
    let h = harness(
        quick_analyzer(2),
        FakeImages { fail_prompts: vec![] },
        FakeSpeech { duration: 7.5 },
    );
    let project_id = create_project(&h.store).await;

    // Seed the storyboard without running the whole pipeline.
    h.workflow
        .execute(project_id, AudioEngine::Tts, false)
        .await
        .unwrap();

    let scene = h
        .workflow
        .regenerate_scene_audio(project_id, 1, AudioEngine::Tts)
        .await
        .unwrap();
    assert!((scene.duration - 7.5).abs() < 1e-9);
    assert!(scene
        .audio_path
        .as_ref()
        .unwrap()
        .to_string_lossy()
        .contains("regen"));

    let board = h
        .store
        .get_project(project_id)
        .await
        .unwrap()
        .unwrap()
        .storyboard
        .unwrap();
    assert!((board.total_duration - 15.0).abs() < 1e-9);
}
