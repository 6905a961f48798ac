//! Video generation workflow.
//!
//! Sequences the pipeline stages (Analyze → Images → Audio → Video →
//! Compose) over a project's storyboard, tracks weighted progress through
//! the task record and the progress hub, and persists state at every
//! transition. One run per project at a time: a per-project lease rejects a
//! second `execute` while one is in flight.

mod renderer;

pub use renderer::{FfmpegRenderer, SceneRenderer};

use crate::analysis::{storyboard_from_drafts, ScriptAnalyzer};
use crate::backends::{AudioEngine, ImageBackend, ImageRequest, SpeechBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{fan_out, ProgressFn, StageReport};
use crate::models::{GenerationTask, ProjectStatus, Scene, Storyboard, TaskStage};
use crate::progress::{ProgressEvent, ProgressHub};
use crate::reconcile::reconcile_storyboard;
use crate::store::{self, Store};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fixed partition of overall progress across stages: (start, span).
const ANALYZE_SPAN: (f64, f64) = (0.0, 0.10);
const IMAGES_SPAN: (f64, f64) = (0.10, 0.30);
const AUDIO_SPAN: (f64, f64) = (0.40, 0.20);
const VIDEO_SPAN: (f64, f64) = (0.60, 0.30);
const COMPOSE_SPAN: (f64, f64) = (0.90, 0.10);

fn stage_progress(span: (f64, f64), completed: usize, total: usize) -> f64 {
    if total == 0 {
        return span.0;
    }
    span.0 + span.1 * (completed as f64 / total as f64)
}

/// Serializes task updates: stage callbacks enqueue, one reporter applies
/// them in order, persists the task, and publishes the progress event.
struct Reporter {
    store: Arc<dyn Store>,
    hub: Arc<ProgressHub>,
    task: tokio::sync::Mutex<GenerationTask>,
    project_id: Uuid,
}

impl Reporter {
    async fn report(
        &self,
        stage: TaskStage,
        progress: f64,
        message: &str,
        current_scene: Option<usize>,
    ) {
        let snapshot = {
            let mut task = self.task.lock().await;
            task.update(stage, progress, message);
            if current_scene.is_some() {
                task.current_scene = current_scene;
            }
            task.clone()
        };

        if let Err(e) = self.store.update_task(snapshot.clone()).await {
            warn!("Failed to persist task progress: {e}");
        }

        self.hub.publish(
            self.project_id,
            ProgressEvent {
                task_id: snapshot.id,
                stage: snapshot.stage,
                progress: snapshot.progress,
                message: snapshot.message,
                current_scene: snapshot.current_scene,
                total_scenes: snapshot.total_scenes,
            },
        );
    }

    async fn set_total_scenes(&self, total: usize) {
        let snapshot = {
            let mut task = self.task.lock().await;
            task.total_scenes = total;
            task.clone()
        };
        if let Err(e) = self.store.update_task(snapshot).await {
            warn!("Failed to persist task: {e}");
        }
    }

    async fn fail(&self, message: &str) {
        let snapshot = {
            let mut task = self.task.lock().await;
            task.fail(message);
            task.clone()
        };

        if let Err(e) = self.store.update_task(snapshot.clone()).await {
            warn!("Failed to persist task failure: {e}");
        }

        self.hub.publish(
            self.project_id,
            ProgressEvent {
                task_id: snapshot.id,
                stage: snapshot.stage,
                progress: snapshot.progress,
                message: snapshot.message,
                current_scene: snapshot.current_scene,
                total_scenes: snapshot.total_scenes,
            },
        );
    }
}

/// Working directories for one project's artifacts.
struct ProjectDirs {
    images: PathBuf,
    audio: PathBuf,
    segments: PathBuf,
}

impl ProjectDirs {
    fn new(config: &Config, project_id: Uuid) -> Self {
        let root = config.paths.projects_dir.join(project_id.to_string());
        Self {
            images: root.join("images"),
            audio: root.join("audio"),
            segments: root.join("segments"),
        }
    }
}

/// Orchestrates the full narration-to-video pipeline.
pub struct Workflow {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn ScriptAnalyzer>,
    images: Arc<dyn ImageBackend>,
    speech: Arc<dyn SpeechBackend>,
    cloned_speech: Option<Arc<dyn SpeechBackend>>,
    renderer: Arc<dyn SceneRenderer>,
    hub: Arc<ProgressHub>,
    config: Config,
    active_runs: Mutex<HashSet<Uuid>>,
}

/// Removes the project from the active set when the run ends.
struct RunLease<'a> {
    runs: &'a Mutex<HashSet<Uuid>>,
    project_id: Uuid,
}

impl Drop for RunLease<'_> {
    fn drop(&mut self) {
        self.runs.lock().remove(&self.project_id);
    }
}

impl Workflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        analyzer: Arc<dyn ScriptAnalyzer>,
        images: Arc<dyn ImageBackend>,
        speech: Arc<dyn SpeechBackend>,
        renderer: Arc<dyn SceneRenderer>,
        hub: Arc<ProgressHub>,
        config: Config,
    ) -> Self {
        Self {
            store,
            analyzer,
            images,
            speech,
            cloned_speech: None,
            renderer,
            hub,
            config,
            active_runs: Mutex::new(HashSet::new()),
        }
    }

    /// Configure a separate voice-cloning backend for `AudioEngine::Cloned`.
    pub fn with_cloned_speech(mut self, backend: Arc<dyn SpeechBackend>) -> Self {
        self.cloned_speech = Some(backend);
        self
    }

    fn speech_backend(&self, engine: AudioEngine) -> Arc<dyn SpeechBackend> {
        match engine {
            AudioEngine::Cloned => self
                .cloned_speech
                .clone()
                .unwrap_or_else(|| {
                    warn!("No cloned-voice backend configured, falling back to TTS");
                    Arc::clone(&self.speech)
                }),
            AudioEngine::Tts => Arc::clone(&self.speech),
        }
    }

    fn acquire_lease(&self, project_id: Uuid) -> Result<RunLease<'_>> {
        let mut runs = self.active_runs.lock();
        if !runs.insert(project_id) {
            return Err(Error::RunActive { project_id });
        }
        Ok(RunLease {
            runs: &self.active_runs,
            project_id,
        })
    }

    /// Execute the full pipeline for a project. Returns the final video
    /// path; on any stage-level error the task and project record the
    /// failure and the error propagates.
    pub async fn execute(
        &self,
        project_id: Uuid,
        engine: AudioEngine,
        subtitles_enabled: bool,
    ) -> Result<PathBuf> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;

        let _lease = self.acquire_lease(project_id)?;

        let task = GenerationTask::new(project_id);
        let task = self.store.create_task(task).await?;
        let reporter = Arc::new(Reporter {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            task: tokio::sync::Mutex::new(task),
            project_id,
        });

        store::update_project_status(
            self.store.as_ref(),
            project_id,
            ProjectStatus::Generating,
            None,
        )
        .await?;

        match self
            .run_pipeline(project, engine, subtitles_enabled, &reporter)
            .await
        {
            Ok(output) => {
                reporter
                    .report(TaskStage::Done, 1.0, "video generation complete", None)
                    .await;
                store::set_project_output(self.store.as_ref(), project_id, &output).await?;
                info!("Video generation completed: {}", output.display());
                Ok(output)
            }
            Err(e) => {
                error!("Video generation failed: {e}");
                reporter.fail(&e.to_string()).await;
                let _ = store::update_project_status(
                    self.store.as_ref(),
                    project_id,
                    ProjectStatus::Failed,
                    Some(e.to_string()),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        project: crate::models::Project,
        engine: AudioEngine,
        subtitles_enabled: bool,
        reporter: &Arc<Reporter>,
    ) -> Result<PathBuf> {
        let project_id = project.id;
        let dirs = ProjectDirs::new(&self.config, project_id);

        // Analyze
        let mut storyboard = match project.storyboard {
            Some(board) => board,
            None => {
                reporter
                    .report(TaskStage::Analyzing, ANALYZE_SPAN.0, "analyzing script", None)
                    .await;
                let drafts = self.analyzer.analyze(&project.script).await?;
                let board = storyboard_from_drafts(
                    project_id,
                    drafts,
                    self.config.pipeline.default_scene_duration,
                )?;
                store::update_project_storyboard(self.store.as_ref(), project_id, board.clone())
                    .await?;
                board
            }
        };

        if storyboard.scenes.is_empty() {
            return Err(Error::validation("storyboard has no scenes"));
        }

        reporter.set_total_scenes(storyboard.scenes.len()).await;
        reporter
            .report(
                TaskStage::Analyzing,
                ANALYZE_SPAN.0 + ANALYZE_SPAN.1,
                "script analysis complete",
                None,
            )
            .await;

        // Images
        let report = self.image_stage(&storyboard, &dirs, reporter).await;
        info!(
            "Image stage: {}/{} scenes succeeded",
            report.succeeded(),
            report.outcomes.len()
        );
        storyboard.scenes = report.into_scenes();
        storyboard.touch();
        store::update_project_storyboard(
            self.store.as_ref(),
            project_id,
            storyboard.clone(),
        )
        .await?;

        // Audio + reconcile
        let measured = Arc::new(Mutex::new(vec![None; storyboard.scenes.len()]));
        let report = self
            .audio_stage(&storyboard, engine, &dirs, Arc::clone(&measured), reporter)
            .await;
        info!(
            "Audio stage: {}/{} scenes succeeded",
            report.succeeded(),
            report.outcomes.len()
        );
        storyboard.scenes = report.into_scenes();

        let measured = measured.lock().clone();
        let adjusted = reconcile_storyboard(&mut storyboard, &measured);
        if adjusted > 0 {
            info!("Reconciled {adjusted} scene durations against synthesized audio");
        }
        store::update_project_storyboard(
            self.store.as_ref(),
            project_id,
            storyboard.clone(),
        )
        .await?;

        // Video
        let report = self.video_stage(&storyboard, &dirs, reporter).await;
        info!(
            "Video stage: {}/{} segments rendered",
            report.succeeded(),
            report.outcomes.len()
        );
        storyboard.scenes = report.into_scenes();
        storyboard.touch();
        store::update_project_storyboard(
            self.store.as_ref(),
            project_id,
            storyboard.clone(),
        )
        .await?;

        // Compose
        reporter
            .report(
                TaskStage::Composing,
                COMPOSE_SPAN.0,
                "composing final video",
                None,
            )
            .await;
        self.compose(&storyboard, subtitles_enabled, project_id).await
    }

    /// Run one fan-out stage, forwarding per-completion progress into the
    /// reporter in completion order.
    async fn fanout_stage<J, F>(
        &self,
        scenes: Vec<Scene>,
        limit: usize,
        stage: TaskStage,
        span: (f64, f64),
        label: &'static str,
        reporter: &Arc<Reporter>,
        job: J,
    ) -> StageReport
    where
        J: Fn(Scene) -> F + Send + Sync + 'static,
        F: std::future::Future<Output = Result<Scene>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, usize)>();
        let progress: ProgressFn = Arc::new(move |done, total| {
            let _ = tx.send((done, total));
        });

        let forwarder = {
            let reporter = Arc::clone(reporter);
            tokio::spawn(async move {
                while let Some((done, total)) = rx.recv().await {
                    reporter
                        .report(
                            stage,
                            stage_progress(span, done, total),
                            &format!("{label} {done}/{total}"),
                            Some(done),
                        )
                        .await;
                }
            })
        };

        let report = fan_out(scenes, limit, job, Some(progress)).await;
        // The callback (and with it the sender) is dropped by now; drain.
        let _ = forwarder.await;
        report
    }

    async fn image_stage(
        &self,
        storyboard: &Storyboard,
        dirs: &ProjectDirs,
        reporter: &Arc<Reporter>,
    ) -> StageReport {
        reporter
            .report(TaskStage::Images, IMAGES_SPAN.0, "generating images", None)
            .await;

        let backend = Arc::clone(&self.images);
        let images_dir = dirs.images.clone();
        let (width, height) = (self.config.render.width, self.config.render.height);

        self.fanout_stage(
            storyboard.scenes.clone(),
            self.config.pipeline.max_concurrent_images,
            TaskStage::Images,
            IMAGES_SPAN,
            "generating image",
            reporter,
            move |mut scene| {
                let backend = Arc::clone(&backend);
                let images_dir = images_dir.clone();
                async move {
                    let mut request = ImageRequest::new(
                        scene.visual_prompt.clone(),
                        scene.negative_prompt.clone(),
                    );
                    request.width = width;
                    request.height = height;

                    let bytes = backend.generate(&request).await?;

                    tokio::fs::create_dir_all(&images_dir).await?;
                    let path = images_dir.join(format!("scene_{:04}.png", scene.order));
                    tokio::fs::write(&path, bytes).await?;

                    scene.image_path = Some(path);
                    Ok(scene)
                }
            },
        )
        .await
    }

    async fn audio_stage(
        &self,
        storyboard: &Storyboard,
        engine: AudioEngine,
        dirs: &ProjectDirs,
        measured: Arc<Mutex<Vec<Option<f64>>>>,
        reporter: &Arc<Reporter>,
    ) -> StageReport {
        reporter
            .report(TaskStage::Audio, AUDIO_SPAN.0, "synthesizing narration", None)
            .await;

        let backend = self.speech_backend(engine);
        let audio_dir = dirs.audio.clone();
        let voice = self.config.backends.voice.clone();
        let ext = engine.file_extension();

        self.fanout_stage(
            storyboard.scenes.clone(),
            self.config.pipeline.max_concurrent_audio,
            TaskStage::Audio,
            AUDIO_SPAN,
            "synthesizing narration",
            reporter,
            move |mut scene| {
                let backend = Arc::clone(&backend);
                let audio_dir = audio_dir.clone();
                let voice = voice.clone();
                let measured = Arc::clone(&measured);
                async move {
                    // Silent scenes advance the timeline but carry no audio.
                    if scene.narration.trim().is_empty() {
                        return Ok(scene);
                    }

                    let audio = backend.synthesize(&scene.narration, &voice).await?;

                    tokio::fs::create_dir_all(&audio_dir).await?;
                    let path = audio_dir.join(format!("audio_{:04}.{ext}", scene.order));
                    tokio::fs::write(&path, &audio.bytes).await?;

                    if audio.duration > 0.0 {
                        measured.lock()[scene.order] = Some(audio.duration);
                    }

                    scene.audio_path = Some(path);
                    Ok(scene)
                }
            },
        )
        .await
    }

    async fn video_stage(
        &self,
        storyboard: &Storyboard,
        dirs: &ProjectDirs,
        reporter: &Arc<Reporter>,
    ) -> StageReport {
        reporter
            .report(TaskStage::Video, VIDEO_SPAN.0, "rendering segments", None)
            .await;

        let renderer = Arc::clone(&self.renderer);
        let segments_dir = dirs.segments.clone();

        self.fanout_stage(
            storyboard.scenes.clone(),
            self.config.pipeline.max_concurrent_renders,
            TaskStage::Video,
            VIDEO_SPAN,
            "rendering segment",
            reporter,
            move |mut scene| {
                let renderer = Arc::clone(&renderer);
                let segments_dir = segments_dir.clone();
                async move {
                    // Scenes whose image job failed are skipped, not fatal.
                    if scene.image_path.is_none() {
                        warn!("Scene {}: no image, skipping render", scene.order);
                        return Ok(scene);
                    }

                    let clip = renderer.render_scene(&scene, &segments_dir).await?;
                    scene.video_path = Some(clip);
                    Ok(scene)
                }
            },
        )
        .await
    }

    async fn compose(
        &self,
        storyboard: &Storyboard,
        subtitles_enabled: bool,
        project_id: Uuid,
    ) -> Result<PathBuf> {
        let segments: Vec<PathBuf> = storyboard
            .scenes
            .iter()
            .filter_map(|s| s.video_path.clone())
            .collect();

        if segments.is_empty() {
            return Err(Error::validation("no video segments were generated"));
        }

        let output_dir = &self.config.paths.output_dir;
        let joined = output_dir.join(format!("{project_id}_final.mp4"));
        self.renderer.concat(&segments, &joined).await?;

        if !subtitles_enabled {
            return Ok(joined);
        }

        let subtitled = output_dir.join(format!("{project_id}_final_subtitled.mp4"));
        self.renderer
            .burn_subtitles(&joined, &storyboard.scenes, &subtitled)
            .await
    }

    /// Regenerate the image artifact for a single scene.
    pub async fn regenerate_scene_image(
        &self,
        project_id: Uuid,
        scene_order: usize,
        new_prompt: Option<String>,
    ) -> Result<Scene> {
        let mut project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;
        let storyboard = project
            .storyboard
            .as_mut()
            .ok_or_else(|| Error::validation("project has no storyboard"))?;
        let scene = storyboard
            .scenes
            .get_mut(scene_order)
            .ok_or_else(|| Error::validation(format!("no scene at order {scene_order}")))?;

        if let Some(prompt) = new_prompt {
            scene.visual_prompt = prompt;
        }

        let mut request =
            ImageRequest::new(scene.visual_prompt.clone(), scene.negative_prompt.clone());
        request.width = self.config.render.width;
        request.height = self.config.render.height;
        let bytes = self.images.generate(&request).await?;

        let dirs = ProjectDirs::new(&self.config, project_id);
        tokio::fs::create_dir_all(&dirs.images).await?;
        let path = dirs.images.join(format!("scene_{scene_order:04}_regen.png"));
        tokio::fs::write(&path, bytes).await?;

        scene.image_path = Some(path);
        let updated = scene.clone();
        storyboard.touch();
        self.store.update_project(project).await?;
        Ok(updated)
    }

    /// Regenerate the narration audio for a single scene, reconciling its
    /// duration against the new measurement.
    pub async fn regenerate_scene_audio(
        &self,
        project_id: Uuid,
        scene_order: usize,
        engine: AudioEngine,
    ) -> Result<Scene> {
        let mut project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;
        let storyboard = project
            .storyboard
            .as_mut()
            .ok_or_else(|| Error::validation("project has no storyboard"))?;
        let scene = storyboard
            .scenes
            .get_mut(scene_order)
            .ok_or_else(|| Error::validation(format!("no scene at order {scene_order}")))?;

        let backend = self.speech_backend(engine);
        let audio = backend
            .synthesize(&scene.narration, &self.config.backends.voice)
            .await?;

        let dirs = ProjectDirs::new(&self.config, project_id);
        tokio::fs::create_dir_all(&dirs.audio).await?;
        let path = dirs.audio.join(format!(
            "audio_{scene_order:04}_regen.{}",
            engine.file_extension()
        ));
        tokio::fs::write(&path, &audio.bytes).await?;

        scene.audio_path = Some(path);
        crate::reconcile::reconcile_scene(scene, audio.duration);
        let updated = scene.clone();

        storyboard.calculate_duration();
        storyboard.touch();
        self.store.update_project(project).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_spans_partition_the_unit_interval() {
        assert!((ANALYZE_SPAN.0 + ANALYZE_SPAN.1 - IMAGES_SPAN.0).abs() < 1e-9);
        assert!((IMAGES_SPAN.0 + IMAGES_SPAN.1 - AUDIO_SPAN.0).abs() < 1e-9);
        assert!((AUDIO_SPAN.0 + AUDIO_SPAN.1 - VIDEO_SPAN.0).abs() < 1e-9);
        assert!((VIDEO_SPAN.0 + VIDEO_SPAN.1 - COMPOSE_SPAN.0).abs() < 1e-9);
        assert!((COMPOSE_SPAN.0 + COMPOSE_SPAN.1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stage_progress_interpolates() {
        assert!((stage_progress(IMAGES_SPAN, 0, 4) - 0.10).abs() < 1e-9);
        assert!((stage_progress(IMAGES_SPAN, 2, 4) - 0.25).abs() < 1e-9);
        assert!((stage_progress(IMAGES_SPAN, 4, 4) - 0.40).abs() < 1e-9);
        // Degenerate stage with no units pins to the stage start.
        assert!((stage_progress(VIDEO_SPAN, 0, 0) - 0.60).abs() < 1e-9);
    }
}
