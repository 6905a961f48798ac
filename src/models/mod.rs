mod prompts;

pub use prompts::{build_visual_prompt, suggest_effect, DEFAULT_NEGATIVE_PROMPT};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Minimum and maximum planned duration for a single scene, in seconds.
pub const MIN_SCENE_DURATION: f64 = 1.0;
pub const MAX_SCENE_DURATION: f64 = 10.0;

/// What a scene is doing in the narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    #[default]
    Narration,
    Metaphor,
    Transition,
    Title,
}

/// Camera motion applied to a scene's still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    None,
}

impl std::str::FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "zoom_in" | "zoom-in" => Ok(Effect::ZoomIn),
            "zoom_out" | "zoom-out" => Ok(Effect::ZoomOut),
            "pan_left" | "pan-left" => Ok(Effect::PanLeft),
            "pan_right" | "pan-right" => Ok(Effect::PanRight),
            "none" => Ok(Effect::None),
            other => Err(format!("unknown effect: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Analyzing,
    Ready,
    Generating,
    Completed,
    Failed,
}

/// Pipeline stage of a generation task. Transitions follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStage {
    Analyzing,
    Images,
    Audio,
    Video,
    Composing,
    Done,
}

impl TaskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStage::Analyzing => "analyzing",
            TaskStage::Images => "images",
            TaskStage::Audio => "audio",
            TaskStage::Video => "video",
            TaskStage::Composing => "composing",
            TaskStage::Done => "done",
        }
    }
}

/// One narration clause mapped to one generated image, optional audio, and a
/// rendered clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    /// Narration text. Immutable after creation.
    pub narration: String,
    pub visual_prompt: String,
    pub negative_prompt: String,
    pub scene_type: SceneType,
    /// Position in the storyboard, contiguous from 0.
    pub order: usize,
    /// Planned duration in seconds; may be replaced by the measured audio
    /// duration after synthesis.
    pub duration: f64,
    pub effect: Effect,
    pub image_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
}

impl Scene {
    pub fn new(order: usize, narration: impl Into<String>) -> Self {
        let narration = narration.into();
        Self {
            id: Uuid::new_v4(),
            visual_prompt: String::new(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            scene_type: SceneType::Narration,
            order,
            duration: 3.0,
            effect: suggest_effect(SceneType::Narration, &narration),
            image_path: None,
            audio_path: None,
            video_path: None,
            narration,
        }
    }
}

/// Ordered scene list for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyboard {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scenes: Vec<Scene>,
    pub total_duration: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storyboard {
    pub fn new(project_id: Uuid, scenes: Vec<Scene>) -> Self {
        let mut board = Self {
            id: Uuid::new_v4(),
            project_id,
            scenes,
            total_duration: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        board.calculate_duration();
        board
    }

    /// Recompute `total_duration` from the scenes. Must be called whenever
    /// any scene duration changes.
    pub fn calculate_duration(&mut self) -> f64 {
        self.total_duration = self.scenes.iter().map(|s| s.duration).sum();
        self.total_duration
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub script: String,
    pub storyboard: Option<Storyboard>,
    pub video_output_path: Option<PathBuf>,
    pub status: ProjectStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            script: script.into(),
            storyboard: None,
            video_output_path: None,
            status: ProjectStatus::Draft,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// One execution attempt of the generation pipeline. A project accumulates a
/// history of tasks; only the latest is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: Uuid,
    pub project_id: Uuid,
    pub stage: TaskStage,
    /// Overall progress in [0, 1]. Monotonically non-decreasing for the
    /// lifetime of one run.
    pub progress: f64,
    pub current_scene: Option<usize>,
    pub total_scenes: usize,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    pub fn new(project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            stage: TaskStage::Analyzing,
            progress: 0.0,
            current_scene: None,
            total_scenes: 0,
            message: String::new(),
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Advance stage/progress/message. Progress never moves backwards.
    pub fn update(&mut self, stage: TaskStage, progress: f64, message: &str) {
        self.stage = stage;
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        self.message = message.to_string();
        self.updated_at = Utc::now();
    }

    /// Record a fatal error. The last reported progress is kept, not rolled
    /// back.
    pub fn fail(&mut self, error: &str) {
        self.error = Some(error.to_string());
        self.message = format!("generation failed: {error}");
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.stage == TaskStage::Done || self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_duration(order: usize, duration: f64) -> Scene {
        let mut scene = Scene::new(order, format!("scene {order}"));
        scene.duration = duration;
        scene
    }

    #[test]
    fn total_duration_is_scene_sum() {
        let scenes = vec![
            scene_with_duration(0, 3.0),
            scene_with_duration(1, 4.0),
            scene_with_duration(2, 2.5),
        ];
        let mut board = Storyboard::new(Uuid::new_v4(), scenes);
        assert!((board.total_duration - 9.5).abs() < f64::EPSILON);

        board.scenes[1].duration = 6.0;
        board.calculate_duration();
        assert!((board.total_duration - 11.5).abs() < f64::EPSILON);
    }

    #[test]
    fn task_progress_is_monotonic() {
        let mut task = GenerationTask::new(Uuid::new_v4());
        task.update(TaskStage::Images, 0.4, "images");
        task.update(TaskStage::Audio, 0.2, "audio");
        assert_eq!(task.stage, TaskStage::Audio);
        assert!((task.progress - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_task_keeps_last_progress() {
        let mut task = GenerationTask::new(Uuid::new_v4());
        task.update(TaskStage::Video, 0.75, "rendering");
        task.fail("ffmpeg exploded");
        assert!((task.progress - 0.75).abs() < f64::EPSILON);
        assert!(task.is_terminal());
    }

    #[test]
    fn effect_parses_both_spellings() {
        assert_eq!("zoom_in".parse::<Effect>().unwrap(), Effect::ZoomIn);
        assert_eq!("pan-right".parse::<Effect>().unwrap(), Effect::PanRight);
        assert!("dolly".parse::<Effect>().is_err());
    }
}
