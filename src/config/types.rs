use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backends: BackendsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub subtitles: SubtitleConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

/// Endpoints for the hosted generation services.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendsConfig {
    #[serde(default = "default_analysis_url")]
    pub analysis_url: String,

    #[serde(default)]
    pub analysis_api_key: Option<String>,

    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_speech_url")]
    pub speech_url: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    /// Per-request timeout in seconds. On expiry only the affected scene
    /// job fails, never the whole stage.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_analysis_url() -> String {
    "http://127.0.0.1:8000/v1/chat/completions".to_string()
}
fn default_analysis_model() -> String {
    "deepseek-chat".to_string()
}
fn default_image_url() -> String {
    "http://127.0.0.1:7860".to_string()
}
fn default_speech_url() -> String {
    "http://127.0.0.1:9880".to_string()
}
fn default_voice() -> String {
    "default".to_string()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            analysis_url: default_analysis_url(),
            analysis_api_key: None,
            analysis_model: default_analysis_model(),
            image_url: default_image_url(),
            speech_url: default_speech_url(),
            voice: default_voice(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Concurrency ceilings for the fan-out stages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrent_images")]
    pub max_concurrent_images: usize,

    #[serde(default = "default_concurrent_audio")]
    pub max_concurrent_audio: usize,

    #[serde(default = "default_concurrent_renders")]
    pub max_concurrent_renders: usize,

    #[serde(default = "default_scene_duration")]
    pub default_scene_duration: f64,
}

fn default_concurrent_images() -> usize {
    3
}
fn default_concurrent_audio() -> usize {
    2
}
fn default_concurrent_renders() -> usize {
    2
}
fn default_scene_duration() -> f64 {
    3.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_images: default_concurrent_images(),
            max_concurrent_audio: default_concurrent_audio(),
            max_concurrent_renders: default_concurrent_renders(),
            default_scene_duration: default_scene_duration(),
        }
    }
}

/// Output encoding settings. Every segment shares these, which is what makes
/// the stream-copy concat safe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Per-frame zoom increment for the Ken Burns zoom effects.
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Zoom factor cap.
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_fps() -> u32 {
    30
}
fn default_preset() -> String {
    "medium".to_string()
}
fn default_crf() -> u32 {
    18
}
fn default_zoom_step() -> f64 {
    0.0015
}
fn default_max_zoom() -> f64 {
    1.5
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            preset: default_preset(),
            crf: default_crf(),
            zoom_step: default_zoom_step(),
            max_zoom: default_max_zoom(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtitleConfig {
    #[serde(default = "default_subtitle_format")]
    pub format: SubtitleFormat,

    #[serde(default = "default_font")]
    pub font: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default = "default_margin_v")]
    pub margin_v: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Ass,
}

fn default_subtitle_format() -> SubtitleFormat {
    SubtitleFormat::Ass
}
fn default_font() -> String {
    "Arial".to_string()
}
fn default_font_size() -> u32 {
    48
}
fn default_margin_v() -> u32 {
    60
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            format: default_subtitle_format(),
            font: default_font(),
            font_size: default_font_size(),
            margin_v: default_margin_v(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Per-project working files (images, audio, segments) live here.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,

    /// Final videos land here.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("./data/projects")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            output_dir: default_output_dir(),
        }
    }
}
