//! Per-scene segment composition.
//!
//! Renders one still image into an animated clip of exactly the requested
//! duration and optionally muxes narration audio onto it.

use super::effect::{FilterChain, MotionSettings};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::models::Effect;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Everything needed to render one scene clip.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub image: PathBuf,
    pub duration: f64,
    pub effect: Effect,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub preset: String,
    pub crf: u32,
    pub motion: MotionSettings,
}

impl SegmentSpec {
    pub fn new(image: impl Into<PathBuf>, duration: f64, effect: Effect) -> Self {
        Self {
            image: image.into(),
            duration,
            effect,
            width: 1920,
            height: 1080,
            fps: 30,
            preset: "medium".to_string(),
            crf: 18,
            motion: MotionSettings::default(),
        }
    }

    pub fn with_render_config(mut self, render: &RenderConfig) -> Self {
        self.width = render.width;
        self.height = render.height;
        self.fps = render.fps;
        self.preset = render.preset.clone();
        self.crf = render.crf;
        self.motion = MotionSettings {
            zoom_step: render.zoom_step,
            max_zoom: render.max_zoom,
        };
        self
    }
}

async fn run_ffmpeg(args: &[String]) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));

    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffmpeg")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::render("ffmpeg", stderr));
    }

    Ok(())
}

/// Render a still image into a silent clip of exactly `spec.duration`
/// seconds at the requested resolution and rate.
pub async fn render_segment(spec: &SegmentSpec, output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let vf = FilterChain::for_effect(
        spec.effect,
        spec.width,
        spec.height,
        spec.fps,
        spec.duration,
        &spec.motion,
    )
    .render();

    let args = vec![
        "-y".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        spec.image.to_string_lossy().to_string(),
        "-vf".to_string(),
        vf,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-tune".to_string(),
        "stillimage".to_string(),
        "-preset".to_string(),
        spec.preset.clone(),
        "-crf".to_string(),
        spec.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-t".to_string(),
        spec.duration.to_string(),
        "-r".to_string(),
        spec.fps.to_string(),
        output.to_string_lossy().to_string(),
    ];

    run_ffmpeg(&args).await?;

    info!("Rendered segment: {}", output.display());
    Ok(output.to_path_buf())
}

/// Mux narration audio onto a rendered clip.
///
/// The video stream is copied; audio is encoded to AAC. `-shortest` means
/// the combined duration is the shorter of the two streams, so audio past
/// the clip end is dropped.
pub async fn mux_narration(video: &Path, audio: &Path, output: &Path) -> Result<PathBuf> {
    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
        output.to_string_lossy().to_string(),
    ];

    run_ffmpeg(&args).await?;

    debug!("Muxed narration onto {}", output.display());
    Ok(output.to_path_buf())
}
