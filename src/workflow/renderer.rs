//! Rendering seam between the orchestrator and the ffmpeg-backed composer.

use crate::config::{RenderConfig, SubtitleConfig};
use crate::error::Result;
use crate::models::Scene;
use crate::render::{burn_subtitles, concat_segments, mux_narration, render_segment, SegmentSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait SceneRenderer: Send + Sync {
    /// Render one scene into its per-scene clip, muxing narration audio when
    /// present, and return the clip path.
    async fn render_scene(&self, scene: &Scene, segments_dir: &Path) -> Result<PathBuf>;

    /// Stream-copy join of ordered segments.
    async fn concat(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf>;

    /// Burn subtitle cues computed from the scenes into the video.
    async fn burn_subtitles(
        &self,
        video: &Path,
        scenes: &[Scene],
        output: &Path,
    ) -> Result<PathBuf>;
}

/// The production renderer, shelling out to ffmpeg.
pub struct FfmpegRenderer {
    render: RenderConfig,
    subtitles: SubtitleConfig,
}

impl FfmpegRenderer {
    pub fn new(render: RenderConfig, subtitles: SubtitleConfig) -> Self {
        Self { render, subtitles }
    }
}

#[async_trait]
impl SceneRenderer for FfmpegRenderer {
    async fn render_scene(&self, scene: &Scene, segments_dir: &Path) -> Result<PathBuf> {
        let image = scene
            .image_path
            .as_ref()
            .ok_or_else(|| crate::error::Error::validation("scene has no image artifact"))?;

        let segment = segments_dir.join(format!("segment_{:04}.mp4", scene.order));
        let spec = SegmentSpec::new(image, scene.duration, scene.effect)
            .with_render_config(&self.render);
        render_segment(&spec, &segment).await?;

        match &scene.audio_path {
            Some(audio) => {
                let with_audio =
                    segments_dir.join(format!("segment_{:04}_with_audio.mp4", scene.order));
                mux_narration(&segment, audio, &with_audio).await
            }
            None => Ok(segment),
        }
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        concat_segments(segments, output).await
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        scenes: &[Scene],
        output: &Path,
    ) -> Result<PathBuf> {
        burn_subtitles(video, scenes, output, &self.subtitles).await
    }
}
