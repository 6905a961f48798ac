//! Timeline assembly: stream-copy concatenation and background music.

use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

async fn run_ffmpeg(args: &[String]) -> Result<()> {
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

/// Join ordered segments into one file with the concat demuxer.
///
/// Pure stream copy, no re-encode: every segment must share codec,
/// resolution, and frame rate, which the composer guarantees.
pub async fn concat_segments(segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
    if segments.is_empty() {
        return Err(Error::validation("no video segments to concatenate"));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // concat demuxer wants a list file; quote the paths for its parser.
    let mut list = tempfile::Builder::new()
        .prefix("storyreel-concat-")
        .suffix(".txt")
        .tempfile()?;
    for segment in segments {
        let path = segment.canonicalize().unwrap_or_else(|_| segment.clone());
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        writeln!(list, "file '{escaped}'")?;
    }
    list.flush()?;

    let args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.path().to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ];

    info!("Concatenating {} segments", segments.len());
    run_ffmpeg(&args).await?;

    Ok(output.to_path_buf())
}

/// Mix a music bed under the narration track.
///
/// Narration sets the output length (`duration=first`); the music is
/// attenuated to `music_volume` in [0, 1].
pub async fn mix_background_music(
    video: &Path,
    music: &Path,
    output: &Path,
    music_volume: f64,
) -> Result<PathBuf> {
    let filter = format!(
        "[1:a]volume={music_volume}[music];[0:a][music]amix=inputs=2:duration=first"
    );

    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        music.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        output.to_string_lossy().to_string(),
    ];

    run_ffmpeg(&args).await?;

    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_segment_list_is_rejected() {
        let err = concat_segments(&[], Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
