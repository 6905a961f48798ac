//! Subtitle cue generation and burn-in.
//!
//! Cue timing walks the scenes in order with a running clock: every scene
//! advances the clock by its duration, scenes with empty narration just
//! advance it without emitting a cue.

use crate::config::{SubtitleConfig, SubtitleFormat};
use crate::error::{Error, Result};
use crate::models::Scene;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

/// Maximum caption display length before shortening kicks in.
const MAX_CAPTION_CHARS: usize = 30;

/// Sentence-ending punctuation used as clause boundaries, CJK and ASCII.
const CLAUSE_MARKS: &[char] = &[
    '，', '。', '！', '？', '、', '；', '：', ',', '.', '!', '?', ';', ':',
];

/// Styling for the ASS cue track.
#[derive(Debug, Clone)]
pub struct SubtitleStyle {
    pub font: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub outline_colour: String,
    pub outline_width: u32,
    /// ASS alignment code; 2 = bottom center.
    pub alignment: u32,
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 48,
            primary_colour: "&HFFFFFF".to_string(),
            outline_colour: "&H000000".to_string(),
            outline_width: 2,
            alignment: 2,
            margin_v: 60,
        }
    }
}

impl From<&SubtitleConfig> for SubtitleStyle {
    fn from(config: &SubtitleConfig) -> Self {
        Self {
            font: config.font.clone(),
            font_size: config.font_size,
            margin_v: config.margin_v,
            ..Self::default()
        }
    }
}

/// Seconds → `HH:MM:SS,mmm`.
fn srt_timestamp(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    let millis = ((seconds % 1.0) * 1000.0) as u64;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Seconds → `H:MM:SS.cc` (hours unpadded, centiseconds).
fn ass_timestamp(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    let centis = ((seconds % 1.0) * 100.0) as u64;
    format!("{hours}:{minutes:02}:{secs:02}.{centis:02}")
}

/// Shorten an over-long caption to its first two clauses.
///
/// Intentionally lossy display heuristic: lines over 30 characters are
/// split at sentence punctuation and only the first two clauses survive,
/// rejoined with the first punctuation mark found.
pub fn shorten_caption(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '*' | '[' | ']')).collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= MAX_CAPTION_CHARS {
        return cleaned.to_string();
    }

    let Some(mark) = cleaned.chars().find(|c| CLAUSE_MARKS.contains(c)) else {
        return cleaned.to_string();
    };

    let mut clauses = cleaned
        .split(CLAUSE_MARKS)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (clauses.next(), clauses.next()) {
        (Some(first), Some(second)) => format!("{first}{mark}{second}"),
        (Some(first), None) => first.to_string(),
        _ => cleaned.to_string(),
    }
}

/// Walk the scene clock, yielding (start, end, caption) per non-empty cue.
fn cues(scenes: &[Scene]) -> Vec<(f64, f64, String)> {
    let mut out = Vec::new();
    let mut clock = 0.0;

    for scene in scenes {
        let start = clock;
        let end = clock + scene.duration;
        clock = end;

        if scene.narration.trim().is_empty() {
            continue;
        }
        out.push((start, end, shorten_caption(&scene.narration)));
    }

    out
}

/// Generate an SRT cue track from the scene timeline.
pub fn generate_srt(scenes: &[Scene]) -> String {
    let mut lines = Vec::new();

    for (index, (start, end, caption)) in cues(scenes).into_iter().enumerate() {
        lines.push((index + 1).to_string());
        lines.push(format!("{} --> {}", srt_timestamp(start), srt_timestamp(end)));
        lines.push(caption);
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Generate an ASS cue track with a style header.
pub fn generate_ass(scenes: &[Scene], style: &SubtitleStyle) -> String {
    let mut lines = vec![
        "[Script Info]".to_string(),
        "Title: storyreel".to_string(),
        "ScriptType: v4.00+".to_string(),
        String::new(),
        "[V4+ Styles]".to_string(),
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
            .to_string(),
        format!(
            "Style: Default,{},{},{},{},{},&H00000000,0,0,0,0,100,100,0,0,1,{},0,{},0,0,{},1",
            style.font,
            style.font_size,
            style.primary_colour,
            style.primary_colour,
            style.outline_colour,
            style.outline_width,
            style.alignment,
            style.margin_v,
        ),
        String::new(),
        "[Events]".to_string(),
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
            .to_string(),
    ];

    for (start, end, caption) in cues(scenes) {
        lines.push(format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{caption}",
            ass_timestamp(start),
            ass_timestamp(end),
        ));
    }

    lines.join("\n")
}

/// Burn the cue track into the video, copying the audio stream through.
pub async fn burn_subtitles(
    video: &Path,
    scenes: &[Scene],
    output: &Path,
    config: &SubtitleConfig,
) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let (content, suffix) = match config.format {
        SubtitleFormat::Ass => (generate_ass(scenes, &SubtitleStyle::from(config)), ".ass"),
        SubtitleFormat::Srt => (generate_srt(scenes), ".srt"),
    };

    let mut cue_file = tempfile::Builder::new()
        .prefix("storyreel-cues-")
        .suffix(suffix)
        .tempfile()?;
    cue_file.write_all(content.as_bytes())?;
    cue_file.flush()?;

    // The subtitles filter parses its own argument; escape what it treats
    // specially in the path.
    let cue_path = cue_file
        .path()
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'");

    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("subtitles={cue_path}"),
        "-c:a".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ];

    let result = Command::new("ffmpeg")
        .args(&args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffmpeg")
            } else {
                Error::Io(e)
            }
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(Error::render("ffmpeg", stderr));
    }

    info!("Subtitles burned into {}", output.display());
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(order: usize, narration: &str, duration: f64) -> Scene {
        let mut s = Scene::new(order, narration);
        s.duration = duration;
        s
    }

    #[test]
    fn srt_timestamp_format() {
        assert_eq!(srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(srt_timestamp(3.5), "00:00:03,500");
        assert_eq!(srt_timestamp(3661.25), "01:01:01,250");
    }

    #[test]
    fn ass_timestamp_format() {
        assert_eq!(ass_timestamp(0.0), "0:00:00.00");
        assert_eq!(ass_timestamp(7.04), "0:00:07.04");
        assert_eq!(ass_timestamp(3725.5), "1:02:05.50");
    }

    #[test]
    fn cue_starts_are_prefix_sums() {
        let scenes = vec![
            scene(0, "First scene narration.", 3.0),
            scene(1, "Second scene narration.", 4.0),
            scene(2, "Third scene narration.", 2.5),
        ];
        let cues = cues(&scenes);
        assert_eq!(cues.len(), 3);
        assert!((cues[0].0 - 0.0).abs() < 1e-9);
        assert!((cues[1].0 - 3.0).abs() < 1e-9);
        assert!((cues[2].0 - 7.0).abs() < 1e-9);
        assert!((cues[2].1 - 9.5).abs() < 1e-9);
    }

    #[test]
    fn empty_narration_advances_clock_without_cue() {
        let scenes = vec![
            scene(0, "Opening line.", 2.0),
            scene(1, "", 3.0),
            scene(2, "Closing line.", 2.0),
        ];
        let cues = cues(&scenes);
        assert_eq!(cues.len(), 2);
        // The silent scene still pushed the clock forward.
        assert!((cues[1].0 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn srt_numbers_cues_sequentially() {
        let scenes = vec![
            scene(0, "One.", 1.0),
            scene(1, "", 1.0),
            scene(2, "Two.", 1.0),
        ];
        let srt = generate_srt(&scenes);
        let lines: Vec<&str> = srt.lines().collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "00:00:00,000 --> 00:00:01,000");
        assert_eq!(lines[4], "2");
        assert_eq!(lines[5], "00:00:02,000 --> 00:00:03,000");
    }

    #[test]
    fn short_captions_pass_through() {
        assert_eq!(shorten_caption("A short line."), "A short line.");
    }

    #[test]
    fn long_captions_keep_first_two_clauses() {
        let text = "This clause is certainly long enough, and here is another one, plus a third";
        let shortened = shorten_caption(text);
        assert_eq!(
            shortened,
            "This clause is certainly long enough,and here is another one"
        );
    }

    #[test]
    fn long_caption_without_punctuation_is_untouched() {
        let text = "a".repeat(40);
        assert_eq!(shorten_caption(&text), text);
    }

    #[test]
    fn markup_characters_are_stripped() {
        assert_eq!(shorten_caption("Keep [this] *clean*"), "Keep this clean");
    }

    #[test]
    fn ass_header_carries_style() {
        let style = SubtitleStyle {
            font: "Helvetica".to_string(),
            font_size: 36,
            ..SubtitleStyle::default()
        };
        let ass = generate_ass(&[scene(0, "Hello.", 2.0)], &style);
        assert!(ass.contains("Style: Default,Helvetica,36,"));
        assert!(ass.contains("Dialogue: 0,0:00:00.00,0:00:02.00,Default,,0,0,0,,Hello."));
    }
}
