//! Ken Burns effect lowering.
//!
//! Effects are tagged variants lowered through a typed [`FilterChain`] into
//! the ffmpeg filter description, instead of building filter strings at each
//! call site.

use crate::models::Effect;
use std::fmt;

/// Tunables for the zoom effects.
#[derive(Debug, Clone, Copy)]
pub struct MotionSettings {
    /// Per-frame zoom increment.
    pub zoom_step: f64,
    /// Zoom factor cap; reached mid-clip, the zoom holds there.
    pub max_zoom: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            zoom_step: 0.0015,
            max_zoom: 1.5,
        }
    }
}

/// One step of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStep {
    /// Scale preserving aspect ratio inside the given box.
    ScaleFit { width: u32, height: u32 },
    /// Scale to an exact width, height following the aspect ratio.
    ScaleWidth { width: u32 },
    /// zoompan with a zoom expression, recentered on the image center.
    ZoomPan {
        zoom_expr: String,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// Sweep window; x is an expression over t.
    Crop {
        width: u32,
        height: u32,
        x_expr: String,
    },
    /// Letterbox to the exact output box, centered.
    Pad { width: u32, height: u32 },
    /// Pin the clip to an exact duration.
    Trim { duration: f64 },
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStep::ScaleFit { width, height } => write!(
                f,
                "scale={width}x{height}:force_original_aspect_ratio=decrease"
            ),
            FilterStep::ScaleWidth { width } => write!(f, "scale={width}:-1"),
            FilterStep::ZoomPan {
                zoom_expr,
                width,
                height,
                fps,
            } => write!(
                f,
                "zoompan=z='{zoom_expr}':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={width}x{height}:fps={fps}"
            ),
            FilterStep::Crop {
                width,
                height,
                x_expr,
            } => write!(f, "crop={width}:{height}:'{x_expr}':'(ih-oh)/2'"),
            FilterStep::Pad { width, height } => {
                write!(f, "pad={width}x{height}:(ow-iw)/2:(oh-ih)/2")
            }
            FilterStep::Trim { duration } => write!(f, "trim=duration={duration}"),
        }
    }
}

/// An ordered filter chain, rendered as a comma-joined ffmpeg `-vf` value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    steps: Vec<FilterStep>,
}

impl FilterChain {
    /// Lower an effect into the filter chain for one scene clip.
    pub fn for_effect(
        effect: Effect,
        width: u32,
        height: u32,
        fps: u32,
        duration: f64,
        motion: &MotionSettings,
    ) -> Self {
        let MotionSettings { zoom_step, max_zoom } = *motion;

        let steps = match effect {
            // Zoom ramps linearly per frame, recentered so the focal point
            // never drifts, and holds at the cap once reached.
            Effect::ZoomIn => vec![
                FilterStep::ScaleFit { width, height },
                FilterStep::ZoomPan {
                    zoom_expr: format!("min(zoom+{zoom_step},{max_zoom})"),
                    width,
                    height,
                    fps,
                },
                FilterStep::Trim { duration },
            ],
            Effect::ZoomOut => vec![
                FilterStep::ScaleFit { width, height },
                FilterStep::ZoomPan {
                    zoom_expr: format!("if(eq(on,1),{max_zoom},max(zoom-{zoom_step},1.0))"),
                    width,
                    height,
                    fps,
                },
                FilterStep::Trim { duration },
            ],
            // Pans scale the source to double the output width and sweep an
            // output-width window across it over the clip duration.
            Effect::PanLeft => vec![
                FilterStep::ScaleWidth { width: width * 2 },
                FilterStep::Crop {
                    width,
                    height,
                    x_expr: format!("(iw-ow)*(1-t/{duration})"),
                },
                FilterStep::Trim { duration },
            ],
            Effect::PanRight => vec![
                FilterStep::ScaleWidth { width: width * 2 },
                FilterStep::Crop {
                    width,
                    height,
                    x_expr: format!("(iw-ow)*t/{duration}"),
                },
                FilterStep::Trim { duration },
            ],
            Effect::None => vec![
                FilterStep::ScaleFit { width, height },
                FilterStep::Pad { width, height },
                FilterStep::Trim { duration },
            ],
        };

        Self { steps }
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    /// Render the chain into the `-vf` argument value.
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
