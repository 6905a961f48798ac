//! Stock prompt text and effect selection heuristics.
//!
//! Fallbacks used when script analysis does not supply a visual prompt or an
//! effect for a scene.

use super::{Effect, SceneType};

/// Base style appended to every generated visual prompt.
pub const BASE_STYLE_PROMPT: &str = "cinematic lighting, film grain, depth of field, \
professional photography, 8k uhd, high quality, masterpiece, moody atmosphere, \
dramatic composition, volumetric lighting, movie still";

/// Stock negative prompt for the image backend.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "(worst quality, low quality:1.4), blurry, \
distortion, ugly, deformed, cartoon, anime, 3d render, oversaturated, flat lighting, \
watermark, text, signature, logo, bad anatomy, disfigured";

fn scene_type_suffix(scene_type: SceneType) -> &'static str {
    match scene_type {
        SceneType::Narration => "storytelling atmosphere, documentary style, balanced composition",
        SceneType::Metaphor => "surreal, symbolic, conceptual art, centered composition",
        SceneType::Transition => "atmospheric, establishing shot, wide angle",
        SceneType::Title => "clean background, minimal, plenty of negative space",
    }
}

/// Build a fallback visual prompt from the narration itself.
pub fn build_visual_prompt(narration: &str, scene_type: SceneType) -> (String, String) {
    let subject = narration.trim();
    let positive = format!(
        "{subject}, {}, {BASE_STYLE_PROMPT}",
        scene_type_suffix(scene_type)
    );
    (positive, DEFAULT_NEGATIVE_PROMPT.to_string())
}

/// Pick an effect for a scene when analysis does not specify one.
///
/// Metaphor shots push in for emphasis, titles stay static, transitions pull
/// out; otherwise the narration keywords decide, defaulting to a slow push.
pub fn suggest_effect(scene_type: SceneType, narration: &str) -> Effect {
    match scene_type {
        SceneType::Metaphor => return Effect::ZoomIn,
        SceneType::Title => return Effect::None,
        SceneType::Transition => return Effect::ZoomOut,
        SceneType::Narration => {}
    }

    let lower = narration.to_lowercase();
    const ZOOM_IN_WORDS: &[&str] = &["deep", "discover", "reveal", "focus", "essence", "core"];
    const ZOOM_OUT_WORDS: &[&str] = &["panorama", "whole", "overall", "big picture", "realize"];
    const PAN_LEFT_WORDS: &[&str] = &["look back", "past", "history", "once"];
    const PAN_RIGHT_WORDS: &[&str] = &["future", "forward", "next", "then"];

    for word in ZOOM_IN_WORDS {
        if lower.contains(word) {
            return Effect::ZoomIn;
        }
    }
    for word in ZOOM_OUT_WORDS {
        if lower.contains(word) {
            return Effect::ZoomOut;
        }
    }
    for word in PAN_LEFT_WORDS {
        if lower.contains(word) {
            return Effect::PanLeft;
        }
    }
    for word in PAN_RIGHT_WORDS {
        if lower.contains(word) {
            return Effect::PanRight;
        }
    }

    Effect::ZoomIn
}
