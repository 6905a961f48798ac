//! Script analysis: narration text → storyboard.

use crate::config::BackendsConfig;
use crate::error::{Error, Result};
use crate::models::{
    build_visual_prompt, suggest_effect, Scene, SceneType, Storyboard, MAX_SCENE_DURATION,
    MIN_SCENE_DURATION,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// One scene as drafted by the analysis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDraft {
    pub narration: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub scene_type: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub effect: Option<String>,
}

#[async_trait]
pub trait ScriptAnalyzer: Send + Sync {
    /// Split a narration script into scene drafts. Must return at least one.
    async fn analyze(&self, script: &str) -> Result<Vec<SceneDraft>>;
}

/// Turn backend drafts into a storyboard, filling gaps with the stock
/// prompt/effect heuristics and clamping planned durations.
pub fn storyboard_from_drafts(
    project_id: Uuid,
    drafts: Vec<SceneDraft>,
    default_duration: f64,
) -> Result<Storyboard> {
    if drafts.is_empty() {
        return Err(Error::validation("script analysis returned no scenes"));
    }

    let scenes = drafts
        .into_iter()
        .enumerate()
        .map(|(order, draft)| {
            let scene_type = match draft.scene_type.as_deref() {
                Some("metaphor") => SceneType::Metaphor,
                Some("transition") => SceneType::Transition,
                Some("title") => SceneType::Title,
                _ => SceneType::Narration,
            };

            let mut scene = Scene::new(order, draft.narration);
            scene.scene_type = scene_type;
            scene.duration = draft
                .duration
                .unwrap_or(default_duration)
                .clamp(MIN_SCENE_DURATION, MAX_SCENE_DURATION);

            scene.effect = draft
                .effect
                .as_deref()
                .and_then(|e| e.parse().ok())
                .unwrap_or_else(|| suggest_effect(scene_type, &scene.narration));

            if draft.visual_prompt.is_empty() {
                let (positive, negative) = build_visual_prompt(&scene.narration, scene_type);
                scene.visual_prompt = positive;
                scene.negative_prompt = negative;
            } else {
                scene.visual_prompt = draft.visual_prompt;
                if let Some(negative) = draft.negative_prompt {
                    scene.negative_prompt = negative;
                }
            }

            scene
        })
        .collect();

    let board = Storyboard::new(project_id, scenes);
    info!(
        "Script analysis produced {} scenes, total {:.2}s",
        board.scenes.len(),
        board.total_duration
    );
    Ok(board)
}

const SYSTEM_PROMPT: &str = "You are a storyboard designer for narrated explainer videos. \
Split the user's script into scenes. Respond with a JSON object of the form \
{\"scenes\": [{\"narration\": \"...\", \"visual_prompt\": \"...\", \
\"scene_type\": \"narration|metaphor|transition|title\", \"duration\": 3.0, \
\"effect\": \"zoom_in|zoom_out|pan_left|pan_right|none\"}]}. \
Each scene covers one narration clause of a few seconds.";

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmScriptAnalyzer {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ScenesEnvelope {
    #[serde(default)]
    scenes: Vec<SceneDraft>,
}

impl LlmScriptAnalyzer {
    pub fn new(config: &BackendsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.analysis_url.clone(),
            model: config.analysis_model.clone(),
            api_key: config.analysis_api_key.clone(),
        })
    }
}

#[async_trait]
impl ScriptAnalyzer for LlmScriptAnalyzer {
    async fn analyze(&self, script: &str) -> Result<Vec<SceneDraft>> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": script },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::external(
                "analysis",
                format!("chat completion returned {}", response.status()),
            ));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::external("analysis", "chat completion returned no choices"))?;

        let envelope: ScenesEnvelope = serde_json::from_str(content)
            .map_err(|e| Error::parse("analysis", format!("scene JSON: {e}")))?;

        if envelope.scenes.is_empty() {
            return Err(Error::external("analysis", "no scenes in analysis response"));
        }

        Ok(envelope.scenes)
    }
}
