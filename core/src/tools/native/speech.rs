use crate::params::{ParamRange, SpeechParams, INTONATION, PITCH, SPEED, VOLUME};
use crate::service::{format_speakers, saved_message, SpeechService};
use crate::tools::{Tool, ToolError, ToolRegistry, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// shared schema pieces
// ─────────────────────────────────────────────────────────────────────────────

fn range_schema(range: &ParamRange, label: &str) -> Value {
    json!({
        "type": "number",
        "minimum": range.min,
        "maximum": range.max,
        "default": range.default,
        "description": format!("{} ({} to {}, default {})", label, range.min, range.max, range.default)
    })
}

fn speech_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        "text".into(),
        json!({"type": "string", "description": "Text to synthesize"}),
    );
    props.insert(
        "speaker".into(),
        json!({
            "type": "integer",
            "minimum": 0,
            "description": "Speaker id (defaults to SPEAKER_ID; see list_speakers)"
        }),
    );
    props.insert("speed".into(), range_schema(&SPEED, "Speaking rate"));
    props.insert("pitch".into(), range_schema(&PITCH, "Pitch"));
    props.insert("intonation".into(), range_schema(&INTONATION, "Intonation"));
    props.insert("volume".into(), range_schema(&VOLUME, "Volume"));
    props
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> ToolResult<T> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// speak_text
// ─────────────────────────────────────────────────────────────────────────────

pub struct SpeakTextTool {
    service: Arc<SpeechService>,
}

impl SpeakTextTool {
    pub fn new(service: Arc<SpeechService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SpeakTextTool {
    fn name(&self) -> String {
        "speak_text".to_string()
    }

    fn description(&self) -> String {
        "Synthesize text with VOICEVOX and play it on the host's speakers".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": speech_properties(),
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<String> {
        let params: SpeechParams = parse_args(arguments)?;
        Ok(self.service.try_speak_text(&params).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// save_audio
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SaveAudioArgs {
    output_path: String,
    #[serde(flatten)]
    params: SpeechParams,
}

pub struct SaveAudioTool {
    service: Arc<SpeechService>,
}

impl SaveAudioTool {
    pub fn new(service: Arc<SpeechService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SaveAudioTool {
    fn name(&self) -> String {
        "save_audio".to_string()
    }

    fn description(&self) -> String {
        "Synthesize text with VOICEVOX and save it as a WAV file".to_string()
    }

    fn parameters(&self) -> Value {
        let mut props = speech_properties();
        props.insert(
            "output_path".into(),
            json!({
                "type": "string",
                "description": "Destination file path (.wav); the directory must exist"
            }),
        );
        json!({
            "type": "object",
            "properties": props,
            "required": ["text", "output_path"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<String> {
        let args: SaveAudioArgs = parse_args(arguments)?;
        let saved = self
            .service
            .try_save_audio(&args.params, &args.output_path)
            .await?;
        Ok(saved_message(&saved))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// list_speakers
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListSpeakersTool {
    service: Arc<SpeechService>,
}

impl ListSpeakersTool {
    pub fn new(service: Arc<SpeechService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for ListSpeakersTool {
    fn name(&self) -> String {
        "list_speakers".to_string()
    }

    fn description(&self) -> String {
        "List the VOICEVOX characters and styles with their speaker ids".to_string()
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _arguments: Value) -> ToolResult<String> {
        let speakers = self.service.try_list_speakers().await?;
        Ok(format_speakers(&speakers))
    }
}

/// Register `speak_text`, `save_audio` and `list_speakers` backed by one service
pub fn register_speech_tools(registry: &ToolRegistry, service: Arc<SpeechService>) {
    registry.register(Arc::new(SpeakTextTool::new(Arc::clone(&service))));
    registry.register(Arc::new(SaveAudioTool::new(Arc::clone(&service))));
    registry.register(Arc::new(ListSpeakersTool::new(service)));
}

/// Registry holding the speech tools, with the call budget from the service config
pub fn speech_registry(service: Arc<SpeechService>) -> ToolRegistry {
    let registry = ToolRegistry::with_call_timeout(service.config().tool_call_timeout());
    register_speech_tools(&registry, service);
    registry
}
