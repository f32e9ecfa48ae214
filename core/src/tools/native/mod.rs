pub mod speech;

pub use speech::{
    register_speech_tools, speech_registry, ListSpeakersTool, SaveAudioTool, SpeakTextTool,
};
