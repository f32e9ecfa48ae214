use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::SynthesisRequest;

/// Audio query document returned by `POST /audio_query`.
///
/// Only the four scale fields are interpreted; everything else (accent phrases,
/// sampling rate, pre/post phoneme lengths, ...) is kept in `rest` and sent back
/// to `/synthesis` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioQuery {
    #[serde(rename = "speedScale", default = "one")]
    pub speed_scale: f64,
    #[serde(rename = "pitchScale", default)]
    pub pitch_scale: f64,
    #[serde(rename = "intonationScale", default = "one")]
    pub intonation_scale: f64,
    #[serde(rename = "volumeScale", default = "one")]
    pub volume_scale: f64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn one() -> f64 {
    1.0
}

impl AudioQuery {
    /// Overwrite the scale fields with the request's values
    pub fn apply(&mut self, request: &SynthesisRequest) {
        self.speed_scale = request.speed();
        self.pitch_scale = request.pitch();
        self.intonation_scale = request.intonation();
        self.volume_scale = request.volume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{validate, SpeechParams};
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "accent_phrases": [{"moras": [], "accent": 1}],
            "speedScale": 1.0,
            "pitchScale": 0.0,
            "intonationScale": 1.0,
            "volumeScale": 1.0,
            "prePhonemeLength": 0.1,
            "outputSamplingRate": 24000,
            "kana": "コンニチワ"
        })
    }

    #[test]
    fn apply_overwrites_scales_and_keeps_the_rest() {
        let mut q: AudioQuery = serde_json::from_value(sample()).unwrap();
        let req = validate(
            &SpeechParams {
                speed: Some(1.5),
                pitch: Some(-0.1),
                intonation: Some(0.5),
                volume: Some(2.0),
                ..SpeechParams::new("こんにちは")
            },
            8,
        )
        .unwrap();
        q.apply(&req);

        let out = serde_json::to_value(&q).unwrap();
        assert_eq!(out["speedScale"], 1.5);
        assert_eq!(out["pitchScale"], -0.1);
        assert_eq!(out["intonationScale"], 0.5);
        assert_eq!(out["volumeScale"], 2.0);
        assert_eq!(out["outputSamplingRate"], 24000);
        assert_eq!(out["kana"], "コンニチワ");
        assert_eq!(out["accent_phrases"][0]["accent"], 1);
    }

    #[test]
    fn missing_scale_fields_take_neutral_defaults() {
        let q: AudioQuery = serde_json::from_value(json!({"kana": "ア"})).unwrap();
        assert_eq!(q.speed_scale, 1.0);
        assert_eq!(q.pitch_scale, 0.0);
        assert_eq!(q.volume_scale, 1.0);
        assert_eq!(q.rest.len(), 1);
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(serde_json::from_value::<AudioQuery>(json!([1, 2, 3])).is_err());
        assert!(serde_json::from_value::<AudioQuery>(json!({"speedScale": "fast"})).is_err());
    }
}
