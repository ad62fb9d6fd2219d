use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::AnalysisError;

/// Labels produced by the facial expression model, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-label confidence on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<Emotion, f64>);

impl EmotionScores {
    /// Builds scores from raw model output, rescaling so the values sum to 100.
    pub fn from_model_output(raw: &[f32]) -> Result<Self, AnalysisError> {
        if raw.len() != Emotion::ALL.len() {
            return Err(AnalysisError::InvalidOutput(format!(
                "expected {} emotion scores, got {}",
                Emotion::ALL.len(),
                raw.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(AnalysisError::InvalidOutput(
                "emotion scores must be finite and non-negative".to_string(),
            ));
        }

        let sum: f64 = raw.iter().map(|v| f64::from(*v)).sum();
        if sum <= 0.0 {
            return Err(AnalysisError::InvalidOutput(
                "emotion scores sum to zero".to_string(),
            ));
        }

        let scores = Emotion::ALL
            .iter()
            .zip(raw)
            .map(|(emotion, value)| (*emotion, 100.0 * f64::from(*value) / sum))
            .collect();
        Ok(EmotionScores(scores))
    }

    pub fn get(&self, emotion: Emotion) -> Option<f64> {
        self.0.get(&emotion).copied()
    }

    /// Highest scoring label. Ties go to the label listed first.
    pub fn dominant(&self) -> Option<(Emotion, f64)> {
        let mut best: Option<(Emotion, f64)> = None;
        for (emotion, score) in &self.0 {
            match best {
                Some((_, top)) if *score <= top => {}
                _ => best = Some((*emotion, *score)),
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        self.0.iter().map(|(emotion, score)| (*emotion, *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Emotion, f64)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (Emotion, f64)>>(iter: I) -> Self {
        EmotionScores(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_model_output_scales_to_percent() {
        let scores =
            EmotionScores::from_model_output(&[0.1, 0.0, 0.0, 0.6, 0.1, 0.0, 0.2]).unwrap();

        assert_eq!(scores.len(), 7);
        let total: f64 = scores.iter().map(|(_, v)| v).sum();
        assert!((total - 100.0).abs() < 1e-3);
        assert!((scores.get(Emotion::Happy).unwrap() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_from_model_output_rejects_wrong_length() {
        let err = EmotionScores::from_model_output(&[0.5, 0.5]).unwrap_err();
        assert!(err.to_string().contains("expected 7 emotion scores, got 2"));
    }

    #[test]
    fn test_from_model_output_rejects_zero_sum() {
        assert!(EmotionScores::from_model_output(&[0.0; 7]).is_err());
        assert!(EmotionScores::from_model_output(&[f32::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_dominant() {
        let scores = EmotionScores::from_model_output(&[1.0, 0.0, 0.0, 2.0, 5.0, 0.0, 2.0]).unwrap();
        let (emotion, score) = scores.dominant().unwrap();
        assert_eq!(emotion, Emotion::Sad);
        assert!((score - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_dominant_tie_keeps_first_label() {
        let scores = EmotionScores::from_model_output(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(scores.dominant().unwrap().0, Emotion::Happy);
    }

    #[test]
    fn test_serializes_as_label_map() {
        let scores = EmotionScores::from_model_output(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
        let json = serde_json::to_value(&scores).unwrap();

        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        let mut expected: Vec<&str> = Emotion::ALL.iter().map(|e| e.label()).collect();
        expected.sort();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, expected);
        assert_eq!(json["neutral"], serde_json::json!(50.0));
    }
}
