// src/script.rs
//
// Scripted controls for the headless runner: a list of segments, each holding
// one InputState for a number of ticks. Past the end the last segment's
// buttons are released and the axes return to zero.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::InputState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub ticks: u64,
    #[serde(default)]
    pub input: InputState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputScript {
    pub segments: Vec<ScriptSegment>,
}

impl InputScript {
    /// Roll out, hold a right lean, straighten, then tap reset.
    pub fn demo() -> Self {
        let seg = |ticks, input| ScriptSegment { ticks, input };
        Self {
            segments: vec![
                seg(60, InputState::default()),
                seg(120, InputState { accelerate: true, ..InputState::default() }),
                seg(120, InputState { accelerate: true, horizontal: 1.0, ..InputState::default() }),
                seg(90, InputState { vertical: 0.5, ..InputState::default() }),
                seg(1, InputState { reset: true, ..InputState::default() }),
                seg(60, InputState::default()),
            ],
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn total_ticks(&self) -> u64 {
        self.segments.iter().map(|s| s.ticks).sum()
    }

    pub fn input_at(&self, tick: u64) -> InputState {
        let mut start = 0;
        for s in &self.segments {
            if tick < start + s.ticks {
                return s.input;
            }
            start += s.ticks;
        }
        InputState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_cover_their_ticks() {
        let script = InputScript::demo();
        assert_eq!(script.total_ticks(), 451);
        assert_eq!(script.input_at(0), InputState::default());
        assert!(script.input_at(60).accelerate);
        assert_eq!(script.input_at(180).horizontal, 1.0);
        assert!(script.input_at(390).reset);
        assert!(!script.input_at(391).reset);
        assert_eq!(script.input_at(10_000), InputState::default());
    }

    #[test]
    fn parses_json_with_partial_inputs() {
        let json = r#"[
            { "ticks": 10, "input": { "accelerate": true } },
            { "ticks": 5, "input": { "horizontal": -0.5 } },
            { "ticks": 3 }
        ]"#;
        let script: InputScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.segments.len(), 3);
        assert!(script.input_at(9).accelerate);
        assert_eq!(script.input_at(12).horizontal, -0.5);
        assert_eq!(script.input_at(16), InputState::default());
    }
}
