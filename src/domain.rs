//! Domain models: the quest item shown on the board and the raw candidate
//! returned by the text-generation service.

use serde::{Deserialize, Deserializer, Serialize};

/// Score points awarded per difficulty tier of a completed quest.
pub const POINTS_PER_DIFFICULTY: u64 = 10;

/// A single quest on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestItem {
  pub id: String,
  pub title: String,
  pub content: String,
  /// Tier used as score weight (not clamped).
  pub difficulty: u32,
  #[serde(default)]
  pub completed: bool,
}

impl QuestItem {
  /// Points this quest contributes to the score once completed.
  pub fn points(&self) -> u64 {
    u64::from(self.difficulty) * POINTS_PER_DIFFICULTY
  }
}

/// Unprocessed quest as returned by the model, before it becomes a `QuestItem`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GeneratedQuestCandidate {
  pub title: String,
  pub content: String,
  // "Easy", "3", 3 ... whatever the model felt like.
  #[serde(default, deserialize_with = "lenient_label")]
  pub difficulty: String,
}

/// Accept a string, a number, or null for the difficulty label and keep it as text.
fn lenient_label<'de, D>(de: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let v = serde_json::Value::deserialize(de)?;
  Ok(match v {
    serde_json::Value::String(s) => s,
    serde_json::Value::Null => String::new(),
    other => other.to_string(),
  })
}
