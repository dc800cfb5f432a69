//! Loading quest configuration (prompts, batch size, banner, optional seed set) from TOML.
//!
//! Example:
//!
//! ```toml
//! quest_count = 3
//! alert_text = "Unfinished quests roll over to tomorrow."
//!
//! [prompts]
//! system = "You design tiny stay-at-home quests. Respond ONLY with strict JSON."
//!
//! [[seed_quests]]
//! title = "Level 1"
//! content = "Get up and wash your face!"
//! difficulty = 1
//! ```

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::QuestItem;
use crate::seeds::{seed_quests, DEFAULT_ALERT_TEXT};

pub const DEFAULT_QUEST_COUNT: usize = 3;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
  /// Number of quests requested from the model per batch.
  pub quest_count: usize,
  pub alert_text: String,
  pub prompts: Prompts,
  pub seed_quests: Vec<SeedQuestCfg>,
}

impl Default for QuestConfig {
  fn default() -> Self {
    Self {
      quest_count: DEFAULT_QUEST_COUNT,
      alert_text: DEFAULT_ALERT_TEXT.into(),
      prompts: Prompts::default(),
      seed_quests: Vec::new(),
    }
  }
}

/// Seed quest entry accepted in TOML configuration. `id` is generated when omitted.
#[derive(Clone, Debug, Deserialize)]
pub struct SeedQuestCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  pub content: String,
  pub difficulty: u32,
  #[serde(default)] pub completed: bool,
}

/// Prompts sent to the text-generation service. `{count}` is substituted in `user_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You design tiny, safe, stay-at-home daily quests that help people level up their routine. Respond ONLY with strict JSON.".into(),
      user_template: "Create {count} daily quests, ordered from easiest to hardest. Return JSON {\"quests\": [{\"title\": string, \"content\": string, \"difficulty\": string}]}. Titles are a short label, content is one concrete instruction ending with '!'. Write in Korean.".into(),
    }
  }
}

impl QuestConfig {
  /// The starting quest list: configured seeds if valid, otherwise the built-in set.
  ///
  /// Configured seeds with duplicate ids are rejected as a whole.
  pub fn resolve_seed_quests(&self) -> Vec<QuestItem> {
    if self.seed_quests.is_empty() {
      return seed_quests();
    }

    let items: Vec<QuestItem> = self
      .seed_quests
      .iter()
      .map(|s| QuestItem {
        id: s.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: s.title.clone(),
        content: s.content.clone(),
        difficulty: s.difficulty,
        completed: s.completed,
      })
      .collect();

    let mut seen = HashSet::new();
    if let Some(dup) = items.iter().find(|q| !seen.insert(q.id.as_str())) {
      error!(target: "quest", id = %dup.id, "Duplicate seed quest id in config; using built-in seeds");
      return seed_quests();
    }
    items
  }
}

/// Load `QuestConfig` from a TOML file. On any parsing/IO error, returns None.
pub fn load_quest_config(path: &str) -> Option<QuestConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<QuestConfig>(&s) {
      Ok(mut cfg) => {
        if cfg.quest_count == 0 {
          warn!(target: "homequest_backend", %path, "quest_count = 0 makes no sense; using default");
          cfg.quest_count = DEFAULT_QUEST_COUNT;
        }
        info!(target: "homequest_backend", %path, quest_count = cfg.quest_count, seeds = cfg.seed_quests.len(), "Loaded quest config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "homequest_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "homequest_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Read QUEST_CONFIG_PATH and load it, falling back to defaults.
pub fn load_quest_config_from_env() -> QuestConfig {
  std::env::var("QUEST_CONFIG_PATH")
    .ok()
    .and_then(|path| load_quest_config(&path))
    .unwrap_or_default()
}
