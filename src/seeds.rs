//! Built-in content: the starting quest set and the reminder banner text.

use crate::domain::QuestItem;

/// Reminder shown in the dismissible footer banner.
pub const DEFAULT_ALERT_TEXT: &str = "시행하지 못하면 내일 퀘스트에 추가됩니다.";

/// The three quests every session starts with, difficulties 1..=3.
pub fn seed_quests() -> Vec<QuestItem> {
  vec![
    QuestItem {
      id: "1".into(),
      title: "난이도 1".into(),
      content: "일어나서 씻기!".into(),
      difficulty: 1,
      completed: false,
    },
    QuestItem {
      id: "2".into(),
      title: "난이도 2".into(),
      content: "핸드폰없이 30분이상 산책하기!".into(),
      difficulty: 2,
      completed: false,
    },
    QuestItem {
      id: "3".into(),
      title: "난이도 3".into(),
      content: "산책 중에 초면인 사람 3명과 가벼운 인사하기!".into(),
      difficulty: 3,
      completed: false,
    },
  ]
}
