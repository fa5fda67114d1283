//! 参与者身份
//!
//! 身份由两部分组成：稳定的会话ID和周期轮换的随机展示名。
//! 展示名从固定词表中随机拼接，不保证唯一，隐私即来自于此。

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::value_objects::SessionId;

/// 展示名形容词词表
const ADJECTIVES: &[&str] = &[
    "Anonymous",
    "Brave",
    "Covert",
    "Disguised",
    "Elusive",
    "Furtive",
    "Ghost",
    "Hidden",
    "Incognito",
    "Phantom",
    "Quiet",
    "Random",
    "Secret",
    "Stealth",
    "Veiled",
    "Masked",
    "Noble",
    "Private",
    "Wild",
    "Zealous",
    "Hero",
    "Warrior",
];

/// 展示名名词词表
const NOUNS: &[&str] = &[
    "Agent",
    "Browser",
    "Cipher",
    "Defender",
    "Explorer",
    "Friend",
    "Guardian",
    "Hiker",
    "Innovator",
    "Jumper",
    "Knight",
    "Lurker",
    "Messenger",
    "Navigator",
    "Observer",
    "Protector",
    "Questor",
    "Ranger",
    "Scout",
    "Traveler",
    "Minic",
    "Rolls",
];

/// 生成一个随机展示名（形容词 + 名词直接拼接）
pub fn random_display_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{}{}", adjective, noun)
}

/// 参与者身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    session_id: SessionId,
    display_name: String,
}

impl ParticipantIdentity {
    /// 生成全新身份：随机会话ID加随机展示名
    pub fn generate() -> Self {
        Self {
            session_id: SessionId::generate(),
            display_name: random_display_name(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// 轮换展示名，会话ID保持不变
    ///
    /// 返回轮换后的新展示名。新名字可能偶然与旧名字相同，
    /// 调用方不应依赖名字一定发生变化。
    pub fn rotate_display_name(&mut self) -> &str {
        self.display_name = random_display_name();
        &self.display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_composed_from_word_lists() {
        for _ in 0..50 {
            let name = random_display_name();
            let matched = ADJECTIVES.iter().any(|adj| {
                name.starts_with(adj) && NOUNS.contains(&&name[adj.len()..])
            });
            assert!(matched, "unexpected display name: {}", name);
        }
    }

    #[test]
    fn test_rotation_preserves_session_id() {
        let mut identity = ParticipantIdentity::generate();
        let original_id = identity.session_id();

        for _ in 0..10 {
            identity.rotate_display_name();
            assert_eq!(identity.session_id(), original_id);
        }
    }

    #[test]
    fn test_rotation_yields_names_from_word_lists() {
        let mut identity = ParticipantIdentity::generate();
        identity.rotate_display_name();
        let name = identity.display_name();
        assert!(ADJECTIVES.iter().any(|adj| name.starts_with(adj)));
        assert!(NOUNS.iter().any(|noun| name.ends_with(noun)));
    }
}
