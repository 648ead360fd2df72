pub mod demo;
pub mod node;

use std::collections::HashSet;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

pub use node::{Choice, NodeKind, ScriptNode};

pub const DEFAULT_TITLE: &str = "未命名故事";
/// Name of the implicit scene. Never emitted as a heading.
pub const DEFAULT_SCENE_NAME: &str = "默认场景";
pub const END_PLACEHOLDER: &str = "故事结束";
pub const DEFAULT_BACKGROUND: &str =
    "linear-gradient(135deg, #1a1a2e 0%, #16213e 50%, #0f3460 100%)";

/// Colors handed out to newly discovered characters, in order.
pub const PRESET_COLORS: [&str; 9] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6",
    "#3b82f6",
];

// ---------------------------------------------------------------------------
// Ids and timestamps
// ---------------------------------------------------------------------------

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn new_script_id() -> String {
    short_uuid()
}

pub fn new_character_id() -> String {
    format!("char-{}", short_uuid())
}

pub fn new_scene_id() -> String {
    format!("scene-{}", short_uuid())
}

pub fn new_node_id() -> String {
    format!("node-{}", short_uuid())
}

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    /// Avatar background color.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    /// CSS gradient or color string.
    pub background: String,
}

impl Scene {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_SCENE_NAME
    }
}

/// The aggregate root: characters, scenes and the ordered node sequence.
///
/// Node order matters. It is the chaining order used when the graph is built
/// from text and the emission order when it is written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub title: String,
    pub characters: Vec<Character>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<ScriptNode>,
    pub start_node_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Script {
    /// A fresh script with a default scene, a narrator and one opening line.
    pub fn new_blank() -> Self {
        let now = now_millis();
        let scene_id = "scene-default".to_string();
        let char_id = "char-narrator".to_string();
        let node_id = new_node_id();
        Self {
            id: new_script_id(),
            title: DEFAULT_TITLE.into(),
            characters: vec![Character {
                id: char_id.clone(),
                name: "旁白".into(),
                color: PRESET_COLORS[0].into(),
            }],
            scenes: vec![Scene {
                id: scene_id.clone(),
                name: DEFAULT_SCENE_NAME.into(),
                background: DEFAULT_BACKGROUND.into(),
            }],
            nodes: vec![ScriptNode::dialogue(
                node_id.clone(),
                Some(scene_id),
                Some(char_id),
                "故事从这里开始...",
            )],
            start_node_id: node_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn demo() -> Self {
        demo::memory_fragments()
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&ScriptNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut ScriptNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn start_node(&self) -> Option<&ScriptNode> {
        self.node(&self.start_node_id)
    }

    /// Display name of a node's speaker, if it resolves.
    pub fn speaker_name(&self, node: &ScriptNode) -> Option<&str> {
        node.speaker
            .as_deref()
            .and_then(|id| self.character(id))
            .map(|c| c.name.as_str())
    }

    // -----------------------------------------------------------------------
    // Structured edits. Each one bumps `updated_at`.
    // -----------------------------------------------------------------------

    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1);
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Insert a new dialogue node after `after`, taking over its forward edge.
    /// Appends at the end when `after` is `None` or unknown. Returns the new id.
    pub fn insert_dialogue_after(&mut self, after: Option<&str>, text: impl Into<String>) -> String {
        let mut node = ScriptNode::dialogue(
            new_node_id(),
            self.scenes.first().map(|s| s.id.clone()),
            self.characters.first().map(|c| c.id.clone()),
            text,
        );
        let id = node.id.clone();

        let position = after.and_then(|a| self.nodes.iter().position(|n| n.id == a));
        match position {
            Some(idx) => {
                let prev = &mut self.nodes[idx];
                node.set_next(prev.next().map(str::to_string));
                prev.set_next(Some(id.clone()));
                self.nodes.insert(idx + 1, node);
            }
            None => self.nodes.push(node),
        }

        if self.start_node_id.is_empty() {
            self.start_node_id = id.clone();
        }
        self.touch();
        id
    }

    pub fn update_text(&mut self, node_id: &str, text: impl Into<String>) -> bool {
        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        node.text = text.into();
        self.touch();
        true
    }

    /// Point option `index` of a choice node at `target`.
    pub fn set_choice_target(&mut self, node_id: &str, index: usize, target: impl Into<String>) -> bool {
        let Some(choice) = self
            .node_mut(node_id)
            .and_then(|n| n.choices_mut())
            .and_then(|c| c.get_mut(index))
        else {
            return false;
        };
        choice.next = target.into();
        self.touch();
        true
    }

    /// Remove a node, clear `next` edges into it and drop choices targeting it.
    pub fn delete_node(&mut self, node_id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != node_id);
        if self.nodes.len() == before {
            return false;
        }

        for node in &mut self.nodes {
            if node.next() == Some(node_id) {
                node.set_next(None);
            }
            if let Some(choices) = node.choices_mut() {
                choices.retain(|c| c.next != node_id);
            }
        }
        self.touch();
        true
    }

    pub fn add_character(&mut self, name: impl Into<String>, color: impl Into<String>) -> String {
        let id = new_character_id();
        self.characters.push(Character {
            id: id.clone(),
            name: name.into(),
            color: color.into(),
        });
        self.touch();
        id
    }

    pub fn rename_character(&mut self, id: &str, name: impl Into<String>) -> bool {
        let Some(c) = self.characters.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        c.name = name.into();
        self.touch();
        true
    }

    pub fn delete_character(&mut self, id: &str) -> bool {
        let before = self.characters.len();
        self.characters.retain(|c| c.id != id);
        let removed = self.characters.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn add_scene(&mut self, name: impl Into<String>, background: impl Into<String>) -> String {
        let id = new_scene_id();
        self.scenes.push(Scene {
            id: id.clone(),
            name: name.into(),
            background: background.into(),
        });
        self.touch();
        id
    }

    pub fn rename_scene(&mut self, id: &str, name: impl Into<String>) -> bool {
        let Some(s) = self.scenes.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        s.name = name.into();
        self.touch();
        true
    }

    pub fn delete_scene(&mut self, id: &str) -> bool {
        let before = self.scenes.len();
        self.scenes.retain(|s| s.id != id);
        let removed = self.scenes.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Import / export
    // -----------------------------------------------------------------------

    /// Parse a foreign script file. Anything structurally invalid is rejected
    /// as a whole.
    pub fn from_json(raw: &str) -> Result<Self, ImportError> {
        let script: Script = serde_json::from_str(raw).map_err(|e| {
            warn!("Rejected script import: {e}");
            ImportError::from(e)
        })?;

        if script.id.trim().is_empty() {
            return Err(ImportError::Structure("script id is empty".into()));
        }
        let mut seen = HashSet::new();
        for node in &script.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ImportError::Structure(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        info!(
            "Imported script '{}' ({} nodes, {} characters, {} scenes)",
            script.title,
            script.nodes.len(),
            script.characters.len(),
            script.scenes.len()
        );
        Ok(script)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_line_script() -> Script {
        let mut s = Script::new_blank();
        let first = s.nodes[0].id.clone();
        let second = s.insert_dialogue_after(Some(&first), "second");
        s.insert_dialogue_after(Some(&second), "third");
        s
    }

    #[test]
    fn test_new_blank_is_consistent() {
        let s = Script::new_blank();
        assert_eq!(s.title, DEFAULT_TITLE);
        assert_eq!(s.start_node().unwrap().text, "故事从这里开始...");
        assert!(s.scenes[0].is_default());
        assert_eq!(s.speaker_name(&s.nodes[0]), Some("旁白"));
    }

    #[test]
    fn test_insert_after_rewires_next() {
        let mut s = Script::new_blank();
        let first = s.nodes[0].id.clone();
        let last = s.insert_dialogue_after(Some(&first), "last");
        let middle = s.insert_dialogue_after(Some(&first), "middle");

        assert_eq!(s.nodes.len(), 3);
        assert_eq!(s.nodes[1].id, middle);
        assert_eq!(s.node(&first).unwrap().next(), Some(middle.as_str()));
        assert_eq!(s.node(&middle).unwrap().next(), Some(last.as_str()));
    }

    #[test]
    fn test_delete_node_clears_edges() {
        let mut s = three_line_script();
        let first = s.nodes[0].id.clone();
        let second = s.nodes[1].id.clone();
        let before = s.updated_at;

        assert!(s.delete_node(&second));
        assert!(!s.delete_node(&second));
        assert_eq!(s.nodes.len(), 2);
        assert_eq!(s.node(&first).unwrap().next(), None);
        assert!(s.updated_at > before);
    }

    #[test]
    fn test_delete_node_drops_choices_targeting_it() {
        let mut s = Script::demo();
        assert!(s.delete_node("demo-n5"));
        let choice = s.node("demo-n4").unwrap();
        assert_eq!(choice.choices().len(), 1);
        assert_eq!(choice.choices()[0].next, "demo-n8");
    }

    #[test]
    fn test_set_choice_target() {
        let mut s = Script::demo();
        assert!(s.set_choice_target("demo-n4", 1, "demo-n5"));
        assert_eq!(s.node("demo-n4").unwrap().choices()[1].next, "demo-n5");
        assert!(!s.set_choice_target("demo-n4", 9, "demo-n5"));
        assert!(!s.set_choice_target("demo-n0", 0, "demo-n5"));
    }

    #[test]
    fn test_json_round_trip_uses_camel_case() {
        let s = Script::demo();
        let json = s.to_json_pretty().unwrap();
        assert!(json.contains("\"startNodeId\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"sceneId\""));
        let back = Script::from_json(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_import_rejects_missing_fields() {
        let err = Script::from_json(r#"{"id":"x","title":"t"}"#).unwrap_err();
        assert!(matches!(err, ImportError::Malformed(_)));
        assert!(Script::from_json("not json").is_err());
    }

    #[test]
    fn test_import_rejects_duplicate_node_ids() {
        let mut s = Script::demo();
        let dup = s.nodes[0].clone();
        s.nodes.push(dup);
        let json = s.to_json_pretty().unwrap();
        let err = Script::from_json(&json).unwrap_err();
        assert!(matches!(err, ImportError::Structure(_)));
    }
}
