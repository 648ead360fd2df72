use std::collections::HashMap;

use log::debug;

use crate::engine::tokenizer::{LineToken, TokenKind};
use crate::error::BuildError;
use crate::script::{
    new_character_id, new_scene_id, new_node_id, new_script_id, now_millis, Character, Choice,
    Scene, Script, ScriptNode, DEFAULT_BACKGROUND, DEFAULT_SCENE_NAME, END_PLACEHOLDER,
    PRESET_COLORS,
};

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// Speaker names in first-seen order.
fn speaker_names(tokens: &[&LineToken]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in tokens {
        if !matches!(token.kind, TokenKind::Dialogue | TokenKind::ChoicePrompt) {
            continue;
        }
        if let Some(name) = &token.speaker {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Reuse characters from the previous graph by name and mint the rest.
///
/// The result lists surviving characters in their previous order, followed by
/// new ones. New colors continue the palette after every previous character.
fn resolve_characters(names: &[String], existing: &[Character]) -> Vec<Character> {
    // Later duplicates win, so a name always maps to one character.
    let by_name: HashMap<&str, &Character> =
        existing.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut color_idx = existing.len();
    let mut minted = Vec::new();
    for name in names {
        if by_name.contains_key(name.as_str()) {
            continue;
        }
        minted.push(Character {
            id: new_character_id(),
            name: name.clone(),
            color: PRESET_COLORS[color_idx % PRESET_COLORS.len()].to_string(),
        });
        color_idx += 1;
    }

    let mut characters: Vec<Character> = existing
        .iter()
        .filter(|c| names.contains(&c.name))
        .filter(|c| by_name.get(c.name.as_str()).is_some_and(|kept| kept.id == c.id))
        .cloned()
        .collect();
    characters.extend(minted);
    characters
}

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

/// Name-keyed scene table for one build pass.
struct SceneTable<'a> {
    previous: HashMap<&'a str, &'a Scene>,
    active: Vec<Scene>,
}

impl<'a> SceneTable<'a> {
    fn new(existing: &'a [Scene]) -> Self {
        let previous = existing.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut table = Self {
            previous,
            active: Vec::new(),
        };
        table.switch_to(DEFAULT_SCENE_NAME);
        table
    }

    fn default_id(&self) -> String {
        self.active[0].id.clone()
    }

    /// Id of the scene called `name`, registering it on first use.
    fn switch_to(&mut self, name: &str) -> String {
        if let Some(scene) = self.active.iter().find(|s| s.name == name) {
            return scene.id.clone();
        }
        let scene = match self.previous.get(name) {
            Some(prev) => (*prev).clone(),
            None => Scene {
                id: new_scene_id(),
                name: name.to_string(),
                background: DEFAULT_BACKGROUND.to_string(),
            },
        };
        let id = scene.id.clone();
        self.active.push(scene);
        id
    }

    fn into_scenes(self) -> Vec<Scene> {
        self.active
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Tokens that take part in the build. A leading heading whose text is the
/// title is the document title, not a scene switch.
fn content_tokens<'t>(tokens: &'t [LineToken], title: &str) -> Vec<&'t LineToken> {
    let title_idx = tokens
        .iter()
        .position(|t| !t.kind.is_transparent())
        .filter(|&i| tokens[i].kind == TokenKind::Scene && tokens[i].text == title.trim());

    tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| Some(*i) != title_idx && !t.kind.is_transparent())
        .map(|(_, t)| t)
        .collect()
}

/// Assemble a script graph from classified lines.
///
/// `previous` only supplies identity: the script id, creation time and the
/// ids and colors of characters and scenes that keep their names. Every node
/// gets a fresh id.
pub fn build(
    tokens: &[LineToken],
    title: &str,
    previous: Option<&Script>,
) -> Result<Script, BuildError> {
    let tokens = content_tokens(tokens, title);

    let names = speaker_names(&tokens);
    let characters = resolve_characters(
        &names,
        previous.map(|p| p.characters.as_slice()).unwrap_or(&[]),
    );
    let speaker_ids: HashMap<&str, &str> = characters
        .iter()
        .map(|c| (c.name.as_str(), c.id.as_str()))
        .collect();
    let speaker_id = |token: &LineToken| -> Result<Option<String>, BuildError> {
        match &token.speaker {
            None => Ok(None),
            Some(name) => speaker_ids
                .get(name.as_str())
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| BuildError::UnresolvedSpeaker {
                    name: name.clone(),
                    line: token.line,
                }),
        }
    };

    let mut scenes = SceneTable::new(previous.map(|p| p.scenes.as_slice()).unwrap_or(&[]));
    let mut current_scene = scenes.default_id();

    let mut nodes: Vec<ScriptNode> = Vec::new();
    // Index of the choice node still collecting `>` lines.
    let mut pending_choice: Option<usize> = None;

    for token in tokens {
        match token.kind {
            TokenKind::Empty | TokenKind::Comment => continue,
            TokenKind::Scene => {
                pending_choice = None;
                current_scene = scenes.switch_to(&token.text);
            }
            TokenKind::ChoiceOption => match pending_choice {
                Some(index) => {
                    let choices = nodes
                        .get_mut(index)
                        .and_then(|n| n.choices_mut())
                        .ok_or(BuildError::PendingChoiceMismatch { index })?;
                    choices.push(Choice::unresolved(token.text.clone()));
                }
                None => debug!("Dropping orphan option on line {}", token.line),
            },
            TokenKind::ChoicePrompt => {
                nodes.push(ScriptNode::choice(
                    new_node_id(),
                    Some(current_scene.clone()),
                    speaker_id(token)?,
                    token.text.clone(),
                    Vec::new(),
                ));
                pending_choice = Some(nodes.len() - 1);
            }
            TokenKind::Dialogue => {
                pending_choice = None;
                nodes.push(ScriptNode::dialogue(
                    new_node_id(),
                    Some(current_scene.clone()),
                    speaker_id(token)?,
                    token.text.clone(),
                ));
            }
            TokenKind::End => {
                pending_choice = None;
                let text = if token.text.is_empty() {
                    END_PLACEHOLDER.to_string()
                } else {
                    token.text.clone()
                };
                nodes.push(ScriptNode::end(
                    new_node_id(),
                    Some(current_scene.clone()),
                    text,
                ));
            }
        }
    }

    chain_dialogue(&mut nodes);

    let now = now_millis();
    let script = Script {
        id: previous.map(|p| p.id.clone()).unwrap_or_else(new_script_id),
        title: title.to_string(),
        characters,
        scenes: scenes.into_scenes(),
        start_node_id: nodes.first().map(|n| n.id.clone()).unwrap_or_default(),
        nodes,
        created_at: previous.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    };

    debug!(
        "Built '{}': {} nodes, {} characters, {} scenes",
        script.title,
        script.nodes.len(),
        script.characters.len(),
        script.scenes.len()
    );
    Ok(script)
}

/// Point every dialogue node at its successor in sequence order, whatever
/// that successor is. Choice and end nodes are left alone.
fn chain_dialogue(nodes: &mut [ScriptNode]) {
    for i in 0..nodes.len().saturating_sub(1) {
        if nodes[i].is_dialogue() {
            let next = nodes[i + 1].id.clone();
            nodes[i].set_next(Some(next));
        }
    }
}
