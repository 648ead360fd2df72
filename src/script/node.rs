use serde::{Deserialize, Serialize};

/// One option of a choice node. `next` is empty until the option is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub next: String,
}

impl Choice {
    pub fn unresolved(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next: String::new(),
        }
    }
}

/// Shape of a node. Dialogue carries the forward edge, choice carries its
/// options, end carries nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Dialogue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    Choice {
        #[serde(default)]
        choices: Vec<Choice>,
    },
    End,
}

/// A single unit of script content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    /// Character id, not the display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
}

impl ScriptNode {
    pub fn dialogue(
        id: impl Into<String>,
        scene_id: Option<String>,
        speaker: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Dialogue { next: None },
            scene_id,
            speaker,
            text: text.into(),
        }
    }

    pub fn choice(
        id: impl Into<String>,
        scene_id: Option<String>,
        speaker: Option<String>,
        text: impl Into<String>,
        choices: Vec<Choice>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Choice { choices },
            scene_id,
            speaker,
            text: text.into(),
        }
    }

    pub fn end(id: impl Into<String>, scene_id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::End,
            scene_id,
            speaker: None,
            text: text.into(),
        }
    }

    pub fn is_dialogue(&self) -> bool {
        matches!(self.kind, NodeKind::Dialogue { .. })
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, NodeKind::Choice { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End)
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Dialogue { .. } => "dialogue",
            NodeKind::Choice { .. } => "choice",
            NodeKind::End => "end",
        }
    }

    /// The explicit `next` edge. Only dialogue nodes have one.
    pub fn next(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Dialogue { next } => next.as_deref(),
            _ => None,
        }
    }

    /// Set the forward edge. Ignored for choice and end nodes.
    pub fn set_next(&mut self, target: Option<String>) {
        if let NodeKind::Dialogue { next } = &mut self.kind {
            *next = target;
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            NodeKind::Choice { choices } => choices,
            _ => &[],
        }
    }

    pub fn choices_mut(&mut self) -> Option<&mut Vec<Choice>> {
        match &mut self.kind {
            NodeKind::Choice { choices } => Some(choices),
            _ => None,
        }
    }

    /// Forward continuation as seen by a play-through renderer.
    ///
    /// Choice nodes have none: the renderer follows `choices[i].next` itself.
    pub fn continuation(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Dialogue { next } => next.as_deref().filter(|id| !id.is_empty()),
            NodeKind::Choice { .. } | NodeKind::End => None,
        }
    }
}
