use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::editor::EditorCommand;
use crate::script::Script;

// ---------------------------------------------------------------------------
// Chat message helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.role, self.content)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

const GENERATE_SYSTEM: &str = "\
You write visual novel scripts. Continue the story from the user's prompt using exactly this syntax:
- # Scene name      switches the scene
- Name：line        a character speaks (full-width colon between name and line)
- plain text        narration
- ? prompt          opens a choice
- > option text     one option of the choice, directly after the ? line
- END description   an ending
- // comment
Output only script text, 5 to 15 lines. Keep character names consistent and at most 6 characters long. After a choice, continue in a new scene.";

const REWRITE_SYSTEM: &str = "\
You polish visual novel scripts. Keep the plot, the syntax, every character name, every scene name and every choice exactly as they are. Make the lines more vivid and add narration with scene detail. Output only the complete revised script.";

/// What the collaborator was asked to do, which decides how its output is
/// delivered to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Continue the story; the result is appended.
    Generate,
    /// Polish the whole text; the result replaces the buffer.
    Rewrite,
}

/// Messages for a "continue the story" request.
pub fn generate_request(script: &Script, prompt: &str) -> Vec<ChatMessage> {
    let names: Vec<&str> = script.characters.iter().map(|c| c.name.as_str()).collect();
    let cast = if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join("、")
    };
    vec![
        ChatMessage::system(GENERATE_SYSTEM),
        ChatMessage::user(format!("Existing characters: {cast}\n\n{prompt}")),
    ]
}

/// Messages for a "polish the whole draft" request.
pub fn rewrite_request(text: &str, instruction: &str) -> Vec<ChatMessage> {
    let user = if instruction.trim().is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n---\n\n{text}", instruction.trim())
    };
    vec![ChatMessage::system(REWRITE_SYSTEM), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// Output cleanup
// ---------------------------------------------------------------------------

fn think_pattern() -> &'static Regex {
    static THINK: OnceLock<Regex> = OnceLock::new();
    THINK.get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("think pattern is valid"))
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?m)^\s*```[\w-]*\s*$").expect("fence pattern is valid"))
}

/// Strip reasoning blocks and Markdown fences from raw model output.
pub fn clean_output(raw: &str) -> String {
    for cap in think_pattern().captures_iter(raw) {
        let thought = cap.get(1).map_or("", |m| m.as_str()).trim();
        if !thought.is_empty() {
            debug!("Model thinking:\n{thought}");
        }
    }
    let without_think = think_pattern().replace_all(raw, "");
    let without_fences = fence_pattern().replace_all(&without_think, "");
    without_fences.trim().to_string()
}

/// Turn model output into the editor command that delivers it.
pub fn into_command(mode: WriteMode, raw: &str) -> EditorCommand {
    let text = clean_output(raw);
    match mode {
        WriteMode::Generate => EditorCommand::AppendText(format!("\n\n{text}")),
        WriteMode::Rewrite => EditorCommand::ReplaceText(text),
    }
}
