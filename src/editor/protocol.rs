use crate::engine::LineToken;
use crate::script::Script;

/// Messages accepted by a running editor session.
#[derive(Debug, Clone)]
pub enum EditorCommand {
    /// The user typed; carries the whole buffer.
    Edit(String),
    /// A collaborator appends raw text to the buffer.
    AppendText(String),
    /// A collaborator replaces the buffer wholesale.
    ReplaceText(String),
    /// The graph changed outside the text buffer (structured edit, import),
    /// or the host is echoing a `Rebuilt` graph back.
    LoadScript(Script),
    /// Rebuild now if a rebuild is pending.
    Flush,
    Shutdown,
}

/// Messages published by an editor session.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// Highlighting tokens for the current buffer. Sent on every change.
    Tokens(Vec<LineToken>),
    /// A debounced rebuild produced a new graph.
    Rebuilt {
        script: Script,
        diagnostics: Vec<String>,
    },
    /// A rebuild failed; the previous graph is still current.
    BuildFailed(String),
    /// The buffer was regenerated from the graph.
    TextResynced(String),
}
