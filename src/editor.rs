pub mod protocol;
pub mod service;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::engine::{parse_document, to_text, tokenize, validate, LineToken};
use crate::error::BuildError;
use crate::script::Script;

pub use protocol::{EditorCommand, EditorEvent};
pub use service::{spawn, EditorHandle};

/// Turns a buffer into a graph, given the last accepted graph.
pub type BuildFn = fn(&str, Option<&Script>) -> Result<Script, BuildError>;

/// How many rebuilt graphs are remembered while waiting for their echo.
const ECHO_WINDOW: usize = 8;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Quiet period after the last change before the graph is rebuilt.
    pub debounce: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(350),
        }
    }
}

/// Outcome of a debounced rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rebuild {
    Built { diagnostics: Vec<String> },
    Failed(String),
}

// ---------------------------------------------------------------------------
// Editor session
// ---------------------------------------------------------------------------

/// One editable script: the text buffer, the last accepted graph and the
/// debounce timer between them.
///
/// Time is passed in by the caller, so the session itself never sleeps.
pub struct Editor {
    config: EditorConfig,
    build: BuildFn,
    script: Script,
    text: String,
    /// When the pending rebuild fires. `None` when nothing is pending.
    deadline: Option<Instant>,
    /// Graphs produced by rebuilds that the host has not echoed back yet,
    /// oldest first. An incoming graph equal to one of these is an echo.
    unechoed: VecDeque<Script>,
    last_error: Option<String>,
}

impl Editor {
    pub fn new(script: Script, config: EditorConfig) -> Self {
        Self::with_builder(script, config, parse_document)
    }

    pub fn with_builder(script: Script, config: EditorConfig, build: BuildFn) -> Self {
        let text = to_text(&script);
        info!(
            "Editor opened '{}' ({} nodes)",
            script.title,
            script.nodes.len()
        );
        Self {
            config,
            build,
            script,
            text,
            deadline: None,
            unechoed: VecDeque::new(),
            last_error: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The last accepted graph.
    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Tokens for display highlighting. Not debounced.
    pub fn highlight(&self) -> Vec<LineToken> {
        tokenize(&self.text)
    }

    // -----------------------------------------------------------------------
    // Text changes
    // -----------------------------------------------------------------------

    /// Replace the buffer with what the user typed and restart the timer.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.schedule(now);
    }

    pub fn append_external(&mut self, text: &str, now: Instant) {
        debug!("Appending {} bytes from collaborator", text.len());
        self.text.push_str(text);
        self.schedule(now);
    }

    pub fn replace_external(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        debug!("Buffer replaced by collaborator ({} bytes)", self.text.len());
        self.schedule(now);
    }

    /// A superseded timer is simply replaced.
    fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.config.debounce);
    }

    // -----------------------------------------------------------------------
    // Rebuilds
    // -----------------------------------------------------------------------

    /// Rebuild if the debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Rebuild> {
        match self.deadline {
            Some(deadline) if deadline <= now => Some(self.rebuild()),
            _ => None,
        }
    }

    /// Rebuild immediately if anything is pending.
    pub fn flush(&mut self) -> Option<Rebuild> {
        if self.deadline.is_some() {
            Some(self.rebuild())
        } else {
            None
        }
    }

    fn rebuild(&mut self) -> Rebuild {
        self.deadline = None;
        match (self.build)(&self.text, Some(&self.script)) {
            Ok(script) => {
                let diagnostics = validate(&script);
                debug!(
                    "Rebuilt '{}': {} nodes, {} diagnostics",
                    script.title,
                    script.nodes.len(),
                    diagnostics.len()
                );
                if self.unechoed.len() == ECHO_WINDOW {
                    self.unechoed.pop_front();
                }
                self.unechoed.push_back(script.clone());
                self.script = script;
                self.last_error = None;
                Rebuild::Built { diagnostics }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Rebuild failed, keeping previous graph: {message}");
                self.last_error = Some(message.clone());
                Rebuild::Failed(message)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Graph changes
    // -----------------------------------------------------------------------

    /// Accept a graph that changed outside the buffer.
    ///
    /// Returns `true` when the buffer was regenerated. A graph this editor
    /// rebuilt itself is an echo: it is consumed, along with any older echo
    /// still outstanding, and the buffer and current graph are left alone.
    pub fn graph_changed(&mut self, script: Script) -> bool {
        if let Some(pos) = self.unechoed.iter().position(|s| *s == script) {
            self.unechoed.drain(..=pos);
            debug!("Ignoring echo of rebuilt graph '{}'", script.title);
            return false;
        }
        self.script = script;
        self.deadline = None;
        self.text = to_text(&self.script);
        debug!("Buffer resynchronised from graph '{}'", self.script.title);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Editor {
        Editor::new(Script::new_blank(), EditorConfig::default())
    }

    fn failing_build(_: &str, _: Option<&Script>) -> Result<Script, BuildError> {
        Err(BuildError::PendingChoiceMismatch { index: 0 })
    }

    #[test]
    fn test_buffer_starts_from_graph() {
        let e = editor();
        assert_eq!(e.text(), "# 未命名故事\n\n旁白：故事从这里开始...");
        assert!(!e.is_pending());
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let mut e = editor();
        let t0 = Instant::now();
        e.edit("# 标题\n甲：一", t0);
        e.edit("# 标题\n甲：一\n乙：二", t0 + Duration::from_millis(200));

        assert_eq!(e.poll(t0 + Duration::from_millis(400)), None);
        let rebuilt = e.poll(t0 + Duration::from_millis(550));
        assert!(matches!(rebuilt, Some(Rebuild::Built { .. })));
        assert_eq!(e.script().nodes.len(), 2);
        assert_eq!(e.script().title, "标题");
        assert_eq!(e.poll(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_rebuild_keeps_identity() {
        let mut e = editor();
        let id = e.script().id.clone();
        e.edit("旁白：换个开头", Instant::now());
        e.flush();
        assert_eq!(e.script().id, id);
        assert_eq!(e.script().characters[0].id, "char-narrator");
    }

    #[test]
    fn test_rebuild_reports_diagnostics() {
        let mut e = editor();
        e.edit("? 问题\n> 选项", Instant::now());
        match e.flush() {
            Some(Rebuild::Built { diagnostics }) => assert_eq!(diagnostics.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_failed_rebuild_keeps_graph() {
        let blank = Script::new_blank();
        let mut e = Editor::with_builder(blank.clone(), EditorConfig::default(), failing_build);
        e.edit("甲：一", Instant::now());

        assert!(matches!(e.flush(), Some(Rebuild::Failed(_))));
        assert_eq!(e.script(), &blank);
        assert!(e.last_error().is_some());
        assert_eq!(e.text(), "甲：一");
    }

    #[test]
    fn test_resync_guard_is_single_shot() {
        let mut e = editor();
        e.edit("甲：typed  text", Instant::now());
        e.flush();

        // The host stores the rebuilt graph and echoes it back: no resync.
        let rebuilt = e.script().clone();
        assert!(!e.graph_changed(rebuilt.clone()));
        assert_eq!(e.text(), "甲：typed  text");

        // A later structured edit does resync.
        let mut edited = rebuilt;
        edited.set_title("新标题");
        assert!(e.graph_changed(edited));
        assert!(e.text().starts_with("# 新标题"));
    }

    #[test]
    fn test_structured_edit_without_echo_resyncs() {
        let mut e = editor();
        e.edit("甲：一", Instant::now());
        e.flush();

        let mut edited = e.script().clone();
        edited.set_title("新标题");
        assert!(e.graph_changed(edited));
        assert_eq!(e.text(), "# 新标题\n\n甲：一");
        assert_eq!(e.script().title, "新标题");
    }

    #[test]
    fn test_late_echoes_keep_typed_text() {
        let mut e = editor();
        let now = Instant::now();
        e.edit("// my note\n甲：一", now);
        e.flush();
        let first = e.script().clone();
        e.edit("// my note\n甲：一\n\n\n乙：二", now);
        e.flush();
        let second = e.script().clone();

        assert!(!e.graph_changed(first));
        assert!(!e.graph_changed(second.clone()));
        assert_eq!(e.text(), "// my note\n甲：一\n\n\n乙：二");
        assert_eq!(e.script(), &second);

        // Each echo is consumed once.
        assert!(e.graph_changed(second));
        assert!(e.text().starts_with("# 未命名故事"));
    }

    #[test]
    fn test_stale_echo_does_not_roll_back_graph() {
        let mut e = editor();
        let now = Instant::now();
        e.edit("甲：一", now);
        e.flush();
        let first = e.script().clone();
        e.edit("甲：一\n乙：二", now);
        e.flush();

        assert!(!e.graph_changed(first));
        assert_eq!(e.script().nodes.len(), 2);
    }

    #[test]
    fn test_external_text_feeds_pipeline() {
        let mut e = editor();
        let now = Instant::now();
        e.append_external("\n\n甲：续写", now);
        assert!(e.is_pending());
        e.flush();
        assert_eq!(e.script().nodes.len(), 2);

        e.replace_external("# 重写\n乙：全新", now);
        e.flush();
        assert_eq!(e.script().title, "重写");
        assert_eq!(e.script().nodes.len(), 1);
    }

    #[test]
    fn test_highlight_is_immediate() {
        let mut e = editor();
        e.edit("# a\n> b", Instant::now());
        let kinds: Vec<_> = e.highlight().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![crate::engine::TokenKind::Scene, crate::engine::TokenKind::ChoiceOption]
        );
    }
}
