use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, info};

use crate::editor::protocol::{EditorCommand, EditorEvent};
use crate::editor::{Editor, EditorConfig, Rebuild};
use crate::script::Script;

/// Owns an [`Editor`] and drives it from a command channel.
///
/// This is the only writer of the graph. Debounce waits happen in
/// `recv_timeout`, so a new command simply restarts the wait.
pub struct EditorService {
    rx: Receiver<EditorCommand>,
    tx: Sender<EditorEvent>,
    editor: Editor,
}

/// Host side of a spawned session.
pub struct EditorHandle {
    pub commands: Sender<EditorCommand>,
    pub events: Receiver<EditorEvent>,
    pub join: JoinHandle<()>,
}

/// Start a session on its own thread.
pub fn spawn(script: Script, config: EditorConfig) -> EditorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let join = thread::spawn(move || {
        EditorService::new(cmd_rx, evt_tx, Editor::new(script, config)).run();
    });
    EditorHandle {
        commands: cmd_tx,
        events: evt_rx,
        join,
    }
}

impl EditorService {
    pub fn new(rx: Receiver<EditorCommand>, tx: Sender<EditorEvent>, editor: Editor) -> Self {
        Self { rx, tx, editor }
    }

    pub fn run(&mut self) {
        loop {
            let received = match self.editor.deadline() {
                Some(deadline) => self
                    .rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(EditorCommand::Shutdown) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {
                    let outcome = self.editor.poll(Instant::now());
                    self.publish_rebuild(outcome);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Nothing typed is ever lost on shutdown.
        let outcome = self.editor.flush();
        self.publish_rebuild(outcome);
        info!("Editor session closed");
    }

    fn handle(&mut self, cmd: EditorCommand) {
        let now = Instant::now();
        match cmd {
            EditorCommand::Edit(text) => {
                self.editor.edit(text, now);
                self.publish_tokens();
            }
            EditorCommand::AppendText(text) => {
                self.editor.append_external(&text, now);
                self.publish_tokens();
            }
            EditorCommand::ReplaceText(text) => {
                self.editor.replace_external(text, now);
                self.publish_tokens();
            }
            EditorCommand::LoadScript(script) => {
                if self.editor.graph_changed(script) {
                    self.send(EditorEvent::TextResynced(self.editor.text().to_string()));
                    self.publish_tokens();
                }
            }
            EditorCommand::Flush => {
                let outcome = self.editor.flush();
                self.publish_rebuild(outcome);
            }
            EditorCommand::Shutdown => {}
        }
    }

    fn publish_tokens(&self) {
        self.send(EditorEvent::Tokens(self.editor.highlight()));
    }

    fn publish_rebuild(&self, outcome: Option<Rebuild>) {
        match outcome {
            Some(Rebuild::Built { diagnostics }) => self.send(EditorEvent::Rebuilt {
                script: self.editor.script().clone(),
                diagnostics,
            }),
            Some(Rebuild::Failed(message)) => self.send(EditorEvent::BuildFailed(message)),
            None => {}
        }
    }

    fn send(&self, event: EditorEvent) {
        if self.tx.send(event).is_err() {
            debug!("Editor event dropped: host is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn next_rebuild(handle: &EditorHandle) -> (Script, Vec<String>) {
        loop {
            match handle.events.recv_timeout(WAIT).unwrap() {
                EditorEvent::Rebuilt {
                    script,
                    diagnostics,
                } => return (script, diagnostics),
                EditorEvent::BuildFailed(e) => panic!("build failed: {e}"),
                _ => continue,
            }
        }
    }

    fn quick() -> EditorConfig {
        EditorConfig {
            debounce: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_edits_coalesce_into_one_rebuild() {
        let handle = spawn(Script::new_blank(), quick());
        handle.commands.send(EditorCommand::Edit("甲：一".into())).unwrap();
        handle
            .commands
            .send(EditorCommand::Edit("甲：一\n乙：二".into()))
            .unwrap();

        let (script, diagnostics) = next_rebuild(&handle);
        assert_eq!(script.nodes.len(), 2);
        assert!(diagnostics.is_empty());

        handle.commands.send(EditorCommand::Shutdown).unwrap();
        handle.join.join().unwrap();
        let leftovers: Vec<EditorEvent> = handle.events.try_iter().collect();
        assert!(leftovers
            .iter()
            .all(|e| !matches!(e, EditorEvent::Rebuilt { .. })));
    }

    #[test]
    fn test_collaborator_append_then_flush() {
        let handle = spawn(Script::new_blank(), EditorConfig::default());
        handle
            .commands
            .send(EditorCommand::AppendText("\n\n甲：续写".into()))
            .unwrap();
        handle.commands.send(EditorCommand::Flush).unwrap();

        let (script, _) = next_rebuild(&handle);
        assert_eq!(script.nodes.len(), 2);
        assert_eq!(script.nodes[1].text, "续写");

        drop(handle.commands);
        handle.join.join().unwrap();
    }

    #[test]
    fn test_echo_is_ignored_and_structured_edit_resyncs() {
        let handle = spawn(Script::new_blank(), quick());
        handle
            .commands
            .send(EditorCommand::Edit("甲：一".into()))
            .unwrap();
        let (script, _) = next_rebuild(&handle);

        handle
            .commands
            .send(EditorCommand::LoadScript(script.clone()))
            .unwrap();
        let mut edited = script;
        edited.set_title("改名");
        handle
            .commands
            .send(EditorCommand::LoadScript(edited))
            .unwrap();
        handle.commands.send(EditorCommand::Shutdown).unwrap();
        handle.join.join().unwrap();

        let resyncs: Vec<String> = handle
            .events
            .try_iter()
            .filter_map(|e| match e {
                EditorEvent::TextResynced(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(resyncs, vec!["# 改名\n\n甲：一".to_string()]);
    }

    fn resyncs_after_shutdown(handle: EditorHandle) -> Vec<String> {
        handle.commands.send(EditorCommand::Shutdown).unwrap();
        handle.join.join().unwrap();
        handle
            .events
            .try_iter()
            .filter_map(|e| match e {
                EditorEvent::TextResynced(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_structured_edit_without_echo_resyncs() {
        let handle = spawn(Script::new_blank(), quick());
        handle
            .commands
            .send(EditorCommand::Edit("甲：一".into()))
            .unwrap();
        let (mut edited, _) = next_rebuild(&handle);

        edited.set_title("改名");
        handle
            .commands
            .send(EditorCommand::LoadScript(edited))
            .unwrap();
        assert_eq!(
            resyncs_after_shutdown(handle),
            vec!["# 改名\n\n甲：一".to_string()]
        );
    }

    #[test]
    fn test_two_rebuilds_two_echoes_keep_typed_text() {
        let handle = spawn(Script::new_blank(), quick());
        for text in ["// note\n甲：一", "// note\n甲：一\n\n\n乙：二"] {
            handle.commands.send(EditorCommand::Edit(text.into())).unwrap();
            handle.commands.send(EditorCommand::Flush).unwrap();
        }
        let (first, _) = next_rebuild(&handle);
        let (second, _) = next_rebuild(&handle);
        assert_eq!(second.nodes.len(), 2);

        handle
            .commands
            .send(EditorCommand::LoadScript(first))
            .unwrap();
        handle
            .commands
            .send(EditorCommand::LoadScript(second))
            .unwrap();
        assert!(resyncs_after_shutdown(handle).is_empty());
    }
}
