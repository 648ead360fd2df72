use std::io::{self, BufRead, Write};

use anyhow::Result;
use log::{debug, info};

use crate::script::{NodeKind, Script, ScriptNode};

// ---------------------------------------------------------------------------
// Play-through cursor
// ---------------------------------------------------------------------------

/// Position of a reader walking through a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayState {
    pub current_node_id: Option<String>,
    /// Every node visited so far, in order.
    pub history: Vec<String>,
    pub is_ended: bool,
}

impl PlayState {
    /// Place the cursor on the script's start node.
    pub fn start(script: &Script) -> Self {
        let mut state = Self::default();
        state.advance(script, &script.start_node_id);
        state
    }

    /// Move to `next_id`. A missing node or an end node finishes the story.
    pub fn advance(&mut self, script: &Script, next_id: &str) {
        let node = script.node(next_id);
        self.current_node_id = Some(next_id.to_string());
        self.history.push(next_id.to_string());
        self.is_ended = node.map_or(true, ScriptNode::is_end);
        debug!("Advanced to {next_id} (ended={})", self.is_ended);
    }

    pub fn current_node<'s>(&self, script: &'s Script) -> Option<&'s ScriptNode> {
        self.current_node_id.as_deref().and_then(|id| script.node(id))
    }

    /// Follow a dialogue node's forward edge. A dialogue line with nowhere
    /// to go ends the story.
    pub fn continue_dialogue(&mut self, script: &Script) {
        let next = match self.current_node(script) {
            Some(node) if node.is_dialogue() => node.continuation().map(str::to_string),
            _ => return,
        };
        match next {
            Some(id) => self.advance(script, &id),
            None => self.is_ended = true,
        }
    }

    /// Take option `index` of the current choice node. Returns `false` when
    /// there is no such option.
    pub fn choose(&mut self, script: &Script, index: usize) -> bool {
        let target = match self.current_node(script) {
            Some(node) => node.choices().get(index).map(|c| c.next.clone()),
            None => None,
        };
        match target {
            Some(id) => {
                self.advance(script, &id);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

fn render_node(script: &Script, node: &ScriptNode, last_scene: &mut Option<String>) {
    if node.scene_id != *last_scene {
        if let Some(scene) = node.scene_id.as_deref().and_then(|id| script.scene(id)) {
            println!("\n--- {} ---", scene.name);
        }
        *last_scene = node.scene_id.clone();
    }

    match script.speaker_name(node) {
        Some(name) => println!("\n[{name}]: {}", node.text),
        None => println!("\n{}", node.text),
    }

    if let NodeKind::Choice { choices } = &node.kind {
        for (i, choice) in choices.iter().enumerate() {
            println!("  [{}] {}", i + 1, choice.label);
        }
    }
}

fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Outcome of a single play-through.
#[derive(Debug, PartialEq, Eq)]
enum PlayOutcome {
    Finished { steps: usize, ending: Option<String> },
    Quit,
}

fn show_story_end(outcome: &PlayOutcome) {
    println!("\n========================================");
    println!("             THE END");
    println!("========================================");
    match outcome {
        PlayOutcome::Finished { steps, ending } => {
            if let Some(text) = ending {
                println!("  {text}");
            }
            println!("  Nodes visited: {steps}");
        }
        PlayOutcome::Quit => println!("  You closed the book early."),
    }
    println!("========================================\n");
    println!("  [r] Restart    [q] Quit\n");
}

fn play_round(script: &Script, input: &mut impl BufRead) -> Result<PlayOutcome> {
    let mut state = PlayState::start(script);
    let mut last_scene = None;
    info!("Play-through started at {:?}", state.current_node_id);

    loop {
        let Some(node) = state.current_node(script) else {
            // Dangling edge: treated as the end of the story.
            return Ok(PlayOutcome::Finished {
                steps: state.history.len(),
                ending: None,
            });
        };
        render_node(script, node, &mut last_scene);

        if state.is_ended {
            return Ok(PlayOutcome::Finished {
                steps: state.history.len(),
                ending: Some(node.text.clone()),
            });
        }
        if node.is_choice() && node.choices().is_empty() {
            // No way forward from an option-less choice.
            return Ok(PlayOutcome::Finished {
                steps: state.history.len(),
                ending: None,
            });
        }

        let Some(answer) = read_line(input)? else {
            return Ok(PlayOutcome::Quit);
        };
        if answer.eq_ignore_ascii_case("quit") || answer.eq_ignore_ascii_case("exit") {
            return Ok(PlayOutcome::Quit);
        }

        if node.is_choice() {
            let picked = answer.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            if !picked.is_some_and(|i| state.choose(script, i)) {
                println!("  Pick a number between 1 and {}.", node.choices().len());
            }
        } else {
            state.continue_dialogue(script);
            if state.is_ended && state.current_node(script).is_some_and(|n| n.is_dialogue()) {
                return Ok(PlayOutcome::Finished {
                    steps: state.history.len(),
                    ending: None,
                });
            }
        }
    }
}

/// Walk `script` on the terminal until the reader quits.
pub fn run(script: &Script) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        println!("\n========================================");
        println!("   {}", script.title);
        println!("========================================");
        println!("Press Enter to continue, type a number to choose, 'quit' to stop.");

        let outcome = play_round(script, &mut input)?;
        show_story_end(&outcome);

        loop {
            match read_line(&mut input)?.as_deref() {
                Some("r") => break,
                Some("q") | None => {
                    println!("Thanks for reading!");
                    return Ok(());
                }
                _ => println!("  Press [r] to restart or [q] to quit."),
            }
        }
        info!("Reader chose to restart");
    }
}
