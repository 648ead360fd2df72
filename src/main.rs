use std::fs;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use vnscript::store::{FileStore, Projects};
use vnscript::{parse_document, play, to_text, validate, Script};

const USAGE: &str = "\
Usage: vnscript <command> [args]

Commands:
  parse <script.txt> [previous.json]   build a graph and print it as JSON
  text <script.json>                   print the canonical script text
  check <file>                         list dangling edges
  play <file>                          read a script in the terminal
  demo                                 print the built-in demo script
  projects [list|import <file>|duplicate <id>|delete <id>]
  generate <model.gguf> <script.txt> <prompt...>   (feature `llm`)

Files ending in .json are read as script JSON, anything else as script text.
Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output";

/// Read a script from JSON or from script text.
fn load_script(path: &str) -> Result<Script> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    if path.ends_with(".json") {
        Ok(Script::from_json(&raw).with_context(|| format!("failed to import {path}"))?)
    } else {
        Ok(parse_document(&raw, None).with_context(|| format!("failed to parse {path}"))?)
    }
}

fn report_diagnostics(script: &Script) -> usize {
    let diagnostics = validate(script);
    for d in &diagnostics {
        warn!("{d}");
    }
    diagnostics.len()
}

fn cmd_parse(args: &[String]) -> Result<()> {
    let path = args.first().context(USAGE)?;
    let previous = args.get(1).map(|p| load_script(p)).transpose()?;
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;

    let script = parse_document(&raw, previous.as_ref()).context("failed to build script")?;
    report_diagnostics(&script);
    println!("{}", script.to_json_pretty()?);
    Ok(())
}

fn cmd_check(args: &[String]) -> Result<()> {
    let script = load_script(args.first().context(USAGE)?)?;
    let count = report_diagnostics(&script);
    println!(
        "{}: {} nodes, {} characters, {} scenes, {} problems",
        script.title,
        script.nodes.len(),
        script.characters.len(),
        script.scenes.len(),
        count
    );
    Ok(())
}

fn cmd_projects(args: &[String]) -> Result<()> {
    let store = FileStore::open_default()?;
    info!("Project store: {}", store.root().display());
    let mut projects = Projects::open(store)?;

    match (args.first().map(String::as_str), args.get(1)) {
        (None | Some("list"), _) => {}
        (Some("import"), Some(path)) => {
            let saved = projects.import(load_script(path)?)?;
            println!("Imported '{}' as {}", saved.title, saved.id);
        }
        (Some("duplicate"), Some(id)) => {
            let copy = projects.duplicate(id)?;
            println!("Copied to '{}' ({})", copy.title, copy.id);
        }
        (Some("delete"), Some(id)) => {
            if projects.list().len() <= 1 {
                bail!("at least one project must be kept");
            }
            projects.delete(id)?;
            println!("Deleted {id}");
        }
        _ => bail!("{USAGE}"),
    }

    for p in projects.list() {
        println!("{:<40} {} ({} nodes)", p.id, p.title, p.nodes.len());
    }
    Ok(())
}

#[cfg(feature = "llm")]
fn cmd_generate(args: &[String]) -> Result<()> {
    use vnscript::editor::{self, EditorCommand, EditorConfig, EditorEvent};
    use vnscript::llm::{LocalWriter, ModelConfig};

    let (model_path, script_path) = match (args.first(), args.get(1)) {
        (Some(m), Some(s)) => (m, s),
        _ => bail!("{USAGE}"),
    };
    let prompt = args[2..].join(" ");
    let raw = fs::read_to_string(script_path)
        .with_context(|| format!("failed to read {script_path}"))?;
    let script = parse_document(&raw, None).context("failed to build script")?;

    let mut writer = LocalWriter::load(model_path, ModelConfig::default())
        .context("failed to load model")?;
    let command = writer.generate(&script, &prompt)?;

    let session = editor::spawn(script, EditorConfig::default());
    session.commands.send(EditorCommand::Edit(raw))?;
    session.commands.send(command)?;
    session.commands.send(EditorCommand::Flush)?;

    loop {
        match session.events.recv()? {
            EditorEvent::Tokens(tokens) => {
                info!("Buffer now has {} lines", tokens.len());
            }
            EditorEvent::Rebuilt { script, diagnostics } => {
                for d in &diagnostics {
                    warn!("{d}");
                }
                let text = to_text(&script);
                fs::write(script_path, &text)
                    .with_context(|| format!("failed to write {script_path}"))?;
                println!("{text}");
                break;
            }
            EditorEvent::BuildFailed(e) => bail!("rebuild failed: {e}"),
            EditorEvent::TextResynced(_) => {}
        }
    }

    session.commands.send(EditorCommand::Shutdown)?;
    session
        .join
        .join()
        .map_err(|_| anyhow::anyhow!("editor thread panicked"))?;
    Ok(())
}

#[cfg(not(feature = "llm"))]
fn cmd_generate(_args: &[String]) -> Result<()> {
    bail!("this build has no local model support; rebuild with --features llm")
}

fn main() -> Result<()> {
    // Control verbosity with RUST_LOG:
    //   RUST_LOG=info   vnscript check story.txt   # lifecycle
    //   RUST_LOG=debug  vnscript check story.txt   # + build summaries
    //   RUST_LOG=trace  vnscript check story.txt   # + tokenizer detail
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().context(USAGE)?;
    let rest = &args[1..];

    match command.as_str() {
        "parse" => cmd_parse(rest),
        "text" => {
            let script = load_script(rest.first().context(USAGE)?)?;
            println!("{}", to_text(&script));
            Ok(())
        }
        "check" => cmd_check(rest),
        "play" => play::run(&load_script(rest.first().context(USAGE)?)?),
        "demo" => {
            println!("{}", to_text(&Script::demo()));
            Ok(())
        }
        "projects" => cmd_projects(rest),
        "generate" => cmd_generate(rest),
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
}
