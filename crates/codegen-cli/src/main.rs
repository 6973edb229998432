use anyhow::Result;
use clap::Parser;
use codegen_core::AppConfig;
use codegen_llm::HttpGenClient;
use codegen_observe::Observer;
use codegen_render::{RenderSession, SystemClipboard};
use std::io::Write;
use std::sync::Arc;

mod controller;
mod slash;
mod surface;

use controller::{Controller, SubmitOutcome};
use slash::{HELP_TEXT, SlashCommand};
use surface::TerminalSurface;

#[derive(Parser)]
#[command(name = "codegen")]
#[command(about = "Generate code with a hosted AI model, rendered as copyable file cards", long_about = None)]
struct Cli {
    /// Prompt to submit. Omit to start the interactive loop.
    prompt: Option<String>,

    /// Override the configured model for this invocation.
    #[arg(long)]
    model: Option<String>,

    /// Wait for the complete response instead of streaming.
    #[arg(long = "no-stream")]
    no_stream: bool,

    /// Copy code card N to the clipboard after rendering.
    #[arg(long, value_name = "N")]
    copy: Option<usize>,

    /// Disable ANSI colors and syntax highlighting.
    #[arg(long = "no-color")]
    no_color: bool,

    /// Mirror lifecycle events to stderr.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = std::env::current_dir()?;
    let mut cfg = AppConfig::load(&workspace)?;
    if let Some(model) = &cli.model {
        cfg.llm.model = model.clone();
    }
    if cli.no_stream {
        cfg.llm.stream = false;
    }
    if cli.no_color {
        cfg.ui.color = false;
    }

    let client = Arc::new(HttpGenClient::new(cfg.llm.clone())?);
    let mut observer = Observer::new(&workspace)?;
    observer.set_verbose(cli.verbose);
    let session = RenderSession::new(cfg.ui.color, cfg.ui.code_label_fallback.clone());
    let mut controller = Controller::new(client, cfg.llm, session, observer);
    let mut surface = TerminalSurface::new();

    match &cli.prompt {
        Some(prompt) => run_once(&mut controller, &mut surface, prompt, cli.copy),
        None => run_interactive(&mut controller, &mut surface),
    }
}

fn run_once(
    controller: &mut Controller,
    surface: &mut TerminalSurface,
    prompt: &str,
    copy: Option<usize>,
) -> Result<()> {
    let outcome = controller.submit(prompt, surface);
    surface.finish();

    if let Some(index) = copy {
        if outcome == SubmitOutcome::Rendered {
            let mut clipboard = SystemClipboard::new()?;
            controller.copy_card(index, &mut clipboard)?;
            eprintln!("Copied code card {index} to clipboard.");
        }
    }

    if matches!(outcome, SubmitOutcome::Failed(_) | SubmitOutcome::NoResponse) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_interactive(controller: &mut Controller, surface: &mut TerminalSurface) -> Result<()> {
    println!("codegen: type a prompt, /help for commands, /quit to exit");
    let stdin = std::io::stdin();
    let mut clipboard: Option<SystemClipboard> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let Some(cmd) = SlashCommand::parse(&line) else {
            controller.submit(&line, surface);
            continue;
        };
        match cmd {
            SlashCommand::Quit => break,
            SlashCommand::Help => println!("{HELP_TEXT}"),
            SlashCommand::Cards => {
                let cards = controller.session().cards();
                if cards.is_empty() {
                    println!("No code cards in the current document.");
                }
                for card in cards {
                    println!("  {}. {} ({} bytes)", card.index, card.label, card.code.len());
                }
            }
            SlashCommand::Model(Some(model)) => {
                controller.config_mut().model = model.clone();
                println!("Model switched to {model}.");
            }
            SlashCommand::Model(None) => {
                println!("Current model: {}", controller.config().model);
            }
            SlashCommand::Copy(Some(index)) => {
                if clipboard.is_none() {
                    clipboard = Some(SystemClipboard::new()?);
                }
                if let Some(clip) = clipboard.as_mut() {
                    match controller.copy_card(index, clip) {
                        Ok(()) => println!("Copied code card {index} to clipboard."),
                        Err(err) => println!("{err}"),
                    }
                }
            }
            SlashCommand::Copy(None) => println!("usage: /copy N"),
            SlashCommand::Unknown { name } => {
                println!("Unknown command: /{name} (try /help)");
            }
        }
    }
    Ok(())
}
