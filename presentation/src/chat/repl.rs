//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::chat::command::{COMMANDS, ReplCommand, apply_assignments};
use crate::config::ReplConfig;
use crate::output::console::ConsoleFormatter;
use crate::progress::reporter::{GenerationProgressBar, SimpleProgress, TurnProgressReporter};
use colored::Colorize;
use cud_application::{
    ConversationOrchestrator, GenerateImageInput, TurnError, TurnOutcome, TurnProgressNotifier,
};
use cud_domain::{ModelId, Speaker, TranscriptMessage};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::sync::Arc;
use tracing::debug;

/// Completes and hints slash commands
struct CommandHelper;

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|(name, _)| name.starts_with(line))
            .map(|(name, _)| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|(name, _)| name.starts_with(line) && name.len() > line.len())
            .map(|(name, _)| name[line.len()..].to_string())
    }
}

impl Highlighter for CommandHelper {}

impl Validator for CommandHelper {}

/// Interactive chat REPL
pub struct ChatRepl {
    orchestrator: Arc<ConversationOrchestrator>,
    config: ReplConfig,
    restored: usize,
}

impl ChatRepl {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>) -> Self {
        Self {
            orchestrator,
            config: ReplConfig::default(),
            restored: 0,
        }
    }

    pub fn with_config(mut self, config: ReplConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of messages restored from the previous session, for the banner
    pub fn with_restored(mut self, restored: usize) -> Self {
        self.restored = restored;
        self
    }

    /// Run the interactive REPL
    pub async fn run(&self) -> rustyline::Result<()> {
        let mut rl: Editor<CommandHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(CommandHelper));

        let history_path = self.config.history_path();
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        println!(
            "{}",
            ConsoleFormatter::welcome(&self.orchestrator.current_model(), self.restored)
        );
        if self.restored > 0 {
            let recent = ConsoleFormatter::transcript(&self.recent_transcript(6));
            println!("{}\n", ConsoleFormatter::indent(&recent, "  "));
        }

        loop {
            match rl.readline("you> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    if line.starts_with('/') {
                        if self.handle_command(line).await {
                            break;
                        }
                        continue;
                    }
                    self.process_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("{}", ConsoleFormatter::error(&format!("{:?}", err)));
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }
        Ok(())
    }

    fn recent_transcript(&self, count: usize) -> Vec<TranscriptMessage> {
        let transcript = self.orchestrator.transcript();
        let start = transcript.len().saturating_sub(count);
        transcript[start..].to_vec()
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&self, line: &str) -> bool {
        match ReplCommand::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(message) => {
                println!("{}", ConsoleFormatter::error(&message));
                println!("Type /help for available commands");
                false
            }
        }
    }

    async fn execute(&self, command: ReplCommand) -> bool {
        let adapters = self.orchestrator.images().adapters();
        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => println!("{}", ConsoleFormatter::help()),
            ReplCommand::Model(None) => {
                println!("Current model: {}", self.orchestrator.current_model().to_string().bold());
            }
            ReplCommand::Model(Some(name)) => {
                let Ok(model) = name.parse::<ModelId>();
                if model.is_custom() {
                    println!(
                        "{}",
                        format!("'{}' is not a known model; sending it as-is", model).dimmed()
                    );
                }
                self.orchestrator.set_model(model.clone());
                println!("{}", ConsoleFormatter::notice(&format!("Now chatting with {}", model)));
            }
            ReplCommand::Models => println!(
                "{}",
                ConsoleFormatter::models(&self.orchestrator.current_model(), &ModelId::known_models())
            ),
            ReplCommand::Loras => {
                match self.orchestrator.images().generator().list_adapters().await {
                    Ok(available) => println!(
                        "{}",
                        ConsoleFormatter::adapters(&available, &adapters.selection())
                    ),
                    Err(e) => println!("{}", ConsoleFormatter::error(&e.to_string())),
                }
            }
            ReplCommand::LoraAdd(id) => {
                let message = if adapters.add(id.clone()) {
                    format!("Selected {}", id)
                } else {
                    format!("{} is already selected", id)
                };
                println!("{}", ConsoleFormatter::notice(&message));
            }
            ReplCommand::LoraRemove(id) => {
                let message = if adapters.remove(&id) {
                    format!("Removed {}", id)
                } else {
                    format!("{} was not selected", id)
                };
                println!("{}", ConsoleFormatter::notice(&message));
            }
            ReplCommand::LoraToggle(id) => {
                let state = if adapters.toggle(id.clone()) { "on" } else { "off" };
                println!("{}", ConsoleFormatter::notice(&format!("{} {}", id, state)));
            }
            ReplCommand::LoraSet { id, assignments } => {
                if !adapters.is_selected(&id) {
                    println!(
                        "{}",
                        ConsoleFormatter::error(&format!("{} is not selected; /lora add it first", id))
                    );
                    return false;
                }
                match apply_assignments(adapters.options_for(&id), &assignments) {
                    Ok(options) => {
                        adapters.set_options(&id, options);
                        println!(
                            "{}",
                            ConsoleFormatter::notice(&format!(
                                "{}: {}",
                                id,
                                ConsoleFormatter::options(&options)
                            ))
                        );
                    }
                    Err(e) => println!("{}", ConsoleFormatter::error(&e.to_string())),
                }
            }
            ReplCommand::Selected => {
                let selected: Vec<_> = adapters
                    .snapshot()
                    .iter()
                    .map(|entry| (entry.id.clone(), entry.options))
                    .collect();
                println!("{}", ConsoleFormatter::selection(&selected));
            }
            ReplCommand::Imagine { prompt, resolution } => {
                self.imagine(prompt, resolution.unwrap_or_default()).await;
            }
            ReplCommand::Gallery => println!(
                "{}",
                ConsoleFormatter::gallery(&self.orchestrator.images().resources().handles())
            ),
            ReplCommand::History => {
                println!("{}", ConsoleFormatter::transcript(&self.orchestrator.transcript()));
            }
            ReplCommand::Clear => match self.orchestrator.clear().await {
                Ok(()) => println!("{}", ConsoleFormatter::notice("Conversation cleared")),
                Err(e) => println!("{}", ConsoleFormatter::error(&e.to_string())),
            },
        }
        false
    }

    async fn imagine(&self, prompt: String, resolution: cud_domain::Resolution) {
        let input = GenerateImageInput::new(prompt, resolution);
        let bar = GenerationProgressBar::new(format!("{} image", resolution), self.config.show_progress);

        let result = tokio::select! {
            result = self.orchestrator.images().execute(input, &bar) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        bar.finish();

        match result {
            Some(Ok(generated)) => {
                for handle in &generated.handles {
                    println!("{} {}", "image:".green().bold(), handle);
                }
            }
            Some(Err(e)) => println!("{}", ConsoleFormatter::error(&format!("Image generation failed: {}", e))),
            None => println!("\n{}", ConsoleFormatter::notice("Generation cancelled")),
        }
    }

    async fn process_message(&self, line: &str) {
        let streaming = self.config.show_progress;
        let notifier: Box<dyn TurnProgressNotifier> = if streaming {
            Box::new(TurnProgressReporter::new())
        } else {
            Box::new(SimpleProgress)
        };

        let result = tokio::select! {
            result = self.orchestrator.submit(line, notifier.as_ref()) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match result {
            Some(Ok(outcome)) => {
                if !streaming {
                    self.print_reply(&outcome);
                }
            }
            Some(Err(TurnError::Transport(_))) if streaming => {
                // Already reported by the progress display
            }
            Some(Err(e)) => println!("{}", ConsoleFormatter::error(&e.to_string())),
            None => {
                notifier.on_phase(cud_domain::TurnPhase::Idle);
                println!("\n{}", ConsoleFormatter::notice("Turn cancelled"));
            }
        }

        if let Some(error) = self.orchestrator.error() {
            debug!("Dismissing displayed error: {}", error);
            self.orchestrator.dismiss_error();
        }
        println!();
    }

    fn print_reply(&self, outcome: &TurnOutcome) {
        // The progress message carries the in-generation status or failure notice
        let reply = self
            .orchestrator
            .transcript()
            .into_iter()
            .rev()
            .find(|m| m.role == Speaker::Assistant && !m.is_image());
        let text = reply.map(|m| m.content).unwrap_or_else(|| outcome.text().to_string());
        println!("{}", ConsoleFormatter::message(&TranscriptMessage::assistant_text(text)));

        let summary = ConsoleFormatter::outcome(outcome);
        if !summary.is_empty() {
            println!("{}", summary);
        }
    }
}
