//! Console formatting for transcript messages, listings and turn results

use crate::chat::command::COMMANDS;
use colored::Colorize;
use cud_application::TurnOutcome;
use cud_domain::{
    AdapterId, AdapterOptions, MessageKind, ModelId, ResourceHandle, Speaker, TranscriptMessage,
};

/// Formats session data for terminal display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    pub fn welcome(model: &ModelId, restored: usize) -> String {
        let mut output = String::new();
        output.push('\n');
        output.push_str(&Self::header("cud-chat"));
        output.push_str(&format!("\n{} {}\n", "Model:".cyan().bold(), model));
        if restored > 0 {
            output.push_str(&format!(
                "{}\n",
                format!("Restored {} messages from the last session", restored).dimmed()
            ));
        }
        output.push_str(&format!(
            "{}\n",
            "Type a message, or /help for commands.".dimmed()
        ));
        output
    }

    pub fn help() -> String {
        let mut output = format!("\n{}\n", "Commands:".cyan().bold());
        for (name, description) in COMMANDS {
            output.push_str(&format!("  {:<10} - {}\n", name, description));
        }
        output
    }

    /// One transcript message as it appears when the conversation is reprinted
    pub fn message(message: &TranscriptMessage) -> String {
        let speaker = match message.role {
            Speaker::User => "you".green().bold(),
            Speaker::Assistant => "assistant".yellow().bold(),
        };
        let body = match (message.kind, &message.handle) {
            (MessageKind::Image, Some(handle)) => format!("[image] {}", handle),
            (MessageKind::Image, None) => "[image from an earlier session]".dimmed().to_string(),
            (MessageKind::Text, _) => message.content.clone(),
        };
        let status = match (message.is_generating, message.progress) {
            (true, Some(percent)) => format!(" {}", format!("({}%)", percent).dimmed()),
            (true, None) => format!(" {}", "(generating)".dimmed()),
            _ => String::new(),
        };
        format!("{}> {}{}", speaker, body, status)
    }

    pub fn transcript(messages: &[TranscriptMessage]) -> String {
        if messages.is_empty() {
            return "The conversation is empty.".dimmed().to_string();
        }
        messages
            .iter()
            .map(Self::message)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Summary printed after a turn; streamed text is not repeated
    pub fn outcome(outcome: &TurnOutcome) -> String {
        match outcome {
            TurnOutcome::Replied { .. } => String::new(),
            TurnOutcome::Generated { images, .. } => images
                .iter()
                .map(|handle| format!("{} {}", "image:".green().bold(), handle))
                .collect::<Vec<_>>()
                .join("\n"),
            TurnOutcome::GenerationFailed { error, .. } => {
                format!("{} {}", "x".red(), error)
            }
        }
    }

    pub fn models(current: &ModelId, known: &[ModelId]) -> String {
        let mut output = format!("\n{}\n", "Models:".cyan().bold());
        for model in known {
            if model == current {
                output.push_str(&format!("  {} {}\n", "*".green(), model.to_string().bold()));
            } else {
                output.push_str(&format!("    {}\n", model));
            }
        }
        if current.is_custom() {
            output.push_str(&format!("  {} {} (custom)\n", "*".green(), current));
        }
        output
    }

    /// Backend adapters, marking the selected ones
    pub fn adapters(available: &[AdapterId], selected: &[AdapterId]) -> String {
        if available.is_empty() {
            return "No adapters available on the image backend.".dimmed().to_string();
        }
        let mut output = format!("\n{}\n", "Adapters:".cyan().bold());
        for id in available {
            let mark = if selected.contains(id) { "[x]".green() } else { "[ ]".normal() };
            output.push_str(&format!("  {} {}\n", mark, id));
        }
        output
    }

    pub fn selection(selected: &[(AdapterId, AdapterOptions)]) -> String {
        if selected.is_empty() {
            return "No adapters selected.".dimmed().to_string();
        }
        let mut output = format!("\n{}\n", "Selected adapters:".cyan().bold());
        for (id, options) in selected {
            output.push_str(&format!("  {} {}\n", id.to_string().bold(), Self::options(options)));
        }
        output
    }

    pub fn options(options: &AdapterOptions) -> String {
        let fields = [
            ("strength", options.strength),
            ("clip_strength", options.clip_strength),
            ("weight", options.weight),
        ];
        let set: Vec<String> = fields
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
            .collect();
        if set.is_empty() {
            "(defaults)".dimmed().to_string()
        } else {
            set.join(" ")
        }
    }

    pub fn gallery(handles: &[ResourceHandle]) -> String {
        if handles.is_empty() {
            return "No images yet.".dimmed().to_string();
        }
        let mut output = format!("\n{}\n", "Images:".cyan().bold());
        for (index, handle) in handles.iter().enumerate() {
            output.push_str(&format!("  {:>3}. {}\n", index + 1, handle));
        }
        output
    }

    pub fn error(message: &str) -> String {
        format!("{} {}", "Error:".red().bold(), message)
    }

    pub fn notice(message: &str) -> String {
        format!("{} {}", "->".cyan(), message)
    }

    fn header(title: &str) -> String {
        let line = "─".repeat(45);
        format!("{}\n{:^45}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
