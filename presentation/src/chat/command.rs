//! Slash-command parsing for the chat REPL

use cud_domain::{AdapterId, AdapterOptions, DomainError, Resolution};

/// Every slash command the REPL understands, for completion and help
pub const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/model", "Show or switch the chat model: /model [name]"),
    ("/models", "List known models"),
    ("/loras", "List adapters available on the image backend"),
    ("/lora", "add|remove|toggle <id>, or set <id> strength=0.8 clip_strength=1 weight=0.5"),
    ("/selected", "Show selected adapters and their options"),
    ("/imagine", "Generate an image directly: /imagine [@preset] <prompt>"),
    ("/gallery", "List images generated this session"),
    ("/history", "Reprint the conversation"),
    ("/clear", "Clear the conversation and its images"),
    ("/quit", "Exit chat"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Quit,
    Model(Option<String>),
    Models,
    Loras,
    LoraAdd(AdapterId),
    LoraRemove(AdapterId),
    LoraToggle(AdapterId),
    LoraSet {
        id: AdapterId,
        assignments: Vec<String>,
    },
    Selected,
    Imagine {
        prompt: String,
        resolution: Option<Resolution>,
    },
    Gallery,
    History,
    Clear,
}

impl ReplCommand {
    /// Parse a line starting with `/`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "/quit" | "/exit" | "/q" => Ok(Self::Quit),
            "/help" | "/h" | "/?" => Ok(Self::Help),
            "/model" => Ok(Self::Model((!rest.is_empty()).then(|| rest.to_string()))),
            "/models" => Ok(Self::Models),
            "/loras" => Ok(Self::Loras),
            "/lora" => parse_lora(rest),
            "/selected" => Ok(Self::Selected),
            "/imagine" => parse_imagine(rest),
            "/gallery" => Ok(Self::Gallery),
            "/history" => Ok(Self::History),
            "/clear" => Ok(Self::Clear),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

fn parse_lora(rest: &str) -> Result<ReplCommand, String> {
    let mut words = rest.split_whitespace();
    let action = words.next();
    let id = words.next().map(AdapterId::new);

    match (action, id) {
        (Some("add"), Some(id)) => Ok(ReplCommand::LoraAdd(id)),
        (Some("remove"), Some(id)) => Ok(ReplCommand::LoraRemove(id)),
        (Some("toggle"), Some(id)) => Ok(ReplCommand::LoraToggle(id)),
        (Some("set"), Some(id)) => {
            let assignments: Vec<String> = words.map(str::to_string).collect();
            if assignments.is_empty() {
                return Err("Usage: /lora set <id> key=value ...".to_string());
            }
            Ok(ReplCommand::LoraSet { id, assignments })
        }
        _ => Err("Usage: /lora add|remove|toggle <id> or /lora set <id> key=value ...".to_string()),
    }
}

fn parse_imagine(rest: &str) -> Result<ReplCommand, String> {
    let (resolution, prompt) = match rest.strip_prefix('@') {
        Some(tagged) => {
            let (preset, prompt) = tagged.split_once(char::is_whitespace).unwrap_or((tagged, ""));
            let resolution = preset.parse::<Resolution>().map_err(|e| e.to_string())?;
            (Some(resolution), prompt.trim())
        }
        None => (None, rest),
    };

    if prompt.is_empty() {
        return Err("Usage: /imagine [@preset] <prompt>".to_string());
    }
    Ok(ReplCommand::Imagine {
        prompt: prompt.to_string(),
        resolution,
    })
}

/// Fold `key=value` assignments into `base`, stopping at the first bad one.
pub fn apply_assignments(
    base: AdapterOptions,
    assignments: &[String],
) -> Result<AdapterOptions, DomainError> {
    assignments
        .iter()
        .try_fold(base, |options, assignment| options.with_assignment(assignment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(ReplCommand::parse("/quit"), Ok(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/q"), Ok(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("  /help "), Ok(ReplCommand::Help));
        assert_eq!(ReplCommand::parse("/gallery"), Ok(ReplCommand::Gallery));
        assert!(ReplCommand::parse("/dance").is_err());
    }

    #[test]
    fn test_model_with_and_without_name() {
        assert_eq!(ReplCommand::parse("/model"), Ok(ReplCommand::Model(None)));
        assert_eq!(
            ReplCommand::parse("/model  Elora"),
            Ok(ReplCommand::Model(Some("Elora".to_string())))
        );
    }

    #[test]
    fn test_lora_subcommands() {
        assert_eq!(
            ReplCommand::parse("/lora add grain.safetensors"),
            Ok(ReplCommand::LoraAdd(AdapterId::new("grain.safetensors")))
        );
        assert_eq!(
            ReplCommand::parse("/lora toggle a"),
            Ok(ReplCommand::LoraToggle(AdapterId::new("a")))
        );
        assert_eq!(
            ReplCommand::parse("/lora set a strength=0.8 weight=0.5"),
            Ok(ReplCommand::LoraSet {
                id: AdapterId::new("a"),
                assignments: vec!["strength=0.8".to_string(), "weight=0.5".to_string()],
            })
        );
        assert!(ReplCommand::parse("/lora set a").is_err());
        assert!(ReplCommand::parse("/lora add").is_err());
        assert!(ReplCommand::parse("/lora").is_err());
    }

    #[test]
    fn test_imagine_with_preset() {
        assert_eq!(
            ReplCommand::parse("/imagine @square a red fox"),
            Ok(ReplCommand::Imagine {
                prompt: "a red fox".to_string(),
                resolution: Some(Resolution::Square),
            })
        );
        assert_eq!(
            ReplCommand::parse("/imagine portrait of a knight"),
            Ok(ReplCommand::Imagine {
                prompt: "portrait of a knight".to_string(),
                resolution: None,
            })
        );
        assert!(ReplCommand::parse("/imagine @huge a fox").is_err());
        assert!(ReplCommand::parse("/imagine @square").is_err());
        assert!(ReplCommand::parse("/imagine").is_err());
    }

    #[test]
    fn test_apply_assignments() {
        let options = apply_assignments(
            AdapterOptions::default(),
            &["strength=0.8".to_string(), "clip_strength=1".to_string()],
        )
        .unwrap();
        assert_eq!(options.strength, Some(0.8));
        assert_eq!(options.clip_strength, Some(1.0));
        assert_eq!(options.weight, None);

        assert!(apply_assignments(options, &["bogus=1".to_string()]).is_err());
    }
}
