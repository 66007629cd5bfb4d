//! Chat model value object

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Chat personas served by the language-model endpoint (Value Object)
///
/// The identifier is sent verbatim as the `model` field of each chat
/// request and persisted as the active selection between runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelId {
    Elora,
    AgentGreen,
    Aureial,
    Socrates,
    Wizzy,
    Crysta,
    /// Any other model tag the endpoint knows about
    Custom(String),
}

impl ModelId {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            ModelId::Elora => "Elora",
            ModelId::AgentGreen => "agentGreen",
            ModelId::Aureial => "Aureial",
            ModelId::Socrates => "Socrates",
            ModelId::Wizzy => "wizzy",
            ModelId::Crysta => "Crysta",
            ModelId::Custom(s) => s,
        }
    }

    /// All built-in models, in menu order
    pub fn known_models() -> Vec<ModelId> {
        vec![
            ModelId::Elora,
            ModelId::AgentGreen,
            ModelId::Aureial,
            ModelId::Socrates,
            ModelId::Wizzy,
            ModelId::Crysta,
        ]
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ModelId::Custom(_))
    }
}

impl Default for ModelId {
    /// Returns the default model (Socrates)
    fn default() -> Self {
        ModelId::Socrates
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "Elora" => ModelId::Elora,
            "agentGreen" => ModelId::AgentGreen,
            "Aureial" => ModelId::Aureial,
            "Socrates" => ModelId::Socrates,
            "wizzy" => ModelId::Wizzy,
            "Crysta" => ModelId::Crysta,
            other => ModelId::Custom(other.to_string()),
        })
    }
}

impl Serialize for ModelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(model) = s.parse::<ModelId>();
        Ok(model)
    }
}
