use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The chat models the endpoint serves.
///
/// Each model has a short alias used on the command line and a backend identifier sent in the
/// request body.  `Display` prints the backend identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum KnownModel {
    /// OpenAI GPT-4o mini.
    #[default]
    Gpt4oMini,

    /// Anthropic Claude 3 Haiku (2024-03-07 version).
    Claude3Haiku,

    /// Meta Llama 3.1 70B Instruct Turbo.
    Llama,

    /// Mistral Small 3 (24B, 2501).
    Mistral,
}

impl KnownModel {
    /// Every model, in the order they are listed to users.
    pub const ALL: [KnownModel; 4] = [
        KnownModel::Gpt4oMini,
        KnownModel::Claude3Haiku,
        KnownModel::Llama,
        KnownModel::Mistral,
    ];

    /// The command-line alias.
    pub fn alias(&self) -> &'static str {
        match self {
            KnownModel::Gpt4oMini => "gpt-4o-mini",
            KnownModel::Claude3Haiku => "claude-3-haiku",
            KnownModel::Llama => "llama",
            KnownModel::Mistral => "mistral",
        }
    }

    /// The identifier the backend expects in the `model` field.
    pub fn model_id(&self) -> &'static str {
        match self {
            KnownModel::Gpt4oMini => "gpt-4o-mini",
            KnownModel::Claude3Haiku => "claude-3-haiku-20240307",
            KnownModel::Llama => "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
            KnownModel::Mistral => "mistralai/Mistral-Small-24B-Instruct-2501",
        }
    }

    /// Find the model whose backend identifier is `model_id`.
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.model_id() == model_id)
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.model_id())
    }
}

impl FromStr for KnownModel {
    type Err = Error;

    fn from_str(alias: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.alias() == alias)
            .ok_or_else(|| {
                Error::validation(
                    format!(
                        "Model '{alias}' is not available. List available models with --list-models"
                    ),
                    Some("model".to_string()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!("gpt-4o-mini".parse::<KnownModel>().unwrap(), KnownModel::Gpt4oMini);
        assert_eq!(
            "claude-3-haiku".parse::<KnownModel>().unwrap(),
            KnownModel::Claude3Haiku
        );
        assert_eq!("llama".parse::<KnownModel>().unwrap(), KnownModel::Llama);
        assert_eq!("mistral".parse::<KnownModel>().unwrap(), KnownModel::Mistral);
    }

    #[test]
    fn unknown_alias_is_rejected() {
        let err = "gpt-5".parse::<KnownModel>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("gpt-5"));
        // Backend identifiers are not aliases.
        assert!("claude-3-haiku-20240307".parse::<KnownModel>().is_err());
    }

    #[test]
    fn display_is_backend_id() {
        assert_eq!(KnownModel::Claude3Haiku.to_string(), "claude-3-haiku-20240307");
        assert_eq!(
            KnownModel::Llama.to_string(),
            "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo"
        );
        assert_eq!(KnownModel::default(), KnownModel::Gpt4oMini);
    }

    #[test]
    fn reverse_lookup() {
        for model in KnownModel::ALL {
            assert_eq!(KnownModel::from_model_id(model.model_id()), Some(model));
        }
        assert_eq!(KnownModel::from_model_id("unknown"), None);
    }
}
