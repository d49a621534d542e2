//! Interactive token prompt.

use std::io::IsTerminal;

use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;

use gitcorpus_core::CredentialProvider;
use gitcorpus_shared::{GitCorpusError, Result};

/// Asks for the token on the terminal. Yields nothing when stdin is not a TTY.
pub(crate) struct PromptCredentials {
    prompt: String,
}

impl PromptCredentials {
    pub(crate) fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl CredentialProvider for PromptCredentials {
    fn describe(&self) -> String {
        "interactive prompt".into()
    }

    fn try_token(&self) -> Result<Option<String>> {
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }

        let token = Password::with_theme(&ColorfulTheme::default())
            .with_prompt(&self.prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| GitCorpusError::missing_credential(format!("token prompt failed: {e}")))?;

        let token = token.trim().to_string();
        Ok((!token.is_empty()).then_some(token))
    }
}
