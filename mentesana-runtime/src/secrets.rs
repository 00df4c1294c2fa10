use anyhow::Context;

/// Keyring service name. Changing it orphans stored keys.
const SERVICE: &str = "mentesana";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    LlmApiKey,
    ElevenLabsApiKey,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::LlmApiKey => "llm_api_key",
            SecretKey::ElevenLabsApiKey => "elevenlabs_api_key",
        }
    }

    /// Environment variable consulted when the keyring has no entry.
    pub fn env_var(self) -> &'static str {
        match self {
            SecretKey::LlmApiKey => "MENTESANA_LLM_API_KEY",
            SecretKey::ElevenLabsApiKey => "MENTESANA_ELEVENLABS_API_KEY",
        }
    }
}

impl std::str::FromStr for SecretKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(SecretKey::LlmApiKey),
            "elevenlabs" => Ok(SecretKey::ElevenLabsApiKey),
            other => Err(anyhow::anyhow!("unknown key {other:?}; expected llm or elevenlabs")),
        }
    }
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    entry.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

/// Keyring first, then the environment. Keyring failures (headless CI, no secret
/// service) are logged and treated as "not stored".
pub fn resolve_secret(key: SecretKey) -> Option<String> {
    let stored = match get_secret(key) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("keyring unavailable for {}: {e:#}", key.user());
            None
        }
    };

    stored
        .or_else(|| std::env::var(key.env_var()).ok())
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_stable() {
        // Don't touch the developer's real keyring in tests; just pin the mapping.
        assert_eq!(SecretKey::LlmApiKey.user(), "llm_api_key");
        assert_eq!(SecretKey::ElevenLabsApiKey.user(), "elevenlabs_api_key");
        assert_eq!(SecretKey::LlmApiKey.env_var(), "MENTESANA_LLM_API_KEY");
    }

    #[test]
    fn parses_command_line_key_names() {
        assert_eq!("llm".parse::<SecretKey>().unwrap(), SecretKey::LlmApiKey);
        assert_eq!(
            " ElevenLabs ".parse::<SecretKey>().unwrap(),
            SecretKey::ElevenLabsApiKey
        );
        assert!("openai".parse::<SecretKey>().is_err());
    }
}
