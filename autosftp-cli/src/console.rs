use autosftp_core::{CredentialSource, Secret};
use is_terminal::IsTerminal;
use tracing::warn;
use zeroize::Zeroizing;

/// Asks for a password on the controlling terminal.
pub struct ConsolePrompt;

impl ConsolePrompt {
    /// `None` when stdin is not a terminal, since nobody could answer.
    pub fn detect() -> Option<Self> {
        std::io::stdin().is_terminal().then_some(ConsolePrompt)
    }
}

impl CredentialSource for ConsolePrompt {
    /// Blocks on the terminal; needs the multi-threaded runtime.
    fn prompt(&mut self, user: &str, host: &str) -> Option<Secret> {
        let question = format!("{user}@{host}'s password: ");
        match tokio::task::block_in_place(|| rpassword::prompt_password(question)) {
            Ok(pw) => Some(Zeroizing::new(pw)),
            Err(e) => {
                warn!("cannot read password: {e}");
                None
            }
        }
    }
}
