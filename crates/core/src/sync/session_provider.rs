//! Session token providers.

use tokio::sync::watch;

use super::SessionProvider;

fn usable(token: Option<&String>) -> Option<String> {
    token
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Fixed token, e.g. read from configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    token: Option<String>,
}

impl StaticSessionProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl SessionProvider for StaticSessionProvider {
    fn current_token(&self) -> Option<String> {
        usable(self.token.as_ref())
    }
}

/// Live token that the activation flow can set or clear at any time.
#[derive(Debug)]
pub struct WatchSessionProvider {
    sender: watch::Sender<Option<String>>,
}

impl WatchSessionProvider {
    pub fn new(initial: Option<String>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.sender.send_replace(Some(token.into()));
    }

    pub fn clear(&self) {
        self.sender.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.sender.subscribe()
    }
}

impl Default for WatchSessionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionProvider for WatchSessionProvider {
    fn current_token(&self) -> Option<String> {
        usable(self.sender.borrow().as_ref())
    }
}
