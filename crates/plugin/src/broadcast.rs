//! Best-effort live broadcast sink

use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::warn;

use cynova_common::{LiveMessage, LiveServerOptions, TimelineEvent};

#[cfg(feature = "live")]
use cynova_live::LiveServer;

/// Where live messages go, decided once when the reporter is built
pub enum Broadcaster {
    Disabled,
    #[cfg(feature = "live")]
    Live(LiveServer),
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Broadcaster::Disabled => write!(f, "Broadcaster::Disabled"),
            #[cfg(feature = "live")]
            Broadcaster::Live(server) => write!(f, "Broadcaster::Live({})", server.local_addr()),
        }
    }
}

impl Broadcaster {
    /// Start the live server when enabled, otherwise stay disabled
    ///
    /// Needs a tokio runtime reachable from the calling thread; without
    /// one, or when binding fails, the broadcaster is disabled.
    pub fn resolve(options: &LiveServerOptions) -> Self {
        if !options.enabled {
            return Broadcaster::Disabled;
        }
        Self::start(options)
    }

    #[cfg(feature = "live")]
    fn start(options: &LiveServerOptions) -> Self {
        match LiveServer::start(options) {
            Ok(server) => Broadcaster::Live(server),
            Err(e) => {
                warn!("[CyNova] Live server not started: {}", e);
                Broadcaster::Disabled
            }
        }
    }

    #[cfg(not(feature = "live"))]
    fn start(_options: &LiveServerOptions) -> Self {
        warn!("[CyNova] Live server not started (built without the `live` feature)");
        Broadcaster::Disabled
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, Broadcaster::Disabled)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Broadcaster::Disabled => None,
            #[cfg(feature = "live")]
            Broadcaster::Live(server) => Some(server.local_addr()),
        }
    }

    /// Connected observers; always 0 when disabled
    pub fn observers(&self) -> usize {
        match self {
            Broadcaster::Disabled => 0,
            #[cfg(feature = "live")]
            Broadcaster::Live(server) => server.observers(),
        }
    }

    pub fn send(&self, message: LiveMessage) {
        match self {
            Broadcaster::Disabled => drop(message),
            #[cfg(feature = "live")]
            Broadcaster::Live(server) => server.send(&message),
        }
    }

    pub fn lifecycle(&self, phase: &str, spec: Option<&str>, details: Option<Value>) {
        if !self.is_live() {
            return;
        }
        self.send(LiveMessage::lifecycle(phase, spec, details));
    }

    pub fn timeline(&self, event: &TimelineEvent) {
        if !self.is_live() {
            return;
        }
        self.send(LiveMessage::Timeline {
            event: event.clone(),
        });
    }

    pub fn task<T: Serialize>(&self, task: &str, entry: &T) {
        if !self.is_live() {
            return;
        }
        match serde_json::to_value(entry) {
            Ok(entry) => self.send(LiveMessage::Task {
                task: task.to_string(),
                entry,
            }),
            Err(e) => warn!("Dropping unserializable {} entry: {}", task, e),
        }
    }

    pub fn shutdown(&mut self) {
        match self {
            Broadcaster::Disabled => {}
            #[cfg(feature = "live")]
            Broadcaster::Live(server) => server.shutdown(),
        }
        *self = Broadcaster::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let b = Broadcaster::resolve(&LiveServerOptions::default());
        assert!(!b.is_live());
        assert_eq!(b.local_addr(), None);
        b.lifecycle("before:run", None, None);
    }

    #[test]
    fn test_enabled_without_runtime_degrades() {
        let options = LiveServerOptions {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        };
        let mut b = Broadcaster::resolve(&options);
        assert!(!b.is_live());
        b.shutdown();
    }
}
