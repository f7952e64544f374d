//! Comms subsystem: manages the external chat channels.
//!
//! # Architecture
//!
//! Each channel (console, Telegram) implements [`Component`] and is spawned
//! as an independent task by [`start`] via [`spawn_components`].  Channels
//! capture their shared [`Arc<CommsState>`] at construction time, so the
//! gateway is reachable only through [`CommsState::send_message`].

mod state;
#[cfg(feature = "channel-pty")]
pub mod pty;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

pub use state::CommsState;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::gateway::Gateway;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// File name for a binary reply sent at `millis` (epoch milliseconds).
pub fn attachment_file_name(millis: i64) -> String {
    format!("{millis}.csv")
}

/// Spawn all configured channels and return a [`SubsystemHandle`].
///
/// If any channel exits with an error the shared `shutdown` token is
/// cancelled so siblings stop cooperatively.  With no channel configured
/// the handle resolves once `shutdown` is cancelled.
pub fn start(config: &Config, gateway: Arc<Gateway>, shutdown: CancellationToken) -> SubsystemHandle {
    let state = Arc::new(CommsState::new(gateway));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
    }

    #[cfg(feature = "channel-telegram")]
    {
        if config.comms_telegram_should_load() {
            info!("loading telegram channel");
            components.push(Box::new(telegram::TelegramChannel::new("telegram0", state.clone())));
        }
    }

    #[cfg(not(feature = "channel-telegram"))]
    if config.comms_telegram_should_load() {
        tracing::warn!("telegram enabled in config but built without the channel-telegram feature");
    }

    if components.is_empty() {
        info!("no comms channels configured, waiting for shutdown");
        return SubsystemHandle::from_handle(tokio::spawn(async move {
            shutdown.cancelled().await;
            Ok(())
        }));
    }

    spawn_components(components, shutdown)
}
