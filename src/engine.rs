use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time;

use crate::config::Config;
use crate::extractor::LogEvent;
use crate::firewall::Firewall;
use crate::notifier::Outbound;
use crate::state::BanStore;

/// Drives the ban lifecycle: event-driven blocks, timed unblocks, and the
/// periodic resync of the store from firewall ground truth.
///
/// Every reaction to an event runs as its own spawned task, so a stuck
/// firewall call or a slow notification never holds up the log-consuming
/// loop or the other reactions.
#[derive(Clone)]
pub struct Engine {
    store: Arc<BanStore>,
    firewall: Arc<dyn Firewall>,
    outbound: UnboundedSender<Outbound>,
    config: Arc<Config>,
}

impl Engine {
    pub fn new(
        store: Arc<BanStore>,
        firewall: Arc<dyn Firewall>,
        outbound: UnboundedSender<Outbound>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            firewall,
            outbound,
            config,
        }
    }

    /// Block path. The store decides first, in one critical section; only the
    /// first observation of an address dispatches the side effects. Duplicate
    /// lines for an already-blocked address are a deliberate no-op, the ban
    /// is not refreshed or extended.
    pub fn handle_event(&self, event: LogEvent) {
        if !self.store.try_block(&event.ip) {
            debug!(
                "user {} with IP {} is already blocked, skipping",
                event.username, event.ip
            );
            return;
        }

        info!(
            "user {} with IP {} blocked for {} minutes",
            event.username, event.ip, self.config.block_duration
        );

        if self.config.send_user_message {
            if let Some(tid) = &event.session_id {
                self.queue_message(&self.config.bot_token, tid, self.config.user_message.clone());
            }
        }

        if self.config.send_admin_message {
            self.queue_admin_message(
                self.config
                    .admin_block_message(&event.username, &event.ip),
            );
        }

        let engine = self.clone();
        let ip = event.ip.clone();
        tokio::spawn(async move { engine.apply_deny(&ip) });

        let engine = self.clone();
        tokio::spawn(async move {
            engine.unblock_after(event.ip, event.username).await;
        });
    }

    /// A deny failure is isolated and reported, never fatal: the store entry
    /// and the unblock timer stand, and the next resync reconciles the store
    /// with whatever the firewall actually holds.
    fn apply_deny(&self, ip: &str) {
        if let Err(e) = self.firewall.deny(ip) {
            error!("failed to apply firewall deny for {}: {:#}", ip, e);
            if self.config.send_admin_message {
                self.queue_admin_message(format!(
                    "\u{26a0}\u{fe0f} Failed to apply firewall deny for {} on {}: {}",
                    ip, self.config.hostname, e
                ));
            }
        }
    }

    /// Unblock path, one timer per ban episode. The username travels as
    /// explicit payload captured at schedule time. If the firewall refuses to
    /// lift the rule, the entry stays blocked; that is what local state can
    /// still prove, and a later resync corrects the drift either way.
    async fn unblock_after(&self, ip: String, username: String) {
        time::sleep(self.config.ban_duration()).await;

        match self.firewall.allow(&ip) {
            Ok(()) => {
                self.store.unblock(&ip);
                info!("user {} with IP {} has been unblocked", username, ip);
                if self.config.send_admin_message {
                    self.queue_admin_message(
                        self.config.admin_unblock_message(&username, &ip),
                    );
                }
            }
            Err(e) => error!("failed to lift firewall deny for {}: {:#}", ip, e),
        }
    }

    /// Replace the store with the firewall's current deny list. On a query
    /// failure the previous view is kept for this cycle.
    pub fn resync(&self) {
        match self.firewall.list_denied() {
            Ok(denied) => {
                debug!("resynced ban store, {} addresses currently denied", denied.len());
                self.store.replace_all(denied);
            }
            Err(e) => error!("firewall status query failed, keeping current view: {:#}", e),
        }
    }

    /// Resyncs immediately, then on every ban-duration tick. Runs for the
    /// life of the process, independent of the log stream.
    pub async fn run_resync(self) {
        let mut interval = time::interval(self.config.ban_duration());
        loop {
            interval.tick().await;
            self.resync();
        }
    }

    fn queue_admin_message(&self, text: String) {
        let token = self.config.admin_bot_token.clone();
        let chat = self.config.admin_chat_id.clone();
        self.queue_message(&token, &chat, text);
    }

    fn queue_message(&self, bot_token: &str, chat_id: &str, text: String) {
        let msg = Outbound {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            text,
        };
        if self.outbound.send(msg).is_err() {
            debug!("notifier channel closed, dropping message");
        }
    }
}
