//! Host election and event relaying between views.
//!
//! Every view starts as a guest. Pointer or wheel activity over a view
//! promotes it to host: its captured interactions are replayed on every
//! other view through an `apply` message. Events a host emits before its
//! relay is established are not replayed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::context::{ContextEvent, ContextId, RenderContext};
use crate::emitter::{Inbox, ListenerId};
use crate::protocol::{Message, SyncEvent};

/// Outbound relay of the current host
#[derive(Debug)]
struct HostRelay {
    listener: ListenerId,
    generation: u32,
}

/// Delivery path into one guest document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestChannel {
    pub generation: u32,
    pub delivered: usize,
}

pub struct PageSync {
    lifecycle: Inbox<(ContextId, ContextEvent)>,
    relayed: Inbox<(ContextId, SyncEvent)>,
    listeners: HashMap<ContextId, ListenerId>,
    host: Option<ContextId>,
    relay: Option<HostRelay>,
    guests: HashMap<ContextId, GuestChannel>,
    destroyed: bool,
}

impl PageSync {
    pub fn new(contexts: &mut [RenderContext]) -> Self {
        let mut sync = Self {
            lifecycle: Rc::new(RefCell::new(Vec::new())),
            relayed: Rc::new(RefCell::new(Vec::new())),
            listeners: HashMap::new(),
            host: None,
            relay: None,
            guests: HashMap::new(),
            destroyed: false,
        };
        for ctx in contexts.iter_mut() {
            sync.watch(ctx);
        }
        sync
    }

    /// Start tracking a view added after construction
    pub fn watch(&mut self, ctx: &mut RenderContext) {
        if self.destroyed || self.listeners.contains_key(&ctx.id()) {
            return;
        }
        let id = ctx.id();
        let inbox = Rc::clone(&self.lifecycle);
        let listener = ctx.subscribe(move |event| {
            if matches!(
                event,
                ContextEvent::DocumentReady(_) | ContextEvent::Unload | ContextEvent::Destroy
            ) {
                inbox.borrow_mut().push((id, event.clone()));
            }
        });
        self.listeners.insert(id, listener);
        if ctx.is_ready() {
            self.open_channel(ctx);
        }
    }

    /// Stop tracking a view that is about to be removed
    pub fn forget(&mut self, ctx: &mut RenderContext) {
        let id = ctx.id();
        if let Some(listener) = self.listeners.remove(&id) {
            ctx.unsubscribe(listener);
        }
        if self.host == Some(id) {
            self.close_relay(ctx);
            self.host = None;
        }
        self.guests.remove(&id);
    }

    pub fn host(&self) -> Option<ContextId> {
        self.host
    }

    /// True once the host's relay is listening; a host whose document is
    /// still loading has no relay yet
    pub fn has_relay(&self) -> bool {
        self.relay.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn guest_channel(&self, id: ContextId) -> Option<GuestChannel> {
        self.guests.get(&id).copied()
    }

    pub fn has_guest_channel(&self, id: ContextId) -> bool {
        self.guests.contains_key(&id)
    }

    pub fn guest_count(&self) -> usize {
        self.guests.len()
    }

    /// Make `id` the host. Returns false when it already is, or when the
    /// view is unknown.
    pub fn promote(&mut self, id: ContextId, contexts: &mut [RenderContext]) -> bool {
        if self.destroyed || self.host == Some(id) || !self.listeners.contains_key(&id) {
            return false;
        }
        debug!("sync: promoting {id} to host");

        if let Some(prev) = self.host.take() {
            if let Some(ctx) = contexts.iter_mut().find(|c| c.id() == prev) {
                self.close_relay(ctx);
            }
        }
        self.relay = None;
        self.host = Some(id);

        // channels are rebuilt whenever the host changes
        self.guests.clear();
        for ctx in contexts.iter_mut() {
            if ctx.id() == id {
                if ctx.is_ready() {
                    self.open_relay(ctx);
                }
            } else if ctx.is_ready() && self.listeners.contains_key(&ctx.id()) {
                self.open_channel(ctx);
            }
        }
        true
    }

    /// Process lifecycle changes and relay host events to guests
    pub fn poll(&mut self, contexts: &mut [RenderContext]) {
        if self.destroyed {
            return;
        }

        // events queued before an unload in the same tick still go out
        let relayed: Vec<_> = self.relayed.borrow_mut().drain(..).collect();
        for (source, event) in relayed {
            if self.host != Some(source) || self.relay.is_none() {
                continue;
            }
            let message = Message::apply(&event);
            for ctx in contexts.iter_mut() {
                let Some(channel) = self.guests.get_mut(&ctx.id()) else {
                    continue;
                };
                if channel.generation != ctx.generation() {
                    continue;
                }
                if ctx.deliver(&message).is_ok() {
                    channel.delivered += 1;
                }
            }
        }

        let lifecycle: Vec<_> = self.lifecycle.borrow_mut().drain(..).collect();
        for (id, event) in lifecycle {
            let Some(ctx) = contexts.iter_mut().find(|c| c.id() == id) else {
                continue;
            };
            match event {
                ContextEvent::DocumentReady(_) => {
                    if self.host == Some(id) {
                        if self.relay.is_none() {
                            self.open_relay(ctx);
                        }
                    } else {
                        self.open_channel(ctx);
                    }
                }
                ContextEvent::Unload => {
                    if self.host == Some(id) {
                        debug!("sync: host {id} reloading, relay suspended");
                        self.close_relay(ctx);
                    } else {
                        self.guests.remove(&id);
                    }
                }
                ContextEvent::Destroy => self.forget(ctx),
                _ => {}
            }
        }
    }

    /// Release the relay, every channel and every listener. Safe to call
    /// more than once.
    pub fn destroy(&mut self, contexts: &mut [RenderContext]) {
        if self.destroyed {
            return;
        }
        for ctx in contexts.iter_mut() {
            if self.host == Some(ctx.id()) {
                self.close_relay(ctx);
            }
            if let Some(listener) = self.listeners.remove(&ctx.id()) {
                ctx.unsubscribe(listener);
            }
        }
        self.listeners.clear();
        self.relay = None;
        self.host = None;
        self.guests.clear();
        self.lifecycle.borrow_mut().clear();
        self.relayed.borrow_mut().clear();
        self.destroyed = true;
    }

    fn open_relay(&mut self, ctx: &mut RenderContext) {
        let id = ctx.id();
        let inbox = Rc::clone(&self.relayed);
        let listener = ctx.subscribe(move |event| {
            if let ContextEvent::Message(msg) = event {
                if let Some(sync_event) = msg.sync_event() {
                    inbox.borrow_mut().push((id, sync_event));
                }
            }
        });
        debug!("sync: relay established for host {id}");
        self.relay = Some(HostRelay {
            listener,
            generation: ctx.generation(),
        });
    }

    fn close_relay(&mut self, ctx: &mut RenderContext) {
        if let Some(relay) = self.relay.take() {
            ctx.unsubscribe(relay.listener);
            debug!(
                "sync: relay for {} closed (generation {})",
                ctx.id(),
                relay.generation
            );
        }
    }

    fn open_channel(&mut self, ctx: &RenderContext) {
        if self.host == Some(ctx.id()) {
            return;
        }
        self.guests.insert(
            ctx.id(),
            GuestChannel {
                generation: ctx.generation(),
                delivered: 0,
            },
        );
    }
}

impl std::fmt::Debug for PageSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSync")
            .field("host", &self.host)
            .field("relay", &self.relay)
            .field("guests", &self.guests)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
