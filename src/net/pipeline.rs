//! Duplex handler pipeline for one connection.
//!
//! # Responsibilities
//! - Deliver inbound events head to tail, outbound events tail to head
//! - Signal write completion to handlers that asked for it
//! - Fire `channel_inactive` exactly once per connection
//!
//! # Design Decisions
//! - A pipeline is owned by exactly one task; handlers take `&mut self`
//!   and need no locking
//! - Handlers observe and may rewrite events but never drop them
//! - Completion callbacks run only for successful writes; a failed write
//!   is delivered as an exception instead

use crate::error::ChannelError;
use crate::net::connection::ChannelContext;
use crate::net::message::HttpObject;

/// A stage in a connection's pipeline. Every callback defaults to a no-op.
pub trait ChannelHandler: Send {
    fn channel_active(&mut self, _ctx: &mut ChannelContext) {}

    /// An event arrived from the peer.
    fn channel_read(&mut self, _ctx: &mut ChannelContext, _msg: &mut HttpObject) {}

    /// An event is about to be written to the peer. Call
    /// [`WritePromise::notify_on_complete`] to get [`ChannelHandler::write_complete`]
    /// once it has been flushed.
    fn write(
        &mut self,
        _ctx: &mut ChannelContext,
        _msg: &mut HttpObject,
        _promise: &mut WritePromise,
    ) {
    }

    fn write_complete(&mut self, _ctx: &mut ChannelContext) {}

    fn channel_inactive(&mut self, _ctx: &mut ChannelContext) {}

    fn exception_caught(&mut self, _ctx: &mut ChannelContext, _error: &ChannelError) {}
}

/// Completion listeners registered while an event travels the write path.
#[derive(Debug, Default)]
pub struct WritePromise {
    current: usize,
    listeners: Vec<usize>,
}

impl WritePromise {
    /// Ask for a `write_complete` callback once this write is flushed.
    pub fn notify_on_complete(&mut self) {
        if !self.listeners.contains(&self.current) {
            self.listeners.push(self.current);
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }
}

/// Ordered handlers plus the connection they observe.
pub struct Pipeline {
    ctx: ChannelContext,
    handlers: Vec<Box<dyn ChannelHandler>>,
    active: bool,
    inactive: bool,
}

impl Pipeline {
    pub fn new(ctx: ChannelContext) -> Self {
        Self {
            ctx,
            handlers: Vec::new(),
            active: false,
            inactive: false,
        }
    }

    /// Append a handler at the tail (closest to the application).
    pub fn add_last(mut self, handler: impl ChannelHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn add_last_boxed(mut self, handler: Box<dyn ChannelHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn context(&self) -> &ChannelContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ChannelContext {
        &mut self.ctx
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.inactive
    }

    pub fn fire_active(&mut self) {
        if self.active || self.inactive {
            return;
        }
        self.active = true;
        tracing::trace!(connection_id = %self.ctx.id(), "Channel active");
        for handler in self.handlers.iter_mut() {
            handler.channel_active(&mut self.ctx);
        }
    }

    pub fn fire_read(&mut self, msg: &mut HttpObject) {
        for handler in self.handlers.iter_mut() {
            handler.channel_read(&mut self.ctx, msg);
        }
    }

    /// Run the write path for `msg` and collect completion listeners.
    pub fn prepare_write(&mut self, msg: &mut HttpObject) -> WritePromise {
        let mut promise = WritePromise::default();
        for (idx, handler) in self.handlers.iter_mut().enumerate().rev() {
            promise.current = idx;
            handler.write(&mut self.ctx, msg, &mut promise);
        }
        promise
    }

    /// Settle a write previously prepared with [`Pipeline::prepare_write`].
    pub fn complete_write(&mut self, promise: WritePromise, result: &Result<(), ChannelError>) {
        match result {
            Ok(()) => {
                for idx in promise.listeners {
                    if let Some(handler) = self.handlers.get_mut(idx) {
                        handler.write_complete(&mut self.ctx);
                    }
                }
            }
            Err(error) => self.fire_exception(error),
        }
    }

    pub fn fire_exception(&mut self, error: &ChannelError) {
        tracing::debug!(connection_id = %self.ctx.id(), error = %error, "Exception on channel");
        for handler in self.handlers.iter_mut() {
            handler.exception_caught(&mut self.ctx, error);
        }
    }

    /// Tear down the connection. Only the first call after activation has effect.
    pub fn fire_inactive(&mut self) {
        if !self.active || self.inactive {
            return;
        }
        self.inactive = true;
        tracing::trace!(connection_id = %self.ctx.id(), "Channel inactive");
        for handler in self.handlers.iter_mut() {
            handler.channel_inactive(&mut self.ctx);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.fire_inactive();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("ctx", &self.ctx)
            .field("handlers", &self.handlers.len())
            .field("active", &self.active)
            .field("inactive", &self.inactive)
            .finish()
    }
}
