//! Per-connection exchange state machine.
//!
//! # State Machine
//! ```text
//! Idle ──request──▶ RequestSeen ──response head──▶ ResponseSeen
//!  ▲                                                    │
//!  └──────── completed() ◀── Completed ◀──end marker────┘
//! ```
//!
//! The responder sees requests on the read path and responses on the write
//! path; the initiator is the mirror image. Any other transition discards the
//! open exchange and forces `Idle`. Interim `100 Continue` responses never
//! move the machine.

use crate::error::ChannelError;
use crate::http::context::ExchangeTracingContext;
use crate::http::Role;
use crate::net::connection::ChannelContext;
use crate::net::message::HttpObject;
use crate::net::pipeline::{ChannelHandler, WritePromise};

/// Position of a connection within its current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    Idle,
    RequestSeen,
    ResponseSeen,
    Completed,
}

impl ExchangeState {
    fn can_advance_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Idle, RequestSeen)
                | (RequestSeen, ResponseSeen)
                | (ResponseSeen, Completed)
                | (Completed, Idle)
        )
    }
}

/// Pipeline handler sequencing one connection's exchanges.
#[derive(Debug)]
pub struct HttpTracingHandler {
    state: ExchangeState,
    context: ExchangeTracingContext,
    /// Set between an interim response head and its end marker.
    in_interim: bool,
}

impl HttpTracingHandler {
    pub fn new(context: ExchangeTracingContext) -> Self {
        Self {
            state: ExchangeState::Idle,
            context,
            in_interim: false,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.context.role()
    }

    pub fn context(&self) -> &ExchangeTracingContext {
        &self.context
    }

    fn attempt(&mut self, ctx: &mut ChannelContext, next: ExchangeState) -> bool {
        if self.state.can_advance_to(next) {
            self.state = next;
            return true;
        }
        tracing::debug!(
            connection_id = %ctx.id(),
            role = ?self.context.role(),
            from = ?self.state,
            to = ?next,
            "Unexpected exchange event, resetting"
        );
        self.context.discard();
        ctx.server_span = None;
        self.state = ExchangeState::Idle;
        false
    }

    fn on_request(&mut self, ctx: &mut ChannelContext, msg: &mut HttpObject) {
        let Some(head) = msg.request_head_mut() else {
            return;
        };
        if self.attempt(ctx, ExchangeState::RequestSeen) {
            self.in_interim = false;
            self.context.handle_request(ctx, head);
        }
    }

    /// Returns false for interim responses, which must not be treated as
    /// an end of message either.
    fn on_response(&mut self, ctx: &mut ChannelContext, msg: &HttpObject) -> bool {
        if msg.is_continue() {
            self.in_interim = !msg.is_last();
            return false;
        }
        if let Some(head) = msg.response_head() {
            self.in_interim = false;
            if self.attempt(ctx, ExchangeState::ResponseSeen) {
                self.context.handle_response(head);
            }
        }
        true
    }

    /// True when `msg` ends a response that should advance the machine.
    fn ends_response(&mut self, msg: &HttpObject) -> bool {
        if !msg.is_last() {
            return false;
        }
        if self.in_interim {
            self.in_interim = false;
            return false;
        }
        true
    }

    fn finish_exchange(&mut self, ctx: &mut ChannelContext) {
        self.context.completed();
        ctx.server_span = None;
        self.attempt(ctx, ExchangeState::Idle);
    }

    /// Response side as seen by the role that receives it.
    fn on_inbound_response(&mut self, ctx: &mut ChannelContext, msg: &HttpObject) {
        if !self.on_response(ctx, msg) {
            return;
        }
        if self.ends_response(msg) && self.attempt(ctx, ExchangeState::Completed) {
            self.finish_exchange(ctx);
        }
    }

    /// Response side as seen by the role that sends it. Completion is deferred
    /// until the end marker has been flushed.
    fn on_outbound_response(
        &mut self,
        ctx: &mut ChannelContext,
        msg: &HttpObject,
        promise: &mut WritePromise,
    ) {
        if !self.on_response(ctx, msg) {
            return;
        }
        if self.ends_response(msg) && self.attempt(ctx, ExchangeState::Completed) {
            promise.notify_on_complete();
        }
    }
}

impl ChannelHandler for HttpTracingHandler {
    fn channel_read(&mut self, ctx: &mut ChannelContext, msg: &mut HttpObject) {
        match self.context.role() {
            Role::Responder => self.on_request(ctx, msg),
            Role::Initiator => self.on_inbound_response(ctx, msg),
        }
    }

    fn write(&mut self, ctx: &mut ChannelContext, msg: &mut HttpObject, promise: &mut WritePromise) {
        match self.context.role() {
            Role::Responder => self.on_outbound_response(ctx, msg, promise),
            Role::Initiator => self.on_request(ctx, msg),
        }
    }

    fn write_complete(&mut self, ctx: &mut ChannelContext) {
        if self.state == ExchangeState::Completed {
            self.finish_exchange(ctx);
        }
    }

    fn channel_inactive(&mut self, ctx: &mut ChannelContext) {
        match self.state {
            ExchangeState::Idle => {}
            ExchangeState::RequestSeen => {
                tracing::debug!(
                    connection_id = %ctx.id(),
                    role = ?self.context.role(),
                    "Connection closed before the response"
                );
                self.context.handle_peer_closed();
            }
            ExchangeState::ResponseSeen | ExchangeState::Completed => self.context.completed(),
        }
        ctx.server_span = None;
        self.state = ExchangeState::Idle;
        self.in_interim = false;
    }

    fn exception_caught(&mut self, _ctx: &mut ChannelContext, error: &ChannelError) {
        self.context.exception_caught(error);
    }
}
