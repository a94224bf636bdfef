//! In-memory duplex transport.
//!
//! Two [`LocalChannel`]s created by [`LocalChannel::pair`] exchange
//! [`HttpObject`]s over bounded tokio channels. Each end drives its own
//! [`Pipeline`], so the handlers see exactly the event order a framed
//! network connection would deliver.

use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::net::connection::ChannelContext;
use crate::net::message::HttpObject;
use crate::net::pipeline::Pipeline;

/// Events buffered per direction before `write` waits for the reader.
const CHANNEL_CAPACITY: usize = 64;

/// One end of an in-memory connection.
#[derive(Debug)]
pub struct LocalChannel {
    pipeline: Pipeline,
    tx: Option<mpsc::Sender<HttpObject>>,
    rx: mpsc::Receiver<HttpObject>,
}

impl LocalChannel {
    /// Connect two pipelines and activate both.
    pub fn pair(client: Pipeline, server: Pipeline) -> (LocalChannel, LocalChannel) {
        let (client_tx, server_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut client = LocalChannel {
            pipeline: client,
            tx: Some(client_tx),
            rx: client_rx,
        };
        let mut server = LocalChannel {
            pipeline: server,
            tx: Some(server_tx),
            rx: server_rx,
        };
        client.pipeline.fire_active();
        server.pipeline.fire_active();
        (client, server)
    }

    pub fn context(&self) -> &ChannelContext {
        self.pipeline.context()
    }

    pub fn context_mut(&mut self) -> &mut ChannelContext {
        self.pipeline.context_mut()
    }

    pub fn is_open(&self) -> bool {
        self.tx.is_some() && self.pipeline.is_active()
    }

    /// Write one event. Resolves once the peer's buffer accepted it, after
    /// which completion listeners have run.
    pub async fn write(&mut self, msg: impl Into<HttpObject>) -> Result<(), ChannelError> {
        let mut msg = msg.into();
        let promise = self.pipeline.prepare_write(&mut msg);
        let result = match &self.tx {
            Some(tx) => tx.send(msg).await.map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        };
        self.pipeline.complete_write(promise, &result);
        result
    }

    /// Write several events in order, stopping at the first failure.
    pub async fn write_all<I>(&mut self, msgs: I) -> Result<(), ChannelError>
    where
        I: IntoIterator<Item = HttpObject>,
    {
        for msg in msgs {
            self.write(msg).await?;
        }
        Ok(())
    }

    /// Next event from the peer. `None` once the peer has gone away, at which
    /// point this end turns inactive.
    pub async fn read(&mut self) -> Option<HttpObject> {
        if !self.pipeline.is_active() {
            return None;
        }
        match self.rx.recv().await {
            Some(mut msg) => {
                self.pipeline.fire_read(&mut msg);
                Some(msg)
            }
            None => {
                tracing::debug!(connection_id = %self.pipeline.context().id(), "Peer closed connection");
                self.pipeline.fire_inactive();
                None
            }
        }
    }

    /// Report an application failure to this end's handlers.
    pub fn fire_exception(&mut self, error: &ChannelError) {
        self.pipeline.fire_exception(error);
    }

    /// Close this end. The peer observes end-of-stream on its next read.
    pub fn close(&mut self) {
        self.tx = None;
        self.rx.close();
        self.pipeline.fire_inactive();
    }
}
