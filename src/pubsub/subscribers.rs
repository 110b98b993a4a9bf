use crate::model::TickBatch;
use crate::pubsub::Subscriber;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Forwards every batch into a channel, preserving receipt order.
pub struct ChannelSubscriber {
    topics: Vec<String>,
    fields: Option<Vec<String>>,
    tx: UnboundedSender<TickBatch>,
}

impl ChannelSubscriber {
    pub fn new(topics: Vec<String>) -> (ChannelSubscriber, UnboundedReceiver<TickBatch>) {
        let (tx, rx) = unbounded_channel();
        (
            ChannelSubscriber {
                topics,
                fields: None,
                tx,
            },
            rx,
        )
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl Subscriber for ChannelSubscriber {
    fn subscribed_topics(&self) -> Vec<String> {
        self.topics.clone()
    }

    fn subscribed_fields(&self) -> Option<Vec<String>> {
        self.fields.clone()
    }

    fn on_data(&self, batch: &TickBatch) {
        if self.tx.send(batch.clone()).is_err() {
            log::debug!("channel subscriber for {:?} has no receiver", self.topics);
        }
    }
}

/// Calls a closure for every batch.
pub struct FnSubscriber<F> {
    topics: Vec<String>,
    callback: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&TickBatch) + Send + Sync,
{
    pub fn new(topics: Vec<String>, callback: F) -> Self {
        FnSubscriber { topics, callback }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&TickBatch) + Send + Sync,
{
    fn subscribed_topics(&self) -> Vec<String> {
        self.topics.clone()
    }

    fn on_data(&self, batch: &TickBatch) {
        (self.callback)(batch)
    }
}
