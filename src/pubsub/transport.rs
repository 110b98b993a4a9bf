use crate::core::error::{BridgeError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Source of raw market-data messages.
///
/// The router owns the transport exclusively while it listens. `receive`
/// blocks until the next message and yields `Ok(None)` once the transport has
/// been closed.
#[async_trait]
pub trait MarketDataTransport: Send {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()>;

    async fn receive(&mut self) -> Result<Option<Vec<u8>>>;
}

/// In-process transport fed by a [`TickPublisher`]. Closes when every
/// publisher has been dropped.
pub struct ChannelMarketDataTransport {
    rx: mpsc::Receiver<Vec<u8>>,
    topics: Vec<String>,
}

#[derive(Clone)]
pub struct TickPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl TickPublisher {
    pub async fn publish<B: Into<Vec<u8>>>(&self, raw: B) -> Result<()> {
        self.tx
            .send(raw.into())
            .await
            .map_err(|_| BridgeError::Transport("market-data transport closed".to_string()))
    }
}

pub fn channel_transport(capacity: usize) -> (TickPublisher, ChannelMarketDataTransport) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        TickPublisher { tx },
        ChannelMarketDataTransport {
            rx,
            topics: vec![],
        },
    )
}

impl ChannelMarketDataTransport {
    pub fn subscribed_topics(&self) -> &[String] {
        &self.topics
    }
}

#[async_trait]
impl MarketDataTransport for ChannelMarketDataTransport {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        self.topics.extend(topics.iter().cloned());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

/// Closes a [`RedisMarketDataTransport`] from outside the receive loop.
#[derive(Clone)]
pub struct TransportCloser {
    shutdown: Arc<Notify>,
}

impl TransportCloser {
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

/// One Redis channel per native topic; each published payload is one raw tick.
pub struct RedisMarketDataTransport {
    redis_url: String,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: mpsc::Receiver<Vec<u8>>,
    shutdown: Arc<Notify>,
}

impl RedisMarketDataTransport {
    pub fn new(redis_url: &str) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(1000);
        RedisMarketDataTransport {
            redis_url: redis_url.to_string(),
            tx: Some(tx),
            rx,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn closer(&self) -> TransportCloser {
        TransportCloser {
            shutdown: self.shutdown.clone(),
        }
    }
}

#[async_trait]
impl MarketDataTransport for RedisMarketDataTransport {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| BridgeError::Transport("already subscribed".to_string()))?;
        let redis_client = redis::Client::open(self.redis_url.as_str())?;
        let conn = redis_client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        for topic in topics {
            pubsub.subscribe(topic.as_str()).await?;
        }
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    msg = stream.next() => match msg {
                        Some(msg) => {
                            if tx.send(msg.get_payload_bytes().to_vec()).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            log::info!("redis market-data subscription closed");
        });
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        if self.tx.is_some() {
            return Err(BridgeError::Transport(
                "receive called before subscribe".to_string(),
            ));
        }
        Ok(self.rx.recv().await)
    }
}
