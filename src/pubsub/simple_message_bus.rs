use crate::core::error::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::Msg;
use serde::Serialize;
use tokio::sync::mpsc::error::SendError;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishPayload {
    pub channel: String,
    pub payload: String,
}

pub type MessageBusSender = tokio::sync::mpsc::Sender<PublishPayload>;

pub struct RedisBackedMessageBus {
    redis_url: String,
    conn: redis::aio::Connection,
    pub publish_tx: MessageBusSender,
    publish_rx: tokio::sync::mpsc::Receiver<PublishPayload>,
}

impl RedisBackedMessageBus {
    pub async fn new(redis_url: &str) -> Result<RedisBackedMessageBus> {
        let redis_client = redis::Client::open(redis_url)?;
        let conn = redis_client.get_async_connection().await?;
        let (tx, rx) = tokio::sync::mpsc::channel::<PublishPayload>(100);
        Ok(RedisBackedMessageBus {
            redis_url: redis_url.to_string(),
            conn,
            publish_tx: tx,
            publish_rx: rx,
        })
    }

    pub fn pack_json<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(&value)?)
    }

    pub async fn publish<T: Serialize>(&mut self, channel: &str, message: &T) -> Result<()> {
        let packed = Self::pack_json(message)?;
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(packed)
            .query_async::<redis::aio::Connection, i32>(&mut self.conn)
            .await?;
        Ok(())
    }

    pub async fn publish_async(
        sender: &MessageBusSender,
        payload: PublishPayload,
    ) -> std::result::Result<(), SendError<PublishPayload>> {
        sender.send(payload).await
    }

    /// Feeds every message on `channels` to `consumer` until the subscription
    /// closes. A consumer error is logged and the loop carries on.
    pub async fn subscribe<T>(redis_url: &str, channels: Vec<&str>, consumer: &T) -> Result<()>
    where
        T: MessageConsumer,
    {
        let redis_client = redis::Client::open(redis_url)?;
        let conn = redis_client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        for channel in channels {
            pubsub.subscribe(channel).await?;
        }
        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let msg: Msg = msg;
            if let Err(err) = consumer.consume(msg.get_payload_bytes()).await {
                log::error!("{} consume: {}", msg.get_channel_name(), err);
            }
        }
        Ok(())
    }

    pub async fn subscribe_channels<T>(&self, channels: Vec<&str>, consumer: &T) -> Result<()>
    where
        T: MessageConsumer,
    {
        Self::subscribe(&self.redis_url, channels, consumer).await
    }

    /// Drains `publish_tx` into Redis.
    pub async fn publish_poll(&mut self) -> Result<()> {
        while let Some(msg) = self.publish_rx.recv().await {
            redis::cmd("PUBLISH")
                .arg(msg.channel.as_str())
                .arg(msg.payload.as_str())
                .query_async::<redis::aio::Connection, i32>(&mut self.conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait MessageConsumer: Send + Sync {
    async fn consume(&self, msg: &[u8]) -> Result<()>;
}
