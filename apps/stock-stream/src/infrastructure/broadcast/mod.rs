//! Channel Bridge
//!
//! Bridges a [`Stream`]'s synchronous callbacks to an async consumer through
//! a tokio mpsc channel of owned [`StreamUpdate`] values.
//!
//! The channel is unbounded: a slow consumer grows the queue rather than
//! losing updates or stalling the transport's delivery thread.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::application::services::stream::Stream;
use crate::domain::identity::Symbol;
use crate::domain::streaming::{Payload, StreamKind};
use crate::domain::subscription::SubscriptionToken;

/// An owned copy of one delivered update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamUpdate {
    /// Symbol the update belongs to.
    pub symbol: Symbol,
    /// Stream it was delivered on.
    pub kind: StreamKind,
    /// Primary payload.
    pub payload: Payload,
    /// Supplementary payload, if the transport sent one.
    pub supplementary: Option<Payload>,
    /// When the stream delivered it.
    pub received_at: DateTime<Utc>,
}

/// Subscribe a channel sender to `stream`.
///
/// The subscription outlives the receiver: dropping the receiver does not
/// remove the callback, it only makes it discard updates. Call
/// [`Stream::unsubscribe`] with the returned token once the consumer is done.
pub fn subscribe_channel(
    stream: &Stream,
) -> (SubscriptionToken, mpsc::UnboundedReceiver<StreamUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let symbol = stream.symbol().clone();
    let kind = stream.kind();

    let token = stream.subscribe(move |payload, supplementary| {
        let update = StreamUpdate {
            symbol: symbol.clone(),
            kind,
            payload: payload.clone(),
            supplementary: supplementary.cloned(),
            received_at: Utc::now(),
        };
        if tx.send(update).is_err() {
            tracing::trace!(symbol = %symbol, stream = %kind, "Channel receiver dropped");
        }
    });

    (token, rx)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn updates_arrive_in_order() {
        let stream = Stream::new(Symbol::parse("AAPL").unwrap(), StreamKind::Prints);
        let (_token, mut rx) = subscribe_channel(&stream);

        let extra = json!({"bid": 10.0});
        stream.deliver(&json!({"price": 10.01}), Some(&extra));
        stream.deliver(&json!({"price": 10.02}), None);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.symbol.as_str(), "AAPL");
        assert_eq!(first.kind, StreamKind::Prints);
        assert_eq!(first.payload, json!({"price": 10.01}));
        assert_eq!(first.supplementary, Some(extra));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.payload, json!({"price": 10.02}));
        assert!(second.supplementary.is_none());
        assert!(second.received_at >= first.received_at);
    }

    #[tokio::test]
    async fn unsubscribe_closes_channel() {
        let stream = Stream::new(Symbol::parse("MSFT").unwrap(), StreamKind::Level1);
        let (token, mut rx) = subscribe_channel(&stream);

        assert!(stream.unsubscribe(token));

        // The sender lived in the removed callback.
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropped_receiver_stays_subscribed_until_token_released() {
        let stream = Stream::new(Symbol::parse("MSFT").unwrap(), StreamKind::Level2);
        let (token, rx) = subscribe_channel(&stream);
        drop(rx);

        assert_eq!(stream.deliver(&json!([]), None), 1);
        assert_eq!(stream.subscriber_count(), 1);

        assert!(stream.unsubscribe(token));
        assert_eq!(stream.deliver(&json!([]), None), 0);
    }

    #[test]
    fn update_serializes() {
        let update = StreamUpdate {
            symbol: Symbol::parse("AAPL").unwrap(),
            kind: StreamKind::Level1,
            payload: json!({"bid": 1.0}),
            supplementary: None,
            received_at: Utc::now(),
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["symbol"], "AAPL");
        assert_eq!(value["kind"], "level1");
    }
}
