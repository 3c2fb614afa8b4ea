//! Synthetic Feed Generator
//!
//! Drives an [`InMemoryTransport`] with random-walk market data so the demo
//! binary has something to stream. Each tick publishes, per symbol:
//!
//! - a level 1 quote,
//! - a level 2 depth update every other tick,
//! - a print about a third of the time, with the quote it traded against as
//!   supplementary payload,
//! - an account update every tenth tick,
//! - an update with an unrecognized tag every fiftieth tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::InMemoryTransport;
use crate::domain::identity::Symbol;
use crate::domain::streaming::{ACCOUNT_TAG, LEVEL1_TAG, LEVEL2_TAG, PRINTS_TAG, Payload};

/// Tag outside the known stream kinds, for exercising the drop path.
pub const UNRECOGNIZED_TAG: u16 = 99;

const DEPTH_LEVELS: usize = 5;

#[derive(Debug)]
struct Instrument {
    symbol: Symbol,
    mid: f64,
    position: i64,
}

/// Random-walk market data publisher.
#[derive(Debug)]
pub struct SyntheticFeed {
    transport: Arc<InMemoryTransport>,
    instruments: Vec<Instrument>,
    interval: Duration,
    ticks: u64,
}

impl SyntheticFeed {
    /// Create a generator for `symbols`, publishing every `interval`.
    #[must_use]
    pub fn new(transport: Arc<InMemoryTransport>, symbols: &[Symbol], interval: Duration) -> Self {
        let mut rng = rand::rng();
        let instruments = symbols
            .iter()
            .map(|symbol| Instrument {
                symbol: symbol.clone(),
                mid: round_cents(rng.random_range(20.0..500.0)),
                position: 0,
            })
            .collect();
        Self {
            transport,
            instruments,
            interval,
            ticks: 0,
        }
    }

    /// Ticks published so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Publish one round of updates. Returns the listener invocations made.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        let tick = self.ticks;
        let mut rng = rand::rng();
        let mut delivered = 0;

        for instrument in &mut self.instruments {
            let step: f64 = rng.random_range(-0.25..=0.25);
            instrument.mid = round_cents((instrument.mid + step).max(1.0));
            let spread = round_cents(rng.random_range(0.01..=0.05));
            let bid = round_cents(instrument.mid - spread / 2.0);
            let ask = round_cents(bid + spread);

            let quote = json!({
                "bid": bid,
                "ask": ask,
                "bid_size": rng.random_range(1..=20) * 100,
                "ask_size": rng.random_range(1..=20) * 100,
                "timestamp": Utc::now().to_rfc3339(),
            });
            delivered += self
                .transport
                .publish_symbol(&instrument.symbol, LEVEL1_TAG, &quote, None);

            if tick % 2 == 0 {
                let depth = depth_update(&mut rng, bid, ask);
                delivered += self
                    .transport
                    .publish_symbol(&instrument.symbol, LEVEL2_TAG, &depth, None);
            }

            if rng.random_bool(0.33) {
                let buy = rng.random_bool(0.5);
                let size: i64 = rng.random_range(1..=10) * 100;
                instrument.position += if buy { size } else { -size };
                let print = json!({
                    "price": if buy { ask } else { bid },
                    "size": size,
                    "side": if buy { "buy" } else { "sell" },
                    "timestamp": Utc::now().to_rfc3339(),
                });
                delivered += self
                    .transport
                    .publish_symbol(&instrument.symbol, PRINTS_TAG, &print, Some(&quote));
            }

            if tick % 10 == 0 {
                let market_value = round_cents(instrument.mid * position_f64(instrument.position));
                let account = json!({
                    "position": instrument.position,
                    "market_value": market_value,
                    "timestamp": Utc::now().to_rfc3339(),
                });
                delivered += self
                    .transport
                    .publish_symbol(&instrument.symbol, ACCOUNT_TAG, &account, None);
            }

            if tick % 50 == 0 {
                delivered += self.transport.publish_symbol(
                    &instrument.symbol,
                    UNRECOGNIZED_TAG,
                    &json!({"heartbeat": tick}),
                    None,
                );
            }
        }

        delivered
    }

    /// Publish on the configured interval until `cancel` fires.
    ///
    /// Returns the number of ticks published.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            symbols = self.instruments.len(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Synthetic feed started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let delivered = self.tick();
                    tracing::trace!(tick = self.ticks, delivered, "Synthetic tick");
                }
            }
        }

        tracing::info!(ticks = self.ticks, "Synthetic feed stopped");
        self.ticks
    }
}

fn depth_update(rng: &mut impl Rng, bid: f64, ask: f64) -> Payload {
    let mut level = |start: f64, step: f64| -> Vec<Payload> {
        (0..DEPTH_LEVELS)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let price = round_cents(start + step * i as f64);
                json!([price, rng.random_range(1..=50) * 100])
            })
            .collect()
    };
    let bids = level(bid, -0.01);
    let asks = level(ask, 0.01);
    json!({ "bids": bids, "asks": asks })
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn position_f64(position: i64) -> f64 {
    position as f64
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{FeedListener, FeedTransport, SymbolDirectory};
    use crate::domain::streaming::UpdateNotification;

    #[derive(Default)]
    struct TagRecorder {
        tags: Mutex<Vec<u16>>,
        supplementary: Mutex<Vec<bool>>,
    }

    impl FeedListener for TagRecorder {
        fn on_notification(&self, n: &UpdateNotification<'_>) {
            self.tags.lock().push(n.tag);
            self.supplementary.lock().push(n.supplementary.is_some());
        }
    }

    fn attached_feed() -> (Arc<InMemoryTransport>, Arc<TagRecorder>, Symbol) {
        let transport = Arc::new(InMemoryTransport::new());
        let symbol = Symbol::parse("AAPL").unwrap();
        let feed = transport.register_symbol(&symbol);
        let recorder = Arc::new(TagRecorder::default());
        transport
            .register_listener(feed, Arc::clone(&recorder) as Arc<dyn FeedListener>)
            .unwrap();
        assert_eq!(transport.feed_id(&symbol), Some(feed));
        (transport, recorder, symbol)
    }

    #[test]
    fn every_tick_publishes_level1() {
        let (transport, recorder, symbol) = attached_feed();
        let mut feed = SyntheticFeed::new(transport, &[symbol], Duration::from_millis(1));

        for _ in 0..50 {
            assert!(feed.tick() >= 1);
        }

        let tags = recorder.tags.lock();
        assert_eq!(tags.iter().filter(|t| **t == LEVEL1_TAG).count(), 50);
        assert_eq!(tags.iter().filter(|t| **t == LEVEL2_TAG).count(), 25);
        assert_eq!(tags.iter().filter(|t| **t == ACCOUNT_TAG).count(), 5);
        assert_eq!(tags.iter().filter(|t| **t == UNRECOGNIZED_TAG).count(), 1);
        assert_eq!(feed.ticks(), 50);
    }

    #[test]
    fn prints_carry_quote() {
        let (transport, recorder, symbol) = attached_feed();
        let mut feed = SyntheticFeed::new(transport, &[symbol], Duration::from_millis(1));

        for _ in 0..20 {
            feed.tick();
        }

        let tags = recorder.tags.lock();
        let supplementary = recorder.supplementary.lock();
        for (tag, has_extra) in tags.iter().zip(supplementary.iter()) {
            assert_eq!(*tag == PRINTS_TAG, *has_extra);
        }
    }

    #[test]
    fn unregistered_symbols_publish_nothing() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut feed = SyntheticFeed::new(
            transport,
            &[Symbol::parse("MSFT").unwrap()],
            Duration::from_millis(1),
        );
        assert_eq!(feed.tick(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (transport, recorder, symbol) = attached_feed();
        let feed = SyntheticFeed::new(transport, &[symbol], Duration::from_millis(2));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(feed.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        let ticks = task.await.unwrap();

        assert!(ticks >= 1);
        let level1 = recorder
            .tags
            .lock()
            .iter()
            .filter(|t| **t == LEVEL1_TAG)
            .count();
        assert_eq!(level1 as u64, ticks);
    }
}
