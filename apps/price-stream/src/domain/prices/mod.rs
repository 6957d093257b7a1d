//! Price Store
//!
//! In-memory mapping of instrument to latest price, shared between the
//! network task that applies trades and the presentation layer that reads
//! snapshots.
//!
//! # Change Notification
//!
//! Every applied batch bumps a revision counter published on a
//! [`tokio::sync::watch`] channel. Listeners are told "the store changed",
//! not what changed; bursts of updates may coalesce into a single wake-up,
//! after which a [`PriceStore::snapshot`] reflects every applied update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::domain::streaming::{Instrument, PriceQuote};

/// Store construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The same instrument was registered twice.
    #[error("instrument registered twice: {0}")]
    DuplicateInstrument(Instrument),
}

#[derive(Debug)]
struct StoreInner {
    quotes: Vec<PriceQuote>,
    // parallel to `quotes`; set on the first applied tick
    ticked: Vec<bool>,
    last_update: Option<DateTime<Utc>>,
}

/// Latest price per tracked instrument, in registration order.
///
/// The set of instruments is fixed at construction; entries are never added
/// or removed afterwards.
///
/// # Example
///
/// ```rust
/// use price_stream::domain::prices::PriceStore;
/// use price_stream::domain::streaming::PriceQuote;
///
/// let store = PriceStore::initialize(["A", "B"]).unwrap();
/// assert!(store.apply_trade(&PriceQuote::new("B", 10.5)));
/// assert!(!store.apply_trade(&PriceQuote::new("Z", 1.0)));
///
/// let snapshot = store.snapshot();
/// assert_eq!(snapshot[0].price, 0.0);
/// assert_eq!(snapshot[1].price, 10.5);
/// ```
#[derive(Debug)]
pub struct PriceStore {
    index: HashMap<Instrument, usize>,
    inner: RwLock<StoreInner>,
    revision: watch::Sender<u64>,
}

impl PriceStore {
    /// Create one entry per instrument with the placeholder price.
    ///
    /// # Errors
    ///
    /// Returns an error if an instrument appears more than once.
    pub fn initialize<I, S>(instruments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Instrument>,
    {
        let mut index = HashMap::new();
        let mut quotes = Vec::new();

        for instrument in instruments.into_iter().map(Into::into) {
            if index.contains_key(&instrument) {
                return Err(StoreError::DuplicateInstrument(instrument));
            }
            index.insert(instrument.clone(), quotes.len());
            quotes.push(PriceQuote::empty(instrument));
        }

        Ok(Self {
            index,
            inner: RwLock::new(StoreInner {
                ticked: vec![false; quotes.len()],
                quotes,
                last_update: None,
            }),
            revision: watch::channel(0).0,
        })
    }

    /// Apply a single trade.
    ///
    /// Returns `false` (and leaves the store untouched) when the instrument
    /// is not tracked.
    pub fn apply_trade(&self, quote: &PriceQuote) -> bool {
        self.apply_trades(std::slice::from_ref(quote)) == 1
    }

    /// Apply a batch of trades under one lock, in order.
    ///
    /// Raises at most one change notification. Returns the number of
    /// quotes applied; quotes for untracked instruments are skipped.
    pub fn apply_trades(&self, quotes: &[PriceQuote]) -> usize {
        let mut applied = 0;
        {
            let mut inner = self.inner.write();
            for quote in quotes {
                if let Some(&slot) = self.index.get(&quote.instrument) {
                    inner.quotes[slot].price = quote.price;
                    inner.ticked[slot] = true;
                    applied += 1;
                }
            }
            if applied > 0 {
                inner.last_update = Some(Utc::now());
            }
        }

        if applied > 0 {
            self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        }
        applied
    }

    /// Current prices in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PriceQuote> {
        self.inner.read().quotes.clone()
    }

    /// Latest price of one instrument, if tracked.
    #[must_use]
    pub fn get(&self, instrument: &Instrument) -> Option<PriceQuote> {
        let slot = *self.index.get(instrument)?;
        Some(self.inner.read().quotes[slot].clone())
    }

    /// Subscribe to change notifications.
    ///
    /// The received value is a revision counter; only its change matters.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision (number of notifying batches applied).
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Number of instruments that have received at least one tick.
    ///
    /// Counts ticks, not non-zero prices: a traded price of `0.0` counts.
    #[must_use]
    pub fn priced_count(&self) -> usize {
        self.inner.read().ticked.iter().filter(|&&t| t).count()
    }

    /// Time of the last applied trade.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_update
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check whether the store tracks no instruments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TRACKED: [&str; 5] = [
        "BINANCE:BTCUSDT",
        "OANDA:EUR_USD",
        "OANDA:GBP_USD",
        "OANDA:USD_JPY",
        "BINANCE:ETHUSDT",
    ];

    #[test]
    fn initialize_yields_placeholder_prices_in_order() {
        let store = PriceStore::initialize(["A", "B", "C"]).unwrap();
        let snapshot = store.snapshot();

        assert_eq!(snapshot.len(), 3);
        let symbols: Vec<_> = snapshot.iter().map(|q| q.instrument.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
        assert!(snapshot.iter().all(|q| q.price == 0.0));
        assert!(store.last_update().is_none());
        assert_eq!(store.priced_count(), 0);
    }

    #[test]
    fn zero_price_tick_counts_as_priced() {
        let store = PriceStore::initialize(["A", "B", "C"]).unwrap();
        store.apply_trades(&[PriceQuote::new("A", 0.0), PriceQuote::new("B", 4.2)]);
        store.apply_trade(&PriceQuote::new("B", 4.3));
        store.apply_trade(&PriceQuote::new("Z", 1.0));

        assert_eq!(store.priced_count(), 2);
        assert_eq!(store.snapshot()[0].price, 0.0);
    }

    #[test]
    fn initialize_rejects_duplicates() {
        let err = PriceStore::initialize(["A", "A"]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateInstrument(Instrument::new("A")));
    }

    #[test]
    fn untracked_instrument_is_ignored() {
        let store = PriceStore::initialize(["A", "B"]).unwrap();
        let before = store.snapshot();

        assert!(!store.apply_trade(&PriceQuote::new("NOT:TRACKED", 42.0)));
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn apply_overwrites_price() {
        let store = PriceStore::initialize(["A"]).unwrap();
        store.apply_trade(&PriceQuote::new("A", 1.5));
        store.apply_trade(&PriceQuote::new("A", 2.5));

        assert_eq!(store.get(&Instrument::new("A")).unwrap().price, 2.5);
        assert!(store.last_update().is_some());
    }

    #[test]
    fn batch_notifies_once() {
        let store = PriceStore::initialize(["A", "B"]).unwrap();
        let applied = store.apply_trades(&[
            PriceQuote::new("A", 1.0),
            PriceQuote::new("Z", 9.0),
            PriceQuote::new("B", 2.0),
        ]);

        assert_eq!(applied, 2);
        assert_eq!(store.revision(), 1);
    }

    #[tokio::test]
    async fn listener_is_woken_by_update() {
        let store = PriceStore::initialize(["A"]).unwrap();
        let mut changes = store.changes();

        store.apply_trade(&PriceQuote::new("A", 3.0));
        changes.changed().await.unwrap();

        assert_eq!(store.snapshot()[0].price, 3.0);
    }

    #[tokio::test]
    async fn burst_coalesces_into_consistent_state() {
        let store = PriceStore::initialize(["A"]).unwrap();
        let mut changes = store.changes();

        for i in 1..=100 {
            store.apply_trade(&PriceQuote::new("A", f64::from(i)));
        }

        changes.changed().await.unwrap();
        assert_eq!(store.snapshot()[0].price, 100.0);
        assert!(!changes.has_changed().unwrap());
    }

    proptest! {
        #[test]
        fn snapshot_reflects_exactly_applied_updates(
            updates in prop::collection::vec((0..TRACKED.len(), 0.0f64..1_000_000.0), 0..32)
        ) {
            let store = PriceStore::initialize(TRACKED).unwrap();
            let mut expected: Vec<f64> = vec![0.0; TRACKED.len()];

            let quotes: Vec<PriceQuote> = updates
                .iter()
                .map(|&(slot, price)| {
                    expected[slot] = price;
                    PriceQuote::new(TRACKED[slot], price)
                })
                .collect();

            prop_assert_eq!(store.apply_trades(&quotes), quotes.len());

            let snapshot = store.snapshot();
            for (slot, quote) in snapshot.iter().enumerate() {
                prop_assert_eq!(quote.instrument.as_str(), TRACKED[slot]);
                prop_assert_eq!(quote.price, expected[slot]);
            }
        }
    }
}
