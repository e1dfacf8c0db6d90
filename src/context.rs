//! Driver registry and connect/disconnect orchestration, plus the optional
//! ATR-profile data used to seed a driver's ATR table from a configuration
//! file.

use std::sync::Arc;

use serde::Deserialize;

use crate::card::Card;
use crate::driver::{AtrTableEntry, CardDriver};
use crate::error::ScError;
use crate::transport::{DisconnectAction, ReaderTransport, SlotId};

/// An ATR-table entry as loaded from a profile file. Deserializes from a
/// hex string (e.g. `"3B 00"`) rather than a byte array, since that's how
/// profiles are hand-written and checked into config.
#[derive(Debug, Clone, Deserialize)]
pub struct AtrProfileEntry {
    /// The ATR, as a whitespace-separated hex string.
    pub atr: String,
    /// The driver-specific model id this ATR maps to.
    pub id: i32,
}

/// A table of ATR entries loaded from an external profile (JSON, TOML, or
/// any other format `serde` has a deserializer for). Supplements, rather
/// than replaces, a driver's own built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtrProfile {
    /// The loaded entries.
    pub entries: Vec<AtrProfileEntry>,
}

impl AtrProfile {
    /// Decode every entry's hex string into an [`AtrTableEntry`] list.
    /// Entries with malformed hex are skipped with a logged warning rather
    /// than failing the whole profile.
    pub fn to_table(&self) -> Vec<AtrTableEntry> {
        self.entries
            .iter()
            .filter_map(|e| match parse_hex(&e.atr) {
                Ok(atr) => Some(AtrTableEntry { atr, id: e.id }),
                Err(err) => {
                    log::warn!("skipping malformed ATR profile entry {:?}: {err}", e.atr);
                    None
                }
            })
            .collect()
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    s.split_whitespace()
        .map(|byte| u8::from_str_radix(byte, 16))
        .collect()
}

/// Registry of known drivers and the connect/disconnect logic that probes
/// them against a freshly-powered card.
///
/// Mirrors the source's `sc_context` in miniature: a driver list (tried in
/// registration order, with an optional forced override) and no global
/// mutable state otherwise. Transport enumeration and slot management stay
/// out of scope; a `Context` only ever operates on a slot the caller
/// already has open.
pub struct Context {
    drivers: Vec<Arc<dyn CardDriver>>,
    forced_driver: Option<Arc<dyn CardDriver>>,
}

impl Context {
    /// A context with no drivers registered.
    pub fn new() -> Self {
        Context {
            drivers: Vec::new(),
            forced_driver: None,
        }
    }

    /// Register a driver to be tried during `connect`'s auto-detect probe.
    pub fn register_driver(&mut self, driver: Arc<dyn CardDriver>) {
        self.drivers.push(driver);
    }

    /// Force every future `connect` to use `driver`, skipping auto-detect
    /// entirely. Matches the source's `force_card_driver` escape hatch for
    /// cards that don't self-identify reliably via ATR.
    pub fn force_driver(&mut self, driver: Arc<dyn CardDriver>) {
        self.forced_driver = Some(driver);
    }

    /// Connect to the card in `reader`/`slot`: read its ATR, then either use
    /// the forced driver or probe the registered drivers in order.
    ///
    /// A driver's `init` returning [`ScError::InvalidCard`] means "not my
    /// card" and probing continues with the next candidate; any other
    /// error aborts the whole connect. No driver matching (or the
    /// candidate list being empty) is reported as `InvalidCard` too.
    pub fn connect(&self, reader: Arc<dyn ReaderTransport>, slot: SlotId) -> Result<Card, ScError> {
        reader.connect(slot)?;
        let atr = reader.atr(slot)?;

        if let Some(driver) = &self.forced_driver {
            return self.try_driver(&reader, slot, &atr, Arc::clone(driver));
        }

        let candidates: Vec<_> = self
            .drivers
            .iter()
            .filter(|d| d.match_card(&atr))
            .cloned()
            .collect();

        for driver in candidates {
            match self.try_driver(&reader, slot, &atr, driver) {
                Ok(card) => return Ok(card),
                Err(ScError::InvalidCard) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ScError::InvalidCard)
    }

    /// Build a candidate `Card` already bound to `driver` and run its
    /// `init`. Building a fresh `Card` per attempt (instead of threading an
    /// `Option<Arc<dyn CardDriver>>` through a half-initialized one) keeps
    /// every façade method able to assume a driver is always present.
    fn try_driver(
        &self,
        reader: &Arc<dyn ReaderTransport>,
        slot: SlotId,
        atr: &[u8],
        driver: Arc<dyn CardDriver>,
    ) -> Result<Card, ScError> {
        let mut card = Card::new(Arc::clone(reader), slot, atr.to_vec(), driver);
        let init_driver = Arc::clone(&card.driver);
        init_driver.init(&mut card)?;
        Ok(card)
    }

    /// Tear down `card`: run the driver's `finish`, then disconnect the
    /// reader. Both steps' errors are logged, not propagated — disconnect
    /// always completes from the caller's point of view, matching the
    /// source's best-effort teardown.
    ///
    /// Debug builds assert the session lock is not held; a held lock at
    /// disconnect means a `CardGuard` escaped its scope, which is a bug in
    /// the caller, not a recoverable condition.
    pub fn disconnect(&self, mut card: Card, action: DisconnectAction) -> Result<(), ScError> {
        debug_assert!(
            card.lock_count_is_zero(),
            "disconnect called while the session lock is still held"
        );

        let driver = Arc::clone(&card.driver);
        if let Err(e) = driver.finish(&mut card) {
            log::warn!("driver finish failed during disconnect: {e}");
        }
        if let Err(e) = card.reader.disconnect(card.slot, action) {
            log::warn!("reader disconnect failed: {e}");
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
