//! Core APDU framing, driver dispatch, and session management for
//! ISO/IEC 7816 smart-card readers.
//!
//! This crate mediates between card-aware applications and a reader
//! transport: it frames and transmits T=0 APDUs (including the `61xx`/
//! `6Cxx` status-word retry protocol), manages a reference-counted
//! exclusive-access session per inserted card, and dispatches a uniform
//! file/record/crypto surface to card-specific driver implementations.
//!
//! Enumerating readers, opening slots, and concrete card drivers are out of
//! scope; see [`transport::ReaderTransport`] and [`driver::CardDriver`] for
//! the two interfaces this crate consumes.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// The APDU request/response model and the case-based validator.
pub mod apdu;

/// Per-card algorithm registry.
pub mod algorithm;

/// The live session object, the APDU engine, and the card operation façade
/// with auto-chunking.
pub mod card;

/// Driver registry, connect/disconnect orchestration, and the optional
/// ATR-profile loader.
pub mod context;

/// The card driver trait and ATR-table matching helper.
pub mod driver;

/// The error type surfaced by every fallible operation in this crate.
pub mod error;

/// File attributes returned by `select_file`.
pub mod file;

/// The reference-counted exclusive-access lock and its cache-invalidation
/// discipline.
pub mod lock;

/// Typed file-system addresses used to select files on a card.
pub mod path;

/// In-memory [`transport::ReaderTransport`]/[`driver::CardDriver`]
/// implementations for tests. Built unconditionally under `cfg(test)` for
/// this crate's own unit tests, and additionally exported under the
/// `testing` feature so integration tests in `tests/` can use them too.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// The T=0 transceiver: wire serialization and response parsing.
pub mod transceiver;

/// The reader transport trait this crate consumes.
pub mod transport;

pub use apdu::{Apdu, ApduCase};
pub use card::Card;
pub use context::Context;
pub use driver::CardDriver;
pub use error::ScError;
pub use transport::{DisconnectAction, ReaderTransport, SlotId};
