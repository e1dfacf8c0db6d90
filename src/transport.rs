//! The reader transport boundary: enumerating readers and opening slots is
//! out of scope here; this crate only consumes a connected slot.

use crate::error::ScError;

/// A logical card position on a reader. Multi-slot readers exist, so a
/// reader is addressed together with a slot id for every call.
pub type SlotId = u32;

/// The action to take on the card when disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectAction {
    /// Leave the card powered and selected.
    Leave,
    /// Reset the card.
    Reset,
    /// Eject the card.
    Eject,
}

/// The reader transport interface the core consumes. Implementations
/// enumerate real hardware (PC/SC, USB-HID, ...); this crate only needs
/// the four operations below.
///
/// `lock`/`unlock` are optional: the default implementations are no-ops,
/// matching the source's "if a callback exists" framing for readers that
/// have no physical arbitration primitive of their own.
pub trait ReaderTransport: Send + Sync {
    /// Power up and select the card in `slot`.
    fn connect(&self, slot: SlotId) -> Result<(), ScError>;

    /// Disconnect from `slot`, taking the given action on the card.
    fn disconnect(&self, slot: SlotId, action: DisconnectAction) -> Result<(), ScError>;

    /// Read the ATR captured when `slot` was connected.
    fn atr(&self, slot: SlotId) -> Result<Vec<u8>, ScError>;

    /// Send `send` to the card in `slot` and read the reply into `recv`.
    /// Returns the number of bytes written into `recv`, which is always
    /// `>= 2` on success (the trailing SW1/SW2).
    ///
    /// The default implementation returns [`ScError::NotSupported`],
    /// mirroring the source's null-callback check for readers that do not
    /// implement raw transmission (there are none in practice, but the
    /// contract is kept optional for symmetry with `lock`/`unlock`).
    fn transmit(&self, _slot: SlotId, _send: &[u8], _recv: &mut [u8]) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Acquire physical exclusive access to `slot`, if the transport
    /// arbitrates with other processes. Default: no-op success.
    fn lock(&self, _slot: SlotId) -> Result<(), ScError> {
        Ok(())
    }

    /// Release physical exclusive access to `slot`. Default: no-op success.
    fn unlock(&self, _slot: SlotId) -> Result<(), ScError> {
        Ok(())
    }
}
