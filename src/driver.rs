//! Card driver dispatch: the trait a concrete card implementation
//! supplies, plus the ATR-table matching helper drivers use to recognize
//! specific card models.

use crate::card::Card;
use crate::error::ScError;
use crate::file::FileInfo;
use crate::path::Path;

/// A single `(ATR, driver-specific id)` mapping, used by a driver to
/// recognize a card model from its ATR.
#[derive(Debug, Clone)]
pub struct AtrTableEntry {
    /// The expected ATR bytes.
    pub atr: Vec<u8>,
    /// The driver-specific model id this ATR maps to.
    pub id: i32,
}

/// Scan `table` for an entry whose ATR has the same length as `atr` and
/// compares equal byte-for-byte. Returns the matching entry's index and id,
/// or `None`.
pub fn match_atr(atr: &[u8], table: &[AtrTableEntry]) -> Option<(usize, i32)> {
    table
        .iter()
        .enumerate()
        .find(|(_, entry)| entry.atr.len() == atr.len() && entry.atr == atr)
        .map(|(i, entry)| (i, entry.id))
}

/// The operations a card driver may implement. Every operation defaults to
/// [`ScError::NotSupported`]; a driver "not supporting" an operation is
/// simply not overriding its default, which is this crate's analogue of
/// the source's null dispatch-table slot.
///
/// `Card` stores an `Arc<dyn CardDriver>`; cloning that `Arc` is the Rust
/// analogue of the source copying the driver's operation table into the
/// card at connect time: a driver can patch its own table, or be unloaded,
/// independent of any `Card` already holding a reference to it.
pub trait CardDriver: Send + Sync {
    /// A human-readable driver name, used in logs.
    fn name(&self) -> &str;

    /// ATR-based auto-detection: true if this driver recognizes `atr`.
    ///
    /// Takes the bare ATR rather than a `&Card`, because at probe time no
    /// driver has been assigned to the card yet — there is nothing else on
    /// the card object a driver's `match_card` could legitimately inspect,
    /// and every driver in practice matches by ATR table lookup (see
    /// [`match_atr`]).
    fn match_card(&self, atr: &[u8]) -> bool;

    /// Initialize `card` after it has been tentatively bound to this
    /// driver. Returning [`ScError::InvalidCard`] tells the connect loop to
    /// keep probing with the next driver; any other error is fatal to the
    /// whole connect.
    fn init(&self, card: &mut Card) -> Result<(), ScError>;

    /// Tear down driver-owned state before disconnect. Errors are logged,
    /// not propagated: disconnect always proceeds.
    fn finish(&self, _card: &mut Card) -> Result<(), ScError> {
        Ok(())
    }

    /// Map a non-success status word to a driver-specific error.
    fn check_sw(&self, _card: &Card, sw1: u8, sw2: u8) -> ScError {
        ScError::DriverStatus {
            sw1,
            sw2,
            source: Box::new(UnclassifiedStatus { sw1, sw2 }),
        }
    }

    /// Select a file by path, returning its attributes.
    fn select_file(&self, _card: &mut Card, _path: &Path) -> Result<FileInfo, ScError> {
        Err(ScError::NotSupported)
    }

    /// List the children of the currently selected DF into `buf`. Returns
    /// the number of bytes written.
    fn list_files(&self, _card: &mut Card, _buf: &mut [u8]) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Create a file described by `file` under the currently selected DF.
    fn create_file(&self, _card: &mut Card, _file: &FileInfo) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// Delete the file at `path`.
    fn delete_file(&self, _card: &mut Card, _path: &Path) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// Read up to `buf.len()` bytes from the currently selected transparent
    /// EF starting at `offset`. Returns the number of bytes actually read;
    /// `0` signals EOF.
    fn read_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        _buf: &mut [u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Write `buf` to the currently selected transparent EF starting at
    /// `offset`. Returns the number of bytes actually written.
    fn write_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        _buf: &[u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Update (overwrite) `buf.len()` bytes of the currently selected
    /// transparent EF starting at `offset`. Returns the number of bytes
    /// actually written.
    fn update_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        _buf: &[u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Erase `count` bytes of the currently selected transparent EF
    /// starting at `offset`. Not chunked by the façade: erase ranges are
    /// driver-defined.
    fn erase_binary(&self, _card: &mut Card, _offset: u32, _count: usize) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Read record number `rec_nr` of the currently selected structured EF
    /// into `buf`. Returns the number of bytes written.
    fn read_record(
        &self,
        _card: &mut Card,
        _rec_nr: u32,
        _buf: &mut [u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }

    /// Write record number `rec_nr`.
    fn write_record(
        &self,
        _card: &mut Card,
        _rec_nr: u32,
        _buf: &[u8],
        _flags: u32,
    ) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// Append a new record to the currently selected structured EF.
    fn append_record(&self, _card: &mut Card, _buf: &[u8], _flags: u32) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// Update (overwrite) record number `rec_nr`.
    fn update_record(
        &self,
        _card: &mut Card,
        _rec_nr: u32,
        _buf: &[u8],
        _flags: u32,
    ) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// Request `len` bytes of randomness from the card into `rnd`.
    fn get_challenge(&self, _card: &mut Card, _rnd: &mut [u8]) -> Result<(), ScError> {
        Err(ScError::NotSupported)
    }

    /// A driver-specific out-of-band control operation.
    fn card_ctl(&self, _card: &mut Card, _cmd: u64, _args: &mut [u8]) -> Result<usize, ScError> {
        Err(ScError::NotSupported)
    }
}

/// Fallback error source used by the default `check_sw` when a driver
/// doesn't override it.
#[derive(Debug)]
struct UnclassifiedStatus {
    sw1: u8,
    sw2: u8,
}

impl std::fmt::Display for UnclassifiedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unclassified status word {:02X}{:02X}", self.sw1, self.sw2)
    }
}

impl std::error::Error for UnclassifiedStatus {}
