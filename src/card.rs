//! The `Card` session object: the card operation façade, the APDU engine,
//! and the lock manager it's built on.

use std::sync::Arc;

use crate::algorithm::AlgorithmRegistry;
use crate::apdu::Apdu;
use crate::driver::CardDriver;
use crate::error::ScError;
use crate::file::FileInfo;
use crate::lock::{CardGuard, LockManager};
use crate::path::Path;
use crate::transceiver::transceive_t0;
use crate::transport::{ReaderTransport, SlotId};

/// Above this many bytes, `read_binary`/`write_binary`/`update_binary`
/// chunk the transfer into multiple APDUs unless the card advertises the
/// extended-APDU capability. Matches the source's `SC_APDU_CHOP_SIZE`.
pub const APDU_CHOP_SIZE: usize = 240;

/// Capability bits describing what a connected card supports beyond the
/// baseline T=0 short-APDU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(pub u32);

impl Capabilities {
    /// No extra capabilities.
    pub const NONE: Capabilities = Capabilities(0);
    /// The card/reader can carry extended-length APDUs, so the façade
    /// should not chunk large binary transfers.
    pub const APDU_EXT: Capabilities = Capabilities(1 << 0);

    /// True if `self` has every bit set in `other`.
    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;
    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

/// An application directory entry, as enumerated from `EF.DIR`.
#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    /// The application's AID.
    pub aid: Vec<u8>,
    /// An optional human-readable label.
    pub label: Option<String>,
}

/// A live session with an inserted card.
///
/// Owns its dispatch-table reference (an `Arc<dyn CardDriver>`), algorithm
/// list, application list, and lock/cache state. The reader is a
/// non-owning back-reference. Built by [`crate::context::Context::connect`]
/// and torn down by [`crate::context::Context::disconnect`], which observes
/// the `lock_count == 0` precondition before freeing anything.
pub struct Card {
    pub(crate) reader: Arc<dyn ReaderTransport>,
    pub(crate) slot: SlotId,
    atr: Vec<u8>,
    pub(crate) driver: Arc<dyn CardDriver>,
    algorithms: AlgorithmRegistry,
    capabilities: Capabilities,
    applications: Option<Vec<ApplicationInfo>>,
    lock_mgr: LockManager,
    /// Default class byte used by higher layers formatting their own
    /// APDUs against this card (the source's `sc_format_apdu` seeds `cla`
    /// from the card this way).
    pub cla: u8,
}

impl Card {
    pub(crate) fn new(
        reader: Arc<dyn ReaderTransport>,
        slot: SlotId,
        atr: Vec<u8>,
        driver: Arc<dyn CardDriver>,
    ) -> Self {
        let lock_mgr = LockManager::new(Arc::clone(&reader), slot);
        Card {
            reader,
            slot,
            atr,
            driver,
            algorithms: AlgorithmRegistry::new(),
            capabilities: Capabilities::NONE,
            applications: None,
            lock_mgr,
            cla: 0x00,
        }
    }

    /// The ATR captured at connect time.
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    /// The name of the driver that matched this card.
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// This card's algorithm registry.
    pub fn algorithms(&self) -> &AlgorithmRegistry {
        &self.algorithms
    }

    /// Mutable access to the algorithm registry, for driver `init`
    /// callbacks to populate.
    pub fn algorithms_mut(&mut self) -> &mut AlgorithmRegistry {
        &mut self.algorithms
    }

    /// This card's capability bitset.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Set the capability bitset. Called by driver `init`.
    pub fn set_capabilities(&mut self, caps: Capabilities) {
        self.capabilities = caps;
    }

    /// Applications enumerated from `EF.DIR`, or `None` if not yet
    /// enumerated (the Rust analogue of the source's `app_count == -1`
    /// sentinel).
    pub fn applications(&self) -> Option<&[ApplicationInfo]> {
        self.applications.as_deref()
    }

    /// Record the enumerated application directory.
    pub fn set_applications(&mut self, apps: Vec<ApplicationInfo>) {
        self.applications = Some(apps);
    }

    /// Classify a non-success status word via the driver's `check_sw`.
    pub fn check_sw(&self, sw1: u8, sw2: u8) -> ScError {
        let driver = Arc::clone(&self.driver);
        driver.check_sw(self, sw1, sw2)
    }

    /// Take the session lock. Returns a guard that releases it on drop;
    /// callers that need to hold the lock across several APDU exchanges
    /// (file traversal, chunked read/write) keep the guard alive for the
    /// whole sequence rather than locking/unlocking by hand.
    pub fn lock(&self) -> Result<CardGuard<'_>, ScError> {
        self.lock_mgr.lock()?;
        Ok(CardGuard {
            manager: &self.lock_mgr,
        })
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> u32 {
        self.lock_mgr.count()
    }

    pub(crate) fn lock_count_is_zero(&self) -> bool {
        self.lock_mgr.count_is_zero()
    }

    /// The APDU engine: validate, lock, exchange, and run the `61xx`/`6Cxx`
    /// retry protocol.
    ///
    /// Only the first `6C` retry is honored (a `6C` to the retry itself is
    /// not re-chained) and only one `GET RESPONSE` is issued per `61` (a
    /// card that chains further `61`s is not followed) — preserved exactly
    /// as the source leaves them.
    pub fn transmit(&self, apdu: &mut Apdu) -> Result<(), ScError> {
        apdu.validate()?;
        let _guard = self.lock()?;
        let orig_resp_capacity = apdu.resp_capacity;

        transceive_t0(&*self.reader, self.slot, apdu)?;
        trace_exchange(apdu);

        if apdu.sw1 == 0x6C && apdu.resp.is_empty() {
            apdu.resp_capacity = orig_resp_capacity;
            apdu.le = Some(apdu.sw2 as u16);
            transceive_t0(&*self.reader, self.slot, apdu)?;
            trace_exchange(apdu);
        }

        if apdu.sw1 == 0x61 && apdu.resp.is_empty() {
            if orig_resp_capacity == 0 {
                // FIXME: should we do this? (preserved from the source)
                apdu.sw1 = 0x90;
                apdu.sw2 = 0x00;
                return Ok(());
            }

            let mut get_response =
                Apdu::case2_short(0x00, 0xC0, 0x00, 0x00, apdu.sw2 as u16, apdu.sw2 as usize);
            transceive_t0(&*self.reader, self.slot, &mut get_response)?;
            trace_exchange(&get_response);

            let n = get_response.resp.len().min(orig_resp_capacity);
            apdu.resp = get_response.resp[..n].to_vec();
            apdu.resp_capacity = orig_resp_capacity;
            apdu.sw1 = get_response.sw1;
            apdu.sw2 = get_response.sw2;
        }

        Ok(())
    }

    // -- Card operation façade -------------------------------------------

    /// Select a file by path. Validates the path before dispatch, and
    /// stamps the returned `FileInfo`'s path with the path used to
    /// select it (the driver need not set it itself).
    pub fn select_file(&mut self, path: &Path) -> Result<FileInfo, ScError> {
        path.validate()?;
        let driver = Arc::clone(&self.driver);
        let mut file = driver.select_file(self, path)?;
        file.path = path.clone();
        Ok(file)
    }

    /// List the children of the currently selected DF into `buf`.
    pub fn list_files(&mut self, buf: &mut [u8]) -> Result<usize, ScError> {
        let driver = Arc::clone(&self.driver);
        driver.list_files(self, buf)
    }

    /// Create a file under the currently selected DF.
    pub fn create_file(&mut self, file: &FileInfo) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.create_file(self, file)
    }

    /// Delete the file at `path`.
    pub fn delete_file(&mut self, path: &Path) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.delete_file(self, path)
    }

    /// Request `rnd.len()` bytes of randomness from the card.
    pub fn get_challenge(&mut self, rnd: &mut [u8]) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.get_challenge(self, rnd)
    }

    /// Read record number `rec_nr` into `buf`.
    pub fn read_record(&mut self, rec_nr: u32, buf: &mut [u8], flags: u32) -> Result<usize, ScError> {
        let driver = Arc::clone(&self.driver);
        driver.read_record(self, rec_nr, buf, flags)
    }

    /// Write record number `rec_nr`.
    pub fn write_record(&mut self, rec_nr: u32, buf: &[u8], flags: u32) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.write_record(self, rec_nr, buf, flags)
    }

    /// Append a new record.
    pub fn append_record(&mut self, buf: &[u8], flags: u32) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.append_record(self, buf, flags)
    }

    /// Update (overwrite) record number `rec_nr`.
    pub fn update_record(&mut self, rec_nr: u32, buf: &[u8], flags: u32) -> Result<(), ScError> {
        let driver = Arc::clone(&self.driver);
        driver.update_record(self, rec_nr, buf, flags)
    }

    /// A driver-specific out-of-band control operation.
    pub fn card_ctl(&mut self, cmd: u64, args: &mut [u8]) -> Result<usize, ScError> {
        let driver = Arc::clone(&self.driver);
        driver.card_ctl(self, cmd, args)
    }

    /// Erase `count` bytes starting at `offset`. Never chunked: erase
    /// ranges are driver-defined.
    pub fn erase_binary(&mut self, offset: u32, count: usize) -> Result<usize, ScError> {
        let driver = Arc::clone(&self.driver);
        driver.erase_binary(self, offset, count)
    }

    /// Read up to `buf.len()` bytes starting at `offset`, auto-chunking
    /// into `APDU_CHOP_SIZE`-sized driver calls when the transfer is large
    /// and the card does not advertise extended-APDU support.
    pub fn read_binary(&mut self, offset: u32, buf: &mut [u8], flags: u32) -> Result<usize, ScError> {
        if buf.len() > APDU_CHOP_SIZE && !self.capabilities.contains(Capabilities::APDU_EXT) {
            // A `CardGuard` borrows `self.lock_mgr` for its whole scope, which
            // would conflict with the `&mut self` reborrows the driver calls
            // below need. Go through `lock_mgr` directly instead: each
            // `lock()`/`unlock()` call only borrows `self.lock_mgr` for the
            // duration of that one call, so the loop is free to reborrow
            // `self` mutably while the physical lock stays held throughout.
            self.lock_mgr.lock()?;
            let mut off = offset;
            let mut pos = 0usize;
            let mut remaining = buf.len();
            while remaining > 0 {
                let n = remaining.min(APDU_CHOP_SIZE);
                let driver = Arc::clone(&self.driver);
                let r = match driver.read_binary(self, off, &mut buf[pos..pos + n], flags) {
                    Ok(r) => r,
                    Err(e) => {
                        self.lock_mgr.unlock();
                        return Err(e);
                    }
                };
                if r == 0 {
                    break;
                }
                pos += r;
                off += r as u32;
                remaining -= r;
            }
            self.lock_mgr.unlock();
            Ok(pos)
        } else {
            let driver = Arc::clone(&self.driver);
            driver.read_binary(self, offset, buf, flags)
        }
    }

    /// Write `buf` starting at `offset`, auto-chunking like `read_binary`.
    pub fn write_binary(&mut self, offset: u32, buf: &[u8], flags: u32) -> Result<usize, ScError> {
        if buf.len() > APDU_CHOP_SIZE && !self.capabilities.contains(Capabilities::APDU_EXT) {
            // See the comment in `read_binary`: lock through `lock_mgr`
            // directly rather than holding a `CardGuard` across `&mut self`
            // driver reborrows.
            self.lock_mgr.lock()?;
            let mut off = offset;
            let mut pos = 0usize;
            let mut remaining = buf.len();
            while remaining > 0 {
                let n = remaining.min(APDU_CHOP_SIZE);
                let driver = Arc::clone(&self.driver);
                let r = match driver.write_binary(self, off, &buf[pos..pos + n], flags) {
                    Ok(r) => r,
                    Err(e) => {
                        self.lock_mgr.unlock();
                        return Err(e);
                    }
                };
                if r == 0 {
                    break;
                }
                pos += r;
                off += r as u32;
                remaining -= r;
            }
            self.lock_mgr.unlock();
            Ok(pos)
        } else {
            let driver = Arc::clone(&self.driver);
            driver.write_binary(self, offset, buf, flags)
        }
    }

    /// Update (overwrite) `buf` starting at `offset`, auto-chunking like
    /// `read_binary`.
    pub fn update_binary(&mut self, offset: u32, buf: &[u8], flags: u32) -> Result<usize, ScError> {
        if buf.len() > APDU_CHOP_SIZE && !self.capabilities.contains(Capabilities::APDU_EXT) {
            // See the comment in `read_binary`: lock through `lock_mgr`
            // directly rather than holding a `CardGuard` across `&mut self`
            // driver reborrows.
            self.lock_mgr.lock()?;
            let mut off = offset;
            let mut pos = 0usize;
            let mut remaining = buf.len();
            while remaining > 0 {
                let n = remaining.min(APDU_CHOP_SIZE);
                let driver = Arc::clone(&self.driver);
                let r = match driver.update_binary(self, off, &buf[pos..pos + n], flags) {
                    Ok(r) => r,
                    Err(e) => {
                        self.lock_mgr.unlock();
                        return Err(e);
                    }
                };
                if r == 0 {
                    break;
                }
                pos += r;
                off += r as u32;
                remaining -= r;
            }
            self.lock_mgr.unlock();
            Ok(pos)
        } else {
            let driver = Arc::clone(&self.driver);
            driver.update_binary(self, offset, buf, flags)
        }
    }
}

fn trace_exchange(apdu: &Apdu) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    log::trace!(
        "APDU {:02X} {:02X} {:02X} {:02X}, {} data bytes -> SW={:02X}{:02X}, {} resp bytes: {}",
        apdu.cla,
        apdu.ins,
        apdu.p1,
        apdu.p2,
        apdu.data.len(),
        apdu.sw1,
        apdu.sw2,
        apdu.resp.len(),
        hex_dump(&apdu.resp),
    );
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}
