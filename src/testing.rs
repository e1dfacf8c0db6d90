//! In-memory stand-ins for [`ReaderTransport`] and [`CardDriver`], used by
//! this crate's own unit tests and exported (behind the `testing` feature)
//! so the integration tests under `tests/` can exercise the full stack
//! without real hardware.
//!
//! These mocks are first-class rather than an afterthought: every scenario
//! in the test suite runs the same way in CI as on a laptop with no reader
//! or card attached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::card::Card;
use crate::driver::CardDriver;
use crate::error::ScError;
use crate::file::FileInfo;
use crate::path::Path;
use crate::transport::{DisconnectAction, ReaderTransport, SlotId};

/// An in-memory [`ReaderTransport`] whose `transmit` replies are scripted in
/// advance via [`MockReader::with_response`], one queued reply per call.
pub struct MockReader {
    atr: Vec<u8>,
    fail_connect: bool,
    fail_lock: bool,
    responses: Mutex<VecDeque<Vec<u8>>>,
    last_sent: Mutex<Vec<u8>>,
    lock_calls: AtomicUsize,
    unlock_calls: AtomicUsize,
    transmit_calls: AtomicUsize,
}

impl MockReader {
    /// A reader with no ATR and no scripted responses.
    pub fn new() -> Self {
        MockReader {
            atr: Vec::new(),
            fail_connect: false,
            fail_lock: false,
            responses: Mutex::new(VecDeque::new()),
            last_sent: Mutex::new(Vec::new()),
            lock_calls: AtomicUsize::new(0),
            unlock_calls: AtomicUsize::new(0),
            transmit_calls: AtomicUsize::new(0),
        }
    }

    /// Set the ATR returned by [`ReaderTransport::atr`].
    pub fn with_atr(self, atr: Vec<u8>) -> Self {
        MockReader { atr, ..self }
    }

    /// Queue a wire-format reply (response body followed by SW1/SW2) to be
    /// returned by the next [`ReaderTransport::transmit`] call.
    pub fn with_response(self, bytes: Vec<u8>) -> Self {
        self.responses.lock().unwrap().push_back(bytes);
        self
    }

    /// Make `connect` fail.
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make `lock` fail (and not increment `lock_calls`).
    pub fn fail_lock(mut self) -> Self {
        self.fail_lock = true;
        self
    }

    /// The send buffer from the most recent `transmit` call.
    pub fn last_sent(&self) -> Vec<u8> {
        self.last_sent.lock().unwrap().clone()
    }

    /// Number of times the reader's physical lock was taken.
    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    /// Number of times the reader's physical lock was released.
    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    /// Number of `transmit` calls observed so far.
    pub fn transmit_calls(&self) -> usize {
        self.transmit_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderTransport for MockReader {
    fn connect(&self, _slot: SlotId) -> Result<(), ScError> {
        if self.fail_connect {
            return Err(ScError::invalid("mock reader: connect failed"));
        }
        Ok(())
    }

    fn disconnect(&self, _slot: SlotId, _action: DisconnectAction) -> Result<(), ScError> {
        Ok(())
    }

    fn atr(&self, _slot: SlotId) -> Result<Vec<u8>, ScError> {
        Ok(self.atr.clone())
    }

    fn transmit(&self, _slot: SlotId, send: &[u8], recv: &mut [u8]) -> Result<usize, ScError> {
        self.transmit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sent.lock().unwrap() = send.to_vec();

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ScError::invalid("mock reader: no response queued"))?;

        let n = response.len().min(recv.len());
        recv[..n].copy_from_slice(&response[..n]);
        Ok(n)
    }

    fn lock(&self, _slot: SlotId) -> Result<(), ScError> {
        if self.fail_lock {
            return Err(ScError::invalid("mock reader: lock failed"));
        }
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unlock(&self, _slot: SlotId) -> Result<(), ScError> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An in-memory [`CardDriver`] whose ATR match, `init` outcome, and
/// `read_binary`/`write_binary`/`update_binary`/`select_file` results are
/// scripted via its builder methods.
pub struct MockDriver {
    name: String,
    matches: bool,
    init_invalid: bool,
    finish_calls: AtomicUsize,
    select_file_calls: AtomicUsize,
    select_file_result: Mutex<Option<FileInfo>>,
    binary_chunks: Mutex<VecDeque<usize>>,
    binary_request_lens: Mutex<Vec<usize>>,
}

impl MockDriver {
    /// A driver named `name` that matches no ATR and succeeds at `init`.
    pub fn new(name: &str) -> Self {
        MockDriver {
            name: name.to_string(),
            matches: false,
            init_invalid: false,
            finish_calls: AtomicUsize::new(0),
            select_file_calls: AtomicUsize::new(0),
            select_file_result: Mutex::new(None),
            binary_chunks: Mutex::new(VecDeque::new()),
            binary_request_lens: Mutex::new(Vec::new()),
        }
    }

    /// Set whether `match_card` reports a match.
    pub fn matching(mut self, matches: bool) -> Self {
        self.matches = matches;
        self
    }

    /// Make `init` return [`ScError::InvalidCard`] ("not my card").
    pub fn init_invalid(mut self) -> Self {
        self.init_invalid = true;
        self
    }

    /// Script the `FileInfo` `select_file` returns on success.
    pub fn selecting(self, file: FileInfo) -> Self {
        *self.select_file_result.lock().unwrap() = Some(file);
        self
    }

    /// Script the byte counts successive `read_binary`/`write_binary`/
    /// `update_binary` calls report transferring, e.g. `[240, 240, 32]` for
    /// a 512-byte transfer chunked at 240 bytes.
    pub fn returning_chunks(self, chunks: Vec<usize>) -> Self {
        *self.binary_chunks.lock().unwrap() = chunks.into_iter().collect();
        self
    }

    /// Was `finish` invoked during disconnect?
    pub fn finish_called(&self) -> bool {
        self.finish_calls.load(Ordering::SeqCst) > 0
    }

    /// How many times `select_file` was dispatched to this driver.
    pub fn select_file_calls(&self) -> usize {
        self.select_file_calls.load(Ordering::SeqCst)
    }

    /// The requested buffer length of every `read_binary`/`write_binary`/
    /// `update_binary` call so far, in order.
    pub fn binary_request_lens(&self) -> Vec<usize> {
        self.binary_request_lens.lock().unwrap().clone()
    }

    fn next_chunk(&self, requested: usize) -> usize {
        self.binary_request_lens.lock().unwrap().push(requested);
        self.binary_chunks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(0)
            .min(requested)
    }
}

impl CardDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_card(&self, _atr: &[u8]) -> bool {
        self.matches
    }

    fn init(&self, _card: &mut Card) -> Result<(), ScError> {
        if self.init_invalid {
            Err(ScError::InvalidCard)
        } else {
            Ok(())
        }
    }

    fn finish(&self, _card: &mut Card) -> Result<(), ScError> {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn select_file(&self, card: &mut Card, _path: &Path) -> Result<FileInfo, ScError> {
        self.select_file_calls.fetch_add(1, Ordering::SeqCst);
        let mut select_apdu = crate::apdu::Apdu::case1(0x00, 0xA4, 0x00, 0x0C);
        card.transmit(&mut select_apdu)?;

        self.select_file_result
            .lock()
            .unwrap()
            .clone()
            .ok_or(ScError::NotSupported)
    }

    fn read_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        buf: &mut [u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        let n = self.next_chunk(buf.len());
        buf[..n].iter_mut().for_each(|b| *b = 0xAB);
        Ok(n)
    }

    fn write_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        buf: &[u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Ok(self.next_chunk(buf.len()))
    }

    fn update_binary(
        &self,
        _card: &mut Card,
        _offset: u32,
        buf: &[u8],
        _flags: u32,
    ) -> Result<usize, ScError> {
        Ok(self.next_chunk(buf.len()))
    }
}
