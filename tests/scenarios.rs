//! End-to-end scenarios driven against the in-memory
//! `testing::MockReader`/`testing::MockDriver` pair rather than real
//! hardware.

use std::sync::Arc;

use scard_core::apdu::Apdu;
use scard_core::card::Capabilities;
use scard_core::context::Context;
use scard_core::error::ScError;
use scard_core::file::FileInfo;
use scard_core::path::Path;
use scard_core::testing::{MockDriver, MockReader};
use scard_core::transport::{DisconnectAction, ReaderTransport};

fn connected(
    reader: Arc<MockReader>,
    driver: Arc<MockDriver>,
) -> scard_core::card::Card {
    let mut ctx = Context::new();
    ctx.register_driver(Arc::clone(&driver));
    let reader_dyn: Arc<dyn ReaderTransport> = reader;
    ctx.connect(reader_dyn, 0).unwrap()
}

/// Select MF, then read 512 bytes chunked 240/240/32.
#[test]
fn select_mf_then_chunked_read_512_bytes() {
    let reader = Arc::new(
        MockReader::new()
            .with_atr(vec![0x3B, 0x00])
            .with_response(vec![0x90, 0x00]), // SELECT's own transmit
    );
    let driver = Arc::new(
        MockDriver::new("mock")
            .matching(true)
            .selecting(FileInfo::transparent(512))
            .returning_chunks(vec![240, 240, 32]),
    );

    let mut card = connected(Arc::clone(&reader), Arc::clone(&driver));

    let path = Path::full(&[[0x3F, 0x00]]);
    let file = card.select_file(&path).unwrap();
    assert_eq!(file.path, path);

    let mut buf = vec![0u8; 512];
    let n = card.read_binary(0, &mut buf, 0).unwrap();

    assert_eq!(n, 512);
    assert_eq!(driver.binary_request_lens(), vec![240, 240, 32]);
    // One lock for the select's internal transmit, one spanning the three
    // chunked read APDUs.
    assert_eq!(reader.lock_calls(), 2);
}

/// SW1=6Cxx retry: a 6C response with no body re-issues with Le := SW2.
#[test]
fn sw_6c_triggers_le_retry() {
    let reader = Arc::new(
        MockReader::new()
            .with_atr(vec![0x3B, 0x00])
            .with_response(vec![0x6C, 0x7A])
            .with_response({
                let mut body = vec![0xEE; 0x7A];
                body.extend_from_slice(&[0x90, 0x00]);
                body
            }),
    );
    let driver = Arc::new(MockDriver::new("mock").matching(true));
    let card = connected(Arc::clone(&reader), driver);

    let mut apdu = Apdu::case2_short(0x00, 0xC0, 0x00, 0x00, 256, 256);
    card.transmit(&mut apdu).unwrap();

    assert_eq!(reader.transmit_calls(), 2);
    assert_eq!(apdu.resp.len(), 0x7A);
    assert_eq!((apdu.sw1, apdu.sw2), (0x90, 0x00));
}

/// SW1=61xx follow-up: GET RESPONSE is issued and its body/status
/// replace the caller's.
#[test]
fn sw_61_triggers_get_response() {
    let reader = Arc::new(
        MockReader::new()
            .with_atr(vec![0x3B, 0x00])
            .with_response(vec![0x61, 0x20])
            .with_response({
                let mut body = vec![0xCC; 0x20];
                body.extend_from_slice(&[0x90, 0x00]);
                body
            }),
    );
    let driver = Arc::new(MockDriver::new("mock").matching(true));
    let card = connected(Arc::clone(&reader), driver);

    let mut apdu = Apdu::case2_short(0x00, 0xB0, 0x00, 0x00, 128, 128);
    card.transmit(&mut apdu).unwrap();

    assert_eq!(apdu.resp.len(), 0x20);
    assert_eq!((apdu.sw1, apdu.sw2), (0x90, 0x00));
    assert_eq!(reader.last_sent(), vec![0x00, 0xC0, 0x00, 0x00, 0x20]);
}

/// SW1=61xx with no response requested: synthesizes 90 00, no GET
/// RESPONSE is issued.
#[test]
fn sw_61_with_no_response_requested_synthesizes_success() {
    let reader = Arc::new(
        MockReader::new()
            .with_atr(vec![0x3B, 0x00])
            .with_response(vec![0x61, 0x20]),
    );
    let driver = Arc::new(MockDriver::new("mock").matching(true));
    let card = connected(Arc::clone(&reader), driver);

    let mut apdu = Apdu::case1(0x00, 0x00, 0x00, 0x00);
    card.transmit(&mut apdu).unwrap();

    assert_eq!(reader.transmit_calls(), 1);
    assert_eq!((apdu.sw1, apdu.sw2), (0x90, 0x00));
}

/// Driver probe with one reject: the rejecting driver's `finish` is
/// never invoked at disconnect.
#[test]
fn driver_probe_skips_rejecting_driver_and_spares_its_finish() {
    let reader = Arc::new(MockReader::new().with_atr(vec![0x3B, 0x00]));
    let driver_a = Arc::new(MockDriver::new("a").matching(true).init_invalid());
    let driver_b = Arc::new(MockDriver::new("b").matching(true));

    let mut ctx = Context::new();
    ctx.register_driver(Arc::clone(&driver_a));
    ctx.register_driver(Arc::clone(&driver_b));
    let reader_dyn: Arc<dyn ReaderTransport> = reader;
    let card = ctx.connect(reader_dyn, 0).unwrap();

    assert_eq!(card.driver_name(), "b");

    ctx.disconnect(card, DisconnectAction::Leave).unwrap();
    assert!(!driver_a.finish_called());
    assert!(driver_b.finish_called());
}

/// Malformed path: `3F 00` not at position 0 fails validation before the
/// driver is ever invoked.
#[test]
fn malformed_path_rejected_without_invoking_driver() {
    let reader = Arc::new(MockReader::new().with_atr(vec![0x3B, 0x00]));
    let driver = Arc::new(MockDriver::new("mock").matching(true));
    let mut card = connected(Arc::clone(&reader), Arc::clone(&driver));

    let path = Path::full(&[[0x3F, 0x00], [0x3F, 0x00]]);
    let result = card.select_file(&path);

    assert!(matches!(result, Err(ScError::InvalidArguments(_))));
    assert_eq!(driver.select_file_calls(), 0);
}

/// A card that advertises extended-APDU support is never chunked, even for
/// transfers above the chop size.
#[test]
fn extended_apdu_capability_skips_chunking() {
    let reader = Arc::new(MockReader::new().with_atr(vec![0x3B, 0x00]));
    let driver = Arc::new(
        MockDriver::new("mock")
            .matching(true)
            .returning_chunks(vec![512]),
    );
    let mut card = connected(Arc::clone(&reader), Arc::clone(&driver));
    card.set_capabilities(Capabilities::APDU_EXT);

    let mut buf = vec![0u8; 512];
    let n = card.read_binary(0, &mut buf, 0).unwrap();

    assert_eq!(n, 512);
    assert_eq!(driver.binary_request_lens(), vec![512]);
}
