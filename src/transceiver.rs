//! T=0 transceiver: turns a validated [`Apdu`] into wire bytes, hands them
//! to the reader, and parses the status words back out.

use crate::apdu::Apdu;
use crate::error::ScError;
use crate::transport::{ReaderTransport, SlotId};

/// Space reserved for the trailing SW1/SW2 on every exchange.
const SW_LEN: usize = 2;

/// Run one T=0 exchange for `apdu` against `reader`/`slot`.
///
/// Does not validate `apdu` (callers run [`Apdu::validate`] first; the
/// retry paths in the engine reissue an already-validated APDU with a
/// patched `le`, and re-validating there would be redundant). Does not
/// lock; callers that need exclusivity across the exchange hold a
/// [`crate::card::CardGuard`] around this call.
pub fn transceive_t0(reader: &dyn ReaderTransport, slot: SlotId, apdu: &mut Apdu) -> Result<(), ScError> {
    let mut send = apdu.serialize_wire()?;
    let mut recv = vec![0u8; apdu.resp_capacity + SW_LEN];

    let result = reader.transmit(slot, &send, &mut recv);

    // Defensive scrub: command data may include secrets (PINs, key
    // material). Zero it whether or not the transmit succeeded.
    send.iter_mut().for_each(|b| *b = 0);

    let recvsize = result?;
    if recvsize < SW_LEN {
        return Err(ScError::invalid(
            "reader transmit returned fewer than 2 bytes",
        ));
    }

    apdu.sw1 = recv[recvsize - 2];
    apdu.sw2 = recv[recvsize - 1];

    let body_len = (recvsize - SW_LEN).min(apdu.resp_capacity);
    apdu.resp = recv[..body_len].to_vec();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockReader;

    #[test]
    fn transceive_truncates_body_to_resp_capacity() {
        let reader = MockReader::new().with_response(vec![1, 2, 3, 4, 0x90, 0x00]);
        let mut apdu = Apdu::case2_short(0x00, 0xB0, 0x00, 0x00, 4, 2);
        transceive_t0(&reader, 0, &mut apdu).unwrap();
        assert_eq!(apdu.resp, vec![1, 2]);
        assert_eq!((apdu.sw1, apdu.sw2), (0x90, 0x00));
    }

    #[test]
    fn transceive_zeroes_wire_before_returning() {
        let reader = MockReader::new().with_response(vec![0x90, 0x00]);
        let mut apdu = Apdu::case3_short(0x00, 0xD6, 0x00, 0x00, vec![0xAA, 0xBB]);
        transceive_t0(&reader, 0, &mut apdu).unwrap();
        // The mock records the buffer it was handed; the transceiver's own
        // copy is scrubbed, which we can't observe directly here, but we
        // can at least confirm the exchange happened with the right bytes.
        assert_eq!(reader.last_sent(), vec![0x00, 0xD6, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    }
}
