//! APDU request/response model and the case-based validator.
//!
//! See [wikipedia](https://en.wikipedia.org/wiki/Smart_card_application_protocol_data_unit)
//! for a primer on the wire format this models.

use crate::error::ScError;

/// The ISO/IEC 7816-4 "case" of an APDU: whether it carries command data,
/// expects a response, both, or neither.
///
/// The extended variants are reserved: the validator always rejects them,
/// leaving room for a future extended-length implementation without
/// changing this enum's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduCase {
    /// No command data, no response.
    Case1,
    /// No command data, response of `Le` bytes.
    Case2Short,
    /// Command data of `Lc` bytes, no response.
    Case3Short,
    /// Command data of `Lc` bytes, response of `Le` bytes.
    Case4Short,
    /// Reserved: extended case 2. Currently always rejected by `validate`.
    Case2Extended,
    /// Reserved: extended case 3. Currently always rejected by `validate`.
    Case3Extended,
    /// Reserved: extended case 4. Currently always rejected by `validate`.
    Case4Extended,
}

/// An APDU command/response pair.
///
/// `le` is `None` for cases that expect no response (1, 3S); `Some(n)` with
/// `n` in `1..=256` for cases that do (2S, 4S). `resp_capacity` is the
/// caller-supplied response buffer size, checked against `le` by
/// [`Apdu::validate`]. After a successful exchange, `resp` holds the actual
/// response body (length `<= resp_capacity`) and `sw1`/`sw2` hold the
/// trailing status words.
#[derive(Debug, Clone)]
pub struct Apdu {
    /// Instruction class.
    pub cla: u8,
    /// Instruction code.
    pub ins: u8,
    /// Instruction parameter 1.
    pub p1: u8,
    /// Instruction parameter 2.
    pub p2: u8,
    /// The APDU case, fixing which of `data`/`le` are meaningful.
    pub case: ApduCase,
    /// Command data (`Lc` is implicitly `data.len()`).
    pub data: Vec<u8>,
    /// Requested response length, where `Some(256)` is wire-encoded as `0x00`.
    pub le: Option<u16>,
    /// Capacity of the response buffer the caller is prepared to receive.
    pub resp_capacity: usize,
    /// Response body, populated after a successful exchange.
    pub resp: Vec<u8>,
    /// First status-word byte, populated after a successful exchange.
    pub sw1: u8,
    /// Second status-word byte, populated after a successful exchange.
    pub sw2: u8,
}

impl Apdu {
    /// Build a case 1 APDU (no data, no response).
    pub fn case1(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self::new(cla, ins, p1, p2, ApduCase::Case1, Vec::new(), None, 0)
    }

    /// Build a case 2S APDU (no data, `le` bytes of response expected).
    pub fn case2_short(cla: u8, ins: u8, p1: u8, p2: u8, le: u16, resp_capacity: usize) -> Self {
        Self::new(
            cla,
            ins,
            p1,
            p2,
            ApduCase::Case2Short,
            Vec::new(),
            Some(le),
            resp_capacity,
        )
    }

    /// Build a case 3S APDU (command data, no response).
    pub fn case3_short(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self::new(cla, ins, p1, p2, ApduCase::Case3Short, data, None, 0)
    }

    /// Build a case 4S APDU (command data, `le` bytes of response expected).
    pub fn case4_short(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
        le: u16,
        resp_capacity: usize,
    ) -> Self {
        Self::new(
            cla,
            ins,
            p1,
            p2,
            ApduCase::Case4Short,
            data,
            Some(le),
            resp_capacity,
        )
    }

    fn new(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        case: ApduCase,
        data: Vec<u8>,
        le: Option<u16>,
        resp_capacity: usize,
    ) -> Self {
        Apdu {
            cla,
            ins,
            p1,
            p2,
            case,
            data,
            le,
            resp_capacity,
            resp: Vec::new(),
            sw1: 0,
            sw2: 0,
        }
    }

    /// Command data length, `Lc`. Always `<= 256`; enforced by `validate`.
    pub fn lc(&self) -> usize {
        self.data.len()
    }

    /// Reject the APDU before any wire activity. Pure: no mutation, no I/O.
    pub fn validate(&self) -> Result<(), ScError> {
        if self.lc() > 256 {
            return Err(ScError::invalid("Lc exceeds 256 bytes"));
        }
        if let Some(le) = self.le {
            if le as usize > 256 {
                return Err(ScError::invalid("Le exceeds 256"));
            }
        }
        match self.case {
            ApduCase::Case1 => {
                if !self.data.is_empty() {
                    return Err(ScError::invalid("case 1 APDU with data supplied"));
                }
            }
            ApduCase::Case2Short => {
                if !self.data.is_empty() {
                    return Err(ScError::invalid("case 2 APDU with data supplied"));
                }
                match self.le {
                    None | Some(0) => {
                        return Err(ScError::invalid("case 2 APDU with no response expected"))
                    }
                    Some(le) if self.resp_capacity < le as usize => {
                        return Err(ScError::invalid("response buffer size < Le"))
                    }
                    _ => {}
                }
            }
            ApduCase::Case3Short => {
                if self.data.is_empty() {
                    return Err(ScError::invalid("case 3 APDU with no data supplied"));
                }
            }
            ApduCase::Case4Short => {
                if self.data.is_empty() {
                    return Err(ScError::invalid("case 4 APDU with no data supplied"));
                }
                match self.le {
                    None | Some(0) => {
                        return Err(ScError::invalid("case 4 APDU with no response expected"))
                    }
                    Some(le) if self.resp_capacity < le as usize => {
                        return Err(ScError::invalid("Le > response buffer size"))
                    }
                    _ => {}
                }
            }
            ApduCase::Case2Extended | ApduCase::Case3Extended | ApduCase::Case4Extended => {
                return Err(ScError::invalid("extended APDU cases are not supported"));
            }
        }
        Ok(())
    }

    /// Serialize the header and any case-specific trailer to wire bytes.
    /// Does not validate; callers run [`Apdu::validate`] first.
    pub fn serialize_wire(&self) -> Result<Vec<u8>, ScError> {
        let mut out = Vec::with_capacity(self.wire_len_hint());
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);
        match self.case {
            ApduCase::Case1 => {}
            ApduCase::Case2Short => {
                let le = self.le.unwrap_or(0);
                out.push(if le == 256 { 0x00 } else { le as u8 });
            }
            ApduCase::Case3Short => {
                if self.data.len() != self.lc() {
                    return Err(ScError::invalid("datalen does not match Lc"));
                }
                out.push(encode_length(self.lc()));
                out.extend_from_slice(&self.data);
            }
            ApduCase::Case4Short => {
                if self.data.len() != self.lc() {
                    return Err(ScError::invalid("datalen does not match Lc"));
                }
                out.push(encode_length(self.lc()));
                out.extend_from_slice(&self.data);
                let le = self.le.unwrap_or(0);
                out.push(if le == 256 { 0x00 } else { le as u8 });
            }
            ApduCase::Case2Extended | ApduCase::Case3Extended | ApduCase::Case4Extended => {
                return Err(ScError::invalid("extended APDU cases are not supported"));
            }
        }
        Ok(out)
    }

    fn wire_len_hint(&self) -> usize {
        4 + self.data.len() + 2
    }
}

/// `256` wire-encodes as `0x00` in the one-byte short-form length field.
fn encode_length(len: usize) -> u8 {
    if len == 256 {
        0
    } else {
        len as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case3_serializes_header_length_and_data() {
        let data = vec![0, 0, 0, 1, 0, 0, 0, 1];
        let apdu = Apdu::case3_short(0x56, 0x01, 0x00, 0x00, data.clone());
        let wire = apdu.serialize_wire().unwrap();
        assert_eq!(wire[4], data.len() as u8);
        assert_eq!(&wire[5..5 + data.len()], &data[..]);
    }

    #[test]
    fn case4_serializes_le_trailer() {
        let data = vec![1, 2, 3];
        let apdu = Apdu::case4_short(0x00, 0xA4, 0x04, 0x00, data, 0x10, 16);
        let wire = apdu.serialize_wire().unwrap();
        assert_eq!(*wire.last().unwrap(), 0x10);
    }

    #[test]
    fn le_256_encodes_as_zero() {
        let apdu = Apdu::case2_short(0x00, 0xC0, 0x00, 0x00, 256, 256);
        let wire = apdu.serialize_wire().unwrap();
        assert_eq!(*wire.last().unwrap(), 0x00);
    }

    #[test]
    fn case2_with_le_zero_is_rejected() {
        let apdu = Apdu::case2_short(0x00, 0xC0, 0x00, 0x00, 0, 0);
        assert!(matches!(
            apdu.validate(),
            Err(ScError::InvalidArguments(_))
        ));
    }

    #[test]
    fn resp_capacity_below_le_is_rejected() {
        let apdu = Apdu::case2_short(0x00, 0xC0, 0x00, 0x00, 10, 4);
        assert!(matches!(
            apdu.validate(),
            Err(ScError::InvalidArguments(_))
        ));
    }

    #[test]
    fn case1_with_data_is_rejected() {
        let mut apdu = Apdu::case1(0x00, 0xA4, 0x00, 0x00);
        apdu.data = vec![1];
        assert!(matches!(
            apdu.validate(),
            Err(ScError::InvalidArguments(_))
        ));
    }

    #[test]
    fn extended_cases_are_rejected() {
        let apdu = Apdu::new(0, 0, 0, 0, ApduCase::Case2Extended, Vec::new(), Some(1), 1);
        assert!(matches!(
            apdu.validate(),
            Err(ScError::InvalidArguments(_))
        ));
    }

    #[test]
    fn lc_256_encodes_as_zero_byte() {
        let data = vec![0u8; 256];
        let apdu = Apdu::case3_short(0x00, 0xD6, 0x00, 0x00, data);
        let wire = apdu.serialize_wire().unwrap();
        assert_eq!(wire[4], 0x00);
        assert_eq!(wire.len(), 4 + 1 + 256);
    }
}
