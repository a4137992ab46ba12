//! Response builders for the simulated module

use gmlan::gmlan::{positive_response, service_id};
use gmlan::NegativeResponseCode;

/// Positive response: service + 0x40, then `data`
pub fn positive(service: u8, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + data.len());
    response.push(positive_response(service));
    response.extend_from_slice(data);
    response
}

/// Negative response: `7F <service> <code>`
pub fn negative(service: u8, code: NegativeResponseCode) -> Vec<u8> {
    negative_raw(service, code.into())
}

pub fn negative_raw(service: u8, code: u8) -> Vec<u8> {
    vec![service_id::NEGATIVE_RESPONSE, service, code]
}

/// Response-pending frame sent ahead of a slow answer
pub fn response_pending(service: u8) -> Vec<u8> {
    negative(service, NegativeResponseCode::ResponsePending)
}

/// Big-endian integer from up to four bytes
pub fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}
