//! GMLAN service layer for diagnostic communication

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::dtc::{parse_failure_records, FailureRecord};
use super::{
    failure_record_sub_function, positive_response, programming_mode, service_id,
    transfer_sub_function, KeyError, ProgrammedState, ServiceError,
};
use crate::ecu::EcuFamily;
use crate::events::EventCategory;
use crate::isotp::{IsoTpEngine, TransferBuffers, MAX_MESSAGE_LEN};
use crate::protocol::{DiagnosticProtocol, ProtocolVariant};
use crate::transport::FrameTransport;

/// Longest key accepted from a key-derivation function
pub const MAX_KEY_LENGTH: usize = 64;

/// Width of an address or size field on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    Bits16,
    Bits24,
    Bits32,
}

impl FieldWidth {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            16 => Some(FieldWidth::Bits16),
            24 => Some(FieldWidth::Bits24),
            32 => Some(FieldWidth::Bits32),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            FieldWidth::Bits16 => 16,
            FieldWidth::Bits24 => 24,
            FieldWidth::Bits32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    pub fn max_value(self) -> u32 {
        match self {
            FieldWidth::Bits16 => 0xFFFF,
            FieldWidth::Bits24 => 0x00FF_FFFF,
            FieldWidth::Bits32 => u32::MAX,
        }
    }

    /// Big-endian encoding, `None` if `value` does not fit
    pub fn encode(self, value: u32) -> Option<Vec<u8>> {
        if value > self.max_value() {
            return None;
        }
        Some(value.to_be_bytes()[4 - self.bytes()..].to_vec())
    }
}

/// Computes the key answering a security-access seed
///
/// The algorithm is ECU-variant specific and lives outside this crate.
pub trait KeyDerivation {
    fn derive_key(&self, seed: &[u8], variant: EcuFamily, level: u8, mode: u8) -> Option<Vec<u8>>;
}

impl<F> KeyDerivation for F
where
    F: Fn(&[u8], EcuFamily, u8, u8) -> Option<Vec<u8>>,
{
    fn derive_key(&self, seed: &[u8], variant: EcuFamily, level: u8, mode: u8) -> Option<Vec<u8>> {
        self(seed, variant, level, mode)
    }
}

/// A key known ahead of time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedKey(pub Vec<u8>);

impl KeyDerivation for FixedKey {
    fn derive_key(&self, _seed: &[u8], _variant: EcuFamily, _level: u8, _mode: u8) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

/// Result of a successful security access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityOutcome {
    /// All-zero seed: the level was already unlocked, no key was sent
    AlreadyUnlocked,
    /// Key accepted
    Unlocked,
}

/// Per-session service parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Bytes per ReadMemoryByAddress block
    pub read_block_size: u16,
    /// Bytes per TransferData block
    pub transfer_block_size: u16,
    /// Address width for memory reads and TransferData
    pub address_width: FieldWidth,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            read_block_size: 0x80,
            transfer_block_size: 0xF0,
            address_width: FieldWidth::Bits32,
        }
    }
}

/// One diagnostic session against one ECU
///
/// Owns the engine and its transfer buffers, so only one request can be in
/// flight. Calls must be serialized by the caller.
pub struct GmlanSession<T: FrameTransport> {
    engine: IsoTpEngine<T>,
    buffers: TransferBuffers,
    protocol: ProtocolVariant,
    options: ServiceOptions,
}

impl<T: FrameTransport> GmlanSession<T> {
    pub fn new(engine: IsoTpEngine<T>, protocol: ProtocolVariant, options: ServiceOptions) -> Self {
        Self {
            engine,
            buffers: TransferBuffers::new(),
            protocol,
            options,
        }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        self.protocol
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn engine_mut(&mut self) -> &mut IsoTpEngine<T> {
        &mut self.engine
    }

    pub(crate) fn emit(&self, category: EventCategory, message: &str) {
        self.engine.sink().emit(message, category);
    }

    /// Emit one event for a failed service call
    ///
    /// Transfer failures were already reported by the engine.
    pub(crate) fn finish<R>(
        &self,
        category: EventCategory,
        what: &str,
        result: Result<R, ServiceError>,
    ) -> Result<R, ServiceError> {
        if let Err(e) = &result {
            warn!(service = what, error = %e, "Service failed");
            if !matches!(e, ServiceError::Transfer(_)) {
                self.emit(category, &format!("{} failed: {}", what, e));
            }
        }
        result
    }

    /// Send a request and return the validated positive response
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let len = self.buffers.load(request);
        let received = self
            .protocol
            .transfer_frame(&mut self.engine, &mut self.buffers, len)?;
        let response = self.buffers.received(received).to_vec();
        self.check_response(request[0], response)
    }

    /// Send a request the target should not answer
    fn exchange_silent(&mut self, request: &[u8], category: EventCategory) -> Result<(), ServiceError> {
        let len = self.buffers.load(request);
        let received = self
            .protocol
            .transfer_silent(&mut self.engine, &mut self.buffers, len)?;
        match received {
            None => Ok(()),
            Some(received) => {
                let response = self.buffers.received(received).to_vec();
                self.check_response(request[0], response)?;
                warn!(service = request[0], "Unexpected positive response to a no-response request");
                self.emit(
                    category,
                    &format!(
                        "Unexpected positive response to service 0x{:02X}, continuing",
                        request[0]
                    ),
                );
                Ok(())
            }
        }
    }

    fn check_response(&self, service: u8, response: Vec<u8>) -> Result<Vec<u8>, ServiceError> {
        let expected = positive_response(service);
        match response.first() {
            Some(&service_id::NEGATIVE_RESPONSE) => {
                if response.len() < 3 {
                    return Err(ServiceError::InvalidResponse(
                        "Negative response too short".to_string(),
                    ));
                }
                if response[1] != service {
                    return Err(ServiceError::echo(
                        service,
                        &[service_id::NEGATIVE_RESPONSE, service],
                        &response[..2],
                    ));
                }
                let code = response[2];
                Err(ServiceError::NegativeResponse {
                    service: response[1],
                    code,
                    description: self.protocol.translate_error_code(code),
                })
            }
            Some(&b) if b == expected => Ok(response),
            Some(&b) => Err(ServiceError::echo(service, &[expected], &[b])),
            None => Err(ServiceError::InvalidResponse("Empty response".to_string())),
        }
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// ReadDataByIdentifier (0x1A), raw payload
    pub fn read_identifier(&mut self, id: u8) -> Result<Vec<u8>, ServiceError> {
        let result = self.read_identifier_inner(id);
        self.finish(EventCategory::QueryingEcuTypeInfo, "ReadDataByIdentifier", result)
    }

    pub(crate) fn read_identifier_inner(&mut self, id: u8) -> Result<Vec<u8>, ServiceError> {
        let response = self.exchange(&[service_id::READ_DATA_BY_IDENTIFIER, id])?;
        if response.get(1) != Some(&id) {
            return Err(ServiceError::echo(
                service_id::READ_DATA_BY_IDENTIFIER,
                &[positive_response(service_id::READ_DATA_BY_IDENTIFIER), id],
                &response,
            ));
        }
        Ok(response[2..].to_vec())
    }

    /// ReadDataByIdentifier (0x1A) decoded as text
    ///
    /// `Ok(None)` when the payload is not valid UTF-8.
    pub fn read_identifier_text(&mut self, id: u8) -> Result<Option<String>, ServiceError> {
        let raw = self.read_identifier(id)?;
        Ok(super::did::decode_text(&raw))
    }

    /// ReadDataByIdentifier (0x1A) as a big-endian integer of 1 to 4 bytes
    pub fn read_identifier_u32(&mut self, id: u8) -> Result<u32, ServiceError> {
        let raw = self.read_identifier(id)?;
        let result = if raw.is_empty() || raw.len() > 4 {
            Err(ServiceError::InvalidResponse(format!(
                "identifier 0x{:02X} returned {} bytes, expected 1 to 4",
                id,
                raw.len()
            )))
        } else {
            Ok(raw.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
        };
        self.finish(EventCategory::QueryingEcuTypeInfo, "ReadDataByIdentifier", result)
    }

    /// WriteDataByIdentifier (0x3B)
    pub fn write_identifier(&mut self, id: u8, data: &[u8]) -> Result<(), ServiceError> {
        let result = self.write_identifier_inner(id, data);
        self.finish(EventCategory::QueryingEcuTypeInfo, "WriteDataByIdentifier", result)
    }

    fn write_identifier_inner(&mut self, id: u8, data: &[u8]) -> Result<(), ServiceError> {
        if data.is_empty() || data.len() > MAX_MESSAGE_LEN - 2 {
            return Err(ServiceError::InvalidArgument(format!(
                "identifier data of {} bytes",
                data.len()
            )));
        }
        let mut request = Vec::with_capacity(2 + data.len());
        request.push(service_id::WRITE_DATA_BY_IDENTIFIER);
        request.push(id);
        request.extend_from_slice(data);

        let response = self.exchange(&request)?;
        if response.get(1) != Some(&id) {
            return Err(ServiceError::echo(
                service_id::WRITE_DATA_BY_IDENTIFIER,
                &[positive_response(service_id::WRITE_DATA_BY_IDENTIFIER), id],
                &response,
            ));
        }
        debug!(id, len = data.len(), "Identifier written");
        Ok(())
    }

    // =========================================================================
    // Security access
    // =========================================================================

    /// SecurityAccess (0x27): request a seed at `level`, answer at `level + 1`
    pub fn security_access(
        &mut self,
        variant: EcuFamily,
        level: u8,
        mode: u8,
        keys: &dyn KeyDerivation,
    ) -> Result<SecurityOutcome, ServiceError> {
        let result = self.security_access_inner(variant, level, mode, keys);
        match &result {
            Ok(SecurityOutcome::AlreadyUnlocked) => self.emit(
                EventCategory::SecurityAccess,
                &format!("Security level {} already unlocked", level),
            ),
            Ok(SecurityOutcome::Unlocked) => self.emit(
                EventCategory::SecurityAccess,
                &format!("Security access granted at level {}", level),
            ),
            Err(_) => {}
        }
        self.finish(EventCategory::SecurityAccess, "Security access", result)
    }

    fn security_access_inner(
        &mut self,
        variant: EcuFamily,
        level: u8,
        mode: u8,
        keys: &dyn KeyDerivation,
    ) -> Result<SecurityOutcome, ServiceError> {
        let key_level = level.checked_add(1).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("security level 0x{:02X} has no key level", level))
        })?;

        let response = self.exchange(&[service_id::SECURITY_ACCESS, level])?;
        if response.get(1) != Some(&level) {
            return Err(ServiceError::echo(
                service_id::SECURITY_ACCESS,
                &[positive_response(service_id::SECURITY_ACCESS), level],
                &response,
            ));
        }
        let seed = &response[2..];
        if seed.is_empty() {
            return Err(ServiceError::InvalidResponse("Empty seed".to_string()));
        }
        if seed.iter().all(|&b| b == 0) {
            debug!(level, "Zero seed, access already granted");
            return Ok(SecurityOutcome::AlreadyUnlocked);
        }

        let key = keys
            .derive_key(seed, variant, level, mode)
            .ok_or(KeyError::Absent)?;
        if key.is_empty() {
            return Err(KeyError::Empty.into());
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(KeyError::TooLong {
                len: key.len(),
                max: MAX_KEY_LENGTH,
            }
            .into());
        }

        let mut request = Vec::with_capacity(2 + key.len());
        request.push(service_id::SECURITY_ACCESS);
        request.push(key_level);
        request.extend_from_slice(&key);

        let response = self.exchange(&request)?;
        if response.get(1) != Some(&key_level) {
            return Err(ServiceError::echo(
                service_id::SECURITY_ACCESS,
                &[positive_response(service_id::SECURITY_ACCESS), key_level],
                &response,
            ));
        }
        info!(level, "Security access granted");
        Ok(SecurityOutcome::Unlocked)
    }

    // =========================================================================
    // Memory access
    // =========================================================================

    /// ReadMemoryByAddress (0x23), 24-bit address and 16-bit length
    pub fn read_memory_by_address_24_16(
        &mut self,
        address: u32,
        length: u16,
    ) -> Result<Vec<u8>, ServiceError> {
        let result = self.read_memory_block(FieldWidth::Bits24, address, length);
        self.finish(EventCategory::MemoryAccess, "ReadMemoryByAddress", result)
    }

    /// ReadMemoryByAddress (0x23), 32-bit address and 16-bit length
    pub fn read_memory_by_address_32_16(
        &mut self,
        address: u32,
        length: u16,
    ) -> Result<Vec<u8>, ServiceError> {
        let result = self.read_memory_block(FieldWidth::Bits32, address, length);
        self.finish(EventCategory::MemoryAccess, "ReadMemoryByAddress", result)
    }

    /// Read `length` bytes in blocks of `block_size`
    ///
    /// Any failing block fails the whole read; partial data is discarded.
    pub fn read_memory_paged(
        &mut self,
        width: FieldWidth,
        address: u32,
        length: u32,
        block_size: u16,
    ) -> Result<Vec<u8>, ServiceError> {
        let result = self.read_memory_paged_inner(width, address, length, block_size);
        self.finish(EventCategory::MemoryAccess, "ReadMemoryByAddress", result)
    }

    /// Paged read using the session's address width and block size
    pub fn read_memory(&mut self, address: u32, length: u32) -> Result<Vec<u8>, ServiceError> {
        let ServiceOptions {
            address_width,
            read_block_size,
            ..
        } = self.options;
        self.read_memory_paged(address_width, address, length, read_block_size)
    }

    fn read_memory_paged_inner(
        &mut self,
        width: FieldWidth,
        address: u32,
        length: u32,
        block_size: u16,
    ) -> Result<Vec<u8>, ServiceError> {
        if block_size == 0 {
            return Err(ServiceError::InvalidArgument("block size of 0".to_string()));
        }
        if length == 0 {
            return Ok(Vec::new());
        }
        let last = address
            .checked_add(length - 1)
            .filter(|&last| last <= width.max_value())
            .ok_or_else(|| {
                ServiceError::InvalidArgument(format!(
                    "0x{:X} bytes at 0x{:X} exceed the {}-bit address space",
                    length,
                    address,
                    width.bits()
                ))
            })?;
        debug!(address, last, block_size, "Paged memory read");

        let mut out = Vec::with_capacity(length as usize);
        let mut block_address = address;
        let mut remaining = length;
        while remaining > 0 {
            let chunk = remaining.min(block_size as u32) as u16;
            let block = self.read_memory_block(width, block_address, chunk)?;
            out.extend_from_slice(&block);
            self.emit(
                EventCategory::MemoryAccess,
                &format!(
                    "Read 0x{:X} bytes at 0x{:06X} ({}/{})",
                    chunk,
                    block_address,
                    out.len(),
                    length
                ),
            );
            remaining -= chunk as u32;
            block_address = block_address.wrapping_add(chunk as u32);
        }
        Ok(out)
    }

    fn read_memory_block(
        &mut self,
        width: FieldWidth,
        address: u32,
        length: u16,
    ) -> Result<Vec<u8>, ServiceError> {
        if length == 0 {
            return Err(ServiceError::InvalidArgument("read length of 0".to_string()));
        }
        let addr = width.encode(address).ok_or_else(|| {
            ServiceError::InvalidArgument(format!(
                "address 0x{:X} does not fit {} bits",
                address,
                width.bits()
            ))
        })?;
        if 1 + addr.len() + length as usize > MAX_MESSAGE_LEN {
            return Err(ServiceError::InvalidArgument(format!(
                "read length 0x{:X} exceeds one response",
                length
            )));
        }

        let mut request = Vec::with_capacity(3 + addr.len());
        request.push(service_id::READ_MEMORY_BY_ADDRESS);
        request.extend_from_slice(&addr);
        request.extend_from_slice(&length.to_be_bytes());

        let response = self.exchange(&request)?;
        let header = 1 + addr.len();
        if response.len() < header || response[1..header] != addr[..] {
            let mut expected = vec![positive_response(service_id::READ_MEMORY_BY_ADDRESS)];
            expected.extend_from_slice(&addr);
            return Err(ServiceError::echo(
                service_id::READ_MEMORY_BY_ADDRESS,
                &expected,
                &response[..response.len().min(header)],
            ));
        }
        let data = &response[header..];
        if data.len() != length as usize {
            return Err(ServiceError::InvalidResponse(format!(
                "expected 0x{:X} bytes at 0x{:X}, got 0x{:X}",
                length,
                address,
                data.len()
            )));
        }
        Ok(data.to_vec())
    }

    // =========================================================================
    // Programming
    // =========================================================================

    /// RequestDownload (0x34) announcing `size` bytes
    pub fn request_download(&mut self, size: u32, bit_width: u8, format: u8) -> Result<(), ServiceError> {
        let result = self.request_download_inner(size, bit_width, format);
        if result.is_ok() {
            self.emit(
                EventCategory::Programming,
                &format!("Download of 0x{:X} bytes accepted", size),
            );
        }
        self.finish(EventCategory::Programming, "RequestDownload", result)
    }

    fn request_download_inner(&mut self, size: u32, bit_width: u8, format: u8) -> Result<(), ServiceError> {
        let width = FieldWidth::from_bits(bit_width).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("size width of {} bits", bit_width))
        })?;
        let size_bytes = width.encode(size).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("size 0x{:X} does not fit {} bits", size, bit_width))
        })?;

        let mut request = Vec::with_capacity(2 + size_bytes.len());
        request.push(service_id::REQUEST_DOWNLOAD);
        request.push(format);
        request.extend_from_slice(&size_bytes);
        self.exchange(&request)?;
        Ok(())
    }

    /// TransferData (0x36): write `data` in blocks starting at `address`
    ///
    /// `block_size` falls back to [`ServiceOptions::transfer_block_size`].
    /// With `execute`, a final execute request follows at `address`. The
    /// target is expected not to answer it.
    pub fn transfer_data(
        &mut self,
        data: &[u8],
        address: u32,
        block_size: Option<u16>,
        execute: bool,
    ) -> Result<(), ServiceError> {
        let block_size = block_size.unwrap_or(self.options.transfer_block_size);
        let result = self.transfer_data_inner(data, address, block_size, execute);
        self.finish(EventCategory::Programming, "TransferData", result)
    }

    fn transfer_data_inner(
        &mut self,
        data: &[u8],
        address: u32,
        block_size: u16,
        execute: bool,
    ) -> Result<(), ServiceError> {
        let width = self.options.address_width;
        let max_block = MAX_MESSAGE_LEN - 2 - width.bytes();
        if block_size == 0 || block_size as usize > max_block {
            return Err(ServiceError::InvalidArgument(format!(
                "transfer block size 0x{:X} (1..=0x{:X})",
                block_size, max_block
            )));
        }
        if data.is_empty() && !execute {
            return Err(ServiceError::InvalidArgument("nothing to transfer".to_string()));
        }
        let encode = |addr: u32| {
            width.encode(addr).ok_or_else(|| {
                ServiceError::InvalidArgument(format!(
                    "address 0x{:X} does not fit {} bits",
                    addr,
                    width.bits()
                ))
            })
        };

        let mut block_address = address;
        for chunk in data.chunks(block_size as usize) {
            let addr = encode(block_address)?;
            let mut request = Vec::with_capacity(2 + addr.len() + chunk.len());
            request.push(service_id::TRANSFER_DATA);
            request.push(transfer_sub_function::DOWNLOAD);
            request.extend_from_slice(&addr);
            request.extend_from_slice(chunk);
            self.exchange(&request)?;

            self.emit(
                EventCategory::Programming,
                &format!("Transferred 0x{:X} bytes to 0x{:06X}", chunk.len(), block_address),
            );
            block_address = block_address.wrapping_add(chunk.len() as u32);
        }

        if execute {
            let addr = encode(address)?;
            let mut request = Vec::with_capacity(2 + addr.len());
            request.push(service_id::TRANSFER_DATA);
            request.push(transfer_sub_function::DOWNLOAD_AND_EXECUTE);
            request.extend_from_slice(&addr);
            self.exchange_silent(&request, EventCategory::Programming)?;
            self.emit(
                EventCategory::Programming,
                &format!("Execute requested at 0x{:06X}", address),
            );
        }
        Ok(())
    }

    /// ProgrammingMode (0xA5)
    ///
    /// Levels 1 and 2 are answered normally. Level 3 enables programming
    /// and is not answered.
    pub fn programming_mode(&mut self, level: u8) -> Result<(), ServiceError> {
        let request = [service_id::PROGRAMMING_MODE, level];
        let result = match level {
            programming_mode::REQUEST | programming_mode::REQUEST_HIGH_SPEED => {
                self.exchange(&request).map(|_| ())
            }
            programming_mode::ENABLE => self.exchange_silent(&request, EventCategory::Programming),
            other => Err(ServiceError::InvalidArgument(format!(
                "programming mode level {}",
                other
            ))),
        };
        if result.is_ok() {
            self.emit(
                EventCategory::Programming,
                &format!("Programming mode level {} accepted", level),
            );
        }
        self.finish(EventCategory::Programming, "ProgrammingMode", result)
    }

    /// ReportProgrammedState (0xA2)
    pub fn report_programmed_state(&mut self) -> Result<ProgrammedState, ServiceError> {
        let result = self
            .exchange(&[service_id::REPORT_PROGRAMMED_STATE])
            .and_then(|response| {
                response.get(1).copied().map(ProgrammedState::from).ok_or_else(|| {
                    ServiceError::InvalidResponse("Programmed state response too short".to_string())
                })
            });
        if let Ok(state) = &result {
            self.emit(
                EventCategory::Diagnostics,
                &format!("Programmed state: {}", state),
            );
        }
        self.finish(EventCategory::Diagnostics, "ReportProgrammedState", result)
    }

    // =========================================================================
    // Diagnostics and session control
    // =========================================================================

    /// ReadFailureRecordData (0x12), failure record identifiers
    pub fn read_failure_record_identifiers(&mut self) -> Result<Vec<FailureRecord>, ServiceError> {
        let result = self.read_failure_records_inner();
        if let Ok(records) = &result {
            self.emit(
                EventCategory::Diagnostics,
                &format!("{} failure record(s) stored", records.len()),
            );
        }
        self.finish(EventCategory::Diagnostics, "ReadFailureRecordData", result)
    }

    fn read_failure_records_inner(&mut self) -> Result<Vec<FailureRecord>, ServiceError> {
        let response = self.exchange(&[
            service_id::READ_FAILURE_RECORD_DATA,
            failure_record_sub_function::READ_IDENTIFIERS,
        ])?;
        match response.get(1) {
            None => Ok(Vec::new()),
            Some(&failure_record_sub_function::READ_IDENTIFIERS) => {
                parse_failure_records(&response[2..])
            }
            Some(_) => Err(ServiceError::echo(
                service_id::READ_FAILURE_RECORD_DATA,
                &[
                    positive_response(service_id::READ_FAILURE_RECORD_DATA),
                    failure_record_sub_function::READ_IDENTIFIERS,
                ],
                &response[..2],
            )),
        }
    }

    /// ClearDiagnosticInformation (0x04)
    pub fn clear_diagnostic_information(&mut self) -> Result<(), ServiceError> {
        let result = self
            .exchange(&[service_id::CLEAR_DIAGNOSTIC_INFORMATION])
            .map(|_| ());
        if result.is_ok() {
            self.emit(EventCategory::Diagnostics, "Diagnostic information cleared");
        }
        self.finish(EventCategory::Diagnostics, "ClearDiagnosticInformation", result)
    }

    /// InitiateDiagnosticOperation (0x10)
    pub fn initiate_diagnostic_operation(&mut self, mode: u8) -> Result<(), ServiceError> {
        let result = self
            .exchange(&[service_id::INITIATE_DIAGNOSTIC_OPERATION, mode])
            .map(|_| ());
        self.finish(EventCategory::Diagnostics, "InitiateDiagnosticOperation", result)
    }

    /// ReturnToNormal (0x20)
    pub fn return_to_normal(&mut self) -> Result<(), ServiceError> {
        let result = self.exchange(&[service_id::RETURN_TO_NORMAL]).map(|_| ());
        self.finish(EventCategory::Diagnostics, "ReturnToNormal", result)
    }

    /// DisableNormalCommunication (0x28)
    pub fn disable_normal_communication(&mut self) -> Result<(), ServiceError> {
        let result = self
            .exchange(&[service_id::DISABLE_NORMAL_COMMUNICATION])
            .map(|_| ());
        self.finish(EventCategory::Diagnostics, "DisableNormalCommunication", result)
    }

    /// TesterPresent (0x3E)
    pub fn tester_present(&mut self) -> Result<(), ServiceError> {
        let result = self.exchange(&[service_id::TESTER_PRESENT]).map(|_| ());
        self.finish(EventCategory::Diagnostics, "TesterPresent", result)
    }
}
