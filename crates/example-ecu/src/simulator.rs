//! Simulated GMLAN module
//!
//! [`SimulatedEcu`] turns one request into one [`Reply`]. [`EcuSimulator`]
//! runs it on a thread behind a segmentation engine, answering over any
//! [`FrameTransport`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gmlan::gmlan::{
    failure_record_sub_function, programming_mode, service_id, transfer_sub_function, FieldWidth,
};
use gmlan::isotp::{IsoTpEngine, IsoTpSettings, BUFFER_CAPACITY, MAX_MESSAGE_LEN};
use gmlan::{EcuFamily, EcuFeatures, FrameTransport, NegativeResponseCode as Nrc, NullSink};
use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::config::{default_dtcs, default_identifiers, FaultConfig, SimConfig, SimConfigError};
use crate::firmware::{blank_image, synthetic_image};
use crate::responses::{be_value, negative, negative_raw, positive, response_pending};

/// Wait per idle poll of the bus, bounding shutdown latency
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Flash size for families without a partition layout
const BLANK_FLASH_SIZE: usize = 0x4_0000;

/// Seed for the synthetic flash image
const IMAGE_SEED: u64 = 0x6D4C;

/// What the module does with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message(Vec<u8>),
    /// No response at all
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ProgrammingPhase {
    #[default]
    Normal,
    Requested,
    Enabled,
}

#[derive(Debug, Clone, Copy)]
struct DownloadState {
    announced: u32,
    received: u32,
}

#[derive(Debug, Clone, Copy)]
struct StoredRecord {
    code: u16,
    failure_type: u8,
}

/// Mutable module state
#[derive(Debug)]
struct EcuState {
    identifiers: BTreeMap<u8, Vec<u8>>,
    memory: Vec<u8>,
    records: Vec<StoredRecord>,
    programmed_state: u8,
    seed: Option<Vec<u8>>,
    unlocked: bool,
    download: Option<DownloadState>,
    phase: ProgrammingPhase,
    normal_comm_disabled: bool,
    diagnostic_mode: Option<u8>,
    executed_at: Option<u32>,
}

/// Simulated module state
pub struct SimulatedEcu {
    family: EcuFamily,
    features: EcuFeatures,
    width: FieldWidth,
    /// Shared secret for the seed/key check
    secret: Vec<u8>,
    seed_length: usize,
    always_unlocked: bool,
    rx_separation_time: u8,
    faults: FaultConfig,
    state: RwLock<EcuState>,
    requests: AtomicUsize,
}

impl SimulatedEcu {
    /// Create a simulated module from configuration
    pub fn from_config(config: &SimConfig) -> Result<Self, SimConfigError> {
        let definitions = if config.identifiers.is_empty() {
            default_identifiers()
        } else {
            config.identifiers.clone()
        };
        let identifiers = definitions
            .iter()
            .map(|def| def.bytes().map(|bytes| (def.id, bytes)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let records = config
            .dtcs
            .clone()
            .unwrap_or_else(default_dtcs)
            .iter()
            .map(|def| {
                def.encode().map(|code| StoredRecord {
                    code,
                    failure_type: def.failure_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let memory = match config.family.layout() {
            Some(layout) => synthetic_image(layout, IMAGE_SEED)
                .unwrap_or_else(|| blank_image(layout.image_size)),
            None => blank_image(BLANK_FLASH_SIZE),
        };

        let secret = config.security.secret_bytes()?;
        info!(
            family = %config.family,
            identifiers = identifiers.len(),
            dtcs = records.len(),
            flash = %format!("0x{:X}", memory.len()),
            "Simulated ECU created"
        );

        Ok(Self {
            family: config.family,
            features: config.family.features(),
            width: config.family.address_width(),
            secret,
            seed_length: config.security.seed_length.max(1),
            always_unlocked: config.security.always_unlocked,
            rx_separation_time: config.rx_separation_time,
            faults: config.faults.clone(),
            state: RwLock::new(EcuState {
                identifiers,
                memory,
                records,
                programmed_state: config.programmed_state,
                seed: None,
                unlocked: false,
                download: None,
                phase: ProgrammingPhase::Normal,
                normal_comm_disabled: false,
                diagnostic_mode: None,
                executed_at: None,
            }),
            requests: AtomicUsize::new(0),
        })
    }

    /// Healthy module of the given family
    pub fn for_family(family: EcuFamily) -> Result<Self, SimConfigError> {
        Self::from_config(&SimConfig::for_family(family))
    }

    pub fn family(&self) -> EcuFamily {
        self.family
    }

    /// Engine settings for the module's side of the link
    pub fn settings(&self) -> IsoTpSettings {
        IsoTpSettings {
            tx_id: self.family.response_id(),
            rx_id: self.family.request_id(),
            rx_separation_time: self.rx_separation_time,
            ..IsoTpSettings::default()
        }
    }

    /// Key the module accepts for `seed`
    pub fn expected_key(&self, seed: &[u8]) -> Vec<u8> {
        seed.iter()
            .enumerate()
            .map(|(i, b)| b ^ self.secret[i % self.secret.len()])
            .collect()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.read().unlocked
    }

    pub fn programming_enabled(&self) -> bool {
        self.state.read().phase == ProgrammingPhase::Enabled
    }

    pub fn normal_communication_disabled(&self) -> bool {
        self.state.read().normal_comm_disabled
    }

    pub fn diagnostic_mode(&self) -> Option<u8> {
        self.state.read().diagnostic_mode
    }

    /// Address of the last execute request
    pub fn executed_at(&self) -> Option<u32> {
        self.state.read().executed_at
    }

    /// Bytes received in the current download
    pub fn downloaded_bytes(&self) -> Option<u32> {
        self.state.read().download.map(|d| d.received)
    }

    /// Copy of flash contents
    pub fn memory(&self, address: u32, length: usize) -> Option<Vec<u8>> {
        let start = address as usize;
        self.state
            .read()
            .memory
            .get(start..start.checked_add(length)?)
            .map(<[u8]>::to_vec)
    }

    pub fn flash_size(&self) -> usize {
        self.state.read().memory.len()
    }

    pub fn identifier(&self, id: u8) -> Option<Vec<u8>> {
        self.state.read().identifiers.get(&id).cloned()
    }

    pub fn stored_records(&self) -> usize {
        self.state.read().records.len()
    }

    /// Requests handled so far
    pub fn requests_handled(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn faults(&self) -> &FaultConfig {
        &self.faults
    }

    /// Process a GMLAN request and return the reply
    pub fn process_request(&self, request: &[u8]) -> Reply {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let Some(&sid) = request.first() else {
            return Reply::Message(negative(0x00, Nrc::SubFunctionNotSupported));
        };

        if self.faults.silent_services.contains(&sid) {
            debug!(service = sid, "Injected silence");
            return Reply::Silent;
        }
        if let Some(injected) = self.faults.negative_responses.iter().find(|n| n.service == sid) {
            debug!(service = sid, code = injected.code, "Injected negative response");
            return Reply::Message(negative_raw(sid, injected.code));
        }

        let response = match sid {
            service_id::READ_DATA_BY_IDENTIFIER => self.handle_read_identifier(request),
            service_id::WRITE_DATA_BY_IDENTIFIER => self.handle_write_identifier(request),
            service_id::SECURITY_ACCESS => self.handle_security_access(request),
            service_id::READ_MEMORY_BY_ADDRESS => self.handle_read_memory(request),
            service_id::REQUEST_DOWNLOAD => self.handle_request_download(request),
            service_id::TRANSFER_DATA => return self.handle_transfer_data(request),
            service_id::PROGRAMMING_MODE => return self.handle_programming_mode(request),
            service_id::REPORT_PROGRAMMED_STATE => self.handle_programmed_state(request),
            service_id::READ_FAILURE_RECORD_DATA => self.handle_failure_records(request),
            service_id::CLEAR_DIAGNOSTIC_INFORMATION => self.handle_clear_diagnostics(),
            service_id::INITIATE_DIAGNOSTIC_OPERATION => self.handle_initiate_diagnostics(request),
            service_id::RETURN_TO_NORMAL => self.handle_return_to_normal(),
            service_id::DISABLE_NORMAL_COMMUNICATION => {
                self.state.write().normal_comm_disabled = true;
                positive(sid, &[])
            }
            service_id::TESTER_PRESENT => positive(sid, &[]),
            _ => {
                debug!(service = sid, "Unsupported service");
                negative(sid, Nrc::ServiceNotSupported)
            }
        };
        Reply::Message(response)
    }

    fn handle_read_identifier(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::READ_DATA_BY_IDENTIFIER;
        if request.len() != 2 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let id = request[1];
        match self.state.read().identifiers.get(&id) {
            Some(value) => {
                let mut data = Vec::with_capacity(1 + value.len());
                data.push(id);
                data.extend_from_slice(value);
                positive(sid, &data)
            }
            None => {
                debug!(id = %format!("0x{:02X}", id), "Unknown identifier");
                negative(sid, Nrc::RequestOutOfRange)
            }
        }
    }

    fn handle_write_identifier(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::WRITE_DATA_BY_IDENTIFIER;
        if request.len() < 3 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let mut state = self.state.write();
        if !state.unlocked {
            return negative(sid, Nrc::SecurityAccessDenied);
        }
        let id = request[1];
        state.identifiers.insert(id, request[2..].to_vec());
        info!(id = %format!("0x{:02X}", id), len = request.len() - 2, "Identifier written");
        positive(sid, &[id])
    }

    fn handle_security_access(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::SECURITY_ACCESS;
        if request.len() < 2 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let level = request[1];
        let levels = self.features.security_levels;

        if level % 2 == 1 {
            if request.len() != 2 || !levels.contains(&level) {
                return negative(sid, Nrc::SubFunctionNotSupported);
            }
            let mut state = self.state.write();
            let mut data = vec![level];
            if self.always_unlocked || state.unlocked {
                debug!(level, "Security access: already unlocked, zero seed");
                data.resize(1 + self.seed_length, 0x00);
                return positive(sid, &data);
            }

            let mut rng = rand::thread_rng();
            let seed = loop {
                let seed: Vec<u8> = (0..self.seed_length).map(|_| rng.gen()).collect();
                if seed.iter().any(|&b| b != 0) {
                    break seed;
                }
            };
            info!(seed = %hex::encode(&seed), "Security access: providing seed");
            data.extend_from_slice(&seed);
            state.seed = Some(seed);
            positive(sid, &data)
        } else {
            if !levels.contains(&level.wrapping_sub(1)) {
                return negative(sid, Nrc::SubFunctionNotSupported);
            }
            let mut state = self.state.write();
            let Some(seed) = state.seed.take() else {
                return negative(sid, Nrc::RequestSequenceError);
            };
            let key = &request[2..];
            let expected = self.expected_key(&seed);
            if key == expected.as_slice() {
                info!("Security access: key accepted");
                state.unlocked = true;
                positive(sid, &[level])
            } else {
                info!(
                    expected = %hex::encode(&expected),
                    received = %hex::encode(key),
                    "Security access: invalid key"
                );
                negative(sid, Nrc::InvalidKey)
            }
        }
    }

    fn handle_read_memory(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::READ_MEMORY_BY_ADDRESS;
        if !self.features.memory_read {
            return negative(sid, Nrc::ServiceNotSupported);
        }
        let width = self.width.bytes();
        if request.len() != 1 + width + 2 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let address_bytes = &request[1..1 + width];
        let address = be_value(address_bytes) as usize;
        let length = be_value(&request[1 + width..]) as usize;
        if length == 0 || 1 + width + length > MAX_MESSAGE_LEN {
            return negative(sid, Nrc::RequestOutOfRange);
        }
        let end = address + length;
        if let Some(bad) = self.faults.fail_read_address {
            if (address..end).contains(&(bad as usize)) {
                debug!(address = %format!("0x{:X}", address), "Injected read failure");
                return negative(sid, Nrc::RequestOutOfRange);
            }
        }

        let state = self.state.read();
        let Some(data) = state.memory.get(address..end) else {
            return negative(sid, Nrc::RequestOutOfRange);
        };
        let mut response = Vec::with_capacity(width + length);
        response.extend_from_slice(address_bytes);
        response.extend_from_slice(data);
        positive(sid, &response)
    }

    fn handle_request_download(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::REQUEST_DOWNLOAD;
        if !self.features.programming {
            return negative(sid, Nrc::ServiceNotSupported);
        }
        // 34 <format> <size: 2..=4 bytes>
        if !(4..=6).contains(&request.len()) {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let mut state = self.state.write();
        if !state.unlocked {
            debug!("Download denied: requires security access");
            return negative(sid, Nrc::SecurityAccessDenied);
        }
        let size = be_value(&request[2..]);
        if size == 0 || size as usize > state.memory.len() {
            return negative(sid, Nrc::CantDownloadByteCount);
        }
        info!(size = %format!("0x{:X}", size), format = request[1], "RequestDownload accepted");
        state.download = Some(DownloadState {
            announced: size,
            received: 0,
        });
        positive(sid, &[])
    }

    fn handle_transfer_data(&self, request: &[u8]) -> Reply {
        let sid = service_id::TRANSFER_DATA;
        if !self.features.programming {
            return Reply::Message(negative(sid, Nrc::ServiceNotSupported));
        }
        let width = self.width.bytes();
        if request.len() < 2 + width {
            return Reply::Message(negative(sid, Nrc::SubFunctionNotSupported));
        }
        let address = be_value(&request[2..2 + width]);
        let data = &request[2 + width..];
        let mut state = self.state.write();

        match request[1] {
            transfer_sub_function::DOWNLOAD => {
                let Some(mut download) = state.download else {
                    return Reply::Message(negative(sid, Nrc::RequestSequenceError));
                };
                if data.is_empty() || download.received as usize + data.len() > download.announced as usize {
                    return Reply::Message(negative(sid, Nrc::IllegalByteCountInBlockTransfer));
                }
                let start = address as usize;
                let Some(target) = state.memory.get_mut(start..start + data.len()) else {
                    return Reply::Message(negative(sid, Nrc::IllegalAddressInBlockTransfer));
                };
                target.copy_from_slice(data);
                download.received += data.len() as u32;
                state.download = Some(download);
                debug!(address = %format!("0x{:06X}", address), len = data.len(), "Block written");
                Reply::Message(positive(sid, &[]))
            }
            transfer_sub_function::DOWNLOAD_AND_EXECUTE => {
                if state.download.is_none() {
                    return Reply::Message(negative(sid, Nrc::RequestSequenceError));
                }
                info!(address = %format!("0x{:06X}", address), "Executing downloaded routine");
                state.executed_at = Some(address);
                self.silent_or_positive(sid)
            }
            _ => Reply::Message(negative(sid, Nrc::SubFunctionNotSupported)),
        }
    }

    fn handle_programming_mode(&self, request: &[u8]) -> Reply {
        let sid = service_id::PROGRAMMING_MODE;
        if !self.features.programming {
            return Reply::Message(negative(sid, Nrc::ServiceNotSupported));
        }
        if request.len() != 2 {
            return Reply::Message(negative(sid, Nrc::SubFunctionNotSupported));
        }
        let mut state = self.state.write();
        match request[1] {
            programming_mode::REQUEST | programming_mode::REQUEST_HIGH_SPEED => {
                state.phase = ProgrammingPhase::Requested;
                Reply::Message(positive(sid, &[]))
            }
            programming_mode::ENABLE => {
                if state.phase == ProgrammingPhase::Requested {
                    info!("Programming mode enabled");
                    state.phase = ProgrammingPhase::Enabled;
                } else {
                    debug!("Enable without a prior request, ignored");
                }
                self.silent_or_positive(sid)
            }
            _ => Reply::Message(negative(sid, Nrc::SubFunctionNotSupported)),
        }
    }

    fn silent_or_positive(&self, sid: u8) -> Reply {
        if self.faults.answer_silent_requests {
            Reply::Message(positive(sid, &[]))
        } else {
            Reply::Silent
        }
    }

    fn handle_programmed_state(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::REPORT_PROGRAMMED_STATE;
        if request.len() != 1 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        positive(sid, &[self.state.read().programmed_state])
    }

    fn handle_failure_records(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::READ_FAILURE_RECORD_DATA;
        if !self.features.failure_records {
            return negative(sid, Nrc::ServiceNotSupported);
        }
        if request.len() != 2 || request[1] != failure_record_sub_function::READ_IDENTIFIERS {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        let state = self.state.read();
        let mut data = vec![failure_record_sub_function::READ_IDENTIFIERS];
        for (i, record) in state.records.iter().enumerate() {
            let [hi, lo] = record.code.to_be_bytes();
            data.extend_from_slice(&[(i + 1) as u8, hi, lo, record.failure_type]);
        }
        positive(sid, &data)
    }

    fn handle_clear_diagnostics(&self) -> Vec<u8> {
        let cleared = std::mem::take(&mut self.state.write().records).len();
        info!(cleared, "Diagnostic information cleared");
        positive(service_id::CLEAR_DIAGNOSTIC_INFORMATION, &[])
    }

    fn handle_initiate_diagnostics(&self, request: &[u8]) -> Vec<u8> {
        let sid = service_id::INITIATE_DIAGNOSTIC_OPERATION;
        if request.len() != 2 {
            return negative(sid, Nrc::SubFunctionNotSupported);
        }
        self.state.write().diagnostic_mode = Some(request[1]);
        positive(sid, &[])
    }

    fn handle_return_to_normal(&self) -> Vec<u8> {
        let mut state = self.state.write();
        state.unlocked = false;
        state.seed = None;
        state.download = None;
        state.phase = ProgrammingPhase::Normal;
        state.normal_comm_disabled = false;
        state.diagnostic_mode = None;
        info!("Returned to normal mode");
        positive(service_id::RETURN_TO_NORMAL, &[])
    }
}

// =============================================================================
// Serving Thread
// =============================================================================

/// A [`SimulatedEcu`] answering on its own thread
pub struct EcuSimulator {
    ecu: Arc<SimulatedEcu>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EcuSimulator {
    /// Serve `ecu` over `transport` with the module's own settings
    pub fn spawn<T>(ecu: Arc<SimulatedEcu>, transport: T) -> Self
    where
        T: FrameTransport + 'static,
    {
        let settings = ecu.settings();
        Self::spawn_with_settings(ecu, transport, settings)
    }

    pub fn spawn_with_settings<T>(ecu: Arc<SimulatedEcu>, transport: T, settings: IsoTpSettings) -> Self
    where
        T: FrameTransport + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let ecu = ecu.clone();
            let running = running.clone();
            thread::spawn(move || serve(&ecu, transport, settings, &running))
        };
        Self {
            ecu,
            running,
            thread: Some(thread),
        }
    }

    pub fn ecu(&self) -> &Arc<SimulatedEcu> {
        &self.ecu
    }

    /// Stop serving and wait for the thread to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Simulator thread panicked");
            }
        }
    }
}

impl Drop for EcuSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Answer requests until `running` is cleared
pub fn serve<T: FrameTransport>(
    ecu: &SimulatedEcu,
    transport: T,
    settings: IsoTpSettings,
    running: &AtomicBool,
) {
    let rx_id = settings.rx_id;
    let mut engine = IsoTpEngine::new(transport, settings, Arc::new(NullSink));
    let mut request = vec![0u8; BUFFER_CAPACITY];
    debug!(rx_id = %format!("0x{:03X}", rx_id), "Simulator serving");

    while running.load(Ordering::SeqCst) {
        engine.transport_mut().arm_wait(rx_id);
        let first = match engine.transport_mut().wait_frame(IDLE_POLL) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Bus read failed");
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };
        let len = match engine.receive_started(&first, &mut request) {
            Ok(len) => len,
            Err(e) => {
                debug!(error = %e, "Incomplete request dropped");
                continue;
            }
        };
        respond(ecu, &mut engine, &request[..len]);
    }
    debug!("Simulator stopped");
}

fn respond<T: FrameTransport>(ecu: &SimulatedEcu, engine: &mut IsoTpEngine<T>, request: &[u8]) {
    debug!(request = %hex::encode(request), "Received request");
    match ecu.process_request(request) {
        Reply::Silent => debug!("No response"),
        Reply::Message(response) => {
            for _ in 0..ecu.faults.response_pending {
                if let Err(e) = engine.send_message(&response_pending(request[0])) {
                    warn!(error = %e, "Failed to send response pending");
                    return;
                }
            }
            debug!(response = %hex::encode(&response), "Sending response");
            if let Err(e) = engine.send_message(&response) {
                warn!(error = %e, "Failed to send response");
            }
        }
    }
}
