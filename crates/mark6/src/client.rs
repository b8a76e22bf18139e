//! Mark6 -- the recorder client.
//!
//! Wraps a [`Session`] and keeps the last-read state of the recorder: one
//! [`ModuleStatus`] per slot, the scan list and the recording state. Each
//! `read_*`/`get_*` method performs one or more cplane exchanges and
//! refreshes the matching cache; the plain accessors never touch the wire.

use mark6_core::error::{Error, Result};
use mark6_core::types::{
    InputStream, ModuleStatus, RecordingState, Response, SLOT_COUNT, ScanRecord, SlotId,
};
use mark6_cplane::commands;
use mark6_cplane::{RecordDecodeError, Session};
use tracing::{debug, warn};

/// A slot whose status could not be refreshed.
#[derive(Debug)]
pub struct SlotFailure {
    /// The slot that failed.
    pub slot: SlotId,
    /// Why it failed.
    pub error: Error,
}

/// Client for one Mark6 recorder.
///
/// Construct with [`Mark6Builder`](crate::Mark6Builder).
pub struct Mark6 {
    session: Session,
    slots: [Option<ModuleStatus>; SLOT_COUNT],
    scans: Vec<ScanRecord>,
    recording: RecordingState,
}

impl Mark6 {
    pub(crate) fn new(session: Session) -> Self {
        Mark6 {
            session,
            slots: Default::default(),
            scans: Vec::new(),
            recording: RecordingState::unknown(),
        }
    }

    /// The recorder host.
    pub fn host(&self) -> &str {
        self.session.host()
    }

    /// Refresh the status of every slot, 1 through 4.
    ///
    /// Slots are queried one at a time. A failing slot does not stop the
    /// others: its cache entry is cleared and the failure is returned. An
    /// empty result means all four slots were refreshed.
    pub async fn read_slot_info(&mut self) -> Vec<SlotFailure> {
        let mut failures = Vec::new();

        for slot in SlotId::all() {
            match self.query_slot(slot).await {
                Ok(status) => {
                    debug!(%slot, vsn = status.emsn.vsn(), "slot refreshed");
                    self.slots[slot.index()] = Some(status);
                }
                Err(error) => {
                    warn!(%slot, %error, "slot refresh failed");
                    self.slots[slot.index()] = None;
                    failures.push(SlotFailure { slot, error });
                }
            }
        }

        failures
    }

    async fn query_slot(&self, slot: SlotId) -> Result<ModuleStatus> {
        let response = self.query(&commands::cmd_mstat(slot)).await?;
        commands::parse_module_status(&response, slot)
    }

    /// Refresh the scan list.
    ///
    /// The cached list is replaced wholesale. Scan groups that could not be
    /// decoded are left out of the cache and returned.
    ///
    /// # Errors
    ///
    /// Any session error, [`Error::Device`] if the recorder rejects the
    /// query. The cache is left untouched on error.
    pub async fn read_scan_list(&mut self) -> Result<Vec<RecordDecodeError>> {
        let response = self.query(&commands::cmd_list()).await?;
        let listing = commands::parse_scan_list(&response)?;

        if !listing.rejected.is_empty() {
            warn!(
                rejected = listing.rejected.len(),
                kept = listing.records.len(),
                "scan list contained undecodable records"
            );
        }
        debug!(scans = listing.records.len(), "scan list refreshed");
        self.scans = listing.records;
        Ok(listing.rejected)
    }

    /// Look up a cached scan by name.
    ///
    /// Both sides are trimmed and must then match exactly. Reads the cache
    /// only; call [`read_scan_list`](Self::read_scan_list) first.
    pub fn get_scan_by_name(&self, name: &str) -> Option<&ScanRecord> {
        let name = name.trim();
        self.scans.iter().find(|scan| scan.name.trim() == name)
    }

    /// Query the recording state and update the cache.
    pub async fn get_recording_state(&mut self) -> Result<&RecordingState> {
        let response = self.query(&commands::cmd_record_query()).await?;
        self.recording = commands::parse_recording_state(&response)?;
        debug!(state = %self.recording.state, scan = %self.recording.scan_name, "recording state");
        Ok(&self.recording)
    }

    /// Query the configured input streams. The result is not cached.
    pub async fn get_input_streams(&self) -> Result<Vec<InputStream>> {
        let response = self.query(&commands::cmd_input_stream_query()).await?;
        commands::parse_input_streams(&response)
    }

    /// Send an arbitrary cplane command and return the raw response.
    ///
    /// No status check is applied; see [`Response::ensure_ok`].
    pub async fn send_command(&self, command: &str) -> Result<Response> {
        self.session.send_command(command).await
    }

    async fn query(&self, command: &str) -> Result<Response> {
        self.session.send_command(command).await?.ensure_ok()
    }

    /// The cached status of `slot`, if the last refresh succeeded.
    pub fn slot(&self, slot: SlotId) -> Option<&ModuleStatus> {
        self.slots[slot.index()].as_ref()
    }

    /// The cached status of all slots, indexed by slot number minus one.
    pub fn slots(&self) -> &[Option<ModuleStatus>; SLOT_COUNT] {
        &self.slots
    }

    /// The cached scan list in device order.
    pub fn scans(&self) -> &[ScanRecord] {
        &self.scans
    }

    /// The cached recording state; unknown until first queried.
    pub fn recording_state(&self) -> &RecordingState {
        &self.recording
    }

    /// Whether the connection is still usable.
    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}
