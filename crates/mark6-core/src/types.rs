//! Core types used throughout the Mark6 client.
//!
//! These are the typed records the cplane decoders produce from a
//! [`Response`]. Device sentinels (`-` for "unset" or "unknown") are modelled
//! as `Option`/enum variants here so callers never special-case strings.

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Number of physical module bays in a recorder.
pub const SLOT_COUNT: usize = 4;

/// A physical module slot, `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// Create a `SlotId`, rejecting numbers outside `1..=4`.
    pub fn new(slot: u8) -> Result<Self> {
        if (1..=SLOT_COUNT as u8).contains(&slot) {
            Ok(SlotId(slot))
        } else {
            Err(Error::InvalidParameter(format!(
                "slot {slot} out of range 1..={SLOT_COUNT}"
            )))
        }
    }

    /// All four slots in ascending order.
    pub fn all() -> [SlotId; SLOT_COUNT] {
        [SlotId(1), SlotId(2), SlotId(3), SlotId(4)]
    }

    /// The 1-based slot number as the device reports it.
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Zero-based index for slot-ordered arrays.
    pub fn index(&self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a response answers a query (`?`) or an assignment (`=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// `name?args` -- read device state.
    Query,
    /// `name=args` -- change device state.
    Command,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::Query => write!(f, "query"),
            ResponseType::Command => write!(f, "command"),
        }
    }
}

/// One decoded cplane response.
///
/// Status codes are kept as the device sent them; the device is free to
/// return non-numeric codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Query or command classification.
    pub response_type: ResponseType,
    /// Command name, e.g. `"mstat"`.
    pub base_command: String,
    /// Query arguments echoed between `?` and `=`, e.g. `"1"` in `#mstat?1=`.
    pub echo_args: Option<String>,
    /// Control-plane return code.
    pub cplane_code: String,
    /// Data-plane return code.
    pub dplane_code: String,
    /// Remaining `:`-separated fields, each trimmed.
    pub fields: Vec<String>,
}

impl Response {
    /// Whether the cplane code reports success.
    ///
    /// `0` means the action completed, `1` that it was initiated and is still
    /// running. Every other code is a device-side failure.
    pub fn is_ok(&self) -> bool {
        matches!(self.cplane_code.as_str(), "0" | "1")
    }

    /// Turn a failing cplane code into [`Error::Device`].
    pub fn ensure_ok(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Device {
                command: self.base_command,
                code: self.cplane_code,
            })
        }
    }
}

/// Extended module serial number: VSN, capacity and data rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emsn {
    /// The device reported `-`: no module or unreadable label.
    Unknown,
    /// A `vsn/capacity/datarate` triple.
    Known {
        /// Volume serial number.
        vsn: String,
        /// Capacity as printed on the label.
        capacity: String,
        /// Data rate as printed on the label.
        data_rate: String,
    },
}

impl Emsn {
    /// Volume serial number, `"unknown"` when not reported.
    pub fn vsn(&self) -> &str {
        match self {
            Emsn::Unknown => "unknown",
            Emsn::Known { vsn, .. } => vsn,
        }
    }

    /// Capacity component, empty when not reported.
    pub fn capacity(&self) -> &str {
        match self {
            Emsn::Unknown => "",
            Emsn::Known { capacity, .. } => capacity,
        }
    }

    /// Data-rate component, empty when not reported.
    pub fn data_rate(&self) -> &str {
        match self {
            Emsn::Unknown => "",
            Emsn::Known { data_rate, .. } => data_rate,
        }
    }
}

/// Status of the module in one slot, as reported by `mstat?<slot>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleStatus {
    /// Group label; `None` when the device reports `-`.
    pub group: Option<String>,
    /// Slot the module sits in.
    pub slot: SlotId,
    /// Extended module serial number.
    pub emsn: Emsn,
    /// Disks the device found in the module.
    pub num_disks_discovered: u32,
    /// Disks registered to the module.
    pub num_disks_registered: u32,
    /// Remaining capacity in GB (`-` decodes as 0).
    pub capacity_remaining_gb: u64,
    /// Total capacity of the module group in GB.
    pub group_capacity_gb: u64,
    /// First status word, e.g. `"initialized"` or `"idle"`.
    pub status1: String,
    /// Second status word.
    pub status2: String,
    /// Recording type tag, e.g. `"sg"` or `"raid"`.
    pub module_type: String,
}

impl ModuleStatus {
    /// Free space as a percentage of group capacity.
    ///
    /// Zero when nothing remains or the group capacity is unknown.
    pub fn free_percentage(&self) -> f64 {
        if self.capacity_remaining_gb > 0 && self.group_capacity_gb > 0 {
            self.capacity_remaining_gb as f64 / self.group_capacity_gb as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// One recorded scan from `list?`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    /// Scan number assigned by the device.
    pub number: u32,
    /// Scan name.
    pub name: String,
    /// Size in the unit the device reports.
    pub size: f64,
    /// Creation time (`<yyyy>y<doy>d<hh>h<mm>m<ss>s` on the wire).
    pub date_created: NaiveDateTime,
}

/// Recording state from `record?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingState {
    /// State token, e.g. `"on"`, `"off"`, `"pending"`.
    pub state: String,
    /// Number of the active scan.
    pub scan_number: String,
    /// Name of the active scan.
    pub scan_name: String,
}

impl RecordingState {
    const UNKNOWN: &'static str = "unknown";

    /// The state before the device has been queried.
    pub fn unknown() -> Self {
        RecordingState {
            state: Self::UNKNOWN.to_string(),
            scan_number: Self::UNKNOWN.to_string(),
            scan_name: Self::UNKNOWN.to_string(),
        }
    }

    /// Whether this is still the pre-query placeholder.
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A configured network input stream from `input_stream?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStream {
    /// Stream label.
    pub label: String,
    /// Payload format, e.g. `"vdif"` or `"mark5b"`.
    pub data_format: String,
    /// Payload size in bytes.
    pub payload_size: u32,
    /// Offset of the payload within the packet.
    pub payload_offset: u32,
    /// Offset of the packet serial number within the packet.
    pub psn_offset: u32,
    /// Network interface, e.g. `"eth3"`.
    pub interface: String,
    /// Multicast/filter address.
    pub filter_address: String,
    /// UDP port.
    pub port: u16,
    /// Slot bitmask or label the stream records to.
    pub slots: String,
}
