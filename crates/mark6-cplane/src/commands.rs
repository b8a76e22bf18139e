//! cplane command builders and response decoders.
//!
//! Each command family has a builder producing the command text and a
//! decoder turning the matching [`Response`] into a typed record. Decoders
//! apply a fixed positional schema and fail with [`FieldDecodeError`] on
//! wrong arity or an untypeable value; they never index blindly.
//!
//! All functions are pure. [`Session`](crate::Session) does the I/O.
//!
//! Adding a command family means adding one `cmd_*` builder and one
//! `parse_*` decoder here.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mark6_core::error::{Error, FieldDecodeError, Result};
use mark6_core::types::{
    Emsn, InputStream, ModuleStatus, RecordingState, Response, ScanRecord, SlotId,
};

/// The device's "unset"/"unknown" sentinel.
const SENTINEL: &str = "-";

const MSTAT: &str = "mstat";
const LIST: &str = "list";
const RECORD: &str = "record";
const INPUT_STREAM: &str = "input_stream";

/// Fields per module in an `mstat` response.
const MSTAT_FIELDS: usize = 10;
/// Fields per scan in a `list` response.
const SCAN_FIELDS: usize = 4;
/// Fields per stream in an `input_stream` response.
const INPUT_STREAM_FIELDS: usize = 9;

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Query the module in one slot (`mstat?<slot>`).
pub fn cmd_mstat(slot: SlotId) -> String {
    format!("{MSTAT}?{slot}")
}

/// Query every slot at once (`mstat?all`).
///
/// There is no decoder for the multi-slot reply; use [`cmd_mstat`] per slot
/// with [`parse_module_status`].
pub fn cmd_mstat_all() -> String {
    format!("{MSTAT}?all")
}

/// List scans on the mounted modules (`list?`).
pub fn cmd_list() -> String {
    format!("{LIST}?")
}

/// Query the recording state (`record?`).
pub fn cmd_record_query() -> String {
    format!("{RECORD}?")
}

/// Start recording a scan (`record=on:<scan>:<experiment>:<station>`).
///
/// The fields are joined with `:`, so none of them may contain `:` or `;`.
pub fn cmd_record_on(scan_name: &str, experiment: &str, station: &str) -> Result<String> {
    for (name, value) in [
        ("scan_name", scan_name),
        ("experiment", experiment),
        ("station", station),
    ] {
        if value.is_empty() || value.contains([':', ';']) {
            return Err(Error::InvalidParameter(format!(
                "{name} must be non-empty without ':' or ';', got {value:?}"
            )));
        }
    }
    Ok(format!("{RECORD}=on:{scan_name}:{experiment}:{station}"))
}

/// Stop recording (`record=off`).
pub fn cmd_record_off() -> String {
    format!("{RECORD}=off")
}

/// List the configured network input streams (`input_stream?`).
pub fn cmd_input_stream_query() -> String {
    format!("{INPUT_STREAM}?")
}

// ---------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------

/// Decode an `mstat?<slot>` response.
///
/// Field layout: group, slot, eMSN, disks discovered, disks registered,
/// capacity remaining (GB), group capacity (GB), status 1, status 2, type.
/// `-` for group means unset, for eMSN unknown, and for either capacity 0.
///
/// # Errors
///
/// [`Error::FieldDecode`] on wrong arity, an unparsable number, an eMSN that
/// is not three `/`-separated parts, or a slot other than `slot`.
pub fn parse_module_status(response: &Response, slot: SlotId) -> Result<ModuleStatus> {
    expect_command(response, MSTAT)?;
    let f = exact_fields(response, MSTAT, MSTAT_FIELDS)?;

    let reported_slot: u8 = parse_field(MSTAT, "slot", &f[1])?;
    if reported_slot != slot.number() {
        return Err(FieldDecodeError::new(
            MSTAT,
            "slot",
            format!("is {reported_slot}, requested {slot}"),
        )
        .into());
    }

    Ok(ModuleStatus {
        group: optional(&f[0]),
        slot,
        emsn: parse_emsn(&f[2])?,
        num_disks_discovered: parse_field(MSTAT, "num_disks_discovered", &f[3])?,
        num_disks_registered: parse_field(MSTAT, "num_disks_registered", &f[4])?,
        capacity_remaining_gb: parse_capacity("capacity_remaining_gb", &f[5])?,
        group_capacity_gb: parse_capacity("group_capacity_gb", &f[6])?,
        status1: f[7].clone(),
        status2: f[8].clone(),
        module_type: f[9].clone(),
    })
}

/// A decoded `list?` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanListing {
    /// Successfully decoded scans in device order.
    pub records: Vec<ScanRecord>,
    /// Scan groups that were skipped.
    pub rejected: Vec<RecordDecodeError>,
}

/// One scan group in a `list?` response could not be decoded.
///
/// Recoverable: the listing skips the group and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scan record {index}: {reason}")]
pub struct RecordDecodeError {
    /// Zero-based position of the group in the listing.
    pub index: usize,
    /// What went wrong.
    pub reason: String,
}

/// Decode a `list?` response.
///
/// Field 0 is a group reference and is skipped. If field 1 is `0` the
/// modules hold no scans. Otherwise fields from index 1 are read in groups
/// of four: number, name, size, creation time (`2024y100d10h30m00s`).
///
/// A group that fails to decode is skipped and reported in
/// [`ScanListing::rejected`]; the remaining groups are still decoded.
///
/// # Errors
///
/// [`Error::FieldDecode`] only if the group reference itself is missing.
pub fn parse_scan_list(response: &Response) -> Result<ScanListing> {
    expect_command(response, LIST)?;
    let fields = &response.fields;

    if fields.is_empty() {
        return Err(FieldDecodeError::new(LIST, "group_ref", "is missing").into());
    }
    if fields.len() == 1 || fields[1] == "0" {
        return Ok(ScanListing::default());
    }

    let mut listing = ScanListing::default();
    for (index, group) in fields[1..].chunks(SCAN_FIELDS).enumerate() {
        match decode_scan(group) {
            Ok(record) => listing.records.push(record),
            Err(reason) => {
                let err = RecordDecodeError { index, reason };
                tracing::warn!(error = %err, "skipping undecodable scan record");
                listing.rejected.push(err);
            }
        }
    }
    Ok(listing)
}

/// Decode a `record?` response: state, active scan number, active scan name.
///
/// # Errors
///
/// [`Error::FieldDecode`] if fewer than three fields are present.
pub fn parse_recording_state(response: &Response) -> Result<RecordingState> {
    expect_command(response, RECORD)?;
    let f = &response.fields;
    let get = |idx: usize, name: &str| -> Result<String> {
        f.get(idx).cloned().ok_or_else(|| {
            FieldDecodeError::new(RECORD, name, format!("missing (got {} fields)", f.len())).into()
        })
    };

    Ok(RecordingState {
        state: get(0, "state")?,
        scan_number: get(1, "scan_number")?,
        scan_name: get(2, "scan_name")?,
    })
}

/// Decode an `input_stream?` response into one [`InputStream`] per group of
/// nine fields: label, format, payload size, payload offset, PSN offset,
/// interface, filter address, port, slots.
///
/// # Errors
///
/// [`Error::FieldDecode`] on an incomplete trailing group or an unparsable
/// number.
pub fn parse_input_streams(response: &Response) -> Result<Vec<InputStream>> {
    expect_command(response, INPUT_STREAM)?;
    let fields = &response.fields;

    let trailing = fields.len() % INPUT_STREAM_FIELDS;
    if trailing != 0 {
        return Err(FieldDecodeError::new(
            INPUT_STREAM,
            "stream",
            format!(
                "incomplete trailing group: {trailing} of {INPUT_STREAM_FIELDS} fields"
            ),
        )
        .into());
    }

    fields
        .chunks(INPUT_STREAM_FIELDS)
        .map(|g| {
            Ok(InputStream {
                label: g[0].clone(),
                data_format: g[1].clone(),
                payload_size: parse_field(INPUT_STREAM, "payload_size", &g[2])?,
                payload_offset: parse_field(INPUT_STREAM, "payload_offset", &g[3])?,
                psn_offset: parse_field(INPUT_STREAM, "psn_offset", &g[4])?,
                interface: g[5].clone(),
                filter_address: g[6].clone(),
                port: parse_field(INPUT_STREAM, "port", &g[7])?,
                slots: g[8].clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------

fn expect_command(response: &Response, command: &str) -> Result<()> {
    if response.base_command == command {
        Ok(())
    } else {
        Err(Error::Parse(format!(
            "expected `{command}` response, got `{}`",
            response.base_command
        )))
    }
}

fn exact_fields<'a>(response: &'a Response, command: &str, n: usize) -> Result<&'a [String]> {
    if response.fields.len() == n {
        Ok(&response.fields)
    } else {
        Err(FieldDecodeError::new(
            command,
            "fields",
            format!("expected {n} fields, got {}", response.fields.len()),
        )
        .into())
    }
}

fn parse_field<T: FromStr>(command: &str, field: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        FieldDecodeError::new(command, field, format!("cannot decode {value:?}")).into()
    })
}

fn optional(value: &str) -> Option<String> {
    (value != SENTINEL && !value.is_empty()).then(|| value.to_string())
}

fn parse_capacity(field: &str, value: &str) -> Result<u64> {
    if value == SENTINEL {
        Ok(0)
    } else {
        parse_field(MSTAT, field, value)
    }
}

fn parse_emsn(value: &str) -> Result<Emsn> {
    if value == SENTINEL {
        return Ok(Emsn::Unknown);
    }
    let parts: Vec<&str> = value.split('/').map(str::trim).collect();
    match parts.as_slice() {
        [vsn, capacity, data_rate] => Ok(Emsn::Known {
            vsn: vsn.to_string(),
            capacity: capacity.to_string(),
            data_rate: data_rate.to_string(),
        }),
        _ => Err(FieldDecodeError::new(
            MSTAT,
            "emsn",
            format!("expected vsn/capacity/datarate, got {value:?}"),
        )
        .into()),
    }
}

fn decode_scan(group: &[String]) -> std::result::Result<ScanRecord, String> {
    let [number, name, size, created] = group else {
        return Err(format!(
            "expected {SCAN_FIELDS} fields, got {}",
            group.len()
        ));
    };
    Ok(ScanRecord {
        number: number
            .parse()
            .map_err(|_| format!("bad scan number {number:?}"))?,
        name: name.trim().to_string(),
        size: size
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| format!("bad size {size:?}"))?,
        date_created: parse_scan_timestamp(created)
            .ok_or_else(|| format!("bad creation time {created:?}"))?,
    })
}

/// Parse `<yyyy>y<doy>d<hh>h<mm>m<ss>s`, e.g. `2024y100d10h30m00s`.
pub fn parse_scan_timestamp(value: &str) -> Option<NaiveDateTime> {
    let (year, rest) = value.split_once('y')?;
    let (day_of_year, rest) = rest.split_once('d')?;
    let (hour, rest) = rest.split_once('h')?;
    let (minute, rest) = rest.split_once('m')?;
    let second = rest.strip_suffix('s')?;

    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if year.len() != 4 || ![year, day_of_year, hour, minute, second].into_iter().all(digits) {
        return None;
    }
    let date = NaiveDate::from_yo_opt(year.parse().ok()?, day_of_year.parse().ok()?)?;
    let time = NaiveTime::from_hms_opt(
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )?;
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_response;
    use mark6_core::types::ResponseType;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    fn response(command: &str, fields: &[&str]) -> Response {
        Response {
            response_type: ResponseType::Query,
            base_command: command.into(),
            echo_args: None,
            cplane_code: "0".into(),
            dplane_code: "0".into(),
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ts(year: i32, doy: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_yo_opt(year, doy)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    #[test]
    fn builders() {
        assert_eq!(cmd_mstat(slot(3)), "mstat?3");
        assert_eq!(cmd_mstat_all(), "mstat?all");
        assert_eq!(cmd_list(), "list?");
        assert_eq!(cmd_record_query(), "record?");
        assert_eq!(cmd_record_off(), "record=off");
        assert_eq!(cmd_input_stream_query(), "input_stream?");
        assert_eq!(
            cmd_record_on("scan01", "exp1", "Wf").unwrap(),
            "record=on:scan01:exp1:Wf"
        );
    }

    #[test]
    fn record_on_rejects_separators() {
        assert!(matches!(
            cmd_record_on("a:b", "exp", "st"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            cmd_record_on("scan", "", "st"),
            Err(Error::InvalidParameter(_))
        ));
    }

    // ---------------------------------------------------------------
    // mstat
    // ---------------------------------------------------------------

    #[test]
    fn module_status_from_wire() {
        let r = parse_response(
            b"#mstat?1=0:0:GRP1:1:MSN001/4096/2:8:8:2000:4096:idle:ok:record;\n",
        )
        .unwrap();
        let m = parse_module_status(&r, slot(1)).unwrap();

        assert_eq!(m.group.as_deref(), Some("GRP1"));
        assert_eq!(m.slot, slot(1));
        assert_eq!(m.emsn.vsn(), "MSN001");
        assert_eq!(m.emsn.capacity(), "4096");
        assert_eq!(m.emsn.data_rate(), "2");
        assert_eq!(m.num_disks_discovered, 8);
        assert_eq!(m.num_disks_registered, 8);
        assert_eq!(m.capacity_remaining_gb, 2000);
        assert_eq!(m.group_capacity_gb, 4096);
        assert!((m.free_percentage() - 48.828).abs() < 0.001);
        assert_eq!(m.status1, "idle");
        assert_eq!(m.status2, "ok");
        assert_eq!(m.module_type, "record");
    }

    #[test]
    fn module_status_sentinels() {
        let r = response(
            "mstat",
            &["-", "2", "-", "0", "0", "-", "-", "unknown", "-", "-"],
        );
        let m = parse_module_status(&r, slot(2)).unwrap();
        assert_eq!(m.group, None);
        assert_eq!(m.emsn, Emsn::Unknown);
        assert_eq!(m.emsn.vsn(), "unknown");
        assert_eq!(m.emsn.capacity(), "");
        assert_eq!(m.emsn.data_rate(), "");
        assert_eq!(m.capacity_remaining_gb, 0);
        assert_eq!(m.free_percentage(), 0.0);
    }

    #[test]
    fn module_status_bad_emsn() {
        let r = response(
            "mstat",
            &["1", "1", "MSN001/4096", "8", "8", "1", "2", "a", "b", "c"],
        );
        match parse_module_status(&r, slot(1)) {
            Err(Error::FieldDecode(e)) => assert_eq!(e.field, "emsn"),
            other => panic!("expected FieldDecode, got {other:?}"),
        }
    }

    #[test]
    fn module_status_wrong_arity() {
        let r = response("mstat", &["1", "1", "-"]);
        assert!(matches!(
            parse_module_status(&r, slot(1)),
            Err(Error::FieldDecode(_))
        ));
    }

    #[test]
    fn module_status_bad_number() {
        let r = response(
            "mstat",
            &["1", "1", "-", "eight", "8", "1", "2", "a", "b", "c"],
        );
        match parse_module_status(&r, slot(1)) {
            Err(Error::FieldDecode(e)) => assert_eq!(e.field, "num_disks_discovered"),
            other => panic!("expected FieldDecode, got {other:?}"),
        }
    }

    #[test]
    fn module_status_slot_mismatch() {
        let r = response(
            "mstat",
            &["1", "3", "-", "8", "8", "1", "2", "a", "b", "c"],
        );
        assert!(matches!(
            parse_module_status(&r, slot(1)),
            Err(Error::FieldDecode(_))
        ));
    }

    #[test]
    fn decoder_rejects_other_command() {
        let r = response("list", &["0", "0"]);
        assert!(matches!(
            parse_module_status(&r, slot(1)),
            Err(Error::Parse(_))
        ));
    }

    // ---------------------------------------------------------------
    // list
    // ---------------------------------------------------------------

    #[test]
    fn scan_list_single_record() {
        let r = parse_response(b"#list?=0:0:0:5:scanA:123.4:2024y100d10h30m00s;\n").unwrap();
        let listing = parse_scan_list(&r).unwrap();

        assert!(listing.rejected.is_empty());
        assert_eq!(
            listing.records,
            vec![ScanRecord {
                number: 5,
                name: "scanA".into(),
                size: 123.4,
                date_created: ts(2024, 100, 10, 30, 0),
            }]
        );
    }

    #[test]
    fn scan_list_empty_module() {
        let r = parse_response(b"#list?=0:0:0:0;\n").unwrap();
        let listing = parse_scan_list(&r).unwrap();
        assert!(listing.records.is_empty());
        assert!(listing.rejected.is_empty());
    }

    #[test]
    fn scan_list_skips_only_the_bad_record() {
        let r = response(
            "list",
            &[
                "1",
                "1",
                "scan_a",
                "10.5",
                "2023y001d00h00m01s",
                "two",
                "scan_b",
                "11.0",
                "2023y001d00h00m02s",
                "3",
                "scan_c",
                "12.25",
                "2023y365d23h59m59s",
            ],
        );
        let listing = parse_scan_list(&r).unwrap();

        let names: Vec<&str> = listing.records.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["scan_a", "scan_c"]);
        assert_eq!(listing.rejected.len(), 1);
        assert_eq!(listing.rejected[0].index, 1);
        assert_eq!(listing.records[1].date_created, ts(2023, 365, 23, 59, 59));
    }

    #[test]
    fn scan_list_bad_date_and_short_tail() {
        let r = response(
            "list",
            &[
                "1",
                "1",
                "scan_a",
                "1.0",
                "2023y400d00h00m00s",
                "2",
                "scan_b",
                "2.0",
                "2023y010d08h00m00s",
                "3",
                "scan_c",
            ],
        );
        let listing = parse_scan_list(&r).unwrap();

        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.records[0].name, "scan_b");
        let indices: Vec<usize> = listing.rejected.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn scan_list_names_are_trimmed() {
        let r = response(
            "list",
            &["1", "7", " padded ", "3", "2022y032d01h02m03s"],
        );
        let listing = parse_scan_list(&r).unwrap();
        assert_eq!(listing.records[0].name, "padded");
        assert_eq!(listing.records[0].date_created, ts(2022, 32, 1, 2, 3));
    }

    #[test]
    fn scan_list_missing_group_ref() {
        let r = response("list", &[]);
        assert!(matches!(parse_scan_list(&r), Err(Error::FieldDecode(_))));
    }

    #[test]
    fn scan_timestamp_pattern() {
        assert_eq!(
            parse_scan_timestamp("2024y100d10h30m00s"),
            Some(ts(2024, 100, 10, 30, 0))
        );
        assert_eq!(parse_scan_timestamp("2024y366d00h00m00s"), Some(ts(2024, 366, 0, 0, 0)));
        assert_eq!(parse_scan_timestamp("2023y366d00h00m00s"), None);
        assert_eq!(parse_scan_timestamp("24y100d10h30m00s"), None);
        assert_eq!(parse_scan_timestamp("2024y100d25h30m00s"), None);
        assert_eq!(parse_scan_timestamp("2024-04-09T10:30:00"), None);
        // Signs and whitespace slip through integer parsing.
        assert_eq!(parse_scan_timestamp("+024y100d10h30m00s"), None);
        assert_eq!(parse_scan_timestamp("2024y+10d10h30m00s"), None);
        assert_eq!(parse_scan_timestamp("2024y100d+1h30m00s"), None);
        assert_eq!(parse_scan_timestamp("2024y100d10h 3m00s"), None);
        assert_eq!(parse_scan_timestamp("2024y100d10h30m+0s"), None);
        assert_eq!(parse_scan_timestamp("2024yd10h30m00s"), None);
    }

    #[test]
    fn scan_list_rejects_non_finite_size() {
        let r = response(
            "list",
            &[
                "1",
                "1",
                "scan_a",
                "NaN",
                "2023y001d00h00m01s",
                "2",
                "scan_b",
                "inf",
                "2023y001d00h00m02s",
                "3",
                "scan_c",
                "12.25",
                "2023y001d00h00m03s",
            ],
        );
        let listing = parse_scan_list(&r).unwrap();

        let names: Vec<&str> = listing.records.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["scan_c"]);
        let rejected: Vec<usize> = listing.rejected.iter().map(|e| e.index).collect();
        assert_eq!(rejected, vec![0, 1]);
        assert!(listing.rejected[0].reason.contains("bad size"));
    }

    // ---------------------------------------------------------------
    // record
    // ---------------------------------------------------------------

    #[test]
    fn recording_state() {
        let r = parse_response(b"!record?0:0:on:12:exp1_stn_scan12;\n").unwrap();
        let s = parse_recording_state(&r).unwrap();
        assert_eq!(
            s,
            RecordingState {
                state: "on".into(),
                scan_number: "12".into(),
                scan_name: "exp1_stn_scan12".into(),
            }
        );
    }

    #[test]
    fn recording_state_short() {
        let r = response("record", &["off", "0"]);
        match parse_recording_state(&r) {
            Err(Error::FieldDecode(e)) => assert_eq!(e.field, "scan_name"),
            other => panic!("expected FieldDecode, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // input_stream
    // ---------------------------------------------------------------

    #[test]
    fn input_streams_two_groups() {
        let r = response(
            "input_stream",
            &[
                "a", "vdif", "8224", "50", "42", "eth3", "239.0.0.1", "4001", "12",
                "b", "vdif", "8224", "50", "42", "eth5", "239.0.0.2", "4002", "34",
            ],
        );
        let streams = parse_input_streams(&r).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(
            streams[0],
            InputStream {
                label: "a".into(),
                data_format: "vdif".into(),
                payload_size: 8224,
                payload_offset: 50,
                psn_offset: 42,
                interface: "eth3".into(),
                filter_address: "239.0.0.1".into(),
                port: 4001,
                slots: "12".into(),
            }
        );
        assert_eq!(streams[1].interface, "eth5");
        assert_eq!(streams[1].port, 4002);
    }

    #[test]
    fn input_streams_empty() {
        let r = response("input_stream", &[]);
        assert!(parse_input_streams(&r).unwrap().is_empty());
    }

    #[test]
    fn input_streams_incomplete_group() {
        let r = response(
            "input_stream",
            &["a", "vdif", "8224", "50", "42", "eth3", "239.0.0.1", "4001"],
        );
        assert!(matches!(
            parse_input_streams(&r),
            Err(Error::FieldDecode(_))
        ));
    }

    #[test]
    fn input_streams_bad_port() {
        let r = response(
            "input_stream",
            &["a", "vdif", "8224", "50", "42", "eth3", "239.0.0.1", "99999", "12"],
        );
        match parse_input_streams(&r) {
            Err(Error::FieldDecode(e)) => assert_eq!(e.field, "port"),
            other => panic!("expected FieldDecode, got {other:?}"),
        }
    }
}
