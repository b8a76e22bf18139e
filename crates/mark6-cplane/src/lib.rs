//! cplane protocol engine for Mark6 recorders.
//!
//! The recorder's control plane is a line-oriented text protocol on TCP:
//!
//! ```text
//! request:  <name>?<args>;\n        or  <name>=<args>;\n
//! response: !<name>?<cplane>:<dplane>:<field>:...;\n
//! ```
//!
//! One request is outstanding at a time and the `;` terminator is the only
//! frame boundary. This crate provides:
//!
//! - [`protocol`] -- command normalisation and response parsing
//! - [`frame`] -- bounded read-until-terminator over a [`Transport`](mark6_core::Transport)
//! - [`commands`] -- command builders and one decoder per command family
//! - [`session`] -- [`Session`], which ties the above to one connection
//!
//! # Example
//!
//! ```
//! use mark6_cplane::protocol::parse_response;
//! use mark6_cplane::commands::parse_recording_state;
//!
//! let response = parse_response(b"!record?0:0:on:12:exp1_stn_scan12;\n").unwrap();
//! let state = parse_recording_state(&response).unwrap();
//! assert_eq!(state.state, "on");
//! assert_eq!(state.scan_name, "exp1_stn_scan12");
//! ```

pub mod commands;
pub mod frame;
pub mod protocol;
pub mod session;

pub use commands::{RecordDecodeError, ScanListing};
pub use frame::FrameLimits;
pub use session::{Session, SessionConfig};
