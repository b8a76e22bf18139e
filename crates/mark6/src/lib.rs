//! # mark6 -- async client for Mark6 VLBI recorders
//!
//! Talks to the recorder's control plane ("cplane"), a `;`-terminated text
//! protocol on TCP port 14242, and decodes its replies into typed records:
//! per-slot module status, the scan list, the recording state and the
//! configured network input streams.
//!
//! ```no_run
//! use mark6::Mark6Builder;
//!
//! # async fn example() -> mark6::Result<()> {
//! let mut recorder = Mark6Builder::new("mark6-01").build().await?;
//!
//! for failure in recorder.read_slot_info().await {
//!     eprintln!("slot {}: {}", failure.slot, failure.error);
//! }
//! for status in recorder.slots().iter().flatten() {
//!     println!("{} {} {:.1}% free", status.slot, status.emsn.vsn(), status.free_percentage());
//! }
//!
//! recorder.read_scan_list().await?;
//! if let Some(scan) = recorder.get_scan_by_name("exp1_wf_no0001") {
//!     println!("{} GB at {}", scan.size, scan.date_created);
//! }
//! recorder.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                | Purpose                                          |
//! |----------------------|--------------------------------------------------|
//! | `mark6-core`         | [`Transport`] trait, domain types, errors        |
//! | `mark6-transport`    | [`TcpTransport`]                                 |
//! | `mark6-cplane`       | Framing, parsing, decoders and [`Session`]       |
//! | `mark6-test-harness` | Scripted mock transport and mock TCP recorder    |
//! | **`mark6`**          | This facade: [`Mark6Builder`] and [`Mark6`]      |
//!
//! Commands without a dedicated method can be issued through
//! [`Mark6::send_command`], with the builders in [`commands`] or as raw text.

pub mod builder;
pub mod client;

pub use builder::Mark6Builder;
pub use client::{Mark6, SlotFailure};

pub use mark6_core::*;
pub use mark6_cplane::{
    FrameLimits, RecordDecodeError, ScanListing, Session, SessionConfig, commands, protocol,
};
pub use mark6_transport::{DEFAULT_PORT, TcpTransport};
