//! Reads libpcap and pcapng capture files and reports the decoded headers of
//! each frame
//!
//! ```no_run
//! use pktsniffer::{AnyCaptureReader, FilterExpression, Session};
//!
//! let reader = AnyCaptureReader::open("capture.pcapng")?;
//! let filter = FilterExpression::compile(&["tcp", "and", "port", "80"])?;
//! let summary = Session::new(filter, 10).run(reader, &mut std::io::stdout())?;
//! println!("{} of {} frames matched", summary.rendered, summary.scanned);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod byte_order;
pub mod capture;
pub mod filter;
pub mod layers;
pub mod link_type;
pub mod report;
pub mod session;
mod utils;

#[cfg(test)]
mod test_helpers;

pub use capture::{
    AnyCaptureReader, CaptureError, CaptureFile, CaptureFormat, CaptureReader, FrameRecord,
    Malformed, PcapNgReader,
};
pub use filter::{FilterError, FilterExpression, MatchBudget};
pub use layers::{DecodedFrame, Decoder, Layer, LayerKind};
pub use link_type::LinkType;
pub use session::{CancelToken, Session, SessionError, SessionSummary};
