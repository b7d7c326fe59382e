#![cfg_attr(not(test), no_std)]

//! Packet inspection core shared by the XDP program and the user-space loader.
//!
//! Everything here is allocation free and panic free so it can run inside the
//! kernel receive path. The XDP program supplies a [`Frame`] and an
//! [`EventSink`], and [`inspect`] turns them into a [`Verdict`].
//! [`MarkedEcho`] builds the marked packets on the sending side.

pub mod echo;
pub mod event;
pub mod frame;
pub mod header;
pub mod inspect;
pub mod signature;

pub use echo::{checksum, MarkedEcho, MAX_PAYLOAD};
pub use event::{EventSink, MatchEvent};
pub use frame::{Cursor, Frame};
pub use header::{EthView, IcmpView, Ipv4View};
pub use inspect::{inspect, walk, Verdict};
pub use signature::Signature;

/// Name of the perf event array the XDP program publishes matches into.
pub const EVENT_MAP: &str = "ICMP_EVENTS";

/// `u8` global of the XDP program, non-zero makes it log malformed frames.
pub const LOG_INVALID: &str = "LOG_INVALID";

/// Name of the XDP program inside the object file.
pub const PROGRAM_NAME: &str = "icmp_mark";
