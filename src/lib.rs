//! Tag side of broadcast-based UWB ranging
//!
//! A tag measures its distance to a set of fixed anchors in ranging events. In
//! every event, the tag sends a burst of broadcasts, spread over several
//! channels and antennas, then listens while the anchors answer one after
//! another with a report of when they received each broadcast. From the send
//! times, the reports, and the arrival times of the reports, the tag computes
//! the distance to every anchor that answered.
//!
//! The entry point to this crate is [`Tag`], which implements the tag's half of
//! the protocol as a state machine. It doesn't access any hardware itself.
//! Instead, it drives a radio through the [`Radio`] trait and paces itself with
//! an [`IntervalTimer`]. The firmware passes every interrupt to
//! [`Tag::on_event`].
//!
//! The other modules are building blocks the state machine is made of, and are
//! available separately for anchor implementations and tests:
//! - [`packet`]: wire format of the ranging protocol
//! - [`store`]: the timestamps collected during a ranging event
//! - [`ranging`]: turns the timestamps into distances
//! - [`time`]: 40-bit radio timestamps
//!
//! [`Radio`]: interface::Radio
//! [`IntervalTimer`]: interface::IntervalTimer


#![cfg_attr(not(test), no_std)]

#![deny(missing_docs)]


pub mod configs;
pub mod error;
pub mod interface;
pub mod packet;
pub mod ranging;
pub mod store;
pub mod tag;
pub mod time;

#[cfg(test)]
mod mock;


pub use ieee802154::mac;

pub use crate::{
    configs::{RestartPolicy, TagConfig},
    error::Error,
    interface::{IntervalTimer, Radio, RxFault},
    ranging::{AnchorRange, DriftCompensatedTwr, RangeCalculator, Ranges},
    tag::{Action, Event, State, Tag},
    time::{Duration, Instant, Microseconds},
};
