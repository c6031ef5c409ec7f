//! Computes distances once a ranging event is complete
//!
//! At the end of the listening phase, the tag knows when it sent each of its
//! broadcasts (in local time), and for every anchor that answered, when that
//! anchor received each broadcast and when it sent its answer (both in the
//! anchor's time), as well as when the answer arrived (in local time).
//!
//! How to turn that into distances is up to a [`RangeCalculator`]. The
//! [`DriftCompensatedTwr`] calculator provided here treats every broadcast the
//! anchor received as a separate two-way exchange with the anchor's answer:
//!
//! - The round-trip time is measured by the tag, from sending the broadcast to
//!   receiving the answer.
//! - The reply time is measured by the anchor, from receiving the broadcast to
//!   sending the answer.
//!
//! The two clocks don't run at exactly the same rate. Over a burst of
//! broadcasts that would add an error of several centimeters, so the reply
//! time is first converted into local time, using the ratio of the time
//! between the first and last broadcast as seen by both sides. The time of
//! flight is then half of the difference between round-trip time and reply
//! time, and the median over all broadcasts is used.

use core::convert::TryFrom;

use heapless::Vec;

use crate::{
    configs::{MAX_ANCHOR_RESPONSES, NUM_RANGING_BROADCASTS},
    mac,
    store::{AnchorResponse, TimestampStore},
    time::Instant,
};


/// The result of a ranging event: one entry per anchor that answered
pub type Ranges = Vec<AnchorRange, MAX_ANCHOR_RESPONSES>;


/// The outcome of the range calculation for one anchor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorRange {
    /// The anchor's EUI
    pub anchor: mac::ExtendedAddress,

    /// The distance to the anchor in millimeters, or why there is none
    pub distance_mm: Result<u64, ComputeDistanceError>,
}


/// Turns the timestamps of a completed ranging event into distances
///
/// Called exactly once per ranging event, from within the state machine, so
/// implementations should do a bounded amount of work.
pub trait RangeCalculator {
    /// Computes the distance to every anchor in `store`
    fn compute(&mut self, store: &TimestampStore) -> Ranges;
}


/// Default range calculator, see [module documentation]
///
/// [module documentation]: index.html
#[derive(Clone, Copy, Debug, Default)]
pub struct DriftCompensatedTwr;

impl RangeCalculator for DriftCompensatedTwr {
    fn compute(&mut self, store: &TimestampStore) -> Ranges {
        let mut ranges = Ranges::new();

        for response in store.responses() {
            let range = AnchorRange {
                anchor: response.anchor,
                distance_mm: compute_distance_mm(store.send_times(), response),
            };

            // The store can't hold more responses than `Ranges` can hold.
            if ranges.push(range).is_err() {
                break;
            }
        }

        ranges
    }
}


/// Computes the distance to one anchor
///
/// `send_times` are the local send times of the broadcasts, indexed by
/// subsequence.
pub fn compute_distance_mm(
    send_times: &[Instant],
    response: &AnchorResponse,
) -> Result<u64, ComputeDistanceError> {
    // Broadcasts that were both sent and received, as (tx, rx) pairs
    let mut exchanges: Vec<(Instant, Instant), NUM_RANGING_BROADCASTS> = Vec::new();
    for (subsequence, send_time) in send_times.iter().enumerate() {
        if let Some(toa) = response.toa(subsequence) {
            if exchanges.push((*send_time, toa)).is_err() {
                break;
            }
        }
    }

    let matched = exchanges.len();
    let (first_tx, first_rx) = match exchanges.first() {
        Some(exchange) if matched >= 2 => *exchange,
        _ => return Err(ComputeDistanceError::InsufficientData { matched }),
    };
    let (last_tx, last_rx) = exchanges[matched - 1];

    let local_span = last_tx.duration_since(first_tx).value() as i128;
    let anchor_span = last_rx.duration_since(first_rx).value() as i128;
    if local_span == 0 || anchor_span == 0 {
        return Err(ComputeDistanceError::InsufficientData { matched });
    }

    let mut times_of_flight: Vec<i64, NUM_RANGING_BROADCASTS> = Vec::new();
    for (tx, rx) in exchanges.iter() {
        let round_trip = response.rx_time.duration_since(*tx).value() as i128;
        let reply = response.tx_time.duration_since(*rx).value() as i128;
        let reply_local = reply * local_span / anchor_span;

        let time_of_flight = i64::try_from((round_trip - reply_local) / 2)
            .map_err(|_| ComputeDistanceError::TimeOfFlightTooLarge)?;
        if times_of_flight.push(time_of_flight).is_err() {
            break;
        }
    }

    times_of_flight.sort_unstable();
    let middle = times_of_flight.len() / 2;
    let time_of_flight = if times_of_flight.len() % 2 == 0 {
        (times_of_flight[middle - 1] + times_of_flight[middle]) / 2
    } else {
        times_of_flight[middle]
    };

    // Clock noise can push very short distances below zero.
    if time_of_flight <= 0 {
        return Ok(0);
    }

    // Nominally, all time units are based on a 64 Ghz clock, meaning each time
    // unit is 1/64 ns.

    const SPEED_OF_LIGHT: u64 = 299_792_458; // m/s or nm/ns

    let distance_nm_times_64 = SPEED_OF_LIGHT
        .checked_mul(time_of_flight as u64)
        .ok_or(ComputeDistanceError::TimeOfFlightTooLarge)?;
    let distance_mm = (distance_nm_times_64 / 64) / 1_000_000;

    Ok(distance_mm)
}


/// Returned from [`compute_distance_mm`] in case of an error
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComputeDistanceError {
    /// Not enough broadcasts were received by the anchor
    ///
    /// At least two are needed to estimate the anchor's clock rate.
    InsufficientData {
        /// The number of broadcasts both sent and received
        matched: usize,
    },

    /// The time of flight is so large, the distance calculation would overflow
    TimeOfFlightTooLarge,
}
