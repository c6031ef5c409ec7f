//! Timestamps collected during a ranging event
//!
//! The [`TimestampStore`] holds everything the range calculation needs: when
//! the tag sent each of its broadcasts, and what every anchor that answered
//! reported back. It's cleared whenever a new ranging event starts.

use heapless::Vec;

use crate::{
    configs::{MAX_ANCHOR_RESPONSES, NUM_RANGING_BROADCASTS},
    error::StoreError,
    mac,
    packet::{AnchorFinal, Frame},
    time::Instant,
};


/// What one anchor reported about a ranging event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorResponse {
    /// The anchor's EUI
    pub anchor: mac::ExtendedAddress,

    /// When the anchor received each broadcast, in anchor system time
    ///
    /// Copied verbatim from the anchor's report. Zero means the broadcast
    /// wasn't received; use [`AnchorResponse::toa`] to access it.
    pub tag_poll_toas: [u64; NUM_RANGING_BROADCASTS],

    /// When the anchor sent its report, in anchor system time
    pub tx_time: Instant,

    /// When the tag received the report, in local system time
    pub rx_time: Instant,
}

impl AnchorResponse {
    /// Creates a record from a received report
    pub fn new(frame: &Frame<AnchorFinal>, rx_time: Instant) -> Self {
        AnchorResponse {
            anchor: frame.header.source,
            tag_poll_toas: frame.payload.toas,
            tx_time: frame.payload.tx_time(),
            rx_time,
        }
    }

    /// When the anchor received broadcast `subsequence`
    ///
    /// Returns `None`, if the anchor didn't receive it, or if the reported
    /// value isn't a valid 40-bit timestamp.
    pub fn toa(&self, subsequence: usize) -> Option<Instant> {
        match self.tag_poll_toas.get(subsequence) {
            Some(0) | None => None,
            Some(toa) => Instant::new(*toa),
        }
    }
}


/// Per-event storage of broadcast send times and anchor responses
#[derive(Debug, Default)]
pub struct TimestampStore {
    send_times: Vec<Instant, NUM_RANGING_BROADCASTS>,
    responses: Vec<AnchorResponse, MAX_ANCHOR_RESPONSES>,
}

impl TimestampStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything about the previous ranging event
    pub fn clear(&mut self) {
        self.send_times.clear();
        self.responses.clear();
    }

    /// Forgets all anchor responses, but keeps the send times
    pub fn clear_responses(&mut self) {
        self.responses.clear();
    }

    /// Records when broadcast `subsequence` is going to be sent
    ///
    /// Every slot can be written once, and slots must be written in order.
    pub fn record_send_time(
        &mut self,
        subsequence: usize,
        send_time: Instant,
    ) -> Result<(), StoreError> {
        let expected = self.send_times.len();
        if subsequence != expected {
            return Err(StoreError::OutOfOrder {
                expected,
                index: subsequence,
            });
        }

        self.send_times
            .push(send_time)
            .map_err(|_| StoreError::Full)
    }

    /// Forgets the send time of broadcast `subsequence`, if it was the last
    /// one recorded
    ///
    /// Used when the radio refuses a broadcast after its send time has been
    /// recorded. Earlier slots are never touched.
    pub fn discard_send_time(&mut self, subsequence: usize) {
        if subsequence + 1 == self.send_times.len() {
            self.send_times.pop();
        }
    }

    /// When broadcast `subsequence` was sent, if it has been sent yet
    pub fn send_time(&self, subsequence: usize) -> Option<Instant> {
        self.send_times.get(subsequence).copied()
    }

    /// The send times recorded so far, indexed by subsequence
    pub fn send_times(&self) -> &[Instant] {
        &self.send_times
    }

    /// Stores an anchor's response
    ///
    /// If the store is already full, the response is handed back.
    pub fn push_response(&mut self, response: AnchorResponse) -> Result<(), AnchorResponse> {
        self.responses.push(response)
    }

    /// The responses received so far, in order of arrival
    pub fn responses(&self) -> &[AnchorResponse] {
        &self.responses
    }

    /// How many anchors have responded
    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if no more responses can be stored
    pub fn is_full(&self) -> bool {
        self.responses.is_full()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn response(anchor: u64) -> AnchorResponse {
        let mut tag_poll_toas = [0; NUM_RANGING_BROADCASTS];
        tag_poll_toas[0] = 1_000 + anchor;

        AnchorResponse {
            anchor: mac::ExtendedAddress(anchor),
            tag_poll_toas,
            tx_time: Instant::from_hi32(anchor as u32),
            rx_time: Instant::new(anchor).unwrap(),
        }
    }

    #[test]
    fn send_times_must_be_recorded_in_order() {
        let mut store = TimestampStore::new();

        store.record_send_time(0, Instant::new(10).unwrap()).unwrap();
        assert_eq!(
            store.record_send_time(0, Instant::new(20).unwrap()),
            Err(StoreError::OutOfOrder {
                expected: 1,
                index: 0
            })
        );
        assert_eq!(
            store.record_send_time(2, Instant::new(20).unwrap()),
            Err(StoreError::OutOfOrder {
                expected: 1,
                index: 2
            })
        );

        assert_eq!(store.send_time(0), Some(Instant::new(10).unwrap()));
        assert_eq!(store.send_time(1), None);
    }

    #[test]
    fn only_the_latest_send_time_can_be_discarded() {
        let mut store = TimestampStore::new();
        store.record_send_time(0, Instant::new(10).unwrap()).unwrap();
        store.record_send_time(1, Instant::new(20).unwrap()).unwrap();

        store.discard_send_time(0);
        assert_eq!(store.send_times().len(), 2);

        store.discard_send_time(1);
        assert_eq!(store.send_times(), &[Instant::new(10).unwrap()]);

        // The slot can be written again
        store.record_send_time(1, Instant::new(30).unwrap()).unwrap();
        assert_eq!(store.send_time(1), Some(Instant::new(30).unwrap()));
    }

    #[test]
    fn send_times_are_bounded() {
        let mut store = TimestampStore::new();

        for i in 0..NUM_RANGING_BROADCASTS {
            store.record_send_time(i, Instant::new(i as u64).unwrap()).unwrap();
        }

        assert_eq!(
            store.record_send_time(NUM_RANGING_BROADCASTS, Instant::new(0).unwrap()),
            Err(StoreError::Full)
        );
    }

    #[test]
    fn responses_saturate_without_touching_stored_ones() {
        let mut store = TimestampStore::new();

        for anchor in 0..MAX_ANCHOR_RESPONSES as u64 {
            store.push_response(response(anchor)).unwrap();
        }
        assert!(store.is_full());

        let rejected = store.push_response(response(99)).unwrap_err();
        assert_eq!(rejected.anchor, mac::ExtendedAddress(99));
        assert_eq!(store.response_count(), MAX_ANCHOR_RESPONSES);

        for (i, stored) in store.responses().iter().enumerate() {
            assert_eq!(*stored, response(i as u64));
        }
    }

    #[test]
    fn clear_forgets_the_previous_event() {
        let mut store = TimestampStore::new();
        store.record_send_time(0, Instant::new(5).unwrap()).unwrap();
        store.push_response(response(1)).unwrap();

        store.clear_responses();
        assert_eq!(store.response_count(), 0);
        assert_eq!(store.send_times().len(), 1);

        store.clear();
        assert!(store.send_times().is_empty());
        store.record_send_time(0, Instant::new(6).unwrap()).unwrap();
    }

    #[test]
    fn missing_and_invalid_toas_are_none() {
        let mut record = response(3);
        record.tag_poll_toas[1] = 0;
        record.tag_poll_toas[2] = u64::max_value();

        assert_eq!(record.toa(0), Some(Instant::new(1_003).unwrap()));
        assert_eq!(record.toa(1), None);
        assert_eq!(record.toa(2), None);
        assert_eq!(record.toa(NUM_RANGING_BROADCASTS), None);
    }
}
