//! Configuration of the tag and its ranging events
//!
//! The [`TagConfig`] controls how many broadcasts are sent, how the listening
//! phase is laid out and how the tag reacts to overlapping ranging requests.
//! The defaults are the protocol constants anchors expect.

use crate::{error::ConfigError, mac, time::Duration};


/// The PAN id of the ranging network
pub const POLYPOINT_PANID: u16 = 0x6611;

/// The maximum number of broadcasts in a ranging event
///
/// This is the length of the time-of-arrival array anchors send back, so it is
/// fixed by the wire format.
pub const NUM_RANGING_BROADCASTS: usize = 12;

/// The maximum number of anchor responses stored per ranging event
pub const MAX_ANCHOR_RESPONSES: usize = 10;

/// The number of UWB channels broadcasts are spread over
pub const NUM_RANGING_CHANNELS: usize = 3;

/// The number of antennas a node can switch between
pub const NUM_ANTENNAS: u8 = 4;

const RANGING_CHANNELS: [UwbChannel; NUM_RANGING_CHANNELS] = [
    UwbChannel::Channel1,
    UwbChannel::Channel3,
    UwbChannel::Channel5,
];


/// Tag configuration
#[derive(Clone, Debug)]
pub struct TagConfig {
    /// The PAN id written into outgoing broadcasts
    pub pan_id: mac::PanId,
    /// How many broadcasts make up one ranging event
    ///
    /// Must be in `1..=NUM_RANGING_BROADCASTS`.
    pub num_broadcasts: u8,
    /// Time between two broadcasts
    pub broadcast_period_us: u32,
    /// How many listening windows follow the broadcasts
    pub num_listening_windows: u8,
    /// The length of a listening window
    ///
    /// Anchors learn this from the broadcast, so it doubles as the timer
    /// period of the listening phase.
    pub listening_window_us: u16,
    /// The length of an anchor's response slot within a listening window
    pub listening_slot_us: u16,
    /// Fixed part of the margin between reading the system time and a
    /// delayed transmission
    pub tx_delay_base_ns: u32,
    /// Part of the transmission margin that scales with the frame length
    pub tx_delay_per_byte_ns: u32,
    /// What to do if a ranging event is requested while one is in progress
    pub restart_policy: RestartPolicy,
}

impl Default for TagConfig {
    fn default() -> Self {
        TagConfig {
            pan_id: mac::PanId(POLYPOINT_PANID),
            num_broadcasts: NUM_RANGING_BROADCASTS as u8,
            broadcast_period_us: 2_000,
            num_listening_windows: NUM_RANGING_CHANNELS as u8,
            listening_window_us: 10_000,
            listening_slot_us: 2_000,
            tx_delay_base_ns: 200_000,
            tx_delay_per_byte_ns: 8_000,
            restart_policy: Default::default(),
        }
    }
}

impl TagConfig {
    /// Checks the configuration for values the state machine can't work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_broadcasts == 0 {
            return Err(ConfigError::NoBroadcasts);
        }
        if self.num_broadcasts as usize > NUM_RANGING_BROADCASTS {
            return Err(ConfigError::TooManyBroadcasts {
                max: NUM_RANGING_BROADCASTS,
            });
        }
        if self.num_listening_windows == 0 {
            return Err(ConfigError::NoListeningWindows);
        }
        if self.broadcast_period_us == 0 || self.listening_window_us == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        Ok(())
    }

    /// The time between reading the system time and sending a frame
    ///
    /// `frame_len` is the full frame length, including the FCS. The radio
    /// needs to be done loading the frame before the delayed transmission
    /// starts, so longer frames get a longer margin.
    pub fn tx_delay(&self, frame_len: usize) -> Duration {
        let per_byte = self.tx_delay_per_byte_ns.saturating_mul(frame_len as u32);
        Duration::from_nanos(self.tx_delay_base_ns.saturating_add(per_byte))
    }
}


/// Decides what happens if a ranging event is started while another one is
/// still in progress
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartPolicy {
    /// Abort the running event and start over
    Restart,
    /// Leave the running event alone and return `Error::Busy`
    Reject,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::Restart
    }
}


/// The role a node plays in the ranging protocol
///
/// Passed to the radio when it's asked to apply slot or window settings, as
/// tags and anchors use the same schedule from opposite ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// A mobile node that initiates ranging events
    Tag,
    /// A fixed node that answers them
    Anchor,
}


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// An enum that specifies the channel to use for the radio.
///
/// The numbers match the IEEE 802.15.4-2011 UWB channel numbers. Only the
/// channels broadcasts are spread over are listed.
pub enum UwbChannel {
    /// Channel 1, centre frequency 3494.4 MHz
    Channel1 = 1,
    /// Channel 3, centre frequency 4492.8 MHz
    Channel3 = 3,
    /// Channel 5, centre frequency 6489.6 MHz
    Channel5 = 5,
}

impl Default for UwbChannel {
    fn default() -> Self {
        UwbChannel::Channel5
    }
}


/// Radio settings for one step of a ranging event
///
/// Implementations of [`Radio`](crate::interface::Radio) can use this to turn
/// the subsequence or window index they are handed into channel and antenna
/// settings. Broadcasts cycle through the ranging channels first and switch
/// antennas after each full cycle, so every channel is measured with every
/// antenna.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotSettings {
    /// The channel to send or receive on
    pub channel: UwbChannel,
    /// The antenna to use
    pub antenna: u8,
}

impl SlotSettings {
    /// The settings for broadcast `subsequence`
    pub fn for_subsequence(subsequence: u8) -> Self {
        let index = subsequence as usize;

        SlotSettings {
            channel: RANGING_CHANNELS[index % NUM_RANGING_CHANNELS],
            antenna: ((index / NUM_RANGING_CHANNELS) % NUM_ANTENNAS as usize) as u8,
        }
    }

    /// The settings for listening window `window`
    ///
    /// Anchors answer on one channel per window, always on the first antenna.
    pub fn for_listening_window(window: u8) -> Self {
        SlotSettings {
            channel: RANGING_CHANNELS[window as usize % NUM_RANGING_CHANNELS],
            antenna: 0,
        }
    }
}
