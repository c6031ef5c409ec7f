//! The collaborators the ranging state machine depends on
//!
//! The tag doesn't talk to the hardware itself. It expects a radio driver that
//! implements [`Radio`], and a timer that implements [`IntervalTimer`]. Both
//! report back through the interrupt service layer of the firmware, which turns
//! their interrupts into [`Event`](crate::tag::Event)s and passes them to
//! [`Tag::on_event`](crate::tag::Tag::on_event).

use embedded_hal::timer::{Cancel, CountDown, Periodic};

use crate::{configs::Role, mac, time::{Instant, Microseconds}};


/// The radio operations the ranging state machine needs
///
/// Transmission and reception are asynchronous: [`Radio::transmit`] only
/// starts the transmission, and the driver is expected to report the outcome
/// later, as [`Event::TxDone`](crate::tag::Event::TxDone) or
/// [`Event::TxFailed`](crate::tag::Event::TxFailed).
pub trait Radio {
    /// The error type of the driver
    type Error;

    /// Reads the node's unique identifier
    fn eui(&mut self) -> Result<mac::ExtendedAddress, Self::Error>;

    /// Reads the current system time
    fn sys_time(&mut self) -> Result<Instant, Self::Error>;

    /// Applies channel and antenna settings for broadcast `subsequence`
    ///
    /// [`SlotSettings::for_subsequence`](crate::configs::SlotSettings::for_subsequence)
    /// describes the schedule anchors expect.
    fn configure_broadcast_slot(&mut self, role: Role, subsequence: u8) -> Result<(), Self::Error>;

    /// Applies receiver settings for listening window `window`
    fn configure_listening_window(&mut self, role: Role, window: u8) -> Result<(), Self::Error>;

    /// Starts a delayed transmission of `data`
    ///
    /// The frame must go out at exactly `send_time`. If `expect_response` is
    /// set, the driver switches the receiver on as soon as the transmission is
    /// done.
    fn transmit(
        &mut self,
        data: &[u8],
        send_time: Instant,
        expect_response: bool,
    ) -> Result<(), Self::Error>;

    /// Switches the receiver on
    fn enable_receiver(&mut self) -> Result<(), Self::Error>;

    /// Stops any ongoing transmission or reception
    fn force_idle(&mut self) -> Result<(), Self::Error>;

    /// Reads the time the last frame was received, in local system time
    fn rx_timestamp(&mut self) -> Result<Instant, Self::Error>;

    /// Copies the first `buffer.len()` bytes of the last received frame
    fn read_rx_data(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;
}


/// A timer that fires repeatedly until it is stopped
///
/// Every time the timer fires, the firmware is expected to pass
/// [`Event::TimerFired`](crate::tag::Event::TimerFired) to the tag.
///
/// Implemented for all `embedded-hal` timers that are periodic and can be
/// cancelled.
pub trait IntervalTimer {
    /// Starts the timer, replacing any period it was running with
    fn start_periodic(&mut self, period: Microseconds);

    /// Stops the timer
    fn stop(&mut self) -> Result<(), TimerError>;
}

impl<T> IntervalTimer for T
where
    T: CountDown + Cancel + Periodic,
    T::Time: From<Microseconds>,
{
    fn start_periodic(&mut self, period: Microseconds) {
        self.start(period);
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        self.cancel().map_err(|_| TimerError)
    }
}


/// The timer could not be stopped
#[derive(Debug, PartialEq, Eq)]
pub struct TimerError;


/// Reasons why a reception failed
///
/// Reported by the driver as [`Event::RxFailed`](crate::tag::Event::RxFailed).
/// None of these end the ranging event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFault {
    /// Receiver FCS error
    Fcs,

    /// PHY header error
    Phy,

    /// Receiver Reed Solomon Frame Sync Loss
    ReedSolomon,

    /// Receiver Frame Wait Timeout
    FrameWaitTimeout,

    /// Receiver Overrun
    Overrun,

    /// Preamble Detection Timeout
    PreambleDetectionTimeout,

    /// Receiver SFD Timeout
    SfdTimeout,

    /// Frame was rejected due to automatic frame filtering
    FrameFilteringRejection,
}
