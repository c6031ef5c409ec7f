//! The tag side of a ranging event
//!
//! The entry point to this module is the [`Tag`] struct. A ranging event runs
//! through the following states:
//!
//! 1. [`State::Broadcasting`]: every time the interval timer fires, one
//!    [`TagPoll`] is sent with a delayed transmission.
//! 2. [`State::AwaitingTransition`]: the last broadcast is on its way. Once the
//!    radio reports that it was sent, the listening phase begins.
//! 3. [`State::Listening`]: the receiver is on, and anchor responses are
//!    collected. Every time the interval timer fires, the next listening
//!    window begins.
//! 4. [`State::ComputingRanges`]: the last listening window is over, and the
//!    [`RangeCalculator`] has been invoked.
//!
//! The tag never waits for anything. The firmware passes every timer and radio
//! interrupt to [`Tag::on_event`], which does whatever needs doing and returns
//! right away.

use core::num::Wrapping;

#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};

#[cfg(not(feature = "defmt"))]
use log::{debug, info, warn};

use crate::{
    configs::{RestartPolicy, TagConfig},
    error::Error,
    interface::{IntervalTimer, Radio, RxFault, TimerError},
    mac,
    packet::{Frame, Header, TagPoll},
    ranging::{AnchorRange, DriftCompensatedTwr, RangeCalculator, Ranges},
    store::TimestampStore,
    time::Microseconds,
};

mod broadcasting;
mod listening;



/// The state of the ranging state machine
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No ranging event has been started yet
    Idle,
    /// Broadcasts are being sent
    Broadcasting,
    /// The last broadcast has been scheduled, waiting for it to go out
    AwaitingTransition,
    /// Collecting anchor responses
    Listening,
    /// The ranging event is complete, see [`Tag::ranges`]
    ComputingRanges,
}

impl State {
    /// Returns true if a ranging event is in progress
    pub fn is_busy(&self) -> bool {
        match self {
            State::Broadcasting | State::AwaitingTransition | State::Listening => true,
            State::Idle | State::ComputingRanges => false,
        }
    }
}


/// Something that happened outside of the state machine
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The interval timer fired
    TimerFired,

    /// A transmission has finished
    TxDone,

    /// A transmission could not be completed
    TxFailed,

    /// A frame has been received
    RxDone {
        /// The length of the received frame, as reported by the radio
        len: usize,
    },

    /// A reception failed
    RxFailed(RxFault),
}


/// What the state machine did in response to an [`Event`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// A broadcast has been scheduled
    BroadcastSent {
        /// The subsequence number of the broadcast
        subsequence: u8,
    },

    /// The broadcasts are done and the receiver has been switched on
    ListeningStarted,

    /// The next listening window has begun
    WindowAdvanced {
        /// Index of the listening window that just began
        window: u8,
    },

    /// An anchor response has been stored
    ResponseStored {
        /// The anchor that responded
        anchor: mac::ExtendedAddress,
    },

    /// An anchor response arrived after the store filled up
    ResponseDropped {
        /// The anchor that responded
        anchor: mac::ExtendedAddress,
    },

    /// The receiver settings of the current window have been reapplied after
    /// a reception failure
    ReceiverReset,

    /// The last listening window is over and the ranges have been computed
    RangesComputed,

    /// A transmission failed and the ranging event has been halted
    Halted,

    /// The event doesn't apply to the current state
    Ignored,

    /// Nothing needed to be done
    None,
}


/// The ranging state machine of a tag
///
/// Owns all state of the current ranging event. The radio and timer are
/// passed in with every call, and never held on to.
#[derive(Debug)]
pub struct Tag<C = DriftCompensatedTwr> {
    config: TagConfig,
    state: State,
    poll: Frame<TagPoll>,
    seq: Wrapping<u8>,
    subsequence: u8,
    listening_window: u8,
    store: TimestampStore,
    calculator: C,
    ranges: Ranges,
    timer_armed: bool,
    halted: bool,
}

impl<C> Tag<C>
where
    C: RangeCalculator,
{
    /// Creates a tag that isn't ranging yet
    ///
    /// Reads the radio's EUI, which is used as the source address of every
    /// broadcast. Returns an error, if `config` is not valid.
    pub fn new<R>(radio: &mut R, config: TagConfig, calculator: C) -> Result<Self, Error<R::Error>>
    where
        R: Radio,
    {
        config.validate()?;

        let eui = radio.eui().map_err(Error::Radio)?;
        let poll = Frame {
            header: Header::broadcast(config.pan_id, eui),
            payload: TagPoll::new(&config),
        };

        Ok(Tag {
            config,
            state: State::Idle,
            poll,
            seq: Wrapping(0),
            subsequence: 0,
            listening_window: 0,
            store: TimestampStore::new(),
            calculator,
            ranges: Ranges::new(),
            timer_armed: false,
            halted: false,
        })
    }

    /// Starts a new ranging event
    ///
    /// Forgets everything about the previous event and arms the timer that
    /// paces the broadcasts. If an event is still in progress, what happens
    /// depends on the configured [`RestartPolicy`].
    pub fn start_ranging_event<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> Result<(), Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        if self.is_busy() {
            match self.config.restart_policy {
                RestartPolicy::Reject => {
                    warn!("ranging event requested while busy ({:?})", self.state);
                    return Err(Error::Busy);
                }
                RestartPolicy::Restart => {
                    warn!("restarting ranging event ({:?})", self.state);
                    self.stop_timer(timer)?;
                    radio.force_idle().map_err(Error::Radio)?;
                }
            }
        }

        self.store.clear();
        self.ranges.clear();
        self.subsequence = 0;
        self.listening_window = 0;
        self.state = State::Broadcasting;
        self.halted = false;

        self.start_timer(timer, Microseconds(self.config.broadcast_period_us));
        info!("ranging event started");

        Ok(())
    }

    /// Advances the state machine
    ///
    /// Must be called for every interrupt of the radio and the interval timer,
    /// one at a time. Events that don't make sense in the current state, like
    /// a timer interrupt that was already pending when the timer was stopped,
    /// are ignored.
    pub fn on_event<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
        event: Event,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        if self.halted {
            debug!("ignoring {:?}, ranging event halted", event);
            return Ok(Action::Ignored);
        }

        match (self.state, event) {
            (State::Broadcasting, Event::TimerFired) => self.broadcast_next(radio, timer),
            (State::Listening, Event::TimerFired) => self.advance_window(radio, timer),

            (State::AwaitingTransition, Event::TxDone) => self.start_listening(radio, timer),
            (_, Event::TxDone) => Ok(Action::None),

            (State::Broadcasting, Event::TxFailed)
            | (State::AwaitingTransition, Event::TxFailed) => Ok(self.halt(timer)?),

            (State::Listening, Event::RxDone { len }) => self.receive(radio, len),
            (State::Listening, Event::RxFailed(fault)) => self.reset_receiver(radio, fault),

            (state, event) => {
                debug!("ignoring {:?} in state {:?}", event, state);
                Ok(Action::Ignored)
            }
        }
    }

    /// The current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns true if a ranging event is in progress
    ///
    /// A halted event is not in progress, even though its state is left as it
    /// was when it failed.
    pub fn is_busy(&self) -> bool {
        self.state.is_busy() && !self.halted
    }

    /// Returns true if the last ranging event was stopped by a failure
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The configuration the tag was created with
    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// The tag's EUI
    pub fn eui(&self) -> mac::ExtendedAddress {
        self.poll.header.source
    }

    /// The subsequence number of the next broadcast
    pub fn subsequence(&self) -> u8 {
        self.subsequence
    }

    /// The index of the current listening window
    pub fn listening_window(&self) -> u8 {
        self.listening_window
    }

    /// Everything recorded during the current or last ranging event
    pub fn store(&self) -> &TimestampStore {
        &self.store
    }

    /// The ranges computed at the end of the last ranging event
    ///
    /// Empty until a ranging event completes.
    pub fn ranges(&self) -> &[AnchorRange] {
        &self.ranges
    }

    /// The range calculator
    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    fn start_timer<T>(&mut self, timer: &mut T, period: Microseconds)
    where
        T: IntervalTimer,
    {
        timer.start_periodic(period);
        self.timer_armed = true;
    }

    fn stop_timer<T>(&mut self, timer: &mut T) -> Result<(), TimerError>
    where
        T: IntervalTimer,
    {
        if self.timer_armed {
            self.timer_armed = false;
            timer.stop()?;
        }

        Ok(())
    }
}
