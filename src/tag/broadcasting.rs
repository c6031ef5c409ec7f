use core::num::Wrapping;

#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};

#[cfg(not(feature = "defmt"))]
use log::{debug, info, warn};

use crate::{
    configs::Role,
    error::Error,
    interface::{IntervalTimer, Radio, TimerError},
    packet::{Message as _, TagPoll, FCS_LEN},
    ranging::RangeCalculator,
    time::{Instant, Microseconds},
};

use super::{Action, State, Tag};


impl<C> Tag<C>
where
    C: RangeCalculator,
{
    /// Sends the broadcast that is due
    ///
    /// If the broadcast can't be sent, the ranging event is halted.
    pub(super) fn broadcast_next<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        match self.try_broadcast_next(radio, timer) {
            Ok(action) => Ok(action),
            Err(error) => {
                self.halt(timer)?;
                Err(error)
            }
        }
    }

    fn try_broadcast_next<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        let subsequence = self.subsequence;
        let last = subsequence as usize + 1 >= self.config.num_broadcasts as usize;

        // No more timer interrupts needed after this one
        if last {
            self.stop_timer(timer)?;
        }

        radio
            .configure_broadcast_slot(Role::Tag, subsequence)
            .map_err(Error::Radio)?;
        let send_time = self.send_poll(radio, subsequence, last)?;

        debug!(
            "broadcast {} scheduled for {}",
            subsequence,
            send_time.value()
        );

        self.subsequence += 1;
        if last {
            self.state = State::AwaitingTransition;
        }

        Ok(Action::BroadcastSent { subsequence })
    }

    /// Stamps the poll template and schedules it for delayed transmission
    ///
    /// The send time is recorded before the transmission is started, so it's
    /// there even if the radio reports the transmission before this method
    /// returns. It's discarded again if the radio refuses the frame.
    fn send_poll<R>(
        &mut self,
        radio: &mut R,
        subsequence: u8,
        expect_response: bool,
    ) -> Result<Instant, Error<R::Error>>
    where
        R: Radio,
    {
        self.seq += Wrapping(1);
        self.poll.header.seq = self.seq.0;
        self.poll.payload.subsequence = subsequence;

        let mut buf = [0; TagPoll::LEN];
        let len = self.poll.encode(&mut buf)?;

        // The radio might still be receiving from the previous event.
        radio.force_idle().map_err(Error::Radio)?;

        // Delayed transmissions ignore the lowest 9 bits of the send time.
        let now = radio.sys_time().map_err(Error::Radio)?;
        let delay = self.config.tx_delay(len + FCS_LEN);
        let send_time = Instant::from_hi32(now.hi32().wrapping_add(delay.hi32()) & !1);

        self.store
            .record_send_time(subsequence as usize, send_time)?;
        if let Err(error) = radio.transmit(&buf[..len], send_time, expect_response) {
            self.store.discard_send_time(subsequence as usize);
            return Err(Error::Radio(error));
        }

        Ok(send_time)
    }

    /// Switches over to the listening phase, once the last broadcast is out
    pub(super) fn start_listening<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        self.listening_window = 0;
        self.store.clear_responses();

        if let Err(error) = self.apply_listening_window(radio) {
            self.halt(timer)?;
            return Err(error);
        }
        self.state = State::Listening;
        self.start_timer(timer, Microseconds(self.config.listening_window_us as u32));

        info!("broadcasts sent, listening for responses");

        Ok(Action::ListeningStarted)
    }

    /// Stops the ranging event after a failed transmission
    ///
    /// The state is left as it is, but the event no longer counts as busy. It
    /// stays incomplete, and all further events are ignored until the next
    /// one is started.
    pub(super) fn halt<T>(&mut self, timer: &mut T) -> Result<Action, TimerError>
    where
        T: IntervalTimer,
    {
        self.halted = true;
        self.stop_timer(timer)?;
        warn!(
            "ranging event halted after {} broadcasts",
            self.subsequence
        );

        Ok(Action::Halted)
    }
}
