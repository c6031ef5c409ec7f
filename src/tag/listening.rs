#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};

#[cfg(not(feature = "defmt"))]
use log::{debug, info, warn};

use crate::{
    configs::Role,
    error::Error,
    interface::{IntervalTimer, Radio, RxFault},
    packet::{self, Packet, MAX_FRAME_LEN},
    ranging::RangeCalculator,
    store::AnchorResponse,
};

use super::{Action, State, Tag};


impl<C> Tag<C>
where
    C: RangeCalculator,
{
    /// Moves on to the next listening window, or wraps up the event
    pub(super) fn advance_window<R, T>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
        T: IntervalTimer,
    {
        self.listening_window += 1;

        if self.listening_window < self.config.num_listening_windows {
            self.apply_listening_window(radio)?;
            return Ok(Action::WindowAdvanced {
                window: self.listening_window,
            });
        }

        self.stop_timer(timer)?;
        radio.force_idle().map_err(Error::Radio)?;

        self.state = State::ComputingRanges;
        self.ranges = self.calculator.compute(&self.store);

        info!(
            "ranging event complete, {} anchors responded",
            self.store.response_count()
        );

        Ok(Action::RangesComputed)
    }

    /// Handles a received frame
    pub(super) fn receive<R>(&mut self, radio: &mut R, len: usize) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
    {
        let rx_time = radio.rx_timestamp().map_err(Error::Radio)?;

        let mut buf = [0; MAX_FRAME_LEN];
        let len = len.min(MAX_FRAME_LEN);
        radio
            .read_rx_data(&mut buf[..len])
            .map_err(Error::Radio)?;

        let frame = match packet::decode(&buf[..len]) {
            Ok(Packet::AnchorFinal(frame)) => frame,
            Ok(_) => return Ok(Action::Ignored),
            Err(_) => {
                debug!("dropping malformed frame ({} bytes)", len);
                return Ok(Action::Ignored);
            }
        };

        let anchor = frame.header.source;
        match self.store.push_response(AnchorResponse::new(&frame, rx_time)) {
            Ok(()) => {
                debug!("response from anchor {}", anchor.0);
                Ok(Action::ResponseStored { anchor })
            }
            Err(_) => {
                warn!("no room for response from anchor {}", anchor.0);
                Ok(Action::ResponseDropped { anchor })
            }
        }
    }

    /// Gets the receiver going again after a failed reception
    ///
    /// The window stays the same. Responses received so far are kept.
    pub(super) fn reset_receiver<R>(
        &mut self,
        radio: &mut R,
        fault: RxFault,
    ) -> Result<Action, Error<R::Error>>
    where
        R: Radio,
    {
        debug!(
            "reception failed ({:?}), resetting window {}",
            fault, self.listening_window
        );
        self.apply_listening_window(radio)?;

        Ok(Action::ReceiverReset)
    }

    /// Applies the receive settings of the current window and switches the
    /// receiver on
    pub(super) fn apply_listening_window<R>(&mut self, radio: &mut R) -> Result<(), Error<R::Error>>
    where
        R: Radio,
    {
        radio
            .configure_listening_window(Role::Tag, self.listening_window)
            .map_err(Error::Radio)?;
        radio.enable_receiver().map_err(Error::Radio)?;

        Ok(())
    }
}
