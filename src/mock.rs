//! Test doubles for the radio and the interval timer

use std::vec::Vec;

use embedded_hal::timer::{Cancel, CountDown, Periodic};
use void::Void;

use crate::{
    configs::{Role, SlotSettings},
    interface::Radio,
    mac,
    time::{Duration, Instant, Microseconds},
};


/// A call the state machine made on the radio
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ConfigureBroadcastSlot(u8),
    ConfigureListeningWindow(u8),
    Transmit {
        data: Vec<u8>,
        send_time: Instant,
        expect_response: bool,
    },
    EnableReceiver,
    ForceIdle,
}


#[derive(Debug, PartialEq, Eq)]
pub struct MockError;


/// Records calls and plays back a single received frame
///
/// The system time advances by `tick` every time it's read.
#[derive(Debug)]
pub struct MockRadio {
    pub eui: mac::ExtendedAddress,
    pub now: Instant,
    pub tick: Duration,
    pub calls: Vec<Call>,
    pub rx_frame: Vec<u8>,
    pub rx_time: Instant,
    pub settings: Option<SlotSettings>,
    pub fail_eui: bool,
    pub fail_transmit: bool,
    pub fail_receiver: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        MockRadio {
            eui: mac::ExtendedAddress(0x0807_0605_0403_0201),
            now: Instant::new(1_000_000).unwrap(),
            // 2 ms
            tick: Duration::from_nanos(2_000_000),
            calls: Vec::new(),
            rx_frame: Vec::new(),
            rx_time: Instant::new(0).unwrap(),
            settings: None,
            fail_eui: false,
            fail_transmit: false,
            fail_receiver: false,
        }
    }

    /// Makes `frame` the next frame to be read
    pub fn receive(&mut self, frame: &[u8], rx_time: Instant) {
        self.rx_frame = frame.to_vec();
        self.rx_time = rx_time;
    }

    /// All transmissions so far, in order
    pub fn transmissions(&self) -> Vec<(Vec<u8>, Instant, bool)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Transmit {
                    data,
                    send_time,
                    expect_response,
                } => Some((data.clone(), *send_time, *expect_response)),
                _ => None,
            })
            .collect()
    }
}

impl Radio for MockRadio {
    type Error = MockError;

    fn eui(&mut self) -> Result<mac::ExtendedAddress, MockError> {
        if self.fail_eui {
            return Err(MockError);
        }
        Ok(self.eui)
    }

    fn sys_time(&mut self) -> Result<Instant, MockError> {
        let now = self.now;
        self.now = self.now + self.tick;
        Ok(now)
    }

    fn configure_broadcast_slot(&mut self, role: Role, subsequence: u8) -> Result<(), MockError> {
        assert_eq!(role, Role::Tag);
        self.settings = Some(SlotSettings::for_subsequence(subsequence));
        self.calls.push(Call::ConfigureBroadcastSlot(subsequence));
        Ok(())
    }

    fn configure_listening_window(&mut self, role: Role, window: u8) -> Result<(), MockError> {
        assert_eq!(role, Role::Tag);
        self.settings = Some(SlotSettings::for_listening_window(window));
        self.calls.push(Call::ConfigureListeningWindow(window));
        Ok(())
    }

    fn transmit(
        &mut self,
        data: &[u8],
        send_time: Instant,
        expect_response: bool,
    ) -> Result<(), MockError> {
        if self.fail_transmit {
            return Err(MockError);
        }
        self.calls.push(Call::Transmit {
            data: data.to_vec(),
            send_time,
            expect_response,
        });
        Ok(())
    }

    fn enable_receiver(&mut self) -> Result<(), MockError> {
        if self.fail_receiver {
            return Err(MockError);
        }
        self.calls.push(Call::EnableReceiver);
        Ok(())
    }

    fn force_idle(&mut self) -> Result<(), MockError> {
        self.calls.push(Call::ForceIdle);
        Ok(())
    }

    fn rx_timestamp(&mut self) -> Result<Instant, MockError> {
        Ok(self.rx_time)
    }

    fn read_rx_data(&mut self, buffer: &mut [u8]) -> Result<(), MockError> {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.rx_frame.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }
}


/// An `embedded-hal` timer that only keeps track of being started and stopped
///
/// Like most HAL timers, cancelling it fails if it isn't running.
#[derive(Debug, Default)]
pub struct MockTimer {
    pub running: Option<Microseconds>,
    pub starts: Vec<Microseconds>,
    pub stops: usize,
}

impl CountDown for MockTimer {
    type Time = Microseconds;

    fn start<T>(&mut self, count: T)
    where
        T: Into<Self::Time>,
    {
        let period = count.into();
        self.running = Some(period);
        self.starts.push(period);
    }

    fn wait(&mut self) -> nb::Result<(), Void> {
        Err(nb::Error::WouldBlock)
    }
}

impl Cancel for MockTimer {
    type Error = ();

    fn cancel(&mut self) -> Result<(), ()> {
        self.stops += 1;
        self.running.take().map(|_| ()).ok_or(())
    }
}

impl Periodic for MockTimer {}
