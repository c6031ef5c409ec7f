//! Errors that can occur while running a ranging event

use core::fmt;
use ssmarshal;

use crate::interface::TimerError;


/// An error that can occur while driving the ranging state machine
///
/// `E` is the error type of the [`Radio`](crate::interface::Radio)
/// implementation.
pub enum Error<E> {
    /// The radio driver reported an error
    Radio(E),

    /// The interval timer could not be stopped
    Timer,

    /// A packet could not be encoded or decoded
    Codec(CodecError),

    /// The timestamp store rejected a write
    Store(StoreError),

    /// The tag configuration is not valid
    Config(ConfigError),

    /// A ranging event is already in progress
    ///
    /// Only returned if the tag was configured with
    /// [`RestartPolicy::Reject`](crate::configs::RestartPolicy::Reject).
    Busy,
}

impl<E> From<TimerError> for Error<E> {
    fn from(_: TimerError) -> Self {
        Error::Timer
    }
}

impl<E> From<CodecError> for Error<E> {
    fn from(error: CodecError) -> Self {
        Error::Codec(error)
    }
}

impl<E> From<StoreError> for Error<E> {
    fn from(error: StoreError) -> Self {
        Error::Store(error)
    }
}

impl<E> From<ConfigError> for Error<E> {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

// We can't derive this implementation, as that would require `E: Debug` on the
// type itself.
impl<E> fmt::Debug for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Radio(error) => write!(f, "Radio({:?})", error),
            Error::Timer => write!(f, "Timer"),
            Error::Codec(error) => write!(f, "Codec({:?})", error),
            Error::Store(error) => write!(f, "Store({:?})", error),
            Error::Config(error) => write!(f, "Config({:?})", error),
            Error::Busy => write!(f, "Busy"),
        }
    }
}


/// An error that can occur while encoding or decoding a packet
#[derive(Debug)]
pub enum CodecError {
    /// Buffer too small
    BufferTooSmall {
        /// Indicates how large a buffer would have been required
        required_len: usize,
    },

    /// An error occured while serializing or deserializing a message body
    Ssmarshal(ssmarshal::Error),

    /// An error occured while reading or writing the frame header
    Byte(byte::Error),
}

impl From<ssmarshal::Error> for CodecError {
    fn from(error: ssmarshal::Error) -> Self {
        CodecError::Ssmarshal(error)
    }
}

impl From<byte::Error> for CodecError {
    fn from(error: byte::Error) -> Self {
        CodecError::Byte(error)
    }
}


/// Returned by the [`TimestampStore`](crate::store::TimestampStore) if a write
/// would break its ordering guarantees
#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Send times must be recorded once per subsequence, in order
    OutOfOrder {
        /// The subsequence whose send time is due next
        expected: usize,
        /// The subsequence that was passed
        index: usize,
    },

    /// All send time slots are taken
    Full,
}


/// Returned by [`TagConfig::validate`](crate::configs::TagConfig::validate)
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one broadcast has to be sent per ranging event
    NoBroadcasts,

    /// More broadcasts than fit into an anchor's response
    TooManyBroadcasts {
        /// The largest supported number of broadcasts
        max: usize,
    },

    /// At least one listening window is required
    NoListeningWindows,

    /// Timer periods must not be zero
    ZeroPeriod,
}
