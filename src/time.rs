//! Time-related types based on the radio's system time


use core::ops::Add;
use serde::{Serialize, Deserialize};


/// The maximum value of 40-bit system time stamps.
pub const TIME_MAX: u64 = 0xffffffffff;


/// Represents an instant in time
///
/// Internally uses the same 40-bit timestamps that the DW1000 uses. One tick
/// is nominally 1/64 ns (the chip actually runs at 63.8976 GHz).
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[repr(C)]
pub struct Instant(u64);

impl Instant {
    /// Creates a new instance of `Instant`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use polypoint_tag::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// let valid_instant   = Instant::new(TIME_MAX);
    /// let invalid_instant = Instant::new(TIME_MAX + 1);
    ///
    /// assert!(valid_instant.is_some());
    /// assert!(invalid_instant.is_none());
    /// ```
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Instant(value))
        }
        else {
            None
        }
    }

    /// Creates an `Instant` from the upper 32 bits of a 40-bit timestamp
    ///
    /// Delayed transmissions are scheduled with 32-bit values that leave out
    /// the lowest byte of the system time. Anchors report their transmission
    /// time in the same format. Shifting such a value left by 8 bits gives a
    /// timestamp in the regular 40-bit format.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use polypoint_tag::time::Instant;
    ///
    /// let instant = Instant::from_hi32(0x1234_5678);
    /// assert_eq!(instant.value(), 0x12_3456_7800);
    /// assert_eq!(instant.hi32(), 0x1234_5678);
    /// ```
    pub fn from_hi32(value: u32) -> Self {
        // A `u32` shifted by 8 bits always fits into 40 bits.
        Instant((value as u64) << 8)
    }

    /// Returns the raw 40-bit timestamp
    ///
    /// The returned value is guaranteed to be in the following range:
    /// 0 <= `value` <= 2^40 - 1
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the upper 32 bits of the 40-bit timestamp
    pub fn hi32(&self) -> u32 {
        (self.0 >> 8) as u32
    }

    /// Returns the amount of time passed between the two `Instant`s
    ///
    /// Assumes that `&self` represents a later time than the argument
    /// `earlier`. Please make sure that this is the case, as this method has no
    /// way of knowing (DW1000 timestamps can overflow, so comparing the
    /// numerical value of the timestamp doesn't tell anything about order).
    ///
    /// # Example
    ///
    /// ``` rust
    /// use polypoint_tag::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// // `unwrap`ing here is okay, since we're passing constants that we know
    /// // are in the valid range.
    /// let instant_1 = Instant::new(TIME_MAX - 50).unwrap();
    /// let instant_2 = Instant::new(TIME_MAX).unwrap();
    /// let instant_3 = Instant::new(49).unwrap();
    ///
    /// // Works as expected, if the later timestamp is larger than the earlier
    /// // one.
    /// let duration = instant_2.duration_since(instant_1);
    /// assert_eq!(duration.value(), 50);
    ///
    /// // Still works as expected, if the later timestamp is the numerically
    /// // smaller value.
    /// let duration = instant_3.duration_since(instant_2);
    /// assert_eq!(duration.value(), 50);
    /// ```
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        if self.value() >= earlier.value() {
            Duration(self.value() - earlier.value())
        }
        else {
            Duration(TIME_MAX - earlier.value() + self.value() + 1)
        }
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        // Both `Instant` and `Duration` are guaranteed to contain 40-bit
        // numbers, so the sum fits into a `u64` and wraps around `TIME_MAX`.
        Instant((self.value() + rhs.value()) % (TIME_MAX + 1))
    }
}


/// A duration between two instants in DW1000 system time
///
/// Internally uses the same 40-bit timestamps that the DW1000 uses.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[repr(C)]
pub struct Duration(u64);

impl Duration {
    /// Creates a new instance of `Duration`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Duration(value))
        }
        else {
            None
        }
    }

    /// Creates an instance of `Duration` from a number of nanoseconds
    pub fn from_nanos(nanos: u32) -> Self {
        // `nanos` takes up at most 32 bits before it is cast to `u64`, so the
        // result of the multiplication fits within 38 bits.
        Duration(nanos as u64 * 64)
    }

    /// Returns the raw 40-bit timestamp
    ///
    /// The returned value is guaranteed to be in the following range:
    /// 0 <= `value` <= 2^40 - 1
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the duration in the 32-bit scheduling format
    ///
    /// This drops the lowest 8 bits, see [`Instant::from_hi32`].
    pub fn hi32(&self) -> u32 {
        (self.0 >> 8) as u32
    }
}


/// A timer period in microseconds
///
/// This is what the ranging state machine hands to its
/// [`IntervalTimer`](crate::interface::IntervalTimer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microseconds(pub u32);


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps_around_time_max() {
        let instant = Instant::new(TIME_MAX - 9).unwrap();
        let later = instant + Duration::new(20).unwrap();

        assert_eq!(later.value(), 10);
        assert_eq!(later.duration_since(instant).value(), 20);
    }

    #[test]
    fn hi32_round_trip_drops_low_byte() {
        let instant = Instant::new(0xAB_CDEF_0123).unwrap();

        assert_eq!(instant.hi32(), 0xABCD_EF01);
        assert_eq!(Instant::from_hi32(instant.hi32()).value(), 0xAB_CDEF_0100);
    }

    #[test]
    fn from_hi32_max_is_valid_instant() {
        let instant = Instant::from_hi32(u32::max_value());

        assert!(instant.value() <= TIME_MAX);
        assert_eq!(instant.value(), TIME_MAX & !0xff);
    }

    #[test]
    fn duration_from_nanos_in_hi32_units() {
        // One 32-bit scheduling unit is 256 ticks, which is 4 ns.
        assert_eq!(Duration::from_nanos(4_000).hi32(), 1_000);
    }
}
