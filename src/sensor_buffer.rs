//! # Sensor Buffer
//!
//! Fixed-capacity window of sensor readings filled by the periodic sampler and
//! drained by the payload relay.
//!
//! ## Full-Window Policy
//!
//! Two behaviours exist for a window that fills up before a relay drains it:
//! - `BoundedFill`: further samples are skipped (the sensor is not even read)
//!   until the relay resets the window. The relayed snapshot holds the oldest
//!   readings.
//! - `Circular`: the oldest slot is overwritten. The relayed snapshot holds the
//!   newest readings, oldest first.
//!
//! `BoundedFill` is the default.

use log::log;

use crate::sensor::{SensorDevice, SensorReading};
use crate::{LIGHT_DEFAULT, READING_LENGTH};

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum BufferPolicy {
    BoundedFill,
    Circular,
}

/// Result of one sampling period
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SampleOutcome {
    Stored(i32),
    /// The sensor was not ready; the next period retries
    NotReady,
    /// Window full under `BoundedFill`; the sensor was not read
    Full,
}

pub struct SensorBuffer {
    readings: [i32; READING_LENGTH],
    write_index: usize,
    count: usize,
    policy: BufferPolicy,
}

impl SensorBuffer {
    pub const fn new(policy: BufferPolicy) -> Self {
        Self {
            readings: [LIGHT_DEFAULT; READING_LENGTH],
            write_index: 0,
            count: 0,
            policy,
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == READING_LENGTH
    }

    /// Stores a reading according to the buffer policy
    ///
    /// # Returns
    /// `false` if the reading was discarded because the window is full
    pub fn push(&mut self, value: i32) -> bool {
        if self.is_full() && self.policy == BufferPolicy::BoundedFill {
            return false;
        }
        self.readings[self.write_index] = value;
        self.write_index = (self.write_index + 1) % READING_LENGTH;
        self.count = (self.count + 1).min(READING_LENGTH);
        true
    }

    /// Samples one reading from `sensor` and re-arms it
    pub fn sample(&mut self, sensor: &mut dyn SensorDevice, channel: u8) -> SampleOutcome {
        if self.is_full() && self.policy == BufferPolicy::BoundedFill {
            return SampleOutcome::Full;
        }
        let outcome = match sensor.read(channel) {
            SensorReading::Value(value) => {
                self.push(value);
                SampleOutcome::Stored(value)
            }
            SensorReading::NotReady => {
                log!(log::Level::Debug, "Sensor channel {} warming up, skipping sample", channel);
                SampleOutcome::NotReady
            }
        };
        sensor.activate();
        outcome
    }

    /// Readings in the order they were taken, empty slots as `LIGHT_DEFAULT`
    pub fn snapshot(&self) -> [i32; READING_LENGTH] {
        if self.count < READING_LENGTH {
            return self.readings;
        }
        let mut ordered = [LIGHT_DEFAULT; READING_LENGTH];
        for (i, slot) in ordered.iter_mut().enumerate() {
            *slot = self.readings[(self.write_index + i) % READING_LENGTH];
        }
        ordered
    }

    /// Empties the window so a snapshot is never sent twice
    pub fn reset(&mut self) {
        self.readings = [LIGHT_DEFAULT; READING_LENGTH];
        self.write_index = 0;
        self.count = 0;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    struct ScriptedSensor {
        values: Vec<SensorReading>,
        reads: usize,
        activations: usize,
    }

    impl ScriptedSensor {
        fn new(values: Vec<SensorReading>) -> Self {
            Self {
                values,
                reads: 0,
                activations: 0,
            }
        }
    }

    impl SensorDevice for ScriptedSensor {
        fn read(&mut self, _channel: u8) -> SensorReading {
            let value = self.values.get(self.reads).copied().unwrap_or(SensorReading::NotReady);
            self.reads += 1;
            value
        }

        fn activate(&mut self) {
            self.activations += 1;
        }
    }

    #[test]
    fn bounded_fill_ignores_eleventh_sample() {
        let mut buffer = SensorBuffer::new(BufferPolicy::BoundedFill);
        let values: Vec<SensorReading> = (1..=11).map(SensorReading::Value).collect();
        let mut sensor = ScriptedSensor::new(values);

        for i in 1..=10 {
            assert_eq!(buffer.sample(&mut sensor, 0), SampleOutcome::Stored(i));
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.sample(&mut sensor, 0), SampleOutcome::Full);
        assert_eq!(sensor.reads, 10, "a full window must not read the sensor");
        assert_eq!(buffer.snapshot(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn not_ready_skips_the_slot() {
        let mut buffer = SensorBuffer::new(BufferPolicy::BoundedFill);
        let mut sensor = ScriptedSensor::new(vec![SensorReading::NotReady, SensorReading::Value(55)]);

        assert_eq!(buffer.sample(&mut sensor, 0), SampleOutcome::NotReady);
        assert!(buffer.is_empty());
        assert_eq!(buffer.sample(&mut sensor, 0), SampleOutcome::Stored(55));
        assert_eq!(buffer.snapshot()[0], 55);
        assert_eq!(buffer.snapshot()[1], LIGHT_DEFAULT);
        assert_eq!(sensor.activations, 2);
    }

    #[test]
    fn circular_overwrites_oldest() {
        let mut buffer = SensorBuffer::new(BufferPolicy::Circular);
        for value in 1..=13 {
            assert!(buffer.push(value));
        }
        assert_eq!(buffer.len(), READING_LENGTH);
        assert_eq!(buffer.snapshot(), [4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
    }

    #[test]
    fn reset_restores_sentinels() {
        let mut buffer = SensorBuffer::new(BufferPolicy::BoundedFill);
        buffer.push(9);
        buffer.push(8);
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), [LIGHT_DEFAULT; READING_LENGTH]);
        assert!(buffer.push(1));
        assert_eq!(buffer.snapshot()[0], 1);
    }
}
