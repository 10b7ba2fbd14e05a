//! Sensor access used by the sampling path
//!
//! The protocol only needs one integer per sampling period. Drivers for
//! one-shot sensors are re-armed through `activate` after every read, and
//! report `NotReady` while a conversion is still running.

use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

/// Outcome of a single sensor read
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SensorReading {
    Value(i32),
    /// The sensor has no conversion result yet
    NotReady,
}

/// A peripheral sensor
pub trait SensorDevice {
    fn read(&mut self, channel: u8) -> SensorReading;

    /// Starts the next conversion
    fn activate(&mut self) {}
}

/// Light sensor stand-in for simulations and tests
///
/// Needs an `activate` before each read and stays `NotReady` for a number of
/// warm-up reads after construction. Values are drawn uniformly from
/// `base..base + spread`.
pub struct SimulatedLightSensor {
    rng: WyRand,
    warmup_reads: u8,
    armed: bool,
    base: i32,
    spread: u32,
}

impl SimulatedLightSensor {
    pub fn new(rng_seed: u64, warmup_reads: u8, base: i32, spread: u32) -> Self {
        Self {
            rng: WyRand::seed_from_u64(rng_seed),
            warmup_reads,
            armed: false,
            base,
            spread: spread.max(1),
        }
    }
}

impl SensorDevice for SimulatedLightSensor {
    fn read(&mut self, _channel: u8) -> SensorReading {
        if !self.armed {
            return SensorReading::NotReady;
        }
        self.armed = false;
        if self.warmup_reads > 0 {
            self.warmup_reads -= 1;
            return SensorReading::NotReady;
        }
        let offset = (self.rng.next_u32() % self.spread) as i32;
        SensorReading::Value(self.base.saturating_add(offset))
    }

    fn activate(&mut self) {
        self.armed = true;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn read_requires_activation() {
        let mut sensor = SimulatedLightSensor::new(1, 0, 100, 10);
        assert_eq!(sensor.read(0), SensorReading::NotReady);
        sensor.activate();
        assert!(matches!(sensor.read(0), SensorReading::Value(v) if (100..110).contains(&v)));
        assert_eq!(sensor.read(0), SensorReading::NotReady);
    }

    #[test]
    fn warmup_reads_are_not_ready() {
        let mut sensor = SimulatedLightSensor::new(7, 2, 0, 1);
        for _ in 0..2 {
            sensor.activate();
            assert_eq!(sensor.read(0), SensorReading::NotReady);
        }
        sensor.activate();
        assert_eq!(sensor.read(0), SensorReading::Value(0));
    }
}
