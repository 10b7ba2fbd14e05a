//! # Beacon Scheduler - Duty-Cycled Radio Operation
//!
//! Drives the radio through alternating burst and sleep phases:
//! - **Burst**: radio on, `num_send` beacons spaced `wake_time` apart
//! - **Sleep**: radio off for `sleep_slot * NumSleep`
//!
//! The scheduler never waits itself. Each call to `step` performs the work due
//! at the current wakeup and returns the delay until the next one, so the node
//! task keeps a single timer and stays free to handle frames and samples in
//! between.

use embassy_time::Duration;
use rand_core::RngCore;

use crate::{DeviceType, DiscoveryConfiguration};

/// Sleep prime of the sender role
const SENDER_SLEEP_PRIME: u16 = 13;
/// Sleep prime of the receiver role
const RECEIVER_SLEEP_PRIME: u16 = 7;

/// How many sleep slots follow a burst
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SleepPolicy {
    /// Uniform over `0..=2 * sleep_cycle`, mean `sleep_cycle`
    Random,
    /// Always the same number of slots
    Fixed(u16),
}

impl SleepPolicy {
    /// Fixed policy of `prime - 1` slots for the role
    ///
    /// The sender and receiver primes differ, so the two cycle lengths are
    /// coprime and the bursts of two nodes are guaranteed to overlap.
    pub const fn role_prime(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Sender => SleepPolicy::Fixed(SENDER_SLEEP_PRIME - 1),
            DeviceType::Receiver => SleepPolicy::Fixed(RECEIVER_SLEEP_PRIME - 1),
        }
    }

    fn draw_slots<R: RngCore>(&self, sleep_cycle: u16, rng: &mut R) -> u32 {
        match self {
            SleepPolicy::Random => rng.next_u32() % (2 * sleep_cycle as u32 + 1),
            SleepPolicy::Fixed(slots) => *slots as u32,
        }
    }
}

/// Saved resume point of the scheduler
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DutyCyclePhase {
    /// `sent` beacons of the current burst are out
    Bursting { sent: u16 },
    /// `slept` of `slots` sleep slots have been armed
    Sleeping { slept: u32, slots: u32 },
}

/// Work to perform at one wakeup
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct DutyCycleStep {
    /// Power the radio on before transmitting
    pub power_on: bool,
    pub transmit_beacon: bool,
    /// Power the radio off after transmitting
    pub power_off: bool,
    /// Delay until the next call to `step`
    pub wait: Duration,
}

impl DutyCycleStep {
    fn idle(wait: Duration) -> Self {
        Self {
            power_on: false,
            transmit_beacon: false,
            power_off: false,
            wait,
        }
    }
}

pub struct DutyCycleScheduler {
    phase: DutyCyclePhase,
    radio_on: bool,
    num_send: u16,
    sleep_cycle: u16,
    wake_time: Duration,
    sleep_slot: Duration,
    sleep_policy: SleepPolicy,
}

impl DutyCycleScheduler {
    /// Creates a scheduler positioned at the start of a burst
    ///
    /// A `num_send` of zero is treated as one beacon per burst.
    pub fn new(num_send: u16, sleep_cycle: u16, wake_time: Duration, sleep_slot: Duration, sleep_policy: SleepPolicy) -> Self {
        Self {
            phase: DutyCyclePhase::Bursting { sent: 0 },
            radio_on: false,
            num_send: num_send.max(1),
            sleep_cycle,
            wake_time,
            sleep_slot,
            sleep_policy,
        }
    }

    pub fn from_configuration(config: &DiscoveryConfiguration) -> Self {
        Self::new(
            config.num_send,
            config.sleep_cycle,
            Duration::from_millis(config.wake_time_ms as u64),
            Duration::from_millis(config.sleep_slot_ms as u64),
            config.sleep_policy,
        )
    }

    pub fn phase(&self) -> DutyCyclePhase {
        self.phase
    }

    pub fn is_radio_on(&self) -> bool {
        self.radio_on
    }

    /// Advances the duty cycle by one wakeup
    ///
    /// `rng` is only consulted by `SleepPolicy::Random`, once per burst.
    pub fn step<R: RngCore>(&mut self, rng: &mut R) -> DutyCycleStep {
        if let DutyCyclePhase::Sleeping { slept, slots } = self.phase {
            if slept < slots {
                self.phase = DutyCyclePhase::Sleeping { slept: slept + 1, slots };
                return DutyCycleStep::idle(self.sleep_slot);
            }
            self.phase = DutyCyclePhase::Bursting { sent: 0 };
        }

        let sent = match self.phase {
            DutyCyclePhase::Bursting { sent } => sent,
            DutyCyclePhase::Sleeping { .. } => 0,
        };
        let power_on = !self.radio_on;
        self.radio_on = true;
        let sent = sent + 1;

        if sent < self.num_send {
            self.phase = DutyCyclePhase::Bursting { sent };
            return DutyCycleStep {
                power_on,
                transmit_beacon: true,
                power_off: false,
                wait: self.wake_time,
            };
        }

        // Last beacon of the burst
        self.phase = DutyCyclePhase::Bursting { sent: 0 };
        let slots = if self.sleep_cycle == 0 {
            0
        } else {
            self.sleep_policy.draw_slots(self.sleep_cycle, rng)
        };
        if slots == 0 {
            return DutyCycleStep {
                power_on,
                transmit_beacon: true,
                power_off: false,
                wait: self.wake_time,
            };
        }

        self.radio_on = false;
        self.phase = DutyCyclePhase::Sleeping { slept: 1, slots };
        DutyCycleStep {
            power_on,
            transmit_beacon: true,
            power_off: true,
            wait: self.sleep_slot,
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use rand_core::SeedableRng;
    use rand_wyrand::WyRand;

    /// Returns the same value for every draw
    struct ConstantRng(u32);

    impl RngCore for ConstantRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }
        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn burst_then_fixed_sleep() {
        let mut scheduler = DutyCycleScheduler::new(2, 9, ms(100), ms(50), SleepPolicy::Fixed(3));
        let mut rng = ConstantRng(0);

        let first = scheduler.step(&mut rng);
        assert!(first.power_on && first.transmit_beacon && !first.power_off);
        assert_eq!(first.wait, ms(100));

        let second = scheduler.step(&mut rng);
        assert!(!second.power_on && second.transmit_beacon && second.power_off);
        assert_eq!(second.wait, ms(50));
        assert_eq!(scheduler.phase(), DutyCyclePhase::Sleeping { slept: 1, slots: 3 });

        for _ in 0..2 {
            let idle = scheduler.step(&mut rng);
            assert!(!idle.transmit_beacon && !idle.power_on && !idle.power_off);
            assert_eq!(idle.wait, ms(50));
        }
        assert_eq!(scheduler.phase(), DutyCyclePhase::Sleeping { slept: 3, slots: 3 });

        let next_burst = scheduler.step(&mut rng);
        assert!(next_burst.power_on && next_burst.transmit_beacon);
        assert_eq!(next_burst.wait, ms(100));
    }

    #[test]
    fn sleep_time_totals_slots_times_slot_length() {
        let mut scheduler = DutyCycleScheduler::new(2, 9, ms(100), ms(100), SleepPolicy::role_prime(DeviceType::Sender));
        let mut rng = ConstantRng(0);

        let mut elapsed = Duration::from_ticks(0);
        let mut beacons = 0;
        // One full cycle: 2 beacons, then 12 sleep slots
        loop {
            let step = scheduler.step(&mut rng);
            if step.transmit_beacon {
                beacons += 1;
                if beacons == 3 {
                    break;
                }
            }
            elapsed += step.wait;
        }
        assert_eq!(elapsed, ms(100) + ms(12 * 100));
    }

    #[test]
    fn zero_sleep_cycle_never_sleeps() {
        let mut scheduler = DutyCycleScheduler::new(2, 0, ms(100), ms(100), SleepPolicy::Random);
        let mut rng = WyRand::seed_from_u64(3);

        let first = scheduler.step(&mut rng);
        assert!(first.power_on);
        for _ in 0..50 {
            let step = scheduler.step(&mut rng);
            assert!(step.transmit_beacon);
            assert!(!step.power_off && !step.power_on);
            assert_eq!(step.wait, ms(100));
            assert!(matches!(scheduler.phase(), DutyCyclePhase::Bursting { .. }));
        }
        assert!(scheduler.is_radio_on());
    }

    #[test]
    fn random_draw_is_bounded_by_twice_the_cycle() {
        let mut scheduler = DutyCycleScheduler::new(1, 9, ms(100), ms(100), SleepPolicy::Random);
        // 37 % 19 = 18, the largest possible draw
        let mut rng = ConstantRng(37);
        let step = scheduler.step(&mut rng);
        assert!(step.power_off);
        assert_eq!(scheduler.phase(), DutyCyclePhase::Sleeping { slept: 1, slots: 18 });

        let mut rng = WyRand::seed_from_u64(99);
        for _ in 0..200 {
            let slots = SleepPolicy::Random.draw_slots(9, &mut rng);
            assert!(slots <= 18);
        }
    }

    #[test]
    fn large_cycle_draws_past_u16_range() {
        let mut scheduler = DutyCycleScheduler::new(1, 40000, ms(100), ms(100), SleepPolicy::Random);
        let mut rng = ConstantRng(80000);
        scheduler.step(&mut rng);
        assert_eq!(scheduler.phase(), DutyCyclePhase::Sleeping { slept: 1, slots: 80000 });

        let mut rng = WyRand::seed_from_u64(7);
        let max = (0..20000).map(|_| SleepPolicy::Random.draw_slots(40000, &mut rng)).max().unwrap();
        assert!(max > u16::MAX as u32);
        assert!(max <= 80000);
    }

    #[test]
    fn zero_draw_keeps_radio_on() {
        let mut scheduler = DutyCycleScheduler::new(1, 9, ms(100), ms(100), SleepPolicy::Random);
        let mut rng = ConstantRng(19);
        let first = scheduler.step(&mut rng);
        assert!(first.power_on && !first.power_off);
        assert_eq!(first.wait, ms(100));
        let second = scheduler.step(&mut rng);
        assert!(!second.power_on && second.transmit_beacon);
    }

    #[test]
    fn role_primes_differ() {
        assert_eq!(SleepPolicy::role_prime(DeviceType::Sender), SleepPolicy::Fixed(12));
        assert_eq!(SleepPolicy::role_prime(DeviceType::Receiver), SleepPolicy::Fixed(6));
    }
}
