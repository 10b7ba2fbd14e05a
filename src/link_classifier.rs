//! # Link Classifier
//!
//! Classifies inbound beacons by role and received signal strength and keeps
//! the node's contact bookkeeping.
//!
//! ## Link State
//!
//! A node keeps a single `LinkState`, shared by every peer it hears. DETECT
//! therefore means "some peer of the opposite role has been heard", and ABSENT
//! means "no peer has been in good contact for a while". Distinct peers are not
//! told apart.
//!
//! ## Timing
//!
//! Absence and contact duration are decided by comparing instants whenever the
//! node gets an opportunity (a beacon arrives, the scheduler wakes up). There is
//! no dedicated timeout timer.

use embassy_time::{Duration, Instant};

use crate::{BeaconPacket, DeviceType, DiscoveryConfiguration};

/// Contact bookkeeping of the local node
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkState {
    /// Latched on the first valid peer beacon, never cleared
    pub is_contacted: bool,
    /// Outcome of the most recent RSSI comparison
    pub is_link_good: bool,
    /// Start of the current run of good-quality beacons
    pub first_contact_time: Option<Instant>,
    /// Most recent good-quality beacon
    pub last_contact_time: Option<Instant>,
    /// Peer of the most recent good-quality beacon
    pub last_peer_id: Option<u32>,
    last_absent_report: Option<Instant>,
    last_proximity_detect: Option<Instant>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkVerdict {
    /// Beacon from a node of our own role, ignored
    SameRole,
    /// RSSI below threshold
    Weak,
    /// RSSI at or above threshold
    Good,
}

/// Result of classifying one beacon
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct Classification {
    pub verdict: LinkVerdict,
    /// This beacon was the first valid contact of the node
    pub newly_detected: bool,
    /// Set when this beacon triggered an absence report; holds the last good contact
    pub absent_since: Option<Instant>,
}

pub struct LinkClassifier {
    device_type: DeviceType,
    rssi_threshold: i16,
    absent_interval: Option<Duration>,
    contact_time: Option<Duration>,
    detect_interval: Duration,
}

fn interval_from_secs(secs: u32) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs as u64))
    }
}

impl LinkClassifier {
    pub fn new(
        device_type: DeviceType,
        rssi_threshold: i16,
        absent_interval: Option<Duration>,
        contact_time: Option<Duration>,
        detect_interval: Duration,
    ) -> Self {
        Self {
            device_type,
            rssi_threshold,
            absent_interval,
            contact_time,
            detect_interval,
        }
    }

    pub fn from_configuration(config: &DiscoveryConfiguration) -> Self {
        Self::new(
            config.device_type,
            config.rssi_threshold,
            interval_from_secs(config.absent_interval_secs),
            interval_from_secs(config.contact_time_secs),
            Duration::from_secs(config.detect_interval_secs as u64),
        )
    }

    pub fn rssi_threshold(&self) -> i16 {
        self.rssi_threshold
    }

    /// Classifies a decoded beacon received with `rssi` at `now`
    ///
    /// Same-role beacons leave `state` untouched.
    pub fn classify(&self, state: &mut LinkState, beacon: &BeaconPacket, rssi: i16, now: Instant) -> Classification {
        if beacon.device_type == self.device_type {
            return Classification {
                verdict: LinkVerdict::SameRole,
                newly_detected: false,
                absent_since: None,
            };
        }

        let newly_detected = !state.is_contacted;
        state.is_contacted = true;

        if rssi >= self.rssi_threshold {
            if !state.is_link_good || state.first_contact_time.is_none() {
                state.first_contact_time = Some(now);
            }
            state.is_link_good = true;
            state.last_contact_time = Some(now);
            state.last_peer_id = Some(beacon.source_id);
            return Classification {
                verdict: LinkVerdict::Good,
                newly_detected,
                absent_since: None,
            };
        }

        state.is_link_good = false;
        state.first_contact_time = None;
        Classification {
            verdict: LinkVerdict::Weak,
            newly_detected,
            absent_since: self.check_absence(state, now),
        }
    }

    /// Reports an absence if no good contact happened for the absent interval
    ///
    /// At most one report per interval. Nodes that never had a good contact
    /// are not reported. A report ends the current contact run, so a peer that
    /// comes back starts its contact time from scratch.
    ///
    /// # Returns
    /// The instant of the last good contact when an absence is reported
    pub fn check_absence(&self, state: &mut LinkState, now: Instant) -> Option<Instant> {
        let interval = self.absent_interval?;
        let last_contact = state.last_contact_time?;
        if now.saturating_duration_since(last_contact) < interval {
            return None;
        }
        if let Some(reported) = state.last_absent_report {
            if now.saturating_duration_since(reported) < interval {
                return None;
            }
        }
        state.last_absent_report = Some(now);
        state.first_contact_time = None;
        Some(last_contact)
    }

    /// Payloads are only trusted while the link is good
    pub fn accepts_payload(&self, state: &LinkState) -> bool {
        state.is_link_good
    }

    /// Contact-duration gate for proximity detection
    ///
    /// A detection needs the current good contact to have lasted for the
    /// contact time, and the previous detection to be at least the detect
    /// interval old.
    ///
    /// # Returns
    /// The start of the current contact when a detection is due
    pub fn check_proximity(&self, state: &mut LinkState) -> Option<Instant> {
        let contact_time = self.contact_time?;
        if !state.is_link_good {
            return None;
        }
        let first = state.first_contact_time?;
        let last = state.last_contact_time?;
        if last.saturating_duration_since(first) < contact_time {
            return None;
        }
        if let Some(previous) = state.last_proximity_detect {
            if last.saturating_duration_since(previous) < self.detect_interval {
                return None;
            }
        }
        state.last_proximity_detect = Some(last);
        Some(first)
    }
}
