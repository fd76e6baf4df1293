//! Network quality monitoring
//!
//! Classifies the link the media is streamed over as good, slow or offline
//! from whatever link-quality hints the host platform exposes, and reports
//! when that classification changes.

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Downlink below this (Mbit/s) counts as slow
const SLOW_DOWNLINK_MBPS: f64 = 1.5;

/// Round-trip time above this counts as slow
const SLOW_RTT_MS: u32 = 400;

/// Coarse connectivity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Good,
    Slow,
    Offline,
}

impl NetworkQuality {
    pub fn is_online(self) -> bool {
        self != NetworkQuality::Offline
    }
}

/// Effective connection type as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

/// One sample of link characteristics. Absent hints are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkSignals {
    pub online: bool,
    #[serde(default)]
    pub effective_type: Option<EffectiveType>,
    #[serde(default)]
    pub downlink_mbps: Option<f64>,
    #[serde(default)]
    pub rtt_ms: Option<u32>,
}

impl LinkSignals {
    /// Online with no further hints
    pub fn online() -> Self {
        Self {
            online: true,
            effective_type: None,
            downlink_mbps: None,
            rtt_ms: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::online()
        }
    }
}

impl Default for LinkSignals {
    fn default() -> Self {
        Self::online()
    }
}

/// Classify a single sample
pub fn classify(signals: &LinkSignals) -> NetworkQuality {
    if !signals.online {
        return NetworkQuality::Offline;
    }

    let slow_type = matches!(
        signals.effective_type,
        Some(EffectiveType::Slow2g | EffectiveType::TwoG | EffectiveType::ThreeG)
    );
    let slow_downlink = signals.downlink_mbps.is_some_and(|d| d < SLOW_DOWNLINK_MBPS);
    let slow_rtt = signals.rtt_ms.is_some_and(|rtt| rtt > SLOW_RTT_MS);

    if slow_type || slow_downlink || slow_rtt {
        NetworkQuality::Slow
    } else {
        NetworkQuality::Good
    }
}

/// A classification change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityChange {
    pub previous: NetworkQuality,
    pub current: NetworkQuality,
}

impl QualityChange {
    /// Connectivity came back after being offline
    pub fn reconnected(&self) -> bool {
        self.previous == NetworkQuality::Offline && self.current.is_online()
    }
}

/// Tracks the latest link sample and its classification
#[derive(Debug, Clone)]
pub struct NetworkQualityMonitor {
    signals: LinkSignals,
    quality: NetworkQuality,
}

impl NetworkQualityMonitor {
    pub fn new(initial: LinkSignals) -> Self {
        Self {
            quality: classify(&initial),
            signals: initial,
        }
    }

    pub fn quality(&self) -> NetworkQuality {
        self.quality
    }

    pub fn signals(&self) -> &LinkSignals {
        &self.signals
    }

    pub fn is_offline(&self) -> bool {
        self.quality == NetworkQuality::Offline
    }

    /// Record a new sample; returns the change if the class moved
    pub fn update(&mut self, signals: LinkSignals) -> Option<QualityChange> {
        let next = classify(&signals);
        self.signals = signals;

        if next == self.quality {
            debug!("Link sample unchanged at {:?}", next);
            return None;
        }

        let change = QualityChange {
            previous: self.quality,
            current: next,
        };
        info!("Network quality changed: {:?} -> {:?}", change.previous, change.current);
        self.quality = next;
        Some(change)
    }
}

impl Default for NetworkQualityMonitor {
    fn default() -> Self {
        Self::new(LinkSignals::online())
    }
}
