// Licensed under the Apache-2.0 license

//! Three-tier safe boot menu.
//!
//! Holding the safe boot input past the debounce requests a hardware safe boot.
//! Keeping it held through the first tier steps back to the previous image, and
//! through the second tier selects the factory image. The indicator blinks faster
//! with every tier.

use boot_config::{color, SafeBootTiming};
use platform_hil::{Indicator, MonotonicClock, SafeBootPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeBootSelection {
    NotRequested,
    /// Safe boot requested, keep the active image.
    ActiveImage,
    PreviousImage,
    FactoryImage,
}

impl SafeBootSelection {
    pub fn is_requested(self) -> bool {
        self != SafeBootSelection::NotRequested
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPoll {
    /// Call `poll` again once the clock reaches `wake_at_ms`.
    Pending { wake_at_ms: u64 },
    Done(SafeBootSelection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Debounce { until: u64 },
    Tier { tier: u8, started: u64, step: u64 },
    Done(SafeBootSelection),
}

struct TierTiming {
    duration: u64,
    period: u64,
    /// Runs to completion even if the input is released.
    forced: bool,
}

pub struct SafeBootMenu {
    timing: SafeBootTiming,
    phase: Phase,
    lit: bool,
}

impl SafeBootMenu {
    pub fn new(timing: SafeBootTiming) -> Self {
        SafeBootMenu {
            timing,
            phase: Phase::Idle,
            lit: false,
        }
    }

    fn tier_timing(&self, tier: u8) -> TierTiming {
        let t = &self.timing;
        let (duration, period, forced) = match tier {
            0 => (t.tier1_ms, t.tier1_blink_ms, false),
            1 => (t.tier2_ms, t.tier2_blink_ms, false),
            _ => (t.tier3_ms, t.tier3_blink_ms, true),
        };
        TierTiming {
            duration: duration as u64,
            period: period.max(1) as u64,
            forced,
        }
    }

    fn toggle(&mut self, indicator: &mut dyn Indicator) {
        self.lit = !self.lit;
        indicator.set_color(if self.lit { color::SAFE_BOOT } else { color::OFF });
    }

    fn finish(&mut self, selection: SafeBootSelection, indicator: &mut dyn Indicator) {
        if selection.is_requested() {
            indicator.set_color(color::OFF);
        }
        self.phase = Phase::Done(selection);
    }

    fn end_tier(&mut self, tier: u8, held: bool, at: u64, indicator: &mut dyn Indicator) {
        match (tier, held) {
            (0, true) => {
                log::info!("Safe boot: previous image selected");
                self.phase = Phase::Tier {
                    tier: 1,
                    started: at,
                    step: 0,
                };
            }
            (0, false) => self.finish(SafeBootSelection::ActiveImage, indicator),
            (1, true) => {
                log::info!("Safe boot: factory image selected");
                self.phase = Phase::Tier {
                    tier: 2,
                    started: at,
                    step: 0,
                };
            }
            (1, false) => self.finish(SafeBootSelection::PreviousImage, indicator),
            _ => self.finish(SafeBootSelection::FactoryImage, indicator),
        }
    }

    /// Advances the menu to `now_ms`, sampling the input at every step that is due.
    pub fn poll(
        &mut self,
        now_ms: u64,
        pin: &mut dyn SafeBootPin,
        indicator: &mut dyn Indicator,
    ) -> MenuPoll {
        loop {
            match self.phase {
                Phase::Idle => {
                    if pin.is_asserted() {
                        self.phase = Phase::Debounce {
                            until: now_ms + self.timing.debounce_ms as u64,
                        };
                    } else {
                        self.finish(SafeBootSelection::NotRequested, indicator);
                    }
                }
                Phase::Debounce { until } => {
                    if now_ms < until {
                        return MenuPoll::Pending { wake_at_ms: until };
                    }
                    if pin.is_asserted() {
                        log::info!("Safe boot requested");
                        self.phase = Phase::Tier {
                            tier: 0,
                            started: until,
                            step: 0,
                        };
                    } else {
                        self.finish(SafeBootSelection::NotRequested, indicator);
                    }
                }
                Phase::Tier {
                    tier,
                    started,
                    step,
                } => {
                    let timing = self.tier_timing(tier);
                    let elapsed = step * timing.period;
                    let due = started + elapsed;
                    if now_ms < due {
                        return MenuPoll::Pending { wake_at_ms: due };
                    }
                    if elapsed < timing.duration && (timing.forced || pin.is_asserted()) {
                        self.toggle(indicator);
                        self.phase = Phase::Tier {
                            tier,
                            started,
                            step: step + 1,
                        };
                    } else {
                        let held = pin.is_asserted();
                        self.end_tier(tier, held, due, indicator);
                    }
                }
                Phase::Done(selection) => return MenuPoll::Done(selection),
            }
        }
    }

    /// Runs the menu to completion, sleeping on `clock` between steps.
    pub fn run(
        &mut self,
        clock: &mut dyn MonotonicClock,
        pin: &mut dyn SafeBootPin,
        indicator: &mut dyn Indicator,
    ) -> SafeBootSelection {
        loop {
            let now = clock.now_ms();
            match self.poll(now, pin, indicator) {
                MenuPoll::Done(selection) => return selection,
                MenuPoll::Pending { wake_at_ms } => {
                    let wait = (wake_at_ms - now).min(u32::MAX as u64) as u32;
                    clock.delay_ms(wait);
                }
            }
        }
    }
}
