// Licensed under the Apache-2.0 license

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Once;

use platform_hil::{
    DeviceIdentity, FatalErrorHandler, ImageLoader, Indicator, MonotonicClock, PartitionPos,
    SafeBootPin, SystemControl,
};

/// How a diverging platform call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Started(PartitionPos),
    Fatal(u32),
    Reset,
    FlashMode,
}

static QUIET_EXITS: Once = Once::new();

/// Runs `f`, which must end in one of the fake diverging devices, and returns how it ended.
pub fn catch_exit<R>(f: impl FnOnce() -> R) -> Exit {
    QUIET_EXITS.call_once(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<Exit>().is_none() {
                default_hook(info);
            }
        }));
    });

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("call returned instead of diverging"),
        Err(payload) => match payload.downcast::<Exit>() {
            Ok(exit) => *exit,
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Millisecond clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl MonotonicClock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64);
    }
}

/// Safe boot input held from time zero until `release_at_ms`.
pub struct ScriptedPin {
    clock: FakeClock,
    release_at_ms: u64,
    pub samples: usize,
}

impl ScriptedPin {
    pub fn held_for(clock: &FakeClock, ms: u64) -> Self {
        ScriptedPin {
            clock: clock.clone(),
            release_at_ms: clock.now() + ms,
            samples: 0,
        }
    }

    pub fn released(clock: &FakeClock) -> Self {
        Self::held_for(clock, 0)
    }
}

impl SafeBootPin for ScriptedPin {
    fn is_asserted(&mut self) -> bool {
        self.samples += 1;
        self.clock.now() < self.release_at_ms
    }
}

#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub colors: Vec<u32>,
}

impl RecordingIndicator {
    pub fn last(&self) -> Option<u32> {
        self.colors.last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn set_color(&mut self, rgb: u32) {
        self.colors.push(rgb);
    }
}

pub const TEST_MAC: [u8; 6] = [0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56];

#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(pub [u8; 6]);

impl Default for FixedIdentity {
    fn default() -> Self {
        FixedIdentity(TEST_MAC)
    }
}

impl DeviceIdentity for FixedIdentity {
    fn mac_address(&self) -> [u8; 6] {
        self.0
    }
}

/// Ends with `Exit::Started` when asked to start an image.
#[derive(Debug, Default)]
pub struct ExitLoader;

impl ImageLoader for ExitLoader {
    fn load_and_start(&mut self, partition: PartitionPos) -> ! {
        panic::panic_any(Exit::Started(partition))
    }
}

/// Ends with `Exit::Fatal`.
#[derive(Debug, Default)]
pub struct ExitFatalHandler;

impl FatalErrorHandler for ExitFatalHandler {
    fn fatal_error(&mut self, code: u32) -> ! {
        panic::panic_any(Exit::Fatal(code))
    }
}

#[derive(Debug, Default)]
pub struct ExitControl;

impl SystemControl for ExitControl {
    fn reset(&mut self) -> ! {
        panic::panic_any(Exit::Reset)
    }

    fn enter_flash_mode(&mut self) -> ! {
        panic::panic_any(Exit::FlashMode)
    }
}

/// The fake peripherals a boot needs, owned in one place.
pub struct Devices {
    pub clock: FakeClock,
    pub pin: ScriptedPin,
    pub indicator: RecordingIndicator,
    pub identity: FixedIdentity,
    pub loader: ExitLoader,
    pub fatal: ExitFatalHandler,
    pub scratch: Vec<u8>,
}

impl Devices {
    /// Devices with the safe boot input held for `hold_ms` from power-on.
    pub fn with_hold(hold_ms: u64) -> Self {
        let clock = FakeClock::new();
        let pin = ScriptedPin::held_for(&clock, hold_ms);
        Devices {
            clock,
            pin,
            indicator: RecordingIndicator::default(),
            identity: FixedIdentity::default(),
            loader: ExitLoader,
            fatal: ExitFatalHandler,
            scratch: vec![0; 0x1000],
        }
    }
}

impl Default for Devices {
    fn default() -> Self {
        Self::with_hold(0)
    }
}
