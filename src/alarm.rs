//! Self-timing alarm output (buzzer).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use embedded_hal::digital::{Error as _, OutputPin, PinState};
use log::{error, info};

use crate::error::AlarmError;
use crate::timer::DeferredAction;

/// Electrical level that sounds the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    High,
    /// Active buzzer modules on this board sound when pulled low.
    Low,
}

impl ActiveLevel {
    fn pin_state(self, on: bool) -> PinState {
        PinState::from(on == (self == ActiveLevel::High))
    }
}

struct AlarmState<P> {
    pin: P,
    level: ActiveLevel,
    active: bool,
    // Bumped on every start/stop; a timer only acts on its own generation.
    generation: u64,
    auto_offs: u64,
}

impl<P: OutputPin> AlarmState<P> {
    fn drive(&mut self, on: bool) -> Result<(), AlarmError> {
        self.pin
            .set_state(self.level.pin_state(on))
            .map_err(|e| AlarmError::Pin(e.kind()))
    }
}

pub struct Alarm<P> {
    state: Arc<Mutex<AlarmState<P>>>,
    timer: Option<DeferredAction>,
}

impl<P: OutputPin + Send + 'static> Alarm<P> {
    /// Takes the pin and drives it inactive.
    pub fn new(pin: P, level: ActiveLevel) -> Result<Self, AlarmError> {
        let mut state = AlarmState {
            pin,
            level,
            active: false,
            generation: 0,
            auto_offs: 0,
        };
        state.drive(false)?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            timer: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, AlarmState<P>>, AlarmError> {
        self.state.lock().map_err(|_| AlarmError::Poisoned)
    }

    /// Sound for `duration`. Restarting while active replaces the deadline.
    pub fn start(&mut self, duration: Duration) -> Result<(), AlarmError> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let generation = {
            let mut state = self.lock()?;
            state.generation += 1;
            state.drive(true)?;
            state.active = true;
            state.generation
        };
        info!("Alarm on for {:?}", duration);

        let shared = Arc::clone(&self.state);
        self.timer = Some(DeferredAction::schedule(duration, move || {
            let Ok(mut state) = shared.lock() else {
                return;
            };
            if state.generation != generation || !state.active {
                return;
            }
            match state.drive(false) {
                Ok(()) => {
                    state.active = false;
                    state.auto_offs += 1;
                    info!("Alarm auto-off after {:?}", duration);
                }
                Err(e) => error!("Alarm auto-off failed: {}", e),
            }
        }));
        Ok(())
    }

    /// Silence now. No-op when already off.
    pub fn stop(&mut self) -> Result<(), AlarmError> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let mut state = self.lock()?;
        state.generation += 1;
        if state.active {
            state.drive(false)?;
            state.active = false;
            info!("Alarm stopped");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.lock().map(|s| s.active).unwrap_or(false)
    }

    /// Deadlines that expired on their own.
    pub fn auto_off_count(&self) -> u64 {
        self.lock().map(|s| s.auto_offs).unwrap_or(0)
    }

    /// Stop and force the output inactive even if it was already off.
    pub fn shutdown(&mut self) -> Result<(), AlarmError> {
        self.stop()?;
        self.lock()?.drive(false)
    }
}
