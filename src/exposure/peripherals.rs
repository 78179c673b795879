//! UV LED, sensors and exposure display used by the exposure worker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::units::Ms;
use crate::error::{bounded, ExposureError, Result};

/// Power button LED modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerLedMode {
    /// Regular operation
    Normal,
    /// Waiting for the user
    Warn,
    /// Failure
    Error,
    /// Dark
    Off,
}

/// Printer hardware besides the two axes.
pub trait ExposureHardware {
    /// Switch the UV LED. A zero duration keeps it on until switched off.
    fn uv_led(&mut self, on: bool, duration: Ms) -> Result<()>;

    /// UV LED state and remaining time of a timed exposure.
    fn uv_led_state(&mut self) -> Result<(bool, Ms)>;

    /// True while the cover is closed.
    fn cover_closed(&mut self) -> Result<bool>;

    /// Measured resin volume in ml, `None` if the measurement failed.
    fn measure_resin_ml(&mut self) -> Result<Option<f32>>;

    /// UV LED temperature in degrees Celsius.
    fn uv_temperature(&mut self) -> Result<f32>;

    /// Set the power LED mode.
    fn power_led(&mut self, mode: PowerLedMode) -> Result<()>;

    /// Sound the alarm `count` times.
    fn beep_alarm(&mut self, count: u8) -> Result<()>;
}

/// Exposure display.
pub trait ExposureScreen {
    /// Show the image of a layer and return the lit pixel count of the
    /// whole layer.
    ///
    /// With `second_half` the second half of a split exposure is shown.
    fn show_layer(&mut self, index: u32, image: &str, second_half: bool) -> Result<u32>;

    /// Show a black image.
    fn blank(&mut self) -> Result<()>;
}

fn lock<T>(state: &Arc<Mutex<T>>) -> Result<MutexGuard<'_, T>> {
    state
        .lock()
        .map_err(|_| ExposureError::Screen(bounded("simulator state poisoned")).into())
}

#[derive(Debug)]
struct PeripheralState {
    uv_on: bool,
    uv_log: Vec<(bool, Ms)>,
    cover_open_queries: u32,
    resin_ml: Option<f32>,
    temperature: f32,
    power_led: Vec<PowerLedMode>,
    beeps: u32,
}

/// In-memory [`ExposureHardware`].
///
/// Timed exposures end at once; clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedPeripherals {
    state: Arc<Mutex<PeripheralState>>,
}

impl Default for SimulatedPeripherals {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPeripherals {
    /// Closed cover, full tank (200 ml) and a cool LED.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PeripheralState {
                uv_on: false,
                uv_log: Vec::new(),
                cover_open_queries: 0,
                resin_ml: Some(200.0),
                temperature: 25.0,
                power_led: Vec::new(),
                beeps: 0,
            })),
        }
    }

    /// Resin volume reported by the next measurements.
    pub fn set_resin_ml(&self, ml: Option<f32>) {
        if let Ok(mut s) = self.state.lock() {
            s.resin_ml = ml;
        }
    }

    /// UV LED temperature.
    pub fn set_temperature(&self, celsius: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.temperature = celsius;
        }
    }

    /// Report the cover open for the next `queries` queries.
    pub fn open_cover(&self, queries: u32) {
        if let Ok(mut s) = self.state.lock() {
            s.cover_open_queries = queries;
        }
    }

    /// True while the UV LED is on.
    pub fn uv_on(&self) -> bool {
        self.state.lock().map(|s| s.uv_on).unwrap_or(false)
    }

    /// Every UV LED switch, oldest first.
    pub fn uv_log(&self) -> Vec<(bool, Ms)> {
        self.state.lock().map(|s| s.uv_log.clone()).unwrap_or_default()
    }

    /// Durations of timed exposures, oldest first.
    pub fn exposures(&self) -> Vec<Ms> {
        self.uv_log()
            .into_iter()
            .filter(|(on, duration)| *on && *duration > Ms::ZERO)
            .map(|(_, duration)| duration)
            .collect()
    }

    /// Power LED modes set, oldest first.
    pub fn power_led_modes(&self) -> Vec<PowerLedMode> {
        self.state.lock().map(|s| s.power_led.clone()).unwrap_or_default()
    }

    /// Number of alarm beeps.
    pub fn beeps(&self) -> u32 {
        self.state.lock().map(|s| s.beeps).unwrap_or(0)
    }
}

impl ExposureHardware for SimulatedPeripherals {
    fn uv_led(&mut self, on: bool, duration: Ms) -> Result<()> {
        let mut s = lock(&self.state)?;
        s.uv_log.push((on, duration));
        // A timed exposure is over by the next state query.
        s.uv_on = on && duration == Ms::ZERO;
        Ok(())
    }

    fn uv_led_state(&mut self) -> Result<(bool, Ms)> {
        Ok((lock(&self.state)?.uv_on, Ms::ZERO))
    }

    fn cover_closed(&mut self) -> Result<bool> {
        let mut s = lock(&self.state)?;
        if s.cover_open_queries > 0 {
            s.cover_open_queries -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn measure_resin_ml(&mut self) -> Result<Option<f32>> {
        Ok(lock(&self.state)?.resin_ml)
    }

    fn uv_temperature(&mut self) -> Result<f32> {
        Ok(lock(&self.state)?.temperature)
    }

    fn power_led(&mut self, mode: PowerLedMode) -> Result<()> {
        lock(&self.state)?.power_led.push(mode);
        Ok(())
    }

    fn beep_alarm(&mut self, count: u8) -> Result<()> {
        lock(&self.state)?.beeps += u32::from(count);
        Ok(())
    }
}

type LayerHook = Box<dyn FnMut(u32, bool) + Send>;

struct ScreenState {
    default_white: u32,
    white: VecDeque<u32>,
    shown: Vec<(u32, String, bool)>,
    blanks: u32,
    hook: Option<LayerHook>,
}

/// In-memory [`ExposureScreen`] with scriptable white pixel counts.
///
/// Clones share state.
#[derive(Clone)]
pub struct SimulatedScreen {
    state: Arc<Mutex<ScreenState>>,
}

impl Default for SimulatedScreen {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedScreen {
    /// Every layer reports `white_pixels` unless scripted otherwise.
    pub fn new(white_pixels: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScreenState {
                default_white: white_pixels,
                white: VecDeque::new(),
                shown: Vec::new(),
                blanks: 0,
                hook: None,
            })),
        }
    }

    /// Queue white pixel counts for the next shown images.
    pub fn push_white_pixels(&self, counts: &[u32]) {
        if let Ok(mut s) = self.state.lock() {
            s.white.extend(counts.iter().copied());
        }
    }

    /// Run `hook` with the layer index each time an image is shown.
    ///
    /// The hook runs with the screen locked and must not call back into it.
    pub fn on_layer<F>(&self, hook: F)
    where
        F: FnMut(u32, bool) + Send + 'static,
    {
        if let Ok(mut s) = self.state.lock() {
            s.hook = Some(Box::new(hook));
        }
    }

    /// Shown images as `(index, image, second_half)`, oldest first.
    pub fn shown(&self) -> Vec<(u32, String, bool)> {
        self.state.lock().map(|s| s.shown.clone()).unwrap_or_default()
    }

    /// Number of blank calls.
    pub fn blanks(&self) -> u32 {
        self.state.lock().map(|s| s.blanks).unwrap_or(0)
    }
}

impl ExposureScreen for SimulatedScreen {
    fn show_layer(&mut self, index: u32, image: &str, second_half: bool) -> Result<u32> {
        let mut s = lock(&self.state)?;
        s.shown.push((index, image.to_owned(), second_half));
        if let Some(hook) = s.hook.as_mut() {
            hook(index, second_half);
        }
        let default = s.default_white;
        Ok(s.white.pop_front().unwrap_or(default))
    }

    fn blank(&mut self) -> Result<()> {
        lock(&self.state)?.blanks += 1;
        Ok(())
    }
}

impl core::fmt::Debug for SimulatedScreen {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedScreen").finish_non_exhaustive()
    }
}
