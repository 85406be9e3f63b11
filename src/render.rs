//! Render loop (component C6): the per-panel tick that drives pages,
//! transitions, and the shadow diff down to the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::keys::KeyEvent;
use crate::panel::{Panel, PanelError};
use crate::shadow::{diff_cells, diff_leds, Shadow};
use crate::transition::{Endpoints, Transition};
use crate::utils::critical_call;

/// Default tick period: roughly 30 Hz, matching the panel's own refresh
/// budget rather than any protocol requirement.
pub const DEFAULT_RENDER_PERIOD: Duration = Duration::from_millis(33);

/// Supplies this tick's target frame. Implemented by the paged driver;
/// kept as a trait so the render loop does not need to know about page
/// lists or navigation.
pub trait RenderSource: Send {
    fn render_target(&mut self, shadow: &mut Shadow, force: bool);

    /// Called once after the panel is opened and before the first tick,
    /// with final geometry.
    fn init(&mut self, width: usize, height: usize, led_count: usize) {
        let _ = (width, height, led_count);
    }

    /// Called once after the render thread has observed `should_run` false
    /// and exited its loop.
    fn shutdown(&mut self) {}

    /// Dispatches a key report received from the panel. Default is a no-op
    /// for sources with no navigation of their own.
    fn handle_key(&mut self, event: KeyEvent) {
        let _ = event;
    }
}

struct WakeSignal {
    should_run: AtomicBool,
    cancel_transition: AtomicBool,
    start_transition: AtomicBool,
    mutex: Mutex<()>,
    cv: Condvar,
}

/// Handle shared with key-event handlers and page workers to force an
/// immediate re-render or request transition control.
#[derive(Clone)]
pub struct RenderWaker {
    signal: Arc<WakeSignal>,
}

impl RenderWaker {
    /// Builds a standalone waker, for wiring into a `RenderSource` before
    /// its owning `Driver` exists.
    pub fn new() -> Self {
        RenderWaker {
            signal: Arc::new(WakeSignal {
                should_run: AtomicBool::new(false),
                cancel_transition: AtomicBool::new(false),
                start_transition: AtomicBool::new(false),
                mutex: Mutex::new(()),
                cv: Condvar::new(),
            }),
        }
    }

    pub fn wake(&self) {
        let _guard = self.signal.mutex.lock().unwrap();
        self.signal.cv.notify_all();
    }

    pub fn request_transition(&self) {
        self.signal.start_transition.store(true, Ordering::Release);
        self.wake();
    }

    pub fn cancel_transition(&self) {
        self.signal.cancel_transition.store(true, Ordering::Release);
        self.wake();
    }
}

/// Owns one panel's render thread: the target/sent shadow pair, the
/// active transition (if any), and the render period.
pub struct Driver<S: RenderSource + 'static> {
    signal: Arc<WakeSignal>,
    render_period: Duration,
    thread: Option<JoinHandle<()>>,
    source: Arc<Mutex<S>>,
    panel_path: String,
    transition_factory: Option<Arc<dyn Fn() -> Box<dyn Transition> + Send + Sync>>,
}

impl<S: RenderSource + 'static> Driver<S> {
    /// Builds a driver around `source`, sharing `waker`'s signal so the
    /// caller can hand the same [`RenderWaker`] to `source` before the
    /// driver's thread exists.
    pub fn new(panel_path: impl Into<String>, source: S, render_period: Duration, waker: RenderWaker) -> Self {
        Self {
            signal: waker.signal,
            render_period,
            thread: None,
            source: Arc::new(Mutex::new(source)),
            panel_path: panel_path.into(),
            transition_factory: None,
        }
    }

    pub fn with_transition(mut self, factory: impl Fn() -> Box<dyn Transition> + Send + Sync + 'static) -> Self {
        self.transition_factory = Some(Arc::new(factory));
        self
    }

    pub fn waker(&self) -> RenderWaker {
        RenderWaker {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Opens the panel and spawns the render thread.
    pub fn start(&mut self) -> Result<(), PanelError> {
        self.signal.should_run.store(true, Ordering::Release);
        let signal = Arc::clone(&self.signal);
        let source = Arc::clone(&self.source);
        let render_period = self.render_period;
        let panel_path = self.panel_path.clone();
        let transition_factory = self.transition_factory.clone();

        self.thread = Some(
            thread::Builder::new()
                .name(format!("panel-render-{panel_path}"))
                .spawn(move || {
                    critical_call(|| {
                        if let Err(err) = run_render_loop(
                            &panel_path,
                            &source,
                            &signal,
                            render_period,
                            transition_factory.as_deref(),
                        ) {
                            log::error!("{panel_path}: render loop exited with error: {err}");
                        }
                    });
                })
                .expect("failed to spawn render thread"),
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        self.signal.should_run.store(false, Ordering::Release);
        self.waker().wake();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.source.lock().unwrap().shutdown();
    }
}

fn run_render_loop<S: RenderSource + 'static>(
    panel_path: &str,
    source: &Arc<Mutex<S>>,
    signal: &Arc<WakeSignal>,
    render_period: Duration,
    transition_factory: Option<&(dyn Fn() -> Box<dyn Transition> + Send + Sync)>,
) -> Result<(), PanelError> {
    let panel = Panel::open(panel_path)?;
    panel.clear()?;

    {
        let source = Arc::clone(source);
        panel.register_key_handler(move |event| source.lock().unwrap().handle_key(event));
    }

    let mut target = Shadow::new(crate::panel::WIDTH, crate::panel::HEIGHT, crate::panel::LED_COUNT);
    let mut sent = Shadow::new(crate::panel::WIDTH, crate::panel::HEIGHT, crate::panel::LED_COUNT);
    for i in 0..crate::panel::LED_COUNT {
        panel.set_led(i, 0, 0)?;
    }

    source.lock().unwrap().init(target.width(), target.height(), crate::panel::LED_COUNT);

    let mut transition: Option<Box<dyn Transition>> = None;

    while signal.should_run.load(Ordering::Acquire) {
        if signal.cancel_transition.swap(false, Ordering::AcqRel) {
            if let Some(t) = transition.as_mut() {
                t.stop();
            }
            transition = None;
        } else if signal.start_transition.swap(false, Ordering::AcqRel) {
            let from = Endpoints {
                cells: sent.cells().to_vec(),
                leds: sent.leds().to_vec(),
                width: sent.width(),
                height: sent.height(),
            };
            source.lock().unwrap().render_target(&mut target, true);
            let to = Endpoints {
                cells: target.cells().to_vec(),
                leds: target.leds().to_vec(),
                width: target.width(),
                height: target.height(),
            };
            if let Some(factory) = transition_factory {
                let mut t = factory();
                t.start(from, to);
                transition = Some(t);
            }
        }

        let frame = if let Some(t) = transition.as_mut() {
            let frame = t.render();
            if frame.is_none() {
                transition = None;
            }
            frame
        } else {
            source.lock().unwrap().render_target(&mut target, false);
            Some(Endpoints {
                cells: target.cells().to_vec(),
                leds: target.leds().to_vec(),
                width: target.width(),
                height: target.height(),
            })
        };

        if let Some(frame) = frame {
            for (idx, red, green) in diff_leds(sent.leds(), &frame.leds) {
                panel.set_led(idx, red, green)?;
            }
            for range in diff_cells(sent.cells(), &frame.cells) {
                let col = (range.start % frame.width) as u8;
                let row = (range.start / frame.width) as u8;
                let text = crate::latin1::decode(&frame.cells[range.start..range.end]);
                panel.write_cells(col, row, &text)?;
            }
            sent.load_raw(&frame.cells, &frame.leds);
        }

        let guard = signal.mutex.lock().unwrap();
        let _ = signal.cv.wait_timeout(guard, render_period);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource {
        text: &'static str,
    }

    impl RenderSource for StaticSource {
        fn render_target(&mut self, shadow: &mut Shadow, _force: bool) {
            let _ = shadow.set_line(0, self.text);
        }
    }

    #[test]
    fn waker_notifies_without_panicking_when_unstarted() {
        let waker = RenderWaker::new();
        let driver = Driver::new("/dev/null", StaticSource { text: "hi" }, DEFAULT_RENDER_PERIOD, waker);
        driver.waker().wake();
        driver.waker().request_transition();
        driver.waker().cancel_transition();
    }
}
