//! Transition engine (component C7): timed interpolation between two
//! framebuffers, selected by name from configuration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Endpoints a transition interpolates between: cell bytes plus LED
/// `(red, green)` pairs, at a fixed width/height.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub cells: Vec<u8>,
    pub leds: Vec<(u8, u8)>,
    pub width: usize,
    pub height: usize,
}

/// A finite state machine {idle, running} that produces interpolated
/// frames for a fixed period after [`Transition::start`].
pub trait Transition: Send {
    /// Begins a run between `from` and `to`. Both snapshots must share
    /// `width`/`height`.
    fn start(&mut self, from: Endpoints, to: Endpoints);

    /// Advances the transition and returns the frame to display this tick,
    /// or `None` once progress has reached 1.0 (the render loop then falls
    /// back to the live page output).
    fn render(&mut self) -> Option<Endpoints>;

    /// Whether a run is currently in progress.
    fn is_running(&self) -> bool;

    /// Forces immediate completion: the buffer becomes the target and
    /// `is_running()` becomes false.
    fn stop(&mut self);
}

/// Shared timing/endpoint bookkeeping every concrete transition embeds.
struct Base {
    from: Option<Endpoints>,
    to: Option<Endpoints>,
    period: Duration,
    start_time: Option<Instant>,
    running: bool,
}

impl Base {
    fn new(period: Duration) -> Self {
        Self {
            from: None,
            to: None,
            period,
            start_time: None,
            running: false,
        }
    }

    fn start(&mut self, from: Endpoints, to: Endpoints) {
        self.from = Some(from);
        self.to = Some(to);
        self.start_time = Some(Instant::now());
        self.running = true;
    }

    /// Returns `progress` in `[0, 1]`, or `None` once the run has completed
    /// (caller should then stop and fall back to live output).
    fn progress(&mut self) -> Option<f64> {
        let start_time = self.start_time?;
        let elapsed = start_time.elapsed().as_secs_f64();
        let period = self.period.as_secs_f64();
        let progress = if period > 0.0 { elapsed / period } else { 1.0 };
        if progress >= 1.0 {
            self.running = false;
            return None;
        }
        Some(progress)
    }

    fn target(&self) -> &Endpoints {
        self.to.as_ref().expect("progress() returned Some only after start()")
    }

    fn source(&self) -> &Endpoints {
        self.from.as_ref().expect("progress() returned Some only after start()")
    }

    fn lerp_leds(&self, progress: f64) -> Vec<(u8, u8)> {
        let from = &self.source().leds;
        let to = &self.target().leds;
        from.iter()
            .zip(to.iter())
            .map(|(&(fr, fg), &(tr, tg))| (lerp_u8(fr, tr, progress), lerp_u8(fg, tg, progress)))
            .collect()
    }
}

fn lerp_u8(from: u8, to: u8, progress: f64) -> u8 {
    let value = from as f64 + (to as f64 - from as f64) * progress;
    value.round().clamp(0.0, 255.0) as u8
}

/// The trivial identity transition: finishes immediately on the first
/// `render()` call.
pub struct NoneTransition {
    base: Base,
}

impl NoneTransition {
    pub fn new(period: Duration) -> Self {
        Self { base: Base::new(period) }
    }
}

impl Transition for NoneTransition {
    fn start(&mut self, from: Endpoints, to: Endpoints) {
        self.base.start(from, to);
    }

    fn render(&mut self) -> Option<Endpoints> {
        self.base.running = false;
        None
    }

    fn is_running(&self) -> bool {
        self.base.running
    }

    fn stop(&mut self) {
        self.base.running = false;
    }
}

/// Progressively copies target cells into the running buffer from index 0
/// upward, as if printed onto the panel.
pub struct PrinterTransition {
    base: Base,
    data: Vec<u8>,
    set_up_to: usize,
}

impl PrinterTransition {
    pub fn new(period: Duration) -> Self {
        Self {
            base: Base::new(period),
            data: Vec::new(),
            set_up_to: 0,
        }
    }
}

impl Transition for PrinterTransition {
    fn start(&mut self, from: Endpoints, to: Endpoints) {
        self.data = from.cells.clone();
        self.set_up_to = 0;
        self.base.start(from, to);
    }

    fn render(&mut self) -> Option<Endpoints> {
        let progress = self.base.progress()?;
        let target = self.base.target();
        let pixel_count = target.width * target.height;
        let target_set = (pixel_count as f64 * progress).round() as usize;

        if target_set > self.set_up_to {
            self.data[self.set_up_to..target_set].copy_from_slice(&target.cells[self.set_up_to..target_set]);
            self.set_up_to = target_set;
        }

        Some(Endpoints {
            cells: self.data.clone(),
            leds: self.base.lerp_leds(progress),
            width: target.width,
            height: target.height,
        })
    }

    fn is_running(&self) -> bool {
        self.base.running
    }

    fn stop(&mut self) {
        if let Some(to) = &self.base.to {
            self.data = to.cells.clone();
        }
        self.base.running = false;
    }
}

/// Overlays a solid-block glyph (`0x1F`) spreading inward from both side
/// edges of each row, revealing the target once past the halfway point.
pub struct CurtainTransition {
    base: Base,
}

const CURTAIN_GLYPH: u8 = 0x1F;

impl CurtainTransition {
    pub fn new(period: Duration) -> Self {
        Self { base: Base::new(period) }
    }
}

impl Transition for CurtainTransition {
    fn start(&mut self, from: Endpoints, to: Endpoints) {
        self.base.start(from, to);
    }

    fn render(&mut self) -> Option<Endpoints> {
        let progress = self.base.progress()?;
        let target = self.base.target();
        let width = target.width;
        let height = target.height;

        let mut cells = if progress < 0.5 {
            self.base.source().cells.clone()
        } else {
            target.cells.clone()
        };

        let curtain_width = if progress < 0.5 {
            (width as f64 * progress).round() as usize
        } else {
            (width as f64 * (1.0 - progress)).round() as usize
        };

        for row in 0..height {
            let row_start = row * width;
            for col in 0..curtain_width.min(width) {
                cells[row_start + col] = CURTAIN_GLYPH;
                cells[row_start + (width - 1 - col)] = CURTAIN_GLYPH;
            }
        }

        Some(Endpoints {
            cells,
            leds: self.base.lerp_leds(progress),
            width,
            height,
        })
    }

    fn is_running(&self) -> bool {
        self.base.running
    }

    fn stop(&mut self) {
        self.base.running = false;
    }
}

/// Constructs a boxed transition by configuration name (`"none"`,
/// `"printer"`, or `"curtain"`), looked up in a static registry populated
/// once at process start rather than via dynamic factory lookup.
pub fn registry() -> HashMap<&'static str, fn(Duration) -> Box<dyn Transition>> {
    let mut map: HashMap<&'static str, fn(Duration) -> Box<dyn Transition>> = HashMap::new();
    map.insert("none", |period| Box::new(NoneTransition::new(period)));
    map.insert("printer", |period| Box::new(PrinterTransition::new(period)));
    map.insert("curtain", |period| Box::new(CurtainTransition::new(period)));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn endpoints(fill: u8, width: usize, height: usize) -> Endpoints {
        Endpoints {
            cells: vec![fill; width * height],
            leds: vec![(0, 0); 4],
            width,
            height,
        }
    }

    #[test]
    fn none_transition_finishes_immediately() {
        let mut t = NoneTransition::new(Duration::from_secs(1));
        t.start(endpoints(b' ', 4, 2), endpoints(b'X', 4, 2));
        assert!(t.render().is_none());
        assert!(!t.is_running());
    }

    #[test]
    fn printer_transition_copies_progressively_and_completes() {
        let mut t = PrinterTransition::new(Duration::from_millis(20));
        t.start(endpoints(b' ', 4, 1), endpoints(b'X', 4, 1));
        assert!(t.is_running());
        sleep(Duration::from_millis(30));
        assert!(t.render().is_none());
    }

    #[test]
    fn printer_stop_forces_target() {
        let mut t = PrinterTransition::new(Duration::from_secs(5));
        t.start(endpoints(b' ', 4, 1), endpoints(b'X', 4, 1));
        t.stop();
        assert!(!t.is_running());
    }

    #[test]
    fn curtain_overlays_glyph_at_edges_before_halfway() {
        let mut t = CurtainTransition::new(Duration::from_secs(100));
        t.start(endpoints(b' ', 10, 1), endpoints(b'X', 10, 1));
        let frame = t.render().expect("still running");
        assert_eq!(frame.cells[0], CURTAIN_GLYPH);
        assert_eq!(frame.cells[9], CURTAIN_GLYPH);
    }

    #[test]
    fn registry_builds_all_three_named_transitions() {
        let reg = registry();
        assert!(reg.contains_key("none"));
        assert!(reg.contains_key("printer"));
        assert!(reg.contains_key("curtain"));
        let t = reg["curtain"](Duration::from_secs(1));
        assert!(!t.is_running());
    }

    #[test]
    fn led_interpolation_is_monotonic_component_wise() {
        assert_eq!(lerp_u8(0, 100, 0.0), 0);
        assert_eq!(lerp_u8(0, 100, 1.0), 100);
        assert_eq!(lerp_u8(0, 100, 0.5), 50);
    }
}
