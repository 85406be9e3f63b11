//! Page base and updating page (component C8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::keys::Key;
use crate::shadow::Shadow;
use crate::utils::{critical_call, LedColorPreset};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("title {len} characters long does not fit panel width {width}")]
    TitleTooLong { len: usize, width: usize },
}

/// Geometry and a render-thread waker handed to every page at `start()`.
#[derive(Clone)]
pub struct PageContext {
    pub width: usize,
    pub height: usize,
    pub led_count: usize,
    pub wake_render: Arc<dyn Fn() + Send + Sync>,
}

/// A page in the cycle. `render` writes this tick's content into `shadow`;
/// `force` is set when the page just became current (or a transition is
/// about to start) and should redraw unconditionally rather than
/// incrementally.
pub trait Page: Send {
    fn title(&self) -> &str;
    fn start(&mut self, ctx: &PageContext);
    fn stop(&mut self);
    fn render(&mut self, shadow: &mut Shadow, force: bool);

    fn on_key_down(&mut self, _key: Key) {}
    fn on_key_up(&mut self, _key: Key) {}
}

/// Common title bookkeeping every concrete page embeds, mirroring the
/// fields a `Page` base class would hold.
pub struct PageBase {
    title: String,
    formatted_title: String,
    width: usize,
    should_run: bool,
}

impl PageBase {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            formatted_title: String::new(),
            width: 0,
            should_run: false,
        }
    }

    pub fn start(&mut self, ctx: &PageContext) {
        self.width = ctx.width;
        self.formatted_title = format_text_center(&self.title, '=', ctx.width)
            .unwrap_or_else(|_| self.title.clone());
        self.should_run = true;
    }

    pub fn stop(&mut self) {
        self.should_run = false;
    }

    pub fn is_running(&self) -> bool {
        self.should_run
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Writes the centred title into row 0.
    pub fn render_title(&self, shadow: &mut Shadow) {
        let _ = shadow.write_text_at(0, 0, &self.formatted_title);
    }
}

/// Centres `text` within `width`, padding with `pad_char`. Ported from the
/// original title-centring routine: an odd/even parity mismatch is
/// resolved by growing an existing inner space (or appending one) before
/// the symmetric padding pass.
pub fn format_text_center(text: &str, pad_char: char, width: usize) -> Result<String, PageError> {
    let mut chars: Vec<char> = text.chars().collect();
    if chars.len() > width {
        return Err(PageError::TitleTooLong {
            len: chars.len(),
            width,
        });
    }
    if chars.len() == width {
        return Ok(chars.into_iter().collect());
    }

    if chars.len() % 2 != width % 2 {
        if let Some(space_idx) = nearest_space_index(&chars) {
            chars.insert(space_idx, ' ');
        } else {
            chars.push(' ');
        }
    }

    if chars.len() == width {
        return Ok(chars.into_iter().collect());
    }

    chars.insert(0, ' ');
    chars.push(' ');

    if chars.len() == width {
        return Ok(chars.into_iter().collect());
    }

    let pad_count = (width - chars.len()) / 2;
    let mut result = String::with_capacity(width);
    result.extend(std::iter::repeat(pad_char).take(pad_count));
    result.extend(chars.iter());
    result.extend(std::iter::repeat(pad_char).take(pad_count));
    Ok(result)
}

fn nearest_space_index(chars: &[char]) -> Option<usize> {
    if !chars.contains(&' ') {
        return None;
    }
    let len = chars.len();
    let center = len as f64 / 2.0;
    let mut offset = 0.5;
    while (offset as usize) < len {
        let hi = (center + offset).round();
        if hi >= 0.0 && (hi as usize) < len && chars[hi as usize] == ' ' {
            return Some(hi as usize);
        }
        let lo = center - offset;
        if lo >= 0.0 && (lo as usize) < len && chars[lo as usize] == ' ' {
            return Some(lo as usize);
        }
        offset += 1.0;
    }
    None
}

/// What an [`UpdatingPage`] needs from its concrete content: a periodic
/// fetch and a render of whatever that fetch produced.
pub trait UpdatingBody: Send + 'static {
    fn update(&mut self) -> Result<(), String>;
    fn render_body(&mut self, shadow: &mut Shadow, width: usize, height: usize);
}

struct UpdateSignal {
    stop: Mutex<bool>,
    cv: Condvar,
}

/// A page with an independent background refresh worker. On entry to a
/// fetch, LED 0 goes to a warning colour; success clears it, a caught
/// error from `update()` sets it critical. The worker is never stopped by
/// a failing fetch, only by `stop()`.
pub struct UpdatingPage<B: UpdatingBody> {
    base: PageBase,
    body: Arc<Mutex<B>>,
    update_period: Duration,
    use_led0_for_updates: bool,
    updating_led: Arc<Mutex<LedColorPreset>>,
    signal: Arc<UpdateSignal>,
    first_update_done: Arc<AtomicBool>,
    update_thread: Option<JoinHandle<()>>,
}

impl<B: UpdatingBody> UpdatingPage<B> {
    pub fn new(title: impl Into<String>, update_period: Duration, body: B) -> Self {
        Self {
            base: PageBase::new(title),
            body: Arc::new(Mutex::new(body)),
            update_period,
            use_led0_for_updates: true,
            updating_led: Arc::new(Mutex::new(LedColorPreset::Off)),
            signal: Arc::new(UpdateSignal {
                stop: Mutex::new(false),
                cv: Condvar::new(),
            }),
            first_update_done: Arc::new(AtomicBool::new(false)),
            update_thread: None,
        }
    }

    pub fn with_led0_updates(mut self, enabled: bool) -> Self {
        self.use_led0_for_updates = enabled;
        self
    }
}

impl<B: UpdatingBody> Page for UpdatingPage<B> {
    fn title(&self) -> &str {
        &self.base.title
    }

    fn start(&mut self, ctx: &PageContext) {
        self.base.start(ctx);
        *self.signal.stop.lock().unwrap() = false;
        self.first_update_done.store(false, Ordering::Release);

        let body = Arc::clone(&self.body);
        let updating_led = Arc::clone(&self.updating_led);
        let signal = Arc::clone(&self.signal);
        let first_update_done = Arc::clone(&self.first_update_done);
        let update_period = self.update_period;
        let wake_render = Arc::clone(&ctx.wake_render);
        let title = self.base.title.clone();

        self.update_thread = Some(
            thread::Builder::new()
                .name(format!("page-update-{title}"))
                .spawn(move || {
                    critical_call(|| {
                        update_loop(
                            &body,
                            &updating_led,
                            &signal,
                            &first_update_done,
                            update_period,
                            wake_render.as_ref(),
                        )
                    });
                })
                .expect("failed to spawn page update thread"),
        );
    }

    fn stop(&mut self) {
        self.base.stop();
        *self.signal.stop.lock().unwrap() = true;
        self.signal.cv.notify_all();
        if let Some(handle) = self.update_thread.take() {
            let _ = handle.join();
        }
    }

    fn render(&mut self, shadow: &mut Shadow, force: bool) {
        let _ = force;
        self.base.render_title(shadow);
        let (width, height) = (shadow.width(), shadow.height());
        self.body.lock().unwrap().render_body(shadow, width, height);
        if self.use_led0_for_updates {
            let (r, g) = self.updating_led.lock().unwrap().rgb();
            let _ = shadow.set_led(0, r, g);
        }
    }
}

fn update_loop<B: UpdatingBody>(
    body: &Arc<Mutex<B>>,
    updating_led: &Arc<Mutex<LedColorPreset>>,
    signal: &Arc<UpdateSignal>,
    first_update_done: &Arc<AtomicBool>,
    update_period: Duration,
    wake_render: &(dyn Fn() + Send + Sync),
) {
    loop {
        {
            let mut stop = signal.stop.lock().unwrap();
            if *stop {
                return;
            }
            drop(stop);
            *updating_led.lock().unwrap() = LedColorPreset::Warning;
            wake_render();
            stop = signal.stop.lock().unwrap();
            if *stop {
                return;
            }
        }

        let result = body.lock().unwrap().update();
        match result {
            Ok(()) => {
                *updating_led.lock().unwrap() = LedColorPreset::Off;
                if !first_update_done.swap(true, Ordering::AcqRel) {
                    wake_render();
                }
            }
            Err(message) => {
                *updating_led.lock().unwrap() = LedColorPreset::Critical;
                log::error!("page update failed: {message}");
            }
        }
        wake_render();

        let stop_guard = signal.stop.lock().unwrap();
        let (stop_guard, _) = signal
            .cv
            .wait_timeout_while(stop_guard, update_period, |stop| !*stop)
            .unwrap();
        if *stop_guard {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_even_parity_text() {
        assert_eq!(format_text_center("HI", '=', 4).unwrap(), " HI ");
    }

    #[test]
    fn centers_exact_width_text_unchanged() {
        assert_eq!(format_text_center("ABCD", '=', 4).unwrap(), "ABCD");
    }

    #[test]
    fn grows_inner_space_on_parity_mismatch() {
        let out = format_text_center("A B", '=', 6).unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.contains("A  B") || out.contains("A B "));
    }

    #[test]
    fn rejects_title_wider_than_panel() {
        assert_eq!(
            format_text_center("WAY TOO LONG", '=', 4),
            Err(PageError::TitleTooLong { len: 12, width: 4 })
        );
    }

    struct CountingBody {
        calls: Arc<Mutex<u32>>,
    }

    impl UpdatingBody for CountingBody {
        fn update(&mut self) -> Result<(), String> {
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }

        fn render_body(&mut self, shadow: &mut Shadow, _width: usize, _height: usize) {
            let _ = shadow.set_line(1, "ok");
        }
    }

    #[test]
    fn updating_page_runs_update_loop_and_renders() {
        let calls = Arc::new(Mutex::new(0));
        let mut page = UpdatingPage::new(
            "TEST",
            Duration::from_millis(20),
            CountingBody {
                calls: Arc::clone(&calls),
            },
        );
        let ctx = PageContext {
            width: 20,
            height: 4,
            led_count: 4,
            wake_render: Arc::new(|| {}),
        };
        page.start(&ctx);
        std::thread::sleep(Duration::from_millis(60));
        page.stop();
        assert!(*calls.lock().unwrap() >= 1);

        let mut shadow = Shadow::new(20, 4, 4);
        page.render(&mut shadow, true);
        assert_eq!(&shadow.cells()[20..22], b"ok");
    }
}
