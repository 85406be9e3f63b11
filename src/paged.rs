//! Paged driver (component C9): an ordered page list with an auto-cycle
//! timer and key-driven navigation.

use std::time::{Duration, Instant};

use crate::keys::{Key, KeyEvent, KeyTransition};
use crate::page::{Page, PageContext};
use crate::render::{RenderSource, RenderWaker};
use crate::shadow::Shadow;

/// Holds the page list for one panel and decides, each tick, which page's
/// content goes into the target shadow.
pub struct PagedDriver {
    pages: Vec<Box<dyn Page>>,
    current_page: usize,
    auto_cycle_time: Option<Duration>,
    last_cycle_time: Instant,
    waker: RenderWaker,
}

impl PagedDriver {
    /// `auto_cycle_time` of `None` (or zero) disables automatic cycling.
    pub fn new(pages: Vec<Box<dyn Page>>, auto_cycle_time: Option<Duration>, waker: RenderWaker) -> Self {
        assert!(!pages.is_empty(), "a paged driver needs at least one page");
        Self {
            pages,
            current_page: 0,
            auto_cycle_time: auto_cycle_time.filter(|d| !d.is_zero()),
            last_cycle_time: Instant::now(),
            waker,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn next_page(&mut self) {
        self.current_page = (self.current_page + 1) % self.pages.len();
    }

    pub fn previous_page(&mut self) {
        self.current_page = if self.current_page == 0 {
            self.pages.len() - 1
        } else {
            self.current_page - 1
        };
    }

    pub fn set_page(&mut self, n: usize) {
        self.current_page = n % self.pages.len();
    }

    fn after_navigation(&mut self) {
        self.last_cycle_time = Instant::now();
        self.waker.request_transition();
    }

    /// Dispatches an incoming key report the same way the reader thread
    /// does for every registered handler: `on_key_down`+`on_key_press` on
    /// press, `on_key_up` on release. `DOWN`/`UP` additionally page the
    /// driver forward/backward.
    pub fn handle_key_event(&mut self, event: KeyEvent) {
        match event.transition {
            KeyTransition::Pressed => {
                match event.key {
                    Key::Down => {
                        self.next_page();
                        self.after_navigation();
                    }
                    Key::Up => {
                        self.previous_page();
                        self.after_navigation();
                    }
                    _ => {}
                }
                self.pages[self.current_page].on_key_down(event.key);
            }
            KeyTransition::Released => {
                self.pages[self.current_page].on_key_up(event.key);
            }
        }
    }
}

impl RenderSource for PagedDriver {
    fn init(&mut self, width: usize, height: usize, led_count: usize) {
        let waker = self.waker.clone();
        let ctx = PageContext {
            width,
            height,
            led_count,
            wake_render: std::sync::Arc::new(move || waker.wake()),
        };
        for page in self.pages.iter_mut() {
            page.start(&ctx);
        }
    }

    fn render_target(&mut self, shadow: &mut Shadow, force: bool) {
        if let Some(auto_cycle) = self.auto_cycle_time {
            if self.last_cycle_time.elapsed() > auto_cycle {
                self.next_page();
                self.last_cycle_time = Instant::now();
            }
        }
        shadow.clear();
        self.pages[self.current_page].render(shadow, force);
    }

    fn shutdown(&mut self) {
        for page in self.pages.iter_mut() {
            page.stop();
        }
    }

    fn handle_key(&mut self, event: KeyEvent) {
        self.handle_key_event(event);
    }
}
