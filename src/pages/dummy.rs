//! Renders nothing but its own title; a placeholder page for testing a
//! cycle's layout and navigation without wiring up a metrics source.

use std::sync::Arc;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::{Page, PageBase, PageContext};
use crate::shadow::Shadow;

const DEFAULT_TITLE: &str = "DUMMY PAGE";

pub struct DummyPage {
    base: PageBase,
}

impl DummyPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            base: PageBase::new(title),
        }
    }
}

impl Page for DummyPage {
    fn title(&self) -> &str {
        self.base.title()
    }

    fn start(&mut self, ctx: &PageContext) {
        self.base.start(ctx);
    }

    fn stop(&mut self) {
        self.base.stop();
    }

    fn render(&mut self, shadow: &mut Shadow, _force: bool) {
        self.base.render_title(shadow);
    }
}

pub fn build(config: &PageConfig, _metrics: Arc<dyn MetricsClient>) -> Box<dyn Page> {
    let title = config.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Box::new(DummyPage::new(title))
}
