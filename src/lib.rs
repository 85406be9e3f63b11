//! A multi-panel dashboard driver for Crystalfontz CFA635 character LCDs:
//! wire protocol, panel API, diff-compressed rendering, paged navigation,
//! panel discovery, and the supervisor that ties them together.

pub mod bootstrap;
pub mod config;
pub mod crc;
pub mod discovery;
pub mod framer;
pub mod keys;
pub mod latin1;
pub mod link;
pub mod metrics;
pub mod packet;
pub mod page;
pub mod paged;
pub mod panel;
pub mod pages;
pub mod render;
pub mod shadow;
pub mod supervisor;
pub mod transition;
pub mod utils;

pub use config::{load_config, Config};
pub use panel::Panel;
pub use supervisor::Supervisor;
