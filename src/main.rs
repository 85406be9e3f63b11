//! Binary entrypoint: loads configuration, bootstraps the supervisor, and
//! blocks until interrupted.

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;

use cfa635_dash::config;
use cfa635_dash::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "cfa635-dashd", about = "Multi-panel dashboard driver for CFA635 character LCDs")]
struct Args {
    /// Path to the JSON configuration file. Overrides CFA635_CONFIG.
    #[arg(long)]
    config: Option<String>,

    /// Number of /dev/ttyUSBN device nodes to create on startup.
    #[arg(long, env = "MAKE_TTY_DEVS", default_value_t = 0)]
    make_tty_devs: u32,

    /// uid to drop privileges to once device nodes are created.
    #[arg(long, env = "PUID", default_value_t = 0)]
    uid: u32,

    /// gid to drop privileges to once device nodes are created.
    #[arg(long, env = "PGID", default_value_t = 0)]
    gid: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match config::load_config(args.config.as_deref().map(std::path::Path::new)) {
        Ok(config) => config,
        Err(err) => {
            log::error!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let supervisor = match Supervisor::bootstrap_and_run(config, args.make_tty_devs, args.uid, args.gid) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            log::error!("failed to start supervisor: {err}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("running {} display driver(s)", supervisor.driver_count());

    let supervisor = Arc::new(Mutex::new(supervisor));
    let shutdown = Arc::clone(&supervisor);
    let handler_result = ctrlc::set_handler(move || {
        log::info!("received interrupt, shutting down");
        shutdown.lock().unwrap().stop_all();
        std::process::exit(0);
    });
    if let Err(err) = handler_result {
        log::error!("failed to install signal handler: {err}");
        return ExitCode::FAILURE;
    }

    loop {
        std::thread::park();
    }
}
