//! Panel link (component C3): owns one serial connection, matches
//! synchronous requests to their responses, and dispatches unsolicited key
//! reports to registered handlers.

use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::framer::Framer;
use crate::keys::{decode_key_report, KeyEvent};
use crate::latin1;
use crate::packet::{Packet, PacketType};

const BAUD_RATE: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_secs(1);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(250);
const MAX_ATTEMPTS: u32 = 6;
const REPORT_KEY: u8 = 0x00;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LinkError {
    #[error("io error")]
    Io(#[from] io::Error),

    #[error("serial port error")]
    Serial(#[from] serialport::Error),

    #[error("no response to command {command:#04x} after {attempts} attempts")]
    Timeout { command: u8, attempts: u32 },

    #[error("panel reported an error: {message}")]
    Protocol { message: String },
}

type KeyHandler = Box<dyn Fn(KeyEvent) + Send + 'static>;

struct Shared {
    last_response: Mutex<Option<Packet>>,
    response_cv: Condvar,
    send_lock: Mutex<()>,
    handlers: Mutex<Vec<KeyHandler>>,
    should_run: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            last_response: Mutex::new(None),
            response_cv: Condvar::new(),
            send_lock: Mutex::new(()),
            handlers: Mutex::new(Vec::new()),
            should_run: AtomicBool::new(true),
        }
    }
}

/// Owns the serial connection to one panel and the reader thread that
/// drains it.
pub struct PanelLink {
    shared: Arc<Shared>,
    writer: Mutex<Box<dyn serialport::SerialPort>>,
    reader_thread: Option<JoinHandle<()>>,
    port_name: String,
}

impl PanelLink {
    /// Opens `path` at 115200 8-N-1 with a 1s read timeout and starts the
    /// reader thread.
    pub fn open(path: &str) -> Result<Self, LinkError> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()?;
        let reader_port = port.try_clone()?;

        let shared = Arc::new(Shared::new());
        let reader_shared = Arc::clone(&shared);
        let path_owned = path.to_owned();
        let reader_thread = thread::Builder::new()
            .name(format!("panel-reader-{path}"))
            .spawn(move || reader_loop(reader_port, reader_shared, &path_owned))
            .expect("failed to spawn panel reader thread");

        Ok(Self {
            shared,
            writer: Mutex::new(port),
            reader_thread: Some(reader_thread),
            port_name: path.to_owned(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Registers a handler invoked synchronously on the reader thread for
    /// every decoded key event. A panicking handler is caught and logged;
    /// it does not stop the reader.
    pub fn register_key_handler(&self, handler: impl Fn(KeyEvent) + Send + 'static) {
        self.shared.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Sends `command` with `data` and waits (up to 5 retries) for a
    /// matching response, returning its payload.
    pub fn send(&self, command: u8, data: &[u8]) -> Result<Vec<u8>, LinkError> {
        let _send_guard = self.shared.send_lock.lock().unwrap();
        let packet = Packet::new(PacketType::Request, command, data);
        let bytes = packet.to_bytes();

        for attempt in 1..=MAX_ATTEMPTS {
            let resp_guard = self.shared.last_response.lock().unwrap();
            {
                let mut writer = self.writer.lock().unwrap();
                writer.write_all(&bytes)?;
                writer.flush()?;
            }

            let (mut resp_guard, wait_result) = self
                .shared
                .response_cv
                .wait_timeout_while(resp_guard, RESPONSE_TIMEOUT, |response| {
                    !matches!(response, Some(p) if p.command() == command)
                })
                .unwrap();

            if wait_result.timed_out() {
                log::warn!(
                    "{}: timed out waiting for response to command {command:#04x} (attempt {attempt}/{MAX_ATTEMPTS})",
                    self.port_name
                );
                continue;
            }

            let response = resp_guard.take().expect("predicate guarantees Some");
            return match response.packet_type() {
                PacketType::Error => Err(LinkError::Protocol {
                    message: latin1::decode(response.data()),
                }),
                _ => Ok(response.data().to_vec()),
            };
        }

        Err(LinkError::Timeout {
            command,
            attempts: MAX_ATTEMPTS,
        })
    }
}

impl Drop for PanelLink {
    fn drop(&mut self) {
        self.shared.should_run.store(false, Ordering::Release);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(mut port: Box<dyn serialport::SerialPort>, shared: Arc<Shared>, port_name: &str) {
    let mut framer = Framer::new();
    let mut buf = [0u8; 512];
    while shared.should_run.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => framer.push_bytes(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::error!("{port_name}: reader thread exiting after fatal I/O error: {e}");
                return;
            }
        }

        while let Some(packet) = framer.next_packet() {
            dispatch(&shared, packet, port_name);
        }
    }
}

fn dispatch(shared: &Shared, packet: Packet, port_name: &str) {
    match packet.packet_type() {
        PacketType::Response | PacketType::Error => {
            let mut guard = shared.last_response.lock().unwrap();
            if guard.is_some() {
                log::warn!(
                    "{port_name}: response for command {:#04x} overwrote one still unconsumed (lost request?)",
                    packet.command()
                );
            }
            *guard = Some(packet);
            shared.response_cv.notify_all();
        }
        PacketType::Report if packet.command() == REPORT_KEY => {
            let Some(&byte) = packet.data().first() else {
                return;
            };
            let Some(event) = decode_key_report(byte) else {
                log::debug!("{port_name}: invalid key report byte {byte}");
                return;
            };
            let handlers = shared.handlers.lock().unwrap();
            for handler in handlers.iter() {
                if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                    log::error!("{port_name}: key event handler panicked, ignoring");
                }
            }
        }
        PacketType::Report => {
            log::trace!(
                "{port_name}: ignoring report with command {:#04x}",
                packet.command()
            );
        }
        PacketType::Request => {
            log::warn!(
                "{port_name}: received REQUEST-type packet from panel (command {:#04x}), ignoring",
                packet.command()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_routes_key_reports_to_handlers() {
        let shared = Arc::new(Shared::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        shared
            .handlers
            .lock()
            .unwrap()
            .push(Box::new(move |event| seen_clone.lock().unwrap().push(event)));

        let packet = Packet::new(PacketType::Report, REPORT_KEY, &[0x02]);
        dispatch(&shared, packet, "test");

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn dispatch_swallows_panicking_handlers() {
        let shared = Arc::new(Shared::new());
        let calls = Arc::new(Mutex::new(0));
        let calls_clone = Arc::clone(&calls);
        shared.handlers.lock().unwrap().push(Box::new(|_event| {
            panic!("boom");
        }));
        shared.handlers.lock().unwrap().push(Box::new(move |_event| {
            *calls_clone.lock().unwrap() += 1;
        }));

        let packet = Packet::new(PacketType::Report, REPORT_KEY, &[0x01]);
        dispatch(&shared, packet, "test");

        assert_eq!(*calls.lock().unwrap(), 1, "second handler still ran");
    }

    #[test]
    fn dispatch_stores_response_and_notifies() {
        let shared = Arc::new(Shared::new());
        let packet = Packet::new(PacketType::Response, 0x00, &[]);
        dispatch(&shared, packet.clone(), "test");
        assert_eq!(*shared.last_response.lock().unwrap(), Some(packet));
    }
}
