//! Process bootstrap (ambient component A3): device-node creation and
//! privilege drop, run once before the supervisor starts.

use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use nix::unistd::{setgid, setuid, Gid, Uid};
use thiserror::Error;

/// Major device number for Linux USB-serial TTYs.
const USB_SERIAL_MAJOR: u64 = 188;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("failed to create device node {path}")]
    MakeNode { path: String, source: nix::Error },

    #[error("failed to set gid {gid}")]
    SetGid { gid: u32, source: nix::Error },

    #[error("failed to set uid {uid}")]
    SetUid { uid: u32, source: nix::Error },
}

/// Creates `/dev/ttyUSB0` .. `/dev/ttyUSB{count-1}` as character devices.
/// Failures are logged and skipped rather than aborting the run — a node
/// that already exists from a previous boot is not an error.
pub fn make_tty_devs(count: u32) {
    for idx in 0..count {
        if let Err(err) = make_tty_dev(idx) {
            log::warn!("failed to create /dev/ttyUSB{idx}: {err}");
        }
    }
}

fn make_tty_dev(idx: u32) -> Result<(), BootstrapError> {
    let path = format!("/dev/ttyUSB{idx}");
    let dev = makedev(USB_SERIAL_MAJOR, idx as u64);
    let mode = Mode::from_bits_truncate(0o666);
    mknod(path.as_str(), SFlag::S_IFCHR, mode, dev).map_err(|source| BootstrapError::MakeNode { path, source })
}

/// Drops privileges to `(uid, gid)`, setting gid before uid so the
/// process still holds `CAP_SETUID`/`CAP_SETGID` when the gid change
/// happens.
pub fn drop_privileges(uid: u32, gid: u32) -> Result<(), BootstrapError> {
    setgid(Gid::from_raw(gid)).map_err(|source| BootstrapError::SetGid { gid, source })?;
    setuid(Uid::from_raw(uid)).map_err(|source| BootstrapError::SetUid { uid, source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_and_number_are_well_formed() {
        let dev = makedev(USB_SERIAL_MAJOR, 3);
        assert_eq!(nix::sys::stat::major(dev), USB_SERIAL_MAJOR);
        assert_eq!(nix::sys::stat::minor(dev), 3);
    }
}
