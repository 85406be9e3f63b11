//! Panel discovery and identity persistence (component C10): enumerate
//! serial ports, read/write identity in user flash, and pair configured
//! display IDs to physical ports.

use std::collections::HashMap;

use thiserror::Error;

use crate::panel::{Panel, PanelError, USER_FLASH_LEN};

/// The substring `serialport`'s device description must contain for a
/// port to be considered a CFA635 panel.
pub const IDENTIFYING_SUBSTRING: &str = "CFA635-USB";

/// The initial-config schema version this implementation writes and
/// expects; a port whose stored version differs is re-initialised.
pub const CURRENT_CONFIG_VERSION: u8 = 0x01;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("serial port enumeration failed")]
    Enumeration(#[from] serialport::Error),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("id {0} is reserved (0x00 and 0xFF mean \"unassigned\")")]
    ReservedId(u8),

    #[error("no free port available for display {name:?} (id {id})")]
    NoFreePort { id: u8, name: String },
}

/// A serial port candidate as returned by enumeration, trimmed to the
/// fields discovery needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub device: String,
    pub description: String,
}

/// Abstraction over serial port enumeration, so discovery's pairing logic
/// can be tested without real hardware or `serialport`'s OS calls.
pub trait PortEnumerator {
    fn enumerate(&self) -> Result<Vec<PortCandidate>, DiscoveryError>;
}

/// The real enumerator, backed by `serialport::available_ports`.
pub struct SystemPortEnumerator;

impl PortEnumerator for SystemPortEnumerator {
    fn enumerate(&self) -> Result<Vec<PortCandidate>, DiscoveryError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| PortCandidate {
                device: p.port_name,
                description: describe(&p.port_type),
            })
            .collect())
    }
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(info) => info
            .product
            .clone()
            .or_else(|| info.manufacturer.clone())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Keeps only candidates whose description identifies them as a CFA635.
pub fn filter_cfa635_ports(candidates: &[PortCandidate]) -> Vec<PortCandidate> {
    candidates
        .iter()
        .filter(|c| c.description.contains(IDENTIFYING_SUBSTRING))
        .cloned()
        .collect()
}

/// The `(id, config_version)` pair stored in a panel's non-volatile user
/// flash, or `None` if the panel has never been assigned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: u8,
    pub config_version: u8,
}

/// Interprets the first two bytes of a 16-byte user flash read.
/// `id ∈ {0x00, 0xFF}` means unassigned.
pub fn classify_identity(flash: [u8; USER_FLASH_LEN]) -> Option<Identity> {
    match flash[0] {
        0x00 | 0xFF => None,
        id => Some(Identity {
            id,
            config_version: flash[1],
        }),
    }
}

pub fn read_identity(panel: &Panel) -> Result<Option<Identity>, PanelError> {
    Ok(classify_identity(panel.read_user_flash()?))
}

pub fn write_identity(panel: &Panel, id: u8, config_version: u8) -> Result<(), DiscoveryError> {
    if id == 0x00 || id == 0xFF {
        return Err(DiscoveryError::ReservedId(id));
    }
    let mut blob = [0u8; USER_FLASH_LEN];
    blob[0] = id;
    blob[1] = config_version;
    panel.write_user_flash(&blob)?;
    Ok(())
}

/// Runs the first-boot sequence for a freshly paired panel: backlight,
/// contrast, a banner showing its id, full key reporting, LEDs off, save
/// as default, then stamp its identity into flash.
pub fn run_initial_config(panel: &Panel, id: u8) -> Result<(), DiscoveryError> {
    use crate::keys::KeyMask;

    panel.set_backlight(10)?;
    panel.set_contrast(100)?;
    panel.clear()?;
    panel.write_cells(0, 0, "CFA635 DASHBOARD")?;
    panel.write_cells(0, 1, &"=".repeat(crate::panel::WIDTH))?;
    panel.write_cells(0, 2, &format!("ID {id}"))?;
    panel.write_cells(0, 3, &format!("Init config {CURRENT_CONFIG_VERSION}"))?;
    panel.set_key_reporting(KeyMask::ALL, KeyMask::ALL)?;
    for i in 0..crate::panel::LED_COUNT {
        panel.set_led(i, 0, 0)?;
    }
    panel.save_as_default()?;
    write_identity(panel, id, CURRENT_CONFIG_VERSION)?;
    Ok(())
}

/// Where a configured display ID ended up after pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortAssignment {
    /// Already had this id stamped, with the current config version.
    Existing { device: String },
    /// Already had this id stamped but on an old config version; needs
    /// `run_initial_config` re-run.
    NeedsReinit { device: String },
    /// Took one free (unassigned) port; needs `run_initial_config`.
    Fresh { device: String },
}

impl PortAssignment {
    pub fn device(&self) -> &str {
        match self {
            PortAssignment::Existing { device }
            | PortAssignment::NeedsReinit { device }
            | PortAssignment::Fresh { device } => device,
        }
    }
}

/// One-shot FIFO pairing: tries each configured id against the ports that
/// already claim it (re-flagging a stale config version for reinit),
/// falling back to the next free port in order. Ids with neither an
/// existing nor a free port are reported, not retried.
pub fn pair_ids(
    configured_ids: &[u8],
    mut assigned: HashMap<u8, (String, u8)>,
    mut free_ports: Vec<String>,
) -> (HashMap<u8, PortAssignment>, Vec<u8>) {
    let mut result = HashMap::new();
    let mut unmatched = Vec::new();

    for &id in configured_ids {
        if let Some((device, version)) = assigned.remove(&id) {
            let assignment = if version == CURRENT_CONFIG_VERSION {
                PortAssignment::Existing { device }
            } else {
                PortAssignment::NeedsReinit { device }
            };
            result.insert(id, assignment);
            continue;
        }
        if !free_ports.is_empty() {
            let device = free_ports.remove(0);
            result.insert(id, PortAssignment::Fresh { device });
            continue;
        }
        unmatched.push(id);
    }

    (result, unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_only_identifying_description() {
        let candidates = vec![
            PortCandidate {
                device: "/dev/ttyUSB0".into(),
                description: "CFA635-USB Device".into(),
            },
            PortCandidate {
                device: "/dev/ttyUSB1".into(),
                description: "Arduino Uno".into(),
            },
        ];
        let filtered = filter_cfa635_ports(&candidates);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].device, "/dev/ttyUSB0");
    }

    #[test]
    fn classify_identity_treats_sentinels_as_unassigned() {
        let mut flash = [0xFFu8; USER_FLASH_LEN];
        assert_eq!(classify_identity(flash), None);
        flash[0] = 0x00;
        assert_eq!(classify_identity(flash), None);
    }

    #[test]
    fn classify_identity_reads_id_and_version() {
        let mut flash = [0u8; USER_FLASH_LEN];
        flash[0] = 5;
        flash[1] = 1;
        assert_eq!(
            classify_identity(flash),
            Some(Identity {
                id: 5,
                config_version: 1
            })
        );
    }

    #[test]
    fn pair_ids_prefers_existing_assignment() {
        let mut assigned = HashMap::new();
        assigned.insert(5u8, ("/dev/ttyUSB0".to_string(), CURRENT_CONFIG_VERSION));
        let (result, unmatched) = pair_ids(&[5], assigned, vec!["/dev/ttyUSB1".to_string()]);
        assert_eq!(
            result[&5],
            PortAssignment::Existing {
                device: "/dev/ttyUSB0".to_string()
            }
        );
        assert!(unmatched.is_empty());
    }

    #[test]
    fn pair_ids_flags_stale_config_version_for_reinit() {
        let mut assigned = HashMap::new();
        assigned.insert(5u8, ("/dev/ttyUSB0".to_string(), 0));
        let (result, _) = pair_ids(&[5], assigned, vec![]);
        assert_eq!(
            result[&5],
            PortAssignment::NeedsReinit {
                device: "/dev/ttyUSB0".to_string()
            }
        );
    }

    #[test]
    fn pair_ids_takes_free_port_fifo_when_unassigned() {
        let (result, unmatched) = pair_ids(
            &[5, 6],
            HashMap::new(),
            vec!["/dev/ttyUSB0".to_string(), "/dev/ttyUSB1".to_string()],
        );
        assert_eq!(
            result[&5],
            PortAssignment::Fresh {
                device: "/dev/ttyUSB0".to_string()
            }
        );
        assert_eq!(
            result[&6],
            PortAssignment::Fresh {
                device: "/dev/ttyUSB1".to_string()
            }
        );
        assert!(unmatched.is_empty());
    }

    #[test]
    fn pair_ids_reports_unmatched_when_no_free_ports_left() {
        let (result, unmatched) = pair_ids(&[5, 6], HashMap::new(), vec!["/dev/ttyUSB0".to_string()]);
        assert_eq!(result.len(), 1);
        assert_eq!(unmatched, vec![6]);
    }
}
