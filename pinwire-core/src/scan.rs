//! Bus scanner

use core::ops::Index;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use pinwire_hal::OpenDrainLine;

use crate::error::BusError;
use crate::protocol::Engine;

/// Number of addresses probed by a scan (0x00..=0x7E)
pub const SCAN_ADDRESSES: usize = 127;

/// Result of a bus scan, indexed by 7-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PresenceMap {
    present: [bool; SCAN_ADDRESSES],
}

impl Default for PresenceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceMap {
    /// Map with nothing present
    pub const fn new() -> Self {
        Self {
            present: [false; SCAN_ADDRESSES],
        }
    }

    /// Always [`SCAN_ADDRESSES`]
    pub const fn len(&self) -> usize {
        SCAN_ADDRESSES
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check if `address` acknowledged (false for addresses outside the scan)
    pub fn is_present(&self, address: u8) -> bool {
        self.present.get(address as usize).copied().unwrap_or(false)
    }

    /// Number of addresses that acknowledged
    pub fn count(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }

    /// Acknowledged addresses in ascending order
    pub fn addresses(&self) -> Vec<u8, SCAN_ADDRESSES> {
        let mut found = Vec::new();
        for (address, &present) in self.present.iter().enumerate() {
            if present {
                // Capacity equals the number of slots
                let _ = found.push(address as u8);
            }
        }
        found
    }

    /// Presence flags as a plain slice
    pub fn as_slice(&self) -> &[bool] {
        &self.present
    }

    pub(crate) fn set(&mut self, address: u8, present: bool) {
        if let Some(slot) = self.present.get_mut(address as usize) {
            *slot = present;
        }
    }
}

impl Index<usize> for PresenceMap {
    type Output = bool;

    fn index(&self, address: usize) -> &bool {
        &self.present[address]
    }
}

impl<'a, L, D> Engine<'a, L, D>
where
    L: OpenDrainLine,
    D: DelayNs,
{
    /// Probe every address in ascending order
    ///
    /// A bus fault aborts the scan (after its reset) and is returned.
    pub fn scan(&mut self) -> Result<PresenceMap, BusError> {
        let mut map = PresenceMap::new();
        for address in 0..SCAN_ADDRESSES as u8 {
            let present = self.run(|engine| engine.probe(address))?;
            if present {
                log_debug!("device found at {:#x}", address);
            }
            map.set(address, present);
        }
        log_info!("scan complete: {} device(s)", map.count());
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map() {
        let map = PresenceMap::new();
        assert_eq!(map.len(), 127);
        assert_eq!(map.count(), 0);
        assert!(map.addresses().is_empty());
        assert!(!map.is_present(0x7F));
    }

    #[test]
    fn test_addresses_sorted() {
        let mut map = PresenceMap::new();
        map.set(0x68, true);
        map.set(0x1C, true);
        map.set(0x7F, true);

        assert_eq!(map.count(), 2);
        assert_eq!(map.addresses().as_slice(), &[0x1C, 0x68]);
        assert!(map[0x1C]);
        assert!(!map[0x1D]);
    }
}
