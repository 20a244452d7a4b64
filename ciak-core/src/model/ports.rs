/// Deterministic listening ports for a room of at most `max_peers` devices.
///
/// The admin is slot 0 and joiners take slots `1..max_peers`. A joiner's
/// star link to the admin uses `base_port + slot`; the mesh link between
/// joiners `a < b` uses `base_port + max_peers + b * (b - 1) / 2 + a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPlan {
    base_port: u16,
    max_peers: u16,
}

impl PortPlan {
    pub fn new(base_port: u16, max_peers: u16) -> Self {
        Self {
            base_port,
            max_peers,
        }
    }

    pub fn max_peers(&self) -> u16 {
        self.max_peers
    }

    pub fn star_port(&self, slot: u16) -> Option<u16> {
        if slot == 0 || slot >= self.max_peers {
            return None;
        }
        self.base_port.checked_add(slot)
    }

    /// Port for the link between two joiner slots, in either order.
    pub fn mesh_port(&self, a: u16, b: u16) -> Option<u16> {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        if lo == 0 || lo == hi || hi >= self.max_peers {
            return None;
        }

        let offset = u32::from(self.max_peers) + u32::from(hi) * u32::from(hi - 1) / 2 + u32::from(lo);
        u16::try_from(u32::from(self.base_port) + offset).ok()
    }
}
