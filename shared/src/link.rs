/*!
Packet-radio link addressing.

The RFM69 radios prepend a 4 byte RadioHead header to every payload. The
ground station only ever talks to one remote node.
*/

/// Node id of the ground station radio
pub const GROUND_NODE_ID: u8 = 1;

/// Node id of the remote steering unit radio
pub const REMOTE_NODE_ID: u8 = 2;

/// Destination id that every node accepts
pub const BROADCAST_NODE_ID: u8 = 0xFF;

/// Size of the RadioHead header in bytes
pub const LINK_HEADER_SIZE: usize = 4;

/// RadioHead header carried in front of each payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHeader {
    pub destination: u8,
    pub source: u8,
    pub identifier: u8,
    pub flags: u8,
}

impl LinkHeader {
    /// Header for a frame sent from the ground station to `destination`
    pub fn outbound(destination: u8, identifier: u8) -> Self {
        Self {
            destination,
            source: GROUND_NODE_ID,
            identifier,
            flags: 0,
        }
    }

    /// Parse a header from the start of a frame
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [destination, source, identifier, flags, ..] => Some(Self {
                destination: *destination,
                source: *source,
                identifier: *identifier,
                flags: *flags,
            }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> [u8; LINK_HEADER_SIZE] {
        [self.destination, self.source, self.identifier, self.flags]
    }

    /// Whether a node with id `node` should accept this frame
    pub fn is_addressed_to(&self, node: u8) -> bool {
        self.destination == node || self.destination == BROADCAST_NODE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = LinkHeader::outbound(REMOTE_NODE_ID, 7);
        assert_eq!(header.to_bytes(), [2, 1, 7, 0]);
        assert_eq!(LinkHeader::from_bytes(&[2, 1, 7, 0, 0xAB]), Some(header));
        assert_eq!(LinkHeader::from_bytes(&[2, 1, 7]), None);
    }

    #[test]
    fn test_addressing() {
        let to_ground = LinkHeader { destination: GROUND_NODE_ID, source: REMOTE_NODE_ID, identifier: 0, flags: 0 };
        let broadcast = LinkHeader { destination: BROADCAST_NODE_ID, ..to_ground };
        let to_other = LinkHeader { destination: 9, ..to_ground };

        assert!(to_ground.is_addressed_to(GROUND_NODE_ID));
        assert!(broadcast.is_addressed_to(GROUND_NODE_ID));
        assert!(!to_other.is_addressed_to(GROUND_NODE_ID));
    }
}
