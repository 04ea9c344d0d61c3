use rand::RngCore;
use sha1::{Digest, Sha1};
use std::time::{SystemTime, UNIX_EPOCH};

/// A 12-byte MongoDB document identifier: 4-byte big-endian seconds
/// since the epoch, 3-byte machine hash, 2-byte process id, 3-byte
/// counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Seconds-since-epoch carried in the id's first four bytes.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Generates `ObjectId`s for a single connection.
///
/// The machine-hash component is derived from the server's own
/// `whatsmyuri` reply (SHA-1 of the `you` field, first three bytes),
/// not from local hostname lookup: the reference driver this crate is
/// based on never implements a local-hostname path, and reusing the
/// server's view keeps ids comparable across clients behind NAT.
#[derive(Debug, Clone)]
pub(crate) struct ObjectIdGenerator {
    machine_id: [u8; 3],
    process_id: [u8; 2],
    counter: u32,
}

impl ObjectIdGenerator {
    pub(crate) fn new(machine_id: [u8; 3]) -> Self {
        let process_id = (std::process::id() as u16).to_be_bytes();
        let mut seed = [0_u8; 4];
        rand::thread_rng().fill_bytes(&mut seed);
        let counter = u32::from_be_bytes(seed) & 0x00ff_ffff;
        Self {
            machine_id,
            process_id,
            counter,
        }
    }

    pub(crate) fn machine_id_from_whatsmyuri(you: &str) -> [u8; 3] {
        let digest = Sha1::digest(you.as_bytes());
        [digest[0], digest[1], digest[2]]
    }

    pub(crate) fn generate(&mut self) -> ObjectId {
        self.counter = (self.counter + 1) & 0x00ff_ffff;
        let counter_bytes = self.counter.to_be_bytes();

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        #[allow(clippy::cast_possible_truncation)]
        let ts = (secs as u32).to_be_bytes();

        let mut raw = [0_u8; 12];
        raw[0..4].copy_from_slice(&ts);
        raw[4..7].copy_from_slice(&self.machine_id);
        raw[7..9].copy_from_slice(&self.process_id);
        raw[9..12].copy_from_slice(&counter_bytes[1..4]);
        ObjectId(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_wraps_modulo_2_24() {
        let mut gen = ObjectIdGenerator::new([1, 2, 3]);
        gen.counter = 0x00ff_ffff;
        let id = gen.generate();
        assert_eq!(&id.bytes()[9..12], &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn machine_id_is_first_three_sha1_bytes_of_whatsmyuri() {
        let machine_id = ObjectIdGenerator::machine_id_from_whatsmyuri("127.0.0.1:54321");
        let expected = Sha1::digest(b"127.0.0.1:54321");
        assert_eq!(machine_id, [expected[0], expected[1], expected[2]]);
    }

    #[test]
    fn generated_id_carries_embedded_fields() {
        let mut gen = ObjectIdGenerator::new([9, 9, 9]);
        let id = gen.generate();
        assert_eq!(&id.bytes()[4..7], &[9, 9, 9]);
        assert!(id.timestamp() > 0);
    }
}
