// Routing indexes
//
// Requests are routed by hashing their key into [0, INDEX_RANGE). Oracles
// get INDEXES_PER_ORACLE independent draws from the same range at
// registration, so a request is answered only by oracles holding its index.

use crate::config::{INDEXES_PER_ORACLE, INDEX_RANGE};
use crate::identity::Address;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha3::{Digest, Keccak256};
use std::collections::VecDeque;

/// The indexes assigned to one oracle
pub type OracleIndexes = [u8; INDEXES_PER_ORACLE];

/// Source of unpredictability for oracle index assignment
pub trait IndexSource: Send {
    /// Draw one index in [0, INDEX_RANGE)
    fn next_index(&mut self) -> u8;

    /// Draw a full index set; draws are independent and may repeat
    fn draw(&mut self) -> OracleIndexes {
        let mut indexes = [0u8; INDEXES_PER_ORACLE];
        for slot in indexes.iter_mut() {
            *slot = self.next_index() % INDEX_RANGE;
        }
        indexes
    }
}

/// Reproducible draws from a seeded PRNG
pub struct SeededIndexSource {
    rng: StdRng,
}

impl SeededIndexSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl IndexSource for SeededIndexSource {
    fn next_index(&mut self) -> u8 {
        self.rng.gen_range(0..INDEX_RANGE)
    }
}

/// Draws from the operating system entropy pool
#[derive(Default)]
pub struct EntropyIndexSource;

impl IndexSource for EntropyIndexSource {
    fn next_index(&mut self) -> u8 {
        rand::thread_rng().gen_range(0..INDEX_RANGE)
    }
}

/// Replays a fixed script of indexes, falling back to a seeded PRNG when
/// the script runs out
pub struct ScriptedIndexSource {
    script: VecDeque<u8>,
    fallback: SeededIndexSource,
}

impl ScriptedIndexSource {
    pub fn new(script: impl IntoIterator<Item = u8>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: SeededIndexSource::new(0),
        }
    }

    /// Queue one oracle's worth of indexes
    pub fn push_set(&mut self, indexes: OracleIndexes) {
        self.script.extend(indexes);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl IndexSource for ScriptedIndexSource {
    fn next_index(&mut self) -> u8 {
        match self.script.pop_front() {
            Some(index) => index % INDEX_RANGE,
            None => self.fallback.next_index(),
        }
    }
}

/// Routing index of a status request: keccak256(airline || flight || timestamp) mod INDEX_RANGE
pub fn routing_index(airline: &Address, flight: &str, timestamp: u64) -> u8 {
    let mut hasher = Keccak256::new();
    hasher.update(airline.as_bytes());
    hasher.update(flight.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    let digest = hasher.finalize();

    // Big-endian digest reduced modulo the range
    let range = INDEX_RANGE as u32;
    let index = digest
        .iter()
        .fold(0u32, |acc, byte| (acc * 256 + *byte as u32) % range);
    index as u8
}
