//! Reproducible random number generation.
//!
//! All stochastic procedures in this crate accept a caller-supplied
//! [`rand::Rng`]. For parallel benchmark runs, where closures execute on pool
//! threads, [`seeded_thread_rng`] provides per-thread Xoshiro256++ streams
//! derived from one process-wide seed: thread `i` jumps the generator `i`
//! times, so a fixed seed and thread count reproduce a run exactly.

use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::{Error, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error as ThisError;

type SeedInner = [u8; 32];

/// A 256-bit PRNG seed, displayed and serialized as hex.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Seed(SeedInner);

impl Seed {
    pub fn from_entropy() -> Self {
        let mut buf = SeedInner::default();
        OsRng.fill_bytes(&mut buf);
        Seed(buf)
    }
}

impl From<SeedInner> for Seed {
    fn from(arr: SeedInner) -> Self {
        Self(arr)
    }
}

impl TryFrom<&str> for Seed {
    type Error = SeedFromHexError;

    fn try_from(value: &str) -> Result<Self, SeedFromHexError> {
        let bytes = hex::decode(value)?;
        Ok(Self(SeedInner::try_from(&bytes[..])?))
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex::serde::serialize(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Seed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Seed(hex::serde::deserialize(deserializer)?))
    }
}

#[derive(Debug, ThisError)]
pub enum SeedFromHexError {
    #[error("failed to decode hex string: {0}")]
    HexDecode(#[from] hex::FromHexError),
    #[error("PRNG seed must be 256 bits: {0}")]
    Size(#[from] std::array::TryFromSliceError),
}

/// A generator positioned `jumps` jump-lengths into the stream of `seed`.
pub fn rng_from_seed(seed: Seed, jumps: usize) -> Xoshiro256PlusPlus {
    let mut rng = Xoshiro256PlusPlus::from_seed(seed.0);
    for _ in 0..jumps {
        rng.jump();
    }
    rng
}

lazy_static! {
    static ref GLOBAL_SEED: Mutex<Option<Seed>> = Mutex::new(None);
}

static THREAD_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// The process-wide seed, if one has been fixed yet.
pub fn global_seed() -> Option<Seed> {
    *GLOBAL_SEED.lock().expect("must be able to access global seed")
}

/// Fixes the process-wide seed on first call; later calls return the value
/// already in place and ignore their argument.
pub fn get_or_insert_global_seed(seed: Option<Seed>) -> Seed {
    let mut global = GLOBAL_SEED.lock().expect("must be able to access global seed");
    *global.get_or_insert_with(|| seed.unwrap_or_else(Seed::from_entropy))
}

/// Number of threads that have requested a seeded generator so far.
pub fn thread_count() -> usize {
    THREAD_COUNTER.load(Ordering::Relaxed)
}

thread_local! {
    static THREAD_ID: usize = THREAD_COUNTER.fetch_add(1, Ordering::Relaxed);
    static THREAD_RNG: Rc<RefCell<Xoshiro256PlusPlus>> = {
        let seed = get_or_insert_global_seed(None);
        Rc::new(RefCell::new(rng_from_seed(seed, current_thread_id())))
    };
}

pub fn current_thread_id() -> usize {
    THREAD_ID.with(|id| *id)
}

/// This thread's generator, seeded from the global seed and jumped once per
/// previously seen thread. Cheap to call: clones an `Rc` handle.
pub fn seeded_thread_rng() -> SeededThreadRng {
    SeededThreadRng {
        rng: THREAD_RNG.with(Rc::clone),
    }
}

#[derive(Clone, Debug)]
pub struct SeededThreadRng {
    rng: Rc<RefCell<Xoshiro256PlusPlus>>,
}

impl Default for SeededThreadRng {
    fn default() -> Self {
        seeded_thread_rng()
    }
}

impl RngCore for SeededThreadRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.rng.borrow_mut().next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.rng.borrow_mut().next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.borrow_mut().fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.rng.borrow_mut().try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_hex_round_trip() {
        let seed = Seed::from_entropy();
        let hex = seed.to_string();
        assert_eq!(Seed::try_from(hex.as_str()).unwrap(), seed);
        let json = serde_json::to_string(&seed).unwrap();
        assert_eq!(serde_json::from_str::<Seed>(&json).unwrap(), seed);
    }

    #[test]
    fn seed_rejects_short_hex() {
        assert!(matches!(
            Seed::try_from("abcd"),
            Err(SeedFromHexError::Size(_))
        ));
    }

    #[test]
    fn jumped_streams_differ() {
        let seed = Seed::from_entropy();
        let mut a = rng_from_seed(seed, 0);
        let mut b = rng_from_seed(seed, 1);
        let mut a2 = rng_from_seed(seed, 0);
        assert_eq!(a.next_u64(), a2.next_u64());
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn global_seed_is_set_once() {
        let first = get_or_insert_global_seed(None);
        let second = get_or_insert_global_seed(Some(Seed::from_entropy()));
        assert_eq!(first, second);
        assert_eq!(global_seed(), Some(first));
    }

    #[test]
    fn thread_streams_replay_by_jump_count() {
        let mut rng = seeded_thread_rng();
        let value = rng.next_u64();
        let id = current_thread_id();
        assert!(thread_count() > id);
        // The same jump count over the global seed reproduces the stream.
        let seed = global_seed().expect("the thread generator fixed a seed");
        let mut replay = rng_from_seed(seed, id);
        assert_eq!(replay.next_u64(), value);
    }
}
