//!
//! Perfect hash index, maps a hashed name to a dense value (usually a track group index).
//!

use crate::base::AnimError;
use crate::hash::mix32;

/// Maximum number of table seeds tried before growing the slot table.
const MAX_SEED_ATTEMPTS: u32 = 16;
/// Maximum number of displacements tried per bucket.
const MAX_DISPLACEMENTS: u32 = 1 << 12;
/// Maximum number of slots, keys sets needing more are rejected.
const MAX_SLOTS: usize = 1 << 24;

/// A slot of the second level table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashSlot {
    pub key: u32,
    /// Negative for empty slots.
    pub value: i32,
}

impl HashSlot {
    const EMPTY: HashSlot = HashSlot { key: 0, value: -1 };
}

///
/// Two level perfect hash table, built once from a static key set.
///
/// The first level spreads keys into buckets with a per-table seed. Every bucket owns a
/// displacement, chosen when the table is built, which places all keys of the bucket into
/// distinct slots of the second level. A query is then two array reads and a guard comparison
/// on the stored key, no probing and no allocation.
///
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerfectHashIndex {
    seed: u32,
    displacements: Vec<u32>,
    slots: Vec<HashSlot>,
}

impl PerfectHashIndex {
    /// Builds an index that maps `keys[i]` to `i`.
    ///
    /// Keys must be unique.
    pub fn build(keys: &[u32]) -> Result<PerfectHashIndex, AnimError> {
        if keys.is_empty() {
            return Ok(PerfectHashIndex::default());
        }
        if keys.len() > i32::MAX as usize {
            return Err(AnimError::PerfectHashBuild(format!("too many keys: {}", keys.len())));
        }

        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(AnimError::PerfectHashBuild(format!("duplicated key {:#010x}", dup[0])));
        }

        let num_buckets = (keys.len() / 2).max(1).next_power_of_two();
        let mut num_slots = (keys.len() * 2).next_power_of_two();
        let mut attempts = 0;
        while num_slots <= MAX_SLOTS {
            for seed in 0..MAX_SEED_ATTEMPTS {
                attempts += 1;
                if let Some(index) = Self::try_build(keys, seed, num_buckets, num_slots) {
                    log::debug!(
                        "perfect hash: {} keys, {} buckets, {} slots, seed {}, {} attempts",
                        keys.len(),
                        num_buckets,
                        num_slots,
                        seed,
                        attempts
                    );
                    return Ok(index);
                }
            }
            num_slots *= 2;
        }
        return Err(AnimError::PerfectHashBuild(format!(
            "no collision free table for {} keys",
            keys.len()
        )));
    }

    fn try_build(keys: &[u32], seed: u32, num_buckets: usize, num_slots: usize) -> Option<PerfectHashIndex> {
        let bucket_mask = (num_buckets - 1) as u32;
        let slot_mask = (num_slots - 1) as u32;

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); num_buckets];
        for (idx, key) in keys.iter().enumerate() {
            buckets[(bucket_of(*key, seed) & bucket_mask) as usize].push(idx);
        }

        // Largest buckets are the hardest to place, place them first.
        let mut order: Vec<usize> = (0..num_buckets).collect();
        order.sort_by(|a, b| buckets[*b].len().cmp(&buckets[*a].len()).then(a.cmp(b)));

        let mut displacements = vec![0u32; num_buckets];
        let mut slots = vec![HashSlot::EMPTY; num_slots];
        let mut positions: Vec<usize> = Vec::new();
        for bucket in order {
            let members = &buckets[bucket];
            if members.is_empty() {
                break;
            }

            let mut placed = false;
            for displacement in 0..MAX_DISPLACEMENTS {
                positions.clear();
                let fits = members.iter().all(|idx| {
                    let pos = (slot_of(keys[*idx], seed, displacement) & slot_mask) as usize;
                    let free = slots[pos].value < 0 && !positions.contains(&pos);
                    positions.push(pos);
                    free
                });
                if fits {
                    for (idx, pos) in members.iter().zip(positions.iter()) {
                        slots[*pos] = HashSlot {
                            key: keys[*idx],
                            value: *idx as i32,
                        };
                    }
                    displacements[bucket] = displacement;
                    placed = true;
                    break;
                }
            }
            if !placed {
                return None;
            }
        }

        return Some(PerfectHashIndex {
            seed,
            displacements,
            slots,
        });
    }

    /// Gets the value mapped to `key`, or -1 if `key` isn't part of the index.
    #[inline]
    pub fn query(&self, key: u32) -> i32 {
        if self.slots.is_empty() {
            return -1;
        }
        let bucket = bucket_of(key, self.seed) as usize & (self.displacements.len() - 1);
        let displacement = self.displacements[bucket];
        let slot = &self.slots[slot_of(key, self.seed, displacement) as usize & (self.slots.len() - 1)];
        if slot.value >= 0 && slot.key == key {
            return slot.value;
        }
        return -1;
    }

    /// Gets the value mapped to `key`.
    #[inline]
    pub fn get(&self, key: u32) -> Option<usize> {
        let value = self.query(key);
        if value < 0 {
            return None;
        }
        return Some(value as usize);
    }

    /// Gets the number of keys stored in the index.
    pub fn len(&self) -> usize {
        return self.slots.iter().filter(|s| s.value >= 0).count();
    }

    /// Tests if the index has no key.
    pub fn is_empty(&self) -> bool {
        return self.slots.is_empty();
    }

    /// Gets the number of second level slots.
    #[inline]
    pub fn num_slots(&self) -> usize {
        return self.slots.len();
    }
}

#[inline(always)]
fn bucket_of(key: u32, seed: u32) -> u32 {
    return mix32(key ^ mix32(seed.wrapping_add(0x27d4_eb2f)));
}

#[inline(always)]
fn slot_of(key: u32, seed: u32, displacement: u32) -> u32 {
    let salt = mix32(seed.wrapping_mul(0x9e37_79b9) ^ displacement.wrapping_add(1).wrapping_mul(0x85eb_ca6b));
    return mix32(key.rotate_left(16) ^ salt);
}
