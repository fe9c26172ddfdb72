//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through SubsystemRng streams derived
//! from the single master seed of the session.
//!
//! Each slot gets its own persistent stream, seeded from
//! (master_seed XOR slot_index * golden ratio). This means:
//!   - Adding a new slot never changes existing slots' streams.
//!   - A building-damage roll never shifts the event trigger stream.
//!
//! Every stream counts the samples it has handed out. The seed plus
//! those counts is the whole RNG state of a session: restoring it
//! re-seeds each stream and fast-forwards it by its count.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Source of uniform samples in [0.0, 1.0).
///
/// The event pass only sees this trait, so callers can inject a
/// scripted source to force or suppress triggers.
pub trait SampleSource {
    fn next_f64(&mut self) -> f64;
}

/// A named, deterministic RNG stream for a single slot.
#[derive(Clone)]
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
    draws: u64,
}

impl SubsystemRng {
    /// Create a stream from the master seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
            draws: 0,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.inner.next_u64()
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Samples consumed since the stream was seeded.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Jump ahead by `draws` samples. Each sample is one generator step,
    /// so the LCG skip lands exactly where replaying would.
    fn fast_forward(&mut self, draws: u64) {
        self.inner.advance(u128::from(draws));
        self.draws += draws;
    }
}

impl SampleSource for SubsystemRng {
    fn next_f64(&mut self) -> f64 {
        SubsystemRng::next_f64(self)
    }
}

/// Replays a fixed list of samples, then repeats `fallback` forever.
pub struct ScriptedSamples {
    queue: VecDeque<f64>,
    fallback: f64,
    consumed: u64,
}

impl ScriptedSamples {
    pub fn new(samples: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            fallback,
            consumed: 0,
        }
    }

    /// Every sample is 0.0: every eligible event with p > 0 triggers.
    pub fn always_trigger() -> Self {
        Self::new([], 0.0)
    }

    /// Every sample is just below 1.0: nothing with p < 1 triggers.
    pub fn never_trigger() -> Self {
        Self::new([], 1.0 - f64::EPSILON)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl SampleSource for ScriptedSamples {
    fn next_f64(&mut self) -> f64 {
        self.consumed += 1;
        self.queue.pop_front().unwrap_or(self.fallback)
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every slot's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u64)]
pub enum SubsystemSlot {
    EventTrigger = 0,
    BuildingDamage = 1,
    // Add new slots here, append only.
}

impl SubsystemSlot {
    pub const ALL: [SubsystemSlot; 2] = [Self::EventTrigger, Self::BuildingDamage];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EventTrigger => "event_trigger",
            Self::BuildingDamage => "building_damage",
        }
    }
}

/// Serializable position of every stream in a bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngBankState {
    pub seed: u64,
    pub draws: Vec<SlotDraws>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDraws {
    pub slot: SubsystemSlot,
    pub draws: u64,
}

/// All RNG streams for a single session, indexed by stable slot.
#[derive(Clone)]
pub struct RngBank {
    master_seed: u64,
    streams: Vec<SubsystemRng>,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        let streams = SubsystemSlot::ALL
            .iter()
            .map(|slot| SubsystemRng::new(master_seed, *slot as u64).with_name(slot.name()))
            .collect();
        Self { master_seed, streams }
    }

    /// Rebuild a bank at the exact position recorded in `state`.
    pub fn restore(state: &RngBankState) -> Self {
        let mut bank = Self::new(state.seed);
        for entry in &state.draws {
            bank.stream(entry.slot).fast_forward(entry.draws);
        }
        bank
    }

    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    pub fn stream(&mut self, slot: SubsystemSlot) -> &mut SubsystemRng {
        &mut self.streams[slot as usize]
    }

    /// The two streams the event pass needs at once: (trigger, damage).
    pub fn event_streams(&mut self) -> (&mut SubsystemRng, &mut SubsystemRng) {
        let (head, tail) = self.streams.split_at_mut(SubsystemSlot::BuildingDamage as usize);
        (&mut head[SubsystemSlot::EventTrigger as usize], &mut tail[0])
    }

    pub fn state(&self) -> RngBankState {
        RngBankState {
            seed: self.master_seed,
            draws: SubsystemSlot::ALL
                .iter()
                .map(|slot| SlotDraws {
                    slot: *slot,
                    draws: self.streams[*slot as usize].draws(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_unit_interval() {
        let mut rng = SubsystemRng::new(7, 0);
        for _ in 0..10_000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x), "sample {x} out of range");
        }
        assert_eq!(rng.draws(), 10_000);
    }

    #[test]
    fn slots_produce_independent_streams() {
        let mut bank = RngBank::new(42);
        let (trigger, damage) = bank.event_streams();
        assert_ne!(trigger.next_u64(), damage.next_u64());
        assert_eq!(trigger.name, "event_trigger");
        assert_eq!(damage.name, "building_damage");
    }

    #[test]
    fn restored_bank_continues_the_same_sequence() {
        let mut original = RngBank::new(0xFEED);
        for _ in 0..37 {
            original.stream(SubsystemSlot::EventTrigger).next_f64();
        }
        for _ in 0..5 {
            original.stream(SubsystemSlot::BuildingDamage).next_f64();
        }

        let state = original.state();
        let mut restored = RngBank::restore(&state);
        assert_eq!(restored.state(), state);

        for slot in SubsystemSlot::ALL {
            assert_eq!(
                original.stream(slot).next_u64(),
                restored.stream(slot).next_u64(),
                "slot {slot:?} diverged after restore"
            );
        }
    }

    #[test]
    fn fast_forward_matches_stepping() {
        let mut stepped = SubsystemRng::new(99, 1);
        for _ in 0..1_000 {
            stepped.next_u64();
        }
        let mut jumped = SubsystemRng::new(99, 1);
        jumped.fast_forward(1_000);

        assert_eq!(jumped.draws(), 1_000);
        assert_eq!(stepped.next_u64(), jumped.next_u64());
    }

    #[test]
    fn restoring_a_huge_draw_count_is_immediate() {
        let state = RngBankState {
            seed: 5,
            draws: vec![SlotDraws { slot: SubsystemSlot::EventTrigger, draws: u64::MAX / 2 }],
        };
        let bank = RngBank::restore(&state);
        assert_eq!(bank.state(), RngBankState {
            seed: 5,
            draws: vec![
                SlotDraws { slot: SubsystemSlot::EventTrigger, draws: u64::MAX / 2 },
                SlotDraws { slot: SubsystemSlot::BuildingDamage, draws: 0 },
            ],
        });
    }

    #[test]
    fn scripted_samples_fall_back_after_script() {
        let mut src = ScriptedSamples::new([0.1, 0.2], 0.9);
        assert_eq!(src.next_f64(), 0.1);
        assert_eq!(src.next_f64(), 0.2);
        assert_eq!(src.next_f64(), 0.9);
        assert_eq!(src.consumed(), 3);
    }
}
