use rand::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;

/// Forks a child RNG off a parent so two subsystems that each make slightly different numbers
/// of draws per timestep don't perturb each other's sequences.
pub fn fork_rng(base_rng: &mut XorShiftRng) -> XorShiftRng {
    let mut seed = [0u8; 16];
    base_rng.fill_bytes(&mut seed);
    XorShiftRng::from_seed(seed)
}

pub fn seeded(seed: u64) -> XorShiftRng {
    XorShiftRng::seed_from_u64(seed)
}
