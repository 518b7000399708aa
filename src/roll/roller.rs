use crate::common::{NonZeroUInt, UInt};
use rand::Rng;

/// Source of individual die results. Object-safe so evaluation contexts
/// can borrow any roller.
pub trait Roller {
    fn roll(&mut self, faces: NonZeroUInt) -> UInt;
}

/// Roller backed by any `rand` RNG.
pub struct RngRoller<R: Rng>(pub R);

impl<R: Rng> Roller for RngRoller<R> {
    fn roll(&mut self, faces: NonZeroUInt) -> UInt {
        self.0.gen_range(1..=faces.get())
    }
}

pub type DefaultRoller = RngRoller<rand::rngs::ThreadRng>;

impl Default for RngRoller<rand::rngs::ThreadRng> {
    fn default() -> Self {
        RngRoller(rand::thread_rng())
    }
}

/// Deterministic roller stepping through face values; every test that
/// needs predictable dice uses one of these.
pub struct StepRoller {
    current: UInt,
    step: UInt,
}

impl StepRoller {
    pub fn new(initial: UInt, step: UInt) -> Self {
        Self {
            current: initial.max(1),
            step,
        }
    }
}

impl Roller for StepRoller {
    fn roll(&mut self, faces: NonZeroUInt) -> UInt {
        let ret = (self.current - 1) % faces.get() + 1;
        self.current += self.step;
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_roller_wraps() {
        let faces = NonZeroUInt::new(6).unwrap();
        let mut roller = StepRoller::new(5, 1);
        let rolls: Vec<UInt> = (0..4).map(|_| roller.roll(faces)).collect();
        assert_eq!(rolls, vec![5, 6, 1, 2]);
    }
}
