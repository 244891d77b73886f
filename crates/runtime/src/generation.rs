/// Monotonic load generation.
///
/// Every load plan takes a fresh generation; a result may only be committed
/// while its generation is still the latest one handed out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: Generation,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a new generation, superseding every earlier one.
    pub fn advance(&mut self) -> Generation {
        self.current = Generation(self.current.0 + 1);
        self.current
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current == generation
    }
}
