use foundation::time::TimeSpan;
use runtime::generation::Generation;
use streaming::gate::HitCountGate;
use streaming::pipeline::{LayerLoad, PipelineOutcome, run_pipeline};

/// How a committed batch replaces what a layer already has in the index.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadKind {
    /// Filters or the spatial box changed: evict every event of the layer.
    Replace,
    /// Range modified: keep events still inside the band's visible span.
    Refresh,
    /// The band slid past the loaded window: evict only the stale parts.
    Slide { stale: Vec<TimeSpan> },
}

impl LoadKind {
    fn rank(&self) -> u8 {
        match self {
            LoadKind::Slide { .. } => 0,
            LoadKind::Refresh => 1,
            LoadKind::Replace => 2,
        }
    }

    /// Fold a newer plan's eviction into one still owed by an uncommitted
    /// plan. The stronger eviction wins; slides pool their stale slices.
    pub fn absorb(self, newer: &LoadKind) -> LoadKind {
        match (self, newer) {
            (LoadKind::Slide { mut stale }, LoadKind::Slide { stale: more }) => {
                stale.extend(more.iter().copied());
                LoadKind::Slide { stale }
            }
            (owed, newer) if owed.rank() >= newer.rank() => owed,
            (_, newer) => newer.clone(),
        }
    }
}

/// A load planned against the engine state at one point in time.
///
/// Owns everything it needs, so it can be awaited without holding on to the
/// engine; hand the [`LoadResult`] back to be committed.
#[derive(Debug)]
pub struct LoadPlan {
    pub(crate) session: u64,
    pub(crate) generation: Generation,
    pub(crate) kind: LoadKind,
    pub(crate) gate: HitCountGate,
    pub(crate) loads: Vec<LayerLoad>,
}

impl LoadPlan {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn kind(&self) -> &LoadKind {
        &self.kind
    }

    pub fn loads(&self) -> &[LayerLoad] {
        &self.loads
    }

    pub async fn run(self) -> LoadResult {
        let outcome = run_pipeline(&self.gate, &self.loads).await;
        LoadResult {
            session: self.session,
            generation: self.generation,
            kind: self.kind,
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub(crate) session: u64,
    pub(crate) generation: Generation,
    pub(crate) kind: LoadKind,
    pub outcome: PipelineOutcome,
}

impl LoadResult {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// What committing a [`LoadResult`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Committed {
    Loaded { added: usize, evicted: usize },
    Overflow { total: u64, max: u64 },
    Failed,
    /// A newer plan was handed out after this one.
    Stale,
    /// The engine was unbound (or rebound) while the load was in flight.
    Unbound,
}

#[cfg(test)]
mod tests {
    use super::LoadKind;
    use foundation::time::{Time, TimeSpan};

    fn span(a: f64, b: f64) -> TimeSpan {
        TimeSpan::new(Time(a), Time(b))
    }

    #[test]
    fn stronger_eviction_wins() {
        let slide = LoadKind::Slide {
            stale: vec![span(0.0, 1.0)],
        };
        assert_eq!(LoadKind::Replace.absorb(&slide), LoadKind::Replace);
        assert_eq!(slide.clone().absorb(&LoadKind::Refresh), LoadKind::Refresh);
        assert_eq!(LoadKind::Refresh.absorb(&LoadKind::Replace), LoadKind::Replace);
        assert_eq!(LoadKind::Refresh.absorb(&slide), LoadKind::Refresh);
    }

    #[test]
    fn slides_pool_stale_slices() {
        let first = LoadKind::Slide {
            stale: vec![span(0.0, 1.0)],
        };
        let second = LoadKind::Slide {
            stale: vec![span(1.0, 2.0)],
        };
        assert_eq!(
            first.absorb(&second),
            LoadKind::Slide {
                stale: vec![span(0.0, 1.0), span(1.0, 2.0)]
            }
        );
    }
}
