//! Crossover positions and how they turn into edges.
//!
//! A breakpoint list is either empty, meaning
//! no recombination, or sorted and terminated by
//! [`BREAKPOINT_SENTINEL`].  Breakpoints that occur
//! an even number of times are double crossovers
//! and have no effect on the genealogy.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Poisson;

use crate::tables::TablesError;

/// Value terminating a non-empty breakpoint list.
pub const BREAKPOINT_SENTINEL: f64 = f64::INFINITY;

/// Which of the two parental nodes an interval comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ParentalNode {
    First,
    Second,
}

impl ParentalNode {
    fn swap(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

// Yields the finite breakpoints that occur an odd number of times.
struct OddBreakpoints<'b> {
    breakpoints: &'b [f64],
    current: usize,
}

impl Iterator for OddBreakpoints<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current < self.breakpoints.len() {
            let value = self.breakpoints[self.current];
            let run = self.breakpoints[self.current..]
                .iter()
                .take_while(|&&b| b == value)
                .count();
            self.current += run;
            if run % 2 == 1 {
                return Some(value);
            }
        }
        None
    }
}

fn finite_part(breakpoints: &[f64]) -> &[f64] {
    match breakpoints.split_last() {
        Some((_, front)) => front,
        None => breakpoints,
    }
}

/// Check a breakpoint list against a genome of length `genome_length`.
///
/// # Errors
///
/// * [`TablesError::MissingBreakpointSentinel`] if a non-empty list
///   does not end with exactly one [`BREAKPOINT_SENTINEL`].
/// * [`TablesError::UnsortedBreakpoints`] if the list is not sorted.
/// * [`TablesError::BreakpointOutOfRange`] if a breakpoint is not in
///   `[0, genome_length)`.
pub fn validate_breakpoints(breakpoints: &[f64], genome_length: f64) -> Result<(), TablesError> {
    if breakpoints.is_empty() {
        return Ok(());
    }
    if breakpoints.last() != Some(&BREAKPOINT_SENTINEL) {
        return Err(TablesError::MissingBreakpointSentinel);
    }
    let finite = finite_part(breakpoints);
    if finite.iter().any(|&b| b == BREAKPOINT_SENTINEL) {
        return Err(TablesError::MissingBreakpointSentinel);
    }
    if let Some(&b) = finite
        .iter()
        .find(|&&b| !b.is_finite() || !(0.0..genome_length).contains(&b))
    {
        return Err(TablesError::BreakpointOutOfRange(b));
    }
    if finite.windows(2).any(|w| w[1] < w[0]) {
        return Err(TablesError::UnsortedBreakpoints);
    }
    Ok(())
}

/// Call `f(left, right, which)` for each interval an offspring node
/// inherits, in order along the genome.
///
/// The input must have passed [`validate_breakpoints`].
pub(crate) fn split_breakpoints<F>(breakpoints: &[f64], genome_length: f64, mut f: F)
where
    F: FnMut(f64, f64, ParentalNode),
{
    let mut left = 0.0;
    let mut current = ParentalNode::First;
    let odd = OddBreakpoints {
        breakpoints: finite_part(breakpoints),
        current: 0,
    };
    for b in odd {
        if b > left {
            f(left, b, current);
        }
        left = b;
        current = current.swap();
    }
    debug_assert!(genome_length > left);
    f(left, genome_length, current);
}

/// Generates breakpoints for a single meiosis.
///
/// Implementations must either leave `breakpoints` empty or
/// fill it with sorted positions followed by [`BREAKPOINT_SENTINEL`].
pub trait BreakpointGenerator {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R, breakpoints: &mut Vec<f64>);
}

/// No crossing over.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoRecombination;

impl BreakpointGenerator for NoRecombination {
    fn generate<R: Rng + ?Sized>(&self, _rng: &mut R, breakpoints: &mut Vec<f64>) {
        breakpoints.clear();
    }
}

/// A Poisson number of crossovers at uniform positions.
#[derive(Debug, Copy, Clone)]
pub struct PoissonCrossovers {
    mean: f64,
    // None for a mean of zero, which Poisson::new rejects.
    number: Option<Poisson<f64>>,
    positions: Uniform<f64>,
}

impl PoissonCrossovers {
    /// # Errors
    ///
    /// [`TablesError::InvalidGenomeLength`] if `genome_length` is not
    /// finite and positive, [`TablesError::InvalidCrossoverRate`] if
    /// `mean` is negative or not finite.
    pub fn new(mean: f64, genome_length: f64) -> Result<Self, TablesError> {
        if !genome_length.is_finite() || genome_length <= 0.0 {
            return Err(TablesError::InvalidGenomeLength(genome_length));
        }
        if !mean.is_finite() || mean < 0.0 {
            return Err(TablesError::InvalidCrossoverRate(mean));
        }
        let number = if mean > 0.0 {
            Some(Poisson::new(mean).map_err(|_| TablesError::InvalidCrossoverRate(mean))?)
        } else {
            None
        };
        Ok(Self {
            mean,
            number,
            positions: Uniform::new(0.0, genome_length),
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    fn number_of_crossovers<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match &self.number {
            Some(poisson) => poisson.sample(rng) as usize,
            None => 0,
        }
    }
}

impl BreakpointGenerator for PoissonCrossovers {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R, breakpoints: &mut Vec<f64>) {
        breakpoints.clear();
        let n = self.number_of_crossovers(rng);
        if n == 0 {
            return;
        }
        breakpoints.extend((0..n).map(|_| self.positions.sample(&mut *rng)));
        breakpoints.sort_unstable_by(f64::total_cmp);
        breakpoints.push(BREAKPOINT_SENTINEL);
    }
}
