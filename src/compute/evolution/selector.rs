//! Survivor selection strategies.
//!
//! Selectors reduce a scored generation to the seeds of the next one. They
//! all maximize reward and never mutate their input.

use std::sync::Arc;

use crate::compute::rng::SharedRng;
use crate::schema::{SelectionConfig, Solution};

/// Reduces a scored population to its survivors.
pub trait Selector: Send + Sync {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution>;
}

impl<S: Selector + ?Sized> Selector for Box<S> {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        (**self).select(solutions)
    }
}

impl<S: Selector + ?Sized> Selector for Arc<S> {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        (**self).select(solutions)
    }
}

fn sorted_best_first(solutions: &[Solution]) -> Vec<Solution> {
    let mut sorted = solutions.to_vec();
    sorted.sort_by(Solution::best_first);
    sorted
}

/// Keeps the best `keep mod len` solutions.
///
/// The modulo is deliberate and preserved: with `keep == len` (or any
/// multiple of it) nothing survives. Wrap it in an [`OrSelector`] with a
/// fallback when that matters.
#[derive(Debug, Clone)]
pub struct TopXSelector {
    pub keep: usize,
}

impl TopXSelector {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }
}

impl Selector for TopXSelector {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        if solutions.is_empty() {
            return Vec::new();
        }
        let mut sorted = sorted_best_first(solutions);
        sorted.truncate(self.keep % solutions.len());
        sorted
    }
}

/// Runs `keep` two-way tournaments over uniformly drawn pairs.
#[derive(Debug, Clone)]
pub struct TournamentSelector {
    pub keep: usize,
    rng: Arc<SharedRng>,
}

impl TournamentSelector {
    pub fn new(keep: usize, rng: Arc<SharedRng>) -> Self {
        Self { keep, rng }
    }

    /// The stronger solution wins outright with a non-positive reward.
    /// Otherwise it wins when a draw from `[0, highest)` exceeds half the
    /// weaker reward.
    fn fight<'a>(&self, a: &'a Solution, b: &'a Solution) -> &'a Solution {
        let (highest, lowest) = if a.reward >= b.reward { (a, b) } else { (b, a) };
        if highest.reward <= 0 {
            return highest;
        }
        let draw = (self.rng.int() % highest.reward as u64) as i64;
        if draw > lowest.reward / 2 {
            highest
        } else {
            lowest
        }
    }
}

impl Selector for TournamentSelector {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        if solutions.is_empty() {
            return Vec::new();
        }
        (0..self.keep)
            .map(|_| {
                let a = &solutions[self.rng.below(solutions.len())];
                let b = &solutions[self.rng.below(solutions.len())];
                self.fight(a, b).clone()
            })
            .collect()
    }
}

/// Stochastic universal sampling with `keep` evenly spaced pointers.
///
/// Solutions are ordered by ascending reward and the pointer spacing is the
/// top reward divided by `keep`. Each pointer selects the first solution
/// whose reward reaches it. Returns nothing when the spacing is not positive,
/// so it composes with [`OrSelector`] fallbacks.
#[derive(Debug, Clone)]
pub struct StochasticUniversalSelector {
    pub keep: usize,
    rng: Arc<SharedRng>,
}

impl StochasticUniversalSelector {
    pub fn new(keep: usize, rng: Arc<SharedRng>) -> Self {
        Self { keep, rng }
    }
}

impl Selector for StochasticUniversalSelector {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        if self.keep == 0 || solutions.is_empty() {
            return Vec::new();
        }
        let mut ascending = solutions.to_vec();
        ascending.sort_by_key(|s| s.reward);

        let top = ascending[ascending.len() - 1].reward;
        let spacing = top / self.keep as i64;
        if spacing <= 0 {
            return Vec::new();
        }
        let start = (self.rng.int() % spacing as u64) as i64 + 1;

        let mut kept = Vec::with_capacity(self.keep);
        let mut i = 0;
        for n in 0..self.keep as i64 {
            let pointer = start.saturating_add(n.saturating_mul(spacing));
            while i < ascending.len() && ascending[i].reward < pointer {
                i += 1;
            }
            match ascending.get(i) {
                Some(solution) => kept.push(solution.clone()),
                None => break,
            }
        }
        kept
    }
}

/// Concatenates the selections of every member.
#[derive(Default)]
pub struct AndSelector {
    selectors: Vec<Box<dyn Selector>>,
}

impl AndSelector {
    pub fn new(selectors: Vec<Box<dyn Selector>>) -> Self {
        Self { selectors }
    }

    pub fn with(mut self, selector: impl Selector + 'static) -> Self {
        self.selectors.push(Box::new(selector));
        self
    }
}

impl Selector for AndSelector {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        self.selectors
            .iter()
            .flat_map(|s| s.select(solutions))
            .collect()
    }
}

/// Returns the first non-empty selection; later members are not run.
#[derive(Default)]
pub struct OrSelector {
    selectors: Vec<Box<dyn Selector>>,
}

impl OrSelector {
    pub fn new(selectors: Vec<Box<dyn Selector>>) -> Self {
        Self { selectors }
    }

    pub fn with(mut self, selector: impl Selector + 'static) -> Self {
        self.selectors.push(Box::new(selector));
        self
    }
}

impl Selector for OrSelector {
    fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
        self.selectors
            .iter()
            .map(|s| s.select(solutions))
            .find(|selected| !selected.is_empty())
            .unwrap_or_default()
    }
}

impl SelectionConfig {
    /// Build the configured strategy.
    pub fn build(&self, rng: Arc<SharedRng>) -> Box<dyn Selector> {
        match self {
            Self::TopX { keep } => Box::new(TopXSelector::new(*keep)),
            Self::Tournament { keep } => Box::new(TournamentSelector::new(*keep, rng)),
            Self::StochasticUniversal { keep } => {
                Box::new(StochasticUniversalSelector::new(*keep, rng))
            }
            Self::And { selectors } => Box::new(AndSelector::new(
                selectors.iter().map(|s| s.build(Arc::clone(&rng))).collect(),
            )),
            Self::Or { selectors } => Box::new(OrSelector::new(
                selectors.iter().map(|s| s.build(Arc::clone(&rng))).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn solutions(rewards: &[i64]) -> Vec<Solution> {
        rewards
            .iter()
            .enumerate()
            .map(|(i, &r)| Solution::new(r, format!("p{i}")))
            .collect()
    }

    fn rewards(solutions: &[Solution]) -> Vec<i64> {
        solutions.iter().map(|s| s.reward).collect()
    }

    fn rng(seed: u64) -> Arc<SharedRng> {
        Arc::new(SharedRng::new(seed))
    }

    #[test]
    fn test_topx_takes_best() {
        let out = TopXSelector::new(3).select(&solutions(&[6, 10, 4, 8]));
        assert_eq!(rewards(&out), vec![10, 8, 6]);
    }

    #[test]
    fn test_topx_keep_modulo_len() {
        let input = solutions(&[1, 2, 3, 4]);
        assert!(TopXSelector::new(4).select(&input).is_empty());
        assert_eq!(rewards(&TopXSelector::new(5).select(&input)), vec![4]);
        assert!(TopXSelector::new(3).select(&[]).is_empty());
    }

    #[test]
    fn test_topx_stable_for_ties() {
        let out = TopXSelector::new(2).select(&solutions(&[5, 5, 1]));
        assert_eq!(out[0].program, "p0");
        assert_eq!(out[1].program, "p1");
    }

    #[test]
    fn test_tournament_non_positive_highest_wins() {
        let selector = TournamentSelector::new(1, rng(1));
        let zero = Solution::new(0, "zero");
        let negative = Solution::new(-5, "negative");
        for _ in 0..20 {
            assert_eq!(selector.fight(&negative, &zero).program, "zero");
            assert_eq!(selector.fight(&zero, &negative).program, "zero");
        }
    }

    #[test]
    fn test_tournament_fight_rules() {
        let selector = TournamentSelector::new(1, rng(3));
        let strong = Solution::new(100, "strong");
        let weak = Solution::new(-10, "weak");
        // Draw in [0, 100) always exceeds -5.
        for _ in 0..100 {
            assert_eq!(selector.fight(&weak, &strong).program, "strong");
        }
        let equal_a = Solution::new(1, "a");
        let equal_b = Solution::new(1, "b");
        // Draw from [0, 1) is 0, never > 0, so the lower-ranked one wins.
        assert_eq!(selector.fight(&equal_a, &equal_b).program, "b");
    }

    #[test]
    fn test_tournament_empty() {
        assert!(TournamentSelector::new(3, rng(4)).select(&[]).is_empty());
    }

    #[test]
    fn test_sus_selects_keep() {
        let input = solutions(&[10, 40, 20, 30]);
        let out = StochasticUniversalSelector::new(4, rng(5)).select(&input);
        assert_eq!(out.len(), 4);
        // Pointers never decrease, so rewards come out ascending.
        let r = rewards(&out);
        assert!(r.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sus_pointers_follow_seeded_start() {
        for seed in 0..32 {
            // Same seed, same first draw.
            let start = (SharedRng::new(seed).int() % 20) as i64 + 1;
            assert!((1..=20).contains(&start));

            // Top 40, keep 2: pointers at start and start + 20.
            let out = StochasticUniversalSelector::new(2, rng(seed)).select(&solutions(&[40, 5]));
            let expected = if start <= 5 { vec![5, 40] } else { vec![40, 40] };
            assert_eq!(rewards(&out), expected, "seed {seed}, start {start}");
        }
    }

    #[test]
    fn test_sus_even_rewards_select_each_once() {
        // Spacing 10 puts exactly one pointer in each reward band.
        for seed in 0..32 {
            let out = StochasticUniversalSelector::new(4, rng(seed))
                .select(&solutions(&[30, 10, 40, 20]));
            assert_eq!(rewards(&out), vec![10, 20, 30, 40]);
        }
    }

    #[test]
    fn test_sus_non_positive_spacing_is_empty() {
        let sel = StochasticUniversalSelector::new(10, rng(6));
        assert!(sel.select(&solutions(&[1, 2, 3])).is_empty());
        assert!(sel.select(&solutions(&[-10, -3])).is_empty());
        assert!(sel.select(&[]).is_empty());
        assert!(StochasticUniversalSelector::new(0, rng(6)).select(&solutions(&[5])).is_empty());
    }

    #[test]
    fn test_and_concatenates() {
        let input = solutions(&[1, 2, 3]);
        let and = AndSelector::default()
            .with(TopXSelector::new(1))
            .with(TopXSelector::new(2));
        assert_eq!(rewards(&and.select(&input)), vec![3, 3, 2]);
    }

    struct Counting(Arc<AtomicUsize>);

    impl Selector for Counting {
        fn select(&self, solutions: &[Solution]) -> Vec<Solution> {
            self.0.fetch_add(1, Ordering::SeqCst);
            solutions.to_vec()
        }
    }

    #[test]
    fn test_or_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let input = solutions(&[1, 2]);
        let or = OrSelector::default()
            .with(StochasticUniversalSelector::new(5, rng(7)))
            .with(TopXSelector::new(1))
            .with(Counting(Arc::clone(&calls)));
        assert_eq!(rewards(&or.select(&input)), vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(OrSelector::default().select(&input).is_empty());
    }

    #[test]
    fn test_build_from_config() {
        let selector = SelectionConfig::default().build(rng(8));
        let out = selector.select(&solutions(&(0..20).collect::<Vec<_>>()));
        // TopX(10) plus ten tournament winners.
        assert_eq!(out.len(), 20);
        assert_eq!(out[0].reward, 19);
    }

    proptest! {
        #[test]
        fn prop_topx_prefix_of_sorted(
            input in prop::collection::vec(-1000i64..1000, 1..30),
            keep in 0usize..50,
        ) {
            let list = solutions(&input);
            let out = TopXSelector::new(keep).select(&list);
            prop_assert_eq!(out.len(), keep % list.len());
            let mut sorted = input.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            prop_assert_eq!(rewards(&out), sorted[..out.len()].to_vec());
        }

        #[test]
        fn prop_tournament_keeps_members(
            input in prop::collection::vec(-1000i64..1000, 1..20),
            keep in 0usize..20,
            seed in any::<u64>(),
        ) {
            let list = solutions(&input);
            let out = TournamentSelector::new(keep, rng(seed)).select(&list);
            prop_assert_eq!(out.len(), keep);
            for s in &out {
                prop_assert!(list.contains(s));
            }
        }
    }
}
