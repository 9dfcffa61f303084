//! Scored programs and the messages islands exchange.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::compute::Program;

/// A program together with the reward it earned. Higher is better.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solution {
    /// Reward computed by the evaluator.
    pub reward: i64,
    /// Program text.
    pub program: Program,
}

impl Solution {
    pub fn new(reward: i64, program: impl Into<Program>) -> Self {
        Self {
            reward,
            program: program.into(),
        }
    }

    /// Order by reward, best first.
    pub fn best_first(a: &Solution, b: &Solution) -> Ordering {
        b.reward.cmp(&a.reward)
    }
}

/// Programs of a solution list, in list order.
pub fn programs_of(solutions: &[Solution]) -> Vec<Program> {
    solutions.iter().map(|s| s.program.clone()).collect()
}

/// One generation's results from one island.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Island (solver) id.
    pub island: usize,
    /// Generation counter of the reporting solver.
    pub generation: u64,
    /// Solutions in execution order.
    pub solutions: Vec<Solution>,
}

/// The harvested result of one island in a migration round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Champion {
    /// Island the champion came from.
    pub island: usize,
    /// Reward of the island's best solution.
    pub reward: i64,
    /// All programs of the report, best first.
    pub programs: Vec<Program>,
}

impl Champion {
    /// Build from a report. An empty report yields the lowest possible
    /// reward and no programs.
    pub fn from_report(report: Report) -> Self {
        let mut solutions = report.solutions;
        solutions.sort_by(Solution::best_first);
        let reward = solutions.first().map_or(i64::MIN, |s| s.reward);

        Self {
            island: report.island,
            reward,
            programs: solutions.into_iter().map(|s| s.program).collect(),
        }
    }

    /// Best program, if any.
    pub fn best_program(&self) -> Option<&Program> {
        self.programs.first()
    }
}

/// Pick the round winner. Ties keep the earlier champion.
pub fn best_champion(mut champions: Vec<Champion>) -> Option<Champion> {
    champions.sort_by(|a, b| b.reward.cmp(&a.reward));
    champions.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(island: usize, rewards: &[i64]) -> Report {
        Report {
            island,
            generation: 0,
            solutions: rewards
                .iter()
                .map(|&r| Solution::new(r, format!("p{island}_{r}")))
                .collect(),
        }
    }

    #[test]
    fn test_champion_from_report_sorts_programs() {
        let champ = Champion::from_report(report(2, &[3, 9, 1]));
        assert_eq!(champ.island, 2);
        assert_eq!(champ.reward, 9);
        assert_eq!(champ.programs, vec!["p2_9", "p2_3", "p2_1"]);
    }

    #[test]
    fn test_champion_from_empty_report() {
        let champ = Champion::from_report(report(0, &[]));
        assert_eq!(champ.reward, i64::MIN);
        assert!(champ.best_program().is_none());
    }

    #[test]
    fn test_best_champion_two_islands() {
        let island0 = Champion::from_report(report(0, &[100, 20]));
        let island1 = Champion::from_report(report(1, &[50]));
        let best = best_champion(vec![island1, island0.clone()]).unwrap();
        assert_eq!(best, island0);
        assert_eq!(best.reward, 100);
    }

    #[test]
    fn test_best_champion_tie_keeps_first() {
        let a = Champion::from_report(report(0, &[5]));
        let b = Champion::from_report(report(1, &[5]));
        assert_eq!(best_champion(vec![a, b]).unwrap().island, 0);
    }
}
