//! Ranking and tournament selection.

use crate::domain::agent::{Agent, AgentId};
use crate::domain::performance::fitness;
use rand::Rng;
use rand::seq::index;

/// Probability that a tournament is won by its fittest entrant.
pub const TOURNAMENT_WIN_PROBABILITY: f64 = 0.8;

/// An agent paired with the fitness it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAgent {
    pub agent: Agent,
    pub fitness: f64,
}

impl ScoredAgent {
    pub fn id(&self) -> AgentId {
        self.agent.id
    }
}

/// Recompute fitness for every agent from its period metrics and sort best
/// first. The sort is stable, so ties keep their input order.
pub fn rank_population(agents: Vec<Agent>) -> Vec<ScoredAgent> {
    let mut scored: Vec<ScoredAgent> = agents
        .into_iter()
        .map(|mut agent| {
            let score = fitness(&agent.metrics.fitness_inputs());
            agent.metrics.fitness_score = score;
            ScoredAgent {
                agent,
                fitness: score,
            }
        })
        .collect();
    scored.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    scored
}

/// `floor(n * fraction)`, tolerant of binary rounding (10 * 0.3 is 3, not 2).
pub fn fraction_count(n: usize, fraction: f64) -> usize {
    if n == 0 || !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    (((n as f64) * fraction + 1e-9).floor() as usize).min(n)
}

/// Random-subset-then-best selection with a probabilistic upset.
#[derive(Debug, Clone, Copy)]
pub struct TournamentSelector {
    pub size: usize,
    pub win_probability: f64,
}

impl TournamentSelector {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            win_probability: TOURNAMENT_WIN_PROBABILITY,
        }
    }

    /// Run one tournament over `pool`.
    ///
    /// Entrants are drawn uniformly; distinct when the pool is at least as
    /// large as the tournament, with replacement otherwise. The fittest
    /// entrant wins with `win_probability`, otherwise the weakest does.
    ///
    /// Drawing distinct entrants keeps the fitter of two candidates winning
    /// about `win_probability` of the time. With replacement a two-agent
    /// pool draws the same agent half the time, and the fitter one would
    /// win only about 65% of its tournaments.
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        pool: &[&'a ScoredAgent],
        rng: &mut R,
    ) -> Option<&'a ScoredAgent> {
        if pool.is_empty() {
            return None;
        }

        let mut entrants: Vec<&'a ScoredAgent> = if pool.len() >= self.size {
            index::sample(rng, pool.len(), self.size)
                .into_iter()
                .map(|i| pool[i])
                .collect()
        } else {
            (0..self.size)
                .map(|_| pool[rng.random_range(0..pool.len())])
                .collect()
        };
        entrants.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        if rng.random_bool(self.win_probability.clamp(0.0, 1.0)) {
            entrants.first().copied()
        } else {
            entrants.last().copied()
        }
    }
}

/// Outcome of survivor selection over a ranked population. Every vector is
/// in rank order.
#[derive(Debug, Clone, Default)]
pub struct SurvivorSelection {
    pub elites: Vec<ScoredAgent>,
    /// Elites first, then tournament winners in selection order.
    pub survivors: Vec<ScoredAgent>,
    pub eliminated: Vec<ScoredAgent>,
}

/// Keep the top `elite_count` agents, then fill up to `survivor_count` by
/// tournament over the remaining pool. Winners leave the pool, so no agent
/// is selected twice.
pub fn select_survivors<R: Rng + ?Sized>(
    ranked: &[ScoredAgent],
    elite_count: usize,
    survivor_count: usize,
    selector: &TournamentSelector,
    rng: &mut R,
) -> SurvivorSelection {
    let survivor_count = survivor_count.min(ranked.len());
    let elite_count = elite_count.min(survivor_count);

    let elites: Vec<ScoredAgent> = ranked[..elite_count].to_vec();
    let mut survivors = elites.clone();
    let mut pool: Vec<&ScoredAgent> = ranked[elite_count..].iter().collect();

    while survivors.len() < survivor_count && !pool.is_empty() {
        let Some(winner) = selector.select(&pool, rng) else {
            break;
        };
        let winner_id = winner.id();
        survivors.push(winner.clone());
        pool.retain(|candidate| candidate.id() != winner_id);
    }

    let eliminated = ranked
        .iter()
        .filter(|candidate| !survivors.iter().any(|s| s.id() == candidate.id()))
        .cloned()
        .collect();

    SurvivorSelection {
        elites,
        survivors,
        eliminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dna::Dna;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scored(fitness: f64) -> ScoredAgent {
        let mut agent = Agent::new(Dna::default(), 0, vec![]);
        agent.metrics.fitness_score = fitness;
        ScoredAgent { agent, fitness }
    }

    fn agent_with_profit(profit: f64) -> Agent {
        let mut agent = Agent::new(Dna::default(), 0, vec![]);
        agent.metrics.profit_period = profit;
        agent.metrics.win_rate_period = 0.5;
        agent.metrics.trades_period = 10;
        agent
    }

    #[test]
    fn test_rank_population_is_descending_and_stable() {
        let a = agent_with_profit(100.0);
        let b = agent_with_profit(500.0);
        let c = agent_with_profit(100.0);
        let ids = (a.id, b.id, c.id);

        let ranked = rank_population(vec![a, b, c]);
        assert_eq!(ranked[0].id(), ids.1);
        // Equal fitness keeps input order.
        assert_eq!(ranked[1].id(), ids.0);
        assert_eq!(ranked[2].id(), ids.2);
        assert!(ranked[0].fitness > ranked[1].fitness);
        assert_eq!(ranked[0].agent.metrics.fitness_score, ranked[0].fitness);
    }

    #[test]
    fn test_rank_population_recomputes_stale_scores() {
        let mut agent = agent_with_profit(0.0);
        agent.metrics.win_rate_period = 0.0;
        agent.metrics.trades_period = 0;
        agent.metrics.fitness_score = 99.0;
        let ranked = rank_population(vec![agent]);
        assert_eq!(ranked[0].fitness, 50.0);
    }

    #[test]
    fn test_fraction_count() {
        assert_eq!(fraction_count(10, 0.2), 2);
        assert_eq!(fraction_count(10, 0.3), 3);
        assert_eq!(fraction_count(7, 0.3), 2);
        assert_eq!(fraction_count(100, 0.29), 29);
        assert_eq!(fraction_count(0, 0.5), 0);
        assert_eq!(fraction_count(5, 1.0), 5);
    }

    #[test]
    fn test_tournament_upset_rate() {
        let strong = scored(90.0);
        let weak = scored(10.0);
        let pool = vec![&strong, &weak];
        let selector = TournamentSelector::new(2);
        let mut rng = StdRng::seed_from_u64(2024);

        let wins = (0..10_000)
            .filter(|_| selector.select(&pool, &mut rng).unwrap().id() == strong.id())
            .count();
        let rate = wins as f64 / 10_000.0;
        assert!((rate - 0.8).abs() < 0.03, "rate = {}", rate);
    }

    #[test]
    fn test_tournament_on_single_candidate_and_empty_pool() {
        let only = scored(42.0);
        let selector = TournamentSelector::new(3);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(selector.select(&[&only], &mut rng).unwrap().id(), only.id());
        assert!(selector.select(&[], &mut rng).is_none());
    }

    #[test]
    fn test_select_survivors_counts_and_elites() {
        let ranked: Vec<ScoredAgent> = (0..10).map(|i| scored(90.0 - i as f64 * 5.0)).collect();
        let selector = TournamentSelector::new(2);
        let mut rng = StdRng::seed_from_u64(9);

        let selection = select_survivors(&ranked, 2, 7, &selector, &mut rng);
        assert_eq!(selection.elites.len(), 2);
        assert_eq!(selection.survivors.len(), 7);
        assert_eq!(selection.eliminated.len(), 3);
        assert_eq!(selection.survivors[0].id(), ranked[0].id());
        assert_eq!(selection.survivors[1].id(), ranked[1].id());

        let mut ids: Vec<_> = selection
            .survivors
            .iter()
            .chain(selection.eliminated.iter())
            .map(|s| s.id())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_elites_capped_at_survivor_count() {
        let ranked: Vec<ScoredAgent> = (0..4).map(|i| scored(80.0 - i as f64)).collect();
        let selector = TournamentSelector::new(2);
        let mut rng = StdRng::seed_from_u64(3);

        let selection = select_survivors(&ranked, 4, 2, &selector, &mut rng);
        assert_eq!(selection.elites.len(), 2);
        assert_eq!(selection.survivors.len(), 2);
        assert_eq!(selection.eliminated.len(), 2);
    }
}
