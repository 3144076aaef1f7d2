//! Uniform crossover, Gaussian mutation and offspring production.

use super::selection::{ScoredAgent, TournamentSelector};
use crate::domain::agent::Agent;
use crate::domain::dna::{Dna, DnaField};
use rand::Rng;
use std::f64::consts::TAU;

/// Mutation noise standard deviation as a fraction of the gene's magnitude.
pub const MUTATION_SCALE: f64 = 0.1;

/// Implicit bound for genes outside the bound table, as a fraction of the
/// pre-mutation value.
pub const UNBOUNDED_GENE_RANGE: f64 = 0.5;

const MAX_PARENT_REDRAWS: usize = 32;

/// Standard normal sample scaled by `std_dev` (Box-Muller).
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return 0.0;
    }
    // (0, 1] keeps ln() finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos() * std_dev
}

/// Uniform crossover: each gene comes from one parent picked independently
/// per gene. Extension genes only one parent carries are inherited as is.
pub fn crossover<R: Rng + ?Sized>(a: &Dna, b: &Dna, rng: &mut R) -> Dna {
    let mut child = a.clone();
    child.strategy_kind = if rng.random_bool(0.5) {
        a.strategy_kind
    } else {
        b.strategy_kind
    };

    for field in DnaField::ALL {
        if !rng.random_bool(0.5) {
            child.set(field, b.get(field));
        }
    }

    for (key, &value) in &b.extra {
        match a.extra.get(key) {
            Some(_) if rng.random_bool(0.5) => {}
            _ => {
                child.extra.insert(key.clone(), value);
            }
        }
    }

    child
}

/// Perturb each gene with probability `rate`, then pull it back inside its
/// bound. Known genes always end inside the bound table.
pub fn mutate<R: Rng + ?Sized>(dna: &mut Dna, rate: f64, rng: &mut R) {
    let rate = rate.clamp(0.0, 1.0);

    for field in DnaField::ALL {
        let value = dna.get(field);
        if rng.random_bool(rate) {
            dna.set(field, value + gaussian(rng, value.abs() * MUTATION_SCALE));
        }
    }
    dna.clamp_to_bounds();

    for value in dna.extra.values_mut() {
        let before = *value;
        if rng.random_bool(rate) {
            let span = before.abs() * UNBOUNDED_GENE_RANGE;
            let mutated = before + gaussian(rng, before.abs() * MUTATION_SCALE);
            *value = if mutated.is_finite() {
                mutated.clamp(before - span, before + span)
            } else {
                before
            };
        }
    }
}

/// Produces offspring from a survivor set.
#[derive(Debug, Clone, Copy)]
pub struct Breeder {
    pub mutation_rate: f64,
    pub selector: TournamentSelector,
}

impl Breeder {
    pub fn new(mutation_rate: f64, selector: TournamentSelector) -> Self {
        Self {
            mutation_rate,
            selector,
        }
    }

    /// Breed `count` children into `generation_index`.
    ///
    /// Parents are two distinct tournament winners. A lone survivor yields
    /// mutated clones with a single parent id; no survivors yield nothing.
    pub fn breed<R: Rng + ?Sized>(
        &self,
        survivors: &[ScoredAgent],
        count: usize,
        generation_index: u32,
        rng: &mut R,
    ) -> Vec<Agent> {
        let pool: Vec<&ScoredAgent> = survivors.iter().collect();
        let mut children = Vec::with_capacity(count);

        for _ in 0..count {
            let Some(first) = self.selector.select(&pool, rng) else {
                break;
            };

            if pool.len() < 2 {
                let mut dna = first.agent.dna.clone();
                mutate(&mut dna, self.mutation_rate, rng);
                children.push(Agent::new(dna, generation_index, vec![first.id()]));
                continue;
            }

            let second = self.distinct_partner(&pool, first, rng);
            let mut dna = crossover(&first.agent.dna, &second.agent.dna, rng);
            mutate(&mut dna, self.mutation_rate, rng);
            children.push(Agent::new(
                dna,
                generation_index,
                vec![first.id(), second.id()],
            ));
        }

        children
    }

    fn distinct_partner<'a, R: Rng + ?Sized>(
        &self,
        pool: &[&'a ScoredAgent],
        first: &ScoredAgent,
        rng: &mut R,
    ) -> &'a ScoredAgent {
        for _ in 0..MAX_PARENT_REDRAWS {
            match self.selector.select(pool, rng) {
                Some(candidate) if candidate.id() != first.id() => return candidate,
                _ => {}
            }
        }
        // Redraws kept hitting the same winner; take anyone else.
        let others: Vec<&'a ScoredAgent> = pool
            .iter()
            .copied()
            .filter(|candidate| candidate.id() != first.id())
            .collect();
        others[rng.random_range(0..others.len())]
    }
}
