//! Combination engine: tiered, budget-bounded option-set generation.
//!
//! Output is deterministic for fixed inputs: tiers are emitted in fixed
//! order and every enumeration follows the input order of the tokens, so
//! regeneration is byte-for-byte reproducible.
use crate::schema::{CombinationCase, Tier};
use std::collections::BTreeSet;

/// Quantitative limits for combination generation.
#[derive(Debug, Clone, Copy)]
pub struct CombinationSettings {
    /// Singleton cases emitted by tier0 (after the leading empty case).
    pub tier0_single_limit: usize,
    /// Pairwise cases emitted by tier2.
    pub tier2_pairwise_limit: usize,
    /// Global case budget shared by all tier4 depths.
    pub tier4_budget: usize,
    /// Hard ceiling on tier4 combination depth.
    pub max_depth: usize,
}

impl Default for CombinationSettings {
    fn default() -> CombinationSettings {
        CombinationSettings {
            tier0_single_limit: 8,
            tier2_pairwise_limit: 120,
            tier4_budget: 200,
            max_depth: 4,
        }
    }
}

pub struct CombinationEngine {
    settings: CombinationSettings,
}

impl CombinationEngine {
    pub fn new(settings: CombinationSettings) -> CombinationEngine {
        CombinationEngine { settings }
    }

    /// Generates the combination cases for the active tiers.
    ///
    /// `tier2_tokens` optionally narrows the pairwise tier to an
    /// allow-listed subset; when absent the full token list is used.
    pub fn generate(
        &self,
        available: &[String],
        popular_sets: &[Vec<String>],
        tiers: &[Tier],
        max_full_depth: usize,
        tier2_tokens: Option<&[String]>,
    ) -> Vec<CombinationCase> {
        let tokens = dedup_preserving_order(available);
        let tier2 = match tier2_tokens {
            Some(narrowed) => dedup_preserving_order(narrowed),
            None => tokens.clone(),
        };

        let mut cases = Vec::new();
        if tiers.contains(&Tier::Tier0) {
            cases.extend(self.tier0(&tokens));
        }
        if tiers.contains(&Tier::Tier1) {
            cases.extend(tier1(popular_sets));
        }
        if tiers.contains(&Tier::Tier2) {
            cases.extend(self.tier2(&tier2));
        }
        if tiers.contains(&Tier::Tier4) {
            let depth = max_full_depth.min(self.settings.max_depth);
            cases.extend(self.tier4(&tokens, depth));
        }
        cases
    }

    /// Empty case first, then bounded singletons in original order.
    fn tier0(&self, tokens: &[String]) -> Vec<CombinationCase> {
        let mut cases = vec![CombinationCase {
            options: Vec::new(),
            tier: Tier::Tier0,
        }];
        cases.extend(
            tokens
                .iter()
                .take(self.settings.tier0_single_limit)
                .map(|token| CombinationCase {
                    options: vec![token.clone()],
                    tier: Tier::Tier0,
                }),
        );
        cases
    }

    fn tier2(&self, tokens: &[String]) -> Vec<CombinationCase> {
        let mut cases = Vec::new();
        for combo in Combinations::new(tokens.len(), 2) {
            if cases.len() >= self.settings.tier2_pairwise_limit {
                break;
            }
            cases.push(CombinationCase {
                options: combo.iter().map(|&i| tokens[i].clone()).collect(),
                tier: Tier::Tier2,
            });
        }
        cases
    }

    /// Depths 3..=max_depth, increasing depth first, stopping as soon as
    /// the global budget is spent. This is a deterministic prefix of the
    /// full combinatorial space, not a sample.
    fn tier4(&self, tokens: &[String], max_depth: usize) -> Vec<CombinationCase> {
        let mut cases = Vec::new();
        let mut remaining = self.settings.tier4_budget;
        for depth in 3..=max_depth {
            for combo in Combinations::new(tokens.len(), depth) {
                if remaining == 0 {
                    return cases;
                }
                cases.push(CombinationCase {
                    options: combo.iter().map(|&i| tokens[i].clone()).collect(),
                    tier: Tier::Tier4,
                });
                remaining -= 1;
            }
        }
        cases
    }
}

/// Curated popular sets, each internally de-duplicated; empty sets are
/// skipped.
fn tier1(popular_sets: &[Vec<String>]) -> Vec<CombinationCase> {
    popular_sets
        .iter()
        .filter_map(|set| {
            let canonical = dedup_preserving_order(set);
            if canonical.is_empty() {
                return None;
            }
            Some(CombinationCase {
                options: canonical,
                tier: Tier::Tier1,
            })
        })
        .collect()
}

fn dedup_preserving_order(tokens: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tokens
        .iter()
        .filter(|token| seen.insert(token.as_str().to_string()))
        .cloned()
        .collect()
}

/// Lexicographic-by-index k-combination enumerator over `0..n`.
struct Combinations {
    n: usize,
    k: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Combinations {
        Combinations {
            n,
            k,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        // Advance to the next combination in lexicographic order.
        let mut i = self.k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] != i + self.n - self.k {
                self.indices[i] += 1;
                for j in i + 1..self.k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    }
}
