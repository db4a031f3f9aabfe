//! Tiered selection of candidates for classifier calls.
//!
//! Pure top-K by confidence would spend every slot on the very-high tier.
//! Selection instead guarantees the very-high tier a minimum share, fills
//! from the high and medium tiers next, then backfills with whatever is
//! left in confidence order.

use crate::core::Candidate;

pub const VERY_HIGH_TIER: f64 = 0.9;
pub const HIGH_TIER: f64 = 0.75;
pub const MEDIUM_TIER: f64 = 0.6;

/// Minimum very-high allocation before the one-third rule applies
const VERY_HIGH_MIN_SLOTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct PrioritySelection {
    /// Candidates chosen for classification, confidence descending
    pub selected: Vec<Candidate>,
    /// Everything else, in input order
    pub deferred: Vec<Candidate>,
}

pub fn very_high_allocation(max_selected: usize) -> usize {
    max_selected.min(VERY_HIGH_MIN_SLOTS.max(max_selected / 3))
}

pub fn prioritize(candidates: Vec<Candidate>, max_selected: usize) -> PrioritySelection {
    if candidates.len() <= max_selected {
        let mut selected = candidates;
        sort_by_confidence(&mut selected);
        return PrioritySelection {
            selected,
            deferred: Vec::new(),
        };
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .confidence
            .total_cmp(&candidates[a].confidence)
            .then(a.cmp(&b))
    });

    let tier_of = |idx: usize| {
        let c = candidates[idx].confidence;
        if c >= VERY_HIGH_TIER {
            0
        } else if c >= HIGH_TIER {
            1
        } else if c >= MEDIUM_TIER {
            2
        } else {
            3
        }
    };

    let mut chosen = vec![false; candidates.len()];
    let mut taken = 0;
    let take_from_tier = |tier: usize, limit: usize, chosen: &mut Vec<bool>, taken: &mut usize| {
        for &idx in order.iter().filter(|&&idx| tier_of(idx) == tier) {
            if *taken >= limit {
                break;
            }
            chosen[idx] = true;
            *taken += 1;
        }
    };

    take_from_tier(0, very_high_allocation(max_selected), &mut chosen, &mut taken);
    take_from_tier(1, max_selected, &mut chosen, &mut taken);
    take_from_tier(2, max_selected, &mut chosen, &mut taken);

    for &idx in &order {
        if taken >= max_selected {
            break;
        }
        if !chosen[idx] {
            chosen[idx] = true;
            taken += 1;
        }
    }

    let mut selection = PrioritySelection::default();
    for (candidate, picked) in candidates.into_iter().zip(chosen) {
        if picked {
            selection.selected.push(candidate);
        } else {
            selection.deferred.push(candidate);
        }
    }
    sort_by_confidence(&mut selection.selected);
    selection
}

fn sort_by_confidence(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}
