//! Weighted operation selection table (spec.md §4.6).

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

/// Picks the next operation given how far `current` deviates from `target`.
/// `target` of 0 is treated as "at target" to avoid division by zero.
#[must_use]
pub fn select_operation(current: u32, target: u32) -> Operation {
    let weights = weights_for(current, target);
    weighted_pick(&weights)
}

fn weights_for(current: u32, target: u32) -> [(Operation, f64); 5] {
    if target == 0 || current == target {
        [(Operation::Create, 0.0), (Operation::Read, 50.0), (Operation::Update, 25.0), (Operation::Delete, 0.0), (Operation::List, 25.0)]
    } else if current < target {
        let deficit_ratio = (target - current) as f64 / target as f64;
        let delete_weight = if current == 0 { 0.0 } else { 5.0_f64.max(0.0) };
        [
            (Operation::Create, 30.0 + deficit_ratio * 40.0),
            (Operation::Read, 30.0),
            (Operation::Update, 20.0),
            (Operation::Delete, delete_weight),
            (Operation::List, 15.0),
        ]
    } else {
        let delete_weight = if current == 0 { 0.0 } else { 60.0 };
        [(Operation::Create, 0.0), (Operation::Read, 20.0), (Operation::Update, 10.0), (Operation::Delete, delete_weight), (Operation::List, 10.0)]
    }
}

fn weighted_pick(weights: &[(Operation, f64); 5]) -> Operation {
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Operation::Read;
    }
    let mut roll = rand::rng().random_range(0.0..total);
    for (op, weight) in weights {
        if roll < *weight {
            return *op;
        }
        roll -= weight;
    }
    weights[weights.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_target_never_creates_or_deletes() {
        for _ in 0..200 {
            let op = select_operation(5, 5);
            assert!(!matches!(op, Operation::Create | Operation::Delete));
        }
    }

    #[test]
    fn below_target_can_create() {
        let mut saw_create = false;
        for _ in 0..500 {
            if select_operation(1, 10) == Operation::Create {
                saw_create = true;
                break;
            }
        }
        assert!(saw_create);
    }

    #[test]
    fn below_target_with_zero_current_never_deletes() {
        for _ in 0..200 {
            assert_ne!(select_operation(0, 10), Operation::Delete);
        }
    }

    #[test]
    fn above_target_favors_delete() {
        let mut delete_count = 0;
        for _ in 0..500 {
            if select_operation(20, 5) == Operation::Delete {
                delete_count += 1;
            }
        }
        assert!(delete_count > 200);
    }
}
