//! Exact subset dynamic program for index-creation-aware ordering
//!
//! Each item needs a set of indexes. An index is paid for once, when the
//! first item needing it runs. Placing item `q` after the items in `S`
//! contributes `w(q) * numerator(S ∪ {q}) / n`, where `numerator` is the
//! running raw cost of every index created so far and `n` is the total
//! item weight (the item count without weights). Indexes created early are
//! therefore amortized over every later item.
//!
//! Complexity: `O(2^n · (n + d))` time and `O(2^n)` memory for `n` items
//! with `d` indexes per item. `n` is capped by the solver limit.
//!
//! On ties the candidate with the lowest item position wins. Which of
//! several equal-cost orders is returned carries no meaning.

use std::collections::{BTreeMap, BTreeSet};

use super::errors::{OrderingError, OrderingResult};

/// Default item limit
pub const DEFAULT_MAX_ITEMS: usize = 20;

/// Largest accepted limit (2^22 states)
pub const HARD_MAX_ITEMS: usize = 22;

/// Best order found and its cost
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingSolution {
    /// Item positions, a permutation of `0..items.len()`
    pub order: Vec<usize>,
    /// Amortized cost of `order`
    pub cost: f64,
}

/// Exact ordering solver with a validated item limit
#[derive(Debug, Clone, Copy)]
pub struct OrderingSolver {
    max_items: usize,
}

impl Default for OrderingSolver {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Items compiled to dense index ids
struct Problem {
    /// Required index ids per item
    required: Vec<Vec<usize>>,
    /// Creation cost per index id
    costs: Vec<f64>,
    /// Bitmask of items requiring each index id
    users: Vec<u64>,
    /// Weight per item
    weights: Vec<f64>,
    /// Normalizer
    total_weight: f64,
}

impl Problem {
    fn compile<T, F>(items: &[BTreeSet<T>], cost: F, weights: Option<&[f64]>) -> OrderingResult<Self>
    where
        T: Ord,
        F: Fn(&T) -> f64,
    {
        let weights: Vec<f64> = match weights {
            Some(w) => {
                if w.len() != items.len() {
                    return Err(OrderingError::WeightMismatch {
                        expected: items.len(),
                        actual: w.len(),
                    });
                }
                if let Some(bad) = w.iter().find(|x| !x.is_finite() || **x <= 0.0) {
                    return Err(OrderingError::InvalidWeight(*bad));
                }
                w.to_vec()
            }
            None => vec![1.0; items.len()],
        };

        let mut ids: BTreeMap<&T, usize> = BTreeMap::new();
        let mut costs = Vec::new();
        let mut users: Vec<u64> = Vec::new();
        let mut required = Vec::with_capacity(items.len());

        for (item, set) in items.iter().enumerate() {
            let mut needs = Vec::with_capacity(set.len());
            for index in set {
                let id = match ids.get(index) {
                    Some(&id) => id,
                    None => {
                        let c = cost(index);
                        if !c.is_finite() || c < 0.0 {
                            return Err(OrderingError::InvalidCost(c));
                        }
                        let id = costs.len();
                        ids.insert(index, id);
                        costs.push(c);
                        users.push(0);
                        id
                    }
                };
                users[id] |= 1u64 << item;
                needs.push(id);
            }
            required.push(needs);
        }

        let total_weight = weights.iter().sum();

        Ok(Self {
            required,
            costs,
            users,
            weights,
            total_weight,
        })
    }

    fn len(&self) -> usize {
        self.required.len()
    }

    /// Raw cost of the indexes `item` needs that no item in `placed` needed
    fn marginal(&self, placed: u64, item: usize) -> f64 {
        self.required[item]
            .iter()
            .filter(|&&id| self.users[id] & placed == 0)
            .map(|&id| self.costs[id])
            .sum()
    }
}

impl OrderingSolver {
    /// Solver accepting up to `max_items` items
    pub fn new(max_items: usize) -> OrderingResult<Self> {
        if max_items == 0 || max_items > HARD_MAX_ITEMS {
            return Err(OrderingError::InvalidLimit(max_items));
        }
        Ok(Self { max_items })
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Order `items` to minimize amortized index-creation cost.
    ///
    /// `cost` maps an index to its non-negative creation cost. `weights`,
    /// when given, holds one positive weight per item.
    pub fn solve<T, F>(
        &self,
        items: &[BTreeSet<T>],
        cost: F,
        weights: Option<&[f64]>,
    ) -> OrderingResult<OrderingSolution>
    where
        T: Ord,
        F: Fn(&T) -> f64,
    {
        if items.len() > self.max_items {
            return Err(OrderingError::TooManyItems {
                items: items.len(),
                limit: self.max_items,
            });
        }

        let problem = Problem::compile(items, cost, weights)?;
        let n = problem.len();
        if n == 0 {
            return Ok(OrderingSolution {
                order: Vec::new(),
                cost: 0.0,
            });
        }

        let states = 1usize << n;
        let mut best = vec![f64::INFINITY; states];
        let mut numerator = vec![0.0f64; states];
        let mut last = vec![0u8; states];
        best[0] = 0.0;

        // Every proper submask of `mask` is numerically smaller, so it is
        // final by the time `mask` is visited.
        for mask in 1..states {
            let mut chosen: Option<(f64, f64, usize)> = None;

            for q in 0..n {
                let bit = 1usize << q;
                if mask & bit == 0 {
                    continue;
                }
                let prev = mask & !bit;
                let num = numerator[prev] + problem.marginal(prev as u64, q);
                let c = best[prev] + num / problem.total_weight * problem.weights[q];

                if chosen.map_or(true, |(current, _, _)| c < current) {
                    chosen = Some((c, num, q));
                }
            }

            if let Some((c, num, q)) = chosen {
                best[mask] = c;
                numerator[mask] = num;
                last[mask] = q as u8;
            }
        }

        let full = states - 1;
        let mut order = Vec::with_capacity(n);
        let mut mask = full;
        while mask != 0 {
            let q = last[mask] as usize;
            order.push(q);
            mask &= !(1usize << q);
        }
        order.reverse();

        Ok(OrderingSolution {
            order,
            cost: best[full],
        })
    }
}

/// Amortized cost of executing `items` in `order`.
///
/// Uses the same objective as `OrderingSolver::solve`.
pub fn replay_cost<T, F>(
    order: &[usize],
    items: &[BTreeSet<T>],
    cost: F,
    weights: Option<&[f64]>,
) -> OrderingResult<f64>
where
    T: Ord,
    F: Fn(&T) -> f64,
{
    if items.len() > u64::BITS as usize {
        return Err(OrderingError::TooManyItems {
            items: items.len(),
            limit: u64::BITS as usize,
        });
    }
    if order.len() != items.len() {
        return Err(OrderingError::NotAPermutation);
    }
    let mut seen = vec![false; items.len()];
    for &q in order {
        if q >= items.len() || seen[q] {
            return Err(OrderingError::NotAPermutation);
        }
        seen[q] = true;
    }

    let problem = Problem::compile(items, cost, weights)?;

    let mut placed = 0u64;
    let mut numerator = 0.0;
    let mut total = 0.0;
    for &q in order {
        numerator += problem.marginal(placed, q);
        total += numerator / problem.total_weight * problem.weights[q];
        placed |= 1u64 << q;
    }

    Ok(total)
}
