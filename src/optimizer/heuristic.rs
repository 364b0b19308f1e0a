// Nearest-neighbor construction followed by pairwise-swap improvement
//
// Works on stop indices against a dense cost table. Pinned positions never
// move; every other position may be exchanged.

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Pins {
    pub start: bool,
    pub end: bool,
    /// Cost includes the closing leg back to the first stop
    pub closed: bool,
}

pub(crate) fn tour_cost(order: &[usize], costs: &[Vec<f64>], closed: bool) -> f64 {
    let open: f64 = order.windows(2).map(|w| costs[w[0]][w[1]]).sum();
    match (closed, order.first(), order.last()) {
        (true, Some(first), Some(last)) if order.len() > 1 => open + costs[*last][*first],
        _ => open,
    }
}

fn improved(candidate: f64, best: f64) -> bool {
    candidate < best - EPSILON * best.abs().max(1.0)
}

/// Greedy construction from a fixed first stop. Ties go to the stop that
/// appears earliest in the input.
fn nearest_neighbor(first: usize, free: &[usize], last: Option<usize>, costs: &[Vec<f64>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(free.len() + 2);
    order.push(first);
    let mut remaining: Vec<usize> = free.iter().copied().filter(|i| *i != first).collect();
    let mut current = first;
    while !remaining.is_empty() {
        let mut best_pos = 0;
        for pos in 1..remaining.len() {
            if improved(costs[current][remaining[pos]], costs[current][remaining[best_pos]]) {
                best_pos = pos;
            }
        }
        current = remaining.remove(best_pos);
        order.push(current);
    }
    if let Some(last) = last {
        order.push(last);
    }
    order
}

/// Exchange pairs of movable positions while that strictly lowers the cost.
fn swap_improve(order: &mut [usize], movable: &[usize], costs: &[Vec<f64>], closed: bool, max_passes: usize) -> f64 {
    let mut best = tour_cost(order, costs, closed);
    for _ in 0..max_passes {
        let mut changed = false;
        for a in 0..movable.len() {
            for b in (a + 1)..movable.len() {
                order.swap(movable[a], movable[b]);
                let cost = tour_cost(order, costs, closed);
                if improved(cost, best) {
                    best = cost;
                    changed = true;
                } else {
                    order.swap(movable[a], movable[b]);
                }
            }
        }
        if !changed {
            break;
        }
    }
    best
}

/// Best ordering of `0..n` found by the heuristic, together with its cost.
/// The input order wins any tie with the heuristic's result.
pub(crate) fn solve(costs: &[Vec<f64>], pins: Pins, max_passes: usize) -> (Vec<usize>, f64) {
    let n = costs.len();
    let identity: Vec<usize> = (0..n).collect();
    if n <= 1 {
        return (identity, 0.0);
    }

    let pin_end = pins.end && !pins.closed;
    let last = pin_end.then_some(n - 1);
    let free: Vec<usize> = (0..n)
        .filter(|i| !(pins.start && *i == 0) && Some(*i) != last)
        .collect();

    let starts: Vec<usize> = if pins.start { vec![0] } else { free.clone() };
    let first_movable = usize::from(pins.start);
    let movable: Vec<usize> = (first_movable..n - usize::from(pin_end)).collect();

    let mut best: Option<(Vec<usize>, f64)> = None;
    for start in starts {
        let mut order = nearest_neighbor(start, &free, last, costs);
        let cost = swap_improve(&mut order, &movable, costs, pins.closed, max_passes);
        if best.as_ref().map_or(true, |(_, b)| improved(cost, *b)) {
            best = Some((order, cost));
        }
    }

    let identity_cost = tour_cost(&identity, costs, pins.closed);
    match best {
        Some((order, cost)) if improved(cost, identity_cost) => (order, cost),
        _ => (identity, identity_cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a line; cost is absolute difference
    fn line(points: &[f64]) -> Vec<Vec<f64>> {
        points
            .iter()
            .map(|a| points.iter().map(|b| (a - b).abs()).collect())
            .collect()
    }

    const FREE: Pins = Pins { start: false, end: false, closed: false };

    #[test]
    fn test_trivial_sizes() {
        assert_eq!(solve(&[], FREE, 10).0, Vec::<usize>::new());
        assert_eq!(solve(&line(&[3.0]), FREE, 10).0, vec![0]);
    }

    #[test]
    fn test_sorts_points_on_a_line() {
        let costs = line(&[0.0, 3.0, 1.0, 2.0]);
        let pins = Pins { start: true, end: false, closed: false };
        let (order, cost) = solve(&costs, pins, 10);
        assert_eq!(order, vec![0, 2, 3, 1]);
        assert_eq!(cost, 3.0);
    }

    #[test]
    fn test_pinned_endpoints_stay() {
        let costs = line(&[0.0, 9.0, 4.0, 1.0, 5.0]);
        let pins = Pins { start: true, end: true, closed: false };
        let (order, _) = solve(&costs, pins, 10);
        assert_eq!(order[0], 0);
        assert_eq!(order[4], 4);
        assert_eq!(order, vec![0, 3, 2, 1, 4]);
    }

    #[test]
    fn test_input_order_wins_ties() {
        // every pair costs the same
        let costs: Vec<Vec<f64>> = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0.0 } else { 1.0 }).collect())
            .collect();
        let (order, _) = solve(&costs, FREE, 10);
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_coincident_stops_are_kept() {
        let costs = line(&[0.0, 5.0, 0.0, 5.0]);
        let pins = Pins { start: true, end: false, closed: false };
        let (order, cost) = solve(&costs, pins, 10);
        assert_eq!(order.len(), 4);
        assert_eq!(order, vec![0, 2, 1, 3]);
        assert_eq!(cost, 5.0);
    }

    #[test]
    fn test_closed_tour_counts_return_leg() {
        let costs = line(&[0.0, 10.0, 1.0]);
        let pins = Pins { start: true, end: false, closed: true };
        let (order, cost) = solve(&costs, pins, 10);
        assert_eq!(order[0], 0);
        assert_eq!(cost, 20.0);
    }

    #[test]
    fn test_free_start_picks_best_origin() {
        let costs = line(&[5.0, 0.0, 10.0]);
        let (order, cost) = solve(&costs, FREE, 10);
        assert_eq!(cost, 10.0);
        assert!(order == vec![1, 0, 2] || order == vec![2, 0, 1]);
    }
}
