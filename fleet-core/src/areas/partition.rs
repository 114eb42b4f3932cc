use serde::Serialize;

/// Inclusive step range of an area route assigned to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutePart {
    pub start: usize,
    pub end: usize,
}

impl RoutePart {
    pub fn contains(&self, step: usize) -> bool {
        (self.start..=self.end).contains(&step)
    }

    pub fn step_count(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// Splits a route of `route_len` steps into contiguous parts for `workers`
/// sessions, in order. The first `route_len % workers` parts are one step
/// longer than the rest.
///
/// When there are more workers than steps, the surplus workers share
/// single steps (`i % route_len`) instead of receiving an empty part.
/// Returns an empty list when either input is zero.
pub fn partition(route_len: usize, workers: usize) -> Vec<RoutePart> {
    if route_len == 0 || workers == 0 {
        return Vec::new();
    }

    let base = route_len / workers;
    let remainder = route_len % workers;
    let mut parts = Vec::with_capacity(workers);
    let mut start = 0;

    for index in 0..workers {
        let len = base + usize::from(index < remainder);
        if len == 0 {
            let step = index % route_len;
            parts.push(RoutePart {
                start: step,
                end: step,
            });
            continue;
        }
        parts.push(RoutePart {
            start,
            end: start + len - 1,
        });
        start += len;
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(parts: &[RoutePart]) -> Vec<(usize, usize)> {
        parts.iter().map(|p| (p.start, p.end)).collect()
    }

    #[test]
    fn test_partition_ten_steps_three_workers() {
        let parts = partition(10, 3);
        assert_eq!(bounds(&parts), vec![(0, 3), (4, 6), (7, 9)]);
        assert_eq!(parts.iter().map(RoutePart::step_count).sum::<usize>(), 10);
    }

    #[test]
    fn test_partition_covers_every_step_once() {
        for route_len in 1..40 {
            for workers in 1..=route_len {
                let parts = partition(route_len, workers);
                let mut seen = vec![0u32; route_len];
                for part in &parts {
                    for step in part.start..=part.end {
                        seen[step] += 1;
                    }
                }
                assert!(seen.iter().all(|count| *count == 1));
                assert_eq!(parts.len(), workers);
            }
        }
    }

    #[test]
    fn test_partition_single_worker_takes_whole_route() {
        assert_eq!(bounds(&partition(5, 1)), vec![(0, 4)]);
    }

    #[test]
    fn test_partition_more_workers_than_steps() {
        assert_eq!(
            bounds(&partition(2, 5)),
            vec![(0, 0), (1, 1), (0, 0), (1, 1), (0, 0)]
        );
    }

    #[test]
    fn test_partition_zero_inputs() {
        assert!(partition(10, 0).is_empty());
        assert!(partition(0, 3).is_empty());
    }
}
