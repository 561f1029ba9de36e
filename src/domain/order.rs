use std::cmp::Ordering;

use super::entity::Job;

/// Total order used by every queue. A job that compares `Less` is served first.
///
/// Jobs are compared by `runnable_at` (set before unset, then earliest first),
/// then by priority and last by id. Ids are unique so the order is strict.
pub fn compare(left: &Job, right: &Job) -> Ordering {
    let by_runnable_at = match (left.runnable_at, right.runnable_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_runnable_at
        .then_with(|| left.priority.cmp(&right.priority))
        .then_with(|| left.id.cmp(&right.id))
}

pub fn less(left: &Job, right: &Job) -> bool {
    compare(left, right) == Ordering::Less
}

/// Orders two queue heads. An empty queue sorts after any non-empty one.
pub fn head_less(left: Option<&Job>, right: Option<&Job>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => less(a, b),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn job(id: u64, priority: u64) -> Job {
        Job::new(id, priority, Duration::from_secs(60), Bytes::new())
    }

    #[test]
    fn test_runnable_at_sorts_before_unset() {
        let delayed = job(2, 10).runnable_at(Utc::now());
        let plain = job(1, 0);

        assert!(less(&delayed, &plain));
        assert!(!less(&plain, &delayed));
    }

    #[test]
    fn test_earlier_runnable_at_wins() {
        let now = Utc::now();
        let early = job(2, 5).runnable_at(now);
        let late = job(1, 0).runnable_at(now + ChronoDuration::seconds(1));

        assert!(less(&early, &late));
        assert!(!less(&late, &early));
    }

    #[test]
    fn test_priority_then_id() {
        assert!(less(&job(9, 1), &job(1, 2)));
        assert!(!less(&job(1, 2), &job(9, 1)));

        assert!(less(&job(1, 3), &job(2, 3)));
        assert!(!less(&job(2, 3), &job(1, 3)));
    }

    #[test]
    fn test_order_is_irreflexive() {
        let a = job(1, 1);
        assert!(!less(&a, &a));
        assert_eq!(compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_empty_head_sorts_last() {
        let a = job(1, 1);
        assert!(head_less(Some(&a), None));
        assert!(!head_less(None, Some(&a)));
        assert!(!head_less(None, None));
    }
}
