//! Unit tests for tsim-event.

#[cfg(test)]
mod list_tests {
    use tsim_core::SimTime;

    use crate::{EventList, Priority};

    #[test]
    fn pops_in_time_order() {
        let mut list = EventList::new();
        list.insert(SimTime(3.0), Priority::NORMAL, 'c');
        list.insert(SimTime(1.0), Priority::NORMAL, 'a');
        list.insert(SimTime(2.0), Priority::NORMAL, 'b');
        let order: Vec<char> = std::iter::from_fn(|| list.pop_first().map(|e| e.into_payload())).collect();
        assert_eq!(order, vec!['a', 'b', 'c']);
    }

    #[test]
    fn equal_time_lower_priority_value_first() {
        // t=5 priority 1 and t=5 priority 0 → priority 0 drains first.
        let mut list = EventList::new();
        list.insert(SimTime(5.0), Priority(1), "p1");
        list.insert(SimTime(5.0), Priority(0), "p0");
        assert_eq!(list.pop_first().unwrap().into_payload(), "p0");
        assert_eq!(list.pop_first().unwrap().into_payload(), "p1");
    }

    #[test]
    fn equal_key_keeps_insertion_order() {
        let mut list = EventList::new();
        for i in 0..10 {
            list.insert(SimTime(1.0), Priority::NORMAL, i);
        }
        let order: Vec<i32> = std::iter::from_fn(|| list.pop_first().map(|e| e.into_payload())).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn remove_specific_event() {
        let mut list = EventList::new();
        let a = list.insert(SimTime(1.0), Priority::NORMAL, "a");
        let b = list.insert(SimTime(1.0), Priority::NORMAL, "b");
        assert_eq!(list.remove(&a), Some("a"));
        assert_eq!(list.remove(&a), None);
        assert!(list.contains(&b));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn pop_due_only_matches_exact_time() {
        let mut list = EventList::new();
        list.insert(SimTime(2.0), Priority::NORMAL, ());
        assert!(list.pop_due(SimTime(1.0)).is_none());
        assert!(list.pop_due(SimTime(2.0)).is_some());
        assert!(list.pop_due(SimTime(2.0)).is_none());
    }

    #[test]
    fn empty_list_returns_none() {
        let mut list: EventList<()> = EventList::new();
        assert!(list.peek().is_none());
        assert!(list.next_time().is_none());
        assert!(list.pop_first().is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn handles_are_unique_after_clear() {
        let mut list = EventList::new();
        let a = list.insert(SimTime(1.0), Priority::NORMAL, ());
        list.clear();
        let b = list.insert(SimTime(1.0), Priority::NORMAL, ());
        assert_ne!(a, b);
        assert!(!list.contains(&a));
    }
}

#[cfg(test)]
mod queue_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use tsim_core::SimTime;

    use crate::{EventQueue, Priority};

    #[test]
    fn peek_and_remove_earliest_on_empty() {
        let q: EventQueue<u32> = EventQueue::new();
        assert!(q.peek_earliest().is_none());
        assert!(q.remove_earliest().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn remove_reports_whether_pending() {
        let q: EventQueue<u32> = EventQueue::new();
        let h = q.add(SimTime(1.0), Priority::NORMAL, 1);
        assert!(q.remove(&h));
        assert!(!q.remove(&h));
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn handles_snapshot_is_ordered() {
        let q: EventQueue<u32> = EventQueue::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut times: Vec<u32> = (0..50).collect();
        times.shuffle(&mut rng);
        for t in times {
            q.add(SimTime(t as f64), Priority(rng.gen_range(0..=10)), t);
        }
        let handles = q.handles();
        assert_eq!(handles.len(), 50);
        assert!(handles.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn concurrent_adds_lose_nothing() {
        let q: Arc<EventQueue<(usize, usize)>> = Arc::new(EventQueue::new());
        let threads: Vec<_> = (0..8)
            .map(|tid| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(tid as u64);
                    for i in 0..500 {
                        let t = rng.gen_range(0..1_000) as f64;
                        q.add(SimTime(t), Priority(rng.gen_range(0..=10)), (tid, i));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(q.len(), 8 * 500);

        let mut last = None;
        let mut count = 0;
        while let Some(e) = q.remove_earliest() {
            let key = (e.time().as_secs(), e.priority());
            if let Some(prev) = last {
                assert!(prev <= key, "{prev:?} came before {key:?}");
            }
            last = Some(key);
            count += 1;
        }
        assert_eq!(count, 8 * 500);
    }

    #[test]
    fn side_state_shares_the_lock() {
        let q: EventQueue<u32, u64> = EventQueue::with_state(0);
        {
            let mut guard = q.lock();
            guard.state += 1;
            guard.events.insert(SimTime(1.0), Priority::NORMAL, 9);
        }
        assert_eq!(q.with_state_ref(|s| *s), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn add_wakes_waiter() {
        let q: Arc<EventQueue<u32>> = Arc::new(EventQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut guard = q.lock();
                while guard.events.is_empty() {
                    if q.wait_for(&mut guard, Duration::from_secs(10)) {
                        return false;
                    }
                }
                true
            })
        };
        thread::sleep(Duration::from_millis(20));
        q.add(SimTime(1.0), Priority::NORMAL, 1);
        assert!(waiter.join().unwrap(), "waiter should be notified before its timeout");
    }
}

#[cfg(test)]
mod ordering_properties {
    use proptest::prelude::*;
    use tsim_core::SimTime;

    use crate::{EventList, Priority};

    proptest! {
        /// Repeated pops yield non-decreasing (time, priority), and ties keep
        /// insertion order.
        #[test]
        fn pops_are_sorted(entries in prop::collection::vec((0u16..200, 0u8..=10), 0..300)) {
            let mut list = EventList::new();
            for (i, &(t, p)) in entries.iter().enumerate() {
                list.insert(SimTime(t as f64), Priority(p), i);
            }
            let mut prev: Option<(u16, u8, usize)> = None;
            while let Some(e) = list.pop_first() {
                let idx = e.into_payload();
                let (t, p) = entries[idx];
                if let Some((pt, pp, pi)) = prev {
                    prop_assert!((pt, pp) <= (t, p));
                    if (pt, pp) == (t, p) {
                        prop_assert!(pi < idx);
                    }
                }
                prev = Some((t, p, idx));
            }
        }
    }
}
