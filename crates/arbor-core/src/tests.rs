#[cfg(test)]
mod tests {
    use crate::scheduler::{self, Tick};
    use crate::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
        scheduler::reset();
    }

    type Log<T> = Rc<RefCell<Vec<(Tick, T)>>>;

    fn record<T: Clone + 'static>(s: &Stream<T>) -> (Log<T>, Rc<Cell<bool>>, Dispose) {
        let log: Log<T> = Rc::default();
        let done = Rc::new(Cell::new(false));
        let (l, d) = (log.clone(), done.clone());
        let sub = s.subscribe(Observer::new(
            move |v| l.borrow_mut().push((scheduler::now(), v)),
            |e| panic!("unexpected error: {e}"),
            move || d.set(true),
        ));
        (log, done, sub)
    }

    #[test]
    fn test_dispose_runs_once() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let d = Dispose::new(move || c.set(c.get() + 1));
        assert!(!d.is_disposed());
        d.run();
        d.run();
        assert_eq!(count.get(), 1);
        assert!(d.is_disposed());
    }

    #[test]
    fn test_trampoline_runs_nested_work_after_current_task() {
        init();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        scheduler::schedule_now(move || {
            l.borrow_mut().push("outer-start");
            let l2 = l.clone();
            scheduler::schedule_now(move || l2.borrow_mut().push("nested"));
            l.borrow_mut().push("outer-end");
        });
        assert_eq!(*log.borrow(), vec!["outer-start", "outer-end", "nested"]);
        assert!(!scheduler::is_draining());
    }

    #[test]
    fn test_timers_fire_in_order_and_can_be_cancelled() {
        init();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        scheduler::schedule_after(5, move || a.borrow_mut().push(("a", scheduler::now())));
        scheduler::schedule_after(5, move || b.borrow_mut().push(("b", scheduler::now())));
        let cancelled = scheduler::schedule_after(3, move || c.borrow_mut().push(("c", scheduler::now())));
        cancelled.run();
        assert_eq!(scheduler::pending_timers(), 2);

        scheduler::advance_to(4);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler::now(), 4);

        scheduler::run_until_idle();
        assert_eq!(*log.borrow(), vec![("a", 5), ("b", 5)]);
    }

    #[test]
    fn test_map_filter_scan() {
        init();
        let s = Stream::from_iter(vec![1, 2, 3, 4])
            .filter(|x| x % 2 == 0)
            .map(|x| x * 10)
            .scan(0, |acc, x| acc + x);
        let (log, done, _sub) = record(&s);
        let values: Vec<i32> = log.borrow().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20, 60]);
        assert!(done.get());
    }

    #[test]
    fn test_subject_unsubscribe_stops_delivery() {
        init();
        let subject = Subject::new();
        let (log, _, sub) = record(&subject.stream());
        subject.next(1);
        sub.run();
        subject.next(2);
        assert_eq!(*log.borrow(), vec![(0, 1)]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_subject_late_subscriber_after_complete() {
        init();
        let subject: Subject<i32> = Subject::new();
        subject.complete();
        subject.next(5);
        let (log, done, _) = record(&subject.stream());
        assert!(log.borrow().is_empty());
        assert!(done.get());
    }

    #[test]
    fn test_behavior_subject_replays_and_snapshots() {
        init();
        let state = BehaviorSubject::new(vec![1]);
        let (early, _, _e) = record(&state.stream());
        state.next(vec![1, 2]);

        let snapshot = state.value();
        state.next(vec![1, 2, 3]);
        assert_eq!(snapshot, vec![1, 2]);

        let (late, _, _l) = record(&state.stream());
        assert_eq!(early.borrow().len(), 3);
        assert_eq!(*late.borrow(), vec![(0, vec![1, 2, 3])]);
    }

    #[test]
    fn test_switch_map_never_interleaves() {
        init();
        let outer = Stream::from_timeline(vec![(0, "a"), (10, "b")]);
        let switched = outer.switch_map(|x| {
            Stream::from_timeline(vec![(2, format!("{x}1")), (15, format!("{x}2"))])
        });
        let (log, done, _sub) = record(&switched);
        scheduler::advance_to(30);
        assert_eq!(
            *log.borrow(),
            vec![(2, "a1".to_string()), (12, "b1".to_string()), (25, "b2".to_string())]
        );
        assert!(done.get());
    }

    #[test]
    fn test_switch_map_dispose_cancels_inner() {
        init();
        let switched = Stream::of(()).switch_map(|_| Stream::timer(5, 1));
        let (log, _, sub) = record(&switched);
        assert_eq!(scheduler::pending_timers(), 1);
        sub.run();
        assert_eq!(scheduler::pending_timers(), 0);
        scheduler::run_until_idle();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_combine_latest_waits_for_all_inputs() {
        init();
        let (a, b) = (Subject::new(), Subject::new());
        let combined = Stream::combine_latest(vec![a.stream(), b.stream()]);
        let (log, _, _sub) = record(&combined);
        a.next(1);
        assert!(log.borrow().is_empty());
        b.next(10);
        a.next(2);
        let values: Vec<Vec<i32>> = log.borrow().iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![vec![1, 10], vec![2, 10]]);
    }

    #[test]
    fn test_combine_latest_completes_on_dead_input() {
        init();
        let combined = Stream::combine_latest(vec![Stream::empty(), Stream::of(1)]);
        let (log, done, _sub) = record(&combined);
        assert!(log.borrow().is_empty());
        assert!(done.get());
    }

    #[test]
    fn test_merge_and_delay() {
        init();
        let merged = Stream::merge(vec![Stream::timer(3, "slow"), Stream::of("fast").delay(1)]);
        let (log, done, _sub) = record(&merged);
        scheduler::run_until_idle();
        assert_eq!(*log.borrow(), vec![(1, "fast"), (3, "slow")]);
        assert!(done.get());
    }

    #[test]
    fn test_with_latest_from_pairs_with_latest() {
        init();
        let (events, state) = (Subject::new(), BehaviorSubject::new("s0"));
        let paired = events.stream().with_latest_from(&state.stream());
        let (log, _, _sub) = record(&paired);
        events.next(1);
        state.next("s1");
        events.next(2);
        let values: Vec<(i32, &str)> = log.borrow().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![(1, "s0"), (2, "s1")]);
    }

    #[test]
    fn test_share_connects_upstream_once() {
        init();
        let connections = Rc::new(Cell::new(0));
        let c = connections.clone();
        let subject = Subject::new();
        let inner = subject.stream();
        let counted = Stream::new(move |obs| {
            c.set(c.get() + 1);
            inner.subscribe(obs)
        });
        let shared = counted.share();
        let (a, _, sa) = record(&shared);
        let (b, _, sb) = record(&shared);
        subject.next(7);
        assert_eq!(connections.get(), 1);
        assert_eq!(a.borrow().len(), 1);
        assert_eq!(b.borrow().len(), 1);

        sa.run();
        sb.run();
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_remember_replays_latest_to_late_subscriber() {
        init();
        let subject = Subject::new();
        let remembered = subject.stream().remember();
        let (_early, _, _e) = record(&remembered);
        subject.next("v1");
        subject.next("v2");
        let (late, _, _l) = record(&remembered);
        assert_eq!(*late.borrow(), vec![(0, "v2")]);
    }

    #[test]
    fn test_settings_static_wins() {
        let stat = Settings::from_value(json!({ "x": 1 })).unwrap();
        let dynamic = Settings::from_value(json!({ "x": 2, "y": 3 })).unwrap();
        let merged = Settings::merge(&dynamic, &stat);
        assert_eq!(merged.to_value(), json!({ "x": 1, "y": 3 }));
    }

    #[test]
    fn test_settings_deep_merge_replaces_arrays() {
        let dynamic = json!({ "theme": { "fg": "black", "bg": "white" }, "tags": [1, 2] });
        let stat = json!({ "theme": { "fg": "red" }, "tags": [3] });
        assert_eq!(
            settings::merge_values(&dynamic, &stat),
            json!({ "theme": { "fg": "red", "bg": "white" }, "tags": [3] })
        );
    }

    #[test]
    fn test_settings_reject_non_objects() {
        assert!(Settings::from_value(json!(null)).unwrap().is_empty());
        assert_eq!(
            Settings::from_value(json!([1])),
            Err(ContractError::InvalidSettings {
                found: "an array".into()
            })
        );
    }

    #[test]
    fn test_vnode_paths_and_text() {
        let tree = VNode::new("ul")
            .child(VNode::new("li").with_text("one"))
            .child(VNode::new("li").child(VNode::text_node("two")));
        assert_eq!(tree.at_path(&[1, 0]).map(VNode::is_text_node), Some(true));
        assert_eq!(tree.text_content(), "onetwo");
        assert!(tree.at_path(&[2]).is_none());
    }

    #[test]
    fn test_private_trampoline_is_independent() {
        init();
        let local = Rc::new(scheduler::Trampoline::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l, t) = (log.clone(), local.clone());
        scheduler::schedule_now(move || {
            let l2 = l.clone();
            // runs inline: only the global trampoline is busy
            t.schedule(move || l2.borrow_mut().push("local"));
            l.borrow_mut().push("global");
        });
        assert_eq!(*log.borrow(), vec!["local", "global"]);
        assert_eq!(local.pending(), 0);
    }

    #[test]
    fn test_root_cause_unwraps_child_failures() {
        let err = ContractError::ChildFailed {
            component: "outer".into(),
            source: Box::new(ContractError::ChildFailed {
                component: "inner".into(),
                source: Box::new(ContractError::EmptyTree),
            }),
        };
        assert_eq!(err.root_cause(), &ContractError::EmptyTree);
        assert!(err.to_string().starts_with("child `outer` failed"));
    }
}
