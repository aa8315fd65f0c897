#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::registry::SubscriptionRegistry;
    use crate::{Broker, Callback, CloneOnWrite, Subscription};

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Counter {
        count: i64,
        step: i64,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct StepWriter {
        step: i64,
    }

    #[derive(Clone, Copy)]
    enum Action {
        Increment,
        SetStep(i64),
        Noop,
    }

    fn counter_broker() -> Broker<Counter, Action, StepWriter> {
        Broker::with_writer(
            Counter { count: 0, step: 1 },
            |emit, prev: &Counter, action| match action {
                Action::Increment => {
                    emit.emit("count");
                    Counter {
                        count: prev.count + prev.step,
                        ..*prev
                    }
                }
                Action::SetStep(step) => {
                    emit.emit("step");
                    Counter { step, ..*prev }
                }
                Action::Noop => *prev,
            },
            |s| StepWriter { step: s.step },
        )
    }

    fn spy<S: Clone + 'static>() -> (Rc<RefCell<Vec<S>>>, Callback<S>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let cb: Callback<S> = {
            let seen = seen.clone();
            Rc::new(move |s: &S| seen.borrow_mut().push(s.clone()))
        };
        (seen, cb)
    }

    #[test]
    fn subscribe_bootstraps_once_before_any_transition() {
        env_logger::builder().is_test(true).try_init().ok();
        let broker = counter_broker();
        let (seen, cb) = spy::<Counter>();

        // three ids, still exactly one synchronous bootstrap call
        broker.subscribe(["count", "step", "other"], cb);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], Counter { count: 0, step: 1 });
    }

    #[test]
    fn duplicate_registration_delivers_twice() {
        let broker = counter_broker();
        let (seen, cb) = spy::<Counter>();

        broker.subscribe(["count"], cb.clone());
        broker.subscribe(["count"], cb);
        assert_eq!(seen.borrow().len(), 2); // one bootstrap per subscribe call
        broker.dispatch(Action::Increment);
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn repeated_emits_notify_once_per_transition() {
        let broker = Broker::new(0i64, |emit, prev: &i64, _: ()| {
            emit.emit("value");
            emit.emit("value");
            emit.emit("value");
            prev + 1
        });
        let (seen, cb) = spy::<i64>();
        broker.subscribe(["value"], cb);

        broker.dispatch(());
        assert_eq!(*seen.borrow(), vec![0, 1]);
    }

    #[test]
    fn disjoint_subscribers_stay_silent() {
        let broker = counter_broker();
        let (count_seen, count_cb) = spy::<Counter>();
        let (other_seen, other_cb) = spy::<Counter>();

        broker.subscribe(["count"], count_cb);
        broker.subscribe(["other"], other_cb);

        broker.dispatch(Action::Increment);
        broker.dispatch(Action::Increment);

        assert_eq!(count_seen.borrow().len(), 3); // bootstrap + 2 transitions
        assert_eq!(other_seen.borrow().len(), 1); // bootstrap only
        assert_eq!(count_seen.borrow()[2].count, 2);
    }

    #[test]
    fn counter_scenario() {
        let broker = counter_broker();
        let (count_seen, count_cb) = spy::<Counter>();

        broker.subscribe(["count"], count_cb);
        assert_eq!(count_seen.borrow()[0].count, 0);

        broker.dispatch(Action::Increment);
        assert_eq!(count_seen.borrow()[1].count, 1);

        let (other_seen, other_cb) = spy::<Counter>();
        broker.subscribe(["other"], other_cb);
        broker.dispatch(Action::Increment);

        assert_eq!(other_seen.borrow().len(), 1);
        assert_eq!(count_seen.borrow()[2].count, 2);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_final() {
        let broker = counter_broker();
        let (seen, cb) = spy::<Counter>();

        broker.subscribe(["count"], cb.clone());
        broker.unsubscribe(["count"], &cb);
        broker.unsubscribe(["count"], &cb); // second removal: clean no-op
        assert_eq!(broker.subscriber_count("count"), 0);

        broker.dispatch(Action::Increment);
        assert_eq!(seen.borrow().len(), 1); // bootstrap only
    }

    #[test]
    fn resubscribe_bootstraps_with_latest_snapshot() {
        let broker = counter_broker();
        let (seen, cb) = spy::<Counter>();

        broker.subscribe(["count"], cb.clone());
        broker.unsubscribe(["count"], &cb);
        broker.dispatch(Action::Increment);
        broker.dispatch(Action::Increment);

        broker.subscribe(["count"], cb);
        assert_eq!(seen.borrow().last().unwrap().count, 2);
    }

    #[test]
    fn commit_without_emits_skips_notify_but_updates_snapshot() {
        let broker = counter_broker();
        let (seen, cb) = spy::<Counter>();
        broker.subscribe(["count"], cb);

        let v = broker.state_version();
        broker.dispatch(Action::Noop);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(broker.state_version(), v + 1);
    }

    #[test]
    fn writer_version_stable_across_state_only_transitions() {
        let broker = counter_broker();
        let wv = broker.writer_version();

        broker.dispatch(Action::Increment);
        broker.dispatch(Action::Increment);
        assert_eq!(broker.writer_version(), wv);
        assert_eq!(broker.state_version(), 2);

        broker.dispatch(Action::SetStep(5));
        assert_eq!(broker.writer_version(), wv + 1);
        assert_eq!(broker.writer(), StepWriter { step: 5 });
    }

    #[test]
    fn self_unregistration_completes_the_current_pass() {
        let broker = counter_broker();

        let (first_seen, first_cb) = spy::<Counter>();
        broker.subscribe(["count"], first_cb);

        // removes itself from inside its own notification (call 2; call 1 is
        // the bootstrap); needs its own handle
        let slot: Rc<RefCell<Option<Callback<Counter>>>> = Rc::new(RefCell::new(None));
        let fired = Rc::new(RefCell::new(0usize));
        let self_removing: Callback<Counter> = {
            let broker = broker.clone();
            let slot = slot.clone();
            let fired = fired.clone();
            Rc::new(move |_| {
                *fired.borrow_mut() += 1;
                if *fired.borrow() >= 2
                    && let Some(me) = slot.borrow().clone()
                {
                    broker.unsubscribe(["count"], &me);
                }
            })
        };
        *slot.borrow_mut() = Some(self_removing.clone());

        let (last_seen, last_cb) = spy::<Counter>();
        broker.subscribe(["count"], self_removing);
        broker.subscribe(["count"], last_cb);

        broker.dispatch(Action::Increment);
        // everyone ran this pass, including the callback after the remover
        assert_eq!(first_seen.borrow().len(), 2);
        assert_eq!(*fired.borrow(), 2); // bootstrap + this pass
        assert_eq!(last_seen.borrow().len(), 2);

        broker.dispatch(Action::Increment);
        assert_eq!(*fired.borrow(), 2); // removal took effect from here on
        assert_eq!(last_seen.borrow().len(), 3);
    }

    #[test]
    fn registration_during_notify_misses_the_current_pass() {
        let broker = counter_broker();
        let (late_seen, late_cb) = spy::<Counter>();

        // registers the late callback from inside a notify pass (call 2;
        // call 1 is its own bootstrap)
        let registering: Callback<Counter> = {
            let broker = broker.clone();
            let late_cb = late_cb.clone();
            let calls = RefCell::new(0usize);
            Rc::new(move |_| {
                *calls.borrow_mut() += 1;
                if *calls.borrow() == 2 {
                    broker.subscribe(["count"], late_cb.clone());
                }
            })
        };
        broker.subscribe(["count"], registering);

        broker.dispatch(Action::Increment);
        // bootstrapped inside the pass, but not notified by it
        assert_eq!(late_seen.borrow().len(), 1);

        broker.dispatch(Action::Increment);
        assert_eq!(late_seen.borrow().len(), 2);
    }

    #[test]
    fn late_emit_is_dropped() {
        let stash: Rc<RefCell<Option<crate::Emit>>> = Rc::new(RefCell::new(None));
        let broker = Broker::new(0i64, {
            let stash = stash.clone();
            move |emit: &crate::Emit, prev: &i64, _: ()| {
                *stash.borrow_mut() = Some(emit.clone());
                emit.emit("value");
                prev + 1
            }
        });
        let (seen, cb) = spy::<i64>();
        broker.subscribe(["value"], cb);

        broker.dispatch(());
        assert_eq!(seen.borrow().len(), 2);

        // the transition is over; this must be ignored, not queued
        stash.borrow().as_ref().unwrap().emit("value");
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    #[should_panic(expected = "dispatch during an active transition")]
    fn reentrant_dispatch_from_notification_fails_fast() {
        let broker = Broker::new(0i64, |emit, prev: &i64, _: ()| {
            emit.emit("value");
            prev + 1
        });
        let cb: Callback<i64> = {
            let broker = broker.clone();
            // skip the bootstrap call (snapshot is still 0 there)
            Rc::new(move |s: &i64| {
                if *s > 0 {
                    broker.dispatch(());
                }
            })
        };
        broker.subscribe(["value"], cb);
        broker.dispatch(());
    }

    #[test]
    #[should_panic(expected = "dispatch during an active transition")]
    fn dispatch_from_bootstrap_callback_fails_fast() {
        let broker = Broker::new(0i64, |emit, prev: &i64, _: ()| {
            emit.emit("value");
            prev + 1
        });
        let cb: Callback<i64> = {
            let broker = broker.clone();
            Rc::new(move |_| broker.dispatch(()))
        };
        broker.subscribe(["value"], cb);
    }

    #[test]
    #[should_panic(expected = "update during an active update")]
    fn reentrant_update_fails_fast() {
        let sub = Subscription::new(0i64);
        let cb: Callback<i64> = {
            let sub = sub.clone();
            Rc::new(move |s: &i64| {
                if *s > 0 {
                    sub.update(|emit, prev| {
                        emit.emit("value");
                        prev + 1
                    });
                }
            })
        };
        sub.subscribe(["value"], cb);
        sub.update(|emit, prev| {
            emit.emit("value");
            prev + 1
        });
    }

    #[test]
    #[should_panic(expected = "update during an active update")]
    fn update_from_bootstrap_callback_fails_fast() {
        let sub = Subscription::new(0i64);
        let cb: Callback<i64> = {
            let sub = sub.clone();
            Rc::new(move |_| {
                sub.update(|emit, prev| {
                    emit.emit("value");
                    prev + 1
                });
            })
        };
        sub.subscribe(["value"], cb);
    }

    #[test]
    fn producer_panic_leaves_prior_snapshot_authoritative() {
        let broker = Broker::new(7i64, |emit, prev: &i64, boom: bool| {
            if boom {
                panic!("producer failure");
            }
            emit.emit("value");
            prev + 1
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            broker.dispatch(true);
        }));
        assert!(result.is_err());
        assert_eq!(broker.snapshot(), 7);
        assert_eq!(broker.state_version(), 0);

        // the engine recovered; a clean transition still works
        broker.dispatch(false);
        assert_eq!(broker.snapshot(), 8);
    }

    #[test]
    fn reducer_variant_shares_unchanged_substructure() {
        #[derive(Clone)]
        struct AppState {
            count: i64,
            config: Rc<Vec<String>>,
        }

        let broker: Broker<AppState, i64, ()> = Broker::with_reducer(
            AppState {
                count: 0,
                config: Rc::new(vec!["a".into()]),
            },
            CloneOnWrite,
            |draft, delta, emit| {
                draft.count += delta;
                emit.emit("count");
            },
            |_| (),
        );

        let before = broker.with_state(|s| s.config.clone());
        broker.dispatch(3);
        assert_eq!(broker.with_state(|s| s.count), 3);
        // untouched Rc substructure is shared, not copied
        assert!(broker.with_state(|s| Rc::ptr_eq(&s.config, &before)));
    }

    #[test]
    fn registry_removes_by_identity_not_value() {
        let registry: SubscriptionRegistry<i64> = SubscriptionRegistry::new();
        let a: Callback<i64> = Rc::new(|_| {});
        let b: Callback<i64> = Rc::new(|_| {});

        registry.insert("x", a.clone());
        registry.insert("x", b.clone());
        registry.remove("x", &b);
        assert_eq!(registry.count("x"), 1);
        registry.remove("x", &b);
        assert_eq!(registry.count("x"), 1);
        registry.remove("x", &a);
        assert_eq!(registry.count("x"), 0);
    }

    #[test]
    fn single_writer_subscription_variant() {
        let sub = Subscription::new(Counter { count: 0, step: 2 });
        let (seen, cb) = spy::<Counter>();
        sub.subscribe(["count"], cb);
        assert_eq!(seen.borrow().len(), 1);

        sub.update(|emit, prev| {
            emit.emit("count");
            emit.emit("count");
            Counter {
                count: prev.count + prev.step,
                ..*prev
            }
        });
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].count, 2);
        assert_eq!(sub.version(), 1);
    }

    mod shared {
        use std::sync::{Arc, Mutex};

        use crate::sync::{SharedCallback, SharedSubscription};

        #[test]
        fn updates_from_another_thread_notify_subscribers() {
            let sub = SharedSubscription::new(0i64);
            let seen = Arc::new(Mutex::new(Vec::new()));
            let cb: SharedCallback<i64> = {
                let seen = seen.clone();
                Arc::new(move |s: &i64| seen.lock().unwrap().push(*s))
            };
            sub.subscribe(["value"], cb.clone());

            let worker = {
                let sub = sub.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        sub.update(|emit, prev| {
                            emit.emit("value");
                            emit.emit("value"); // deduped per transition
                            prev + 1
                        });
                    }
                })
            };
            worker.join().unwrap();

            assert_eq!(sub.snapshot(), 10);
            assert_eq!(sub.version(), 10);
            // bootstrap + one notification per transition
            assert_eq!(seen.lock().unwrap().len(), 11);

            sub.unsubscribe(["value"], &cb);
            sub.update(|emit, prev| {
                emit.emit("value");
                prev + 1
            });
            assert_eq!(seen.lock().unwrap().len(), 11);
        }

        #[test]
        fn transitions_serialize_across_threads() {
            let sub = SharedSubscription::new(0i64);
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let sub = sub.clone();
                    std::thread::spawn(move || {
                        for _ in 0..250 {
                            sub.update(|emit, prev| {
                                emit.emit("value");
                                prev + 1
                            });
                        }
                    })
                })
                .collect();
            for w in workers {
                w.join().unwrap();
            }
            // no lost updates under the transition mutex
            assert_eq!(sub.snapshot(), 1000);
        }
    }
}
