use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::scheduler::{self, Tick};
use crate::{Dispose, Observer, Stream, StreamError};

impl<T: Clone + 'static> Stream<T> {
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Stream<U> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<U>| {
            let f = f.clone();
            src.subscribe(Observer::relay(&down, move |down, v| down.next(f(v))))
        })
    }

    /// Like [`Stream::map`], but an `Err` ends the stream with that error.
    pub fn try_map<U: Clone + 'static>(
        &self,
        f: impl Fn(T) -> Result<U, StreamError> + 'static,
    ) -> Stream<U> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<U>| {
            let f = f.clone();
            src.subscribe(Observer::relay(&down, move |down, v| match f(v) {
                Ok(u) => down.next(u),
                Err(e) => down.error(e),
            }))
        })
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool + 'static) -> Stream<T> {
        let src = self.clone();
        let pred = Rc::new(pred);
        Stream::new(move |down: Observer<T>| {
            let pred = pred.clone();
            src.subscribe(Observer::relay(&down, move |down, v| {
                if pred(&v) {
                    down.next(v)
                }
            }))
        })
    }

    pub fn filter_map<U: Clone + 'static>(&self, f: impl Fn(T) -> Option<U> + 'static) -> Stream<U> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<U>| {
            let f = f.clone();
            src.subscribe(Observer::relay(&down, move |down, v| {
                if let Some(u) = f(v) {
                    down.next(u)
                }
            }))
        })
    }

    /// Side effect per value; values pass through untouched.
    pub fn tap(&self, f: impl Fn(&T) + 'static) -> Stream<T> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<T>| {
            let f = f.clone();
            src.subscribe(Observer::relay(&down, move |down, v| {
                f(&v);
                down.next(v)
            }))
        })
    }

    pub fn start_with(&self, first: T) -> Stream<T> {
        let src = self.clone();
        Stream::new(move |down: Observer<T>| {
            down.next(first.clone());
            if down.is_closed() {
                return Dispose::noop();
            }
            src.subscribe(Observer::relay(&down, |down, v| down.next(v)))
        })
    }

    /// Emits the accumulator after each value (the seed itself is not emitted).
    pub fn scan<S: Clone + 'static>(&self, seed: S, f: impl Fn(&S, T) -> S + 'static) -> Stream<S> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<S>| {
            let acc = RefCell::new(seed.clone());
            let f = f.clone();
            src.subscribe(Observer::relay(&down, move |down, v| {
                let next = f(&acc.borrow(), v);
                *acc.borrow_mut() = next.clone();
                down.next(next)
            }))
        })
    }

    /// Shift values and completion `ticks` later on the virtual clock.
    pub fn delay(&self, ticks: Tick) -> Stream<T> {
        let src = self.clone();
        Stream::new(move |down: Observer<T>| {
            let timers: Rc<RefCell<Vec<Dispose>>> = Rc::default();
            let (t1, t2) = (timers.clone(), timers.clone());
            let (d1, d2, d3) = (down.clone(), down.clone(), down.clone());
            let upstream = src.subscribe(Observer::new(
                move |v| {
                    let d = d1.clone();
                    let h = scheduler::schedule_after(ticks, move || d.next(v));
                    t1.borrow_mut().push(h);
                },
                move |e| d2.error(e),
                move || {
                    let d = d3.clone();
                    let h = scheduler::schedule_after(ticks, move || d.complete());
                    t2.borrow_mut().push(h);
                },
            ));
            Dispose::new(move || {
                upstream.run();
                let pending = std::mem::take(&mut *timers.borrow_mut());
                for h in pending {
                    h.run();
                }
            })
        })
    }

    /// Interleave all inputs; completes once every input has completed.
    pub fn merge(streams: Vec<Stream<T>>) -> Stream<T> {
        let streams: Rc<[Stream<T>]> = streams.into();
        Stream::new(move |down: Observer<T>| {
            if streams.is_empty() {
                down.complete();
                return Dispose::noop();
            }
            let remaining = Rc::new(Cell::new(streams.len()));
            let handles: Vec<Dispose> = streams
                .iter()
                .map(|s| {
                    let (d1, d2, d3) = (down.clone(), down.clone(), down.clone());
                    let remaining = remaining.clone();
                    s.subscribe(Observer::new(
                        move |v| d1.next(v),
                        move |e| d2.error(e),
                        move || {
                            remaining.set(remaining.get() - 1);
                            if remaining.get() == 0 {
                                d3.complete()
                            }
                        },
                    ))
                })
                .collect();
            Dispose::all(handles)
        })
    }

    /// Emits the latest value of every input once all have emitted, and again
    /// on every later value. An input that completes without ever emitting
    /// completes the result, so joins never hang on a dead input.
    pub fn combine_latest(streams: Vec<Stream<T>>) -> Stream<Vec<T>> {
        let streams: Rc<[Stream<T>]> = streams.into();
        Stream::new(move |down: Observer<Vec<T>>| {
            let n = streams.len();
            if n == 0 {
                down.complete();
                return Dispose::noop();
            }
            let latest: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; n]));
            let remaining = Rc::new(Cell::new(n));
            let handles: Vec<Dispose> = streams
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let (d1, d2, d3) = (down.clone(), down.clone(), down.clone());
                    let (l1, l2) = (latest.clone(), latest.clone());
                    let remaining = remaining.clone();
                    s.subscribe(Observer::new(
                        move |v| {
                            let snapshot = {
                                let mut l = l1.borrow_mut();
                                l[i] = Some(v);
                                if l.iter().all(Option::is_some) {
                                    Some(l.iter().flatten().cloned().collect::<Vec<T>>())
                                } else {
                                    None
                                }
                            };
                            if let Some(values) = snapshot {
                                d1.next(values)
                            }
                        },
                        move |e| d2.error(e),
                        move || {
                            let had_value = l2.borrow()[i].is_some();
                            remaining.set(remaining.get() - 1);
                            if !had_value || remaining.get() == 0 {
                                d3.complete()
                            }
                        },
                    ))
                })
                .collect();
            Dispose::all(handles)
        })
    }

    /// Pair each value with the latest value of `other`. Values arriving
    /// before `other` has emitted are dropped.
    pub fn with_latest_from<U: Clone + 'static>(&self, other: &Stream<U>) -> Stream<(T, U)> {
        let src = self.clone();
        let other = other.clone();
        Stream::new(move |down: Observer<(T, U)>| {
            let latest: Rc<RefCell<Option<U>>> = Rc::default();
            let l1 = latest.clone();
            let d_err = down.clone();
            let side = other.subscribe(Observer::new(
                move |u| *l1.borrow_mut() = Some(u),
                move |e| d_err.error(e),
                || {},
            ));
            let main = src.subscribe(Observer::relay(&down, move |down, v| {
                let u = latest.borrow().clone();
                if let Some(u) = u {
                    down.next((v, u))
                }
            }));
            Dispose::all([main, side])
        })
    }

    /// Map each value to a stream and mirror only the most recent one. The
    /// previous inner subscription is torn down *before* the next one is
    /// subscribed, so two inners never interleave.
    pub fn switch_map<U: Clone + 'static>(&self, f: impl Fn(T) -> Stream<U> + 'static) -> Stream<U> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<U>| {
            let state = Rc::new(SwitchState::default());
            let f = f.clone();

            let st = state.clone();
            let d_next = down.clone();
            let on_next = move |v: T| {
                let old = st.current.borrow_mut().take();
                if let Some(old) = old {
                    old.run();
                }
                let generation = st.generation.get() + 1;
                st.generation.set(generation);
                st.inner_active.set(true);

                let (d1, d2, d3) = (d_next.clone(), d_next.clone(), d_next.clone());
                let (s1, s2, s3) = (st.clone(), st.clone(), st.clone());
                let handle = f(v).subscribe(Observer::new(
                    move |u| {
                        if s1.generation.get() == generation {
                            d1.next(u)
                        }
                    },
                    move |e| {
                        if s2.generation.get() == generation {
                            d2.error(e)
                        }
                    },
                    move || {
                        if s3.generation.get() == generation {
                            s3.inner_active.set(false);
                            if s3.outer_done.get() {
                                d3.complete()
                            }
                        }
                    },
                ));
                if st.generation.get() == generation {
                    *st.current.borrow_mut() = Some(handle);
                } else {
                    // a newer value arrived re-entrantly while subscribing
                    handle.run();
                }
            };

            let d_err = down.clone();
            let d_done = down.clone();
            let st_done = state.clone();
            let outer = src.subscribe(Observer::new(
                on_next,
                move |e| d_err.error(e),
                move || {
                    st_done.outer_done.set(true);
                    if !st_done.inner_active.get() {
                        d_done.complete()
                    }
                },
            ));

            Dispose::new(move || {
                outer.run();
                let current = state.current.borrow_mut().take();
                if let Some(current) = current {
                    current.run();
                }
            })
        })
    }

    /// Map each value to a stream and merge all of them.
    pub fn flat_map<U: Clone + 'static>(&self, f: impl Fn(T) -> Stream<U> + 'static) -> Stream<U> {
        let src = self.clone();
        let f = Rc::new(f);
        Stream::new(move |down: Observer<U>| {
            let active = Rc::new(Cell::new(0usize));
            let outer_done = Rc::new(Cell::new(false));
            let inners: Rc<RefCell<Vec<Dispose>>> = Rc::default();
            let f = f.clone();

            let (a1, o1, i1, d_next) = (active.clone(), outer_done.clone(), inners.clone(), down.clone());
            let on_next = move |v: T| {
                a1.set(a1.get() + 1);
                let (d1, d2, d3) = (d_next.clone(), d_next.clone(), d_next.clone());
                let (a, o) = (a1.clone(), o1.clone());
                let handle = f(v).subscribe(Observer::new(
                    move |u| d1.next(u),
                    move |e| d2.error(e),
                    move || {
                        a.set(a.get() - 1);
                        if o.get() && a.get() == 0 {
                            d3.complete()
                        }
                    },
                ));
                i1.borrow_mut().push(handle);
            };

            let (d_err, d_done) = (down.clone(), down.clone());
            let (a2, o2) = (active.clone(), outer_done.clone());
            let outer = src.subscribe(Observer::new(
                on_next,
                move |e| d_err.error(e),
                move || {
                    o2.set(true);
                    if a2.get() == 0 {
                        d_done.complete()
                    }
                },
            ));

            Dispose::new(move || {
                outer.run();
                let pending = std::mem::take(&mut *inners.borrow_mut());
                for h in pending {
                    h.run();
                }
            })
        })
    }
}

#[derive(Default)]
struct SwitchState {
    current: RefCell<Option<Dispose>>,
    generation: Cell<u64>,
    inner_active: Cell<bool>,
    outer_done: Cell<bool>,
}
