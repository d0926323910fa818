use std::time::{Duration, Instant};

use crate::{
    declare_blocking, declare_nonblocking, new_blocking_aware_pool, new_fixed_pool, reply_handle,
    value, JoinDefinition, Matcher, OutputPattern, OutputShape, ReactionBuilder,
};

fn pools() -> (std::sync::Arc<dyn crate::ThreadPoolContract>, std::sync::Arc<dyn crate::ThreadPoolContract>) {
    (new_fixed_pool(2), new_blocking_aware_pool(2))
}

#[test]
fn counter_fetch_returns_final_value() {
    let counter = declare_nonblocking::<i64>("counter");
    let decr = declare_nonblocking::<()>("decr");
    let fetch = declare_blocking::<(), i64>("fetch");
    // Tracks decrements still owed; guards `r_fetch` off until `r_decr` has
    // drained it to zero, so the scenario can't race fetch ahead of a decr.
    let pending = declare_nonblocking::<i64>("pending");

    let fetch_reply = fetch.clone();
    let counter_reply = counter.clone();
    let r_fetch = ReactionBuilder::new()
        .input(counter.var("n"))
        .input(fetch.wildcard())
        .input(pending.var("p"))
        .guard(|b| *value::<i64>(b, 3) == 0)
        .output(OutputPattern::new(counter.id().clone(), OutputShape::PassThrough, "counter(n)"))
        .body(move |b| {
            let n = *value::<i64>(&b, 0);
            counter_reply.emit(n).unwrap();
            reply_handle::<i64>(&b, 2).reply(n);
        });

    let counter_decr = counter.clone();
    let pending_decr = pending.clone();
    let r_decr = ReactionBuilder::new()
        .input(counter.var("n"))
        .input(decr.wildcard())
        .input(pending.var("p"))
        .guard(|b| *value::<i64>(b, 2) > 0)
        .output(OutputPattern::new(counter.id().clone(), OutputShape::Fresh, "counter(n-1)"))
        .body(move |b| {
            let n = *value::<i64>(&b, 0);
            let p = *value::<i64>(&b, 2);
            counter_decr.emit(n - 1).unwrap();
            pending_decr.emit(p - 1).unwrap();
        });

    let (decision_pool, reaction_pool) = pools();
    let (_jdef, result) =
        JoinDefinition::activate(vec![r_fetch, r_decr], decision_pool, reaction_pool).unwrap();
    assert!(result.errors.is_empty());

    counter.emit(3).unwrap();
    pending.emit(3).unwrap();
    decr.emit(()).unwrap();
    decr.emit(()).unwrap();
    decr.emit(()).unwrap();

    let answer = fetch_reply.emit((), Some(Duration::from_secs(2))).unwrap();
    assert_eq!(answer, Some(0));
}

#[test]
fn map_reduce_sum_of_squares() {
    let carrier = declare_nonblocking::<i64>("carrier");
    let interm = declare_nonblocking::<i64>("interm");
    let accum = declare_nonblocking::<(i64, i64)>("accum");
    let fetch = declare_blocking::<(), i64>("fetch");

    let interm_for_square = interm.clone();
    let r_square = ReactionBuilder::new().input(carrier.var("a")).body(move |b| {
        let a = *value::<i64>(&b, 0);
        interm_for_square.emit(a * a).unwrap();
    });

    let accum_for_reduce = accum.clone();
    let r_accum = ReactionBuilder::new()
        .input(interm.var("a2"))
        .input(accum.var("acc"))
        .body(move |b| {
            let a2 = *value::<i64>(&b, 0);
            let acc = *value::<(i64, i64)>(&b, 1);
            accum_for_reduce.emit((acc.0 + a2, acc.1 + 1)).unwrap();
        });

    let r_fetch = ReactionBuilder::new()
        .input(accum.var("acc"))
        .input(fetch.wildcard())
        .guard(|b| value::<(i64, i64)>(b, 0).1 == 100)
        .body(move |b| {
            let acc = *value::<(i64, i64)>(&b, 0);
            reply_handle::<i64>(&b, 2).reply(acc.0);
        });

    let (decision_pool, reaction_pool) = pools();
    let (_jdef, result) =
        JoinDefinition::activate(vec![r_square, r_accum, r_fetch], decision_pool, reaction_pool)
            .unwrap();
    assert!(result.errors.is_empty());

    accum.emit((0, 0)).unwrap();
    for n in 1..=100 {
        carrier.emit(n).unwrap();
    }

    let total = fetch.emit((), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(total, Some(338_350));
}

#[test]
fn shadowing_is_rejected_at_activation() {
    let a = declare_nonblocking::<()>("a");
    let b = declare_nonblocking::<()>("b");

    let r1 = ReactionBuilder::new().input(a.wildcard()).body(|_| {});
    let r2 = ReactionBuilder::new()
        .input(a.wildcard())
        .input(b.wildcard())
        .body(|_| {});

    let (decision_pool, reaction_pool) = pools();
    let err = JoinDefinition::activate(vec![r1, r2], decision_pool, reaction_pool).unwrap_err();
    assert!(err.to_string().contains("Unavoidable indeterminism"));
}

#[test]
fn unavoidable_livelock_is_rejected_at_activation() {
    let a = declare_nonblocking::<i32>("a");
    let b = declare_nonblocking::<i32>("b");

    let b_for_body = b.clone();
    let a_for_body = a.clone();
    let r = ReactionBuilder::new()
        .input(a.constant(1))
        .input(b.wildcard())
        .output(OutputPattern::new(b.id().clone(), OutputShape::Fresh, "b(1)"))
        .output(OutputPattern::new(b.id().clone(), OutputShape::Fresh, "b(2)"))
        .output(OutputPattern::new(
            a.id().clone(),
            OutputShape::Constant(Matcher::constant("1", 1_i32).content_hash()),
            "a(1)",
        ))
        .body(move |_| {
            b_for_body.emit(1).unwrap();
            b_for_body.emit(2).unwrap();
            a_for_body.emit(1).unwrap();
        });

    let (decision_pool, reaction_pool) = pools();
    let err = JoinDefinition::activate(vec![r], decision_pool, reaction_pool).unwrap_err();
    assert!(err.to_string().contains("Unavoidable livelock"));
}

#[test]
fn possible_deadlock_is_reported_across_definitions() {
    let f = declare_blocking::<(), i32>("f");
    let a = declare_nonblocking::<i32>("a");
    let c = declare_nonblocking::<()>("c");

    let a_for_first = a.clone();
    let first = ReactionBuilder::new()
        .input(f.wildcard())
        .input(a.wildcard())
        .output(OutputPattern::new(a.id().clone(), OutputShape::Fresh, "a(1)"))
        .body(move |b| {
            reply_handle::<i32>(&b, 1).reply(0);
            a_for_first.emit(1).unwrap();
        });

    let (dp1, rp1) = pools();
    let (_jdef1, result1) = JoinDefinition::activate(vec![first], dp1, rp1).unwrap();
    assert!(result1.errors.is_empty());

    let f_for_second = f.clone();
    let a_for_second = a.clone();
    let second = ReactionBuilder::new()
        .input(c.wildcard())
        .output(OutputPattern::new(f.id().clone(), OutputShape::Fresh, "f()"))
        .output(OutputPattern::new(a.id().clone(), OutputShape::Fresh, "a(1)"))
        .body(move |_| {
            let _ = f_for_second.emit((), Some(Duration::from_millis(10)));
            a_for_second.emit(1).unwrap();
        });

    let (dp2, rp2) = pools();
    let (_jdef2, result2) = JoinDefinition::activate(vec![second], dp2, rp2).unwrap();
    assert!(result2
        .warnings
        .iter()
        .any(|w| w.contains("Possible deadlock: molecule f")));
}

#[test]
fn blocking_emit_times_out_with_no_consumer() {
    let f = declare_blocking::<(), String>("unconsumed");
    // Bound, but its guard never passes: no reaction actually fires for it.
    let r = ReactionBuilder::new()
        .input(f.wildcard())
        .guard(|_| false)
        .body(|_| {});

    let (decision_pool, reaction_pool) = pools();
    JoinDefinition::activate(vec![r], decision_pool, reaction_pool).unwrap();

    let start = Instant::now();
    let outcome = f.emit((), Some(Duration::from_millis(50))).unwrap();
    assert_eq!(outcome, None);
    assert!(start.elapsed() >= Duration::from_millis(50));

    // A separate, properly consumed molecule is unaffected by the timeout above.
    let g = declare_blocking::<(), String>("consumed");
    let r_consume = ReactionBuilder::new().input(g.wildcard()).body(|b| {
        reply_handle::<String>(&b, 1).reply("ok".to_string());
    });
    let (decision_pool, reaction_pool) = pools();
    JoinDefinition::activate(vec![r_consume], decision_pool, reaction_pool).unwrap();
    let ok = g.emit((), Some(Duration::from_secs(1))).unwrap();
    assert_eq!(ok, Some("ok".to_string()));
}
