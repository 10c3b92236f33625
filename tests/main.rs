use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mockall::predicate;
use strata::Runtime;

mod mock;

use mock::{SharedMock, Spy};

#[test]
fn computed() {
	let rt = Runtime::new();
	let a = rt.signal(10u64);
	assert_eq!(rt.read(&a), 10);

	let b = rt.computed(move |cx| cx.read(&a) + 10);
	assert_eq!(rt.read(&b), 20);

	rt.write(&a, 20);
	assert_eq!(rt.read(&b), 30);
}

#[test]
fn change_suppression() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let a = rt.signal(1u64);

	mock.get().expect_trigger().times(1).return_const(());
	let b = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = cx.read(&a);
			mock.get().trigger(v);
			v + 1
		}
	});
	assert_eq!(rt.read(&b), 2);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	rt.write(&a, 2);
	rt.write(&a, 2);
	assert_eq!(rt.read(&b), 3);
	assert_eq!(rt.read(&b), 3);
	mock.get().checkpoint();
}

#[test]
fn diamond_glitch_free() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let r = rt.signal(1u64);
	let a = rt.computed(move |cx| cx.read(&r) + 1);
	let b = rt.computed(move |cx| cx.read(&r) + 2);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = cx.read(&a) + cx.read(&b);
			mock.get().trigger(v);
			v
		}
	});
	assert_eq!(rt.read(&c), 5);
	mock.get().checkpoint();

	// one evaluation, both inputs fresh: never 3 + 3 or 2 + 4
	mock.get()
		.expect_trigger()
		.with(predicate::eq(7u64))
		.times(1)
		.return_const(());
	rt.write(&r, 2);
	assert_eq!(rt.read(&c), 7);
	mock.get().checkpoint();
}

#[test]
fn lazy_pull() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let s = rt.signal(1u64);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = cx.read(&s);
			mock.get().trigger(v);
			v + 1
		}
	});
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	rt.write(&s, 2);
	rt.write(&s, 3);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	assert_eq!(rt.read(&c), 4);
	mock.get().checkpoint();
}

#[test]
fn stabilize_height_order() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let rt = Runtime::new();
	let log = Rc::new(RefCell::new(Vec::new()));
	let s = rt.signal(1u64);
	let a = rt.computed({
		let log = log.clone();
		move |cx| {
			log.borrow_mut().push("a");
			cx.read(&s) + 1
		}
	});
	let b = rt.computed({
		let log = log.clone();
		move |cx| {
			log.borrow_mut().push("b");
			cx.read(&a) + 1
		}
	});
	let c = rt.computed({
		let log = log.clone();
		move |cx| {
			log.borrow_mut().push("c");
			cx.read(&b) + cx.read(&a)
		}
	});
	log.borrow_mut().clear();

	rt.write(&s, 2);
	rt.stabilize();
	// dependencies settle strictly before dependents, each exactly once
	assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
	assert_eq!(rt.read(&c), 7);
	assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn batch_coalesces() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let s = rt.signal(1u64);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = cx.read(&s) * 10;
			mock.get().trigger(v);
			v
		}
	});
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	rt.batch(|| {
		rt.write(&s, 2);
		rt.write(&s, 3);
		rt.write(&s, 2);
	});
	assert_eq!(rt.peek(&c), 20);
	mock.get().checkpoint();
}

#[test]
fn dependency_pruning() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let flag = rt.signal(true);
	let x = rt.signal(10u64);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = if cx.read(&flag) { cx.read(&x) } else { 0 };
			mock.get().trigger(v);
			v
		}
	});
	assert_eq!(rt.read(&c), 10);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	rt.write(&flag, false);
	assert_eq!(rt.read(&c), 0);
	mock.get().checkpoint();

	// the x edge is gone: writes to x no longer reach c
	mock.get().expect_trigger().times(0).return_const(());
	rt.write(&x, 99);
	rt.stabilize();
	assert_eq!(rt.read(&c), 0);
	mock.get().checkpoint();
}

#[test]
fn disposal_cascade() {
	let rt = Runtime::new();
	let s = rt.signal(1u64);
	let inner = rt.computed(move |cx| cx.read(&s) + 1);
	let outer = rt.computed(move |cx| cx.read(&inner) * 2);
	assert_eq!(rt.read(&outer), 4);

	rt.dispose(outer.id());
	// inner lost its only subscriber and was torn down with it
	rt.write(&s, 10);
	rt.stabilize();
	assert_eq!(rt.read(&inner), 2);
	assert_eq!(rt.read(&outer), 4);

	rt.dispose(outer.id());
	assert_eq!(rt.read(&outer), 4);
}

#[test]
fn cleanup_ordering() {
	let rt = Runtime::new();
	let log = Rc::new(RefCell::new(Vec::new()));
	let s = rt.signal(1u64);
	let c = rt.computed({
		let log = log.clone();
		move |cx| {
			log.borrow_mut().push("body");
			cx.on_cleanup({
				let log = log.clone();
				move || log.borrow_mut().push("first")
			});
			cx.on_cleanup({
				let log = log.clone();
				move || log.borrow_mut().push("second")
			});
			cx.read(&s)
		}
	});
	assert_eq!(*log.borrow(), vec!["body"]);

	rt.write(&s, 2);
	assert_eq!(rt.read(&c), 2);
	assert_eq!(*log.borrow(), vec!["body", "first", "second", "body"]);

	rt.dispose(c.id());
	assert_eq!(
		*log.borrow(),
		vec!["body", "first", "second", "body", "first", "second"]
	);
}

#[test]
fn cleanup_outside_observer_is_noop() {
	let rt = Runtime::new();
	let fired = Rc::new(Cell::new(false));
	rt.on_cleanup({
		let fired = fired.clone();
		move || fired.set(true)
	});
	let s = rt.signal(1u64);
	rt.write(&s, 2);
	rt.stabilize();
	assert!(!fired.get());
}

#[test]
fn root_reads_are_untracked() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let tracked = rt.signal(1u64);
	let untracked = rt.signal(100u64);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let silent = cx.root(|cx| cx.read(&untracked));
			let v = cx.read(&tracked) + silent;
			mock.get().trigger(v);
			v
		}
	});
	assert_eq!(rt.read(&c), 101);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	rt.write(&untracked, 200);
	rt.stabilize();
	assert_eq!(rt.read(&c), 101);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	rt.write(&tracked, 2);
	assert_eq!(rt.read(&c), 202);
	mock.get().checkpoint();
}

#[test]
fn peek_does_not_track() {
	let rt = Runtime::new();
	let runs = Rc::new(Cell::new(0));
	let s = rt.signal(1u64);
	let t = rt.signal(2u64);
	let c = rt.computed({
		let runs = runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			cx.peek(&s) + cx.read(&t)
		}
	});
	assert_eq!(rt.read(&c), 3);
	assert_eq!(runs.get(), 1);

	rt.write(&s, 10);
	rt.stabilize();
	assert_eq!(runs.get(), 1);

	rt.write(&t, 3);
	assert_eq!(rt.read(&c), 13);
	assert_eq!(runs.get(), 2);
}

#[test]
fn nested_computed_first_dependency() {
	let rt = Runtime::new();
	let s = rt.signal(2u64);
	let outer = rt.computed(move |cx| {
		let doubled = cx.computed(move |cx| cx.read(&s) * 2);
		cx.read(&doubled) + 1
	});
	assert_eq!(rt.read(&outer), 5);

	rt.write(&s, 5);
	assert_eq!(rt.read(&outer), 11);
}

#[test]
fn nested_computed_after_first_dependency() {
	let rt = Runtime::new();
	let s = rt.signal(3u64);
	let outer = rt.computed(move |cx| {
		let base = cx.read(&s);
		let tripled = cx.computed(move |cx| cx.read(&s) * 3);
		base + cx.read(&tripled)
	});
	assert_eq!(rt.read(&outer), 12);

	rt.write(&s, 4);
	assert_eq!(rt.read(&outer), 16);
}

#[test]
fn panicking_recompute_keeps_previous_value() {
	let rt = Runtime::new();
	let s = rt.signal(1u64);
	let c = rt.computed(move |cx| {
		let v = cx.read(&s);
		if v == 13 {
			panic!("unlucky");
		}
		v * 10
	});
	assert_eq!(rt.read(&c), 10);

	rt.write(&s, 13);
	assert_eq!(rt.read(&c), 10);

	rt.write(&s, 2);
	assert_eq!(rt.read(&c), 20);
}

#[test]
fn update_in_place() {
	let rt = Runtime::new();
	let mock = SharedMock::new();
	let s = rt.signal(1u64);

	mock.get().expect_trigger().times(1).return_const(());
	let c = rt.computed({
		let mock = mock.clone();
		move |cx| {
			let v = cx.read(&s);
			mock.get().trigger(v);
			v
		}
	});
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	rt.update(&s, |v| *v += 1);
	assert_eq!(rt.read(&c), 2);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	rt.update(&s, |_| {});
	rt.stabilize();
	assert_eq!(rt.read(&c), 2);
	mock.get().checkpoint();
}

#[test]
fn kind_discriminators() {
	let rt = Runtime::new();
	let s = rt.signal(1u64);
	let c = rt.computed(move |cx| cx.read(&s));
	assert!(rt.is_signal(s.id()));
	assert!(!rt.is_computed(s.id()));
	assert!(rt.is_computed(c.id()));
	assert!(!rt.is_signal(c.id()));
}

#[test]
fn independent_runtimes() {
	let rt1 = Runtime::new();
	let rt2 = Runtime::new();
	let a = rt1.signal(1u64);
	let b = rt2.signal(2u64);
	assert_eq!(rt1.read(&a), 1);
	assert_eq!(rt2.read(&b), 2);
	rt1.write(&a, 5);
	assert_eq!(rt1.read(&a), 5);
	assert_eq!(rt2.read(&b), 2);
}
