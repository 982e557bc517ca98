//! End-to-end command scenarios: status transitions seen by a bound view,
//! error capture, and overlapping async executions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::block_on;
use ftui_state::{
    ActionPanic, ChangeNotifier, Command, CommandStatus, Listenable, Listener, Observable,
    Outcome,
};

type StateLog = Rc<RefCell<Vec<(CommandStatus, Option<&'static str>)>>>;

/// Bind a recorder the way a view adapter would: one redraw listener that
/// reads the whole command state on every notification.
fn bind<T: 'static, A: 'static, E: 'static>(command: &Command<T, A, E>) -> (Listener, StateLog) {
    let log: StateLog = Rc::default();
    let redraw = {
        let log = Rc::clone(&log);
        let command = command.clone();
        Listener::new(move || {
            let state = command.snapshot();
            let result = state
                .result
                .map(|r| if r.is_success() { "success" } else { "failure" });
            log.borrow_mut().push((state.status, result));
        })
    };
    command.add_listener(&redraw);
    (redraw, log)
}

/// A one-shot gate an async action can wait on.
fn gate() -> (oneshot::Sender<()>, Rc<RefCell<Option<oneshot::Receiver<()>>>>) {
    let (tx, rx) = oneshot::channel();
    (tx, Rc::new(RefCell::new(Some(rx))))
}

#[derive(Debug)]
enum SaveError {
    Boom(Rc<String>),
    Panicked(ActionPanic),
}

impl From<ActionPanic> for SaveError {
    fn from(panic: ActionPanic) -> Self {
        Self::Panicked(panic)
    }
}

#[test]
fn success_run_reports_running_then_done() {
    let command: Command<&str> = Command::new(|()| Outcome::success("ok"));
    let (_redraw, log) = bind(&command);

    block_on(command.run());

    assert_eq!(
        *log.borrow(),
        vec![
            (CommandStatus::Running, None),
            (CommandStatus::Done, Some("success")),
        ]
    );
    let result = command.result().unwrap();
    assert!(result.is_success());
    assert_eq!(result.value(), Some(&"ok"));
}

#[test]
fn failing_action_keeps_the_exact_error() {
    let boom = Rc::new(String::from("boom"));
    let command: Command<(), (), SaveError> = {
        let boom = Rc::clone(&boom);
        Command::new(move |()| Outcome::failure(SaveError::Boom(Rc::clone(&boom))))
    };
    let (_redraw, log) = bind(&command);

    block_on(command.run());

    assert_eq!(command.status(), CommandStatus::Done);
    let result = command.result().unwrap();
    assert!(result.is_failure());
    match result.error() {
        Some(SaveError::Boom(error)) => assert!(Rc::ptr_eq(error, &boom)),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(log.borrow().last(), Some(&(CommandStatus::Done, Some("failure"))));
}

#[test]
fn panicking_action_keeps_the_raw_payload() {
    #[derive(Debug, PartialEq)]
    struct Token(u32);

    let command: Command<(), (), SaveError> =
        Command::new(|()| std::panic::panic_any(Token(7)));

    block_on(command.run());

    assert_eq!(command.status(), CommandStatus::Done);
    let result = command.result().unwrap();
    match result.error() {
        Some(SaveError::Panicked(panic)) => {
            assert_eq!(panic.payload().downcast_ref::<Token>(), Some(&Token(7)));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn overlapping_executes_run_the_action_once() {
    let (open, rx) = gate();
    let calls = Rc::new(Cell::new(0u32));
    let command: Command<&str> = {
        let calls = Rc::clone(&calls);
        Command::new_async(move |()| {
            calls.set(calls.get() + 1);
            let rx = rx.borrow_mut().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Outcome::success("opened")
            }
        })
    };
    let (_redraw, log) = bind(&command);

    let first = command.run();
    let second = command.run();
    assert_eq!(command.status(), CommandStatus::Running);
    assert!(!first.is_complete());
    assert!(!second.is_complete());

    // Awaiting the suppressed call alone settles the shared run.
    open.send(()).unwrap();
    block_on(second);
    assert!(first.is_complete());
    block_on(first);

    assert_eq!(calls.get(), 1);
    assert_eq!(command.status(), CommandStatus::Done);
    assert_eq!(command.result().unwrap().value(), Some(&"opened"));
    assert_eq!(
        *log.borrow(),
        vec![
            (CommandStatus::Running, None),
            (CommandStatus::Done, Some("success")),
        ]
    );
}

#[test]
fn fire_and_forget_run_settles_through_the_next_call() {
    let (open, rx) = gate();
    let calls = Rc::new(Cell::new(0u32));
    let command: Command<u32> = {
        let calls = Rc::clone(&calls);
        Command::new_async(move |()| {
            calls.set(calls.get() + 1);
            let rx = rx.borrow_mut().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Outcome::success(7)
            }
        })
    };
    let (_redraw, log) = bind(&command);

    drop(command.run());
    open.send(()).unwrap();
    block_on(command.run());

    assert_eq!(calls.get(), 1);
    assert_eq!(command.status(), CommandStatus::Done);
    assert_eq!(
        *log.borrow(),
        vec![
            (CommandStatus::Running, None),
            (CommandStatus::Done, Some("success")),
        ]
    );

    block_on(command.run());
    assert_eq!(calls.get(), 2);
    assert_eq!(command.completed_runs(), 2);
}

#[test]
fn clear_while_running_is_overwritten_on_settle() {
    let (open, rx) = gate();
    let command: Command<u32> = Command::new_async(move |()| {
        let rx = rx.borrow_mut().take();
        async move {
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Outcome::success(1)
        }
    });
    let (_redraw, log) = bind(&command);

    let execution = command.run();
    command.clear();
    assert_eq!(command.status(), CommandStatus::Idle);
    assert!(command.result().is_none());

    open.send(()).unwrap();
    block_on(execution);

    assert_eq!(command.status(), CommandStatus::Done);
    assert_eq!(command.result().unwrap().value(), Some(&1));
    assert_eq!(
        *log.borrow(),
        vec![
            (CommandStatus::Running, None),
            (CommandStatus::Idle, None),
            (CommandStatus::Done, Some("success")),
        ]
    );
}

#[test]
fn command_can_run_again_after_async_completion() {
    let runs = Rc::new(Cell::new(0u32));
    let command: Command<u32, u32> = {
        let runs = Rc::clone(&runs);
        Command::new_async(move |step| {
            runs.set(runs.get() + 1);
            async move { Outcome::success(step * 10) }
        })
    };

    block_on(command.execute(1));
    block_on(command.execute(2));

    assert_eq!(runs.get(), 2);
    assert_eq!(command.completed_runs(), 2);
    assert_eq!(command.result().unwrap().value(), Some(&20));
}

#[test]
fn view_teardown_in_any_order_is_quiet() {
    let command: Command<u8> = Command::new(|()| Outcome::success(1));
    let (redraw, log) = bind(&command);

    // Child removes its listener after the parent already disposed.
    command.dispose();
    command.remove_listener(&redraw);
    command.add_listener(&redraw);
    block_on(command.run());

    assert!(!command.has_listeners());
    assert!(log.borrow().is_empty());
}

#[test]
fn observable_drives_command_arguments() {
    let query = Observable::new(String::from("rust"));
    let search: Command<usize, String> = Command::new(|q: String| Outcome::success(q.len()));
    let hits = Rc::new(RefCell::new(Vec::new()));

    let _on_result = {
        let hits = Rc::clone(&hits);
        let observed = search.clone();
        search.listen(move || {
            if let Some(result) = observed.result() {
                hits.borrow_mut().push(*result.value().unwrap());
            }
        })
    };
    let _on_query = {
        let search = search.clone();
        query.subscribe(move |q| block_on(search.execute(q.clone())))
    };

    query.set(String::from("ferris"));
    query.set(String::from("ferris"));
    query.set(String::from("tui"));

    assert_eq!(*hits.borrow(), vec![6, 3]);
}

#[test]
fn plain_notifier_counts_redraws() {
    let notifier = ChangeNotifier::new();
    let redraws = Rc::new(Cell::new(0u32));
    let redraw = {
        let redraws = Rc::clone(&redraws);
        notifier.listen(move || redraws.set(redraws.get() + 1))
    };

    notifier.notify_listeners();
    notifier.notify_listeners();
    redraw.unsubscribe();
    notifier.notify_listeners();

    assert_eq!(redraws.get(), 2);
}
