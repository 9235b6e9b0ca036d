
use std::thread;
use std::time::Duration;

use harness::{wait_for, BrokenKeys, HarnessTerminal, Op, ScriptedKeys};
use modal_console::{
    Color, ConsoleError, ConsoleMessage, ConsoleSession, CursorPosition, DialogOption,
    DialogOutcome, Key, Severity,
};
use pretty_assertions::assert_eq;

fn start(terminal: &HarnessTerminal, keys: &ScriptedKeys) -> ConsoleSession<HarnessTerminal> {
    ConsoleSession::start(terminal.clone(), keys.clone()).expect("session start")
}

fn three_options() -> Vec<DialogOption> {
    vec![
        DialogOption::easy("retry"),
        DialogOption::recommended("continue"),
        DialogOption::escape("abort"),
    ]
}

fn index_of(written: &[String], text: &str) -> Option<usize> {
    written.iter().position(|line| line == text)
}

#[test]
fn arrow_down_then_enter_selects_the_next_option() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::ArrowDown);
    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(2));

    wait_for("dialog to be cleared", || {
        terminal.ops().last()
            == Some(&Op::Cursor {
                position: CursorPosition::ORIGIN,
                visible: true,
            })
    });
    session.shutdown().expect("shutdown");
}

#[test]
fn escape_returns_the_escape_option() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::Esc);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Escaped(2));
    session.shutdown().expect("shutdown");
}

#[test]
fn escape_is_ignored_without_an_escape_option() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || {
        handle.present_dialog(
            "Pick one",
            vec![DialogOption::easy("a"), DialogOption::easy("b")],
        )
    });
    wait_for("dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::Esc);
    keys.press(Key::ArrowUp);
    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(1));
    session.shutdown().expect("shutdown");
}

#[test]
fn dialog_frame_highlights_the_selected_option() {
    let terminal = HarnessTerminal::new(20, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("selected option to be drawn", || {
        terminal.ops().contains(&Op::Write {
            text: format!("{:<20}", "  continue"),
            foreground: Color::Black,
            background: Color::White,
        })
    });
    assert!(terminal.written().contains(&"Proceed?".to_string()));

    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(1));
    session.shutdown().expect("shutdown");
}

#[test]
fn notify_writes_summary_and_details_rows() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);

    session.notify(
        ConsoleMessage::new("disk full").with_details("/var is at 100%"),
        Severity::Error,
    );
    wait_for("details row", || {
        terminal.written().contains(&"/var is at 100%".to_string())
    });

    let ops = terminal.ops();
    assert!(ops.contains(&Op::Write {
        text: "disk full".to_string(),
        foreground: Color::Red,
        background: Color::DefaultBackground,
    }));
    assert!(ops.contains(&Op::Write {
        text: "/var is at 100%".to_string(),
        foreground: Color::DarkGray,
        background: Color::DefaultBackground,
    }));
    session.shutdown().expect("shutdown");
}

#[test]
fn log_output_waits_for_the_dialog_and_flushes_in_order() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("dialog to open", || session.handle().has_active_dialog());

    session.notify("log one", Severity::Info);
    session.notify("log two", Severity::Warning);
    thread::sleep(Duration::from_millis(50));
    let written = terminal.written();
    assert_eq!(index_of(&written, "log one"), None);
    assert_eq!(index_of(&written, "log two"), None);

    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(1));

    wait_for("queued logs to flush", || {
        index_of(&terminal.written(), "log two").is_some()
    });
    let written = terminal.written();
    let one = index_of(&written, "log one").expect("log one");
    let two = index_of(&written, "log two").expect("log two");
    assert!(one < two);
    session.shutdown().expect("shutdown");
}

#[test]
fn concurrent_notifiers_each_keep_their_own_order() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);

    let writers: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let handle = session.handle();
            thread::spawn(move || {
                for index in 0..20 {
                    handle.notify(format!("{name}-{index}"), Severity::Debug);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer");
    }

    wait_for("all rows", || {
        terminal
            .written()
            .iter()
            .filter(|text| text.as_str() != "\n")
            .count()
            >= 40
    });
    let written = terminal.written();
    for name in ["a", "b"] {
        let positions: Vec<usize> = (0..20)
            .map(|index| index_of(&written, &format!("{name}-{index}")).expect("row written"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
    session.shutdown().expect("shutdown");
}

#[test]
fn nested_dialogs_route_keys_to_the_top_dialog() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);

    let outer_handle = session.handle();
    let outer = thread::spawn(move || {
        outer_handle.present_dialog(
            "outer question",
            vec![DialogOption::easy("first"), DialogOption::easy("second")],
        )
    });
    wait_for("outer dialog drawn", || {
        terminal.written().contains(&"outer question".to_string())
    });

    let inner_handle = session.handle();
    let inner = thread::spawn(move || {
        inner_handle.present_dialog(
            "inner question",
            vec![DialogOption::easy("yes"), DialogOption::recommended("no")],
        )
    });
    wait_for("inner dialog drawn", || {
        terminal.written().contains(&"inner question".to_string())
    });

    keys.press(Key::Enter);
    assert_eq!(inner.join().expect("inner"), DialogOutcome::Selected(1));
    assert!(session.handle().has_active_dialog());

    keys.press(Key::ArrowDown);
    keys.press(Key::Enter);
    assert_eq!(outer.join().expect("outer"), DialogOutcome::Selected(1));
    session.shutdown().expect("shutdown");
}

#[test]
fn keys_pressed_without_a_dialog_are_discarded() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    keys.press(Key::Enter);
    keys.press(Key::ArrowDown);
    wait_for("stray keys to be read", || keys.pending() == 0);
    thread::sleep(Duration::from_millis(50));

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::ArrowUp);
    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(0));
    session.shutdown().expect("shutdown");
}

#[test]
fn keys_after_an_answer_do_not_reach_the_next_dialog() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);

    let handle = session.handle();
    let first = thread::spawn(move || handle.present_dialog("First?", three_options()));
    wait_for("first dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::Esc);
    keys.press(Key::ArrowDown);
    keys.press(Key::Enter);
    assert_eq!(first.join().expect("first"), DialogOutcome::Escaped(2));
    wait_for("trailing keys to be read", || keys.pending() == 0);
    thread::sleep(Duration::from_millis(50));

    let handle = session.handle();
    let second = thread::spawn(move || handle.present_dialog("Second?", three_options()));
    wait_for("second dialog to open", || session.handle().has_active_dialog());

    keys.press(Key::ArrowUp);
    keys.press(Key::Enter);
    assert_eq!(second.join().expect("second"), DialogOutcome::Selected(0));
    session.shutdown().expect("shutdown");
}

#[test]
fn late_log_rows_survive_dialog_teardown() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);

    for round in 0..20 {
        let handle = session.handle();
        let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
        wait_for("dialog to open", || session.handle().has_active_dialog());

        keys.press(Key::ArrowDown);
        keys.press(Key::Enter);
        keys.press(Key::Tab);
        assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(2));

        let row = format!("late {round}");
        session.notify(row.clone(), Severity::Info);
        let is_row = |op: &Op| matches!(op, Op::Write { text, .. } if *text == row);
        wait_for("late row", || terminal.ops().iter().any(is_row));
        thread::sleep(Duration::from_millis(20));

        let ops = terminal.ops();
        let written_at = ops.iter().position(is_row).expect("late row written");
        assert!(
            !ops[written_at..].contains(&Op::Clear),
            "screen cleared after {row:?}"
        );
    }
    session.shutdown().expect("shutdown");
}

#[test]
fn resize_redraw_uses_the_new_terminal_size() {
    let terminal = HarnessTerminal::new(20, 4);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let options = (0..10)
        .map(|n| {
            if n == 9 {
                DialogOption::recommended(format!("option {n}"))
            } else {
                DialogOption::easy(format!("option {n}"))
            }
        })
        .collect();
    let asker = {
        let handle = handle.clone();
        thread::spawn(move || handle.present_dialog("Proceed?", options))
    };
    wait_for("selected option to be drawn", || {
        terminal.ops().contains(&Op::Write {
            text: format!("{:<20}", "  option 9"),
            foreground: Color::Black,
            background: Color::White,
        })
    });
    assert_eq!(index_of(&terminal.written(), "  option 0"), None);

    terminal.set_size(20, 20);
    handle.request_redraw();
    wait_for("first option after resize", || {
        index_of(&terminal.written(), "  option 0").is_some()
    });

    keys.press(Key::Enter);
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Selected(9));
    session.shutdown().expect("shutdown");
}

#[test]
fn session_cancel_ends_a_blocked_dialog() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    let asker = thread::spawn(move || handle.present_dialog("Proceed?", three_options()));
    wait_for("dialog to open", || session.handle().has_active_dialog());

    session.cancel();
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Cancelled);
    session.shutdown().expect("shutdown");
}

#[test]
fn child_scope_cancellation_ends_only_that_dialog() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();
    let child = handle.child_scope();

    let asker = {
        let child = child.clone();
        thread::spawn(move || handle.present_dialog_in(&child, "Proceed?", three_options()))
    };
    wait_for("dialog to open", || session.handle().has_active_dialog());

    child.cancel();
    assert_eq!(asker.join().expect("asker"), DialogOutcome::Cancelled);
    assert!(!session.handle().is_cancelled());

    session.notify("still running", Severity::Success);
    wait_for("log after cancelled dialog", || {
        terminal.written().contains(&"still running".to_string())
    });
    session.shutdown().expect("shutdown");
}

#[test]
fn failing_key_reader_cancels_the_session_and_is_reported() {
    let terminal = HarnessTerminal::new(40, 12);
    let session = ConsoleSession::start(terminal, BrokenKeys).expect("session start");
    let handle = session.handle();

    wait_for("session to cancel itself", || handle.is_cancelled());
    let err = session.shutdown().expect_err("worker error");
    assert!(matches!(
        err,
        ConsoleError::Terminal {
            operation: "reading a key press",
            ..
        }
    ));
}

#[test]
fn shutdown_without_activity_is_clean() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    let handle = session.handle();

    session.shutdown().expect("shutdown");
    assert!(handle.is_cancelled());
    assert!(terminal.ops().is_empty());
}

#[test]
#[should_panic(expected = "at least one option")]
fn presenting_without_options_panics() {
    let terminal = HarnessTerminal::new(40, 12);
    let keys = ScriptedKeys::new();
    let session = start(&terminal, &keys);
    session.present_dialog("Proceed?", Vec::new());
}
