use std::io;
use std::thread;
use std::time::Duration;

use modal_console::{
    logging, ConsoleHandle, ConsoleMessage, ConsoleSession, DialogOption, DialogOutcome,
    EnvConfig, ProcessTerminal, SessionOptions, Severity, Signal, WaitOutcome,
};
use tracing::info;

const TICK: Duration = Duration::from_millis(700);
const SEVERITIES: [Severity; 4] = [
    Severity::Info,
    Severity::Debug,
    Severity::Success,
    Severity::Warning,
];

fn main() -> io::Result<()> {
    let config = EnvConfig::from_env();
    logging::init(&config)?;

    let (mut terminal, keys) = ProcessTerminal::open(&config)?;
    let resized = Signal::auto_reset();
    terminal.on_resize({
        let resized = resized.clone();
        move || resized.set()
    })?;

    let session = ConsoleSession::start_with_options(terminal, keys, SessionOptions::from(&config))
        .map_err(io::Error::other)?;
    info!("demo session started");

    let redrawer = {
        let handle = session.handle();
        let scope = session.scope();
        thread::Builder::new()
            .name("demo-redraw".to_string())
            .spawn(move || {
                while scope.wait_one(&resized) == WaitOutcome::Signaled {
                    handle.request_redraw();
                }
            })?
    };
    let ticker = {
        let handle = session.handle();
        thread::Builder::new()
            .name("demo-ticker".to_string())
            .spawn(move || run_ticker(&handle))?
    };

    let outcome = session.present_dialog(
        ConsoleMessage::new("Deploy build 42 to staging?").with_details(
            "3 services change: api, worker, web.\nMigrations: none.\nEstimated downtime: 0s.",
        ),
        vec![
            DialogOption::recommended("Deploy now"),
            DialogOption::easy("Deploy after the nightly backup"),
            DialogOption::escape("Cancel"),
        ],
    );
    match outcome {
        DialogOutcome::Selected(index) => {
            session.notify(format!("Chose option {index}"), Severity::Success)
        }
        DialogOutcome::Escaped(_) => session.notify("Deployment cancelled", Severity::Warning),
        DialogOutcome::Cancelled => {}
    }
    thread::sleep(TICK);

    let result = session.shutdown();
    let _ = ticker.join();
    let _ = redrawer.join();
    result.map_err(io::Error::other)
}

/// Logs a heartbeat every tick and interrupts with a nested dialog on the fifth.
fn run_ticker(handle: &ConsoleHandle<ProcessTerminal>) {
    let mut tick = 0usize;
    while !handle.is_cancelled() {
        thread::sleep(TICK);
        tick += 1;
        let severity = SEVERITIES[tick % SEVERITIES.len()];
        handle.notify(format!("heartbeat {tick}"), severity);

        if tick == 5 {
            let scope = handle.child_scope();
            let outcome = handle.present_dialog_in(
                &scope,
                ConsoleMessage::new("Disk usage is at 91%.")
                    .with_details("Press space to toggle these details."),
                vec![
                    DialogOption::recommended("Keep going"),
                    DialogOption::escape("Dismiss"),
                ],
            );
            handle.notify(format!("disk warning answered: {outcome:?}"), Severity::Info);
        }
    }
}
