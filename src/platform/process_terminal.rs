//! Process-backed terminal: ANSI output on stdout, raw-mode key input from stdin.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use libc::{self, c_int};
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, warn};

use crate::config::EnvConfig;
use crate::core::cancel::CancellationScope;
use crate::core::input::{parse_key_sequence, KeyPress};
use crate::core::lock_unpoisoned;
use crate::core::terminal::{Color, CursorPosition, KeyReader, Terminal};
use crate::platform::key_decoder::KeyDecoder;

const FALLBACK_DIMENSIONS: (u16, u16) = (80, 24);
const POLL_INTERVAL_MS: i32 = 50;

type ResizeCallback = Box<dyn FnMut() + Send>;

fn wait_writable(fd: c_int) -> io::Result<()> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    loop {
        let result = unsafe { libc::poll(&mut fds, 1, -1) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if result == 0 {
            continue;
        }
        if (fds.revents & libc::POLLOUT) != 0 {
            return Ok(());
        }
        return Err(io::Error::other(format!(
            "poll(POLLOUT) returned revents=0x{:x}",
            fds.revents
        )));
    }
}

fn write_all_fd_with<FWrite, FWait>(
    fd: c_int,
    bytes: &[u8],
    mut write_once: FWrite,
    mut wait_writable: FWait,
) -> io::Result<()>
where
    FWrite: FnMut(c_int, &[u8]) -> io::Result<usize>,
    FWait: FnMut(c_int) -> io::Result<()>,
{
    let mut written = 0;
    while written < bytes.len() {
        match write_once(fd, &bytes[written..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(count) => {
                if count > bytes.len() - written {
                    return Err(io::Error::other("write returned more bytes than requested"));
                }
                written += count;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => wait_writable(fd)?,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn write_fd(fd: c_int, data: &str) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    write_all_fd_with(
        fd,
        data.as_bytes(),
        |fd, buf| {
            let result = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
            if result < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(result as usize)
            }
        },
        wait_writable,
    )
}

fn read_winsize(fd: c_int) -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some((size.ws_col, size.ws_row))
    } else {
        None
    }
}

/// Waits up to `timeout_ms` for `fd` to become readable.
fn poll_readable(fd: c_int, timeout_ms: i32) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::Interrupted {
            Ok(false)
        } else {
            Err(err)
        };
    }
    Ok(result > 0 && (fds.revents & (libc::POLLIN | libc::POLLHUP)) != 0)
}

fn get_termios(fd: c_int) -> io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_termios(fd: c_int, termios: &libc::termios) -> io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn foreground_code(color: Color) -> u8 {
    match color {
        Color::DefaultForeground | Color::DefaultBackground => 39,
        Color::Red => 31,
        Color::Yellow => 33,
        Color::Green => 32,
        Color::White => 97,
        Color::Gray => 37,
        Color::DarkGray => 90,
        Color::Black => 30,
    }
}

fn background_code(color: Color) -> u8 {
    match color {
        Color::DefaultForeground | Color::DefaultBackground => 49,
        Color::Red => 41,
        Color::Yellow => 43,
        Color::Green => 42,
        Color::White => 107,
        Color::Gray => 47,
        Color::DarkGray => 100,
        Color::Black => 40,
    }
}

/// Encodes styled text. Raw mode disables output post-processing, so bare `\n` becomes `\r\n`.
fn styled(text: &str, foreground: Color, background: Color) -> String {
    let body = text.replace("\r\n", "\n").replace('\n', "\r\n");
    format!(
        "\x1b[{};{}m{body}\x1b[0m",
        foreground_code(foreground),
        background_code(background)
    )
}

/// Forwards `SIGWINCH` to a callback on a dedicated thread.
struct ResizeWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    fn start(callback: Arc<Mutex<Option<ResizeCallback>>>) -> io::Result<Self> {
        let mut signals = Signals::new([libc::SIGWINCH])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("console-resize-watcher".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    debug!("terminal resized");
                    if let Some(callback) = lock_unpoisoned(&callback).as_mut() {
                        callback();
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Output half of the controlling terminal.
///
/// Raw mode is entered on [`ProcessTerminal::open`] and the original settings are restored on
/// drop.
pub struct ProcessTerminal {
    stdin_fd: c_int,
    stdout_fd: c_int,
    original_termios: Option<libc::termios>,
    write_log_path: Option<PathBuf>,
    write_log_failed: bool,
    resize_callback: Arc<Mutex<Option<ResizeCallback>>>,
    resize_watcher: Option<ResizeWatcher>,
}

impl ProcessTerminal {
    /// Puts stdin in raw mode and returns the output half with its matching key reader.
    pub fn open(config: &EnvConfig) -> io::Result<(Self, StdinKeyReader)> {
        Self::open_fds(libc::STDIN_FILENO, libc::STDOUT_FILENO, config)
    }

    fn open_fds(
        stdin_fd: c_int,
        stdout_fd: c_int,
        config: &EnvConfig,
    ) -> io::Result<(Self, StdinKeyReader)> {
        let original = get_termios(stdin_fd)?;
        let mut raw = original;
        unsafe {
            libc::cfmakeraw(&mut raw);
        }
        set_termios(stdin_fd, &raw)?;
        debug!(stdin_fd, stdout_fd, "terminal entered raw mode");

        let terminal = Self {
            stdin_fd,
            stdout_fd,
            original_termios: Some(original),
            write_log_path: config.write_log.as_ref().map(PathBuf::from),
            write_log_failed: false,
            resize_callback: Arc::new(Mutex::new(None)),
            resize_watcher: None,
        };
        let reader = StdinKeyReader::new(stdin_fd, config.escape_timeout_ms);
        Ok((terminal, reader))
    }

    /// Invokes `callback` on every terminal resize. Replaces any earlier callback.
    pub fn on_resize<F>(&mut self, callback: F) -> io::Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        *lock_unpoisoned(&self.resize_callback) = Some(Box::new(callback));
        if self.resize_watcher.is_none() {
            self.resize_watcher = Some(ResizeWatcher::start(Arc::clone(&self.resize_callback))?);
        }
        Ok(())
    }

    fn emit(&mut self, data: &str) -> io::Result<()> {
        write_fd(self.stdout_fd, data)?;
        if self.write_log_failed {
            return Ok(());
        }
        if let Some(path) = self.write_log_path.as_ref() {
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(data.as_bytes()));
            if let Err(err) = result {
                warn!(path = %path.display(), error = %err, "disabling terminal write log");
                self.write_log_failed = true;
            }
        }
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        self.resize_watcher = None;
        *lock_unpoisoned(&self.resize_callback) = None;

        let _ = self.emit("\x1b[0m\x1b[?25h");
        // Drop unread input so it does not leak into the shell.
        let _ = unsafe { libc::tcflush(self.stdin_fd, libc::TCIFLUSH) };

        if let Some(original) = self.original_termios.take() {
            set_termios(self.stdin_fd, &original)?;
            debug!("terminal restored");
        }
        Ok(())
    }
}

impl Terminal for ProcessTerminal {
    fn write(&mut self, text: &str, foreground: Color, background: Color) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.emit(&styled(text, foreground, background))
    }

    fn clear(&mut self, background: Color) -> io::Result<()> {
        let code = background_code(background);
        self.emit(&format!("\x1b[{code}m\x1b[2J\x1b[H\x1b[0m"))
    }

    fn dimensions(&self) -> (u16, u16) {
        read_winsize(self.stdout_fd).unwrap_or(FALLBACK_DIMENSIONS)
    }

    fn set_cursor_position(&mut self, position: CursorPosition, visible: bool) -> io::Result<()> {
        let visibility = if visible { "\x1b[?25h" } else { "\x1b[?25l" };
        self.emit(&format!(
            "\x1b[{};{}H{visibility}",
            u32::from(position.row) + 1,
            u32::from(position.column) + 1
        ))
    }
}

impl Drop for ProcessTerminal {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(error = %err, "failed to restore terminal mode");
        }
    }
}

/// Input half of the controlling terminal.
///
/// Polls stdin in short slices so cancellation is observed promptly.
pub struct StdinKeyReader {
    fd: c_int,
    decoder: KeyDecoder,
    ready: VecDeque<String>,
}

impl StdinKeyReader {
    fn new(fd: c_int, escape_timeout_ms: u64) -> Self {
        Self {
            fd,
            decoder: KeyDecoder::new(escape_timeout_ms),
            ready: VecDeque::new(),
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let now = Instant::now();
        let timeout_ms = self.decoder.next_timeout_ms(now, POLL_INTERVAL_MS);
        if !poll_readable(self.fd, timeout_ms)? {
            self.ready.extend(self.decoder.flush_due(Instant::now()));
            return Ok(());
        }

        let mut buffer = [0u8; 1024];
        let read_len = unsafe { libc::read(self.fd, buffer.as_mut_ptr() as *mut _, buffer.len()) };
        if read_len < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(()),
                _ => Err(err),
            };
        }
        if read_len == 0 {
            self.ready.extend(self.decoder.flush());
            if self.ready.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stdin closed",
                ));
            }
            return Ok(());
        }
        self.ready
            .extend(self.decoder.process(&buffer[..read_len as usize]));
        Ok(())
    }
}

impl KeyReader for StdinKeyReader {
    fn read_key(&mut self, scope: &CancellationScope) -> io::Result<Option<KeyPress>> {
        loop {
            if scope.is_cancelled() {
                return Ok(None);
            }
            if let Some(sequence) = self.ready.pop_front() {
                return Ok(Some(parse_key_sequence(&sequence)));
            }
            self.fill()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::thread;
    use std::time::{Duration, Instant};

    use libc::{self, c_int};

    use super::{poll_readable, styled, write_all_fd_with, ProcessTerminal};
    use crate::config::EnvConfig;
    use crate::core::cancel::CancellationScope;
    use crate::core::input::{Key, KeyPress};
    use crate::core::terminal::{Color, CursorPosition, KeyReader, Terminal};

    struct Pty {
        master: c_int,
        slave: c_int,
    }

    impl Drop for Pty {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.master);
                libc::close(self.slave);
            }
        }
    }

    fn open_pty() -> Pty {
        let mut master: c_int = 0;
        let mut slave: c_int = 0;
        let result = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, 0, "openpty failed");
        Pty { master, slave }
    }

    fn read_available(fd: c_int, timeout: Duration) -> Vec<u8> {
        let end = Instant::now() + timeout;
        let mut out = Vec::new();
        while Instant::now() < end {
            let remaining = end.saturating_duration_since(Instant::now());
            let timeout_ms = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);
            if timeout_ms == 0 || !poll_readable(fd, timeout_ms).unwrap_or(false) {
                break;
            }
            let mut buf = [0u8; 1024];
            let read_len = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if read_len <= 0 {
                break;
            }
            out.extend_from_slice(&buf[..read_len as usize]);
        }
        out
    }

    fn write_master(fd: c_int, bytes: &[u8]) {
        let written = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        assert_eq!(written, bytes.len() as isize);
    }

    #[test]
    fn styled_text_maps_colors_and_translates_newlines() {
        assert_eq!(
            styled("a\nb", Color::Red, Color::DefaultBackground),
            "\x1b[31;49ma\r\nb\x1b[0m"
        );
        assert_eq!(
            styled("opt", Color::Black, Color::White),
            "\x1b[30;107mopt\x1b[0m"
        );
    }

    #[test]
    fn pty_output_carries_cursor_and_text() {
        let pty = open_pty();
        let (mut terminal, _reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &EnvConfig::default())
                .expect("open pty terminal");

        terminal
            .set_cursor_position(CursorPosition::new(4, 2), false)
            .expect("cursor");
        terminal
            .write("hi", Color::Green, Color::DefaultBackground)
            .expect("write");

        let output = String::from_utf8_lossy(&read_available(
            pty.master,
            Duration::from_millis(200),
        ))
        .into_owned();
        assert!(output.contains("\x1b[3;5H\x1b[?25l"), "got {output:?}");
        assert!(output.contains("\x1b[32;49mhi\x1b[0m"), "got {output:?}");
    }

    #[test]
    fn pty_dimensions_follow_winsize() {
        let pty = open_pty();
        let size = libc::winsize {
            ws_row: 30,
            ws_col: 100,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let result = unsafe { libc::ioctl(pty.slave, libc::TIOCSWINSZ, &size) };
        assert_eq!(result, 0);

        let (terminal, _reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &EnvConfig::default())
                .expect("open pty terminal");
        assert_eq!(terminal.dimensions(), (100, 30));
    }

    #[test]
    fn write_log_mirrors_every_byte() {
        let pty = open_pty();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("writes.log");
        let config = EnvConfig {
            write_log: Some(path.to_string_lossy().into_owned()),
            ..EnvConfig::default()
        };
        let (mut terminal, _reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &config).expect("open pty terminal");

        terminal.clear(Color::DefaultBackground).expect("clear");
        let logged = std::fs::read_to_string(&path).expect("write log");
        assert_eq!(logged, "\x1b[49m\x1b[2J\x1b[H\x1b[0m");
    }

    #[test]
    fn key_reader_decodes_arrow_and_enter() {
        let pty = open_pty();
        let (_terminal, mut reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &EnvConfig::default())
                .expect("open pty terminal");
        let scope = CancellationScope::new();

        write_master(pty.master, b"\x1b[B\r");
        assert_eq!(
            reader.read_key(&scope).expect("read"),
            Some(KeyPress::new(Key::ArrowDown))
        );
        assert_eq!(
            reader.read_key(&scope).expect("read"),
            Some(KeyPress::new(Key::Enter))
        );
    }

    #[test]
    fn key_reader_resolves_lone_escape_after_timeout() {
        let pty = open_pty();
        let (_terminal, mut reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &EnvConfig::default())
                .expect("open pty terminal");
        let scope = CancellationScope::new();

        write_master(pty.master, b"\x1b");
        assert_eq!(
            reader.read_key(&scope).expect("read"),
            Some(KeyPress::new(Key::Esc))
        );
    }

    #[test]
    fn key_reader_returns_none_once_cancelled() {
        let pty = open_pty();
        let (_terminal, mut reader) =
            ProcessTerminal::open_fds(pty.slave, pty.slave, &EnvConfig::default())
                .expect("open pty terminal");
        let scope = CancellationScope::new();

        let canceller = {
            let scope = scope.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                scope.cancel();
            })
        };
        let started = Instant::now();
        assert_eq!(reader.read_key(&scope).expect("read"), None);
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().expect("canceller");
    }

    #[test]
    fn open_fails_on_a_non_terminal_fd() {
        let file = tempfile::tempfile().expect("tempfile");
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
        let result = ProcessTerminal::open_fds(fd, fd, &EnvConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn write_all_fd_with_retries_on_eintr_and_writes_all_bytes() {
        let data = b"hello";
        let mut out = Vec::new();
        let mut calls = 0;
        write_all_fd_with(
            1,
            data,
            |_, buf| {
                calls += 1;
                match calls {
                    1 => Err(io::Error::from(io::ErrorKind::Interrupted)),
                    2 => {
                        out.extend_from_slice(&buf[..2]);
                        Ok(2)
                    }
                    _ => {
                        out.extend_from_slice(buf);
                        Ok(buf.len())
                    }
                }
            },
            |_| unreachable!("wait_writable should not be called for EINTR"),
        )
        .expect("write_all_fd_with failed");

        assert_eq!(out, data);
    }

    #[test]
    fn write_all_fd_with_waits_for_writable_on_would_block_and_retries() {
        let data = b"xyz";
        let mut out = Vec::new();
        let mut calls = 0;
        let events = std::cell::RefCell::new(Vec::new());
        write_all_fd_with(
            1,
            data,
            |_, buf| {
                events.borrow_mut().push("write");
                calls += 1;
                if calls == 1 {
                    return Err(io::Error::from(io::ErrorKind::WouldBlock));
                }
                out.extend_from_slice(buf);
                Ok(buf.len())
            },
            |_| {
                events.borrow_mut().push("wait");
                Ok(())
            },
        )
        .expect("write_all_fd_with failed");

        assert_eq!(out, data);
        assert_eq!(events.into_inner(), vec!["write", "wait", "write"]);
    }
}
