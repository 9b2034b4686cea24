//! User-facing console lines. Colors only when the stream is a TTY.

use owo_colors::OwoColorize;

fn stdout_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn stderr_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

pub fn print_info(msg: &str) {
    if stdout_tty() {
        println!("{} {msg}", "info:".cyan().bold());
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {msg}", "warn:".yellow().bold());
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {msg}", "error:".red().bold());
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if stdout_tty() {
        println!("{} {msg}", "ok:".green().bold());
    } else {
        println!("ok: {msg}");
    }
}

/// A plain result line (no prefix) that scripts may parse, such as `old -> new`.
pub fn print_user(msg: &str) {
    println!("{msg}");
}
