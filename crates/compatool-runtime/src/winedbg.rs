//! Parsers for the translation layer's diagnostic listings.
//!
//! `winedbg --command "info proc"` prints one process per line with the
//! emulated pid as eight hex digits starting at column 1:
//!
//! ```text
//!  pid      threads  executable (all id:s are in hex)
//!  00000020 12       'services.exe'
//!  00000128 4        \_ 'ffxiv_dx11.exe'
//! ```
//!
//! `winedbg --command "info procmap"` prints a header line followed by the
//! emulated pid at column 1 and the host pid at column 10, both eight hex
//! digits. Older builds answer with a `syntax error` message instead.
//!
//! The format is positional and unversioned. Lines that do not fit it are
//! skipped rather than reported as errors.

const PID_COLUMN: usize = 1;
const HOST_PID_COLUMN: usize = 10;
const PID_WIDTH: usize = 8;

fn hex_field(line: &str, start: usize) -> Option<u32> {
    let field = line.get(start..start + PID_WIDTH)?;
    u32::from_str_radix(field.trim(), 16).ok()
}

fn lines(output: &str) -> impl DoubleEndedIterator<Item = &str> {
    output
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
}

/// Emulated pids of every listed process whose line mentions `executable`.
pub fn parse_process_list(output: &str, executable: &str) -> Vec<u32> {
    lines(output)
        .filter(|l| l.contains(executable))
        .filter_map(|l| hex_field(l, PID_COLUMN))
        .collect()
}

/// Host pid mapped to `emulated_pid`, if the listing has one.
pub fn parse_process_map(output: &str, emulated_pid: u32) -> Option<u32> {
    if output.contains("syntax error") {
        return None;
    }
    lines(output)
        .skip(1)
        .filter(|l| hex_field(l, PID_COLUMN) == Some(emulated_pid))
        .find_map(|l| hex_field(l, HOST_PID_COLUMN))
}

/// Last non-blank line of a helper's output.
pub fn parse_last_line(output: &str) -> Option<String> {
    lines(output)
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(str::to_owned)
}
