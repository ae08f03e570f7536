//! Console rendering of stage results.

use tgen_control::{CmdResult, PortState, Reporter};

const DESC_WIDTH: usize = 40;

/// Prints each stage as a status line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, desc: &str, result: &CmdResult) {
        println!("{}", render(desc, result));
    }

    fn note(&self, message: &str) {
        println!("{message}");
    }
}

/// `desc` padded to a column, then the verdict; failures list their errors
/// below.
pub fn render(desc: &str, result: &CmdResult) -> String {
    let desc = format!("{desc}:");
    if result.good() {
        return format!("{desc:<DESC_WIDTH$} [SUCCESS]");
    }

    let mut out = format!("{desc:<DESC_WIDTH$} [FAILED]");
    for message in result.err() {
        out.push_str("\n    ");
        out.push_str(message);
    }
    out
}

/// Human-readable state name for the status table.
pub const fn state_label(state: PortState) -> &'static str {
    match state {
        PortState::Down => "down",
        PortState::Idle => "idle",
        PortState::HasStreams => "streams",
        PortState::Transmitting => "transmitting",
        PortState::Paused => "paused",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_stage_is_one_line() {
        let line = render("Syncing with the server", &CmdResult::ok());
        assert!(line.starts_with("Syncing with the server:"));
        assert!(line.ends_with(" [SUCCESS]"));
        assert_eq!(line.len(), DESC_WIDTH + " [SUCCESS]".len());
    }

    #[test]
    fn bad_stage_lists_errors() {
        let mut rc = CmdResult::ok();
        rc.add(CmdResult::fail("port 1 : port is down"));
        rc.add(CmdResult::fail("port 2 : invalid handler"));

        let text = render("Force acquiring all ports", &rc);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[FAILED]"));
        assert_eq!(lines[1], "    port 1 : port is down");
        assert_eq!(lines[2], "    port 2 : invalid handler");
    }
}
