//! Terminal presentation of instructions and server messages

use log::error;
use std::io::Write;

/// Display surface the relay writes survey instructions to
pub trait InstructionView {
    fn show_instructions(&mut self, instructions: &str);

    fn show_message(&mut self, _message: &str) {}
}

/// Writes to any byte sink, usually stdout
pub struct TerminalView<W: Write> {
    out: W,
    instructions: Option<String>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            instructions: None,
        }
    }

    /// Text currently shown in the instruction area
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_block(&mut self, header: &str, body: &str) {
        if let Err(e) = writeln!(self.out, "{}\n{}", header, body).and_then(|_| self.out.flush()) {
            error!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> InstructionView for TerminalView<W> {
    fn show_instructions(&mut self, instructions: &str) {
        self.instructions = Some(instructions.to_string());
        let plain = to_plain_text(instructions);
        self.write_block("=== Instructions ===", &plain);
    }

    fn show_message(&mut self, message: &str) {
        let plain = to_plain_text(message);
        self.write_block("---", &plain);
    }
}

/// Flattens the small HTML subset the server sends into terminal text
///
/// `<br>` and `<p>` become line breaks, other tags are dropped, and the
/// common entities are decoded.
pub fn to_plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                let tag = rest[start + 1..start + end]
                    .trim_start_matches('/')
                    .trim_end_matches('/')
                    .trim()
                    .to_ascii_lowercase();
                if tag == "br" || tag == "p" || tag.starts_with("p ") {
                    text.push('\n');
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                text.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
