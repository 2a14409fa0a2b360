//! Debug descriptor injected when a driver runs from the local project.

use std::path::Path;

/// Reserved archive entry name of the debug descriptor.
pub const DEBUG_DESCRIPTOR_NAME: &str = "debug.xml";

/// Renders the debug descriptor pointing the deployed driver at `load_from`.
pub fn debug_descriptor(load_from: &Path, wait_for_debugger: bool) -> Vec<u8> {
    let load_from = escape_xml(&load_from.to_string_lossy());
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n\
         <properties>\n\
         <entry key=\"loadFrom\">{load_from}</entry>\n\
         <entry key=\"waitForDebugger\">{wait_for_debugger}</entry>\n\
         </properties>\n"
    )
    .into_bytes()
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
