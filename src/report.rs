//! CLI output formatting for processed requests.
//!
//! Each request leads with the source name and its variant count. Variants
//! follow in resolution order with their positional index, size and format,
//! and the `src` they were delivered under. Annotations the transforms
//! recorded are shown as indented context.
//!
//! ```text
//! harbour.jpg?w=300;600&format=webp&rotate=90 (2 variants)
//!     001 300x200 webp → harbour-1f2e3d4c.webp
//!         rotate: 90
//!     002 failed
//!         Config: w=600&format=webp&rotate=90
//!         Error: Image processing failed: …
//! ```
//!
//! Data URLs are abbreviated to their media type.

use crate::engine::Response;
use crate::metadata::ImageMetadata;

/// Keys shown on the variant line itself rather than as annotations.
const CORE_KEYS: &[&str] = &["src", "width", "height", "format"];

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn display_src(src: &str) -> String {
    match src.split_once(";base64,") {
        Some((media, _)) if src.starts_with("data:") => format!("{media};base64,…"),
        _ => src.to_string(),
    }
}

fn variant_line(index: usize, meta: &ImageMetadata) -> String {
    format!(
        "{}{} {}x{} {} → {}",
        indent(1),
        format_index(index),
        meta.width,
        meta.height,
        meta.format,
        display_src(&meta.src)
    )
}

fn annotation_lines(meta: &ImageMetadata) -> Vec<String> {
    let serde_json::Value::Object(map) = meta.to_json() else {
        return Vec::new();
    };
    map.into_iter()
        .filter(|(key, _)| !CORE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            format!("{}{}: {}", indent(2), key, value)
        })
        .collect()
}

/// Format one processed request as display lines.
pub fn format_process_report(name: &str, query: &str, response: &Response) -> Vec<String> {
    let total = response.metadatas.len() + response.failures.len();
    let mut header = format!("{name}?{query} ({total} variants");
    if !response.failures.is_empty() {
        header.push_str(&format!(", {} failed", response.failures.len()));
    }
    header.push(')');

    let mut lines = vec![header];
    let mut succeeded = response.metadatas.iter();
    let mut failures = response.failures.iter().peekable();
    for index in 0..total {
        if failures.peek().is_some_and(|f| f.index == index) {
            if let Some(failure) = failures.next() {
                lines.push(format!("{}{} failed", indent(1), format_index(index + 1)));
                lines.push(format!("{}Config: {}", indent(2), failure.config));
                lines.push(format!("{}Error: {}", indent(2), failure.error));
            }
        } else if let Some(meta) = succeeded.next() {
            lines.push(variant_line(index + 1, meta));
            lines.extend(annotation_lines(meta));
        }
    }
    lines
}

/// Print a processed request to stdout.
pub fn print_process_report(name: &str, query: &str, response: &Response) {
    for line in format_process_report(name, query, response) {
        println!("{}", line);
    }
}
