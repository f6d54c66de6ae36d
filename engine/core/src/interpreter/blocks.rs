//! Single-append renderers
//!
//! Pure functions from a step payload to the lines it appends. Nothing here
//! waits or touches the sink, which keeps layout easy to test.

use crate::palette::{Tone, RESET};
use crate::step::{
    AmbientStep, CodeStep, SectionStep, SectionStyle, StatusStep, TableStep, TableStyle,
    TextStep, TreeNode,
};

fn width(text: &str) -> usize {
    text.chars().count()
}

fn pad_end(text: &str, target: usize) -> String {
    let mut out = text.to_string();
    out.extend(std::iter::repeat(' ').take(target.saturating_sub(width(text))));
    out
}

/// Final form of a text step
#[must_use]
pub fn text(step: &TextStep) -> String {
    step.tone.paint(&step.content)
}

/// Boot-log style status line
#[must_use]
pub fn status(step: &StatusStep) -> String {
    let label = step.kind.tone().paint(step.kind.label());
    match &step.prefix {
        Some(prefix) => format!("{label} {prefix} {}", step.text),
        None => format!("{label} {}", step.text),
    }
}

/// Section with its border
#[must_use]
pub fn section(step: &SectionStep) -> Vec<String> {
    let body = step.content.lines();
    let inner = body
        .iter()
        .map(|line| width(line))
        .chain(std::iter::once(width(&step.title)))
        .max()
        .unwrap_or(0)
        + 4;
    let open = step.tone.open();
    let close = if open.is_empty() { "" } else { RESET };

    match step.style {
        SectionStyle::Box => {
            let rule = "═".repeat(inner);
            let row = |text: &str| {
                format!("{open}║{close} {}{open}║{close}", pad_end(text, inner - 1))
            };
            let mut lines = Vec::with_capacity(body.len() + 4);
            lines.push(format!("{open}╔{rule}╗{close}"));
            lines.push(row(&step.title));
            lines.push(format!("{open}╠{rule}╣{close}"));
            lines.extend(body.iter().map(|line| row(line)));
            lines.push(format!("{open}╚{rule}╝{close}"));
            lines
        }
        SectionStyle::Line => {
            let tail = "─".repeat(inner.saturating_sub(width(&step.title) + 4));
            std::iter::once(format!("{open}── {} {tail}{close}", step.title))
                .chain(body.iter().map(|line| format!("  {line}")))
                .collect()
        }
        SectionStyle::Minimal => std::iter::once(format!("{open}[{}]{close}", step.title))
            .chain(body.iter().map(|line| format!("  {line}")))
            .collect(),
    }
}

/// Column-aligned table
#[must_use]
pub fn table(step: &TableStep) -> Vec<String> {
    let columns = step.headers.len();
    let cell = |row: &[String], i: usize| row.get(i).map_or("", String::as_str).to_string();
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            step.rows
                .iter()
                .map(|row| width(&cell(row, i)))
                .chain(std::iter::once(width(&step.headers[i])))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let join_row = |row: &[String], separator: &str| {
        (0..columns)
            .map(|i| pad_end(&cell(row, i), widths[i]))
            .collect::<Vec<_>>()
            .join(separator)
    };
    let header = |separator: &str| Tone::Highlight.paint(&join_row(&step.headers, separator));

    match step.style {
        TableStyle::Box => {
            let rule = |left: &str, mid: &str, right: &str| {
                let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
                format!("{left}{}{right}", segments.join(mid))
            };
            let mut lines = vec![
                rule("┌", "┬", "┐"),
                format!("│ {} │", header(" │ ")),
                rule("├", "┼", "┤"),
            ];
            lines.extend(
                step.rows
                    .iter()
                    .map(|row| format!("│ {} │", join_row(row, " │ "))),
            );
            lines.push(rule("└", "┴", "┘"));
            lines
        }
        TableStyle::Simple => {
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            let mut lines = vec![header("  "), Tone::Dim.paint(&rule.join("  "))];
            lines.extend(step.rows.iter().map(|row| join_row(row, "  ")));
            lines
        }
        TableStyle::Minimal => std::iter::once(header("  "))
            .chain(step.rows.iter().map(|row| join_row(row, "  ")))
            .collect(),
    }
}

/// Box-drawn tree, root first
#[must_use]
pub fn tree(root: &TreeNode) -> Vec<String> {
    fn walk(node: &TreeNode, prefix: &str, last: bool, out: &mut Vec<String>) {
        let (connector, extension) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push(format!("{prefix}{connector}{}", node.name));
        let child_prefix = format!("{prefix}{extension}");
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            walk(child, &child_prefix, i + 1 == count, out);
        }
    }

    let mut out = vec![root.name.clone()];
    let count = root.children.len();
    for (i, child) in root.children.iter().enumerate() {
        walk(child, "", i + 1 == count, &mut out);
    }
    out
}

/// Line-numbered code block
#[must_use]
pub fn code(step: &CodeStep) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(language) = &step.language {
        out.push(Tone::Dim.paint(&format!("[{language}]")));
    }
    for (i, line) in step.content.split('\n').enumerate() {
        let number = i + 1;
        let marked = step.highlight.contains(&number);
        let gutter = if marked { Tone::Highlight } else { Tone::Dim };
        let body = if marked {
            Tone::Warning.paint(line)
        } else {
            line.to_string()
        };
        out.push(format!("{} │ {body}", gutter.paint(&format!("{number:>3}"))));
    }
    out
}

/// Line announcing an ambient device command
#[must_use]
pub fn ambient(step: &AmbientStep) -> String {
    let message = step
        .message
        .clone()
        .unwrap_or_else(|| step.action.default_message(step.value));
    format!("{} {message}", Tone::Quantum.paint("[Stream]"))
}
