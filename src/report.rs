use shardx::bound::BoundSolution;
use shardx::tree::ClassificationTree;
use shardx::SifMode;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Column titles of the tree summary.
const TREE_COLUMNS: [&str; 6] = ["Lvl", "Branch", "Total", "Succ.", "Fail", "Graph"];

/// Pad `value` to `width` characters.
fn aligned(value: &str, width: usize, right: bool) -> String {
    if right {
        format!("{value:>width$}")
    } else {
        format!("{value:<width$}")
    }
}

/// Render the classification tree as a table, one row per node in pre-order.
///
/// The graph column shows successful members as `+` and failed members as
/// `-`, scaled so that the root fills the column.
#[must_use]
pub fn render_tree(tree: &ClassificationTree, row_length: usize) -> String {
    let nodes = tree.descendants(tree.root());
    let rows: Vec<[String; 5]> = nodes
        .iter()
        .map(|&node| {
            let counts = tree.member_counts(node);
            let level = tree.level(node);
            [
                level.to_string(),
                format!("{} {}", "-".repeat(level), tree.name(node).unwrap_or_default()),
                counts.total.to_string(),
                counts.successful.to_string(),
                counts.failed.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = TREE_COLUMNS[..5].iter().map(|title| title.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let used: usize = widths.iter().sum::<usize>() + widths.len() + 1;
    let graph_width = row_length.saturating_sub(used).max(TREE_COLUMNS[5].len() + 2);
    widths.push(graph_width);

    let mut output = String::new();
    let mut separator = String::new();
    for (title, width) in TREE_COLUMNS.iter().zip(widths.iter().copied()) {
        write!(&mut output, "|{title:^width$}").expect("writing to string cannot fail");
        write!(&mut separator, "|{}", "-".repeat(width)).expect("writing to string cannot fail");
    }
    writeln!(&mut output).expect("writing to string cannot fail");
    writeln!(&mut output, "{separator}").expect("writing to string cannot fail");

    let root_total = tree.member_counts(tree.root()).total;
    for (node, row) in nodes.iter().zip(&rows) {
        for (idx, (cell, width)) in row.iter().zip(&widths).enumerate() {
            output.push('|');
            output.push_str(&aligned(cell, *width, idx != 1));
        }
        let counts = tree.member_counts(*node);
        let bar = bar_graph(counts.successful, counts.failed, root_total, graph_width - 2);
        writeln!(&mut output, "|[{bar}]").expect("writing to string cannot fail");
    }
    output
}

/// Bar of `length` characters at most, proportional to `successful + failed` over `scale`.
fn bar_graph(successful: usize, failed: usize, scale: usize, length: usize) -> String {
    if scale == 0 {
        return String::new();
    }
    let total = successful + failed;
    let filled = length * total / scale;
    let plus = if total == 0 { 0 } else { filled * successful / total };
    format!("{}{}", "+".repeat(plus), "-".repeat(filled - plus))
}

/// Render the outcome of the bound searches of one branch.
#[must_use]
pub fn render_bounds(branch: &str, mode: SifMode, bounds: &BTreeMap<String, BoundSolution>) -> String {
    let mut output = String::new();
    writeln!(&mut output, "Confidence bounds for {branch} ({mode})").expect("writing to string cannot fail");
    for (name, solution) in bounds {
        let Some(step) = solution.last() else {
            writeln!(&mut output, "{name:>8}: no probe").expect("writing to string cannot fail");
            continue;
        };
        writeln!(
            &mut output,
            "{name:>8}: sigma = {:.3}, inside = {:.2} %, {:?} after {} iterations",
            step.sigma,
            step.percentage,
            solution.status,
            solution.iterations()
        )
        .expect("writing to string cannot fail");
    }
    output
}
