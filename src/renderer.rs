use crate::model::Puzzle;

/// Per-bottle classification of a puzzle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PuzzleAnalysis {
    pub mixed_bottles: usize,
    pub single_color_bottles: usize,
    pub empty_bottles: usize,
    pub lines: Vec<String>,
}

pub fn analyze(puzzle: &Puzzle) -> PuzzleAnalysis {
    let mut analysis = PuzzleAnalysis::default();
    for (index, bottle) in puzzle.get_bottles().iter().enumerate() {
        let line = if bottle.is_empty() {
            analysis.empty_bottles += 1;
            format!("bottle {index}: empty")
        } else if bottle.is_monochrome() {
            analysis.single_color_bottles += 1;
            format!("bottle {index}: single color {}", bottle.get_colors()[0])
        } else {
            analysis.mixed_bottles += 1;
            let mut colors: Vec<_> = bottle.get_colors().to_vec();
            colors.sort_unstable();
            colors.dedup();
            let labels: Vec<String> = colors.iter().map(|c| c.to_string()).collect();
            format!("bottle {index}: mixed ({})", labels.join(", "))
        };
        analysis.lines.push(line);
    }
    analysis
}

/// Columns of cells, top level first, bottle indices underneath.
pub fn render_board(puzzle: &Puzzle) -> String {
    let width = puzzle
        .get_bottles()
        .iter()
        .flat_map(|b| b.get_colors())
        .map(|c| c.get_letter_representation().len())
        .chain(std::iter::once(puzzle.bottle_count().saturating_sub(1).to_string().len()))
        .max()
        .unwrap_or(1);

    let mut out = String::new();
    for level in (0..puzzle.get_bottle_height()).rev() {
        let row: Vec<String> = puzzle
            .get_bottles()
            .iter()
            .map(|bottle| match bottle.get_colors().get(level) {
                Some(color) => format!("[{:^width$}]", color.get_letter_representation()),
                None => format!("[{:^width$}]", ""),
            })
            .collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    let indices: Vec<String> = (0..puzzle.bottle_count())
        .map(|i| format!(" {i:^width$} "))
        .collect();
    out.push_str(&indices.join(" "));
    out.push('\n');
    out
}

pub fn render_analysis(puzzle: &Puzzle) -> String {
    let analysis = analyze(puzzle);
    format!(
        "{}\ntotal: {} mixed, {} single color, {} empty",
        analysis.lines.join("\n"),
        analysis.mixed_bottles,
        analysis.single_color_bottles,
        analysis.empty_bottles
    )
}
