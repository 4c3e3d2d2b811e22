use crate::types::PipeUsed;

const MAX_WIDTH: f64 = 80.0;

/// Draws one stock piece as a bar: cuts as labelled segments, scrap as dots.
pub fn render_piece(piece: &PipeUsed, kerf: f64) -> String {
    if piece.stock_length <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / piece.stock_length;
    let bar_w = (piece.stock_length * scale).round() as usize;
    let mut bar = vec!['.'; bar_w + 1];

    let mut offset = 0.0;
    for (i, cut) in piece.cuts.iter().enumerate() {
        if i > 0 {
            offset += kerf;
        }
        let start = ((offset * scale).round() as usize).min(bar_w);
        let end = (((offset + cut.length) * scale).round() as usize).min(bar_w);
        draw_segment(&mut bar, start, end, &format_length(cut.length));
        offset += cut.length;
    }

    bar[0] = '|';
    bar[bar_w] = '|';

    let mut line: String = bar.into_iter().collect();
    line.push('\n');
    line
}

fn draw_segment(bar: &mut [char], start: usize, end: usize, label: &str) {
    for ch in bar.iter_mut().take(end).skip(start + 1) {
        *ch = '-';
    }
    bar[start] = '|';
    bar[end] = '|';

    // Label only when it fits between the edges
    let inner = end.saturating_sub(start + 1);
    let label_chars: Vec<char> = label.chars().collect();
    if inner >= label_chars.len() + 2 {
        let first = start + 1 + (inner - label_chars.len()) / 2;
        for (i, &ch) in label_chars.iter().enumerate() {
            bar[first + i] = ch;
        }
    }
}

/// Formats a length without trailing zeros: 100, 47.75, 0.125.
pub fn format_length(value: f64) -> String {
    let text = format!("{value:.3}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
