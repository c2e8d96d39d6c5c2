use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", render_table(headers, &rows));
}

/// Left-aligned columns separated by two spaces, with a dashed rule under the
/// header. Cells beyond the header count are printed unpadded.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..headers.len())
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(headers[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = render_line(&widths, headers.iter().copied());
    out.push_str(&render_line(&widths, rule.iter().map(String::as_str)));
    for row in rows {
        out.push_str(&render_line(&widths, row.iter().map(String::as_str)));
    }
    out
}

fn render_line<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let joined = cells
        .enumerate()
        .map(|(col, cell)| {
            let width = widths.get(col).copied().unwrap_or(0);
            format!("{cell:<width$}")
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", joined.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let table = render_table(
            &["PROJECT", "FILES"],
            &[
                vec!["Build_a_Snake".into(), "3".into()],
                vec!["Todo".into(), "12".into()],
            ],
        );
        assert_eq!(
            table,
            "PROJECT        FILES\n\
             -------------  -----\n\
             Build_a_Snake  3\n\
             Todo           12\n"
        );
    }
}
