use anyhow::Context;
use projgen_core::extract::extract_object;
use std::io::Read;
use std::path::Path;

use crate::output::{print_json, print_table};

pub fn run(file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let files = extract_object(&raw)?;

    if json {
        return print_json(&files);
    }

    let rows = files
        .iter()
        .map(|(name, content)| {
            let size = match content.as_str() {
                Some(text) => format!("{} bytes", text.len()),
                None => "skipped (not text)".to_string(),
            };
            vec![name.clone(), size]
        })
        .collect();
    print_table(&["FILE", "CONTENT"], rows);
    Ok(())
}
