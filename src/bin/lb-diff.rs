//! lb-diff - reference annotation diff tool.
//!
//! Usage: `lb-diff <old.json> <new.json> > diff.json`
//!
//! Reads two JSON arrays of annotation records and writes the classified
//! diff items as a JSON array on stdout. Exits 2 on usage or input errors.

use logbook::classify::classify;
use logbook::models::AnnotationRecord;
use std::fs;
use std::io::{self, Write};
use std::process;

fn read_records(path: &str) -> Result<Vec<AnnotationRecord>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path, e))
}

fn run(args: &[String]) -> Result<(), String> {
    let [old_path, new_path] = args else {
        return Err("usage: lb-diff <old.json> <new.json>".to_string());
    };
    let old = read_records(old_path)?;
    let new = read_records(new_path)?;
    let items = classify(&old, &new);

    let json = serde_json::to_string(&items).map_err(|e| e.to_string())?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).map_err(|e| e.to_string())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("lb-diff: {}", e);
        process::exit(2);
    }
}
