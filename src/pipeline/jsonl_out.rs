use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::Record;

/// Append to a daily-rotated items file under `output_dir`.
/// Pattern: items_YYYY-MM-DD.jsonl and a symlink `items.jsonl` pointing to current.
pub fn append_rotating(output_dir: &Path, record: &Record) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    let date_str = Utc::now().format("%Y-%m-%d");
    let file_name = format!("items_{}.jsonl", date_str);
    let target_path = output_dir.join(&file_name);

    let symlink_path = output_dir.join("items.jsonl");
    ensure_symlink_to_current(&symlink_path, &target_path)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target_path)?;
    let line = serde_json::to_string(record)?;
    match writeln!(file, "{}", line) {
        Ok(_) => {
            metrics::counter!("items_written").increment(1);
            metrics::counter!("items_bytes_written").increment(line.len() as u64);
        }
        Err(e) => {
            metrics::counter!("items_write_errors").increment(1);
            return Err(e.into());
        }
    }

    Ok(())
}

fn ensure_symlink_to_current(link_path: &Path, target_path: &Path) -> Result<()> {
    // If link exists, check if it already points to target; otherwise, replace it.
    if link_path.exists() {
        let mut needs_update = true;
        if let Ok(curr_target) = fs::read_link(link_path) {
            if paths_equivalent(&curr_target, target_path) {
                needs_update = false;
            }
        }
        if needs_update {
            let _ = fs::remove_file(link_path);
        } else {
            return Ok(());
        }
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(target_path, link_path)?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_file(target_path, link_path)?;
    Ok(())
}

fn paths_equivalent(a: &Path, b: &Path) -> bool {
    // Best-effort comparison using canonicalize; fall back to direct compare
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ac), Ok(bc)) => ac == bc,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ItemMeta, Vessel};

    fn sample_record() -> Record {
        Record {
            meta: ItemMeta::new("MaritimeConnector", "maritime_connector", Utc::now()),
            item: Item::Vessel(Vessel {
                name: Some("BERRIZ".to_string()),
                imo: Some("6510215".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn rotating_append_creates_dated_file_and_symlink() {
        let dir = tempfile::tempdir().unwrap();
        append_rotating(dir.path(), &sample_record()).unwrap();
        append_rotating(dir.path(), &sample_record()).unwrap();

        let date_str = Utc::now().format("%Y-%m-%d");
        let dated = dir.path().join(format!("items_{}.jsonl", date_str));
        assert!(dated.exists());

        let link = dir.path().join("items.jsonl");
        assert!(link.exists());
        let content = fs::read_to_string(&link).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["kind"], "vessel");
        assert_eq!(parsed["imo"], "6510215");
    }
}
