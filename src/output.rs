use std::io::Write;
use std::path::Path;

use anyhow::Context;

/// Writes `text` to `path`, or to stdout when there is no path.
pub fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => write_atomic(path, text.as_bytes()),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}

/// Writes through a scratch file next to `path` and renames it into place. The scratch
/// file is removed if anything fails before the rename, so `path` is either the complete
/// new content or untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create scratch file in {}", dir.display()))?;
    tmp.write_all(data)
        .with_context(|| format!("write scratch file: {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .context("sync scratch file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("write output: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_file_and_leaves_no_scratch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("report.txt");
        std::fs::write(&out, "old").expect("seed");

        write_output(Some(&out), "new report\n").expect("write");
        assert_eq!(std::fs::read_to_string(&out).expect("read"), "new report\n");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("list")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("report.txt")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("nope").join("report.txt");
        assert!(write_output(Some(&out), "x").is_err());
        assert!(!out.exists());
    }
}
