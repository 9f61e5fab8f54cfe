use std::fs;
use std::path::{Path, PathBuf};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Read a returns file as text.
pub fn read_text(path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let bytes = fs::read(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    if is_spreadsheet(&canonical, &bytes) {
        return Err(format!(
            "Spreadsheet input is not supported: '{}'. Export the sheet as CSV.",
            canonical.display()
        )
        .into());
    }

    let contents = String::from_utf8(bytes)
        .map_err(|_| format!("'{}' is not UTF-8 text", canonical.display()))?;
    Ok(contents)
}

/// Spreadsheet by extension, or by the zip / OLE2 signature xlsx and xls
/// files start with.
fn is_spreadsheet(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        });
    by_extension
        || bytes.starts_with(b"PK\x03\x04")
        || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0])
}

/// Resolve and validate the path.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("frontier-{}-{}", std::process::id(), name));
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_csv_text() {
        let path = write_temp("funds.csv", b"fund,p1\nA,0.01\n");
        let text = read_text(path.to_str().unwrap()).unwrap();
        assert_eq!(text, "fund,p1\nA,0.01\n");
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_xlsx_upload_rejected_with_clear_message() {
        let path = write_temp("funds.xlsx", b"PK\x03\x04\x14\x00\x06\x00\xff\xfe");
        let err = read_text(path.to_str().unwrap()).unwrap_err();
        assert!(
            err.to_string().starts_with("Spreadsheet input is not supported"),
            "got {}",
            err
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_spreadsheet_detected_by_signature() {
        assert!(is_spreadsheet(
            Path::new("upload.bin"),
            &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1]
        ));
        assert!(is_spreadsheet(Path::new("Returns.XLS"), b""));
        assert!(!is_spreadsheet(Path::new("returns.csv"), b"fund,p1\n"));
    }

    #[test]
    fn test_binary_file_is_not_utf8() {
        let path = write_temp("funds.dat", &[0x66, 0xff, 0xfe, 0x00]);
        let err = read_text(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().ends_with("is not UTF-8 text"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = read_text("/definitely/not/here.csv").unwrap_err();
        assert!(err.to_string().starts_with("File not found"));
    }
}
