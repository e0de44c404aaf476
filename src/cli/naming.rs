const SOURCE_PREFIX: &str = "source_";
const ARCHIVE_PREFIX: &str = "archive_";
const ARCHIVE_EXTENSION: &str = ".zip";
const TEXT_EXTENSIONS: [&str; 2] = [".csv", ".txt"];

/// Maps the name the server assigned to an upload onto the name of its result
/// file in `/complete`.
///
/// Only the first `source_` is replaced. A `.csv` or `.txt` ending then becomes
/// `.zip`. Names without `source_` were not produced by an upload and are
/// returned untouched.
pub fn result_name(uploaded: &str) -> String {
    if !uploaded.contains(SOURCE_PREFIX) {
        return uploaded.to_string();
    }

    let renamed = uploaded.replacen(SOURCE_PREFIX, ARCHIVE_PREFIX, 1);

    if TEXT_EXTENSIONS.iter().any(|ext| renamed.ends_with(ext)) {
        let stem = &renamed[..renamed.len() - 4];
        return format!("{}{}", stem, ARCHIVE_EXTENSION);
    }

    renamed
}
