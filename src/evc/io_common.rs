use std::path::Path;

/// The name of a dataset read from a file: the file name without its extension.
pub fn simplify_file_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
}

/// Turns the raw header cells into usable column names.
///
/// Blank headers become `Column_{n}` and repeated headers get a numeric suffix, so that no
/// two columns share a name.
pub fn column_names(header: &[Option<String>]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for (idx, h) in header.iter().enumerate() {
        let base = match h.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => format!("Column_{}", idx + 1),
        };
        let mut name = base.clone();
        let mut n = 2;
        while res.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        res.push(name);
    }
    res
}
