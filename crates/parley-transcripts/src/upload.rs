//! Text extraction for uploaded context files.

/// Longest filename kept, in characters.
const MAX_FILENAME_CHARS: usize = 255;

/// Name used when the client sends no usable filename.
const FALLBACK_FILENAME: &str = "upload.txt";

/// Reduces a client-supplied filename to a bare, printable name.
///
/// Directory components (either separator) and control characters are
/// dropped, and the result is truncated to 255 characters.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Renders file content as a markdown document headed by its filename.
///
/// The content is placed in a code fence that is longer than any backtick
/// run inside it, so embedded fences cannot terminate the block early.
pub fn to_markdown(filename: &str, content: &str) -> String {
    let longest_run = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    let body = content.strip_suffix('\n').unwrap_or(content);
    format!("# File: {filename}\n\n{fence}\n{body}\n{fence}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_loses_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.md"), "notes.md");
        assert_eq!(sanitize_filename("  report.txt "), "report.txt");
    }

    #[test]
    fn unusable_filenames_fall_back() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("dir/"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
    }

    #[test]
    fn markdown_wraps_content_in_fence() {
        let md = to_markdown("a.txt", "hello\n");
        assert_eq!(md, "# File: a.txt\n\n```\nhello\n```");
    }

    #[test]
    fn markdown_fence_outgrows_embedded_fences() {
        let md = to_markdown("doc.md", "before\n```rust\nfn x() {}\n```\nafter");
        assert!(md.contains("\n````\nbefore"));
        assert!(md.ends_with("after\n````"));
    }
}
