/// Remove `#` comments, trim whitespace and drop blank entries.
///
/// Order is preserved and duplicates are kept; cleaning twice yields the
/// same result as cleaning once.
pub fn clean_lines<I>(lines: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref();
            let without_comment = match line.find('#') {
                Some(index) => &line[..index],
                None => line,
            };
            let trimmed = without_comment.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
