//! Quoted-reply removal

/// Drop every line that starts with `>` once leading whitespace is ignored.
///
/// Line order is preserved and nothing else is touched.
#[must_use]
pub fn strip_quoted_lines(body: &str) -> String {
    body.split('\n')
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect::<Vec<_>>()
        .join("\n")
}
