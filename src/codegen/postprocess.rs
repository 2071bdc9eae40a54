//! Text-level clean-up of a generated script.

/// Unifies line endings, strips trailing whitespace, collapses runs of blank
/// lines and ends the script with exactly one newline.
pub fn normalize(script: &str) -> String {
    let unified = script.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut previous_blank = true;
    for line in unified.lines() {
        let line = line.trim_end();
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push_str(line);
        out.push('\n');
        previous_blank = blank;
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
