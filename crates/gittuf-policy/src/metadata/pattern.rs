//! Path pattern matching for delegated rules.
//!
//! Shell-style wildcards: `*` matches any run of characters, including
//! `/`, and `?` matches exactly one character. `**` is accepted and means
//! the same as `*`. Everything else matches literally.

/// Check whether `path` matches `pattern`.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let path: Vec<char> = path.chars().collect();

    let (mut p, mut s) = (0usize, 0usize);
    // Position of the last `*` in the pattern and the path index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while s < path.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == path[s]) && pattern[p] != '*' {
            p += 1;
            s += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, s));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            s = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
