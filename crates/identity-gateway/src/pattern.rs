//! Glob matching for identity URLs and attribute paths.
//!
//! Patterns are literal text plus `*`, which matches any run of characters,
//! `/` included. There are no character classes and no escaping.
//!
//! Examples:
//!   - `/identity/email/*` matches `/identity/email/primary`
//!   - `https://*.test.com` matches `https://identity.test.com`
//!   - `*` matches everything

/// Check whether `candidate` matches the glob `pattern`.
///
/// Runs in O(len(candidate) * stars) time using single-star backtracking.
pub fn matches(candidate: &str, pattern: &str) -> bool {
    let c: Vec<char> = candidate.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    let (mut ci, mut pi) = (0usize, 0usize);
    let mut last_star: Option<usize> = None;
    let mut resume_at = 0usize;

    while ci < c.len() {
        if pi < p.len() && p[pi] == '*' {
            last_star = Some(pi);
            resume_at = ci;
            pi += 1;
        } else if pi < p.len() && p[pi] == c[ci] {
            ci += 1;
            pi += 1;
        } else if let Some(star) = last_star {
            // Let the last star swallow one more character and retry.
            pi = star + 1;
            resume_at += 1;
            ci = resume_at;
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&ch| ch == '*')
}

/// Strip trailing slashes so `https://a.com/` and `https://a.com` compare equal.
pub fn normalize_identity(identity: &str) -> &str {
    identity.trim_end_matches('/')
}

/// Match a requester identity against an identity pattern, normalizing both.
pub fn identity_matches(identity: &str, pattern: &str) -> bool {
    matches(normalize_identity(identity), normalize_identity(pattern))
}
