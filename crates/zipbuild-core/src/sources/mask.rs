//! Wildcard file masks.

/// A case-insensitive wildcard mask.
///
/// Supports `*` (any run of characters, including none) and `?` (exactly one
/// character). Everything else matches literally; there is no regex or
/// character-class syntax. `*.*` matches every name, with or without an
/// extension.
///
/// # Examples
///
/// ```
/// use zipbuild_core::sources::FileMask;
///
/// let mask = FileMask::new("report_??.CSV");
/// assert!(mask.matches("Report_01.csv"));
/// assert!(!mask.matches("report_1.csv"));
///
/// assert!(FileMask::new("*.*").matches("Makefile"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMask {
    pattern: Vec<char>,
}

impl FileMask {
    /// Parses a mask. An empty mask behaves like `*`.
    #[must_use]
    pub fn new(mask: &str) -> Self {
        let mask = mask.trim();
        let mask = if mask.is_empty() || mask == "*.*" {
            "*"
        } else {
            mask
        };
        Self {
            pattern: fold(mask).collect(),
        }
    }

    /// Tests a file name against the mask.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = fold(name).collect();
        wildcard_match(&self.pattern, &name)
    }
}

fn fold(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase)
}

/// Iterative matcher with single-star backtracking.
fn wildcard_match(pattern: &[char], name: &[char]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(&c) if c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match star {
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n + 1;
                    star = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
