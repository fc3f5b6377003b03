use std::cmp::Ordering;

// Variant order matters: textual runs sort below numeric ones.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Token<'a> {
    Word(&'a str),
    Number(u64),
}

fn push_run<'a>(tokens: &mut Vec<Token<'a>>, run: &'a str, numeric: bool) {
    if numeric {
        tokens.push(Token::Number(run.parse().unwrap_or(u64::MAX)));
    } else {
        tokens.push(Token::Word(run));
    }
}

/// Split a version into numeric and textual runs, dropping separators.
/// `"1.20.1-47.2.0"` becomes `[1, 20, 1, 47, 2, 0]`, `"21.0.3-beta"` becomes
/// `[21, 0, 3, "beta"]`.
fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<(usize, bool)> = None;

    for (i, c) in s.char_indices() {
        if matches!(c, '.' | '-' | '_' | '+') {
            if let Some((from, numeric)) = start.take() {
                push_run(&mut tokens, &s[from..i], numeric);
            }
            continue;
        }
        let numeric = c.is_ascii_digit();
        match start {
            Some((from, was_numeric)) if was_numeric != numeric => {
                push_run(&mut tokens, &s[from..i], was_numeric);
                start = Some((i, numeric));
            }
            Some(_) => {}
            None => start = Some((i, numeric)),
        }
    }
    if let Some((from, numeric)) = start {
        push_run(&mut tokens, &s[from..], numeric);
    }
    tokens
}

/// Compare two loader or game version strings.
///
/// Numeric runs compare numerically and textual runs sort below numeric ones.
/// When one version is a prefix of the other, the longer one is newer unless
/// its extra part starts with text, which marks a pre-release
/// (`"21.0.3-beta" < "21.0.3"`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (ta, tb) = (tokenize(a), tokenize(b));
    for (x, y) in ta.iter().zip(tb.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }

    match ta.len().cmp(&tb.len()) {
        Ordering::Greater if matches!(ta[tb.len()], Token::Word(_)) => Ordering::Less,
        Ordering::Less if matches!(tb[ta.len()], Token::Word(_)) => Ordering::Greater,
        ord => ord,
    }
}
