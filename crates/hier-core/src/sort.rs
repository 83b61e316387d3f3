use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.trim_start_matches('0');
    let rhs = rhs.trim_start_matches('0');
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}

/// Case-insensitive natural order: `Node 2` sorts before `node 10`.
#[must_use]
pub fn compare_labels(lhs: &str, rhs: &str) -> Ordering {
    let mut lhs_chars = lhs.chars().peekable();
    let mut rhs_chars = rhs.chars().peekable();
    loop {
        match (lhs_chars.peek().copied(), rhs_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering =
                    compare_numbers(&take_digits(&mut lhs_chars), &take_digits(&mut rhs_chars));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                lhs_chars.next();
                rhs_chars.next();
            }
        }
    }
}

/// Stable sort by label.
pub fn sort_by_label<T>(items: &mut [T], label: impl Fn(&T) -> &str) {
    items.sort_by(|lhs, rhs| compare_labels(label(lhs), label(rhs)));
}
