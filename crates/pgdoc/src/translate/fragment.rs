use crate::ast::{Fragment, FragmentPart};
use crate::param::normalize_name;

/// Tokenize a raw SQL fragment.
///
/// `@name` tokens outside string literals become normalized parameter parts;
/// `@@name` (server variables) and everything inside `'...'` is left alone.
pub fn parse_fragment(sql: &str) -> Fragment {
    let mut parts = Vec::new();
    let mut raw = String::new();
    let mut in_string = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_string = !in_string;
                raw.push(c);
            }
            '@' if !in_string => match chars.peek() {
                Some('@') => {
                    raw.push_str("@@");
                    chars.next();
                    while let Some(&n) = chars.peek() {
                        if !is_ident_char(n) {
                            break;
                        }
                        raw.push(n);
                        chars.next();
                    }
                }
                Some(&n) if n == '_' || n.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !is_ident_char(n) {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if !raw.is_empty() {
                        parts.push(FragmentPart::Raw(std::mem::take(&mut raw)));
                    }
                    parts.push(FragmentPart::Param(normalize_name(&name)));
                }
                _ => raw.push(c),
            },
            _ => raw.push(c),
        }
    }
    if !raw.is_empty() {
        parts.push(FragmentPart::Raw(raw));
    }
    Fragment { parts }
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> FragmentPart {
        FragmentPart::Raw(s.into())
    }

    fn param(s: &str) -> FragmentPart {
        FragmentPart::Param(s.into())
    }

    #[test]
    fn tokens_are_normalized() {
        let f = parse_fragment("[Age] > @MinAge AND [Age] < @Max_Age");
        assert_eq!(
            f.parts,
            vec![
                raw("[Age] > "),
                param("minage"),
                raw(" AND [Age] < "),
                param("max_age"),
            ]
        );
    }

    #[test]
    fn string_literals_and_server_variables_are_untouched() {
        let f = parse_fragment("[Email] LIKE '%@example.com' AND @@ROWCOUNT > 0 AND [X] = @x");
        assert_eq!(
            f.parts,
            vec![
                raw("[Email] LIKE '%@example.com' AND @@ROWCOUNT > 0 AND [X] = "),
                param("x"),
            ]
        );
    }

    #[test]
    fn lone_at_signs_stay_raw() {
        let f = parse_fragment("\"Tags\" @> '[1]' AND 1 = 1");
        assert_eq!(f.parts, vec![raw("\"Tags\" @> '[1]' AND 1 = 1")]);
        assert_eq!(f.params().count(), 0);
    }
}
