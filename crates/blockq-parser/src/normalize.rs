use crate::lexer::{Lexer, Token};
use blockq_core::Result;

/// Canonical text form of a query: whitespace collapsed, keywords upper-cased,
/// identifiers lower-cased, literals untouched, trailing `;` dropped.
///
/// String literals are always re-quoted with `'` and any embedded `'` doubled,
/// so `"it's"` and `'it''s'` can't be confused with a pair of literals.
///
/// Two texts that normalize equal parse to the same plan, so the result is
/// usable as a cache key.
pub fn normalize(query: &str) -> Result<String> {
    let tokens = Lexer::new(query).tokenize()?;
    let mut parts = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Eof => break,
            Token::Semicolon if matches!(tokens.get(i + 1), Some(Token::Eof)) => continue,
            Token::Identifier(id) => parts.push(id.to_ascii_lowercase()),
            Token::String(s) => parts.push(quote_literal(s)),
            other => parts.push(other.to_string()),
        }
    }

    Ok(parts.join(" "))
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_and_case_insensitive() {
        let a = normalize("select *   from SLOTS\n limit 5;").unwrap();
        let b = normalize("SELECT * FROM slots LIMIT 5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "SELECT * FROM slots LIMIT 5");
    }

    #[test]
    fn test_string_literals_keep_case() {
        let a = normalize("SELECT * FROM token_supply WHERE symbol = 'USDC'").unwrap();
        let b = normalize("SELECT * FROM token_supply WHERE symbol = 'usdc'").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_embedded_quotes_do_not_collide() {
        let one_literal =
            normalize(r#"SELECT signature FROM transactions WHERE status = "a' OR status = 'b""#)
                .unwrap();
        let two_literals =
            normalize("SELECT signature FROM transactions WHERE status = 'a' OR status = 'b'")
                .unwrap();
        assert_ne!(one_literal, two_literals);
        assert_eq!(
            one_literal,
            "SELECT signature FROM transactions WHERE status = 'a'' OR status = ''b'"
        );
    }

    #[test]
    fn test_quote_style_does_not_matter() {
        assert_eq!(
            normalize(r#"SELECT * FROM token_supply WHERE symbol = "USDC""#).unwrap(),
            normalize("SELECT * FROM token_supply WHERE symbol = 'USDC'").unwrap()
        );
    }

    #[test]
    fn test_not_equal_spellings_agree() {
        assert_eq!(
            normalize("SELECT * FROM slots WHERE slot <> 1").unwrap(),
            normalize("SELECT * FROM slots WHERE slot != 1").unwrap()
        );
    }
}
