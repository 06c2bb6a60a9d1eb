/// Tokens of the conditional rule language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Nil,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Question,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// Splits a rule source string into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Question);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err("unexpected '='; use '==' for comparison".to_owned());
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err("unexpected '&'; use '&&' for logical and".to_owned());
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err("unexpected '|'; use '||' for logical or".to_owned());
                }
            }
            '"' | '\'' => {
                tokens.push(lex_string(&mut chars)?);
            }
            '0'..='9' => {
                tokens.push(lex_number(&mut chars)?);
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                tokens.push(lex_ident(&mut chars));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token, String> {
    let quote = chars.next().expect("caller checked the opening quote");
    let mut value = String::new();

    loop {
        match chars.next() {
            None => return Err("unterminated string literal".to_owned()),
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(escaped @ ('\\' | '"' | '\'')) => value.push(escaped),
                Some(other) => return Err(format!("unknown escape '\\{other}'")),
                None => return Err("unterminated string literal".to_owned()),
            },
            Some(ch) if ch == quote => break,
            Some(ch) => value.push(ch),
        }
    }

    Ok(Token::Str(value))
}

fn lex_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token, String> {
    let mut text = String::new();
    let mut is_float = false;

    while let Some(&ch) = chars.peek() {
        match ch {
            '0'..='9' => {
                text.push(ch);
                chars.next();
            }
            '.' if !is_float => {
                is_float = true;
                text.push(ch);
                chars.next();
            }
            _ => break,
        }
    }

    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|err| format!("invalid float literal '{text}': {err}"))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|err| format!("invalid integer literal '{text}': {err}"))
    }
}

fn lex_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Token {
    let mut text = String::new();

    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            text.push(ch);
            chars.next();
        } else {
            break;
        }
    }

    match text.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "nil" | "null" => Token::Nil,
        _ => Token::Ident(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_and_literals() {
        let tokens = tokenize(r#"1 + 2.5 == "x" && !true"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Int(1),
                Token::Plus,
                Token::Float(2.5),
                Token::EqEq,
                Token::Str("x".to_owned()),
                Token::AndAnd,
                Token::Bang,
                Token::True,
            ]
        );
    }

    #[test]
    fn test_rule_shaped_input() {
        let tokens = tokenize(r#"IsNil(row, "email") ? Literal("N/A") : Skip()"#).unwrap();
        assert_eq!(tokens[0], Token::Ident("IsNil".to_owned()));
        assert_eq!(tokens[1], Token::LParen);
        assert_eq!(tokens[2], Token::Ident("row".to_owned()));
        assert!(tokens.contains(&Token::Question));
        assert!(tokens.contains(&Token::Colon));
    }

    #[test]
    fn test_single_quoted_string() {
        let tokens = tokenize("'a@b'").unwrap();
        assert_eq!(tokens, vec![Token::Str("a@b".to_owned())]);
    }

    #[test]
    fn test_index_tokens() {
        let tokens = tokenize(r#"row["email"]"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("row".to_owned()),
                Token::LBracket,
                Token::Str("email".to_owned()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_invalid_character() {
        assert!(tokenize("a $ b").is_err());
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("\"open").is_err());
    }
}
