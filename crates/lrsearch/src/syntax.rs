//! Parser for the textual grammar notation.
//!
//! ```text
//! # one rule per line
//! S  -> a S b | A1
//! A1 -> a A1 | ε
//! ```
//!
//! Whitespace inside an alternative is insignificant. An ASCII uppercase
//! letter followed by ASCII digits is a nonterminal name (`S`, `A1`), every
//! other character is a terminal. `ε` or an empty alternative denotes the
//! empty body. `#` starts a comment running to the end of the line.

use logos::Logos;
use std::ops::Range;

/// A `HEAD -> alt | alt` line.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDesc {
    pub line: usize,
    pub left: String,
    pub productions: Vec<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
#[error("syntax error at line {line}: {msg}")]
pub struct SyntaxError {
    pub line: usize,
    pub msg: String,
}

// 一行分のトークン
#[derive(Debug, Copy, Clone, Logos, PartialEq)]
#[logos(skip r"\s+")]
enum Token<'source> {
    #[token("->", |lex| lex.slice())]
    #[token("→", |lex| lex.slice())]
    Arrow(&'source str),

    #[token("|")]
    VertBar,

    #[token("ε")]
    Epsilon,

    #[regex(r"[A-Z][0-9]*", |lex| lex.slice(), priority = 2)]
    Nonterminal(&'source str),

    #[regex(r"[^\s]", |lex| lex.slice())]
    Terminal(&'source str),

    #[regex(r"#[^\n]*", logos::skip)]
    Comment,
}

pub fn parse(source: &str) -> Result<Vec<RuleDesc>, SyntaxError> {
    let _entered = tracing::trace_span!("parse").entered();

    let mut rules = vec![];
    for (i, text) in source.lines().enumerate() {
        let line = i + 1;
        let tokens = lex(text, line)?;
        if tokens.is_empty() {
            continue;
        }

        // 最初に現れた矢印で左辺と右辺を分ける
        let arrow = tokens
            .iter()
            .position(|(token, _)| matches!(token, Token::Arrow(..)))
            .ok_or_else(|| SyntaxError {
                line,
                msg: "missing `->'".into(),
            })?;
        let left = match tokens[..arrow] {
            [(Token::Nonterminal(name), _)] => name,
            _ => {
                let end = tokens[arrow].1.start;
                return Err(SyntaxError {
                    line,
                    msg: format!(
                        "the left-hand side must be a nonterminal name like `S' or `A1', found `{}'",
                        text[..end].trim()
                    ),
                });
            }
        };

        let productions = tokens[arrow + 1..]
            .split(|(token, _)| *token == Token::VertBar)
            .map(|alt| parse_alternative(alt, line))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!("line {}: {} -> {:?}", line, left, productions);
        rules.push(RuleDesc {
            line,
            left: left.to_owned(),
            productions,
        });
    }

    Ok(rules)
}

fn lex(text: &str, line: usize) -> Result<Vec<(Token<'_>, Range<usize>)>, SyntaxError> {
    Token::lexer(text)
        .spanned()
        .map(|(token, span)| match token {
            Ok(token) => Ok((token, span)),
            Err(()) => Err(SyntaxError {
                line,
                msg: format!("unexpected input `{}'", &text[span]),
            }),
        })
        .collect()
}

fn parse_alternative(
    tokens: &[(Token<'_>, Range<usize>)],
    line: usize,
) -> Result<Vec<String>, SyntaxError> {
    if let [(Token::Epsilon, _)] = tokens {
        return Ok(vec![]);
    }

    let mut symbols = vec![];
    for (token, _) in tokens {
        match *token {
            Token::Epsilon => {
                return Err(SyntaxError {
                    line,
                    msg: "`ε' must be the only symbol of an alternative".into(),
                });
            }
            Token::Nonterminal(name) => symbols.push(name.to_owned()),
            Token::Terminal(ch) => symbols.push(ch.to_owned()),
            // 右辺に現れた矢印は終端記号の並びとして扱う
            Token::Arrow(arrow) => symbols.extend(arrow.chars().map(String::from)),
            Token::VertBar | Token::Comment => unreachable!(),
        }
    }
    Ok(symbols)
}
