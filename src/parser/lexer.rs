//! Very small hand-written lexer for BRUCE/KYLIE command files.
//!
//! Each line is stripped of its comment and split on whitespace; the
//! resulting words form one flat token stream. Line breaks carry no
//! meaning past this point, so a command and its block may span lines.
//
//  Lexical items:
//
//      Command  ::= '#' NAME
//      Open     ::= '{'
//      Close    ::= '}'
//      Word     ::= any other whitespace-free run
//      Comments ('!' or '%' until end-of-line) are discarded.

use std::str::{Lines, SplitWhitespace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Command(&'a str), // `#name`, without the `#`
    Open,             // '{'
    Close,            // '}'
    Word(&'a str),
}

/// A token together with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub line: usize,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    lines: Lines<'a>,
    words: Option<SplitWhitespace<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            lines: src.lines(),
            words: None,
            line: 0,
        }
    }

    fn next_word(&mut self) -> Option<&'a str> {
        loop {
            if let Some(word) = self.words.as_mut().and_then(|w| w.next()) {
                return Some(word);
            }
            let line = self.lines.next()?;
            self.line += 1;
            self.words = Some(strip_comment(line).split_whitespace());
        }
    }
}

/// Drop everything from the first `!` or `%` onwards.
pub fn strip_comment(line: &str) -> &str {
    match line.find(|c| c == '!' || c == '%') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn classify(word: &str) -> Token<'_> {
    match word {
        "{" => Token::Open,
        "}" => Token::Close,
        w => match w.strip_prefix('#') {
            Some(name) => Token::Command(name),
            None => Token::Word(w),
        },
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Spanned<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let word = self.next_word()?;
        Some(Spanned {
            token: classify(word),
            line: self.line,
        })
    }
}
