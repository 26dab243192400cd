//! Build constraint expressions.
//!
//! Two syntaxes select files for a configuration:
//!
//! - `//go:build linux && (amd64 || arm64) && !cgo`
//! - `// +build linux,amd64 darwin` (space is OR, comma is AND, `!` negates;
//!   several lines are ANDed together)
//!
//! Both parse into the same [`Expr`] tree.

use thiserror::Error;

/// A malformed constraint line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid build constraint {line:?}: {reason}")]
pub struct ConstraintError {
    /// The offending text
    pub line: String,
    /// What went wrong
    pub reason: String,
}

/// A parsed build constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A single tag
    Tag(String),
    /// `!x`
    Not(Box<Expr>),
    /// `x && y`
    And(Box<Expr>, Box<Expr>),
    /// `x || y`
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate with `ok` deciding whether a single tag is satisfied.
    pub fn eval(&self, ok: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Tag(tag) => ok(tag),
            Self::Not(x) => !x.eval(ok),
            Self::And(x, y) => x.eval(ok) && y.eval(ok),
            Self::Or(x, y) => x.eval(ok) || y.eval(ok),
        }
    }

    /// Every tag mentioned in the expression, in order of appearance.
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Tag(tag) => out.push(tag),
            Self::Not(x) => x.collect_tags(out),
            Self::And(x, y) | Self::Or(x, y) => {
                x.collect_tags(out);
                y.collect_tags(out);
            }
        }
    }

    fn and(x: Self, y: Self) -> Self {
        Self::And(Box::new(x), Box::new(y))
    }

    fn or(x: Self, y: Self) -> Self {
        Self::Or(Box::new(x), Box::new(y))
    }
}

/// Returns `true` if `line` is a `//go:build` comment.
#[must_use]
pub fn is_go_build(line: &str) -> bool {
    go_build_body(line).is_some()
}

/// Returns `true` if `line` is a `// +build` comment.
#[must_use]
pub fn is_plus_build(line: &str) -> bool {
    plus_build_body(line).is_some()
}

fn go_build_body(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("//go:build")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn plus_build_body(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("//")?.trim_start();
    let rest = rest.strip_prefix("+build")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parse a `//go:build` line.
///
/// # Errors
///
/// Returns [`ConstraintError`] if the line is not a `//go:build` comment or
/// the expression is malformed.
pub fn parse_go_build(line: &str) -> Result<Expr, ConstraintError> {
    let fail = |reason: &str| ConstraintError {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let body = go_build_body(line).ok_or_else(|| fail("not a //go:build line"))?;
    let tokens = tokenize(body).map_err(|reason| fail(&reason))?;
    if tokens.is_empty() {
        return Err(fail("empty expression"));
    }

    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or().map_err(|reason| fail(&reason))?;
    if parser.pos != parser.tokens.len() {
        return Err(fail("unexpected token after expression"));
    }
    Ok(expr)
}

/// Parse a `// +build` line.
///
/// # Errors
///
/// Returns [`ConstraintError`] if the line is not a `// +build` comment or a
/// term is malformed.
pub fn parse_plus_build(line: &str) -> Result<Expr, ConstraintError> {
    let fail = |reason: &str| ConstraintError {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let body = plus_build_body(line).ok_or_else(|| fail("not a // +build line"))?;

    let mut any: Option<Expr> = None;
    for field in body.split_whitespace() {
        let mut all: Option<Expr> = None;
        for term in field.split(',') {
            let (negated, tag) = match term.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, term),
            };
            if tag.is_empty() || tag.starts_with('!') || !tag.chars().all(is_tag_char) {
                return Err(fail(&format!("invalid term {term:?}")));
            }
            let mut x = Expr::Tag(tag.to_string());
            if negated {
                x = Expr::Not(Box::new(x));
            }
            all = Some(match all {
                Some(prev) => Expr::and(prev, x),
                None => x,
            });
        }
        if let Some(all) = all {
            any = Some(match any {
                Some(prev) => Expr::or(prev, all),
                None => all,
            });
        }
    }

    any.ok_or_else(|| fail("empty constraint"))
}

/// AND together several `// +build` lines.
///
/// # Errors
///
/// Returns the first [`ConstraintError`] among the lines.
pub fn parse_plus_build_lines<S: AsRef<str>>(lines: &[S]) -> Result<Option<Expr>, ConstraintError> {
    let mut combined: Option<Expr> = None;
    for line in lines {
        let x = parse_plus_build(line.as_ref())?;
        combined = Some(match combined {
            Some(prev) => Expr::and(prev, x),
            None => x,
        });
    }
    Ok(combined)
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '!' => tokens.push(Token::Not),
            '&' | '|' => {
                if chars.next_if(|&(_, next)| next == c).is_none() {
                    return Err(format!("expected {c}{c} at offset {i}"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if is_tag_char(c) => {
                let mut end = i + c.len_utf8();
                while let Some((j, next)) = chars.next_if(|&(_, next)| is_tag_char(next)) {
                    end = j + next.len_utf8();
                }
                tokens.push(Token::Tag(body[i..end].to_string()));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut x = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            x = Expr::or(x, self.and()?);
        }
        Ok(x)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut x = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            x = Expr::and(x, self.not()?);
        }
        Ok(x)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let x = self.or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err("missing )".to_string());
                }
                self.pos += 1;
                Ok(x)
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                Ok(Expr::Tag(tag))
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn satisfied_by<'a>(tags: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
        move |tag| tags.contains(&tag)
    }

    #[rstest]
    #[case::single("//go:build linux", &["linux"], true)]
    #[case::single_miss("//go:build linux", &["darwin"], false)]
    #[case::and("//go:build linux && amd64", &["linux", "amd64"], true)]
    #[case::and_miss("//go:build linux && amd64", &["linux", "arm64"], false)]
    #[case::or("//go:build linux || darwin", &["darwin"], true)]
    #[case::not("//go:build !windows", &["linux"], true)]
    #[case::precedence("//go:build a || b && c", &["a"], true)]
    #[case::parens("//go:build (a || b) && c", &["a"], false)]
    #[case::double_not("//go:build !!cgo", &["cgo"], true)]
    #[case::release("//go:build go1.18", &["go1.18"], true)]
    fn go_build_evaluates(#[case] line: &str, #[case] tags: &[&str], #[case] expected: bool) {
        let expr = parse_go_build(line).expect("should parse");
        assert_eq!(expr.eval(&satisfied_by(tags)), expected);
    }

    #[rstest]
    #[case::dangling_op("//go:build linux &&")]
    #[case::single_amp("//go:build linux & amd64")]
    #[case::unbalanced("//go:build (linux")]
    #[case::empty("//go:build")]
    #[case::junk("//go:build linux $ amd64")]
    fn go_build_rejects_malformed(#[case] line: &str) {
        assert!(parse_go_build(line).is_err());
    }

    #[rstest]
    #[case::or_fields("// +build linux darwin", &["darwin"], true)]
    #[case::and_terms("// +build linux,386", &["linux", "amd64"], false)]
    #[case::negation("// +build !cgo", &[], true)]
    #[case::mixed("// +build linux,!cgo darwin", &["linux", "cgo"], false)]
    fn plus_build_evaluates(#[case] line: &str, #[case] tags: &[&str], #[case] expected: bool) {
        let expr = parse_plus_build(line).expect("should parse");
        assert_eq!(expr.eval(&satisfied_by(tags)), expected);
    }

    #[test]
    fn plus_build_lines_are_anded() {
        let expr = parse_plus_build_lines(&["// +build linux darwin", "// +build amd64"])
            .expect("should parse")
            .expect("should be non-empty");

        assert!(expr.eval(&satisfied_by(&["linux", "amd64"])));
        assert!(!expr.eval(&satisfied_by(&["linux", "arm64"])));
    }

    #[test]
    fn plus_build_rejects_double_negation() {
        assert!(parse_plus_build("// +build !!linux").is_err());
    }

    #[test]
    fn recognizes_constraint_lines() {
        assert!(is_go_build("//go:build linux"));
        assert!(!is_go_build("//go:buildlinux"));
        assert!(!is_go_build("// go:build linux"));
        assert!(is_plus_build("// +build linux"));
        assert!(is_plus_build("//+build linux"));
        assert!(!is_plus_build("// +builder"));
    }

    #[test]
    fn tags_lists_every_mentioned_tag() {
        let expr = parse_go_build("//go:build (linux || darwin) && !cgo").unwrap();
        assert_eq!(expr.tags(), vec!["linux", "darwin", "cgo"]);
    }

    proptest! {
        #[test]
        fn tag_or_its_negation_always_holds(tag in "[a-z][a-z0-9_]{0,8}", set in any::<bool>()) {
            let line = format!("//go:build {tag} || !{tag}");
            let expr = parse_go_build(&line).unwrap();
            prop_assert!(expr.eval(&|_| set));
        }

        #[test]
        fn plus_build_and_go_build_agree(a in "[a-z]{1,6}", b in "[a-z]{1,6}", sa in any::<bool>(), sb in any::<bool>()) {
            let plus = parse_plus_build(&format!("// +build {a},!{b}")).unwrap();
            let go = parse_go_build(&format!("//go:build {a} && !{b}")).unwrap();
            let ok = |tag: &str| if tag == a { sa } else if tag == b { sb } else { false };
            prop_assert_eq!(plus.eval(&ok), go.eval(&ok));
        }
    }
}
