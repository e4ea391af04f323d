//! JCR-SQL2 subset: tokenizer, parser and node matcher.
//!
//! Grammar:
//! ```text
//! Query      ::= 'SELECT' '*' 'FROM' '[' Type ']' ( 'AS' Alias )?
//!                ( 'WHERE' Condition ( 'AND' Condition )* )?
//! Condition  ::= PathFn '(' ( Alias ',' )? PathLit ')'
//!              | Property ( '=' | '<>' ) Literal
//!              | Property 'IS' 'NOT'? 'NULL'
//!              | 'NAME' '(' Alias? ')' '=' StringLit
//! PathFn     ::= 'ISDESCENDANTNODE' | 'ISCHILDNODE' | 'ISSAMENODE'
//! Property   ::= ( Alias '.' )? ( '[' name ']' | name )
//! PathLit    ::= StringLit | '[' path ']'
//! Literal    ::= StringLit | Integer | Decimal | 'true' | 'false'
//! ```
//! Keywords are case-insensitive. The type `nt:base` matches every node.

use retrofit_types::path;
use retrofit_types::{Node, Result, RetrofitError, Value};

const LANGUAGE: &str = "JCR-SQL2";
const ANY_TYPE: &str = "nt:base";

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub node_type: String,
    pub alias: Option<String>,
    pub conditions: Vec<Condition>,
}

/// One conjunct of the `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IsDescendantNode(String),
    IsChildNode(String),
    IsSameNode(String),
    Compare {
        property: String,
        operator: Operator,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
    NameEquals(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
}

impl Query {
    /// `true` if the node has the selected type and satisfies every condition.
    pub fn matches(&self, node: &Node) -> bool {
        let type_ok =
            self.node_type == ANY_TYPE || node.primary_type() == Some(self.node_type.as_str());
        type_ok && self.conditions.iter().all(|c| c.matches(node))
    }
}

impl Condition {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Condition::IsDescendantNode(ancestor) => {
                node.path != *ancestor && path::is_same_or_descendant(&node.path, ancestor)
            }
            Condition::IsChildNode(parent) => node.parent_path() == Some(parent.as_str()),
            Condition::IsSameNode(p) => node.path == *p,
            Condition::Compare {
                property,
                operator,
                value,
            } => match node.property(property) {
                None => false,
                Some(actual) => {
                    let any_equal = actual.values().iter().any(|v| values_equal(v, value));
                    match operator {
                        Operator::Eq => any_equal,
                        Operator::NotEq => !any_equal,
                    }
                }
            },
            Condition::IsNull(property) => !node.has_property(property),
            Condition::IsNotNull(property) => node.has_property(property),
            Condition::NameEquals(name) => node.name() == name,
        }
    }
}

fn values_equal(actual: &Value, literal: &Value) -> bool {
    match (actual, literal) {
        (Value::Long(a), Value::Double(b)) | (Value::Double(b), Value::Long(a)) => {
            (*a as f64) == *b
        }
        (Value::String(a), Value::Long(_) | Value::Double(_) | Value::Boolean(_)) => {
            *a == literal.to_string()
        }
        _ => actual == literal,
    }
}

/// Parse a query statement.
pub fn parse(statement: &str) -> Result<Query> {
    let tokens = tokenize(statement)?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.query()?;
    if let Some(token) = parser.peek() {
        return Err(invalid(format!("unexpected trailing token {token}")));
    }
    Ok(query)
}

// ---- Tokenizer ----

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Bracketed(String),
    Str(String),
    Number(String),
    Star,
    LParen,
    RParen,
    Comma,
    Dot,
    Eq,
    NotEq,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{w}'"),
            Token::Bracketed(b) => write!(f, "'[{b}]'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Number(n) => write!(f, "number {n}"),
            Token::Star => write!(f, "'*'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Eq => write!(f, "'='"),
            Token::NotEq => write!(f, "'<>'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '[' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| start + p)
                    .ok_or_else(|| invalid("unterminated '['".to_string()))?;
                tokens.push(Token::Bracketed(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid("unterminated string literal".to_string())),
                        // A doubled quote is an escaped quote.
                        Some(&q) if q == quote && chars.get(i + 1) == Some(&quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(&q) if q == quote => {
                            i += 1;
                            break;
                        }
                        Some(&other) => {
                            value.push(other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':' || c == '-'
}

// ---- Parser ----

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| invalid("unexpected end of query".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next()? {
            Token::Word(w) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(invalid(format!("expected {keyword}, found {other}"))),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(invalid(format!("expected {expected}, found {token}")))
        }
    }

    fn query(&mut self) -> Result<Query> {
        self.keyword("SELECT")?;
        self.expect(Token::Star)?;
        self.keyword("FROM")?;
        let node_type = match self.next()? {
            Token::Bracketed(t) | Token::Word(t) => t,
            other => return Err(invalid(format!("expected node type, found {other}"))),
        };

        let mut alias = None;
        if self.is_keyword("AS") {
            self.pos += 1;
            alias = Some(self.word()?);
        }

        let mut conditions = Vec::new();
        if self.is_keyword("WHERE") {
            self.pos += 1;
            conditions.push(self.condition(alias.as_deref())?);
            while self.is_keyword("AND") {
                self.pos += 1;
                conditions.push(self.condition(alias.as_deref())?);
            }
        }

        Ok(Query {
            node_type,
            alias,
            conditions,
        })
    }

    fn word(&mut self) -> Result<String> {
        match self.next()? {
            Token::Word(w) => Ok(w),
            other => Err(invalid(format!("expected identifier, found {other}"))),
        }
    }

    fn condition(&mut self, alias: Option<&str>) -> Result<Condition> {
        let function = match self.peek() {
            Some(Token::Word(w)) if self.peek_at(1) == Some(&Token::LParen) => {
                Some(w.to_ascii_uppercase())
            }
            _ => None,
        };

        match function.as_deref() {
            Some("ISDESCENDANTNODE") => Ok(Condition::IsDescendantNode(self.path_function(alias)?)),
            Some("ISCHILDNODE") => Ok(Condition::IsChildNode(self.path_function(alias)?)),
            Some("ISSAMENODE") => Ok(Condition::IsSameNode(self.path_function(alias)?)),
            Some("NAME") => {
                self.pos += 2;
                if let Some(Token::Word(_)) = self.peek() {
                    self.selector(alias)?;
                }
                self.expect(Token::RParen)?;
                self.expect(Token::Eq)?;
                match self.next()? {
                    Token::Str(name) => Ok(Condition::NameEquals(name)),
                    other => Err(invalid(format!("expected string after NAME() =, found {other}"))),
                }
            }
            Some(other) => Err(invalid(format!("unsupported function {other}"))),
            None => self.comparison(alias),
        }
    }

    fn path_function(&mut self, alias: Option<&str>) -> Result<String> {
        self.pos += 2;
        if let Some(Token::Word(_)) = self.peek() {
            self.selector(alias)?;
            self.expect(Token::Comma)?;
        }
        let p = match self.next()? {
            Token::Str(p) | Token::Bracketed(p) => p,
            other => return Err(invalid(format!("expected path, found {other}"))),
        };
        path::validate_absolute(&p).map_err(|e| invalid(e.to_string()))?;
        self.expect(Token::RParen)?;
        Ok(p)
    }

    fn selector(&mut self, alias: Option<&str>) -> Result<()> {
        let name = self.word()?;
        match alias {
            Some(a) if a == name => Ok(()),
            _ => Err(invalid(format!("unknown selector '{name}'"))),
        }
    }

    fn comparison(&mut self, alias: Option<&str>) -> Result<Condition> {
        if matches!(self.peek(), Some(Token::Word(_))) && self.peek_at(1) == Some(&Token::Dot) {
            self.selector(alias)?;
            self.pos += 1;
        }
        let property = match self.next()? {
            Token::Bracketed(p) | Token::Word(p) => p,
            other => return Err(invalid(format!("expected property, found {other}"))),
        };

        match self.next()? {
            Token::Eq => Ok(Condition::Compare {
                property,
                operator: Operator::Eq,
                value: self.literal()?,
            }),
            Token::NotEq => Ok(Condition::Compare {
                property,
                operator: Operator::NotEq,
                value: self.literal()?,
            }),
            Token::Word(w) if w.eq_ignore_ascii_case("IS") => {
                if self.is_keyword("NOT") {
                    self.pos += 1;
                    self.keyword("NULL")?;
                    Ok(Condition::IsNotNull(property))
                } else {
                    self.keyword("NULL")?;
                    Ok(Condition::IsNull(property))
                }
            }
            other => Err(invalid(format!("expected operator, found {other}"))),
        }
    }

    fn literal(&mut self) -> Result<Value> {
        match self.next()? {
            Token::Str(s) => Ok(Value::String(s)),
            Token::Number(n) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Value::Long(i))
                } else {
                    n.parse::<f64>()
                        .map(Value::Double)
                        .map_err(|_| invalid(format!("invalid number {n}")))
                }
            }
            Token::Word(w) if w.eq_ignore_ascii_case("true") => Ok(Value::Boolean(true)),
            Token::Word(w) if w.eq_ignore_ascii_case("false") => Ok(Value::Boolean(false)),
            other => Err(invalid(format!("expected literal, found {other}"))),
        }
    }
}

fn invalid(message: String) -> RetrofitError {
    RetrofitError::InvalidQuery {
        language: LANGUAGE.to_string(),
        message,
    }
}
