//! Literal query language of the in-memory template.
//!
//! ```text
//! select * from <entity> [where <cond>] [order by <field> [asc|desc], ...] [skip n] [limit n]
//! delete from <entity> [where <cond>]
//!
//! cond    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | "(" cond ")" | compare
//! compare := field ("=" | "!=" | ">" | ">=" | "<" | "<=") operand
//!          | field ["not"] "like" operand
//!          | field ["not"] "in" (list | @param)
//!          | field ["not"] "between" operand "and" operand
//! operand := literal | @param
//! ```
//!
//! Keywords are case-insensitive. Strings use single or double quotes;
//! a doubled quote escapes itself.

use crate::{
    db::{
        query::{
            CompareOp, ConditionNode, DeleteQuery, Direction, Operand, ParamBindings, Sort,
            StructuredQuery,
        },
        template::TemplateError,
    },
    value::Value,
};

///
/// Statement
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Statement {
    Select(StructuredQuery),
    Delete(DeleteQuery),
}

impl Statement {
    /// Parameter names still awaiting a value.
    pub(crate) fn params(&self) -> Vec<&str> {
        let condition = match self {
            Self::Select(query) => query.condition.as_ref(),
            Self::Delete(query) => query.condition.as_ref(),
        };

        condition.map(ConditionNode::params).unwrap_or_default()
    }

    pub(crate) fn bind(self, bindings: &ParamBindings) -> Self {
        match self {
            Self::Select(query) => Self::Select(query.bind(bindings)),
            Self::Delete(query) => Self::Delete(query.bind(bindings)),
        }
    }
}

/// Parse one statement.
pub(crate) fn parse(text: &str) -> Result<Statement, TemplateError> {
    let tokens = lex(text)?;
    let mut parser = Parser { tokens, pos: 0 };

    let statement = parser.statement()?;
    parser.expect_end()?;

    Ok(statement)
}

// ----------------------------------------------------------------------
// lexer
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Number(Value),
    Param(String),
    Symbol(&'static str),
    End,
}

fn lex(text: &str) -> Result<Vec<(usize, Token)>, TemplateError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '.';

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|&(_, c)| c);
        let token = match c {
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_word(chars[i].1) {
                    i += 1;
                }
                tokens.push((offset, Token::Word(collect(&chars[start..i]))));
                continue;
            }
            '@' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_word(chars[i].1) {
                    i += 1;
                }
                if i == start {
                    return Err(TemplateError::parse(
                        offset,
                        "expected a parameter name after '@'",
                    ));
                }
                tokens.push((offset, Token::Param(collect(&chars[start..i]))));
                continue;
            }
            '\'' | '"' => {
                let (value, end) = string(&chars, i)?;
                i = end;
                tokens.push((offset, Token::Text(value)));
                continue;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let literal = collect(&chars[start..i]);
                tokens.push((offset, Token::Number(number(&literal, offset)?)));
                continue;
            }
            '!' if next == Some('=') => Token::Symbol("!="),
            '<' if next == Some('>') => Token::Symbol("!="),
            '>' if next == Some('=') => Token::Symbol(">="),
            '<' if next == Some('=') => Token::Symbol("<="),
            '=' => Token::Symbol("="),
            '>' => Token::Symbol(">"),
            '<' => Token::Symbol("<"),
            '(' => Token::Symbol("("),
            ')' => Token::Symbol(")"),
            '[' => Token::Symbol("["),
            ']' => Token::Symbol("]"),
            ',' => Token::Symbol(","),
            '*' => Token::Symbol("*"),
            other => {
                return Err(TemplateError::parse(
                    offset,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        i += match &token {
            Token::Symbol(symbol) => symbol.len(),
            _ => 1,
        };
        tokens.push((offset, token));
    }

    tokens.push((text.len(), Token::End));

    Ok(tokens)
}

fn collect(chars: &[(usize, char)]) -> String {
    chars.iter().map(|&(_, c)| c).collect()
}

// Quoted string starting at `start`; returns the value and the index after
// the closing quote.
fn string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), TemplateError> {
    let (offset, quote) = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            if chars.get(i + 1).is_some_and(|&(_, n)| n == quote) {
                out.push(quote);
                i += 2;
                continue;
            }
            return Ok((out, i + 1));
        }
        out.push(c);
        i += 1;
    }

    Err(TemplateError::parse(offset, "unterminated string"))
}

fn number(literal: &str, offset: usize) -> Result<Value, TemplateError> {
    if literal.contains('.') {
        return literal
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| TemplateError::parse(offset, format!("invalid number '{literal}'")));
    }

    literal
        .parse::<i64>()
        .map(Value::Int)
        .or_else(|_| literal.parse::<u64>().map(Value::Uint))
        .map_err(|_| TemplateError::parse(offset, format!("invalid number '{literal}'")))
}

// ----------------------------------------------------------------------
// parser
// ----------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::End, |(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |&(offset, _)| offset)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos = (self.pos + 1).min(self.tokens.len());

        token
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, TemplateError> {
        Err(TemplateError::parse(self.offset(), message))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let hit = self.at_keyword(keyword);
        if hit {
            self.pos += 1;
        }

        hit
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), TemplateError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(format!("expected '{keyword}'"))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let hit = matches!(self.peek(), Token::Symbol(s) if *s == symbol);
        if hit {
            self.pos += 1;
        }

        hit
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), TemplateError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            self.error(format!("expected '{symbol}'"))
        }
    }

    fn expect_end(&self) -> Result<(), TemplateError> {
        match self.peek() {
            Token::End => Ok(()),
            _ => self.error("unexpected trailing input"),
        }
    }

    fn identifier(&mut self) -> Result<String, TemplateError> {
        if let Token::Word(word) = self.peek() {
            let word = word.clone();
            self.pos += 1;
            return Ok(word);
        }

        self.error("expected an identifier")
    }

    fn unsigned(&mut self) -> Result<u64, TemplateError> {
        match self.advance() {
            Token::Number(Value::Int(n)) => {
                u64::try_from(n).or_else(|_| self.error("expected a non-negative number"))
            }
            Token::Number(Value::Uint(n)) => Ok(n),
            _ => self.error("expected a non-negative number"),
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<Statement, TemplateError> {
        if self.eat_keyword("select") {
            self.expect_symbol("*")?;
            self.expect_keyword("from")?;
            let mut query = StructuredQuery::all(self.identifier()?);

            if self.eat_keyword("where") {
                query.condition = Some(self.condition()?);
            }
            if self.eat_keyword("order") {
                self.expect_keyword("by")?;
                query.sorts = self.sorts()?;
            }
            if self.eat_keyword("skip") {
                query.skip = self.unsigned()?;
            }
            if self.eat_keyword("limit") {
                query.limit = self.unsigned()?;
            }

            return Ok(Statement::Select(query));
        }

        if self.eat_keyword("delete") {
            self.expect_keyword("from")?;
            let mut query = DeleteQuery::all(self.identifier()?);

            if self.eat_keyword("where") {
                query.condition = Some(self.condition()?);
            }

            return Ok(Statement::Delete(query));
        }

        self.error("expected 'select' or 'delete'")
    }

    fn sorts(&mut self) -> Result<Vec<Sort>, TemplateError> {
        let mut sorts = Vec::new();

        loop {
            let field = self.identifier()?;
            let direction = if self.eat_keyword("desc") {
                Direction::Desc
            } else {
                self.eat_keyword("asc");
                Direction::Asc
            };
            sorts.push(Sort { field, direction });

            if !self.eat_symbol(",") {
                return Ok(sorts);
            }
        }
    }

    // ------------------------------------------------------------------
    // conditions
    // ------------------------------------------------------------------

    fn condition(&mut self) -> Result<ConditionNode, TemplateError> {
        let mut node = self.conjunction()?;
        while self.eat_keyword("or") {
            node = node.or(self.conjunction()?);
        }

        Ok(node)
    }

    fn conjunction(&mut self) -> Result<ConditionNode, TemplateError> {
        let mut node = self.unary()?;
        while self.eat_keyword("and") {
            node = node.and(self.unary()?);
        }

        Ok(node)
    }

    fn unary(&mut self) -> Result<ConditionNode, TemplateError> {
        if self.eat_keyword("not") {
            return Ok(self.unary()?.negate());
        }
        if self.eat_symbol("(") {
            let node = self.condition()?;
            self.expect_symbol(")")?;
            return Ok(node);
        }

        self.comparison()
    }

    fn comparison(&mut self) -> Result<ConditionNode, TemplateError> {
        let field = self.identifier()?;
        let negated = self.eat_keyword("not");

        let node = if self.eat_keyword("like") {
            ConditionNode::compare(field, CompareOp::Like, self.operand()?)
        } else if self.eat_keyword("in") {
            ConditionNode::compare(field, CompareOp::In, self.operand()?)
        } else if self.eat_keyword("between") {
            let low = self.operand()?;
            self.expect_keyword("and")?;
            let high = self.operand()?;
            between(field, low, high)
        } else if negated {
            return self.error("expected 'like', 'in' or 'between' after 'not'");
        } else {
            let op = match self.advance() {
                Token::Symbol("=") => CompareOp::Eq,
                Token::Symbol("!=") => CompareOp::Ne,
                Token::Symbol(">") => CompareOp::Gt,
                Token::Symbol(">=") => CompareOp::Gte,
                Token::Symbol("<") => CompareOp::Lt,
                Token::Symbol("<=") => CompareOp::Lte,
                _ => return self.error("expected a comparison operator"),
            };
            ConditionNode::compare(field, op, self.operand()?)
        };

        Ok(if negated { node.negate() } else { node })
    }

    fn operand(&mut self) -> Result<Operand, TemplateError> {
        if let Token::Param(name) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok(Operand::Param(name));
        }

        self.value().map(Operand::Value)
    }

    fn value(&mut self) -> Result<Value, TemplateError> {
        if self.eat_symbol("[") {
            let mut items = Vec::new();
            if !self.eat_symbol("]") {
                loop {
                    if matches!(self.peek(), Token::Param(_)) {
                        return self.error("parameters are not allowed inside list literals");
                    }
                    items.push(self.value()?);
                    if self.eat_symbol("]") {
                        break;
                    }
                    self.expect_symbol(",")?;
                }
            }
            return Ok(Value::List(items));
        }

        if self.eat_keyword("true") {
            return Ok(Value::Bool(true));
        }
        if self.eat_keyword("false") {
            return Ok(Value::Bool(false));
        }
        if self.eat_keyword("null") {
            return Ok(Value::Null);
        }

        match self.advance() {
            Token::Text(text) => Ok(Value::Text(text)),
            Token::Number(number) => Ok(number),
            _ => {
                self.pos -= 1;
                self.error("expected a value")
            }
        }
    }
}

// Literal bounds make one `Between`; a parameter bound becomes a
// `>= low and <= high` pair so each side binds on its own.
fn between(field: String, low: Operand, high: Operand) -> ConditionNode {
    match (low, high) {
        (Operand::Value(low), Operand::Value(high)) => ConditionNode::compare(
            field,
            CompareOp::Between,
            Operand::Value(Value::list([low, high])),
        ),
        (low, high) => ConditionNode::compare(field.clone(), CompareOp::Gte, low)
            .and(ConditionNode::compare(field, CompareOp::Lte, high)),
    }
}

///
/// TESTS
///
