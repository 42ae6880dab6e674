//! Recursive-descent parser for path-pattern queries.
//!
//! ```text
//! query    := "select" node (edge node)* "return" name ("," name)*
//! node     := "(" [variable] property* ")"
//! edge     := ["<"] "-" ["[" [variable] property* "]"] "-" [">"]
//! property := name ("<" | "=" | ">") (string | number)
//! ```

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::query::ast::{
    Direction, EdgePattern, GraphQuery, Literal, NodePattern, Property, Relop, ReturnClause,
    SelectClause,
};
use crate::query::lexer::{Lexer, Token, TokenType, nearby};

pub struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    position: usize,
    /// Pattern variables in path order, with the offset of their token.
    variables: Vec<(String, usize)>,
    /// Returned names with the offset of their token.
    returns: Vec<(String, usize)>,
}

impl<'a> Parser<'a> {
    pub fn parse(input: &'a str) -> Result<GraphQuery> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser {
            input,
            tokens,
            position: 0,
            variables: Vec::new(),
            returns: Vec::new(),
        };
        parser.parse_query()
    }

    fn parse_query(&mut self) -> Result<GraphQuery> {
        self.consume(&TokenType::Select, "expected `select`")?;
        let select = self.parse_path()?;
        self.consume(&TokenType::Return, "expected `return` after the path")?;
        let returns = self.parse_return()?;
        if !self.is_at_end() {
            return Err(self.error("unexpected input after the return list"));
        }

        self.validate()?;
        Ok(GraphQuery { select, returns })
    }

    fn parse_path(&mut self) -> Result<SelectClause> {
        let mut nodes = vec![self.parse_node()?];
        let mut edges = Vec::new();
        while self.check(&TokenType::Dash) || self.check(&TokenType::LessThan) {
            edges.push(self.parse_edge()?);
            nodes.push(self.parse_node()?);
        }
        Ok(SelectClause { nodes, edges })
    }

    fn parse_node(&mut self) -> Result<NodePattern> {
        self.consume(&TokenType::LeftParen, "expected `(` to open a node pattern")?;
        let (variable, properties) = self.parse_body()?;
        self.consume(&TokenType::RightParen, "expected `)` to close a node pattern")?;
        Ok(NodePattern {
            variable,
            properties,
        })
    }

    fn parse_edge(&mut self) -> Result<EdgePattern> {
        let incoming = self.match_token(&TokenType::LessThan);
        self.consume(&TokenType::Dash, "expected `-` to open an edge pattern")?;

        let (variable, properties) = if self.match_token(&TokenType::LeftBracket) {
            let body = self.parse_body()?;
            self.consume(&TokenType::RightBracket, "expected `]` to close an edge pattern")?;
            body
        } else {
            (None, Vec::new())
        };

        self.consume(&TokenType::Dash, "expected `-` to close an edge pattern")?;
        let outgoing = self.check(&TokenType::GreaterThan);
        let direction = match (incoming, outgoing) {
            (true, true) => return Err(self.error("an edge cannot point both ways")),
            (true, false) => Direction::Prev,
            (false, true) => Direction::Next,
            (false, false) => Direction::Bidirection,
        };
        if outgoing {
            self.advance();
        }

        Ok(EdgePattern {
            variable,
            direction,
            properties,
        })
    }

    /// Optional variable (or label) followed by predicates.
    fn parse_body(&mut self) -> Result<(Option<String>, Vec<Property>)> {
        let offset = self.peek().offset;
        let variable = match &self.peek().token_type {
            TokenType::Label(label) => {
                let label = label.clone();
                self.advance();
                Some(label)
            }
            TokenType::Identifier(name) if !self.next_is_relop() => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        if let Some(variable) = &variable {
            self.variables.push((variable.clone(), offset));
        }

        let mut properties = Vec::new();
        while let TokenType::Identifier(_) = self.peek().token_type {
            properties.push(self.parse_property()?);
        }
        Ok((variable, properties))
    }

    fn parse_property(&mut self) -> Result<Property> {
        let name = self.identifier("expected a property name")?;

        let relop = match self.peek().token_type {
            TokenType::LessThan => Relop::Less,
            TokenType::Equals => Relop::Equal,
            TokenType::GreaterThan => Relop::Greater,
            _ => return Err(self.error(format!("expected `<`, `=` or `>` after `{name}`"))),
        };
        self.advance();

        let literal = match &self.peek().token_type {
            TokenType::String(s) => Literal::String(s.clone()),
            TokenType::Number(n) => Literal::Number(n.clone()),
            _ => return Err(self.error(format!("expected a string or number to compare `{name}` with"))),
        };
        self.advance();

        Ok(Property {
            name,
            relop,
            literal,
        })
    }

    fn parse_return(&mut self) -> Result<ReturnClause> {
        let mut names = vec![self.returned_name("expected a variable to return")?];
        while self.match_token(&TokenType::Comma) {
            names.push(self.returned_name("expected a variable after `,`")?);
        }
        Ok(ReturnClause { names })
    }

    fn returned_name(&mut self, message: &str) -> Result<String> {
        let offset = self.peek().offset;
        let name = self.identifier(message)?;
        self.returns.push((name.clone(), offset));
        Ok(name)
    }

    fn identifier(&mut self, message: &str) -> Result<String> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (variable, offset) in &self.variables {
            if !seen.insert(variable.as_str()) {
                return Err(Error::parse(
                    format!("variable `{variable}` is bound twice"),
                    nearby(self.input, *offset),
                ));
            }
        }
        for (name, offset) in &self.returns {
            if !seen.contains(name.as_str()) {
                return Err(Error::parse(
                    format!("returned name `{name}` is not a pattern variable"),
                    nearby(self.input, *offset),
                ));
            }
        }
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(message, nearby(self.input, self.peek().offset))
    }

    fn next_is_relop(&self) -> bool {
        matches!(
            self.tokens.get(self.position + 1).map(|t| &t.token_type),
            Some(TokenType::LessThan | TokenType::Equals | TokenType::GreaterThan)
        )
    }

    fn peek(&self) -> &Token {
        if self.position >= self.tokens.len() {
            &self.tokens[self.tokens.len() - 1] // EOF
        } else {
            &self.tokens[self.position]
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn check(&self, type_: &TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(type_)
        }
    }

    fn match_token(&mut self, type_: &TokenType) -> bool {
        if self.check(type_) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, type_: &TokenType, message: &str) -> Result<&Token> {
        if self.check(type_) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }
}
