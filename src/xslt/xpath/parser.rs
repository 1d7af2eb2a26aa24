//! Recursive-descent parser producing `Expr` trees.

use super::lexer::{tokenize, Token};
use super::{Axis, BinaryOp, Expr, NodeTest, PathExpr, PathStart, Step};
use crate::config::MAX_XPATH_DEPTH;
use crate::error_handling::XsltError;

pub(crate) fn parse(source: &str) -> Result<Expr, XsltError> {
    let mut parser = Parser {
        source,
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error("empty expression"));
    }
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected token"));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Current nesting of parenthesised, predicate, argument and negated
    /// subexpressions
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), XsltError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> XsltError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or_else(|| self.source.chars().count());
        XsltError::XPathSyntax {
            expr: self.source.to_string(),
            position,
            message: message.to_string(),
        }
    }

    /// Runs `parse` one nesting level deeper, failing past `MAX_XPATH_DEPTH`.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, XsltError>) -> Result<T, XsltError> {
        if self.depth >= MAX_XPATH_DEPTH {
            return Err(self.error(&format!(
                "expression nested deeper than {MAX_XPATH_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, XsltError>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, XsltError> {
        let mut left = operand(self)?;
        while let Some(op) = self.peek().and_then(operator) {
            self.pos += 1;
            let right = operand(self)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::and_expr, |t| (*t == Token::Or).then_some(BinaryOp::Or))
    }

    fn and_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::equality_expr, |t| {
            (*t == Token::And).then_some(BinaryOp::And)
        })
    }

    fn equality_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::relational_expr, |t| match t {
            Token::Equal => Some(BinaryOp::Equal),
            Token::NotEqual => Some(BinaryOp::NotEqual),
            _ => None,
        })
    }

    fn relational_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::additive_expr, |t| match t {
            Token::Less => Some(BinaryOp::Less),
            Token::LessEqual => Some(BinaryOp::LessEqual),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEqual => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn additive_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::multiplicative_expr, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::unary_expr, |t| match t {
            Token::Multiply => Some(BinaryOp::Multiply),
            Token::Div => Some(BinaryOp::Divide),
            Token::Mod => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    fn unary_expr(&mut self) -> Result<Expr, XsltError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.nested(Self::unary_expr)?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XsltError> {
        self.binary_level(Self::path_expr, |t| {
            (*t == Token::Pipe).then_some(BinaryOp::Union)
        })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Name(_)
                    | Token::Star
                    | Token::At
                    | Token::Dot
                    | Token::DotDot
                    | Token::AxisName(_)
                    | Token::NodeType(_)
            )
        )
    }

    fn path_expr(&mut self) -> Result<Expr, XsltError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.relative_path()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path(PathExpr {
                    start: PathStart::Root,
                    steps,
                }))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self()];
                steps.extend(self.relative_path()?);
                Ok(Expr::Path(PathExpr {
                    start: PathStart::Root,
                    steps,
                }))
            }
            _ if self.starts_step() => Ok(Expr::Path(PathExpr {
                start: PathStart::Context,
                steps: self.relative_path()?,
            })),
            _ => {
                let filter = self.filter_expr()?;
                let descendant = match self.peek() {
                    Some(Token::Slash) => false,
                    Some(Token::DoubleSlash) => true,
                    _ => return Ok(filter),
                };
                self.pos += 1;
                let mut steps = Vec::new();
                if descendant {
                    steps.push(Step::descendant_or_self());
                }
                steps.extend(self.relative_path()?);
                Ok(Expr::Path(PathExpr {
                    start: PathStart::Filter(Box::new(filter)),
                    steps,
                }))
            }
        }
    }

    fn relative_path(&mut self) -> Result<Vec<Step>, XsltError> {
        let mut steps = vec![self.step()?];
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                _ => return Ok(steps),
            }
            steps.push(self.step()?);
        }
    }

    fn step(&mut self) -> Result<Step, XsltError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::Self_,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek() {
            let axis = Axis::from_name(name)
                .ok_or_else(|| self.error(&format!("unsupported axis '{name}'")))?;
            self.pos += 1;
            axis
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.nested(Self::or_expr)?);
            self.expect(&Token::RBracket, "']'")?;
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XsltError> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::Name(name)) => Ok(match name.strip_suffix(":*") {
                Some(prefix) => NodeTest::NamespaceWildcard {
                    prefix: prefix.to_string(),
                    uri: None,
                },
                None => match name.split_once(':') {
                    Some((prefix, local)) => NodeTest::Name {
                        prefix: Some(prefix.to_string()),
                        local: local.to_string(),
                        uri: None,
                    },
                    None => NodeTest::Name {
                        prefix: None,
                        local: name,
                        uri: None,
                    },
                },
            }),
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LParen, "'('")?;
                let test = match kind.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "node" => NodeTest::Node,
                    _ => {
                        // processing-instruction('target')
                        if matches!(self.peek(), Some(Token::Literal(_))) {
                            self.pos += 1;
                        }
                        NodeTest::ProcessingInstruction
                    }
                };
                self.expect(&Token::RParen, "')'")?;
                Ok(test)
            }
            other => {
                if other.is_some() {
                    self.pos -= 1;
                }
                Err(self.error("expected a node test"))
            }
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, XsltError> {
        let primary = self.primary_expr()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.nested(Self::or_expr)?);
            self.expect(&Token::RBracket, "']'")?;
        }
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter(Box::new(primary), predicates))
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, XsltError> {
        match self.advance() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or_expr)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                self.expect(&Token::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.nested(Self::or_expr)?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ')'")?;
                    }
                }
                Ok(Expr::Function(name, args))
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected an expression"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }
}
