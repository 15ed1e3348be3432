use crate::ast::*;
use crate::lexer::{Lexer, Token};
use blockq_core::{QueryError, Result};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(query: &str) -> Result<Self> {
        let mut lexer = Lexer::new(query);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parses exactly one statement; anything after it is rejected.
    pub fn parse(&mut self) -> Result<SelectStatement> {
        let statement = self.parse_select()?;

        self.match_token(&Token::Semicolon);
        if self.current_token() != &Token::Eof {
            return Err(QueryError::Syntax(format!(
                "Unexpected trailing input at {}",
                self.current_token()
            )));
        }

        Ok(statement)
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect_token(&Token::Select)?;

        let projection = self.parse_projection()?;

        self.expect_token(&Token::From)?;
        let from = self.parse_identifier()?;

        let selection = if self.match_token(&Token::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.match_token(&Token::Order) {
            self.expect_token(&Token::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        let limit = if self.match_token(&Token::Limit) {
            Some(self.parse_integer()?)
        } else {
            None
        };

        Ok(SelectStatement {
            projection,
            from,
            selection,
            order_by,
            limit,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.match_token(&Token::Star) {
            return Ok(Projection::Wildcard);
        }

        let mut columns = vec![];
        loop {
            columns.push(self.parse_identifier()?);

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(Projection::Columns(columns))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;

        while self.match_token(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_primary_expr()?;

        while self.match_token(&Token::And) {
            let right = self.parse_primary_expr()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        if self.match_token(&Token::LeftParen) {
            let expr = self.parse_expr()?;
            self.expect_token(&Token::RightParen)?;
            return Ok(expr);
        }

        let column = self.parse_identifier()?;
        let op = self.match_comparison_op().ok_or_else(|| {
            QueryError::Syntax(format!(
                "Expected comparison operator after '{}', found {}",
                column,
                self.current_token()
            ))
        })?;
        let literal = self.parse_literal()?;

        Ok(Expr::Comparison {
            column,
            op,
            literal,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let literal = match self.current_token() {
            Token::Number(n) => Literal::Number(n.clone()),
            Token::Minus => {
                self.advance();
                match self.current_token() {
                    Token::Number(n) => Literal::Number(format!("-{}", n)),
                    other => {
                        return Err(QueryError::Syntax(format!(
                            "Expected number after '-', found {}",
                            other
                        )))
                    }
                }
            }
            Token::String(s) => Literal::String(s.clone()),
            Token::Timestamp(t) => Literal::Timestamp(t.clone()),
            Token::True => Literal::Boolean(true),
            Token::False => Literal::Boolean(false),
            other => {
                return Err(QueryError::Syntax(format!(
                    "Expected literal, found {}",
                    other
                )))
            }
        };
        self.advance();
        Ok(literal)
    }

    fn parse_order_by(&mut self) -> Result<OrderByExpr> {
        let column = self.parse_identifier()?;
        let asc = if self.match_token(&Token::Desc) {
            false
        } else {
            self.match_token(&Token::Asc);
            true
        };

        Ok(OrderByExpr { column, asc })
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Identifier(id) => {
                let name = id.clone();
                self.advance();
                Ok(name)
            }
            other => Err(QueryError::Syntax(format!(
                "Expected identifier, found {}",
                other
            ))),
        }
    }

    /// Signed so that `LIMIT -1` reaches plan validation instead of failing here.
    fn parse_integer(&mut self) -> Result<i64> {
        let negative = self.match_token(&Token::Minus);
        match self.current_token() {
            Token::Number(n) => {
                let num: i64 = n
                    .parse()
                    .map_err(|_| QueryError::Syntax(format!("Invalid integer: {}", n)))?;
                self.advance();
                Ok(if negative { -num } else { num })
            }
            other => Err(QueryError::Syntax(format!(
                "Expected integer, found {}",
                other
            ))),
        }
    }

    fn match_comparison_op(&mut self) -> Option<ComparisonOp> {
        let op = match self.current_token() {
            Token::Equal => Some(ComparisonOp::Equal),
            Token::NotEqual => Some(ComparisonOp::NotEqual),
            Token::Less => Some(ComparisonOp::Less),
            Token::LessEqual => Some(ComparisonOp::LessEqual),
            Token::Greater => Some(ComparisonOp::Greater),
            Token::GreaterEqual => Some(ComparisonOp::GreaterEqual),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.current_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, token: &Token) -> Result<()> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            Err(QueryError::Syntax(format!(
                "Expected {}, found {}",
                token,
                self.current_token()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<SelectStatement> {
        Parser::new(query)?.parse()
    }

    #[test]
    fn test_wildcard_select() {
        let stmt = parse("SELECT * FROM slots LIMIT 5").unwrap();
        assert_eq!(stmt.projection, Projection::Wildcard);
        assert_eq!(stmt.from, "slots");
        assert_eq!(stmt.limit, Some(5));
        assert!(stmt.selection.is_none());
    }

    #[test]
    fn test_column_list_and_order_by() {
        let stmt = parse("select slot, tps from slots order by tps desc").unwrap();
        assert_eq!(
            stmt.projection,
            Projection::Columns(vec!["slot".into(), "tps".into()])
        );
        assert_eq!(
            stmt.order_by,
            Some(OrderByExpr {
                column: "tps".into(),
                asc: false
            })
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let stmt = parse("SELECT * FROM validators WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        match stmt.selection.unwrap() {
            Expr::Logical { op, right, .. } => {
                assert_eq!(op, LogicalOp::Or);
                assert!(matches!(
                    *right,
                    Expr::Logical {
                        op: LogicalOp::And,
                        ..
                    }
                ));
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_predicate() {
        let stmt = parse("SELECT * FROM slots WHERE (slot > 1 OR slot < -5) AND tps >= 2.5").unwrap();
        match stmt.selection.unwrap() {
            Expr::Logical { op, left, .. } => {
                assert_eq!(op, LogicalOp::And);
                assert!(matches!(*left, Expr::Logical { op: LogicalOp::Or, .. }));
            }
            other => panic!("unexpected expr: {:?}", other),
        }
    }

    #[test]
    fn test_negative_limit_parses() {
        assert_eq!(parse("SELECT * FROM slots LIMIT -1").unwrap().limit, Some(-1));
    }

    #[test]
    fn test_trailing_semicolon_allowed() {
        assert!(parse("SELECT * FROM slots;").is_ok());
    }

    #[test]
    fn test_rejects_trailing_tokens() {
        assert!(matches!(
            parse("SELECT * FROM slots; SELECT * FROM validators"),
            Err(QueryError::Syntax(_))
        ));
        assert!(matches!(
            parse("SELECT * FROM slots LIMIT 5 5"),
            Err(QueryError::Syntax(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for query in [
            "",
            "SELECT FROM slots",
            "SELECT * slots",
            "SELECT * FROM slots WHERE slot",
            "SELECT * FROM slots WHERE slot = ",
            "SELECT * FROM slots ORDER tps",
            "SELECT * FROM slots LIMIT ten",
            "SELECT slot, FROM slots",
            "DELETE FROM slots",
        ] {
            assert!(
                matches!(parse(query), Err(QueryError::Syntax(_))),
                "expected syntax error for {:?}",
                query
            );
        }
    }
}
