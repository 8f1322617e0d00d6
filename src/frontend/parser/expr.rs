//! Expression parsing.
//!
//! ## Notes
//!
//! - Precedence, loosest first: `Or`/`OrElse`, `And`/`AndAlso`, `Not`,
//!   comparisons, `&`, `+`/`-`, `Mod`, `\`, `*`/`/`, unary `-`, postfix.
//! - `suppress_eq` keeps a statement-head `=` out of the comparison level
//!   so `x = y` at statement position stays an assignment. Parentheses,
//!   argument lists, and query bodies restore equality via [`Parser::grouped`].

use crate::frontend::ast::{
    BinaryExpr, BinaryOp, CallExpr, CastExpr, Expr, IndexExpr, Located, MemberExpr, NewExpr,
    QueryClause, QueryExpr, UnaryExpr, UnaryOp,
};
use crate::frontend::lexer::TokenKind;

use super::{PResult, Parser};

impl Parser {
    pub(crate) fn expression(&mut self) -> PResult<Located<Expr>> {
        if self.check(&TokenKind::From) {
            self.query_expr()
        } else {
            self.or_expr()
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Located<Expr>, right: Located<Expr>) -> Located<Expr> {
        let pos = left.pos;
        self.locate(
            Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }),
            pos,
        )
    }

    fn or_expr(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.and_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Or => BinaryOp::Or,
                TokenKind::OrElse => BinaryOp::OrElse,
                _ => break,
            };
            self.advance();
            let right = self.and_expr()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.not_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::And => BinaryOp::And,
                TokenKind::AndAlso => BinaryOp::AndAlso,
                _ => break,
            };
            self.advance();
            let right = self.not_expr()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Located<Expr>> {
        if self.check(&TokenKind::Not) {
            let pos = self.current_pos();
            self.advance();
            let operand = self.not_expr()?;
            return Ok(self.locate(
                Expr::Unary(UnaryExpr {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                }),
                pos,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq if !self.suppress_eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.concat()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn concat(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.additive()?;
        while self.check(&TokenKind::Amp) {
            self.advance();
            let right = self.additive()?;
            left = self.binary(BinaryOp::Concat, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.mod_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.mod_expr()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn mod_expr(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.int_div()?;
        while self.check(&TokenKind::Mod) {
            self.advance();
            let right = self.int_div()?;
            left = self.binary(BinaryOp::Mod, left, right);
        }
        Ok(left)
    }

    fn int_div(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.multiplicative()?;
        while self.check(&TokenKind::Backslash) {
            self.advance();
            let right = self.multiplicative()?;
            left = self.binary(BinaryOp::IntDiv, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> PResult<Located<Expr>> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Located<Expr>> {
        if self.check(&TokenKind::Minus) {
            let pos = self.current_pos();
            self.advance();
            let operand = self.unary()?;
            return Ok(self.locate(
                Expr::Unary(UnaryExpr {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                }),
                pos,
            ));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Located<Expr>> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let (member, _) = self.expect_identifier("a member name after '.'")?;
                    let pos = expr.pos;
                    expr = self.locate(
                        Expr::Member(MemberExpr {
                            target: Some(Box::new(expr)),
                            member,
                        }),
                        pos,
                    );
                }
                TokenKind::LParen => {
                    let args = self.call_args()?;
                    let pos = expr.pos;
                    expr = self.locate(
                        Expr::Call(CallExpr {
                            callee: Box::new(expr),
                            args,
                        }),
                        pos,
                    );
                }
                TokenKind::LBracket => {
                    let indices = self.index_list()?;
                    let pos = expr.pos;
                    expr = self.locate(
                        Expr::Index(IndexExpr {
                            target: Box::new(expr),
                            indices,
                        }),
                        pos,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    pub(crate) fn call_args(&mut self) -> PResult<Vec<Located<Expr>>> {
        self.expect(&TokenKind::LParen, "Expected '(' to open the argument list")?;
        self.grouped(|p| {
            let mut args = Vec::new();
            if !p.check(&TokenKind::RParen) {
                args.push(p.expression()?);
                while p.match_token(&TokenKind::Comma) {
                    args.push(p.expression()?);
                }
            }
            p.expect(&TokenKind::RParen, "Expected ')' to close the argument list")?;
            Ok(args)
        })
    }

    fn index_list(&mut self) -> PResult<Vec<Located<Expr>>> {
        self.expect(&TokenKind::LBracket, "Expected '[' to open the index")?;
        self.grouped(|p| {
            let mut indices = vec![p.expression()?];
            while p.match_token(&TokenKind::Comma) {
                indices.push(p.expression()?);
            }
            p.expect(&TokenKind::RBracket, "Expected ']' to close the index")?;
            Ok(indices)
        })
    }

    fn primary(&mut self) -> PResult<Located<Expr>> {
        let pos = self.current_pos();
        let kind = self.peek().kind.clone();
        let expr = match kind {
            TokenKind::Int(value) => {
                self.advance();
                Expr::Integer(value)
            }
            TokenKind::Float(value) => {
                self.advance();
                Expr::Float(value)
            }
            TokenKind::Str(value) => {
                self.advance();
                Expr::Str(value)
            }
            TokenKind::True => {
                self.advance();
                Expr::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                Expr::Bool(false)
            }
            TokenKind::Nothing => {
                self.advance();
                Expr::Nothing
            }
            TokenKind::Me => {
                self.advance();
                Expr::Me
            }
            TokenKind::MyBase => {
                self.advance();
                Expr::MyBase
            }
            TokenKind::Ident(name) => {
                self.advance();
                Expr::Identifier(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.grouped(Self::expression)?;
                self.expect(&TokenKind::RParen, "Expected ')' to close the grouping")?;
                // Parentheses are transparent; the inner node carries on.
                return Ok(inner);
            }
            TokenKind::New => return self.new_expr(),
            TokenKind::CType => return self.cast_expr(),
            TokenKind::Dot => {
                // Leading-dot member access inside a With block.
                self.advance();
                let (member, _) = self.expect_identifier("a member name after '.'")?;
                Expr::Member(MemberExpr {
                    target: None,
                    member,
                })
            }
            _ => return Err(self.error_here("Expected an expression")),
        };
        Ok(self.locate(expr, pos))
    }

    fn new_expr(&mut self) -> PResult<Located<Expr>> {
        let pos = self.current_pos();
        self.expect(&TokenKind::New, "Expected 'New'")?;
        let ty = self.type_ref()?;
        let args = if self.check(&TokenKind::LParen) {
            self.call_args()?
        } else {
            Vec::new()
        };
        Ok(self.locate(Expr::New(NewExpr { ty, args }), pos))
    }

    fn cast_expr(&mut self) -> PResult<Located<Expr>> {
        let pos = self.current_pos();
        self.expect(&TokenKind::CType, "Expected 'CType'")?;
        self.expect(&TokenKind::LParen, "Expected '(' after 'CType'")?;
        let (value, ty) = self.grouped(|p| {
            let value = p.expression()?;
            p.expect(
                &TokenKind::Comma,
                "Expected ',' between the value and the target type",
            )?;
            let ty = p.type_ref()?;
            Ok((value, ty))
        })?;
        self.expect(&TokenKind::RParen, "Expected ')' to close the CType call")?;
        Ok(self.locate(
            Expr::Cast(CastExpr {
                expr: Box::new(value),
                ty,
            }),
            pos,
        ))
    }

    // ===== query expressions =====

    /// `From x In xs [Where ...] [Select ...] ...`
    ///
    /// A query can never be an assignment target, so the whole body runs
    /// with equality restored even at statement head.
    fn query_expr(&mut self) -> PResult<Located<Expr>> {
        self.with_context("query expression", |p| {
            p.grouped(|p| {
                let pos = p.current_pos();
                p.expect(&TokenKind::From, "Expected 'From'")?;
                let (var, var_pos) = p.expect_identifier("a range variable after 'From'")?;
                p.expect(&TokenKind::In, "Expected 'In' after the range variable")?;
                let source = p.or_expr()?;

                let mut clauses = Vec::new();
                loop {
                    let clause_pos = p.current_pos();
                    let clause = match p.peek().kind {
                        TokenKind::Where => {
                            p.advance();
                            QueryClause::Where(p.or_expr()?)
                        }
                        TokenKind::Select => {
                            p.advance();
                            QueryClause::Select(p.or_expr()?)
                        }
                        TokenKind::Order => {
                            p.advance();
                            p.expect(&TokenKind::By, "Expected 'By' after 'Order'")?;
                            let key = p.or_expr()?;
                            let descending = if p.match_token(&TokenKind::Descending) {
                                true
                            } else {
                                p.match_token(&TokenKind::Ascending);
                                false
                            };
                            QueryClause::OrderBy { key, descending }
                        }
                        TokenKind::Group => {
                            p.advance();
                            p.expect(&TokenKind::By, "Expected 'By' after 'Group'")?;
                            let key = p.or_expr()?;
                            p.expect(&TokenKind::Into, "Expected 'Into' to name the group")?;
                            let (group, group_pos) =
                                p.expect_identifier("a name for the group")?;
                            QueryClause::GroupBy {
                                key,
                                group,
                                group_pos,
                            }
                        }
                        TokenKind::Join => {
                            p.advance();
                            let (var, var_pos) =
                                p.expect_identifier("a range variable after 'Join'")?;
                            p.expect(&TokenKind::In, "Expected 'In' after the range variable")?;
                            let source = p.or_expr()?;
                            p.expect(&TokenKind::On, "Expected 'On' to give the join keys")?;
                            let left_key = p.or_expr()?;
                            p.expect(
                                &TokenKind::Equals,
                                "Expected 'Equals' between the join keys",
                            )?;
                            let right_key = p.or_expr()?;
                            let group = if p.match_token(&TokenKind::Into) {
                                Some(p.expect_identifier("a name for the joined group")?.0)
                            } else {
                                None
                            };
                            QueryClause::Join {
                                var,
                                var_pos,
                                source,
                                left_key,
                                right_key,
                                group,
                            }
                        }
                        TokenKind::Aggregate => {
                            p.advance();
                            let (var, var_pos) =
                                p.expect_identifier("a range variable after 'Aggregate'")?;
                            p.expect(&TokenKind::In, "Expected 'In' after the range variable")?;
                            let source = p.or_expr()?;
                            p.expect(
                                &TokenKind::Into,
                                "Expected 'Into' to name the aggregate result",
                            )?;
                            let (result, result_pos) =
                                p.expect_identifier("a name for the aggregate result")?;
                            p.expect(&TokenKind::Eq, "Expected '=' after the aggregate name")?;
                            let value = p.or_expr()?;
                            QueryClause::Aggregate {
                                var,
                                var_pos,
                                source,
                                result,
                                result_pos,
                                value,
                            }
                        }
                        TokenKind::Let => {
                            p.advance();
                            let (name, name_pos) = p.expect_identifier("a name after 'Let'")?;
                            p.expect(&TokenKind::Eq, "Expected '=' after the Let name")?;
                            let value = p.or_expr()?;
                            QueryClause::Let {
                                name,
                                name_pos,
                                value,
                            }
                        }
                        TokenKind::Take => {
                            p.advance();
                            QueryClause::Take(p.or_expr()?)
                        }
                        TokenKind::Skip => {
                            p.advance();
                            QueryClause::Skip(p.or_expr()?)
                        }
                        TokenKind::Distinct => {
                            p.advance();
                            QueryClause::Distinct
                        }
                        _ => break,
                    };
                    clauses.push(p.locate(clause, clause_pos));
                }

                Ok(p.locate(
                    Expr::Query(QueryExpr {
                        var,
                        var_pos,
                        source: Box::new(source),
                        clauses,
                    }),
                    pos,
                ))
            })
        })
    }
}
