//! Statement parsing: blocks, control flow, assignment.
//!
//! ## Notes
//!
//! - Statement blocks run their own recovery loop; a bad statement is
//!   reported and skipped without abandoning the rest of the block.
//! - In statement position a bare `=` after the head expression means
//!   assignment. Inside parentheses and argument lists it is equality.

use crate::frontend::ast::{
    AssignOp, AssignStmt, Block, CaseClause, CatchClause, DoLoopStmt, ElseIf, ExitKind, Expr,
    ForEachStmt, ForStmt, IfStmt, Located, SelectStmt, Stmt, TryStmt, WhileStmt, WithStmt,
};
use crate::frontend::diagnostics::ParseError;
use crate::frontend::lexer::TokenKind;

use super::decl::Modifiers;
use super::{PResult, Parser, Recover};

impl Parser {
    pub(crate) fn statement(&mut self) -> PResult<Located<Stmt>> {
        let pos = self.current_pos();
        let stmt = match self.peek().kind {
            TokenKind::Dim => Stmt::Variable(self.var_decl(&Modifiers::default())?),
            TokenKind::Const => Stmt::Constant(self.const_decl(&Modifiers::default())?),
            TokenKind::If => self.if_stmt()?,
            TokenKind::Select => self.select_stmt()?,
            TokenKind::For => self.for_stmt()?,
            TokenKind::While => self.while_stmt()?,
            TokenKind::Do => self.do_stmt()?,
            TokenKind::Try => self.try_stmt()?,
            TokenKind::With => self.with_stmt()?,
            TokenKind::Return => self.return_stmt()?,
            TokenKind::Exit => self.exit_stmt()?,
            TokenKind::Throw => self.throw_stmt()?,
            _ => self.assignment_or_expr_stmt()?,
        };
        self.expect_statement_end()?;
        Ok(self.locate(stmt, pos))
    }

    /// Parse statements until a block terminator, recovering inside the
    /// block so one bad statement leaves the rest intact.
    pub(crate) fn parse_block(&mut self) -> PResult<Block> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.fatal {
                return Err(Recover);
            }
            if self.is_at_end() || self.at_block_end() {
                break;
            }
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => {
                    if self.fatal {
                        return Err(Recover);
                    }
                    self.synchronize();
                }
            }
        }
        Ok(Block { statements })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("If statement", |p| {
            p.expect(&TokenKind::If, "Expected 'If'")?;
            let cond = p.expression()?;
            p.expect_or_insert(&TokenKind::Then, "Expected 'Then' after the If condition")?;
            p.expect(&TokenKind::Newline, "Expected a new line after 'Then'")?;
            let then_block = p.parse_block()?;

            let mut else_ifs = Vec::new();
            let mut else_block = None;
            loop {
                if p.check(&TokenKind::ElseIf) {
                    if else_block.is_some() {
                        return Err(p.error_here("'ElseIf' cannot follow the 'Else' block"));
                    }
                    p.advance();
                    let cond = p.expression()?;
                    p.expect_or_insert(
                        &TokenKind::Then,
                        "Expected 'Then' after the ElseIf condition",
                    )?;
                    p.expect(&TokenKind::Newline, "Expected a new line after 'Then'")?;
                    let block = p.parse_block()?;
                    else_ifs.push(ElseIf { cond, block });
                } else if p.check(&TokenKind::Else) {
                    if else_block.is_some() {
                        return Err(p.error_here("An If statement may have only one 'Else' block"));
                    }
                    p.advance();
                    p.expect(&TokenKind::Newline, "Expected a new line after 'Else'")?;
                    else_block = Some(p.parse_block()?);
                } else {
                    break;
                }
            }

            p.expect(&TokenKind::End, "Expected 'End If' to close the If statement")?;
            p.expect(&TokenKind::If, "Expected 'If' after 'End'")?;
            Ok(Stmt::If(IfStmt {
                cond,
                then_block,
                else_ifs,
                else_block,
            }))
        })
    }

    fn select_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("Select Case statement", |p| {
            p.expect(&TokenKind::Select, "Expected 'Select'")?;
            p.expect(&TokenKind::Case, "Expected 'Case' after 'Select'")?;
            let subject = p.expression()?;
            p.expect(&TokenKind::Newline, "Expected a new line after the Select subject")?;
            p.skip_newlines();

            let mut cases = Vec::new();
            let mut else_block = None;
            while p.check(&TokenKind::Case) {
                p.advance();
                if p.match_token(&TokenKind::Else) {
                    if else_block.is_some() {
                        return Err(p.error_here("Only one 'Case Else' is allowed"));
                    }
                    p.expect(&TokenKind::Newline, "Expected a new line after 'Case Else'")?;
                    else_block = Some(p.parse_block()?);
                } else {
                    if else_block.is_some() {
                        return Err(p.error_here("'Case Else' must be the last case"));
                    }
                    let mut labels = vec![p.expression()?];
                    while p.match_token(&TokenKind::Comma) {
                        labels.push(p.expression()?);
                    }
                    p.expect(&TokenKind::Newline, "Expected a new line after the Case labels")?;
                    let block = p.parse_block()?;
                    cases.push(CaseClause { labels, block });
                }
                p.skip_newlines();
            }

            p.expect(&TokenKind::End, "Expected 'End Select'")?;
            p.expect(&TokenKind::Select, "Expected 'Select' after 'End'")?;
            Ok(Stmt::Select(SelectStmt {
                subject,
                cases,
                else_block,
            }))
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("For loop", |p| {
            p.expect(&TokenKind::For, "Expected 'For'")?;
            if p.match_token(&TokenKind::Each) {
                let (var, var_pos) = p.expect_identifier("a loop variable after 'For Each'")?;
                let var_ty = if p.match_token(&TokenKind::As) {
                    Some(p.type_ref()?)
                } else {
                    None
                };
                p.expect(&TokenKind::In, "Expected 'In' after the loop variable")?;
                let iterable = p.expression()?;
                p.expect(&TokenKind::Newline, "Expected a new line to start the loop body")?;
                let body = p.parse_block()?;
                p.close_next(&var)?;
                Ok(Stmt::ForEach(ForEachStmt {
                    var,
                    var_pos,
                    var_ty,
                    iterable,
                    body,
                }))
            } else {
                let (var, var_pos) = p.expect_identifier("a loop variable after 'For'")?;
                p.expect(&TokenKind::Eq, "Expected '=' after the loop variable")?;
                let from = p.expression()?;
                p.expect(&TokenKind::To, "Expected 'To' between the loop bounds")?;
                let to = p.expression()?;
                let step = if p.match_token(&TokenKind::Step) {
                    Some(p.expression()?)
                } else {
                    None
                };
                p.expect(&TokenKind::Newline, "Expected a new line to start the loop body")?;
                let body = p.parse_block()?;
                p.close_next(&var)?;
                Ok(Stmt::For(ForStmt {
                    var,
                    var_pos,
                    from,
                    to,
                    step,
                    body,
                }))
            }
        })
    }

    /// `Next [var]`, validating the optional trailing variable name.
    fn close_next(&mut self, var: &str) -> PResult<()> {
        self.expect(&TokenKind::Next, "Expected 'Next' to close the loop")?;
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            if !name.eq_ignore_ascii_case(var) {
                return Err(self.error_here(format!(
                    "'Next {}' does not match the loop variable '{}'",
                    name, var
                )));
            }
            self.advance();
        }
        Ok(())
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("While loop", |p| {
            p.expect(&TokenKind::While, "Expected 'While'")?;
            let cond = p.expression()?;
            p.expect(&TokenKind::Newline, "Expected a new line after the While condition")?;
            let body = p.parse_block()?;
            p.expect(&TokenKind::End, "Expected 'End While' to close the loop")?;
            p.expect(&TokenKind::While, "Expected 'While' after 'End'")?;
            Ok(Stmt::While(WhileStmt { cond, body }))
        })
    }

    fn do_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("Do loop", |p| {
            p.expect(&TokenKind::Do, "Expected 'Do'")?;
            let mut cond = None;
            let mut until = false;
            let mut post_test = false;
            if p.match_token(&TokenKind::While) {
                cond = Some(p.expression()?);
            } else if p.match_token(&TokenKind::Until) {
                cond = Some(p.expression()?);
                until = true;
            }
            p.expect(&TokenKind::Newline, "Expected a new line to start the loop body")?;
            let body = p.parse_block()?;
            p.expect(&TokenKind::Loop, "Expected 'Loop' to close the Do loop")?;

            if p.check(&TokenKind::While) || p.check(&TokenKind::Until) {
                if cond.is_some() {
                    return Err(
                        p.error_here("The loop condition belongs on 'Do' or 'Loop', not both")
                    );
                }
                until = p.check(&TokenKind::Until);
                p.advance();
                cond = Some(p.expression()?);
                post_test = true;
            }
            Ok(Stmt::DoLoop(DoLoopStmt {
                cond,
                until,
                post_test,
                body,
            }))
        })
    }

    fn try_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("Try statement", |p| {
            p.expect(&TokenKind::Try, "Expected 'Try'")?;
            p.expect(&TokenKind::Newline, "Expected a new line after 'Try'")?;
            let body = p.parse_block()?;

            let mut catches = Vec::new();
            let mut finally = None;
            while p.check(&TokenKind::Catch) {
                let catch_pos = p.current_pos();
                p.advance();
                let mut var = None;
                let mut var_pos = catch_pos;
                let mut ty = None;
                if let TokenKind::Ident(name) = &p.peek().kind {
                    let name = name.clone();
                    var_pos = p.current_pos();
                    p.advance();
                    var = Some(name);
                    if p.match_token(&TokenKind::As) {
                        ty = Some(p.type_ref()?);
                    }
                }
                p.expect(&TokenKind::Newline, "Expected a new line after the Catch clause")?;
                let block = p.parse_block()?;
                catches.push(CatchClause {
                    var,
                    var_pos,
                    ty,
                    block,
                });
            }
            if p.check(&TokenKind::Finally) {
                p.advance();
                p.expect(&TokenKind::Newline, "Expected a new line after 'Finally'")?;
                finally = Some(p.parse_block()?);
            }
            if catches.is_empty() && finally.is_none() {
                // Record and keep going; the End Try ahead is still good.
                p.note_here("A Try statement needs at least one 'Catch' or a 'Finally'")?;
            }

            p.expect(&TokenKind::End, "Expected 'End Try'")?;
            p.expect(&TokenKind::Try, "Expected 'Try' after 'End'")?;
            Ok(Stmt::Try(TryStmt {
                body,
                catches,
                finally,
            }))
        })
    }

    fn with_stmt(&mut self) -> PResult<Stmt> {
        self.with_context("With statement", |p| {
            p.expect(&TokenKind::With, "Expected 'With'")?;
            let subject = p.expression()?;
            p.expect(&TokenKind::Newline, "Expected a new line after the With subject")?;
            let body = p.parse_block()?;
            p.expect(&TokenKind::End, "Expected 'End With'")?;
            p.expect(&TokenKind::With, "Expected 'With' after 'End'")?;
            Ok(Stmt::With(WithStmt { subject, body }))
        })
    }

    fn return_stmt(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::Return, "Expected 'Return'")?;
        let value = if self.check(&TokenKind::Newline) || self.is_at_end() || self.at_block_end() {
            None
        } else {
            Some(self.expression()?)
        };
        Ok(Stmt::Return(value))
    }

    fn exit_stmt(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::Exit, "Expected 'Exit'")?;
        let kind = match self.peek().kind {
            TokenKind::Sub => ExitKind::Sub,
            TokenKind::Function => ExitKind::Function,
            TokenKind::For => ExitKind::For,
            TokenKind::While => ExitKind::While,
            TokenKind::Do => ExitKind::Do,
            TokenKind::Select => ExitKind::Select,
            _ => {
                return Err(self.error_here(
                    "Expected the block kind to exit, such as 'Exit Sub' or 'Exit For'",
                ));
            }
        };
        self.advance();
        Ok(Stmt::Exit(kind))
    }

    fn throw_stmt(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::Throw, "Expected 'Throw'")?;
        let value = self.expression()?;
        Ok(Stmt::Throw(value))
    }

    fn assignment_or_expr_stmt(&mut self) -> PResult<Stmt> {
        // The head expression must not swallow `=` as equality.
        self.suppress_eq = true;
        let head = self.expression();
        self.suppress_eq = false;
        let target = head?;

        let op = match self.peek().kind {
            TokenKind::Eq => Some(AssignOp::Set),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::SlashEq => Some(AssignOp::Div),
            TokenKind::AmpEq => Some(AssignOp::Concat),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(Stmt::Expression(target));
        };
        self.advance();
        let value = self.expression()?;

        if !matches!(
            target.node,
            Expr::Identifier(_) | Expr::Member(_) | Expr::Index(_)
        ) {
            let err = ParseError::new("Invalid assignment target", "an expression", target.pos)
                .with_suggestion("Assign to a variable, a member, or an array element");
            return Err(self.raise(err));
        }
        Ok(Stmt::Assign(AssignStmt { target, op, value }))
    }
}
