//! Type reference parsing.
//!
//! A type is a named base (possibly generic) followed by any mix of
//! postfix suffixes: `[...]` array, `?` nullable, `Ptr` pointer. The
//! suffixes nest left to right, so `Integer[] Ptr` is a pointer to an
//! array of Integer.

use crate::frontend::ast::{Located, TypeRef};
use crate::frontend::lexer::TokenKind;

use super::{PResult, Parser};

impl Parser {
    pub(crate) fn type_ref(&mut self) -> PResult<Located<TypeRef>> {
        let pos = self.current_pos();
        let base = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                // `Name(` is only a generic when followed by `Of`; otherwise
                // the parenthesis belongs to the caller (constructor args).
                if self.check(&TokenKind::LParen)
                    && matches!(self.peek_next().kind, TokenKind::Of)
                {
                    self.advance();
                    self.advance();
                    let mut args = vec![self.type_ref()?];
                    while self.match_token(&TokenKind::Comma) {
                        args.push(self.type_ref()?);
                    }
                    self.expect(
                        &TokenKind::RParen,
                        "Expected ')' to close the type arguments",
                    )?;
                    TypeRef::Generic(name, args)
                } else {
                    TypeRef::Named(name)
                }
            }
            _ => return Err(self.error_here("Expected a type name")),
        };

        let mut ty = self.locate(base, pos);
        loop {
            match self.peek().kind {
                TokenKind::LBracket => {
                    self.advance();
                    let size = if let TokenKind::Int(n) = self.peek().kind {
                        match u32::try_from(n) {
                            Ok(n) => {
                                self.advance();
                                Some(n)
                            }
                            Err(_) => return Err(self.error_here("Array size is out of range")),
                        }
                    } else {
                        None
                    };
                    let mut rank = 1u32;
                    while self.match_token(&TokenKind::Comma) {
                        rank += 1;
                    }
                    self.expect(&TokenKind::RBracket, "Expected ']' to close the array type")?;
                    ty = self.locate(
                        TypeRef::Array {
                            element: Box::new(ty),
                            rank,
                            size,
                        },
                        pos,
                    );
                }
                TokenKind::Question => {
                    self.advance();
                    ty = self.locate(TypeRef::Nullable(Box::new(ty)), pos);
                }
                TokenKind::Ptr => {
                    self.advance();
                    ty = self.locate(TypeRef::Pointer(Box::new(ty)), pos);
                }
                _ => break,
            }
        }
        Ok(ty)
    }
}
