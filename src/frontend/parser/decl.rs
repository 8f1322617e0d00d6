//! Declaration parsing: namespaces, modules, classes, interfaces,
//! structures, enums, callables, and file-scope variables.
//!
//! ## Notes
//!
//! - Member lists have their own recovery loop: a bad member is reported,
//!   the parser synchronizes, and the remaining members still parse.
//! - Executable statements are legal at declaration position (script-style
//!   top level) and come back as [`Decl::Statement`].

use crate::frontend::ast::{
    Access, CallableDecl, CallableKind, ClassDecl, ConstDecl, Decl, EnumDecl, EnumVariant, Ident,
    InterfaceDecl, Located, ModuleDecl, NamespaceDecl, Param, StructureDecl, VarDecl,
};
use crate::frontend::lexer::TokenKind;

use super::{PResult, Parser, Recover};

/// Modifier keywords seen before a declaration.
#[derive(Debug, Default)]
pub(crate) struct Modifiers {
    access: Option<Access>,
    is_shared: bool,
    is_must_inherit: bool,
    is_must_override: bool,
    is_overrides: bool,
}

impl Modifiers {
    fn any(&self) -> bool {
        self.access.is_some()
            || self.is_shared
            || self.is_must_inherit
            || self.is_must_override
            || self.is_overrides
    }

    fn access_or_default(&self) -> Access {
        self.access.unwrap_or_default()
    }
}

impl Parser {
    pub(crate) fn declaration(&mut self) -> PResult<Located<Decl>> {
        let pos = self.current_pos();
        let mods = self.modifiers();

        let decl = match self.peek().kind {
            TokenKind::Namespace => self.namespace_decl()?,
            TokenKind::Module => self.module_decl(&mods)?,
            TokenKind::Class => self.class_decl(&mods)?,
            TokenKind::Interface => self.interface_decl(&mods)?,
            TokenKind::Structure => self.structure_decl(&mods)?,
            TokenKind::Enum => self.enum_decl(&mods)?,
            TokenKind::Function => {
                Decl::Function(self.callable_decl(CallableKind::Function, &mods, false)?)
            }
            TokenKind::Sub => Decl::Sub(self.callable_decl(CallableKind::Sub, &mods, false)?),
            TokenKind::Dim => Decl::Variable(self.var_decl(&mods)?),
            TokenKind::Const => Decl::Constant(self.const_decl(&mods)?),
            _ if mods.any() => {
                return Err(self.error_here("Expected a declaration after the modifiers"));
            }
            _ => Decl::Statement(self.statement()?),
        };

        // `statement()` consumes its own line end; every other form ends here.
        if !matches!(decl, Decl::Statement(_)) {
            self.expect_statement_end()?;
        }
        Ok(self.locate(decl, pos))
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut mods = Modifiers::default();
        loop {
            match self.peek().kind {
                TokenKind::Public => {
                    self.advance();
                    mods.access = Some(Access::Public);
                }
                TokenKind::Private => {
                    self.advance();
                    mods.access = Some(Access::Private);
                }
                TokenKind::Protected => {
                    self.advance();
                    mods.access = Some(Access::Protected);
                }
                TokenKind::Friend => {
                    self.advance();
                    mods.access = Some(Access::Friend);
                }
                TokenKind::Shared => {
                    self.advance();
                    mods.is_shared = true;
                }
                TokenKind::MustInherit => {
                    self.advance();
                    mods.is_must_inherit = true;
                }
                TokenKind::MustOverride => {
                    self.advance();
                    mods.is_must_override = true;
                }
                TokenKind::Overrides => {
                    self.advance();
                    mods.is_overrides = true;
                }
                _ => break,
            }
        }
        mods
    }

    /// Parse declarations until `End` (or end of file), recovering inside
    /// the list so one bad member does not take the rest down.
    fn member_list(&mut self) -> PResult<Vec<Located<Decl>>> {
        let mut members = Vec::new();
        loop {
            self.skip_newlines();
            if self.fatal {
                return Err(Recover);
            }
            if self.is_at_end() || self.check(&TokenKind::End) {
                break;
            }
            match self.declaration() {
                Ok(member) => members.push(member),
                Err(_) => {
                    if self.fatal {
                        return Err(Recover);
                    }
                    self.synchronize();
                }
            }
        }
        Ok(members)
    }

    fn namespace_decl(&mut self) -> PResult<Decl> {
        self.advance(); // Namespace
        let (name, _) = self.expect_identifier("a name for the Namespace")?;
        self.with_context(format!("Namespace '{}'", name), move |p| {
            p.expect_statement_end()?;
            let body = p.member_list()?;
            p.expect(&TokenKind::End, "Expected 'End Namespace'")?;
            p.expect(&TokenKind::Namespace, "Expected 'Namespace' after 'End'")?;
            Ok(Decl::Namespace(NamespaceDecl { name, body }))
        })
    }

    fn module_decl(&mut self, mods: &Modifiers) -> PResult<Decl> {
        self.advance(); // Module
        let (name, _) = self.expect_identifier("a name for the Module")?;
        self.with_context(format!("Module '{}'", name), move |p| {
            p.expect_statement_end()?;
            let body = p.member_list()?;
            p.expect(&TokenKind::End, "Expected 'End Module'")?;
            p.expect(&TokenKind::Module, "Expected 'Module' after 'End'")?;
            Ok(Decl::Module(ModuleDecl {
                name,
                access: mods.access_or_default(),
                body,
            }))
        })
    }

    fn class_decl(&mut self, mods: &Modifiers) -> PResult<Decl> {
        self.advance(); // Class
        let (name, _) = self.expect_identifier("a name for the Class")?;
        self.with_context(format!("Class '{}'", name), move |p| {
            let type_params = p.type_param_list()?;
            p.expect_statement_end()?;
            p.skip_newlines();

            let mut inherits = None;
            let mut implements = Vec::new();
            loop {
                if p.check(&TokenKind::Inherits) {
                    if inherits.is_some() {
                        return Err(p.error_here("A class may have only one 'Inherits' clause"));
                    }
                    p.advance();
                    inherits = Some(p.type_ref()?);
                    p.expect_statement_end()?;
                    p.skip_newlines();
                } else if p.check(&TokenKind::Implements) {
                    p.advance();
                    loop {
                        implements.push(p.type_ref()?);
                        if !p.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                    p.expect_statement_end()?;
                    p.skip_newlines();
                } else {
                    break;
                }
            }

            let members = p.member_list()?;
            p.expect(&TokenKind::End, "Expected 'End Class'")?;
            p.expect(&TokenKind::Class, "Expected 'Class' after 'End'")?;
            Ok(Decl::Class(ClassDecl {
                name,
                access: mods.access_or_default(),
                is_abstract: mods.is_must_inherit,
                type_params,
                inherits,
                implements,
                members,
            }))
        })
    }

    fn interface_decl(&mut self, mods: &Modifiers) -> PResult<Decl> {
        self.advance(); // Interface
        let (name, _) = self.expect_identifier("a name for the Interface")?;
        self.with_context(format!("Interface '{}'", name), move |p| {
            let type_params = p.type_param_list()?;
            p.expect_statement_end()?;

            let mut members = Vec::new();
            loop {
                p.skip_newlines();
                if p.fatal {
                    return Err(Recover);
                }
                if p.is_at_end() || p.check(&TokenKind::End) {
                    break;
                }
                match p.interface_member() {
                    Ok(member) => members.push(member),
                    Err(_) => {
                        if p.fatal {
                            return Err(Recover);
                        }
                        p.synchronize();
                    }
                }
            }

            p.expect(&TokenKind::End, "Expected 'End Interface'")?;
            p.expect(&TokenKind::Interface, "Expected 'Interface' after 'End'")?;
            Ok(Decl::Interface(InterfaceDecl {
                name,
                access: mods.access_or_default(),
                type_params,
                members,
            }))
        })
    }

    /// One interface member: a Function or Sub signature without a body.
    fn interface_member(&mut self) -> PResult<Located<Decl>> {
        let pos = self.current_pos();
        let mods = self.modifiers();
        let member = match self.peek().kind {
            TokenKind::Function => {
                Decl::Function(self.callable_decl(CallableKind::Function, &mods, true)?)
            }
            TokenKind::Sub => Decl::Sub(self.callable_decl(CallableKind::Sub, &mods, true)?),
            _ => {
                return Err(
                    self.error_here("Only Function and Sub signatures may appear in an Interface")
                );
            }
        };
        self.expect_statement_end()?;
        Ok(self.locate(member, pos))
    }

    fn structure_decl(&mut self, mods: &Modifiers) -> PResult<Decl> {
        self.advance(); // Structure
        let (name, _) = self.expect_identifier("a name for the Structure")?;
        self.with_context(format!("Structure '{}'", name), move |p| {
            p.expect_statement_end()?;
            let members = p.member_list()?;
            p.expect(&TokenKind::End, "Expected 'End Structure'")?;
            p.expect(&TokenKind::Structure, "Expected 'Structure' after 'End'")?;
            Ok(Decl::Structure(StructureDecl {
                name,
                access: mods.access_or_default(),
                members,
            }))
        })
    }

    fn enum_decl(&mut self, mods: &Modifiers) -> PResult<Decl> {
        self.advance(); // Enum
        let (name, _) = self.expect_identifier("a name for the Enum")?;
        self.with_context(format!("Enum '{}'", name), move |p| {
            p.expect_statement_end()?;

            let mut variants = Vec::new();
            loop {
                p.skip_newlines();
                if p.fatal {
                    return Err(Recover);
                }
                if p.is_at_end() || p.check(&TokenKind::End) {
                    break;
                }
                match p.enum_variant() {
                    Ok(variant) => variants.push(variant),
                    Err(_) => {
                        if p.fatal {
                            return Err(Recover);
                        }
                        p.synchronize();
                    }
                }
            }

            p.expect(&TokenKind::End, "Expected 'End Enum'")?;
            p.expect(&TokenKind::Enum, "Expected 'Enum' after 'End'")?;
            Ok(Decl::Enum(EnumDecl {
                name,
                access: mods.access_or_default(),
                variants,
            }))
        })
    }

    fn enum_variant(&mut self) -> PResult<EnumVariant> {
        let (name, pos) = self.expect_identifier("an enum member name")?;
        let value = if self.match_token(&TokenKind::Eq) {
            let negative = self.match_token(&TokenKind::Minus);
            if let TokenKind::Int(v) = self.peek().kind {
                self.advance();
                Some(if negative { -v } else { v })
            } else {
                return Err(self.error_here("Expected an integer value for the enum member"));
            }
        } else {
            None
        };
        self.expect_statement_end()?;
        Ok(EnumVariant { name, value, pos })
    }

    /// Parse a `Function` or `Sub` declaration. `bodiless` members (interface
    /// signatures) stop after the header; `MustOverride` members do the same.
    pub(crate) fn callable_decl(
        &mut self,
        kind: CallableKind,
        mods: &Modifiers,
        bodiless: bool,
    ) -> PResult<CallableDecl> {
        self.advance(); // Function | Sub
        let what = match kind {
            CallableKind::Function => "a name for the Function",
            CallableKind::Sub => "a name for the Sub",
        };
        let (name, _) = self.expect_identifier(what)?;
        self.with_context(format!("{} '{}'", kind, name), move |p| {
            let type_params = p.type_param_list()?;
            let params = p.param_list()?;

            let return_type = match kind {
                CallableKind::Function => {
                    if p.match_token(&TokenKind::As) {
                        Some(p.type_ref()?)
                    } else {
                        None
                    }
                }
                CallableKind::Sub => {
                    if p.check(&TokenKind::As) {
                        // Record, then swallow the spurious clause so the
                        // body still parses.
                        p.note_here("A Sub does not declare a return type")?;
                        p.advance();
                        p.type_ref()?;
                    }
                    None
                }
            };

            let body = if bodiless || mods.is_must_override {
                None
            } else {
                p.expect_statement_end()?;
                let body = p.parse_block()?;
                p.expect(&TokenKind::End, &format!("Expected 'End {}'", kind))?;
                match kind {
                    CallableKind::Function => {
                        p.expect(&TokenKind::Function, "Expected 'Function' after 'End'")?
                    }
                    CallableKind::Sub => p.expect(&TokenKind::Sub, "Expected 'Sub' after 'End'")?,
                };
                Some(body)
            };

            Ok(CallableDecl {
                name,
                access: mods.access_or_default(),
                is_shared: mods.is_shared,
                is_abstract: mods.is_must_override,
                is_override: mods.is_overrides,
                type_params,
                params,
                return_type,
                body,
            })
        })
    }

    /// `(Of T, U)` in a declaration header. Returns an empty list when the
    /// header has no type parameters.
    fn type_param_list(&mut self) -> PResult<Vec<Ident>> {
        if !(self.check(&TokenKind::LParen) && self.peek_next().kind == TokenKind::Of) {
            return Ok(Vec::new());
        }
        self.advance(); // (
        self.advance(); // Of
        let mut params = Vec::new();
        loop {
            let (name, _) = self.expect_identifier("a type parameter name")?;
            params.push(name);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "Expected ')' after the type parameters")?;
        Ok(params)
    }

    fn param_list(&mut self) -> PResult<Vec<Param>> {
        self.expect(&TokenKind::LParen, "Expected '(' to start the parameter list")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.param()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "Expected ')' after the parameters")?;
        Ok(params)
    }

    fn param(&mut self) -> PResult<Param> {
        let mut optional = false;
        let mut param_array = false;
        let mut by_ref = false;
        loop {
            match self.peek().kind {
                TokenKind::Optional => {
                    self.advance();
                    optional = true;
                }
                TokenKind::ParamArray => {
                    self.advance();
                    param_array = true;
                }
                TokenKind::ByVal => {
                    self.advance();
                }
                TokenKind::ByRef => {
                    self.advance();
                    by_ref = true;
                }
                _ => break,
            }
        }

        let (name, pos) = self.expect_identifier("a parameter name")?;
        let ty = if self.match_token(&TokenKind::As) {
            Some(self.type_ref()?)
        } else {
            None
        };
        let default = if self.match_token(&TokenKind::Eq) {
            Some(self.grouped(Self::expression)?)
        } else {
            None
        };

        if optional && default.is_none() {
            self.note_here(format!(
                "Optional parameter '{}' must have a default value",
                name
            ))?;
        }
        Ok(Param {
            name,
            ty,
            by_ref,
            optional,
            param_array,
            default,
            pos,
        })
    }

    pub(crate) fn var_decl(&mut self, mods: &Modifiers) -> PResult<VarDecl> {
        self.advance(); // Dim
        let (name, _) = self.expect_identifier("a variable name after 'Dim'")?;
        let ty = if self.match_token(&TokenKind::As) {
            Some(self.type_ref()?)
        } else {
            None
        };
        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(VarDecl {
            name,
            access: mods.access_or_default(),
            is_shared: mods.is_shared,
            ty,
            init,
        })
    }

    pub(crate) fn const_decl(&mut self, mods: &Modifiers) -> PResult<ConstDecl> {
        self.advance(); // Const
        let (name, _) = self.expect_identifier("a constant name after 'Const'")?;
        let ty = if self.match_token(&TokenKind::As) {
            Some(self.type_ref()?)
        } else {
            None
        };
        self.expect(&TokenKind::Eq, "Expected '=' to give the constant a value")?;
        let value = self.expression()?;
        Ok(ConstDecl {
            name,
            access: mods.access_or_default(),
            ty,
            value,
        })
    }
}
