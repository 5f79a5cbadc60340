//! Recursive-descent parser producing the [`crate::ast`] node types from a
//! token stream. Kept behind the same boundary a production-grammar parser
//! would implement: [`parse_module`] is the sole entry point the loader
//! calls, and it reports `{line, message}` errors exactly as the external
//! interfaces contract requires of the parser collaborator.

use super::lexer::{Lexer, Token};
use super::*;
use crate::name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let (tok, line) = lexer.next_token();
        let is_eof = tok == Token::Eof;
        tokens.push((tok, line));
        if is_eof {
            break;
        }
    }
    let mut parser = Parser { tokens, pos: 0 };
    let stmts = parser.parse_stmts_until_eof()?;
    Ok(Module { stmts })
}

struct Parser {
    tokens: Vec<(Token, u32)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].0
    }

    fn cur_line(&self) -> u32 {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn peek_is(&self, tok: Token) -> bool {
        *self.peek() == tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.cur_line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), ParseError> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    fn ident_text(&self) -> Option<&str> {
        match self.peek() {
            Token::Identifier(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn ident_is(&self, kw: &str) -> bool {
        self.ident_text()
            .is_some_and(|s| s.eq_ignore_ascii_case(kw))
    }

    fn eat_ident_kw(&mut self, kw: &str) -> bool {
        if self.ident_is(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident_kw(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_ident_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{kw}`, found {:?}", self.peek())))
        }
    }

    /// A bare or namespace-qualified name (identifiers already capture the
    /// `\`-joined segments as one token).
    fn parse_qualified_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Identifier(s) => Ok(s),
            other => Err(ParseError {
                line: self.cur_line(),
                message: format!("expected a name, found {other:?}"),
            }),
        }
    }

    fn parse_identifier_name(&mut self) -> Result<String, ParseError> {
        self.parse_qualified_name()
    }

    fn parse_variable_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Variable(s) => Ok(s),
            other => Err(ParseError {
                line: self.cur_line(),
                message: format!("expected a variable, found {other:?}"),
            }),
        }
    }

    fn parse_stmts_until_eof(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_eof() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.peek_is(Token::RBrace) && !self.is_eof() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_is(Token::LBrace) {
            let line = self.cur_line();
            let stmts = self.parse_block()?;
            return Ok(Stmt::Block { stmts, line });
        }
        if self.peek_is(Token::Semicolon) {
            let line = self.cur_line();
            self.advance();
            return Ok(Stmt::Block {
                stmts: Vec::new(),
                line,
            });
        }
        if self.ident_is("namespace") {
            return self.parse_namespace();
        }
        if self.ident_is("use") {
            return self.parse_use();
        }
        if self.ident_is("const") {
            return self.parse_const_decl();
        }
        if self.ident_is("function") && matches!(self.peek_at(1), Token::Identifier(_) | Token::Amp)
        {
            return Ok(Stmt::FunctionDecl(self.parse_function_decl()?));
        }
        if self.ident_is("abstract") || self.ident_is("final") {
            return Ok(Stmt::ClassDecl(self.parse_class_like()?));
        }
        if self.ident_is("class") || self.ident_is("interface") || self.ident_is("trait") || self.ident_is("enum")
        {
            return Ok(Stmt::ClassDecl(self.parse_class_like()?));
        }
        if self.ident_is("return") {
            return self.parse_return();
        }
        if self.ident_is("if") {
            return self.parse_if();
        }
        if self.ident_is("foreach") {
            return self.parse_foreach();
        }
        if self.ident_is("try") {
            return self.parse_try();
        }
        if self.ident_is("global") {
            return self.parse_global();
        }
        if self.ident_is("static") && matches!(self.peek_at(1), Token::Variable(_)) {
            return self.parse_static_var();
        }
        if self.ident_is("include")
            || self.ident_is("include_once")
            || self.ident_is("require")
            || self.ident_is("require_once")
        {
            return self.parse_include();
        }
        let line = self.cur_line();
        let expr = self.parse_expr()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::ExprStmt { expr, line })
    }

    fn parse_namespace(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let name = if matches!(self.peek(), Token::Identifier(_)) {
            Some(self.parse_qualified_name()?)
        } else {
            None
        };
        if self.peek_is(Token::LBrace) {
            let body = self.parse_block()?;
            Ok(Stmt::Namespace {
                name,
                body: Some(body),
                line,
            })
        } else {
            self.expect(Token::Semicolon)?;
            Ok(Stmt::Namespace {
                name,
                body: None,
                line,
            })
        }
    }

    fn parse_use(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let target = self.parse_qualified_name()?;
        let alias = if self.eat_ident_kw("as") {
            self.parse_identifier_name()?
        } else {
            name::split_last_segment(&target).1.to_string()
        };
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Use { alias, target, line })
    }

    fn parse_const_decl(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let mut items = Vec::new();
        loop {
            let name = self.parse_identifier_name()?;
            self.expect(Token::Eq)?;
            let value = self.parse_expr()?;
            items.push((name, value));
            if self.peek_is(Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::Semicolon)?;
        Ok(Stmt::ConstDecl { items, line })
    }

    fn parse_function_decl(&mut self) -> Result<FunctionDecl, ParseError> {
        let line = self.cur_line();
        self.advance();
        if self.peek_is(Token::Amp) {
            self.advance();
        }
        let name = self.parse_identifier_name()?;
        let params = self.parse_params()?;
        let return_type = self.parse_optional_return_type()?;
        let body = if self.peek_is(Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.expect(Token::Semicolon)?;
            None
        };
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            line,
        })
    }

    fn peek_visibility_modifier(&self) -> Option<Modifiers> {
        if self.ident_is("public") {
            Some(Modifiers::PUBLIC)
        } else if self.ident_is("protected") {
            Some(Modifiers::PROTECTED)
        } else if self.ident_is("private") {
            Some(Modifiers::PRIVATE)
        } else if self.ident_is("readonly") {
            Some(Modifiers::READONLY)
        } else {
            None
        }
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.peek_is(Token::RParen) {
            loop {
                let line = self.cur_line();
                let mut modifiers = Modifiers::empty();
                while let Some(m) = self.peek_visibility_modifier() {
                    modifiers |= m;
                    self.advance();
                }
                let starts_type = !matches!(self.peek(), Token::Variable(_))
                    && !self.peek_is(Token::Amp)
                    && !self.peek_is(Token::Ellipsis);
                let type_hint = if starts_type {
                    Some(self.parse_type_hint()?)
                } else {
                    None
                };
                let by_reference = if self.peek_is(Token::Amp) {
                    self.advance();
                    true
                } else {
                    false
                };
                let variadic = if self.peek_is(Token::Ellipsis) {
                    self.advance();
                    true
                } else {
                    false
                };
                let name = self.parse_variable_name()?;
                let default = if self.peek_is(Token::Eq) {
                    self.advance();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param {
                    name,
                    type_hint,
                    by_reference,
                    variadic,
                    default,
                    visibility: if modifiers.is_empty() {
                        None
                    } else {
                        Some(modifiers)
                    },
                    line,
                });
                if self.peek_is(Token::Comma) {
                    self.advance();
                    if self.peek_is(Token::RParen) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_optional_return_type(&mut self) -> Result<Option<TypeNode>, ParseError> {
        if self.peek_is(Token::Colon) {
            self.advance();
            Ok(Some(self.parse_type_hint()?))
        } else {
            Ok(None)
        }
    }

    fn parse_type_name(&mut self) -> Result<String, ParseError> {
        self.parse_qualified_name()
    }

    fn parse_type_hint(&mut self) -> Result<TypeNode, ParseError> {
        let nullable = if self.peek_is(Token::Question) {
            self.advance();
            true
        } else {
            false
        };
        let first = self.parse_type_name()?;
        let mut node = TypeNode::Named(first, nullable);
        if self.peek_is(Token::Pipe) {
            let mut members = vec![node];
            while self.peek_is(Token::Pipe) {
                self.advance();
                let n = self.parse_type_name()?;
                members.push(TypeNode::Named(n, false));
            }
            node = TypeNode::Union(members);
        } else if self.peek_is(Token::Amp) && matches!(self.peek_at(1), Token::Identifier(_)) {
            let mut members = vec![node];
            while self.peek_is(Token::Amp) && matches!(self.peek_at(1), Token::Identifier(_)) {
                self.advance();
                let n = self.parse_type_name()?;
                members.push(TypeNode::Named(n, false));
            }
            node = TypeNode::Intersection(members);
        }
        Ok(node)
    }

    fn parse_class_like(&mut self) -> Result<ClassDecl, ParseError> {
        let line = self.cur_line();
        let mut modifiers = Modifiers::empty();
        loop {
            if self.eat_ident_kw("abstract") {
                modifiers |= Modifiers::ABSTRACT;
            } else if self.eat_ident_kw("final") {
                modifiers |= Modifiers::FINAL;
            } else {
                break;
            }
        }
        let kind = if self.eat_ident_kw("class") {
            ClassKind::Class
        } else if self.eat_ident_kw("interface") {
            ClassKind::Interface
        } else if self.eat_ident_kw("trait") {
            ClassKind::Trait
        } else if self.eat_ident_kw("enum") {
            ClassKind::Enum
        } else {
            return Err(self.error("expected class, interface, trait or enum"));
        };
        let name = self.parse_identifier_name()?;
        let enum_backing = if kind == ClassKind::Enum && self.peek_is(Token::Colon) {
            self.advance();
            Some(self.parse_type_hint()?)
        } else {
            None
        };
        let mut parent = None;
        let mut interfaces = Vec::new();
        if self.eat_ident_kw("extends") {
            let mut names = vec![self.parse_qualified_name()?];
            while self.peek_is(Token::Comma) {
                self.advance();
                names.push(self.parse_qualified_name()?);
            }
            if kind == ClassKind::Interface {
                interfaces.extend(names);
            } else {
                parent = names.into_iter().next();
            }
        }
        if self.eat_ident_kw("implements") {
            interfaces.push(self.parse_qualified_name()?);
            while self.peek_is(Token::Comma) {
                self.advance();
                interfaces.push(self.parse_qualified_name()?);
            }
        }
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.peek_is(Token::RBrace) && !self.is_eof() {
            members.push(self.parse_class_member()?);
        }
        self.expect(Token::RBrace)?;
        Ok(ClassDecl {
            name,
            kind,
            modifiers,
            parent,
            interfaces,
            enum_backing,
            members,
            line,
        })
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ParseError> {
        let line = self.cur_line();
        if self.ident_is("use") {
            return self.parse_trait_use();
        }
        if self.ident_is("case") {
            self.advance();
            let name = self.parse_identifier_name()?;
            let value = if self.peek_is(Token::Eq) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(Token::Semicolon)?;
            return Ok(ClassMember::EnumCase(EnumCaseDecl { name, value, line }));
        }

        let mut modifiers = Modifiers::empty();
        loop {
            if self.eat_ident_kw("public") {
                modifiers |= Modifiers::PUBLIC;
            } else if self.eat_ident_kw("protected") {
                modifiers |= Modifiers::PROTECTED;
            } else if self.eat_ident_kw("private") {
                modifiers |= Modifiers::PRIVATE;
            } else if self.eat_ident_kw("static") {
                modifiers |= Modifiers::STATIC;
            } else if self.eat_ident_kw("abstract") {
                modifiers |= Modifiers::ABSTRACT;
            } else if self.eat_ident_kw("final") {
                modifiers |= Modifiers::FINAL;
            } else if self.eat_ident_kw("readonly") {
                modifiers |= Modifiers::READONLY;
            } else {
                break;
            }
        }

        if self.ident_is("const") {
            self.advance();
            // Optional typed-constant hint: `const Type NAME = value;`.
            let checkpoint = self.pos;
            let mut type_hint = None;
            if matches!(self.peek(), Token::Identifier(_) | Token::Question) {
                if let Ok(hint) = self.parse_type_hint() {
                    if matches!(self.peek(), Token::Identifier(_)) {
                        type_hint = Some(hint);
                    } else {
                        self.pos = checkpoint;
                    }
                } else {
                    self.pos = checkpoint;
                }
            }
            let mut items = Vec::new();
            loop {
                let name = self.parse_identifier_name()?;
                self.expect(Token::Eq)?;
                let value = self.parse_expr()?;
                items.push((name, value));
                if self.peek_is(Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(Token::Semicolon)?;
            return Ok(ClassMember::Constant(ConstantDecl {
                items,
                type_hint,
                modifiers,
                line,
            }));
        }

        if self.ident_is("function") {
            self.advance();
            if self.peek_is(Token::Amp) {
                self.advance();
            }
            let name = self.parse_identifier_name()?;
            let params = self.parse_params()?;
            let return_type = self.parse_optional_return_type()?;
            let body = if self.peek_is(Token::LBrace) {
                Some(self.parse_block()?)
            } else {
                self.expect(Token::Semicolon)?;
                None
            };
            return Ok(ClassMember::Method(MethodDecl {
                name,
                params,
                return_type,
                body,
                modifiers,
                line,
            }));
        }

        // Property declaration: `[Type] $name [= default] (, $name2 ...)?;`
        let type_hint = if !matches!(self.peek(), Token::Variable(_)) {
            Some(self.parse_type_hint()?)
        } else {
            None
        };
        let mut items = Vec::new();
        loop {
            let pname = self.parse_variable_name()?;
            let default = if self.peek_is(Token::Eq) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            items.push((pname, default));
            if self.peek_is(Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::Semicolon)?;
        Ok(ClassMember::Property(PropertyDecl {
            items,
            type_hint,
            modifiers,
            line,
        }))
    }

    fn parse_trait_use(&mut self) -> Result<ClassMember, ParseError> {
        let line = self.cur_line();
        self.advance();
        let mut traits = vec![self.parse_qualified_name()?];
        while self.peek_is(Token::Comma) {
            self.advance();
            traits.push(self.parse_qualified_name()?);
        }
        let mut adaptations = Vec::new();
        if self.peek_is(Token::LBrace) {
            self.advance();
            while !self.peek_is(Token::RBrace) && !self.is_eof() {
                let trait_or_method = self.parse_qualified_name()?;
                let (trait_name, method) = if self.peek_is(Token::DoubleColon) {
                    self.advance();
                    (trait_or_method, self.parse_identifier_name()?)
                } else {
                    (String::new(), trait_or_method)
                };
                if self.eat_ident_kw("insteadof") {
                    let mut over = vec![self.parse_qualified_name()?];
                    while self.peek_is(Token::Comma) {
                        self.advance();
                        over.push(self.parse_qualified_name()?);
                    }
                    adaptations.push(TraitAdaptation {
                        trait_name,
                        method,
                        insteadof: over,
                    });
                } else if self.eat_ident_kw("as") {
                    // Visibility change / alias: skip the remainder of the
                    // clause, it does not affect method-resolution errors.
                    while !self.peek_is(Token::Semicolon) && !self.is_eof() {
                        self.advance();
                    }
                }
                self.expect(Token::Semicolon)?;
            }
            self.expect(Token::RBrace)?;
        } else {
            self.expect(Token::Semicolon)?;
        }
        Ok(ClassMember::TraitUse(TraitUseDecl {
            traits,
            adaptations,
            line,
        }))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let value = if self.peek_is(Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Return { value, line })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let then_body = if self.peek_is(Token::LBrace) {
            self.parse_block()?
        } else {
            vec![self.parse_stmt()?]
        };
        let else_body = if self.eat_ident_kw("else") {
            if self.ident_is("if") {
                vec![self.parse_if()?]
            } else if self.peek_is(Token::LBrace) {
                self.parse_block()?
            } else {
                vec![self.parse_stmt()?]
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        })
    }

    fn parse_foreach(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        self.expect(Token::LParen)?;
        let array = self.parse_expr()?;
        self.expect_ident_kw("as")?;
        let mut by_ref = if self.peek_is(Token::Amp) {
            self.advance();
            true
        } else {
            false
        };
        let first = self.parse_expr()?;
        let (key, value) = if self.peek_is(Token::FatArrow) {
            self.advance();
            let value_by_ref = if self.peek_is(Token::Amp) {
                self.advance();
                true
            } else {
                false
            };
            by_ref = value_by_ref;
            (Some(first), self.parse_expr()?)
        } else {
            (None, first)
        };
        self.expect(Token::RParen)?;
        let body = if self.peek_is(Token::LBrace) {
            self.parse_block()?
        } else {
            vec![self.parse_stmt()?]
        };
        Ok(Stmt::Foreach {
            array,
            key,
            value,
            by_ref,
            body,
            line,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.ident_is("catch") {
            let catch_line = self.cur_line();
            self.advance();
            self.expect(Token::LParen)?;
            let mut types = vec![self.parse_qualified_name()?];
            while self.peek_is(Token::Pipe) {
                self.advance();
                types.push(self.parse_qualified_name()?);
            }
            let var = if matches!(self.peek(), Token::Variable(_)) {
                Some(self.parse_variable_name()?)
            } else {
                None
            };
            self.expect(Token::RParen)?;
            let catch_body = self.parse_block()?;
            catches.push(CatchClause {
                types,
                var,
                body: catch_body,
                line: catch_line,
            });
        }
        let finally = if self.eat_ident_kw("finally") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::TryCatch {
            body,
            catches,
            finally,
            line,
        })
    }

    fn parse_global(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let mut names = vec![self.parse_variable_name()?];
        while self.peek_is(Token::Comma) {
            self.advance();
            names.push(self.parse_variable_name()?);
        }
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Global { names, line })
    }

    fn parse_static_var(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        self.advance();
        let mut items = Vec::new();
        loop {
            let name = self.parse_variable_name()?;
            let default = if self.peek_is(Token::Eq) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            items.push((name, default));
            if self.peek_is(Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::Semicolon)?;
        Ok(Stmt::StaticVar { items, line })
    }

    fn parse_include(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur_line();
        let kind = if self.eat_ident_kw("include_once") {
            IncludeKind::IncludeOnce
        } else if self.eat_ident_kw("require_once") {
            IncludeKind::RequireOnce
        } else if self.eat_ident_kw("require") {
            IncludeKind::Require
        } else {
            self.expect_ident_kw("include")?;
            IncludeKind::Include
        };
        let expr = self.parse_expr()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Include { kind, expr, line })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_instanceof_expr()?;
        if self.peek_is(Token::Eq) {
            let line = self.cur_line();
            self.advance();
            let by_ref = if self.peek_is(Token::Amp) {
                self.advance();
                true
            } else {
                false
            };
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                by_ref,
                line,
            });
        }
        Ok(target)
    }

    fn parse_instanceof_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_binary_expr()?;
        while self.eat_ident_kw("instanceof") {
            let line = expr.line();
            let class = self.parse_class_ref()?;
            expr = Expr::InstanceOf {
                expr: Box::new(expr),
                class,
                line,
            };
        }
        Ok(expr)
    }

    fn parse_binary_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.peek() {
                Token::Identical => Some(BinOp::Identical),
                Token::NotIdentical => Some(BinOp::NotIdentical),
                Token::EqEq | Token::NotEq | Token::Lt | Token::Gt | Token::Le | Token::Ge
                | Token::AmpAmp | Token::PipePipe => Some(BinOp::Other),
                _ => None,
            };
            let Some(op) = op else { break };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_additive_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let is_additive = matches!(
                self.peek(),
                Token::Plus | Token::Minus | Token::Dot | Token::Star | Token::Slash
            );
            if !is_additive {
                break;
            }
            let line = self.cur_line();
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op: BinOp::Other,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_is(Token::Bang) || self.peek_is(Token::Minus) {
            let line = self.cur_line();
            self.advance();
            let inner = self.parse_unary_expr()?;
            // Unary operators do not change the possible-type set the
            // validator cares about; fold to the operand itself.
            return Ok(Expr::Binary {
                op: BinOp::Other,
                left: Box::new(inner.clone()),
                right: Box::new(inner),
                line,
            });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek() {
                Token::Arrow | Token::NullsafeArrow => {
                    let line = self.cur_line();
                    self.advance();
                    let member = self.parse_member_name()?;
                    if self.peek_is(Token::LParen) {
                        let args = self.parse_args()?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: member,
                            args,
                            line,
                        };
                    } else {
                        expr = Expr::PropertyFetch {
                            object: Box::new(expr),
                            property: member,
                            line,
                        };
                    }
                }
                Token::DoubleColon => {
                    let line = self.cur_line();
                    self.advance();
                    let class_ref = expr_to_class_ref(expr)?;
                    if matches!(self.peek(), Token::Variable(_)) {
                        let property = self.parse_variable_name()?;
                        expr = Expr::StaticPropertyFetch {
                            class: class_ref,
                            property,
                            line,
                        };
                    } else if self.ident_is("class") {
                        self.advance();
                        expr = Expr::ClassConstFetch {
                            class: class_ref,
                            constant: "class".to_string(),
                            line,
                        };
                    } else {
                        let name = self.parse_identifier_name()?;
                        if self.peek_is(Token::LParen) {
                            let args = self.parse_args()?;
                            expr = Expr::StaticCall {
                                class: class_ref,
                                method: name,
                                args,
                                line,
                            };
                        } else {
                            expr = Expr::ClassConstFetch {
                                class: class_ref,
                                constant: name,
                                line,
                            };
                        }
                    }
                }
                Token::LParen => {
                    let line = self.cur_line();
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                Token::LBracket => {
                    let line = self.cur_line();
                    self.advance();
                    let index = if self.peek_is(Token::RBracket) {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index,
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_member_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Identifier(s) => Ok(s),
            Token::LBrace => {
                // `->{$expr}` dynamic member access: parse and discard, the
                // caller cannot statically resolve it.
                let _ = self.parse_expr()?;
                self.expect(Token::RBrace)?;
                Ok(String::new())
            }
            other => Err(ParseError {
                line: self.cur_line(),
                message: format!("expected a member name, found {other:?}"),
            }),
        }
    }

    fn parse_class_ref(&mut self) -> Result<ClassRef, ParseError> {
        let line = self.cur_line();
        if matches!(self.peek(), Token::Variable(_)) || self.peek_is(Token::LParen) {
            let e = self.parse_postfix_expr()?;
            return Ok(ClassRef::Dynamic(Box::new(e)));
        }
        let name = self.parse_qualified_name()?;
        Ok(ClassRef::Name(name, line))
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.peek_is(Token::RParen) {
            loop {
                let spread = if self.peek_is(Token::Ellipsis) {
                    self.advance();
                    true
                } else {
                    false
                };
                let name = if let Token::Identifier(n) = self.peek().clone() {
                    if *self.peek_at(1) == Token::Colon && !spread {
                        self.advance();
                        self.advance();
                        Some(n)
                    } else {
                        None
                    }
                } else {
                    None
                };
                let value = self.parse_expr()?;
                args.push(Arg { name, value, spread });
                if self.peek_is(Token::Comma) {
                    self.advance();
                    if self.peek_is(Token::RParen) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur_line();
        match self.peek().clone() {
            Token::Int(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(v), line))
            }
            Token::Float(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(v), line))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s), line))
            }
            Token::Variable(name) => {
                self.advance();
                Ok(Expr::Variable(name, line))
            }
            Token::LBracket => self.parse_array_literal(),
            Token::Ellipsis => {
                self.advance();
                let inner = self.parse_expr()?;
                Ok(Expr::Spread(Box::new(inner), line))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Identifier(name) => self.parse_identifier_led_expr(name, line),
            other => Err(ParseError {
                line,
                message: format!("unexpected token {other:?}"),
            }),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur_line();
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();
        while !self.peek_is(Token::RBracket) {
            let first = self.parse_expr()?;
            let (key, value) = if self.peek_is(Token::FatArrow) {
                self.advance();
                (Some(first), self.parse_expr()?)
            } else {
                (None, first)
            };
            items.push((key, value));
            if self.peek_is(Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::ArrayLit(items, line))
    }

    fn parse_identifier_led_expr(&mut self, name: String, line: u32) -> Result<Expr, ParseError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "true" => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true), line))
            }
            "false" => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false), line))
            }
            "null" => {
                self.advance();
                Ok(Expr::Literal(Literal::Null, line))
            }
            "new" => {
                self.advance();
                let class = self.parse_class_ref()?;
                let args = if self.peek_is(Token::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::New { class, args, line })
            }
            "array" if *self.peek_at(1) == Token::LParen => {
                self.advance();
                self.expect(Token::LParen)?;
                let mut items = Vec::new();
                while !self.peek_is(Token::RParen) {
                    let first = self.parse_expr()?;
                    let (key, value) = if self.peek_is(Token::FatArrow) {
                        self.advance();
                        (Some(first), self.parse_expr()?)
                    } else {
                        (None, first)
                    };
                    items.push((key, value));
                    if self.peek_is(Token::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
                self.expect(Token::RParen)?;
                Ok(Expr::ArrayLit(items, line))
            }
            "list" if *self.peek_at(1) == Token::LParen => {
                self.advance();
                self.expect(Token::LParen)?;
                let mut items = Vec::new();
                while !self.peek_is(Token::RParen) {
                    let value = self.parse_expr()?;
                    items.push((None, value));
                    if self.peek_is(Token::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
                self.expect(Token::RParen)?;
                Ok(Expr::ArrayLit(items, line))
            }
            "function" => self.parse_closure(),
            "fn" => self.parse_arrow_function(),
            "static" if matches!(self.peek_at(1), Token::Identifier(ref s) if s.eq_ignore_ascii_case("function")) =>
            {
                self.advance();
                self.parse_closure()
            }
            "static" if matches!(self.peek_at(1), Token::Identifier(ref s) if s.eq_ignore_ascii_case("fn")) =>
            {
                self.advance();
                self.parse_arrow_function()
            }
            _ => {
                self.advance();
                Ok(Expr::ConstFetch(name, line))
            }
        }
    }

    fn parse_closure_uses(&mut self) -> Result<Vec<ClosureUse>, ParseError> {
        if !self.eat_ident_kw("use") {
            return Ok(Vec::new());
        }
        self.expect(Token::LParen)?;
        let mut uses = Vec::new();
        while !self.peek_is(Token::RParen) {
            let by_reference = if self.peek_is(Token::Amp) {
                self.advance();
                true
            } else {
                false
            };
            let name = self.parse_variable_name()?;
            uses.push(ClosureUse { name, by_reference });
            if self.peek_is(Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::RParen)?;
        Ok(uses)
    }

    fn parse_closure(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur_line();
        self.advance();
        if self.peek_is(Token::Amp) {
            self.advance();
        }
        let params = self.parse_params()?;
        let uses = self.parse_closure_uses()?;
        let return_type = self.parse_optional_return_type()?;
        let body = self.parse_block()?;
        Ok(Expr::Closure {
            params,
            uses,
            body,
            return_type,
            line,
        })
    }

    fn parse_arrow_function(&mut self) -> Result<Expr, ParseError> {
        let line = self.cur_line();
        self.advance();
        if self.peek_is(Token::Amp) {
            self.advance();
        }
        let params = self.parse_params()?;
        let return_type = self.parse_optional_return_type()?;
        self.expect(Token::FatArrow)?;
        let body = self.parse_expr()?;
        Ok(Expr::ArrowFunction {
            params,
            body: Box::new(body),
            return_type,
            line,
        })
    }
}

fn expr_to_class_ref(expr: Expr) -> Result<ClassRef, ParseError> {
    match expr {
        Expr::ConstFetch(name, line) => Ok(ClassRef::Name(name, line)),
        other => Ok(ClassRef::Dynamic(Box::new(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_undefined_variable_print() {
        let module = parse_module("<?php print($x);").unwrap();
        assert_eq!(module.stmts.len(), 1);
        match &module.stmts[0] {
            Stmt::ExprStmt { expr: Expr::Call { args, .. }, .. } => {
                assert_eq!(args.len(), 1);
                assert!(matches!(args[0].value, Expr::Variable(ref n, _) if n == "x"));
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_return_type_mismatch_body() {
        let module = parse_module(r#"<?php function f(): int { return "a"; }"#).unwrap();
        match &module.stmts[0] {
            Stmt::FunctionDecl(f) => {
                assert_eq!(f.name, "f");
                assert!(matches!(f.return_type, Some(TypeNode::Named(ref n, false)) if n == "int"));
                assert_eq!(f.body.as_ref().unwrap().len(), 1);
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_interface_and_implementing_class() {
        let src = "<?php interface I { function m(int $x): void; } class C implements I { function m(string $x): void {} }";
        let module = parse_module(src).unwrap();
        assert_eq!(module.stmts.len(), 2);
        match &module.stmts[1] {
            Stmt::ClassDecl(c) => {
                assert_eq!(c.interfaces, vec!["I".to_string()]);
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_abstract_class_and_new() {
        let module = parse_module("<?php abstract class A {} new A();").unwrap();
        assert_eq!(module.stmts.len(), 2);
    }

    #[test]
    fn reports_parse_error_with_line() {
        let err = parse_module("<?php function f(").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
