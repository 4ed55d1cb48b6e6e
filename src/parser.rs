use crate::ast::{Expr, ExprFunction, ExprId, ExprVariable, Stmt, StmtFunction};
use crate::scanner::{Token, TokenLiteral, TokenType};
use crate::App;
use std::cell::Cell;
use std::rc::Rc;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    app: &'a App,
    expr_id_count: usize,
}

impl Parser<'_> {
    /// `first_expr_id` seeds the id counter so that ids stay unique across
    /// parsers sharing one interpreter (one parser per prompt line).
    pub fn new(app: &App, tokens: Vec<Token>, first_expr_id: usize) -> Parser {
        Parser {
            tokens,
            current: 0,
            app,
            expr_id_count: first_expr_id,
        }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.declaration());
        }

        statements
    }

    /// First id not handed out yet; the driver feeds it to the next parser.
    pub fn next_expr_id(&self) -> usize {
        self.expr_id_count
    }

    fn declaration(&mut self) -> Stmt {
        let declaration = if self.match_one_of([TokenType::Class]) {
            self.class_declaration()
        } else if self.check_token(TokenType::Fun) && self.check_next_token(TokenType::Identifier)
        {
            // A `fun` without a name stays in expression position.
            self.advance();
            self.function("function")
                .map(|function| Stmt::Function(Rc::new(function)))
        } else if self.match_one_of([TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match declaration {
            Some(declaration) => declaration,
            None => {
                self.synchronize();
                Stmt::Error {
                    message: String::from("Invalid statement."),
                }
            }
        }
    }

    fn class_declaration(&mut self) -> Option<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_one_of([TokenType::Less]) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable(
                self.gen_expr_id(),
                ExprVariable {
                    name: self.previous_token().clone(),
                },
            ))
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut static_methods = Vec::new();
        while !self.check_token(TokenType::RightBrace) && !self.is_at_end() {
            if self.match_one_of([TokenType::Class]) {
                static_methods.push(Rc::new(self.function("static method")?));
            } else {
                methods.push(Rc::new(self.function("method")?));
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Some(Stmt::Class {
            name,
            superclass,
            methods,
            static_methods,
            slot: Cell::new(None),
            super_slot: Cell::new(None),
        })
    }

    fn function(&mut self, kind: &str) -> Option<StmtFunction> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let params = self.parameters()?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;

        Some(StmtFunction::new(name, params, body))
    }

    fn parameters(&mut self) -> Option<Vec<Token>> {
        let mut params = Vec::new();

        if !self.check_token(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.app.error_token(
                        &self.peek_token().clone(),
                        "Can't have more than 255 parameters.",
                    );
                }

                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);

                if !self.match_one_of([TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        Some(params)
    }

    fn var_declaration(&mut self) -> Option<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;

        let mut initializer = None;
        if self.match_one_of([TokenType::Equal]) {
            initializer = Some(self.expression()?);
        }

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;

        Some(Stmt::Var {
            name,
            initializer,
            slot: Cell::new(None),
        })
    }

    fn statement(&mut self) -> Option<Stmt> {
        if self.match_one_of([TokenType::For]) {
            self.for_statement()
        } else if self.match_one_of([TokenType::If]) {
            self.if_statement()
        } else if self.match_one_of([TokenType::Print]) {
            self.print_statement()
        } else if self.match_one_of([TokenType::Return]) {
            self.return_statement()
        } else if self.match_one_of([TokenType::While]) {
            self.while_statement()
        } else if self.match_one_of([TokenType::Break]) {
            self.break_statement()
        } else if self.match_one_of([TokenType::LeftBrace]) {
            Some(Stmt::Block {
                statements: self.block()?,
            })
        } else {
            self.expression_statement()
        }
    }

    fn block(&mut self) -> Option<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check_token(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration());
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;

        Some(statements)
    }

    fn for_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_one_of([TokenType::Semicolon]) {
            None
        } else if self.match_one_of([TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check_token(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check_token(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression(increment)],
            };
        };

        body = Stmt::While {
            condition: condition.unwrap_or(Expr::Literal {
                value: TokenLiteral::Bool(true),
            }),
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
            };
        }

        Some(body)
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let mut else_branch = None;
        if self.match_one_of([TokenType::Else]) {
            else_branch = Some(Box::new(self.statement()?));
        }

        Some(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Option<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Some(Stmt::Print { expression })
    }

    fn return_statement(&mut self) -> Option<Stmt> {
        let keyword = self.previous_token().clone();
        let mut value = None;
        if !self.check_token(TokenType::Semicolon) {
            value = Some(self.expression()?);
        }

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;

        Some(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Some(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    fn break_statement(&mut self) -> Option<Stmt> {
        let keyword = self.previous_token().clone();
        self.consume(TokenType::Semicolon, "Expect ';' after 'break'.")?;
        Some(Stmt::Break { keyword })
    }

    fn expression_statement(&mut self) -> Option<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Some(Stmt::Expression(expression))
    }

    fn expression(&mut self) -> Option<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Option<Expr> {
        let expr = self.ternary()?;

        if self.match_one_of([TokenType::Equal]) {
            let equals = self.previous_token().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(_, ExprVariable { name }) => Some(Expr::Assign {
                    name,
                    value: Box::new(value),
                    id: self.gen_expr_id(),
                }),
                Expr::Get { object, name } => Some(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                expr => {
                    // Report, but hand back the parsed target so parsing
                    // continues from a sensible place.
                    self.app.error_token(&equals, "Invalid assignment target.");
                    Some(expr)
                }
            };
        }

        Some(expr)
    }

    fn ternary(&mut self) -> Option<Expr> {
        let mut expr = self.or()?;

        while self.match_one_of([TokenType::QuestionMark]) {
            let operator = self.previous_token().clone();
            let then_branch = self.ternary()?;
            self.consume(TokenType::Colon, "Expect ':' in ternary expression.")?;
            let else_branch = self.ternary()?;
            expr = Expr::Ternary {
                operator,
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            };
        }

        Some(expr)
    }

    fn or(&mut self) -> Option<Expr> {
        let mut expr = self.and()?;

        while self.match_one_of([TokenType::Or]) {
            let operator = self.previous_token().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Some(expr)
    }

    fn and(&mut self) -> Option<Expr> {
        let mut expr = self.equality()?;

        while self.match_one_of([TokenType::And]) {
            let operator = self.previous_token().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Some(expr)
    }

    fn equality(&mut self) -> Option<Expr> {
        let mut expr = self.comparison()?;

        while self.match_one_of([TokenType::EqualEqual, TokenType::BangEqual]) {
            let operator = self.previous_token().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            }
        }

        Some(expr)
    }

    fn comparison(&mut self) -> Option<Expr> {
        let mut expr = self.term()?;

        while self.match_one_of([
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous_token().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            }
        }

        Some(expr)
    }

    fn term(&mut self) -> Option<Expr> {
        let mut expr = self.factor()?;

        while self.match_one_of([TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous_token().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            }
        }

        Some(expr)
    }

    fn factor(&mut self) -> Option<Expr> {
        let mut expr = self.unary()?;

        while self.match_one_of([TokenType::Slash, TokenType::Star]) {
            let operator = self.previous_token().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            }
        }

        Some(expr)
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.match_one_of([TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous_token().clone();
            let right = self.unary()?;
            Some(Expr::Unary {
                operator,
                right: Box::new(right),
            })
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> Option<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_one_of([TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_one_of([TokenType::Dot]) {
                let name =
                    self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                }
            } else {
                break;
            }
        }

        Some(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Option<Expr> {
        let mut arguments = Vec::new();

        if !self.check_token(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.app.error_token(
                        &self.peek_token().clone(),
                        "Can't have more than 255 arguments.",
                    );
                }
                arguments.push(self.expression()?);
                if !self.match_one_of([TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Some(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Option<Expr> {
        if self.match_one_of([TokenType::False]) {
            Some(Expr::Literal {
                value: TokenLiteral::Bool(false),
            })
        } else if self.match_one_of([TokenType::True]) {
            Some(Expr::Literal {
                value: TokenLiteral::Bool(true),
            })
        } else if self.match_one_of([TokenType::Nil]) {
            Some(Expr::Literal {
                value: TokenLiteral::Nil,
            })
        } else if self.match_one_of([TokenType::Number, TokenType::String]) {
            Some(Expr::Literal {
                value: self.previous_token().literal.clone(),
            })
        } else if self.match_one_of([TokenType::Identifier]) {
            Some(Expr::Variable(
                self.gen_expr_id(),
                ExprVariable {
                    name: self.previous_token().clone(),
                },
            ))
        } else if self.match_one_of([TokenType::Fun]) {
            self.anonymous_function()
        } else if self.match_one_of([TokenType::Super]) {
            let keyword = self.previous_token().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            Some(Expr::Super {
                keyword,
                method,
                id: self.gen_expr_id(),
            })
        } else if self.match_one_of([TokenType::This]) {
            Some(Expr::This {
                keyword: self.previous_token().clone(),
                id: self.gen_expr_id(),
            })
        } else if self.match_one_of([TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            Some(Expr::Grouping {
                expression: Box::new(expr),
            })
        } else {
            self.app
                .error_token(&self.peek_token().clone(), "Expect expression.");
            None
        }
    }

    fn anonymous_function(&mut self) -> Option<Expr> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'fun'.")?;
        let params = self.parameters()?;

        self.consume(TokenType::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block()?;

        Some(Expr::Function(Rc::new(ExprFunction::new(params, body))))
    }

    fn gen_expr_id(&mut self) -> ExprId {
        let id = ExprId(self.expr_id_count);
        self.expr_id_count += 1;
        id
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Option<Token> {
        if self.check_token(token_type) {
            Some(self.advance().clone())
        } else {
            self.app.error_token(&self.peek_token().clone(), message);
            None
        }
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous_token().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek_token().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn match_one_of<const N: usize>(&mut self, token_types: [TokenType; N]) -> bool {
        for token_type in token_types {
            if self.check_token(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check_token(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            self.peek_token().token_type == token_type
        }
    }

    fn check_next_token(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == token_type,
            None => false,
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous_token()
    }

    fn is_at_end(&self) -> bool {
        self.peek_token().token_type == TokenType::Eof
    }

    fn peek_token(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous_token(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (App, Vec<Stmt>) {
        let app = App::new();
        let mut scanner = Scanner::new(&app, source.as_bytes());
        let tokens = scanner.scan_tokens();
        let mut parser = Parser::new(&app, tokens, 0);
        let statements = parser.parse();
        (app, statements)
    }

    #[test]
    fn for_loop_desugars_to_while_in_a_block() {
        let (app, statements) = parse("for (var i = 0; i < 3; i = i + 1) print i;");

        assert!(!app.had_error());
        assert_eq!(statements.len(), 1);

        let inner = match &statements[0] {
            Stmt::Block { statements } => statements,
            _ => panic!("expected the initializer block"),
        };
        assert!(matches!(inner[0], Stmt::Var { .. }));

        let body = match &inner[1] {
            Stmt::While { condition, body } => {
                assert!(matches!(condition, Expr::Binary { .. }));
                body
            }
            _ => panic!("expected the desugared while loop"),
        };
        match body.as_ref() {
            Stmt::Block { statements } => {
                assert!(matches!(statements[0], Stmt::Print { .. }));
                assert!(matches!(statements[1], Stmt::Expression(Expr::Assign { .. })));
            }
            _ => panic!("expected the increment block"),
        }
    }

    #[test]
    fn for_loop_without_condition_defaults_to_true() {
        let (app, statements) = parse("for (;;) break;");

        assert!(!app.had_error());
        match &statements[0] {
            Stmt::While { condition, .. } => {
                assert!(matches!(
                    condition,
                    Expr::Literal {
                        value: TokenLiteral::Bool(true)
                    }
                ));
            }
            _ => panic!("expected a bare while loop"),
        }
    }

    #[test]
    fn class_body_separates_static_methods() {
        let (app, statements) = parse(
            "class Math {\
               class square(n) { return n * n; }\
               identity(n) { return n; }\
             }",
        );

        assert!(!app.had_error());
        match &statements[0] {
            Stmt::Class {
                methods,
                static_methods,
                superclass,
                ..
            } => {
                assert!(superclass.is_none());
                assert_eq!(methods.len(), 1);
                assert_eq!(static_methods.len(), 1);
            }
            _ => panic!("expected a class declaration"),
        }
    }

    #[test]
    fn class_declaration_with_superclass() {
        let (app, statements) = parse("class B < A {}");

        assert!(!app.had_error());
        match &statements[0] {
            Stmt::Class { superclass, .. } => {
                assert!(matches!(superclass, Some(Expr::Variable(..))));
            }
            _ => panic!("expected a class declaration"),
        }
    }

    #[test]
    fn named_fun_is_a_declaration_anonymous_fun_an_expression() {
        let (app, statements) = parse("fun f() {} var g = fun (x) { return x; };");

        assert!(!app.had_error());
        assert!(matches!(statements[0], Stmt::Function(_)));
        match &statements[1] {
            Stmt::Var { initializer, .. } => {
                assert!(matches!(initializer, Some(Expr::Function(_))));
            }
            _ => panic!("expected a var declaration"),
        }
    }

    #[test]
    fn ternary_nests_in_the_alternative() {
        let (app, statements) = parse("a ? 1 : b ? 2 : 3;");

        assert!(!app.had_error());
        match &statements[0] {
            Stmt::Expression(Expr::Ternary { else_branch, .. }) => {
                assert!(matches!(else_branch.as_ref(), Expr::Ternary { .. }));
            }
            _ => panic!("expected a ternary expression"),
        }
    }

    #[test]
    fn break_parses_as_a_statement() {
        let (app, statements) = parse("while (true) break;");

        assert!(!app.had_error());
        match &statements[0] {
            Stmt::While { body, .. } => assert!(matches!(body.as_ref(), Stmt::Break { .. })),
            _ => panic!("expected a while loop"),
        }
    }

    #[test]
    fn invalid_assignment_target_reports_but_keeps_parsing() {
        let (app, statements) = parse("1 = 2; print 3;");

        assert!(app.had_error());
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0], Stmt::Expression(_)));
        assert!(matches!(statements[1], Stmt::Print { .. }));
    }

    #[test]
    fn parse_error_becomes_an_error_statement_and_recovery_continues() {
        let (app, statements) = parse("var = 1; print 2;");

        assert!(app.had_error());
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0], Stmt::Error { .. }));
        assert!(matches!(statements[1], Stmt::Print { .. }));
    }

    #[test]
    fn trailing_comma_in_argument_list_is_an_error() {
        let (app, _) = parse("f(1, 2,);");

        assert!(app.had_error());
    }

    #[test]
    fn more_than_255_arguments_is_an_error() {
        let arguments = vec!["0"; 256].join(", ");
        let (app, _) = parse(&format!("f({});", arguments));

        assert!(app.had_error());
    }
}
