use crate::ast::{Expr, ExprFunction, ExprId, ExprVariable, Stmt, StmtFunction};
use crate::error::RuntimeError;
use crate::interner::{Interner, Symbol};
use crate::scanner::{Token, TokenLiteral, TokenType};
use crate::App;
use log::trace;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time;
use vec_map::VecMap;

/// Tree-walking evaluator.
///
/// Locals live in one flat, ever-growing slot array; the resolver hands
/// every local declaration a slot index and annotates every name-referencing
/// expression through the `locals` side table. Names that resolve to no
/// scope fall back to the global environment by spelling.
pub struct Interpreter {
    global_environment: Rc<Environment>,
    environment: Rc<Environment>,
    locals: VecMap<usize>,
    super_this: VecMap<usize>,
    slots: Vec<Value>,
    loop_depth: usize,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(interner: &Interner) -> Interpreter {
        Interpreter::with_output(interner, Box::new(io::stdout()))
    }

    pub fn with_output(interner: &Interner, out: Box<dyn Write>) -> Interpreter {
        let global_environment = Rc::new(Environment::new(None));

        global_environment.define(
            interner.get_or_intern("clock"),
            Value::Callable(Rc::new(Function::Native(0, |_, _| {
                match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
                    Ok(elapsed) => Ok(Value::Number(elapsed.as_millis() as f64)),
                    Err(_) => panic!("System clock before UNIX_EPOCH."),
                }
            }))),
        );

        let environment = Rc::clone(&global_environment);

        Interpreter {
            global_environment,
            environment,
            locals: VecMap::default(),
            super_this: VecMap::default(),
            slots: Vec::new(),
            loop_depth: 0,
            out,
        }
    }

    pub fn interpret(&mut self, app: &App, statements: &[Stmt]) {
        self.run_statements(app, statements, false);
    }

    /// Prompt variant: the value of a bare expression statement is printed.
    pub fn interpret_repl(&mut self, app: &App, statements: &[Stmt]) {
        self.run_statements(app, statements, true);
    }

    fn run_statements(&mut self, app: &App, statements: &[Stmt], print_expression_values: bool) {
        for statement in statements {
            let result = match statement {
                Stmt::Expression(expression) if print_expression_values => {
                    self.evaluate(&app.interner, expression).map(|value| {
                        let text = stringify(&app.interner, &value);
                        writeln!(self.out, "{}", text).expect("Could not write to output");
                    })
                }
                statement => self.execute(&app.interner, statement),
            };

            match result {
                Ok(()) => {}
                Err(Unwind::Error(error)) => {
                    app.runtime_error(&error);
                    break;
                }
                Err(Unwind::Return(_)) => panic!("Unexpected top level return."),
                Err(Unwind::Break) => panic!("Unexpected top level break."),
            }
        }
    }

    fn execute(&mut self, interner: &Interner, statement: &Stmt) -> Result<(), Unwind> {
        match statement {
            Stmt::Expression(expression) => {
                self.evaluate(interner, expression)?;
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(interner, expression)?;
                let text = stringify(interner, &value);
                writeln!(self.out, "{}", text).expect("Could not write to output");
            }
            Stmt::Var {
                name,
                initializer,
                slot,
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(interner, expr)?,
                    None => Value::Nil,
                };

                if let Some(slot) = slot.get() {
                    self.slots[slot] = value.clone();
                }
                // Defined by name as well, so unresolved lookups that walk
                // the environment chain still find it.
                self.environment.define(name.lexeme, value);
            }
            Stmt::Block { statements } => {
                let environment = Environment::new(Some(Rc::clone(&self.environment)));
                self.execute_block(interner, statements, environment)?;
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(interner, condition)?) {
                    self.execute(interner, then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(interner, else_branch)?;
                }
            }
            Stmt::While { condition, body } => {
                self.loop_depth += 1;
                let result = self.run_loop(interner, condition, body);
                self.loop_depth -= 1;
                result?;
            }
            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    return Err(runtime_error(
                        keyword,
                        "Cannot use 'break' outside of a loop.",
                    ));
                }
                return Err(Unwind::Break);
            }
            Stmt::Function(function_stmt) => {
                let function = Value::Callable(Rc::new(Function::Declared(
                    Rc::clone(function_stmt),
                    Rc::clone(&self.environment),
                )));

                match function_stmt.slot.get() {
                    Some(slot) => self.slots[slot] = function,
                    None => self
                        .global_environment
                        .define(function_stmt.name.lexeme, function),
                }
            }
            Stmt::Return { value, .. } => {
                let return_value = match value {
                    Some(value_expr) => self.evaluate(interner, value_expr)?,
                    None => Value::Nil,
                };

                return Err(Unwind::Return(return_value));
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
                slot,
                super_slot,
            } => {
                let superclass_value = match superclass {
                    Some(superclass_expr) => {
                        let value = self.evaluate(interner, superclass_expr)?;
                        match value.to_class() {
                            Some(class) => Some((value, class)),
                            None => {
                                let token = match superclass_expr {
                                    Expr::Variable(_, variable) => &variable.name,
                                    _ => name,
                                };
                                return Err(runtime_error(token, "Superclass must be a class."));
                            }
                        }
                    }
                    None => None,
                };

                // The superclass lives in the slot the resolver opened for
                // the class body's `super` scope.
                if let (Some(slot), Some((value, _))) = (super_slot.get(), &superclass_value) {
                    self.slots[slot] = value.clone();
                }

                let mut class_methods = FxHashMap::default();
                for method in methods {
                    let is_initializer = method.name.lexeme == interner.sym_init;
                    class_methods.insert(
                        method.name.lexeme,
                        Rc::new(Function::Method(Rc::clone(method), is_initializer)),
                    );
                }

                let mut class_static_methods = FxHashMap::default();
                for method in static_methods {
                    class_static_methods.insert(
                        method.name.lexeme,
                        Rc::new(Function::Method(Rc::clone(method), false)),
                    );
                }

                let class = Value::Callable(Rc::new(Function::Class(Rc::new(Class {
                    name: name.lexeme,
                    methods: class_methods,
                    static_methods: class_static_methods,
                    superclass: superclass_value.map(|(_, class)| class),
                    static_fields: RefCell::new(FxHashMap::default()),
                }))));

                match slot.get() {
                    Some(slot) => self.slots[slot] = class,
                    None => self.global_environment.define(name.lexeme, class),
                }
            }
            Stmt::Error { .. } => {}
        }
        Ok(())
    }

    fn run_loop(
        &mut self,
        interner: &Interner,
        condition: &Expr,
        body: &Stmt,
    ) -> Result<(), Unwind> {
        while is_truthy(&self.evaluate(interner, condition)?) {
            match self.execute(interner, body) {
                Ok(()) => {}
                Err(Unwind::Break) => break,
                Err(unwind) => return Err(unwind),
            }
        }

        Ok(())
    }

    fn execute_block(
        &mut self,
        interner: &Interner,
        statements: &[Stmt],
        environment: Environment,
    ) -> Result<(), Unwind> {
        let previous = std::mem::replace(&mut self.environment, Rc::new(environment));

        let mut ret = Ok(());
        for statement in statements {
            ret = self.execute(interner, statement);
            if ret.is_err() {
                break;
            }
        }

        self.environment = previous;

        ret
    }

    /// Shared tail of every call: bind arguments into their resolver-assigned
    /// slots, run the body in a frame enclosed by `closure`, and promote a
    /// `Return` unwind into the call result.
    fn call_function(
        &mut self,
        interner: &Interner,
        body: &[Stmt],
        param_slots: &[usize],
        closure: Rc<Environment>,
        arguments: &[Value],
    ) -> Result<Value, Unwind> {
        let environment = Environment::new(Some(closure));

        for (slot, argument) in param_slots.iter().zip(arguments) {
            self.slots[*slot] = argument.clone();
        }

        // `break` must not cross the call boundary.
        let enclosing_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let result = self.execute_block(interner, body, environment);
        self.loop_depth = enclosing_loop_depth;

        match result {
            Ok(()) => Ok(Value::Nil),
            Err(Unwind::Return(value)) => Ok(value),
            Err(unwind) => Err(unwind),
        }
    }

    fn evaluate(&mut self, interner: &Interner, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(interner, left)?;
                let right = self.evaluate(interner, right)?;

                match operator.token_type {
                    TokenType::Minus => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Number(left_num - right_num))
                    }
                    TokenType::Slash => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Number(left_num / right_num))
                    }
                    TokenType::Star => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Number(left_num * right_num))
                    }
                    TokenType::Plus => {
                        let left_is_text =
                            matches!(left, Value::String(_) | Value::InternedString(_));
                        let right_is_text =
                            matches!(right, Value::String(_) | Value::InternedString(_));
                        let left_coerces =
                            left_is_text || matches!(left, Value::Number(_) | Value::Bool(_));
                        let right_coerces =
                            right_is_text || matches!(right, Value::Number(_) | Value::Bool(_));

                        match (&left, &right) {
                            (Value::Number(left_num), Value::Number(right_num)) => {
                                Ok(Value::Number(left_num + right_num))
                            }
                            _ if (left_is_text && right_coerces)
                                || (right_is_text && left_coerces) =>
                            {
                                let text =
                                    stringify(interner, &left) + &stringify(interner, &right);
                                Ok(Value::String(Rc::new(text)))
                            }
                            _ => Err(runtime_error(
                                operator,
                                "Inconsistent types for + operation.",
                            )),
                        }
                    }
                    TokenType::Greater => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Bool(left_num > right_num))
                    }
                    TokenType::GreaterEqual => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Bool(left_num >= right_num))
                    }
                    TokenType::Less => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Bool(left_num < right_num))
                    }
                    TokenType::LessEqual => {
                        let (left_num, right_num) =
                            check_number_operands(operator, &left, &right)?;
                        Ok(Value::Bool(left_num <= right_num))
                    }
                    TokenType::BangEqual => Ok(Value::Bool(!is_equal(&left, &right, interner))),
                    TokenType::EqualEqual => Ok(Value::Bool(is_equal(&left, &right, interner))),
                    _ => panic!("Unexpected binary operator token."),
                }
            }
            Expr::Grouping { expression } => self.evaluate(interner, expression),
            Expr::Literal { value } => match value {
                TokenLiteral::String(symbol) => Ok(Value::InternedString(*symbol)),
                TokenLiteral::Number(number) => Ok(Value::Number(*number)),
                TokenLiteral::Bool(value) => Ok(Value::Bool(*value)),
                TokenLiteral::Nil => Ok(Value::Nil),
            },
            Expr::Unary { operator, right } => {
                let right = self.evaluate(interner, right)?;

                match operator.token_type {
                    TokenType::Bang => Ok(Value::Bool(!is_truthy(&right))),
                    TokenType::Minus => {
                        let num = check_number_operand(operator, &right)?;
                        Ok(Value::Number(-num))
                    }
                    _ => panic!("Unexpected unary operator token."),
                }
            }
            Expr::Ternary {
                operator,
                condition,
                then_branch,
                else_branch,
            } => match self.evaluate(interner, condition)? {
                Value::Bool(true) => self.evaluate(interner, then_branch),
                Value::Bool(false) => self.evaluate(interner, else_branch),
                _ => Err(runtime_error(
                    operator,
                    "Ternary condition must be a boolean.",
                )),
            },
            Expr::Variable(id, ExprVariable { name }) => {
                self.look_up_variable(interner, name, *id)
            }
            Expr::Assign { name, value, id } => {
                let value = self.evaluate(interner, value)?;
                match self.locals.get(id.0).copied() {
                    Some(slot) => self.slots[slot] = value.clone(),
                    None => {
                        self.global_environment
                            .assign(interner, name, value.clone())?
                    }
                }
                Ok(value)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(interner, left)?;

                if operator.token_type == TokenType::Or {
                    if is_truthy(&left) {
                        return Ok(left);
                    }
                } else if !is_truthy(&left) {
                    return Ok(left);
                }

                self.evaluate(interner, right)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(interner, callee)?;

                let mut argument_values = Vec::new();
                for argument in arguments {
                    argument_values.push(self.evaluate(interner, argument)?);
                }

                if let Value::Callable(function) = callee {
                    if argument_values.len() != function.arity(interner) {
                        let message = format!(
                            "Expected {} arguments but got {}.",
                            function.arity(interner),
                            argument_values.len()
                        );
                        return Err(runtime_error(paren, message));
                    }
                    function.call(self, interner, &argument_values)
                } else {
                    Err(runtime_error(
                        paren,
                        "Can only call functions and classes.",
                    ))
                }
            }
            Expr::Get { object, name } => {
                let object = self.evaluate(interner, object)?;
                match object {
                    Value::Instance(instance) => {
                        let field = instance.fields.borrow().get(&name.lexeme).cloned();
                        if let Some(value) = field {
                            return Ok(value);
                        }

                        match instance.class.find_method(name.lexeme) {
                            Some(method) => {
                                method.bind(self, &instance);
                                Ok(Value::Callable(method))
                            }
                            None => Err(undefined_property(interner, name)),
                        }
                    }
                    Value::Callable(callable) => {
                        if let Function::Class(class) = &*callable {
                            class.get(interner, name)
                        } else {
                            Err(runtime_error(name, "Only instances have properties."))
                        }
                    }
                    _ => Err(runtime_error(name, "Only instances have properties.")),
                }
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(interner, object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(interner, value)?;
                        instance
                            .fields
                            .borrow_mut()
                            .insert(name.lexeme, value.clone());
                        Ok(value)
                    }
                    object => {
                        if let Some(class) = object.to_class() {
                            let value = self.evaluate(interner, value)?;
                            class
                                .static_fields
                                .borrow_mut()
                                .insert(name.lexeme, value.clone());
                            Ok(value)
                        } else {
                            Err(runtime_error(name, "Only instances have fields."))
                        }
                    }
                }
            }
            Expr::This { keyword, id } => self.look_up_variable(interner, keyword, *id),
            Expr::Super { keyword, method, id } => {
                let slot = self
                    .locals
                    .get(id.0)
                    .copied()
                    .expect("Unresolved 'super' expression.");
                let superclass = self.slots[slot]
                    .to_class()
                    .expect("'super' slot does not hold a class.");
                let this_slot = self
                    .super_this
                    .get(id.0)
                    .copied()
                    .expect("'super' expression without a 'this' slot.");

                let instance = match self.slots[this_slot].clone() {
                    Value::Instance(instance) => instance,
                    _ => {
                        return Err(runtime_error(
                            keyword,
                            "Can only use 'super' in an instance method.",
                        ))
                    }
                };

                match superclass.find_method(method.lexeme) {
                    Some(found) => {
                        found.bind(self, &instance);
                        Ok(Value::Callable(found))
                    }
                    None => Err(undefined_property(interner, method)),
                }
            }
            Expr::Function(declaration) => Ok(Value::Callable(Rc::new(Function::Anonymous(
                Rc::clone(declaration),
                Rc::clone(&self.environment),
            )))),
        }
    }

    fn look_up_variable(
        &mut self,
        interner: &Interner,
        name: &Token,
        id: ExprId,
    ) -> Result<Value, Unwind> {
        match self.locals.get(id.0).copied() {
            Some(slot) => Ok(self.slots[slot].clone()),
            None => self.global_environment.get(interner, name),
        }
    }

    fn resolve(&mut self, id: ExprId, depth: usize, slot: usize) {
        trace!("expr {:?} bound at depth {}, slot {}", id, depth, slot);
        self.locals.insert(id.0, slot);
    }

    fn resolve_super(&mut self, id: ExprId, this_slot: usize) {
        self.super_this.insert(id.0, this_slot);
    }

    fn grow_slots(&mut self) {
        self.slots.push(Value::Nil);
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Static binding pre-pass. Walks the statement list once, assigns every
/// local declaration a slot in the interpreter's slot array and reports
/// every binding-related error it can find before evaluation starts.
pub struct Resolver<'a> {
    app: &'a App,
    interpreter: &'a mut Interpreter,
    scopes: Vec<FxHashMap<Symbol, LocalVariable>>,
    current_function: FunctionType,
    current_class: ClassType,
    local_index: usize,
    this_slot: Option<usize>,
}

struct LocalVariable {
    slot: usize,
    defined: bool,
}

impl Resolver<'_> {
    pub fn new<'a>(app: &'a App, interpreter: &'a mut Interpreter) -> Resolver<'a> {
        // Seeded from the interpreter so slots handed out by earlier runs
        // (previous prompt lines) are never reused.
        let local_index = interpreter.slot_count();

        Resolver {
            app,
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            local_index,
            this_slot: None,
        }
    }

    pub fn resolve(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt)
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve(statements);
                self.end_scope();
            }
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Function(function) => {
                self.declare(&function.name);
                function.slot.set(self.define(&function.name));

                self.resolve_function(function, FunctionType::Function);
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
                slot,
                super_slot,
            } => {
                let enclosing_class =
                    std::mem::replace(&mut self.current_class, ClassType::Class);

                self.declare(name);
                slot.set(self.define(name));

                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable(_, variable) = superclass_expr {
                        if variable.name.lexeme == name.lexeme {
                            self.app
                                .error_token(&variable.name, "A class can't inherit from itself.");
                        }
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    self.begin_scope();
                    let sym_super = self.app.interner.sym_super;
                    super_slot.set(Some(self.bind_keyword(sym_super)));
                }

                let enclosing_this = self.this_slot;
                self.begin_scope();
                let sym_this = self.app.interner.sym_this;
                self.this_slot = Some(self.bind_keyword(sym_this));

                for method in methods {
                    let declaration = if method.name.lexeme == self.app.interner.sym_init {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, declaration);
                }
                for method in static_methods {
                    self.resolve_function(method, FunctionType::StaticMethod);
                }

                self.end_scope();
                self.this_slot = enclosing_this;

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(stmt) = else_branch.as_ref() {
                    self.resolve_stmt(stmt)
                }
            }
            Stmt::Print { expression } => self.resolve_expr(expression),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.app
                        .error_token(keyword, "Can't return from top-level code.")
                }

                if let Some(expr) = value.as_ref() {
                    if self.current_function == FunctionType::Initializer {
                        self.app
                            .error_token(keyword, "Can't return a value from an initializer.")
                    }

                    self.resolve_expr(expr)
                }
            }
            Stmt::Var {
                name,
                initializer,
                slot,
            } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                slot.set(self.define(name));
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Break { .. } => {}
            Stmt::Error { .. } => {}
        }
    }

    fn resolve_function(&mut self, stmt_function: &Rc<StmtFunction>, function_type: FunctionType) {
        let enclosing_function = std::mem::replace(&mut self.current_function, function_type);

        if matches!(
            function_type,
            FunctionType::Method | FunctionType::Initializer
        ) {
            stmt_function.this_slot.set(self.this_slot);
        }

        self.begin_scope();
        let mut param_slots = Vec::with_capacity(stmt_function.params.len());
        for param in &stmt_function.params {
            self.declare(param);
            if let Some(slot) = self.define(param) {
                param_slots.push(slot);
            }
        }
        *stmt_function.param_slots.borrow_mut() = param_slots;

        self.resolve(&stmt_function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_anonymous_function(&mut self, function: &Rc<ExprFunction>) {
        let enclosing_function =
            std::mem::replace(&mut self.current_function, FunctionType::AnonymousFunction);

        self.begin_scope();
        let mut param_slots = Vec::with_capacity(function.params.len());
        for param in &function.params {
            self.declare(param);
            if let Some(slot) = self.define(param) {
                param_slots.push(slot);
            }
        }
        *function.param_slots.borrow_mut() = param_slots;

        self.resolve(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Assign { name, value, id } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Function(function) => self.resolve_anonymous_function(function),
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Literal { .. } => {}
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Variable(id, ExprVariable { name }) => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(variable) = scope.get(&name.lexeme) {
                        if !variable.defined {
                            self.app.error_token(
                                name,
                                "Can't read local variable in its own initializer.",
                            );
                        }
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    self.app
                        .error_token(keyword, "Can't use 'this' outside of a class.");
                } else if self.current_function == FunctionType::StaticMethod {
                    self.app
                        .error_token(keyword, "Can't use 'this' in a static method.");
                } else {
                    self.resolve_local(*id, keyword);
                }
            }
            Expr::Super { keyword, id, .. } => {
                if self.current_class == ClassType::None {
                    self.app
                        .error_token(keyword, "Can't use 'super' outside of a class.");
                } else if self.current_class != ClassType::Subclass {
                    self.app
                        .error_token(keyword, "Can't use 'super' in a class with no superclass.");
                }

                self.resolve_local(*id, keyword);
                if let Some(this_slot) = self.this_slot {
                    self.interpreter.resolve_super(*id, this_slot);
                }
            }
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for i in (0..self.scopes.len()).rev() {
            let hit = self.scopes[i]
                .get(&name.lexeme)
                .map(|variable| variable.slot);
            if let Some(slot) = hit {
                self.interpreter.resolve(id, self.scopes.len() - 1 - i, slot);
                return;
            }
        }
        // Not found in any scope: the reference is global.
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.app
                    .error_token(name, "Already a variable with this name in this scope.")
            }

            let slot = self.local_index;
            self.local_index += 1;
            scope.insert(
                name.lexeme,
                LocalVariable {
                    slot,
                    defined: false,
                },
            );
        }
    }

    /// Marks the top-scope entry defined and grows the interpreter's slot
    /// array. Returns the entry's slot, or `None` outside any scope.
    fn define(&mut self, name: &Token) -> Option<usize> {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(variable) = scope.get_mut(&name.lexeme) {
                variable.defined = true;
                let slot = variable.slot;
                self.interpreter.grow_slots();
                return Some(slot);
            }
        }

        None
    }

    /// Binds `this` or `super` in a freshly opened scope.
    fn bind_keyword(&mut self, symbol: Symbol) -> usize {
        let slot = self.local_index;
        self.local_index += 1;
        self.scopes
            .last_mut()
            .expect("Keyword bound outside any scope.")
            .insert(
                symbol,
                LocalVariable {
                    slot,
                    defined: true,
                },
            );
        self.interpreter.grow_slots();

        slot
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum FunctionType {
    None,
    Function,
    AnonymousFunction,
    Method,
    Initializer,
    StaticMethod,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Clone)]
enum Value {
    String(Rc<String>),
    InternedString(Symbol),
    Number(f64),
    Bool(bool),
    Callable(Rc<Function>),
    Instance(Rc<Instance>),
    Nil,
}

impl Value {
    fn to_class(&self) -> Option<Rc<Class>> {
        match self {
            Value::Callable(function) => {
                if let Function::Class(class) = &**function {
                    Some(Rc::clone(class))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

enum Function {
    Native(
        usize,
        fn(&mut Interpreter, &[Value]) -> Result<Value, Unwind>,
    ),
    /// A named function; captures the environment it was declared in.
    Declared(Rc<StmtFunction>, Rc<Environment>),
    /// An instance or static method. Methods resolve their free names
    /// against the interpreter's globals at call time, so no environment
    /// back-edge is stored and class graphs stay cycle-free.
    Method(Rc<StmtFunction>, bool),
    Anonymous(Rc<ExprFunction>, Rc<Environment>),
    Class(Rc<Class>),
}

impl Function {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        interner: &Interner,
        arguments: &[Value],
    ) -> Result<Value, Unwind> {
        match self {
            Function::Native(_, function) => function(interpreter, arguments),
            Function::Declared(stmt_function, closure) => {
                let param_slots = stmt_function.param_slots.borrow();
                interpreter.call_function(
                    interner,
                    &stmt_function.body,
                    &param_slots,
                    Rc::clone(closure),
                    arguments,
                )
            }
            Function::Method(stmt_function, is_initializer) => {
                let globals = Rc::clone(&interpreter.global_environment);
                let param_slots = stmt_function.param_slots.borrow();
                let value = interpreter.call_function(
                    interner,
                    &stmt_function.body,
                    &param_slots,
                    globals,
                    arguments,
                )?;

                if *is_initializer {
                    let this_slot = stmt_function
                        .this_slot
                        .get()
                        .expect("Initializer without a 'this' slot.");
                    Ok(interpreter.slots[this_slot].clone())
                } else {
                    Ok(value)
                }
            }
            Function::Anonymous(expr_function, closure) => {
                let param_slots = expr_function.param_slots.borrow();
                interpreter.call_function(
                    interner,
                    &expr_function.body,
                    &param_slots,
                    Rc::clone(closure),
                    arguments,
                )
            }
            Function::Class(class) => {
                let instance = Rc::new(Instance::new(Rc::clone(class)));

                if let Some(initializer) = class.find_method(interner.sym_init) {
                    initializer.bind(interpreter, &instance);
                    initializer.call(interpreter, interner, arguments)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    /// Binding a method writes the receiver into the `this` slot the
    /// resolver assigned to the method's class body.
    fn bind(&self, interpreter: &mut Interpreter, instance: &Rc<Instance>) {
        if let Function::Method(stmt_function, _) = self {
            if let Some(slot) = stmt_function.this_slot.get() {
                interpreter.slots[slot] = Value::Instance(Rc::clone(instance));
            }
        }
    }

    fn arity(&self, interner: &Interner) -> usize {
        match self {
            Function::Native(arity, _) => *arity,
            Function::Declared(stmt_function, _) => stmt_function.params.len(),
            Function::Method(stmt_function, _) => stmt_function.params.len(),
            Function::Anonymous(expr_function, _) => expr_function.params.len(),
            Function::Class(class) => class
                .find_method(interner.sym_init)
                .map_or(0, |initializer| initializer.arity(interner)),
        }
    }
}

struct Class {
    name: Symbol,
    methods: FxHashMap<Symbol, Rc<Function>>,
    static_methods: FxHashMap<Symbol, Rc<Function>>,
    superclass: Option<Rc<Class>>,
    static_fields: RefCell<FxHashMap<Symbol, Value>>,
}

impl Class {
    fn find_method(&self, name: Symbol) -> Option<Rc<Function>> {
        self.methods.get(&name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    // Static members: fields first, then static methods. The superclass
    // chain is not consulted for statics.
    fn get(&self, interner: &Interner, name: &Token) -> Result<Value, Unwind> {
        if let Some(value) = self.static_fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = self.static_methods.get(&name.lexeme) {
            return Ok(Value::Callable(Rc::clone(method)));
        }

        Err(undefined_property(interner, name))
    }
}

struct Instance {
    class: Rc<Class>,
    fields: RefCell<FxHashMap<Symbol, Value>>,
}

impl Instance {
    fn new(class: Rc<Class>) -> Instance {
        Instance {
            class,
            fields: RefCell::new(FxHashMap::default()),
        }
    }
}

/// Signal that travels up the evaluation stack. `Return` is converted into
/// a value at the nearest call boundary, `Break` at the nearest loop, and
/// `Error` only at the top-level interpret loop.
enum Unwind {
    Error(RuntimeError),
    Return(Value),
    Break,
}

fn runtime_error<M>(token: &Token, message: M) -> Unwind
where
    M: Into<String>,
{
    Unwind::Error(RuntimeError::new(token, message))
}

fn undefined_property(interner: &Interner, name: &Token) -> Unwind {
    runtime_error(
        name,
        format!("Undefined property '{}'.", interner.resolve(name.lexeme)),
    )
}

fn check_number_operand(operator: &Token, operand: &Value) -> Result<f64, Unwind> {
    match operand {
        Value::Number(num) => Ok(*num),
        _ => Err(runtime_error(operator, "Operand must be a number.")),
    }
}

fn check_number_operands(
    operator: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), Unwind> {
    match (left, right) {
        (Value::Number(left_num), Value::Number(right_num)) => Ok((*left_num, *right_num)),
        _ => Err(runtime_error(operator, "Operands must be numbers.")),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(value) => *value,
        Value::Nil => false,
        _ => true,
    }
}

fn is_equal(left: &Value, right: &Value, interner: &Interner) -> bool {
    match (left, right) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::InternedString(l), Value::String(r)) => interner.resolve(*l) == **r,
        (Value::String(l), Value::InternedString(r)) => **l == interner.resolve(*r),
        (Value::InternedString(l), Value::InternedString(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Nil, Value::Nil) => true,
        (Value::Instance(l), Value::Instance(r)) => Rc::ptr_eq(l, r),
        (Value::Callable(l), Value::Callable(r)) => Rc::ptr_eq(l, r),
        (_, _) => false,
    }
}

fn stringify(interner: &Interner, value: &Value) -> String {
    match value {
        Value::String(text) => text.as_ref().clone(),
        Value::InternedString(symbol) => interner.resolve(*symbol),
        Value::Number(num) => format!("{}", num),
        Value::Bool(value) => {
            if *value {
                String::from("true")
            } else {
                String::from("false")
            }
        }
        Value::Nil => String::from("nil"),
        Value::Callable(function) => match &**function {
            Function::Native(..) => String::from("<native fn>"),
            Function::Declared(stmt_function, _) | Function::Method(stmt_function, _) => {
                format!("<fn {}>", interner.resolve(stmt_function.name.lexeme))
            }
            Function::Anonymous(..) => String::from("< anonymous function >"),
            Function::Class(class) => interner.resolve(class.name),
        },
        Value::Instance(instance) => {
            format!("{} instance", interner.resolve(instance.class.name))
        }
    }
}

struct Environment {
    values: RefCell<FxHashMap<Symbol, Value>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    fn new(enclosing: Option<Rc<Environment>>) -> Environment {
        Environment {
            values: RefCell::new(FxHashMap::default()),
            enclosing,
        }
    }

    fn define(&self, name: Symbol, value: Value) {
        self.values.borrow_mut().insert(name, value);
    }

    fn assign(&self, interner: &Interner, name: &Token, value: Value) -> Result<(), Unwind> {
        if self.values.borrow().contains_key(&name.lexeme) {
            self.values.borrow_mut().insert(name.lexeme, value);
            Ok(())
        } else {
            self.enclosing.as_ref().map_or_else(
                || {
                    Err(runtime_error(
                        name,
                        format!("Undefined variable '{}'.", interner.resolve(name.lexeme)),
                    ))
                },
                |enclosing| enclosing.assign(interner, name, value),
            )
        }
    }

    fn get(&self, interner: &Interner, name: &Token) -> Result<Value, Unwind> {
        match self.values.borrow().get(&name.lexeme) {
            Some(value) => Ok(value.clone()),
            None => self.enclosing.as_ref().map_or_else(
                || {
                    Err(runtime_error(
                        name,
                        format!("Undefined variable '{}'.", interner.resolve(name.lexeme)),
                    ))
                },
                |enclosing| enclosing.get(interner, name),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    #[derive(Clone, Default)]
    struct SharedOutput(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("Output was not UTF-8")
        }
    }

    fn run(source: &str) -> (String, bool, bool) {
        let app = App::new();
        let output = SharedOutput::default();
        let mut interpreter =
            Interpreter::with_output(&app.interner, Box::new(output.clone()));

        app.run(&mut interpreter, source);

        (output.text(), app.had_error(), app.had_runtime_error())
    }

    fn run_ok(source: &str) -> String {
        let (output, had_error, had_runtime_error) = run(source);
        assert!(!had_error, "unexpected static error");
        assert!(!had_runtime_error, "unexpected runtime error");
        output
    }

    fn assert_static_error(source: &str) {
        let (output, had_error, had_runtime_error) = run(source);
        assert!(had_error, "expected a static error");
        assert!(!had_runtime_error);
        assert_eq!(output, "", "static errors must skip evaluation");
    }

    fn assert_runtime_error(source: &str) {
        let (_, had_error, had_runtime_error) = run(source);
        assert!(!had_error, "unexpected static error");
        assert!(had_runtime_error, "expected a runtime error");
    }

    #[test]
    fn literals_print_canonically() {
        assert_eq!(run_ok("print 123;"), "123\n");
        assert_eq!(run_ok("print 3.5;"), "3.5\n");
        assert_eq!(run_ok("print 3.0;"), "3\n");
        assert_eq!(run_ok("print \"text\";"), "text\n");
        assert_eq!(run_ok("print true;"), "true\n");
        assert_eq!(run_ok("print false;"), "false\n");
        assert_eq!(run_ok("print nil;"), "nil\n");
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(run_ok("print 1 + 2;"), "3\n");
        assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
        assert_eq!(run_ok("print 7 / 2;"), "3.5\n");
        assert_eq!(run_ok("print -3 + 1;"), "-2\n");
    }

    #[test]
    fn comparisons_require_numbers() {
        assert_eq!(run_ok("print 1 < 2;"), "true\n");
        assert_eq!(run_ok("print 2 <= 2;"), "true\n");
        assert_eq!(run_ok("print 1 > 2;"), "false\n");
        assert_runtime_error("print 1 < \"a\";");
    }

    #[test]
    fn equality_never_raises() {
        assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
        assert_eq!(run_ok("print nil == nil;"), "true\n");
        assert_eq!(run_ok("print nil == false;"), "false\n");
        assert_eq!(run_ok("print \"a\" + \"b\" == \"ab\";"), "true\n");
        assert_eq!(run_ok("print 1 != 2;"), "true\n");
    }

    #[test]
    fn instances_compare_by_identity() {
        let output = run_ok(
            "class Thing {}\
             var a = Thing();\
             var b = Thing();\
             print a == a;\
             print a == b;",
        );
        assert_eq!(output, "true\nfalse\n");
    }

    #[test]
    fn plus_concatenates_and_coerces() {
        assert_eq!(run_ok("print \"a\" + \"b\";"), "ab\n");
        assert_eq!(run_ok("print \"n=\" + 1;"), "n=1\n");
        assert_eq!(run_ok("print 2 + \"x\";"), "2x\n");
        assert_eq!(run_ok("print \"b:\" + true;"), "b:true\n");
        assert_runtime_error("print nil + \"x\";");
        assert_runtime_error("print 1 + true;");
    }

    #[test]
    fn unary_minus_requires_a_number() {
        assert_runtime_error("print -\"a\";");
    }

    #[test]
    fn logical_operators_short_circuit() {
        let output = run_ok(
            "fun speak(value) { print value; return value; }\
             print false and speak(true);\
             print true or speak(false);\
             print true and speak(\"yes\");",
        );
        assert_eq!(output, "false\ntrue\nyes\nyes\n");
    }

    #[test]
    fn logical_operators_return_the_deciding_operand() {
        assert_eq!(run_ok("print nil or \"fallback\";"), "fallback\n");
        assert_eq!(run_ok("print false and \"x\";"), "false\n");
    }

    #[test]
    fn ternary_evaluates_only_the_chosen_branch() {
        let output = run_ok(
            "fun speak(value) { print value; return value; }\
             print true ? \"then\" : speak(\"else\");",
        );
        assert_eq!(output, "then\n");
        assert_eq!(run_ok("print false ? 1 : 2;"), "2\n");
        assert_eq!(run_ok("print true ? 1 : false ? 2 : 3;"), "1\n");
        assert_eq!(run_ok("print false ? 1 : false ? 2 : 3;"), "3\n");
    }

    #[test]
    fn ternary_condition_must_be_a_boolean() {
        assert_runtime_error("print 1 ? 2 : 3;");
    }

    #[test]
    fn assignment_is_an_expression() {
        assert_eq!(run_ok("var a = 1; print a = 2;"), "2\n");
    }

    #[test]
    fn assigning_an_undefined_global_is_an_error() {
        assert_runtime_error("missing = 1;");
    }

    #[test]
    fn reading_an_undefined_global_is_an_error() {
        assert_runtime_error("print missing;");
    }

    #[test]
    fn blocks_shadow_and_restore() {
        let output = run_ok(
            "var a = \"global\";\
             {\
               var a = \"block\";\
               print a;\
             }\
             print a;",
        );
        assert_eq!(output, "block\nglobal\n");
    }

    #[test]
    fn shadowing_does_not_change_earlier_captures() {
        let output = run_ok(
            "var a = \"outer\";\
             {\
               fun f() { print a; }\
               var a = \"inner\";\
               f();\
             }",
        );
        assert_eq!(output, "outer\n");
    }

    #[test]
    fn if_else_picks_a_branch() {
        assert_eq!(
            run_ok("var x = 10; if (x > 0) print \"pos\"; else print \"neg\";"),
            "pos\n"
        );
        assert_eq!(
            run_ok("var x = -1; if (x > 0) print \"pos\"; else print \"neg\";"),
            "neg\n"
        );
    }

    #[test]
    fn for_loop_counts() {
        assert_eq!(
            run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn break_leaves_the_loop() {
        let output = run_ok(
            "var i = 0;\
             while (true) {\
               i = i + 1;\
               if (i == 3) break;\
             }\
             print i;",
        );
        assert_eq!(output, "3\n");
    }

    #[test]
    fn break_only_leaves_the_innermost_loop() {
        let output = run_ok(
            "var total = 0;\
             for (var i = 0; i < 3; i = i + 1) {\
               while (true) { break; }\
               total = total + 1;\
             }\
             print total;",
        );
        assert_eq!(output, "3\n");
    }

    #[test]
    fn break_outside_a_loop_is_a_runtime_error() {
        assert_runtime_error("break;");
    }

    #[test]
    fn break_does_not_cross_a_call_boundary() {
        assert_runtime_error(
            "fun poke() { break; }\
             while (true) { poke(); }",
        );
    }

    #[test]
    fn closures_capture_their_environment() {
        let output = run_ok(
            "fun counter() {\
               var n = 0;\
               fun inc() { n = n + 1; return n; }\
               return inc;\
             }\
             var c = counter();\
             print c();\
             print c();\
             print c();",
        );
        assert_eq!(output, "1\n2\n3\n");
    }

    #[test]
    fn functions_recurse() {
        let output = run_ok(
            "fun countdown(n) {\
               if (n <= 0) return;\
               print n;\
               countdown(n - 1);\
             }\
             countdown(3);",
        );
        assert_eq!(output, "3\n2\n1\n");
    }

    #[test]
    fn functions_recurse_mutually() {
        let output = run_ok(
            "fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }\
             fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }\
             print isEven(4);\
             print isOdd(3);",
        );
        assert_eq!(output, "true\ntrue\n");
    }

    #[test]
    fn function_values_stringify() {
        assert_eq!(run_ok("fun f() {} print f;"), "<fn f>\n");
        assert_eq!(run_ok("print clock;"), "<native fn>\n");
        assert_eq!(run_ok("print fun () {};"), "< anonymous function >\n");
    }

    #[test]
    fn clock_returns_a_number() {
        assert_eq!(run_ok("print clock() >= 0;"), "true\n");
    }

    #[test]
    fn anonymous_functions_are_first_class() {
        assert_eq!(
            run_ok("var add = fun (a, b) { return a + b; }; print add(3, 4);"),
            "7\n"
        );
        assert_eq!(
            run_ok(
                "fun apply(f, value) { return f(value); }\
                 print apply(fun (n) { return n + 1; }, 41);"
            ),
            "42\n"
        );
    }

    #[test]
    fn arity_is_checked() {
        assert_runtime_error("fun f(a) {} f(1, 2);");
        assert_runtime_error("fun f(a, b) {} f(1);");
    }

    #[test]
    fn only_functions_and_classes_are_callable() {
        assert_runtime_error("\"text\"();");
    }

    #[test]
    fn instances_hold_fields() {
        let output = run_ok(
            "class Box {}\
             var box = Box();\
             box.value = 42;\
             print box.value;",
        );
        assert_eq!(output, "42\n");
    }

    #[test]
    fn fields_shadow_methods() {
        let output = run_ok(
            "class Box { label() { return \"method\"; } }\
             var box = Box();\
             print box.label();\
             box.label = \"field\";\
             print box.label;",
        );
        assert_eq!(output, "method\nfield\n");
    }

    #[test]
    fn methods_see_this() {
        let output = run_ok(
            "class Point {\
               init(x, y) {\
                 this.x = x;\
                 this.y = y;\
               }\
               sum() { return this.x + this.y; }\
             }\
             var p = Point(1, 2);\
             print p.sum();\
             print p;",
        );
        assert_eq!(output, "3\nPoint instance\n");
    }

    #[test]
    fn class_arity_follows_init() {
        assert_runtime_error(
            "class Point { init(x, y) {} }\
             Point(1);",
        );
        assert_eq!(run_ok("class Empty {} print Empty();"), "Empty instance\n");
    }

    #[test]
    fn init_with_bare_return_still_yields_the_instance() {
        assert_eq!(
            run_ok("class Foo { init() { return; } } print Foo();"),
            "Foo instance\n"
        );
    }

    #[test]
    fn calling_init_directly_returns_this() {
        let output = run_ok(
            "class Foo { init() { this.n = 7; } }\
             var foo = Foo();\
             print foo.init();",
        );
        assert_eq!(output, "Foo instance\n");
    }

    #[test]
    fn undefined_property_is_a_runtime_error() {
        assert_runtime_error("class Foo {} print Foo().missing;");
    }

    #[test]
    fn properties_require_an_instance() {
        assert_runtime_error("print true.field;");
        assert_runtime_error("true.field = 1;");
    }

    #[test]
    fn methods_are_inherited() {
        let output = run_ok(
            "class A { m() { return \"A\"; } }\
             class B < A {}\
             print B().m();",
        );
        assert_eq!(output, "A\n");
    }

    #[test]
    fn super_calls_the_lexical_superclass() {
        let output = run_ok(
            "class A { greet() { print \"hi from A\"; } }\
             class B < A { greet() { super.greet(); print \"hi from B\"; } }\
             B().greet();",
        );
        assert_eq!(output, "hi from A\nhi from B\n");
    }

    #[test]
    fn super_binds_lexically_not_by_receiver() {
        let output = run_ok(
            "class A { speak() { print \"A\"; } }\
             class B < A { speak() { super.speak(); } }\
             class C < B {}\
             C().speak();",
        );
        assert_eq!(output, "A\n");
    }

    #[test]
    fn super_walks_the_whole_chain() {
        let output = run_ok(
            "class A { m() { return \"A\"; } }\
             class B < A {}\
             class C < B { m() { return super.m(); } }\
             print C().m();",
        );
        assert_eq!(output, "A\n");
    }

    #[test]
    fn undefined_super_method_is_a_runtime_error() {
        assert_runtime_error(
            "class A {}\
             class B < A { m() { return super.missing(); } }\
             B().m();",
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        assert_runtime_error("var NotAClass = 1; class B < NotAClass {}");
    }

    #[test]
    fn static_methods_are_called_on_the_class() {
        assert_eq!(
            run_ok("class Math { class square(n) { return n * n; } } print Math.square(4);"),
            "16\n"
        );
    }

    #[test]
    fn static_methods_are_not_inherited() {
        assert_runtime_error(
            "class A { class m() { return 1; } }\
             class B < A {}\
             print B.m();",
        );
    }

    #[test]
    fn classes_hold_static_fields() {
        let output = run_ok(
            "class Config {}\
             Config.limit = 10;\
             print Config.limit;",
        );
        assert_eq!(output, "10\n");
    }

    #[test]
    fn classes_stringify_by_name() {
        assert_eq!(run_ok("class Foo {} print Foo;"), "Foo\n");
    }

    #[test]
    fn duplicate_declaration_in_a_scope_is_a_static_error() {
        assert_static_error("{ var a = 1; var a = 2; }");
    }

    #[test]
    fn top_level_return_is_a_static_error() {
        assert_static_error("print 1; return 2;");
    }

    #[test]
    fn this_outside_a_class_is_a_static_error() {
        assert_static_error("print this;");
    }

    #[test]
    fn this_in_a_static_method_is_a_static_error() {
        assert_static_error("class A { class m() { return this; } }");
    }

    #[test]
    fn super_outside_a_class_is_a_static_error() {
        assert_static_error("print super.m;");
    }

    #[test]
    fn super_without_a_superclass_is_a_static_error() {
        assert_static_error("class A { m() { super.m(); } }");
    }

    #[test]
    fn self_inheritance_is_a_static_error() {
        assert_static_error("class A < A {}");
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_a_static_error() {
        assert_static_error("{ var a = a; }");
    }

    #[test]
    fn returning_a_value_from_an_initializer_is_a_static_error() {
        assert_static_error("class Foo { init() { return 1; } }");
    }

    #[test]
    fn a_runtime_error_stops_the_program() {
        let (output, had_error, had_runtime_error) = run("print 1; print missing; print 2;");
        assert!(!had_error);
        assert!(had_runtime_error);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn a_parse_error_skips_evaluation() {
        let (output, had_error, _) = run("print 1; var = 2;");
        assert!(had_error);
        assert_eq!(output, "");
    }

    #[test]
    fn resolver_assigns_distinct_slots_to_shadowed_names() {
        let app = App::new();
        let mut interpreter = Interpreter::with_output(&app.interner, Box::new(io::sink()));

        let mut scanner = Scanner::new(&app, b"{ var a = 1; { var a = 2; } }");
        let tokens = scanner.scan_tokens();
        let mut parser = Parser::new(&app, tokens, 0);
        let statements = parser.parse();
        let mut resolver = Resolver::new(&app, &mut interpreter);
        resolver.resolve(&statements);

        assert!(!app.had_error());
        assert_eq!(interpreter.slot_count(), 2);

        fn var_slots(statements: &[Stmt], slots: &mut Vec<usize>) {
            for statement in statements {
                match statement {
                    Stmt::Var { slot, .. } => slots.push(slot.get().expect("unresolved local")),
                    Stmt::Block { statements } => var_slots(statements, slots),
                    _ => {}
                }
            }
        }

        let mut slots = Vec::new();
        match &statements[0] {
            Stmt::Block { statements } => var_slots(statements, &mut slots),
            _ => panic!("expected a block"),
        }
        assert_eq!(slots.len(), 2);
        assert_ne!(slots[0], slots[1]);
    }

    #[test]
    fn repl_prints_bare_expression_values() {
        let app = App::new();
        let output = SharedOutput::default();
        let mut interpreter =
            Interpreter::with_output(&app.interner, Box::new(output.clone()));

        app.run_repl(&mut interpreter, "var x = 1;");
        app.clear_errors();
        app.run_repl(&mut interpreter, "x + 1;");

        assert!(!app.had_error());
        assert!(!app.had_runtime_error());
        assert_eq!(output.text(), "2\n");
    }

    #[test]
    fn repl_keeps_definitions_between_lines() {
        let app = App::new();
        let output = SharedOutput::default();
        let mut interpreter =
            Interpreter::with_output(&app.interner, Box::new(output.clone()));

        app.run_repl(&mut interpreter, "fun double(n) { return n + n; }");
        app.clear_errors();
        app.run_repl(&mut interpreter, "double(21);");

        assert!(!app.had_error());
        assert!(!app.had_runtime_error());
        assert_eq!(output.text(), "42\n");
    }

    #[test]
    fn repl_clears_flags_between_lines() {
        let app = App::new();
        let output = SharedOutput::default();
        let mut interpreter =
            Interpreter::with_output(&app.interner, Box::new(output.clone()));

        app.run_repl(&mut interpreter, "print missing;");
        assert!(app.had_runtime_error());
        app.clear_errors();

        app.run_repl(&mut interpreter, "print 1;");
        assert!(!app.had_error());
        assert!(!app.had_runtime_error());
        assert_eq!(output.text(), "1\n");
    }
}
