use crate::scanner::{Token, TokenLiteral};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone)]
pub enum Expr {
    Assign {
        name: Token,
        value: Box<Expr>,
        id: ExprId,
    },

    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// Anonymous `fun` in expression position.
    Function(Rc<ExprFunction>),

    Get {
        object: Box<Expr>,
        name: Token,
    },

    Grouping {
        expression: Box<Expr>,
    },

    Literal {
        value: TokenLiteral,
    },

    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    Super {
        keyword: Token,
        method: Token,
        id: ExprId,
    },

    Ternary {
        operator: Token,
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    This {
        keyword: Token,
        id: ExprId,
    },

    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Variable(ExprId, ExprVariable),
}

/// Key into the interpreter's resolution side tables. Ids are handed out
/// by the parser and stay unique for the lifetime of an interpreter, even
/// across prompt lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExprId(pub usize);

#[derive(Clone)]
pub struct ExprVariable {
    pub name: Token,
}

/// A named function declaration. The `slot`, `this_slot` and `param_slots`
/// annotations are empty after parsing and filled in by the resolver.
pub struct StmtFunction {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub slot: Cell<Option<usize>>,
    pub this_slot: Cell<Option<usize>>,
    pub param_slots: RefCell<Vec<usize>>,
}

impl StmtFunction {
    pub fn new(name: Token, params: Vec<Token>, body: Vec<Stmt>) -> StmtFunction {
        StmtFunction {
            name,
            params,
            body,
            slot: Cell::new(None),
            this_slot: Cell::new(None),
            param_slots: RefCell::new(Vec::new()),
        }
    }
}

/// An anonymous function expression; like [`StmtFunction`] but nameless
/// and never a method.
pub struct ExprFunction {
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub param_slots: RefCell<Vec<usize>>,
}

impl ExprFunction {
    pub fn new(params: Vec<Token>, body: Vec<Stmt>) -> ExprFunction {
        ExprFunction {
            params,
            body,
            param_slots: RefCell::new(Vec::new()),
        }
    }
}

#[derive(Clone)]
pub enum Stmt {
    Block {
        statements: Vec<Stmt>,
    },

    Break {
        keyword: Token,
    },

    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<StmtFunction>>,
        static_methods: Vec<Rc<StmtFunction>>,
        slot: Cell<Option<usize>>,
        super_slot: Cell<Option<usize>>,
    },

    /// Placeholder for a statement that failed to parse; executing it is
    /// a no-op. The driver never evaluates a program that contains one.
    Error {
        message: String,
    },

    Expression(Expr),

    Function(Rc<StmtFunction>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    Print {
        expression: Expr,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Var {
        name: Token,
        initializer: Option<Expr>,
        slot: Cell<Option<usize>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },
}
