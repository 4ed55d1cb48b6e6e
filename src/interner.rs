use std::cell::RefCell;
use string_interner::backend::StringBackend;
use string_interner::symbol::SymbolU32;
use string_interner::StringInterner;

pub type Symbol = SymbolU32;

/// Process-wide string interner. Identifiers, keywords and string literals
/// are interned once by the scanner; the rest of the pipeline passes
/// `Symbol`s around and only resolves them for diagnostics and output.
pub struct Interner {
    pub sym_this: Symbol,
    pub sym_super: Symbol,
    pub sym_init: Symbol,
    interner: RefCell<StringInterner<StringBackend<Symbol>>>,
}

impl Interner {
    pub fn new() -> Interner {
        let mut interner = StringInterner::<StringBackend<Symbol>>::new();
        Interner {
            sym_this: interner.get_or_intern("this"),
            sym_super: interner.get_or_intern("super"),
            sym_init: interner.get_or_intern("init"),
            interner: RefCell::new(interner),
        }
    }

    pub fn get_or_intern<T>(&self, string: T) -> Symbol
    where
        T: AsRef<str>,
    {
        self.interner.borrow_mut().get_or_intern(string)
    }

    pub fn resolve(&self, symbol: Symbol) -> String {
        String::from(
            self.interner
                .borrow()
                .resolve(symbol)
                .expect("Tried to resolve a symbol from a foreign interner"),
        )
    }
}

impl Default for Interner {
    fn default() -> Interner {
        Interner::new()
    }
}
