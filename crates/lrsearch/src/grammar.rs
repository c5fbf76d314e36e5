//! Grammar types.

use crate::{
    syntax::{self, SyntaxError},
    types::Map,
    util::{display_fn, write_joined},
};
use std::{fmt, fs, io, marker::PhantomData, path::Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug, Clone)]
pub struct Terminal {
    id: TerminalID,
    ch: Option<char>,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    /// Return the input character matched by this terminal, or `None` for the end of input.
    pub fn ch(&self) -> Option<char> {
        self.ch
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ch {
            Some(ch) => write!(f, "{}", ch),
            None => f.write_str("$end"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    /// Reserved symbol for the head of the augmented start production.
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug, Clone)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    /// The augmented production `S' -> S`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug, Clone)]
pub struct Production {
    id: ProductionID,
    left: NonterminalID,
    right: Vec<SymbolID>,
}

impl Production {
    pub fn id(&self) -> ProductionID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    // `"S -> a S b"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} -> ", g.nonterminals[&self.left])?;
            if self.right.is_empty() {
                return f.write_str("ε");
            }
            write_joined(f, " ", self.right.iter().map(|s| g.symbol(*s)))
        })
    }
}

/// The grammar definition used to derive the automaton.
///
/// A `Grammar` is always augmented: it owns the synthetic production
/// `NonterminalID::START -> start_symbol` registered as `ProductionID::ACCEPT`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub productions: Map<ProductionID, Production>,
    pub start_symbol: NonterminalID,
    terminal_ids: Map<char, TerminalID>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            } else if nonterminal.id() == NonterminalID::START {
                write!(f, " (augmented)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for production in self.productions.values() {
            writeln!(f, "{}", production.display(self))?;
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarDefError> {
        let source = fs::read_to_string(path).map_err(GrammarDefError::IO)?;
        Self::from_str(&source)
    }

    /// Build a grammar from the textual notation, e.g. `S -> aSb | c`.
    pub fn from_str(source: &str) -> Result<Grammar, GrammarDefError> {
        let rules = syntax::parse(source)?;
        Self::from_rules(
            rules
                .into_iter()
                .flat_map(|desc| {
                    let left = desc.left;
                    desc.productions
                        .into_iter()
                        .map(move |right| (left.clone(), right))
                })
                .collect::<Vec<_>>(),
        )
    }

    /// Build a grammar from a list of `(head, body)` pairs.
    ///
    /// Every body symbol naming some head is a nonterminal. Any other
    /// single-character symbol is a terminal, unless it is an ASCII uppercase
    /// letter, which is reported as an undeclared nonterminal. The first head is
    /// the start symbol.
    pub fn from_rules<I, L, R>(rules: I) -> Result<Grammar, GrammarDefError>
    where
        I: IntoIterator<Item = (L, R)>,
        L: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let rules: Vec<(L, Vec<R::Item>)> = rules
            .into_iter()
            .map(|(left, right)| (left, right.into_iter().collect()))
            .collect();

        Grammar::define(|g| {
            // 右辺より先に全ての左辺を非終端記号として登録する
            let mut heads = Map::default();
            for (left, _) in &rules {
                let left = left.as_ref();
                if !heads.contains_key(left) {
                    heads.insert(left.to_owned(), g.nonterminal(left)?);
                }
            }

            for (left, right) in &rules {
                let left = left.as_ref();
                let mut symbols = Vec::with_capacity(right.len());
                for symbol in right {
                    let symbol = symbol.as_ref();
                    if let Some(n) = heads.get(symbol) {
                        symbols.push(SymbolID::N(*n));
                        continue;
                    }
                    match single_char(symbol) {
                        Some(ch) if !ch.is_ascii_uppercase() && !ch.is_whitespace() => {
                            symbols.push(SymbolID::T(g.terminal(ch)?));
                        }
                        _ => {
                            return Err(GrammarDefError::UnknownSymbol {
                                symbol: symbol.to_owned(),
                                head: left.to_owned(),
                            });
                        }
                    }
                }
                g.rule(heads[left], symbols)?;
            }

            Ok(())
        })
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            productions: Map::default(),
            terminal_ids: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_production_id: ProductionID::OFFSET,
            _marker: PhantomData,
        };

        def.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                ch: None,
            },
        );

        f(&mut def)?;

        def.end()
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    /// Iterate over the productions headed by `left`, in definition order.
    pub fn productions_of(&self, left: NonterminalID) -> impl Iterator<Item = &Production> + '_ {
        self.productions.values().filter(move |p| p.left == left)
    }

    /// Look up the terminal matching an input character.
    pub fn terminal_id(&self, ch: char) -> Option<TerminalID> {
        self.terminal_ids.get(&ch).copied()
    }

    /// Return the name of the synthesized start symbol.
    pub fn augmented_start(&self) -> &Nonterminal {
        &self.nonterminals[&NonterminalID::START]
    }

    pub fn symbol(&self, id: SymbolID) -> &dyn fmt::Display {
        match id {
            SymbolID::T(t) => &self.terminals[&t],
            SymbolID::N(n) => &self.nonterminals[&n],
        }
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef<'def> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    productions: Map<ProductionID, Production>,
    terminal_ids: Map<char, TerminalID>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_production_id: u16,
    _marker: PhantomData<&'def mut ()>,
}

impl<'def> GrammarDef<'def> {
    /// Declare a terminal symbol matching the input character `ch`.
    ///
    /// Declaring the same character twice returns the same identifier.
    pub fn terminal(&mut self, ch: char) -> Result<TerminalID, GrammarDefError> {
        if ch.is_whitespace() {
            return Err(GrammarDefError::InvalidTerminal { ch });
        }
        if let Some(id) = self.terminal_ids.get(&ch) {
            return Ok(*id);
        }

        let id = TerminalID::new(next_id(&mut self.next_terminal_id)?);
        self.terminals.insert(id, Terminal { id, ch: Some(ch) });
        self.terminal_ids.insert(ch, id);

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    ///
    /// Declaring the same name twice returns the same identifier.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        if !verify_ident(name) {
            return Err(GrammarDefError::InvalidName {
                name: name.to_owned(),
            });
        }
        if let Some(nonterminal) = self.nonterminals.values().find(|n| n.name == name) {
            return Ok(nonterminal.id);
        }

        let id = NonterminalID::new(next_id(&mut self.next_nonterminal_id)?);
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned(),
            },
        );

        Ok(id)
    }

    /// Specify a production rule into this grammer.
    pub fn rule<I>(&mut self, left: NonterminalID, right: I) -> Result<(), GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right: Vec<SymbolID> = right.into_iter().collect();

        if !self.nonterminals.contains_key(&left) {
            return Err("unknown nonterminal on the left-hand side of a production".into());
        }
        for symbol in &right {
            let known = match symbol {
                SymbolID::T(t) => *t != TerminalID::EOI && self.terminals.contains_key(t),
                SymbolID::N(n) => self.nonterminals.contains_key(n),
            };
            if !known {
                return Err("unknown or reserved symbol in a production body".into());
            }
        }
        if right.len() >= usize::from(u16::MAX) {
            return Err(GrammarDefError::TooManySymbols);
        }

        if self
            .productions
            .values()
            .any(|p| p.left == left && p.right == right)
        {
            tracing::warn!(
                "duplicate production for `{}' is ignored",
                self.nonterminals[&left]
            );
            return Ok(());
        }

        let id = ProductionID::new(next_id(&mut self.next_production_id)?);
        self.productions.insert(id, Production { id, left, right });

        Ok(())
    }

    /// Specify the start symbol for this grammar.
    ///
    /// By default the head of the first production is used.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains_key(&symbol) {
            return Err("unknown start symbol".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn end(mut self) -> Result<Grammar, GrammarDefError> {
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .productions
                .values()
                .next()
                .map(|p| p.left)
                .ok_or(GrammarDefError::EmptyGrammar)?,
        };

        for nonterminal in self.nonterminals.values() {
            if self.productions.values().all(|p| p.left != nonterminal.id) {
                tracing::warn!(
                    "the nonterminal `{}' has no associated production",
                    nonterminal
                );
            }
        }

        // 既存の記号名と衝突しなくなるまで末尾の数字を増やす
        let base = &self.nonterminals[&start].name;
        let mut suffix: u32 = 0;
        let name = loop {
            let candidate = format!("{}{}", base, suffix);
            if self.nonterminals.values().all(|n| n.name != candidate) {
                break candidate;
            }
            suffix += 1;
        };
        tracing::debug!("augmented start symbol: `{}' -> `{}'", name, base);

        self.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name,
            },
        );
        self.productions.insert(
            ProductionID::ACCEPT,
            Production {
                id: ProductionID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
            },
        );

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            productions: self.productions,
            start_symbol: start,
            terminal_ids: self.terminal_ids,
        })
    }
}

fn next_id(next: &mut u16) -> Result<u16, GrammarDefError> {
    let id = *next;
    *next = next.checked_add(1).ok_or(GrammarDefError::TooManySymbols)?;
    Ok(id)
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("unknown symbol `{symbol}' in a production of `{head}'")]
    UnknownSymbol { symbol: String, head: String },

    #[error("incorrect nonterminal name: `{name}'")]
    InvalidName { name: String },

    #[error("incorrect terminal symbol: {ch:?}")]
    InvalidTerminal { ch: char },

    #[error("the grammar has no production")]
    EmptyGrammar,

    #[error("too many symbols or productions")]
    TooManySymbols,

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        // The identifier must not be empty.
        None => return false,
    };
    if first != '_' && !unicode_ident::is_xid_start(first) {
        return false;
    }
    chars.all(unicode_ident::is_xid_continue)
}
