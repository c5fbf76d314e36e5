//! The canonical collection of LR(0) item sets.

use crate::{
    grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID},
    types::{Map, Set},
    util::display_fn,
};
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);
impl StateID {
    /// The initial state, `Closure({[S' -> . S]})`.
    pub const START: Self = Self(0);

    pub const fn into_raw(self) -> u32 {
        self.0
    }
}
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}
impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// The LR(0) item, i.e. a production with a marker position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR0Item {
    pub production: ProductionID,
    pub index: u16,
}

impl LR0Item {
    /// `[S' -> . S]`
    pub const ACCEPT: Self = Self::new(ProductionID::ACCEPT);

    /// Create the item whose marker is at the beginning of the production.
    pub const fn new(production: ProductionID) -> Self {
        Self {
            production,
            index: 0,
        }
    }

    /// Return the symbol right after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production)
            .right()
            .get(usize::from(self.index))
            .copied()
    }

    pub fn is_complete(&self, g: &Grammar) -> bool {
        usize::from(self.index) == g.production(self.production).right().len()
    }

    fn advance(self) -> Self {
        Self {
            index: self.index + 1,
            ..self
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let production = g.production(self.production);
            write!(f, "[{} ->", g.nonterminals[&production.left()])?;
            for (i, symbol) in production.right().iter().enumerate() {
                if i == usize::from(self.index) {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol(*symbol))?;
            }
            if self.is_complete(g) {
                f.write_str(" .")?;
            }
            f.write_str("]")
        })
    }
}

/// A set of LR(0) items.
///
/// Items keep their insertion order, which fixes the order in which completed
/// items are reduced. Equality ignores that order.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    items: Set<LR0Item>,
}

impl ItemSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &LR0Item) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LR0Item> + '_ {
        self.items.iter()
    }

    /// The canonical form of this set, used as the deduplication key of states.
    pub fn key(&self) -> Vec<LR0Item> {
        let mut key: Vec<_> = self.items.iter().copied().collect();
        key.sort_unstable();
        key
    }
}

impl PartialEq for ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.items.iter().all(|i| other.contains(i))
    }
}
impl Eq for ItemSet {}

impl FromIterator<LR0Item> for ItemSet {
    fn from_iter<I: IntoIterator<Item = LR0Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Expand `items` to the smallest superset closed under nonterminal expansion.
pub fn closure<I>(g: &Grammar, items: I) -> ItemSet
where
    I: IntoIterator<Item = LR0Item>,
{
    let mut items: Set<LR0Item> = items.into_iter().collect();
    let mut added = vec![];
    let mut pass = 0;
    loop {
        pass += 1;
        added.clear();

        // [X -> ... . Y beta] があれば Y のすべての規則を [Y -> . gamma] として追加する
        for item in &items {
            if let Some(SymbolID::N(n)) = item.next_symbol(g) {
                added.extend(g.productions_of(n).map(|p| LR0Item::new(p.id())));
            }
        }

        let changed = added
            .drain(..)
            .fold(false, |changed, item| changed | items.insert(item));
        if !changed {
            break;
        }
    }
    tracing::trace!("closure: {} items after {} passes", items.len(), pass);

    ItemSet { items }
}

/// Advance the marker over `symbol` and take the closure of the result.
///
/// Returns `None` if no item in `state` expects `symbol`.
pub fn goto(g: &Grammar, state: &ItemSet, symbol: SymbolID) -> Option<ItemSet> {
    let kernels: Vec<LR0Item> = state
        .iter()
        .filter(|item| item.next_symbol(g) == Some(symbol))
        .map(|item| item.advance())
        .collect();
    if kernels.is_empty() {
        return None;
    }
    Some(closure(g, kernels))
}

#[derive(Debug, Clone)]
pub struct State {
    items: ItemSet,
    shifts: Map<TerminalID, StateID>,
    gotos: Map<NonterminalID, StateID>,
    reduces: Vec<ProductionID>,
    accepting: bool,
}

impl State {
    pub fn items(&self) -> &ItemSet {
        &self.items
    }

    /// Transitions on terminal symbols.
    pub fn shifts(&self) -> &Map<TerminalID, StateID> {
        &self.shifts
    }

    /// Transitions on nonterminal symbols.
    pub fn gotos(&self) -> &Map<NonterminalID, StateID> {
        &self.gotos
    }

    /// The productions of the completed items in this state, in item order.
    ///
    /// The augmented production is not included. See `is_accepting`.
    pub fn reduces(&self) -> &[ProductionID] {
        &self.reduces[..]
    }

    /// Whether this state contains the completed augmented item `[S' -> S .]`.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn transition(&self, symbol: SymbolID) -> Option<StateID> {
        match symbol {
            SymbolID::T(t) => self.shifts.get(&t).copied(),
            SymbolID::N(n) => self.gotos.get(&n).copied(),
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "  items:")?;
            for item in self.items.iter() {
                writeln!(f, "  - {}", item.display(g))?;
            }
            if !self.shifts.is_empty() {
                writeln!(f, "  shifts:")?;
                for (t, to) in &self.shifts {
                    writeln!(f, "  - {} -> {}", g.terminals[t], to)?;
                }
            }
            if !self.gotos.is_empty() {
                writeln!(f, "  gotos:")?;
                for (n, to) in &self.gotos {
                    writeln!(f, "  - {} -> {}", g.nonterminals[n], to)?;
                }
            }
            if !self.reduces.is_empty() {
                writeln!(f, "  reduces:")?;
                for reduce in &self.reduces {
                    writeln!(f, "  - {}", g.production(*reduce).display(g))?;
                }
            }
            if self.accepting {
                writeln!(f, "  accept")?;
            }
            Ok(())
        })
    }
}

/// The LR(0) automaton, built once from a grammar and read-only afterwards.
#[derive(Debug)]
pub struct Automaton {
    grammar: Grammar,
    states: Map<StateID, State>,
}

impl Automaton {
    /// Build the canonical collection and its transitions.
    #[tracing::instrument(skip_all)]
    pub fn construct(grammar: Grammar) -> Self {
        let g = &grammar;
        let mut state_id = {
            let mut next_state_id = 0;
            move || {
                let id = StateID(next_state_id);
                next_state_id += 1;
                id
            }
        };

        let mut states = Map::<StateID, State>::default();
        let mut known = Map::<Vec<LR0Item>, StateID>::default();
        let mut pending_states = VecDeque::<(StateID, ItemSet)>::new();

        let start = closure(g, Some(LR0Item::ACCEPT));
        let start_id = state_id();
        debug_assert_eq!(start_id, StateID::START);
        known.insert(start.key(), start_id);
        pending_states.push_back((start_id, start));

        // 発見順に一度ずつ処理する
        while let Some((current, items)) = pending_states.pop_front() {
            let mut symbols = Set::<SymbolID>::default();
            let mut reduces = vec![];
            let mut accepting = false;
            for item in items.iter() {
                match item.next_symbol(g) {
                    Some(symbol) => {
                        symbols.insert(symbol);
                    }
                    None if item.production == ProductionID::ACCEPT => accepting = true,
                    None => reduces.push(item.production),
                }
            }

            let mut shifts = Map::default();
            let mut gotos = Map::default();
            for symbol in symbols {
                let next_items = match goto(g, &items, symbol) {
                    Some(next_items) => next_items,
                    None => continue,
                };
                let key = next_items.key();
                let next = match known.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = state_id();
                        tracing::trace!("new state {:?} ({} items)", id, next_items.len());
                        known.insert(key, id);
                        pending_states.push_back((id, next_items));
                        id
                    }
                };
                match symbol {
                    SymbolID::T(t) => {
                        shifts.insert(t, next);
                    }
                    SymbolID::N(n) => {
                        gotos.insert(n, next);
                    }
                }
            }

            states.insert(
                current,
                State {
                    items,
                    shifts,
                    gotos,
                    reduces,
                    accepting,
                },
            );
        }

        tracing::debug!(
            "constructed {} states from {} productions",
            states.len(),
            grammar.productions.len()
        );

        Self { grammar, states }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states.iter().map(|(id, state)| (*id, state))
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[&id]
    }

    pub fn start_state(&self) -> &State {
        self.state(StateID::START)
    }

    pub fn transition(&self, from: StateID, symbol: SymbolID) -> Option<StateID> {
        self.state(from).transition(symbol)
    }

    pub fn accepting_states(&self) -> impl Iterator<Item = StateID> + '_ {
        self.states
            .iter()
            .filter_map(|(id, state)| state.is_accepting().then_some(*id))
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, state) in &self.states {
            writeln!(f, "- id: {}", id)?;
            write!(f, "{}", state.display(&self.grammar))?;
        }
        Ok(())
    }
}
