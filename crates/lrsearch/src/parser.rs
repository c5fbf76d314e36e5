//! Backtracking shift-reduce search over the LR(0) automaton.
//!
//! The automaton may contain shift/reduce and reduce/reduce conflicts, so
//! instead of consulting lookaheads the search tries every applicable action
//! depth-first: the shift first, then each reduction in the item order of the
//! current state.

use crate::{
    grammar::TerminalID,
    lr0::{Automaton, StateID},
    types::Map,
};
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    max_steps: Option<u64>,
}

impl SearchConfig {
    pub const fn new() -> Self {
        Self { max_steps: None }
    }

    /// Give up after exploring `steps` transitions.
    ///
    /// The search is exponential in the worst case, so a limit is useful when
    /// the grammar or the input is not trusted.
    pub fn max_steps(&mut self, steps: u64) -> &mut Self {
        self.max_steps = Some(steps);
        self
    }

    /// Remove the step limit. This is the default.
    pub fn unbounded(&mut self) -> &mut Self {
        self.max_steps = None;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("the search did not finish within {limit} steps")]
    StepLimitExceeded { limit: u64 },
}

/// The parser driving the search. It borrows the automaton and can be reused for
/// any number of inputs.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    automaton: &'a Automaton,
    config: SearchConfig,
}

impl<'a> Parser<'a> {
    pub fn new(automaton: &'a Automaton) -> Self {
        Self::with_config(automaton, SearchConfig::new())
    }

    pub fn with_config(automaton: &'a Automaton, config: SearchConfig) -> Self {
        Self { automaton, config }
    }

    /// Return whether `input` is derivable from the start symbol.
    ///
    /// The step limit of the configuration is not applied. The search always
    /// terminates, but the number of explored stacks can grow exponentially
    /// with the input length, e.g. for grammars mixing ε-productions and left
    /// recursion. Use `search` with a step limit for untrusted grammars.
    pub fn parse(&self, input: &str) -> bool {
        matches!(self.run(input, None), Outcome::Accepted)
    }

    /// Same as `parse`, but honors the configured step limit.
    pub fn search(&self, input: &str) -> Result<bool, SearchError> {
        match self.run(input, self.config.max_steps) {
            Outcome::Accepted => Ok(true),
            Outcome::Rejected => Ok(false),
            Outcome::Exhausted { limit } => Err(SearchError::StepLimitExceeded { limit }),
        }
    }

    #[tracing::instrument(skip_all, fields(len = input.len()))]
    fn run(&self, input: &str, max_steps: Option<u64>) -> Outcome {
        let g = self.automaton.grammar();

        let mut tokens = Vec::with_capacity(input.len() + 1);
        for ch in input.chars() {
            match g.terminal_id(ch) {
                Some(t) => tokens.push(t),
                None => {
                    tracing::debug!("{:?} is not a terminal of the grammar", ch);
                    return Outcome::Rejected;
                }
            }
        }
        tokens.push(TerminalID::EOI);

        let mut search = Search {
            automaton: self.automaton,
            tokens: &tokens,
            stacks: StackArena::default(),
            height_limit: self.height_limit(tokens.len() - 1),
        };
        search.run(max_steps)
    }

    /// The maximum stack height needed by some accepting run, if any exists.
    ///
    /// Every derivable input has a parse tree in which no path from the root
    /// repeats a nonterminal over the same span. Such a tree is at most
    /// `|N| * (n + 1) + 1` levels deep, and the stack holds at most one body
    /// prefix per level.
    fn height_limit(&self, input_len: usize) -> usize {
        let g = self.automaton.grammar();
        let longest = g
            .productions
            .values()
            .map(|p| p.right().len())
            .max()
            .unwrap_or(0)
            .max(1);
        g.nonterminals
            .len()
            .saturating_mul(input_len.saturating_add(1))
            .saturating_add(1)
            .saturating_mul(longest)
            .saturating_add(1)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Outcome {
    Accepted,
    Rejected,
    Exhausted { limit: u64 },
}

/// A handle to an immutable stack of states stored in a `StackArena`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StackID(usize);

#[derive(Debug)]
struct StackNode {
    state: StateID,
    parent: Option<StackID>,
    height: usize,
}

/// Hash-consed persistent stacks.
///
/// Pushing returns a new handle and never modifies an existing stack, so a
/// choice point can keep its stack while sibling branches push and pop.
/// Structurally equal stacks get the same handle.
#[derive(Debug, Default)]
struct StackArena {
    nodes: Vec<StackNode>,
    interned: Map<(Option<StackID>, StateID), StackID>,
}

impl StackArena {
    fn push(&mut self, parent: Option<StackID>, state: StateID) -> StackID {
        if let Some(id) = self.interned.get(&(parent, state)) {
            return *id;
        }
        let id = StackID(self.nodes.len());
        let height = parent.map_or(0, |p| self.height(p)) + 1;
        self.nodes.push(StackNode {
            state,
            parent,
            height,
        });
        self.interned.insert((parent, state), id);
        id
    }

    fn node(&self, id: StackID) -> &StackNode {
        &self.nodes[id.0]
    }

    fn top(&self, id: StackID) -> StateID {
        self.node(id).state
    }

    fn height(&self, id: StackID) -> usize {
        self.node(id).height
    }

    /// Drop `n` states. Returns `None` unless at least one state remains.
    fn pop(&self, id: StackID, n: usize) -> Option<StackID> {
        if n >= self.height(id) {
            return None;
        }
        let mut current = id;
        for _ in 0..n {
            current = self.node(current).parent?;
        }
        Some(current)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct Configuration {
    stack: StackID,
    index: usize,
}

#[derive(Debug, Copy, Clone)]
enum Choice {
    Shift,
    Reduce(usize),
}

#[derive(Debug)]
struct ChoicePoint {
    config: Configuration,
    next: Choice,
}

struct Search<'s> {
    automaton: &'s Automaton,
    tokens: &'s [TerminalID],
    stacks: StackArena,
    height_limit: usize,
}

impl Search<'_> {
    fn run(&mut self, max_steps: Option<u64>) -> Outcome {
        let initial = Configuration {
            stack: self.stacks.push(None, StateID::START),
            index: 0,
        };
        if self.accepts(initial) {
            return Outcome::Accepted;
        }

        // 探索済みの構成は再訪しない (失敗済み、または現在の経路上にある)
        let mut visited = FxHashSet::default();
        visited.insert(initial);

        let mut choice_points = vec![ChoicePoint {
            config: initial,
            next: Choice::Shift,
        }];
        let mut steps: u64 = 0;

        while let Some(point) = choice_points.last_mut() {
            if let Some(limit) = max_steps {
                if steps >= limit {
                    tracing::debug!("gave up after {} steps", steps);
                    return Outcome::Exhausted { limit };
                }
            }
            steps += 1;

            let next = match self.next_successor(point) {
                Some(next) => next,
                None => {
                    choice_points.pop();
                    continue;
                }
            };

            if self.stacks.height(next.stack) > self.height_limit || !visited.insert(next) {
                continue;
            }
            if self.accepts(next) {
                tracing::debug!("accepted after {} steps", steps);
                return Outcome::Accepted;
            }
            choice_points.push(ChoicePoint {
                config: next,
                next: Choice::Shift,
            });
        }

        tracing::debug!(
            "rejected after {} steps ({} configurations)",
            steps,
            visited.len()
        );
        Outcome::Rejected
    }

    fn accepts(&self, config: Configuration) -> bool {
        self.tokens[config.index] == TerminalID::EOI
            && self
                .automaton
                .state(self.stacks.top(config.stack))
                .is_accepting()
    }

    /// Produce the next untried configuration reachable from `point` in one step.
    fn next_successor(&mut self, point: &mut ChoicePoint) -> Option<Configuration> {
        let Configuration { stack, index } = point.config;
        let state = self.automaton.state(self.stacks.top(stack));
        debug_assert!(index < self.tokens.len());

        loop {
            match point.next {
                Choice::Shift => {
                    point.next = Choice::Reduce(0);
                    if let Some(next) = state.shifts().get(&self.tokens[index]) {
                        tracing::trace!(
                            "shift {:?} -> {:?} at {}",
                            self.stacks.top(stack),
                            next,
                            index
                        );
                        return Some(Configuration {
                            stack: self.stacks.push(Some(stack), *next),
                            index: index + 1,
                        });
                    }
                }

                Choice::Reduce(i) => {
                    let production = *state.reduces().get(i)?;
                    point.next = Choice::Reduce(i + 1);

                    let production = self.automaton.grammar().production(production);
                    let base = match self.stacks.pop(stack, production.right().len()) {
                        Some(base) => base,
                        None => continue,
                    };
                    let next = match self
                        .automaton
                        .state(self.stacks.top(base))
                        .gotos()
                        .get(&production.left())
                    {
                        Some(next) => *next,
                        None => continue,
                    };
                    tracing::trace!(
                        "reduce {} -> {:?} at {}",
                        production.display(self.automaton.grammar()),
                        next,
                        index
                    );
                    return Some(Configuration {
                        stack: self.stacks.push(Some(base), next),
                        index,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn automaton(source: &str) -> Automaton {
        Automaton::construct(Grammar::from_str(source).unwrap())
    }

    #[test]
    fn stack_arena_shares_equal_stacks() {
        let mut stacks = StackArena::default();
        let s0 = StateID::START;
        let root = stacks.push(None, s0);
        let a = stacks.push(Some(root), s0);
        let b = stacks.push(Some(root), s0);
        assert_eq!(a, b);
        assert_eq!(stacks.height(a), 2);
        assert_eq!(stacks.pop(a, 1), Some(root));
        assert_eq!(stacks.pop(a, 0), Some(a));
        assert_eq!(stacks.pop(a, 2), None);
        // popping never invalidates the original handle.
        assert_eq!(stacks.height(a), 2);
    }

    #[test]
    fn reusable_parser() {
        let automaton = automaton("S -> aSb | c");
        let parser = Parser::new(&automaton);
        assert!(parser.parse("c"));
        assert!(!parser.parse("ab"));
        assert!(parser.parse("acb"));
        assert!(parser.parse("aacbb"));
        assert!(!parser.parse("aacbbb"));
    }

    #[test]
    fn height_limit_covers_accepting_runs() {
        let automaton = automaton("S -> aSb | c");
        let parser = Parser::new(&automaton);
        // |N| = 2, longest body = 3
        assert_eq!(parser.height_limit(0), 1 + (2 + 1) * 3);
        assert_eq!(parser.height_limit(5), 1 + (2 * 6 + 1) * 3);
    }

    #[test]
    fn step_limit() {
        let automaton = automaton("E -> E+E | E*E | a");
        let mut config = SearchConfig::new();
        config.max_steps(3);
        let parser = Parser::with_config(&automaton, config);
        assert!(matches!(
            parser.search("a+a*a+a*a+a"),
            Err(SearchError::StepLimitExceeded { limit: 3 })
        ));
        // `parse` ignores the limit.
        assert!(parser.parse("a+a*a+a*a+a"));

        let parser = Parser::with_config(&automaton, SearchConfig::default());
        assert!(matches!(parser.search("a+a*a"), Ok(true)));
        assert!(matches!(parser.search("a+*a"), Ok(false)));

        let mut config = SearchConfig::new();
        config.max_steps(3).unbounded();
        let parser = Parser::with_config(&automaton, config);
        assert!(matches!(parser.search("a+a*a+a*a+a"), Ok(true)));
    }

    #[test]
    fn step_limit_cuts_exponential_search() {
        // ε と左再帰が混在すると探索するスタックの数が指数的に増える
        let automaton = automaton("S -> AAb | ε | SAS\nA -> Bb | Sb\nB -> aA");
        let parser = Parser::new(&automaton);
        assert!(parser.parse(""));
        assert!(parser.parse("b"));
        assert!(!parser.parse("a"));

        let mut config = SearchConfig::new();
        config.max_steps(10_000);
        let parser = Parser::with_config(&automaton, config);
        assert!(matches!(
            parser.search("aaaaaaaa"),
            Err(SearchError::StepLimitExceeded { limit: 10_000 })
        ));
    }
}
