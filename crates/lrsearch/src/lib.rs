//! A backtracking shift-reduce recognizer for arbitrary context-free grammars.
//!
//! The grammar is compiled into its canonical LR(0) automaton, which is then
//! walked by an exhaustive depth-first search trying every shift and every
//! reduction. No lookahead is computed and conflicts are never reported, so
//! ambiguous grammars are accepted as they are.
//!
//! ```
//! let automaton = lrsearch::construct([
//!     ("S", vec!["a", "S", "b"]),
//!     ("S", vec!["c"]),
//! ])
//! .unwrap();
//! assert!(lrsearch::parse(&automaton, "aacbb"));
//! assert!(!lrsearch::parse(&automaton, "aacb"));
//! ```

pub mod grammar;
pub mod lr0;
pub mod parser;
pub mod syntax;
pub mod types;
pub mod util;

use crate::{
    grammar::{Grammar, GrammarDefError},
    lr0::Automaton,
    parser::Parser,
};

/// Build the automaton from a list of `(head, body)` pairs.
///
/// See `Grammar::from_rules` for how body symbols are classified.
pub fn construct<I, L, R>(rules: I) -> Result<Automaton, GrammarDefError>
where
    I: IntoIterator<Item = (L, R)>,
    L: AsRef<str>,
    R: IntoIterator,
    R::Item: AsRef<str>,
{
    let grammar = Grammar::from_rules(rules)?;
    Ok(Automaton::construct(grammar))
}

/// Return whether `input` is derivable from the start symbol of the automaton's grammar.
pub fn parse(automaton: &Automaton, input: &str) -> bool {
    Parser::new(automaton).parse(input)
}
