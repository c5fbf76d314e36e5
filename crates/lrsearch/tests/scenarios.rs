use lrsearch::{
    grammar::{Grammar, GrammarDefError},
    lr0::Automaton,
    parser::Parser,
};

fn automaton(source: &str) -> Automaton {
    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .try_init();
    let grammar = Grammar::from_str(source).unwrap();
    Automaton::construct(grammar)
}

macro_rules! define_tests {
    ($($name:ident: $grammar:expr => { accept: [$($ok:expr),*$(,)?], reject: [$($ng:expr),*$(,)?] $(,)? }),*$(,)?) => {$(
        #[test]
        fn $name() {
            let automaton = automaton($grammar);
            let parser = Parser::new(&automaton);
            $(
                assert!(parser.parse($ok), "{:?} should be accepted", $ok);
            )*
            $(
                assert!(!parser.parse($ng), "{:?} should be rejected", $ng);
            )*
        }
    )*};
}

define_tests! {
    balanced: "S -> aSb | c" => {
        accept: ["c", "acb", "aacbb"],
        reject: ["aacb", "", "ab", "acbb", "cc"],
    },

    chained_nonterminals: "S -> aSb | A1\nA1 -> aA1 | A2\nA2 -> cA2 | b" => {
        accept: ["aaaaaacbb", "b", "ab", "cb", "aacccbb"],
        reject: ["", "a", "bb", "ba", "bcb"],
    },

    single_terminal: "S -> c" => {
        accept: ["c"],
        reject: ["cc", "", "a"],
    },

    // the textbook source, with a shift/reduce conflict in the state after `a`.
    conflicting: "S -> aSb | A | c\nA -> aA | cb" => {
        accept: ["aaaaaacbb", "c", "acb", "aacb", "cb"],
        reject: ["", "ab", "aacbbbb", "cbc"],
    },

    left_recursive_start: "S -> Sa | a" => {
        accept: ["a", "aa", "aaaa"],
        reject: ["", "b", "ab"],
    },

    ambiguous: "E -> E+E | E*E | (E) | a" => {
        accept: ["a", "a+a", "a+a*a", "(a+a)*a", "a*(a+a*a)+a"],
        reject: ["", "+", "a+", "(a", "a)+a", "aa"],
    },

    reduce_reduce: "S -> A | B\nA -> x\nB -> x" => {
        accept: ["x"],
        reject: ["", "xx"],
    },

    epsilon: "S -> aSb | ε" => {
        accept: ["", "ab", "aabb", "aaabbb"],
        reject: ["a", "b", "aab", "abb", "ba"],
    },

    nullable_prefix: "S -> ASb | c\nA -> ε" => {
        accept: ["c", "cb", "cbbb"],
        reject: ["", "b", "bc"],
    },

    nullable_loop: "S -> SB | a\nB -> ε" => {
        accept: ["a"],
        reject: ["", "aa"],
    },

    unit_cycle: "S -> A | a\nA -> S" => {
        accept: ["a"],
        reject: ["", "aa"],
    },

    dollar_is_an_ordinary_terminal: "S -> $S | x" => {
        accept: ["x", "$x", "$$x"],
        reject: ["", "$", "x$"],
    },

    arithmetic: "E -> E+T | E-T | T\nT -> T*F | T/F | F\nF -> (E) | n" => {
        accept: ["n", "n+n", "n*(n-n)/n", "((n))"],
        reject: ["", "n+", "(n", "n n", "n*/n"],
    },
}

#[test]
fn construct_and_parse() {
    let automaton = lrsearch::construct([
        ("S", vec!["a", "S", "b"]),
        ("S", vec!["A1"]),
        ("A1", vec!["a", "A1"]),
        ("A1", vec!["A2"]),
        ("A2", vec!["c", "A2"]),
        ("A2", vec!["b"]),
    ])
    .unwrap();
    assert!(lrsearch::parse(&automaton, "aaaaaacbb"));
    assert!(!lrsearch::parse(&automaton, ""));
}

#[test]
fn construct_rejects_unknown_symbols() {
    let err = lrsearch::construct([("S", vec!["a", "S", "b"]), ("S", vec!["C"])]).unwrap_err();
    assert!(matches!(err, GrammarDefError::UnknownSymbol { .. }));

    let err = Grammar::from_str("S -> aB").unwrap_err();
    assert!(matches!(err, GrammarDefError::UnknownSymbol { .. }));

    let err = Grammar::from_str("S aSb").unwrap_err();
    assert!(matches!(err, GrammarDefError::Syntax(..)));
}

#[test]
fn parser_is_independent_per_call() {
    let automaton = automaton("E -> E+E | a");
    let parser = Parser::new(&automaton);
    let inputs = ["a+a", "a+", "a", "+a", "a+a+a"];
    let first: Vec<bool> = inputs.iter().map(|s| parser.parse(s)).collect();
    let second: Vec<bool> = inputs.iter().rev().map(|s| parser.parse(s)).collect();
    assert_eq!(first, [true, false, true, false, true]);
    assert_eq!(first.into_iter().rev().collect::<Vec<_>>(), second);
}

#[test]
fn automaton_is_shareable_across_threads() {
    let automaton = automaton("S -> aSb | c");
    std::thread::scope(|scope| {
        for input in ["c", "acb", "aacbb"] {
            let automaton = &automaton;
            scope.spawn(move || assert!(lrsearch::parse(automaton, input)));
        }
    });
}

#[test]
fn long_inputs_do_not_overflow_the_call_stack() {
    let automaton = automaton("S -> aSb | c");
    let depth = 20_000;
    let input = format!("{}c{}", "a".repeat(depth), "b".repeat(depth));
    assert!(lrsearch::parse(&automaton, &input));
    let input = format!("{}c{}", "a".repeat(depth), "b".repeat(depth - 1));
    assert!(!lrsearch::parse(&automaton, &input));
}

/// Brute-force membership check by enumerating leftmost derivations.
fn derivable(grammar: &Grammar, input: &str, max_len: usize) -> bool {
    use lrsearch::grammar::SymbolID;
    use std::collections::HashSet;

    let target: Vec<_> = input
        .chars()
        .map(|ch| grammar.terminal_id(ch))
        .collect::<Option<_>>()
        .unwrap_or_default();
    if target.len() != input.chars().count() {
        return false;
    }

    let mut seen = HashSet::new();
    let mut pending = vec![vec![SymbolID::N(grammar.start_symbol)]];
    while let Some(form) = pending.pop() {
        if !seen.insert(form.clone()) {
            continue;
        }
        let terminals = form
            .iter()
            .filter(|s| matches!(s, SymbolID::T(_)))
            .count();
        if terminals > target.len() || form.len() > max_len {
            continue;
        }
        let pos = match form.iter().position(|s| matches!(s, SymbolID::N(_))) {
            Some(pos) => pos,
            None => {
                if form
                    .iter()
                    .map(|s| match s {
                        SymbolID::T(t) => Some(*t),
                        SymbolID::N(_) => None,
                    })
                    .eq(target.iter().copied().map(Some))
                {
                    return true;
                }
                continue;
            }
        };
        // the terminal prefix must match the input.
        let prefix_ok = form[..pos]
            .iter()
            .zip(&target)
            .all(|(s, t)| *s == SymbolID::T(*t));
        if !prefix_ok || pos > target.len() {
            continue;
        }
        let n = match form[pos] {
            SymbolID::N(n) => n,
            SymbolID::T(_) => continue,
        };
        for production in grammar.productions_of(n) {
            let mut next = form[..pos].to_vec();
            next.extend_from_slice(production.right());
            next.extend_from_slice(&form[pos + 1..]);
            pending.push(next);
        }
    }
    false
}

#[test]
fn agrees_with_brute_force_derivations() {
    let sources = [
        "S -> aSb | c",
        "S -> aSb | A1\nA1 -> aA1 | A2\nA2 -> cA2 | b",
        "E -> E+E | a",
        "S -> (S)S | ε",
        "S -> aSa | bSb | a | b | ε",
    ];
    for source in sources {
        let automaton = automaton(source);
        let grammar = Grammar::from_str(source).unwrap();
        let alphabet: Vec<char> = grammar.terminals.values().filter_map(|t| t.ch()).collect();

        // every string over the alphabet up to length 5.
        let mut inputs = vec![String::new()];
        let mut frontier = vec![String::new()];
        for _ in 0..5 {
            let mut next = vec![];
            for prefix in &frontier {
                for ch in &alphabet {
                    let mut s = prefix.clone();
                    s.push(*ch);
                    next.push(s);
                }
            }
            inputs.extend(next.iter().cloned());
            frontier = next;
        }

        for input in &inputs {
            let expected = derivable(&grammar, input, 12);
            assert_eq!(
                lrsearch::parse(&automaton, input),
                expected,
                "grammar {:?}, input {:?}",
                source,
                input
            );
        }
    }
}
