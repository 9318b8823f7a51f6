//! A minimal interpreter for the hashcat mutation rule language.
//!
//! Rules are tokenized up front into [`RuleOp`]s with their parameters
//! embedded in the variant, then interpreted left to right. A consumed
//! parameter can therefore never be misread as an opcode.

use indexmap::IndexSet;
use tracing::debug;

/// The deduplicated, insertion-ordered set of candidates produced by
/// applying a rule set to one word. The bare word is always the first
/// member.
pub type CandidateSet = IndexSet<String>;

/// One string transformation step of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    /// `:` do nothing.
    Noop,
    /// `l` lowercase the whole word.
    Lowercase,
    /// `u` uppercase the whole word.
    Uppercase,
    /// `c` capitalize the first character, lowercase the rest.
    Capitalize,
    /// `C` lowercase the first character, uppercase the rest.
    InvertCapitalize,
    /// `t` toggle the case of every character.
    ToggleCase,
    /// `r` reverse the word.
    Reverse,
    /// `d` duplicate the word.
    Duplicate,
    /// `f` append the reversed word.
    Reflect,
    /// `p N` prepend a copy of the first N characters.
    DuplicateFront(usize),
    /// `$ X` append X.
    Append(char),
    /// `^ X` prepend X.
    Prepend(char),
    /// `[` delete the first character.
    DeleteFirst,
    /// `]` delete the last character.
    DeleteLast,
    /// `D N` delete the character at position N.
    DeleteAt(usize),
    /// `x P L` keep only the substring of length L starting at P.
    Extract(usize, usize),
    /// `i N X` insert X at position N.
    Insert(usize, char),
    /// `o N X` overwrite the character at position N with X.
    Overwrite(usize, char),
    /// `s X Y` replace every X with Y.
    Replace(char, char),
    /// `@ X` delete every X.
    Purge(char),
}

/// A parsed rule: the ordered transformation steps of one rule-file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    source: String,
    ops: Vec<RuleOp>,
}

/// A rule line that could not be tokenized, with the offending source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRule(pub String);

impl Rule {
    /// Tokenizes a single rule line.
    ///
    /// Unrecognized opcodes and whitespace between opcodes are skipped
    /// silently, so unsupported hashcat extensions don't invalidate a
    /// whole rule file. A missing parameter makes the rule malformed.
    pub fn parse(line: &str) -> Result<Self, MalformedRule> {
        let mut ops = Vec::new();
        let mut chars = line.chars();

        let malformed = || MalformedRule(line.to_owned());

        while let Some(op) = chars.next() {
            let op = match op {
                ':' => RuleOp::Noop,
                'l' => RuleOp::Lowercase,
                'u' => RuleOp::Uppercase,
                'c' => RuleOp::Capitalize,
                'C' => RuleOp::InvertCapitalize,
                't' => RuleOp::ToggleCase,
                'r' => RuleOp::Reverse,
                'd' => RuleOp::Duplicate,
                'f' => RuleOp::Reflect,
                'p' => RuleOp::DuplicateFront(position(&mut chars).ok_or_else(malformed)?),
                '$' => RuleOp::Append(chars.next().ok_or_else(malformed)?),
                '^' => RuleOp::Prepend(chars.next().ok_or_else(malformed)?),
                '[' => RuleOp::DeleteFirst,
                ']' => RuleOp::DeleteLast,
                'D' => RuleOp::DeleteAt(position(&mut chars).ok_or_else(malformed)?),
                'x' => {
                    let p = position(&mut chars).ok_or_else(malformed)?;
                    let l = position(&mut chars).ok_or_else(malformed)?;
                    RuleOp::Extract(p, l)
                }
                'i' => {
                    let n = position(&mut chars).ok_or_else(malformed)?;
                    let x = chars.next().ok_or_else(malformed)?;
                    RuleOp::Insert(n, x)
                }
                'o' => {
                    let n = position(&mut chars).ok_or_else(malformed)?;
                    let x = chars.next().ok_or_else(malformed)?;
                    RuleOp::Overwrite(n, x)
                }
                's' => {
                    let x = chars.next().ok_or_else(malformed)?;
                    let y = chars.next().ok_or_else(malformed)?;
                    RuleOp::Replace(x, y)
                }
                '@' => RuleOp::Purge(chars.next().ok_or_else(malformed)?),
                // whitespace separates ops, anything else is an
                // unsupported extension
                _ => continue,
            };

            ops.push(op);
        }

        Ok(Self {
            source: line.trim().to_owned(),
            ops,
        })
    }

    /// Applies every op of this rule to `word`, in order.
    pub fn apply(&self, word: &str) -> String {
        self.ops.iter().fold(word.to_owned(), |word, op| op.apply(&word))
    }

    /// The trimmed source line this rule was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Reads a positional parameter: a base-36 digit (`0-9`, `A-Z`, `a-z`),
/// the hashcat position encoding.
fn position(chars: &mut std::str::Chars<'_>) -> Option<usize> {
    chars.next()?.to_digit(36).map(|d| d as usize)
}

impl RuleOp {
    /// Applies this single op to `word`.
    pub fn apply(&self, word: &str) -> String {
        match *self {
            RuleOp::Noop => word.to_owned(),
            RuleOp::Lowercase => word.to_lowercase(),
            RuleOp::Uppercase => word.to_uppercase(),
            RuleOp::Capitalize => {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => {
                        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                    }
                }
            }
            RuleOp::InvertCapitalize => {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => {
                        first.to_lowercase().chain(chars.flat_map(char::to_uppercase)).collect()
                    }
                }
            }
            RuleOp::ToggleCase => word
                .chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else {
                        c.to_uppercase().collect()
                    }
                })
                .collect(),
            RuleOp::Reverse => word.chars().rev().collect(),
            RuleOp::Duplicate => format!("{word}{word}"),
            RuleOp::Reflect => {
                let mut out = word.to_owned();
                out.extend(word.chars().rev());
                out
            }
            RuleOp::DuplicateFront(n) => {
                let mut out: String = word.chars().take(n).collect();
                out.push_str(word);
                out
            }
            RuleOp::Append(x) => {
                let mut out = word.to_owned();
                out.push(x);
                out
            }
            RuleOp::Prepend(x) => {
                let mut out = String::with_capacity(word.len() + x.len_utf8());
                out.push(x);
                out.push_str(word);
                out
            }
            RuleOp::DeleteFirst => word.chars().skip(1).collect(),
            RuleOp::DeleteLast => {
                let mut chars: Vec<char> = word.chars().collect();
                chars.pop();
                chars.into_iter().collect()
            }
            RuleOp::DeleteAt(n) => word
                .chars()
                .enumerate()
                .filter(|&(i, _)| i != n)
                .map(|(_, c)| c)
                .collect(),
            RuleOp::Extract(p, l) => word.chars().skip(p).take(l).collect(),
            RuleOp::Insert(n, x) => {
                let chars: Vec<char> = word.chars().collect();
                let n = n.min(chars.len());
                let mut out: String = chars[..n].iter().collect();
                out.push(x);
                out.extend(&chars[n..]);
                out
            }
            RuleOp::Overwrite(n, x) => word
                .chars()
                .enumerate()
                .map(|(i, c)| if i == n { x } else { c })
                .collect(),
            RuleOp::Replace(x, y) => {
                word.chars().map(|c| if c == x { y } else { c }).collect()
            }
            RuleOp::Purge(x) => word.chars().filter(|&c| c != x).collect(),
        }
    }
}

/// An ordered set of rules parsed from a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Parses a rule file: one rule per line, empty lines and `#` comments
    /// ignored. Malformed rules are dropped with a debug log instead of
    /// invalidating the rest of the file.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match Rule::parse(line) {
                Ok(rule) => rules.push(rule),
                Err(MalformedRule(source)) => {
                    debug!(rule = source.as_str(), "dropping malformed rule");
                }
            }
        }

        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Expands one word into its candidate set: the bare word first, then
    /// every rule's output in rule order, exact duplicates collapsed.
    ///
    /// Each rule applies to the original word, never to another rule's
    /// output.
    pub fn expand(&self, word: &str) -> CandidateSet {
        let mut candidates = CandidateSet::with_capacity(self.rules.len() + 1);
        candidates.insert(word.to_owned());

        for rule in &self.rules {
            candidates.insert(rule.apply(word));
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    fn apply(rule: &str, word: &str) -> String {
        Rule::parse(rule).unwrap().apply(word)
    }

    #[test]
    fn test_case_ops() {
        assert_eq!("p@ssw0rd", apply(":", "p@ssw0rd"));
        assert_eq!("password", apply("l", "PassWord"));
        assert_eq!("PASSWORD", apply("u", "password"));
        assert_eq!("Password", apply("c", "pASSWORD"));
        assert_eq!("pASSWORD", apply("C", "Password"));
        assert_eq!("PaSSword", apply("t", "pAssWORD"));
    }

    #[test]
    fn test_shape_ops() {
        assert_eq!("drow", apply("r", "word"));
        assert_eq!("wordword", apply("d", "word"));
        assert_eq!("worddrow", apply("f", "word"));
        assert_eq!("woword", apply("p2", "word"));
        assert_eq!("wordword", apply("p9", "word"));
    }

    #[test]
    fn test_edit_ops() {
        assert_eq!("word1", apply("$1", "word"));
        assert_eq!("1word", apply("^1", "word"));
        assert_eq!("ord", apply("[", "word"));
        assert_eq!("wor", apply("]", "word"));
        assert_eq!("wrd", apply("D1", "word"));
        assert_eq!("word", apply("D7", "word"));
        assert_eq!("or", apply("x12", "word"));
        assert_eq!("", apply("x71", "word"));
        assert_eq!("w-ord", apply("i1-", "word"));
        assert_eq!("word!", apply("i9!", "word"));
        assert_eq!("w0rd", apply("o10", "word"));
        assert_eq!("word", apply("o70", "word"));
        assert_eq!("wxrd", apply("sox", "word"));
        assert_eq!("wrd", apply("@o", "word"));
    }

    #[test]
    fn test_ops_chain_within_a_rule() {
        // every op sees the previous op's output
        assert_eq!("DROW1", apply("u r $1", "word"));
        assert_eq!("Password1!", apply("c $1 $!", "pASSWORD"));
    }

    #[test]
    fn test_base36_positions() {
        let word = "abcdefghijklmnop";
        assert_eq!("abcdefghijklmnp", apply("DE", word));
        assert_eq!("abcdefghijklmnp", apply("De", word));
    }

    #[test]
    fn test_params_are_never_opcodes() {
        // 'u' is the parameter of '$', not an uppercase op
        assert_eq!("wordu", apply("$u", "word"));
        // 'l' is the parameter of '^'
        assert_eq!("lword", apply("^l", "word"));
        // 'r' is the replacement of 's'
        assert_eq!("rord", apply("swr", "word"));
    }

    #[test]
    fn test_unrecognized_opcodes_skipped() {
        // 'q' and 'Z' are not supported, the rest of the rule still runs
        assert_eq!("WORD", apply("quZ", "word"));
    }

    #[test]
    fn test_malformed_rule_dropped() {
        assert!(Rule::parse("$").is_err());
        assert!(Rule::parse("u s1").is_err());
        assert!(Rule::parse("x5").is_err());

        // the surrounding file still parses
        let set = RuleSet::parse("u\n$\nl\n");
        assert_eq!(2, set.len());
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let set = RuleSet::parse("# common mutations\n\n:\nu\n  \n$1\n");
        let sources = set.rules().iter().map(Rule::source).collect_vec();
        assert_eq!(vec![":", "u", "$1"], sources);
    }

    #[test]
    fn test_expand_includes_original_first() {
        let set = RuleSet::parse("u\n$1\n");
        let candidates = set.expand("word").into_iter().collect_vec();

        assert_eq!(vec!["word", "WORD", "word1"], candidates);
    }

    #[test]
    fn test_expand_deduplicates() {
        // ':' and 'l' both reproduce an already lowercase word
        let set = RuleSet::parse(":\nl\nu\n");
        let candidates = set.expand("word").into_iter().collect_vec();

        assert_eq!(vec!["word", "WORD"], candidates);
    }

    #[test]
    fn test_expand_is_deterministic() {
        let set = RuleSet::parse("u\nr\nd\n$!\n");

        let first = set.expand("secret").into_iter().collect_vec();
        for _ in 0..10 {
            assert_eq!(first, set.expand("secret").into_iter().collect_vec());
        }
    }

    #[test]
    fn test_rules_apply_independently() {
        // "$1" then "]" both start from "abc": no chaining between rules
        let set = RuleSet::parse("$1\n]\n");
        let candidates = set.expand("abc").into_iter().collect_vec();

        assert_eq!(vec!["abc", "abc1", "ab"], candidates);
    }

    #[test]
    fn test_empty_word_edge_cases() {
        assert_eq!("", apply("[", ""));
        assert_eq!("", apply("]", ""));
        assert_eq!("", apply("c", ""));
        assert_eq!("1", apply("$1", ""));
        assert_eq!("", apply("d", ""));
    }
}
