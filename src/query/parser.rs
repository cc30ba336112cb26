//! Query parser for turning query strings into [`Query`] trees.
//!
//! Supported syntax:
//! - Terms: `hello`, run through the parser's analyzer
//! - Fields: `title:hello`, `title|body:hello`, `title:(quick fox)`, `*:hello`
//! - Required and prohibited clauses: `+quick -slow`, `!slow`
//! - Boolean keywords: `quick AND fox`, `quick OR fox`, `NOT slow`, `&&`, `||`
//! - Phrases: `"quick fox"`, `"quick <> fox"`, `"quick|fast fox"`, `"quick fox"~2`
//! - Wildcards and prefixes: `qu?ck`, `qui*`, `*` for every document
//! - Fuzzy terms: `quick~`, `quick~0.8`
//! - Ranges: `[a TO c]`, `{a TO c]`, `[a TO *]`, `>=a`, `<c`
//! - Boosts: `quick^2`, `(quick fox)^0.5`
//!
//! Special characters are taken literally after a backslash.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::Token;
use crate::error::{GlaiveError, Result};
use crate::query::Query;
use crate::query::boolean::{BooleanQuery, Occur};
use crate::query::fuzzy::{DEFAULT_MIN_SIMILARITY, DEFAULT_PREFIX_LENGTH, FuzzyQuery};
use crate::query::match_all::MatchAllQuery;
use crate::query::phrase::PhraseQuery;
use crate::query::prefix::PrefixQuery;
use crate::query::range::{Bound, RangeQuery};
use crate::query::term::TermQuery;
use crate::query::wildcard::WildcardQuery;

/// Query parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Clauses without an operator are optional when true, required when false.
    pub or_default: bool,

    /// Lowercase wildcard and prefix patterns, which are not analyzed.
    pub wildcard_lowercase: bool,

    /// On a syntax error, retry with the special characters stripped instead
    /// of failing.
    pub handle_parse_errors: bool,

    /// Similarity used by `term~` without an explicit value.
    pub fuzzy_min_similarity: f32,

    /// Prefix length of parsed fuzzy queries.
    pub fuzzy_prefix_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            or_default: true,
            wildcard_lowercase: true,
            handle_parse_errors: false,
            fuzzy_min_similarity: DEFAULT_MIN_SIMILARITY,
            fuzzy_prefix_length: DEFAULT_PREFIX_LENGTH,
        }
    }
}

/// Parses query strings against one or more default fields.
#[derive(Clone)]
pub struct QueryParser {
    default_fields: Vec<String>,
    analyzer: Arc<dyn Analyzer>,
    config: ParserConfig,
}

impl QueryParser {
    pub fn new<F: Into<String>>(default_field: F, analyzer: Arc<dyn Analyzer>) -> Self {
        QueryParser {
            default_fields: vec![default_field.into()],
            analyzer,
            config: ParserConfig::default(),
        }
    }

    /// A parser searching every field of `fields` when a clause names none.
    pub fn with_default_fields<I, F>(fields: I, analyzer: Arc<dyn Analyzer>) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        let default_fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if default_fields.is_empty() {
            return Err(GlaiveError::invalid_argument(
                "a query parser needs at least one default field",
            ));
        }
        Ok(QueryParser {
            default_fields,
            analyzer,
            config: ParserConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_fields(&self) -> &[String] {
        &self.default_fields
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `query_str`. An empty string parses to a query matching nothing.
    pub fn parse(&self, query_str: &str) -> Result<Query> {
        self.parse_in(&self.default_fields, query_str)
    }

    /// Parse `query_str` with `field` standing in for the default fields.
    pub fn parse_field(&self, field: &str, query_str: &str) -> Result<Query> {
        self.parse_in(&[field.to_string()], query_str)
    }

    fn parse_in(&self, fields: &[String], query_str: &str) -> Result<Query> {
        match QueryStringParser::new(self, query_str).parse(fields) {
            Ok(query) => {
                debug!("parsed {query_str:?} into {query}");
                Ok(query)
            }
            Err(e) if self.config.handle_parse_errors => {
                warn!("failed to parse {query_str:?} ({e}), retrying as plain terms");
                QueryStringParser::new(self, &strip_special(query_str)).parse(fields)
            }
            Err(e) => Err(e),
        }
    }

    fn tokens(&self, field: &str, text: &str) -> Result<Vec<Token>> {
        Ok(self.analyzer.token_stream(field, text)?.collect())
    }
}

impl fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryParser")
            .field("default_fields", &self.default_fields)
            .field("config", &self.config)
            .finish()
    }
}

fn is_special(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '(' | ')' | '"' | '[' | ']' | '{' | '}' | '^' | '~' | ':'
        )
}

/// Replace every character with a syntactic meaning by a space.
fn strip_special(query_str: &str) -> String {
    query_str
        .chars()
        .map(|c| {
            if is_special(c) || matches!(c, '+' | '-' | '!' | '*' | '?' | '|' | '&' | '<' | '>' | '\\')
            {
                ' '
            } else {
                c
            }
        })
        .collect()
}

fn syntax_error<S: AsRef<str>>(msg: S) -> GlaiveError {
    GlaiveError::invalid_argument(format!("query syntax error: {}", msg.as_ref()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    And,
    Or,
    Not,
}

#[derive(Debug)]
struct ParsedClause {
    query: Query,
    occur: Occur,
    /// Set by `+`, `-` or `!`; keywords never override it.
    explicit: bool,
}

/// Build one query per field and join them as alternatives.
fn per_field<F>(fields: &[String], mut build: F) -> Result<Option<Query>>
where
    F: FnMut(&str) -> Result<Option<Query>>,
{
    let mut queries = Vec::with_capacity(fields.len());
    for field in fields {
        if let Some(query) = build(field)? {
            queries.push(query);
        }
    }
    if queries.len() <= 1 {
        return Ok(queries.pop());
    }
    let mut alternatives = BooleanQuery::new();
    for query in queries {
        alternatives.add_clause(query, Occur::Should);
    }
    Ok(Some(alternatives.into()))
}

struct QueryStringParser<'a> {
    parser: &'a QueryParser,
    chars: Peekable<Chars<'a>>,
}

impl<'a> QueryStringParser<'a> {
    fn new(parser: &'a QueryParser, query_str: &'a str) -> Self {
        QueryStringParser {
            parser,
            chars: query_str.chars().peekable(),
        }
    }

    fn parse(&mut self, fields: &[String]) -> Result<Query> {
        let query = self.parse_clauses(fields)?;
        self.skip_whitespace();
        if let Some(c) = self.chars.peek() {
            return Err(syntax_error(format!("unexpected '{c}'")));
        }
        Ok(query.unwrap_or_else(|| BooleanQuery::new().into()))
    }

    /// Clauses up to the end of input or a closing parenthesis.
    fn parse_clauses(&mut self, fields: &[String]) -> Result<Option<Query>> {
        let default_occur = if self.parser.config.or_default {
            Occur::Should
        } else {
            Occur::Must
        };
        let mut clauses: Vec<ParsedClause> = Vec::new();
        let mut next_occur: Option<Occur> = None;

        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                None | Some(')') => break,
                _ => {}
            }

            if let Some(keyword) = self.keyword() {
                match keyword {
                    Keyword::And => {
                        if let Some(last) = clauses.last_mut() {
                            if !last.explicit {
                                last.occur = Occur::Must;
                            }
                        }
                        next_occur = Some(Occur::Must);
                    }
                    Keyword::Or => {
                        if let Some(last) = clauses.last_mut() {
                            if !last.explicit {
                                last.occur = Occur::Should;
                            }
                        }
                        next_occur = Some(Occur::Should);
                    }
                    Keyword::Not => next_occur = Some(Occur::MustNot),
                }
                continue;
            }

            let explicit = match self.chars.peek() {
                Some('+') => Some(Occur::Must),
                Some('-' | '!') => Some(Occur::MustNot),
                _ => None,
            };
            if explicit.is_some() {
                self.chars.next();
            }

            let query = self.parse_clause(fields)?;
            let occur = explicit.or(next_occur.take()).unwrap_or(default_occur);
            if let Some(query) = query {
                clauses.push(ParsedClause {
                    query,
                    occur,
                    explicit: explicit.is_some(),
                });
            }
        }

        Ok(match clauses.len() {
            0 => None,
            1 if clauses[0].occur != Occur::MustNot => clauses.pop().map(|c| c.query),
            _ => {
                let mut boolean = BooleanQuery::new();
                for clause in clauses {
                    boolean.add_clause(clause.query, clause.occur);
                }
                Some(boolean.into())
            }
        })
    }

    fn parse_clause(&mut self, fields: &[String]) -> Result<Option<Query>> {
        let named = self.field_prefix();
        let fields = named.as_deref().unwrap_or(fields);

        let query = match self.chars.peek() {
            Some('(') => {
                self.chars.next();
                let inner = self.parse_clauses(fields)?;
                self.skip_whitespace();
                if self.chars.next() != Some(')') {
                    return Err(syntax_error("missing closing parenthesis"));
                }
                inner
            }
            Some('"') => self.parse_phrase(fields)?,
            Some('[' | '{') => self.parse_range(fields)?,
            Some('<' | '>') => self.parse_open_range(fields)?,
            _ => self.parse_word(fields)?,
        };

        match self.parse_boost()? {
            Some(boost) => Ok(query.map(|q| q.with_boost(boost))),
            None => Ok(query),
        }
    }

    /// Consume `name:` or `a|b:` when the input starts with one.
    fn field_prefix(&mut self) -> Option<Vec<String>> {
        let mut look = self.chars.clone();
        let mut name = String::new();
        loop {
            match look.next() {
                Some(':') => break,
                Some('\\') | None => return None,
                Some(c) if is_special(c) => return None,
                Some(c) => name.push(c),
            }
        }
        if name.is_empty() {
            return None;
        }
        for _ in 0..=name.chars().count() {
            self.chars.next();
        }

        if name == "*" {
            return Some(self.parser.default_fields.clone());
        }
        let fields: Vec<String> = name
            .split('|')
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        (!fields.is_empty()).then_some(fields)
    }

    fn keyword(&mut self) -> Option<Keyword> {
        let word: String = self
            .chars
            .clone()
            .take_while(|&c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"'))
            .collect();
        let keyword = match word.as_str() {
            "AND" | "&&" => Keyword::And,
            "OR" | "||" => Keyword::Or,
            "NOT" => Keyword::Not,
            _ => return None,
        };
        for _ in 0..word.len() {
            self.chars.next();
        }
        Some(keyword)
    }

    fn parse_word(&mut self, fields: &[String]) -> Result<Option<Query>> {
        let (word, wild) = self.read_word()?;
        let parser = self.parser;
        let config = &parser.config;

        if self.chars.peek() == Some(&'~') {
            self.chars.next();
            let min_similarity = match self.read_number() {
                Some(number) => number
                    .parse::<f32>()
                    .map_err(|_| syntax_error(format!("bad similarity {number}")))?,
                None => config.fuzzy_min_similarity,
            };
            return per_field(fields, |field| {
                let Some(token) = parser.tokens(field, &word)?.into_iter().next() else {
                    return Ok(None);
                };
                let fuzzy = FuzzyQuery::new(field, token.text)
                    .with_min_similarity(min_similarity)?
                    .with_prefix_length(config.fuzzy_prefix_length);
                Ok(Some(fuzzy.into()))
            });
        }

        if wild {
            if word == "*" {
                return Ok(Some(MatchAllQuery::new().into()));
            }
            let pattern = if config.wildcard_lowercase {
                word.to_lowercase()
            } else {
                word
            };
            let stem = pattern.strip_suffix('*').filter(|s| !s.contains(['*', '?']));
            return per_field(fields, |field| {
                Ok(Some(match stem {
                    Some(stem) => PrefixQuery::new(field, stem).into(),
                    None => WildcardQuery::new(field, pattern.as_str()).into(),
                }))
            });
        }

        per_field(fields, |field| {
            let mut tokens = parser.tokens(field, &word)?;
            Ok(match tokens.len() {
                0 => None,
                1 => tokens
                    .pop()
                    .map(|token| TermQuery::new(field, token.text).into()),
                _ => Some(PhraseQuery::from_tokens(field, tokens).into()),
            })
        })
    }

    fn parse_phrase(&mut self, fields: &[String]) -> Result<Option<Query>> {
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some(c) => text.push(c),
                    None => return Err(syntax_error("unterminated phrase")),
                },
                Some(c) => text.push(c),
                None => return Err(syntax_error("unterminated phrase")),
            }
        }

        let mut slop = 0;
        if self.chars.peek() == Some(&'~') {
            self.chars.next();
            let number = self
                .read_number()
                .ok_or_else(|| syntax_error("phrase slop needs a number"))?;
            slop = number
                .parse::<u32>()
                .map_err(|_| syntax_error(format!("bad phrase slop {number}")))?;
        }

        let parser = self.parser;
        per_field(fields, |field| {
            let phrase = phrase_query(parser, field, &text)?;
            let single = match phrase.positions() {
                [only] if only.terms.len() == 1 => Some(only.terms[0].clone()),
                _ => None,
            };
            Ok(match single {
                Some(text) => Some(TermQuery::new(field, text).into()),
                None if phrase.is_empty() => None,
                None => Some(phrase.with_slop(slop).into()),
            })
        })
    }

    fn parse_range(&mut self, fields: &[String]) -> Result<Option<Query>> {
        let include_lower = self.chars.next() == Some('[');
        let mut body = String::new();
        let include_upper = loop {
            match self.chars.next() {
                Some(']') => break true,
                Some('}') => break false,
                Some(c) => body.push(c),
                None => return Err(syntax_error("unterminated range")),
            }
        };

        let parts: Vec<&str> = body.split_whitespace().filter(|p| *p != "TO").collect();
        let [lower, upper] = parts.as_slice() else {
            return Err(syntax_error(format!("range [{body}] needs two bounds")));
        };
        let bound = |value: &str, inclusive: bool| match value {
            "*" => Bound::Unbounded,
            _ if inclusive => Bound::Included(value.to_string()),
            _ => Bound::Excluded(value.to_string()),
        };
        let lower = bound(*lower, include_lower);
        let upper = bound(*upper, include_upper);

        per_field(fields, |field| {
            Ok(Some(
                RangeQuery::new(field, lower.clone(), upper.clone())?.into(),
            ))
        })
    }

    fn parse_open_range(&mut self, fields: &[String]) -> Result<Option<Query>> {
        let less = self.chars.next() == Some('<');
        let inclusive = self.chars.peek() == Some(&'=');
        if inclusive {
            self.chars.next();
        }
        let (value, _) = self.read_word()?;

        per_field(fields, |field| {
            let range = match (less, inclusive) {
                (true, true) => RangeQuery::less_than_or_equal(field, value.as_str()),
                (true, false) => RangeQuery::less_than(field, value.as_str()),
                (false, true) => RangeQuery::greater_than_or_equal(field, value.as_str()),
                (false, false) => RangeQuery::greater_than(field, value.as_str()),
            };
            Ok(Some(range.into()))
        })
    }

    fn parse_boost(&mut self) -> Result<Option<f32>> {
        if self.chars.peek() != Some(&'^') {
            return Ok(None);
        }
        self.chars.next();
        let number = self
            .read_number()
            .ok_or_else(|| syntax_error("boost needs a number"))?;
        let boost = number
            .parse::<f32>()
            .map_err(|_| syntax_error(format!("bad boost {number}")))?;
        Ok(Some(boost))
    }

    /// A word and whether it holds an unescaped `*` or `?`.
    fn read_word(&mut self) -> Result<(String, bool)> {
        let mut word = String::new();
        let mut wild = false;
        while let Some(&c) = self.chars.peek() {
            if is_special(c) {
                break;
            }
            self.chars.next();
            match c {
                '\\' => match self.chars.next() {
                    Some(escaped) => word.push(escaped),
                    None => return Err(syntax_error("trailing backslash")),
                },
                '*' | '?' => {
                    wild = true;
                    word.push(c);
                }
                _ => word.push(c),
            }
        }

        if word.is_empty() {
            return Err(match self.chars.peek() {
                Some(c) => syntax_error(format!("unexpected '{c}'")),
                None => syntax_error("unexpected end of query"),
            });
        }
        Ok((word, wild))
    }

    fn read_number(&mut self) -> Option<String> {
        let mut number = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            number.push(c);
            self.chars.next();
        }
        (!number.is_empty()).then_some(number)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }
}

/// Build a phrase over `field` from the text between the quotes.
///
/// Plain text goes through the analyzer in one piece so its position
/// increments are kept. Text using `<>` gaps or `|` alternatives is analyzed
/// word by word.
fn phrase_query(parser: &QueryParser, field: &str, text: &str) -> Result<PhraseQuery> {
    if !text.contains('|') && !text.contains("<>") {
        return Ok(PhraseQuery::from_tokens(field, parser.tokens(field, text)?));
    }

    let mut phrase = PhraseQuery::new(field);
    let mut gap = 1;
    for piece in text.split_whitespace() {
        if piece == "<>" {
            gap += 1;
            continue;
        }
        let mut added = false;
        for alternative in piece.split('|') {
            let Some(token) = parser.tokens(field, alternative)?.into_iter().next() else {
                continue;
            };
            if added {
                phrase.append_multi_term(token.text);
            } else {
                phrase.add_term(token.text, gap);
                added = true;
            }
        }
        gap = if added { 1 } else { gap + 1 };
    }
    Ok(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::analysis::analyzer::PipelineAnalyzer;
    use crate::lexical::DocId;
    use crate::lexical::memory::MemoryIndex;
    use crate::search::searcher::{IndexSearcher, Searcher};

    fn parser() -> QueryParser {
        QueryParser::new("body", Arc::new(PipelineAnalyzer::default()))
    }

    fn parsed(query_str: &str) -> String {
        parser().parse(query_str).unwrap().to_string()
    }

    #[test]
    fn test_parse_terms_and_fields() {
        assert_eq!(parsed("Quick"), "body:quick");
        assert_eq!(parsed("title:Fox"), "title:fox");
        assert_eq!(parsed("quick fox"), "body:quick body:fox");
        assert_eq!(parsed("title|body:fox"), "title:fox body:fox");
        assert_eq!(parsed("title:(quick fox)"), "title:quick title:fox");
        assert_eq!(parsed(r"a\:b"), "body:a:b");
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(parsed("+quick -slow fox"), "+body:quick -body:slow body:fox");
        assert_eq!(parsed("!slow fox"), "-body:slow body:fox");
        assert_eq!(parsed("quick AND fox"), "+body:quick +body:fox");
        assert_eq!(parsed("quick && fox || dog"), "+body:quick body:fox body:dog");
        assert_eq!(parsed("quick NOT slow"), "body:quick -body:slow");
        assert_eq!(parsed("(quick OR fast) AND fox"), "+(body:quick body:fast) +body:fox");
        assert_eq!(parsed("-slow"), "-body:slow");
    }

    #[test]
    fn test_and_by_default() {
        let config = ParserConfig {
            or_default: false,
            ..ParserConfig::default()
        };
        let parser = parser().with_config(config);
        assert_eq!(parser.parse("quick fox").unwrap().to_string(), "+body:quick +body:fox");
        assert_eq!(parser.parse("quick OR fox").unwrap().to_string(), "body:quick body:fox");
    }

    #[test]
    fn test_parse_phrases() {
        assert_eq!(parsed(r#""Quick Brown fox""#), r#"body:"quick brown fox""#);
        assert_eq!(parsed(r#""quick fox"~2"#), r#"body:"quick fox"~2"#);
        assert_eq!(parsed(r#""quick <> fox""#), r#"body:"quick <> fox""#);
        assert_eq!(parsed(r#""quick|fast fox""#), r#"body:"quick|fast fox""#);
        assert_eq!(parsed(r#""fox""#), "body:fox");
        assert_eq!(parsed(r#""""#), "");
    }

    #[test]
    fn test_parse_expansions() {
        assert_eq!(parsed("Qui*"), "body:qui*");
        assert_eq!(parsed("qu?ck"), "body:qu?ck");
        assert_eq!(parsed("*"), "*");
        assert_eq!(parsed("quick~"), "body:quick~0.5");
        assert_eq!(parsed("quick~0.8"), "body:quick~0.8");
        assert!(matches!(parser().parse("q*ck*").unwrap(), Query::Wildcard(_)));
    }

    #[test]
    fn test_parse_ranges() {
        assert_eq!(parsed("date:[20050101 TO 20051231]"), "date:[20050101 20051231]");
        assert_eq!(parsed("date:{20050101 20051231]"), "date:{20050101 20051231]");
        assert_eq!(parsed("date:[20050101 TO *]"), "date:[20050101 >");
        assert_eq!(parsed("date:>=20050101"), "date:[20050101 >");
        assert_eq!(parsed("date:<20051231"), "date:< 20051231}");
    }

    #[test]
    fn test_parse_boosts() {
        assert_eq!(parsed("quick^2"), "body:quick^2");
        assert_eq!(parsed("(quick fox)^0.5 dog"), "((body:quick body:fox)^0.5) body:dog");
    }

    #[test]
    fn test_syntax_errors() {
        let parser = parser();
        for bad in ["(quick", "\"open", "quick)", "date:[a TO", "quick^x", "[a b c]", "+"] {
            let err = parser.parse(bad).unwrap_err();
            assert!(matches!(err, GlaiveError::InvalidArgument(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_handle_parse_errors() {
        let config = ParserConfig {
            handle_parse_errors: true,
            ..ParserConfig::default()
        };
        let parser = parser().with_config(config);
        assert_eq!(parser.parse("(quick").unwrap().to_string(), "body:quick");
        assert_eq!(parser.parse("\"quick fox").unwrap().to_string(), "body:quick body:fox");
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let query = parser().parse("   ").unwrap();
        assert_eq!(query, Query::from(BooleanQuery::new()));
        assert_eq!(query.to_string(), "");
    }

    #[test]
    fn test_multiple_default_fields() {
        let parser =
            QueryParser::with_default_fields(["title", "body"], Arc::new(PipelineAnalyzer::default()))
                .unwrap();
        assert_eq!(parser.parse("fox").unwrap().to_string(), "title:fox body:fox");
        assert_eq!(parser.parse("*:fox").unwrap().to_string(), "title:fox body:fox");
        assert_eq!(parser.parse_field("tags", "fox dog").unwrap().to_string(), "tags:fox tags:dog");
        assert!(
            QueryParser::with_default_fields(Vec::<String>::new(), Arc::new(PipelineAnalyzer::default()))
                .is_err()
        );
    }

    #[test]
    fn test_parsed_queries_search() {
        let mut index = MemoryIndex::new();
        for body in ["the quick brown fox", "the lazy dog", "quick dogs", "a fox and a dog"] {
            index.add_document(&[("body", body)]).unwrap();
        }
        let searcher = IndexSearcher::new(Arc::new(index));
        let parser = parser();

        let docs = |query_str: &str| -> Vec<DocId> {
            let query = parser.parse(query_str).unwrap();
            let mut docs = Vec::new();
            searcher
                .search_each(&query, None, None, &mut |doc, _| docs.push(doc))
                .unwrap();
            docs
        };
        assert_eq!(docs("+fox -quick"), vec![3]);
        assert_eq!(docs(r#""quick brown""#), vec![0]);
        assert_eq!(docs("dog*"), vec![1, 2, 3]);
        assert_eq!(docs("dof~"), vec![1, 3]);
        assert_eq!(docs("quick AND (dog OR dogs)"), vec![2]);
    }

    #[test]
    fn test_config_from_json() {
        let config: ParserConfig = serde_json::from_str(r#"{"or_default": false}"#).unwrap();
        assert!(!config.or_default);
        assert!(config.wildcard_lowercase);
    }
}
