//! This module implements the parser for rule files.
//!
//! A rule file consists of facts and rules, each terminated by a period:
//! ```text
//! % facts
//! edge(a, b) .
//! edge(b, "c d") .
//! % rules
//! path(?X, ?Y) :- edge(?X, ?Y) .
//! path(?X, ?Z) :- path(?X, ?Y), edge(?Y, ?Z) .
//! node(?X, !Id) :- edge(?X, ?Y) .
//! ```
//! Variables starting with `?` are universal, those starting with `!` existential.
//! Identifiers, integers and double-quoted strings are constants.

use std::collections::{BTreeSet, HashMap};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0_count, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use chasm_physical::datatypes::Term;

use crate::{
    error::Error,
    model::{Literal, LogicalTerm, Program, Rule, VariableId},
};

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Term as written in the rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedTerm<'a> {
    Universal(&'a str),
    Existential(&'a str),
    Constant(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedAtom<'a> {
    predicate: &'a str,
    terms: Vec<ParsedTerm<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement<'a> {
    Fact(ParsedAtom<'a>),
    Rule {
        head: Vec<ParsedAtom<'a>>,
        body: Vec<ParsedAtom<'a>>,
    },
}

fn comment(input: &str) -> ParseResult<'_, ()> {
    value((), preceded(char('%'), not_line_ending))(input)
}

fn whitespace(input: &str) -> ParseResult<'_, ()> {
    value((), many0_count(alt((value((), multispace1), comment))))(input)
}

/// Skip whitespace and comments before `parser`.
fn token<'a, O, P>(parser: P) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    P: FnMut(&'a str) -> ParseResult<'a, O>,
{
    preceded(whitespace, parser)
}

fn identifier(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn integer(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(opt(char('-')), digit1))(input)
}

fn string(input: &str) -> ParseResult<'_, &str> {
    delimited(char('"'), take_while(|c| c != '"'), cut(char('"')))(input)
}

fn term(input: &str) -> ParseResult<'_, ParsedTerm<'_>> {
    context(
        "a term",
        alt((
            map(preceded(char('?'), cut(identifier)), ParsedTerm::Universal),
            map(preceded(char('!'), cut(identifier)), ParsedTerm::Existential),
            map(integer, ParsedTerm::Constant),
            map(string, ParsedTerm::Constant),
            map(identifier, ParsedTerm::Constant),
        )),
    )(input)
}

fn atom(input: &str) -> ParseResult<'_, ParsedAtom<'_>> {
    map(
        pair(
            token(identifier),
            opt(delimited(
                token(char('(')),
                separated_list0(token(char(',')), token(term)),
                context("')'", cut(token(char(')')))),
            )),
        ),
        |(predicate, terms)| ParsedAtom {
            predicate,
            terms: terms.unwrap_or_default(),
        },
    )(input)
}

fn atoms(input: &str) -> ParseResult<'_, Vec<ParsedAtom<'_>>> {
    separated_list1(token(char(',')), atom)(input)
}

fn period(input: &str) -> ParseResult<'_, char> {
    context("'.'", cut(token(char('.'))))(input)
}

fn statement(input: &str) -> ParseResult<'_, Statement<'_>> {
    context(
        "a fact or a rule",
        alt((
            map(
                tuple((atoms, token(tag(":-")), context("a rule body", cut(atoms)), period)),
                |(head, _, body, _)| Statement::Rule { head, body },
            ),
            map(terminated(atom, period), Statement::Fact),
        )),
    )(input)
}

/// Line and column, both starting at 1, of the position where `rest` starts within `source`.
fn position(source: &str, rest: &str) -> (usize, usize) {
    let offset = source.len().saturating_sub(rest.len());
    let consumed = &source[..offset];

    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        + 1;

    (line, column)
}

fn parse_error(source: &str, error: nom::Err<VerboseError<&str>>) -> Error {
    let (rest, message) = match error {
        nom::Err::Error(error) | nom::Err::Failure(error) => {
            let rest = error.errors.first().map_or("", |(rest, _)| *rest);
            let expected = error.errors.iter().find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(context) => Some(*context),
                _ => None,
            });

            let message = match expected {
                Some(expected) => format!("expected {expected}"),
                None => "unexpected input".to_string(),
            };

            (rest, message)
        }
        nom::Err::Incomplete(_) => ("", "unexpected end of input".to_string()),
    };

    let (line, column) = position(source, rest);
    Error::Parse {
        line,
        column,
        message,
    }
}

/// Translates parsed statements into a [Program].
#[derive(Debug)]
struct ProgramBuilder<'s> {
    source: &'s str,
    program: Program,
}

impl<'s> ProgramBuilder<'s> {
    fn constant(&mut self, text: &str) -> Term {
        self.program.dictionary_mut().add(text)
    }

    fn add_fact(&mut self, atom: ParsedAtom<'_>, start: &str) -> Result<(), Error> {
        let mut terms = Vec::with_capacity(atom.terms.len());
        for term in atom.terms {
            match term {
                ParsedTerm::Constant(text) => terms.push(self.constant(text)),
                ParsedTerm::Universal(_) | ParsedTerm::Existential(_) => {
                    let (line, column) = position(self.source, start);
                    return Err(Error::Parse {
                        line,
                        column,
                        message: format!("fact {} contains a variable", atom.predicate),
                    });
                }
            }
        }

        let predicate = self.program.register_predicate(atom.predicate, terms.len())?;
        self.program.add_fact(predicate, terms)
    }

    fn add_rule<'a>(
        &mut self,
        head: Vec<ParsedAtom<'a>>,
        body: Vec<ParsedAtom<'a>>,
    ) -> Result<(), Error> {
        let mut variables = HashMap::<(bool, &'a str), VariableId>::new();
        let mut names = Vec::new();
        let mut existentials = BTreeSet::new();

        let mut translate = |builder: &mut Self,
                             atoms: Vec<ParsedAtom<'a>>|
         -> Result<Vec<Literal>, Error> {
            let mut literals = Vec::with_capacity(atoms.len());
            for atom in atoms {
                let mut terms = Vec::with_capacity(atom.terms.len());
                for term in atom.terms {
                    let (existential, name) = match term {
                        ParsedTerm::Constant(text) => {
                            terms.push(LogicalTerm::Constant(builder.constant(text)));
                            continue;
                        }
                        ParsedTerm::Universal(name) => (false, name),
                        ParsedTerm::Existential(name) => (true, name),
                    };

                    let variable = *variables.entry((existential, name)).or_insert_with(|| {
                        names.push(name.to_string());
                        VariableId(names.len() as u32 - 1)
                    });
                    if existential {
                        existentials.insert(variable);
                    }

                    terms.push(LogicalTerm::Variable(variable));
                }

                let predicate = builder
                    .program
                    .register_predicate(atom.predicate, terms.len())?;
                literals.push(Literal::new(predicate, terms));
            }

            Ok(literals)
        };

        let head = translate(self, head)?;
        let body = translate(self, body)?;

        let rule = Rule::new(head, body, existentials).with_variable_names(names);
        self.program.add_rule(rule)?;

        Ok(())
    }
}

/// Parse a rule file into a [Program].
pub fn parse_program(source: &str) -> Result<Program, Error> {
    let mut builder = ProgramBuilder {
        source,
        program: Program::new(),
    };

    let mut input = source;
    loop {
        let (rest, _) = whitespace(input).map_err(|error| parse_error(source, error))?;
        if rest.is_empty() {
            break;
        }

        let (remaining, parsed) = statement(rest).map_err(|error| parse_error(source, error))?;
        match parsed {
            Statement::Fact(atom) => builder.add_fact(atom, rest)?,
            Statement::Rule { head, body } => builder.add_rule(head, body)?,
        }

        input = remaining;
    }

    log::debug!(
        "Parsed {} rules and {} facts over {} predicates",
        builder.program.rules().len(),
        builder.program.facts().len(),
        builder.program.predicates().count()
    );

    Ok(builder.program)
}

/// Parse a single fact such as `e(a, 2)` without trailing period,
/// returning the predicate name and the constants.
pub fn parse_fact(source: &str) -> Result<(String, Vec<String>), Error> {
    let (_, atom) =
        all_consuming(terminated(atom, whitespace))(source).map_err(|error| parse_error(source, error))?;

    let mut constants = Vec::with_capacity(atom.terms.len());
    for term in atom.terms {
        match term {
            ParsedTerm::Constant(text) => constants.push(text.to_string()),
            ParsedTerm::Universal(_) | ParsedTerm::Existential(_) => {
                return Err(Error::Parse {
                    line: 1,
                    column: 1,
                    message: format!("fact {} contains a variable", atom.predicate),
                })
            }
        }
    }

    Ok((atom.predicate.to_string(), constants))
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::error::Error;

    use super::{parse_fact, parse_program, position};

    #[test]
    fn facts_and_rules() {
        let program = parse_program(
            r#"
            % input
            e(a, 2) .
            e(b, "hello world").
            p(?X, !N) :- e(?X, ?Y) . % trailing comment
            q(?X) :- p(?X, ?N), e(?N, c).
            flag :- q(a) .
            "#,
        )
        .unwrap();

        assert_eq!(program.facts().len(), 2);
        assert_eq!(program.rules().len(), 3);

        let e = program.predicate("e").unwrap();
        assert_eq!(program.arity(e), 2);
        assert_eq!(
            program.fact_to_string(e, &program.facts()[1].1),
            "e(b, hello world)"
        );

        let rule = &program.rules()[0];
        assert_eq!(rule.existentials().len(), 1);
        assert_eq!(program.rule_to_string(0), "p(?X, !N) :- e(?X, ?Y) .");
        assert_eq!(program.rule_to_string(1), "q(?X) :- p(?X, ?N), e(?N, c) .");
        assert_eq!(program.arity(program.predicate("flag").unwrap()), 0);
    }

    #[test]
    fn errors_have_positions() {
        let error = parse_program("e(a).\np(?X) :- e(?X)\n").unwrap_err();
        assert!(matches!(error, Error::Parse { line: 3, .. }), "{error:?}");

        let error = parse_program("e(a).\n  e(?X).").unwrap_err();
        assert!(
            matches!(error, Error::Parse { line: 2, column: 3, .. }),
            "{error:?}"
        );

        let error = parse_program("e(a, b).\ne(a).").unwrap_err();
        assert!(matches!(error, Error::PredicateArity { .. }));

        let error = parse_program("p(?X) :- e(?Y).").unwrap_err();
        assert!(matches!(error, Error::UnsafeHeadVariable { .. }));
    }

    #[test]
    fn positions() {
        let source = "ab\ncd";
        assert_eq!(position(source, source), (1, 1));
        assert_eq!(position(source, &source[4..]), (2, 2));
    }

    #[test]
    fn single_fact() {
        assert_eq!(
            parse_fact("e(a, 1)").unwrap(),
            ("e".to_string(), vec!["a".to_string(), "1".to_string()])
        );
        assert!(parse_fact("e(?X)").is_err());
    }
}
