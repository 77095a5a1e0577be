//! SPARQL 1.1 surface parser
//!
//! A `logos` tokenizer plus a recursive-descent parser producing the typed
//! AST the translator consumes. Prefixed names are expanded here, so the AST
//! and everything below it only ever carry absolute IRIs.

use crate::algebra::{AggregateFunction, AstExpr, Expression};
use crate::SparqlError;
use logos::Logos;
use minerva_core::{xsd, Iri, Literal, Term, Variable, RDF_TYPE};
use std::collections::HashMap;

/// SPARQL tokens. Keywords are case-insensitive; value-carrying tokens hold
/// their decoded payload.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\r\n]*")]
pub enum Token {
    #[token("SELECT", ignore(ascii_case))]
    Select,
    #[token("CONSTRUCT", ignore(ascii_case))]
    Construct,
    #[token("ASK", ignore(ascii_case))]
    Ask,
    #[token("WHERE", ignore(ascii_case))]
    Where,
    #[token("PREFIX", ignore(ascii_case))]
    Prefix,
    #[token("BASE", ignore(ascii_case))]
    Base,
    #[token("FILTER", ignore(ascii_case))]
    Filter,
    #[token("OPTIONAL", ignore(ascii_case))]
    Optional,
    #[token("UNION", ignore(ascii_case))]
    Union,
    #[token("MINUS", ignore(ascii_case))]
    MinusKw,
    #[token("BIND", ignore(ascii_case))]
    Bind,
    #[token("VALUES", ignore(ascii_case))]
    Values,
    #[token("UNDEF", ignore(ascii_case))]
    Undef,
    #[token("SERVICE", ignore(ascii_case))]
    Service,
    #[token("SILENT", ignore(ascii_case))]
    Silent,
    #[token("GROUP", ignore(ascii_case))]
    GroupKw,
    #[token("BY", ignore(ascii_case))]
    By,
    #[token("HAVING", ignore(ascii_case))]
    Having,
    #[token("ORDER", ignore(ascii_case))]
    Order,
    #[token("ASC", ignore(ascii_case))]
    Asc,
    #[token("DESC", ignore(ascii_case))]
    Desc,
    #[token("LIMIT", ignore(ascii_case))]
    Limit,
    #[token("OFFSET", ignore(ascii_case))]
    Offset,
    #[token("DISTINCT", ignore(ascii_case))]
    Distinct,
    #[token("REDUCED", ignore(ascii_case))]
    Reduced,
    #[token("AS", ignore(ascii_case))]
    As,
    #[token("IN", ignore(ascii_case))]
    In,
    #[token("NOT", ignore(ascii_case))]
    Not,
    #[token("EXISTS", ignore(ascii_case))]
    Exists,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("COUNT", ignore(ascii_case))]
    Count,
    #[token("SUM", ignore(ascii_case))]
    Sum,
    #[token("AVG", ignore(ascii_case))]
    Avg,
    #[token("MIN", ignore(ascii_case))]
    MinKw,
    #[token("MAX", ignore(ascii_case))]
    MaxKw,
    #[token("GROUP_CONCAT", ignore(ascii_case))]
    GroupConcat,
    #[token("SAMPLE", ignore(ascii_case))]
    Sample,
    #[token("SEPARATOR", ignore(ascii_case))]
    Separator,
    #[token("a")]
    A,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("/")]
    Slash,
    #[token("^^")]
    DoubleCaret,
    #[token("^")]
    Caret,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("-")]
    Dash,
    #[token("!=")]
    Neq,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    #[regex(r"[?$][A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_owned())]
    Var(String),
    #[regex(r"<[^<>\s]*>", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_owned() })]
    IriRef(String),
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*:[A-Za-z0-9_][A-Za-z0-9_-]*", pname_ln)]
    #[regex(r":[A-Za-z0-9_][A-Za-z0-9_-]*", pname_ln)]
    PNameLn((String, String)),
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*:", |lex| { let s = lex.slice(); s[..s.len() - 1].to_owned() })]
    PNameNs(String),
    #[regex(r"_:[A-Za-z0-9_][A-Za-z0-9_-]*", |lex| lex.slice()[2..].to_owned())]
    BlankLabel(String),
    #[regex(r#""([^"\\\r\n]|\\.)*""#, unquote)]
    #[regex(r"'([^'\\\r\n]|\\.)*'", unquote)]
    Str(String),
    #[regex(r"@[A-Za-z]+(-[A-Za-z0-9]+)*", |lex| lex.slice()[1..].to_owned())]
    LangTag(String),
    #[regex(r"[0-9]+", |lex| lex.slice().to_owned())]
    Integer(String),
    #[regex(r"[0-9]*\.[0-9]+", |lex| lex.slice().to_owned())]
    Decimal(String),
    #[regex(r"([0-9]+\.[0-9]*|[0-9]+)[eE][+-]?[0-9]+", |lex| lex.slice().to_owned())]
    Double(String),
    // Lower priority than the keyword tokens so equal-length matches lex as
    // keywords.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned(), priority = 1)]
    Ident(String),
}

fn pname_ln(lex: &mut logos::Lexer<Token>) -> (String, String) {
    let slice = lex.slice();
    let colon = slice.find(':').unwrap_or(0);
    (slice[..colon].to_owned(), slice[colon + 1..].to_owned())
}

fn unquote(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A term position in a triple pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternTerm {
    Term(Term),
    Variable(Variable),
}

/// A predicate position: a plain IRI, a variable, or a property path.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternPredicate {
    Iri(Iri),
    Variable(Variable),
    Path(PropertyPath),
}

/// Property path expression. `Sequence` and `Alternative` keep child lists;
/// the unary constructors carry exactly one child by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyPath {
    Predicate(Iri),
    Inverse(Box<PropertyPath>),
    Sequence(Vec<PropertyPath>),
    Alternative(Vec<PropertyPath>),
    ZeroOrMore(Box<PropertyPath>),
    OneOrMore(Box<PropertyPath>),
    ZeroOrOne(Box<PropertyPath>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternPredicate,
    pub object: PatternTerm,
}

/// Inline data block. A `None` cell is UNDEF.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesBlock {
    pub variables: Vec<Variable>,
    pub rows: Vec<Vec<Option<Term>>>,
}

/// Graph pattern node of the surface AST.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    Bgp(Vec<TriplePattern>),
    /// `{ ... }` with children in source order.
    Group(Vec<GraphPattern>),
    Filter(AstExpr),
    Bind(AstExpr, Variable),
    Optional(Box<GraphPattern>),
    Union(Vec<GraphPattern>),
    Minus(Box<GraphPattern>),
    Values(ValuesBlock),
    SubSelect(Box<Query>),
    Service {
        endpoint: Iri,
        pattern: Box<GraphPattern>,
        silent: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub reduced: bool,
    pub star: bool,
    pub items: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Variable(Variable),
    /// `(expr AS ?alias)`
    Expression(AstExpr, Variable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expr: AstExpr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryForm {
    Select,
    Ask,
    Construct(Vec<TriplePattern>),
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub form: QueryForm,
    pub select: SelectClause,
    pub where_clause: GraphPattern,
    pub group_by: Vec<Variable>,
    pub having: Vec<AstExpr>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// SPARQL parser facade.
pub struct SparqlParser;

impl SparqlParser {
    pub fn parse(query: &str) -> Result<Query, SparqlError> {
        let tokens = lex(query)?;
        let mut state = ParserState {
            tokens,
            pos: 0,
            prefixes: HashMap::new(),
            base: None,
            anon_counter: 0,
        };
        let parsed = state.parse_query()?;
        if state.pos < state.tokens.len() {
            return Err(state.unexpected("end of query"));
        }
        Ok(parsed)
    }
}

fn lex(input: &str) -> Result<Vec<Token>, SparqlError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(input).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(SparqlError::ParseError(format!(
                    "unexpected input at byte {}: {:?}",
                    span.start,
                    &input[span.start..span.end.min(span.start + 16)]
                )))
            }
        }
    }
    Ok(tokens)
}

struct ParserState {
    tokens: Vec<Token>,
    pos: usize,
    prefixes: HashMap<String, String>,
    base: Option<String>,
    anon_counter: usize,
}

impl ParserState {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<(), SparqlError> {
        if self.accept(&token) {
            Ok(())
        } else {
            Err(SparqlError::ParseError(format!(
                "expected {:?} in {}, found {:?}",
                token,
                context,
                self.peek()
            )))
        }
    }

    fn unexpected(&self, expected: &str) -> SparqlError {
        SparqlError::ParseError(format!(
            "expected {}, found {:?}",
            expected,
            self.peek()
        ))
    }

    // ---- prologue and query forms ----

    fn parse_query(&mut self) -> Result<Query, SparqlError> {
        loop {
            match self.peek() {
                Some(Token::Prefix) => {
                    self.next();
                    let prefix = match self.next() {
                        Some(Token::PNameNs(prefix)) => prefix,
                        Some(Token::Colon) => String::new(),
                        other => {
                            return Err(SparqlError::ParseError(format!(
                                "expected prefix name after PREFIX, found {:?}",
                                other
                            )))
                        }
                    };
                    match self.next() {
                        Some(Token::IriRef(iri)) => {
                            self.prefixes.insert(prefix, iri);
                        }
                        other => {
                            return Err(SparqlError::ParseError(format!(
                                "expected IRI after PREFIX {}:, found {:?}",
                                prefix, other
                            )))
                        }
                    }
                }
                Some(Token::Base) => {
                    self.next();
                    match self.next() {
                        Some(Token::IriRef(iri)) => self.base = Some(iri),
                        other => {
                            return Err(SparqlError::ParseError(format!(
                                "expected IRI after BASE, found {:?}",
                                other
                            )))
                        }
                    }
                }
                _ => break,
            }
        }

        match self.peek() {
            Some(Token::Select) => self.parse_select_query(),
            Some(Token::Ask) => self.parse_ask_query(),
            Some(Token::Construct) => self.parse_construct_query(),
            _ => Err(self.unexpected("SELECT, ASK or CONSTRUCT")),
        }
    }

    fn parse_select_query(&mut self) -> Result<Query, SparqlError> {
        self.expect(Token::Select, "query")?;
        let mut select = SelectClause {
            distinct: false,
            reduced: false,
            star: false,
            items: Vec::new(),
        };
        if self.accept(&Token::Distinct) {
            select.distinct = true;
        } else if self.accept(&Token::Reduced) {
            select.reduced = true;
        }

        if self.accept(&Token::Star) {
            select.star = true;
        } else {
            loop {
                match self.peek() {
                    Some(Token::Var(_)) => {
                        if let Some(Token::Var(name)) = self.next() {
                            select.items.push(SelectItem::Variable(Variable::new(name)));
                        }
                    }
                    Some(Token::LParen) => {
                        self.next();
                        let expr = self.parse_expression()?;
                        self.expect(Token::As, "projection expression")?;
                        let alias = self.parse_variable()?;
                        self.expect(Token::RParen, "projection expression")?;
                        select.items.push(SelectItem::Expression(expr, alias));
                    }
                    _ => break,
                }
            }
            if select.items.is_empty() {
                return Err(self.unexpected("projection variable or *"));
            }
        }

        self.accept(&Token::Where);
        let mut query = Query {
            form: QueryForm::Select,
            select,
            where_clause: self.parse_group_graph_pattern()?,
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };
        self.parse_solution_modifiers(&mut query)?;
        Ok(query)
    }

    fn parse_ask_query(&mut self) -> Result<Query, SparqlError> {
        self.expect(Token::Ask, "query")?;
        self.accept(&Token::Where);
        Ok(Query {
            form: QueryForm::Ask,
            select: SelectClause {
                distinct: false,
                reduced: false,
                star: false,
                items: Vec::new(),
            },
            where_clause: self.parse_group_graph_pattern()?,
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        })
    }

    fn parse_construct_query(&mut self) -> Result<Query, SparqlError> {
        self.expect(Token::Construct, "query")?;
        self.expect(Token::LBrace, "CONSTRUCT template")?;
        let template = if self.peek() == Some(&Token::RBrace) {
            Vec::new()
        } else {
            self.parse_triples_block()?
        };
        self.expect(Token::RBrace, "CONSTRUCT template")?;
        self.accept(&Token::Where);
        let mut query = Query {
            form: QueryForm::Construct(template),
            select: SelectClause {
                distinct: false,
                reduced: false,
                star: false,
                items: Vec::new(),
            },
            where_clause: self.parse_group_graph_pattern()?,
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };
        self.parse_solution_modifiers(&mut query)?;
        Ok(query)
    }

    fn parse_solution_modifiers(&mut self, query: &mut Query) -> Result<(), SparqlError> {
        loop {
            match self.peek() {
                Some(Token::GroupKw) => {
                    self.next();
                    self.expect(Token::By, "GROUP BY")?;
                    loop {
                        match self.peek() {
                            Some(Token::Var(_)) => query.group_by.push(self.parse_variable()?),
                            _ => break,
                        }
                    }
                    if query.group_by.is_empty() {
                        return Err(self.unexpected("grouping variable"));
                    }
                }
                Some(Token::Having) => {
                    self.next();
                    query.having.push(self.parse_constraint()?);
                    while self.peek() == Some(&Token::LParen) {
                        query.having.push(self.parse_constraint()?);
                    }
                }
                Some(Token::Order) => {
                    self.next();
                    self.expect(Token::By, "ORDER BY")?;
                    loop {
                        match self.peek() {
                            Some(Token::Asc) => {
                                self.next();
                                self.expect(Token::LParen, "ASC")?;
                                let expr = self.parse_expression()?;
                                self.expect(Token::RParen, "ASC")?;
                                query.order_by.push(OrderCondition {
                                    expr,
                                    descending: false,
                                });
                            }
                            Some(Token::Desc) => {
                                self.next();
                                self.expect(Token::LParen, "DESC")?;
                                let expr = self.parse_expression()?;
                                self.expect(Token::RParen, "DESC")?;
                                query.order_by.push(OrderCondition {
                                    expr,
                                    descending: true,
                                });
                            }
                            Some(Token::Var(_)) => {
                                let var = self.parse_variable()?;
                                query.order_by.push(OrderCondition {
                                    expr: Expression::Variable(var),
                                    descending: false,
                                });
                            }
                            Some(Token::LParen) => {
                                self.next();
                                let expr = self.parse_expression()?;
                                self.expect(Token::RParen, "ORDER BY")?;
                                query.order_by.push(OrderCondition {
                                    expr,
                                    descending: false,
                                });
                            }
                            _ => break,
                        }
                    }
                    if query.order_by.is_empty() {
                        return Err(self.unexpected("order condition"));
                    }
                }
                Some(Token::Limit) => {
                    self.next();
                    query.limit = Some(self.parse_unsigned("LIMIT")?);
                }
                Some(Token::Offset) => {
                    self.next();
                    query.offset = Some(self.parse_unsigned("OFFSET")?);
                }
                Some(Token::Values) => {
                    // Trailing VALUES joins into the WHERE group.
                    self.next();
                    let block = self.parse_values_block()?;
                    if let GraphPattern::Group(elements) = &mut query.where_clause {
                        elements.push(GraphPattern::Values(block));
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_unsigned(&mut self, context: &str) -> Result<u64, SparqlError> {
        match self.next() {
            Some(Token::Integer(value)) => value.parse::<u64>().map_err(|_| {
                SparqlError::ParseError(format!("invalid {} value {}", context, value))
            }),
            other => Err(SparqlError::ParseError(format!(
                "expected integer after {}, found {:?}",
                context, other
            ))),
        }
    }

    // ---- graph patterns ----

    fn parse_group_graph_pattern(&mut self) -> Result<GraphPattern, SparqlError> {
        self.expect(Token::LBrace, "group graph pattern")?;

        if self.peek() == Some(&Token::Select) {
            let inner = self.parse_select_query()?;
            self.expect(Token::RBrace, "subquery")?;
            return Ok(GraphPattern::Group(vec![GraphPattern::SubSelect(
                Box::new(inner),
            )]));
        }

        let mut elements = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.unexpected("} to close group")),
                Some(Token::RBrace) => {
                    self.next();
                    break;
                }
                Some(Token::Filter) => {
                    self.next();
                    let expr = self.parse_constraint()?;
                    elements.push(GraphPattern::Filter(expr));
                }
                Some(Token::Optional) => {
                    self.next();
                    let inner = self.parse_group_graph_pattern()?;
                    elements.push(GraphPattern::Optional(Box::new(inner)));
                }
                Some(Token::MinusKw) => {
                    self.next();
                    let inner = self.parse_group_graph_pattern()?;
                    elements.push(GraphPattern::Minus(Box::new(inner)));
                }
                Some(Token::Bind) => {
                    self.next();
                    self.expect(Token::LParen, "BIND")?;
                    let expr = self.parse_expression()?;
                    self.expect(Token::As, "BIND")?;
                    let variable = self.parse_variable()?;
                    self.expect(Token::RParen, "BIND")?;
                    elements.push(GraphPattern::Bind(expr, variable));
                }
                Some(Token::Values) => {
                    self.next();
                    elements.push(GraphPattern::Values(self.parse_values_block()?));
                }
                Some(Token::Service) => {
                    self.next();
                    let silent = self.accept(&Token::Silent);
                    let endpoint = self.parse_iri()?;
                    let pattern = self.parse_group_graph_pattern()?;
                    elements.push(GraphPattern::Service {
                        endpoint,
                        pattern: Box::new(pattern),
                        silent,
                    });
                }
                Some(Token::LBrace) => {
                    let first = self.parse_group_graph_pattern()?;
                    if self.peek() == Some(&Token::Union) {
                        let mut branches = vec![first];
                        while self.accept(&Token::Union) {
                            branches.push(self.parse_group_graph_pattern()?);
                        }
                        elements.push(GraphPattern::Union(branches));
                    } else {
                        elements.push(first);
                    }
                }
                Some(Token::Dot) => {
                    self.next();
                }
                _ => {
                    elements.push(GraphPattern::Bgp(self.parse_triples_block()?));
                }
            }
        }
        Ok(GraphPattern::Group(elements))
    }

    fn parse_triples_block(&mut self) -> Result<Vec<TriplePattern>, SparqlError> {
        let mut triples = Vec::new();
        loop {
            let subject = self.parse_pattern_term()?;
            loop {
                let predicate = self.parse_predicate()?;
                loop {
                    let object = self.parse_pattern_term()?;
                    triples.push(TriplePattern {
                        subject: subject.clone(),
                        predicate: predicate.clone(),
                        object,
                    });
                    if !self.accept(&Token::Comma) {
                        break;
                    }
                }
                if !self.accept(&Token::Semicolon) {
                    break;
                }
                // Trailing semicolon before `.` or `}`.
                if !self.starts_predicate() {
                    break;
                }
            }
            if self.accept(&Token::Dot) {
                if self.starts_term() {
                    continue;
                }
            }
            break;
        }
        Ok(triples)
    }

    fn starts_term(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Var(_)
                    | Token::IriRef(_)
                    | Token::PNameLn(_)
                    | Token::BlankLabel(_)
                    | Token::Str(_)
                    | Token::Integer(_)
                    | Token::Decimal(_)
                    | Token::Double(_)
                    | Token::True
                    | Token::False
                    | Token::LBracket
            )
        )
    }

    fn starts_predicate(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Var(_)
                    | Token::IriRef(_)
                    | Token::PNameLn(_)
                    | Token::A
                    | Token::LParen
                    | Token::Caret
            )
        )
    }

    fn parse_variable(&mut self) -> Result<Variable, SparqlError> {
        match self.next() {
            Some(Token::Var(name)) => Ok(Variable::new(name)),
            other => Err(SparqlError::ParseError(format!(
                "expected variable, found {:?}",
                other
            ))),
        }
    }

    fn parse_iri(&mut self) -> Result<Iri, SparqlError> {
        match self.next() {
            Some(Token::IriRef(iri)) => Ok(Iri::new(self.resolve_relative(&iri))),
            Some(Token::PNameLn((prefix, local))) => self.expand_pname(&prefix, &local),
            other => Err(SparqlError::ParseError(format!(
                "expected IRI, found {:?}",
                other
            ))),
        }
    }

    fn resolve_relative(&self, iri: &str) -> String {
        if iri.contains(':') {
            iri.to_owned()
        } else if let Some(base) = &self.base {
            format!("{}{}", base, iri)
        } else {
            iri.to_owned()
        }
    }

    fn expand_pname(&self, prefix: &str, local: &str) -> Result<Iri, SparqlError> {
        match self.prefixes.get(prefix) {
            Some(namespace) => Ok(Iri::new(format!("{}{}", namespace, local))),
            None => Err(SparqlError::ParseError(format!(
                "unknown prefix '{}:'",
                prefix
            ))),
        }
    }

    fn parse_pattern_term(&mut self) -> Result<PatternTerm, SparqlError> {
        match self.next() {
            Some(Token::Var(name)) => Ok(PatternTerm::Variable(Variable::new(name))),
            Some(Token::IriRef(iri)) => Ok(PatternTerm::Term(Term::Iri(Iri::new(
                self.resolve_relative(&iri),
            )))),
            Some(Token::PNameLn((prefix, local))) => Ok(PatternTerm::Term(Term::Iri(
                self.expand_pname(&prefix, &local)?,
            ))),
            Some(Token::BlankLabel(label)) => Ok(PatternTerm::Term(Term::BlankNode(label))),
            Some(Token::LBracket) => {
                self.expect(Token::RBracket, "anonymous blank node")?;
                let label = format!("anon{}", self.anon_counter);
                self.anon_counter += 1;
                Ok(PatternTerm::Term(Term::BlankNode(label)))
            }
            Some(Token::Str(value)) => Ok(PatternTerm::Term(Term::Literal(
                self.finish_literal(value)?,
            ))),
            Some(Token::Integer(value)) => Ok(PatternTerm::Term(Term::Literal(Literal::typed(
                value,
                Iri::new(xsd::INTEGER),
            )))),
            Some(Token::Decimal(value)) => Ok(PatternTerm::Term(Term::Literal(Literal::typed(
                value,
                Iri::new(xsd::DECIMAL),
            )))),
            Some(Token::Double(value)) => Ok(PatternTerm::Term(Term::Literal(Literal::typed(
                value,
                Iri::new(xsd::DOUBLE),
            )))),
            Some(Token::True) => Ok(PatternTerm::Term(Term::Literal(Literal::boolean(true)))),
            Some(Token::False) => Ok(PatternTerm::Term(Term::Literal(Literal::boolean(false)))),
            other => Err(SparqlError::ParseError(format!(
                "expected term, found {:?}",
                other
            ))),
        }
    }

    /// A string token has just been consumed; attach `@lang` or `^^datatype`.
    fn finish_literal(&mut self, value: String) -> Result<Literal, SparqlError> {
        match self.peek() {
            Some(Token::LangTag(_)) => {
                if let Some(Token::LangTag(lang)) = self.next() {
                    Ok(Literal::lang_tagged(value, lang))
                } else {
                    unreachable!()
                }
            }
            Some(Token::DoubleCaret) => {
                self.next();
                let datatype = self.parse_iri()?;
                Ok(Literal::typed(value, datatype))
            }
            _ => Ok(Literal::simple(value)),
        }
    }

    fn parse_predicate(&mut self) -> Result<PatternPredicate, SparqlError> {
        if let Some(Token::Var(_)) = self.peek() {
            return Ok(PatternPredicate::Variable(self.parse_variable()?));
        }
        let path = self.parse_path()?;
        Ok(match path {
            PropertyPath::Predicate(iri) => PatternPredicate::Iri(iri),
            other => PatternPredicate::Path(other),
        })
    }

    // ---- property paths ----

    fn parse_path(&mut self) -> Result<PropertyPath, SparqlError> {
        let mut alternatives = vec![self.parse_path_sequence()?];
        while self.accept(&Token::Pipe) {
            alternatives.push(self.parse_path_sequence()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.pop().unwrap()
        } else {
            PropertyPath::Alternative(alternatives)
        })
    }

    fn parse_path_sequence(&mut self) -> Result<PropertyPath, SparqlError> {
        let mut elements = vec![self.parse_path_elt()?];
        while self.accept(&Token::Slash) {
            elements.push(self.parse_path_elt()?);
        }
        Ok(if elements.len() == 1 {
            elements.pop().unwrap()
        } else {
            PropertyPath::Sequence(elements)
        })
    }

    fn parse_path_elt(&mut self) -> Result<PropertyPath, SparqlError> {
        if self.accept(&Token::Caret) {
            let inner = self.parse_path_elt()?;
            return Ok(PropertyPath::Inverse(Box::new(inner)));
        }
        let primary = self.parse_path_primary()?;
        Ok(match self.peek() {
            Some(Token::Question) => {
                self.next();
                PropertyPath::ZeroOrOne(Box::new(primary))
            }
            Some(Token::Star) => {
                self.next();
                PropertyPath::ZeroOrMore(Box::new(primary))
            }
            Some(Token::Plus) => {
                self.next();
                PropertyPath::OneOrMore(Box::new(primary))
            }
            _ => primary,
        })
    }

    fn parse_path_primary(&mut self) -> Result<PropertyPath, SparqlError> {
        match self.peek() {
            Some(Token::A) => {
                self.next();
                Ok(PropertyPath::Predicate(Iri::new(RDF_TYPE)))
            }
            Some(Token::IriRef(_)) | Some(Token::PNameLn(_)) => {
                Ok(PropertyPath::Predicate(self.parse_iri()?))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_path()?;
                self.expect(Token::RParen, "path group")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("property path")),
        }
    }

    // ---- VALUES ----

    fn parse_values_block(&mut self) -> Result<ValuesBlock, SparqlError> {
        let mut variables = Vec::new();
        let single = match self.peek() {
            Some(Token::Var(_)) => {
                variables.push(self.parse_variable()?);
                true
            }
            Some(Token::LParen) => {
                self.next();
                while let Some(Token::Var(_)) = self.peek() {
                    variables.push(self.parse_variable()?);
                }
                self.expect(Token::RParen, "VALUES variables")?;
                false
            }
            _ => return Err(self.unexpected("VALUES variable list")),
        };

        self.expect(Token::LBrace, "VALUES data")?;
        let mut rows = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.next();
                    break;
                }
                Some(Token::LParen) if !single => {
                    self.next();
                    let mut row = Vec::new();
                    while self.peek() != Some(&Token::RParen) {
                        row.push(self.parse_values_value()?);
                    }
                    self.expect(Token::RParen, "VALUES row")?;
                    if row.len() != variables.len() {
                        return Err(SparqlError::ParseError(format!(
                            "VALUES row has {} cells for {} variables",
                            row.len(),
                            variables.len()
                        )));
                    }
                    rows.push(row);
                }
                _ if single => {
                    rows.push(vec![self.parse_values_value()?]);
                }
                _ => return Err(self.unexpected("VALUES row")),
            }
        }
        Ok(ValuesBlock { variables, rows })
    }

    fn parse_values_value(&mut self) -> Result<Option<Term>, SparqlError> {
        if self.accept(&Token::Undef) {
            return Ok(None);
        }
        match self.parse_pattern_term()? {
            PatternTerm::Term(term) => Ok(Some(term)),
            PatternTerm::Variable(var) => Err(SparqlError::ParseError(format!(
                "variable ?{} not allowed in VALUES data",
                var.as_str()
            ))),
        }
    }

    // ---- expressions ----

    /// FILTER / HAVING constraint: a bracketted expression, a built-in call,
    /// or (NOT) EXISTS.
    fn parse_constraint(&mut self) -> Result<AstExpr, SparqlError> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let expr = self.parse_expression()?;
            self.expect(Token::RParen, "constraint")?;
            Ok(expr)
        } else {
            self.parse_primary_expression()
        }
    }

    pub(crate) fn parse_expression(&mut self) -> Result<AstExpr, SparqlError> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> Result<AstExpr, SparqlError> {
        let mut left = self.parse_and_expression()?;
        while self.accept(&Token::OrOr) {
            let right = self.parse_and_expression()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<AstExpr, SparqlError> {
        let mut left = self.parse_relational_expression()?;
        while self.accept(&Token::AndAnd) {
            let right = self.parse_relational_expression()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> Result<AstExpr, SparqlError> {
        let left = self.parse_additive_expression()?;
        let operator = match self.peek() {
            Some(Token::Eq) => Some(Token::Eq),
            Some(Token::Neq) => Some(Token::Neq),
            Some(Token::Lt) => Some(Token::Lt),
            Some(Token::Le) => Some(Token::Le),
            Some(Token::Gt) => Some(Token::Gt),
            Some(Token::Ge) => Some(Token::Ge),
            Some(Token::In) => {
                self.next();
                let list = self.parse_expression_list()?;
                return Ok(Expression::In(Box::new(left), list));
            }
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.next();
                self.next();
                let list = self.parse_expression_list()?;
                return Ok(Expression::NotIn(Box::new(left), list));
            }
            _ => None,
        };
        match operator {
            None => Ok(left),
            Some(op) => {
                self.next();
                let right = self.parse_additive_expression()?;
                Ok(match op {
                    Token::Eq => Expression::Equal(Box::new(left), Box::new(right)),
                    Token::Neq => Expression::NotEqual(Box::new(left), Box::new(right)),
                    Token::Lt => Expression::Less(Box::new(left), Box::new(right)),
                    Token::Le => Expression::LessOrEqual(Box::new(left), Box::new(right)),
                    Token::Gt => Expression::Greater(Box::new(left), Box::new(right)),
                    Token::Ge => Expression::GreaterOrEqual(Box::new(left), Box::new(right)),
                    _ => unreachable!(),
                })
            }
        }
    }

    fn parse_expression_list(&mut self) -> Result<Vec<AstExpr>, SparqlError> {
        self.expect(Token::LParen, "expression list")?;
        let mut list = Vec::new();
        if self.accept(&Token::RParen) {
            return Ok(list);
        }
        loop {
            list.push(self.parse_expression()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "expression list")?;
        Ok(list)
    }

    fn parse_additive_expression(&mut self) -> Result<AstExpr, SparqlError> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            if self.accept(&Token::Plus) {
                let right = self.parse_multiplicative_expression()?;
                left = Expression::Add(Box::new(left), Box::new(right));
            } else if self.accept(&Token::Dash) {
                let right = self.parse_multiplicative_expression()?;
                left = Expression::Subtract(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative_expression(&mut self) -> Result<AstExpr, SparqlError> {
        let mut left = self.parse_unary_expression()?;
        loop {
            if self.accept(&Token::Star) {
                let right = self.parse_unary_expression()?;
                left = Expression::Multiply(Box::new(left), Box::new(right));
            } else if self.accept(&Token::Slash) {
                let right = self.parse_unary_expression()?;
                left = Expression::Divide(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary_expression(&mut self) -> Result<AstExpr, SparqlError> {
        if self.accept(&Token::Bang) {
            Ok(Expression::Not(Box::new(self.parse_unary_expression()?)))
        } else if self.accept(&Token::Dash) {
            Ok(Expression::UnaryMinus(Box::new(
                self.parse_unary_expression()?,
            )))
        } else if self.accept(&Token::Plus) {
            self.parse_unary_expression()
        } else {
            self.parse_primary_expression()
        }
    }

    fn parse_primary_expression(&mut self) -> Result<AstExpr, SparqlError> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.next();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "bracketted expression")?;
                Ok(expr)
            }
            Some(Token::Var(_)) => Ok(Expression::Variable(self.parse_variable()?)),
            Some(Token::Str(_)) => {
                if let Some(Token::Str(value)) = self.next() {
                    Ok(Expression::Literal(self.finish_literal(value)?))
                } else {
                    unreachable!()
                }
            }
            Some(Token::Integer(value)) => {
                self.next();
                Ok(Expression::Literal(Literal::typed(
                    value,
                    Iri::new(xsd::INTEGER),
                )))
            }
            Some(Token::Decimal(value)) => {
                self.next();
                Ok(Expression::Literal(Literal::typed(
                    value,
                    Iri::new(xsd::DECIMAL),
                )))
            }
            Some(Token::Double(value)) => {
                self.next();
                Ok(Expression::Literal(Literal::typed(
                    value,
                    Iri::new(xsd::DOUBLE),
                )))
            }
            Some(Token::True) => {
                self.next();
                Ok(Expression::Literal(Literal::boolean(true)))
            }
            Some(Token::False) => {
                self.next();
                Ok(Expression::Literal(Literal::boolean(false)))
            }
            Some(Token::Exists) => {
                self.next();
                let pattern = self.parse_group_graph_pattern()?;
                Ok(Expression::Exists(Box::new(pattern)))
            }
            Some(Token::Not) => {
                self.next();
                self.expect(Token::Exists, "NOT EXISTS")?;
                let pattern = self.parse_group_graph_pattern()?;
                Ok(Expression::NotExists(Box::new(pattern)))
            }
            Some(Token::Ident(name)) => {
                self.next();
                let args = self.parse_call_arguments(&name)?;
                Ok(Expression::FunctionCall(name.to_ascii_uppercase(), args))
            }
            Some(Token::IriRef(_)) | Some(Token::PNameLn(_)) => {
                let iri = self.parse_iri()?;
                if self.peek() == Some(&Token::LParen) {
                    let args = self.parse_call_arguments(iri.as_str())?;
                    Ok(Expression::FunctionCall(iri.0, args))
                } else {
                    Ok(Expression::Iri(iri))
                }
            }
            Some(Token::Count) => self.parse_aggregate(AggregateFunction::Count),
            Some(Token::Sum) => self.parse_aggregate(AggregateFunction::Sum),
            Some(Token::Avg) => self.parse_aggregate(AggregateFunction::Avg),
            Some(Token::MinKw) => self.parse_aggregate(AggregateFunction::Min),
            Some(Token::MaxKw) => self.parse_aggregate(AggregateFunction::Max),
            Some(Token::Sample) => self.parse_aggregate(AggregateFunction::Sample),
            Some(Token::GroupConcat) => self.parse_group_concat(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call_arguments(&mut self, name: &str) -> Result<Vec<AstExpr>, SparqlError> {
        self.expect(Token::LParen, name)?;
        let mut args = Vec::new();
        if self.accept(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, name)?;
        Ok(args)
    }

    fn parse_aggregate(&mut self, function: AggregateFunction) -> Result<AstExpr, SparqlError> {
        self.next();
        self.expect(Token::LParen, "aggregate")?;
        let distinct = self.accept(&Token::Distinct);
        let expr = if function == AggregateFunction::Count && self.accept(&Token::Star) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(Token::RParen, "aggregate")?;
        Ok(Expression::Aggregate {
            function,
            distinct,
            expr,
            separator: None,
        })
    }

    fn parse_group_concat(&mut self) -> Result<AstExpr, SparqlError> {
        self.next();
        self.expect(Token::LParen, "GROUP_CONCAT")?;
        let distinct = self.accept(&Token::Distinct);
        let expr = Box::new(self.parse_expression()?);
        let mut separator = None;
        if self.accept(&Token::Semicolon) {
            self.expect(Token::Separator, "GROUP_CONCAT")?;
            self.expect(Token::Eq, "GROUP_CONCAT separator")?;
            match self.next() {
                Some(Token::Str(value)) => separator = Some(value),
                other => {
                    return Err(SparqlError::ParseError(format!(
                        "expected separator string, found {:?}",
                        other
                    )))
                }
            }
        }
        self.expect(Token::RParen, "GROUP_CONCAT")?;
        Ok(Expression::Aggregate {
            function: AggregateFunction::GroupConcat,
            distinct,
            expr: Some(expr),
            separator,
        })
    }
}
