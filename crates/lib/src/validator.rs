//! # SQL Validation
//!
//! Checks a candidate without mutating data: it must parse as exactly one query,
//! reference only tables and columns of the schema context, keep its aggregate and
//! `GROUP BY` shape consistent, and (optionally) compile on the backend through
//! `sql_checker`. Every finding is a [`Diagnostic`] precise enough to drive a repair.

use crate::{
    config::SqlDialect,
    errors::AgentError,
    tools::ToolPort,
    types::{
        Diagnostic, QueryCandidate, SchemaContext, TableCandidate, ToolCallRecord, ToolName,
        ValidationResult,
    },
};
use sqlparser::{
    ast::{visit_expressions, visit_relations, Expr, Ident, Statement},
    keywords::Keyword,
    parser::Parser,
    tokenizer::{Token, Tokenizer, Word},
};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{debug, info};

const AGGREGATES: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "TOTAL",
    "GROUP_CONCAT",
    "STRING_AGG",
    "ARRAY_AGG",
];

/// Bare words the parser may surface as identifiers that are not column references.
const NON_COLUMN_IDENTS: &[&str] = &[
    "current_date",
    "current_time",
    "current_timestamp",
    "true",
    "false",
    "null",
];

/// A validation verdict plus the dry-run tool call it made, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub result: ValidationResult,
    pub dry_run: Option<ToolCallRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlValidator {
    dialect: SqlDialect,
    dry_run: bool,
}

impl SqlValidator {
    pub fn new(dialect: SqlDialect, dry_run: bool) -> Self {
        Self { dialect, dry_run }
    }

    /// Validates `candidate` against `context`. The dry-run through `tools` only
    /// happens when it is enabled and the static checks found no error.
    pub async fn validate(
        &self,
        candidate: &QueryCandidate,
        context: &SchemaContext,
        tools: &dyn ToolPort,
    ) -> Result<Validation, AgentError> {
        let mut diagnostics = self.static_checks(&candidate.sql_text, context);
        let mut dry_run = None;

        if self.dry_run && !diagnostics.iter().any(Diagnostic::is_error) {
            let started = Instant::now();
            let report = tools.sql_checker(&candidate.sql_text).await?;
            let detail = report
                .message
                .clone()
                .unwrap_or_else(|| "query compiles".to_string());
            dry_run = Some(ToolCallRecord {
                tool: ToolName::SqlChecker,
                input: candidate.sql_text.clone(),
                ok: report.ok,
                detail: detail.clone(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                cached: false,
            });
            if !report.ok {
                diagnostics.push(
                    Diagnostic::error(format!("the database rejected the query: {detail}"))
                        .at("dry-run"),
                );
            }
        }

        let result = ValidationResult::for_candidate(candidate, diagnostics);
        info!(
            attempt = candidate.attempt_number,
            is_valid = result.is_valid,
            errors = result.errors().count(),
            "Validated query candidate"
        );
        Ok(Validation { result, dry_run })
    }

    /// The checks that need nothing but the text and the schema context.
    pub fn static_checks(&self, sql: &str, context: &SchemaContext) -> Vec<Diagnostic> {
        let sql = sql.trim();
        if sql.is_empty() {
            return vec![Diagnostic::error("the query text is empty")];
        }

        let dialect = self.dialect.parser_dialect();
        let statements = match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) => statements,
            Err(e) => return vec![Diagnostic::error(format!("syntax error: {e}")).at("parse")],
        };
        if statements.len() != 1 {
            return vec![Diagnostic::error(format!(
                "expected exactly one statement, found {}",
                statements.len()
            ))];
        }
        let statement = &statements[0];
        if !matches!(statement, Statement::Query(_)) {
            return vec![Diagnostic::error(
                "only read-only SELECT queries are allowed",
            )];
        }

        let tokens: Vec<Token> = match Tokenizer::new(dialect.as_ref(), sql).tokenize() {
            Ok(tokens) => tokens
                .into_iter()
                .filter(|t| !matches!(t, Token::Whitespace(_)))
                .collect(),
            Err(e) => return vec![Diagnostic::error(format!("syntax error: {e}")).at("parse")],
        };

        let mut diagnostics = Vec::new();
        let names = QueryNames::collect(statement, &tokens);
        check_relations(&names, context, &mut diagnostics);
        check_columns(statement, &names, context, &mut diagnostics);
        check_select_shape(&tokens, &mut diagnostics);

        let mut seen = HashSet::new();
        diagnostics.retain(|d| seen.insert(d.to_string()));
        debug!(?diagnostics, "Static validation finished");
        diagnostics
    }
}

// --- Names declared and referenced by a statement ---

#[derive(Debug, Default)]
struct QueryNames {
    /// Referenced relations as written (possibly qualified), in order.
    relations: Vec<String>,
    /// CTE names, lower-cased.
    ctes: HashSet<String>,
    /// Every alias the query declares (columns, tables, subqueries), lower-cased.
    aliases: HashSet<String>,
    /// Table aliases mapped to the relation they stand for, lower-cased.
    table_aliases: HashMap<String, String>,
}

impl QueryNames {
    fn collect(statement: &Statement, tokens: &[Token]) -> Self {
        let mut names = QueryNames::default();

        let _ = visit_relations(statement, |relation| {
            let name = relation
                .0
                .iter()
                .map(|i| i.value.as_str())
                .collect::<Vec<_>>()
                .join(".");
            if !names.relations.contains(&name) {
                names.relations.push(name);
            }
            ControlFlow::<()>::Continue(())
        });

        let relation_last: HashSet<String> = names
            .relations
            .iter()
            .map(|r| last_segment(r).to_lowercase())
            .collect();

        for i in 1..tokens.len() {
            let prev = &tokens[i - 1];
            match &tokens[i] {
                // `name AS (` opens a CTE body.
                Token::LParen if is_keyword(prev, Keyword::AS) => {
                    if let Some(Token::Word(w)) = i.checked_sub(2).map(|j| &tokens[j]) {
                        names.ctes.insert(w.value.to_lowercase());
                    }
                }
                Token::Word(current) => {
                    let declared_by_as = is_keyword(prev, Keyword::AS);
                    let implicit = is_bare_word(current)
                        && match prev {
                            Token::Word(p) => is_bare_word(p) || p.keyword == Keyword::END,
                            Token::RParen => true,
                            _ => false,
                        };
                    if !(declared_by_as || implicit) {
                        continue;
                    }
                    let alias = current.value.to_lowercase();
                    let target = if declared_by_as { i.checked_sub(2) } else { Some(i - 1) };
                    if let Some(Token::Word(t)) = target.map(|j| &tokens[j]) {
                        let target_name = t.value.to_lowercase();
                        let is_qualifier = tokens.get(i + 1) == Some(&Token::Period);
                        if relation_last.contains(&target_name) && !is_qualifier {
                            names.table_aliases.insert(alias.clone(), target_name);
                        }
                    }
                    names.aliases.insert(alias);
                }
                _ => {}
            }
        }
        names
    }

    fn is_cte(&self, name: &str) -> bool {
        self.ctes.contains(&last_segment(name).to_lowercase())
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn is_keyword(token: &Token, keyword: Keyword) -> bool {
    matches!(token, Token::Word(w) if w.keyword == keyword && w.quote_style.is_none())
}

fn is_bare_word(word: &Word) -> bool {
    word.keyword == Keyword::NoKeyword || word.quote_style.is_some()
}

// --- Relations and columns ---

fn check_relations(names: &QueryNames, context: &SchemaContext, diagnostics: &mut Vec<Diagnostic>) {
    for relation in &names.relations {
        if names.is_cte(relation) || context.table(relation).is_some() {
            continue;
        }
        diagnostics.push(
            Diagnostic::error(format!(
                "table `{relation}` not found in the schema context (available tables: {})",
                context.table_names().join(", ")
            ))
            .at(format!("table {relation}")),
        );
    }
}

fn check_columns(
    statement: &Statement,
    names: &QueryNames,
    context: &SchemaContext,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let referenced: Vec<&TableCandidate> = {
        let mut tables: Vec<&TableCandidate> = Vec::new();
        for relation in names.relations.iter().filter(|r| !names.is_cte(r)) {
            if let Some(table) = context.table(relation) {
                if !tables.iter().any(|t| t.identity() == table.identity()) {
                    tables.push(table);
                }
            }
        }
        tables
    };

    let mut identifiers: Vec<Ident> = Vec::new();
    let mut compounds: Vec<Vec<Ident>> = Vec::new();
    let _ = visit_expressions(statement, |expr| {
        match expr {
            Expr::Identifier(ident) => identifiers.push(ident.clone()),
            Expr::CompoundIdentifier(idents) => compounds.push(idents.clone()),
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });

    for ident in identifiers {
        let name = ident.value.to_lowercase();
        if referenced.is_empty()
            || names.aliases.contains(&name)
            || names.ctes.contains(&name)
            || NON_COLUMN_IDENTS.contains(&name.as_str())
            || referenced.iter().any(|t| t.column(&ident.value).is_some())
        {
            continue;
        }
        let tables = referenced
            .iter()
            .map(|t| format!("`{}`", t.name))
            .collect::<Vec<_>>()
            .join(", ");
        let noun = if referenced.len() == 1 { "table" } else { "tables" };
        let mut message = format!("column `{}` not found in {noun} {tables}", ident.value);
        if let Some(suggestion) = suggest_column(&ident.value, &referenced) {
            message.push_str(&format!("; did you mean `{suggestion}`?"));
        }
        if ident.quote_style == Some('"') {
            message.push_str(" (use single quotes for string literals)");
        }
        diagnostics.push(Diagnostic::error(message).at(format!("column {}", ident.value)));
    }

    for idents in compounds {
        if idents.len() < 2 {
            continue;
        }
        let column = &idents[idents.len() - 1].value;
        let qualifier = idents[idents.len() - 2].value.to_lowercase();

        let resolved = names.table_aliases.get(&qualifier).cloned().or_else(|| {
            names
                .relations
                .iter()
                .any(|r| last_segment(r).eq_ignore_ascii_case(&qualifier))
                .then(|| qualifier.clone())
        });

        match resolved {
            Some(relation) => {
                if names.is_cte(&relation) {
                    continue;
                }
                let Some(table) = context.table(&relation) else {
                    continue;
                };
                if table.column(column).is_none() {
                    let mut message =
                        format!("column `{column}` not found in table `{}`", table.name);
                    if let Some(suggestion) = suggest_column(column, &[table]) {
                        message.push_str(&format!("; did you mean `{suggestion}`?"));
                    }
                    diagnostics
                        .push(Diagnostic::error(message).at(format!("column {qualifier}.{column}")));
                }
            }
            None if names.aliases.contains(&qualifier) || names.ctes.contains(&qualifier) => {}
            None => diagnostics.push(
                Diagnostic::error(format!(
                    "table or alias `{qualifier}` is not defined in the query"
                ))
                .at(format!("column {qualifier}.{column}")),
            ),
        }
    }
}

/// The column whose `_`-separated parts best match `name`, by prefix.
fn suggest_column(name: &str, tables: &[&TableCandidate]) -> Option<String> {
    let wanted: Vec<String> = name.to_lowercase().split('_').map(String::from).collect();
    let mut best: Option<(usize, &str)> = None;

    for column in tables.iter().flat_map(|t| t.columns.iter()) {
        let parts: Vec<String> = column.name.to_lowercase().split('_').map(String::from).collect();
        let score = wanted
            .iter()
            .filter(|w| {
                !w.is_empty()
                    && parts
                        .iter()
                        .any(|p| p.starts_with(w.as_str()) || w.starts_with(p.as_str()))
            })
            .count();
        if score > 0 && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, column.name.as_str()));
        }
    }
    best.map(|(_, name)| name.to_string())
}

// --- Aggregate / GROUP BY shape of the outer SELECT ---

#[derive(Debug, Default)]
struct SelectShape {
    projection: Vec<Vec<Token>>,
    group_by: Option<Vec<Vec<Token>>>,
    has_limit: bool,
    is_compound: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Before,
    Projection,
    Body,
    GroupBy,
}

fn outer_select_shape(tokens: &[Token]) -> Option<SelectShape> {
    let mut shape = SelectShape::default();
    let mut section = Section::Before;
    let mut depth = 0usize;
    let mut item: Vec<Token> = Vec::new();
    let mut groups: Vec<Vec<Token>> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let at_top = depth == 0;
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }

        if at_top {
            if let Token::Word(w) = token {
                if w.quote_style.is_none() {
                    match (section, w.keyword) {
                        (Section::Before, Keyword::SELECT) => {
                            section = Section::Projection;
                            continue;
                        }
                        (Section::Before, _) => continue,
                        (Section::Projection, Keyword::FROM) => {
                            shape.projection.push(std::mem::take(&mut item));
                            section = Section::Body;
                            continue;
                        }
                        (_, Keyword::GROUP) if is_keyword_at(tokens, i + 1, Keyword::BY) => {
                            section = Section::GroupBy;
                            continue;
                        }
                        (Section::GroupBy, Keyword::BY) if item.is_empty() && groups.is_empty() => {
                            continue;
                        }
                        (Section::Projection | Section::Body | Section::GroupBy, kw)
                            if matches!(
                                kw,
                                Keyword::HAVING
                                    | Keyword::ORDER
                                    | Keyword::LIMIT
                                    | Keyword::OFFSET
                                    | Keyword::FETCH
                                    | Keyword::WINDOW
                                    | Keyword::QUALIFY
                                    | Keyword::UNION
                                    | Keyword::INTERSECT
                                    | Keyword::EXCEPT
                            ) =>
                        {
                            if matches!(kw, Keyword::LIMIT | Keyword::FETCH) {
                                shape.has_limit = true;
                            }
                            if matches!(kw, Keyword::UNION | Keyword::INTERSECT | Keyword::EXCEPT) {
                                shape.is_compound = true;
                            }
                            flush(&mut section, &mut shape, &mut item, &mut groups);
                            section = Section::Body;
                            continue;
                        }
                        _ => {}
                    }
                }
            }
            if matches!(token, Token::Comma)
                && matches!(section, Section::Projection | Section::GroupBy)
            {
                match section {
                    Section::Projection => shape.projection.push(std::mem::take(&mut item)),
                    _ => groups.push(std::mem::take(&mut item)),
                }
                continue;
            }
            if matches!(token, Token::SemiColon | Token::EOF) {
                continue;
            }
        }

        if matches!(section, Section::Projection | Section::GroupBy) {
            item.push(token.clone());
        }
    }
    flush(&mut section, &mut shape, &mut item, &mut groups);

    (!shape.projection.is_empty()).then_some(shape)
}

fn flush(
    section: &mut Section,
    shape: &mut SelectShape,
    item: &mut Vec<Token>,
    groups: &mut Vec<Vec<Token>>,
) {
    match section {
        Section::Projection => {
            if !item.is_empty() {
                shape.projection.push(std::mem::take(item));
            }
        }
        Section::GroupBy => {
            if !item.is_empty() {
                groups.push(std::mem::take(item));
            }
            if shape.group_by.is_none() {
                shape.group_by = Some(std::mem::take(groups));
            }
        }
        _ => {}
    }
    *section = Section::Body;
}

fn is_keyword_at(tokens: &[Token], i: usize, keyword: Keyword) -> bool {
    tokens.get(i).is_some_and(|t| is_keyword(t, keyword))
}

/// One projected expression with its alias split off.
struct SelectItem {
    expr: Vec<Token>,
    alias: Option<String>,
}

impl SelectItem {
    fn parse(tokens: &[Token]) -> Self {
        let mut tokens: Vec<Token> = tokens.to_vec();
        if let Some(first) = tokens.first() {
            if is_keyword(first, Keyword::DISTINCT) || is_keyword(first, Keyword::ALL) {
                tokens.remove(0);
            }
        }

        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                t if depth == 0 && is_keyword(t, Keyword::AS) => {
                    let alias = match tokens.get(i + 1) {
                        Some(Token::Word(w)) => Some(w.value.to_lowercase()),
                        _ => None,
                    };
                    return Self {
                        expr: tokens[..i].to_vec(),
                        alias,
                    };
                }
                _ => {}
            }
        }

        let n = tokens.len();
        if n >= 2 {
            if let (Token::Word(last), prev) = (&tokens[n - 1], &tokens[n - 2]) {
                let implicit = is_bare_word(last)
                    && match prev {
                        Token::Word(p) => is_bare_word(p) || p.keyword == Keyword::END,
                        Token::RParen => true,
                        _ => false,
                    };
                if implicit {
                    return Self {
                        alias: Some(last.value.to_lowercase()),
                        expr: tokens[..n - 1].to_vec(),
                    };
                }
            }
        }
        Self {
            expr: tokens,
            alias: None,
        }
    }

    /// Whether the item holds an aggregate call that collapses rows. `SUM(x) OVER (..)`
    /// is a window call and does not.
    fn is_aggregate(&self) -> bool {
        self.expr.iter().enumerate().any(|(i, t)| match t {
            Token::Word(w) if w.quote_style.is_none() => {
                AGGREGATES.contains(&w.value.to_uppercase().as_str())
                    && matches!(self.expr.get(i + 1), Some(Token::LParen))
                    && !closing_paren(&self.expr, i + 1)
                        .is_some_and(|close| is_keyword_at(&self.expr, close + 1, Keyword::OVER))
            }
            _ => false,
        })
    }

    fn is_window(&self) -> bool {
        self.expr.iter().any(|t| is_keyword(t, Keyword::OVER))
    }

    fn is_wildcard(&self) -> bool {
        matches!(self.expr.last(), Some(Token::Mul))
    }

    /// Whether the expression reads any column (function names excluded).
    fn references_columns(&self) -> bool {
        self.expr.iter().enumerate().any(|(i, t)| match t {
            Token::Word(w) => {
                is_bare_word(w) && !matches!(self.expr.get(i + 1), Some(Token::LParen))
            }
            _ => false,
        })
    }

    fn key(&self) -> String {
        token_key(&self.expr)
    }

    /// For `col` or `t.col`, the lower-cased column name.
    fn simple_column(&self) -> Option<String> {
        simple_column(&self.expr)
    }
}

/// Index of the `)` matching the `(` at `open`.
fn closing_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn token_key(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<String>()
        .to_lowercase()
}

fn simple_column(tokens: &[Token]) -> Option<String> {
    let words_and_dots = tokens.iter().enumerate().all(|(i, t)| match t {
        Token::Word(_) => i % 2 == 0,
        Token::Period => i % 2 == 1,
        _ => false,
    });
    match tokens.last() {
        Some(Token::Word(w)) if words_and_dots => Some(w.value.to_lowercase()),
        _ => None,
    }
}

fn check_select_shape(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) {
    let Some(shape) = outer_select_shape(tokens) else {
        return;
    };
    let items: Vec<SelectItem> = shape.projection.iter().map(|t| SelectItem::parse(t)).collect();
    let aggregated = items.iter().any(SelectItem::is_aggregate);

    if !shape.has_limit && !aggregated && shape.group_by.is_none() {
        diagnostics.push(Diagnostic::warning(
            "the query has no LIMIT; results will be cut at the row cap",
        ));
    }

    if shape.is_compound || !aggregated || items.iter().any(SelectItem::is_wildcard) {
        return;
    }

    let groups = shape.group_by.unwrap_or_default();
    let group_keys: HashSet<String> = groups.iter().map(|g| token_key(g)).collect();
    let group_columns: HashSet<String> = groups.iter().filter_map(|g| simple_column(g)).collect();
    let group_positions: HashSet<usize> = groups
        .iter()
        .filter_map(|g| match g.as_slice() {
            [Token::Number(n, _)] => n.parse().ok(),
            _ => None,
        })
        .collect();

    for (i, item) in items.iter().enumerate() {
        // Window items are evaluated after grouping; their inputs are not checked here.
        if item.is_aggregate() || item.is_window() || !item.references_columns() {
            continue;
        }
        let grouped = group_keys.contains(&item.key())
            || group_positions.contains(&(i + 1))
            || item
                .simple_column()
                .is_some_and(|c| group_columns.contains(&c))
            || item.alias.as_ref().is_some_and(|a| group_columns.contains(a));
        if !grouped {
            let expr = item
                .expr
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            diagnostics.push(
                Diagnostic::error(format!(
                    "`{expr}` must appear in the GROUP BY clause or be used in an aggregate function"
                ))
                .at(format!("select item {}", i + 1)),
            );
        }
    }
}
