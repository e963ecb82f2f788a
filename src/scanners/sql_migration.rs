//! SQL migration scanner.
//!
//! Migration files are replayed in version order (Flyway `V1__`, `V2__`, ...,
//! repeatable `R__` scripts last; golang-migrate `000001_x.up.sql`), so the
//! resulting tables reflect the schema after the last migration:
//! - `CREATE TABLE` defines a table with its columns, primary key and
//!   foreign keys
//! - `ALTER TABLE ... ADD [COLUMN]`, `DROP [COLUMN]`, `ADD [CONSTRAINT ..]
//!   FOREIGN KEY / PRIMARY KEY` amend it
//! - `DROP TABLE` removes it
//!
//! Identifiers are case-folded to lower case; types to upper case.

use anyhow::bail;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::support;
use crate::model::{DataEntity, Field};
use crate::scanner::{Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine};

const PATTERNS: &[&str] = &[
    "**/V*.sql",
    "**/R__*.sql",
    "**/*.up.sql",
    "**/changelog*.sql",
    "**/migrations/*.sql",
    "**/db/*.sql",
    "**/schema.sql",
];

/// Words that end a column's type.
const COLUMN_KEYWORDS: &[&str] = &[
    "NOT", "NULL", "PRIMARY", "REFERENCES", "DEFAULT", "UNIQUE", "CHECK", "CONSTRAINT", "GENERATED",
    "AUTO_INCREMENT", "AUTOINCREMENT", "IDENTITY", "COLLATE", "COMMENT", "ON",
];

/// Leading words of a table-level constraint.
const CONSTRAINT_KEYWORDS: &[&str] = &["PRIMARY", "FOREIGN", "CONSTRAINT", "UNIQUE", "CHECK", "INDEX", "KEY", "EXCLUDE"];

lazy_static! {
    static ref LINE_COMMENT: Regex = Regex::new(r"--[^\n]*").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref CREATE_TABLE: Regex = Regex::new(
        r#"(?is)^\s*CREATE\s+(?:(?:GLOBAL\s+|LOCAL\s+)?TEMP(?:ORARY)?\s+|UNLOGGED\s+)?TABLE\s+(IF\s+NOT\s+EXISTS\s+)?([\w."`\[\]]+)\s*\("#
    )
    .unwrap();
    static ref ALTER_TABLE: Regex =
        Regex::new(r#"(?is)^\s*ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?([\w."`\[\]]+)\s+(.*)$"#).unwrap();
    static ref DROP_TABLE: Regex =
        Regex::new(r#"(?is)^\s*DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?(.+?)(?:\s+(?:CASCADE|RESTRICT))?\s*$"#).unwrap();
    static ref ADD_ACTION: Regex =
        Regex::new(r"(?is)^\s*ADD\s+(?:COLUMN\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(.+)$").unwrap();
    static ref DROP_COLUMN_ACTION: Regex =
        Regex::new(r#"(?is)^\s*DROP\s+(?:COLUMN\s+)?(?:IF\s+EXISTS\s+)?([\w"`\[\]]+)"#).unwrap();
    static ref PRIMARY_KEY: Regex = Regex::new(r"(?is)PRIMARY\s+KEY\s*\(([^)]*)\)").unwrap();
    static ref FOREIGN_KEY: Regex =
        Regex::new(r#"(?is)FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+([\w."`\[\]]+)"#).unwrap();
    static ref INLINE_REFERENCES: Regex = Regex::new(r#"(?is)\bREFERENCES\s+([\w."`\[\]]+)"#).unwrap();
    static ref NOT_NULL: Regex = Regex::new(r"(?i)\bNOT\s+NULL\b").unwrap();
    static ref INLINE_PRIMARY_KEY: Regex = Regex::new(r"(?i)\bPRIMARY\s+KEY\b").unwrap();
    static ref VERSION: Regex = Regex::new(r"^[Vv]?(\d+(?:[._]\d+)*)").unwrap();
}

pub struct SqlMigrationScanner;

impl Scanner for SqlMigrationScanner {
    fn id(&self) -> &'static str {
        "sql-migrations"
    }

    fn display_name(&self) -> &'static str {
        "SQL Migrations"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["sql"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        60
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

impl SqlMigrationScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let engine = TierEngine::regex_only(self.id(), |file: &Path, content: &str| {
            Ok(vec![Migration {
                order: MigrationOrder::of(file),
                source: file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                statements: parse_statements(content)?,
            }])
        })
        .with_pre_filter(|p: &Path| !p.to_string_lossy().ends_with(".down.sql"));

        let files = ctx.find_files_any(PATTERNS)?;
        let (mut migrations, stats) = engine.parse_files(ctx, &files);
        migrations.sort_by(|a, b| a.order.cmp(&b.order));

        let database = support::database_component(ctx).with_technology("SQL");
        let mut findings = Findings::new();
        findings.data_entities = replay(&database.id, &migrations);
        if !findings.data_entities.is_empty() {
            findings.components.push(database);
        }
        Ok(support::finish(self.id(), findings, stats))
    }
}

/// Sort key: versioned scripts by version, then repeatable ones, then the
/// rest by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MigrationOrder {
    repeatable: bool,
    version: Vec<u64>,
    name: String,
}

impl MigrationOrder {
    fn of(file: &Path) -> Self {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let version = VERSION
            .captures(&name)
            .map(|c| {
                c[1].split(|ch| ch == '.' || ch == '_')
                    .filter_map(|part| part.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            repeatable: name.starts_with("R__"),
            version,
            name,
        }
    }
}

#[derive(Debug)]
struct Migration {
    order: MigrationOrder,
    source: String,
    statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    CreateTable { table: TableDef, if_not_exists: bool },
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: String },
    AddForeignKey { table: String, column: String, references: String },
    AddPrimaryKey { table: String, columns: Vec<String> },
    DropTable(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    data_type: String,
    nullable: bool,
    primary_key: bool,
    references: Option<String>,
}

impl Column {
    fn to_field(&self) -> Field {
        let field = Field::new(self.name.clone(), self.data_type.clone(), self.nullable);
        match &self.references {
            Some(target) => field.with_references(target.clone()),
            None => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TableDef {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

/// Quoted, bracketed or schema-qualified identifier → bare lower-case name.
fn identifier(raw: &str) -> String {
    raw.trim()
        .rsplit('.')
        .next()
        .unwrap_or("")
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_lowercase()
}

fn identifier_list(raw: &str) -> Vec<String> {
    raw.split(',').map(identifier).filter(|c| !c.is_empty()).collect()
}

/// Split on `separator` outside parentheses and single-quoted strings.
fn split_outside(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            c if c == separator && !in_string && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Byte index of the parenthesis closing the one just before `from`.
fn closing_paren(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut in_string = false;
    for (i, c) in text[from..].char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_statements(content: &str) -> anyhow::Result<Vec<Statement>> {
    let without_blocks = BLOCK_COMMENT.replace_all(content, " ");
    let cleaned = LINE_COMMENT.replace_all(&without_blocks, "");

    let mut statements = Vec::new();
    for text in split_outside(&cleaned, ';') {
        if let Some(caps) = CREATE_TABLE.captures(text) {
            let name = identifier(&caps[2]);
            let body_start = caps.get(0).map_or(0, |m| m.end());
            let Some(body_end) = closing_paren(text, body_start) else {
                bail!("unterminated CREATE TABLE {}", name);
            };
            statements.push(Statement::CreateTable {
                table: parse_table(name, &text[body_start..body_end]),
                if_not_exists: caps.get(1).is_some(),
            });
        } else if let Some(caps) = ALTER_TABLE.captures(text) {
            let table = identifier(&caps[1]);
            for action in split_outside(&caps[2], ',') {
                statements.extend(parse_alter_action(&table, action));
            }
        } else if let Some(caps) = DROP_TABLE.captures(text) {
            statements.extend(identifier_list(&caps[1]).into_iter().map(Statement::DropTable));
        }
    }
    Ok(statements)
}

fn parse_table(name: String, body: &str) -> TableDef {
    let mut table = TableDef {
        name,
        columns: Vec::new(),
        primary_key: Vec::new(),
    };
    let mut foreign_keys = Vec::new();

    for item in split_outside(body, ',') {
        let first = item.split_whitespace().next().unwrap_or("").to_uppercase();
        if CONSTRAINT_KEYWORDS.contains(&first.as_str()) {
            if let Some(caps) = PRIMARY_KEY.captures(item) {
                table.primary_key = identifier_list(&caps[1]);
            }
            if let Some(caps) = FOREIGN_KEY.captures(item) {
                for column in identifier_list(&caps[1]) {
                    foreign_keys.push((column, identifier(&caps[2])));
                }
            }
            continue;
        }
        if let Some(column) = parse_column(item) {
            table.columns.push(column);
        }
    }

    if table.primary_key.is_empty() {
        table.primary_key = table
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
    }
    for column in table.columns.iter_mut() {
        if table.primary_key.contains(&column.name) {
            column.primary_key = true;
            column.nullable = false;
        }
        if let Some((_, target)) = foreign_keys.iter().find(|(c, _)| *c == column.name) {
            column.references = Some(target.clone());
        }
    }
    table
}

/// `price DECIMAL(10, 2) NOT NULL DEFAULT 0` → column `price`, type
/// `DECIMAL(10, 2)`, not nullable.
fn parse_column(item: &str) -> Option<Column> {
    let normalized = item.split_whitespace().collect::<Vec<_>>().join(" ");
    let tokens = split_outside(&normalized, ' ');
    let mut tokens = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty());
    let name = identifier(tokens.next()?);
    let type_tokens: Vec<&str> = tokens
        .take_while(|t| !COLUMN_KEYWORDS.contains(&t.to_uppercase().as_str()))
        .collect();
    if name.is_empty() || type_tokens.is_empty() {
        return None;
    }
    let primary_key = INLINE_PRIMARY_KEY.is_match(item);
    Some(Column {
        name,
        data_type: type_tokens.join(" ").to_uppercase(),
        nullable: !(primary_key || NOT_NULL.is_match(item)),
        primary_key,
        references: INLINE_REFERENCES.captures(item).map(|c| identifier(&c[1])),
    })
}

fn parse_alter_action(table: &str, action: &str) -> Vec<Statement> {
    if let Some(caps) = ADD_ACTION.captures(action) {
        let added = caps[1].trim();
        let first = added.split_whitespace().next().unwrap_or("").to_uppercase();
        if CONSTRAINT_KEYWORDS.contains(&first.as_str()) {
            let mut statements = Vec::new();
            if let Some(fk) = FOREIGN_KEY.captures(added) {
                let references = identifier(&fk[2]);
                for column in identifier_list(&fk[1]) {
                    statements.push(Statement::AddForeignKey {
                        table: table.to_string(),
                        column,
                        references: references.clone(),
                    });
                }
            } else if let Some(pk) = PRIMARY_KEY.captures(added) {
                statements.push(Statement::AddPrimaryKey {
                    table: table.to_string(),
                    columns: identifier_list(&pk[1]),
                });
            }
            return statements;
        }
        return parse_column(added)
            .map(|column| Statement::AddColumn {
                table: table.to_string(),
                column,
            })
            .into_iter()
            .collect();
    }

    let upper = action.trim_start().to_uppercase();
    if upper.starts_with("DROP CONSTRAINT") || upper.starts_with("DROP PRIMARY") || upper.starts_with("DROP INDEX") {
        return Vec::new();
    }
    DROP_COLUMN_ACTION
        .captures(action)
        .map(|caps| Statement::DropColumn {
            table: table.to_string(),
            column: identifier(&caps[1]),
        })
        .into_iter()
        .collect()
}

fn to_entity(database_id: &str, table: &TableDef, source: &str) -> DataEntity {
    let mut entity = DataEntity::table(database_id, table.name.clone());
    entity.fields = table.columns.iter().map(Column::to_field).collect();
    entity.primary_key = if table.primary_key.is_empty() {
        table.columns.iter().find(|c| c.name == "id").map(|c| c.name.clone())
    } else {
        Some(table.primary_key.join(", "))
    };
    entity.description = Some(format!("Defined in {}", source));
    entity
}

/// Apply every statement in migration order.
fn replay(database_id: &str, migrations: &[Migration]) -> Vec<DataEntity> {
    let mut tables: Vec<DataEntity> = Vec::new();
    let position = |tables: &[DataEntity], name: &str| tables.iter().position(|t| t.name == name);

    for migration in migrations {
        for statement in &migration.statements {
            match statement {
                Statement::CreateTable { table, if_not_exists } => {
                    let entity = to_entity(database_id, table, &migration.source);
                    match position(&tables, &table.name) {
                        Some(_) if *if_not_exists => {}
                        Some(i) => tables[i] = entity,
                        None => tables.push(entity),
                    }
                }
                Statement::DropTable(name) => {
                    tables.retain(|t| &t.name != name);
                }
                Statement::AddColumn { table, column } => match position(&tables, table) {
                    Some(i) => {
                        let fields = &mut tables[i].fields;
                        fields.retain(|f| f.name != column.name);
                        fields.push(column.to_field());
                        if column.primary_key {
                            tables[i].primary_key = Some(column.name.clone());
                        }
                    }
                    None => tracing::debug!(table = %table, file = %migration.source, "ALTER of unknown table"),
                },
                Statement::DropColumn { table, column } => {
                    if let Some(i) = position(&tables, table) {
                        tables[i].fields.retain(|f| &f.name != column);
                    }
                }
                Statement::AddForeignKey { table, column, references } => {
                    if let Some(i) = position(&tables, table) {
                        if let Some(field) = tables[i].fields.iter_mut().find(|f| &f.name == column) {
                            field.references = Some(references.clone());
                        }
                    }
                }
                Statement::AddPrimaryKey { table, columns } => {
                    if let Some(i) = position(&tables, table) {
                        for field in tables[i].fields.iter_mut().filter(|f| columns.contains(&f.name)) {
                            field.nullable = false;
                        }
                        tables[i].primary_key = Some(columns.join(", "));
                    }
                }
            }
        }
    }
    tables
}
