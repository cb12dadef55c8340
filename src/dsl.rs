//! Query script parser and runner.
//!
//! Script format, one command per line:
//! ```text
//! # comment
//! FILTER temperature > 0.4
//! | SORT mobility DESC
//! | PROJECT mode temperature mobility
//! | GET
//! ```
//!
//! - A leading `|` is optional and only there for readability
//! - Lines starting with `#` are comments
//! - Keywords are case-insensitive, column names are not
//!
//! Supported commands:
//! - `SORT col [ASC|DESC]` - Sort by one column
//! - `FILTER left [op] right` - Keep rows where `left op right` (op defaults to `==`)
//! - `PROJECT col...` - Restrict output columns (alias: `SELECT`)
//! - `RESET` - Drop filters, ordering and projection
//! - `GET` - Emit the current rows and reset
//! - `GROUP col` - Emit rows grouped by consecutive runs of `col` and reset
//!
//! FILTER operands are column names or literals. A double-quoted operand is
//! always a string literal; a bare one is a column if the summary has one
//! by that name, otherwise a number, otherwise a string. If the script does
//! not end with `GET` or `GROUP`, a final `GET` is implied.

use log::debug;

use crate::error::{Result, SummaryError};
use crate::grouping::Groups;
use crate::query::{Operand, Operator, ResultSet, SummaryParser};
use crate::schema::FormatConfig;
use crate::types::Value;

/// Parsed script command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// SORT col [ASC|DESC]
    Sort { column: String, descending: bool },
    /// FILTER left [op] right
    Filter {
        left: Operand,
        op: Operator,
        right: Operand,
    },
    /// PROJECT col...
    Project { columns: Vec<String> },
    /// RESET
    Reset,
    /// GET
    Get,
    /// GROUP col
    Group { column: String },
}

impl Command {
    /// Does this command emit output and end the chain?
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Get | Command::Group { .. })
    }

    /// Get the command name for log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Sort { .. } => "SORT",
            Command::Filter { .. } => "FILTER",
            Command::Project { .. } => "PROJECT",
            Command::Reset => "RESET",
            Command::Get => "GET",
            Command::Group { .. } => "GROUP",
        }
    }
}

/// Output of one terminal command.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(ResultSet),
    Groups(Groups),
}

impl QueryOutput {
    /// Number of data rows in the output.
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutput::Rows(result) => result.len(),
            QueryOutput::Groups(groups) => groups.iter().map(|g| g.len()).sum(),
        }
    }
}

/// A word of a script line.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Bare(String),
    Quoted(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Bare(s) | Token::Quoted(s) => s,
        }
    }

    fn into_operand(self) -> Operand {
        match self {
            Token::Bare(s) => Operand::Text(s),
            Token::Quoted(s) => Operand::Literal(Value::Str(s)),
        }
    }
}

/// Split a line into whitespace-separated words; double quotes group words.
fn tokenize(line: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => text.push(ch),
                    None => return Err("Unterminated quoted string".to_string()),
                }
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut text = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' {
                    break;
                }
                text.push(ch);
                chars.next();
            }
            tokens.push(Token::Bare(text));
        }
    }

    Ok(tokens)
}

/// Parse script text into commands.
pub fn parse_commands(text: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix('|').unwrap_or(line).trim();
        if line.is_empty() {
            continue;
        }

        let cmd = parse_command(line).map_err(|e| match e {
            SummaryError::Script { message, .. } => SummaryError::Script {
                line: line_num + 1,
                message,
            },
            other => other,
        })?;
        commands.push(cmd);
    }

    Ok(commands)
}

fn script_error(message: impl Into<String>) -> SummaryError {
    SummaryError::Script {
        line: 0,
        message: message.into(),
    }
}

/// Parse a single command line (without the leading `|`).
fn parse_command(line: &str) -> Result<Command> {
    let mut tokens = tokenize(line).map_err(script_error)?;
    if tokens.is_empty() {
        return Err(script_error("Empty command"));
    }
    let keyword = tokens.remove(0).text().to_uppercase();

    match keyword.as_str() {
        "SORT" => parse_sort(tokens),
        "FILTER" => parse_filter(tokens),
        "PROJECT" | "SELECT" => parse_project(tokens),
        "RESET" => no_args(tokens, Command::Reset),
        "GET" => no_args(tokens, Command::Get),
        "GROUP" => match tokens.as_slice() {
            [column] => Ok(Command::Group {
                column: column.text().to_string(),
            }),
            _ => Err(script_error("GROUP requires exactly one column")),
        },
        _ => Err(script_error(format!("Unknown command: {keyword}"))),
    }
}

fn no_args(tokens: Vec<Token>, cmd: Command) -> Result<Command> {
    if tokens.is_empty() {
        Ok(cmd)
    } else {
        Err(script_error(format!("{} takes no arguments", cmd.name())))
    }
}

fn parse_sort(tokens: Vec<Token>) -> Result<Command> {
    let (column, descending) = match tokens.as_slice() {
        [column] => (column, false),
        [column, order] => match order.text().to_uppercase().as_str() {
            "ASC" => (column, false),
            "DESC" => (column, true),
            other => return Err(script_error(format!("Invalid sort order: {other}"))),
        },
        _ => return Err(script_error("SORT requires a column and optional ASC/DESC")),
    };
    Ok(Command::Sort {
        column: column.text().to_string(),
        descending,
    })
}

fn parse_filter(tokens: Vec<Token>) -> Result<Command> {
    let mut tokens = tokens.into_iter();
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(left), Some(right), None, None) => Ok(Command::Filter {
            left: left.into_operand(),
            op: Operator::default(),
            right: right.into_operand(),
        }),
        (Some(left), Some(op), Some(right), None) => Ok(Command::Filter {
            left: left.into_operand(),
            op: op.text().parse()?,
            right: right.into_operand(),
        }),
        _ => Err(script_error("FILTER requires: left [op] right")),
    }
}

fn parse_project(tokens: Vec<Token>) -> Result<Command> {
    if tokens.is_empty() {
        return Err(script_error("PROJECT requires at least one column"));
    }
    Ok(Command::Project {
        columns: tokens.iter().map(|t| t.text().to_string()).collect(),
    })
}

/// Apply one command. Terminal commands return their output.
fn apply_command(parser: &mut SummaryParser, cmd: &Command) -> Result<Option<QueryOutput>> {
    match cmd {
        Command::Sort { column, descending } => {
            parser.sort(column, *descending)?;
            Ok(None)
        }
        Command::Filter { left, op, right } => {
            parser.filter(left.clone(), right.clone(), *op)?;
            Ok(None)
        }
        Command::Project { columns } => {
            parser.project(columns.as_slice())?;
            Ok(None)
        }
        Command::Reset => {
            parser.reset();
            Ok(None)
        }
        Command::Get => Ok(Some(QueryOutput::Rows(parser.get()?))),
        Command::Group { column } => Ok(Some(QueryOutput::Groups(parser.group_by(column)?))),
    }
}

/// Run commands against a loaded parser, collecting every terminal output.
///
/// Appends an implicit GET when the last command is not terminal.
pub fn run_commands(parser: &mut SummaryParser, commands: &[Command]) -> Result<Vec<QueryOutput>> {
    let mut outputs = Vec::new();
    for cmd in commands {
        debug!("Applying {}", cmd.name());
        if let Some(out) = apply_command(parser, cmd)? {
            outputs.push(out);
        }
    }
    if !commands.last().is_some_and(Command::is_terminal) {
        outputs.push(QueryOutput::Rows(parser.get()?));
    }
    Ok(outputs)
}

fn pad_line<I>(fields: I, width: usize) -> String
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    let line: String = fields
        .into_iter()
        .map(|f| format!("{:<width$}", f.to_string()))
        .collect();
    line.trim_end().to_string()
}

/// Render rows as fixed-width text: a `#`-prefixed names line, then one
/// line per row.
pub fn render_result(result: &ResultSet, width: usize) -> String {
    let mut lines = Vec::with_capacity(result.len() + 1);
    let names = result
        .names()
        .into_iter()
        .enumerate()
        .map(|(i, n)| if i == 0 { format!("#{n}") } else { n.to_string() });
    lines.push(pad_line(names, width));
    for row in result.rows() {
        lines.push(pad_line(row, width));
    }
    lines.join("\n")
}

/// Render groups: per group a `#key = value` line, the value column names
/// and the group's rows.
pub fn render_groups(groups: &Groups, key_column: &str, width: usize) -> String {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!(
            "#{key_column} = {} ({} rows)",
            group.key,
            group.len()
        ));
        lines.push(pad_line(&group.columns, width));
        for r in 0..group.len() {
            lines.push(pad_line(group.values.iter().map(|col| &col[r]), width));
        }
    }
    lines.join("\n")
}

/// Execute a query script against summary text.
///
/// Returns (output_text, input_count, output_count) on success, where
/// `input_count` is the number of decoded rows and `output_count` the
/// number of rows in the last output.
pub fn execute_query(
    summary_text: &str,
    script_text: &str,
    config: &FormatConfig,
) -> Result<(String, usize, usize)> {
    let commands = parse_commands(script_text)?;

    let mut parser = SummaryParser::with_config(config.clone());
    parser.read_str(summary_text)?;
    let input_count = parser.dataset().map_or(0, |d| d.len());

    let outputs = run_commands(&mut parser, &commands)?;
    let output_count = outputs.last().map_or(0, QueryOutput::row_count);

    let mut group_columns = commands.iter().filter_map(|c| match c {
        Command::Group { column } => Some(column.as_str()),
        _ => None,
    });

    let output_text = outputs
        .iter()
        .map(|out| match out {
            QueryOutput::Rows(result) => render_result(result, config.col_width),
            QueryOutput::Groups(groups) => {
                let key = group_columns.next().unwrap_or("key");
                render_groups(groups, key, config.col_width)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok((output_text, input_count, output_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn fixture(name: &str) -> String {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
        fs::read_to_string(fixtures.join(name)).unwrap()
    }

    fn run_fixture(script: &str) -> (String, usize, usize) {
        execute_query(&fixture("summary-v2.dat"), &fixture(script), &FormatConfig::v2()).unwrap()
    }

    #[test]
    fn test_parse_sort() {
        let cmds = parse_commands("SORT mobility DESC").unwrap();
        assert_eq!(
            cmds,
            vec![Command::Sort {
                column: "mobility".to_string(),
                descending: true
            }]
        );
        let cmds = parse_commands("| sort mobility").unwrap();
        assert!(matches!(&cmds[0], Command::Sort { descending: false, .. }));
    }

    #[test]
    fn test_parse_filter_default_operator() {
        let cmds = parse_commands("FILTER mode be").unwrap();
        assert_eq!(
            cmds,
            vec![Command::Filter {
                left: Operand::Text("mode".to_string()),
                op: Operator::Eq,
                right: Operand::Text("be".to_string()),
            }]
        );
    }

    #[test]
    fn test_parse_filter_quoted_literal() {
        let cmds = parse_commands(r#"FILTER comment str!= "large system""#).unwrap();
        match &cmds[0] {
            Command::Filter { left, op, right } => {
                assert_eq!(left, &Operand::Text("comment".to_string()));
                assert_eq!(*op, Operator::StrNe);
                assert_eq!(right, &Operand::Literal(Value::from("large system")));
            }
            other => panic!("Expected FILTER, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_unknown_operator() {
        let err = parse_commands("FILTER a ~= 3").unwrap_err();
        assert!(matches!(err, SummaryError::UnknownOperator(op) if op == "~="));
    }

    #[test]
    fn test_parse_errors_carry_line_number() {
        let err = parse_commands("# header\nSORT a\nFROB x").unwrap_err();
        match err {
            SummaryError::Script { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("FROB"));
            }
            other => panic!("Expected Script error, got {other:?}"),
        }
        assert!(parse_commands("FILTER a \"open").is_err());
        assert!(parse_commands("GET now").is_err());
        assert!(parse_commands("PROJECT").is_err());
        assert!(parse_commands("SORT a sideways").is_err());
    }

    #[test]
    fn test_parse_project_and_group() {
        let cmds = parse_commands("PROJECT a b\n| SELECT c\nGROUP a\nRESET").unwrap();
        assert_eq!(cmds.len(), 4);
        assert!(matches!(&cmds[0], Command::Project { columns } if columns.len() == 2));
        assert!(matches!(&cmds[1], Command::Project { columns } if columns == &["c"]));
        assert!(cmds[2].is_terminal());
        assert_eq!(cmds[3], Command::Reset);
    }

    #[test]
    fn test_hot_mobility() {
        let (output, input_count, output_count) = run_fixture("hot-mobility.q");
        assert_eq!(input_count, 8);
        assert_eq!(output_count, 5);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("#mode"));
        assert!(lines[1].starts_with("be"));
        assert!(lines[1].contains("0.0231"));
        assert!(lines[5].contains("0.00402"));
    }

    #[test]
    fn test_by_mode_groups() {
        let (output, _, output_count) = run_fixture("by-mode.q");
        assert_eq!(output_count, 8);
        assert!(output.contains("#mode = be (3 rows)"));
        assert!(output.contains("#mode = mc (5 rows)"));
        assert!(output.find("= be").unwrap() < output.find("= mc").unwrap());
    }

    #[test]
    fn test_large_systems_implicit_get() {
        let (output, _, output_count) = run_fixture("large-systems.q");
        assert_eq!(output_count, 2);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[1].contains("1004"));
        assert!(lines[2].contains("1008"));
        assert!(lines[2].ends_with("large system"));
    }

    #[test]
    fn test_chained_gets_reset() {
        let (output, input_count, output_count) = run_fixture("chained-gets.q");
        assert_eq!(input_count, 8);
        assert_eq!(output_count, 5);
        // Two outputs, each with a names line
        assert_eq!(output.lines().filter(|l| l.starts_with("#mode")).count(), 2);
        assert_eq!(output.lines().count(), 2 + 3 + 5);
    }

    #[test]
    fn test_recent_runs() {
        let (output, _, output_count) = run_fixture("recent-runs.q");
        assert_eq!(output_count, 2);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "#random_seed        finish_time");
        assert_eq!(lines[1], "1005                2013-04-04_08:00:41");
        assert_eq!(lines[2], "1007                2013-04-05_14:45:30");
    }

    #[test]
    fn test_legacy_summary() {
        let (output, input_count, output_count) = execute_query(
            &fixture("summary-legacy.dat"),
            "FILTER mobility > 0\nSORT random_seed DESC\nPROJECT random_seed",
            &FormatConfig::legacy(),
        )
        .unwrap();
        assert_eq!(input_count, 3);
        assert_eq!(output_count, 2);
        assert_eq!(output, "#random_seed\n1002\n1001");
    }

    #[test]
    fn test_unknown_column_in_script() {
        let result = execute_query(
            &fixture("summary-v2.dat"),
            "SORT nonexistent_col",
            &FormatConfig::v2(),
        );
        assert!(matches!(result, Err(SummaryError::UnknownColumn(_))));
    }

    #[test]
    fn test_empty_script_returns_everything() {
        let (output, input_count, output_count) =
            execute_query(&fixture("summary-v2.dat"), "# nothing\n", &FormatConfig::v2()).unwrap();
        assert_eq!(input_count, 8);
        assert_eq!(output_count, 8);
        assert_eq!(output.lines().count(), 9);
    }

    #[test]
    fn test_run_commands_collects_outputs() {
        let mut parser = SummaryParser::new();
        parser.read_str(&fixture("summary-v2.dat")).unwrap();
        let cmds =
            parse_commands("FILTER mode mc\nGET\nSORT mode\nGROUP mode\nSORT seed_typo").unwrap();
        // SORT fails after two outputs were produced
        assert!(matches!(
            run_commands(&mut parser, &cmds),
            Err(SummaryError::UnknownColumn(_))
        ));
        let outputs = run_commands(&mut parser, &cmds[..4]).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].row_count(), 5);
        assert_eq!(outputs[1].row_count(), 8);
    }
}
