//! Running named routines.
//!
//! [`Runner`] loads the routine directory, resolves a routine by name,
//! prepares it and runs it on the connection it was given. [`print`]
//! renders the resulting [`RowSet`] as a bordered text table.

use std::io::{self, Write};

use tracing::info;

use crate::database::Database;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::provider::Provider;
use crate::statement::Query;
use crate::value::{Params, RowSet, Value};

/// Executes routines from a routine directory against one connection.
pub struct Runner<'a> {
    fs: &'a dyn FileSystem,
    db: &'a mut dyn Database,
}

impl<'a> Runner<'a> {
    pub fn new(fs: &'a dyn FileSystem, db: &'a mut dyn Database) -> Self {
        Self { fs, db }
    }

    /// Runs routine `name` with positional arguments.
    pub fn run(&mut self, name: &str, args: Vec<Value>) -> Result<RowSet> {
        let query = self.provider()?.query(name, args)?;
        self.execute(name, &query)
    }

    /// Runs routine `name` with named parameters.
    pub fn run_named(&mut self, name: &str, params: Params) -> Result<RowSet> {
        let query = self.provider()?.named_query_with(name, params)?;
        self.execute(name, &query)
    }

    fn provider(&self) -> Result<Provider> {
        let provider = Provider::new();
        provider.read_dir(self.fs)?;
        Ok(provider)
    }

    fn execute(&mut self, name: &str, query: &Query) -> Result<RowSet> {
        let prepared = query.prepare();
        info!(routine = %name, statement = %prepared.sql, "running routine");
        Ok(self.db.query(&prepared.sql, &prepared.bindings)?)
    }
}

/// Writes `rows` as a bordered table with a header row.
pub fn print<W: Write + ?Sized>(writer: &mut W, rows: &RowSet) -> io::Result<()> {
    let cells: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };

    writeln!(writer, "{border}")?;
    write_row(writer, &widths, &rows.columns)?;
    writeln!(writer, "{border}")?;
    for row in &cells {
        write_row(writer, &widths, row)?;
    }
    if !cells.is_empty() {
        writeln!(writer, "{border}")?;
    }
    Ok(())
}

fn write_row<W: Write + ?Sized>(writer: &mut W, widths: &[usize], cells: &[String]) -> io::Result<()> {
    write!(writer, "|")?;
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map_or("", String::as_str);
        let pad = width - cell.chars().count();
        write!(writer, " {cell}{} |", " ".repeat(pad))?;
    }
    writeln!(writer)
}
