//! Section tables for rig and simulation listings

use prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE;
use prettytable::{Cell, Row, Table};
use std::fmt::Write as _;

/// A listing with bold headers, optionally headed by `Title (rows):` and
/// optionally numbered with a leading `#` column
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    title: Option<String>,
    numbered: bool,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SectionTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Print `title` and the row count above the table
    pub fn titled(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::new(headers)
        }
    }

    /// Prefix every row with its zero-based position
    pub fn numbered(mut self) -> Self {
        self.numbered = true;
        self
    }

    pub fn push<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn build(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);

        let index_header = self.numbered.then_some("#");
        let titles = index_header
            .into_iter()
            .chain(self.headers.iter().map(String::as_str))
            .map(|header| Cell::new(header).style_spec("b"));
        table.set_titles(Row::new(titles.collect()));

        for (index, row) in self.rows.iter().enumerate() {
            let index_cell = self.numbered.then(|| Cell::new(&index.to_string()));
            let cells = index_cell
                .into_iter()
                .chain(row.iter().map(|cell| Cell::new(cell)));
            table.add_row(Row::new(cells.collect()));
        }
        table
    }

    /// The section as text, title line included
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            let _ = writeln!(out, "\n{title} ({}):", self.rows.len());
        }
        out.push_str(&self.build().to_string());
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
