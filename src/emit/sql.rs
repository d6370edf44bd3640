//! Renders resolved movies as an INSERT script framed by a transaction.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};

use crate::resolve::{CreditRow, MovieRow, PersonRow, ResolvedMovie};

const MOVIE_COLUMNS: &[&str] = &["movieid", "title", "country", "year_released", "runtime"];
const PEOPLE_COLUMNS: &[&str] = &["peopleid", "first_name", "surname", "born", "died", "gender"];
const CREDIT_COLUMNS: &[&str] = &["movieid", "peopleid", "credited_as"];

/// How the script closes its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionEnd {
    Commit,
    /// Dry run: replaying the script changes nothing.
    #[default]
    Rollback,
}

impl TransactionEnd {
    pub fn from_commit_flag(commit: bool) -> Self {
        if commit {
            TransactionEnd::Commit
        } else {
            TransactionEnd::Rollback
        }
    }
}

/// A single SQL literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlValue<'a> {
    Int(i64),
    Text(&'a str),
    Null,
}

impl From<Option<i32>> for SqlValue<'_> {
    fn from(v: Option<i32>) -> Self {
        v.map_or(SqlValue::Null, |n| SqlValue::Int(n.into()))
    }
}

impl fmt::Display for SqlValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(n) => write!(f, "{n}"),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

pub fn insert_statement(table: &str, columns: &[&str], values: &[SqlValue<'_>]) -> String {
    let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({});",
        columns.join(", "),
        rendered.join(", ")
    )
}

pub fn movie_insert(m: &MovieRow) -> String {
    insert_statement(
        "movies",
        MOVIE_COLUMNS,
        &[
            SqlValue::Int(m.id),
            SqlValue::Text(&m.title),
            SqlValue::Text(&m.country),
            SqlValue::Int(m.year.into()),
            SqlValue::Int(m.runtime),
        ],
    )
}

pub fn person_insert(p: &PersonRow) -> String {
    insert_statement(
        "people",
        PEOPLE_COLUMNS,
        &[
            SqlValue::Int(p.id),
            SqlValue::Text(&p.first_name),
            SqlValue::Text(&p.surname),
            SqlValue::Int(p.born.into()),
            p.died.into(),
            SqlValue::Text(p.gender.as_str()),
        ],
    )
}

pub fn credit_insert(c: &CreditRow) -> String {
    insert_statement(
        "credits",
        CREDIT_COLUMNS,
        &[
            SqlValue::Int(c.movie_id),
            SqlValue::Int(c.person_id),
            SqlValue::Text(c.role.as_str()),
        ],
    )
}

/// Streams statements to `out`. Call [`begin`](Self::begin) once, then
/// [`write_movie`](Self::write_movie) per inserted movie, then
/// [`finish`](Self::finish).
pub struct StatementEmitter<W: Write> {
    out: W,
    end: TransactionEnd,
    statements: u64,
}

impl<W: Write> StatementEmitter<W> {
    pub fn new(out: W, end: TransactionEnd) -> Self {
        Self {
            out,
            end,
            statements: 0,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        self.out
            .write_all(b"BEGIN;\n\n")
            .context("writing transaction header")
    }

    /// Movie, then its new people, then its credits.
    pub fn write_movie(&mut self, resolved: &ResolvedMovie) -> Result<()> {
        let m = &resolved.movie;
        let label = m.title.replace(['\r', '\n'], " ");
        writeln!(self.out, "-- Movie: {label} (ID: {})", m.id)?;
        self.line(&movie_insert(m))?;
        for p in &resolved.people {
            self.line(&person_insert(p))?;
        }
        for c in &resolved.credits {
            self.line(&credit_insert(c))?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn statements_written(&self) -> u64 {
        self.statements
    }

    /// Write the transaction trailer, flush, and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        let trailer: &[u8] = match self.end {
            TransactionEnd::Commit => b"\nCOMMIT;\n",
            TransactionEnd::Rollback => b"\n-- COMMIT;\nROLLBACK;\n",
        };
        self.out
            .write_all(trailer)
            .context("writing transaction trailer")?;
        self.out.flush().context("flushing statement script")?;
        Ok(self.out)
    }

    fn line(&mut self, statement: &str) -> Result<()> {
        writeln!(self.out, "{statement}")?;
        self.statements += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::records::{Gender, RoleCode};

    fn nobody() -> ResolvedMovie {
        ResolvedMovie {
            movie: MovieRow {
                id: 9210,
                title: "Nobody".into(),
                country: "us".into(),
                year: 2021,
                runtime: 92,
            },
            people: vec![PersonRow {
                id: 16510,
                first_name: "Bob".into(),
                surname: "Odenkirk".into(),
                born: 1962,
                died: None,
                gender: Gender::Male,
            }],
            credits: vec![CreditRow {
                movie_id: 9210,
                person_id: 16510,
                role: RoleCode::Director,
            }],
        }
    }

    fn render(end: TransactionEnd, movies: &[ResolvedMovie]) -> String {
        let mut e = StatementEmitter::new(Vec::new(), end);
        e.begin().unwrap();
        for m in movies {
            e.write_movie(m).unwrap();
        }
        String::from_utf8(e.finish().unwrap()).unwrap()
    }

    #[test]
    fn renders_full_script_with_rollback_by_default() {
        let script = render(TransactionEnd::default(), &[nobody()]);
        let expected = "BEGIN;\n\n\
            -- Movie: Nobody (ID: 9210)\n\
            INSERT INTO movies (movieid, title, country, year_released, runtime) VALUES (9210, 'Nobody', 'us', 2021, 92);\n\
            INSERT INTO people (peopleid, first_name, surname, born, died, gender) VALUES (16510, 'Bob', 'Odenkirk', 1962, NULL, 'M');\n\
            INSERT INTO credits (movieid, peopleid, credited_as) VALUES (9210, 16510, 'D');\n\
            \n\
            \n-- COMMIT;\nROLLBACK;\n";
        assert_eq!(script, expected);
    }

    #[test]
    fn commit_flag_switches_trailer() {
        let script = render(TransactionEnd::from_commit_flag(true), &[]);
        assert_eq!(script, "BEGIN;\n\n\nCOMMIT;\n");
    }

    #[test]
    fn quotes_are_doubled_and_empty_text_stays_quoted() {
        assert_eq!(SqlValue::Text("Ocean's 8").to_string(), "'Ocean''s 8'");
        assert_eq!(SqlValue::Text("").to_string(), "''");
        assert_eq!(SqlValue::from(None::<i32>).to_string(), "NULL");
        assert_eq!(SqlValue::from(Some(2019_i32)).to_string(), "2019");
    }

    #[test]
    fn person_with_single_name_and_death_year() {
        let p = PersonRow {
            id: 1,
            first_name: "Sacha".into(),
            surname: String::new(),
            born: 0,
            died: Some(2021),
            gender: Gender::Unknown,
        };
        assert_eq!(
            person_insert(&p),
            "INSERT INTO people (peopleid, first_name, surname, born, died, gender) VALUES (1, 'Sacha', '', 0, 2021, '?');"
        );
    }

    #[test]
    fn multiline_titles_do_not_break_comment_line() {
        let mut m = nobody();
        m.movie.title = "Line\nBreak".into();
        let script = render(TransactionEnd::Rollback, &[m]);
        assert!(script.contains("-- Movie: Line Break (ID: 9210)\n"));
        assert!(script.contains("VALUES (9210, 'Line\nBreak', 'us'"));
    }

    #[test]
    fn counts_statements() {
        let mut e = StatementEmitter::new(Vec::new(), TransactionEnd::Rollback);
        e.begin().unwrap();
        e.write_movie(&nobody()).unwrap();
        assert_eq!(e.statements_written(), 3);
    }
}
