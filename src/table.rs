use std::fs;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("column {column} is not {expected}")]
    WrongType {
        column: String,
        expected: &'static str,
    },

    #[error("column {column} has {got} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Num(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Num(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Column::Num(v) => v.get(row).is_none_or(|c| c.is_none()),
            Column::Text(v) => v.get(row).is_none_or(|c| c.is_none()),
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Num(v) => Column::Num(rows.iter().map(|&r| v[r]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    fn render(&self, row: usize) -> String {
        match self {
            Column::Num(v) => v[row].map(format_number).unwrap_or_default(),
            Column::Text(v) => v[row].clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.index_of(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn num(&self, name: &str) -> Result<&[Option<f64>], TableError> {
        match self.column(name)? {
            Column::Num(v) => Ok(v),
            Column::Text(_) => Err(TableError::WrongType {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<&[Option<String>], TableError> {
        match self.column(name)? {
            Column::Text(v) => Ok(v),
            Column::Num(_) => Err(TableError::WrongType {
                column: name.to_string(),
                expected: "text",
            }),
        }
    }

    /// Replaces a column in place, or appends it when the name is new.
    pub fn set_column(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                got: column.len(),
            });
        }
        match self.index_of(name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let i = self.index_of(name)?;
        self.names.remove(i);
        Some(self.columns.remove(i))
    }

    /// Keeps the rows whose mask entry is true.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let rows = keep
            .iter()
            .enumerate()
            .filter_map(|(i, k)| k.then_some(i))
            .collect::<Vec<_>>();
        *self = self.take_rows(&rows);
    }

    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    pub fn read_csv(path: &Path) -> Result<Frame, TableError> {
        let file = fs::File::open(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::read_from(file).map_err(|err| with_path(err, path))
    }

    /// Parses CSV text. A column is numeric when every non-empty cell parses
    /// as a number and none carries a leading zero (game ids stay text).
    pub fn read_from<R: Read>(reader: R) -> Result<Frame, TableError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            for (i, cell) in record.iter().enumerate() {
                if let Some(col) = raw.get_mut(i) {
                    col.push(cell.trim().to_string());
                }
            }
        }

        let mut frame = Frame::new();
        for (name, cells) in headers.iter().zip(raw) {
            let numeric = cells.iter().all(|c| c.is_empty() || looks_numeric(c));
            let column = if numeric {
                Column::Num(cells.iter().map(|c| c.parse::<f64>().ok()).collect())
            } else {
                Column::Text(
                    cells
                        .into_iter()
                        .map(|c| if c.is_empty() { None } else { Some(c) })
                        .collect(),
                )
            };
            frame.set_column(name, column)?;
        }
        Ok(frame)
    }

    /// Writes the whole table, replacing any previous file.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| TableError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let tmp = path.with_extension("csv.tmp");
        let file = fs::File::create(&tmp).map_err(|source| TableError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        self.write_to(file).map_err(|err| with_path(err, path))?;
        fs::rename(&tmp, path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.names).map_err(csv_err)?;
        for row in 0..self.len() {
            wtr.write_record(self.columns.iter().map(|c| c.render(row)))
                .map_err(csv_err)?;
        }
        wtr.flush().map_err(|source| TableError::Io {
            path: String::new(),
            source,
        })
    }
}

fn looks_numeric(cell: &str) -> bool {
    let digits = cell.strip_prefix('-').unwrap_or(cell);
    let bytes = digits.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit() {
        return false;
    }
    cell.parse::<f64>().is_ok_and(f64::is_finite)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn csv_err(source: csv::Error) -> TableError {
    TableError::Csv {
        path: String::new(),
        source,
    }
}

fn with_path(err: TableError, path: &Path) -> TableError {
    match err {
        TableError::Csv { source, .. } => TableError::Csv {
            path: path.display().to_string(),
            source,
        },
        TableError::Io { source, .. } => TableError::Io {
            path: path.display().to_string(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, Frame, TableError};

    const SAMPLE: &str = "GAME_ID,PLAYER_NAME,SHOT_DISTANCE,DEF_RATING\n\
                          0022300001,A,5,100.5\n\
                          0022300002,B,20,\n";

    #[test]
    fn reads_types_and_nulls() {
        let frame = Frame::read_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.text("GAME_ID").unwrap()[0].as_deref(),
            Some("0022300001")
        );
        assert_eq!(frame.num("SHOT_DISTANCE").unwrap(), &[Some(5.0), Some(20.0)]);
        assert_eq!(frame.num("DEF_RATING").unwrap()[1], None);
    }

    #[test]
    fn write_keeps_integers_compact_and_ids_intact() {
        let frame = Frame::read_from(SAMPLE.as_bytes()).unwrap();
        let mut out = Vec::new();
        frame.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn set_column_rejects_wrong_length() {
        let mut frame = Frame::new();
        frame
            .set_column("A", Column::Num(vec![Some(1.0), Some(2.0)]))
            .unwrap();
        let err = frame
            .set_column("B", Column::Num(vec![Some(1.0)]))
            .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn retain_rows_filters_every_column() {
        let mut frame = Frame::read_from(SAMPLE.as_bytes()).unwrap();
        frame.retain_rows(&[false, true]);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.text("PLAYER_NAME").unwrap()[0].as_deref(), Some("B"));
        assert!(frame.column("DEF_RATING").unwrap().is_null(0));
    }

    #[test]
    fn typed_accessors_report_missing_and_wrong_type() {
        let frame = Frame::read_from(SAMPLE.as_bytes()).unwrap();
        assert!(matches!(
            frame.num("NOPE"),
            Err(TableError::MissingColumn(_))
        ));
        assert!(matches!(
            frame.num("PLAYER_NAME"),
            Err(TableError::WrongType { .. })
        ));
    }
}
