use crate::cert::RecordColumn;

/// Types that can render one table cell per column
pub trait GetColumnValue {
    fn get_column_value(&self, column: &RecordColumn) -> String;
}

/// Table rows for `records`, one cell per requested column
pub fn build_table_data<T>(records: &[T], columns: &[RecordColumn]) -> Vec<Vec<String>>
where
    T: GetColumnValue,
{
    records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| record.get_column_value(col))
                .collect()
        })
        .collect()
}

/// Header row for the requested columns
pub fn build_header(columns: &[RecordColumn]) -> Vec<String> {
    columns.iter().map(|col| col.header().to_string()).collect()
}

#[derive(Clone, Debug)]
pub struct OutputFormat {
    pub raw: bool,
}

impl OutputFormat {
    pub fn new(raw: bool) -> Self {
        Self { raw }
    }

    /// Print rows either tab-separated or aligned like `column -t`
    pub fn print_table<T: AsRef<str>>(&self, data: &[Vec<T>]) {
        for line in self.render_table(data) {
            println!("{line}");
        }
    }

    pub fn render_table<T: AsRef<str>>(&self, data: &[Vec<T>]) -> Vec<String> {
        if self.raw {
            return data
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.as_ref())
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect();
        }

        let num_cols = data.iter().map(Vec::len).max().unwrap_or(0);
        let mut col_widths = vec![0; num_cols];
        for row in data {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.as_ref().chars().count());
            }
        }

        data.iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        if i == row.len() - 1 {
                            cell.as_ref().to_string()
                        } else {
                            format!("{:<width$}", cell.as_ref(), width = col_widths[i])
                        }
                    })
                    .collect();
                cells.join("  ")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["Index", "Subject", "Expires"],
            vec!["1", "/CN=leaf-1", "2126-09-25 05:36"],
        ]
    }

    #[test]
    fn test_raw_output() {
        let lines = OutputFormat::new(true).render_table(&rows());
        assert_eq!(lines[0], "Index\tSubject\tExpires");
        assert_eq!(lines[1], "1\t/CN=leaf-1\t2126-09-25 05:36");
    }

    #[test]
    fn test_formatted_output() {
        let lines = OutputFormat::new(false).render_table(&rows());
        assert_eq!(lines[0], "Index  Subject     Expires");
        assert_eq!(lines[1], "1      /CN=leaf-1  2126-09-25 05:36");
    }

    #[test]
    fn test_empty_table() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert!(OutputFormat::new(false).render_table(&empty).is_empty());
    }

    #[test]
    fn test_header() {
        let header = build_header(&RecordColumn::defaults());
        assert_eq!(header.first().map(String::as_str), Some("Index"));
    }
}
