use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_csv(headers: &[String], rows: &[Vec<String>]) {
    println!("{}", headers.join(","));
    for row in rows {
        println!("{}", row.join(","));
    }
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(headers.iter().cloned());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::blank()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_renders_headers_and_rows() {
        let headers = vec!["profile".to_owned(), "region".to_owned()];
        let rows = vec![vec!["dev".to_owned(), "us-east-1".to_owned()]];
        let rendered = render_table(&headers, &rows);
        assert!(rendered.contains("profile"));
        assert!(rendered.contains("us-east-1"));
    }
}
