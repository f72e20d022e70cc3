use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[tabled(rename = "Table")]
    pub table: String,
    #[tabled(rename = "Rows")]
    pub rows: String,
    #[tabled(rename = "References")]
    pub references: String,
}

pub fn entity_table(rows: &[EntityRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}
