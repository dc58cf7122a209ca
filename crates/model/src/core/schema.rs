use serde::Serialize;
use std::fmt;

/// DDL string advertised to the host runtime. The source schema is fixed;
/// nothing is inferred from responses.
pub const ROW_SCHEMA: &str = "id int, name string, email string, body string";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    String,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub data_type: FieldType,
}

impl Field {
    fn new(name: &str, data_type: FieldType) -> Self {
        Field {
            name: name.to_string(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Schema of [`crate::records::row::ApiRow`].
    pub fn rows() -> Self {
        Schema {
            fields: vec![
                Field::new("id", FieldType::Int),
                Field::new("name", FieldType::String),
                Field::new("email", FieldType::String),
                Field::new("body", FieldType::String),
            ],
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ddl = self
            .fields
            .iter()
            .map(|field| format!("{} {}", field.name, field.data_type.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&ddl)
    }
}
