use serde::{Deserialize, Serialize};

/// One record of the fixed source schema `id int, name string, email string, body string`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

impl ApiRow {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        email: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        ApiRow {
            id,
            name: name.into(),
            email: email.into(),
            body: body.into(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<i64>() + self.name.len() + self.email.len() + self.body.len()
    }
}
