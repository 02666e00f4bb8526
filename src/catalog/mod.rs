use crate::error::DbError;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Column definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

// Supported data types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataType {
    Integer,
    Float,
    Varchar(usize),
    Text,
    Boolean,
}

// Table schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self { name, columns }
    }

    /// Builds a schema from bare attribute names, typing everything as text.
    ///
    /// Convenient for tests and for callers that only care about which
    /// attributes a relation carries, which is all the projection rewriter
    /// ever asks for.
    pub fn with_attributes(name: &str, attributes: &[&str]) -> Self {
        let columns = attributes
            .iter()
            .map(|a| Column {
                name: (*a).to_string(),
                data_type: DataType::Text,
                nullable: true,
            })
            .collect();
        Self::new(name.to_string(), columns)
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Names of all attributes of this relation, in declaration order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Schema lookup interface consumed by the projection rewriter.
///
/// The rewriter never walks schemas itself; it only asks which attribute
/// names a relation carries. Lookup failure is not fatal to the caller -
/// rewrite rules that need a schema fall back to leaving the expression
/// untouched.
pub trait SchemaProvider: Send + Sync {
    /// Returns all attribute names of `table`.
    fn attributes(&self, table: &str) -> Result<Vec<String>>;
}

/// In-memory schema registry.
///
/// Thread-safe via internal RwLock; readers (the rewriter) vastly
/// outnumber writers (DDL).
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Schema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a table schema, replacing any previous definition.
    pub fn register_table(&self, schema: Schema) {
        self.tables.write().insert(schema.name.clone(), schema);
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("table '{}'", name)))
    }

    pub fn get_schema(&self, name: &str) -> Result<Schema> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("table '{}'", name)))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

impl SchemaProvider for Catalog {
    fn attributes(&self, table: &str) -> Result<Vec<String>> {
        self.get_schema(table).map(|s| s.attribute_names())
    }
}
