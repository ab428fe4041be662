//! Table, column and index metadata, persisted as JSON under the
//! storage root. The heap and index layers consume these definitions
//! read-only, except for the pages-count write-back after heap growth.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    DuplicateTable(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("index already exists: {0}")]
    DuplicateIndex(String),

    #[error("column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Column value types supported by the storage core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    Varchar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Hash,
    BTree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub oid: u32,
    pub table_oid: u32,
    pub name: String,
    pub data_type: DataType,
    /// 0-based position within the row
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub oid: u32,
    pub name: String,
    /// Physical file id under the storage root
    pub file_node: String,
    pub pages_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub oid: u32,
    pub name: String,
    pub table_oid: u32,
    pub column_position: usize,
    pub key_type: DataType,
    pub kind: IndexKind,
    /// Physical file id under the storage root
    pub file_node: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    next_oid: u32,
    tables: Vec<TableDefinition>,
    columns: Vec<ColumnDefinition>,
    indexes: Vec<IndexDefinition>,
}

/// Metadata store shared by every heap and index instance of one
/// storage root; mutations are persisted immediately
pub struct Catalog {
    root: PathBuf,
    data: Mutex<CatalogData>,
}

impl Catalog {
    /// Load the catalog file under `root`, or start empty if none exists
    pub fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        let root = root.into();
        let path = root.join(CATALOG_FILE);

        let data = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            CatalogData {
                next_oid: 1,
                ..CatalogData::default()
            }
        };

        Ok(Self {
            root,
            data: Mutex::new(data),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a table and its columns; the backing file id is derived
    /// from the allocated oid
    pub fn create_table(
        &self,
        name: &str,
        columns: &[(String, DataType)],
    ) -> CatalogResult<TableDefinition> {
        let mut data = self.data.lock().unwrap();
        if data.tables.iter().any(|t| t.name == name) {
            return Err(CatalogError::DuplicateTable(name.to_string()));
        }

        let oid = data.next_oid;
        data.next_oid += 1;

        let table = TableDefinition {
            oid,
            name: name.to_string(),
            file_node: format!("{oid}.dat"),
            pages_count: 0,
        };
        data.tables.push(table.clone());

        for (position, (col_name, data_type)) in columns.iter().enumerate() {
            let col_oid = data.next_oid;
            data.next_oid += 1;
            data.columns.push(ColumnDefinition {
                oid: col_oid,
                table_oid: oid,
                name: col_name.clone(),
                data_type: *data_type,
                position,
            });
        }

        self.save(&data)?;
        Ok(table)
    }

    pub fn table(&self, name: &str) -> CatalogResult<TableDefinition> {
        let data = self.data.lock().unwrap();
        data.tables
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn table_by_oid(&self, oid: u32) -> CatalogResult<TableDefinition> {
        let data = self.data.lock().unwrap();
        data.tables
            .iter()
            .find(|t| t.oid == oid)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(format!("oid {oid}")))
    }

    /// Columns of a table in row order
    pub fn columns(&self, table_oid: u32) -> Vec<ColumnDefinition> {
        let data = self.data.lock().unwrap();
        let mut columns: Vec<ColumnDefinition> = data
            .columns
            .iter()
            .filter(|c| c.table_oid == table_oid)
            .cloned()
            .collect();
        columns.sort_by_key(|c| c.position);
        columns
    }

    /// Register an index over one column of an existing table
    pub fn create_index(
        &self,
        name: &str,
        table_name: &str,
        column_name: &str,
        kind: IndexKind,
    ) -> CatalogResult<IndexDefinition> {
        let mut data = self.data.lock().unwrap();
        if data.indexes.iter().any(|i| i.name == name) {
            return Err(CatalogError::DuplicateIndex(name.to_string()));
        }

        let table = data
            .tables
            .iter()
            .find(|t| t.name == table_name)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;

        let column = data
            .columns
            .iter()
            .find(|c| c.table_oid == table.oid && c.name == column_name)
            .cloned()
            .ok_or_else(|| CatalogError::ColumnNotFound {
                table: table_name.to_string(),
                column: column_name.to_string(),
            })?;

        let oid = data.next_oid;
        data.next_oid += 1;

        let index = IndexDefinition {
            oid,
            name: name.to_string(),
            table_oid: table.oid,
            column_position: column.position,
            key_type: column.data_type,
            kind,
            file_node: format!("{oid}.idx"),
        };
        data.indexes.push(index.clone());

        self.save(&data)?;
        Ok(index)
    }

    pub fn index(&self, name: &str) -> CatalogResult<IndexDefinition> {
        let data = self.data.lock().unwrap();
        data.indexes
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| CatalogError::IndexNotFound(name.to_string()))
    }

    pub fn list_indexes(&self, table_oid: u32) -> Vec<IndexDefinition> {
        let data = self.data.lock().unwrap();
        data.indexes
            .iter()
            .filter(|i| i.table_oid == table_oid)
            .cloned()
            .collect()
    }

    /// Persist a grown page count; invoked by the heap after appending
    /// past the last page
    pub fn update_pages_count(&self, table_oid: u32, pages_count: u32) -> CatalogResult<()> {
        let mut data = self.data.lock().unwrap();
        let table = data
            .tables
            .iter_mut()
            .find(|t| t.oid == table_oid)
            .ok_or_else(|| CatalogError::TableNotFound(format!("oid {table_oid}")))?;
        table.pages_count = pages_count;
        self.save(&data)?;
        Ok(())
    }

    fn save(&self, data: &CatalogData) -> CatalogResult<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(data)?;
        fs::write(self.root.join(CATALOG_FILE), json)?;
        Ok(())
    }
}
