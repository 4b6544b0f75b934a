use std::collections::BTreeMap;

use crate::provider::{
    object_key, ColumnSchema, ProviderError, SchemaProvider, SemanticViewExport, TableSchema,
};

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    tables: BTreeMap<String, TableSchema>,
    views: BTreeMap<String, SemanticViewExport>,
    unavailable: Option<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        mut self,
        database: &str,
        schema: &str,
        table: &str,
        columns: &[(&str, &str)],
    ) -> Self {
        self.add_table(TableSchema {
            database: database.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns
                .iter()
                .map(|(name, column_type)| ColumnSchema::new(*name, *column_type))
                .collect(),
        });
        self
    }

    pub fn with_view(mut self, database: &str, schema: &str, view: &str, yaml: &str) -> Self {
        self.views.insert(
            object_key(database, schema, view),
            SemanticViewExport {
                view_name: view.to_string(),
                yaml_content: yaml.to_string(),
            },
        );
        self
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            unavailable: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.insert(
            object_key(&table.database, &table.schema, &table.table),
            table,
        );
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        match &self.unavailable {
            Some(reason) => Err(ProviderError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl SchemaProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn get_table_schema(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, ProviderError> {
        self.check_available()?;
        Ok(self.tables.get(&object_key(database, schema, table)).cloned())
    }

    fn get_semantic_view_yaml(
        &self,
        database: &str,
        schema: &str,
        view: &str,
    ) -> Result<Option<SemanticViewExport>, ProviderError> {
        self.check_available()?;
        Ok(self.views.get(&object_key(database, schema, view)).cloned())
    }
}
