//! Funciones map/reduce de usuario.

use std::{collections::BTreeSet, sync::Arc};

use anyhow::bail;

use crate::engine::KeyValue;
use crate::wordcount::{tokenize, WordCount};

/// Par de funciones map/reduce que ejecuta el worker.
///
/// Ambas son puras respecto del framework: reciben datos y devuelven datos,
/// la E/S de particiones la hace `engine`.
pub trait MapReduceApp: Send + Sync {
    fn name(&self) -> &str;

    /// Se invoca una vez por archivo de entrada.
    fn map(&self, filename: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>>;

    /// Se invoca una vez por clave distinta con todos sus valores.
    fn reduce(&self, key: &str, values: &[String]) -> anyhow::Result<String>;
}

/// Índice invertido: para cada palabra, los documentos donde aparece.
#[derive(Debug, Clone, Copy, Default)]
pub struct Indexer;

impl MapReduceApp for Indexer {
    fn name(&self) -> &str {
        "indexer"
    }

    fn map(&self, filename: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>> {
        let words: BTreeSet<String> = contents.lines().flat_map(tokenize).collect();
        Ok(words
            .into_iter()
            .map(|w| KeyValue::new(w, filename))
            .collect())
    }

    // "<n> doc1,doc2"
    fn reduce(&self, _key: &str, values: &[String]) -> anyhow::Result<String> {
        let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        let joined = docs.iter().copied().collect::<Vec<_>>().join(",");
        Ok(format!("{} {}", docs.len(), joined))
    }
}

pub const APP_NAMES: &[&str] = &["wordcount", "indexer"];

/// Busca una app por nombre.
pub fn named(name: &str) -> anyhow::Result<Arc<dyn MapReduceApp>> {
    match name {
        "wordcount" => Ok(Arc::new(WordCount)),
        "indexer" => Ok(Arc::new(Indexer)),
        other => bail!(
            "app desconocida {:?} (disponibles: {})",
            other,
            APP_NAMES.join(", ")
        ),
    }
}
