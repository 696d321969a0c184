use anyhow::Context;

use crate::apps::MapReduceApp;
use crate::engine::KeyValue;

/// WordCount: map emite (palabra, "1"), reduce suma.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

/// limpiar: solo alfanumérico y '_', en minúscula
pub fn tokenize(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split_whitespace().filter_map(|raw| {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();

        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    })
}

impl MapReduceApp for WordCount {
    fn name(&self) -> &str {
        "wordcount"
    }

    fn map(&self, _filename: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>> {
        Ok(contents
            .lines()
            .flat_map(tokenize)
            .map(|word| KeyValue::new(word, "1"))
            .collect())
    }

    fn reduce(&self, key: &str, values: &[String]) -> anyhow::Result<String> {
        let mut total: u64 = 0;
        for v in values {
            let n: u64 = v
                .parse()
                .with_context(|| format!("conteo inválido {:?} para la clave {:?}", v, key))?;
            total += n;
        }
        Ok(total.to_string())
    }
}
