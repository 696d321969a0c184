use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    hash::Hasher,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;

use crate::apps::MapReduceApp;
use crate::error::EngineError;
use crate::files::{intermediate_path, output_path};
use crate::rpc::TaskAssignment;
use crate::task::Operation;

/// Unidad de dato intermedio: lo que emite map y consume reduce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Resultado de ejecutar una tarea (sólo para logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Pares emitidos por map
    Mapped { records: usize },
    /// Claves distintas escritas por reduce
    Reduced { keys: usize },
}

/* =========================
   Hash estable + particiones
   ========================= */

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// FNV-1a de 32 bits. El crate `fnv` sólo trae la variante de 64.
#[derive(Debug, Clone, Copy)]
pub struct Fnv32a(u32);

impl Default for Fnv32a {
    fn default() -> Self {
        Fnv32a(FNV32_OFFSET_BASIS)
    }
}

impl Hasher for Fnv32a {
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= u32::from(*b);
            self.0 = self.0.wrapping_mul(FNV32_PRIME);
        }
    }

    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

/// FNV-1a de 32 bits recortado a 31 bits. Tiene que dar lo mismo en
/// todos los workers, por eso no se usa `DefaultHasher`.
pub fn ihash(key: &str) -> u32 {
    let mut h = Fnv32a::default();
    h.write(key.as_bytes());
    (h.finish() & 0x7fff_ffff) as u32
}

pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce.max(1)
}

/* =========================
   Map
   ========================= */

/// Ejecuta la función map sobre un archivo y agrega cada par a su
/// partición `mr-<p>` dentro de `work_dir`.
///
/// Los archivos de partición son compartidos por todas las tareas map: se
/// abren en modo append y se crean si no existen. Se abren las `n_reduce`
/// particiones aunque no reciban pares, así al terminar la fase map todas
/// existen. Cada partición recibe un único `write_all` con todo su buffer.
pub fn run_map(
    app: &dyn MapReduceApp,
    filename: &str,
    content: &str,
    n_reduce: u32,
    work_dir: &Path,
) -> Result<usize, EngineError> {
    let pairs = app
        .map(filename, content)
        .map_err(|cause| EngineError::App {
            app: app.name().to_string(),
            phase: "map",
            cause,
        })?;

    let n = n_reduce.max(1);
    let mut buffers: Vec<Vec<u8>> = vec![Vec::new(); n as usize];

    for kv in &pairs {
        let pid = partition_for(&kv.key, n) as usize;
        serde_json::to_writer(&mut buffers[pid], kv)
            .map_err(|e| EngineError::io(intermediate_path(work_dir, pid as u32))(e.into()))?;
        buffers[pid].push(b'\n');
    }

    for (pid, buf) in buffers.iter().enumerate() {
        append_to_partition(work_dir, pid as u32, buf)?;
    }

    Ok(pairs.len())
}

fn append_to_partition(work_dir: &Path, partition: u32, buf: &[u8]) -> Result<(), EngineError> {
    let path = intermediate_path(work_dir, partition);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(EngineError::io(&path))?;

    if !buf.is_empty() {
        file.write_all(buf).map_err(EngineError::io(&path))?;
    }
    Ok(())
}

/* =========================
   Reduce
   ========================= */

/// Lee un archivo de partición (JSONL) completo.
pub fn read_partition(path: &Path) -> Result<Vec<KeyValue>, EngineError> {
    let file = File::open(path).map_err(EngineError::io(path))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(EngineError::io(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).map_err(|source| EngineError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        out.push(kv);
    }

    Ok(out)
}

/// Ordena por clave y agrupa los registros consecutivos con la misma clave.
/// Dentro de un grupo los valores conservan el orden de lectura.
pub fn group_by_key(mut records: Vec<KeyValue>) -> Vec<(String, Vec<String>)> {
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for KeyValue { key, value } in records {
        match groups.last_mut() {
            Some((last, values)) if *last == key => values.push(value),
            _ => groups.push((key, vec![value])),
        }
    }
    groups
}

/// Reduce de una partición: lee `mr-<p>`, agrupa por clave y escribe
/// `mr-out-<p>` con una línea `"<clave> <resultado>"` por clave.
///
/// La salida se escribe en un temporal del mismo directorio y se renombra
/// al final, así un reduce que falla a mitad no deja un `mr-out-<p>` parcial
/// y dos ejecuciones de la misma tarea no se pisan línea a línea.
pub fn run_reduce(
    app: &dyn MapReduceApp,
    partition: u32,
    work_dir: &Path,
) -> Result<usize, EngineError> {
    let input = intermediate_path(work_dir, partition);
    let groups = group_by_key(read_partition(&input)?);

    let output = output_path(work_dir, partition);
    let mut tmp = NamedTempFile::new_in(work_dir).map_err(EngineError::io(work_dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        for (key, values) in &groups {
            let result = app.reduce(key, values).map_err(|cause| EngineError::App {
                app: app.name().to_string(),
                phase: "reduce",
                cause,
            })?;
            writeln!(writer, "{} {}", key, result).map_err(EngineError::io(&output))?;
        }
        writer.flush().map_err(EngineError::io(&output))?;
    }

    tmp.persist(&output)
        .map_err(|e| EngineError::io(&output)(e.error))?;

    Ok(groups.len())
}

/* =========================
   Despacho por tipo de tarea
   ========================= */

pub fn execute(
    app: &dyn MapReduceApp,
    assignment: &TaskAssignment,
    work_dir: &Path,
) -> Result<TaskOutcome, EngineError> {
    match assignment.operation {
        Operation::Map => {
            let records = run_map(
                app,
                &assignment.task_id,
                &assignment.content,
                assignment.n_reduce,
                work_dir,
            )?;
            Ok(TaskOutcome::Mapped { records })
        }
        Operation::Reduce => {
            let partition =
                assignment
                    .partition
                    .ok_or_else(|| EngineError::InvalidAssignment {
                        task_id: assignment.task_id.clone(),
                        reason: "tarea reduce sin partición".to_string(),
                    })?;
            let keys = run_reduce(app, partition, work_dir)?;
            Ok(TaskOutcome::Reduced { keys })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, path::PathBuf};

    use crate::wordcount::WordCount;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("engine_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    /// App de prueba: emite (palabra, "1") y en reduce junta los valores.
    struct Echo;

    impl MapReduceApp for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn map(&self, _filename: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>> {
            Ok(contents
                .split_whitespace()
                .map(|w| KeyValue::new(w, "1"))
                .collect())
        }

        fn reduce(&self, _key: &str, values: &[String]) -> anyhow::Result<String> {
            Ok(values.join(","))
        }
    }

    struct Failing;

    impl MapReduceApp for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn map(&self, _filename: &str, _contents: &str) -> anyhow::Result<Vec<KeyValue>> {
            anyhow::bail!("map roto")
        }

        fn reduce(&self, key: &str, _values: &[String]) -> anyhow::Result<String> {
            anyhow::bail!("reduce roto para {key}")
        }
    }

    fn write_partition(dir: &Path, partition: u32, records: &[KeyValue]) {
        let mut buf = String::new();
        for kv in records {
            buf.push_str(&serde_json::to_string(kv).unwrap());
            buf.push('\n');
        }
        fs::write(intermediate_path(dir, partition), buf).unwrap();
    }

    /* =========================
       HASH / PARTICIONES
       ========================= */

    #[test]
    fn ihash_es_determinista() {
        for key in ["a", "b", "hola", "mundo_prueba", ""] {
            assert_eq!(ihash(key), ihash(key));
            assert_eq!(partition_for(key, 7), partition_for(key, 7));
        }
    }

    #[test]
    fn ihash_usa_fnv1a_de_32_bits_recortado() {
        // vectores conocidos de FNV-1a 32
        assert_eq!(ihash(""), 0x811c_9dc5 & 0x7fff_ffff);
        assert_eq!(ihash("a"), 0xe40c_292c & 0x7fff_ffff);
        assert_eq!(ihash("foobar"), 0xbf9c_f968 & 0x7fff_ffff);
        assert!(ihash("cualquier clave") <= 0x7fff_ffff);
    }

    #[test]
    fn partition_for_retorna_id_en_rango() {
        let n = 10;
        for key in ["a", "b", "c", "xyz", "otro"] {
            assert!(partition_for(key, n) < n);
        }
        // n_reduce = 0 no debe dividir por cero
        assert_eq!(partition_for("a", 0), 0);
    }

    /* =========================
       MAP
       ========================= */

    #[test]
    fn run_map_reparte_pares_por_hash_y_crea_todas_las_particiones() {
        let tmp = temp_dir("map_basic");

        let emitted = run_map(&Echo, "f1", "a b a c", 3, &tmp).unwrap();
        assert_eq!(emitted, 4);

        let mut total = 0;
        for p in 0..3 {
            let path = intermediate_path(&tmp, p);
            assert!(path.exists(), "falta {}", path.display());
            let recs = read_partition(&path).unwrap();
            for kv in &recs {
                assert_eq!(partition_for(&kv.key, 3), p);
            }
            total += recs.len();
        }
        assert_eq!(total, 4);
    }

    #[test]
    fn run_map_agrega_sin_pisar_lo_de_otras_tareas() {
        let tmp = temp_dir("map_append");

        run_map(&Echo, "f1", "hola mundo", 2, &tmp).unwrap();
        run_map(&Echo, "f2", "hola", 2, &tmp).unwrap();

        let p = partition_for("hola", 2);
        let recs = read_partition(&intermediate_path(&tmp, p)).unwrap();
        let holas = recs.iter().filter(|kv| kv.key == "hola").count();
        assert_eq!(holas, 2);
    }

    #[test]
    fn run_map_propaga_error_de_la_app() {
        let tmp = temp_dir("map_fail");

        let err = run_map(&Failing, "f1", "x", 2, &tmp).unwrap_err();
        assert!(matches!(err, EngineError::App { phase: "map", .. }));
        assert!(!intermediate_path(&tmp, 0).exists());
    }

    /* =========================
       REDUCE
       ========================= */

    #[test]
    fn group_by_key_agrupa_claves_iguales() {
        let records = vec![
            KeyValue::new("a", "1"),
            KeyValue::new("a", "1"),
            KeyValue::new("b", "1"),
        ];

        let groups = group_by_key(records);

        assert_eq!(
            groups,
            vec![
                ("a".to_string(), vec!["1".to_string(), "1".to_string()]),
                ("b".to_string(), vec!["1".to_string()]),
            ]
        );
    }

    #[test]
    fn group_by_key_ordena_entrada_desordenada() {
        let records = vec![
            KeyValue::new("b", "1"),
            KeyValue::new("a", "x"),
            KeyValue::new("b", "2"),
        ];

        let groups = group_by_key(records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[1], ("b".to_string(), vec!["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn run_reduce_escribe_una_linea_por_clave() {
        let tmp = temp_dir("reduce_basic");
        write_partition(
            &tmp,
            0,
            &[
                KeyValue::new("a", "1"),
                KeyValue::new("b", "1"),
                KeyValue::new("a", "1"),
            ],
        );

        let keys = run_reduce(&WordCount, 0, &tmp).unwrap();
        assert_eq!(keys, 2);

        let content = fs::read_to_string(output_path(&tmp, 0)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["a 2", "b 1"]);
    }

    #[test]
    fn run_reduce_con_particion_vacia_crea_salida_vacia() {
        let tmp = temp_dir("reduce_empty");
        fs::File::create(intermediate_path(&tmp, 4)).unwrap();

        assert_eq!(run_reduce(&Echo, 4, &tmp).unwrap(), 0);

        let content = fs::read_to_string(output_path(&tmp, 4)).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn run_reduce_falla_si_falta_la_particion() {
        let tmp = temp_dir("reduce_missing");

        let err = run_reduce(&Echo, 1, &tmp).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(!output_path(&tmp, 1).exists());
    }

    #[test]
    fn run_reduce_no_deja_salida_parcial_si_la_app_falla() {
        let tmp = temp_dir("reduce_fail");
        write_partition(&tmp, 0, &[KeyValue::new("a", "1")]);

        let err = run_reduce(&Failing, 0, &tmp).unwrap_err();
        assert!(matches!(err, EngineError::App { phase: "reduce", .. }));
        assert!(!output_path(&tmp, 0).exists());
    }

    #[test]
    fn read_partition_reporta_linea_corrupta() {
        let tmp = temp_dir("corrupt");
        fs::write(
            intermediate_path(&tmp, 0),
            "{\"key\":\"a\",\"value\":\"1\"}\nesto no es json\n",
        )
        .unwrap();

        match read_partition(&intermediate_path(&tmp, 0)) {
            Err(EngineError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("esperaba Corrupt, llegó {:?}", other),
        }
    }

    /* =========================
       PIPELINE COMPLETO
       ========================= */

    #[test]
    fn execute_map_y_luego_reduce_end_to_end() {
        let tmp = temp_dir("execute_e2e");
        let n_reduce = 2;

        for (name, text) in [("f1", "Hola hola, mundo!!"), ("f2", "mundo adios")] {
            let assignment = TaskAssignment {
                task_id: name.to_string(),
                epoch: 1,
                operation: Operation::Map,
                content: text.to_string(),
                n_reduce,
                partition: None,
            };
            let out = execute(&WordCount, &assignment, &tmp).unwrap();
            assert!(matches!(out, TaskOutcome::Mapped { .. }));
        }

        let mut lines = Vec::new();
        for p in 0..n_reduce {
            let assignment = TaskAssignment {
                task_id: format!("mr-{}", p),
                epoch: 2,
                operation: Operation::Reduce,
                content: format!("mr-{}", p),
                n_reduce,
                partition: Some(p),
            };
            execute(&WordCount, &assignment, &tmp).unwrap();
            let content = fs::read_to_string(output_path(&tmp, p)).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }
        lines.sort();

        assert_eq!(lines, vec!["adios 1", "hola 2", "mundo 2"]);
    }

    #[test]
    fn execute_reduce_sin_particion_es_invalido() {
        let tmp = temp_dir("execute_invalid");
        let assignment = TaskAssignment {
            task_id: "mr-0".to_string(),
            epoch: 1,
            operation: Operation::Reduce,
            content: "mr-0".to_string(),
            n_reduce: 1,
            partition: None,
        };

        let err = execute(&Echo, &assignment, &tmp).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAssignment { .. }));
    }
}
