//! API to call the chase engine and compute results
//!
//! # Examples
//! ```
//! use chasm::{
//!     api::{load_string, reason},
//!     execution::{ChaseStatus, ExecutionParameters},
//! };
//!
//! let program = load_string(
//!     "e(1, 2) . e(2, 3) .
//!      p(?X, ?Y) :- e(?X, ?Y) .
//!      p(?X, ?Z) :- p(?X, ?Y), e(?Y, ?Z) .",
//! )
//! .unwrap();
//!
//! let (engine, status) = reason(program, ExecutionParameters::default(), None).unwrap();
//! assert_eq!(status, ChaseStatus::Fixpoint);
//! assert_eq!(engine.table_by_name("p").unwrap().len(), 3);
//! ```

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use crate::{
    edb::InMemoryEdb,
    error::Error,
    execution::{ChaseStatus, ExecutionEngine, ExecutionParameters, ExportParameters},
    io::{csv, parser::parse_program},
    model::{PredicateId, Program},
};

/// Reasoning Engine exposed by the API
pub type Engine = ExecutionEngine;

/// Load the program in the given `file`.
///
/// For details see [load_string]
pub fn load_program(file: PathBuf) -> Result<Program, Error> {
    let input = read_to_string(&file).map_err(|error| Error::IOReading {
        error,
        filename: file,
    })?;

    load_string(&input)
}

/// Parse a program in the given `input`-String.
///
/// # Error
/// Returns an appropriate [Error] variant on parsing and validation issues.
pub fn load_string(input: &str) -> Result<Program, Error> {
    parse_program(input)
}

/// Collect the facts of the program and, if `import_dir` is given,
/// the contents of `<predicate>.csv` in that directory for every predicate that has such a file.
pub fn load_edb(program: &mut Program, import_dir: Option<&Path>) -> Result<InMemoryEdb, Error> {
    let mut edb = InMemoryEdb::from_program(program)?;

    if let Some(directory) = import_dir {
        let predicates = program.predicates().collect::<Vec<_>>();
        for predicate in predicates {
            let file = directory.join(format!("{}.csv", program.predicate_name(predicate)));
            if !file.is_file() {
                continue;
            }

            let arity = program.arity(predicate);
            let segment = csv::load_csv(&file, arity, program.dictionary_mut())?;
            edb.add_relation(predicate, segment)?;
        }
    }

    Ok(edb)
}

/// Run the chase on `program` until it stops.
///
/// Facts are taken from the program and from `import_dir`, see [load_edb].
pub fn reason(
    mut program: Program,
    parameters: ExecutionParameters,
    import_dir: Option<&Path>,
) -> Result<(Engine, ChaseStatus), Error> {
    let edb = load_edb(&mut program, import_dir)?;
    let mut engine = ExecutionEngine::initialize(program, edb, parameters)?;
    let status = engine.run()?;

    Ok((engine, status))
}

/// Get a [Vec] of all the predicates selected by `export`.
pub fn output_predicates(engine: &Engine, export: ExportParameters) -> Vec<PredicateId> {
    let program = engine.program();

    match export {
        ExportParameters::None => Vec::new(),
        ExportParameters::Idb => {
            let mut result = program.idb_predicates().into_iter().collect::<Vec<_>>();
            result.sort();
            result
        }
        ExportParameters::All => program.predicates().collect(),
    }
}

/// Write the facts of `predicates` into `<predicate>.csv` files in `directory`.
pub fn write(
    engine: &Engine,
    directory: &Path,
    predicates: &[PredicateId],
    overwrite: bool,
) -> Result<(), Error> {
    std::fs::create_dir_all(directory)?;

    for &predicate in predicates {
        let name = engine.program().predicate_name(predicate);
        let file = directory.join(format!("{name}.csv"));
        let table = engine.table(predicate)?;

        csv::write_csv(&file, &table, engine.dictionary(), overwrite)?;
        log::info!("Wrote {} facts to {}", table.len(), file.display());
    }

    Ok(())
}
