/*!
  Binary for the CLI of chasm
*/

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod cli;
pub mod error;

use chasm::{
    api::{load_edb, load_program, output_predicates, write, Engine},
    execution::{ChaseStatus, ExecutionEngine, ExportParameters},
    io::parser::parse_fact,
    meta::timing::{TimedCode, TimedSorting},
};
use clap::Parser;
use cli::{CliApp, Reporting};
use colored::Colorize;
use error::CliError;

fn print_finished_message(status: ChaseStatus, steps: usize, new_facts: usize, saving: bool) {
    let overall_time = TimedCode::instance().total_system_time().as_millis();
    let loading_time = TimedCode::instance()
        .sub("Reading & Preprocessing")
        .total_system_time()
        .as_millis();
    let reasoning_time = TimedCode::instance()
        .sub("Reasoning")
        .total_system_time()
        .as_millis();
    let writing_time = if saving {
        TimedCode::instance()
            .sub("Output & Final Materialization")
            .total_system_time()
            .as_millis()
    } else {
        0
    };

    let max_string_len = [loading_time, reasoning_time, writing_time]
        .iter()
        .map(|t| t.to_string().len())
        .max()
        .unwrap_or(1)
        + 2; // for the unit ms

    println!(
        "Reasoning completed in {}{}. Derived {} facts in {} steps ({:?}).",
        overall_time.to_string().green().bold(),
        "ms".green().bold(),
        new_facts.to_string().green().bold(),
        steps,
        status,
    );

    println!(
        "   {0: <14} {1:>max_string_len$}ms",
        "Loading input:", loading_time
    );
    println!(
        "   {0: <14} {1:>max_string_len$}ms",
        "Reasoning:", reasoning_time
    );

    if saving {
        println!(
            "   {0: <14} {1:>max_string_len$}ms",
            "Saving output:", writing_time
        );
    }
}

fn print_facts(engine: &Engine, selection: ExportParameters) -> Result<(), CliError> {
    for predicate in output_predicates(engine, selection) {
        let table = engine.table(predicate)?;
        for row in table.rows() {
            println!("{}", engine.program().fact_to_string(predicate, &row));
        }
    }

    Ok(())
}

fn print_trace(engine: &Engine, facts: &[String]) -> Result<(), CliError> {
    for fact in facts {
        let (name, constants) =
            parse_fact(fact).map_err(|_| CliError::TracingInvalidFact { fact: fact.clone() })?;

        let program = engine.program();
        let predicate = program.predicate(&name);
        let tuple = constants
            .iter()
            .map(|constant| program.dictionary().get(constant))
            .collect::<Option<Vec<_>>>();

        let derivation = match (predicate, tuple) {
            (Some(predicate), Some(tuple)) if program.arity(predicate) == tuple.len() => {
                engine.explain(predicate, &tuple)?
            }
            _ => None,
        };

        let Some(derivation) = derivation else {
            println!("{fact}: {}", "not derived".red());
            continue;
        };

        match derivation.rule {
            Some(rule) => println!(
                "{fact}: derived in step {} by rule {} from nodes {:?} (node {})",
                derivation.step,
                program.rule_to_string(rule).bold(),
                derivation.premises,
                derivation.node
            ),
            None => println!("{fact}: input fact (node {})", derivation.node),
        }
    }

    Ok(())
}

fn run(cli: CliApp) -> Result<(), CliError> {
    TimedCode::instance().start();
    TimedCode::instance().sub("Reading & Preprocessing").start();

    log::info!("Parsing rules ...");

    let mut program = load_program(cli.rules)?;

    log::info!("Rules parsed");
    log::trace!("{:?}", program);

    let parameters = cli.chase.execution_parameters()?;
    let edb = load_edb(&mut program, cli.import_directory.as_deref())?;

    TimedCode::instance().sub("Reading & Preprocessing").stop();
    TimedCode::instance().sub("Reasoning").start();

    log::info!("Reasoning ... ");

    let mut engine = ExecutionEngine::initialize(program, edb, parameters)?;
    let status = engine.run()?;

    log::info!("Reasoning done");

    TimedCode::instance().sub("Reasoning").stop();

    match status {
        ChaseStatus::Fixpoint => {}
        ChaseStatus::CyclicTerms => log::warn!(
            "stopped after step {}: cyclic terms were created, the chase may not terminate",
            engine.current_iteration()
        ),
        ChaseStatus::StepLimit | ChaseStatus::Timeout => log::warn!(
            "stopped after step {} ({status:?}): results may be incomplete",
            engine.current_iteration()
        ),
    }

    let export = ExportParameters::from(cli.output.export);
    let saving = export != ExportParameters::None;
    if saving {
        TimedCode::instance()
            .sub("Output & Final Materialization")
            .start();
        log::info!("writing output");

        write(
            &engine,
            &cli.output.export_directory,
            &output_predicates(&engine, export),
            cli.output.overwrite,
        )?;

        TimedCode::instance()
            .sub("Output & Final Materialization")
            .stop();
    }

    TimedCode::instance().stop();

    let printing = ExportParameters::from(cli.output.print_facts);
    print_facts(&engine, printing)?;

    if let Some(facts) = &cli.tracing.facts {
        print_trace(&engine, facts)?;
    }

    let report = match cli.reporting {
        Reporting::Auto => {
            if printing == ExportParameters::None && cli.tracing.facts.is_none() {
                Reporting::Short
            } else {
                Reporting::None
            }
        }
        reporting => reporting,
    };

    if report != Reporting::None {
        print_finished_message(
            status,
            engine.current_iteration(),
            engine.derived_fact_count(),
            saving,
        );
    }

    if report == Reporting::Time {
        println!(
            "\n{}",
            TimedCode::instance().create_tree_string("chasm", TimedSorting::LongestTime)
        );
    }

    Ok(())
}

fn main() {
    let cli = CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Rule file: {:?}", cli.rules);

    run(cli).unwrap_or_else(|err| {
        log::error!("{} {err}", "error:".red().bold());
        std::process::exit(1)
    })
}
