use std::time::Duration;

use assert_fs::{prelude::*, TempDir};
use chasm::{
    api::{load_string, output_predicates, reason, write},
    chasm_physical::columnar::Column,
    edb::InMemoryEdb,
    execution::{
        ChaseStatus, CyclicTermPolicy, ExecutionEngine, ExecutionParameters, ExportParameters,
        ProvenanceMode,
    },
    ChaseMode, Term,
};
use test_log::test;

fn run(source: &str, parameters: ExecutionParameters) -> (ExecutionEngine, ChaseStatus) {
    let program = load_string(source).expect("test programs are valid");
    reason(program, parameters, None).expect("test programs run")
}

fn rows(engine: &ExecutionEngine, predicate: &str) -> Vec<Vec<String>> {
    let table = engine.table_by_name(predicate).unwrap();
    table
        .rows()
        .map(|row| {
            row.into_iter()
                .map(|term| engine.dictionary().display(term))
                .collect()
        })
        .collect()
}

#[test]
fn fixpoint_is_complete() {
    let (mut engine, status) = run(
        "e(1, 2) . e(2, 3) .
         p(?X, ?Y) :- e(?X, ?Y) .",
        ExecutionParameters::default(),
    );
    assert_eq!(status, ChaseStatus::Fixpoint);

    let p = engine.program().predicate("p").unwrap();
    assert_eq!(engine.graph().node_ids_with_predicate(p).len(), 1);
    assert_eq!(
        rows(&engine, "p"),
        vec![vec!["1", "2"], vec!["2", "3"]]
    );
    assert_eq!(engine.derived_fact_count(), 2);
    assert_eq!(engine.count_facts_of_predicate(p), 2);
    let e = engine.program().predicate("e").unwrap();
    assert_eq!(engine.count_facts_of_predicate(e), 2);

    let nodes = engine.node_count();
    assert_eq!(engine.run().unwrap(), ChaseStatus::Fixpoint);
    assert_eq!(engine.node_count(), nodes);
}

#[test]
fn transitive_closure() {
    let mut source = String::new();
    for index in 0..20 {
        source.push_str(&format!("e({index}, {}) .\n", index + 1));
    }
    source.push_str(
        "path(?X, ?Y) :- e(?X, ?Y) .
         path(?X, ?Z) :- path(?X, ?Y), path(?Y, ?Z) .",
    );

    for threads in [1, 4] {
        let parameters = ExecutionParameters::default()
            .with_threads(threads)
            .with_max_nodes_per_predicate(2);
        let (engine, status) = run(&source, parameters);

        assert_eq!(status, ChaseStatus::Fixpoint);
        // 21 nodes on a line
        assert_eq!(engine.table_by_name("path").unwrap().len(), 21 * 20 / 2);
        assert_eq!(engine.derived_fact_count(), 21 * 20 / 2);
    }
}

#[test]
fn results_do_not_depend_on_join_strategy() {
    let source = "e(a, b) . e(b, c) . e(c, a) . e(c, d) .
                  t(?X, ?Z) :- e(?X, ?Y), e(?Y, ?Z) .
                  s(?X) :- t(?X, ?Y), e(?Y, ?X) .";

    let (nested, _) = run(source, ExecutionParameters::default());
    let (merged, _) = run(
        source,
        ExecutionParameters::default().with_nested_loop_threshold(0),
    );

    assert_eq!(rows(&nested, "t"), rows(&merged, "t"));
    assert_eq!(rows(&nested, "s"), vec![vec!["a"], vec!["b"], vec!["c"]]);
    assert_eq!(rows(&merged, "s"), rows(&nested, "s"));
}

#[test]
fn existential_nulls_are_reused() {
    let (engine, status) = run(
        "e(1, 2) . e(2, 3) .
         q(?X, !N) :- e(?X, ?Y) .",
        ExecutionParameters::default(),
    );
    assert_eq!(status, ChaseStatus::Fixpoint);

    let table = engine.table_by_name("q").unwrap();
    assert_eq!(table.len(), 2);
    let nulls = table.column(1).as_slice().to_vec();
    assert!(nulls.iter().all(|term| term.is_null()));
    assert_ne!(nulls[0], nulls[1]);

    let manager = engine.term_manager();
    assert_eq!(manager.key_count(), 1);
    assert_eq!(manager.null_count(), 2);

    // applying the rule to the same bindings again yields the same nulls
    let again = manager
        .get_or_assign_ids(0, 1, &[table.column(0).clone()], table.len())
        .unwrap();
    assert_eq!(again.as_slice(), nulls.as_slice());
    assert_eq!(manager.null_count(), 2);
}

#[test]
fn restricted_chase_skips_satisfied_bindings() {
    let source = "person(alice) . person(bob) . parent(bob, carol) .
                  parent(?X, !P) :- person(?X) .";

    let (restricted, _) = run(source, ExecutionParameters::default());
    let parents = rows(&restricted, "parent");
    assert_eq!(parents.len(), 2);
    assert!(parents.contains(&vec!["bob".to_string(), "carol".to_string()]));
    assert_eq!(restricted.term_manager().null_count(), 1);

    let (oblivious, _) = run(
        source,
        ExecutionParameters::default().with_chase_mode(ChaseMode::Oblivious),
    );
    assert_eq!(rows(&oblivious, "parent").len(), 3);
    assert_eq!(oblivious.term_manager().null_count(), 2);
}

#[test]
fn cyclic_terms_are_reported() {
    let source = "p(a) .
                  q(?X, !N) :- p(?X) .
                  p(?Y) :- q(?X, ?Y) .";

    let (engine, status) = run(source, ExecutionParameters::default());
    assert_eq!(status, ChaseStatus::CyclicTerms);
    assert!(engine.contains_cyclic_terms());

    let (engine, status) = run(
        source,
        ExecutionParameters::default()
            .with_cyclic_term_policy(CyclicTermPolicy::Continue)
            .with_max_steps(Some(10)),
    );
    assert_eq!(status, ChaseStatus::StepLimit);
    assert!(engine.contains_cyclic_terms());
    assert_eq!(engine.current_iteration(), 10);
}

#[test]
fn timeout_stops_and_run_resumes() {
    let mut source = String::new();
    for index in 0..10 {
        source.push_str(&format!("e({index}, {}) .\n", index + 1));
    }
    source.push_str(
        "path(?X, ?Y) :- e(?X, ?Y) .
         path(?X, ?Z) :- path(?X, ?Y), e(?Y, ?Z) .",
    );

    let (mut engine, status) = run(
        &source,
        ExecutionParameters::default().with_timeout(Some(Duration::ZERO)),
    );
    assert_eq!(status, ChaseStatus::Timeout);
    assert_eq!(engine.current_iteration(), 0);
    assert!(rows(&engine, "path").is_empty());

    engine.set_timeout(None);
    assert_eq!(engine.run().unwrap(), ChaseStatus::Fixpoint);
    assert_eq!(rows(&engine, "path").len(), 11 * 10 / 2);
}

#[test]
fn step_limit_can_be_lifted() {
    let (mut engine, status) = run(
        "e(1, 2) . e(2, 3) . e(3, 4) .
         path(?X, ?Y) :- e(?X, ?Y) .
         path(?X, ?Z) :- path(?X, ?Y), e(?Y, ?Z) .",
        ExecutionParameters::default().with_max_steps(Some(1)),
    );
    assert_eq!(status, ChaseStatus::StepLimit);
    assert_eq!(rows(&engine, "path").len(), 3);

    engine.set_max_steps(None);
    assert_eq!(engine.run().unwrap(), ChaseStatus::Fixpoint);
    assert_eq!(rows(&engine, "path").len(), 6);
}

#[test]
fn literals_without_variables_are_conditions() {
    for rule in [
        "p(?X) :- e(?X), flag() .",
        "p(?X) :- e(?X), f(a) .",
        "p(?X) :- f(a), e(?X) .",
        "p(?X) :- ready(a), e(?X) .",
    ] {
        let source = format!(
            "e(1) . e(2) . flag() . f(a) . start(a) .
             ready(?X) :- start(?X) .
             {rule}"
        );
        let (engine, status) = run(&source, ExecutionParameters::default());

        assert_eq!(status, ChaseStatus::Fixpoint, "{rule}");
        assert_eq!(rows(&engine, "p"), vec![vec!["1"], vec!["2"]], "{rule}");
    }

    let (engine, _) = run(
        "e(1) . f(a) .
         p(?X) :- e(?X), f(b) .
         g(!N) :- f(a) .",
        ExecutionParameters::default(),
    );
    assert!(rows(&engine, "p").is_empty());
    let nulls = engine.table_by_name("g").unwrap();
    assert_eq!(nulls.len(), 1);
    assert!(nulls.value(0, 0).is_null());
}

#[test]
fn null_numbering_does_not_depend_on_threads() {
    let mut source = String::new();
    for index in 0..50 {
        source.push_str(&format!("l({index}) . r({}) .\n", index + 100));
    }
    source.push_str(
        "c(?X) :- l(?X) .
         c(?X) :- r(?X) .
         d(?X, !N) :- c(?X) .",
    );

    let (single, _) = run(&source, ExecutionParameters::default().with_threads(1));
    let expected = rows(&single, "d");
    assert_eq!(expected.len(), 100);

    for _ in 0..8 {
        let (parallel, _) = run(&source, ExecutionParameters::default().with_threads(4));
        assert_eq!(rows(&parallel, "d"), expected);
    }
}

#[test]
fn strata_run_in_dependency_order() {
    let (engine, status) = run(
        "e(1, 2) . e(2, 3) .
         reach(?Y) :- e(?X, ?Y) .
         reach(?Z) :- reach(?Y), e(?Y, ?Z) .
         done(?X) :- reach(?X) .",
        ExecutionParameters::default(),
    );

    assert_eq!(status, ChaseStatus::Fixpoint);
    assert_eq!(engine.program().strata().len(), 2);
    assert_eq!(rows(&engine, "done"), vec![vec!["2"], vec!["3"]]);
}

#[test]
fn stratification_does_not_change_results() {
    let source = "e(1, 2) . e(2, 3) . e(3, 1) .
                  reach(?Y) :- e(?X, ?Y) .
                  pair(?X, ?Y) :- reach(?X), e(?X, ?Y), reach(?Y) .";

    let (stratified, _) = run(source, ExecutionParameters::default());
    let (flat, status) = run(source, ExecutionParameters::default().with_stratify(false));

    assert_eq!(status, ChaseStatus::Fixpoint);
    assert_eq!(flat.program().strata().len(), 1);
    assert_eq!(rows(&flat, "pair"), rows(&stratified, "pair"));
    assert_eq!(rows(&flat, "pair").len(), 3);
}

#[test]
fn input_facts_of_derived_predicates() {
    let (engine, _) = run(
        "e(1, 2) . p(1, 2) . p(5, 5) .
         p(?X, ?Y) :- e(?X, ?Y) .",
        ExecutionParameters::default(),
    );

    assert_eq!(rows(&engine, "p").len(), 2);
    assert_eq!(engine.derived_fact_count(), 0);
}

#[test]
fn provenance_explains_facts() {
    let (engine, _) = run(
        "e(1, 2) . e(2, 3) .
         p(?X, ?Y) :- e(?X, ?Y) .
         r(?X, ?Z) :- p(?X, ?Y), p(?Y, ?Z) .",
        ExecutionParameters::default(),
    );

    let r = engine.program().predicate("r").unwrap();
    let p = engine.program().predicate("p").unwrap();
    let tuple = [
        engine.dictionary().get("1").unwrap(),
        engine.dictionary().get("3").unwrap(),
    ];

    let derivation = engine.explain(r, &tuple).unwrap().unwrap();
    assert_eq!(derivation.rule, Some(1));
    let p_node = engine.graph().node_ids_with_predicate(p)[0];
    assert_eq!(derivation.premises, vec![p_node, p_node]);

    let (engine, _) = run(
        "e(1, 2) . e(2, 3) .
         p(?X, ?Y) :- e(?X, ?Y) .
         r(?X, ?Z) :- p(?X, ?Y), p(?Y, ?Z) .",
        ExecutionParameters::default().with_provenance(ProvenanceMode::Node),
    );
    let derivation = engine.explain(r, &tuple).unwrap().unwrap();
    assert_eq!(derivation.premises, vec![p_node]);
}

#[test]
fn query_containment_prunes_equivalent_applications() {
    let source = "e(1, 2) . e(2, 3) . e(3, 4) .
                  p(?X, ?Y) :- e(?X, ?Y) .
                  q(?X, ?Y) :- e(?X, ?Y) .
                  p(?X, ?Y) :- q(?X, ?Y) .";

    let (pruned, _) = run(
        source,
        ExecutionParameters::default().with_query_containment(true),
    );
    let (plain, _) = run(source, ExecutionParameters::default());

    assert_eq!(rows(&pruned, "p"), rows(&plain, "p"));
    assert_eq!(rows(&pruned, "p").len(), 3);
}

#[test]
fn engine_accepts_external_edb() {
    let mut program = load_string("p(?X) :- e(?X, ?X) .").unwrap();
    let e = program.predicate("e").unwrap();
    let one = program.dictionary_mut().add("1");
    let two = program.dictionary_mut().add("2");

    let mut edb = InMemoryEdb::new();
    edb.add_relation(
        e,
        chasm::Segment::from_rows(2, [[one, one], [one, two], [two, two]]).unwrap(),
    )
    .unwrap();

    let mut engine =
        ExecutionEngine::initialize(program, edb, ExecutionParameters::default()).unwrap();
    assert_eq!(engine.run().unwrap(), ChaseStatus::Fixpoint);

    let table = engine.table_by_name("p").unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(engine.table(e).unwrap().len(), 3);
    assert!(engine.table_by_name("missing").is_err());

    let column: Column<Term> = table.column(0).clone();
    assert_eq!(column.as_slice(), &[one, two]);
}

#[test]
fn csv_import_and_export() {
    let import = TempDir::new().unwrap();
    import.child("e.csv").write_str("1,2\n2,3\n3,3\n").unwrap();

    let program = load_string(
        "e(0, 1) .
         p(?X, ?Y) :- e(?X, ?Y) .
         loop(?X) :- p(?X, ?X) .",
    )
    .unwrap();
    let (engine, status) =
        reason(program, ExecutionParameters::default(), Some(import.path())).unwrap();
    assert_eq!(status, ChaseStatus::Fixpoint);
    assert_eq!(engine.table_by_name("p").unwrap().len(), 4);

    let exported = output_predicates(&engine, ExportParameters::Idb);
    assert_eq!(exported.len(), 2);

    let export = TempDir::new().unwrap();
    write(&engine, export.path(), &exported, false).unwrap();
    export.child("loop.csv").assert("3\n");
    export.child("p.csv").assert(predicates::str::contains("0,1"));

    assert!(write(&engine, export.path(), &exported, false).is_err());
    write(&engine, export.path(), &exported, true).unwrap();
}
